//! Newscast Core Library
//!
//! Turns a generated two-host news script into a published podcast episode:
//! script splitting and cleaning, speech synthesis, episode catalog and the
//! RSS feed, plus the orchestrator that runs them in order.

pub mod audio;
pub mod catalog;
pub mod config;
pub mod error;
pub mod feed;
pub mod host;
pub mod orchestrator;
pub mod sanitizer;
pub mod script;
pub mod speech;
pub mod writer;

pub use audio::{AudioJoiner, FfmpegJoiner};
pub use catalog::{EpisodeCatalog, EpisodeFile, publish_episode};
pub use config::{Config, SpeechProvider};
pub use error::PodcastError;
pub use feed::{ChannelConfig, FeedBuilder, FeedOutcome, rebuild_feed};
pub use host::{Host, HostId, HostSegment};
pub use orchestrator::{
    EpisodeCallback, EpisodeEvent, EpisodeOrchestrator, EpisodeReport, EpisodeScript, RunMode,
    SplitStats,
};
pub use sanitizer::{SanitizeRules, TextSanitizer};
pub use script::{Partition, ScriptMarkers, ScriptPartitioner};
pub use speech::{ElevenLabsSynthesizer, KokoroSynthesizer, SpeechSynthesizer};
pub use writer::{OpenAiWriter, ScriptWriter, WriterConfig};
