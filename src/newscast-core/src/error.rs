//! Error types for the podcast pipeline.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PodcastError {
    #[error("OpenAI API error: {0}")]
    OpenAI(#[from] async_openai::error::OpenAIError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("ffmpeg is not installed or not on PATH")]
    FfmpegMissing,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML error: {0}")]
    Xml(String),

    #[error("No episodes found in {}", dir.display())]
    NoEpisodes { dir: PathBuf },

    #[error("Text generation returned nothing for {step}")]
    EmptyGeneration { step: String },
}

impl PodcastError {
    /// Wrap an I/O error together with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PodcastError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the "nothing published yet" outcome of a catalog scan.
    pub fn is_no_episodes(&self) -> bool {
        matches!(self, PodcastError::NoEpisodes { .. })
    }
}
