//! Episode orchestration.
//!
//! Drives one podcast run: outline, host scripts, split, clean, synthesize,
//! concatenate, publish, rebuild the feed. Every external service sits behind
//! a trait so runs can be exercised without network or ffmpeg.

use std::path::{Path, PathBuf};

use chrono::Local;

use crate::audio::{AudioJoiner, FfmpegJoiner};
use crate::catalog::publish_episode;
use crate::config::Config;
use crate::error::PodcastError;
use crate::feed::{FeedOutcome, rebuild_feed};
use crate::host::{HostId, HostSegment};
use crate::sanitizer::TextSanitizer;
use crate::script::{Partition, ScriptPartitioner};
use crate::speech::SpeechSynthesizer;
use crate::writer::ScriptWriter;

/// How far a run goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Stop after the script is split and cleaned; write a report instead of audio.
    Test,
    /// Produce the episode audio in the work directory.
    Produce,
    /// Produce, move into the episodes directory and rebuild the feed.
    Publish,
}

/// Callback for orchestration events.
pub type EpisodeCallback = Box<dyn Fn(EpisodeEvent) + Send + Sync>;

/// Events emitted during a run.
#[derive(Debug, Clone)]
pub enum EpisodeEvent {
    /// A pipeline step is starting.
    StepStarted { step: String },
    /// The combined script is available.
    ScriptReady { characters: usize },
    /// The script was split between the hosts.
    ScriptSplit { stats: SplitStats },
    /// A host's audio track was written.
    AudioReady { host: String, path: PathBuf },
    /// The concatenated episode was written.
    EpisodeReady { path: PathBuf },
    /// The episode was moved into the episodes directory.
    Published { path: PathBuf },
    /// The feed was rebuilt (or skipped for lack of episodes).
    FeedRebuilt { outcome: FeedOutcome },
    /// The run has finished.
    Finished,
}

/// Character counts of the two halves of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitStats {
    pub total: usize,
    pub first: usize,
    pub second: usize,
    /// The marker split failed and the script was cut by line count.
    pub degraded: bool,
}

impl SplitStats {
    /// Share of the split held by the first host, in percent.
    pub fn first_percent(&self) -> f64 {
        let sum = self.first + self.second;
        if sum == 0 {
            return 0.0;
        }
        self.first as f64 * 100.0 / sum as f64
    }

    pub fn second_percent(&self) -> f64 {
        if self.first + self.second == 0 {
            return 0.0;
        }
        100.0 - self.first_percent()
    }
}

/// A generated script, split and cleaned.
#[derive(Debug, Clone)]
pub struct EpisodeScript {
    pub raw: String,
    pub partition: Partition,
    pub first: HostSegment,
    pub second: HostSegment,
}

impl EpisodeScript {
    pub fn clean(&self, host: HostId) -> &HostSegment {
        match host {
            HostId::First => &self.first,
            HostId::Second => &self.second,
        }
    }

    pub fn stats(&self) -> SplitStats {
        SplitStats {
            total: self.raw.chars().count(),
            first: self.partition.first().char_len(),
            second: self.partition.second().char_len(),
            degraded: self.partition.is_degraded(),
        }
    }
}

/// What a run produced.
#[derive(Debug, Clone)]
pub enum EpisodeReport {
    Test {
        script: EpisodeScript,
        report_path: PathBuf,
    },
    Produced {
        script: EpisodeScript,
        episode: PathBuf,
    },
    Published {
        script: EpisodeScript,
        episode: PathBuf,
        feed: FeedOutcome,
    },
}

impl EpisodeReport {
    pub fn script(&self) -> &EpisodeScript {
        match self {
            EpisodeReport::Test { script, .. }
            | EpisodeReport::Produced { script, .. }
            | EpisodeReport::Published { script, .. } => script,
        }
    }
}

/// Orchestrates a single episode run.
pub struct EpisodeOrchestrator {
    config: Config,
    writer: Box<dyn ScriptWriter>,
    synthesizer: Option<Box<dyn SpeechSynthesizer>>,
    joiner: Box<dyn AudioJoiner>,
    sanitizer: TextSanitizer,
    partitioner: ScriptPartitioner,
    timestamp: Option<String>,
    callback: Option<EpisodeCallback>,
}

impl EpisodeOrchestrator {
    /// Create an orchestrator; fails if the cleaning rules do not compile.
    pub fn new(config: Config, writer: Box<dyn ScriptWriter>) -> Result<Self, PodcastError> {
        let sanitizer = config.sanitizer()?;
        let partitioner = config.partitioner();

        Ok(Self {
            config,
            writer,
            synthesizer: None,
            joiner: Box::new(FfmpegJoiner::default()),
            sanitizer,
            partitioner,
            timestamp: None,
            callback: None,
        })
    }

    /// Set the speech backend (required for anything but test runs).
    pub fn with_synthesizer(mut self, synthesizer: Box<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    pub fn with_joiner(mut self, joiner: Box<dyn AudioJoiner>) -> Self {
        self.joiner = joiner;
        self
    }

    /// Fix the timestamp used in file names instead of the current time.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Set a callback for orchestration events.
    pub fn with_callback(mut self, callback: EpisodeCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Run the pipeline up to `mode`.
    pub async fn run(&self, mode: RunMode) -> Result<EpisodeReport, PodcastError> {
        let stamp = self
            .timestamp
            .clone()
            .unwrap_or_else(|| Local::now().format("%Y%m%d_%H%M%S").to_string());

        let raw = self.generate_script().await?;
        self.emit_event(EpisodeEvent::ScriptReady {
            characters: raw.chars().count(),
        });

        let script = self.prepare_script(raw);

        let report = match mode {
            RunMode::Test => {
                let report_path = self
                    .config
                    .paths
                    .work_dir
                    .join(format!("test_results_{}.txt", stamp));
                self.write_test_report(&script, &report_path)?;
                EpisodeReport::Test {
                    script,
                    report_path,
                }
            }
            RunMode::Produce => {
                let episode = self.produce_audio(&script, &stamp).await?;
                EpisodeReport::Produced { script, episode }
            }
            RunMode::Publish => {
                let produced = self.produce_audio(&script, &stamp).await?;
                let (episode, feed) = self.publish(&produced)?;
                EpisodeReport::Published {
                    script,
                    episode,
                    feed,
                }
            }
        };

        self.emit_event(EpisodeEvent::Finished);
        Ok(report)
    }

    /// Request an outline and both host scripts, combined with markers.
    pub async fn generate_script(&self) -> Result<String, PodcastError> {
        let generation = &self.config.generation;
        let date = Local::now().format("%B %-d, %Y").to_string();

        self.step("Researching current news and generating outline");
        let outline = self
            .writer
            .complete(
                "outline",
                &generation.researcher_prompt,
                &self.config.outline_prompt(&date),
                generation.outline_max_tokens,
            )
            .await?;

        let mut scripts = Vec::with_capacity(2);
        for id in [HostId::First, HostId::Second] {
            let host = self.config.host(id);
            self.step(&format!("Generating {}'s script", host.name));
            let script = self
                .writer
                .complete(
                    &host.name,
                    &self.config.host_system_prompt(id, &date),
                    &self.config.host_prompt(id, &outline, &date),
                    generation.script_max_tokens,
                )
                .await?;
            scripts.push(script);
        }

        Ok(self.partitioner.markers().combine(&scripts[0], &scripts[1]))
    }

    /// Split `raw` between the hosts and clean both halves.
    pub fn prepare_script(&self, raw: String) -> EpisodeScript {
        self.step("Splitting script for two hosts");
        let partition = self.partitioner.partition(&raw);

        let first = HostSegment::new(
            HostId::First,
            self.sanitizer.sanitize(&partition.first().body),
        );
        let second = HostSegment::new(
            HostId::Second,
            self.sanitizer.sanitize(&partition.second().body),
        );

        let script = EpisodeScript {
            raw,
            partition,
            first,
            second,
        };
        let stats = script.stats();
        tracing::info!(
            "Split {} characters into {} / {} (degraded: {})",
            stats.total,
            stats.first,
            stats.second,
            stats.degraded
        );
        self.emit_event(EpisodeEvent::ScriptSplit { stats });
        script
    }

    /// Synthesize both hosts and join them; returns the episode path.
    async fn produce_audio(
        &self,
        script: &EpisodeScript,
        stamp: &str,
    ) -> Result<PathBuf, PodcastError> {
        let synthesizer = self.synthesizer.as_ref().ok_or_else(|| {
            PodcastError::Config("No speech synthesizer configured".to_string())
        })?;
        let work_dir = &self.config.paths.work_dir;

        let mut tracks = Vec::with_capacity(2);
        for id in [HostId::First, HostId::Second] {
            let host = self.config.host(id);
            let segment = script.clean(id);
            if segment.is_empty() {
                return Err(PodcastError::Synthesis(format!(
                    "Nothing left to say for {} after cleaning",
                    host.name
                )));
            }

            self.step(&format!("Generating audio for {}", host.name));
            let path = work_dir.join(format!(
                "{}_{}.{}",
                host.file_stem(),
                stamp,
                synthesizer.extension()
            ));
            synthesizer
                .synthesize_to_file(&segment.body, host, &path)
                .await?;
            self.emit_event(EpisodeEvent::AudioReady {
                host: host.name.clone(),
                path: path.clone(),
            });
            tracks.push(path);
        }

        self.step("Combining audio files");
        let episode = work_dir.join(format!(
            "{}{}.{}",
            self.config.paths.file_prefix, stamp, self.config.paths.extension
        ));
        let joined = self.joiner.concat(&tracks[0], &tracks[1], &episode).await;

        for track in &tracks {
            if let Err(e) = std::fs::remove_file(track) {
                tracing::warn!("Could not remove {}: {}", track.display(), e);
            }
        }
        joined?;

        tracing::info!("Episode audio written to {}", episode.display());
        self.emit_event(EpisodeEvent::EpisodeReady {
            path: episode.clone(),
        });
        Ok(episode)
    }

    /// Move `episode` into the episodes directory and rebuild the feed.
    pub fn publish(&self, episode: &Path) -> Result<(PathBuf, FeedOutcome), PodcastError> {
        self.step("Publishing episode");
        let paths = &self.config.paths;
        let published = publish_episode(episode, &paths.episodes_dir)?;
        self.emit_event(EpisodeEvent::Published {
            path: published.clone(),
        });

        self.step("Updating RSS feed");
        let outcome = rebuild_feed(
            &self.config.catalog(),
            &self.config.feed_builder(),
            &paths.episodes_dir,
            &paths.feed_path,
        )?;
        self.emit_event(EpisodeEvent::FeedRebuilt {
            outcome: outcome.clone(),
        });
        Ok((published, outcome))
    }

    fn write_test_report(&self, script: &EpisodeScript, path: &Path) -> Result<(), PodcastError> {
        let stats = script.stats();
        let first = &self.config.hosts.first.name;
        let second = &self.config.hosts.second.name;

        let mut report = String::from("=== TEST RESULTS ===\n\n");
        report.push_str(&format!("Script Length: {} characters\n", stats.total));
        report.push_str(&format!("{} Length: {} characters\n", first, stats.first));
        report.push_str(&format!("{} Length: {} characters\n", second, stats.second));
        report.push_str(&format!(
            "Split: {}\n\n",
            if stats.degraded { "line count (markers missing)" } else { "markers" }
        ));
        report.push_str("=== FULL SCRIPT ===\n\n");
        report.push_str(&script.raw);
        for (name, raw, clean) in [
            (first, script.partition.first(), &script.first),
            (second, script.partition.second(), &script.second),
        ] {
            let upper = name.to_uppercase();
            report.push_str(&format!("\n\n=== {} SCRIPT ===\n\n{}", upper, raw.body));
            report.push_str(&format!("\n\n=== {} CLEANED ===\n\n{}", upper, clean.body));
        }
        report.push('\n');

        std::fs::write(path, report).map_err(|e| PodcastError::io(path, e))?;
        tracing::info!("Test results saved to {}", path.display());
        Ok(())
    }

    fn step(&self, step: &str) {
        tracing::info!("{}", step);
        self.emit_event(EpisodeEvent::StepStarted {
            step: step.to_string(),
        });
    }

    /// Emit an event if a callback is registered.
    fn emit_event(&self, event: EpisodeEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}
