//! Joining host tracks into one episode with ffmpeg.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::PodcastError;

/// Concatenates audio files in order.
#[async_trait]
pub trait AudioJoiner: Send + Sync {
    async fn concat(&self, first: &Path, second: &Path, output: &Path) -> Result<(), PodcastError>;
}

/// [`AudioJoiner`] that shells out to `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegJoiner {
    program: String,
}

impl Default for FfmpegJoiner {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
        }
    }
}

impl FfmpegJoiner {
    /// Use a specific ffmpeg binary instead of the one on PATH.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Check that ffmpeg can be run at all.
    pub async fn ensure_available(&self) -> Result<(), PodcastError> {
        let status = Command::new(&self.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(PodcastError::FfmpegMissing),
        }
    }
}

/// Arguments for a two-input audio-only concat.
fn concat_args(first: &Path, second: &Path, output: &Path) -> Vec<String> {
    vec![
        "-i".to_string(),
        first.display().to_string(),
        "-i".to_string(),
        second.display().to_string(),
        "-filter_complex".to_string(),
        "[0:0][1:0]concat=n=2:v=0:a=1[out]".to_string(),
        "-map".to_string(),
        "[out]".to_string(),
        output.display().to_string(),
        "-y".to_string(),
    ]
}

#[async_trait]
impl AudioJoiner for FfmpegJoiner {
    async fn concat(&self, first: &Path, second: &Path, output: &Path) -> Result<(), PodcastError> {
        let args = concat_args(first, second, output);
        tracing::debug!("{} {}", self.program, args.join(" "));

        let result = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => PodcastError::FfmpegMissing,
                _ => PodcastError::Audio(format!("Failed to run {}: {}", self.program, e)),
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(PodcastError::Audio(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_args() {
        let args = concat_args(Path::new("a.mp3"), Path::new("b.mp3"), Path::new("out.mp3"));
        assert_eq!(
            args,
            vec![
                "-i",
                "a.mp3",
                "-i",
                "b.mp3",
                "-filter_complex",
                "[0:0][1:0]concat=n=2:v=0:a=1[out]",
                "-map",
                "[out]",
                "out.mp3",
                "-y"
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_program_reports_ffmpeg_missing() {
        let joiner = FfmpegJoiner::with_program("definitely-not-ffmpeg-xyz");
        assert!(matches!(
            joiner.ensure_available().await,
            Err(PodcastError::FfmpegMissing)
        ));

        let err = joiner
            .concat(Path::new("a.mp3"), Path::new("b.mp3"), Path::new("out.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, PodcastError::FfmpegMissing));
    }
}
