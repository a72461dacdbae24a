//! Published episode discovery.
//!
//! The episodes directory is the only record of what has been published.
//! A scan lists the audio files directly inside it, newest first.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::PodcastError;

/// Extension of published episode files.
pub const EPISODE_EXTENSION: &str = "mp3";

/// A published audio artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeFile {
    /// File name including extension; doubles as the stable identifier.
    pub file_name: String,
    pub modified: DateTime<Utc>,
    pub size: u64,
    pub dir: PathBuf,
}

impl EpisodeFile {
    /// Read metadata for a single file.
    pub fn from_path(path: &Path) -> Result<Self, PodcastError> {
        let metadata = fs::metadata(path).map_err(|e| PodcastError::io(path, e))?;
        let modified = metadata.modified().map_err(|e| PodcastError::io(path, e))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        Ok(Self {
            file_name,
            modified: DateTime::<Utc>::from(modified),
            size: metadata.len(),
            dir,
        })
    }

    /// Display title: the file name without its extension.
    pub fn title(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.file_name)
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

/// Lists episode files in a directory.
#[derive(Debug, Clone)]
pub struct EpisodeCatalog {
    extension: String,
}

impl Default for EpisodeCatalog {
    fn default() -> Self {
        Self::new(EPISODE_EXTENSION)
    }
}

impl EpisodeCatalog {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into().trim_start_matches('.').to_string(),
        }
    }

    /// Scan `dir` (non-recursively) for episode files, newest first.
    ///
    /// Returns [`PodcastError::NoEpisodes`] when nothing matches, which
    /// callers should treat as "nothing to publish" rather than a failure.
    /// Same-timestamp files are ordered by name.
    pub fn scan(&self, dir: &Path) -> Result<Vec<EpisodeFile>, PodcastError> {
        let entries = fs::read_dir(dir).map_err(|e| PodcastError::io(dir, e))?;

        let mut episodes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PodcastError::io(dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| PodcastError::io(&path, e))?;
            if !file_type.is_file() || !self.matches_extension(&path) {
                continue;
            }
            episodes.push(EpisodeFile::from_path(&path)?);
        }

        if episodes.is_empty() {
            return Err(PodcastError::NoEpisodes {
                dir: dir.to_path_buf(),
            });
        }

        episodes.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| a.file_name.cmp(&b.file_name))
        });

        tracing::debug!("Found {} episodes in {}", episodes.len(), dir.display());
        Ok(episodes)
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension))
    }
}

/// Scan with the default `.mp3` extension.
pub fn scan(dir: &Path) -> Result<Vec<EpisodeFile>, PodcastError> {
    EpisodeCatalog::default().scan(dir)
}

/// Move a finished episode into `episodes_dir`, creating it if needed.
///
/// Falls back to copy-and-delete when a rename is not possible (e.g. the
/// work directory is on another filesystem).
pub fn publish_episode(source: &Path, episodes_dir: &Path) -> Result<PathBuf, PodcastError> {
    fs::create_dir_all(episodes_dir).map_err(|e| PodcastError::io(episodes_dir, e))?;

    let file_name = source.file_name().ok_or_else(|| {
        PodcastError::io(
            source,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file path"),
        )
    })?;
    let dest = episodes_dir.join(file_name);

    if fs::rename(source, &dest).is_err() {
        fs::copy(source, &dest).map_err(|e| PodcastError::io(&dest, e))?;
        fs::remove_file(source).map_err(|e| PodcastError::io(source, e))?;
    }

    tracing::info!("Published {}", dest.display());
    Ok(dest)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::time::{Duration, UNIX_EPOCH};

    /// Create `name` in `dir` with `size` bytes and an mtime `secs` after the epoch.
    pub(crate) fn write_episode(dir: &Path, name: &str, size: usize, secs: u64) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(&vec![0u8; size]).unwrap();
        file.set_modified(UNIX_EPOCH + Duration::from_secs(secs)).unwrap();
        path
    }

    #[test]
    fn test_scan_orders_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        write_episode(dir.path(), "b.mp3", 10, 1_700_000_200);
        write_episode(dir.path(), "a.mp3", 10, 1_700_000_100);
        write_episode(dir.path(), "c.mp3", 10, 1_700_000_300);

        let episodes = scan(dir.path()).unwrap();
        let names: Vec<&str> = episodes.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, vec!["c.mp3", "b.mp3", "a.mp3"]);
    }

    #[test]
    fn test_scan_reads_metadata() {
        let dir = tempfile::tempdir().unwrap();
        write_episode(dir.path(), "ep1.mp3", 12345, 1_720_000_000);

        let episodes = scan(dir.path()).unwrap();
        assert_eq!(episodes.len(), 1);
        let episode = &episodes[0];
        assert_eq!(episode.size, 12345);
        assert_eq!(episode.title(), "ep1");
        assert_eq!(episode.modified.timestamp(), 1_720_000_000);
        assert_eq!(episode.path(), dir.path().join("ep1.mp3"));
    }

    #[test]
    fn test_scan_ignores_other_files_and_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        write_episode(dir.path(), "show.mp3", 5, 1_700_000_000);
        write_episode(dir.path(), "LOUD.MP3", 5, 1_700_000_001);
        write_episode(dir.path(), "notes.txt", 5, 1_700_000_002);
        fs::create_dir(dir.path().join("nested.mp3")).unwrap();
        fs::create_dir(dir.path().join("old")).unwrap();
        write_episode(&dir.path().join("old"), "archived.mp3", 5, 1_700_000_003);

        let episodes = scan(dir.path()).unwrap();
        let names: Vec<&str> = episodes.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, vec!["LOUD.MP3", "show.mp3"]);
    }

    #[test]
    fn test_scan_empty_directory_reports_no_episodes() {
        let dir = tempfile::tempdir().unwrap();
        write_episode(dir.path(), "readme.txt", 5, 1_700_000_000);

        let err = scan(dir.path()).unwrap_err();
        assert!(err.is_no_episodes());
    }

    #[test]
    fn test_scan_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = scan(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, PodcastError::Io { .. }));
    }

    #[test]
    fn test_publish_episode_moves_file() {
        let root = tempfile::tempdir().unwrap();
        let source = write_episode(root.path(), "show_1.mp3", 42, 1_700_000_000);
        let episodes_dir = root.path().join("episodes");

        let dest = publish_episode(&source, &episodes_dir).unwrap();
        assert_eq!(dest, episodes_dir.join("show_1.mp3"));
        assert!(!source.exists());

        let episodes = scan(&episodes_dir).unwrap();
        assert_eq!(episodes[0].size, 42);
    }

    #[test]
    fn test_publish_missing_source_is_io_error() {
        let root = tempfile::tempdir().unwrap();
        let err = publish_episode(&root.path().join("nope.mp3"), &root.path().join("episodes"))
            .unwrap_err();
        assert!(matches!(err, PodcastError::Io { .. }));
    }

    #[test]
    fn test_custom_extension() {
        let dir = tempfile::tempdir().unwrap();
        write_episode(dir.path(), "a.m4a", 5, 1_700_000_000);
        write_episode(dir.path(), "b.mp3", 5, 1_700_000_000);

        let episodes = EpisodeCatalog::new(".m4a").scan(dir.path()).unwrap();
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].file_name, "a.m4a");
    }
}
