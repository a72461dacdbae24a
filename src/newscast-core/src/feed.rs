//! RSS feed generation.
//!
//! The feed is derived entirely from the episodes directory: scan, render,
//! replace. Nothing is cached between runs, so rebuilding is always safe.

use std::fs::Permissions;
use std::io::{Cursor, Write};
use std::path::Path;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::catalog::{EpisodeCatalog, EpisodeFile};
use crate::error::PodcastError;

/// RFC 822 date format used by `<pubDate>`.
pub const PUB_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Enclosure media type for published episodes.
pub const AUDIO_MIME_TYPE: &str = "audio/mpeg";

/// Episode duration is not measured; every item carries this placeholder.
pub const DURATION_PLACEHOLDER: &str = "00:00:00";

const ITUNES_NS: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";
const CONTENT_NS: &str = "http://purl.org/rss/1.0/modules/content/";
const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// Channel-level metadata for the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub title: String,
    pub description: String,
    pub language: String,
    /// Show home page.
    pub link: String,
    /// Public URL of the feed document itself.
    pub feed_url: String,
    pub authors: Vec<String>,
    pub explicit: bool,
    pub categories: Vec<String>,
    pub image_url: String,
    /// Description repeated on every item.
    pub episode_description: String,
    /// Public URL that `episodes_path` is relative to.
    pub base_url: String,
    pub episodes_path: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            title: "Youth Lens Today".to_string(),
            description: "A podcast exploring current events and youth perspectives".to_string(),
            language: "en-us".to_string(),
            link: "https://youthlenstoday.github.io/podcast/".to_string(),
            feed_url: "https://youthlenstoday.github.io/podcast/rss.xml".to_string(),
            authors: vec!["Nathan Goldberg".to_string(), "Jonah Herman".to_string()],
            explicit: false,
            categories: vec![
                "News".to_string(),
                "Politics".to_string(),
                "Education".to_string(),
            ],
            image_url: "https://youthlenstoday.github.io/podcast/cover.jpg".to_string(),
            episode_description: "Episode of Youth Lens Today podcast".to_string(),
            base_url: "https://youthlenstoday.github.io/podcast/".to_string(),
            episodes_path: "episodes".to_string(),
        }
    }
}

impl ChannelConfig {
    /// Public URL of an episode file; also used as the item GUID.
    pub fn episode_url(&self, file_name: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let segment = self.episodes_path.trim_matches('/');
        if segment.is_empty() {
            format!("{}/{}", base, file_name)
        } else {
            format!("{}/{}/{}", base, segment, file_name)
        }
    }
}

/// Result of a feed rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    /// The feed was rewritten with this many items.
    Written { episodes: usize },
    /// The episodes directory had nothing to list; the feed was left alone.
    NoEpisodes,
}

/// Renders episode lists into RSS 2.0 documents with iTunes tags.
#[derive(Debug, Clone, Default)]
pub struct FeedBuilder {
    channel: ChannelConfig,
}

impl FeedBuilder {
    pub fn new(channel: ChannelConfig) -> Self {
        Self { channel }
    }

    /// Render `entries` in the order given.
    pub fn build(&self, entries: &[EpisodeFile]) -> Result<String, PodcastError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 4);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_error)?;

        let rss = BytesStart::new("rss").with_attributes([
            ("version", "2.0"),
            ("xmlns:itunes", ITUNES_NS),
            ("xmlns:content", CONTENT_NS),
            ("xmlns:atom", ATOM_NS),
        ]);
        writer.write_event(Event::Start(rss)).map_err(xml_error)?;
        writer
            .write_event(Event::Start(BytesStart::new("channel")))
            .map_err(xml_error)?;

        self.write_channel_header(&mut writer)?;
        for entry in entries {
            self.write_item(&mut writer, entry)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("channel")))
            .map_err(xml_error)?;
        writer
            .write_event(Event::End(BytesEnd::new("rss")))
            .map_err(xml_error)?;

        let bytes = writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(|e| PodcastError::Xml(e.to_string()))
    }

    /// Render `entries` and atomically replace the file at `path`.
    pub fn write(&self, entries: &[EpisodeFile], path: &Path) -> Result<(), PodcastError> {
        let xml = self.build(entries)?;
        write_atomic(path, xml.as_bytes())
    }

    fn write_channel_header<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), PodcastError> {
        let channel = &self.channel;
        text_element(writer, "title", &channel.title)?;
        text_element(writer, "description", &channel.description)?;
        text_element(writer, "language", &channel.language)?;
        text_element(writer, "link", &channel.link)?;
        empty_element(
            writer,
            "atom:link",
            &[
                ("href", channel.feed_url.as_str()),
                ("rel", "self"),
                ("type", "application/rss+xml"),
            ],
        )?;
        text_element(writer, "itunes:author", &channel.authors.join(", "))?;
        text_element(
            writer,
            "itunes:explicit",
            if channel.explicit { "yes" } else { "no" },
        )?;
        for category in &channel.categories {
            empty_element(writer, "itunes:category", &[("text", category.as_str())])?;
        }
        empty_element(writer, "itunes:image", &[("href", channel.image_url.as_str())])?;

        writer
            .write_event(Event::Start(BytesStart::new("image")))
            .map_err(xml_error)?;
        text_element(writer, "url", &channel.image_url)?;
        text_element(writer, "title", &channel.title)?;
        text_element(writer, "link", &channel.link)?;
        writer
            .write_event(Event::End(BytesEnd::new("image")))
            .map_err(xml_error)?;
        Ok(())
    }

    fn write_item<W: Write>(
        &self,
        writer: &mut Writer<W>,
        entry: &EpisodeFile,
    ) -> Result<(), PodcastError> {
        let url = self.channel.episode_url(&entry.file_name);
        let length = entry.size.to_string();
        let pub_date = entry.modified.format(PUB_DATE_FORMAT).to_string();

        writer
            .write_event(Event::Start(BytesStart::new("item")))
            .map_err(xml_error)?;
        text_element(writer, "title", entry.title())?;
        text_element(writer, "description", &self.channel.episode_description)?;
        text_element(writer, "pubDate", &pub_date)?;
        text_element(writer, "guid", &url)?;
        empty_element(
            writer,
            "enclosure",
            &[
                ("url", url.as_str()),
                ("length", length.as_str()),
                ("type", AUDIO_MIME_TYPE),
            ],
        )?;
        text_element(writer, "itunes:duration", DURATION_PLACEHOLDER)?;
        writer
            .write_event(Event::End(BytesEnd::new("item")))
            .map_err(xml_error)?;
        Ok(())
    }
}

/// Rescan `episodes_dir` and rewrite the feed at `feed_path`.
///
/// An empty directory is reported as [`FeedOutcome::NoEpisodes`] and leaves
/// any existing feed untouched.
pub fn rebuild_feed(
    catalog: &EpisodeCatalog,
    builder: &FeedBuilder,
    episodes_dir: &Path,
    feed_path: &Path,
) -> Result<FeedOutcome, PodcastError> {
    let episodes = match catalog.scan(episodes_dir) {
        Ok(episodes) => episodes,
        Err(PodcastError::NoEpisodes { dir }) => {
            tracing::info!("No episodes in {}, feed not written", dir.display());
            return Ok(FeedOutcome::NoEpisodes);
        }
        Err(e) => return Err(e),
    };

    builder.write(&episodes, feed_path)?;
    tracing::info!(
        "Generated RSS feed with {} episodes at {}",
        episodes.len(),
        feed_path.display()
    );
    Ok(FeedOutcome::Written {
        episodes: episodes.len(),
    })
}

/// Write to a sibling temp file, then rename it over `path`.
///
/// The replacement keeps the mode of the file it replaces; a new file gets
/// the usual `0644` instead of the temp file's owner-only mode.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), PodcastError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| PodcastError::io(dir, e))?;
    tmp.write_all(contents)
        .map_err(|e| PodcastError::io(tmp.path(), e))?;
    let permissions = match std::fs::metadata(path) {
        Ok(metadata) => Some(metadata.permissions()),
        Err(_) => new_file_permissions(),
    };
    if let Some(permissions) = permissions {
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(|e| PodcastError::io(tmp.path(), e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| PodcastError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| PodcastError::io(path, e.error))?;
    Ok(())
}

#[cfg(unix)]
fn new_file_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<Permissions> {
    None
}

fn text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<(), PodcastError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)?;
    Ok(())
}

fn empty_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    attributes: &[(&str, &str)],
) -> Result<(), PodcastError> {
    let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
    writer
        .write_event(Event::Empty(element))
        .map_err(xml_error)?;
    Ok(())
}

fn xml_error(e: impl std::fmt::Display) -> PodcastError {
    PodcastError::Xml(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::write_episode;
    use chrono::{TimeZone, Utc};
    use quick_xml::Reader;
    use std::path::PathBuf;

    fn episode(name: &str, size: u64, secs: i64) -> EpisodeFile {
        EpisodeFile {
            file_name: name.to_string(),
            modified: Utc.timestamp_opt(secs, 0).unwrap(),
            size,
            dir: PathBuf::from("episodes"),
        }
    }

    /// Collect the text of every element named `tag`, in document order.
    fn texts_of(xml: &str, tag: &str) -> Vec<String> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut out = Vec::new();
        let mut inside = false;
        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) => inside = e.name().as_ref() == tag.as_bytes(),
                Event::Text(t) if inside => out.push(t.unescape().unwrap().into_owned()),
                Event::End(_) => inside = false,
                Event::Eof => break,
                _ => {}
            }
        }
        out
    }

    #[test]
    fn test_item_enclosure_and_guid() {
        let xml = FeedBuilder::default()
            .build(&[episode("ep1.mp3", 12345, 1_720_000_000)])
            .unwrap();

        assert!(xml.contains(r#"length="12345""#));
        assert!(xml.contains(r#"type="audio/mpeg""#));
        let guids = texts_of(&xml, "guid");
        assert_eq!(guids.len(), 1);
        assert!(guids[0].ends_with("episodes/ep1.mp3"));
        assert_eq!(
            guids[0],
            "https://youthlenstoday.github.io/podcast/episodes/ep1.mp3"
        );
        assert!(xml.contains(r#"url="https://youthlenstoday.github.io/podcast/episodes/ep1.mp3""#));
    }

    #[test]
    fn test_item_title_and_pub_date() {
        let xml = FeedBuilder::default()
            .build(&[episode("Youth_Lens_Today_20240701_120000.mp3", 1, 1_719_835_200)])
            .unwrap();

        let titles = texts_of(&xml, "title");
        // Channel title, image title, then the item.
        assert_eq!(titles.last().unwrap(), "Youth_Lens_Today_20240701_120000");
        assert_eq!(
            texts_of(&xml, "pubDate"),
            vec!["Mon, 01 Jul 2024 12:00:00 +0000".to_string()]
        );
        assert_eq!(texts_of(&xml, "itunes:duration"), vec!["00:00:00".to_string()]);
    }

    #[test]
    fn test_items_keep_given_order() {
        let entries = vec![
            episode("new.mp3", 1, 300),
            episode("old.mp3", 1, 100),
            episode("middle.mp3", 1, 200),
        ];
        let xml = FeedBuilder::default().build(&entries).unwrap();
        let guids = texts_of(&xml, "guid");
        assert_eq!(guids.len(), 3);
        assert!(guids[0].ends_with("new.mp3"));
        assert!(guids[1].ends_with("old.mp3"));
        assert!(guids[2].ends_with("middle.mp3"));
    }

    #[test]
    fn test_channel_header() {
        let xml = FeedBuilder::default().build(&[]).unwrap();
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd""#));
        assert!(xml.contains(
            r#"<atom:link href="https://youthlenstoday.github.io/podcast/rss.xml" rel="self" type="application/rss+xml"/>"#
        ));
        assert_eq!(
            texts_of(&xml, "itunes:author"),
            vec!["Nathan Goldberg, Jonah Herman".to_string()]
        );
        assert_eq!(texts_of(&xml, "itunes:explicit"), vec!["no".to_string()]);
        assert_eq!(xml.matches("<itunes:category ").count(), 3);
        assert!(xml.contains(r#"<itunes:category text="Politics"/>"#));
        assert_eq!(texts_of(&xml, "language"), vec!["en-us".to_string()]);
    }

    #[test]
    fn test_text_is_escaped() {
        let channel = ChannelConfig {
            title: "News & Views <Live>".to_string(),
            ..ChannelConfig::default()
        };
        let xml = FeedBuilder::new(channel)
            .build(&[episode("Q&A.mp3", 1, 0)])
            .unwrap();
        assert!(xml.contains("News &amp; Views &lt;Live&gt;"));
        assert!(!xml.contains("Q&A"));
        assert_eq!(texts_of(&xml, "title")[0], "News & Views <Live>");
    }

    #[test]
    fn test_episode_url_slashes() {
        let channel = ChannelConfig {
            base_url: "https://example.com/show".to_string(),
            episodes_path: "/episodes/".to_string(),
            ..ChannelConfig::default()
        };
        assert_eq!(
            channel.episode_url("a.mp3"),
            "https://example.com/show/episodes/a.mp3"
        );
    }

    #[test]
    fn test_rebuild_feed_writes_file() {
        let root = tempfile::tempdir().unwrap();
        let episodes_dir = root.path().join("episodes");
        std::fs::create_dir(&episodes_dir).unwrap();
        write_episode(&episodes_dir, "first.mp3", 100, 1_700_000_000);
        write_episode(&episodes_dir, "second.mp3", 200, 1_700_100_000);
        let feed_path = root.path().join("rss.xml");

        let outcome = rebuild_feed(
            &EpisodeCatalog::default(),
            &FeedBuilder::default(),
            &episodes_dir,
            &feed_path,
        )
        .unwrap();
        assert_eq!(outcome, FeedOutcome::Written { episodes: 2 });

        let xml = std::fs::read_to_string(&feed_path).unwrap();
        let guids = texts_of(&xml, "guid");
        assert!(guids[0].ends_with("episodes/second.mp3"));
        assert!(guids[1].ends_with("episodes/first.mp3"));

        // Rebuilding from the same directory gives the same document.
        rebuild_feed(
            &EpisodeCatalog::default(),
            &FeedBuilder::default(),
            &episodes_dir,
            &feed_path,
        )
        .unwrap();
        assert_eq!(std::fs::read_to_string(&feed_path).unwrap(), xml);
    }

    #[cfg(unix)]
    fn mode_of(path: &Path) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[cfg(unix)]
    #[test]
    fn test_rebuild_feed_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        write_episode(root.path(), "a.mp3", 1, 1_700_000_000);
        let feed_path = root.path().join("rss.xml");

        // A first write creates a world-readable feed.
        rebuild_feed(
            &EpisodeCatalog::default(),
            &FeedBuilder::default(),
            root.path(),
            &feed_path,
        )
        .unwrap();
        assert_eq!(mode_of(&feed_path), 0o644);

        // An existing mode survives the rebuild.
        std::fs::set_permissions(&feed_path, std::fs::Permissions::from_mode(0o664)).unwrap();
        rebuild_feed(
            &EpisodeCatalog::default(),
            &FeedBuilder::default(),
            root.path(),
            &feed_path,
        )
        .unwrap();
        assert_eq!(mode_of(&feed_path), 0o664);
    }

    #[test]
    fn test_rebuild_feed_empty_catalog_leaves_feed_alone() {
        let root = tempfile::tempdir().unwrap();
        let episodes_dir = root.path().join("episodes");
        std::fs::create_dir(&episodes_dir).unwrap();
        let feed_path = root.path().join("rss.xml");
        std::fs::write(&feed_path, "previous").unwrap();

        let outcome = rebuild_feed(
            &EpisodeCatalog::default(),
            &FeedBuilder::default(),
            &episodes_dir,
            &feed_path,
        )
        .unwrap();
        assert_eq!(outcome, FeedOutcome::NoEpisodes);
        assert_eq!(std::fs::read_to_string(&feed_path).unwrap(), "previous");
    }

    #[test]
    fn test_rebuild_feed_unwritable_target_is_io_error() {
        let root = tempfile::tempdir().unwrap();
        write_episode(root.path(), "a.mp3", 1, 1_700_000_000);
        let feed_path = root.path().join("missing").join("rss.xml");

        let err = rebuild_feed(
            &EpisodeCatalog::default(),
            &FeedBuilder::default(),
            root.path(),
            &feed_path,
        )
        .unwrap_err();
        assert!(matches!(err, PodcastError::Io { .. }));
        assert!(!feed_path.exists());
    }
}
