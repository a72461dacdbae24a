//! Configuration module for loading TOML config files.
//!
//! Every table is optional; anything left out falls back to the built-in
//! Youth Lens Today defaults. API keys never live here, they come from the
//! environment.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::EpisodeCatalog;
use crate::error::PodcastError;
use crate::feed::{ChannelConfig, FeedBuilder};
use crate::host::{Host, HostId};
use crate::sanitizer::{SanitizeRules, TextSanitizer};
use crate::script::{ScriptMarkers, ScriptPartitioner};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub show: ChannelConfig,
    pub hosts: HostsConfig,
    pub generation: GenerationConfig,
    pub speech: SpeechConfig,
    pub paths: PathsConfig,
    pub script: ScriptMarkers,
    pub cleaning: SanitizeRules,
}

/// The two presenters, in speaking order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostsConfig {
    pub first: Host,
    pub second: Host,
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            first: Host::new("Nathan Goldberg", "iw4PJTWp4tOErnqySu4l")
                .with_api_key_env("ELEVENLABS_API_KEY_1"),
            second: Host::new("Jonah Herman", "SzvGngFCMygUr9c1lyUW")
                .with_api_key_env("ELEVENLABS_API_KEY_2"),
        }
    }
}

/// Text generation settings and prompt templates.
///
/// Templates may use `{show}`, `{date}`, `{outline}`, `{name}` and
/// `{partner}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    pub outline_max_tokens: u32,
    pub script_max_tokens: u32,
    pub researcher_prompt: String,
    pub outline_prompt: String,
    pub host_system_prompt: String,
    pub first_host_prompt: String,
    pub second_host_prompt: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-search-preview".to_string(),
            outline_max_tokens: 2000,
            script_max_tokens: 5000,
            researcher_prompt: DEFAULT_RESEARCHER_PROMPT.to_string(),
            outline_prompt: DEFAULT_OUTLINE_PROMPT.to_string(),
            host_system_prompt: DEFAULT_HOST_SYSTEM_PROMPT.to_string(),
            first_host_prompt: DEFAULT_FIRST_HOST_PROMPT.to_string(),
            second_host_prompt: DEFAULT_SECOND_HOST_PROMPT.to_string(),
        }
    }
}

/// Which speech backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechProvider {
    /// Hosted ElevenLabs voices (MP3 output).
    ElevenLabs,
    /// Local kokoro-tiny engine (WAV output).
    Kokoro,
}

/// Speech synthesis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub provider: SpeechProvider,
    pub api_base: String,
    pub model_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
    /// Playback rate applied to local synthesis output.
    pub speed: f32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            provider: SpeechProvider::ElevenLabs,
            api_base: "https://api.elevenlabs.io/v1".to_string(),
            model_id: "eleven_monolingual_v1".to_string(),
            stability: 0.5,
            similarity_boost: 0.5,
            speed: 1.0,
        }
    }
}

/// Where episodes, the feed and intermediate files live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub episodes_dir: PathBuf,
    pub feed_path: PathBuf,
    pub work_dir: PathBuf,
    /// Prefix of the final episode file name; a timestamp follows.
    pub file_prefix: String,
    pub extension: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            episodes_dir: PathBuf::from("episodes"),
            feed_path: PathBuf::from("rss.xml"),
            work_dir: PathBuf::from("."),
            file_prefix: "Youth_Lens_Today_".to_string(),
            extension: "mp3".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PodcastError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| PodcastError::Config(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, PodcastError> {
        toml::from_str(content)
            .map_err(|e| PodcastError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn host(&self, id: HostId) -> &Host {
        match id {
            HostId::First => &self.hosts.first,
            HostId::Second => &self.hosts.second,
        }
    }

    /// Get the script prompt for a host, with placeholders replaced.
    pub fn host_prompt(&self, id: HostId, outline: &str, date: &str) -> String {
        let template = match id {
            HostId::First => &self.generation.first_host_prompt,
            HostId::Second => &self.generation.second_host_prompt,
        };
        self.fill(template, id, outline, date)
    }

    /// Get the system prompt for a host.
    pub fn host_system_prompt(&self, id: HostId, date: &str) -> String {
        self.fill(&self.generation.host_system_prompt, id, "", date)
    }

    pub fn outline_prompt(&self, date: &str) -> String {
        self.generation
            .outline_prompt
            .replace("{show}", &self.show.title)
            .replace("{date}", date)
    }

    fn fill(&self, template: &str, id: HostId, outline: &str, date: &str) -> String {
        template
            .replace("{show}", &self.show.title)
            .replace("{date}", date)
            .replace("{name}", &self.host(id).name)
            .replace("{partner}", &self.host(id.other()).name)
            .replace("{outline}", outline)
    }

    pub fn sanitizer(&self) -> Result<TextSanitizer, PodcastError> {
        TextSanitizer::new(self.cleaning.clone())
    }

    pub fn partitioner(&self) -> ScriptPartitioner {
        ScriptPartitioner::new(self.script.clone())
    }

    pub fn feed_builder(&self) -> FeedBuilder {
        FeedBuilder::new(self.show.clone())
    }

    pub fn catalog(&self) -> EpisodeCatalog {
        EpisodeCatalog::new(self.paths.extension.clone())
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config::default()
}

const DEFAULT_RESEARCHER_PROMPT: &str = "You are a news researcher. Use web search to find the most recent, current news from the past week.";

const DEFAULT_OUTLINE_PROMPT: &str = r#"Research the most recent news from the past 3-7 days and create a detailed outline for a podcast episode.

REQUIREMENTS:
- Use web search to find CURRENT news from the past week
- Focus on 3 main stories: US domestic politics/economics/law, international story, and offbeat policy story
- Include specific dates, names, and details from recent news
- Provide detailed context and implications for each story
- Use the current date ({date})

OUTLINE FORMAT:
1. US Domestic Story: [Title] - [Brief description with current details]
2. International Story: [Title] - [Brief description with current details]
3. Offbeat Story: [Title] - [Brief description with current details]

For each story, include:
- What happened (with specific dates and details)
- Why it matters
- Key players involved
- Potential implications
- Current status/developments

Make sure all stories are from the past week and include current, specific details."#;

const DEFAULT_HOST_SYSTEM_PROMPT: &str =
    "You are {name}, a podcast host on {show}. Write detailed, engaging content (4,000+ characters).";

const DEFAULT_FIRST_HOST_PROMPT: &str = r#"Write {name}'s portion of a podcast script (4,000+ characters) for {show}.

CURRENT OUTLINE:
{outline}

REQUIREMENTS:
- Write as {name} (first person)
- Brief intro (1 paragraph): welcome listeners, state current date, summarize the 3 stories
- Cover the FIRST story from the outline in detail (2,000+ chars)
- Include transition to the second story
- Use current date ({date})
- NO dialogue format - write as monologue
- NO stage directions
- NO markdown formatting (no **bold**, *italic*, or headers)
- NO section titles or headers
- NO bullet points or lists (no "-" or "*" at start of lines)
- NO repetition of sentences or paragraphs
- NO source citations or links (no parentheses with URLs)
- Focus on serious news analysis with context, background, and implications
- Use natural, conversational tone

FORMAT: Write as a flowing narrative that ends with a transition to {partner}'s portion. Write everything in paragraph form."#;

const DEFAULT_SECOND_HOST_PROMPT: &str = r#"Write {name}'s portion of a podcast script (4,000+ characters) for {show}.

CURRENT OUTLINE:
{outline}

REQUIREMENTS:
- Write as {name} (first person)
- Cover the SECOND and THIRD stories from the outline in detail (2,500+ chars)
- Include brief outro (1 paragraph): reflect on all stories, ask listeners to follow
- Use current date ({date})
- NO dialogue format - write as monologue
- NO stage directions
- NO markdown formatting (no **bold**, *italic*, or headers)
- NO section titles or headers
- NO bullet points or lists (no "-" or "*" at start of lines)
- NO repetition of sentences or paragraphs
- NO source citations or links (no parentheses with URLs)
- Focus on serious news analysis with context, background, and implications
- Use natural, conversational tone
- End with both hosts signing off

FORMAT: Write as a flowing narrative that continues from {partner}'s portion and concludes the episode. Write everything in paragraph form."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.show.title, "Youth Lens Today");
        assert_eq!(config.hosts.first.name, "Nathan Goldberg");
        assert_eq!(config.speech.provider, SpeechProvider::ElevenLabs);
        assert_eq!(config.script.first_marker, "HALF 1:");
        assert_eq!(config.paths.episodes_dir, PathBuf::from("episodes"));
        assert_eq!(config.cleaning, SanitizeRules::default());
    }

    #[test]
    fn test_partial_tables() {
        let config = Config::from_str(
            r#"
            [show]
            title = "Morning Brief"
            categories = ["News"]

            [speech]
            provider = "kokoro"

            [hosts.second]
            name = "Ada"
            voice_id = "bf_emma"

            [cleaning]
            structural_tokens = ["[MUSIC]"]
            "#,
        )
        .unwrap();

        assert_eq!(config.show.title, "Morning Brief");
        assert_eq!(config.show.language, "en-us");
        assert_eq!(config.show.categories, vec!["News".to_string()]);
        assert_eq!(config.speech.provider, SpeechProvider::Kokoro);
        assert_eq!(config.speech.model_id, "eleven_monolingual_v1");
        assert_eq!(config.hosts.first.name, "Nathan Goldberg");
        assert_eq!(config.hosts.second.name, "Ada");
        assert_eq!(config.hosts.second.api_key_env, None);
        assert_eq!(config.cleaning.structural_tokens, vec!["[MUSIC]".to_string()]);
        assert_eq!(config.cleaning.min_sentence_len, 10);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_str("[show\ntitle = 1").unwrap_err();
        assert!(matches!(err, PodcastError::Config(_)));
    }

    #[test]
    fn test_host_prompt_placeholders() {
        let config = default_config();
        let prompt = config.host_prompt(HostId::First, "1. Story", "July 2024");
        assert!(prompt.contains("Write Nathan Goldberg's portion"));
        assert!(prompt.contains("1. Story"));
        assert!(prompt.contains("(July 2024)"));
        assert!(prompt.contains("transition to Jonah Herman's portion"));
        assert!(!prompt.contains('{'));

        let system = config.host_system_prompt(HostId::Second, "July 2024");
        assert!(system.starts_with("You are Jonah Herman, a podcast host on Youth Lens Today."));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, PodcastError::Config(_)));
    }
}
