//! Podcast host definitions.
//!
//! An episode always has exactly two hosts: the first opens the show and
//! covers the lead story, the second covers the remaining stories and closes.

use serde::{Deserialize, Serialize};

/// Which half of the episode a host owns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum HostId {
    /// Opens the episode (intro and first story).
    First,
    /// Closes the episode (remaining stories and outro).
    Second,
}

impl HostId {
    /// Zero-based position, used to index per-host configuration.
    pub fn index(&self) -> usize {
        match self {
            HostId::First => 0,
            HostId::Second => 1,
        }
    }

    pub fn other(&self) -> HostId {
        match self {
            HostId::First => HostId::Second,
            HostId::Second => HostId::First,
        }
    }
}

/// A presenter with a synthesis voice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    /// Display name, also used in intermediate audio file names.
    pub name: String,
    /// Voice identifier understood by the speech provider.
    pub voice_id: String,
    /// Environment variable holding this host's synthesis API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl Host {
    pub fn new(name: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            voice_id: voice_id.into(),
            api_key_env: None,
        }
    }

    /// Set the environment variable that carries the API key.
    pub fn with_api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = Some(var.into());
        self
    }

    /// Name with spaces replaced, suitable for file names.
    pub fn file_stem(&self) -> String {
        self.name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .collect()
    }
}

/// A sanitized (or raw, before sanitizing) block of script owned by one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSegment {
    pub host: HostId,
    pub body: String,
}

impl HostSegment {
    pub fn new(host: HostId, body: impl Into<String>) -> Self {
        Self {
            host,
            body: body.into(),
        }
    }

    /// Length in characters (not bytes).
    pub fn char_len(&self) -> usize {
        self.body.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.body.trim().is_empty()
    }
}
