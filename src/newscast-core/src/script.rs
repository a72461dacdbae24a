//! Splitting a combined two-host script into per-host segments.
//!
//! The generation step is asked to emit `HALF 1:` ... `HALF 2:` ... and
//! usually does. When it doesn't, the script is cut in half by lines and the
//! result is marked as degraded so the caller can report it.

use serde::{Deserialize, Serialize};

use crate::host::{HostId, HostSegment};

pub const FIRST_MARKER: &str = "HALF 1:";
pub const SECOND_MARKER: &str = "HALF 2:";

/// Marker tokens delimiting the two halves of a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptMarkers {
    pub first_marker: String,
    pub second_marker: String,
}

impl Default for ScriptMarkers {
    fn default() -> Self {
        Self {
            first_marker: FIRST_MARKER.to_string(),
            second_marker: SECOND_MARKER.to_string(),
        }
    }
}

impl ScriptMarkers {
    /// Join two host scripts into the combined form the partitioner expects.
    pub fn combine(&self, first: &str, second: &str) -> String {
        format!(
            "{}\n\n{}\n\n{}\n\n{}",
            self.first_marker, first, self.second_marker, second
        )
    }
}

/// Outcome of splitting a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Partition {
    /// Both markers were found and the split was unambiguous.
    Marked {
        first: HostSegment,
        second: HostSegment,
    },
    /// Markers missing or repeated; the script was cut at the middle line.
    Positional {
        first: HostSegment,
        second: HostSegment,
    },
}

impl Partition {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Partition::Positional { .. })
    }

    pub fn first(&self) -> &HostSegment {
        match self {
            Partition::Marked { first, .. } | Partition::Positional { first, .. } => first,
        }
    }

    pub fn second(&self) -> &HostSegment {
        match self {
            Partition::Marked { second, .. } | Partition::Positional { second, .. } => second,
        }
    }

    pub fn into_segments(self) -> (HostSegment, HostSegment) {
        match self {
            Partition::Marked { first, second } | Partition::Positional { first, second } => {
                (first, second)
            }
        }
    }
}

/// Splits scripts on configurable marker tokens.
#[derive(Debug, Clone, Default)]
pub struct ScriptPartitioner {
    markers: ScriptMarkers,
}

impl ScriptPartitioner {
    pub fn new(markers: ScriptMarkers) -> Self {
        Self { markers }
    }

    pub fn markers(&self) -> &ScriptMarkers {
        &self.markers
    }

    /// Split `script` into the two host segments. Never fails.
    pub fn partition(&self, script: &str) -> Partition {
        if let Some((first, second)) = self.split_on_markers(script) {
            return Partition::Marked {
                first: HostSegment::new(HostId::First, first),
                second: HostSegment::new(HostId::Second, second),
            };
        }

        tracing::warn!(
            "{}/{} markers not found, splitting script by line count",
            self.markers.first_marker,
            self.markers.second_marker
        );

        let lines: Vec<&str> = script.split('\n').collect();
        let mid = lines.len() / 2;
        Partition::Positional {
            first: HostSegment::new(HostId::First, lines[..mid].join("\n").trim()),
            second: HostSegment::new(HostId::Second, lines[mid..].join("\n").trim()),
        }
    }

    fn split_on_markers(&self, script: &str) -> Option<(String, String)> {
        let first_marker = self.markers.first_marker.as_str();
        let second_marker = self.markers.second_marker.as_str();
        if first_marker.is_empty() || second_marker.is_empty() {
            return None;
        }
        if !script.contains(first_marker) || !script.contains(second_marker) {
            return None;
        }

        let parts: Vec<&str> = script.split(second_marker).collect();
        if parts.len() != 2 {
            return None;
        }

        let first = parts[0].replace(first_marker, "").trim().to_string();
        let second = parts[1].trim().to_string();
        Some((first, second))
    }
}

/// Split with the default `HALF 1:` / `HALF 2:` markers.
pub fn partition(script: &str) -> Partition {
    ScriptPartitioner::default().partition(script)
}
