//! Plan and state documents.
//!
//! Both are JSON objects keyed by resource address, the caller-chosen name
//! that identifies a resource across runs.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use pcloud_core::{DesiredResource, TrackedState};
use serde::{Deserialize, Serialize};

const STATE_VERSION: u32 = 1;

/// Desired resources, as written by the operator.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    #[serde(default)]
    pub resources: BTreeMap<String, DesiredResource>,
}

impl Plan {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading plan {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing plan {}", path.display()))
    }
}

/// Tracked resources, as left behind by the previous run.
#[derive(Debug, Serialize, Deserialize)]
pub struct State {
    pub version: u32,
    #[serde(default)]
    pub resources: BTreeMap<String, TrackedState>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            resources: BTreeMap::new(),
        }
    }
}

impl State {
    /// Load state from `path`. A missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no state file yet, starting empty");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading state {}", path.display()));
            }
        };
        let state: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing state {}", path.display()))?;
        if state.version != STATE_VERSION {
            bail!(
                "state {} has version {}, expected {STATE_VERSION}",
                path.display(),
                state.version
            );
        }
        Ok(state)
    }

    /// Write state to `path` through a sibling temporary file, so a crash
    /// never leaves a half-written state behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("serializing state")?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json + "\n")
            .with_context(|| format!("writing state {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("replacing state {}", path.display()))?;
        Ok(())
    }
}
