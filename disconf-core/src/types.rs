//! Domain types for the configuration mirror.
//!
//! Paths in the coordination service are plain `/`-separated strings; local
//! filesystem paths stay `PathBuf` and live in [`crate::options`].

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Whether a key names a whole property file or a single config item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigKind {
    File,
    Item,
}

impl ConfigKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKind::File => "file",
            ConfigKind::Item => "item",
        }
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConfigKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(ConfigKind::File),
            "item" => Ok(ConfigKind::Item),
            other => Err(format!("unknown config kind '{other}'; expected: file, item")),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One watched configuration entry. Identity is `(kind, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigKey {
    pub kind: ConfigKind,
    pub name: String,
}

impl ConfigKey {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            kind: ConfigKind::File,
            name: name.into(),
        }
    }

    pub fn item(name: impl Into<String>) -> Self {
        Self {
            kind: ConfigKind::Item,
            name: name.into(),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

/// Application coordinates shared by every request and coordination path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
    pub app: String,
    pub version: String,
    pub env: String,
}

impl AppIdentity {
    /// `<app>_<version>_<env>`, the per-deployment segment of a coordination path.
    pub fn segment(&self) -> String {
        format!("{}_{}_{}", self.app, self.version, self.env)
    }
}

/// Location of a key's persistent node: `<prefix>/<app>_<version>_<env>/<kind>/<name>`.
///
/// Built once per node and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoordinationPath(String);

impl CoordinationPath {
    pub fn new(prefix: &str, identity: &AppIdentity, key: &ConfigKey) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self(format!(
            "{prefix}/{}/{}/{}",
            identity.segment(),
            key.kind,
            key.name
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base path for an ephemeral child node; the store appends a sequence suffix.
    pub fn child(&self, name: &str) -> String {
        format!("{}/{name}", self.0)
    }
}

impl fmt::Display for CoordinationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Retry policy for the HTTP fetch layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    /// Extra attempts per host after the first one.
    pub retry_times_per_host: u32,
    /// Fixed pause after each failed attempt.
    pub retry_sleep: Duration,
}

impl FetchConfig {
    /// Attempts made against one host before moving on.
    pub fn attempts_per_host(&self) -> u32 {
        self.retry_times_per_host.saturating_add(1)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retry_times_per_host: 3,
            retry_sleep: Duration::from_secs(5),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
