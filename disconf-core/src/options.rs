//! Client option table and bootstrap-file loading.
//!
//! # Storage layout
//!
//! ```text
//! <base>/                      (default: <cwd>/config)
//!   disconf.properties         bootstrap options (optional)
//!   remote.properties          merged destination file (default `dist_file`)
//!   download/                  per-key raw payloads (default download dir)
//! ```
//!
//! # Precedence
//!
//! Each option resolves independently: explicit value > bootstrap file >
//! built-in default. The resolved table remembers where every value came from.
//!
//! # API pattern
//!
//! - `fn_at(base: &Path, …)`: explicit base directory; used in tests with `TempDir`
//! - `fn(…)`: derives the base from the current directory, delegates to `_at`

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::error::{io_err, ConfigError};
use crate::properties::{self, Properties};
use crate::types::{AppIdentity, ConfigKey, FetchConfig};

pub const DEFAULT_CONFIG_DIR: &str = "config";
pub const DEFAULT_BOOTSTRAP_FILE: &str = "disconf.properties";

/// Option keys as they appear in the bootstrap file and on the command line.
pub mod keys {
    pub const ENABLE_REMOTE: &str = "enable_remote";
    pub const DIST_FILE: &str = "dist_file";
    pub const CONF_FILE_NAME: &str = "conf_file_name";
    pub const CONF_ITEM_NAME: &str = "conf_item_name";
    pub const CONF_SERVER_HOST: &str = "conf_server_host";
    pub const APP: &str = "app";
    pub const VERSION: &str = "version";
    pub const ENV: &str = "env";
    pub const DEBUG: &str = "debug";
    pub const IGNORE: &str = "ignore";
    pub const RETRY_TIMES: &str = "conf_server_url_retry_times";
    pub const RETRY_SLEEP_SECONDS: &str = "conf_server_url_retry_sleep_seconds";
    pub const DOWNLOAD_DIR: &str = "user_define_download_dir";

    pub const ALL: [&str; 13] = [
        ENABLE_REMOTE,
        DIST_FILE,
        CONF_FILE_NAME,
        CONF_ITEM_NAME,
        CONF_SERVER_HOST,
        APP,
        VERSION,
        ENV,
        DEBUG,
        IGNORE,
        RETRY_TIMES,
        RETRY_SLEEP_SECONDS,
        DOWNLOAD_DIR,
    ];
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Where a resolved option value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionSource {
    Explicit,
    File,
    Default,
}

impl std::fmt::Display for OptionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionSource::Explicit => write!(f, "explicit"),
            OptionSource::File => write!(f, "file"),
            OptionSource::Default => write!(f, "default"),
        }
    }
}

/// Typed client options.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientOptions {
    /// When false the client reports ready immediately without any remote work.
    pub enable_remote: bool,
    /// Merged destination file.
    pub dist_file: PathBuf,
    #[serde(rename = "conf_file_name")]
    pub file_names: Vec<String>,
    #[serde(rename = "conf_item_name")]
    pub item_names: Vec<String>,
    /// Comma-separated config server hosts, kept verbatim.
    #[serde(rename = "conf_server_host")]
    pub server_hosts: String,
    pub app: String,
    pub version: String,
    pub env: String,
    pub debug: bool,
    pub ignore: Vec<String>,
    #[serde(rename = "conf_server_url_retry_times")]
    pub retry_times: u32,
    #[serde(rename = "conf_server_url_retry_sleep_seconds")]
    pub retry_sleep_seconds: f64,
    #[serde(rename = "user_define_download_dir")]
    pub download_dir: PathBuf,
}

impl ClientOptions {
    /// Built-in defaults rooted at `base`.
    pub fn defaults_at(base: &Path) -> Result<Self, ConfigError> {
        resolve_at(base, None, &Properties::new()).map(|loaded| loaded.options)
    }

    pub fn identity(&self) -> AppIdentity {
        AppIdentity {
            app: self.app.clone(),
            version: self.version.clone(),
            env: self.env.clone(),
        }
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            retry_times_per_host: self.retry_times,
            retry_sleep: Duration::try_from_secs_f64(self.retry_sleep_seconds)
                .unwrap_or(Duration::MAX),
        }
    }

    /// Keys to watch: files first, then items, skipping empty and ignored
    /// names. Duplicate `(kind, name)` pairs collapse to the first one.
    pub fn watch_set(&self) -> Vec<ConfigKey> {
        let ignored: HashSet<&str> = self.ignore.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        let files = self.file_names.iter().map(ConfigKey::file);
        let items = self.item_names.iter().map(ConfigKey::item);
        files
            .chain(items)
            .filter(|key| !key.name.is_empty() && !ignored.contains(key.name.as_str()))
            .filter(|key| seen.insert(key.clone()))
            .collect()
    }

    /// Checks the options remote mode cannot run without.
    pub fn require_remote(&self) -> Result<(), ConfigError> {
        if self.app.trim().is_empty() {
            return Err(ConfigError::Missing(keys::APP));
        }
        Ok(())
    }
}

/// One resolved option with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedOption {
    pub key: String,
    pub value: String,
    pub source: OptionSource,
}

/// Result of loading options: the typed table plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedOptions {
    pub options: ClientOptions,
    /// The bootstrap file that was read, if one existed.
    pub bootstrap_file: Option<PathBuf>,
    /// Every known option in [`keys::ALL`] order.
    pub resolved: Vec<ResolvedOption>,
}

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<cwd>/config`
pub fn default_base_dir() -> Result<PathBuf, ConfigError> {
    let cwd = std::env::current_dir().map_err(|e| io_err(".", e))?;
    Ok(cwd.join(DEFAULT_CONFIG_DIR))
}

/// `<base>/<file_name>`: pure, no I/O.
pub fn bootstrap_path_at(base: &Path, file_name: &str) -> PathBuf {
    base.join(file_name)
}

fn default_layer(base: &Path) -> Properties {
    [
        (keys::ENABLE_REMOTE, "false".to_string()),
        (
            keys::DIST_FILE,
            base.join("remote.properties").display().to_string(),
        ),
        (keys::CONF_FILE_NAME, "demo.properties,system.properties".into()),
        (keys::CONF_ITEM_NAME, "node_demo".into()),
        (keys::CONF_SERVER_HOST, String::new()),
        (keys::APP, String::new()),
        (keys::VERSION, "DEFAULT_VERSION".into()),
        (keys::ENV, "DEFAULT_ENV".into()),
        (keys::DEBUG, "true".into()),
        (keys::IGNORE, "demo.properties".into()),
        (keys::RETRY_TIMES, "3".into()),
        (keys::RETRY_SLEEP_SECONDS, "5".into()),
        (keys::DOWNLOAD_DIR, base.join("download").display().to_string()),
    ]
    .into_iter()
    .collect()
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Read `<base>/<file_name>` (if present) and resolve it against `explicit`
/// and the defaults.
///
/// A missing bootstrap file is not an error; `bootstrap_file` is `None` then.
pub fn load_at(
    base: &Path,
    file_name: &str,
    explicit: &Properties,
) -> Result<LoadedOptions, ConfigError> {
    let path = bootstrap_path_at(base, file_name);
    if !path.exists() {
        return resolve_at(base, None, explicit);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let file_layer = properties::parse(&contents);
    let mut loaded = resolve_at(base, Some(&file_layer), explicit)?;
    loaded.bootstrap_file = Some(path);
    Ok(loaded)
}

/// `load_at` convenience wrapper rooted at `<cwd>/config`.
pub fn load(file_name: &str, explicit: &Properties) -> Result<LoadedOptions, ConfigError> {
    load_at(&default_base_dir()?, file_name, explicit)
}

/// Resolve the three layers without touching the filesystem.
pub fn resolve_at(
    base: &Path,
    file_layer: Option<&Properties>,
    explicit: &Properties,
) -> Result<LoadedOptions, ConfigError> {
    let defaults = default_layer(base);
    let mut resolved = Vec::with_capacity(keys::ALL.len());

    for key in keys::ALL {
        let (value, source) = if let Some(v) = explicit.get(key) {
            (v, OptionSource::Explicit)
        } else if let Some(v) = file_layer.and_then(|f| f.get(key)) {
            (v, OptionSource::File)
        } else {
            (defaults.get(key).unwrap_or_default(), OptionSource::Default)
        };
        resolved.push(ResolvedOption {
            key: key.to_string(),
            value: value.to_string(),
            source,
        });
    }

    let get = |key: &str| -> &str {
        resolved
            .iter()
            .find(|r| r.key == key)
            .map(|r| r.value.as_str())
            .unwrap_or_default()
    };

    let options = ClientOptions {
        enable_remote: parse_bool(keys::ENABLE_REMOTE, get(keys::ENABLE_REMOTE))?,
        dist_file: PathBuf::from(get(keys::DIST_FILE).trim()),
        file_names: split_list(get(keys::CONF_FILE_NAME)),
        item_names: split_list(get(keys::CONF_ITEM_NAME)),
        server_hosts: get(keys::CONF_SERVER_HOST).trim().to_string(),
        app: get(keys::APP).trim().to_string(),
        version: get(keys::VERSION).trim().to_string(),
        env: get(keys::ENV).trim().to_string(),
        debug: parse_bool(keys::DEBUG, get(keys::DEBUG))?,
        ignore: split_list(get(keys::IGNORE)),
        retry_times: parse_u32(keys::RETRY_TIMES, get(keys::RETRY_TIMES))?,
        retry_sleep_seconds: parse_seconds(
            keys::RETRY_SLEEP_SECONDS,
            get(keys::RETRY_SLEEP_SECONDS),
        )?,
        download_dir: PathBuf::from(get(keys::DOWNLOAD_DIR).trim()),
    };

    Ok(LoadedOptions {
        options,
        bootstrap_file: None,
        resolved,
    })
}

// ---------------------------------------------------------------------------
// 3. Value parsing
// ---------------------------------------------------------------------------

/// Split a comma-separated list, trimming entries and dropping empties.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn invalid(key: &str, value: &str, reason: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason,
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, raw, "expected a boolean")),
    }
}

fn parse_u32(key: &str, raw: &str) -> Result<u32, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| invalid(key, raw, "expected a non-negative integer"))
}

/// Seconds must fit a [`Duration`].
fn parse_seconds(key: &str, raw: &str) -> Result<f64, ConfigError> {
    match raw.trim().parse::<f64>() {
        Ok(secs) if Duration::try_from_secs_f64(secs).is_ok() => Ok(secs),
        _ => Err(invalid(key, raw, "expected a non-negative number of seconds")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
