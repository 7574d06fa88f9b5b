//! Registry HTTP API: bootstrap discovery and per-key payload lookup.
//!
//! | path               | response                               |
//! |--------------------|----------------------------------------|
//! | `/api/zoo/hosts`   | `{status, message, value: "h1,h2"}`    |
//! | `/api/zoo/prefix`  | `{status, message, value: "/disconf"}` |
//! | `/api/config/file` | raw file text                          |
//! | `/api/config/item` | `{status, message, value}`             |

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

use disconf_core::{AppIdentity, ConfigError, ConfigKey, ConfigKind};

use crate::error::SyncError;
use crate::fetcher::HttpFetcher;

pub const ZOO_HOSTS_PATH: &str = "/api/zoo/hosts";
pub const ZOO_PREFIX_PATH: &str = "/api/zoo/prefix";
pub const CONFIG_FILE_PATH: &str = "/api/config/file";
pub const CONFIG_ITEM_PATH: &str = "/api/config/item";

/// Unreserved characters stay literal; everything else is escaped.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Where the coordination service lives, as announced by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapInfo {
    /// Comma-separated coordination hosts.
    pub hosts: String,
    /// Root path under which every application's nodes live.
    pub prefix: String,
}

#[derive(Debug, Clone)]
pub struct RegistryApi {
    fetcher: HttpFetcher,
    identity: AppIdentity,
}

impl RegistryApi {
    pub fn new(fetcher: HttpFetcher, identity: AppIdentity) -> Self {
        Self { fetcher, identity }
    }

    pub fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    /// Resolve coordination hosts and the root prefix, in that order.
    pub async fn bootstrap(&self) -> Result<BootstrapInfo, SyncError> {
        let hosts = self.bootstrap_value(ZOO_HOSTS_PATH).await?;
        let prefix = self.bootstrap_value(ZOO_PREFIX_PATH).await?;
        tracing::info!(hosts = %hosts, prefix = %prefix, "resolved coordination service");
        Ok(BootstrapInfo { hosts, prefix })
    }

    async fn bootstrap_value(&self, path: &'static str) -> Result<String, SyncError> {
        let body = self.fetcher.fetch(path).await?;
        body.value_text().ok_or_else(|| {
            ConfigError::MissingField {
                path: path.to_string(),
                field: "value",
            }
            .into()
        })
    }

    /// Request path (with encoded query) for one key's payload.
    pub fn config_path(&self, key: &ConfigKey) -> String {
        let base = match key.kind {
            ConfigKind::File => CONFIG_FILE_PATH,
            ConfigKind::Item => CONFIG_ITEM_PATH,
        };
        let enc = |s: &str| utf8_percent_encode(s, QUERY_VALUE).to_string();
        format!(
            "{base}?app={}&version={}&env={}&key={}",
            enc(&self.identity.app),
            enc(&self.identity.version),
            enc(&self.identity.env),
            enc(&key.name),
        )
    }

    /// The authoritative payload text for `key`.
    ///
    /// Files come back verbatim; items are unwrapped from their envelope.
    pub async fn config_payload(&self, key: &ConfigKey) -> Result<String, SyncError> {
        let path = self.config_path(key);
        match key.kind {
            ConfigKind::File => Ok(self.fetcher.fetch_raw(&path).await?),
            ConfigKind::Item => {
                let body = self.fetcher.fetch(&path).await?;
                body.value_text().ok_or_else(|| SyncError::Payload {
                    key: key.to_string(),
                    reason: "response carries no `value` field".to_string(),
                })
            }
        }
    }
}
