//! Disconf core library: domain types, property files, client options.
//!
//! Public API surface:
//! - [`types`]: config keys, coordination paths, fetch policy
//! - [`properties`]: ordered property map, parser, serializer, merge
//! - [`options`]: client option table, bootstrap file loading
//! - [`error`]: [`ConfigError`]

pub mod error;
pub mod options;
pub mod properties;
pub mod types;

pub use error::ConfigError;
pub use options::{ClientOptions, LoadedOptions, OptionSource};
pub use properties::{merge, Properties};
pub use types::{AppIdentity, ConfigKey, ConfigKind, CoordinationPath, FetchConfig};
