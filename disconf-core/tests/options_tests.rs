//! Bootstrap-file loading and precedence integration tests.

use assert_fs::prelude::*;
use disconf_core::{
    options::{self, OptionSource, DEFAULT_BOOTSTRAP_FILE},
    ConfigError, ConfigKey, Properties,
};
use predicates::prelude::predicate;

fn explicit(pairs: &[(&str, &str)]) -> Properties {
    pairs.iter().copied().collect()
}

// ---------------------------------------------------------------------------
// 1. Missing / present bootstrap file
// ---------------------------------------------------------------------------

#[test]
fn missing_bootstrap_file_falls_back_to_defaults() {
    let base = assert_fs::TempDir::new().expect("tempdir");
    let loaded = options::load_at(base.path(), DEFAULT_BOOTSTRAP_FILE, &Properties::new())
        .expect("load");
    assert!(loaded.bootstrap_file.is_none());
    assert!(!loaded.options.enable_remote);
    assert_eq!(loaded.options.dist_file, base.path().join("remote.properties"));
    assert!(loaded
        .resolved
        .iter()
        .all(|r| r.source == OptionSource::Default));
}

#[test]
fn bootstrap_file_values_override_defaults() {
    let base = assert_fs::TempDir::new().expect("tempdir");
    base.child(DEFAULT_BOOTSTRAP_FILE)
        .write_str(
            "# disconf client\n\
             enable_remote=true\n\
             conf_server_host=10.0.0.1:8080,10.0.0.2:8080\n\
             app=shop_api\n\
             conf_file_name=db.properties\n\
             conf_server_url_retry_times=1\n",
        )
        .expect("write bootstrap");

    let loaded = options::load_at(base.path(), DEFAULT_BOOTSTRAP_FILE, &Properties::new())
        .expect("load");

    base.child(DEFAULT_BOOTSTRAP_FILE)
        .assert(predicate::str::contains("app=shop_api"));
    assert_eq!(
        loaded.bootstrap_file.as_deref(),
        Some(base.child(DEFAULT_BOOTSTRAP_FILE).path())
    );
    let opts = &loaded.options;
    assert!(opts.enable_remote);
    assert_eq!(opts.server_hosts, "10.0.0.1:8080,10.0.0.2:8080");
    assert_eq!(opts.app, "shop_api");
    assert_eq!(opts.retry_times, 1);
    assert_eq!(
        opts.watch_set(),
        vec![ConfigKey::file("db.properties"), ConfigKey::item("node_demo")]
    );
}

#[test]
fn explicit_options_beat_bootstrap_file() {
    let base = assert_fs::TempDir::new().expect("tempdir");
    base.child("client.properties")
        .write_str("app=from_file\nenv=staging\n")
        .expect("write bootstrap");

    let loaded = options::load_at(
        base.path(),
        "client.properties",
        &explicit(&[("app", "from_cli")]),
    )
    .expect("load");

    assert_eq!(loaded.options.app, "from_cli");
    assert_eq!(loaded.options.env, "staging");
}

// ---------------------------------------------------------------------------
// 2. Malformed values
// ---------------------------------------------------------------------------

#[test]
fn malformed_bootstrap_value_names_key_and_value() {
    let base = assert_fs::TempDir::new().expect("tempdir");
    base.child(DEFAULT_BOOTSTRAP_FILE)
        .write_str("enable_remote=perhaps\n")
        .expect("write bootstrap");

    let err = options::load_at(base.path(), DEFAULT_BOOTSTRAP_FILE, &Properties::new())
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }), "got: {err}");
    let msg = err.to_string();
    assert!(msg.contains("enable_remote"), "got: {msg}");
    assert!(msg.contains("perhaps"), "got: {msg}");
}

#[test]
#[cfg(unix)]
fn unreadable_bootstrap_file_is_io_error_with_path() {
    let base = assert_fs::TempDir::new().expect("tempdir");
    // A directory where the file should be cannot be read as text.
    base.child(DEFAULT_BOOTSTRAP_FILE)
        .create_dir_all()
        .expect("mkdir");

    let err = options::load_at(base.path(), DEFAULT_BOOTSTRAP_FILE, &Properties::new())
        .unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }), "got: {err}");
    assert!(err.to_string().contains(DEFAULT_BOOTSTRAP_FILE));
}
