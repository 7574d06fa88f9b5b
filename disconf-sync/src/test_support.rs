//! In-crate test doubles for the HTTP transport.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use percent_encoding::percent_decode_str;

use disconf_core::AppIdentity;

use crate::error::FetchError;
use crate::fetcher::{HttpResponse, HttpTransport};

pub(crate) fn identity() -> AppIdentity {
    AppIdentity {
        app: "node_demo".into(),
        version: "1_0_0".into(),
        env: "test".into(),
    }
}

pub(crate) fn ok(body: &str) -> Result<HttpResponse, FetchError> {
    Ok(HttpResponse {
        status: 200,
        body: body.to_string(),
    })
}

pub(crate) fn status(code: u16) -> Result<HttpResponse, FetchError> {
    Ok(HttpResponse {
        status: code,
        body: String::new(),
    })
}

pub(crate) fn refused(url: &str) -> Result<HttpResponse, FetchError> {
    Err(FetchError::Transport {
        url: url.to_string(),
        reason: "connection refused".to_string(),
    })
}

type Script = dyn Fn(&str) -> Result<HttpResponse, FetchError> + Send + Sync;

/// Answers every request through a closure and records the URLs asked for.
pub(crate) struct ScriptedTransport {
    script: Box<Script>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub(crate) fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&str) -> Result<HttpResponse, FetchError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl HttpTransport for ScriptedTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        (self.script)(url)
    }
}

/// A registry server with mutable file and item tables.
pub(crate) struct FakeRegistry {
    files: Mutex<HashMap<String, String>>,
    items: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    config_calls: AtomicUsize,
}

impl FakeRegistry {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            files: Mutex::new(HashMap::new()),
            items: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            config_calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn set_file(&self, name: &str, text: &str) {
        self.files.lock().unwrap().insert(name.into(), text.into());
    }

    pub(crate) fn set_item(&self, name: &str, value: &str) {
        self.items.lock().unwrap().insert(name.into(), value.into());
    }

    pub(crate) fn fail_key(&self, name: &str, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(name.into());
        } else {
            set.remove(name);
        }
    }

    pub(crate) fn config_calls(&self) -> usize {
        self.config_calls.load(Ordering::SeqCst)
    }
}

fn query_key(query: &str) -> String {
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("key="))
        .map(|raw| percent_decode_str(raw).decode_utf8_lossy().into_owned())
        .unwrap_or_default()
}

fn envelope(value: &str) -> Result<HttpResponse, FetchError> {
    ok(&serde_json::json!({"status": 1, "message": "", "value": value}).to_string())
}

impl HttpTransport for FakeRegistry {
    fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
        let path_and_query = rest.find('/').map(|i| &rest[i..]).unwrap_or("/");
        let (path, query) = path_and_query.split_once('?').unwrap_or((path_and_query, ""));

        match path {
            "/api/zoo/hosts" => envelope("127.0.0.1:4180,127.0.0.1:4181"),
            "/api/zoo/prefix" => envelope("/disconf"),
            "/api/config/file" | "/api/config/item" => {
                self.config_calls.fetch_add(1, Ordering::SeqCst);
                let key = query_key(query);
                if self.failing.lock().unwrap().contains(&key) {
                    return status(500);
                }
                if path == "/api/config/file" {
                    match self.files.lock().unwrap().get(&key) {
                        Some(text) => ok(text),
                        None => status(404),
                    }
                } else {
                    match self.items.lock().unwrap().get(&key) {
                        Some(value) => envelope(value),
                        None => status(404),
                    }
                }
            }
            _ => status(404),
        }
    }
}
