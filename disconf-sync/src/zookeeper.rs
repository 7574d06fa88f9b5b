//! ZooKeeper sessions through `zookeeper-client`.
//!
//! [`ZkConnector`] opens one session per call against the comma-separated
//! host list announced by the registry. Connect failures are retried
//! `retries` times, `spin_delay` apart. Every node is created with open ACLs.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;
use zookeeper_client as zk;

use crate::coordination::{
    Connector, Coordinator, CreateMode, DataWatch, SessionConfig, WatchEvent,
};
use crate::error::CoordinationError;

#[derive(Debug, Clone, Copy, Default)]
pub struct ZkConnector;

impl ZkConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for ZkConnector {
    async fn connect(
        &self,
        hosts: &str,
        config: &SessionConfig,
    ) -> Result<Arc<dyn Coordinator>, CoordinationError> {
        let mut attempt = 0;
        loop {
            let result = zk::Client::connector()
                .session_timeout(config.session_timeout)
                .connect(hosts)
                .await;
            match result {
                Ok(client) => {
                    tracing::info!(hosts, "coordination session established");
                    return Ok(Arc::new(ZkSession { client }));
                }
                Err(err) if attempt < config.retries => {
                    attempt += 1;
                    tracing::warn!(
                        hosts,
                        attempt,
                        error = %err,
                        "coordination connect failed, retrying"
                    );
                    tokio::time::sleep(config.spin_delay).await;
                }
                Err(err) => {
                    return Err(CoordinationError::Other(format!(
                        "connect to {hosts} failed: {err}"
                    )))
                }
            }
        }
    }
}

struct ZkSession {
    client: zk::Client,
}

#[async_trait]
impl Coordinator for ZkSession {
    async fn exists(&self, path: &str) -> Result<bool, CoordinationError> {
        let stat = self
            .client
            .check_stat(path)
            .await
            .map_err(|e| map_error(path, e))?;
        Ok(stat.is_some())
    }

    async fn create_recursive(&self, path: &str, data: &[u8]) -> Result<String, CoordinationError> {
        if self.exists(path).await? {
            return Ok(path.to_string());
        }
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut current = String::new();
        for (i, segment) in segments.iter().enumerate() {
            current.push('/');
            current.push_str(segment);
            let seed: &[u8] = if i + 1 == segments.len() { data } else { &[] };
            match self.create(&current, seed, CreateMode::Persistent).await {
                Ok(_) | Err(CoordinationError::NodeExists(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(path.to_string())
    }

    async fn create(
        &self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
    ) -> Result<String, CoordinationError> {
        let options = zk_mode(mode).with_acls(zk::Acls::anyone_all());
        let (_, sequence) = self
            .client
            .create(path, data, &options)
            .await
            .map_err(|e| map_error(path, e))?;
        Ok(match mode {
            CreateMode::Persistent => path.to_string(),
            CreateMode::EphemeralSequential => format!("{path}{sequence}"),
        })
    }

    async fn set_data(&self, path: &str, data: &[u8]) -> Result<(), CoordinationError> {
        self.client
            .set_data(path, data, None)
            .await
            .map_err(|e| map_error(path, e))?;
        Ok(())
    }

    async fn get_data_watch(
        &self,
        path: &str,
    ) -> Result<(Vec<u8>, DataWatch), CoordinationError> {
        let (data, _, watcher) = self
            .client
            .get_and_watch_data(path)
            .await
            .map_err(|e| map_error(path, e))?;

        let (mut tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let event = tokio::select! {
                event = watcher.changed() => event,
                _ = tx.closed() => return,
            };
            let _ = tx.send(watch_event(event.event_type, event.path));
        });
        Ok((data, rx))
    }
}

fn zk_mode(mode: CreateMode) -> zk::CreateMode {
    match mode {
        CreateMode::Persistent => zk::CreateMode::Persistent,
        CreateMode::EphemeralSequential => zk::CreateMode::EphemeralSequential,
    }
}

/// Session-level wake-ups end the session as far as the engine is concerned.
fn watch_event(event_type: zk::EventType, path: String) -> WatchEvent {
    match event_type {
        zk::EventType::NodeDeleted => WatchEvent::Deleted { path },
        zk::EventType::Session => WatchEvent::SessionExpired,
        _ => WatchEvent::DataChanged { path },
    }
}

fn map_error(path: &str, err: zk::Error) -> CoordinationError {
    match err {
        zk::Error::NoNode => CoordinationError::NoNode(path.to_string()),
        zk::Error::NodeExists => CoordinationError::NodeExists(path.to_string()),
        zk::Error::SessionExpired => CoordinationError::SessionExpired,
        other => CoordinationError::Other(format!("{path}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn server_errors_map_to_coordination_errors() {
        assert_eq!(
            map_error("/a", zk::Error::NoNode),
            CoordinationError::NoNode("/a".into())
        );
        assert_eq!(
            map_error("/a", zk::Error::NodeExists),
            CoordinationError::NodeExists("/a".into())
        );
        assert_eq!(
            map_error("/a", zk::Error::SessionExpired),
            CoordinationError::SessionExpired
        );
        match map_error("/a", zk::Error::ConnectionLoss) {
            CoordinationError::Other(msg) => assert!(msg.starts_with("/a: ")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn watch_wakeups_map_to_watch_events() {
        assert_eq!(
            watch_event(zk::EventType::NodeDataChanged, "/p".into()),
            WatchEvent::DataChanged { path: "/p".into() }
        );
        assert_eq!(
            watch_event(zk::EventType::NodeDeleted, "/p".into()),
            WatchEvent::Deleted { path: "/p".into() }
        );
        assert_eq!(
            watch_event(zk::EventType::Session, String::new()),
            WatchEvent::SessionExpired
        );
    }

    #[tokio::test]
    async fn unreachable_cluster_is_a_connect_error() {
        let config = SessionConfig {
            session_timeout: Duration::from_secs(1),
            spin_delay: Duration::from_millis(10),
            retries: 1,
        };
        let result = tokio::time::timeout(
            Duration::from_secs(30),
            ZkConnector::new().connect("127.0.0.1:1", &config),
        )
        .await;
        assert!(!matches!(result, Ok(Ok(_))));
    }
}
