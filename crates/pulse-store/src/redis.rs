// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Redis-backed implementation of [`KeyValueStore`].
//!
//! Supports two topologies selected at construction: a single endpoint, or
//! a cluster of seed endpoints with client-side routing. Connections are
//! established lazily; a lost connection schedules reconnect attempts with
//! a linear-then-capped delay (see [`ReconnectPolicy`]). Calls that arrive
//! before the next attempt comes due fail fast with
//! [`StoreError::ReconnectPending`] instead of piling onto a dead endpoint.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::cluster::{ClusterClient, ClusterClientBuilder};
use redis::cluster_async::ClusterConnection;
use redis::{FromRedisValue, RedisError};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use async_trait::async_trait;
use pulse_core::error::StoreError;

use crate::backoff::ReconnectPolicy;
use crate::traits::{
    ConnectionState, KeyValueStore, LoggingStoreEventHandler, StoreEvent, StoreEventHandler, WriteOp,
};

// =============================================================================
// Configuration
// =============================================================================

/// Store topology selected at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum StoreTopology {
    /// A single endpoint.
    Single {
        /// Host name or address.
        host: String,
        /// Port.
        port: u16,
    },

    /// A cluster of seed endpoints (`host:port` entries) with client-side
    /// routing.
    Cluster {
        /// Seed nodes.
        nodes: Vec<String>,
    },
}

impl StoreTopology {
    /// Returns `true` for the cluster topology.
    pub fn is_cluster(&self) -> bool {
        matches!(self, Self::Cluster { .. })
    }
}

/// Configuration for the Redis store adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Topology (single endpoint or cluster seeds).
    pub topology: StoreTopology,

    /// Optional password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Enables TLS (`rediss://`).
    #[serde(default)]
    pub tls: bool,

    /// Deadline for establishing a connection.
    #[serde(default = "default_connect_timeout")]
    #[serde(with = "duration_millis")]
    pub connect_timeout: Duration,

    /// Reconnect delay policy. Defaults depend on the topology.
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

impl StoreConfig {
    /// Creates a single-endpoint configuration.
    pub fn single(host: impl Into<String>, port: u16) -> Self {
        Self {
            topology: StoreTopology::Single {
                host: host.into(),
                port,
            },
            password: None,
            tls: false,
            connect_timeout: default_connect_timeout(),
            reconnect: ReconnectPolicy::single_node(),
        }
    }

    /// Creates a cluster configuration from seed nodes (`host:port`).
    pub fn cluster(nodes: Vec<String>) -> Self {
        Self {
            topology: StoreTopology::Cluster { nodes },
            password: None,
            tls: false,
            connect_timeout: default_connect_timeout(),
            reconnect: ReconnectPolicy::cluster(),
        }
    }

    /// Sets the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Enables TLS.
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    fn scheme(&self) -> &'static str {
        if self.tls {
            "rediss"
        } else {
            "redis"
        }
    }

    fn node_url(&self, host_port: &str) -> String {
        match &self.password {
            Some(password) => format!("{}://:{}@{}/", self.scheme(), password, host_port),
            None => format!("{}://{}/", self.scheme(), host_port),
        }
    }
}

// =============================================================================
// Connection
// =============================================================================

enum StoreClient {
    Single(redis::Client),
    Cluster(ClusterClient),
}

enum StoreConnection {
    Single(MultiplexedConnection),
    Cluster(ClusterConnection),
}

impl StoreConnection {
    async fn query<T: FromRedisValue>(&mut self, cmd: &redis::Cmd) -> Result<T, RedisError> {
        match self {
            Self::Single(conn) => cmd.query_async(conn).await,
            Self::Cluster(conn) => cmd.query_async(conn).await,
        }
    }

    async fn query_pipeline(&mut self, pipe: &redis::Pipeline) -> Result<(), RedisError> {
        match self {
            Self::Single(conn) => pipe.query_async(conn).await,
            Self::Cluster(conn) => pipe.query_async(conn).await,
        }
    }
}

// =============================================================================
// RedisStore
// =============================================================================

/// Redis implementation of [`KeyValueStore`].
///
/// The connection is a single shared resource owned by this adapter; all
/// connection state mutation happens here. Callers share the adapter behind
/// an `Arc`.
pub struct RedisStore {
    config: StoreConfig,
    client: StoreClient,
    conn: Mutex<Option<StoreConnection>>,
    state: AtomicU8,
    attempts: AtomicU32,
    next_attempt_at: AtomicU64,
    events: Box<dyn StoreEventHandler>,
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

impl RedisStore {
    /// Creates a new adapter. No connection is made until the first call.
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        Self::with_event_handler(config, Box::new(LoggingStoreEventHandler))
    }

    /// Creates a new adapter with a custom connectivity event handler.
    pub fn with_event_handler(
        config: StoreConfig,
        events: Box<dyn StoreEventHandler>,
    ) -> Result<Self, StoreError> {
        let client = match &config.topology {
            StoreTopology::Single { host, port } => {
                let url = config.node_url(&format!("{}:{}", host, port));
                let client = redis::Client::open(url)
                    .map_err(|e| StoreError::connection(format!("invalid endpoint: {}", e)))?;
                StoreClient::Single(client)
            }
            StoreTopology::Cluster { nodes } => {
                let urls: Vec<String> = nodes.iter().map(|n| config.node_url(n)).collect();
                let mut builder = ClusterClientBuilder::new(urls);
                if let Some(password) = &config.password {
                    builder = builder.password(password.clone());
                }
                let client = builder
                    .build()
                    .map_err(|e| StoreError::connection(format!("invalid cluster seeds: {}", e)))?;
                StoreClient::Cluster(client)
            }
        };

        Ok(Self {
            config,
            client,
            conn: Mutex::new(None),
            state: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
            attempts: AtomicU32::new(0),
            next_attempt_at: AtomicU64::new(0),
            events,
        })
    }

    /// Returns the current connection state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from(self.state.load(Ordering::SeqCst))
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Opens a connection for the configured topology.
    async fn open_connection(&self) -> Result<StoreConnection, RedisError> {
        match &self.client {
            StoreClient::Single(client) => client
                .get_multiplexed_async_connection()
                .await
                .map(StoreConnection::Single),
            StoreClient::Cluster(client) => client
                .get_async_connection()
                .await
                .map(StoreConnection::Cluster),
        }
    }

    /// Ensures a live connection exists in `slot`, honoring the reconnect
    /// schedule: a failed attempt gates further attempts until
    /// `min(attempt * per_attempt, cap)` has elapsed.
    async fn ensure_connected<'a>(
        &self,
        slot: &'a mut Option<StoreConnection>,
    ) -> Result<&'a mut StoreConnection, StoreError> {
        if slot.is_none() {
            let now = now_ms();
            let gate = self.next_attempt_at.load(Ordering::SeqCst);
            if now < gate {
                return Err(StoreError::ReconnectPending {
                    delay: Duration::from_millis(gate - now),
                    attempt: self.attempts.load(Ordering::SeqCst).saturating_add(1),
                });
            }

            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let connect = tokio::time::timeout(self.config.connect_timeout, self.open_connection());

            match connect.await {
                Ok(Ok(conn)) => {
                    self.attempts.store(0, Ordering::SeqCst);
                    self.next_attempt_at.store(0, Ordering::SeqCst);
                    self.set_state(ConnectionState::Connected);
                    self.events.on_event(&StoreEvent::Connected);
                    *slot = Some(conn);
                }
                Ok(Err(e)) => {
                    self.schedule_reconnect(attempt, &e.to_string());
                    return Err(StoreError::connection(e.to_string()));
                }
                Err(_) => {
                    let message = format!("connect timed out after {:?}", self.config.connect_timeout);
                    self.schedule_reconnect(attempt, &message);
                    return Err(StoreError::connection(message));
                }
            }
        }

        match slot.as_mut() {
            Some(conn) => Ok(conn),
            None => Err(StoreError::connection("connection unavailable")),
        }
    }

    fn schedule_reconnect(&self, attempt: u32, message: &str) {
        let delay = self.config.reconnect.delay(attempt);
        self.next_attempt_at
            .store(now_ms() + delay.as_millis() as u64, Ordering::SeqCst);
        self.set_state(ConnectionState::Reconnecting);
        self.events.on_event(&StoreEvent::Error(message.to_string()));
        tracing::debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Scheduled backing store reconnect"
        );
    }

    /// Classifies a command failure, dropping the connection when it looks
    /// like a transport problem so the next call goes through the reconnect
    /// scheduler.
    fn handle_error(&self, slot: &mut Option<StoreConnection>, error: &RedisError) -> StoreError {
        if error.is_io_error()
            || error.is_connection_dropped()
            || error.is_connection_refusal()
            || error.is_timeout()
        {
            *slot = None;
            self.set_state(ConnectionState::Reconnecting);
            self.events.on_event(&StoreEvent::Error(error.to_string()));
            StoreError::connection(error.to_string())
        } else {
            StoreError::command(error.to_string())
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut slot = self.conn.lock().await;
        let conn = self.ensure_connected(&mut slot).await?;

        let mut cmd = redis::cmd("GET");
        cmd.arg(key);

        match conn.query::<Option<Vec<u8>>>(&cmd).await {
            Ok(value) => Ok(value),
            Err(e) => Err(self.handle_error(&mut slot, &e)),
        }
    }

    async fn set_with_expiry(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let mut slot = self.conn.lock().await;
        let conn = self.ensure_connected(&mut slot).await?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("EX").arg(ttl.as_secs().max(1));

        match conn.query::<()>(&cmd).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.handle_error(&mut slot, &e)),
        }
    }

    async fn delete(&self, keys: &[&str]) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut slot = self.conn.lock().await;
        let conn = self.ensure_connected(&mut slot).await?;

        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(*key);
        }

        match conn.query::<i64>(&cmd).await {
            Ok(_) => Ok(()),
            Err(e) => Err(self.handle_error(&mut slot, &e)),
        }
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        let mut slot = self.conn.lock().await;
        let conn = self.ensure_connected(&mut slot).await?;

        let started = Instant::now();
        let cmd = redis::cmd("PING");

        match conn.query::<String>(&cmd).await {
            Ok(_) => Ok(started.elapsed()),
            Err(e) => Err(self.handle_error(&mut slot, &e)),
        }
    }

    async fn exec_batch(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        if ops.is_empty() {
            return Ok(());
        }

        let mut slot = self.conn.lock().await;
        let conn = self.ensure_connected(&mut slot).await?;

        let mut pipe = redis::pipe();
        for op in &ops {
            match op {
                WriteOp::SetWithExpiry { key, value, ttl } => {
                    pipe.cmd("SET")
                        .arg(key)
                        .arg(value.as_slice())
                        .arg("EX")
                        .arg(ttl.as_secs().max(1))
                        .ignore();
                }
                WriteOp::Delete { key } => {
                    pipe.cmd("DEL").arg(key).ignore();
                }
            }
        }

        match conn.query_pipeline(&pipe).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.handle_error(&mut slot, &e)),
        }
    }

    async fn close(&self) {
        let mut slot = self.conn.lock().await;
        slot.take();
        self.set_state(ConnectionState::Disconnected);
        tracing::info!("Backing store connection released");
    }

    fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    fn name(&self) -> &str {
        if self.config.topology.is_cluster() {
            "redis-cluster"
        } else {
            "redis"
        }
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("topology", &self.config.topology)
            .field("state", &self.state())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_node_url() {
        let config = StoreConfig::single("localhost", 6379);
        assert_eq!(config.node_url("localhost:6379"), "redis://localhost:6379/");

        let config = config.with_password("secret").with_tls(true);
        assert_eq!(
            config.node_url("localhost:6379"),
            "rediss://:secret@localhost:6379/"
        );
    }

    #[test]
    fn test_topology_defaults() {
        let single = StoreConfig::single("localhost", 6379);
        assert_eq!(single.reconnect, ReconnectPolicy::single_node());
        assert!(!single.topology.is_cluster());

        let cluster = StoreConfig::cluster(vec!["a:7000".into(), "b:7001".into()]);
        assert_eq!(cluster.reconnect, ReconnectPolicy::cluster());
        assert!(cluster.topology.is_cluster());
    }

    #[tokio::test]
    async fn test_starts_disconnected() {
        let store = RedisStore::new(StoreConfig::single("localhost", 6379)).unwrap();
        assert_eq!(store.state(), ConnectionState::Disconnected);
        assert!(!store.is_connected());
    }

    #[tokio::test]
    async fn test_failed_connect_schedules_reconnect() {
        // Port 1 is never a Redis server; connect fails fast on refused.
        let mut config = StoreConfig::single("127.0.0.1", 1);
        config.connect_timeout = Duration::from_millis(500);
        // Long gate so the second call observes the pending reconnect no
        // matter how slowly the test runs.
        config.reconnect = ReconnectPolicy::new(Duration::from_secs(60), Duration::from_secs(60));
        let store = RedisStore::new(config).unwrap();

        let first = store.ping().await;
        assert!(first.is_err());
        assert_eq!(store.state(), ConnectionState::Reconnecting);

        // A call before the gate comes due fails fast without dialing.
        let second = store.ping().await;
        assert!(matches!(second, Err(StoreError::ReconnectPending { .. })));
    }

    #[tokio::test]
    async fn test_close_resets_state() {
        let store = RedisStore::new(StoreConfig::single("localhost", 6379)).unwrap();
        store.close().await;
        assert_eq!(store.state(), ConnectionState::Disconnected);
    }
}
