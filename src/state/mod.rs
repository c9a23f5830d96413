//! Shared application state: connection hub, timer registry, and storage slot.

/// Connection registry for live WebSocket sessions.
pub mod hub;
/// Deferred settlement timers keyed by game id.
pub mod timers;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    auth::{AuthOracle, SubjectOracle},
    config::AppConfig,
    dao::store::Store,
    error::ServiceError,
};

pub use self::hub::{ClientConnection, Hub, OUTBOUND_BUFFER};
pub use self::timers::TimerRegistry;

/// Cheaply cloneable handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state storing live connections, pending timers, and the
/// storage backend handle.
pub struct AppState {
    config: AppConfig,
    store: RwLock<Option<Arc<dyn Store>>>,
    hub: Hub,
    timers: TimerRegistry,
    oracle: Arc<dyn AuthOracle>,
    degraded: watch::Sender<bool>,
    http: reqwest::Client,
}

impl AppState {
    /// Construct a new [`AppState`] with the default authentication oracle.
    ///
    /// The application starts in degraded mode until a storage backend is
    /// installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_oracle(config, Arc::new(SubjectOracle))
    }

    /// Construct a new [`AppState`] with a custom authentication oracle.
    pub fn with_oracle(config: AppConfig, oracle: Arc<dyn AuthOracle>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            store: RwLock::new(None),
            hub: Hub::new(),
            timers: TimerRegistry::new(),
            oracle,
            degraded: degraded_tx,
            http: reqwest::Client::new(),
        })
    }

    /// Obtain a handle to the current storage backend, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn Store>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Storage backend handle, or [`ServiceError::Degraded`] when absent.
    pub async fn require_store(&self) -> Result<Arc<dyn Store>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a storage backend and leave degraded mode.
    pub async fn set_store(&self, store: Arc<dyn Store>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current storage backend and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        if *self.degraded.borrow() == value {
            return;
        }
        let _ = self.degraded.send(value);
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Registry of live connections keyed by user identity.
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Pending settlement timers keyed by game id.
    pub fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Authentication oracle resolving tokens to identities.
    pub fn oracle(&self) -> &dyn AuthOracle {
        self.oracle.as_ref()
    }

    /// Shared HTTP client for outbound side channels.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }
}
