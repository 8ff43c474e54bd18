// Connection cache - one lazily established database handle shared by every caller.
// Concurrent callers share a single in-flight attempt; a failed attempt is reported to
// everyone awaiting it and then forgotten so the next call can retry.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use once_cell::sync::Lazy;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::config::{Config, DatabaseConfig};
use crate::error::{AppError, AppResult};
use crate::infrastructure::database::Database;

/// Opens new database handles for the cache
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> AppResult<Database>;
}

/// Connects with a configured connection string and ensures collections exist
pub struct UrlConnector {
    config: DatabaseConfig,
}

impl UrlConnector {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for UrlConnector {
    async fn connect(&self) -> AppResult<Database> {
        let db = Database::connect(&self.config).await?;
        db.initialize().await?;
        Ok(db)
    }
}

type ConnectFuture = Shared<BoxFuture<'static, AppResult<Database>>>;

enum CacheState {
    Empty,
    Connecting { attempt: u64, future: ConnectFuture },
    Connected(Database),
}

struct CacheInner {
    state: CacheState,
    attempts: u64,
    // Last attempt whose outcome was written to `state`
    settled: u64,
}

pub struct ConnectionCache {
    connector: Arc<dyn Connector>,
    inner: Mutex<CacheInner>,
}

impl fmt::Debug for ConnectionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner.try_lock() {
            Ok(inner) => match inner.state {
                CacheState::Empty => "empty",
                CacheState::Connecting { .. } => "connecting",
                CacheState::Connected(_) => "connected",
            },
            Err(_) => "locked",
        };
        f.debug_struct("ConnectionCache")
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

impl ConnectionCache {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            inner: Mutex::new(CacheInner {
                state: CacheState::Empty,
                attempts: 0,
                settled: 0,
            }),
        }
    }

    /// Cache backed by a [`UrlConnector`] for the configured database
    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(UrlConnector::new(config.database.clone())))
    }

    /// Return the shared handle, connecting first if nobody has yet
    #[instrument(skip(self))]
    pub async fn connect(&self) -> AppResult<Database> {
        let (attempt, future) = {
            let mut inner = self.inner.lock().await;
            let pending = match &inner.state {
                CacheState::Connected(db) => {
                    debug!("Reusing cached database connection");
                    return Ok(db.clone());
                }
                CacheState::Connecting { attempt, future } => Some((*attempt, future.clone())),
                CacheState::Empty => None,
            };

            match pending {
                Some((attempt, future)) => {
                    debug!(attempt, "Joining in-flight connection attempt");
                    (attempt, future)
                }
                None => {
                    inner.attempts += 1;
                    let attempt = inner.attempts;
                    let connector = Arc::clone(&self.connector);
                    let future = async move { connector.connect().await }.boxed().shared();
                    inner.state = CacheState::Connecting {
                        attempt,
                        future: future.clone(),
                    };
                    info!(attempt, "Starting database connection attempt");
                    (attempt, future)
                }
            }
        };

        let result = future.await;

        let mut inner = self.inner.lock().await;
        if inner.settled == attempt {
            // Another caller of the same attempt already recorded the outcome
            return result;
        }
        // Only the attempt that is still current may settle the state; a reset or a
        // newer attempt may have replaced it while this one was pending.
        let still_current = matches!(
            inner.state,
            CacheState::Connecting { attempt: current, .. } if current == attempt
        );
        if !still_current {
            drop(inner);
            let db = result?;
            // Nobody owns a handle opened for a discarded attempt
            db.close().await;
            warn!(attempt, "Connection attempt discarded after cache reset");
            return Err(AppError::Connection(
                "Connection cache was reset while connecting".to_string(),
            ));
        }

        inner.settled = attempt;
        inner.state = match &result {
            Ok(db) => {
                info!(attempt, "Database connection cached");
                CacheState::Connected(db.clone())
            }
            Err(e) => {
                warn!(attempt, error = %e, "Database connection attempt failed");
                CacheState::Empty
            }
        };
        result
    }

    pub async fn is_connected(&self) -> bool {
        matches!(self.inner.lock().await.state, CacheState::Connected(_))
    }

    /// Number of connection attempts started so far
    pub async fn attempts(&self) -> u64 {
        self.inner.lock().await.attempts
    }

    /// Close and forget the cached handle. The next `connect` starts over.
    /// An attempt still in flight is abandoned; its callers get an error.
    pub async fn disconnect(&self) {
        let previous = {
            let mut inner = self.inner.lock().await;
            std::mem::replace(&mut inner.state, CacheState::Empty)
        };
        if let CacheState::Connected(db) = previous {
            db.close().await;
            info!("Database connection closed");
        }
    }
}

// === Process-wide cache ===

static GLOBAL_CONNECTION: Lazy<RwLock<Option<Arc<ConnectionCache>>>> =
    Lazy::new(|| RwLock::new(None));

/// Install the process-wide cache. Fails if one is already installed.
pub async fn init_global_connection(config: &Config) -> AppResult<Arc<ConnectionCache>> {
    let mut slot = GLOBAL_CONNECTION.write().await;
    if slot.is_some() {
        return Err(AppError::Internal(
            "Global connection cache already initialized".to_string(),
        ));
    }
    let cache = Arc::new(ConnectionCache::from_config(config));
    *slot = Some(Arc::clone(&cache));
    Ok(cache)
}

/// Read configuration from the environment and install the process-wide cache.
/// A missing connection string fails here, before any caller tries to connect.
pub async fn init_global_connection_from_env() -> AppResult<Arc<ConnectionCache>> {
    let config = Config::from_env()?;
    init_global_connection(&config).await
}

/// Shared database handle from the process-wide cache
pub async fn connect_to_database() -> AppResult<Database> {
    let cache = GLOBAL_CONNECTION.read().await.clone().ok_or_else(|| {
        AppError::Internal(
            "Global connection cache not initialized. Call init_global_connection() first."
                .to_string(),
        )
    })?;
    cache.connect().await
}

/// Tear down the process-wide cache, closing any open handle
pub async fn reset_global_connection() {
    let previous = GLOBAL_CONNECTION.write().await.take();
    if let Some(cache) = previous {
        cache.disconnect().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FlakyConnector {
        calls: AtomicUsize,
        failures: usize,
        opened: std::sync::Mutex<Vec<Database>>,
    }

    #[async_trait]
    impl Connector for FlakyConnector {
        async fn connect(&self) -> AppResult<Database> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if call < self.failures {
                return Err(AppError::Connection("server unreachable".to_string()));
            }
            let db = Database::in_memory().await?;
            self.opened.lock().unwrap().push(db.clone());
            Ok(db)
        }
    }

    fn flaky(failures: usize) -> Arc<FlakyConnector> {
        Arc::new(FlakyConnector {
            calls: AtomicUsize::new(0),
            failures,
            opened: std::sync::Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_attempt() {
        let connector = flaky(0);
        let cache = ConnectionCache::new(connector.clone());

        let (a, b) = tokio::join!(cache.connect(), cache.connect());
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.attempts().await, 1);
        // Both handles share the single underlying pool
        a.close().await;
        assert!(b.is_closed());
    }

    #[tokio::test]
    async fn test_cached_handle_skips_connector() {
        let connector = flaky(0);
        let cache = ConnectionCache::new(connector.clone());
        cache.connect().await.unwrap();
        cache.connect().await.unwrap();
        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_connected().await);
    }

    #[tokio::test]
    async fn test_failure_reaches_all_waiters_then_allows_retry() {
        let connector = flaky(1);
        let cache = ConnectionCache::new(connector.clone());

        let (a, b) = tokio::join!(cache.connect(), cache.connect());
        assert_eq!(a.unwrap_err(), AppError::Connection("server unreachable".to_string()));
        assert!(b.is_err());
        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);
        assert!(!cache.is_connected().await);

        cache.connect().await.unwrap();
        assert_eq!(connector.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disconnect_forces_reconnect() {
        let connector = flaky(0);
        let cache = ConnectionCache::new(connector.clone());
        let first = cache.connect().await.unwrap();
        cache.disconnect().await;
        assert!(first.is_closed());

        let second = cache.connect().await.unwrap();
        assert!(!second.is_closed());
        assert_eq!(connector.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disconnect_during_attempt_closes_its_handle() {
        let connector = flaky(0);
        let cache = ConnectionCache::new(connector.clone());

        let (result, _) = tokio::join!(cache.connect(), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            cache.disconnect().await;
        });

        assert!(matches!(result, Err(AppError::Connection(_))));
        assert!(!cache.is_connected().await);
        let opened = connector.opened.lock().unwrap().clone();
        assert_eq!(opened.len(), 1);
        assert!(opened[0].is_closed());

        // A fresh attempt after the reset is cached as usual
        cache.connect().await.unwrap();
        assert!(cache.is_connected().await);
        assert_eq!(cache.attempts().await, 2);
    }

    #[tokio::test]
    async fn test_debug_reports_state() {
        let cache = ConnectionCache::new(flaky(0));
        assert!(format!("{:?}", cache).contains("empty"));
        cache.connect().await.unwrap();
        assert!(format!("{:?}", cache).contains("connected"));
    }
}
