//! Connection pool management.
//!
//! This module provides a registry of named, lazily created, reconnect-capable
//! connection pools. One pool exists per distinct connection string; the
//! registry owns every pool it hands out.
//!
//! # Design Decisions
//!
//! - **`OnceCell` per pool id**: Single-flight first acquisition. Concurrent
//!   callers for the same id share one in-flight connect.
//! - **Insert only after connect**: A pool that fails to connect is never
//!   handed to anybody. The empty cell is removed again.
//! - **Per-slot init mutex**: Held for the whole first connect. `close` and
//!   `close_all` take it before closing, so a pool still being created is
//!   closed once its connect finishes instead of escaping the registry.
//! - **Per-entry reconnect mutex**: A disconnected pool is reconnected in place
//!   by exactly one caller; the others wait and then observe the result. A
//!   pool the registry no longer holds is never reconnected.
//! - **`PoolFactory` seam**: The registry logic is shared between the SQL
//!   Server pool and the in-memory pools used in tests.
//!
//! # Concurrency Safety
//!
//! - All map locks are released before async operations (await points). The
//!   init and reconnect mutexes are the only locks held across a connect
//! - `close_all` drains the map under one write lock and closes outside it

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use sha1::{Digest, Sha1};
use tokio::sync::{Mutex, OnceCell, RwLock};
use tracing::{debug, info, warn};

use crate::db::executable::SqlRequest;
use crate::error::{DbError, DbResult, DriverError};
use crate::models::ConnectionDescriptor;

/// Deterministic pool identifier: lowercase hex SHA-1 of the connection string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(String);

impl PoolId {
    pub fn from_connection_string(connection_string: &str) -> DbResult<Self> {
        if connection_string.is_empty() {
            return Err(DbError::configuration(
                "database connection string cannot be empty",
            ));
        }
        let mut hasher = Sha1::new();
        hasher.update(connection_string.as_bytes());
        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A pool of connections to one database.
#[async_trait]
pub trait ManagedPool: Send + Sync + 'static {
    /// Connect, or reconnect in place after connectivity was lost.
    async fn connect(&self) -> Result<(), DriverError>;

    fn is_connected(&self) -> bool;

    async fn close(&self) -> Result<(), DriverError>;

    /// A fresh request bound to this pool.
    fn request(&self) -> Box<dyn SqlRequest>;
}

/// Builds unconnected pools for the registry.
pub trait PoolFactory: Send + Sync + 'static {
    type Pool: ManagedPool;

    fn create(&self, id: &PoolId, descriptor: ConnectionDescriptor) -> DbResult<Self::Pool>;
}

struct PoolEntry<P> {
    pool: Arc<P>,
    /// Serializes reconnect attempts.
    reconnect: Mutex<()>,
}

/// Registry slot for one id. `init` is held for the whole first connect so
/// `close` and `close_all` can wait for a pool that is still being created.
struct PoolSlot<P> {
    cell: OnceCell<Arc<PoolEntry<P>>>,
    init: Mutex<()>,
}

impl<P> PoolSlot<P> {
    fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            init: Mutex::new(()),
        }
    }

    fn initialized(&self) -> bool {
        self.cell.initialized()
    }
}

type SlotRef<P> = Arc<PoolSlot<P>>;

/// Registry of pools keyed by [`PoolId`].
pub struct PoolRegistry<F: PoolFactory> {
    factory: F,
    pools: RwLock<HashMap<PoolId, SlotRef<F::Pool>>>,
}

impl<F: PoolFactory> PoolRegistry<F> {
    /// Create an empty registry.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Get the pool for `id`, creating and connecting it on first use.
    ///
    /// A registered pool that lost connectivity is reconnected in place and
    /// returned; the entry is never replaced.
    pub async fn acquire(&self, id: &PoolId, connection_string: &str) -> DbResult<Arc<F::Pool>> {
        let (slot, entry) = loop {
            let slot = self.slot_for(id).await;
            if let Some(entry) = slot.cell.get().map(Arc::clone) {
                break (slot, entry);
            }

            let _init = slot.init.lock().await;
            // The slot may have been closed while we waited for it
            if !self.is_registered(id, &slot).await {
                continue;
            }

            let init = slot
                .cell
                .get_or_try_init(|| self.create_entry(id, connection_string))
                .await;
            match init.map(Arc::clone) {
                Ok(entry) => break (Arc::clone(&slot), entry),
                Err(e) => {
                    self.discard_empty_slot(id, &slot).await;
                    return Err(e);
                }
            }
        };

        if !entry.pool.is_connected() {
            let _guard = entry.reconnect.lock().await;
            // Another caller may have reconnected while we waited. A pool
            // closed by the registry stays closed.
            if !entry.pool.is_connected() && self.is_registered(id, &slot).await {
                info!(pool_id = %id, "Reconnecting connection pool");
                entry.pool.connect().await.map_err(DriverError::report)?;
            }
        }

        debug!(pool_id = %id, "Returning connection pool");
        Ok(Arc::clone(&entry.pool))
    }

    async fn create_entry(
        &self,
        id: &PoolId,
        connection_string: &str,
    ) -> DbResult<Arc<PoolEntry<F::Pool>>> {
        let descriptor = crate::db::connection_string::resolve(connection_string)?;
        info!(
            pool_id = %id,
            server = %descriptor.address(),
            database = %descriptor.database,
            "Creating connection pool"
        );
        let pool = self.factory.create(id, descriptor)?;
        pool.connect().await.map_err(DriverError::report)?;
        Ok(Arc::new(PoolEntry {
            pool: Arc::new(pool),
            reconnect: Mutex::new(()),
        }))
    }

    /// Remove the pool from the registry, then close it. A pool still being
    /// created is waited for and closed once its connect finishes.
    pub async fn close(&self, id: &PoolId) -> DbResult<()> {
        let removed = {
            let mut pools = self.pools.write().await;
            pools.remove(id)
        }; // Lock released here

        let Some(slot) = removed else {
            return Ok(());
        };
        let _init = slot.init.lock().await;
        if let Some(entry) = slot.cell.get() {
            info!(pool_id = %id, "Closing connection pool");
            entry.pool.close().await.map_err(DriverError::report)?;
        }
        Ok(())
    }

    /// Close every registered pool, including pools whose first connect is
    /// still in flight. Failures are logged and do not stop the remaining
    /// closes.
    pub async fn close_all(&self) {
        // Drain pools under lock, close outside lock
        let pools_to_close: Vec<_> = {
            let mut pools = self.pools.write().await;
            pools.drain().collect()
        }; // Lock released here

        let closes = pools_to_close.into_iter().map(|(id, slot)| async move {
            let _init = slot.init.lock().await;
            let Some(entry) = slot.cell.get() else {
                return;
            };
            info!(pool_id = %id, "Closing connection pool");
            if let Err(e) = entry.pool.close().await {
                warn!(pool_id = %id, error = %e, "Failed to close connection pool");
            }
        });
        join_all(closes).await;

        info!("All connection pools closed");
    }

    /// Whether a connected-at-least-once pool is registered under `id`.
    pub async fn contains(&self, id: &PoolId) -> bool {
        let pools = self.pools.read().await;
        pools.get(id).is_some_and(|slot| slot.initialized())
    }

    /// Number of registered pools.
    pub async fn len(&self) -> usize {
        let pools = self.pools.read().await;
        pools.values().filter(|slot| slot.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn slot_for(&self, id: &PoolId) -> SlotRef<F::Pool> {
        {
            let pools = self.pools.read().await;
            if let Some(slot) = pools.get(id) {
                return Arc::clone(slot);
            }
        }

        let mut pools = self.pools.write().await;
        // Double-check after acquiring write lock
        Arc::clone(
            pools
                .entry(id.clone())
                .or_insert_with(|| Arc::new(PoolSlot::new())),
        )
    }

    async fn is_registered(&self, id: &PoolId, slot: &SlotRef<F::Pool>) -> bool {
        let pools = self.pools.read().await;
        pools.get(id).is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    /// Drop a slot whose initialization failed, unless someone else has since
    /// replaced or initialized it.
    async fn discard_empty_slot(&self, id: &PoolId, slot: &SlotRef<F::Pool>) {
        let mut pools = self.pools.write().await;
        if let Some(current) = pools.get(id) {
            if Arc::ptr_eq(current, slot) && !current.initialized() {
                pools.remove(id);
            }
        }
    }
}

impl<F: PoolFactory> fmt::Debug for PoolRegistry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolRegistry").finish_non_exhaustive()
    }
}
