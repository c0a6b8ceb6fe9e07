//! Query execution pipeline.
//!
//! This module provides the [`Datasource`], the single entry point through
//! which statements and routine calls reach the database:
//! - Pool acquisition through the shared [`PoolRegistry`]
//! - One fresh request per call
//! - Sanitized errors
//!
//! # Error handling
//!
//! Driver failures carry server detail (object names, login names, server
//! messages). That detail is written to the diagnostic channel and callers
//! only ever receive [`DbError::Database`], whose message is fixed.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::db::executable::{Parametrized, RoutineCall, SqlRequest, Statement};
use crate::db::params::Parameter;
use crate::db::pool::{ManagedPool, PoolFactory, PoolId, PoolRegistry};
use crate::error::{DbResult, DriverError};
use crate::models::QueryResult;

/// Runs statements and routine calls against one connection string.
pub struct Datasource<F: PoolFactory> {
    connection_string: String,
    registry: Arc<PoolRegistry<F>>,
    pool_id: PoolId,
}

impl<F: PoolFactory> Datasource<F> {
    /// Create a datasource. Fails with a configuration error when the
    /// connection string is empty.
    pub fn new(
        connection_string: impl Into<String>,
        registry: Arc<PoolRegistry<F>>,
    ) -> DbResult<Self> {
        let connection_string = connection_string.into();
        let pool_id = PoolId::from_connection_string(&connection_string)?;
        Ok(Self {
            connection_string,
            registry,
            pool_id,
        })
    }

    pub fn pool_id(&self) -> &PoolId {
        &self.pool_id
    }

    pub fn registry(&self) -> &Arc<PoolRegistry<F>> {
        &self.registry
    }

    /// Acquire the pool, hand a fresh request to `build` and return its
    /// result. Any driver failure is logged and replaced by a sanitized error.
    pub async fn run<B, Fut>(&self, build: B) -> DbResult<QueryResult>
    where
        B: FnOnce(Box<dyn SqlRequest>) -> Fut,
        Fut: Future<Output = Result<QueryResult, DriverError>>,
    {
        let pool = self
            .registry
            .acquire(&self.pool_id, &self.connection_string)
            .await?;
        let request = pool.request();
        build(request).await.map_err(DriverError::report)
    }

    /// Run raw query text with positional parameters.
    pub async fn execute(
        &self,
        sql: &str,
        params: impl IntoIterator<Item = Parameter>,
    ) -> DbResult<QueryResult> {
        let statement = Statement::new(sql).with_parameters(params);
        self.exec_query(&statement).await
    }

    pub async fn exec_query(&self, statement: &Statement) -> DbResult<QueryResult> {
        let start = Instant::now();
        let result = self
            .run(|request| async move { statement.execute(request).await })
            .await?;

        debug!(
            pool_id = %self.pool_id,
            params = statement.parameters_ref().len(),
            recordsets = result.recordsets.len(),
            rows = result.recordset().len(),
            execution_time_ms = start.elapsed().as_millis() as u64,
            "Statement executed"
        );
        Ok(result)
    }

    pub async fn exec_routine(&self, call: &RoutineCall) -> DbResult<QueryResult> {
        let start = Instant::now();
        let result = self
            .run(|request| async move { call.execute(request).await })
            .await?;

        debug!(
            pool_id = %self.pool_id,
            routine = %call.name(),
            params = call.parameters_ref().len(),
            recordsets = result.recordsets.len(),
            execution_time_ms = start.elapsed().as_millis() as u64,
            "Routine executed"
        );
        Ok(result)
    }
}

impl<F: PoolFactory> Clone for Datasource<F> {
    fn clone(&self) -> Self {
        Self {
            connection_string: self.connection_string.clone(),
            registry: Arc::clone(&self.registry),
            pool_id: self.pool_id.clone(),
        }
    }
}

impl<F: PoolFactory> std::fmt::Debug for Datasource<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The connection string may contain a password
        f.debug_struct("Datasource")
            .field("pool_id", &self.pool_id)
            .finish_non_exhaustive()
    }
}
