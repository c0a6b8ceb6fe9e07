//! SQL Server pool and request implementation.
//!
//! Connections are managed by a bb8 pool over tiberius clients. Each
//! [`TdsPool`] tracks its own connectivity: a socket or timeout failure on any
//! request marks the pool disconnected so the registry reconnects it on the
//! next acquisition.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, RunError};
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, Query, SqlBrowser};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::config::PoolOptions;
use crate::db::executable::SqlRequest;
use crate::db::params::{Parameter, bind_mssql_param};
use crate::db::pool::{ManagedPool, PoolFactory, PoolId};
use crate::db::types::RowToJson;
use crate::error::{DbResult, DriverError};
use crate::models::{ConnectionDescriptor, QueryResult};

/// Connection manager for bb8 pool with tiberius.
#[derive(Clone)]
pub struct TiberiusConnectionManager {
    descriptor: Arc<ConnectionDescriptor>,
}

impl TiberiusConnectionManager {
    pub fn new(descriptor: Arc<ConnectionDescriptor>) -> Self {
        Self { descriptor }
    }

    fn build_config(&self) -> Config {
        let descriptor = &self.descriptor;
        let mut config = Config::new();
        config.host(&descriptor.server);
        config.port(descriptor.port);
        if let Some(instance) = &descriptor.instance {
            config.instance_name(instance);
        }
        if !descriptor.database.is_empty() {
            config.database(&descriptor.database);
        }
        config.authentication(AuthMethod::sql_server(&descriptor.user, &descriptor.password));

        config.encryption(encryption_level(descriptor.encrypt));
        if descriptor.trust_server_certificate {
            config.trust_cert();
        }

        config
    }
}

/// `encrypt=false` still encrypts the login packet.
fn encryption_level(encrypt: bool) -> EncryptionLevel {
    if encrypt {
        EncryptionLevel::Required
    } else {
        EncryptionLevel::Off
    }
}

#[async_trait]
impl bb8::ManageConnection for TiberiusConnectionManager {
    type Connection = Client<Compat<TcpStream>>;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let config = self.build_config();
        let tcp = if self.descriptor.instance.is_some() {
            TcpStream::connect_named(&config).await?
        } else {
            TcpStream::connect(config.get_addr())
                .await
                .map_err(|e| tiberius::error::Error::Io {
                    kind: e.kind(),
                    message: e.to_string(),
                })?
        };

        tcp.set_nodelay(true).ok();

        Client::connect(config, tcp.compat_write()).await
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.simple_query("SELECT 1").await?.into_row().await?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

type TdsConnectionPool = Pool<TiberiusConnectionManager>;

fn run_error(err: RunError<tiberius::error::Error>, timeout: Duration) -> DriverError {
    match err {
        RunError::User(e) => e.into(),
        RunError::TimedOut => DriverError::connect_timeout(timeout),
    }
}

/// A SQL Server connection pool that can be reconnected in place.
pub struct TdsPool {
    id: PoolId,
    descriptor: Arc<ConnectionDescriptor>,
    options: PoolOptions,
    /// `None` until connected and after close.
    pool: std::sync::RwLock<Option<TdsConnectionPool>>,
    connected: Arc<AtomicBool>,
}

impl TdsPool {
    pub fn new(id: PoolId, descriptor: ConnectionDescriptor, options: PoolOptions) -> Self {
        Self {
            id,
            descriptor: Arc::new(descriptor),
            options,
            pool: std::sync::RwLock::new(None),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> &PoolId {
        &self.id
    }

    fn current(&self) -> Option<TdsConnectionPool> {
        self.pool.read().ok().and_then(|guard| guard.clone())
    }

    fn replace(&self, pool: Option<TdsConnectionPool>) {
        if let Ok(mut guard) = self.pool.write() {
            *guard = pool;
        }
    }

    async fn build_pool(&self) -> Result<TdsConnectionPool, DriverError> {
        let connect_timeout = self.descriptor.connection_timeout();
        let manager = TiberiusConnectionManager::new(Arc::clone(&self.descriptor));
        let pool = Pool::builder()
            .max_size(self.options.max_connections_or_default())
            .min_idle(self.options.min_connections_or_default())
            .idle_timeout(Some(Duration::from_secs(
                self.options.idle_timeout_or_default(),
            )))
            .connection_timeout(connect_timeout)
            .test_on_check_out(self.options.test_before_acquire_or_default())
            .build(manager)
            .await?;

        // Test connection
        {
            let mut conn = pool
                .get()
                .await
                .map_err(|e| run_error(e, connect_timeout))?;
            conn.simple_query("SELECT 1").await?.into_row().await?;
        }

        Ok(pool)
    }
}

#[async_trait]
impl ManagedPool for TdsPool {
    async fn connect(&self) -> Result<(), DriverError> {
        let connect_timeout = self.descriptor.connection_timeout();
        let pool = timeout(connect_timeout, self.build_pool())
            .await
            .map_err(|_| DriverError::connect_timeout(connect_timeout))??;

        self.replace(Some(pool));
        self.connected.store(true, Ordering::Release);

        info!(
            pool_id = %self.id,
            server = %self.descriptor.address(),
            max_connections = self.options.max_connections_or_default(),
            "Connected to SQL Server"
        );
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.connected.store(false, Ordering::Release);
        // Connections are released once the last pool handle is dropped
        self.replace(None);
        Ok(())
    }

    fn request(&self) -> Box<dyn SqlRequest> {
        Box::new(TdsRequest {
            pool: self.current(),
            connected: Arc::clone(&self.connected),
            parameters: Vec::new(),
            connect_timeout: self.descriptor.connection_timeout(),
            request_timeout: self.descriptor.request_timeout(),
        })
    }
}

/// Creates [`TdsPool`]s with shared pool options.
#[derive(Debug, Clone, Default)]
pub struct TdsPoolFactory {
    options: PoolOptions,
}

impl TdsPoolFactory {
    pub fn new(options: PoolOptions) -> Self {
        Self { options }
    }
}

impl PoolFactory for TdsPoolFactory {
    type Pool = TdsPool;

    fn create(&self, id: &PoolId, descriptor: ConnectionDescriptor) -> DbResult<TdsPool> {
        Ok(TdsPool::new(id.clone(), descriptor, self.options.clone()))
    }
}

/// A single request against a [`TdsPool`].
pub struct TdsRequest {
    pool: Option<TdsConnectionPool>,
    connected: Arc<AtomicBool>,
    parameters: Vec<Parameter>,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl TdsRequest {
    async fn run(self, text: String) -> Result<QueryResult, DriverError> {
        let result = match timeout(self.request_timeout, self.fetch(&text)).await {
            Ok(result) => result,
            Err(_) => Err(DriverError::request_timeout(self.request_timeout)),
        };

        if let Err(e) = &result {
            if e.is_connection_loss() {
                self.connected.store(false, Ordering::Release);
            }
        }
        result
    }

    async fn fetch(&self, text: &str) -> Result<QueryResult, DriverError> {
        let pool = self.pool.as_ref().ok_or_else(DriverError::not_open)?;
        let mut conn = pool
            .get()
            .await
            .map_err(|e| run_error(e, self.connect_timeout))?;

        let mut query = Query::new(text);
        for parameter in &self.parameters {
            bind_mssql_param(&mut query, parameter);
        }

        let stream = query.query(&mut *conn).await?;
        let results = stream.into_results().await?;

        Ok(QueryResult {
            recordsets: results
                .iter()
                .map(|rows| rows.iter().map(|row| row.to_json_map()).collect())
                .collect(),
        })
    }
}

#[async_trait]
impl SqlRequest for TdsRequest {
    fn input(&mut self, parameter: Parameter) {
        self.parameters.push(parameter);
    }

    async fn query(self: Box<Self>, sql: &str) -> Result<QueryResult, DriverError> {
        let text = query_text(&self.parameters, sql);
        debug!(sql = %sql, params = self.parameters.len(), "Executing query");
        self.run(text).await
    }

    async fn execute(self: Box<Self>, routine: &str) -> Result<QueryResult, DriverError> {
        let text = exec_text(&self.parameters, routine);
        debug!(routine = %routine, params = self.parameters.len(), "Executing routine");
        self.run(text).await
    }
}

// ============================================================================
// Request text
// ============================================================================

/// Declare each named parameter from its positional placeholder so the query
/// text can refer to it by name.
pub(crate) fn query_text(parameters: &[Parameter], sql: &str) -> String {
    let mut text = String::new();
    for (i, parameter) in parameters.iter().enumerate() {
        text.push_str(&format!(
            "DECLARE @{} {} = @P{};\n",
            parameter.bare_name(),
            parameter.sql_type.declaration(),
            i + 1
        ));
    }
    text.push_str(sql);
    text
}

/// `EXEC [schema].[name] @a = @P1, @b = @P2;`
pub(crate) fn exec_text(parameters: &[Parameter], routine: &str) -> String {
    let arguments = parameters
        .iter()
        .enumerate()
        .map(|(i, p)| format!("@{} = @P{}", p.bare_name(), i + 1))
        .collect::<Vec<_>>()
        .join(", ");

    if arguments.is_empty() {
        format!("EXEC {};", quote_routine_name(routine))
    } else {
        format!("EXEC {} {};", quote_routine_name(routine), arguments)
    }
}

fn quote_routine_name(routine: &str) -> String {
    routine
        .split('.')
        .map(|part| {
            let part = part.trim().trim_start_matches('[').trim_end_matches(']');
            format!("[{}]", part.replace(']', "]]"))
        })
        .collect::<Vec<_>>()
        .join(".")
}
