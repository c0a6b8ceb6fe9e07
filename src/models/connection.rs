//! Connection-related data models.
//!
//! This module defines the resolved connection parameters used to open a pool.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

pub const DEFAULT_PORT: u16 = 1433;
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 25_000;
pub const DEFAULT_ENCRYPT: bool = true;
pub const DEFAULT_TRUST_SERVER_CERTIFICATE: bool = true;

/// Fully resolved connection parameters for one connection string.
///
/// Produced once per distinct connection string and never modified afterwards.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionDescriptor {
    pub server: String,
    /// Named instance (`host\instance`), resolved through the browser service.
    pub instance: Option<String>,
    pub port: u16,
    pub database: String,
    pub user: String,
    /// Contains sensitive data - never log
    #[serde(skip_serializing)]
    pub password: String,
    pub connection_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub encrypt: bool,
    pub trust_server_certificate: bool,
}

impl ConnectionDescriptor {
    /// Create a descriptor with every optional field set to its default.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            instance: None,
            port: DEFAULT_PORT,
            database: String::new(),
            user: String::new(),
            password: String::new(),
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            encrypt: DEFAULT_ENCRYPT,
            trust_server_certificate: DEFAULT_TRUST_SERVER_CERTIFICATE,
        }
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Host and port (or instance) in a form safe to log.
    pub fn address(&self) -> String {
        match &self.instance {
            Some(instance) => format!("{}\\{}", self.server, instance),
            None => format!("{}:{}", self.server, self.port),
        }
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("server", &self.server)
            .field("instance", &self.instance)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"****")
            .field("connection_timeout_ms", &self.connection_timeout_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("encrypt", &self.encrypt)
            .field("trust_server_certificate", &self.trust_server_certificate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let descriptor = ConnectionDescriptor::new("localhost");
        assert_eq!(descriptor.port, 1433);
        assert_eq!(descriptor.connection_timeout(), Duration::from_secs(5));
        assert_eq!(descriptor.request_timeout(), Duration::from_secs(25));
        assert!(descriptor.encrypt);
        assert!(descriptor.trust_server_certificate);
    }

    #[test]
    fn test_debug_masks_password() {
        let mut descriptor = ConnectionDescriptor::new("db.internal");
        descriptor.password = "hunter2".to_string();
        let debug = format!("{:?}", descriptor);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("****"));
    }

    #[test]
    fn test_serialize_skips_password() {
        let mut descriptor = ConnectionDescriptor::new("db.internal");
        descriptor.password = "hunter2".to_string();
        let json = serde_json::to_string(&descriptor).unwrap();
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn test_address() {
        let mut descriptor = ConnectionDescriptor::new("db.internal");
        assert_eq!(descriptor.address(), "db.internal:1433");
        descriptor.instance = Some("SQLEXPRESS".to_string());
        assert_eq!(descriptor.address(), "db.internal\\SQLEXPRESS");
    }
}
