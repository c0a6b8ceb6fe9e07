//! Error types for the routine inspector.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Callers of the execution pipeline only ever see the sanitized [`DbError::Database`]
//! variant; the full driver detail travels in [`DriverError`] and is written to the
//! diagnostic channel before it is discarded.

use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid connection string: {message}")]
    Parse { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Sanitized failure of a connect or execute operation.
    #[error("Received an error while executing a database operation")]
    Database {
        name: String,
        /// e.g., "EREQUEST" for a server-side error
        code: Option<String>,
        internal_message: String,
        /// Server error number, only present for request errors.
        number: Option<i32>,
    },

    #[error(
        "Type is not supported: type_name={type_name}, size={size}, precision={precision}, scale={scale}"
    )]
    UnsupportedType {
        type_name: String,
        size: i32,
        precision: i32,
        scale: i32,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection string parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an unsupported type error.
    pub fn unsupported_type(
        type_name: impl Into<String>,
        size: i32,
        precision: i32,
        scale: i32,
    ) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
            size,
            precision,
            scale,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Driver error code of a sanitized database error.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Database { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Check if this error was caused by a lost or unreachable connection.
    ///
    /// The core never retries; this only lets callers decide whether to.
    pub fn is_retryable(&self) -> bool {
        matches!(self.code(), Some(CODE_SOCKET) | Some(CODE_TIMEOUT))
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

pub const CODE_REQUEST: &str = "EREQUEST";
pub const CODE_SOCKET: &str = "ESOCKET";
pub const CODE_TIMEOUT: &str = "ETIMEOUT";
pub const CODE_LOGIN: &str = "ELOGIN";
pub const CODE_TLS: &str = "ETLS";
pub const CODE_DRIVER: &str = "EDRIVER";
pub const CODE_NOT_OPEN: &str = "ENOTOPEN";

/// SQL Server error number reported for failed logins.
const LOGIN_FAILED_NUMBER: u32 = 18456;

/// Which side of the wire an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Connection,
    Request,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection => write!(f, "ConnectionError"),
            Self::Request => write!(f, "RequestError"),
        }
    }
}

/// Full native failure detail as reported by the driver.
///
/// Never handed to callers of the execution pipeline: use [`DriverError::report`]
/// to log it and obtain the sanitized [`DbError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    pub class: ErrorClass,
    pub code: &'static str,
    pub message: String,
    pub number: Option<i32>,
}

impl DriverError {
    fn new(class: ErrorClass, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            class,
            code,
            message: message.into(),
            number: None,
        }
    }

    /// Server-side error raised while running a request.
    pub fn request(message: impl Into<String>, number: i32) -> Self {
        Self {
            number: Some(number),
            ..Self::new(ErrorClass::Request, CODE_REQUEST, message)
        }
    }

    pub fn socket(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Connection, CODE_SOCKET, message)
    }

    pub fn login(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Connection, CODE_LOGIN, message)
    }

    pub fn tls(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Connection, CODE_TLS, message)
    }

    pub fn connect_timeout(timeout: Duration) -> Self {
        Self::new(
            ErrorClass::Connection,
            CODE_TIMEOUT,
            format!("Failed to connect in {}ms", timeout.as_millis()),
        )
    }

    pub fn request_timeout(timeout: Duration) -> Self {
        Self::new(
            ErrorClass::Request,
            CODE_TIMEOUT,
            format!("Timeout: Request failed to complete in {}ms", timeout.as_millis()),
        )
    }

    pub fn driver(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Request, CODE_DRIVER, message)
    }

    pub fn not_open() -> Self {
        Self::new(ErrorClass::Connection, CODE_NOT_OPEN, "Connection not yet open")
    }

    /// True when the failure means the pool lost its connectivity.
    pub fn is_connection_loss(&self) -> bool {
        self.class == ErrorClass::Connection && matches!(self.code, CODE_SOCKET | CODE_TIMEOUT)
    }

    /// Write the full detail to the diagnostic channel and return the sanitized error.
    pub fn report(self) -> DbError {
        match self.number {
            Some(number) => error!(
                name = %self.class,
                code = self.code,
                message = %self.message,
                number,
                "Caught an exception during MSSQL query execution"
            ),
            None => error!(
                name = %self.class,
                code = self.code,
                message = %self.message,
                "Caught an exception during MSSQL query execution"
            ),
        }
        self.into()
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.class, self.code, self.message)?;
        if let Some(number) = self.number {
            write!(f, " [number {}]", number)?;
        }
        Ok(())
    }
}

impl std::error::Error for DriverError {}

impl From<DriverError> for DbError {
    fn from(err: DriverError) -> Self {
        DbError::Database {
            name: err.class.to_string(),
            code: Some(err.code.to_string()),
            internal_message: err.message,
            number: err.number,
        }
    }
}

/// Convert tiberius errors to DriverError.
impl From<tiberius::error::Error> for DriverError {
    fn from(err: tiberius::error::Error) -> Self {
        use tiberius::error::Error;

        match err {
            Error::Io { message, .. } => DriverError::socket(message),
            Error::Server(token) if token.code() == LOGIN_FAILED_NUMBER => {
                DriverError::login(token.message().to_string())
            }
            Error::Server(token) => {
                DriverError::request(token.message().to_string(), token.code() as i32)
            }
            Error::Tls(message) => DriverError::tls(message),
            Error::Routing { host, port } => DriverError::socket(format!(
                "Server requested routing to {}:{}, which is not supported",
                host, port
            )),
            other => DriverError::driver(other.to_string()),
        }
    }
}
