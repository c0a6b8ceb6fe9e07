//! Stored Procedure Inspector Library
//!
//! This library inspects the stored procedures of a SQL Server database and
//! describes their parameters and result sets with portable type descriptors,
//! ready for a code emitter.

pub mod config;
pub mod db;
pub mod error;
pub mod generator;
pub mod introspect;
pub mod models;

pub use config::Config;
pub use error::{DbError, DbResult};
pub use generator::Generator;
