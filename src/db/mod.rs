//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Connection string resolution
//! - Connection pool management
//! - Statement and routine execution
//! - Type mappings
//! - SQL Server pools and requests

pub mod connection_string;
pub mod executable;
pub mod executor;
pub mod params;
pub mod pool;
pub mod tds;
pub mod types;

pub use executable::{Parametrized, RoutineCall, SqlRequest, Statement};
pub use executor::Datasource;
pub use params::{Parameter, SqlType};
pub use pool::{ManagedPool, PoolFactory, PoolId, PoolRegistry};
pub use tds::{TdsPool, TdsPoolFactory};
pub use types::{VendorType, map_type, supports};
