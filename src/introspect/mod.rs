//! Stored procedure introspection.
//!
//! Three stages run against the catalog, in order:
//! 1. [`RoutineLister`] lists the routines of the database
//! 2. [`ParameterMapper`] maps the parameters of one routine
//! 3. [`ResultMapper`] maps the first result set of one routine
//!
//! Stages 2 and 3 return `None` when a routine uses a type with no portable
//! mapping. The routine is then left out of generation.

pub mod parameters;
pub mod queries;
pub mod results;
pub mod routines;

pub use parameters::ParameterMapper;
pub use results::ResultMapper;
pub use routines::RoutineLister;
