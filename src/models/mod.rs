//! Data models for the routine inspector.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod inspection;
pub mod query;

// Re-export commonly used types
pub use connection::ConnectionDescriptor;
pub use inspection::{
    AttributeDescriptor, GenerationOutput, InspectedRoutine, RoutineInspection, RoutineSignature,
    SemanticType, TypeDescriptor,
};
pub use query::{QueryResult, Record, RecordSet, SqlValue};
