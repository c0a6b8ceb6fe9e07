//! Stage 1: list the stored procedures of the database.

use serde::Deserialize;
use tracing::debug;

use crate::db::executable::Statement;
use crate::db::executor::Datasource;
use crate::db::pool::PoolFactory;
use crate::error::DbResult;
use crate::introspect::queries;
use crate::models::RoutineSignature;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct RoutineRecord {
    routine_name: String,
}

/// Lists every routine except temporary ones, in catalog order.
pub struct RoutineLister<'a, F: PoolFactory> {
    db: &'a Datasource<F>,
}

impl<'a, F: PoolFactory> RoutineLister<'a, F> {
    pub fn new(db: &'a Datasource<F>) -> Self {
        Self { db }
    }

    pub async fn execute(&self) -> DbResult<Vec<RoutineSignature>> {
        let result = self
            .db
            .exec_query(&Statement::new(queries::LIST_ROUTINES))
            .await?;
        let records: Vec<RoutineRecord> = result.decode_records()?;

        let routines: Vec<_> = records
            .into_iter()
            .filter(|record| !is_temporary(&record.routine_name))
            .map(|record| RoutineSignature {
                name: record.routine_name,
            })
            .collect();

        debug!(count = routines.len(), "Listed routines");
        Ok(routines)
    }
}

/// Temporary procedures (`#name`, `##name`) live in tempdb and are skipped.
fn is_temporary(name: &str) -> bool {
    name.starts_with('#')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_ignores_schema() {
        let record: RoutineRecord = serde_json::from_value(serde_json::json!({
            "ROUTINE_SCHEMA": "sales",
            "ROUTINE_NAME": "usp_Orders"
        }))
        .unwrap();
        assert_eq!(record.routine_name, "usp_Orders");
    }

    #[test]
    fn test_is_temporary() {
        assert!(is_temporary("#scratch"));
        assert!(is_temporary("##global"));
        assert!(!is_temporary("usp_Get#Thing"));
        assert!(!is_temporary("usp_Get"));
    }
}
