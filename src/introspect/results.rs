//! Stage 3: map the first result set of one stored procedure.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::db::executable::{Parametrized, Statement};
use crate::db::executor::Datasource;
use crate::db::params::{Parameter, SqlType};
use crate::db::pool::PoolFactory;
use crate::db::types::{clean_type_name, map_type, supports};
use crate::error::DbResult;
use crate::introspect::queries;
use crate::models::{AttributeDescriptor, RoutineInspection};

/// One row of `sys.dm_exec_describe_first_result_set_for_object`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResultColumnRecord {
    name: Option<String>,
    is_nullable: Option<bool>,
    system_type_name: Option<String>,
    max_length: Option<i32>,
    precision: Option<i32>,
    scale: Option<i32>,
    error_state: Option<i32>,
    error_type_desc: Option<String>,
    error_message: Option<String>,
}

impl ResultColumnRecord {
    fn has_error(&self) -> bool {
        self.error_state.is_some_and(|state| state != 0)
    }

    fn error_description(&self) -> &str {
        self.error_type_desc
            .as_deref()
            .or(self.error_message.as_deref())
            .unwrap_or("unknown error")
    }
}

/// Builds the result signature of a routine.
pub struct ResultMapper<'a, F: PoolFactory> {
    db: &'a Datasource<F>,
    routine: &'a str,
}

impl<'a, F: PoolFactory> ResultMapper<'a, F> {
    pub fn new(db: &'a Datasource<F>, routine: &'a str) -> Self {
        Self { db, routine }
    }

    /// Returns `None` when any column has a type that cannot be mapped. A
    /// routine the server cannot describe yields an inspection carrying only
    /// the error message.
    pub async fn execute(&self) -> DbResult<Option<RoutineInspection>> {
        let statement = Statement::new(queries::ROUTINE_RESULTS).with_parameter(Parameter::new(
            queries::ROUTINE_NAME_PARAMETER,
            self.routine,
            SqlType::VarChar(Some(255)),
        ));
        let records: Vec<ResultColumnRecord> =
            self.db.exec_query(&statement).await?.decode_records()?;

        if let Some(first) = records.first().filter(|record| record.has_error()) {
            let message = format!(
                "Failed to inspect the results of {}: {}",
                self.routine,
                first.error_description()
            );
            warn!(
                routine = %self.routine,
                error_state = ?first.error_state,
                "{}",
                message
            );
            return Ok(Some(RoutineInspection::failed(message)));
        }

        let mut attributes = Vec::with_capacity(records.len());
        for record in records {
            let type_name = clean_type_name(record.system_type_name.as_deref().unwrap_or_default());

            if !supports(&type_name) {
                let column = record.name.as_deref().unwrap_or("<unnamed>");
                warn!(
                    routine = %self.routine,
                    column,
                    type_name = %type_name,
                    "Failed to generate code for {}: result column {} has unsupported type {}",
                    self.routine,
                    column,
                    type_name
                );
                return Ok(None);
            }

            let type_descriptor = map_type(
                &type_name,
                record.max_length.unwrap_or_default(),
                record.precision.unwrap_or_default(),
                record.scale.unwrap_or_default(),
            )?;
            attributes.push(AttributeDescriptor {
                name: record.name.filter(|n| !n.is_empty()),
                type_descriptor,
                optional: record.is_nullable.unwrap_or(true),
            });
        }

        debug!(
            routine = %self.routine,
            columns = attributes.len(),
            "Mapped result set"
        );
        Ok(Some(RoutineInspection::from_attributes(attributes)))
    }
}
