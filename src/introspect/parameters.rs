//! Stage 2: map the parameters of one stored procedure.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::db::executable::{Parametrized, Statement};
use crate::db::executor::Datasource;
use crate::db::params::{Parameter, SqlType};
use crate::db::pool::PoolFactory;
use crate::db::types::{map_type, supports};
use crate::error::DbResult;
use crate::introspect::queries;
use crate::models::{AttributeDescriptor, RoutineInspection};

#[derive(Debug, Deserialize)]
struct ParameterRecord {
    #[serde(rename = "ParameterID", default)]
    ordinal: i32,
    #[serde(rename = "ParameterName", default)]
    name: Option<String>,
    #[serde(rename = "ParameterTypeName")]
    type_name: String,
    #[serde(rename = "Size", default)]
    size: i32,
    #[serde(rename = "Precision", default)]
    precision: i32,
    #[serde(rename = "Scale", default)]
    scale: i32,
    #[serde(rename = "IsNullable", default)]
    is_nullable: bool,
}

/// Builds the parameter signature of a routine.
pub struct ParameterMapper<'a, F: PoolFactory> {
    db: &'a Datasource<F>,
    routine: &'a str,
}

impl<'a, F: PoolFactory> ParameterMapper<'a, F> {
    pub fn new(db: &'a Datasource<F>, routine: &'a str) -> Self {
        Self { db, routine }
    }

    /// Returns `None` when any parameter has a type that cannot be mapped.
    pub async fn execute(&self) -> DbResult<Option<RoutineInspection>> {
        let statement = Statement::new(queries::ROUTINE_PARAMETERS).with_parameter(Parameter::new(
            queries::ROUTINE_NAME_PARAMETER,
            self.routine,
            SqlType::VarChar(Some(255)),
        ));
        let records: Vec<ParameterRecord> = self.db.exec_query(&statement).await?.decode_records()?;

        let mut attributes = Vec::with_capacity(records.len());
        for record in records {
            let name = record
                .name
                .as_deref()
                .map(|n| n.trim_start_matches('@'))
                .filter(|n| !n.is_empty())
                .map(str::to_string);

            if !supports(&record.type_name) {
                let parameter = name.as_deref().unwrap_or("<return value>");
                warn!(
                    routine = %self.routine,
                    parameter,
                    type_name = %record.type_name,
                    "Failed to generate code for {}: parameter {} has unsupported type {}",
                    self.routine,
                    parameter,
                    record.type_name
                );
                return Ok(None);
            }

            let type_descriptor =
                map_type(&record.type_name, record.size, record.precision, record.scale)?;
            attributes.push(AttributeDescriptor {
                name,
                type_descriptor,
                optional: record.is_nullable,
            });
            debug!(
                routine = %self.routine,
                ordinal = record.ordinal,
                "Mapped parameter"
            );
        }

        Ok(Some(RoutineInspection::from_attributes(attributes)))
    }
}
