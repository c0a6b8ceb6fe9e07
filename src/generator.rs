//! Generation run.
//!
//! Lists the routines of one database and inspects each of them in turn,
//! producing the [`GenerationOutput`] the code emitter consumes.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::db::executor::Datasource;
use crate::db::pool::PoolFactory;
use crate::error::DbResult;
use crate::introspect::{ParameterMapper, ResultMapper, RoutineLister};
use crate::models::{GenerationOutput, InspectedRoutine};

/// Drives the introspection stages over every routine of a datasource.
#[derive(Debug)]
pub struct Generator<F: PoolFactory> {
    db: Datasource<F>,
}

impl<F: PoolFactory> Generator<F> {
    pub fn new(db: Datasource<F>) -> Self {
        Self { db }
    }

    pub fn datasource(&self) -> &Datasource<F> {
        &self.db
    }

    /// Inspect every routine, one at a time. Routines using an unsupported
    /// type are listed in `skipped`; execution failures abort the run.
    pub async fn generate(&self) -> DbResult<GenerationOutput> {
        let start = Instant::now();
        let routines = RoutineLister::new(&self.db).execute().await?;

        let mut output = GenerationOutput {
            routine_names: routines.iter().map(|r| r.name.clone()).collect(),
            ..GenerationOutput::default()
        };

        for routine in routines {
            let name = routine.name;
            debug!(routine = %name, "Inspecting routine");

            let Some(parameters) = ParameterMapper::new(&self.db, &name).execute().await? else {
                output.skipped.push(name);
                continue;
            };
            let Some(results) = ResultMapper::new(&self.db, &name).execute().await? else {
                output.skipped.push(name);
                continue;
            };

            output.routines.push(InspectedRoutine {
                name,
                parameters,
                results,
            });
        }

        if !output.skipped.is_empty() {
            warn!(
                count = output.skipped.len(),
                skipped = ?output.skipped,
                "Routines skipped because of unsupported types"
            );
        }
        info!(
            pool_id = %self.db.pool_id(),
            routines = output.routines.len(),
            skipped = output.skipped.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Generation finished"
        );
        Ok(output)
    }

    /// Close every pool of the shared registry.
    pub async fn shutdown(&self) {
        self.db.registry().close_all().await;
    }
}
