//! Ordered dispatch of pipeline runs.
//!
//! Every stage of a run is resolved before the first enqueue, then stages are
//! enqueued one at a time: stage N is only offered to the queue after stage
//! N-1's enqueue has returned. The first failure stops the run.

use std::sync::Arc;

use clausewatch_core::batch::{dispatch_sequential, BatchDispatchResult};
use clausewatch_core::error::CoreError;
use clausewatch_core::pipeline::{PipelineDefinition, WorkflowInput};
use clausewatch_core::types::DbId;
use serde::Serialize;
use uuid::Uuid;

use crate::queue::{JobQueue, JobRequest, JobTicket, QueueError};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The definition is invalid or the input lacks a bound key. Nothing was
    /// enqueued.
    #[error(transparent)]
    Invalid(#[from] CoreError),

    /// Stage `stage` could not be enqueued; `enqueued` earlier stages were.
    #[error("Failed to enqueue stage '{stage}' (position {position}) after {enqueued} stage(s): {source}")]
    Enqueue {
        run_id: Uuid,
        stage: String,
        position: usize,
        enqueued: usize,
        #[source]
        source: QueueError,
    },

    #[error("Pipeline '{0}' is not restartable")]
    NotRestartable(String),
}

/// Summary of a dispatched run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub pipeline: String,
    pub version: u32,
    pub stages_enqueued: usize,
    /// Queue tickets in stage order.
    pub tickets: Vec<JobTicket>,
}

/// Turns pipeline definitions plus input into queued stage jobs.
#[derive(Clone)]
pub struct PipelineDispatcher {
    queue: Arc<dyn JobQueue>,
}

impl PipelineDispatcher {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    /// Dispatch one run of `definition` over `input`.
    pub async fn dispatch(
        &self,
        definition: &PipelineDefinition,
        input: &WorkflowInput,
        submitted_by: Option<DbId>,
    ) -> Result<PipelineRun, DispatchError> {
        definition.validate()?;
        let run_id = Uuid::new_v4();
        let requests = definition.resolve(input, run_id)?;

        let mut tickets = Vec::with_capacity(requests.len());
        for request in &requests {
            let enqueued = JobRequest::stage(request).map(|job| job.submitted_by(submitted_by));
            let ticket = match enqueued {
                Ok(job) => self.queue.enqueue(job).await,
                Err(e) => Err(e),
            }
            .map_err(|source| {
                tracing::warn!(
                    %run_id,
                    pipeline = %definition.name,
                    stage = %request.reference_name,
                    enqueued = tickets.len(),
                    error = %source,
                    "Pipeline dispatch stopped",
                );
                DispatchError::Enqueue {
                    run_id,
                    stage: request.reference_name.clone(),
                    position: request.position,
                    enqueued: tickets.len(),
                    source,
                }
            })?;
            tickets.push(ticket);
        }

        tracing::info!(
            %run_id,
            pipeline = %definition.name,
            version = definition.version,
            stages = tickets.len(),
            "Pipeline dispatched",
        );
        Ok(PipelineRun {
            run_id,
            pipeline: definition.name.clone(),
            version: definition.version,
            stages_enqueued: tickets.len(),
            tickets,
        })
    }

    /// Dispatch a restartable pipeline again from its first stage.
    pub async fn redispatch(
        &self,
        definition: &PipelineDefinition,
        input: &WorkflowInput,
        submitted_by: Option<DbId>,
    ) -> Result<PipelineRun, DispatchError> {
        if !definition.restartable {
            return Err(DispatchError::NotRestartable(definition.name.clone()));
        }
        tracing::info!(pipeline = %definition.name, "Pipeline restarted from first stage");
        self.dispatch(definition, input, submitted_by).await
    }

    /// Dispatch one run per input. Each run is an independent unit: a failed
    /// run is recorded and the next input is still dispatched.
    pub async fn dispatch_many(
        &self,
        definition: &PipelineDefinition,
        inputs: Vec<WorkflowInput>,
        submitted_by: Option<DbId>,
    ) -> BatchDispatchResult {
        dispatch_sequential(inputs, move |input| async move {
            self.dispatch(definition, &input, submitted_by)
                .await
                .map(|_| ())
        })
        .await
    }
}
