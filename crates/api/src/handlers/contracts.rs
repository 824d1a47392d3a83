//! Contract submission and retrieval.
//!
//! A submission stores the uploaded bytes, records the contract and
//! dispatches the `contract_processing` pipeline for it. Resubmitting the
//! same bytes as the same owner resolves to the existing contract and only
//! dispatches again when no earlier run got every stage enqueued.

use std::collections::BTreeSet;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use clausewatch_core::batch::BatchDispatchResult;
use clausewatch_core::error::CoreError;
use clausewatch_core::job_types::JOB_TYPE_PIPELINE_STAGE;
use clausewatch_core::pipeline::{
    workflow_input_for_contract, PipelineDefinition, CONTRACT_ID_INPUT,
};
use clausewatch_core::types::DbId;
use clausewatch_db::models::contract::{Contract, CreateContract};
use clausewatch_db::models::job::Job;
use clausewatch_db::repositories::{ContractRepo, JobRepo, UserRepo};
use clausewatch_pipeline::{DispatchError, PipelineRun};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{unique_violation, AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Multipart field carrying the contract bytes.
const FILE_FIELD: &str = "file";

/// Constraint guarding one contract per owner and content.
const OWNER_CONTENT_CONSTRAINT: &str = "uq_contracts_owner_content";

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct PipelineSummary {
    pub run_id: Uuid,
    pub stages_enqueued: usize,
}

impl From<PipelineRun> for PipelineSummary {
    fn from(run: PipelineRun) -> Self {
        Self {
            run_id: run.run_id,
            stages_enqueued: run.stages_enqueued,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub contract: Contract,
    /// `None` when the upload matched an already-processed contract.
    pub pipeline: Option<PipelineSummary>,
}

// ---------------------------------------------------------------------------
// Upload parsing
// ---------------------------------------------------------------------------

struct Upload {
    file_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

async fn read_upload(multipart: &mut Multipart) -> AppResult<Upload> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue; // ignore unknown fields
        }
        let file_name = field
            .file_name()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("contract")
            .to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        upload = Some(Upload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    let upload =
        upload.ok_or_else(|| AppError::BadRequest("Missing required 'file' field".into()))?;
    if upload.bytes.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".into()));
    }
    Ok(upload)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/contracts
///
/// Returns 201 with the new contract and its pipeline run, or 200 with the
/// existing contract when the same owner already submitted these bytes.
pub async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<SubmissionResponse>>)> {
    let owner = UserRepo::find_by_id(&state.pool, auth.user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Core(CoreError::Unauthorized("Account is not active".into())))?;

    let upload = read_upload(&mut multipart).await?;
    let sha256 = crate::storage::content_sha256(&upload.bytes);

    if let Some(existing) =
        ContractRepo::find_by_owner_and_hash(&state.pool, owner.id, &sha256).await?
    {
        return resubmitted(&state, existing, owner.id).await;
    }

    let storage_path = state
        .storage
        .store(owner.id, &sha256, &upload.bytes)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to store contract: {e}")))?;

    let input = CreateContract {
        owner_user_id: owner.id,
        file_name: upload.file_name,
        file_size: upload.bytes.len() as i64,
        content_type: upload.content_type,
        content_sha256: sha256.clone(),
        storage_path,
    };
    let contract = match ContractRepo::create(&state.pool, &input).await {
        Ok(contract) => contract,
        // A concurrent submission of the same bytes won the insert.
        Err(e) if unique_violation(&e) == Some(OWNER_CONTENT_CONSTRAINT) => {
            let existing = ContractRepo::find_by_owner_and_hash(&state.pool, owner.id, &sha256)
                .await?
                .ok_or(e)?;
            return resubmitted(&state, existing, owner.id).await;
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(
        contract_id = contract.id,
        owner_user_id = owner.id,
        file_size = contract.file_size,
        "Contract submitted",
    );

    let run = dispatch_processing(&state, contract.id, owner.id).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: SubmissionResponse {
                contract,
                pipeline: Some(run.into()),
            },
        }),
    ))
}

/// Answer a duplicate submission.
///
/// Processing is dispatched again unless the newest run recorded for the
/// contract has a job for every stage. A run that stopped part way (an
/// enqueue failed) starts over from the first stage.
async fn resubmitted(
    state: &AppState,
    contract: Contract,
    owner_user_id: DbId,
) -> AppResult<(StatusCode, Json<DataResponse<SubmissionResponse>>)> {
    let definition = PipelineDefinition::contract_processing();
    let mut inputs = serde_json::Map::new();
    inputs.insert(CONTRACT_ID_INPUT.to_string(), contract.id.into());
    let filter = serde_json::json!({ "pipeline": &definition.name, "inputs": inputs });
    let jobs = JobRepo::list_matching(&state.pool, JOB_TYPE_PIPELINE_STAGE, &filter).await?;

    let pipeline = match latest_run_coverage(&definition, &jobs) {
        RunCoverage::Complete => {
            tracing::info!(contract_id = contract.id, "Contract already submitted");
            None
        }
        RunCoverage::None => {
            tracing::info!(contract_id = contract.id, "Resubmitted contract was never dispatched");
            Some(dispatch_processing(state, contract.id, owner_user_id).await?.into())
        }
        RunCoverage::Partial { run_id, enqueued } => {
            tracing::warn!(
                contract_id = contract.id,
                %run_id,
                enqueued,
                stages = definition.stages.len(),
                "Previous run is incomplete; dispatching again from the first stage",
            );
            let run = state
                .dispatcher
                .redispatch(
                    &definition,
                    &workflow_input_for_contract(contract.id),
                    Some(owner_user_id),
                )
                .await?;
            Some(run.into())
        }
    };

    Ok((
        StatusCode::OK,
        Json(DataResponse {
            data: SubmissionResponse { contract, pipeline },
        }),
    ))
}

/// Stage identity carried in a `pipeline.stage` job's parameters.
#[derive(Deserialize)]
struct StageJobRef {
    run_id: Uuid,
    position: usize,
}

#[derive(Debug, PartialEq, Eq)]
enum RunCoverage {
    /// No stage job exists.
    None,
    /// The newest run has a job for every stage.
    Complete,
    /// The newest run is missing at least one stage.
    Partial { run_id: Uuid, enqueued: usize },
}

/// Classify the newest run among `jobs`, which are ordered oldest first.
fn latest_run_coverage(definition: &PipelineDefinition, jobs: &[Job]) -> RunCoverage {
    let stages: Vec<StageJobRef> = jobs
        .iter()
        .filter_map(|job| serde_json::from_value(job.parameters.clone()).ok())
        .collect();
    let Some(latest) = stages.last().map(|s| s.run_id) else {
        return RunCoverage::None;
    };

    let positions: BTreeSet<usize> = stages
        .iter()
        .filter(|s| s.run_id == latest)
        .map(|s| s.position)
        .collect();
    if (0..definition.stages.len()).all(|p| positions.contains(&p)) {
        RunCoverage::Complete
    } else {
        RunCoverage::Partial {
            run_id: latest,
            enqueued: positions.len(),
        }
    }
}

async fn dispatch_processing(
    state: &AppState,
    contract_id: DbId,
    submitted_by: DbId,
) -> AppResult<PipelineRun> {
    let run = state
        .dispatcher
        .dispatch(
            &PipelineDefinition::contract_processing(),
            &workflow_input_for_contract(contract_id),
            Some(submitted_by),
        )
        .await?;
    Ok(run)
}

/// GET /api/v1/contracts/{id}
///
/// Only the owner can see a contract; anyone else gets 404.
pub async fn get_by_id(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Contract>>> {
    let contract = ContractRepo::find_owned(&state.pool, id, auth.user_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("Contract", id)))?;
    Ok(Json(DataResponse { data: contract }))
}

/// POST /api/v1/contracts/{id}/reprocess
///
/// Starts a fresh run of the processing pipeline from its first stage.
pub async fn reprocess(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<(StatusCode, Json<DataResponse<PipelineSummary>>)> {
    let contract = ContractRepo::find_owned(&state.pool, id, auth.user_id)
        .await?
        .ok_or_else(|| AppError::Core(CoreError::not_found("Contract", id)))?;

    let run = state
        .dispatcher
        .redispatch(
            &PipelineDefinition::contract_processing(),
            &workflow_input_for_contract(contract.id),
            Some(auth.user_id),
        )
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse { data: run.into() }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct BulkReprocessRequest {
    pub contract_ids: Vec<DbId>,
}

/// POST /api/v1/contracts/reprocess
///
/// Starts a fresh run for each listed contract. Every id must belong to the
/// caller; duplicates are dispatched once. A run that fails to enqueue is
/// reported in the result and the remaining contracts are still dispatched.
pub async fn reprocess_many(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(input): Json<BulkReprocessRequest>,
) -> AppResult<Json<DataResponse<BatchDispatchResult>>> {
    let definition = PipelineDefinition::contract_processing();
    if !definition.restartable {
        return Err(DispatchError::NotRestartable(definition.name).into());
    }

    let mut seen = BTreeSet::new();
    let mut inputs = Vec::with_capacity(input.contract_ids.len());
    for id in input.contract_ids {
        if !seen.insert(id) {
            continue;
        }
        let contract = ContractRepo::find_owned(&state.pool, id, auth.user_id)
            .await?
            .ok_or_else(|| AppError::Core(CoreError::not_found("Contract", id)))?;
        inputs.push(workflow_input_for_contract(contract.id));
    }

    let result = state
        .dispatcher
        .dispatch_many(&definition, inputs, Some(auth.user_id))
        .await;

    tracing::info!(
        user_id = auth.user_id,
        attempted = result.attempted,
        succeeded = result.succeeded,
        "Bulk reprocess dispatched",
    );
    Ok(Json(DataResponse { data: result }))
}
