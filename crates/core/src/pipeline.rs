//! Declarative pipeline definitions and stage input resolution.
//!
//! A pipeline is a versioned, ordered list of stages. Each stage declares the
//! inputs it needs as binding expressions:
//!
//! | Expression                    | Resolved at dispatch time to           |
//! |-------------------------------|----------------------------------------|
//! | `${workflow.input.<key>}`     | the value of `<key>` in the run input  |
//! | `${<ref>.output.<field>}`     | passed through unchanged for the worker|
//! | anything else                 | the literal string                     |
//!
//! Resolution is pure: [`PipelineDefinition::resolve`] produces every
//! [`StageDispatchRequest`] of a run up front, so a missing input is reported
//! before anything reaches a job queue.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::DbId;

/// Run input: named values a pipeline's bindings can read.
pub type WorkflowInput = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Built-in contract pipeline
// ---------------------------------------------------------------------------

pub const CONTRACT_PIPELINE_NAME: &str = "contract_processing";
pub const CONTRACT_PIPELINE_VERSION: u32 = 1;

/// Workflow input key carrying the contract record id.
pub const CONTRACT_ID_INPUT: &str = "contractId";

/// Build the run input for processing one contract.
pub fn workflow_input_for_contract(contract_id: DbId) -> WorkflowInput {
    let mut input = WorkflowInput::new();
    input.insert(CONTRACT_ID_INPUT.to_string(), contract_id.into());
    input
}

// ---------------------------------------------------------------------------
// Binding expressions
// ---------------------------------------------------------------------------

const WORKFLOW_INPUT_PREFIX: &str = "workflow.input.";
const OUTPUT_SEGMENT: &str = ".output.";

/// Parsed form of a stage input binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingExpr {
    WorkflowInput(String),
    StageOutput { reference: String, field: String },
    Literal(String),
}

impl BindingExpr {
    pub fn parse(raw: &str) -> Self {
        let Some(inner) = raw
            .strip_prefix("${")
            .and_then(|rest| rest.strip_suffix('}'))
        else {
            return Self::Literal(raw.to_string());
        };

        if let Some(key) = inner.strip_prefix(WORKFLOW_INPUT_PREFIX) {
            if !key.is_empty() {
                return Self::WorkflowInput(key.to_string());
            }
        } else if let Some((reference, field)) = inner.split_once(OUTPUT_SEGMENT) {
            if !reference.is_empty() && !field.is_empty() {
                return Self::StageOutput {
                    reference: reference.to_string(),
                    field: field.to_string(),
                };
            }
        }
        Self::Literal(raw.to_string())
    }
}

// ---------------------------------------------------------------------------
// Definition types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    pub name: String,
    /// Identifier later stages and workflow outputs use to refer to this
    /// stage's output.
    pub reference_name: String,
    #[serde(default)]
    pub input_bindings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    pub version: u32,
    #[serde(default)]
    pub description: Option<String>,
    pub stages: Vec<StageDefinition>,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    /// A failed run may be dispatched again from the first stage.
    #[serde(default)]
    pub restartable: bool,
}

/// One resolved unit of work for a job queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDispatchRequest {
    pub pipeline: String,
    pub version: u32,
    pub run_id: Uuid,
    /// Zero-based position of the stage within the pipeline.
    pub position: usize,
    pub stage_name: String,
    pub reference_name: String,
    pub inputs: serde_json::Map<String, serde_json::Value>,
}

impl PipelineDefinition {
    /// The two-stage contract pipeline: OCR, then clause extraction over the
    /// OCR text.
    pub fn contract_processing() -> Self {
        let contract_binding = format!("${{{WORKFLOW_INPUT_PREFIX}{CONTRACT_ID_INPUT}}}");
        Self {
            name: CONTRACT_PIPELINE_NAME.to_string(),
            version: CONTRACT_PIPELINE_VERSION,
            description: Some("Extract renewal-relevant clauses from an uploaded contract".into()),
            stages: vec![
                StageDefinition {
                    name: "ocr".into(),
                    reference_name: "ocr_ref".into(),
                    input_bindings: BTreeMap::from([(
                        CONTRACT_ID_INPUT.to_string(),
                        contract_binding.clone(),
                    )]),
                },
                StageDefinition {
                    name: "clause_extraction".into(),
                    reference_name: "extract_ref".into(),
                    input_bindings: BTreeMap::from([
                        (CONTRACT_ID_INPUT.to_string(), contract_binding),
                        ("text".to_string(), "${ocr_ref.output.text}".to_string()),
                    ]),
                },
            ],
            outputs: BTreeMap::from([(
                "clauses".to_string(),
                "${extract_ref.output.clauses}".to_string(),
            )]),
            restartable: true,
        }
    }

    /// Parse and validate a definition from JSON.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let definition: Self = serde_json::from_str(json)
            .map_err(|e| CoreError::Validation(format!("Invalid pipeline definition: {e}")))?;
        definition.validate()?;
        Ok(definition)
    }

    /// Check structural rules.
    ///
    /// Stage-output references may only point at stages that run earlier;
    /// workflow outputs may refer to any stage.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::Validation("Pipeline name must not be empty".into()));
        }
        if self.version == 0 {
            return Err(CoreError::Validation(format!(
                "Pipeline '{}' version must be at least 1",
                self.name
            )));
        }
        if self.stages.is_empty() {
            return Err(CoreError::Validation(format!(
                "Pipeline '{}' has no stages",
                self.name
            )));
        }

        let mut earlier: HashSet<&str> = HashSet::new();
        for stage in &self.stages {
            if stage.name.trim().is_empty() || stage.reference_name.trim().is_empty() {
                return Err(CoreError::Validation(format!(
                    "Pipeline '{}' has a stage without a name or reference name",
                    self.name
                )));
            }
            for (input, raw) in &stage.input_bindings {
                if let BindingExpr::StageOutput { reference, .. } = BindingExpr::parse(raw) {
                    if !earlier.contains(reference.as_str()) {
                        return Err(CoreError::Validation(format!(
                            "Stage '{}' input '{input}' refers to '{reference}', which is not an earlier stage",
                            stage.reference_name
                        )));
                    }
                }
            }
            if !earlier.insert(stage.reference_name.as_str()) {
                return Err(CoreError::Validation(format!(
                    "Duplicate stage reference name '{}'",
                    stage.reference_name
                )));
            }
        }

        for (output, raw) in &self.outputs {
            if let BindingExpr::StageOutput { reference, .. } = BindingExpr::parse(raw) {
                if !earlier.contains(reference.as_str()) {
                    return Err(CoreError::Validation(format!(
                        "Workflow output '{output}' refers to unknown stage '{reference}'"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Resolve every stage of one run.
    ///
    /// Each request carries only the inputs its stage declares. Fails if a
    /// `${workflow.input.*}` binding names a key missing from `input`.
    pub fn resolve(
        &self,
        input: &WorkflowInput,
        run_id: Uuid,
    ) -> Result<Vec<StageDispatchRequest>, CoreError> {
        self.stages
            .iter()
            .enumerate()
            .map(|(position, stage)| {
                let mut inputs = serde_json::Map::new();
                for (name, raw) in &stage.input_bindings {
                    let value = match BindingExpr::parse(raw) {
                        BindingExpr::WorkflowInput(key) => {
                            input.get(&key).cloned().ok_or_else(|| {
                                CoreError::Validation(format!(
                                    "Missing workflow input '{key}' for stage '{}'",
                                    stage.reference_name
                                ))
                            })?
                        }
                        BindingExpr::StageOutput { .. } | BindingExpr::Literal(_) => {
                            serde_json::Value::String(raw.clone())
                        }
                    };
                    inputs.insert(name.clone(), value);
                }
                Ok(StageDispatchRequest {
                    pipeline: self.name.clone(),
                    version: self.version,
                    run_id,
                    position,
                    stage_name: stage.name.clone(),
                    reference_name: stage.reference_name.clone(),
                    inputs,
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
