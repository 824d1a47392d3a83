use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use clausewatch_core::error::CoreError;
use clausewatch_core::pipeline::{
    workflow_input_for_contract, PipelineDefinition, StageDefinition, WorkflowInput,
};
use clausewatch_pipeline::{
    DispatchError, JobQueue, JobRequest, JobTicket, MemoryJobQueue, PipelineDispatcher, QueueError,
};

// ---------------------------------------------------------------------------
// Test queues
// ---------------------------------------------------------------------------

/// Queue whose enqueue takes longer for earlier jobs and logs when each call
/// starts and finishes.
#[derive(Default)]
struct SlowQueue {
    events: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

#[async_trait]
impl JobQueue for SlowQueue {
    async fn enqueue(&self, request: JobRequest) -> Result<JobTicket, QueueError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let stage = request.parameters["reference_name"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        self.events.lock().unwrap().push(format!("start {stage}"));
        tokio::time::sleep(Duration::from_millis(30u64.saturating_sub(n as u64 * 10))).await;
        self.events.lock().unwrap().push(format!("end {stage}"));
        Ok(JobTicket { job_id: n as i64 + 1 })
    }
}

/// Queue that rejects the job at one position.
struct RejectingQueue {
    reject_at: usize,
    inner: MemoryJobQueue,
    calls: AtomicUsize,
}

#[async_trait]
impl JobQueue for RejectingQueue {
    async fn enqueue(&self, request: JobRequest) -> Result<JobTicket, QueueError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == self.reject_at {
            return Err(QueueError::Rejected("queue full".into()));
        }
        self.inner.enqueue(request).await
    }
}

fn three_stage_pipeline() -> PipelineDefinition {
    let stage = |name: &str, binding: &str| StageDefinition {
        name: name.to_string(),
        reference_name: format!("{name}_ref"),
        input_bindings: BTreeMap::from([("value".to_string(), binding.to_string())]),
    };
    PipelineDefinition {
        name: "three".into(),
        version: 1,
        description: None,
        stages: vec![
            stage("a", "${workflow.input.seed}"),
            stage("b", "${a_ref.output.value}"),
            stage("c", "${b_ref.output.value}"),
        ],
        outputs: BTreeMap::new(),
        restartable: false,
    }
}

fn seed_input() -> WorkflowInput {
    let mut input = WorkflowInput::new();
    input.insert("seed".into(), 7.into());
    input
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stages_are_enqueued_strictly_in_order() {
    let queue = Arc::new(SlowQueue::default());
    let dispatcher = PipelineDispatcher::new(queue.clone());

    let run = dispatcher
        .dispatch(&three_stage_pipeline(), &seed_input(), None)
        .await
        .unwrap();

    assert_eq!(run.stages_enqueued, 3);
    assert_eq!(
        *queue.events.lock().unwrap(),
        vec![
            "start a_ref",
            "end a_ref",
            "start b_ref",
            "end b_ref",
            "start c_ref",
            "end c_ref",
        ]
    );
    let ids: Vec<i64> = run.tickets.iter().map(|t| t.job_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn contract_pipeline_jobs_carry_stage_inputs() {
    let queue = Arc::new(MemoryJobQueue::new());
    let dispatcher = PipelineDispatcher::new(queue.clone());

    let run = dispatcher
        .dispatch(
            &PipelineDefinition::contract_processing(),
            &workflow_input_for_contract(11),
            Some(3),
        )
        .await
        .unwrap();

    let jobs = queue.jobs().await;
    assert_eq!(jobs.len(), 2);
    let (_, ocr) = &jobs[0];
    assert_eq!(ocr.job_type, "pipeline.stage");
    assert_eq!(ocr.submitted_by, Some(3));
    assert_eq!(ocr.parameters["stage_name"], "ocr");
    assert_eq!(ocr.parameters["inputs"]["contractId"], 11);
    assert_eq!(ocr.parameters["run_id"], run.run_id.to_string());

    let (_, extract) = &jobs[1];
    assert_eq!(extract.parameters["position"], 1);
    assert_eq!(extract.parameters["inputs"]["text"], "${ocr_ref.output.text}");
}

// ---------------------------------------------------------------------------
// Failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn enqueue_failure_stops_the_run() {
    let queue = Arc::new(RejectingQueue {
        reject_at: 1,
        inner: MemoryJobQueue::new(),
        calls: AtomicUsize::new(0),
    });
    let dispatcher = PipelineDispatcher::new(queue.clone());

    let result = dispatcher
        .dispatch(&three_stage_pipeline(), &seed_input(), None)
        .await;

    assert_matches!(
        result,
        Err(DispatchError::Enqueue { stage, position: 1, enqueued: 1, .. }) if stage == "b_ref"
    );
    assert_eq!(queue.calls.load(Ordering::SeqCst), 2);
    assert_eq!(queue.inner.len().await, 1);
}

#[tokio::test]
async fn missing_input_enqueues_nothing() {
    let queue = Arc::new(MemoryJobQueue::new());
    let dispatcher = PipelineDispatcher::new(queue.clone());

    let result = dispatcher
        .dispatch(&three_stage_pipeline(), &WorkflowInput::new(), None)
        .await;

    assert_matches!(result, Err(DispatchError::Invalid(CoreError::Validation(_))));
    assert!(queue.is_empty().await);
}

// ---------------------------------------------------------------------------
// Redispatch / batches
// ---------------------------------------------------------------------------

#[tokio::test]
async fn redispatch_requires_restartable_pipeline() {
    let queue = Arc::new(MemoryJobQueue::new());
    let dispatcher = PipelineDispatcher::new(queue.clone());

    assert_matches!(
        dispatcher
            .redispatch(&three_stage_pipeline(), &seed_input(), None)
            .await,
        Err(DispatchError::NotRestartable(_))
    );
    assert!(queue.is_empty().await);

    let contract = PipelineDefinition::contract_processing();
    let input = workflow_input_for_contract(5);
    let first = dispatcher.dispatch(&contract, &input, None).await.unwrap();
    let second = dispatcher.redispatch(&contract, &input, None).await.unwrap();

    assert_ne!(first.run_id, second.run_id);
    let jobs = queue.jobs().await;
    assert_eq!(jobs.len(), 4);
    assert_eq!(jobs[2].1.parameters["position"], 0);
    assert_eq!(jobs[2].1.parameters["stage_name"], "ocr");
}

#[tokio::test]
async fn dispatch_many_isolates_failing_runs() {
    let queue = Arc::new(MemoryJobQueue::new());
    let dispatcher = PipelineDispatcher::new(queue.clone());

    let inputs = vec![seed_input(), WorkflowInput::new(), seed_input()];
    let result = dispatcher
        .dispatch_many(&three_stage_pipeline(), inputs, None)
        .await;

    assert_eq!(result.attempted, 3);
    assert_eq!(result.succeeded, 2);
    assert!(!result.outcomes[1].is_dispatched());
    assert_eq!(result.message, "2 of 3 unit(s) dispatched");
    assert_eq!(queue.len().await, 6);
}

#[tokio::test]
async fn dispatch_many_with_no_inputs() {
    let dispatcher = PipelineDispatcher::new(Arc::new(MemoryJobQueue::new()));
    let result = dispatcher
        .dispatch_many(&three_stage_pipeline(), Vec::new(), None)
        .await;
    assert_eq!(result.message, "No matching units found");
}
