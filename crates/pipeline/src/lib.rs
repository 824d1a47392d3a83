//! Pipeline dispatch onto a job queue.
//!
//! [`queue::JobQueue`] is the seam to the queue backend; [`PgJobQueue`]
//! writes `jobs` rows and [`MemoryJobQueue`] keeps jobs in process.
//! [`PipelineDispatcher`] enqueues a pipeline's stages strictly in order.

pub mod dispatcher;
pub mod queue;

pub use dispatcher::{DispatchError, PipelineDispatcher, PipelineRun};
pub use queue::{JobQueue, JobRequest, JobTicket, MemoryJobQueue, PgJobQueue, QueueError};
