//! Job type names written to the `jobs.job_type` column.
//!
//! Producers (pipeline dispatcher, notification broadcast) and consumers
//! (stage workers, the email worker) must agree on these strings.

/// One stage of a pipeline run, executed by an external stage worker.
pub const JOB_TYPE_PIPELINE_STAGE: &str = "pipeline.stage";

/// One outbound email, delivered by the email worker.
pub const JOB_TYPE_EMAIL_SEND: &str = "email.send";
