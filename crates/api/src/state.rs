use std::sync::Arc;

use clausewatch_events::{Broadcaster, PgRecipientDirectory};
use clausewatch_pipeline::{PgJobQueue, PipelineDispatcher};

use crate::config::ServerConfig;
use crate::storage::ContractStorage;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc` or is already `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub pool: clausewatch_db::DbPool,
    pub config: Arc<ServerConfig>,
    pub storage: ContractStorage,
    pub dispatcher: PipelineDispatcher,
    pub broadcaster: Arc<Broadcaster>,
}

impl AppState {
    /// Wire the Postgres-backed queue and recipient directory.
    pub fn new(pool: clausewatch_db::DbPool, config: ServerConfig) -> Self {
        let queue = Arc::new(PgJobQueue::new(pool.clone()));
        let directory = Arc::new(PgRecipientDirectory::new(pool.clone()));

        Self {
            storage: ContractStorage::new(config.storage_root.clone()),
            dispatcher: PipelineDispatcher::new(queue.clone()),
            broadcaster: Arc::new(Broadcaster::new(directory, queue)),
            config: Arc::new(config),
            pool,
        }
    }
}
