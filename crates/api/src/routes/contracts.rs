use axum::routing::{get, post};
use axum::Router;

use crate::handlers::contracts;
use crate::state::AppState;

/// Routes mounted at `/contracts`.
///
/// ```text
/// POST   /                   create (multipart, field `file`)
/// POST   /reprocess          reprocess_many
/// GET    /{id}               get_by_id
/// POST   /{id}/reprocess     reprocess
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(contracts::create))
        .route("/reprocess", post(contracts::reprocess_many))
        .route("/{id}", get(contracts::get_by_id))
        .route("/{id}/reprocess", post(contracts::reprocess))
}
