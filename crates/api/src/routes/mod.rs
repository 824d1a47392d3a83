pub mod admin;
pub mod contracts;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /contracts                                       submit (multipart)
/// /contracts/{id}                                  get (owner only)
/// /contracts/{id}/reprocess                        restart processing
///
/// /admin/notifications/broadcast                   broadcast email (admin only)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/contracts", contracts::router())
        .nest("/admin", admin::router())
}
