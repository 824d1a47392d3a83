use axum::routing::post;
use axum::Router;

use crate::handlers::notifications;
use crate::state::AppState;

/// Routes mounted at `/admin`. Every handler requires the admin role.
///
/// ```text
/// POST   /notifications/broadcast    broadcast
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/notifications/broadcast", post(notifications::broadcast))
}
