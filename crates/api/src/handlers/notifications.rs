//! Admin notification broadcast.

use axum::extract::State;
use axum::Json;
use clausewatch_core::batch::BatchDispatchResult;
use clausewatch_core::roles::RecipientFilter;
use clausewatch_events::BroadcastMessage;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    /// `"all"` or a role name.
    pub recipients: String,
    pub subject: String,
    pub body: String,
}

/// POST /api/v1/admin/notifications/broadcast
///
/// Enqueues one email per matching active user. Per-recipient failures are
/// reported in the result, not as an error status.
pub async fn broadcast(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<BroadcastRequest>,
) -> AppResult<Json<DataResponse<BatchDispatchResult>>> {
    let filter = RecipientFilter::parse(&input.recipients)?;
    let message = BroadcastMessage {
        subject: input.subject,
        body: input.body,
    };

    let result = state
        .broadcaster
        .broadcast(&filter, &message, Some(admin.user_id))
        .await?;

    tracing::info!(
        admin_id = admin.user_id,
        %filter,
        attempted = result.attempted,
        succeeded = result.succeeded,
        "Broadcast dispatched",
    );
    Ok(Json(DataResponse { data: result }))
}
