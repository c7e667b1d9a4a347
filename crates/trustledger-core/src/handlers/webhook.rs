use axum::{extract::Extension, Json};
use std::sync::Arc;
use tracing::{error, info};

use crate::conversation::Dispatcher;
use crate::models::webhook::{WebhookPayload, WebhookResponse};
use crate::utils::error::ApiError;

/// Entry point for inbound WhatsApp messages relayed by the gateway.
///
/// A missing sender identifier is the only client error; every other failure
/// that escapes the dispatcher becomes a generic server error. The reply text
/// rides back in the success envelope.
pub async fn handle_incoming_message(
    Extension(dispatcher): Extension<Arc<Dispatcher>>,
    Json(payload): Json<WebhookPayload>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let from = payload
        .from
        .as_deref()
        .filter(|from| !from.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing sender identifier".to_string()))?;

    let body = payload.body.as_deref().unwrap_or("");

    info!("Webhook message from {} ({} chars)", from, body.len());

    let reply = dispatcher.handle_message(from, body).await.map_err(|e| {
        error!("Failed to handle message from {}: {:#}", from, e);
        ApiError::InternalError(e.to_string())
    })?;

    Ok(Json(WebhookResponse::success(reply)))
}
