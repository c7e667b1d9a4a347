use serde::{Deserialize, Serialize};

/// Payload forwarded by the dev gateway, one per inbound WhatsApp message.
/// The core consumes `from` and `body`; the rest is passed-through metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub message_id: Option<String>,
}

/// Success envelope returned to the gateway. `reply` is the text to deliver
/// to the user, absent when no reply is produced.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

impl WebhookResponse {
    pub fn success(reply: Option<String>) -> Self {
        Self {
            status: "success".to_string(),
            reply,
        }
    }
}
