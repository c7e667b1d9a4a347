use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::NlpConfig;
use crate::conversation::dispatcher::{NlpOutcome, NlpProvider};
use crate::models::nlp::ParsedMessage;

#[derive(Debug, Serialize)]
struct ParseRequest<'a> {
    text: &'a str,
}

/// Client for the external NLU service. Any transport or decoding failure is
/// reported as `NlpOutcome::Unavailable`, never as an error.
#[derive(Clone)]
pub struct NlpClient {
    client: Client,
    config: NlpConfig,
}

impl NlpClient {
    pub fn new(config: NlpConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(config.timeout_seconds))
                .build()
                .expect("Failed to create HTTP client"),
            config,
        }
    }
}

#[async_trait]
impl NlpProvider for NlpClient {
    async fn parse(&self, text: &str) -> NlpOutcome {
        debug!("Sending to NLP service: \"{}\"", text);

        let response = match self
            .client
            .post(format!("{}/parse", self.config.base_url))
            .json(&ParseRequest { text })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Error communicating with NLP service: {}", e);
                return NlpOutcome::Unavailable;
            }
        };

        if !response.status().is_success() {
            warn!("NLP service returned status {}", response.status());
            return NlpOutcome::Unavailable;
        }

        match response.json::<ParsedMessage>().await {
            Ok(parsed) => {
                debug!(
                    "NLP result: intent={:?}, confidence={:.2}, entities={}",
                    parsed.intent,
                    parsed.confidence,
                    parsed.entities.len()
                );
                NlpOutcome::Parsed(parsed)
            }
            Err(e) => {
                warn!("Failed to decode NLP response: {}", e);
                NlpOutcome::Unavailable
            }
        }
    }
}
