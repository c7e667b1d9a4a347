use serde::Deserialize;

/// One typed fragment from the NLP response, e.g. {entity: "AMOUNT", value: "500"}.
/// Unknown fields (confidence, span offsets) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEntity {
    pub entity: String,
    pub value: String,
}

impl RawEntity {
    /// Synthesize a single tuple, used when a slot-filling follow-up reply has
    /// to be reinterpreted as one entity kind.
    pub fn new(entity: &str, value: &str) -> Self {
        Self {
            entity: entity.to_string(),
            value: value.to_string(),
        }
    }
}

/// Parsed NLU result for one message.
#[derive(Debug, Clone, Deserialize)]
pub struct ParsedMessage {
    pub intent: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub entities: Vec<RawEntity>,
}
