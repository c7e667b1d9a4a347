use serde::{Deserialize, Serialize};

use crate::utils::entity_extractor::ExtractedEntities;

/// What the bot expects next from a given user. Ephemeral: absent or expired
/// entries mean `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingItemName,
    AwaitingExpenseAmount,
    AwaitingExpenseItem,
    AwaitingExpensePersons,
}

/// Partial shared-expense record gathered across turns (slot-filling).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExpenseContext {
    pub amount: Option<f64>,
    pub item: Option<String>,
    #[serde(default)]
    pub persons: Vec<String>,
}

impl From<ExtractedEntities> for ExpenseContext {
    fn from(entities: ExtractedEntities) -> Self {
        Self {
            amount: entities.amount,
            item: entities.item,
            persons: entities.persons,
        }
    }
}

/// The per-user entry kept in the state store: the state tag plus whatever
/// partial context has been gathered so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StateEntry {
    pub state: ConversationState,
    #[serde(default)]
    pub context: ExpenseContext,
}

impl StateEntry {
    pub fn new(state: ConversationState, context: ExpenseContext) -> Self {
        Self { state, context }
    }

    /// A state that expects a bare reply, with no carried context.
    pub fn awaiting(state: ConversationState) -> Self {
        Self {
            state,
            context: ExpenseContext::default(),
        }
    }
}
