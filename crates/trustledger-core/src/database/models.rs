use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Persisted onboarding stage of a user. Distinct from the ephemeral
/// conversational state: this one is authoritative and lives in Postgres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    PendingOnboarding,
    AwaitingConfirmation,
    Active,
    Disabled,
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: i32,
    pub phone_number: String,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TrackableItem {
    pub item_id: i32,
    pub user_id: i32,
    pub item_name: String,
    pub created_at: DateTime<Utc>,
}
