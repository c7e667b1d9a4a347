use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::{DbPool, TrackableItem, User, UserStatus};
use crate::conversation::LedgerStore;

pub struct Repository {
    pool: DbPool,
}

impl Repository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Ensure the schema exists. Idempotent, run at startup.
    pub async fn ensure_schema(&self) -> Result<()> {
        let pool = self.pool.get_pool();

        sqlx::query(
            r#"DO $$ BEGIN
                CREATE TYPE user_status AS ENUM
                    ('pending_onboarding', 'awaiting_confirmation', 'active', 'disabled');
            EXCEPTION WHEN duplicate_object THEN NULL;
            END $$"#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"DO $$ BEGIN
                CREATE TYPE expense_type AS ENUM ('personal', 'shared');
            EXCEPTION WHEN duplicate_object THEN NULL;
            END $$"#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS users (
                user_id SERIAL PRIMARY KEY,
                phone_number VARCHAR(30) NOT NULL UNIQUE,
                status user_status NOT NULL DEFAULT 'pending_onboarding',
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS trackable_items (
                item_id SERIAL PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
                item_name VARCHAR(100) NOT NULL,
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS expenses (
                expense_id SERIAL PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
                item_name VARCHAR(100) NOT NULL,
                total_amount NUMERIC(10, 2) NOT NULL,
                expense_type expense_type NOT NULL,
                transaction_time TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS shared_participants (
                share_id SERIAL PRIMARY KEY,
                expense_id INTEGER NOT NULL REFERENCES expenses(expense_id) ON DELETE CASCADE,
                entity_name VARCHAR(100) NOT NULL,
                share_amount NUMERIC(10, 2) NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_expenses_user_id ON expenses(user_id)")
            .execute(pool)
            .await?;

        debug!("Database schema ensured");
        Ok(())
    }
}

/// The share each participant owes on a shared expense. The logging user is
/// part of the split, hence participants + 1.
pub fn share_amount(total: f64, participant_count: usize) -> f64 {
    total / (participant_count + 1) as f64
}

#[async_trait]
impl LedgerStore for Repository {
    async fn find_or_create_user(&self, phone_number: &str) -> Result<User> {
        // Idempotent upsert: an existing row keeps its status, a new row
        // starts at pending_onboarding.
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (phone_number)
            VALUES ($1)
            ON CONFLICT (phone_number) DO UPDATE SET phone_number = EXCLUDED.phone_number
            RETURNING user_id, phone_number, status, created_at
            "#,
        )
        .bind(phone_number)
        .fetch_one(self.pool.get_pool())
        .await?;

        Ok(user)
    }

    async fn update_user_status(&self, user_id: i32, status: UserStatus) -> Result<()> {
        sqlx::query("UPDATE users SET status = $1 WHERE user_id = $2")
            .bind(status)
            .bind(user_id)
            .execute(self.pool.get_pool())
            .await?;

        debug!("User {} status updated to {:?}", user_id, status);
        Ok(())
    }

    async fn log_personal_expense(&self, user_id: i32, amount: f64, item_name: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO expenses (user_id, total_amount, item_name, expense_type)
            VALUES ($1, $2, $3, 'personal')
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .bind(item_name)
        .execute(self.pool.get_pool())
        .await?;

        debug!("Logged personal expense for user {}", user_id);
        Ok(())
    }

    async fn log_shared_expense(
        &self,
        user_id: i32,
        total_amount: f64,
        item_name: &str,
        participants: &[String],
    ) -> Result<()> {
        // All-or-nothing: the expense row and every participant share commit
        // together or not at all.
        let mut transaction = self.pool.get_pool().begin().await?;

        let expense_id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO expenses (user_id, total_amount, item_name, expense_type)
            VALUES ($1, $2, $3, 'shared')
            RETURNING expense_id
            "#,
        )
        .bind(user_id)
        .bind(total_amount)
        .bind(item_name)
        .fetch_one(&mut *transaction)
        .await?;

        let share = share_amount(total_amount, participants.len());

        for person in participants {
            sqlx::query(
                r#"
                INSERT INTO shared_participants (expense_id, entity_name, share_amount)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(expense_id)
            .bind(person)
            .bind(share)
            .execute(&mut *transaction)
            .await?;
        }

        transaction.commit().await?;

        debug!("Logged shared expense {} for user {}", expense_id, user_id);
        Ok(())
    }

    async fn query_balance(&self, user_id: i32, person: &str) -> Result<f64> {
        // SUM over no rows is NULL, which we surface as 0.
        let total = sqlx::query_scalar::<_, f64>(
            r#"
            SELECT COALESCE(SUM(sp.share_amount), 0)::float8
            FROM expenses e
            JOIN shared_participants sp ON e.expense_id = sp.expense_id
            WHERE e.user_id = $1 AND sp.entity_name ILIKE $2
            "#,
        )
        .bind(user_id)
        .bind(person)
        .fetch_one(self.pool.get_pool())
        .await?;

        Ok(total)
    }

    async fn add_item(&self, user_id: i32, item_name: &str) -> Result<TrackableItem> {
        let item = sqlx::query_as::<_, TrackableItem>(
            r#"
            INSERT INTO trackable_items (user_id, item_name)
            VALUES ($1, $2)
            RETURNING item_id, user_id, item_name, created_at
            "#,
        )
        .bind(user_id)
        .bind(item_name)
        .fetch_one(self.pool.get_pool())
        .await?;

        debug!("Added item \"{}\" for user {}", item_name, user_id);
        Ok(item)
    }

    async fn get_items(&self, user_id: i32) -> Result<Vec<TrackableItem>> {
        let items = sqlx::query_as::<_, TrackableItem>(
            r#"
            SELECT item_id, user_id, item_name, created_at
            FROM trackable_items
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool.get_pool())
        .await?;

        debug!("Fetched {} items for user {}", items.len(), user_id);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_includes_the_logging_user() {
        assert_eq!(share_amount(1000.0, 1), 500.0);
        assert_eq!(share_amount(300.0, 2), 100.0);
    }

    #[test]
    fn share_with_no_participants_is_the_full_amount() {
        assert_eq!(share_amount(250.0, 0), 250.0);
    }
}
