use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::LedgerError;

use super::{AccountSummary, DebitOutcome, Identity, LedgerStore, ResourceRow, UserRow};

/// Postgres-backed store. Every query binds its parameters; caller-supplied
/// text never reaches the SQL text itself.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and run migrations in one step.
    pub async fn init(config: &AppConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
            .connect(&config.database_url)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn create_account(
        &self,
        username: &str,
        password_hash: &str,
        admin: bool,
    ) -> Result<Identity, LedgerError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, password_hash, is_admin)
            VALUES ($1, $2, $3)
            RETURNING id, username, password_hash, is_admin, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(admin)
        .fetch_one(&mut *tx)
        .await;

        let user = match inserted {
            Ok(u) => u,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(LedgerError::DuplicateUser);
            }
            Err(e) => return Err(e.into()),
        };

        let account_id = sqlx::query_scalar::<_, Uuid>(
            r#"INSERT INTO accounts (user_id) VALUES ($1) RETURNING id"#,
        )
        .bind(user.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Identity {
            user_id: user.id,
            account_id,
            username: user.username,
            is_admin: user.is_admin,
        })
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRow>, LedgerError> {
        let user = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password_hash, is_admin, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn load_identity(&self, user_id: Uuid) -> Result<Option<Identity>, LedgerError> {
        // The schema permits several accounts per user; the oldest one is the
        // account a request acts on.
        let identity = sqlx::query_as::<_, Identity>(
            r#"
            SELECT u.id AS user_id, a.id AS account_id, u.username, u.is_admin
            FROM users u
            JOIN accounts a ON a.user_id = u.id
            WHERE u.id = $1
            ORDER BY a.created_at ASC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(identity)
    }

    async fn account_for_username(&self, username: &str) -> Result<Option<Uuid>, LedgerError> {
        let account_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT a.id
            FROM accounts a
            JOIN users u ON u.id = a.user_id
            WHERE u.username = $1
            ORDER BY a.created_at ASC
            LIMIT 1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account_id)
    }

    async fn list_accounts(&self) -> Result<Vec<AccountSummary>, LedgerError> {
        let rows = sqlx::query_as::<_, AccountSummary>(
            r#"
            SELECT a.id AS account_id,
                   u.id AS user_id,
                   u.username,
                   u.is_admin,
                   a.balance,
                   COUNT(ar.resource_id) AS resources,
                   a.created_at
            FROM accounts a
            JOIN users u ON u.id = a.user_id
            LEFT JOIN account_resources ar ON ar.account_id = a.id
            GROUP BY a.id, u.id
            ORDER BY a.created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn create_resource(
        &self,
        account_id: Uuid,
        name: &str,
        initial: i64,
    ) -> Result<ResourceRow, LedgerError> {
        let mut tx = self.pool.begin().await?;

        // Lock the account row so two concurrent allocations of the same name
        // cannot both pass the duplicate check.
        let locked = sqlx::query_scalar::<_, Uuid>(
            r#"SELECT id FROM accounts WHERE id = $1 FOR UPDATE"#,
        )
        .bind(account_id)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Err(LedgerError::NotFound);
        }

        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM resources r
                JOIN account_resources ar ON ar.resource_id = r.id
                WHERE ar.account_id = $1 AND r.name = $2
            )
            "#,
        )
        .bind(account_id)
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;
        if taken {
            return Err(LedgerError::DuplicateResource(name.to_string()));
        }

        let resource = sqlx::query_as::<_, ResourceRow>(
            r#"
            INSERT INTO resources (name, available)
            VALUES ($1, $2)
            RETURNING id, name, available, created_at
            "#,
        )
        .bind(name)
        .bind(initial)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"INSERT INTO account_resources (account_id, resource_id) VALUES ($1, $2)"#,
        )
        .bind(account_id)
        .bind(resource.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(resource)
    }

    async fn resource_for_account(
        &self,
        account_id: Uuid,
        name: &str,
    ) -> Result<Option<ResourceRow>, LedgerError> {
        let resource = sqlx::query_as::<_, ResourceRow>(
            r#"
            SELECT r.id, r.name, r.available, r.created_at
            FROM resources r
            JOIN account_resources ar ON ar.resource_id = r.id
            WHERE ar.account_id = $1 AND r.name = $2
            "#,
        )
        .bind(account_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(resource)
    }

    async fn resource_with_owners(
        &self,
        resource_id: Uuid,
    ) -> Result<Option<(ResourceRow, Vec<Uuid>)>, LedgerError> {
        let resource = sqlx::query_as::<_, ResourceRow>(
            r#"SELECT id, name, available, created_at FROM resources WHERE id = $1"#,
        )
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(resource) = resource else {
            return Ok(None);
        };

        let owners = sqlx::query_scalar::<_, Uuid>(
            r#"SELECT account_id FROM account_resources WHERE resource_id = $1"#,
        )
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some((resource, owners)))
    }

    async fn resources_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<ResourceRow>, LedgerError> {
        let rows = sqlx::query_as::<_, ResourceRow>(
            r#"
            SELECT r.id, r.name, r.available, r.created_at
            FROM resources r
            JOIN account_resources ar ON ar.resource_id = r.id
            WHERE ar.account_id = $1
            ORDER BY r.created_at ASC
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn debit_resource(
        &self,
        account_id: Uuid,
        name: &str,
        amount: i64,
    ) -> Result<DebitOutcome, LedgerError> {
        let mut tx = self.pool.begin().await?;

        // Row-lock the resource through the ownership join; a concurrent
        // spend blocks here and re-reads the committed balance.
        let current = sqlx::query_as::<_, (Uuid, i64)>(
            r#"
            SELECT r.id, r.available
            FROM resources r
            JOIN account_resources ar ON ar.resource_id = r.id
            WHERE ar.account_id = $1 AND r.name = $2
            FOR UPDATE OF r
            "#,
        )
        .bind(account_id)
        .bind(name)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((resource_id, available)) = current else {
            return Ok(DebitOutcome::NotOwned);
        };

        if amount > available {
            return Ok(DebitOutcome::Insufficient { available });
        }

        let remaining = sqlx::query_scalar::<_, i64>(
            r#"UPDATE resources SET available = available - $2 WHERE id = $1 RETURNING available"#,
        )
        .bind(resource_id)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(DebitOutcome::Spent {
            resource_id,
            remaining,
        })
    }
}
