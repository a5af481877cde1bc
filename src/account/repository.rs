//! Handle database requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres};

use crate::account::{Account, AccountStatus};
use crate::error::{Result, ServerError};

const SELECT_ACCOUNT: &str = r#"SELECT
        id, username, email, password, salt, "type", status,
        activation_code, header_url, created_at
    FROM users"#;

/// Persistence port used by [`crate::account::AccountService`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find an account using `id` field.
    async fn select_by_id(&self, id: i64) -> Result<Option<Account>>;

    /// Find an account using `username` field.
    async fn select_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>>;

    /// Find an account using `email` field.
    async fn select_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Insert [`Account`] and return the assigned id.
    async fn insert(&self, account: &Account) -> Result<i64>;

    /// Move an account to `status`. Returns affected rows.
    ///
    /// An account never goes back to a previous status; such updates affect
    /// nothing.
    async fn update_status(&self, id: i64, status: AccountStatus)
    -> Result<u64>;
}

/// Row of the `users` table.
#[derive(Debug, Clone, FromRow)]
struct AccountRecord {
    id: i64,
    username: String,
    email: String,
    password: String,
    salt: String,
    #[sqlx(rename = "type")]
    account_type: i16,
    status: i16,
    activation_code: String,
    header_url: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<AccountRecord> for Account {
    type Error = ServerError;

    fn try_from(record: AccountRecord) -> Result<Self> {
        Ok(Account {
            id: record.id,
            username: record.username,
            email: record.email,
            password: record.password,
            salt: record.salt,
            account_type: record.account_type.try_into()?,
            status: record.status.try_into()?,
            activation_code: record.activation_code,
            avatar_url: record.header_url,
            created_at: record.created_at,
        })
    }
}

/// PostgreSQL implementation of [`UserStore`].
#[derive(Clone)]
pub struct PgUserStore {
    pool: Pool<Postgres>,
}

impl PgUserStore {
    /// Create a new [`PgUserStore`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn select_by(
        &self,
        field: Field,
        value: impl Into<Value>,
    ) -> Result<Option<Account>> {
        let query = format!("{SELECT_ACCOUNT} WHERE {field} = $1");
        let query = sqlx::query_as::<_, AccountRecord>(&query);
        let query = match value.into() {
            Value::Id(id) => query.bind(id),
            Value::Text(text) => query.bind(text),
        };

        query
            .fetch_optional(&self.pool)
            .await?
            .map(Account::try_from)
            .transpose()
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn select_by_id(&self, id: i64) -> Result<Option<Account>> {
        self.select_by(Field::Id, id).await
    }

    async fn select_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>> {
        self.select_by(Field::Username, username).await
    }

    async fn select_by_email(&self, email: &str) -> Result<Option<Account>> {
        self.select_by(Field::Email, email).await
    }

    async fn insert(&self, account: &Account) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO users (username, email, password, salt, "type", status,
                activation_code, header_url, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING id"#,
        )
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.password)
        .bind(&account.salt)
        .bind(account.account_type as i16)
        .bind(account.status as i16)
        .bind(&account.activation_code)
        .bind(&account.avatar_url)
        .bind(account.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unique_violation)?;

        Ok(id)
    }

    async fn update_status(
        &self,
        id: i64,
        status: AccountStatus,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"UPDATE users SET status = $2 WHERE id = $1 AND status <= $2"#,
        )
        .bind(id)
        .bind(status as i16)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Translate unique constraint violations into [`ServerError::Duplicate`].
fn unique_violation(err: sqlx::Error) -> ServerError {
    let field = err
        .as_database_error()
        .filter(|e| e.is_unique_violation())
        .map(|e| match e.constraint() {
            Some(constraint) if constraint.contains("email") => "email",
            _ => "username",
        });

    match field {
        Some(field) => ServerError::Duplicate { field },
        None => ServerError::Sql(err),
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Id,
    Username,
    Email,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Field::Id => write!(f, "id"),
            Field::Username => write!(f, "username"),
            Field::Email => write!(f, "email"),
        }
    }
}

enum Value {
    Id(i64),
    Text(String),
}

impl From<i64> for Value {
    fn from(id: i64) -> Self {
        Value::Id(id)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_owned())
    }
}
