use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;

use wayfarer_core::domain::agent::{Agent, AgentId};
use wayfarer_core::domain::client::{Client, ClientId};
use wayfarer_core::domain::quote::{Quote, QuoteDraft, QuoteId, QuoteStatus, SendChannel};
use wayfarer_core::errors::EngineError;

pub mod agent;
pub mod client;
pub mod event;
pub mod quote;

pub use agent::SqlAgentRepository;
pub use client::SqlClientRepository;
pub use event::{QuoteEvent, SqlQuoteEventRepository};
pub use quote::SqlQuoteRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for EngineError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(sqlx::Error::PoolTimedOut) => EngineError::DatabaseTimeout,
            RepositoryError::Database(sqlx::Error::Database(inner)) => match inner.kind() {
                sqlx::error::ErrorKind::UniqueViolation
                | sqlx::error::ErrorKind::ForeignKeyViolation
                | sqlx::error::ErrorKind::NotNullViolation
                | sqlx::error::ErrorKind::CheckViolation => {
                    EngineError::QuotePersistenceFailed { message: inner.to_string() }
                }
                // SQLITE_BUSY / SQLITE_LOCKED
                _ if matches!(inner.code().as_deref(), Some("5") | Some("6")) => {
                    EngineError::DatabaseTimeout
                }
                _ => EngineError::DatabaseTransactionAborted { message: inner.to_string() },
            },
            RepositoryError::Database(other) => {
                EngineError::DatabaseTransactionAborted { message: other.to_string() }
            }
            RepositoryError::Decode(message) => EngineError::Internal { message },
        }
    }
}

/// Result of the version-guarded update behind every agent edit. A losing
/// writer observes `Conflict` with the authoritative version, never a
/// partially merged row.
#[derive(Clone, Debug, PartialEq)]
pub enum CommitOutcome {
    Committed(Quote),
    Conflict { expected: u32, actual: u32 },
    NotFound,
}

/// Result of the atomic send-bookkeeping write.
#[derive(Clone, Debug, PartialEq)]
pub enum SendOutcome {
    /// `sent_at` (if unset), the channel counter, and the version advanced.
    Fresh(Quote),
    /// The send landed inside the idempotency window; the row is untouched.
    Repeat(Quote),
}

/// Result of a status-guarded client write (view, accept, decline).
#[derive(Clone, Debug, PartialEq)]
pub enum StatusWrite {
    Applied(Quote),
    /// The guard did not match; the caller decides whether the current
    /// status makes the request a harmless repeat or an invalid move.
    Ignored(Quote),
    Missing,
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn insert(&self, quote: &Quote) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;

    async fn find_by_view_token(&self, token: &str) -> Result<Option<Quote>, RepositoryError>;

    async fn list_for_agent(
        &self,
        agent_id: &AgentId,
        status: Option<QuoteStatus>,
    ) -> Result<Vec<Quote>, RepositoryError>;

    /// Compare-and-swap update of the caller-authored content. The version
    /// check and the write are one SQL statement.
    async fn commit_update(
        &self,
        id: &QuoteId,
        expected_version: u32,
        draft: &QuoteDraft,
        now: DateTime<Utc>,
    ) -> Result<CommitOutcome, RepositoryError>;

    /// Atomic send bookkeeping gated on the persisted `sent_at`. Returns
    /// `None` when the quote no longer exists.
    async fn record_send(
        &self,
        id: &QuoteId,
        channel: SendChannel,
        now: DateTime<Utc>,
        window_secs: u64,
    ) -> Result<Option<SendOutcome>, RepositoryError>;

    async fn record_client_view(
        &self,
        id: &QuoteId,
        now: DateTime<Utc>,
    ) -> Result<StatusWrite, RepositoryError>;

    async fn record_acceptance(
        &self,
        id: &QuoteId,
        now: DateTime<Utc>,
    ) -> Result<StatusWrite, RepositoryError>;

    async fn record_decline(
        &self,
        id: &QuoteId,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<StatusWrite, RepositoryError>;
}

#[async_trait]
pub trait ClientRepository: Send + Sync {
    async fn insert(&self, client: &Client) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &ClientId) -> Result<Option<Client>, RepositoryError>;
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn insert(&self, agent: &Agent) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError>;
}

#[async_trait]
pub trait QuoteEventRepository: Send + Sync {
    async fn append(&self, event: &QuoteEvent) -> Result<(), RepositoryError>;
    async fn list_for_quote(&self, quote_id: &QuoteId) -> Result<Vec<QuoteEvent>, RepositoryError>;
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}

pub(crate) fn parse_date(column: &str, value: String) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|error| {
        RepositoryError::Decode(format!("invalid date in `{column}`: `{value}` ({error})"))
    })
}

pub(crate) fn parse_decimal(column: &str, value: String) -> Result<Decimal, RepositoryError> {
    Decimal::from_str_exact(&value).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}

pub(crate) fn parse_items(column: &str, value: String) -> Result<Vec<Value>, RepositoryError> {
    serde_json::from_str(&value).map_err(|error| {
        RepositoryError::Decode(format!("invalid item array in `{column}`: {error}"))
    })
}

pub(crate) fn encode_items(column: &str, items: &[Value]) -> Result<String, RepositoryError> {
    serde_json::to_string(items).map_err(|error| {
        RepositoryError::Decode(format!("could not encode item array for `{column}`: {error}"))
    })
}
