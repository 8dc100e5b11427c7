use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use wayfarer_core::domain::quote::QuoteId;

use super::{parse_timestamp, QuoteEventRepository, RepositoryError};
use crate::DbPool;

/// One append-only audit record. Payloads are small JSON summaries, never
/// full quote bodies.
#[derive(Clone, Debug, PartialEq)]
pub struct QuoteEvent {
    pub id: String,
    pub quote_id: QuoteId,
    pub event_type: String,
    pub actor: String,
    pub correlation_id: Option<String>,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl QuoteEvent {
    pub fn record(
        quote_id: QuoteId,
        event_type: impl Into<String>,
        actor: impl Into<String>,
        correlation_id: Option<String>,
        payload: serde_json::Value,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            quote_id,
            event_type: event_type.into(),
            actor: actor.into(),
            correlation_id,
            payload,
            occurred_at,
        }
    }
}

pub struct SqlQuoteEventRepository {
    pool: DbPool,
}

impl SqlQuoteEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl QuoteEventRepository for SqlQuoteEventRepository {
    async fn append(&self, event: &QuoteEvent) -> Result<(), RepositoryError> {
        let payload = serde_json::to_string(&event.payload).map_err(|error| {
            RepositoryError::Decode(format!("could not encode event payload: {error}"))
        })?;

        sqlx::query(
            "INSERT INTO quote_event (id, quote_id, event_type, actor, correlation_id, payload_json, occurred_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(&event.quote_id.0)
        .bind(&event.event_type)
        .bind(&event.actor)
        .bind(event.correlation_id.as_deref())
        .bind(payload)
        .bind(event.occurred_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_quote(&self, quote_id: &QuoteId) -> Result<Vec<QuoteEvent>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, quote_id, event_type, actor, correlation_id, payload_json, occurred_at
             FROM quote_event
             WHERE quote_id = ?
             ORDER BY occurred_at ASC, id ASC",
        )
        .bind(&quote_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(event_from_row).collect()
    }
}

fn event_from_row(row: SqliteRow) -> Result<QuoteEvent, RepositoryError> {
    let payload_raw = row.try_get::<String, _>("payload_json")?;
    let payload = serde_json::from_str(&payload_raw).map_err(|error| {
        RepositoryError::Decode(format!("invalid event payload json: {error}"))
    })?;

    Ok(QuoteEvent {
        id: row.try_get("id")?,
        quote_id: QuoteId(row.try_get("quote_id")?),
        event_type: row.try_get("event_type")?,
        actor: row.try_get("actor")?,
        correlation_id: row.try_get("correlation_id")?,
        payload,
        occurred_at: parse_timestamp("occurred_at", row.try_get("occurred_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};
    use serde_json::json;

    use wayfarer_core::domain::agent::AgentId;
    use wayfarer_core::domain::quote::{Quote, QuoteId, QuoteStatus};

    use super::{QuoteEvent, SqlQuoteEventRepository};
    use crate::migrations;
    use crate::repositories::{QuoteEventRepository, QuoteRepository, SqlQuoteRepository};
    use crate::{connect_with_settings, DbPool};

    #[tokio::test]
    async fn appended_events_list_in_order_of_occurrence() {
        let pool = setup_pool().await;
        let quote_id = insert_quote(&pool).await;
        let repo = SqlQuoteEventRepository::new(pool.clone());

        let base = parse_ts("2026-08-02T10:00:00Z");
        let sent = QuoteEvent::record(
            quote_id.clone(),
            "quote.sent",
            "agent-1",
            Some("req-1755770400000-abc123".to_string()),
            json!({"channel": "email"}),
            base,
        );
        let viewed = QuoteEvent::record(
            quote_id.clone(),
            "quote.viewed",
            "client",
            None,
            json!({}),
            base + Duration::minutes(90),
        );

        repo.append(&viewed).await.expect("append viewed");
        repo.append(&sent).await.expect("append sent");

        let events = repo.list_for_quote(&quote_id).await.expect("list events");
        assert_eq!(events, vec![sent, viewed]);

        pool.close().await;
    }

    #[tokio::test]
    async fn events_require_an_existing_quote() {
        let pool = setup_pool().await;
        let repo = SqlQuoteEventRepository::new(pool.clone());

        let orphan = QuoteEvent::record(
            QuoteId("missing-quote".to_string()),
            "quote.sent",
            "agent-1",
            None,
            json!({}),
            parse_ts("2026-08-02T10:00:00Z"),
        );

        let result = repo.append(&orphan).await;
        assert!(result.is_err(), "append without quote row should violate the foreign key");

        pool.close().await;
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    async fn insert_quote(pool: &DbPool) -> QuoteId {
        let timestamp = "2026-08-01T09:00:00+00:00";

        sqlx::query(
            "INSERT INTO agent (id, name, email, phone, agency_name, created_at, updated_at)
             VALUES ('agent-1', 'Dana Reyes', 'dana@wayfarer.test', NULL, NULL, ?, ?)",
        )
        .bind(timestamp)
        .bind(timestamp)
        .execute(pool)
        .await
        .expect("insert agent");

        let quote = sample_quote();
        let repo = SqlQuoteRepository::new(pool.clone());
        repo.insert(&quote).await.expect("insert quote");
        quote.id
    }

    fn sample_quote() -> Quote {
        use wayfarer_core::domain::quote::{
            CostBreakdown, PricingSummary, QuoteDraft, QuoteItems, Travelers,
        };

        let draft = QuoteDraft {
            client_id: None,
            trip_name: "Lisbon Long Weekend".to_string(),
            destination: "Lisbon, Portugal".to_string(),
            start_date: chrono::NaiveDate::from_ymd_opt(2026, 10, 2).expect("valid date"),
            end_date: chrono::NaiveDate::from_ymd_opt(2026, 10, 5).expect("valid date"),
            travelers: Travelers::default(),
            items: QuoteItems::default(),
            costs: CostBreakdown::default(),
            pricing: PricingSummary::default(),
            currency: "EUR".to_string(),
            notes: None,
            agent_notes: None,
            terms: None,
        };

        let mut quote = Quote::from_draft(
            draft,
            AgentId("agent-1".to_string()),
            parse_ts("2026-08-01T09:00:00Z"),
            7,
        );
        quote.status = QuoteStatus::Sent;
        quote
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("valid rfc3339").with_timezone(&Utc)
    }
}
