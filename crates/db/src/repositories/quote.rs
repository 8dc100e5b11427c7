use chrono::{DateTime, Duration, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use wayfarer_core::domain::agent::AgentId;
use wayfarer_core::domain::client::ClientId;
use wayfarer_core::domain::quote::{
    trip_span_days, CostBreakdown, DeliveryState, PricingSummary, Quote, QuoteDraft, QuoteId,
    QuoteItems, QuoteStatus, SendChannel, Travelers,
};

use super::{
    encode_items, parse_date, parse_decimal, parse_items, parse_optional_timestamp,
    parse_timestamp, parse_u32, CommitOutcome, QuoteRepository, RepositoryError, SendOutcome,
    StatusWrite,
};
use crate::DbPool;

const QUOTE_COLUMNS: &str = "\
    id, quote_number, version, status, agent_id, client_id, parent_quote_id, is_alternative,
    trip_name, destination, start_date, end_date, duration_days, adults, children, infants,
    flights, hotels, activities, transfers, car_rentals, insurance, custom_items,
    flights_cost, hotels_cost, activities_cost, transfers_cost, car_rentals_cost,
    insurance_cost, custom_items_cost, subtotal, agent_markup_percent, agent_markup,
    taxes, fees, discount, total, currency, notes, agent_notes, terms,
    sent_at, viewed_at, accepted_at, declined_at, decline_reason,
    email_sent_count, sms_sent_count, shared_with_client, view_token, expires_at,
    created_at, updated_at";

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let sql = format!("SELECT {QUOTE_COLUMNS} FROM quote WHERE id = ?");
        let row = sqlx::query(&sql).bind(&id.0).fetch_optional(&self.pool).await?;

        row.map(quote_from_row).transpose()
    }

    async fn stored_version(&self, id: &QuoteId) -> Result<Option<u32>, RepositoryError> {
        let row = sqlx::query("SELECT version FROM quote WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| parse_u32("version", row.try_get("version")?)).transpose()
    }

    async fn status_write_outcome(
        &self,
        id: &QuoteId,
        rows_affected: u64,
    ) -> Result<StatusWrite, RepositoryError> {
        match self.fetch_by_id(id).await? {
            Some(quote) if rows_affected == 1 => Ok(StatusWrite::Applied(quote)),
            Some(quote) => Ok(StatusWrite::Ignored(quote)),
            None => Ok(StatusWrite::Missing),
        }
    }
}

#[async_trait::async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn insert(&self, quote: &Quote) -> Result<(), RepositoryError> {
        let sql = format!(
            "INSERT INTO quote ({QUOTE_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?,
                     ?, ?, ?, ?, ?, ?, ?, ?,
                     ?, ?, ?, ?, ?, ?, ?,
                     ?, ?, ?, ?, ?,
                     ?, ?, ?, ?, ?,
                     ?, ?, ?, ?, ?, ?, ?, ?,
                     ?, ?, ?, ?, ?,
                     ?, ?, ?, ?, ?,
                     ?, ?)"
        );

        sqlx::query(&sql)
            .bind(&quote.id.0)
            .bind(&quote.quote_number)
            .bind(i64::from(quote.version))
            .bind(quote.status.as_str())
            .bind(&quote.agent_id.0)
            .bind(quote.client_id.as_ref().map(|id| id.0.as_str()))
            .bind(quote.parent_quote_id.as_ref().map(|id| id.0.as_str()))
            .bind(i64::from(quote.is_alternative))
            .bind(&quote.trip_name)
            .bind(&quote.destination)
            .bind(quote.start_date.to_string())
            .bind(quote.end_date.to_string())
            .bind(i64::from(quote.duration_days))
            .bind(i64::from(quote.travelers.adults))
            .bind(i64::from(quote.travelers.children))
            .bind(i64::from(quote.travelers.infants))
            .bind(encode_items("flights", &quote.items.flights)?)
            .bind(encode_items("hotels", &quote.items.hotels)?)
            .bind(encode_items("activities", &quote.items.activities)?)
            .bind(encode_items("transfers", &quote.items.transfers)?)
            .bind(encode_items("car_rentals", &quote.items.car_rentals)?)
            .bind(encode_items("insurance", &quote.items.insurance)?)
            .bind(encode_items("custom_items", &quote.items.custom_items)?)
            .bind(quote.costs.flights.to_string())
            .bind(quote.costs.hotels.to_string())
            .bind(quote.costs.activities.to_string())
            .bind(quote.costs.transfers.to_string())
            .bind(quote.costs.car_rentals.to_string())
            .bind(quote.costs.insurance.to_string())
            .bind(quote.costs.custom_items.to_string())
            .bind(quote.pricing.subtotal.to_string())
            .bind(quote.pricing.agent_markup_percent.to_string())
            .bind(quote.pricing.agent_markup.to_string())
            .bind(quote.pricing.taxes.to_string())
            .bind(quote.pricing.fees.to_string())
            .bind(quote.pricing.discount.to_string())
            .bind(quote.pricing.total.to_string())
            .bind(&quote.currency)
            .bind(quote.notes.as_deref())
            .bind(quote.agent_notes.as_deref())
            .bind(quote.terms.as_deref())
            .bind(quote.delivery.sent_at.map(|value| value.to_rfc3339()))
            .bind(quote.viewed_at.map(|value| value.to_rfc3339()))
            .bind(quote.accepted_at.map(|value| value.to_rfc3339()))
            .bind(quote.declined_at.map(|value| value.to_rfc3339()))
            .bind(quote.decline_reason.as_deref())
            .bind(i64::from(quote.delivery.email_sent_count))
            .bind(i64::from(quote.delivery.sms_sent_count))
            .bind(i64::from(quote.delivery.shared_with_client))
            .bind(&quote.view_token)
            .bind(quote.expires_at.map(|value| value.to_rfc3339()))
            .bind(quote.created_at.to_rfc3339())
            .bind(quote.updated_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        self.fetch_by_id(id).await
    }

    async fn find_by_view_token(&self, token: &str) -> Result<Option<Quote>, RepositoryError> {
        let sql = format!("SELECT {QUOTE_COLUMNS} FROM quote WHERE view_token = ?");
        let row = sqlx::query(&sql).bind(token).fetch_optional(&self.pool).await?;

        row.map(quote_from_row).transpose()
    }

    async fn list_for_agent(
        &self,
        agent_id: &AgentId,
        status: Option<QuoteStatus>,
    ) -> Result<Vec<Quote>, RepositoryError> {
        let rows = if let Some(status) = status {
            let sql = format!(
                "SELECT {QUOTE_COLUMNS} FROM quote
                 WHERE agent_id = ? AND status = ?
                 ORDER BY updated_at DESC, created_at DESC"
            );
            sqlx::query(&sql)
                .bind(&agent_id.0)
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
        } else {
            let sql = format!(
                "SELECT {QUOTE_COLUMNS} FROM quote
                 WHERE agent_id = ?
                 ORDER BY updated_at DESC, created_at DESC"
            );
            sqlx::query(&sql).bind(&agent_id.0).fetch_all(&self.pool).await?
        };

        rows.into_iter().map(quote_from_row).collect()
    }

    async fn commit_update(
        &self,
        id: &QuoteId,
        expected_version: u32,
        draft: &QuoteDraft,
        now: DateTime<Utc>,
    ) -> Result<CommitOutcome, RepositoryError> {
        let duration_days = trip_span_days(draft.start_date, draft.end_date);

        let result = sqlx::query(
            "UPDATE quote SET
                client_id = ?, trip_name = ?, destination = ?, start_date = ?, end_date = ?,
                duration_days = ?, adults = ?, children = ?, infants = ?,
                flights = ?, hotels = ?, activities = ?, transfers = ?, car_rentals = ?,
                insurance = ?, custom_items = ?,
                flights_cost = ?, hotels_cost = ?, activities_cost = ?, transfers_cost = ?,
                car_rentals_cost = ?, insurance_cost = ?, custom_items_cost = ?,
                subtotal = ?, agent_markup_percent = ?, agent_markup = ?, taxes = ?,
                fees = ?, discount = ?, total = ?, currency = ?,
                notes = ?, agent_notes = ?, terms = ?,
                version = version + 1, updated_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(draft.client_id.as_ref().map(|id| id.0.as_str()))
        .bind(&draft.trip_name)
        .bind(&draft.destination)
        .bind(draft.start_date.to_string())
        .bind(draft.end_date.to_string())
        .bind(i64::from(duration_days))
        .bind(i64::from(draft.travelers.adults))
        .bind(i64::from(draft.travelers.children))
        .bind(i64::from(draft.travelers.infants))
        .bind(encode_items("flights", &draft.items.flights)?)
        .bind(encode_items("hotels", &draft.items.hotels)?)
        .bind(encode_items("activities", &draft.items.activities)?)
        .bind(encode_items("transfers", &draft.items.transfers)?)
        .bind(encode_items("car_rentals", &draft.items.car_rentals)?)
        .bind(encode_items("insurance", &draft.items.insurance)?)
        .bind(encode_items("custom_items", &draft.items.custom_items)?)
        .bind(draft.costs.flights.to_string())
        .bind(draft.costs.hotels.to_string())
        .bind(draft.costs.activities.to_string())
        .bind(draft.costs.transfers.to_string())
        .bind(draft.costs.car_rentals.to_string())
        .bind(draft.costs.insurance.to_string())
        .bind(draft.costs.custom_items.to_string())
        .bind(draft.pricing.subtotal.to_string())
        .bind(draft.pricing.agent_markup_percent.to_string())
        .bind(draft.pricing.agent_markup.to_string())
        .bind(draft.pricing.taxes.to_string())
        .bind(draft.pricing.fees.to_string())
        .bind(draft.pricing.discount.to_string())
        .bind(draft.pricing.total.to_string())
        .bind(&draft.currency)
        .bind(draft.notes.as_deref())
        .bind(draft.agent_notes.as_deref())
        .bind(draft.terms.as_deref())
        .bind(now.to_rfc3339())
        .bind(&id.0)
        .bind(i64::from(expected_version))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.stored_version(id).await? {
                Some(actual) => {
                    Ok(CommitOutcome::Conflict { expected: expected_version, actual })
                }
                None => Ok(CommitOutcome::NotFound),
            };
        }

        match self.fetch_by_id(id).await? {
            Some(quote) => Ok(CommitOutcome::Committed(quote)),
            None => Ok(CommitOutcome::NotFound),
        }
    }

    async fn record_send(
        &self,
        id: &QuoteId,
        channel: SendChannel,
        now: DateTime<Utc>,
        window_secs: u64,
    ) -> Result<Option<SendOutcome>, RepositoryError> {
        let (email_increment, sms_increment) = match channel {
            SendChannel::Email => (1_i64, 0_i64),
            SendChannel::Whatsapp => (0, 1),
            SendChannel::Link => (0, 0),
        };

        // Window capped at one year so the duration arithmetic stays in
        // range regardless of what configuration hands us.
        let capped_secs = i64::try_from(window_secs.min(31_536_000)).unwrap_or(31_536_000);
        let window_floor = (now - Duration::seconds(capped_secs)).to_rfc3339();

        let result = sqlx::query(
            "UPDATE quote SET
                sent_at = COALESCE(sent_at, ?),
                email_sent_count = email_sent_count + ?,
                sms_sent_count = sms_sent_count + ?,
                shared_with_client = 1,
                status = CASE WHEN status = 'draft' THEN 'sent' ELSE status END,
                version = version + 1,
                updated_at = ?
             WHERE id = ? AND (sent_at IS NULL OR sent_at <= ?)",
        )
        .bind(now.to_rfc3339())
        .bind(email_increment)
        .bind(sms_increment)
        .bind(now.to_rfc3339())
        .bind(&id.0)
        .bind(&window_floor)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(self.fetch_by_id(id).await?.map(SendOutcome::Fresh));
        }

        Ok(self.fetch_by_id(id).await?.map(SendOutcome::Repeat))
    }

    async fn record_client_view(
        &self,
        id: &QuoteId,
        now: DateTime<Utc>,
    ) -> Result<StatusWrite, RepositoryError> {
        let result = sqlx::query(
            "UPDATE quote SET
                status = 'viewed', viewed_at = ?, version = version + 1, updated_at = ?
             WHERE id = ? AND status = 'sent'",
        )
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        self.status_write_outcome(id, result.rows_affected()).await
    }

    async fn record_acceptance(
        &self,
        id: &QuoteId,
        now: DateTime<Utc>,
    ) -> Result<StatusWrite, RepositoryError> {
        let result = sqlx::query(
            "UPDATE quote SET
                status = 'accepted', accepted_at = ?, version = version + 1, updated_at = ?
             WHERE id = ? AND status IN ('sent', 'viewed')",
        )
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        self.status_write_outcome(id, result.rows_affected()).await
    }

    async fn record_decline(
        &self,
        id: &QuoteId,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<StatusWrite, RepositoryError> {
        let result = sqlx::query(
            "UPDATE quote SET
                status = 'declined', declined_at = ?, decline_reason = ?,
                version = version + 1, updated_at = ?
             WHERE id = ? AND status IN ('sent', 'viewed')",
        )
        .bind(now.to_rfc3339())
        .bind(reason)
        .bind(now.to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        self.status_write_outcome(id, result.rows_affected()).await
    }
}

fn quote_from_row(row: SqliteRow) -> Result<Quote, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = QuoteStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown quote status `{status_raw}`")))?;

    Ok(Quote {
        id: QuoteId(row.try_get("id")?),
        quote_number: row.try_get("quote_number")?,
        version: parse_u32("version", row.try_get("version")?)?,
        status,
        agent_id: AgentId(row.try_get("agent_id")?),
        client_id: row.try_get::<Option<String>, _>("client_id")?.map(ClientId),
        parent_quote_id: row.try_get::<Option<String>, _>("parent_quote_id")?.map(QuoteId),
        is_alternative: row.try_get::<i64, _>("is_alternative")? != 0,
        trip_name: row.try_get("trip_name")?,
        destination: row.try_get("destination")?,
        start_date: parse_date("start_date", row.try_get("start_date")?)?,
        end_date: parse_date("end_date", row.try_get("end_date")?)?,
        duration_days: parse_u32("duration_days", row.try_get("duration_days")?)?,
        travelers: Travelers {
            adults: parse_u32("adults", row.try_get("adults")?)?,
            children: parse_u32("children", row.try_get("children")?)?,
            infants: parse_u32("infants", row.try_get("infants")?)?,
        },
        items: QuoteItems {
            flights: parse_items("flights", row.try_get("flights")?)?,
            hotels: parse_items("hotels", row.try_get("hotels")?)?,
            activities: parse_items("activities", row.try_get("activities")?)?,
            transfers: parse_items("transfers", row.try_get("transfers")?)?,
            car_rentals: parse_items("car_rentals", row.try_get("car_rentals")?)?,
            insurance: parse_items("insurance", row.try_get("insurance")?)?,
            custom_items: parse_items("custom_items", row.try_get("custom_items")?)?,
        },
        costs: CostBreakdown {
            flights: parse_decimal("flights_cost", row.try_get("flights_cost")?)?,
            hotels: parse_decimal("hotels_cost", row.try_get("hotels_cost")?)?,
            activities: parse_decimal("activities_cost", row.try_get("activities_cost")?)?,
            transfers: parse_decimal("transfers_cost", row.try_get("transfers_cost")?)?,
            car_rentals: parse_decimal("car_rentals_cost", row.try_get("car_rentals_cost")?)?,
            insurance: parse_decimal("insurance_cost", row.try_get("insurance_cost")?)?,
            custom_items: parse_decimal("custom_items_cost", row.try_get("custom_items_cost")?)?,
        },
        pricing: PricingSummary {
            subtotal: parse_decimal("subtotal", row.try_get("subtotal")?)?,
            agent_markup_percent: parse_decimal(
                "agent_markup_percent",
                row.try_get("agent_markup_percent")?,
            )?,
            agent_markup: parse_decimal("agent_markup", row.try_get("agent_markup")?)?,
            taxes: parse_decimal("taxes", row.try_get("taxes")?)?,
            fees: parse_decimal("fees", row.try_get("fees")?)?,
            discount: parse_decimal("discount", row.try_get("discount")?)?,
            total: parse_decimal("total", row.try_get("total")?)?,
        },
        currency: row.try_get("currency")?,
        notes: row.try_get("notes")?,
        agent_notes: row.try_get("agent_notes")?,
        terms: row.try_get("terms")?,
        delivery: DeliveryState {
            sent_at: parse_optional_timestamp("sent_at", row.try_get("sent_at")?)?,
            email_sent_count: parse_u32("email_sent_count", row.try_get("email_sent_count")?)?,
            sms_sent_count: parse_u32("sms_sent_count", row.try_get("sms_sent_count")?)?,
            shared_with_client: row.try_get::<i64, _>("shared_with_client")? != 0,
        },
        viewed_at: parse_optional_timestamp("viewed_at", row.try_get("viewed_at")?)?,
        accepted_at: parse_optional_timestamp("accepted_at", row.try_get("accepted_at")?)?,
        declined_at: parse_optional_timestamp("declined_at", row.try_get("declined_at")?)?,
        decline_reason: row.try_get("decline_reason")?,
        view_token: row.try_get("view_token")?,
        expires_at: parse_optional_timestamp("expires_at", row.try_get("expires_at")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, NaiveDate, Utc};
    use rust_decimal::Decimal;
    use serde_json::json;

    use wayfarer_core::domain::agent::AgentId;
    use wayfarer_core::domain::quote::{
        CostBreakdown, PricingSummary, Quote, QuoteDraft, QuoteItems, QuoteStatus, SendChannel,
        Travelers,
    };

    use super::SqlQuoteRepository;
    use crate::migrations;
    use crate::repositories::{CommitOutcome, QuoteRepository, SendOutcome, StatusWrite};
    use crate::{connect_with_settings, DbPool};

    #[tokio::test]
    async fn insert_then_find_round_trips_the_aggregate() {
        let pool = setup_pool().await;
        let agent_id = insert_agent(&pool, "agent-rt-1").await;
        let repo = SqlQuoteRepository::new(pool.clone());

        let quote = sample_quote(&agent_id, QuoteStatus::Draft);
        repo.insert(&quote).await.expect("insert quote");

        let found = repo.find_by_id(&quote.id).await.expect("find quote");
        assert_eq!(found, Some(quote.clone()));

        let by_token =
            repo.find_by_view_token(&quote.view_token).await.expect("find by view token");
        assert_eq!(by_token, Some(quote));

        pool.close().await;
    }

    #[tokio::test]
    async fn commit_update_bumps_version_and_rewrites_content() {
        let pool = setup_pool().await;
        let agent_id = insert_agent(&pool, "agent-cas-1").await;
        let repo = SqlQuoteRepository::new(pool.clone());

        let quote = sample_quote(&agent_id, QuoteStatus::Draft);
        repo.insert(&quote).await.expect("insert quote");

        let mut draft = sample_draft();
        draft.trip_name = "Amalfi Coast, Extended".to_string();
        draft.end_date = date(2026, 9, 24);
        let now = parse_ts("2026-08-02T10:00:00Z");

        let outcome =
            repo.commit_update(&quote.id, 1, &draft, now).await.expect("commit update");

        match outcome {
            CommitOutcome::Committed(updated) => {
                assert_eq!(updated.version, 2);
                assert_eq!(updated.trip_name, "Amalfi Coast, Extended");
                assert_eq!(updated.duration_days, 10);
                assert_eq!(updated.updated_at, now);
                assert_eq!(updated.created_at, quote.created_at);
            }
            other => panic!("expected committed outcome, got {other:?}"),
        }

        pool.close().await;
    }

    #[tokio::test]
    async fn stale_writer_observes_conflict_with_authoritative_version() {
        let pool = setup_pool().await;
        let agent_id = insert_agent(&pool, "agent-cas-2").await;
        let repo = SqlQuoteRepository::new(pool.clone());

        let mut quote = sample_quote(&agent_id, QuoteStatus::Draft);
        quote.version = 3;
        repo.insert(&quote).await.expect("insert quote");

        let draft = sample_draft();
        let now = parse_ts("2026-08-02T10:00:00Z");

        let winner = repo.commit_update(&quote.id, 3, &draft, now).await.expect("first commit");
        match winner {
            CommitOutcome::Committed(updated) => assert_eq!(updated.version, 4),
            other => panic!("expected committed outcome, got {other:?}"),
        }

        let loser = repo.commit_update(&quote.id, 3, &draft, now).await.expect("second commit");
        assert_eq!(loser, CommitOutcome::Conflict { expected: 3, actual: 4 });

        pool.close().await;
    }

    #[tokio::test]
    async fn commit_update_on_missing_quote_reports_not_found() {
        let pool = setup_pool().await;
        let repo = SqlQuoteRepository::new(pool.clone());

        let outcome = repo
            .commit_update(
                &wayfarer_core::domain::quote::QuoteId("missing".to_string()),
                1,
                &sample_draft(),
                parse_ts("2026-08-02T10:00:00Z"),
            )
            .await
            .expect("commit update");

        assert_eq!(outcome, CommitOutcome::NotFound);

        pool.close().await;
    }

    #[tokio::test]
    async fn fresh_send_records_bookkeeping_and_promotes_draft() {
        let pool = setup_pool().await;
        let agent_id = insert_agent(&pool, "agent-send-1").await;
        let repo = SqlQuoteRepository::new(pool.clone());

        let quote = sample_quote(&agent_id, QuoteStatus::Draft);
        repo.insert(&quote).await.expect("insert quote");

        let now = parse_ts("2026-08-02T10:00:00Z");
        let outcome = repo
            .record_send(&quote.id, SendChannel::Email, now, 300)
            .await
            .expect("record send")
            .expect("quote exists");

        match outcome {
            SendOutcome::Fresh(sent) => {
                assert_eq!(sent.status, QuoteStatus::Sent);
                assert_eq!(sent.delivery.sent_at, Some(now));
                assert_eq!(sent.delivery.email_sent_count, 1);
                assert_eq!(sent.delivery.sms_sent_count, 0);
                assert!(sent.delivery.shared_with_client);
                assert_eq!(sent.version, quote.version + 1);
            }
            other => panic!("expected fresh send, got {other:?}"),
        }

        pool.close().await;
    }

    #[tokio::test]
    async fn repeat_send_inside_window_touches_nothing() {
        let pool = setup_pool().await;
        let agent_id = insert_agent(&pool, "agent-send-2").await;
        let repo = SqlQuoteRepository::new(pool.clone());

        let quote = sample_quote(&agent_id, QuoteStatus::Draft);
        repo.insert(&quote).await.expect("insert quote");

        let first = parse_ts("2026-08-02T10:00:00Z");
        repo.record_send(&quote.id, SendChannel::Email, first, 300)
            .await
            .expect("first send")
            .expect("quote exists");

        let retry = first + Duration::seconds(60);
        let outcome = repo
            .record_send(&quote.id, SendChannel::Whatsapp, retry, 300)
            .await
            .expect("second send")
            .expect("quote exists");

        match outcome {
            SendOutcome::Repeat(unchanged) => {
                assert_eq!(unchanged.delivery.sent_at, Some(first));
                assert_eq!(unchanged.delivery.email_sent_count, 1);
                assert_eq!(unchanged.delivery.sms_sent_count, 0);
                assert_eq!(unchanged.version, quote.version + 1);
                assert_eq!(unchanged.updated_at, first);
            }
            other => panic!("expected repeat send, got {other:?}"),
        }

        pool.close().await;
    }

    #[tokio::test]
    async fn send_after_window_increments_without_moving_sent_at() {
        let pool = setup_pool().await;
        let agent_id = insert_agent(&pool, "agent-send-3").await;
        let repo = SqlQuoteRepository::new(pool.clone());

        let quote = sample_quote(&agent_id, QuoteStatus::Draft);
        repo.insert(&quote).await.expect("insert quote");

        let first = parse_ts("2026-08-02T10:00:00Z");
        repo.record_send(&quote.id, SendChannel::Email, first, 300)
            .await
            .expect("first send")
            .expect("quote exists");

        let later = first + Duration::seconds(400);
        let outcome = repo
            .record_send(&quote.id, SendChannel::Email, later, 300)
            .await
            .expect("later send")
            .expect("quote exists");

        match outcome {
            SendOutcome::Fresh(sent) => {
                assert_eq!(sent.delivery.sent_at, Some(first));
                assert_eq!(sent.delivery.email_sent_count, 2);
                assert_eq!(sent.updated_at, later);
            }
            other => panic!("expected fresh send, got {other:?}"),
        }

        pool.close().await;
    }

    #[tokio::test]
    async fn link_send_advances_no_counter_and_keeps_non_draft_status() {
        let pool = setup_pool().await;
        let agent_id = insert_agent(&pool, "agent-send-4").await;
        let repo = SqlQuoteRepository::new(pool.clone());

        let mut quote = sample_quote(&agent_id, QuoteStatus::Accepted);
        quote.accepted_at = Some(parse_ts("2026-08-01T12:00:00Z"));
        repo.insert(&quote).await.expect("insert quote");

        let now = parse_ts("2026-08-02T10:00:00Z");
        let outcome = repo
            .record_send(&quote.id, SendChannel::Link, now, 300)
            .await
            .expect("record send")
            .expect("quote exists");

        match outcome {
            SendOutcome::Fresh(sent) => {
                assert_eq!(sent.status, QuoteStatus::Accepted);
                assert_eq!(sent.delivery.email_sent_count, 0);
                assert_eq!(sent.delivery.sms_sent_count, 0);
                assert_eq!(sent.delivery.sent_at, Some(now));
                assert!(sent.delivery.shared_with_client);
            }
            other => panic!("expected fresh send, got {other:?}"),
        }

        pool.close().await;
    }

    #[tokio::test]
    async fn client_view_applies_once_then_is_ignored() {
        let pool = setup_pool().await;
        let agent_id = insert_agent(&pool, "agent-view-1").await;
        let repo = SqlQuoteRepository::new(pool.clone());

        let quote = sample_quote(&agent_id, QuoteStatus::Sent);
        repo.insert(&quote).await.expect("insert quote");

        let now = parse_ts("2026-08-03T08:00:00Z");
        let first = repo.record_client_view(&quote.id, now).await.expect("first view");
        match first {
            StatusWrite::Applied(viewed) => {
                assert_eq!(viewed.status, QuoteStatus::Viewed);
                assert_eq!(viewed.viewed_at, Some(now));
                assert_eq!(viewed.version, quote.version + 1);
            }
            other => panic!("expected applied view, got {other:?}"),
        }

        let second = repo
            .record_client_view(&quote.id, now + Duration::seconds(30))
            .await
            .expect("second view");
        match second {
            StatusWrite::Ignored(unchanged) => {
                assert_eq!(unchanged.status, QuoteStatus::Viewed);
                assert_eq!(unchanged.viewed_at, Some(now));
            }
            other => panic!("expected ignored view, got {other:?}"),
        }

        pool.close().await;
    }

    #[tokio::test]
    async fn acceptance_applies_from_sent_or_viewed_only() {
        let pool = setup_pool().await;
        let agent_id = insert_agent(&pool, "agent-accept-1").await;
        let repo = SqlQuoteRepository::new(pool.clone());

        let draft = sample_quote(&agent_id, QuoteStatus::Draft);
        repo.insert(&draft).await.expect("insert draft");

        let now = parse_ts("2026-08-03T08:00:00Z");
        let on_draft = repo.record_acceptance(&draft.id, now).await.expect("accept draft");
        assert!(matches!(on_draft, StatusWrite::Ignored(_)));

        let viewed = sample_quote(&agent_id, QuoteStatus::Viewed);
        repo.insert(&viewed).await.expect("insert viewed");

        let on_viewed = repo.record_acceptance(&viewed.id, now).await.expect("accept viewed");
        match on_viewed {
            StatusWrite::Applied(accepted) => {
                assert_eq!(accepted.status, QuoteStatus::Accepted);
                assert_eq!(accepted.accepted_at, Some(now));
            }
            other => panic!("expected applied acceptance, got {other:?}"),
        }

        pool.close().await;
    }

    #[tokio::test]
    async fn decline_records_the_reason() {
        let pool = setup_pool().await;
        let agent_id = insert_agent(&pool, "agent-decline-1").await;
        let repo = SqlQuoteRepository::new(pool.clone());

        let quote = sample_quote(&agent_id, QuoteStatus::Sent);
        repo.insert(&quote).await.expect("insert quote");

        let now = parse_ts("2026-08-03T08:00:00Z");
        let outcome = repo
            .record_decline(&quote.id, Some("found a better price"), now)
            .await
            .expect("decline");

        match outcome {
            StatusWrite::Applied(declined) => {
                assert_eq!(declined.status, QuoteStatus::Declined);
                assert_eq!(declined.declined_at, Some(now));
                assert_eq!(declined.decline_reason.as_deref(), Some("found a better price"));
            }
            other => panic!("expected applied decline, got {other:?}"),
        }

        pool.close().await;
    }

    #[tokio::test]
    async fn list_for_agent_filters_by_status() {
        let pool = setup_pool().await;
        let agent_id = insert_agent(&pool, "agent-list-1").await;
        let other_agent = insert_agent(&pool, "agent-list-2").await;
        let repo = SqlQuoteRepository::new(pool.clone());

        let draft = sample_quote(&agent_id, QuoteStatus::Draft);
        let sent = sample_quote(&agent_id, QuoteStatus::Sent);
        let foreign = sample_quote(&other_agent, QuoteStatus::Draft);
        repo.insert(&draft).await.expect("insert draft");
        repo.insert(&sent).await.expect("insert sent");
        repo.insert(&foreign).await.expect("insert foreign");

        let all = repo.list_for_agent(&agent_id, None).await.expect("list all");
        assert_eq!(all.len(), 2);

        let drafts =
            repo.list_for_agent(&agent_id, Some(QuoteStatus::Draft)).await.expect("list drafts");
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].id, draft.id);

        pool.close().await;
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    async fn insert_agent(pool: &DbPool, agent_id: &str) -> AgentId {
        let timestamp = "2026-08-01T09:00:00+00:00";

        sqlx::query(
            "INSERT INTO agent (id, name, email, phone, agency_name, created_at, updated_at)
             VALUES (?, 'Dana Reyes', ?, NULL, 'Wayfarer Travel', ?, ?)",
        )
        .bind(agent_id)
        .bind(format!("{agent_id}@wayfarer.test"))
        .bind(timestamp)
        .bind(timestamp)
        .execute(pool)
        .await
        .expect("insert agent");

        AgentId(agent_id.to_string())
    }

    fn sample_draft() -> QuoteDraft {
        QuoteDraft {
            client_id: None,
            trip_name: "Amalfi Coast Escape".to_string(),
            destination: "Positano, Italy".to_string(),
            start_date: date(2026, 9, 14),
            end_date: date(2026, 9, 21),
            travelers: Travelers { adults: 2, children: 1, infants: 0 },
            items: QuoteItems {
                flights: vec![json!({"route": "JFK-NAP", "carrier": "ITA"})],
                hotels: vec![json!({"name": "Le Sirenuse", "nights": 7})],
                ..QuoteItems::default()
            },
            costs: CostBreakdown {
                flights: dec("2400.00"),
                hotels: dec("3150.00"),
                ..CostBreakdown::default()
            },
            pricing: PricingSummary {
                subtotal: dec("5550.00"),
                agent_markup_percent: dec("10"),
                agent_markup: dec("555.00"),
                taxes: dec("305.25"),
                fees: dec("90.00"),
                discount: dec("100.00"),
                total: dec("6400.25"),
            },
            currency: "USD".to_string(),
            notes: Some("Client prefers sea-view rooms.".to_string()),
            agent_notes: None,
            terms: Some("50% deposit due at booking.".to_string()),
        }
    }

    fn sample_quote(agent_id: &AgentId, status: QuoteStatus) -> Quote {
        let mut quote = Quote::from_draft(
            sample_draft(),
            agent_id.clone(),
            parse_ts("2026-08-01T09:00:00Z"),
            7,
        );
        quote.status = status;
        quote
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn dec(value: &str) -> Decimal {
        value.parse().expect("valid decimal")
    }

    fn parse_ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value).expect("valid rfc3339").with_timezone(&Utc)
    }
}
