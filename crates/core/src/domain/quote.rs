use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::agent::AgentId;
use crate::domain::client::ClientId;
use crate::errors::EngineError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

impl QuoteId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Viewed,
    Accepted,
    Declined,
    Expired,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Viewed => "viewed",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "sent" => Some(Self::Sent),
            "viewed" => Some(Self::Viewed),
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Declined | Self::Expired)
    }
}

/// Traveler head count. Infants travel free and are excluded from
/// per-person pricing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Travelers {
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
}

impl Travelers {
    pub fn counted(&self) -> u32 {
        self.adults + self.children
    }
}

impl Default for Travelers {
    fn default() -> Self {
        Self { adults: 1, children: 0, infants: 0 }
    }
}

/// Free-form itinerary items grouped by category. Item shape is owned by
/// the authoring UI; this engine treats each entry as opaque JSON.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuoteItems {
    pub flights: Vec<Value>,
    pub hotels: Vec<Value>,
    pub activities: Vec<Value>,
    pub transfers: Vec<Value>,
    pub car_rentals: Vec<Value>,
    pub insurance: Vec<Value>,
    pub custom_items: Vec<Value>,
}

impl QuoteItems {
    pub fn total_count(&self) -> usize {
        self.flights.len()
            + self.hotels.len()
            + self.activities.len()
            + self.transfers.len()
            + self.car_rentals.len()
            + self.insurance.len()
            + self.custom_items.len()
    }
}

/// Per-category cost roll-up. The sum of these fields must agree with the
/// quote's `subtotal`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CostBreakdown {
    pub flights: Decimal,
    pub hotels: Decimal,
    pub activities: Decimal,
    pub transfers: Decimal,
    pub car_rentals: Decimal,
    pub insurance: Decimal,
    pub custom_items: Decimal,
}

impl CostBreakdown {
    pub fn component_sum(&self) -> Decimal {
        self.flights
            + self.hotels
            + self.activities
            + self.transfers
            + self.car_rentals
            + self.insurance
            + self.custom_items
    }

    pub fn components(&self) -> [(&'static str, Decimal); 7] {
        [
            ("flights_cost", self.flights),
            ("hotels_cost", self.hotels),
            ("activities_cost", self.activities),
            ("transfers_cost", self.transfers),
            ("car_rentals_cost", self.car_rentals),
            ("insurance_cost", self.insurance),
            ("custom_items_cost", self.custom_items),
        ]
    }
}

/// Monetary summary. `total` must equal
/// `subtotal + agent_markup + taxes + fees - discount` within the price
/// tolerance at every committed state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PricingSummary {
    pub subtotal: Decimal,
    pub agent_markup_percent: Decimal,
    pub agent_markup: Decimal,
    pub taxes: Decimal,
    pub fees: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

/// Delivery bookkeeping. `sent_at` is written once on the first send and
/// never overwritten by later sends.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryState {
    pub sent_at: Option<DateTime<Utc>>,
    pub email_sent_count: u32,
    pub sms_sent_count: u32,
    pub shared_with_client: bool,
}

/// Outbound channel chosen when sharing a quote with a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendChannel {
    Email,
    Whatsapp,
    Link,
}

impl SendChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Whatsapp => "whatsapp",
            Self::Link => "link",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "email" => Some(Self::Email),
            "whatsapp" => Some(Self::Whatsapp),
            "link" => Some(Self::Link),
            _ => None,
        }
    }
}

/// Caller-authored content of a quote: everything an agent may set on
/// create or while the quote is still a draft. Identity, version, status,
/// and bookkeeping fields are engine-owned and absent here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteDraft {
    pub client_id: Option<ClientId>,
    pub trip_name: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub travelers: Travelers,
    #[serde(default)]
    pub items: QuoteItems,
    #[serde(default)]
    pub costs: CostBreakdown,
    #[serde(default)]
    pub pricing: PricingSummary,
    pub currency: String,
    pub notes: Option<String>,
    pub agent_notes: Option<String>,
    pub terms: Option<String>,
}

impl QuoteDraft {
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut violations = Vec::new();

        if self.trip_name.trim().is_empty() {
            violations.push("trip_name is required".to_string());
        }
        if self.destination.trim().is_empty() {
            violations.push("destination is required".to_string());
        }
        if self.end_date < self.start_date {
            violations.push("end_date must not be before start_date".to_string());
        }
        if self.travelers.adults == 0 {
            violations.push("at least one adult traveler is required".to_string());
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            violations.push("currency must be a 3-letter ISO code".to_string());
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(EngineError::QuoteValidationFailed { violations })
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: QuoteId,
    pub quote_number: String,
    pub version: u32,
    pub status: QuoteStatus,
    pub agent_id: AgentId,
    pub client_id: Option<ClientId>,
    pub parent_quote_id: Option<QuoteId>,
    pub is_alternative: bool,

    pub trip_name: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_days: u32,
    pub travelers: Travelers,

    pub items: QuoteItems,
    pub costs: CostBreakdown,
    pub pricing: PricingSummary,
    pub currency: String,

    pub notes: Option<String>,
    pub agent_notes: Option<String>,
    pub terms: Option<String>,

    pub delivery: DeliveryState,
    pub viewed_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub declined_at: Option<DateTime<Utc>>,
    pub decline_reason: Option<String>,
    pub view_token: String,
    pub expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    /// Builds a fresh draft quote from authored content. The caller is
    /// expected to have run `QuoteDraft::validate` and the pricing
    /// validator first.
    pub fn from_draft(
        draft: QuoteDraft,
        agent_id: AgentId,
        now: DateTime<Utc>,
        expiry_days: u32,
    ) -> Self {
        let duration_days = trip_span_days(draft.start_date, draft.end_date);

        Self {
            id: QuoteId::generate(),
            quote_number: new_quote_number(now.year()),
            version: 1,
            status: QuoteStatus::Draft,
            agent_id,
            client_id: draft.client_id,
            parent_quote_id: None,
            is_alternative: false,
            trip_name: draft.trip_name,
            destination: draft.destination,
            start_date: draft.start_date,
            end_date: draft.end_date,
            duration_days,
            travelers: draft.travelers,
            items: draft.items,
            costs: draft.costs,
            pricing: draft.pricing,
            currency: draft.currency,
            notes: draft.notes,
            agent_notes: draft.agent_notes,
            terms: draft.terms,
            delivery: DeliveryState::default(),
            viewed_at: None,
            accepted_at: None,
            declined_at: None,
            decline_reason: None,
            view_token: new_view_token(),
            expires_at: Some(now + Duration::days(i64::from(expiry_days))),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn can_transition_to(&self, next: QuoteStatus) -> bool {
        matches!(
            (self.status, next),
            (QuoteStatus::Draft, QuoteStatus::Sent)
                | (QuoteStatus::Sent, QuoteStatus::Viewed)
                | (QuoteStatus::Sent, QuoteStatus::Accepted)
                | (QuoteStatus::Sent, QuoteStatus::Declined)
                | (QuoteStatus::Sent, QuoteStatus::Expired)
                | (QuoteStatus::Viewed, QuoteStatus::Accepted)
                | (QuoteStatus::Viewed, QuoteStatus::Declined)
                | (QuoteStatus::Viewed, QuoteStatus::Expired)
        )
    }

    /// Structural fields may change only while the quote is a draft.
    pub fn can_edit_structure(&self) -> bool {
        matches!(self.status, QuoteStatus::Draft)
    }

    /// Extracts the caller-authored content, as it would be supplied on a
    /// create or update request.
    pub fn to_draft(&self) -> QuoteDraft {
        QuoteDraft {
            client_id: self.client_id.clone(),
            trip_name: self.trip_name.clone(),
            destination: self.destination.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            travelers: self.travelers,
            items: self.items.clone(),
            costs: self.costs,
            pricing: self.pricing,
            currency: self.currency.clone(),
            notes: self.notes.clone(),
            agent_notes: self.agent_notes.clone(),
            terms: self.terms.clone(),
        }
    }

    pub fn per_person_total(&self) -> Decimal {
        let travelers = self.travelers.counted();
        if travelers == 0 {
            return self.pricing.total;
        }
        (self.pricing.total / Decimal::from(travelers)).round_dp(2)
    }
}

/// Whole days between the trip start and end dates.
pub fn trip_span_days(start: NaiveDate, end: NaiveDate) -> u32 {
    u32::try_from((end - start).num_days()).unwrap_or(0)
}

pub fn new_quote_number(year: i32) -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("WQ-{year}-{}", &token[..8])
}

pub fn new_view_token() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use crate::domain::agent::AgentId;
    use crate::errors::EngineError;

    use super::{
        new_quote_number, trip_span_days, CostBreakdown, PricingSummary, Quote, QuoteDraft,
        QuoteItems, QuoteStatus, SendChannel, Travelers,
    };

    fn draft() -> QuoteDraft {
        QuoteDraft {
            client_id: None,
            trip_name: "Kyoto in Autumn".to_string(),
            destination: "Kyoto, Japan".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 11, 2).expect("valid date"),
            end_date: NaiveDate::from_ymd_opt(2026, 11, 9).expect("valid date"),
            travelers: Travelers { adults: 2, children: 0, infants: 0 },
            items: QuoteItems::default(),
            costs: CostBreakdown::default(),
            pricing: PricingSummary::default(),
            currency: "USD".to_string(),
            notes: None,
            agent_notes: None,
            terms: None,
        }
    }

    fn quote(status: QuoteStatus) -> Quote {
        let mut quote = Quote::from_draft(draft(), AgentId("A-1".to_string()), Utc::now(), 7);
        quote.status = status;
        quote
    }

    #[test]
    fn from_draft_starts_a_fresh_lifecycle() {
        let now = Utc::now();
        let quote = Quote::from_draft(draft(), AgentId("A-1".to_string()), now, 7);

        assert_eq!(quote.version, 1);
        assert_eq!(quote.status, QuoteStatus::Draft);
        assert_eq!(quote.duration_days, 7);
        assert_eq!(quote.delivery.email_sent_count, 0);
        assert!(quote.delivery.sent_at.is_none());
        assert!(!quote.delivery.shared_with_client);
        assert_eq!(quote.expires_at, Some(now + chrono::Duration::days(7)));
        assert!(!quote.view_token.is_empty());
    }

    #[test]
    fn allows_send_transition_from_draft_only() {
        assert!(quote(QuoteStatus::Draft).can_transition_to(QuoteStatus::Sent));
        assert!(!quote(QuoteStatus::Accepted).can_transition_to(QuoteStatus::Sent));
        assert!(!quote(QuoteStatus::Expired).can_transition_to(QuoteStatus::Sent));
    }

    #[test]
    fn client_outcomes_require_a_shared_quote() {
        assert!(quote(QuoteStatus::Sent).can_transition_to(QuoteStatus::Accepted));
        assert!(quote(QuoteStatus::Viewed).can_transition_to(QuoteStatus::Declined));
        assert!(!quote(QuoteStatus::Draft).can_transition_to(QuoteStatus::Accepted));
        assert!(!quote(QuoteStatus::Declined).can_transition_to(QuoteStatus::Accepted));
    }

    #[test]
    fn structure_is_editable_only_while_draft() {
        assert!(quote(QuoteStatus::Draft).can_edit_structure());
        assert!(!quote(QuoteStatus::Sent).can_edit_structure());
        assert!(!quote(QuoteStatus::Viewed).can_edit_structure());
        assert!(!quote(QuoteStatus::Accepted).can_edit_structure());
    }

    #[test]
    fn per_person_splits_across_counted_travelers() {
        let mut quote = quote(QuoteStatus::Draft);
        quote.travelers = Travelers { adults: 2, children: 1, infants: 1 };
        quote.pricing.total = Decimal::new(300_000, 2);

        assert_eq!(quote.per_person_total(), Decimal::new(100_000, 2));
    }

    #[test]
    fn per_person_falls_back_to_total_without_travelers() {
        let mut quote = quote(QuoteStatus::Draft);
        quote.travelers = Travelers { adults: 0, children: 0, infants: 2 };
        quote.pricing.total = Decimal::new(50_000, 2);

        assert_eq!(quote.per_person_total(), Decimal::new(50_000, 2));
    }

    #[test]
    fn draft_validation_collects_all_violations() {
        let mut invalid = draft();
        invalid.trip_name = "  ".to_string();
        invalid.end_date = invalid.start_date - chrono::Duration::days(1);
        invalid.travelers.adults = 0;
        invalid.currency = "usd$".to_string();

        let error = invalid.validate().expect_err("draft should be rejected");
        match error {
            EngineError::QuoteValidationFailed { violations } => {
                assert_eq!(violations.len(), 4);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn status_codec_round_trips() {
        for status in [
            QuoteStatus::Draft,
            QuoteStatus::Sent,
            QuoteStatus::Viewed,
            QuoteStatus::Accepted,
            QuoteStatus::Declined,
            QuoteStatus::Expired,
        ] {
            assert_eq!(QuoteStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(QuoteStatus::parse("archived"), None);
    }

    #[test]
    fn quote_numbers_carry_prefix_and_year() {
        let number = new_quote_number(2026);
        assert!(number.starts_with("WQ-2026-"));
        assert_eq!(number.len(), 16);
    }

    #[test]
    fn channel_codec_round_trips() {
        for channel in [SendChannel::Email, SendChannel::Whatsapp, SendChannel::Link] {
            assert_eq!(SendChannel::parse(channel.as_str()), Some(channel));
        }
        assert_eq!(SendChannel::parse("fax"), None);
    }

    #[test]
    fn trip_span_ignores_reversed_dates() {
        let start = NaiveDate::from_ymd_opt(2026, 5, 10).expect("valid date");
        let end = NaiveDate::from_ymd_opt(2026, 5, 3).expect("valid date");
        assert_eq!(trip_span_days(start, end), 0);
    }
}
