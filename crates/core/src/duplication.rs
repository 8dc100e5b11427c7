use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::quote::{Quote, QuoteDraft};

/// Caller-selected duplication behavior.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DuplicateOptions {
    pub target_client_id: Option<crate::domain::client::ClientId>,
    pub new_trip_name: Option<String>,
    pub adjust_dates: bool,
    pub create_as_alternative: bool,
}

/// Fixed horizons applied to every clone, sourced from configuration.
#[derive(Clone, Copy, Debug)]
pub struct DuplicationPolicy {
    pub start_offset_days: u32,
    pub expiry_days: u32,
}

impl Default for DuplicationPolicy {
    fn default() -> Self {
        Self { start_offset_days: 30, expiry_days: 7 }
    }
}

/// Deep, independent copy of a quote's cost-bearing and content fields.
///
/// The clone starts a fresh lifecycle regardless of the source's state:
/// new id, number, and view token, version 1, draft status, empty delivery
/// bookkeeping, cleared outcome stamps, and a fresh expiry. With
/// `adjust_dates` the start moves to a fixed horizon from now and the end
/// preserves the source's trip length.
pub fn clone_quote(
    source: &Quote,
    options: &DuplicateOptions,
    now: DateTime<Utc>,
    policy: &DuplicationPolicy,
) -> Quote {
    let span_days = i64::from(source.duration_days);

    let (start_date, end_date) = if options.adjust_dates {
        let start = (now + Duration::days(i64::from(policy.start_offset_days))).date_naive();
        (start, start + Duration::days(span_days))
    } else {
        (source.start_date, source.end_date)
    };

    let draft = QuoteDraft {
        client_id: options.target_client_id.clone().or_else(|| source.client_id.clone()),
        trip_name: options.new_trip_name.clone().unwrap_or_else(|| source.trip_name.clone()),
        destination: source.destination.clone(),
        start_date,
        end_date,
        travelers: source.travelers,
        items: source.items.clone(),
        costs: source.costs,
        pricing: source.pricing,
        currency: source.currency.clone(),
        notes: source.notes.clone(),
        agent_notes: source.agent_notes.clone(),
        terms: source.terms.clone(),
    };

    let mut clone = Quote::from_draft(draft, source.agent_id.clone(), now, policy.expiry_days);
    if options.create_as_alternative {
        clone.parent_quote_id = Some(source.id.clone());
        clone.is_alternative = true;
    }
    clone
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, Utc};
    use rust_decimal::Decimal;
    use serde_json::json;

    use crate::domain::agent::AgentId;
    use crate::domain::client::ClientId;
    use crate::domain::quote::{
        CostBreakdown, PricingSummary, Quote, QuoteDraft, QuoteItems, QuoteStatus, Travelers,
    };
    use crate::pricing;

    use super::{clone_quote, DuplicateOptions, DuplicationPolicy};

    fn sent_quote() -> Quote {
        let costs = CostBreakdown {
            flights: Decimal::new(180_000, 2),
            hotels: Decimal::new(260_000, 2),
            ..CostBreakdown::default()
        };
        let subtotal = costs.component_sum();
        let draft = QuoteDraft {
            client_id: Some(ClientId("C-1".to_string())),
            trip_name: "Bali Honeymoon".to_string(),
            destination: "Ubud, Bali".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 10, 5).expect("valid date"),
            end_date: NaiveDate::from_ymd_opt(2026, 10, 15).expect("valid date"),
            travelers: Travelers { adults: 2, children: 0, infants: 0 },
            items: QuoteItems {
                hotels: vec![json!({ "name": "Hanging Gardens", "nights": 10 })],
                ..QuoteItems::default()
            },
            costs,
            pricing: PricingSummary {
                subtotal,
                taxes: Decimal::new(35_000, 2),
                total: subtotal + Decimal::new(35_000, 2),
                ..PricingSummary::default()
            },
            currency: "USD".to_string(),
            notes: Some("Window seats requested".to_string()),
            agent_notes: Some("Repeat customer".to_string()),
            terms: Some("50% deposit due at booking".to_string()),
        };

        let mut quote = Quote::from_draft(draft, AgentId("A-1".to_string()), Utc::now(), 7);
        quote.status = QuoteStatus::Sent;
        quote.version = 4;
        quote.delivery.sent_at = Some(Utc::now());
        quote.delivery.email_sent_count = 2;
        quote.delivery.shared_with_client = true;
        quote.viewed_at = Some(Utc::now());
        quote
    }

    #[test]
    fn clone_starts_a_fresh_lifecycle() {
        let source = sent_quote();
        let now = Utc::now();

        let clone =
            clone_quote(&source, &DuplicateOptions::default(), now, &DuplicationPolicy::default());

        assert_ne!(clone.id, source.id);
        assert_ne!(clone.quote_number, source.quote_number);
        assert_ne!(clone.view_token, source.view_token);
        assert_eq!(clone.version, 1);
        assert_eq!(clone.status, QuoteStatus::Draft);
        assert!(clone.delivery.sent_at.is_none());
        assert_eq!(clone.delivery.email_sent_count, 0);
        assert!(!clone.delivery.shared_with_client);
        assert!(clone.viewed_at.is_none());
        assert_eq!(clone.expires_at, Some(now + Duration::days(7)));
        assert!(clone.parent_quote_id.is_none());
        assert!(!clone.is_alternative);
    }

    #[test]
    fn clone_copies_content_and_passes_pricing_validation() {
        let source = sent_quote();
        let clone = clone_quote(
            &source,
            &DuplicateOptions::default(),
            Utc::now(),
            &DuplicationPolicy::default(),
        );

        assert_eq!(clone.costs, source.costs);
        assert_eq!(clone.pricing, source.pricing);
        assert_eq!(clone.items, source.items);
        assert_eq!(clone.client_id, source.client_id);
        assert_eq!(clone.notes, source.notes);
        assert_eq!(pricing::validate(&clone.costs, &clone.pricing), Ok(()));
    }

    #[test]
    fn clone_is_independent_of_the_source() {
        let source = sent_quote();
        let mut clone = clone_quote(
            &source,
            &DuplicateOptions::default(),
            Utc::now(),
            &DuplicationPolicy::default(),
        );

        clone.items.hotels.clear();
        clone.costs.hotels = Decimal::ZERO;

        assert_eq!(source.items.hotels.len(), 1);
        assert_ne!(source.costs.hotels, Decimal::ZERO);
    }

    #[test]
    fn adjusted_dates_preserve_trip_length() {
        let source = sent_quote();
        let now = Utc::now();
        let policy = DuplicationPolicy::default();

        let clone = clone_quote(
            &source,
            &DuplicateOptions { adjust_dates: true, ..DuplicateOptions::default() },
            now,
            &policy,
        );

        let expected_start = (now + Duration::days(30)).date_naive();
        assert_eq!(clone.start_date, expected_start);
        assert_eq!(clone.end_date, expected_start + Duration::days(10));
        assert_eq!(clone.duration_days, source.duration_days);
    }

    #[test]
    fn alternative_clones_link_back_to_the_source() {
        let source = sent_quote();
        let clone = clone_quote(
            &source,
            &DuplicateOptions { create_as_alternative: true, ..DuplicateOptions::default() },
            Utc::now(),
            &DuplicationPolicy::default(),
        );

        assert_eq!(clone.parent_quote_id, Some(source.id.clone()));
        assert!(clone.is_alternative);
    }

    #[test]
    fn retargeting_and_renaming_take_effect() {
        let source = sent_quote();
        let clone = clone_quote(
            &source,
            &DuplicateOptions {
                target_client_id: Some(ClientId("C-2".to_string())),
                new_trip_name: Some("Bali Honeymoon (Deluxe)".to_string()),
                ..DuplicateOptions::default()
            },
            Utc::now(),
            &DuplicationPolicy::default(),
        );

        assert_eq!(clone.client_id, Some(ClientId("C-2".to_string())));
        assert_eq!(clone.trip_name, "Bali Honeymoon (Deluxe)");
        assert_eq!(clone.destination, source.destination);
    }
}
