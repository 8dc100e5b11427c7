use chrono::{DateTime, Datelike, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use wayfarer_core::domain::agent::{Agent, AgentId};
use wayfarer_core::domain::client::{Client, ClientId};
use wayfarer_core::domain::quote::{
    CostBreakdown, DeliveryState, PricingSummary, Quote, QuoteId, QuoteItems, QuoteStatus,
    Travelers,
};

use crate::repositories::{
    AgentRepository, ClientRepository, QuoteRepository, RepositoryError, SqlAgentRepository,
    SqlClientRepository, SqlQuoteRepository,
};
use crate::DbPool;

pub const SEED_AGENT_ID: &str = "agent-demo";
pub const SEED_CLIENT_IDS: &[&str] = &["client-sofia", "client-liam"];
pub const SEED_QUOTE_IDS: &[&str] = &["quote-rome-draft", "quote-bali-sent", "quote-andes-accepted"];

/// Rows inserted by a single `seed_sample_data` call. A repeat call against
/// an already seeded database inserts nothing and reports zeros.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub agents: usize,
    pub clients: usize,
    pub quotes: usize,
}

/// Loads a small demo book of business: one agent, two clients, and three
/// quotes spread across the lifecycle so every portal and API surface has
/// something to show. Safe to call repeatedly.
pub async fn seed_sample_data(pool: &DbPool) -> Result<SeedSummary, RepositoryError> {
    let agents = SqlAgentRepository::new(pool.clone());
    let clients = SqlClientRepository::new(pool.clone());
    let quotes = SqlQuoteRepository::new(pool.clone());

    let agent_id = AgentId(SEED_AGENT_ID.to_string());
    if agents.find_by_id(&agent_id).await?.is_some() {
        return Ok(SeedSummary { agents: 0, clients: 0, quotes: 0 });
    }

    let now = Utc::now();

    agents
        .insert(&Agent {
            id: agent_id.clone(),
            name: "Dana Reyes".to_string(),
            email: "dana@wayfarer.test".to_string(),
            phone: Some("+1 415 555 0117".to_string()),
            agency_name: Some("Wayfarer Travel Co.".to_string()),
            created_at: now,
            updated_at: now,
        })
        .await?;

    let sofia = Client {
        id: ClientId(SEED_CLIENT_IDS[0].to_string()),
        agent_id: agent_id.clone(),
        first_name: "Sofia".to_string(),
        last_name: "Marchetti".to_string(),
        email: Some("sofia.marchetti@example.com".to_string()),
        phone: Some("+39 347 555 0192".to_string()),
        created_at: now,
        updated_at: now,
    };
    let liam = Client {
        id: ClientId(SEED_CLIENT_IDS[1].to_string()),
        agent_id: agent_id.clone(),
        first_name: "Liam".to_string(),
        last_name: "O'Donnell".to_string(),
        email: Some("liam.odonnell@example.com".to_string()),
        phone: None,
        created_at: now,
        updated_at: now,
    };
    clients.insert(&sofia).await?;
    clients.insert(&liam).await?;

    for quote in demo_quotes(&agent_id, &sofia.id, &liam.id, now) {
        quotes.insert(&quote).await?;
    }

    Ok(SeedSummary { agents: 1, clients: 2, quotes: SEED_QUOTE_IDS.len() })
}

fn demo_quotes(
    agent_id: &AgentId,
    sofia: &ClientId,
    liam: &ClientId,
    now: DateTime<Utc>,
) -> Vec<Quote> {
    let year = now.year();

    let rome_costs = CostBreakdown {
        flights: Decimal::new(120_000, 2),
        hotels: Decimal::new(180_000, 2),
        activities: Decimal::new(40_000, 2),
        ..CostBreakdown::default()
    };
    let rome = Quote {
        id: QuoteId(SEED_QUOTE_IDS[0].to_string()),
        quote_number: format!("WQ-{year}-DEMO0001"),
        version: 1,
        status: QuoteStatus::Draft,
        agent_id: agent_id.clone(),
        client_id: None,
        parent_quote_id: None,
        is_alternative: false,
        trip_name: "Rome for the Holidays".to_string(),
        destination: "Rome, Italy".to_string(),
        start_date: date(year, 12, 19),
        end_date: date(year, 12, 27),
        duration_days: 8,
        travelers: Travelers { adults: 2, children: 0, infants: 0 },
        items: QuoteItems {
            flights: vec![json!({"name": "Round-trip airfare", "route": "JFK-FCO"})],
            hotels: vec![json!({"name": "Hotel de' Ricci", "nights": 8})],
            activities: vec![json!({"name": "Vatican early-entry tour"})],
            ..QuoteItems::default()
        },
        costs: rome_costs,
        pricing: pricing_for(rome_costs, Decimal::new(34_000, 2), Decimal::new(24_000, 2)),
        currency: "USD".to_string(),
        notes: Some("Waiting on the client's preferred departure airport.".to_string()),
        agent_notes: None,
        terms: None,
        delivery: DeliveryState::default(),
        viewed_at: None,
        accepted_at: None,
        declined_at: None,
        decline_reason: None,
        view_token: format!("demo{year}rome0001"),
        expires_at: Some(now + Duration::days(7)),
        created_at: now - Duration::days(1),
        updated_at: now - Duration::days(1),
    };

    let bali_costs = CostBreakdown {
        flights: Decimal::new(210_000, 2),
        hotels: Decimal::new(260_000, 2),
        transfers: Decimal::new(18_000, 2),
        insurance: Decimal::new(12_000, 2),
        ..CostBreakdown::default()
    };
    let mut bali = Quote {
        id: QuoteId(SEED_QUOTE_IDS[1].to_string()),
        quote_number: format!("WQ-{year}-DEMO0002"),
        version: 2,
        status: QuoteStatus::Sent,
        agent_id: agent_id.clone(),
        client_id: Some(sofia.clone()),
        parent_quote_id: None,
        is_alternative: false,
        trip_name: "Bali Honeymoon".to_string(),
        destination: "Ubud, Bali".to_string(),
        start_date: date(year, 9, 14),
        end_date: date(year, 9, 24),
        duration_days: 10,
        travelers: Travelers { adults: 2, children: 0, infants: 0 },
        items: QuoteItems {
            flights: vec![json!({"name": "Round-trip airfare", "route": "SFO-DPS"})],
            hotels: vec![json!({"name": "Rainforest villa", "nights": 10})],
            transfers: vec![json!({"name": "Private airport transfer"})],
            insurance: vec![json!({"name": "Trip protection"})],
            ..QuoteItems::default()
        },
        costs: bali_costs,
        pricing: pricing_for(bali_costs, Decimal::new(50_000, 2), Decimal::new(42_500, 2)),
        currency: "USD".to_string(),
        notes: None,
        agent_notes: Some("Honeymoon registry discount already applied.".to_string()),
        terms: Some("50% deposit due within 5 days of acceptance.".to_string()),
        delivery: DeliveryState {
            sent_at: Some(now - Duration::days(2)),
            email_sent_count: 1,
            sms_sent_count: 0,
            shared_with_client: true,
        },
        viewed_at: None,
        accepted_at: None,
        declined_at: None,
        decline_reason: None,
        view_token: format!("demo{year}bali0002"),
        expires_at: Some(now + Duration::days(5)),
        created_at: now - Duration::days(4),
        updated_at: now - Duration::days(2),
    };
    bali.pricing.discount = Decimal::new(12_500, 2);
    bali.pricing.total -= Decimal::new(12_500, 2);

    let andes_costs = CostBreakdown {
        flights: Decimal::new(280_000, 2),
        hotels: Decimal::new(220_000, 2),
        activities: Decimal::new(90_000, 2),
        car_rentals: Decimal::new(45_000, 2),
        ..CostBreakdown::default()
    };
    let andes = Quote {
        id: QuoteId(SEED_QUOTE_IDS[2].to_string()),
        quote_number: format!("WQ-{year}-DEMO0003"),
        version: 4,
        status: QuoteStatus::Accepted,
        agent_id: agent_id.clone(),
        client_id: Some(liam.clone()),
        parent_quote_id: None,
        is_alternative: false,
        trip_name: "Patagonia Trekking Expedition".to_string(),
        destination: "Torres del Paine, Chile".to_string(),
        start_date: date(year + 1, 2, 8),
        end_date: date(year + 1, 2, 22),
        duration_days: 14,
        travelers: Travelers { adults: 3, children: 1, infants: 0 },
        items: QuoteItems {
            flights: vec![json!({"name": "Round-trip airfare", "route": "DUB-PUQ"})],
            hotels: vec![json!({"name": "EcoCamp dome", "nights": 14})],
            activities: vec![json!({"name": "W Trek guided circuit"})],
            car_rentals: vec![json!({"name": "4x4 rental", "days": 14})],
            ..QuoteItems::default()
        },
        costs: andes_costs,
        pricing: pricing_for(andes_costs, Decimal::new(63_500, 2), Decimal::new(51_500, 2)),
        currency: "EUR".to_string(),
        notes: None,
        agent_notes: None,
        terms: None,
        delivery: DeliveryState {
            sent_at: Some(now - Duration::days(9)),
            email_sent_count: 2,
            sms_sent_count: 1,
            shared_with_client: true,
        },
        viewed_at: Some(now - Duration::days(8)),
        accepted_at: Some(now - Duration::days(6)),
        declined_at: None,
        decline_reason: None,
        view_token: format!("demo{year}andes003"),
        expires_at: Some(now - Duration::days(2)),
        created_at: now - Duration::days(12),
        updated_at: now - Duration::days(6),
    };

    vec![rome, bali, andes]
}

fn pricing_for(costs: CostBreakdown, agent_markup: Decimal, taxes: Decimal) -> PricingSummary {
    let subtotal = costs.component_sum();
    let fees = Decimal::new(6_000, 2);
    PricingSummary {
        subtotal,
        agent_markup_percent: Decimal::new(1_000, 2),
        agent_markup,
        taxes,
        fees,
        discount: Decimal::ZERO,
        total: subtotal + agent_markup + taxes + fees,
    }
}

fn date(year: i32, month: u32, day: u32) -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(year, month, day)
        .unwrap_or(chrono::NaiveDate::MIN)
}
