//! Client-facing portal reached through a quote's view token.
//!
//! Endpoints:
//! - `GET  /view/{token}`          — quote page (HTML)
//! - `POST /view/{token}/accept`   — record the client's acceptance (JSON)
//! - `POST /view/{token}/decline`  — record the client's decline (JSON)
//!
//! The token is the only credential. Draft quotes carry a token from birth
//! but have never been shared, so the portal treats them as unknown.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tera::{Context, Tera};
use tracing::{error, info, warn};

use wayfarer_core::correlation::new_correlation_id;
use wayfarer_core::domain::agent::Agent;
use wayfarer_core::domain::client::Client;
use wayfarer_core::domain::quote::{Quote, QuoteItems, QuoteStatus};
use wayfarer_core::lifecycle::{self, ClientAction};
use wayfarer_core::templates::{format_money, format_short_date, view_url};
use wayfarer_db::repositories::QuoteEvent;
use wayfarer_db::{
    AgentRepository, ClientRepository, DbPool, QuoteEventRepository, QuoteRepository,
    RepositoryError, SqlAgentRepository, SqlClientRepository, SqlQuoteEventRepository,
    SqlQuoteRepository, StatusWrite,
};

#[derive(Clone)]
pub struct PortalState {
    db_pool: DbPool,
    templates: Arc<Tera>,
    public_base_url: String,
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct DeclineRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PortalResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct PortalError {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Initialize the Tera engine with portal templates.
fn init_templates() -> Arc<Tera> {
    let mut tera = match Tera::new("templates/portal/**/*") {
        Ok(t) => t,
        Err(e) => {
            warn!(error = %e, "Failed to load portal templates from filesystem, using empty Tera instance");
            Tera::default()
        }
    };

    // Built-in fallback so the portal works without a templates directory.
    tera.add_raw_template(
        "quote_view.html",
        include_str!("../../../templates/portal/quote_view.html"),
    )
    .ok();

    Arc::new(tera)
}

pub fn router(db_pool: DbPool, public_base_url: &str) -> Router {
    let templates = init_templates();

    Router::new()
        .route("/view/{token}", get(view_quote_page))
        .route("/view/{token}/accept", post(accept_quote))
        .route("/view/{token}/decline", post(decline_quote))
        .with_state(PortalState {
            db_pool,
            templates,
            public_base_url: public_base_url.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Render the client's view of a quote.
///
/// The first visit to a shared quote flips it to viewed. Expired quotes
/// render with a banner and take no status write at all.
async fn view_quote_page(
    Path(token): Path<String>,
    State(state): State<PortalState>,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    let correlation_id = new_correlation_id();
    let quote = load_by_token(&state.db_pool, &token)
        .await
        .map_err(|(status, err)| (status, Html(format!("<h1>Error</h1><p>{}</p>", err.0.error))))?;

    let now = Utc::now();
    let expired = lifecycle::is_expired(&quote, now);

    let quote = if quote.status == QuoteStatus::Sent && !expired {
        let write = SqlQuoteRepository::new(state.db_pool.clone())
            .record_client_view(&quote.id, now)
            .await
            .map_err(html_db_error)?;

        match write {
            StatusWrite::Applied(viewed) => {
                record_portal_event(
                    &state.db_pool,
                    &viewed,
                    "quote.viewed",
                    &correlation_id,
                    json!({ "viewedAt": now }),
                )
                .await;
                info!(
                    event_name = "portal.quote_viewed",
                    correlation_id = %correlation_id,
                    quote_id = %viewed.id.0,
                    "quote viewed by client"
                );
                viewed
            }
            // Another request got there first; render whatever won.
            StatusWrite::Ignored(current) => current,
            StatusWrite::Missing => {
                return Err((
                    StatusCode::NOT_FOUND,
                    Html("<h1>Quote not found</h1>".to_string()),
                ))
            }
        }
    } else {
        quote
    };

    let client = match &quote.client_id {
        Some(client_id) => SqlClientRepository::new(state.db_pool.clone())
            .find_by_id(client_id)
            .await
            .map_err(html_db_error)?,
        None => None,
    };
    let agent = SqlAgentRepository::new(state.db_pool.clone())
        .find_by_id(&quote.agent_id)
        .await
        .map_err(html_db_error)?;

    let context =
        page_context(&quote, client.as_ref(), agent.as_ref(), &state.public_base_url, expired);

    let html = state.templates.render("quote_view.html", &context).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(format!("<h1>Template Error</h1><pre>{:?}</pre>", e)),
        )
    })?;

    Ok(Html(html))
}

async fn accept_quote(
    Path(token): Path<String>,
    State(state): State<PortalState>,
) -> Result<Json<PortalResponse>, (StatusCode, Json<PortalError>)> {
    let correlation_id = new_correlation_id();
    let quote = load_by_token(&state.db_pool, &token).await?;
    let now = Utc::now();

    if lifecycle::is_expired(&quote, now) {
        return Err((
            StatusCode::GONE,
            Json(PortalError {
                error: "this quote has expired; please contact your travel agent".to_string(),
            }),
        ));
    }

    match lifecycle::client_transition(ClientAction::Accept, &quote) {
        Ok(Some(_)) => {}
        Ok(None) => return Ok(Json(already_accepted())),
        Err(_) => return Err(decision_conflict("accepted", quote.status)),
    }

    let write = SqlQuoteRepository::new(state.db_pool.clone())
        .record_acceptance(&quote.id, now)
        .await
        .map_err(db_error)?;

    match write {
        StatusWrite::Applied(accepted) => {
            record_portal_event(
                &state.db_pool,
                &accepted,
                "quote.accepted",
                &correlation_id,
                json!({ "acceptedAt": now }),
            )
            .await;
            info!(
                event_name = "portal.quote_accepted",
                correlation_id = %correlation_id,
                quote_id = %accepted.id.0,
                "quote accepted via portal"
            );
            Ok(Json(PortalResponse {
                success: true,
                message: "Quote accepted. Your travel agent has been notified.".to_string(),
            }))
        }
        // The guard lost a race with another decision; answer for whatever
        // landed first.
        StatusWrite::Ignored(current) if current.status == QuoteStatus::Accepted => {
            Ok(Json(already_accepted()))
        }
        StatusWrite::Ignored(current) => Err(decision_conflict("accepted", current.status)),
        StatusWrite::Missing => Err(not_found()),
    }
}

async fn decline_quote(
    Path(token): Path<String>,
    State(state): State<PortalState>,
    Json(body): Json<DeclineRequest>,
) -> Result<Json<PortalResponse>, (StatusCode, Json<PortalError>)> {
    let correlation_id = new_correlation_id();
    let quote = load_by_token(&state.db_pool, &token).await?;
    let now = Utc::now();

    if lifecycle::is_expired(&quote, now) {
        return Err((
            StatusCode::GONE,
            Json(PortalError {
                error: "this quote has expired; please contact your travel agent".to_string(),
            }),
        ));
    }

    match lifecycle::client_transition(ClientAction::Decline, &quote) {
        Ok(Some(_)) => {}
        Ok(None) => return Ok(Json(already_declined())),
        Err(_) => return Err(decision_conflict("declined", quote.status)),
    }

    let reason = body.reason.as_deref().map(str::trim).filter(|reason| !reason.is_empty());

    let write = SqlQuoteRepository::new(state.db_pool.clone())
        .record_decline(&quote.id, reason, now)
        .await
        .map_err(db_error)?;

    match write {
        StatusWrite::Applied(declined) => {
            record_portal_event(
                &state.db_pool,
                &declined,
                "quote.declined",
                &correlation_id,
                json!({ "declinedAt": now, "reason": reason }),
            )
            .await;
            info!(
                event_name = "portal.quote_declined",
                correlation_id = %correlation_id,
                quote_id = %declined.id.0,
                has_reason = reason.is_some(),
                "quote declined via portal"
            );
            Ok(Json(PortalResponse {
                success: true,
                message: "Quote declined. Your travel agent has been notified.".to_string(),
            }))
        }
        StatusWrite::Ignored(current) if current.status == QuoteStatus::Declined => {
            Ok(Json(already_declined()))
        }
        StatusWrite::Ignored(current) => Err(decision_conflict("declined", current.status)),
        StatusWrite::Missing => Err(not_found()),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolve a view token to its quote. Unknown tokens and drafts both read
/// as not found so the portal reveals nothing about unshared work.
async fn load_by_token(
    pool: &DbPool,
    token: &str,
) -> Result<Quote, (StatusCode, Json<PortalError>)> {
    let quote = SqlQuoteRepository::new(pool.clone())
        .find_by_view_token(token)
        .await
        .map_err(db_error)?;

    match quote {
        Some(quote) if quote.status != QuoteStatus::Draft => Ok(quote),
        _ => {
            warn!(token = %token, "unknown or unshared quote token");
            Err(not_found())
        }
    }
}

fn page_context(
    quote: &Quote,
    client: Option<&Client>,
    agent: Option<&Agent>,
    public_base_url: &str,
    expired: bool,
) -> Context {
    let actionable = matches!(quote.status, QuoteStatus::Sent | QuoteStatus::Viewed) && !expired;

    let mut context = Context::new();
    context.insert(
        "quote",
        &json!({
            "quote_number": quote.quote_number,
            "token": quote.view_token,
            "trip_name": quote.trip_name,
            "destination": quote.destination,
            "start_date": format_short_date(quote.start_date),
            "end_date": format_short_date(quote.end_date),
            "duration_days": quote.duration_days,
            "travelers": quote.travelers.counted(),
            "infants": quote.travelers.infants,
            "status": quote.status.as_str(),
            "total": format_money(quote.pricing.total, &quote.currency),
            "per_person": format_money(quote.per_person_total(), &quote.currency),
            "notes": quote.notes.clone().unwrap_or_default(),
            "terms": quote.terms.clone().unwrap_or_default(),
            "item_sections": item_sections(&quote.items),
            "expired": expired,
            "actionable": actionable,
            "view_url": view_url(public_base_url, &quote.view_token),
        }),
    );

    context.insert(
        "client",
        &json!({
            "name": client.map(Client::full_name).unwrap_or_else(|| "Traveler".to_string()),
        }),
    );

    context.insert(
        "agent",
        &json!({
            "name": agent.map(|agent| agent.name.clone()).unwrap_or_default(),
            "agency": agent.and_then(|agent| agent.agency_name.clone()).unwrap_or_default(),
            "email": agent.map(|agent| agent.email.clone()).unwrap_or_default(),
            "phone": agent.and_then(|agent| agent.phone.clone()).unwrap_or_default(),
        }),
    );

    context
}

/// Item entries are opaque to the engine, so the page summarizes each
/// non-empty category by count instead of guessing at item shape.
fn item_sections(items: &QuoteItems) -> Vec<serde_json::Value> {
    [
        ("Flights", items.flights.len()),
        ("Hotels", items.hotels.len()),
        ("Activities", items.activities.len()),
        ("Transfers", items.transfers.len()),
        ("Car rentals", items.car_rentals.len()),
        ("Insurance", items.insurance.len()),
        ("Extras", items.custom_items.len()),
    ]
    .into_iter()
    .filter(|(_, count)| *count > 0)
    .map(|(label, count)| json!({ "label": label, "count": count }))
    .collect()
}

/// Best-effort audit append; failures end in the log.
async fn record_portal_event(
    pool: &DbPool,
    quote: &Quote,
    event_type: &str,
    correlation_id: &str,
    payload: serde_json::Value,
) {
    let event = QuoteEvent::record(
        quote.id.clone(),
        event_type,
        "client",
        Some(correlation_id.to_string()),
        payload,
        Utc::now(),
    );

    if let Err(append_error) = SqlQuoteEventRepository::new(pool.clone()).append(&event).await {
        error!(
            event_name = "portal.audit_event_failed",
            correlation_id = %correlation_id,
            quote_id = %quote.id.0,
            error = %append_error,
            "failed to record portal event"
        );
    }
}

fn db_error(error: RepositoryError) -> (StatusCode, Json<PortalError>) {
    error!(error = %error, "portal database error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(PortalError { error: "an internal error occurred".to_string() }),
    )
}

fn html_db_error(error: RepositoryError) -> (StatusCode, Html<String>) {
    let (status, err) = db_error(error);
    (status, Html(format!("<h1>Error</h1><p>{}</p>", err.0.error)))
}

fn not_found() -> (StatusCode, Json<PortalError>) {
    (StatusCode::NOT_FOUND, Json(PortalError { error: "quote not found".to_string() }))
}

fn decision_conflict(action: &str, status: QuoteStatus) -> (StatusCode, Json<PortalError>) {
    (
        StatusCode::CONFLICT,
        Json(PortalError {
            error: format!("this quote is {} and can no longer be {action}", status.as_str()),
        }),
    )
}

fn already_accepted() -> PortalResponse {
    PortalResponse { success: true, message: "This quote has already been accepted.".to_string() }
}

fn already_declined() -> PortalResponse {
    PortalResponse { success: true, message: "This quote has already been declined.".to_string() }
}
