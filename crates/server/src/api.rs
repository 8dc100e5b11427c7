//! Agent-facing JSON API for authoring, versioning, duplicating, and
//! sending quotes.
//!
//! Endpoints (all require the upstream-verified `x-agent-id` header):
//! - `GET  /quotes`                — list the calling agent's quotes
//! - `POST /quotes`                — create a draft quote
//! - `GET  /quotes/{id}`           — full snapshot including `version`
//! - `PUT  /quotes/{id}`           — versioned full-state update
//! - `POST /quotes/{id}/duplicate` — independent copy, optionally an alternative
//! - `POST /quotes/{id}/send`      — share over email, WhatsApp, or link
//!
//! Responses are camelCase JSON. Failures use the structured error
//! envelope: a stable `errorCode` plus severity, retryability, and the
//! request's correlation id.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use wayfarer_core::config::AppConfig;
use wayfarer_core::correlation::{new_correlation_id, payload_hash};
use wayfarer_core::domain::agent::{Agent, AgentId};
use wayfarer_core::domain::client::{Client, ClientId};
use wayfarer_core::domain::quote::{Quote, QuoteDraft, QuoteId, QuoteStatus, SendChannel};
use wayfarer_core::duplication::{clone_quote, DuplicateOptions, DuplicationPolicy};
use wayfarer_core::errors::{EngineError, ErrorCode, Severity};
use wayfarer_core::templates::QuoteContext;
use wayfarer_core::{lifecycle, pricing};
use wayfarer_db::repositories::QuoteEvent;
use wayfarer_db::{
    AgentRepository, ClientRepository, CommitOutcome, DbPool, QuoteEventRepository,
    QuoteRepository, SendOutcome, SqlAgentRepository, SqlClientRepository,
    SqlQuoteEventRepository, SqlQuoteRepository,
};
use wayfarer_delivery::dispatcher::Dispatcher;
use wayfarer_delivery::message::{prepare_send, DeliveryError, PreparedSend, SendRequest};

#[derive(Clone)]
pub struct AppState {
    db_pool: DbPool,
    dispatcher: Arc<Dispatcher>,
    public_base_url: String,
    expiry_days: u32,
    duplication: DuplicationPolicy,
    idempotency_window_secs: u64,
}

impl AppState {
    pub fn new(db_pool: DbPool, dispatcher: Arc<Dispatcher>, config: &AppConfig) -> Self {
        Self {
            db_pool,
            dispatcher,
            public_base_url: config.server.public_base_url.clone(),
            expiry_days: config.quotes.expiry_days,
            duplication: DuplicationPolicy {
                start_offset_days: config.quotes.duplicate_start_offset_days,
                expiry_days: config.quotes.expiry_days,
            },
            idempotency_window_secs: config.delivery.idempotency_window_secs,
        }
    }

    fn quotes(&self) -> SqlQuoteRepository {
        SqlQuoteRepository::new(self.db_pool.clone())
    }

    fn clients(&self) -> SqlClientRepository {
        SqlClientRepository::new(self.db_pool.clone())
    }

    fn agents(&self) -> SqlAgentRepository {
        SqlAgentRepository::new(self.db_pool.clone())
    }

    fn events(&self) -> SqlQuoteEventRepository {
        SqlQuoteEventRepository::new(self.db_pool.clone())
    }
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Full quote content as authored by the agent. Updates carry the
/// caller's last-read `version`; creates ignore it.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteBody {
    pub version: Option<u32>,
    #[serde(flatten)]
    pub draft: QuoteDraft,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DuplicateBody {
    pub client_id: Option<String>,
    pub trip_name: Option<String>,
    pub adjust_dates: bool,
    pub create_as_alternative: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListQuotesQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub success: bool,
    pub quote_id: String,
    pub version: u32,
    pub saved_at: DateTime<Utc>,
}

impl SaveResponse {
    fn for_quote(quote: &Quote) -> Self {
        Self {
            success: true,
            quote_id: quote.id.0.clone(),
            version: quote.version,
            saved_at: quote.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub success: bool,
    pub quote: Quote,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteListResponse {
    pub success: bool,
    pub count: usize,
    pub quotes: Vec<Quote>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateResponse {
    pub success: bool,
    pub quote: Quote,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub success: bool,
    pub message: String,
    pub sent_to: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error_code: &'static str,
    pub message: String,
    pub severity: &'static str,
    pub retryable: bool,
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/quotes", get(list_quotes).post(create_quote))
        .route("/quotes/{id}", get(get_quote).put(update_quote))
        .route("/quotes/{id}/duplicate", post(duplicate_quote))
        .route("/quotes/{id}/send", post(send_quote))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error envelope mapping
// ---------------------------------------------------------------------------

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::QuoteValidationFailed => StatusCode::BAD_REQUEST,
        ErrorCode::PricingValidationFailed | ErrorCode::ItemsInconsistent => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ErrorCode::QuoteAlreadySent
        | ErrorCode::QuoteStateInvalid
        | ErrorCode::QuoteConflictVersion => StatusCode::CONFLICT,
        ErrorCode::QuoteNotFound | ErrorCode::ClientNotFound => StatusCode::NOT_FOUND,
        ErrorCode::AgentNotFound => StatusCode::UNAUTHORIZED,
        ErrorCode::DatabaseTimeout => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::QuotePersistenceFailed
        | ErrorCode::DatabaseTransactionAborted
        | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: EngineError, correlation_id: &str) -> (StatusCode, Json<ErrorEnvelope>) {
    let code = error.code();

    // CRITICAL non-retryable codes indicate a logic defect or an integrity
    // breach, so they must stand out to operators.
    if code.severity() == Severity::Critical && !code.retryable() {
        error!(
            event_name = "api.request_failed",
            correlation_id = %correlation_id,
            error_code = code.as_str(),
            error = %error,
            "request failed"
        );
    } else {
        warn!(
            event_name = "api.request_failed",
            correlation_id = %correlation_id,
            error_code = code.as_str(),
            error = %error,
            "request failed"
        );
    }

    let envelope = ErrorEnvelope {
        success: false,
        error_code: code.as_str(),
        message: error.to_string(),
        severity: code.severity().as_str(),
        retryable: code.retryable(),
        correlation_id: correlation_id.to_string(),
        details: error.details(),
        timestamp: Utc::now(),
    };

    (status_for(code), Json(envelope))
}

/// Delivery-side request validation failures become the boundary's
/// validation code; transport faults never escape the dispatcher, so one
/// surfacing here is an internal fault.
fn delivery_request_error(error: DeliveryError) -> EngineError {
    match error {
        DeliveryError::Transport(inner) => EngineError::Internal { message: inner.to_string() },
        other => EngineError::QuoteValidationFailed { violations: vec![other.to_string()] },
    }
}

fn body_hash<T: Serialize>(body: &T) -> String {
    serde_json::to_vec(body).map(|bytes| payload_hash(&bytes)).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Shared lookups
// ---------------------------------------------------------------------------

/// Resolves the caller from the `x-agent-id` header the upstream auth
/// layer injects. A missing header is a malformed request; an unknown id
/// means the upstream handed us an identity we do not recognize.
async fn require_agent(state: &AppState, headers: &HeaderMap) -> Result<Agent, EngineError> {
    let agent_id = headers
        .get("x-agent-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| EngineError::QuoteValidationFailed {
            violations: vec!["x-agent-id header is required".to_string()],
        })?;

    state
        .agents()
        .find_by_id(&AgentId(agent_id.to_string()))
        .await
        .map_err(EngineError::from)?
        .ok_or_else(|| EngineError::AgentNotFound { agent_id: agent_id.to_string() })
}

/// Loads a quote owned by the calling agent. Quotes belonging to other
/// agents are indistinguishable from unknown ids.
async fn load_owned_quote(
    state: &AppState,
    agent_id: &AgentId,
    quote_id: &str,
) -> Result<Quote, EngineError> {
    let quote = state
        .quotes()
        .find_by_id(&QuoteId(quote_id.to_string()))
        .await
        .map_err(EngineError::from)?
        .ok_or_else(|| EngineError::QuoteNotFound { quote_id: quote_id.to_string() })?;

    if quote.agent_id != *agent_id {
        return Err(EngineError::QuoteNotFound { quote_id: quote_id.to_string() });
    }

    Ok(quote)
}

/// Resolves an optional client reference against the calling agent's own
/// book. Clients of other agents are reported as unknown.
async fn resolve_client(
    state: &AppState,
    agent_id: &AgentId,
    client_id: &Option<ClientId>,
) -> Result<Option<Client>, EngineError> {
    let Some(client_id) = client_id else {
        return Ok(None);
    };

    let client = state
        .clients()
        .find_by_id(client_id)
        .await
        .map_err(EngineError::from)?
        .filter(|client| client.agent_id == *agent_id)
        .ok_or_else(|| EngineError::ClientNotFound { client_id: client_id.0.clone() })?;

    Ok(Some(client))
}

/// Best-effort audit trail append. A failed audit write is operator
/// noise, never a request failure.
async fn record_audit_event(
    state: &AppState,
    quote_id: &QuoteId,
    event_type: &str,
    actor: &str,
    correlation_id: &str,
    payload: serde_json::Value,
) {
    let event = QuoteEvent::record(
        quote_id.clone(),
        event_type,
        actor,
        Some(correlation_id.to_string()),
        payload,
        Utc::now(),
    );

    if let Err(append_error) = state.events().append(&event).await {
        error!(
            event_name = "api.audit_event_failed",
            correlation_id = %correlation_id,
            quote_id = %quote_id.0,
            error = %append_error,
            "failed to record audit event"
        );
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn list_quotes(
    Query(query): Query<ListQuotesQuery>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<QuoteListResponse>, (StatusCode, Json<ErrorEnvelope>)> {
    let correlation_id = new_correlation_id();

    let quotes = try_list(&state, &headers, query.status.as_deref())
        .await
        .map_err(|e| error_response(e, &correlation_id))?;

    Ok(Json(QuoteListResponse { success: true, count: quotes.len(), quotes }))
}

async fn try_list(
    state: &AppState,
    headers: &HeaderMap,
    status: Option<&str>,
) -> Result<Vec<Quote>, EngineError> {
    let agent = require_agent(state, headers).await?;

    let status = match status.map(str::trim).filter(|value| !value.is_empty()) {
        None => None,
        Some(raw) => Some(QuoteStatus::parse(raw).ok_or_else(|| {
            EngineError::QuoteValidationFailed {
                violations: vec![format!("unknown status filter `{raw}`")],
            }
        })?),
    };

    Ok(state.quotes().list_for_agent(&agent.id, status).await?)
}

async fn get_quote(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<QuoteResponse>, (StatusCode, Json<ErrorEnvelope>)> {
    let correlation_id = new_correlation_id();

    let quote = try_get(&state, &headers, &id)
        .await
        .map_err(|e| error_response(e, &correlation_id))?;

    Ok(Json(QuoteResponse { success: true, quote }))
}

async fn try_get(state: &AppState, headers: &HeaderMap, id: &str) -> Result<Quote, EngineError> {
    let agent = require_agent(state, headers).await?;
    load_owned_quote(state, &agent.id, id).await
}

async fn create_quote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<QuoteBody>,
) -> Result<(StatusCode, Json<SaveResponse>), (StatusCode, Json<ErrorEnvelope>)> {
    let correlation_id = new_correlation_id();
    info!(
        event_name = "api.quote.create_received",
        correlation_id = %correlation_id,
        payload_hash = %body_hash(&body),
        "quote create received"
    );

    let quote = try_create(&state, &headers, body, &correlation_id)
        .await
        .map_err(|e| error_response(e, &correlation_id))?;

    info!(
        event_name = "api.quote.created",
        correlation_id = %correlation_id,
        quote_id = %quote.id.0,
        version = quote.version,
        "quote created"
    );

    Ok((StatusCode::CREATED, Json(SaveResponse::for_quote(&quote))))
}

async fn try_create(
    state: &AppState,
    headers: &HeaderMap,
    body: QuoteBody,
    correlation_id: &str,
) -> Result<Quote, EngineError> {
    let agent = require_agent(state, headers).await?;

    let draft = body.draft;
    draft.validate()?;
    pricing::validate(&draft.costs, &draft.pricing)?;
    resolve_client(state, &agent.id, &draft.client_id).await?;

    let quote = Quote::from_draft(draft, agent.id.clone(), Utc::now(), state.expiry_days);
    state.quotes().insert(&quote).await?;

    record_audit_event(
        state,
        &quote.id,
        "quote.created",
        &agent.id.0,
        correlation_id,
        json!({ "version": quote.version, "quoteNumber": quote.quote_number }),
    )
    .await;

    Ok(quote)
}

async fn update_quote(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<QuoteBody>,
) -> Result<Json<SaveResponse>, (StatusCode, Json<ErrorEnvelope>)> {
    let correlation_id = new_correlation_id();
    info!(
        event_name = "api.quote.update_received",
        correlation_id = %correlation_id,
        quote_id = %id,
        payload_hash = %body_hash(&body),
        "quote update received"
    );

    let quote = try_update(&state, &headers, &id, body, &correlation_id)
        .await
        .map_err(|e| error_response(e, &correlation_id))?;

    info!(
        event_name = "api.quote.updated",
        correlation_id = %correlation_id,
        quote_id = %quote.id.0,
        version = quote.version,
        "quote updated"
    );

    Ok(Json(SaveResponse::for_quote(&quote)))
}

async fn try_update(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
    body: QuoteBody,
    correlation_id: &str,
) -> Result<Quote, EngineError> {
    let agent = require_agent(state, headers).await?;

    let expected_version = body.version.ok_or_else(|| EngineError::QuoteValidationFailed {
        violations: vec!["version is required for updates".to_string()],
    })?;

    // The editability guard runs before any payload validation so that a
    // locked quote reports its lock rather than a body nit. The version
    // check inside the committed UPDATE still decides the race: every
    // status write bumps `version`, so a quote sent between this read and
    // the commit surfaces as a conflict, never a merged write.
    let current = load_owned_quote(state, &agent.id, id).await?;
    lifecycle::ensure_editable(&current)?;

    let draft = body.draft;
    draft.validate()?;
    pricing::validate(&draft.costs, &draft.pricing)?;
    resolve_client(state, &agent.id, &draft.client_id).await?;

    match state.quotes().commit_update(&current.id, expected_version, &draft, Utc::now()).await? {
        CommitOutcome::Committed(quote) => {
            record_audit_event(
                state,
                &quote.id,
                "quote.updated",
                &agent.id.0,
                correlation_id,
                json!({ "version": quote.version }),
            )
            .await;
            Ok(quote)
        }
        CommitOutcome::Conflict { expected, actual } => {
            Err(EngineError::QuoteConflictVersion { expected, actual })
        }
        CommitOutcome::NotFound => Err(EngineError::QuoteNotFound { quote_id: id.to_string() }),
    }
}

async fn duplicate_quote(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<DuplicateBody>,
) -> Result<(StatusCode, Json<DuplicateResponse>), (StatusCode, Json<ErrorEnvelope>)> {
    let correlation_id = new_correlation_id();
    info!(
        event_name = "api.quote.duplicate_received",
        correlation_id = %correlation_id,
        quote_id = %id,
        payload_hash = %body_hash(&body),
        "quote duplicate received"
    );

    let as_alternative = body.create_as_alternative;
    let quote = try_duplicate(&state, &headers, &id, body, &correlation_id)
        .await
        .map_err(|e| error_response(e, &correlation_id))?;

    info!(
        event_name = "api.quote.duplicated",
        correlation_id = %correlation_id,
        quote_id = %quote.id.0,
        source_quote_id = %id,
        is_alternative = quote.is_alternative,
        "quote duplicated"
    );

    let message = if as_alternative {
        "Alternative quote created".to_string()
    } else {
        "Quote duplicated".to_string()
    };

    Ok((StatusCode::CREATED, Json(DuplicateResponse { success: true, quote, message })))
}

async fn try_duplicate(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
    body: DuplicateBody,
    correlation_id: &str,
) -> Result<Quote, EngineError> {
    let agent = require_agent(state, headers).await?;
    let source = load_owned_quote(state, &agent.id, id).await?;

    let options = DuplicateOptions {
        target_client_id: body.client_id.map(ClientId),
        new_trip_name: body.trip_name,
        adjust_dates: body.adjust_dates,
        create_as_alternative: body.create_as_alternative,
    };

    // Re-targeting must stay inside the agent's own client book.
    if options.target_client_id.is_some() {
        resolve_client(state, &agent.id, &options.target_client_id).await?;
    }

    // The clone re-enters the normal create path: field validation,
    // pricing validation, then a plain insert.
    let clone = clone_quote(&source, &options, Utc::now(), &state.duplication);
    clone.to_draft().validate()?;
    pricing::validate(&clone.costs, &clone.pricing)?;
    state.quotes().insert(&clone).await?;

    record_audit_event(
        state,
        &clone.id,
        "quote.duplicated",
        &agent.id.0,
        correlation_id,
        json!({
            "sourceQuoteId": source.id.0,
            "isAlternative": clone.is_alternative,
            "adjustDates": options.adjust_dates,
        }),
    )
    .await;

    Ok(clone)
}

async fn send_quote(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SendRequest>,
) -> Result<Json<SendResponse>, (StatusCode, Json<ErrorEnvelope>)> {
    let correlation_id = new_correlation_id();
    info!(
        event_name = "api.quote.send_received",
        correlation_id = %correlation_id,
        quote_id = %id,
        channel = request.channel.as_str(),
        payload_hash = %body_hash(&request),
        "quote send received"
    );

    let response = try_send(&state, &headers, &id, request, &correlation_id)
        .await
        .map_err(|e| error_response(e, &correlation_id))?;

    Ok(Json(response))
}

async fn try_send(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
    request: SendRequest,
    correlation_id: &str,
) -> Result<SendResponse, EngineError> {
    let agent = require_agent(state, headers).await?;
    let quote = load_owned_quote(state, &agent.id, id).await?;

    let client = match &quote.client_id {
        Some(client_id) => state.clients().find_by_id(client_id).await.map_err(EngineError::from)?,
        None => None,
    };

    // Recipient, subject, and template resolution all happen before any
    // bookkeeping so a malformed request leaves the quote untouched.
    let context = QuoteContext {
        quote: &quote,
        client: client.as_ref(),
        agent: Some(&agent),
        public_base_url: &state.public_base_url,
    };
    let prepared = prepare_send(&request, &context).map_err(delivery_request_error)?;
    let sent_to = prepared.sent_to().to_string();

    let now = Utc::now();
    let outcome = state
        .quotes()
        .record_send(&quote.id, request.channel, now, state.idempotency_window_secs)
        .await?
        .ok_or_else(|| EngineError::QuoteNotFound { quote_id: id.to_string() })?;

    let (after, repeat) = match outcome {
        SendOutcome::Fresh(after) => (after, false),
        SendOutcome::Repeat(after) => (after, true),
    };

    record_audit_event(
        state,
        &after.id,
        "quote.sent",
        &agent.id.0,
        correlation_id,
        json!({
            "channel": request.channel.as_str(),
            "sentTo": sent_to,
            "repeat": repeat,
        }),
    )
    .await;

    info!(
        event_name = "api.quote.send_recorded",
        correlation_id = %correlation_id,
        quote_id = %after.id.0,
        channel = request.channel.as_str(),
        repeat,
        "quote send recorded"
    );

    // Channel delivery is fire-and-forget: the bookkeeping above already
    // committed, and a user who saw nothing arrive may legitimately need
    // the message re-sent, so repeats go out too. Failures end in the
    // dispatcher's log, never in a rollback.
    if let PreparedSend::Outbound(message) = prepared {
        let dispatcher = state.dispatcher.clone();
        let dispatch_correlation = correlation_id.to_string();
        tokio::spawn(async move {
            let _ = dispatcher.dispatch(&message, &dispatch_correlation).await;
        });
    }

    Ok(SendResponse {
        success: true,
        message: send_confirmation(request.channel, &sent_to),
        sent_to,
        sent_at: after.delivery.sent_at.unwrap_or(now),
    })
}

fn send_confirmation(channel: SendChannel, sent_to: &str) -> String {
    match channel {
        SendChannel::Email => format!("Quote sent via email to {sent_to}"),
        SendChannel::Whatsapp => format!("Quote sent via WhatsApp to {sent_to}"),
        SendChannel::Link => format!("Share link ready: {sent_to}"),
    }
}
