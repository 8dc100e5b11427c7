//! Send-request preparation: recipient and template resolution ahead of any
//! transport call.
//!
//! Preparation is pure. It never touches delivery bookkeeping, so a request
//! rejected here leaves no trace on the quote.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use wayfarer_core::templates::{self, MessageTemplate, QuoteContext};
use wayfarer_core::SendChannel;

use crate::transport::TransportError;

/// Template applied when a request names neither a template nor a custom
/// message.
pub const DEFAULT_TEMPLATE_ID: &str = "formal";

/// Caller input for one send. Everything except the channel falls back to
/// quote data or the template registry.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub channel: SendChannel,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
}

/// Channel-ready content for one outbound delivery. Doubles as the provider
/// wire payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub channel: SendChannel,
    pub to: String,
    pub subject: Option<String>,
    pub body: String,
}

/// What preparing a request produced. Link shares resolve in process and
/// carry the public view URL instead of an outbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PreparedSend {
    Outbound(OutboundMessage),
    LinkShare { url: String },
}

impl PreparedSend {
    /// Address or URL reported back to the caller as the delivery target.
    pub fn sent_to(&self) -> &str {
        match self {
            Self::Outbound(message) => &message.to,
            Self::LinkShare { url } => url,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("no recipient available for {} delivery", .0.as_str())]
    MissingRecipient(SendChannel),
    #[error("email delivery requires a non-empty subject")]
    MissingSubject,
    #[error("unknown message template `{0}`")]
    UnknownTemplate(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Resolves recipient, subject, and body for a send request.
///
/// A custom message wins over the template body; with neither, the formal
/// template applies. Email subjects fall back to the template's subject
/// line. WhatsApp ignores subjects entirely.
pub fn prepare_send(
    request: &SendRequest,
    context: &QuoteContext<'_>,
) -> Result<PreparedSend, DeliveryError> {
    if request.channel == SendChannel::Link {
        let url = templates::view_url(context.public_base_url, &context.quote.view_token);
        return Ok(PreparedSend::LinkShare { url });
    }

    let template = resolve_template(request.template_id.as_deref())?;
    let to = resolve_recipient(request, context)?;
    let vars = templates::prepare_variables(context);

    let body_source = non_empty(request.message.as_deref()).unwrap_or(template.body);
    let body = templates::interpolate(body_source, &vars);

    let subject = if request.channel == SendChannel::Email {
        let source = non_empty(request.subject.as_deref()).unwrap_or(template.subject);
        let subject = templates::interpolate(source, &vars);
        if subject.trim().is_empty() {
            return Err(DeliveryError::MissingSubject);
        }
        Some(subject)
    } else {
        None
    };

    Ok(PreparedSend::Outbound(OutboundMessage { channel: request.channel, to, subject, body }))
}

fn resolve_template(requested: Option<&str>) -> Result<&'static MessageTemplate, DeliveryError> {
    let id = non_empty(requested).unwrap_or(DEFAULT_TEMPLATE_ID);
    templates::find_template(id).ok_or_else(|| DeliveryError::UnknownTemplate(id.to_string()))
}

fn resolve_recipient(
    request: &SendRequest,
    context: &QuoteContext<'_>,
) -> Result<String, DeliveryError> {
    if let Some(to) = non_empty(request.to.as_deref()) {
        return Ok(to.to_string());
    }
    let fallback = match request.channel {
        SendChannel::Email => context.client.and_then(|client| client.email.as_deref()),
        SendChannel::Whatsapp => context.client.and_then(|client| client.phone.as_deref()),
        SendChannel::Link => None,
    };
    non_empty(fallback).map(str::to_string).ok_or(DeliveryError::MissingRecipient(request.channel))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use wayfarer_core::templates::QuoteContext;
    use wayfarer_core::{
        AgentId, Client, ClientId, CostBreakdown, PricingSummary, Quote, QuoteDraft, QuoteItems,
        SendChannel, Travelers,
    };

    use super::{prepare_send, DeliveryError, OutboundMessage, PreparedSend, SendRequest};

    fn quote() -> Quote {
        let draft = QuoteDraft {
            client_id: Some(ClientId("client-1".to_string())),
            trip_name: "Amalfi Coast Escape".to_string(),
            destination: "Amalfi, Italy".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 9, 14).expect("valid date"),
            end_date: NaiveDate::from_ymd_opt(2026, 9, 21).expect("valid date"),
            travelers: Travelers { adults: 2, children: 0, infants: 0 },
            items: QuoteItems::default(),
            costs: CostBreakdown { hotels: Decimal::new(240_000, 2), ..CostBreakdown::default() },
            pricing: PricingSummary {
                subtotal: Decimal::new(240_000, 2),
                total: Decimal::new(240_000, 2),
                ..PricingSummary::default()
            },
            currency: "EUR".to_string(),
            notes: None,
            agent_notes: None,
            terms: None,
        };
        Quote::from_draft(draft, AgentId("agent-1".to_string()), Utc::now(), 7)
    }

    fn client(email: Option<&str>, phone: Option<&str>) -> Client {
        let now = Utc::now();
        Client {
            id: ClientId("client-1".to_string()),
            agent_id: AgentId("agent-1".to_string()),
            first_name: "Elena".to_string(),
            last_name: "Rossi".to_string(),
            email: email.map(str::to_string),
            phone: phone.map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }

    fn request(channel: SendChannel) -> SendRequest {
        SendRequest { channel, to: None, subject: None, message: None, template_id: None }
    }

    fn outbound(prepared: PreparedSend) -> OutboundMessage {
        match prepared {
            PreparedSend::Outbound(message) => message,
            PreparedSend::LinkShare { url } => panic!("expected an outbound message, got {url}"),
        }
    }

    #[test]
    fn email_falls_back_to_the_client_address() {
        let quote = quote();
        let client = client(Some("elena@example.com"), None);
        let context = QuoteContext {
            quote: &quote,
            client: Some(&client),
            agent: None,
            public_base_url: "https://quotes.example.com",
        };

        let message = outbound(prepare_send(&request(SendChannel::Email), &context).expect("prepared"));

        assert_eq!(message.to, "elena@example.com");
        assert_eq!(message.subject.as_deref(), Some("Your travel quote for Amalfi, Italy"));
        assert!(message.body.starts_with("Dear Elena Rossi,"));
        assert!(message.body.contains(&quote.view_token));
    }

    #[test]
    fn explicit_recipient_wins_over_the_client_record() {
        let quote = quote();
        let client = client(Some("elena@example.com"), None);
        let context = QuoteContext {
            quote: &quote,
            client: Some(&client),
            agent: None,
            public_base_url: "https://quotes.example.com",
        };
        let mut request = request(SendChannel::Email);
        request.to = Some("partner@example.com".to_string());

        let message = outbound(prepare_send(&request, &context).expect("prepared"));
        assert_eq!(message.to, "partner@example.com");
    }

    #[test]
    fn custom_message_replaces_the_template_body() {
        let quote = quote();
        let client = client(Some("elena@example.com"), None);
        let context = QuoteContext {
            quote: &quote,
            client: Some(&client),
            agent: None,
            public_base_url: "https://quotes.example.com",
        };
        let mut request = request(SendChannel::Email);
        request.message = Some("Hi {{firstName}}, your trip to {{destination}} awaits.".to_string());

        let message = outbound(prepare_send(&request, &context).expect("prepared"));

        assert_eq!(message.body, "Hi Elena, your trip to Amalfi, Italy awaits.");
        assert_eq!(message.subject.as_deref(), Some("Your travel quote for Amalfi, Italy"));
    }

    #[test]
    fn named_template_controls_subject_and_body() {
        let quote = quote();
        let client = client(Some("elena@example.com"), None);
        let context = QuoteContext {
            quote: &quote,
            client: Some(&client),
            agent: None,
            public_base_url: "https://quotes.example.com",
        };
        let mut request = request(SendChannel::Email);
        request.template_id = Some("friendly".to_string());

        let message = outbound(prepare_send(&request, &context).expect("prepared"));

        assert_eq!(
            message.subject.as_deref(),
            Some("Elena, your Amalfi, Italy trip is ready to book!")
        );
        assert!(message.body.starts_with("Hi Elena,"));
    }

    #[test]
    fn unknown_template_ids_are_rejected() {
        let quote = quote();
        let context = QuoteContext {
            quote: &quote,
            client: None,
            agent: None,
            public_base_url: "https://quotes.example.com",
        };
        let mut request = request(SendChannel::Email);
        request.to = Some("someone@example.com".to_string());
        request.template_id = Some("aggressive".to_string());

        let error = prepare_send(&request, &context).expect_err("unknown template");
        assert_eq!(error, DeliveryError::UnknownTemplate("aggressive".to_string()));
    }

    #[test]
    fn email_without_any_recipient_is_rejected() {
        let quote = quote();
        let context = QuoteContext {
            quote: &quote,
            client: None,
            agent: None,
            public_base_url: "https://quotes.example.com",
        };

        let error = prepare_send(&request(SendChannel::Email), &context).expect_err("no address");
        assert_eq!(error, DeliveryError::MissingRecipient(SendChannel::Email));
    }

    #[test]
    fn whatsapp_needs_a_reachable_phone_number() {
        let quote = quote();
        let client = client(Some("elena@example.com"), None);
        let context = QuoteContext {
            quote: &quote,
            client: Some(&client),
            agent: None,
            public_base_url: "https://quotes.example.com",
        };

        let error =
            prepare_send(&request(SendChannel::Whatsapp), &context).expect_err("no phone");
        assert_eq!(error, DeliveryError::MissingRecipient(SendChannel::Whatsapp));
    }

    #[test]
    fn whatsapp_drops_subjects() {
        let quote = quote();
        let client = client(None, Some("+39 333 000 1122"));
        let context = QuoteContext {
            quote: &quote,
            client: Some(&client),
            agent: None,
            public_base_url: "https://quotes.example.com",
        };
        let mut request = request(SendChannel::Whatsapp);
        request.subject = Some("ignored".to_string());

        let message = outbound(prepare_send(&request, &context).expect("prepared"));

        assert_eq!(message.to, "+39 333 000 1122");
        assert_eq!(message.subject, None);
    }

    #[test]
    fn subject_that_interpolates_to_nothing_is_rejected() {
        let quote = quote();
        let context = QuoteContext {
            quote: &quote,
            client: None,
            agent: None,
            public_base_url: "https://quotes.example.com",
        };
        let mut request = request(SendChannel::Email);
        request.to = Some("someone@example.com".to_string());
        request.subject = Some("{{clientName}}".to_string());

        let error = prepare_send(&request, &context).expect_err("blank subject");
        assert_eq!(error, DeliveryError::MissingSubject);
    }

    #[test]
    fn link_shares_resolve_to_the_public_view_url() {
        let quote = quote();
        let context = QuoteContext {
            quote: &quote,
            client: None,
            agent: None,
            public_base_url: "https://quotes.example.com/",
        };

        let prepared = prepare_send(&request(SendChannel::Link), &context).expect("prepared");

        let expected = format!("https://quotes.example.com/view/{}", quote.view_token);
        assert_eq!(prepared, PreparedSend::LinkShare { url: expected.clone() });
        assert_eq!(prepared.sent_to(), expected);
    }
}
