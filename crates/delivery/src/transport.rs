use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::message::OutboundMessage;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("delivery request failed: {0}")]
    Request(String),
    #[error("provider rejected the message ({status}): {detail}")]
    Rejected { status: u16, detail: String },
}

impl TransportError {
    /// Connection trouble, timeouts, throttling, and provider faults may
    /// clear up on a later attempt. Other rejections will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect(_) | Self::Request(_) => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

/// Acknowledgement from a provider that accepted a message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub provider_message_id: Option<String>,
}

#[async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn deliver(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, TransportError>;
}

/// Accepts every message without side effects. Wired in when no provider is
/// configured so send bookkeeping keeps working in development.
#[derive(Default)]
pub struct NoopTransport;

#[async_trait]
impl ChannelTransport for NoopTransport {
    async fn deliver(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, TransportError> {
        debug!(
            channel = message.channel.as_str(),
            to = %message.to,
            "noop transport accepted message"
        );
        Ok(DeliveryReceipt::default())
    }
}

/// JSON gateway for providers exposing a `POST /v1/messages` endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string(), api_key })
    }
}

#[async_trait]
impl ChannelTransport for HttpTransport {
    async fn deliver(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, TransportError> {
        let url = format!("{}/v1/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key.expose_secret()))
            .json(message)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() || error.is_connect() {
                    TransportError::Connect(error.to_string())
                } else {
                    TransportError::Request(error.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                detail: clip_detail(&detail),
            });
        }

        let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);
        let provider_message_id =
            body.get("id").and_then(serde_json::Value::as_str).map(str::to_string);
        Ok(DeliveryReceipt { provider_message_id })
    }
}

/// Keeps provider error bodies log-sized.
fn clip_detail(detail: &str) -> String {
    const LIMIT: usize = 200;
    let trimmed = detail.trim();
    if trimmed.len() <= LIMIT {
        return trimmed.to_string();
    }
    let mut end = LIMIT;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}

/// Test transport that records every message and replays scripted outcomes.
/// An exhausted script accepts whatever arrives.
#[derive(Default)]
pub struct RecordingTransport {
    state: Mutex<RecordingState>,
}

#[derive(Default)]
struct RecordingState {
    outcomes: VecDeque<Result<DeliveryReceipt, TransportError>>,
    deliveries: Vec<OutboundMessage>,
}

impl RecordingTransport {
    pub fn with_script(outcomes: Vec<Result<DeliveryReceipt, TransportError>>) -> Self {
        Self {
            state: Mutex::new(RecordingState { outcomes: outcomes.into(), deliveries: Vec::new() }),
        }
    }

    pub async fn deliveries(&self) -> Vec<OutboundMessage> {
        self.state.lock().await.deliveries.clone()
    }
}

#[async_trait]
impl ChannelTransport for RecordingTransport {
    async fn deliver(&self, message: &OutboundMessage) -> Result<DeliveryReceipt, TransportError> {
        let mut state = self.state.lock().await;
        state.deliveries.push(message.clone());
        state.outcomes.pop_front().unwrap_or(Ok(DeliveryReceipt::default()))
    }
}
