use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::message::OutboundMessage;
use crate::transport::{ChannelTransport, DeliveryReceipt, TransportError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 2, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Pushes prepared messages through a transport, retrying transient faults.
///
/// The send is committed to the quote before dispatch starts, so a failure
/// here ends as a log line. Nothing is rolled back.
pub struct Dispatcher {
    transport: Arc<dyn ChannelTransport>,
    retry_policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn ChannelTransport>, retry_policy: RetryPolicy) -> Self {
        Self { transport, retry_policy }
    }

    pub async fn dispatch(
        &self,
        message: &OutboundMessage,
        correlation_id: &str,
    ) -> Result<DeliveryReceipt, TransportError> {
        let mut attempt: u32 = 0;
        loop {
            match self.transport.deliver(message).await {
                Ok(receipt) => {
                    info!(
                        event_name = "delivery.message_dispatched",
                        correlation_id = %correlation_id,
                        channel = message.channel.as_str(),
                        to = %message.to,
                        attempt,
                        "provider accepted message"
                    );
                    return Ok(receipt);
                }
                Err(error) => {
                    if attempt >= self.retry_policy.max_retries || !error.is_retryable() {
                        warn!(
                            event_name = "delivery.abandoned",
                            correlation_id = %correlation_id,
                            channel = message.channel.as_str(),
                            attempt,
                            max_retries = self.retry_policy.max_retries,
                            error = %error,
                            "delivery abandoned"
                        );
                        return Err(error);
                    }

                    warn!(
                        event_name = "delivery.attempt_failed",
                        correlation_id = %correlation_id,
                        channel = message.channel.as_str(),
                        attempt,
                        max_retries = self.retry_policy.max_retries,
                        error = %error,
                        "delivery attempt failed; retrying"
                    );
                    let delay = self.retry_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}
