use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::domain::quote::QuoteStatus;
use crate::pricing::PricingViolation;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Stable machine-readable error codes exposed at the service boundary.
/// Every code carries a fixed severity and a retryability hint so callers
/// can decide between reload-and-retry and giving up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    QuoteValidationFailed,
    QuoteStateInvalid,
    QuoteConflictVersion,
    QuoteAlreadySent,
    QuoteNotFound,
    QuotePersistenceFailed,
    DatabaseTimeout,
    DatabaseTransactionAborted,
    PricingValidationFailed,
    ItemsInconsistent,
    ClientNotFound,
    AgentNotFound,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuoteValidationFailed => "QUOTE_VALIDATION_FAILED",
            Self::QuoteStateInvalid => "QUOTE_STATE_INVALID",
            Self::QuoteConflictVersion => "QUOTE_CONFLICT_VERSION",
            Self::QuoteAlreadySent => "QUOTE_ALREADY_SENT",
            Self::QuoteNotFound => "QUOTE_NOT_FOUND",
            Self::QuotePersistenceFailed => "QUOTE_PERSISTENCE_FAILED",
            Self::DatabaseTimeout => "DATABASE_TIMEOUT",
            Self::DatabaseTransactionAborted => "DATABASE_TRANSACTION_ABORTED",
            Self::PricingValidationFailed => "PRICING_VALIDATION_FAILED",
            Self::ItemsInconsistent => "ITEMS_INCONSISTENT",
            Self::ClientNotFound => "CLIENT_NOT_FOUND",
            Self::AgentNotFound => "AGENT_NOT_FOUND",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::QuoteAlreadySent
            | Self::QuotePersistenceFailed
            | Self::DatabaseTransactionAborted
            | Self::ItemsInconsistent
            | Self::InternalError => Severity::Critical,
            Self::QuoteValidationFailed
            | Self::QuoteStateInvalid
            | Self::QuoteConflictVersion
            | Self::QuoteNotFound
            | Self::DatabaseTimeout
            | Self::PricingValidationFailed
            | Self::ClientNotFound
            | Self::AgentNotFound => Severity::High,
        }
    }

    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::QuoteConflictVersion
                | Self::QuotePersistenceFailed
                | Self::DatabaseTimeout
                | Self::DatabaseTransactionAborted
        )
    }
}

/// Engine-level error covering every operation exposed by this service.
/// The HTTP layer maps these onto the structured error envelope without
/// inspecting message text.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("quote validation failed: {}", .violations.join("; "))]
    QuoteValidationFailed { violations: Vec<String> },

    #[error("quote `{quote_id}` has been sent and is locked against structural edits")]
    QuoteAlreadySent { quote_id: String },

    #[error("quote `{quote_id}` is {status:?} and does not permit this operation")]
    QuoteStateInvalid { quote_id: String, status: QuoteStatus },

    #[error("version conflict: expected {expected}, stored version is {actual}")]
    QuoteConflictVersion { expected: u32, actual: u32 },

    #[error("quote `{quote_id}` not found")]
    QuoteNotFound { quote_id: String },

    #[error(transparent)]
    Pricing(#[from] PricingViolation),

    #[error("client `{client_id}` not found")]
    ClientNotFound { client_id: String },

    #[error("agent `{agent_id}` not found")]
    AgentNotFound { agent_id: String },

    #[error("quote could not be persisted: {message}")]
    QuotePersistenceFailed { message: String },

    #[error("database operation timed out")]
    DatabaseTimeout,

    #[error("database transaction aborted: {message}")]
    DatabaseTransactionAborted { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::QuoteValidationFailed { .. } => ErrorCode::QuoteValidationFailed,
            Self::QuoteAlreadySent { .. } => ErrorCode::QuoteAlreadySent,
            Self::QuoteStateInvalid { .. } => ErrorCode::QuoteStateInvalid,
            Self::QuoteConflictVersion { .. } => ErrorCode::QuoteConflictVersion,
            Self::QuoteNotFound { .. } => ErrorCode::QuoteNotFound,
            Self::Pricing(PricingViolation::TotalMismatch { .. }) => ErrorCode::ItemsInconsistent,
            Self::Pricing(_) => ErrorCode::PricingValidationFailed,
            Self::ClientNotFound { .. } => ErrorCode::ClientNotFound,
            Self::AgentNotFound { .. } => ErrorCode::AgentNotFound,
            Self::QuotePersistenceFailed { .. } => ErrorCode::QuotePersistenceFailed,
            Self::DatabaseTimeout => ErrorCode::DatabaseTimeout,
            Self::DatabaseTransactionAborted { .. } => ErrorCode::DatabaseTransactionAborted,
            Self::Internal { .. } => ErrorCode::InternalError,
        }
    }

    pub fn severity(&self) -> Severity {
        self.code().severity()
    }

    pub fn retryable(&self) -> bool {
        self.code().retryable()
    }

    /// Structured diagnostics for the error envelope's `details` field.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::QuoteValidationFailed { violations } => {
                Some(json!({ "violations": violations }))
            }
            Self::QuoteConflictVersion { expected, actual } => {
                Some(json!({ "expectedVersion": expected, "actualVersion": actual }))
            }
            Self::Pricing(PricingViolation::TotalMismatch { expected, supplied }) => {
                Some(json!({ "expectedTotal": expected, "suppliedTotal": supplied }))
            }
            Self::Pricing(PricingViolation::SubtotalMismatch { expected, supplied }) => {
                Some(json!({ "expectedSubtotal": expected, "suppliedSubtotal": supplied }))
            }
            Self::QuoteStateInvalid { status, .. } => {
                Some(json!({ "status": status.as_str() }))
            }
            _ => None,
        }
    }
}
