pub mod config;
pub mod correlation;
pub mod domain;
pub mod duplication;
pub mod errors;
pub mod lifecycle;
pub mod pricing;
pub mod templates;

pub use config::{
    AppConfig, ConfigError, ConfigOverrides, DatabaseConfig, DeliveryConfig, LoadOptions,
    LogFormat, LoggingConfig, QuotesConfig, ServerConfig,
};
pub use correlation::{new_correlation_id, payload_hash};
pub use domain::agent::{Agent, AgentId};
pub use domain::client::{Client, ClientId};
pub use domain::quote::{
    CostBreakdown, DeliveryState, PricingSummary, Quote, QuoteDraft, QuoteId, QuoteItems,
    QuoteStatus, SendChannel, Travelers,
};
pub use duplication::{clone_quote, DuplicateOptions, DuplicationPolicy};
pub use errors::{EngineError, ErrorCode, Severity};
pub use lifecycle::{client_transition, ensure_editable, is_expired, ClientAction};
pub use pricing::{expected_total, validate as validate_pricing, PricingViolation, PRICE_TOLERANCE};
pub use templates::{
    find_template, interpolate, prepare_variables, MessageTemplate, QuoteContext, TemplateVars,
    MESSAGE_TEMPLATES,
};
