pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{seed_sample_data, SeedSummary};
pub use repositories::{
    AgentRepository, ClientRepository, CommitOutcome, QuoteEventRepository, QuoteRepository,
    RepositoryError, SendOutcome, SqlAgentRepository, SqlClientRepository,
    SqlQuoteEventRepository, SqlQuoteRepository, StatusWrite,
};
