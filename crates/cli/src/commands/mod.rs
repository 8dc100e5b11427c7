pub mod config;
pub mod doctor;
pub mod migrate;
pub mod seed;

use std::future::Future;

use serde::Serialize;

use wayfarer_core::config::{AppConfig, LoadOptions};
use wayfarer_db::{connect_with_settings, DbPool};

/// Failure taxonomy for the operational subcommands; each class maps to a
/// stable process exit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    ConfigValidation,
    RuntimeInit,
    DbConnectivity,
    Migration,
    SeedExecution,
}

impl ErrorClass {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorClass::ConfigValidation => 2,
            ErrorClass::RuntimeInit => 3,
            ErrorClass::DbConnectivity => 4,
            ErrorClass::Migration => 5,
            ErrorClass::SeedExecution => 6,
        }
    }
}

#[derive(Debug)]
pub(crate) struct CommandError {
    pub class: ErrorClass,
    pub message: String,
}

impl CommandError {
    pub(crate) fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self { class, message: message.into() }
    }
}

/// Loaded config plus a single-thread runtime for commands that need to
/// drive async database work from a synchronous entry point.
pub(crate) struct CommandContext {
    pub config: AppConfig,
    runtime: tokio::runtime::Runtime,
}

impl CommandContext {
    pub(crate) fn prepare() -> Result<Self, CommandError> {
        let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
            CommandError::new(ErrorClass::ConfigValidation, format!("configuration issue: {error}"))
        })?;

        let runtime =
            tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
                CommandError::new(
                    ErrorClass::RuntimeInit,
                    format!("failed to initialize async runtime: {error}"),
                )
            })?;

        Ok(Self { config, runtime })
    }

    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub(crate) fn open_pool(&self) -> Result<DbPool, CommandError> {
        self.block_on(async {
            connect_with_settings(
                &self.config.database.url,
                self.config.database.max_connections,
                self.config.database.timeout_secs,
            )
            .await
            .map_err(|error| CommandError::new(ErrorClass::DbConnectivity, error.to_string()))
        })
    }
}

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let outcome =
            CommandOutcome { command, status: "ok", error_class: None, message: message.into() };
        Self { exit_code: 0, output: outcome.render() }
    }

    pub fn failure(command: &str, class: ErrorClass, message: impl Into<String>) -> Self {
        let outcome = CommandOutcome {
            command,
            status: "error",
            error_class: Some(class),
            message: message.into(),
        };
        Self { exit_code: class.exit_code(), output: outcome.render() }
    }
}

#[derive(Debug, Serialize)]
struct CommandOutcome<'a> {
    command: &'a str,
    status: &'a str,
    error_class: Option<ErrorClass>,
    message: String,
}

impl CommandOutcome<'_> {
    fn render(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|error| {
            format!(
                "{{\"command\":\"{}\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
                self.command,
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        })
    }
}
