use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use toml::Value;
use wayfarer_core::config::{AppConfig, LoadOptions};

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", &["WAYFARER_DATABASE_URL"]),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", &["WAYFARER_DATABASE_MAX_CONNECTIONS"]),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", &["WAYFARER_DATABASE_TIMEOUT_SECS"]),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", &["WAYFARER_SERVER_BIND_ADDRESS"]),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", &["WAYFARER_SERVER_PORT"]),
    ));
    lines.push(render_line(
        "server.public_base_url",
        &config.server.public_base_url,
        source("server.public_base_url", &["WAYFARER_SERVER_PUBLIC_BASE_URL"]),
    ));
    lines.push(render_line(
        "server.graceful_shutdown_secs",
        &config.server.graceful_shutdown_secs.to_string(),
        source("server.graceful_shutdown_secs", &["WAYFARER_SERVER_GRACEFUL_SHUTDOWN_SECS"]),
    ));

    lines.push(render_line(
        "delivery.provider_base_url",
        config.delivery.provider_base_url.as_deref().unwrap_or("<unset>"),
        source("delivery.provider_base_url", &["WAYFARER_DELIVERY_PROVIDER_BASE_URL"]),
    ));
    let provider_api_key = match &config.delivery.provider_api_key {
        Some(key) if !key.expose_secret().trim().is_empty() => "<redacted>",
        Some(_) => "<empty>",
        None => "<unset>",
    };
    lines.push(render_line(
        "delivery.provider_api_key",
        provider_api_key,
        source("delivery.provider_api_key", &["WAYFARER_DELIVERY_PROVIDER_API_KEY"]),
    ));
    lines.push(render_line(
        "delivery.send_timeout_secs",
        &config.delivery.send_timeout_secs.to_string(),
        source("delivery.send_timeout_secs", &["WAYFARER_DELIVERY_SEND_TIMEOUT_SECS"]),
    ));
    lines.push(render_line(
        "delivery.max_retries",
        &config.delivery.max_retries.to_string(),
        source("delivery.max_retries", &["WAYFARER_DELIVERY_MAX_RETRIES"]),
    ));
    lines.push(render_line(
        "delivery.idempotency_window_secs",
        &config.delivery.idempotency_window_secs.to_string(),
        source(
            "delivery.idempotency_window_secs",
            &["WAYFARER_DELIVERY_IDEMPOTENCY_WINDOW_SECS"],
        ),
    ));

    lines.push(render_line(
        "quotes.expiry_days",
        &config.quotes.expiry_days.to_string(),
        source("quotes.expiry_days", &["WAYFARER_QUOTES_EXPIRY_DAYS"]),
    ));
    lines.push(render_line(
        "quotes.duplicate_start_offset_days",
        &config.quotes.duplicate_start_offset_days.to_string(),
        source(
            "quotes.duplicate_start_offset_days",
            &["WAYFARER_QUOTES_DUPLICATE_START_OFFSET_DAYS"],
        ),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["WAYFARER_LOGGING_LEVEL", "WAYFARER_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["WAYFARER_LOGGING_FORMAT", "WAYFARER_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("wayfarer.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/wayfarer.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    for env_key in env_keys {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
