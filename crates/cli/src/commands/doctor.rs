use serde::Serialize;
use wayfarer_core::config::{AppConfig, LoadOptions};
use wayfarer_db::connect_with_settings;

const CHECK_CONFIG: &str = "config_validation";
const CHECK_PROVIDER: &str = "delivery_provider";
const CHECK_DATABASE: &str = "database_connectivity";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

impl CheckStatus {
    fn marker(self) -> &'static str {
        match self {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: "skipped because configuration did not load".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn from_checks(checks: Vec<DoctorCheck>) -> Self {
        let healthy = checks.iter().all(|check| check.status == CheckStatus::Pass);

        Self {
            overall_status: if healthy { CheckStatus::Pass } else { CheckStatus::Fail },
            summary: if healthy {
                "doctor: all readiness checks passed".to_string()
            } else {
                "doctor: one or more readiness checks failed".to_string()
            },
            checks,
        }
    }

    fn render_human(&self) -> String {
        let mut lines = vec![self.summary.clone()];
        for check in &self.checks {
            lines.push(format!("- [{}] {}: {}", check.status.marker(), check.name, check.details));
        }
        lines.join("\n")
    }
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        })
    } else {
        report.render_human()
    }
}

fn build_report() -> DoctorReport {
    let checks = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => vec![
            DoctorCheck::pass(CHECK_CONFIG, "configuration loaded and validated"),
            provider_check(&config),
            database_check(&config),
        ],
        Err(error) => vec![
            DoctorCheck::fail(CHECK_CONFIG, error.to_string()),
            DoctorCheck::skipped(CHECK_PROVIDER),
            DoctorCheck::skipped(CHECK_DATABASE),
        ],
    };

    DoctorReport::from_checks(checks)
}

fn provider_check(config: &AppConfig) -> DoctorCheck {
    match &config.delivery.provider_base_url {
        Some(base_url) => DoctorCheck::pass(
            CHECK_PROVIDER,
            format!("provider gateway configured at `{base_url}`"),
        ),
        None => DoctorCheck::pass(
            CHECK_PROVIDER,
            "no provider configured; outbound messages are logged only",
        ),
    }
}

fn database_check(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck::fail(
                CHECK_DATABASE,
                format!("failed to initialize async runtime: {error}"),
            );
        }
    };

    let probe = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        pool.close().await;
        Ok::<(), String>(())
    });

    match probe {
        Ok(()) => {
            DoctorCheck::pass(CHECK_DATABASE, format!("connected using `{}`", config.database.url))
        }
        Err(details) => DoctorCheck::fail(CHECK_DATABASE, details),
    }
}
