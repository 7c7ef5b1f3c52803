use std::path::Path;

use safepost_agent::ChatCompletionsClient;
use safepost_core::config::{AppConfig, GenerationProvider, LoadOptions};
use safepost_core::PlatformClient;
use safepost_reddit::RedditClient;
use serde::Serialize;

use crate::commands::escape_json;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 3] = ["reddit_authentication", "generation_provider", "audit_sink"];

pub fn run(config_path: Option<&Path>, json_output: bool) -> String {
    let report = build_report(config_path);

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report(config_path: Option<&Path>) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions {
        config_path: config_path.map(Path::to_path_buf),
        ..LoadOptions::default()
    }) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_reddit_authentication(&config));
            checks.push(check_generation_provider(&config));
            checks.push(check_audit_sink(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }));
        }
    }

    // Skipped checks do not fail the report.
    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_reddit_authentication(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "reddit_authentication",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let client = RedditClient::from_config(&config.reddit)?;
        client.authenticate().await
    });

    match result {
        Ok(identity) => DoctorCheck {
            name: "reddit_authentication",
            status: CheckStatus::Pass,
            details: format!("authenticated as u/{}", identity.as_str()),
        },
        Err(error) => DoctorCheck {
            name: "reddit_authentication",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_generation_provider(config: &AppConfig) -> DoctorCheck {
    match config.llm.provider {
        GenerationProvider::Template => DoctorCheck {
            name: "generation_provider",
            status: CheckStatus::Pass,
            details: "template replies, no network provider".to_string(),
        },
        GenerationProvider::OpenAiCompatible => match ChatCompletionsClient::from_config(&config.llm)
        {
            Ok(_) => DoctorCheck {
                name: "generation_provider",
                status: CheckStatus::Pass,
                details: format!("model `{}` at {}", config.llm.model, config.llm.endpoint),
            },
            Err(error) => DoctorCheck {
                name: "generation_provider",
                status: CheckStatus::Fail,
                details: error.to_string(),
            },
        },
    }
}

fn check_audit_sink(config: &AppConfig) -> DoctorCheck {
    if config.audit.is_configured() {
        DoctorCheck {
            name: "audit_sink",
            status: CheckStatus::Pass,
            details: format!("writing to table `{}`", config.audit.table),
        }
    } else {
        DoctorCheck {
            name: "audit_sink",
            status: CheckStatus::Skipped,
            details: "not configured, audit events are logged only".to_string(),
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
