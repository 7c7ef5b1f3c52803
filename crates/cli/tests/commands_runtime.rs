use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use safepost_cli::commands::run::RunOptions;
use safepost_cli::commands::{config, doctor, run};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REQUIRED_ENV: [(&str, &str); 6] = [
    ("REDDIT_CLIENT_ID", "client-id"),
    ("REDDIT_CLIENT_SECRET", "client-secret-value"),
    ("REDDIT_USERNAME", "restore_helper"),
    ("REDDIT_PASSWORD", "hunter2-password"),
    ("ZAI_API_KEY", "zai-secret-key"),
    ("WEBSITE_URL", "https://restore.example/"),
];

#[test]
fn run_returns_config_failure_without_credentials() {
    with_env(&[], || {
        let result = run::run(RunOptions::default());
        assert_eq!(result.exit_code, 1, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "run");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn run_posts_reply_against_mock_platform() {
    let runtime = test_runtime();
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        mount_auth(&server, json!({"access_token": "token-123", "token_type": "bearer"})).await;
        mount_activity(&server, Vec::new()).await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/r/[^/]+/search$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "Listing",
                "data": {"children": [
                    {"kind": "t3", "data": {
                        "id": "abc123", "subreddit": "OldPhotos",
                        "title": "How do I fix this torn photo?",
                        "selftext": "Water damage on the corner",
                        "permalink": "/r/OldPhotos/comments/abc123/torn/", "score": 9
                    }}
                ]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/comments/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"kind": "Listing", "data": {"children": []}},
                {"kind": "Listing", "data": {"children": [
                    {"kind": "t1", "data": {"author": "alice", "replies": ""}}
                ]}}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/comment"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "json": {"errors": [], "data": {"things": [
                    {"kind": "t1", "data": {"id": "c1", "permalink": "/r/OldPhotos/comments/abc123/torn/c1/"}}
                ]}}
            })))
            .expect(1)
            .mount(&server)
            .await;
        server
    });

    let vars = mock_env(&server.uri());
    with_env(&borrowed(&vars), || {
        let result = run::run(RunOptions { template: true, ..RunOptions::default() });
        let payload = parse_payload(&result.output);

        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);
        assert_eq!(payload["status"], "ok");
        assert!(payload["run_id"].is_string());
        assert!(payload["message"].as_str().unwrap_or_default().contains("1 of 1 candidates posted"));
    });

    runtime.block_on(server.verify());
}

#[test]
fn promotional_history_halts_run_without_error() {
    let runtime = test_runtime();
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        mount_auth(&server, json!({"access_token": "token-123", "token_type": "bearer"})).await;
        let comments = (0..10_u32)
            .map(|index| {
                let body = if index < 3 {
                    "this tool did it for me: https://restore.example/".to_string()
                } else {
                    "scan at 600dpi before touching anything".to_string()
                };
                json!({"kind": "t1", "data": {"body": body, "created_utc": 1_772_000_000.0 - f64::from(index)}})
            })
            .collect();
        mount_activity(&server, comments).await;
        Mock::given(method("POST"))
            .and(path("/api/comment"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        server
    });

    let vars = mock_env(&server.uri());
    with_env(&borrowed(&vars), || {
        let result = run::run(RunOptions { template: true, ..RunOptions::default() });
        let payload = parse_payload(&result.output);

        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);
        assert_eq!(payload["status"], "ok");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("halted"), "unexpected message: {message}");
    });

    runtime.block_on(server.verify());
}

#[test]
fn rejected_login_maps_to_authentication_error() {
    let runtime = test_runtime();
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        mount_auth(&server, json!({"error": "invalid_grant"})).await;
        server
    });

    let vars = mock_env(&server.uri());
    with_env(&borrowed(&vars), || {
        let result = run::run(RunOptions { template: true, ..RunOptions::default() });
        let payload = parse_payload(&result.output);

        assert_eq!(result.exit_code, 1);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "authentication");
    });
}

#[test]
fn config_reports_sources_and_redacts_secrets() {
    let temp_dir = TempDir::new().unwrap_or_else(|error| panic!("temp dir: {error}"));
    let config_path = temp_dir.path().join("safepost.toml");
    fs::write(&config_path, "[safety]\nmax_posts_per_week = 2\n")
        .unwrap_or_else(|error| panic!("write config: {error}"));

    with_env(&REQUIRED_ENV, || {
        let output = config::run(Some(&config_path));

        assert!(output.contains("- reddit.client_secret = ***alue (source: env (REDDIT_CLIENT_SECRET))"));
        assert!(output.contains("- reddit.password = ***word (source: env (REDDIT_PASSWORD))"));
        assert!(output.contains("- safety.max_posts_per_week = 2 (source: file ("));
        assert!(output.contains("- safety.min_hours_between_posts = 4 (source: default)"));
        assert!(!output.contains("client-secret-value"));
        assert!(!output.contains("zai-secret-key"));
    });
}

#[test]
fn doctor_json_fails_without_config_and_skips_dependents() {
    with_env(&[], || {
        let output = doctor::run(None, true);
        let payload = parse_payload(&output);

        assert_eq!(payload["overall_status"], "fail");
        let checks = payload["checks"].as_array().cloned().unwrap_or_default();
        let status_of = |name: &str| {
            checks
                .iter()
                .find(|check| check["name"] == name)
                .map(|check| check["status"].clone())
                .unwrap_or(Value::Null)
        };
        assert_eq!(status_of("config_validation"), "fail");
        assert_eq!(status_of("reddit_authentication"), "skipped");
        assert_eq!(status_of("audit_sink"), "skipped");
    });
}

fn test_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap_or_else(|error| panic!("runtime: {error}"))
}

async fn mount_auth(server: &MockServer, token_body: Value) {
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "restore_helper"})))
        .mount(server)
        .await;
}

async fn mount_activity(server: &MockServer, comments: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/user/restore_helper/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "Listing",
            "data": {"children": comments}
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/restore_helper/submitted"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "Listing",
            "data": {"children": []}
        })))
        .mount(server)
        .await;
}

fn mock_env(base_url: &str) -> Vec<(&'static str, String)> {
    let mut vars: Vec<(&'static str, String)> =
        REQUIRED_ENV.iter().map(|(key, value)| (*key, (*value).to_string())).collect();
    vars.extend([
        ("SAFEPOST_REDDIT_API_BASE_URL", base_url.to_string()),
        ("SAFEPOST_REDDIT_AUTH_BASE_URL", base_url.to_string()),
        ("SAFEPOST_TARGET_SCOPES", "OldPhotos".to_string()),
        ("SAFEPOST_QUERY_TERMS", "restore old photo".to_string()),
        ("SAFEPOST_COOLDOWN_SECS", "0".to_string()),
        ("SAFEPOST_INTER_QUERY_DELAY_SECS", "0".to_string()),
        ("SAFEPOST_LOGGING_LEVEL", "warn".to_string()),
    ]);
    vars
}

fn borrowed<'a>(vars: &'a [(&'static str, String)]) -> Vec<(&'static str, &'a str)> {
    vars.iter().map(|(key, value)| (*key, value.as_str())).collect()
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).unwrap_or_else(|error| panic!("invalid JSON {output}: {error}"))
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let keys: Vec<&'static str> = safepost_core::config::all_env_keys().collect();
    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
}
