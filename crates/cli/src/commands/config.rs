use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use safepost_core::config::{env_keys_for, AppConfig, LoadOptions, DEFAULT_CONFIG_FILES};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

pub fn run(config_path: Option<&Path>) -> String {
    let config = match AppConfig::load(LoadOptions {
        config_path: config_path.map(Path::to_path_buf),
        ..LoadOptions::default()
    }) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(config_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: override > env > file > default):".to_string()];
    for (key_path, value) in effective_values(&config) {
        let source = field_source(key_path, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key_path, &value, source));
    }

    lines.join("\n")
}

fn effective_values(config: &AppConfig) -> Vec<(&'static str, String)> {
    let reddit = &config.reddit;
    let llm = &config.llm;
    let audit = &config.audit;
    let safety = &config.safety;
    let discovery = &config.discovery;
    let actions = &config.actions;

    vec![
        ("reddit.client_id", reddit.client_id.clone()),
        ("reddit.client_secret", redact_secret(Some(&reddit.client_secret))),
        ("reddit.username", reddit.username.clone()),
        ("reddit.password", redact_secret(Some(&reddit.password))),
        ("reddit.user_agent", reddit.user_agent.clone()),
        ("reddit.api_base_url", reddit.api_base_url.clone()),
        ("reddit.auth_base_url", reddit.auth_base_url.clone()),
        ("reddit.timeout_secs", reddit.timeout_secs.to_string()),
        ("llm.provider", format!("{:?}", llm.provider)),
        ("llm.api_key", redact_secret(llm.api_key.as_ref())),
        ("llm.endpoint", llm.endpoint.clone()),
        ("llm.model", llm.model.clone()),
        ("llm.temperature", llm.temperature.to_string()),
        ("llm.max_output_tokens", llm.max_output_tokens.to_string()),
        ("llm.timeout_secs", llm.timeout_secs.to_string()),
        ("audit.supabase_url", audit.supabase_url.clone().unwrap_or_else(|| "<unset>".to_string())),
        ("audit.service_key", redact_secret(audit.service_key.as_ref())),
        ("audit.table", audit.table.clone()),
        ("safety.max_posts_per_week", safety.max_posts_per_week.to_string()),
        ("safety.min_hours_between_posts", safety.min_hours_between_posts.to_string()),
        ("safety.max_promotional_ratio", safety.max_promotional_ratio.to_string()),
        ("safety.min_activity_sample", safety.min_activity_sample.to_string()),
        ("safety.activity_fetch_limit", safety.activity_fetch_limit.to_string()),
        ("safety.rate_window_days", safety.rate_window_days.to_string()),
        ("discovery.scopes", discovery.scopes.join(",")),
        ("discovery.queries", discovery.queries.join(",")),
        ("discovery.max_queries_per_run", discovery.max_queries_per_run.to_string()),
        ("discovery.max_scopes_per_run", discovery.max_scopes_per_run.to_string()),
        ("discovery.results_per_search", discovery.results_per_search.to_string()),
        ("discovery.repliers_inspected", discovery.repliers_inspected.to_string()),
        ("discovery.max_candidates", discovery.max_candidates.to_string()),
        ("discovery.search_window", discovery.search_window.as_str().to_string()),
        ("discovery.inter_query_delay_secs", discovery.inter_query_delay_secs.to_string()),
        ("actions.max_actions_per_run", actions.max_actions_per_run.to_string()),
        ("actions.cooldown_secs", actions.cooldown_secs.to_string()),
        ("actions.context_char_budget", actions.context_char_budget.to_string()),
        ("actions.link_policy", actions.link_policy.as_str().to_string()),
        ("actions.outbound_link", actions.outbound_link.clone()),
        ("actions.persona", actions.persona.clone()),
        (
            "actions.prompt_template",
            if actions.prompt_template.is_some() { "<custom>" } else { "<default>" }.to_string(),
        ),
        ("actions.dry_run", actions.dry_run.to_string()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", format!("{:?}", config.logging.format)),
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys_for(key_path)
        .iter()
        .find(|key| env::var(key).is_ok_and(|value| !value.trim().is_empty()))
    {
        return format!("env ({env_key})");
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

/// Shows at most the last four characters of a secret.
fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= 8 {
        return "<redacted>".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{tail}")
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use toml::Value;

    use super::{contains_path, redact_secret};

    #[test]
    fn secrets_are_redacted_to_a_short_tail() {
        let long: SecretString = "abcdefghijklmnop".to_string().into();
        let short: SecretString = "hunter2".to_string().into();

        assert_eq!(redact_secret(Some(&long)), "***mnop");
        assert_eq!(redact_secret(Some(&short)), "<redacted>");
        assert_eq!(redact_secret(None), "<unset>");
    }

    #[test]
    fn nested_keys_are_found_in_config_file() {
        let doc = "[safety]\nmax_posts_per_week = 2\n".parse::<Value>().unwrap_or(Value::Boolean(false));
        assert!(contains_path(&doc, "safety.max_posts_per_week"));
        assert!(!contains_path(&doc, "safety.min_activity_sample"));
        assert!(!contains_path(&doc, "actions.dry_run"));
    }
}
