use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::content::{LinkPolicy, TimeWindow};

pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["safepost.toml", "config/safepost.toml"];

/// Largest `limit` the platform honors on a single listing request.
pub const MAX_LISTING_LIMIT: usize = 100;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub reddit: RedditConfig,
    pub llm: LlmConfig,
    pub audit: AuditConfig,
    pub safety: SafetyConfig,
    pub discovery: DiscoveryConfig,
    pub actions: ActionConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub username: String,
    pub password: SecretString,
    pub user_agent: String,
    pub api_base_url: String,
    pub auth_base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: GenerationProvider,
    pub api_key: Option<SecretString>,
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AuditConfig {
    pub supabase_url: Option<String>,
    pub service_key: Option<SecretString>,
    pub table: String,
}

#[derive(Clone, Debug)]
pub struct SafetyConfig {
    pub max_posts_per_week: u32,
    pub min_hours_between_posts: f64,
    pub max_promotional_ratio: f64,
    pub min_activity_sample: usize,
    pub activity_fetch_limit: usize,
    pub rate_window_days: u32,
}

#[derive(Clone, Debug)]
pub struct DiscoveryConfig {
    pub scopes: Vec<String>,
    pub queries: Vec<String>,
    pub max_queries_per_run: usize,
    pub max_scopes_per_run: usize,
    pub results_per_search: usize,
    pub repliers_inspected: usize,
    pub max_candidates: usize,
    pub search_window: TimeWindow,
    pub inter_query_delay_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ActionConfig {
    pub max_actions_per_run: usize,
    pub cooldown_secs: u64,
    pub context_char_budget: usize,
    pub link_policy: LinkPolicy,
    pub outbound_link: String,
    pub persona: String,
    pub prompt_template: Option<String>,
    pub dry_run: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationProvider {
    OpenAiCompatible,
    Template,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl AuditConfig {
    pub fn is_configured(&self) -> bool {
        let has_url = self.supabase_url.as_ref().is_some_and(|url| !url.trim().is_empty());
        let has_key =
            self.service_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty());
        has_url && has_key
    }
}

impl DiscoveryConfig {
    pub fn inter_query_delay(&self) -> Duration {
        Duration::from_secs(self.inter_query_delay_secs)
    }
}

impl ActionConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Binds a config key path to the environment variables that may set it.
/// The first name is the canonical one; the rest are accepted aliases.
#[derive(Clone, Copy, Debug)]
pub struct EnvBinding {
    pub key_path: &'static str,
    pub env_keys: &'static [&'static str],
}

pub const ENV_BINDINGS: &[EnvBinding] = &[
    bind("reddit.client_id", &["SAFEPOST_REDDIT_CLIENT_ID", "REDDIT_CLIENT_ID"]),
    bind("reddit.client_secret", &["SAFEPOST_REDDIT_CLIENT_SECRET", "REDDIT_CLIENT_SECRET"]),
    bind("reddit.username", &["SAFEPOST_REDDIT_USERNAME", "REDDIT_USERNAME"]),
    bind("reddit.password", &["SAFEPOST_REDDIT_PASSWORD", "REDDIT_PASSWORD"]),
    bind("reddit.user_agent", &["SAFEPOST_REDDIT_USER_AGENT", "REDDIT_USER_AGENT"]),
    bind("reddit.api_base_url", &["SAFEPOST_REDDIT_API_BASE_URL"]),
    bind("reddit.auth_base_url", &["SAFEPOST_REDDIT_AUTH_BASE_URL"]),
    bind("reddit.timeout_secs", &["SAFEPOST_REDDIT_TIMEOUT_SECS"]),
    bind("llm.provider", &["SAFEPOST_LLM_PROVIDER"]),
    bind("llm.api_key", &["SAFEPOST_LLM_API_KEY", "ZAI_API_KEY"]),
    bind("llm.endpoint", &["SAFEPOST_LLM_ENDPOINT"]),
    bind("llm.model", &["SAFEPOST_LLM_MODEL"]),
    bind("llm.temperature", &["SAFEPOST_LLM_TEMPERATURE"]),
    bind("llm.max_output_tokens", &["SAFEPOST_LLM_MAX_OUTPUT_TOKENS"]),
    bind("llm.timeout_secs", &["SAFEPOST_LLM_TIMEOUT_SECS"]),
    bind("audit.supabase_url", &["SAFEPOST_AUDIT_SUPABASE_URL", "SUPABASE_URL"]),
    bind("audit.service_key", &["SAFEPOST_AUDIT_SERVICE_KEY", "SUPABASE_SERVICE_KEY"]),
    bind("audit.table", &["SAFEPOST_AUDIT_TABLE"]),
    bind("safety.max_posts_per_week", &["SAFEPOST_MAX_POSTS_PER_WEEK", "MAX_POSTS_PER_WEEK"]),
    bind(
        "safety.min_hours_between_posts",
        &["SAFEPOST_MIN_HOURS_BETWEEN_POSTS", "MIN_HOURS_BETWEEN_POSTS"],
    ),
    bind(
        "safety.max_promotional_ratio",
        &["SAFEPOST_MAX_PROMOTIONAL_RATIO", "MAX_PROMOTIONAL_RATIO"],
    ),
    bind("safety.min_activity_sample", &["SAFEPOST_MIN_ACTIVITY_SAMPLE", "MIN_ACTIVITY_SAMPLE"]),
    bind("safety.activity_fetch_limit", &["SAFEPOST_ACTIVITY_FETCH_LIMIT"]),
    bind("safety.rate_window_days", &["SAFEPOST_RATE_WINDOW_DAYS"]),
    bind("discovery.scopes", &["SAFEPOST_TARGET_SCOPES"]),
    bind("discovery.queries", &["SAFEPOST_QUERY_TERMS"]),
    bind("discovery.max_queries_per_run", &["SAFEPOST_MAX_QUERIES_PER_RUN"]),
    bind("discovery.max_scopes_per_run", &["SAFEPOST_MAX_SCOPES_PER_RUN"]),
    bind("discovery.results_per_search", &["SAFEPOST_RESULTS_PER_SEARCH"]),
    bind("discovery.repliers_inspected", &["SAFEPOST_REPLIERS_INSPECTED"]),
    bind("discovery.max_candidates", &["SAFEPOST_MAX_CANDIDATES"]),
    bind("discovery.search_window", &["SAFEPOST_SEARCH_WINDOW"]),
    bind("discovery.inter_query_delay_secs", &["SAFEPOST_INTER_QUERY_DELAY_SECS"]),
    bind("actions.max_actions_per_run", &["SAFEPOST_MAX_ACTIONS_PER_RUN"]),
    bind("actions.cooldown_secs", &["SAFEPOST_COOLDOWN_SECS"]),
    bind("actions.context_char_budget", &["SAFEPOST_CONTEXT_CHAR_BUDGET"]),
    bind("actions.link_policy", &["SAFEPOST_LINK_POLICY", "LINK_POLICY"]),
    bind("actions.outbound_link", &["SAFEPOST_OUTBOUND_LINK", "WEBSITE_URL"]),
    bind("actions.persona", &["SAFEPOST_PERSONA"]),
    bind("actions.prompt_template", &["SAFEPOST_PROMPT_TEMPLATE"]),
    bind("actions.dry_run", &["SAFEPOST_DRY_RUN"]),
    bind("logging.level", &["SAFEPOST_LOGGING_LEVEL", "SAFEPOST_LOG_LEVEL"]),
    bind("logging.format", &["SAFEPOST_LOGGING_FORMAT", "SAFEPOST_LOG_FORMAT"]),
];

const fn bind(key_path: &'static str, env_keys: &'static [&'static str]) -> EnvBinding {
    EnvBinding { key_path, env_keys }
}

pub fn env_keys_for(key_path: &str) -> &'static [&'static str] {
    ENV_BINDINGS
        .iter()
        .find(|binding| binding.key_path == key_path)
        .map(|binding| binding.env_keys)
        .unwrap_or(&[])
}

/// Every environment variable the loader reads, canonical names and aliases.
pub fn all_env_keys() -> impl Iterator<Item = &'static str> {
    ENV_BINDINGS.iter().flat_map(|binding| binding.env_keys.iter().copied())
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub reddit_client_id: Option<String>,
    pub reddit_client_secret: Option<String>,
    pub reddit_username: Option<String>,
    pub reddit_password: Option<String>,
    pub reddit_api_base_url: Option<String>,
    pub reddit_auth_base_url: Option<String>,
    pub llm_provider: Option<GenerationProvider>,
    pub llm_api_key: Option<String>,
    pub llm_endpoint: Option<String>,
    pub audit_supabase_url: Option<String>,
    pub audit_service_key: Option<String>,
    pub outbound_link: Option<String>,
    pub link_policy: Option<LinkPolicy>,
    pub cooldown_secs: Option<u64>,
    pub inter_query_delay_secs: Option<u64>,
    pub dry_run: Option<bool>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reddit: RedditConfig {
                client_id: String::new(),
                client_secret: String::new().into(),
                username: String::new(),
                password: String::new().into(),
                user_agent: format!("safepost/{}", env!("CARGO_PKG_VERSION")),
                api_base_url: "https://oauth.reddit.com".to_string(),
                auth_base_url: "https://www.reddit.com".to_string(),
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: GenerationProvider::OpenAiCompatible,
                api_key: None,
                endpoint: "https://api.z.ai/v1/chat/completions".to_string(),
                model: "gml-4.6".to_string(),
                temperature: 0.7,
                max_output_tokens: 250,
                timeout_secs: 15,
            },
            audit: AuditConfig {
                supabase_url: None,
                service_key: None,
                table: "content_history".to_string(),
            },
            safety: SafetyConfig {
                max_posts_per_week: 3,
                min_hours_between_posts: 4.0,
                max_promotional_ratio: 0.10,
                min_activity_sample: 10,
                activity_fetch_limit: 50,
                rate_window_days: 7,
            },
            discovery: DiscoveryConfig {
                scopes: [
                    "PhotoEditingRequests",
                    "AskPhotography",
                    "OldPhotos",
                    "Colorization",
                    "restoration",
                    "PhotoRepair",
                    "pics",
                    "Photography",
                ]
                .into_iter()
                .map(str::to_string)
                .collect(),
                queries: [
                    "restore old photo",
                    "photo restoration help",
                    "AI photo repair",
                    "colorize old photo",
                    "fix damaged photo",
                    "enhance old picture",
                ]
                .into_iter()
                .map(str::to_string)
                .collect(),
                max_queries_per_run: 2,
                max_scopes_per_run: 5,
                results_per_search: 3,
                repliers_inspected: 20,
                max_candidates: 5,
                search_window: TimeWindow::Week,
                inter_query_delay_secs: 2,
            },
            actions: ActionConfig {
                max_actions_per_run: 2,
                cooldown_secs: 60,
                context_char_budget: 500,
                link_policy: LinkPolicy::FollowUpOnly,
                outbound_link: String::new(),
                persona: "a helpful photo restoration expert".to_string(),
                prompt_template: None,
                dry_run: false,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl FromStr for GenerationProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai_compatible" | "openai" | "zai" => Ok(Self::OpenAiCompatible),
            "template" => Ok(Self::Template),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai_compatible|template)"
            ))),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(reddit) = patch.reddit {
            if let Some(client_id) = reddit.client_id {
                self.reddit.client_id = client_id;
            }
            if let Some(client_secret_value) = reddit.client_secret {
                self.reddit.client_secret = secret_value(client_secret_value);
            }
            if let Some(username) = reddit.username {
                self.reddit.username = username;
            }
            if let Some(password_value) = reddit.password {
                self.reddit.password = secret_value(password_value);
            }
            if let Some(user_agent) = reddit.user_agent {
                self.reddit.user_agent = user_agent;
            }
            if let Some(api_base_url) = reddit.api_base_url {
                self.reddit.api_base_url = api_base_url;
            }
            if let Some(auth_base_url) = reddit.auth_base_url {
                self.reddit.auth_base_url = auth_base_url;
            }
            if let Some(timeout_secs) = reddit.timeout_secs {
                self.reddit.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key_value));
            }
            if let Some(endpoint) = llm.endpoint {
                self.llm.endpoint = endpoint;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(max_output_tokens) = llm.max_output_tokens {
                self.llm.max_output_tokens = max_output_tokens;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(audit) = patch.audit {
            if let Some(supabase_url) = audit.supabase_url {
                self.audit.supabase_url = Some(supabase_url);
            }
            if let Some(service_key_value) = audit.service_key {
                self.audit.service_key = Some(secret_value(service_key_value));
            }
            if let Some(table) = audit.table {
                self.audit.table = table;
            }
        }

        if let Some(safety) = patch.safety {
            if let Some(max_posts_per_week) = safety.max_posts_per_week {
                self.safety.max_posts_per_week = max_posts_per_week;
            }
            if let Some(min_hours_between_posts) = safety.min_hours_between_posts {
                self.safety.min_hours_between_posts = min_hours_between_posts;
            }
            if let Some(max_promotional_ratio) = safety.max_promotional_ratio {
                self.safety.max_promotional_ratio = max_promotional_ratio;
            }
            if let Some(min_activity_sample) = safety.min_activity_sample {
                self.safety.min_activity_sample = min_activity_sample;
            }
            if let Some(activity_fetch_limit) = safety.activity_fetch_limit {
                self.safety.activity_fetch_limit = activity_fetch_limit;
            }
            if let Some(rate_window_days) = safety.rate_window_days {
                self.safety.rate_window_days = rate_window_days;
            }
        }

        if let Some(discovery) = patch.discovery {
            if let Some(scopes) = discovery.scopes {
                self.discovery.scopes = scopes;
            }
            if let Some(queries) = discovery.queries {
                self.discovery.queries = queries;
            }
            if let Some(max_queries_per_run) = discovery.max_queries_per_run {
                self.discovery.max_queries_per_run = max_queries_per_run;
            }
            if let Some(max_scopes_per_run) = discovery.max_scopes_per_run {
                self.discovery.max_scopes_per_run = max_scopes_per_run;
            }
            if let Some(results_per_search) = discovery.results_per_search {
                self.discovery.results_per_search = results_per_search;
            }
            if let Some(repliers_inspected) = discovery.repliers_inspected {
                self.discovery.repliers_inspected = repliers_inspected;
            }
            if let Some(max_candidates) = discovery.max_candidates {
                self.discovery.max_candidates = max_candidates;
            }
            if let Some(search_window) = discovery.search_window {
                self.discovery.search_window = search_window;
            }
            if let Some(inter_query_delay_secs) = discovery.inter_query_delay_secs {
                self.discovery.inter_query_delay_secs = inter_query_delay_secs;
            }
        }

        if let Some(actions) = patch.actions {
            if let Some(max_actions_per_run) = actions.max_actions_per_run {
                self.actions.max_actions_per_run = max_actions_per_run;
            }
            if let Some(cooldown_secs) = actions.cooldown_secs {
                self.actions.cooldown_secs = cooldown_secs;
            }
            if let Some(context_char_budget) = actions.context_char_budget {
                self.actions.context_char_budget = context_char_budget;
            }
            if let Some(link_policy) = actions.link_policy {
                self.actions.link_policy = link_policy.parse().map_err(|error| {
                    ConfigError::Validation(format!("actions.link_policy: {error}"))
                })?;
            }
            if let Some(outbound_link) = actions.outbound_link {
                self.actions.outbound_link = outbound_link;
            }
            if let Some(persona) = actions.persona {
                self.actions.persona = persona;
            }
            if let Some(prompt_template) = actions.prompt_template {
                self.actions.prompt_template = Some(prompt_template);
            }
            if let Some(dry_run) = actions.dry_run {
                self.actions.dry_run = dry_run;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some((_, value)) = read_bound("reddit.client_id") {
            self.reddit.client_id = value;
        }
        if let Some((_, value)) = read_bound("reddit.client_secret") {
            self.reddit.client_secret = secret_value(value);
        }
        if let Some((_, value)) = read_bound("reddit.username") {
            self.reddit.username = value;
        }
        if let Some((_, value)) = read_bound("reddit.password") {
            self.reddit.password = secret_value(value);
        }
        if let Some((_, value)) = read_bound("reddit.user_agent") {
            self.reddit.user_agent = value;
        }
        if let Some((_, value)) = read_bound("reddit.api_base_url") {
            self.reddit.api_base_url = value;
        }
        if let Some((_, value)) = read_bound("reddit.auth_base_url") {
            self.reddit.auth_base_url = value;
        }
        if let Some((key, value)) = read_bound("reddit.timeout_secs") {
            self.reddit.timeout_secs = parse_env(key, &value)?;
        }

        if let Some((_, value)) = read_bound("llm.provider") {
            self.llm.provider = value.parse()?;
        }
        if let Some((_, value)) = read_bound("llm.api_key") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some((_, value)) = read_bound("llm.endpoint") {
            self.llm.endpoint = value;
        }
        if let Some((_, value)) = read_bound("llm.model") {
            self.llm.model = value;
        }
        if let Some((key, value)) = read_bound("llm.temperature") {
            self.llm.temperature = parse_env(key, &value)?;
        }
        if let Some((key, value)) = read_bound("llm.max_output_tokens") {
            self.llm.max_output_tokens = parse_env(key, &value)?;
        }
        if let Some((key, value)) = read_bound("llm.timeout_secs") {
            self.llm.timeout_secs = parse_env(key, &value)?;
        }

        if let Some((_, value)) = read_bound("audit.supabase_url") {
            self.audit.supabase_url = Some(value);
        }
        if let Some((_, value)) = read_bound("audit.service_key") {
            self.audit.service_key = Some(secret_value(value));
        }
        if let Some((_, value)) = read_bound("audit.table") {
            self.audit.table = value;
        }

        if let Some((key, value)) = read_bound("safety.max_posts_per_week") {
            self.safety.max_posts_per_week = parse_env(key, &value)?;
        }
        if let Some((key, value)) = read_bound("safety.min_hours_between_posts") {
            self.safety.min_hours_between_posts = parse_env(key, &value)?;
        }
        if let Some((key, value)) = read_bound("safety.max_promotional_ratio") {
            self.safety.max_promotional_ratio = parse_env(key, &value)?;
        }
        if let Some((key, value)) = read_bound("safety.min_activity_sample") {
            self.safety.min_activity_sample = parse_env(key, &value)?;
        }
        if let Some((key, value)) = read_bound("safety.activity_fetch_limit") {
            self.safety.activity_fetch_limit = parse_env(key, &value)?;
        }
        if let Some((key, value)) = read_bound("safety.rate_window_days") {
            self.safety.rate_window_days = parse_env(key, &value)?;
        }

        if let Some((_, value)) = read_bound("discovery.scopes") {
            self.discovery.scopes = parse_list(&value);
        }
        if let Some((_, value)) = read_bound("discovery.queries") {
            self.discovery.queries = parse_list(&value);
        }
        if let Some((key, value)) = read_bound("discovery.max_queries_per_run") {
            self.discovery.max_queries_per_run = parse_env(key, &value)?;
        }
        if let Some((key, value)) = read_bound("discovery.max_scopes_per_run") {
            self.discovery.max_scopes_per_run = parse_env(key, &value)?;
        }
        if let Some((key, value)) = read_bound("discovery.results_per_search") {
            self.discovery.results_per_search = parse_env(key, &value)?;
        }
        if let Some((key, value)) = read_bound("discovery.repliers_inspected") {
            self.discovery.repliers_inspected = parse_env(key, &value)?;
        }
        if let Some((key, value)) = read_bound("discovery.max_candidates") {
            self.discovery.max_candidates = parse_env(key, &value)?;
        }
        if let Some((key, value)) = read_bound("discovery.search_window") {
            self.discovery.search_window = parse_env(key, &value)?;
        }
        if let Some((key, value)) = read_bound("discovery.inter_query_delay_secs") {
            self.discovery.inter_query_delay_secs = parse_env(key, &value)?;
        }

        if let Some((key, value)) = read_bound("actions.max_actions_per_run") {
            self.actions.max_actions_per_run = parse_env(key, &value)?;
        }
        if let Some((key, value)) = read_bound("actions.cooldown_secs") {
            self.actions.cooldown_secs = parse_env(key, &value)?;
        }
        if let Some((key, value)) = read_bound("actions.context_char_budget") {
            self.actions.context_char_budget = parse_env(key, &value)?;
        }
        if let Some((key, value)) = read_bound("actions.link_policy") {
            self.actions.link_policy = parse_env(key, &value)?;
        }
        if let Some((_, value)) = read_bound("actions.outbound_link") {
            self.actions.outbound_link = value;
        }
        if let Some((_, value)) = read_bound("actions.persona") {
            self.actions.persona = value;
        }
        if let Some((_, value)) = read_bound("actions.prompt_template") {
            self.actions.prompt_template = Some(value);
        }
        if let Some((key, value)) = read_bound("actions.dry_run") {
            self.actions.dry_run = parse_env(key, &value)?;
        }

        if let Some((_, value)) = read_bound("logging.level") {
            self.logging.level = value;
        }
        if let Some((_, value)) = read_bound("logging.format") {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(client_id) = overrides.reddit_client_id {
            self.reddit.client_id = client_id;
        }
        if let Some(client_secret) = overrides.reddit_client_secret {
            self.reddit.client_secret = secret_value(client_secret);
        }
        if let Some(username) = overrides.reddit_username {
            self.reddit.username = username;
        }
        if let Some(password) = overrides.reddit_password {
            self.reddit.password = secret_value(password);
        }
        if let Some(api_base_url) = overrides.reddit_api_base_url {
            self.reddit.api_base_url = api_base_url;
        }
        if let Some(auth_base_url) = overrides.reddit_auth_base_url {
            self.reddit.auth_base_url = auth_base_url;
        }
        if let Some(provider) = overrides.llm_provider {
            self.llm.provider = provider;
        }
        if let Some(api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(api_key));
        }
        if let Some(endpoint) = overrides.llm_endpoint {
            self.llm.endpoint = endpoint;
        }
        if let Some(supabase_url) = overrides.audit_supabase_url {
            self.audit.supabase_url = Some(supabase_url);
        }
        if let Some(service_key) = overrides.audit_service_key {
            self.audit.service_key = Some(secret_value(service_key));
        }
        if let Some(outbound_link) = overrides.outbound_link {
            self.actions.outbound_link = outbound_link;
        }
        if let Some(link_policy) = overrides.link_policy {
            self.actions.link_policy = link_policy;
        }
        if let Some(cooldown_secs) = overrides.cooldown_secs {
            self.actions.cooldown_secs = cooldown_secs;
        }
        if let Some(inter_query_delay_secs) = overrides.inter_query_delay_secs {
            self.discovery.inter_query_delay_secs = inter_query_delay_secs;
        }
        if let Some(dry_run) = overrides.dry_run {
            self.actions.dry_run = dry_run;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_reddit(&self.reddit)?;
        validate_llm(&self.llm)?;
        validate_audit(&self.audit)?;
        validate_safety(&self.safety)?;
        validate_discovery(&self.discovery)?;
        validate_actions(&self.actions)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    DEFAULT_CONFIG_FILES.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn require_present(value: &str, key_path: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        let env_keys = env_keys_for(key_path).join(" or ");
        return Err(ConfigError::Validation(format!("{key_path} is required (set {env_keys})")));
    }
    Ok(())
}

fn require_http_url(value: &str, key_path: &str) -> Result<(), ConfigError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{key_path} must start with http:// or https://"
        )));
    }
    Ok(())
}

fn validate_reddit(reddit: &RedditConfig) -> Result<(), ConfigError> {
    require_present(&reddit.client_id, "reddit.client_id")?;
    require_present(reddit.client_secret.expose_secret(), "reddit.client_secret")?;
    require_present(&reddit.username, "reddit.username")?;
    require_present(reddit.password.expose_secret(), "reddit.password")?;
    require_present(&reddit.user_agent, "reddit.user_agent")?;
    require_http_url(&reddit.api_base_url, "reddit.api_base_url")?;
    require_http_url(&reddit.auth_base_url, "reddit.auth_base_url")?;

    if reddit.timeout_secs == 0 || reddit.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "reddit.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if llm.max_output_tokens == 0 {
        return Err(ConfigError::Validation(
            "llm.max_output_tokens must be greater than zero".to_string(),
        ));
    }

    match llm.provider {
        GenerationProvider::OpenAiCompatible => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for the openai_compatible provider (set SAFEPOST_LLM_API_KEY or ZAI_API_KEY)"
                        .to_string(),
                ));
            }
            require_http_url(&llm.endpoint, "llm.endpoint")?;
            require_present(&llm.model, "llm.model")?;
        }
        GenerationProvider::Template => {}
    }

    Ok(())
}

fn validate_audit(audit: &AuditConfig) -> Result<(), ConfigError> {
    if let Some(url) = &audit.supabase_url {
        require_http_url(url, "audit.supabase_url")?;
    }

    if audit.table.trim().is_empty() {
        return Err(ConfigError::Validation("audit.table must not be empty".to_string()));
    }

    Ok(())
}

fn validate_safety(safety: &SafetyConfig) -> Result<(), ConfigError> {
    if safety.max_posts_per_week == 0 {
        return Err(ConfigError::Validation(
            "safety.max_posts_per_week must be greater than zero".to_string(),
        ));
    }

    if !safety.min_hours_between_posts.is_finite() || safety.min_hours_between_posts < 0.0 {
        return Err(ConfigError::Validation(
            "safety.min_hours_between_posts must be a non-negative number".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&safety.max_promotional_ratio) {
        return Err(ConfigError::Validation(
            "safety.max_promotional_ratio must be in range 0.0..=1.0".to_string(),
        ));
    }

    if !(1..=MAX_LISTING_LIMIT).contains(&safety.activity_fetch_limit) {
        return Err(ConfigError::Validation(format!(
            "safety.activity_fetch_limit must be in range 1..={MAX_LISTING_LIMIT}"
        )));
    }

    if safety.rate_window_days == 0 {
        return Err(ConfigError::Validation(
            "safety.rate_window_days must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_discovery(discovery: &DiscoveryConfig) -> Result<(), ConfigError> {
    if discovery.scopes.iter().all(|scope| scope.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "discovery.scopes must list at least one target scope".to_string(),
        ));
    }

    if discovery.queries.iter().all(|query| query.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "discovery.queries must list at least one query term".to_string(),
        ));
    }

    let bounds = [
        ("discovery.max_queries_per_run", discovery.max_queries_per_run),
        ("discovery.max_scopes_per_run", discovery.max_scopes_per_run),
        ("discovery.results_per_search", discovery.results_per_search),
        ("discovery.repliers_inspected", discovery.repliers_inspected),
        ("discovery.max_candidates", discovery.max_candidates),
    ];
    for (key_path, value) in bounds {
        if value == 0 {
            return Err(ConfigError::Validation(format!("{key_path} must be greater than zero")));
        }
    }

    Ok(())
}

fn validate_actions(actions: &ActionConfig) -> Result<(), ConfigError> {
    if actions.max_actions_per_run == 0 {
        return Err(ConfigError::Validation(
            "actions.max_actions_per_run must be greater than zero".to_string(),
        ));
    }

    if actions.context_char_budget == 0 {
        return Err(ConfigError::Validation(
            "actions.context_char_budget must be greater than zero".to_string(),
        ));
    }

    require_present(&actions.outbound_link, "actions.outbound_link")?;
    require_http_url(&actions.outbound_link, "actions.outbound_link")?;

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// First non-empty variable bound to `key_path`, with the name that was set.
fn read_bound(key_path: &str) -> Option<(&'static str, String)> {
    env_keys_for(key_path).iter().find_map(|key| read_env(key).map(|value| (*key, value)))
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|part| !part.is_empty()).map(str::to_string).collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    reddit: Option<RedditPatch>,
    llm: Option<LlmPatch>,
    audit: Option<AuditPatch>,
    safety: Option<SafetyPatch>,
    discovery: Option<DiscoveryPatch>,
    actions: Option<ActionsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct RedditPatch {
    client_id: Option<String>,
    client_secret: Option<String>,
    username: Option<String>,
    password: Option<String>,
    user_agent: Option<String>,
    api_base_url: Option<String>,
    auth_base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<GenerationProvider>,
    api_key: Option<String>,
    endpoint: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_output_tokens: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AuditPatch {
    supabase_url: Option<String>,
    service_key: Option<String>,
    table: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SafetyPatch {
    max_posts_per_week: Option<u32>,
    min_hours_between_posts: Option<f64>,
    max_promotional_ratio: Option<f64>,
    min_activity_sample: Option<usize>,
    activity_fetch_limit: Option<usize>,
    rate_window_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct DiscoveryPatch {
    scopes: Option<Vec<String>>,
    queries: Option<Vec<String>>,
    max_queries_per_run: Option<usize>,
    max_scopes_per_run: Option<usize>,
    results_per_search: Option<usize>,
    repliers_inspected: Option<usize>,
    max_candidates: Option<usize>,
    search_window: Option<TimeWindow>,
    inter_query_delay_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ActionsPatch {
    max_actions_per_run: Option<usize>,
    cooldown_secs: Option<u64>,
    context_char_budget: Option<usize>,
    link_policy: Option<String>,
    outbound_link: Option<String>,
    persona: Option<String>,
    prompt_template: Option<String>,
    dry_run: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{
        all_env_keys, AppConfig, ConfigError, ConfigOverrides, GenerationProvider, LoadOptions,
        LogFormat,
    };
    use crate::domain::content::{LinkPolicy, TimeWindow};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_all() {
        for key in all_env_keys() {
            env::remove_var(key);
        }
    }

    fn set_required_env() {
        env::set_var("REDDIT_CLIENT_ID", "client-id");
        env::set_var("REDDIT_CLIENT_SECRET", "client-secret-value");
        env::set_var("REDDIT_USERNAME", "restore_helper");
        env::set_var("REDDIT_PASSWORD", "hunter2-password");
        env::set_var("ZAI_API_KEY", "zai-secret-key");
        env::set_var("WEBSITE_URL", "https://restore.example/");
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_reference_safety_policy() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_all();
        set_required_env();

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.safety.max_posts_per_week == 3, "weekly cap defaults to 3")?;
            ensure(config.safety.min_hours_between_posts == 4.0, "spacing defaults to 4h")?;
            ensure(config.safety.max_promotional_ratio == 0.10, "ratio defaults to 0.10")?;
            ensure(config.safety.min_activity_sample == 10, "sample defaults to 10")?;
            ensure(config.discovery.max_candidates == 5, "candidate cap defaults to 5")?;
            ensure(config.discovery.search_window == TimeWindow::Week, "window is a week")?;
            ensure(config.actions.max_actions_per_run == 2, "action cap defaults to 2")?;
            ensure(config.actions.cooldown_secs == 60, "cooldown defaults to 60s")?;
            ensure(
                config.actions.link_policy == LinkPolicy::FollowUpOnly,
                "link policy defaults to FOLLOW_UP_ONLY",
            )?;
            ensure(!config.audit.is_configured(), "audit sink is off without supabase settings")?;
            Ok(())
        })();

        clear_all();
        result
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_all();

        env::set_var("TEST_REDDIT_SECRET", "secret-from-env");
        env::set_var("TEST_ZAI_KEY", "zai-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("safepost.toml");
            fs::write(
                &path,
                r#"
[reddit]
client_id = "file-client"
client_secret = "${TEST_REDDIT_SECRET}"
username = "restore_helper"
password = "file-password"

[llm]
api_key = "${TEST_ZAI_KEY}"

[discovery]
scopes = ["OldPhotos"]
queries = ["restore old photo"]
search_window = "month"

[actions]
outbound_link = "https://restore.example/"
link_policy = "ALWAYS"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.reddit.client_secret.expose_secret() == "secret-from-env",
                "client secret should be interpolated from environment",
            )?;
            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret().to_string())
                    == Some("zai-from-env".to_string()),
                "llm api key should be interpolated from environment",
            )?;
            ensure(config.discovery.scopes == vec!["OldPhotos"], "scopes come from the file")?;
            ensure(config.discovery.search_window == TimeWindow::Month, "window from file")?;
            ensure(config.actions.link_policy == LinkPolicy::Always, "policy from file")?;
            Ok(())
        })();

        env::remove_var("TEST_REDDIT_SECRET");
        env::remove_var("TEST_ZAI_KEY");
        result
    }

    #[test]
    fn legacy_env_names_are_accepted_as_aliases() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_all();
        set_required_env();
        env::set_var("LINK_POLICY", "NEVER");
        env::set_var("MAX_POSTS_PER_WEEK", "2");
        env::set_var("SUPABASE_URL", "https://audit.example");
        env::set_var("SUPABASE_SERVICE_KEY", "service-key");
        env::set_var("SAFEPOST_LOG_LEVEL", "warn");
        env::set_var("SAFEPOST_LOG_FORMAT", "pretty");
        env::set_var("SAFEPOST_TARGET_SCOPES", "OldPhotos, restoration ,");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.actions.link_policy == LinkPolicy::Never, "LINK_POLICY alias")?;
            ensure(config.safety.max_posts_per_week == 2, "MAX_POSTS_PER_WEEK alias")?;
            ensure(config.audit.is_configured(), "supabase aliases configure the sink")?;
            ensure(config.logging.level == "warn", "log level alias")?;
            ensure(matches!(config.logging.format, LogFormat::Pretty), "log format alias")?;
            ensure(
                config.discovery.scopes == vec!["OldPhotos", "restoration"],
                "comma lists are trimmed and empty entries dropped",
            )?;
            Ok(())
        })();

        clear_all();
        result
    }

    #[test]
    fn canonical_env_name_wins_over_alias() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_all();
        set_required_env();
        env::set_var("SAFEPOST_REDDIT_USERNAME", "canonical_user");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.reddit.username == "canonical_user", "canonical name should win")
        })();

        clear_all();
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_all();
        set_required_env();
        env::set_var("SAFEPOST_COOLDOWN_SECS", "90");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("safepost.toml");
            fs::write(
                &path,
                r#"
[actions]
cooldown_secs = 30
dry_run = false

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    dry_run: Some(true),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.actions.cooldown_secs == 90, "env should win over file")?;
            ensure(config.actions.dry_run, "override should win over file")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            Ok(())
        })();

        clear_all();
        result
    }

    #[test]
    fn missing_credentials_fail_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_all();

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message)
                    if message.contains("reddit.client_id") && message.contains("REDDIT_CLIENT_ID")
            );
            ensure(has_message, "validation failure should name reddit.client_id and its env vars")
        })();

        clear_all();
        result
    }

    #[test]
    fn template_provider_does_not_need_api_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_all();
        set_required_env();
        env::remove_var("ZAI_API_KEY");

        let result = (|| -> Result<(), String> {
            let missing_key = AppConfig::load(LoadOptions::default());
            ensure(
                matches!(missing_key, Err(ConfigError::Validation(ref message)) if message.contains("llm.api_key")),
                "openai_compatible provider requires an api key",
            )?;

            let config = AppConfig::load(LoadOptions {
                overrides: ConfigOverrides {
                    llm_provider: Some(GenerationProvider::Template),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.llm.provider == GenerationProvider::Template, "template provider")
        })();

        clear_all();
        result
    }

    #[test]
    fn out_of_range_ratio_and_bad_numbers_are_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_all();
        set_required_env();

        let result = (|| -> Result<(), String> {
            env::set_var("MAX_PROMOTIONAL_RATIO", "1.5");
            let ratio = AppConfig::load(LoadOptions::default());
            ensure(
                matches!(ratio, Err(ConfigError::Validation(ref message)) if message.contains("max_promotional_ratio")),
                "ratio above 1.0 is rejected",
            )?;

            env::set_var("MAX_PROMOTIONAL_RATIO", "ten percent");
            let parse = AppConfig::load(LoadOptions::default());
            ensure(
                matches!(parse, Err(ConfigError::InvalidEnvOverride { ref key, .. }) if key == "MAX_PROMOTIONAL_RATIO"),
                "unparseable number names the variable that was set",
            )
        })();

        clear_all();
        result
    }

    #[test]
    fn zero_replier_depth_and_oversized_fetch_limit_are_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_all();
        set_required_env();

        let result = (|| -> Result<(), String> {
            env::set_var("SAFEPOST_REPLIERS_INSPECTED", "0");
            let repliers = AppConfig::load(LoadOptions::default());
            ensure(
                matches!(repliers, Err(ConfigError::Validation(ref message)) if message.contains("discovery.repliers_inspected")),
                "zero repliers inspected would disable the already-replied check",
            )?;
            env::remove_var("SAFEPOST_REPLIERS_INSPECTED");

            env::set_var("SAFEPOST_ACTIVITY_FETCH_LIMIT", "101");
            let oversized = AppConfig::load(LoadOptions::default());
            ensure(
                matches!(oversized, Err(ConfigError::Validation(ref message)) if message.contains("safety.activity_fetch_limit")),
                "fetch limit above the listing maximum is rejected",
            )?;

            env::set_var("SAFEPOST_ACTIVITY_FETCH_LIMIT", "100");
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(config.safety.activity_fetch_limit == 100, "listing maximum is accepted")
        })();

        clear_all();
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_all();
        set_required_env();

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("client-secret-value"), "debug output hides client secret")?;
            ensure(!debug.contains("hunter2-password"), "debug output hides password")?;
            ensure(!debug.contains("zai-secret-key"), "debug output hides llm api key")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_all();
        result
    }
}
