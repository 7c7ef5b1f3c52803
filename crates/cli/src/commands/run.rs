use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use safepost_agent::{
    ActionPipeline, ChatCompletionsClient, PipelineError, RunOutcome, TemplateGenerator,
    TextGenerator,
};
use safepost_core::audit::LogOnlyAuditSink;
use safepost_core::config::{AppConfig, ConfigOverrides, GenerationProvider, LoadOptions};
use safepost_core::{ApplicationError, AuditSink, PlatformClient};
use safepost_reddit::RedditClient;
use tracing::info;

use crate::audit_sink::SupabaseAuditSink;
use crate::commands::CommandResult;
use crate::logging::init_logging;

const COMMAND: &str = "run";

#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    pub config_path: Option<PathBuf>,
    pub dry_run: bool,
    pub template: bool,
}

pub fn run(options: RunOptions) -> CommandResult {
    let overrides = ConfigOverrides {
        dry_run: options.dry_run.then_some(true),
        llm_provider: options.template.then_some(GenerationProvider::Template),
        ..ConfigOverrides::default()
    };
    let config = match AppConfig::load(LoadOptions {
        config_path: options.config_path,
        require_file: false,
        overrides,
    }) {
        Ok(config) => config,
        Err(error) => return CommandResult::from_error(COMMAND, &ApplicationError::from(error)),
    };
    init_logging(&config);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            let error = ApplicationError::Runtime(format!("failed to start async runtime: {error}"));
            return CommandResult::from_error(COMMAND, &error);
        }
    };

    runtime.block_on(execute(&config))
}

pub async fn execute(config: &AppConfig) -> CommandResult {
    let pipeline = match build_pipeline(config) {
        Ok(pipeline) => pipeline,
        Err(error) => {
            let error = ApplicationError::Runtime(format!("{error:#}"));
            return CommandResult::from_error(COMMAND, &error);
        }
    };

    match pipeline.run().await {
        Ok(RunOutcome::Done(summary)) => {
            let verb = if summary.dry_run { "drafted" } else { "posted" };
            CommandResult::completed(
                COMMAND,
                Some(summary.run_id.as_str()),
                format!(
                    "run complete: {} of {} candidates {verb} (link policy {})",
                    summary.actions_committed,
                    summary.candidates_found,
                    summary.link_policy.as_str()
                ),
            )
        }
        Ok(RunOutcome::Halted { run_id, reason }) => CommandResult::completed(
            COMMAND,
            Some(run_id.as_str()),
            format!("run halted: {}", reason.describe()),
        ),
        Err(PipelineError::Authentication(error)) => {
            CommandResult::from_error(COMMAND, &ApplicationError::Authentication(error))
        }
    }
}

fn build_pipeline(config: &AppConfig) -> Result<ActionPipeline> {
    let platform: Arc<dyn PlatformClient> =
        Arc::new(RedditClient::from_config(&config.reddit).context("failed to build reddit client")?);

    let generator: Arc<dyn TextGenerator> = match config.llm.provider {
        GenerationProvider::OpenAiCompatible => Arc::new(
            ChatCompletionsClient::from_config(&config.llm)
                .context("failed to build completion client")?,
        ),
        GenerationProvider::Template => Arc::new(TemplateGenerator),
    };

    let audit: Arc<dyn AuditSink> = match SupabaseAuditSink::from_config(&config.audit)? {
        Some(sink) => Arc::new(sink),
        None => {
            info!(
                event_name = "safepost.audit.log_only",
                "audit sink not configured, events go to the log only"
            );
            Arc::new(LogOnlyAuditSink)
        }
    };

    Ok(ActionPipeline::from_config(config, platform, generator, audit))
}
