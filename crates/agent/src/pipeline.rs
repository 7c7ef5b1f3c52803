use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use safepost_core::config::AppConfig;
use safepost_core::{
    AuditCategory, AuditContext, AuditOutcome, AuditSink, ContentItem, Identity, LinkPolicy,
    PlatformClient, PlatformError, PostedItem,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::discovery::{DiscoveryPlan, TargetDiscovery};
use crate::guardrails::{ActivityRatioGuard, DenyReason, GuardDecision, RateLimitGuard};
use crate::llm::TextGenerator;
use crate::synthesizer::{ContentSynthesizer, SynthesisContext, SynthesisSettings};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Authenticating,
    CheckingRatio,
    CheckingRate,
    Discovering,
    Acting,
    Done,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authenticating => "authenticating",
            Self::CheckingRatio => "checking_ratio",
            Self::CheckingRate => "checking_rate",
            Self::Discovering => "discovering",
            Self::Acting => "acting",
            Self::Done => "done",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum HaltReason {
    RatioViolation(DenyReason),
    RateViolation(DenyReason),
    NoTargets,
}

impl HaltReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::RatioViolation(_) => "ratio_violation",
            Self::RateViolation(_) => "rate_violation",
            Self::NoTargets => "no_targets",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::RatioViolation(reason) | Self::RateViolation(reason) => {
                format!("{} ({})", reason.reason_code(), reason.describe())
            }
            Self::NoTargets => "no eligible targets found".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub run_id: String,
    pub candidates_found: usize,
    pub actions_attempted: usize,
    pub actions_committed: usize,
    pub link_policy: LinkPolicy,
    pub dry_run: bool,
    pub posted: Vec<PostedItem>,
}

/// Both variants are successful runs. Halting is the intended outcome when a
/// guard denies or there is nothing to act on.
#[derive(Clone, Debug, PartialEq)]
pub enum RunOutcome {
    Done(RunSummary),
    Halted { run_id: String, reason: HaltReason },
}

impl RunOutcome {
    pub fn run_id(&self) -> &str {
        match self {
            Self::Done(summary) => &summary.run_id,
            Self::Halted { run_id, .. } => run_id,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("authentication failed: {0}")]
    Authentication(#[source] PlatformError),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineSettings {
    pub max_actions_per_run: usize,
    pub cooldown: Duration,
    pub activity_fetch_limit: usize,
    pub dry_run: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_actions_per_run: config.actions.max_actions_per_run,
            cooldown: config.actions.cooldown(),
            activity_fetch_limit: config.safety.activity_fetch_limit,
            dry_run: config.actions.dry_run,
        }
    }
}

pub struct ActionPipeline {
    platform: Arc<dyn PlatformClient>,
    audit: Arc<dyn AuditSink>,
    ratio_guard: ActivityRatioGuard,
    rate_guard: RateLimitGuard,
    discovery: TargetDiscovery,
    synthesizer: ContentSynthesizer,
    settings: PipelineSettings,
}

impl ActionPipeline {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        audit: Arc<dyn AuditSink>,
        ratio_guard: ActivityRatioGuard,
        rate_guard: RateLimitGuard,
        discovery: TargetDiscovery,
        synthesizer: ContentSynthesizer,
        settings: PipelineSettings,
    ) -> Self {
        Self { platform, audit, ratio_guard, rate_guard, discovery, synthesizer, settings }
    }

    pub fn from_config(
        config: &AppConfig,
        platform: Arc<dyn PlatformClient>,
        generator: Arc<dyn TextGenerator>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self::new(
            platform,
            audit,
            ActivityRatioGuard::from_config(&config.safety, &config.actions),
            RateLimitGuard::from_config(&config.safety),
            TargetDiscovery::new(DiscoveryPlan::from_config(&config.discovery)),
            ContentSynthesizer::new(
                generator,
                SynthesisSettings::from_config(&config.llm, &config.actions),
            ),
            PipelineSettings::from_config(config),
        )
    }

    pub async fn run(&self) -> Result<RunOutcome, PipelineError> {
        self.run_at(Utc::now()).await
    }

    /// Runs the pipeline with guard decisions evaluated against `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunOutcome, PipelineError> {
        let context = AuditContext::fresh(self.platform.platform_name());
        info!(
            event_name = "safepost.pipeline.started",
            run_id = %context.run_id,
            platform = %context.platform,
            dry_run = self.settings.dry_run,
            "automation run started"
        );

        self.enter(&context, PipelineStage::Authenticating);
        let identity = match self.platform.authenticate().await {
            Ok(identity) => identity,
            Err(error) => {
                warn!(
                    event_name = "safepost.pipeline.authentication_failed",
                    run_id = %context.run_id,
                    error = %error,
                    "platform authentication failed"
                );
                self.audit
                    .record(
                        context
                            .event("automation_error", AuditCategory::Run, AuditOutcome::Failed)
                            .with_detail("stage", PipelineStage::Authenticating.as_str())
                            .with_detail("error", error.to_string()),
                    )
                    .await;
                return Err(PipelineError::Authentication(error));
            }
        };

        self.enter(&context, PipelineStage::CheckingRatio);
        if let Some(reason) = self.check_ratio(&context, &identity).await {
            return Ok(self.halt(context, HaltReason::RatioViolation(reason)));
        }

        self.enter(&context, PipelineStage::CheckingRate);
        if let Some(reason) = self.check_rate(&context, &identity, now).await {
            return Ok(self.halt(context, HaltReason::RateViolation(reason)));
        }

        self.enter(&context, PipelineStage::Discovering);
        let candidates = self
            .discovery
            .discover(self.platform.as_ref(), self.audit.as_ref(), &context, |item| {
                item.replied_by(&identity)
            })
            .await;
        if candidates.is_empty() {
            self.audit
                .record(
                    context
                        .event("no_targets_skip", AuditCategory::Discovery, AuditOutcome::Skipped)
                        .with_detail(
                            "queries_searched",
                            self.discovery.plan().queries.len().min(self.discovery.plan().max_queries),
                        ),
                )
                .await;
            return Ok(self.halt(context, HaltReason::NoTargets));
        }

        self.enter(&context, PipelineStage::Acting);
        let summary = self.act(&context, &identity, &candidates).await;

        self.enter(&context, PipelineStage::Done);
        self.audit
            .record(
                context
                    .event("automation_run_complete", AuditCategory::Run, AuditOutcome::Success)
                    .with_detail("comments_posted", summary.actions_committed)
                    .with_detail("actions_attempted", summary.actions_attempted)
                    .with_detail("threads_found", summary.candidates_found)
                    .with_detail("policy", summary.link_policy.as_str())
                    .with_detail("dry_run", summary.dry_run)
                    .with_detail("safety_checks_passed", true),
            )
            .await;
        info!(
            event_name = "safepost.pipeline.completed",
            run_id = %summary.run_id,
            candidates = summary.candidates_found,
            committed = summary.actions_committed,
            "automation run complete"
        );

        Ok(RunOutcome::Done(summary))
    }

    async fn check_ratio(&self, context: &AuditContext, identity: &Identity) -> Option<DenyReason> {
        let fetched = self
            .platform
            .fetch_recent_activity(identity, self.settings.activity_fetch_limit)
            .await;
        let (decision, measured) = match fetched {
            Ok(activity) => {
                (self.ratio_guard.evaluate(&activity), Some(self.ratio_guard.measure(&activity)))
            }
            Err(error) => (GuardDecision::fail_closed(&error), None),
        };

        let (action, outcome) = match &decision {
            GuardDecision::Allow => ("ninety_ten_check", AuditOutcome::Success),
            GuardDecision::Deny(_) => ("ninety_ten_skip", AuditOutcome::Skipped),
        };
        let mut event = context.event(action, AuditCategory::Guard, outcome);
        if let Some(measured) = measured {
            event = event
                .with_detail("total_items", measured.total)
                .with_detail("promotional_items", measured.promotional)
                .with_detail("ratio_percent", measured.percent());
        }
        if let GuardDecision::Deny(reason) = &decision {
            event = event
                .with_detail("reason_code", reason.reason_code())
                .with_detail("reason", reason.describe());
        }
        self.audit.record(event).await;

        self.log_decision(context, "ratio", &decision);
        match decision {
            GuardDecision::Allow => None,
            GuardDecision::Deny(reason) => Some(reason),
        }
    }

    async fn check_rate(
        &self,
        context: &AuditContext,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Option<DenyReason> {
        let fetched = self
            .platform
            .fetch_recent_activity(identity, self.settings.activity_fetch_limit)
            .await;
        let (decision, window) = match fetched {
            Ok(activity) => (
                self.rate_guard.evaluate(&activity, now),
                Some(self.rate_guard.window(&activity, now)),
            ),
            Err(error) => (GuardDecision::fail_closed(&error), None),
        };

        let (action, outcome) = match &decision {
            GuardDecision::Allow => ("rate_limit_check", AuditOutcome::Success),
            GuardDecision::Deny(_) => ("rate_limit_skip", AuditOutcome::Skipped),
        };
        let mut event = context.event(action, AuditCategory::Guard, outcome);
        if let Some(window) = window {
            event = event
                .with_detail("posts_in_window", window.posts_in_window)
                .with_detail("hours_since_last", window.hours_since_last);
        }
        if let GuardDecision::Deny(reason) = &decision {
            event = event
                .with_detail("reason_code", reason.reason_code())
                .with_detail("reason", reason.describe());
        }
        self.audit.record(event).await;

        self.log_decision(context, "rate", &decision);
        match decision {
            GuardDecision::Allow => None,
            GuardDecision::Deny(reason) => Some(reason),
        }
    }

    async fn act(
        &self,
        context: &AuditContext,
        identity: &Identity,
        candidates: &[ContentItem],
    ) -> RunSummary {
        let link_policy = self.synthesizer.settings().link_policy;
        let slots = candidates.len().min(self.settings.max_actions_per_run);
        let mut summary = RunSummary {
            run_id: context.run_id.clone(),
            candidates_found: candidates.len(),
            actions_attempted: 0,
            actions_committed: 0,
            link_policy,
            dry_run: self.settings.dry_run,
            posted: Vec::new(),
        };

        for (slot, candidate) in candidates.iter().take(slots).enumerate() {
            summary.actions_attempted += 1;

            let generated = match self
                .synthesizer
                .synthesize(SynthesisContext::from(candidate), identity, self.audit.as_ref(), context)
                .await
            {
                Ok(generated) => generated,
                Err(_) => continue,
            };

            if self.settings.dry_run {
                info!(
                    event_name = "safepost.pipeline.dry_run",
                    item_id = %candidate.id,
                    scope = %candidate.scope,
                    length = generated.length,
                    "dry run, reply not submitted"
                );
                self.audit
                    .record(
                        context
                            .event(
                                "reddit_comment_dry_run",
                                AuditCategory::Commit,
                                AuditOutcome::Skipped,
                            )
                            .with_detail("subreddit", candidate.scope.as_str())
                            .with_detail("thread_title", candidate.title.as_str())
                            .with_detail("thread_url", candidate.url.as_str())
                            .with_detail("text", generated.text.as_str()),
                    )
                    .await;
                summary.actions_committed += 1;
                continue;
            }

            match self.platform.post_reply(candidate, &generated.text).await {
                Ok(posted) => {
                    info!(
                        event_name = "safepost.pipeline.committed",
                        item_id = %candidate.id,
                        scope = %candidate.scope,
                        permalink = %posted.permalink,
                        "reply posted"
                    );
                    self.audit
                        .record(
                            context
                                .event("reddit_comment", AuditCategory::Commit, AuditOutcome::Success)
                                .with_detail("subreddit", candidate.scope.as_str())
                                .with_detail("thread_title", candidate.title.as_str())
                                .with_detail("comment_url", posted.permalink.as_str())
                                .with_detail("policy", link_policy.as_str())
                                .with_detail("value_first", !link_policy.appends_link()),
                        )
                        .await;
                    summary.actions_committed += 1;
                    summary.posted.push(posted);

                    if slot + 1 < slots && !self.settings.cooldown.is_zero() {
                        info!(
                            event_name = "safepost.pipeline.cooldown",
                            seconds = self.settings.cooldown.as_secs(),
                            "waiting before next action"
                        );
                        tokio::time::sleep(self.settings.cooldown).await;
                    }
                }
                Err(error) => {
                    warn!(
                        event_name = "safepost.pipeline.commit_failed",
                        item_id = %candidate.id,
                        error = %error,
                        "reply submission failed, skipping target"
                    );
                    self.audit
                        .record(
                            context
                                .event(
                                    "reddit_comment_error",
                                    AuditCategory::Commit,
                                    AuditOutcome::Failed,
                                )
                                .with_detail("subreddit", candidate.scope.as_str())
                                .with_detail("thread_title", candidate.title.as_str())
                                .with_detail("error", error.to_string()),
                        )
                        .await;
                }
            }
        }

        summary
    }

    fn enter(&self, context: &AuditContext, stage: PipelineStage) {
        debug!(
            event_name = "safepost.pipeline.stage",
            run_id = %context.run_id,
            stage = stage.as_str(),
            "entering stage"
        );
    }

    fn log_decision(&self, context: &AuditContext, guard: &'static str, decision: &GuardDecision) {
        match decision {
            GuardDecision::Allow => info!(
                event_name = "safepost.pipeline.guard_allowed",
                run_id = %context.run_id,
                guard,
                "safety check passed"
            ),
            GuardDecision::Deny(reason) => warn!(
                event_name = "safepost.pipeline.guard_denied",
                run_id = %context.run_id,
                guard,
                reason_code = reason.reason_code(),
                reason = %reason.describe(),
                "safety check denied, halting run"
            ),
        }
    }

    fn halt(&self, context: AuditContext, reason: HaltReason) -> RunOutcome {
        info!(
            event_name = "safepost.pipeline.halted",
            run_id = %context.run_id,
            reason = reason.code(),
            detail = %reason.describe(),
            "automation run halted"
        );
        RunOutcome::Halted { run_id: context.run_id, reason }
    }
}
