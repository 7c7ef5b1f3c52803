//! Safety-gated action pipeline.
//!
//! A run moves through fixed stages:
//! 1. **Guards** (`guardrails`): promotional ratio, then posting rate. Either
//!    denial halts the run before anything is searched.
//! 2. **Discovery** (`discovery`): bounded search over query terms and target
//!    scopes, excluding threads the account already replied to.
//! 3. **Synthesis** (`synthesizer`): one generation call per target through a
//!    [`llm::TextGenerator`], checked against the link policy.
//! 4. **Commit** (`pipeline`): at most a fixed number of replies per run with
//!    a cooldown between them.
//!
//! Every decision point emits an audit event. Generation never decides
//! whether to act; the guards and caps do.

pub mod discovery;
pub mod guardrails;
pub mod llm;
pub mod pipeline;
pub mod synthesizer;
pub mod templates;

pub use discovery::{DiscoveryPlan, TargetDiscovery};
pub use guardrails::{ActivityRatioGuard, DenyReason, GuardDecision, RateLimitGuard};
pub use llm::{ChatCompletionsClient, GenerationError, GenerationRequest, TextGenerator};
pub use pipeline::{
    ActionPipeline, HaltReason, PipelineError, PipelineSettings, PipelineStage, RunOutcome,
    RunSummary,
};
pub use synthesizer::{ContentSynthesizer, SynthesisContext, SynthesisError, SynthesisSettings};
pub use templates::TemplateGenerator;
