use std::sync::Arc;

use safepost_core::config::{ActionConfig, LlmConfig};
use safepost_core::{
    AuditCategory, AuditContext, AuditOutcome, AuditSink, ContentItem, GeneratedText, Identity,
    LinkPolicy,
};
use tera::{Context, Tera};
use thiserror::Error;
use tracing::{info, warn};

use crate::llm::{GenerationError, GenerationRequest, TextGenerator};

pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
Write a reply to this r/{{ scope }} thread as u/{{ identity }}.

Title: {{ title }}
Post: {{ body }}

Give genuinely useful, specific advice in two to four sentences. \
Do not include links, product names or any self-promotion.";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("prompt template could not be rendered: {0}")]
    Prompt(String),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("generated text was empty")]
    Empty,
    #[error("generated text contains the outbound link under link policy {policy}")]
    LinkPolicyViolation { policy: &'static str },
}

#[derive(Clone, Debug, PartialEq)]
pub struct SynthesisSettings {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub context_char_budget: usize,
    pub link_policy: LinkPolicy,
    pub outbound_link: String,
    pub persona: String,
    pub prompt_template: String,
}

impl SynthesisSettings {
    pub fn from_config(llm: &LlmConfig, actions: &ActionConfig) -> Self {
        Self {
            model: llm.model.clone(),
            temperature: llm.temperature,
            max_output_tokens: llm.max_output_tokens,
            context_char_budget: actions.context_char_budget,
            link_policy: actions.link_policy,
            outbound_link: actions.outbound_link.clone(),
            persona: actions.persona.clone(),
            prompt_template: actions
                .prompt_template
                .clone()
                .unwrap_or_else(|| DEFAULT_PROMPT_TEMPLATE.to_string()),
        }
    }

    fn footer(&self) -> String {
        format!("If you want to try an AI-powered approach: {}", self.outbound_link)
    }
}

/// The part of a target the generator gets to see.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SynthesisContext<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub scope: &'a str,
}

impl<'a> From<&'a ContentItem> for SynthesisContext<'a> {
    fn from(item: &'a ContentItem) -> Self {
        Self { title: &item.title, body: &item.body, scope: &item.scope }
    }
}

pub struct ContentSynthesizer {
    generator: Arc<dyn TextGenerator>,
    settings: SynthesisSettings,
}

impl ContentSynthesizer {
    pub fn new(generator: Arc<dyn TextGenerator>, settings: SynthesisSettings) -> Self {
        Self { generator, settings }
    }

    pub fn settings(&self) -> &SynthesisSettings {
        &self.settings
    }

    pub fn build_request(
        &self,
        context: SynthesisContext<'_>,
        identity: &Identity,
    ) -> Result<GenerationRequest, SynthesisError> {
        let mut values = Context::new();
        values.insert("persona", &self.settings.persona);
        values.insert("identity", identity.as_str());
        values.insert("scope", context.scope);
        values.insert("title", context.title);
        values.insert("body", truncate_chars(context.body, self.settings.context_char_budget));

        let user_prompt = Tera::one_off(&self.settings.prompt_template, &values, false)
            .map_err(|error| SynthesisError::Prompt(error.to_string()))?;

        Ok(GenerationRequest {
            model: self.settings.model.clone(),
            system_prompt: format!(
                "You are {}. You answer people's questions with practical, honest advice.",
                self.settings.persona
            ),
            user_prompt,
            temperature: self.settings.temperature,
            max_output_tokens: self.settings.max_output_tokens,
            subject: context.title.to_string(),
        })
    }

    /// One generation attempt, normalized and checked against the link
    /// policy. Both outcomes are audited here.
    pub async fn synthesize(
        &self,
        context: SynthesisContext<'_>,
        identity: &Identity,
        audit: &dyn AuditSink,
        audit_context: &AuditContext,
    ) -> Result<GeneratedText, SynthesisError> {
        let result = match self.build_request(context, identity) {
            Ok(request) => match self.generator.generate(&request).await {
                Ok(generated) => self.finalize(generated),
                Err(error) => Err(SynthesisError::from(error)),
            },
            Err(error) => Err(error),
        };

        match &result {
            Ok(generated) => {
                info!(
                    event_name = "safepost.pipeline.synthesized",
                    scope = %context.scope,
                    model = %generated.model,
                    length = generated.length,
                    tokens_used = generated.token_cost,
                    "reply generated"
                );
                audit
                    .record(
                        audit_context
                            .event(
                                "ai_comment_generated",
                                AuditCategory::Synthesis,
                                AuditOutcome::Success,
                            )
                            .with_detail("model", generated.model.as_str())
                            .with_detail("subreddit", context.scope)
                            .with_detail("length", generated.length)
                            .with_detail("tokens_used", generated.token_cost),
                    )
                    .await;
            }
            Err(error) => {
                warn!(
                    event_name = "safepost.pipeline.synthesis_failed",
                    scope = %context.scope,
                    error = %error,
                    "reply generation failed, skipping target"
                );
                audit
                    .record(
                        audit_context
                            .event("ai_comment_error", AuditCategory::Synthesis, AuditOutcome::Failed)
                            .with_detail("subreddit", context.scope)
                            .with_detail("error", error.to_string()),
                    )
                    .await;
            }
        }

        result
    }

    fn finalize(&self, generated: GeneratedText) -> Result<GeneratedText, SynthesisError> {
        let text = generated.text.trim();
        if text.is_empty() {
            return Err(SynthesisError::Empty);
        }

        let link = self.settings.outbound_link.as_str();
        let has_link = !link.is_empty() && text.contains(link);

        let text = match self.settings.link_policy {
            LinkPolicy::Always if has_link => text.to_string(),
            LinkPolicy::Always => format!("{text}\n\n{}", self.settings.footer()),
            policy if has_link => {
                return Err(SynthesisError::LinkPolicyViolation { policy: policy.as_str() })
            }
            _ => text.to_string(),
        };

        Ok(GeneratedText::new(text, generated.token_cost, generated.model))
    }
}

/// Longest prefix of at most `budget` characters.
pub fn truncate_chars(value: &str, budget: usize) -> &str {
    match value.char_indices().nth(budget) {
        Some((index, _)) => &value[..index],
        None => value,
    }
}
