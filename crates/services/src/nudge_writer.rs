use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::NudgeTextError;

/// What a nudge writer knows about the resource being nudged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NudgeContext {
    pub title: String,
    pub days_inactive: i64,
    pub key_insights: Vec<String>,
    pub learning_path: Option<String>,
}

impl NudgeContext {
    /// One line explaining why the learner picked the resource up, if known.
    #[must_use]
    pub fn motivation(&self) -> Option<String> {
        if !self.key_insights.is_empty() {
            let first: Vec<&str> = self.key_insights.iter().take(2).map(String::as_str).collect();
            return Some(format!(
                "Original insights that interested them: {}",
                first.join(", ")
            ));
        }
        self.learning_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(|p| format!("Part of their {p} learning journey"))
    }
}

/// Produces the text of an abandonment nudge.
#[async_trait]
pub trait NudgeWriter: Send + Sync {
    /// Returns `Ok(None)` when no message could be produced.
    ///
    /// # Errors
    ///
    /// Returns `NudgeTextError` when the generator fails.
    async fn generate_nudge(&self, ctx: &NudgeContext) -> Result<Option<String>, NudgeTextError>;
}

//
// ─── TEMPLATE ──────────────────────────────────────────────────────────────────
//

/// Deterministic writer used when no model is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateNudgeWriter;

impl TemplateNudgeWriter {
    #[must_use]
    pub fn render(ctx: &NudgeContext) -> String {
        format!(
            "It's been {} days since you last reviewed \"{}\". Ready to pick up where you left off? Just 5 minutes to refresh your memory.",
            ctx.days_inactive, ctx.title
        )
    }
}

#[async_trait]
impl NudgeWriter for TemplateNudgeWriter {
    async fn generate_nudge(&self, ctx: &NudgeContext) -> Result<Option<String>, NudgeTextError> {
        Ok(Some(Self::render(ctx)))
    }
}

//
// ─── CHAT COMPLETIONS ──────────────────────────────────────────────────────────
//

const SYSTEM_PROMPT: &str = "You are a supportive learning coach. \
Write a brief, personal nudge to re-engage someone with a resource they have drifted away from. \
Reference why they started, acknowledge the gap without guilt, \
suggest one small action to restart, and keep it to two or three sentences.";

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl LlmConfig {
    /// Read `COACH_AI_API_KEY`, `COACH_AI_BASE_URL` and `COACH_AI_MODEL`.
    ///
    /// Returns `None` when no API key is set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("COACH_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url =
            env::var("COACH_AI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let model = env::var("COACH_AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

/// Nudge writer backed by an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct LlmNudgeWriter {
    client: Client,
    config: Option<LlmConfig>,
}

impl LlmNudgeWriter {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(LlmConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<LlmConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    fn user_message(ctx: &NudgeContext) -> String {
        let mut msg = format!(
            "Generate a nudge for this abandoned resource:\n\nResource: \"{}\"\nDays inactive: {}\n",
            ctx.title, ctx.days_inactive
        );
        if let Some(motivation) = ctx.motivation() {
            msg.push_str(&motivation);
            msg.push('\n');
        }
        msg.push_str("\nCreate a motivational message to help them restart.");
        msg
    }
}

#[async_trait]
impl NudgeWriter for LlmNudgeWriter {
    async fn generate_nudge(&self, ctx: &NudgeContext) -> Result<Option<String>, NudgeTextError> {
        let config = self.config.as_ref().ok_or(NudgeTextError::Disabled)?;

        let url = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );
        let payload = ChatRequest {
            model: config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::user_message(ctx),
                },
            ],
            temperature: 0.9,
            max_tokens: 256,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NudgeTextError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        if content.is_none() {
            debug!(title = %ctx.title, "model returned an empty nudge");
        }
        Ok(content)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> NudgeContext {
        NudgeContext {
            title: "Rust Book".into(),
            days_inactive: 12,
            key_insights: vec!["ownership".into(), "lifetimes".into(), "traits".into()],
            learning_path: Some("Systems".into()),
        }
    }

    #[tokio::test]
    async fn template_mentions_days_and_title() {
        let msg = TemplateNudgeWriter.generate_nudge(&ctx()).await.unwrap().unwrap();
        assert!(msg.starts_with("It's been 12 days since you last reviewed \"Rust Book\""));
    }

    #[test]
    fn motivation_prefers_insights_over_path() {
        let with_insights = ctx();
        assert_eq!(
            with_insights.motivation().as_deref(),
            Some("Original insights that interested them: ownership, lifetimes")
        );

        let path_only = NudgeContext {
            key_insights: Vec::new(),
            ..ctx()
        };
        assert_eq!(
            path_only.motivation().as_deref(),
            Some("Part of their Systems learning journey")
        );

        let bare = NudgeContext {
            key_insights: Vec::new(),
            learning_path: None,
            ..ctx()
        };
        assert!(bare.motivation().is_none());
    }

    #[tokio::test]
    async fn unconfigured_llm_writer_is_disabled() {
        let writer = LlmNudgeWriter::new(None);
        assert!(!writer.enabled());
        let err = writer.generate_nudge(&ctx()).await.unwrap_err();
        assert!(matches!(err, NudgeTextError::Disabled));
    }

    #[test]
    fn user_message_includes_motivation() {
        let msg = LlmNudgeWriter::user_message(&ctx());
        assert!(msg.contains("Resource: \"Rust Book\""));
        assert!(msg.contains("Days inactive: 12"));
        assert!(msg.contains("ownership, lifetimes"));
    }
}
