//! Core types for the LLM gateway.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// =============================================================================
// ATTRIBUTION
// =============================================================================

/// Attribution for usage tracking and debugging.
///
/// Every request carries the host space and the personality it speaks for.
#[derive(Debug, Clone, Default)]
pub struct Attribution {
    pub space_id: String,
    pub personality_id: String,
    /// Which code path made this call, e.g. "retry::explain_personality".
    pub caller: &'static str,
}

impl Attribution {
    pub fn new(caller: &'static str) -> Self {
        Self {
            caller,
            ..Default::default()
        }
    }

    pub fn with_space(mut self, space_id: impl Into<String>) -> Self {
        self.space_id = space_id.into();
        self
    }

    pub fn with_personality(mut self, personality_id: impl Into<String>) -> Self {
        self.personality_id = personality_id.into();
        self
    }
}

// =============================================================================
// HOST-FACING TYPES
// =============================================================================

/// Result of `generateText` as the host exposes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmReply {
    pub message: String,
}

impl LlmReply {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Which model answers for which personality.
#[derive(Debug, Clone)]
pub struct ModelRouting {
    pub default_model: String,
    pub overrides: HashMap<String, String>,
}

impl Default for ModelRouting {
    fn default() -> Self {
        Self {
            default_model: "openai/gpt-4o-mini".to_string(),
            overrides: HashMap::new(),
        }
    }
}

impl ModelRouting {
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            default_model: default_model.into(),
            overrides: HashMap::new(),
        }
    }

    /// Read `BIAS_EXPLAINER_MODEL`, falling back to the built-in default.
    pub fn from_env() -> Self {
        match std::env::var("BIAS_EXPLAINER_MODEL") {
            Ok(model) if !model.trim().is_empty() => Self::new(model.trim()),
            _ => Self::default(),
        }
    }

    pub fn with_override(
        mut self,
        personality_id: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        self.overrides.insert(personality_id.into(), model.into());
        self
    }

    pub fn model_for(&self, personality_id: &str) -> &str {
        self.overrides
            .get(personality_id)
            .map(String::as_str)
            .unwrap_or(&self.default_model)
    }
}

// =============================================================================
// CHAT TYPES
// =============================================================================

/// Chat message role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Request for chat completion.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// OpenRouter model id, e.g. "anthropic/claude-3-5-haiku".
    pub model: String,
    pub messages: Vec<Message>,
    /// Sampling temperature (0.0 - 2.0).
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub attribution: Attribution,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>, attribution: Attribution) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: 0.7,
            max_tokens: None,
            attribution,
        }
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Unknown(String),
}

impl From<Option<String>> for FinishReason {
    fn from(s: Option<String>) -> Self {
        match s.as_deref() {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            Some(other) => FinishReason::Unknown(other.to_string()),
            None => FinishReason::Unknown("none".to_string()),
        }
    }
}

/// Response from chat completion.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub latency: Duration,
    pub finish_reason: FinishReason,
}

impl ChatResponse {
    pub(crate) fn empty() -> Self {
        Self {
            content: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            latency: Duration::from_millis(0),
            finish_reason: FinishReason::Unknown("error".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_prefers_override() {
        let routing = ModelRouting::new("openai/gpt-4o-mini")
            .with_override("p-skeptic", "anthropic/claude-3-5-haiku");
        assert_eq!(routing.model_for("p-skeptic"), "anthropic/claude-3-5-haiku");
        assert_eq!(routing.model_for("p-other"), "openai/gpt-4o-mini");
    }

    #[test]
    fn finish_reason_mapping() {
        assert_eq!(FinishReason::from(Some("length".into())), FinishReason::Length);
        assert_eq!(
            FinishReason::from(None),
            FinishReason::Unknown("none".into())
        );
    }
}
