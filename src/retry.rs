//! Bounded retry loop around one personality's scoring call.
//!
//! Each attempt races the model call against a timeout, then decodes and
//! validates the reply. A failed attempt appends its error to the prompt and
//! waits a fixed backoff before the next one. The last error is returned
//! once the attempt budget is spent.

use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::gateway::{LlmClient, ProviderError};
use crate::hooks::{notify, ProgressEvent, ProgressObserver};
use crate::prompts::ExplanationPrompt;
use crate::types::{Personality, PersonalityExplanation};
use crate::validation::{ResponseValidator, ValidationError};

// =============================================================================
// Policy
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Applied to each model call independently.
    pub request_timeout: Duration,
    /// Fixed delay between a failed attempt and the next one.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            request_timeout: Duration::from_secs(90),
            backoff: Duration::from_secs(2),
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Why one attempt failed. Display text is echoed into the next prompt.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("LLM request timed out")]
    Timeout(Duration),
    #[error("{0}")]
    Provider(#[from] ProviderError),
}

impl AttemptError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.kind().code(),
            Self::Timeout(_) => "TIMEOUT",
            Self::Provider(e) => e.code(),
        }
    }
}

/// A validated explanation and the attempt that produced it (1-based).
#[derive(Debug, Clone)]
pub struct ExplanationOutcome {
    pub explanation: PersonalityExplanation,
    pub attempts: u32,
}

// =============================================================================
// Loop
// =============================================================================

/// Ask the model for one personality's scores until a reply validates.
pub async fn explain_personality(
    llm: &dyn LlmClient,
    space_id: &str,
    personality: &Personality,
    mut prompt: ExplanationPrompt,
    validator: &ResponseValidator,
    policy: &RetryPolicy,
    observer: &dyn ProgressObserver,
) -> Result<ExplanationOutcome, AttemptError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        info!(
            personality = %personality.name,
            attempt,
            max_attempts,
            "Generating explanations"
        );
        notify(
            observer,
            ProgressEvent::AttemptStarted {
                personality: personality.name.clone(),
                attempt,
                max_attempts,
            },
        )
        .await;

        let result = attempt_once(llm, space_id, personality, &prompt, validator, policy).await;
        let err = match result {
            Ok(explanation) => {
                log_word_counts(&explanation, &prompt);
                return Ok(ExplanationOutcome {
                    explanation,
                    attempts: attempt,
                });
            }
            Err(err) => err,
        };

        warn!(
            personality = %personality.name,
            attempt,
            code = err.code(),
            error = %err,
            "Explanation generation failed"
        );
        notify(
            observer,
            ProgressEvent::AttemptFailed {
                personality: personality.name.clone(),
                attempt,
                error: err.to_string(),
            },
        )
        .await;

        let attempts_remaining = max_attempts - attempt;
        if attempts_remaining == 0 {
            warn!(
                personality = %personality.name,
                error = %err,
                "Failed to generate valid explanation after all retries"
            );
            return Err(err);
        }

        prompt.push_failure(&err.to_string());
        notify(
            observer,
            ProgressEvent::RetryScheduled {
                personality: personality.name.clone(),
                attempts_remaining,
                delay: policy.backoff,
            },
        )
        .await;
        sleep(policy.backoff).await;
        attempt += 1;
    }
}

async fn attempt_once(
    llm: &dyn LlmClient,
    space_id: &str,
    personality: &Personality,
    prompt: &ExplanationPrompt,
    validator: &ResponseValidator,
    policy: &RetryPolicy,
) -> Result<PersonalityExplanation, AttemptError> {
    let call = llm.generate_text(space_id, prompt.as_str(), &personality.id);
    let reply = timeout(policy.request_timeout, call)
        .await
        .map_err(|_| AttemptError::Timeout(policy.request_timeout))??;

    debug!(
        personality = %personality.name,
        chars = reply.message.len(),
        "Raw LLM response received"
    );

    Ok(validator.parse_explanation(&personality.name, &reply.message)?)
}

/// Explanation length is requested, not enforced.
fn log_word_counts(explanation: &PersonalityExplanation, prompt: &ExplanationPrompt) {
    let c = prompt.constraints();
    for bias in &explanation.scored_biases {
        let words = bias.detailed_explanation.split_whitespace().count();
        if words < c.min_words || words > c.max_words {
            debug!(
                personality = %explanation.personality,
                bias_type = %bias.bias_type,
                words,
                min_words = c.min_words,
                max_words = c.max_words,
                "Explanation length outside requested range"
            );
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::gateway::LlmReply;
    use crate::hooks::NoopProgressObserver;
    use crate::prompts::PromptBuilder;

    enum Scripted {
        Reply(String),
        Hang,
        Fail,
    }

    struct ScriptedLlm {
        script: Mutex<VecDeque<Scripted>>,
        prompts: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedLlm {
        fn new(script: Vec<Scripted>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                prompts: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedLlm {
        async fn generate_text(
            &self,
            _space_id: &str,
            prompt: &str,
            _personality_id: &str,
        ) -> Result<LlmReply, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Scripted::Reply(m)) => Ok(LlmReply::new(m)),
                Some(Scripted::Fail) => Err(ProviderError::provider("test", "boom", false)),
                Some(Scripted::Hang) | None => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }
    }

    fn valid_reply(n: usize) -> String {
        let items: Vec<_> = (0..n)
            .map(|i| {
                json!({
                    "bias_type": format!("Bias {i}"),
                    "for_score": 6,
                    "against_score": 3,
                    "detailed_explanation": "Considered view."
                })
            })
            .collect();
        serde_json::to_string(&items).unwrap()
    }

    fn setup(n: usize) -> (Personality, ExplanationPrompt, ResponseValidator) {
        let p = Personality::new("p1", "Ada", "Skeptic");
        let prompt = PromptBuilder::default().build(&p, "template", "text", n);
        (p, prompt, ResponseValidator::new(n))
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_after_two_backoffs() {
        let llm = ScriptedLlm::new(vec![
            Scripted::Reply(valid_reply(1)),
            Scripted::Reply("not json".into()),
            Scripted::Reply(valid_reply(2)),
        ]);
        let (p, prompt, validator) = setup(2);
        let policy = RetryPolicy::default();

        let start = tokio::time::Instant::now();
        let out = explain_personality(&llm, "s1", &p, prompt, &validator, &policy, &NoopProgressObserver)
            .await
            .unwrap();

        assert_eq!(out.attempts, 3);
        assert_eq!(out.explanation.personality, "Ada");
        assert_eq!(out.explanation.scored_biases.len(), 2);
        assert_eq!(start.elapsed(), policy.backoff * 2);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 3);

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[1].contains("Expected 2 explanations, got 1"));
        assert!(prompts[2].starts_with(&prompts[1]));
        assert!(prompts[2].contains("Invalid JSON format"));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_attempts_returns_last_error() {
        let llm = ScriptedLlm::new(vec![
            Scripted::Reply("[]".into()),
            Scripted::Fail,
            Scripted::Reply(r#"{"scored_biases": 1}"#.into()),
            Scripted::Reply(valid_reply(1)),
        ]);
        let (p, prompt, validator) = setup(1);

        let err = explain_personality(
            &llm,
            "s1",
            &p,
            prompt,
            &validator,
            &RetryPolicy::default(),
            &NoopProgressObserver,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            AttemptError::Validation(ValidationError::InvalidShape)
        ));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_an_attempt() {
        let llm = ScriptedLlm::new(vec![Scripted::Hang, Scripted::Reply(valid_reply(1))]);
        let (p, prompt, validator) = setup(1);
        let policy = RetryPolicy::default();

        let start = tokio::time::Instant::now();
        let out = explain_personality(&llm, "s1", &p, prompt, &validator, &policy, &NoopProgressObserver)
            .await
            .unwrap();

        assert_eq!(out.attempts, 2);
        assert_eq!(start.elapsed(), policy.request_timeout + policy.backoff);
        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[1].contains("Previous attempt failed with error: LLM request timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_policy_never_sleeps() {
        let llm = ScriptedLlm::new(vec![Scripted::Reply("nope".into())]);
        let (p, prompt, validator) = setup(1);
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        let start = tokio::time::Instant::now();
        let err = explain_personality(&llm, "s1", &p, prompt, &validator, &policy, &NoopProgressObserver)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MALFORMED_JSON");
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
