#![forbid(unsafe_code)]

//! # bias-explainer
//!
//! Score a text for cognitive and rhetorical biases through several LLM
//! personalities, then turn the scores into charts and a report document.
//!
//! Each personality gets one structured prompt. The reply must be a JSON list
//! of exactly as many `{bias_type, for_score, against_score,
//! detailed_explanation}` objects as the bias template has chapters, with both
//! scores in `0..=10`. Replies that fail validation are retried with the error
//! appended to the prompt, up to a fixed attempt budget. Validated scores are
//! aggregated per bias type and rendered as three PNG charts: a diverging
//! for/against balance chart and one intensity chart per metric.
//!
//! The host platform (documents, images, text generation) is reached only
//! through the traits in [`host`] and [`gateway`].

pub mod aggregate;
pub mod chart;
pub mod config;
pub mod gateway;
pub mod hooks;
pub mod host;
pub mod prompts;
pub mod report;
pub mod retry;
pub mod task;
pub mod types;
pub mod validation;

pub use aggregate::ScoreTable;
pub use chart::{ChartConfig, ChartError, ChartKind, Palette, RenderedChart};
pub use config::AnalysisConfig;
pub use gateway::{Attribution, LlmClient, LlmReply, ProviderError, ProviderGateway, UsageSink};
pub use hooks::{NoopProgressObserver, ObserverError, ProgressEvent, ProgressObserver};
pub use host::{DocumentStore, HostError, ImageStore, MemoryDocumentStore, MemoryImageStore};
pub use prompts::{ExplanationPrompt, PromptBuilder, PromptConstraints};
pub use retry::{explain_personality, AttemptError, RetryPolicy};
pub use task::{AnalysisError, ExplainedAnalysis, ExplainedAnalysisParams, TaskOutcome};
pub use types::{AnalysisRun, Personality, PersonalityExplanation, ScoredBias};
pub use validation::{ResponseValidator, ValidationError};
