//! The `ExplainedAnalysis` task: score a text through several personalities,
//! chart the results and write them into a new host document.
//!
//! Everything runs sequentially. Personalities are explained one after the
//! other, charts are rendered and uploaded one at a time, and the report is
//! written last. Cancellation is checked before each personality only.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::aggregate::ScoreTable;
use crate::chart::{render_chart, ChartError, ChartKind};
use crate::config::AnalysisConfig;
use crate::gateway::LlmClient;
use crate::hooks::{notify, NoopProgressObserver, ProgressEvent, ProgressObserver};
use crate::host::{Document, DocumentStore, HostError, ImageStore};
use crate::prompts::PromptBuilder;
use crate::report::{write_report, ChartImages, ReportContext, ReportError};
use crate::retry::{explain_personality, AttemptError};
use crate::types::{AnalysisRun, Personality};
use crate::validation::ResponseValidator;

pub const TASK_TYPE: &str = "ExplainedAnalysis";

// =============================================================================
// Parameters
// =============================================================================

/// Task parameters as the host serializes them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainedAnalysisParams {
    #[serde(default)]
    pub personalities: Vec<Personality>,
    /// Template document; one chapter per bias type.
    #[serde(default)]
    pub bias_analysis: Option<Document>,
    #[serde(default)]
    pub bias_analysis_content: Option<String>,
    /// Opaque reference echoed into the report abstract.
    #[serde(default)]
    pub source_document: Option<Value>,
    #[serde(default)]
    pub source_document_content: Option<String>,
}

impl ExplainedAnalysisParams {
    /// Resolve the template and source documents from the host.
    pub async fn load(
        store: &dyn DocumentStore,
        space_id: &str,
        personalities: Vec<Personality>,
        template_id: &str,
        source_id: &str,
    ) -> Result<Self, AnalysisError> {
        let load_failed = |e: HostError| AnalysisError::Input(format!("Failed to load document: {e}"));
        let template = store.get_document(space_id, template_id).await.map_err(load_failed)?;
        let source = store.get_document(space_id, source_id).await.map_err(load_failed)?;

        Ok(Self {
            personalities,
            bias_analysis_content: Some(template.plain_text()),
            bias_analysis: Some(template),
            source_document: Some(json!({ "id": source.id, "title": source.title })),
            source_document_content: Some(source.plain_text()),
        })
    }

    /// Check required inputs; returns `(template text, source text, bias count)`.
    fn validated(&self) -> Result<(&str, &str, usize), AnalysisError> {
        if self.personalities.is_empty() {
            return Err(AnalysisError::Input("Invalid personality data provided".into()));
        }
        let (template, template_text) = match (&self.bias_analysis, &self.bias_analysis_content) {
            (Some(doc), Some(text)) if !text.trim().is_empty() => (doc, text.as_str()),
            _ => {
                return Err(AnalysisError::Input(
                    "Invalid bias analysis document data provided".into(),
                ))
            }
        };
        let source_text = match &self.source_document_content {
            Some(text) if !text.trim().is_empty() => text.as_str(),
            _ => return Err(AnalysisError::Input("Invalid source document data provided".into())),
        };
        let bias_count = template.template_bias_count();
        if bias_count == 0 {
            return Err(AnalysisError::Input("No biases found in template document".into()));
        }
        Ok((template_text, source_text, bias_count))
    }
}

// =============================================================================
// Errors and outcome
// =============================================================================

/// Task failure. Every variant displays its underlying message unchanged;
/// the personality or chart kind rides along as a field.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("{0}")]
    Input(String),
    #[error("{source}")]
    Explanation {
        personality: String,
        #[source]
        source: AttemptError,
    },
    #[error("{source}")]
    Chart {
        kind: ChartKind,
        #[source]
        source: ChartError,
    },
    #[error("{source}")]
    Upload {
        kind: ChartKind,
        #[source]
        source: HostError,
    },
    #[error(transparent)]
    Document(#[from] ReportError),
    #[error("Task cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutcome {
    pub status: TaskStatus,
    pub document_id: String,
}

// =============================================================================
// Task
// =============================================================================

pub struct ExplainedAnalysis {
    space_id: String,
    llm: Arc<dyn LlmClient>,
    documents: Arc<dyn DocumentStore>,
    images: Arc<dyn ImageStore>,
    config: AnalysisConfig,
    observer: Arc<dyn ProgressObserver>,
}

impl ExplainedAnalysis {
    pub fn new(
        space_id: impl Into<String>,
        llm: Arc<dyn LlmClient>,
        documents: Arc<dyn DocumentStore>,
        images: Arc<dyn ImageStore>,
    ) -> Self {
        Self {
            space_id: space_id.into(),
            llm,
            documents,
            images,
            config: AnalysisConfig::default(),
            observer: Arc::new(NoopProgressObserver),
        }
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Host-facing description of a run, as the task runner persists it.
    pub fn descriptor(params: &ExplainedAnalysisParams) -> Value {
        json!({
            "taskType": TASK_TYPE,
            "parameters": params,
        })
    }

    pub async fn run(
        &self,
        params: &ExplainedAnalysisParams,
        cancel_flag: Option<&AtomicBool>,
    ) -> Result<TaskOutcome, AnalysisError> {
        let result = self.run_inner(params, cancel_flag).await;
        if let Err(e) = &result {
            warn!(space_id = %self.space_id, error = %e, "Bias explanation failed");
        }
        result
    }

    async fn run_inner(
        &self,
        params: &ExplainedAnalysisParams,
        cancel_flag: Option<&AtomicBool>,
    ) -> Result<TaskOutcome, AnalysisError> {
        let (template_text, source_text, bias_count) = params.validated()?;
        let observer = self.observer.as_ref();

        info!(
            personalities = params.personalities.len(),
            bias_count, "Starting bias explanation"
        );
        notify(
            observer,
            ProgressEvent::RunStarted {
                personalities: params.personalities.len(),
                bias_count,
            },
        )
        .await;

        let run = self
            .explain_all(params, template_text, source_text, bias_count, cancel_flag)
            .await?;

        let table = ScoreTable::aggregate(&run);
        let images = self.render_and_upload(&table).await?;

        let ctx = ReportContext {
            source_document: params.source_document.clone().unwrap_or(Value::Null),
            personalities: run.personality_names(),
            created_at: Utc::now(),
        };
        let (document_id, chapters) =
            write_report(self.documents.as_ref(), &self.space_id, &run, &images, &ctx).await?;

        info!(document_id = %document_id, chapters, "Task completed successfully");
        notify(
            observer,
            ProgressEvent::DocumentCreated {
                document_id: document_id.clone(),
                chapters,
            },
        )
        .await;

        Ok(TaskOutcome {
            status: TaskStatus::Completed,
            document_id,
        })
    }

    async fn explain_all(
        &self,
        params: &ExplainedAnalysisParams,
        template_text: &str,
        source_text: &str,
        bias_count: usize,
        cancel_flag: Option<&AtomicBool>,
    ) -> Result<AnalysisRun, AnalysisError> {
        let builder = PromptBuilder::new(self.config.constraints);
        let c = &self.config.constraints;
        let validator = ResponseValidator::new(bias_count).with_range(c.min_score, c.max_score);
        let mut run = AnalysisRun::new();

        for (index, personality) in params.personalities.iter().enumerate() {
            if let Some(flag) = cancel_flag {
                if flag.load(Ordering::Relaxed) {
                    warn!(completed = index, "Task cancelled by user");
                    return Err(AnalysisError::Cancelled);
                }
            }

            info!(personality = %personality.name, index, "Generating analysis for personality");
            notify(
                self.observer.as_ref(),
                ProgressEvent::PersonalityStarted {
                    index,
                    name: personality.name.clone(),
                },
            )
            .await;

            let prompt = builder.build(personality, template_text, source_text, bias_count);
            let outcome = explain_personality(
                self.llm.as_ref(),
                &self.space_id,
                personality,
                prompt,
                &validator,
                &self.config.retry,
                self.observer.as_ref(),
            )
            .await
            .map_err(|source| AnalysisError::Explanation {
                personality: personality.name.clone(),
                source,
            })?;

            notify(
                self.observer.as_ref(),
                ProgressEvent::PersonalityCompleted {
                    index,
                    name: personality.name.clone(),
                    attempts: outcome.attempts,
                },
            )
            .await;
            run.push(outcome.explanation);
        }

        Ok(run)
    }

    async fn render_and_upload(&self, table: &ScoreTable) -> Result<ChartImages, AnalysisError> {
        let mut images = ChartImages::default();
        for kind in ChartKind::ALL {
            let chart = render_chart(kind, table, &self.config.charts)
                .map_err(|source| AnalysisError::Chart { kind, source })?;
            notify(
                self.observer.as_ref(),
                ProgressEvent::ChartRendered {
                    kind,
                    bytes: chart.png.len(),
                },
            )
            .await;

            let image_id = self
                .images
                .put_image(chart.png)
                .await
                .map_err(|source| AnalysisError::Upload { kind, source })?;
            info!(chart = %kind, image_id = %image_id, "Chart uploaded");
            notify(
                self.observer.as_ref(),
                ProgressEvent::ImageUploaded {
                    kind,
                    image_id: image_id.clone(),
                },
            )
            .await;
            *images.id_mut(kind) = image_id;
        }

        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Chapter;

    fn params() -> ExplainedAnalysisParams {
        ExplainedAnalysisParams {
            personalities: vec![Personality::new("p1", "Ada", "Skeptic")],
            bias_analysis: Some(Document {
                title: "bias_analysis_1".into(),
                chapters: vec![Chapter::new("Anchoring", "")],
                ..Document::default()
            }),
            bias_analysis_content: Some("Anchoring".into()),
            source_document: None,
            source_document_content: Some("Some text.".into()),
        }
    }

    fn input_message(p: &ExplainedAnalysisParams) -> String {
        match p.validated() {
            Err(AnalysisError::Input(m)) => m,
            other => panic!("expected input error, got {other:?}"),
        }
    }

    #[test]
    fn input_validation_messages() {
        let mut p = params();
        p.personalities.clear();
        assert_eq!(input_message(&p), "Invalid personality data provided");

        let mut p = params();
        p.bias_analysis_content = None;
        assert_eq!(input_message(&p), "Invalid bias analysis document data provided");

        let mut p = params();
        p.source_document_content = Some("  ".into());
        assert_eq!(input_message(&p), "Invalid source document data provided");

        let mut p = params();
        if let Some(doc) = p.bias_analysis.as_mut() {
            doc.chapters.clear();
        }
        assert_eq!(input_message(&p), "No biases found in template document");

        assert_eq!(params().validated().unwrap().2, 1);
    }

    #[test]
    fn params_use_host_field_names() {
        let v = serde_json::to_value(params()).unwrap();
        assert!(v.get("biasAnalysisContent").is_some());
        assert!(v.get("sourceDocumentContent").is_some());

        let d = ExplainedAnalysis::descriptor(&params());
        assert_eq!(d["taskType"], "ExplainedAnalysis");
        assert_eq!(d["parameters"]["personalities"][0]["name"], "Ada");
    }

    #[test]
    fn outcome_serializes_for_the_host() {
        let o = TaskOutcome {
            status: TaskStatus::Completed,
            document_id: "d1".into(),
        };
        assert_eq!(
            serde_json::to_value(o).unwrap(),
            json!({"status": "completed", "documentId": "d1"})
        );
    }
}
