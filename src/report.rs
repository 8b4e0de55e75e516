//! Report assembly: turn a scored run plus uploaded charts into a host document.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::chart::ChartKind;
use crate::host::{Chapter, Document, DocumentMetadata, DocumentStore, HostError, Paragraph};
use crate::types::{format_number, AnalysisRun, PersonalityExplanation, ScoredBias};

pub const REPORT_TYPE: &str = "bias_explained";
pub const VISUAL_CHAPTER_TITLE: &str = "Bias Score Distribution";
pub const VISUAL_CHAPTER_IDEA: &str = "Visual representation of bias scores across personalities";

/// Image ids returned by the host for the three charts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChartImages {
    pub balance: String,
    pub against: String,
    pub for_: String,
}

impl ChartImages {
    pub fn id(&self, kind: ChartKind) -> &str {
        match kind {
            ChartKind::Balance => &self.balance,
            ChartKind::Against => &self.against,
            ChartKind::For => &self.for_,
        }
    }

    pub fn id_mut(&mut self, kind: ChartKind) -> &mut String {
        match kind {
            ChartKind::Balance => &mut self.balance,
            ChartKind::Against => &mut self.against,
            ChartKind::For => &mut self.for_,
        }
    }
}

/// Everything the report needs besides the run itself.
#[derive(Debug, Clone)]
pub struct ReportContext {
    /// Echoed verbatim into the abstract; `null` when absent.
    pub source_document: Value,
    pub personalities: Vec<String>,
    pub created_at: DateTime<Utc>,
}

pub fn iso_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn report_title(ts: &DateTime<Utc>) -> String {
    format!("{REPORT_TYPE}_{}", iso_timestamp(ts))
}

/// The document header. Chapters are added one by one afterwards.
pub fn report_document(run: &AnalysisRun, ctx: &ReportContext) -> Result<Document, serde_json::Error> {
    let title = report_title(&ctx.created_at);
    let content = serde_json::to_string_pretty(run)?;
    let abstract_text = serde_json::to_string_pretty(&json!({
        "type": REPORT_TYPE,
        "sourceDocument": ctx.source_document,
        "personalities": ctx.personalities,
        "timestamp": iso_timestamp(&ctx.created_at),
    }))?;

    Ok(Document {
        id: String::new(),
        title: title.clone(),
        doc_type: REPORT_TYPE.to_string(),
        content,
        abstract_text,
        metadata: DocumentMetadata { id: None, title },
        chapters: Vec::new(),
    })
}

pub fn bias_chapter_title(personality: &str, bias: &ScoredBias) -> String {
    format!(
        "{} - {} (Against: {}, For: {})",
        bias.bias_type,
        personality,
        format_number(bias.against_score),
        format_number(bias.for_score)
    )
}

/// Chapters in document order: the chart chapter, then one per judgement.
pub fn report_chapters(run: &AnalysisRun, images: &ChartImages) -> Vec<Chapter> {
    let visual = Chapter {
        paragraphs: ChartKind::ALL
            .iter()
            .map(|kind| Paragraph::with_image(kind.caption(), images.id(*kind)))
            .collect(),
        ..Chapter::new(VISUAL_CHAPTER_TITLE, VISUAL_CHAPTER_IDEA)
    };

    std::iter::once(visual)
        .chain(run.explanations.iter().flat_map(explanation_chapters))
        .collect()
}

fn explanation_chapters(e: &PersonalityExplanation) -> impl Iterator<Item = Chapter> + '_ {
    e.scored_biases.iter().map(move |bias| Chapter {
        paragraphs: vec![Paragraph::text(bias.detailed_explanation.clone())],
        ..Chapter::new(
            bias_chapter_title(&e.personality, bias),
            format!("Analysis of {} by {}", bias.bias_type, e.personality),
        )
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Create the document, then its chapters and paragraphs in order.
///
/// Returns the new document id and the number of chapters written.
pub async fn write_report(
    store: &dyn DocumentStore,
    space_id: &str,
    run: &AnalysisRun,
    images: &ChartImages,
    ctx: &ReportContext,
) -> Result<(String, usize), ReportError> {
    let document = report_document(run, ctx)?;
    let title = document.title.clone();
    let document_id = store.add_document(space_id, document).await?;
    info!(document_id = %document_id, title = %title, "Report document created");

    let chapters = report_chapters(run, images);
    let count = chapters.len();
    for mut chapter in chapters {
        let paragraphs = std::mem::take(&mut chapter.paragraphs);
        let chapter_id = store.add_chapter(space_id, &document_id, chapter).await?;
        for paragraph in paragraphs {
            store
                .add_paragraph(space_id, &document_id, &chapter_id, paragraph)
                .await?;
        }
    }
    debug!(document_id = %document_id, chapters = count, "Report chapters written");

    Ok((document_id, count))
}
