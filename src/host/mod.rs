//! Host platform boundary: document and image storage.
//!
//! The host owns persistence. This crate only needs the handful of calls a
//! report makes, expressed as async traits so embedders can back them with
//! whatever the platform provides. [`memory`] has in-process stores.

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::types::BiasTemplateEntry;

pub use memory::{MemoryDocumentStore, MemoryImageStore};

/// Title prefix of the template documents a bias analysis produces.
pub const BIAS_ANALYSIS_PREFIX: &str = "bias_analysis_";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Document not found: {0}")]
    DocumentNotFound(String),
    #[error("Chapter not found: {chapter_id} in document {document_id}")]
    ChapterNotFound {
        document_id: String,
        chapter_id: String,
    },
    #[error("Image upload failed: {0}")]
    Image(String),
    #[error("Host storage error: {0}")]
    Storage(String),
}

// =============================================================================
// Document model
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: String,
}

/// Rendering commands attached to a paragraph. Text-only paragraphs carry none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParagraphCommands {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
}

impl ParagraphCommands {
    pub fn image(id: impl Into<String>) -> Self {
        Self {
            image: Some(ImageRef { id: id.into() }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    #[serde(default)]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub commands: ParagraphCommands,
}

impl Paragraph {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_image(text: impl Into<String>, image_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            commands: ParagraphCommands::image(image_id),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub idea: String,
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
}

impl Chapter {
    pub fn new(title: impl Into<String>, idea: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            idea: idea.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub id: Option<String>,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(rename = "type", default)]
    pub doc_type: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

impl Document {
    /// Bias count of a template document: one bias per chapter.
    pub fn template_bias_count(&self) -> usize {
        self.chapters.len()
    }

    /// Bias types a template document defines, in chapter order.
    pub fn bias_templates(&self) -> Vec<BiasTemplateEntry> {
        self.chapters
            .iter()
            .map(|c| BiasTemplateEntry {
                title: c.title.clone(),
            })
            .collect()
    }

    /// Chapter titles and paragraph texts, one per line.
    pub fn plain_text(&self) -> String {
        let mut out = Vec::new();
        for chapter in &self.chapters {
            if !chapter.title.is_empty() {
                out.push(chapter.title.as_str());
            }
            for paragraph in &chapter.paragraphs {
                if !paragraph.text.is_empty() {
                    out.push(paragraph.text.as_str());
                }
            }
        }
        out.join("\n")
    }
}

/// Listing entry; what the host returns for a space's document index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub doc_type: String,
}

pub fn is_bias_analysis_title(title: &str) -> bool {
    title.starts_with(BIAS_ANALYSIS_PREFIX)
}

/// Documents that can serve as a bias template.
pub fn list_bias_analyses(documents: &[DocumentSummary]) -> Vec<DocumentSummary> {
    documents
        .iter()
        .filter(|d| is_bias_analysis_title(&d.title))
        .cloned()
        .collect()
}

// =============================================================================
// Traits
// =============================================================================

#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, space_id: &str, document_id: &str)
        -> Result<Document, HostError>;

    /// Store a document without chapters; returns its id.
    async fn add_document(&self, space_id: &str, document: Document) -> Result<String, HostError>;

    async fn add_chapter(
        &self,
        space_id: &str,
        document_id: &str,
        chapter: Chapter,
    ) -> Result<String, HostError>;

    async fn add_paragraph(
        &self,
        space_id: &str,
        document_id: &str,
        chapter_id: &str,
        paragraph: Paragraph,
    ) -> Result<String, HostError>;

    async fn list_documents(&self, space_id: &str) -> Result<Vec<DocumentSummary>, HostError>;
}

#[async_trait::async_trait]
pub trait ImageStore: Send + Sync {
    /// Upload a PNG; returns the id paragraphs reference it by.
    async fn put_image(&self, png: Vec<u8>) -> Result<String, HostError>;
}
