//! In-process host stores.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{
    Chapter, Document, DocumentStore, DocumentSummary, HostError, ImageStore, Paragraph,
};

/// Documents keyed by `(space_id, document_id)`, in insertion order.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<Vec<(String, Document)>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a complete document (chapters included), keeping its id if set.
    pub fn insert(&self, space_id: &str, mut document: Document) -> Result<String, HostError> {
        if document.id.is_empty() {
            document.id = new_id();
        }
        for chapter in &mut document.chapters {
            if chapter.id.is_empty() {
                chapter.id = new_id();
            }
            for paragraph in &mut chapter.paragraphs {
                if paragraph.id.is_empty() {
                    paragraph.id = new_id();
                }
            }
        }
        let id = document.id.clone();
        self.lock()?.push((space_id.to_string(), document));
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.docs.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<(String, Document)>>, HostError> {
        self.docs
            .lock()
            .map_err(|_| HostError::Storage("document store lock poisoned".into()))
    }

    fn with_document<T>(
        &self,
        space_id: &str,
        document_id: &str,
        f: impl FnOnce(&mut Document) -> Result<T, HostError>,
    ) -> Result<T, HostError> {
        let mut docs = self.lock()?;
        let doc = docs
            .iter_mut()
            .find(|(space, d)| space == space_id && d.id == document_id)
            .map(|(_, d)| d)
            .ok_or_else(|| HostError::DocumentNotFound(document_id.to_string()))?;
        f(doc)
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[async_trait::async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_document(
        &self,
        space_id: &str,
        document_id: &str,
    ) -> Result<Document, HostError> {
        self.with_document(space_id, document_id, |d| Ok(d.clone()))
    }

    async fn add_document(&self, space_id: &str, mut document: Document) -> Result<String, HostError> {
        document.id = new_id();
        document.chapters.clear();
        let id = document.id.clone();
        self.lock()?.push((space_id.to_string(), document));
        Ok(id)
    }

    async fn add_chapter(
        &self,
        space_id: &str,
        document_id: &str,
        mut chapter: Chapter,
    ) -> Result<String, HostError> {
        self.with_document(space_id, document_id, |d| {
            chapter.id = new_id();
            chapter.paragraphs.clear();
            let id = chapter.id.clone();
            d.chapters.push(chapter);
            Ok(id)
        })
    }

    async fn add_paragraph(
        &self,
        space_id: &str,
        document_id: &str,
        chapter_id: &str,
        mut paragraph: Paragraph,
    ) -> Result<String, HostError> {
        self.with_document(space_id, document_id, |d| {
            let chapter = d
                .chapters
                .iter_mut()
                .find(|c| c.id == chapter_id)
                .ok_or_else(|| HostError::ChapterNotFound {
                    document_id: document_id.to_string(),
                    chapter_id: chapter_id.to_string(),
                })?;
            paragraph.id = new_id();
            let id = paragraph.id.clone();
            chapter.paragraphs.push(paragraph);
            Ok(id)
        })
    }

    async fn list_documents(&self, space_id: &str) -> Result<Vec<DocumentSummary>, HostError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|(space, _)| space == space_id)
            .map(|(_, d)| DocumentSummary {
                id: d.id.clone(),
                title: d.title.clone(),
                doc_type: d.doc_type.clone(),
            })
            .collect())
    }
}

/// Images keyed by the blake3 hash of their bytes.
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    images: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Vec<u8>> {
        self.images.lock().ok()?.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.images.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl ImageStore for MemoryImageStore {
    async fn put_image(&self, png: Vec<u8>) -> Result<String, HostError> {
        if png.is_empty() {
            return Err(HostError::Image("empty image".into()));
        }
        let id = blake3::hash(&png).to_hex().to_string();
        self.images
            .lock()
            .map_err(|_| HostError::Storage("image store lock poisoned".into()))?
            .insert(id.clone(), png);
        Ok(id)
    }
}
