//! Annotation / bookmark store collaborator.
//!
//! The real store lives behind HTTP in the host application; this crate only
//! talks to it through [`AnnotationStore`]. [`MemoryAnnotationStore`] backs
//! the replay harness and tests.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use log::{Level, debug};
use thiserror::Error;

use crate::annotation::{Annotation, AnnotationPatch, Bookmark, NewAnnotation};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Something already exists at this position
    #[error("already exists at {position_id}")]
    Conflict { position_id: String },

    /// Request rejected or never answered
    #[error("store unavailable: {0}")]
    Network(String),

    #[error("no such item: {0}")]
    NotFound(String),
}

impl StoreError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    /// Conflicts are expected user outcomes; everything else is a failure.
    pub fn log_level(&self) -> Level {
        if self.is_conflict() { Level::Warn } else { Level::Error }
    }
}

/// Last known reading position of a book.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingProgress {
    pub position_id: String,
    pub fraction: f32,
}

pub trait AnnotationStore {
    fn list_annotations(&mut self, book_id: &str) -> Result<Vec<Annotation>, StoreError>;

    fn create_annotation(&mut self, new: NewAnnotation) -> Result<Annotation, StoreError>;

    fn update_annotation(
        &mut self,
        id: &str,
        patch: &AnnotationPatch,
    ) -> Result<Annotation, StoreError>;

    fn delete_annotation(&mut self, id: &str) -> Result<(), StoreError>;

    fn create_bookmark(
        &mut self,
        book_id: &str,
        position_id: &str,
        label: Option<String>,
    ) -> Result<Bookmark, StoreError>;

    fn delete_bookmark(&mut self, id: &str) -> Result<(), StoreError>;

    fn save_progress(
        &mut self,
        book_id: &str,
        position_id: &str,
        fraction: f32,
    ) -> Result<(), StoreError>;
}

/// In-process store with the same conflict rules as the remote one.
#[derive(Debug, Default)]
pub struct MemoryAnnotationStore {
    annotations: Vec<Annotation>,
    bookmarks: Vec<Bookmark>,
    progress: HashMap<String, ReadingProgress>,
    next_id: u64,
    injected_failures: VecDeque<StoreError>,
}

impl MemoryAnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_annotations(annotations: Vec<Annotation>) -> Self {
        Self {
            annotations,
            ..Self::default()
        }
    }

    /// Make the next call (of any kind) fail with `error`.
    pub fn fail_next(&mut self, error: StoreError) {
        self.injected_failures.push_back(error);
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    pub fn progress(&self, book_id: &str) -> Option<&ReadingProgress> {
        self.progress.get(book_id)
    }

    fn take_failure(&mut self) -> Result<(), StoreError> {
        match self.injected_failures.pop_front() {
            Some(err) => {
                debug!("Injected store failure: {err}");
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

impl AnnotationStore for MemoryAnnotationStore {
    fn list_annotations(&mut self, book_id: &str) -> Result<Vec<Annotation>, StoreError> {
        self.take_failure()?;
        Ok(self
            .annotations
            .iter()
            .filter(|a| a.book_id == book_id)
            .cloned()
            .collect())
    }

    fn create_annotation(&mut self, new: NewAnnotation) -> Result<Annotation, StoreError> {
        self.take_failure()?;

        if self
            .annotations
            .iter()
            .any(|a| a.book_id == new.book_id && a.position_id == new.position_id)
        {
            return Err(StoreError::Conflict {
                position_id: new.position_id,
            });
        }

        let annotation = Annotation {
            id: self.next_id("ann"),
            book_id: new.book_id,
            position_id: new.position_id,
            text: new.text,
            color: new.color,
            style: new.style,
            note: new.note,
            chapter_title: new.chapter_title,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.annotations.push(annotation.clone());
        Ok(annotation)
    }

    fn update_annotation(
        &mut self,
        id: &str,
        patch: &AnnotationPatch,
    ) -> Result<Annotation, StoreError> {
        self.take_failure()?;

        let annotation = self
            .annotations
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        patch.apply_to(annotation, Utc::now());
        Ok(annotation.clone())
    }

    fn delete_annotation(&mut self, id: &str) -> Result<(), StoreError> {
        self.take_failure()?;

        let idx = self
            .annotations
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.annotations.remove(idx);
        Ok(())
    }

    fn create_bookmark(
        &mut self,
        book_id: &str,
        position_id: &str,
        label: Option<String>,
    ) -> Result<Bookmark, StoreError> {
        self.take_failure()?;

        if self
            .bookmarks
            .iter()
            .any(|b| b.book_id == book_id && b.position_id == position_id)
        {
            return Err(StoreError::Conflict {
                position_id: position_id.to_string(),
            });
        }

        let bookmark = Bookmark {
            id: self.next_id("bm"),
            book_id: book_id.to_string(),
            position_id: position_id.to_string(),
            label,
            created_at: Utc::now(),
        };
        self.bookmarks.push(bookmark.clone());
        Ok(bookmark)
    }

    fn delete_bookmark(&mut self, id: &str) -> Result<(), StoreError> {
        self.take_failure()?;

        let idx = self
            .bookmarks
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.bookmarks.remove(idx);
        Ok(())
    }

    fn save_progress(
        &mut self,
        book_id: &str,
        position_id: &str,
        fraction: f32,
    ) -> Result<(), StoreError> {
        self.take_failure()?;
        self.progress.insert(
            book_id.to_string(),
            ReadingProgress {
                position_id: position_id.to_string(),
                fraction: fraction.clamp(0.0, 1.0),
            },
        );
        Ok(())
    }
}
