//! Selection / annotation session
//!
//! One text selection at a time moves through
//!
//! ```text
//!   Idle ──select──► Selected ──preview──► Previewing ──color/style──► Previewing
//!     ▲                  │                      │
//!     └──── commit / dismiss / delete ◄─────────┘
//! ```
//!
//! Every operation makes its fallible store call before touching local
//! state, so a failed call never leaves the mirror half-updated.

use log::{debug, info, log, warn};
use serde::Serialize;
use thiserror::Error;

use crate::annotation::{
    Annotation, AnnotationMirror, AnnotationPatch, AnnotationStyle, Color, NewAnnotation,
};
use crate::engine::{EngineError, Overlay, RenderingEngine};
use crate::gesture::{PopupAnchor, SelectionDetail};
use crate::position;
use crate::store::{AnnotationStore, StoreError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no active selection")]
    NoSelection,

    #[error("selection does not overlap an annotation")]
    NoOverlap,

    #[error("unknown annotation {0}")]
    UnknownAnnotation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl SessionError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, SessionError::Store(err) if err.is_conflict())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Selected,
    Previewing,
}

/// What the popup for a fresh selection should offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "id", rename_all = "snake_case")]
pub enum PromptAction {
    Create,
    /// The selection overlaps this annotation
    Delete(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionPrompt {
    pub anchor: PopupAnchor,
    pub action: PromptAction,
}

/// Rendered but unsaved annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub position_id: String,
    pub color: Color,
    pub style: AnnotationStyle,
}

impl Preview {
    fn overlay(&self) -> Overlay {
        Overlay {
            position_id: self.position_id.clone(),
            color: self.color.clone(),
            style: self.style,
        }
    }
}

impl From<&Annotation> for Overlay {
    fn from(annotation: &Annotation) -> Self {
        Overlay {
            position_id: annotation.position_id.clone(),
            color: annotation.color.clone(),
            style: annotation.style,
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveSelection {
    detail: SelectionDetail,
    overlap: Option<String>,
}

#[derive(Debug, Default)]
pub struct SelectionSession {
    book_id: String,
    chapter_title: Option<String>,
    mirror: AnnotationMirror,
    selection: Option<ActiveSelection>,
    preview: Option<Preview>,
}

impl SelectionSession {
    pub fn new(book_id: impl Into<String>) -> Self {
        Self {
            book_id: book_id.into(),
            ..Self::default()
        }
    }

    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn mirror(&self) -> &AnnotationMirror {
        &self.mirror
    }

    pub fn current_preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    pub fn selection(&self) -> Option<&SelectionDetail> {
        self.selection.as_ref().map(|s| &s.detail)
    }

    pub fn phase(&self) -> SessionPhase {
        match (&self.selection, &self.preview) {
            (None, _) => SessionPhase::Idle,
            (Some(_), None) => SessionPhase::Selected,
            (Some(_), Some(_)) => SessionPhase::Previewing,
        }
    }

    /// Chapter recorded on annotations created from now on.
    pub fn set_chapter_title(&mut self, title: Option<String>) {
        self.chapter_title = title;
    }

    /// Replace the mirror with the store's annotations for `book_id`.
    pub fn load(
        &mut self,
        store: &mut dyn AnnotationStore,
        book_id: &str,
    ) -> Result<usize, SessionError> {
        let annotations = store.list_annotations(book_id)?;
        self.book_id = book_id.to_string();
        self.mirror = AnnotationMirror::from_annotations(annotations);
        info!("Loaded {} annotations for {book_id}", self.mirror.len());
        Ok(self.mirror.len())
    }

    /// Re-apply every known overlay after the renderer loaded a section.
    pub fn render_all(&self, engine: &mut dyn RenderingEngine) -> usize {
        let mut rendered = 0;
        for annotation in self.mirror.iter() {
            match engine.add_annotation(&Overlay::from(annotation)) {
                Ok(()) => rendered += 1,
                Err(err) => warn!("Could not render annotation {}: {err}", annotation.id),
            }
        }
        if let Some(preview) = &self.preview {
            if let Err(err) = engine.add_annotation(&preview.overlay()) {
                warn!("Could not restore preview: {err}");
            }
        }
        rendered
    }

    pub fn select(
        &mut self,
        detail: SelectionDetail,
        engine: &mut dyn RenderingEngine,
    ) -> SelectionPrompt {
        self.remove_preview(engine);

        let overlap = position::parse(&detail.position_id)
            .and_then(|range| self.mirror.find_overlap(&range))
            .map(|annotation| annotation.id.clone());
        debug!(
            "Selected {:?} at {} (overlap: {overlap:?})",
            detail.text, detail.position_id
        );

        let prompt = SelectionPrompt {
            anchor: detail.anchor,
            action: match &overlap {
                Some(id) => PromptAction::Delete(id.clone()),
                None => PromptAction::Create,
            },
        };
        self.selection = Some(ActiveSelection { detail, overlap });
        prompt
    }

    /// Render an unsaved overlay for the current selection, replacing any
    /// previous preview.
    pub fn preview(
        &mut self,
        color: Color,
        style: AnnotationStyle,
        engine: &mut dyn RenderingEngine,
    ) -> Result<(), SessionError> {
        let selection = self.selection.as_ref().ok_or(SessionError::NoSelection)?;
        let preview = Preview {
            position_id: selection.detail.position_id.clone(),
            color,
            style,
        };
        self.set_preview(preview, engine)
    }

    pub fn change_color(
        &mut self,
        color: Color,
        engine: &mut dyn RenderingEngine,
    ) -> Result<(), SessionError> {
        let style = self.preview.as_ref().map(|p| p.style).unwrap_or_default();
        self.preview(color, style, engine)
    }

    pub fn change_style(
        &mut self,
        style: AnnotationStyle,
        engine: &mut dyn RenderingEngine,
    ) -> Result<(), SessionError> {
        let color = self
            .preview
            .as_ref()
            .map(|p| p.color.clone())
            .unwrap_or_default();
        self.preview(color, style, engine)
    }

    /// Persist the current selection with the previewed color and style
    /// (yellow highlight when nothing was previewed).
    ///
    /// The preview and the selection are cleared whether or not the store
    /// accepts the annotation.
    pub fn commit(
        &mut self,
        store: &mut dyn AnnotationStore,
        engine: &mut dyn RenderingEngine,
        note: Option<String>,
    ) -> Result<Annotation, SessionError> {
        let selection = self.selection.as_ref().ok_or(SessionError::NoSelection)?;
        let (color, style) = self
            .preview
            .as_ref()
            .map(|p| (p.color.clone(), p.style))
            .unwrap_or_default();

        let request = NewAnnotation {
            book_id: self.book_id.clone(),
            position_id: selection.detail.position_id.clone(),
            text: selection.detail.text.clone(),
            color,
            style,
            note,
            chapter_title: self.chapter_title.clone(),
        };
        let result = store.create_annotation(request);

        self.remove_preview(engine);
        self.clear_selection(engine);

        let annotation = match result {
            Ok(annotation) => annotation,
            Err(err) => {
                log!(err.log_level(), "Failed to save annotation: {err}");
                return Err(err.into());
            }
        };

        if let Err(err) = engine.add_annotation(&Overlay::from(&annotation)) {
            warn!("Saved annotation {} but could not render it: {err}", annotation.id);
        }
        info!("Created annotation {} at {}", annotation.id, annotation.position_id);
        self.mirror.upsert(annotation.clone());
        Ok(annotation)
    }

    /// Drop the selection and its preview without saving anything.
    pub fn dismiss(&mut self, engine: &mut dyn RenderingEngine) {
        if self.selection.is_none() && self.preview.is_none() {
            return;
        }
        self.remove_preview(engine);
        self.clear_selection(engine);
        debug!("Selection dismissed");
    }

    /// Delete the annotation the current selection overlaps.
    pub fn delete_overlapping(
        &mut self,
        store: &mut dyn AnnotationStore,
        engine: &mut dyn RenderingEngine,
    ) -> Result<Annotation, SessionError> {
        let selection = self.selection.as_ref().ok_or(SessionError::NoSelection)?;
        let id = selection.overlap.clone().ok_or(SessionError::NoOverlap)?;
        self.delete(store, engine, &id)
    }

    /// Delete an annotation by id: store, then overlay, then mirror.
    pub fn delete(
        &mut self,
        store: &mut dyn AnnotationStore,
        engine: &mut dyn RenderingEngine,
        id: &str,
    ) -> Result<Annotation, SessionError> {
        let position_id = self
            .mirror
            .get(id)
            .map(|a| a.position_id.clone())
            .ok_or_else(|| SessionError::UnknownAnnotation(id.to_string()))?;

        if let Err(err) = store.delete_annotation(id) {
            log!(err.log_level(), "Failed to delete annotation {id}: {err}");
            self.remove_preview(engine);
            self.clear_selection(engine);
            return Err(err.into());
        }

        if let Err(err) = engine.delete_annotation(&position_id) {
            warn!("Deleted annotation {id} but its overlay stayed: {err}");
        }
        let removed = self
            .mirror
            .remove(id)
            .ok_or_else(|| SessionError::UnknownAnnotation(id.to_string()))?;
        self.remove_preview(engine);
        self.clear_selection(engine);
        info!("Deleted annotation {id}");
        Ok(removed)
    }

    /// Change color, style or note of a saved annotation and re-render it.
    pub fn update(
        &mut self,
        store: &mut dyn AnnotationStore,
        engine: &mut dyn RenderingEngine,
        id: &str,
        patch: &AnnotationPatch,
    ) -> Result<Annotation, SessionError> {
        let old_position = self
            .mirror
            .get(id)
            .map(|a| a.position_id.clone())
            .ok_or_else(|| SessionError::UnknownAnnotation(id.to_string()))?;
        if patch.is_empty() {
            return self
                .mirror
                .get(id)
                .cloned()
                .ok_or_else(|| SessionError::UnknownAnnotation(id.to_string()));
        }

        let updated = store.update_annotation(id, patch).inspect_err(|err| {
            log!(err.log_level(), "Failed to update annotation {id}: {err}");
        })?;

        if let Err(err) = engine.delete_annotation(&old_position) {
            debug!("No overlay to replace for {id}: {err}");
        }
        if let Err(err) = engine.add_annotation(&Overlay::from(&updated)) {
            warn!("Updated annotation {id} but could not render it: {err}");
        }
        self.mirror.upsert(updated.clone());
        Ok(updated)
    }

    /// Clears the old preview before rendering the new one, so at most one
    /// preview overlay exists at any time.
    fn set_preview(
        &mut self,
        preview: Preview,
        engine: &mut dyn RenderingEngine,
    ) -> Result<(), SessionError> {
        self.remove_preview(engine);
        engine.add_annotation(&preview.overlay())?;
        debug!(
            "Previewing {} {} at {}",
            preview.color,
            preview.style.as_str(),
            preview.position_id
        );
        self.preview = Some(preview);
        Ok(())
    }

    fn remove_preview(&mut self, engine: &mut dyn RenderingEngine) {
        let Some(preview) = self.preview.take() else {
            return;
        };
        // A saved annotation may share the position; leave its overlay alone.
        if self
            .mirror
            .iter()
            .any(|a| a.position_id == preview.position_id)
        {
            return;
        }
        if let Err(err) = engine.delete_annotation(&preview.position_id) {
            warn!("Could not remove preview overlay: {err}");
        }
    }

    fn clear_selection(&mut self, engine: &mut dyn RenderingEngine) {
        self.selection = None;
        engine.clear_selection();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::tests::annotation;
    use crate::engine::{LiveSelection, Rect, Surface};
    use crate::gesture::PopupPlacement;
    use crate::replay::{EngineCommand, ScriptedEngine};
    use crate::store::MemoryAnnotationStore;

    const LOREM: &str = "epubcfi(/6/4!/4/2,/1:0,/1:11)";

    fn detail(text: &str, position_id: &str) -> SelectionDetail {
        SelectionDetail {
            text: text.to_string(),
            position_id: position_id.to_string(),
            section_index: 2,
            anchor: PopupAnchor {
                x: 100.0,
                y: 300.0,
                placement: PopupPlacement::Above,
            },
        }
    }

    fn engine_with_selection(text: &str, position_id: &str) -> ScriptedEngine {
        let mut engine = ScriptedEngine::default();
        engine.set_selection(Some(LiveSelection {
            text: text.to_string(),
            position_id: position_id.to_string(),
            section_index: 2,
            rect: Rect::new(10.0, 200.0, 80.0, 20.0),
        }));
        engine
    }

    fn yellow() -> Color {
        Color::parse(Color::YELLOW).unwrap()
    }

    #[test]
    fn phases_follow_the_interaction() {
        let mut engine = engine_with_selection("lorem ipsum", LOREM);
        let mut session = SelectionSession::new("book");
        assert_eq!(session.phase(), SessionPhase::Idle);

        let prompt = session.select(detail("lorem ipsum", LOREM), &mut engine);
        assert_eq!(prompt.action, PromptAction::Create);
        assert_eq!(session.phase(), SessionPhase::Selected);

        session
            .preview(yellow(), AnnotationStyle::Highlight, &mut engine)
            .unwrap();
        assert_eq!(session.phase(), SessionPhase::Previewing);

        session.dismiss(&mut engine);
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(engine.overlays().is_empty());
        assert!(engine.selection().is_none());
    }

    #[test]
    fn restyling_keeps_a_single_preview_overlay() {
        let mut engine = engine_with_selection("lorem ipsum", LOREM);
        let mut session = SelectionSession::new("book");
        session.select(detail("lorem ipsum", LOREM), &mut engine);

        session
            .preview(yellow(), AnnotationStyle::Highlight, &mut engine)
            .unwrap();
        session
            .change_color(Color::parse("#00ff00").unwrap(), &mut engine)
            .unwrap();
        session
            .change_style(AnnotationStyle::Underline, &mut engine)
            .unwrap();

        assert_eq!(engine.overlays().len(), 1);
        let overlay = &engine.overlays()[0];
        assert_eq!(overlay.color.as_str(), "#00FF00");
        assert_eq!(overlay.style, AnnotationStyle::Underline);

        let commands = engine.take_commands();
        let deletes = commands
            .iter()
            .filter(|c| matches!(c, EngineCommand::DeleteAnnotation { .. }))
            .count();
        assert_eq!(deletes, 2);
    }

    #[test]
    fn commit_persists_and_clears() {
        let mut engine = engine_with_selection("lorem ipsum", LOREM);
        let mut store = MemoryAnnotationStore::new();
        let mut session = SelectionSession::new("book");
        session.set_chapter_title(Some("Chapter 1".to_string()));

        session.select(detail("lorem ipsum", LOREM), &mut engine);
        session
            .preview(yellow(), AnnotationStyle::Highlight, &mut engine)
            .unwrap();
        let saved = session
            .commit(&mut store, &mut engine, Some("note".to_string()))
            .unwrap();

        assert_eq!(saved.position_id, LOREM);
        assert_eq!(saved.chapter_title.as_deref(), Some("Chapter 1"));
        assert_eq!(session.mirror().len(), 1);
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(session.current_preview().is_none());
        assert_eq!(engine.overlays().len(), 1);
        assert!(engine.selection().is_none());
        assert_eq!(store.annotations().len(), 1);
    }

    #[test]
    fn commit_without_preview_uses_yellow_highlight() {
        let mut engine = engine_with_selection("lorem ipsum", LOREM);
        let mut store = MemoryAnnotationStore::new();
        let mut session = SelectionSession::new("book");

        session.select(detail("lorem ipsum", LOREM), &mut engine);
        let saved = session.commit(&mut store, &mut engine, None).unwrap();
        assert_eq!(saved.color.as_str(), Color::YELLOW);
        assert_eq!(saved.style, AnnotationStyle::Highlight);
    }

    #[test]
    fn failed_commit_still_clears_preview_and_selection() {
        let mut engine = engine_with_selection("lorem ipsum", LOREM);
        let mut store = MemoryAnnotationStore::new();
        store.fail_next(StoreError::Conflict {
            position_id: LOREM.to_string(),
        });
        let mut session = SelectionSession::new("book");

        session.select(detail("lorem ipsum", LOREM), &mut engine);
        session
            .preview(yellow(), AnnotationStyle::Highlight, &mut engine)
            .unwrap();
        let err = session.commit(&mut store, &mut engine, None).unwrap_err();

        assert!(err.is_conflict());
        assert!(session.mirror().is_empty());
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(engine.overlays().is_empty());
        assert!(engine.selection().is_none());
    }

    #[test]
    fn commit_without_selection_is_rejected() {
        let mut engine = ScriptedEngine::default();
        let mut store = MemoryAnnotationStore::new();
        let mut session = SelectionSession::new("book");
        assert!(matches!(
            session.commit(&mut store, &mut engine, None),
            Err(SessionError::NoSelection)
        ));
    }

    #[test]
    fn overlapping_selection_offers_delete() {
        let existing = annotation("ann-1", LOREM);
        let mut store = MemoryAnnotationStore::with_annotations(vec![existing]);
        let mut engine = ScriptedEngine::default();
        let mut session = SelectionSession::new("book");
        assert_eq!(session.load(&mut store, "book").unwrap(), 1);

        let inner = "epubcfi(/6/4!/4/2,/1:5,/1:8)";
        let prompt = session.select(detail("ips", inner), &mut engine);
        assert_eq!(prompt.action, PromptAction::Delete("ann-1".to_string()));

        let removed = session.delete_overlapping(&mut store, &mut engine).unwrap();
        assert_eq!(removed.id, "ann-1");
        assert!(session.mirror().is_empty());
        assert!(store.annotations().is_empty());
        assert!(
            engine
                .commands()
                .contains(&EngineCommand::DeleteAnnotation {
                    position_id: LOREM.to_string()
                })
        );
    }

    #[test]
    fn failed_delete_keeps_mirror() {
        let mut store = MemoryAnnotationStore::with_annotations(vec![annotation("ann-1", LOREM)]);
        let mut engine = ScriptedEngine::default();
        let mut session = SelectionSession::new("book");
        session.load(&mut store, "book").unwrap();

        session.select(detail("ips", "epubcfi(/6/4!/4/2,/1:5,/1:8)"), &mut engine);
        store.fail_next(StoreError::network("offline"));
        assert!(session.delete_overlapping(&mut store, &mut engine).is_err());
        assert_eq!(session.mirror().len(), 1);
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[test]
    fn unparseable_selection_never_overlaps() {
        let mut store = MemoryAnnotationStore::with_annotations(vec![annotation("ann-1", LOREM)]);
        let mut engine = ScriptedEngine::default();
        let mut session = SelectionSession::new("book");
        session.load(&mut store, "book").unwrap();

        let prompt = session.select(detail("x", "garbage"), &mut engine);
        assert_eq!(prompt.action, PromptAction::Create);
        assert!(matches!(
            session.delete_overlapping(&mut store, &mut engine),
            Err(SessionError::NoOverlap)
        ));
    }

    #[test]
    fn update_rerenders_overlay() {
        let mut store = MemoryAnnotationStore::new();
        let mut engine = engine_with_selection("lorem ipsum", LOREM);
        let mut session = SelectionSession::new("book");
        session.select(detail("lorem ipsum", LOREM), &mut engine);
        let saved = session.commit(&mut store, &mut engine, None).unwrap();

        let patch = AnnotationPatch {
            style: Some(AnnotationStyle::Squiggly),
            ..Default::default()
        };
        let updated = session
            .update(&mut store, &mut engine, &saved.id, &patch)
            .unwrap();
        assert_eq!(updated.style, AnnotationStyle::Squiggly);
        assert_eq!(engine.overlays().len(), 1);
        assert_eq!(engine.overlays()[0].style, AnnotationStyle::Squiggly);
        assert_eq!(
            session.mirror().get(&saved.id).unwrap().style,
            AnnotationStyle::Squiggly
        );
    }

    #[test]
    fn render_all_reapplies_overlays() {
        let mut store = MemoryAnnotationStore::with_annotations(vec![
            annotation("a", "epubcfi(/6/4!/4/2,/1:0,/1:3)"),
            annotation("b", "epubcfi(/6/4!/4/4,/1:0,/1:3)"),
        ]);
        let mut engine = ScriptedEngine::default();
        let mut session = SelectionSession::new("book");
        session.load(&mut store, "book").unwrap();

        assert_eq!(session.render_all(&mut engine), 2);
        assert_eq!(engine.overlays().len(), 2);
    }
}
