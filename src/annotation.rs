use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::position::{self, PositionRange};

/// How an annotation is drawn over the text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationStyle {
    #[default]
    Highlight,
    Underline,
    Strikethrough,
    Squiggly,
}

impl AnnotationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationStyle::Highlight => "highlight",
            AnnotationStyle::Underline => "underline",
            AnnotationStyle::Strikethrough => "strikethrough",
            AnnotationStyle::Squiggly => "squiggly",
        }
    }
}

/// `#RRGGBB` color, stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(String);

impl Color {
    pub const YELLOW: &'static str = "#FFFF00";

    /// Accepts six hex digits with or without the leading `#`.
    pub fn parse(value: &str) -> Option<Self> {
        let hex = value.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(format!("#{}", hex.to_ascii_uppercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Color {
    fn default() -> Self {
        Self(Self::YELLOW.to_string())
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An annotation as owned by the annotation store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    pub book_id: String,
    pub position_id: String,
    pub text: String,
    pub color: Color,
    pub style: AnnotationStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_title: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Create request sent to the store; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAnnotation {
    pub book_id: String,
    pub position_id: String,
    pub text: String,
    pub color: Color,
    pub style: AnnotationStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_title: Option<String>,
}

/// Partial update. `note: Some(None)` clears the note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<AnnotationStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<Option<String>>,
}

impl AnnotationPatch {
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.style.is_none() && self.note.is_none()
    }

    /// Apply the patch in place and stamp `updated_at`.
    pub fn apply_to(&self, annotation: &mut Annotation, now: DateTime<Utc>) {
        if let Some(color) = &self.color {
            annotation.color = color.clone();
        }
        if let Some(style) = self.style {
            annotation.style = style;
        }
        if let Some(note) = &self.note {
            annotation.note = note.clone();
        }
        annotation.updated_at = Some(now);
    }
}

/// A saved reading position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
    pub book_id: String,
    pub position_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct MirrorEntry {
    annotation: Annotation,
    // None when the stored position id is not parseable
    range: Option<PositionRange>,
}

impl MirrorEntry {
    fn new(annotation: Annotation) -> Self {
        let range = position::parse(&annotation.position_id);
        Self { annotation, range }
    }
}

/// In-memory, read-through copy of a book's annotations.
///
/// Position identifiers are parsed once on insertion so overlap checks
/// never re-parse.
#[derive(Debug, Clone, Default)]
pub struct AnnotationMirror {
    entries: Vec<MirrorEntry>,
}

impl AnnotationMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_annotations(annotations: impl IntoIterator<Item = Annotation>) -> Self {
        Self {
            entries: annotations.into_iter().map(MirrorEntry::new).collect(),
        }
    }

    /// Insert or replace (matched by id).
    pub fn upsert(&mut self, annotation: Annotation) {
        let entry = MirrorEntry::new(annotation);
        match self
            .entries
            .iter_mut()
            .find(|e| e.annotation.id == entry.annotation.id)
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Annotation> {
        let idx = self.entries.iter().position(|e| e.annotation.id == id)?;
        Some(self.entries.remove(idx).annotation)
    }

    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.entries
            .iter()
            .map(|e| &e.annotation)
            .find(|a| a.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.entries.iter().map(|e| &e.annotation)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// First annotation (insertion order) whose range strictly intersects `candidate`.
    pub fn find_overlap(&self, candidate: &PositionRange) -> Option<&Annotation> {
        self.entries
            .iter()
            .find(|e| e.range.as_ref().is_some_and(|r| r.overlaps(candidate)))
            .map(|e| &e.annotation)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn annotation(id: &str, position_id: &str) -> Annotation {
        Annotation {
            id: id.to_string(),
            book_id: "book".to_string(),
            position_id: position_id.to_string(),
            text: "text".to_string(),
            color: Color::default(),
            style: AnnotationStyle::Highlight,
            note: None,
            chapter_title: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn color_parsing_normalizes() {
        assert_eq!(Color::parse("#ffff00").unwrap().as_str(), "#FFFF00");
        assert_eq!(Color::parse("a1b2c3").unwrap().as_str(), "#A1B2C3");
        assert!(Color::parse("#fff").is_none());
        assert!(Color::parse("#gggggg").is_none());
    }

    #[test]
    fn mirror_finds_first_overlap_in_insertion_order() {
        let mirror = AnnotationMirror::from_annotations([
            annotation("a", "epubcfi(/6/4!/4/2,/1:0,/1:4)"),
            annotation("b", "epubcfi(/6/4!/4/2,/1:3,/1:9)"),
            annotation("c", "epubcfi(/6/4!/4/2,/1:2,/1:8)"),
        ]);

        let candidate = position::parse("epubcfi(/6/4!/4/2,/1:5,/1:6)").unwrap();
        assert_eq!(mirror.find_overlap(&candidate).unwrap().id, "b");
    }

    #[test]
    fn mirror_skips_unparseable_entries() {
        let mirror = AnnotationMirror::from_annotations([
            annotation("broken", "not-a-position"),
            annotation("ok", "epubcfi(/6/4!/4/2,/1:0,/1:10)"),
        ]);

        let candidate = position::parse("epubcfi(/6/4!/4/2,/1:1,/1:2)").unwrap();
        assert_eq!(mirror.find_overlap(&candidate).unwrap().id, "ok");
    }

    #[test]
    fn upsert_replaces_by_id() {
        let mut mirror = AnnotationMirror::new();
        mirror.upsert(annotation("a", "epubcfi(/6/4!/4/2,/1:0,/1:4)"));
        let mut changed = annotation("a", "epubcfi(/6/4!/4/2,/1:0,/1:4)");
        changed.style = AnnotationStyle::Underline;
        mirror.upsert(changed);

        assert_eq!(mirror.len(), 1);
        assert_eq!(
            mirror.get("a").unwrap().style,
            AnnotationStyle::Underline
        );
        assert!(mirror.remove("a").is_some());
        assert!(mirror.is_empty());
    }

    #[test]
    fn patch_clears_note() {
        let mut a = annotation("a", "epubcfi(/1:0)");
        a.note = Some("old".to_string());
        let patch = AnnotationPatch {
            note: Some(None),
            ..Default::default()
        };
        patch.apply_to(&mut a, Utc::now());
        assert!(a.note.is_none());
        assert!(a.updated_at.is_some());
    }
}
