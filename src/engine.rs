//! Rendering-engine collaborator.
//!
//! The book renderer (EPUB/PDF layout, sections, search) is external. The
//! interaction engine reads its live state through [`Surface`] and sends it
//! commands through [`RenderingEngine`]. The renderer lives in an inner
//! frame with its own coordinate space; [`Rect::to_outer`] maps between the
//! two.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::annotation::{AnnotationStyle, Color};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Map a point local to this rect (e.g. an inner frame) into the
    /// coordinate space the rect itself is expressed in.
    pub fn to_outer(&self, local: Point) -> Point {
        Point::new(local.x + self.x, local.y + self.y)
    }

    /// Same as [`Rect::to_outer`] for a whole rectangle.
    pub fn rect_to_outer(&self, local: Rect) -> Rect {
        Rect::new(local.x + self.x, local.y + self.y, local.width, local.height)
    }
}

/// The renderer's current text selection, in frame-local coordinates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveSelection {
    pub text: String,
    pub position_id: String,
    pub section_index: usize,
    pub rect: Rect,
}

impl LiveSelection {
    pub fn is_collapsed(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A rendered annotation overlay. The renderer keys overlays by position id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overlay {
    pub position_id: String,
    pub color: Color,
    pub style: AnnotationStyle,
}

/// Events the renderer pushes to the host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A section finished loading; overlays must be re-applied
    Loaded { section_index: usize },
    /// The visible location changed
    Relocated {
        position_id: String,
        fraction: f32,
        section_index: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("overlay rejected for {0}")]
    Overlay(String),

    #[error("cannot navigate to {0}")]
    UnknownTarget(String),
}

/// Read side of the renderer.
pub trait Surface {
    /// Live selection, if any (collapsed selections may be reported).
    fn selection(&self) -> Option<LiveSelection>;

    /// Bounds of the inner rendering frame within the reading surface.
    fn frame_rect(&self) -> Rect;

    /// Size of the outer reading surface.
    fn viewport(&self) -> Size;

    fn is_touch_capable(&self) -> bool;

    /// True while keyboard focus sits in a text input.
    fn focus_in_editable(&self) -> bool;

    fn has_live_selection(&self) -> bool {
        self.selection().is_some_and(|s| !s.is_collapsed())
    }
}

/// Command side of the renderer.
pub trait RenderingEngine: Surface {
    fn add_annotation(&mut self, overlay: &Overlay) -> Result<(), EngineError>;

    fn delete_annotation(&mut self, position_id: &str) -> Result<(), EngineError>;

    fn clear_selection(&mut self);

    fn next(&mut self);

    fn prev(&mut self);

    fn go_to(&mut self, target: &str) -> Result<(), EngineError>;
}
