//! Header/footer auto-visibility.
//!
//! The reader chrome appears when the pointer comes close to the top or
//! bottom edge (trigger zone) and stays while the pointer is over the bar
//! itself (hold zone). Pinning keeps both bars shown regardless of the
//! pointer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromeConfig {
    pub header_trigger_px: f32,
    /// Header bar height
    pub header_hold_px: f32,
    pub footer_trigger_px: f32,
    /// Footer bar height
    pub footer_hold_px: f32,
}

impl Default for ChromeConfig {
    fn default() -> Self {
        Self {
            header_trigger_px: 20.0,
            header_hold_px: 44.0,
            footer_trigger_px: 30.0,
            footer_hold_px: 52.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChromeState {
    pub header_visible: bool,
    pub footer_visible: bool,
    pub pinned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Header,
    Footer,
}

type Listener = Box<dyn FnMut(bool, bool)>;

pub struct ChromeVisibility {
    config: ChromeConfig,
    viewport_height: f32,
    last_y: Option<f32>,
    state: ChromeState,
    listener: Option<Listener>,
}

impl std::fmt::Debug for ChromeVisibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeVisibility")
            .field("viewport_height", &self.viewport_height)
            .field("last_y", &self.last_y)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl ChromeVisibility {
    pub fn new(config: ChromeConfig, viewport_height: f32) -> Self {
        Self {
            config,
            viewport_height,
            last_y: None,
            state: ChromeState::default(),
            listener: None,
        }
    }

    /// Called with `(header_visible, footer_visible)` whenever either changes.
    pub fn set_listener(&mut self, listener: impl FnMut(bool, bool) + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn state(&self) -> ChromeState {
        self.state
    }

    /// Pointer moved to `y` (surface coordinates). Returns the new state if
    /// visibility changed.
    pub fn on_pointer_y(&mut self, y: f32) -> Option<ChromeState> {
        self.last_y = Some(y);
        let (header, footer) = self.evaluate(y);
        self.set(header, footer)
    }

    pub fn pointer_left(&mut self) -> Option<ChromeState> {
        self.last_y = None;
        if self.state.pinned {
            return None;
        }
        self.set(false, false)
    }

    /// An explicit hover zone element (outside the reading frame) was entered.
    pub fn zone_entered(&mut self, edge: Edge) -> Option<ChromeState> {
        match edge {
            Edge::Header => self.set(true, self.state.footer_visible),
            Edge::Footer => self.set(self.state.header_visible, true),
        }
    }

    pub fn toggle_pinned(&mut self) -> Option<ChromeState> {
        self.state.pinned = !self.state.pinned;
        let (header, footer) = self.reevaluate();
        // Pin state itself counts as a change for callers, the listener only
        // hears about visibility.
        self.set(header, footer).or(Some(self.state))
    }

    pub fn set_viewport_height(&mut self, height: f32) -> Option<ChromeState> {
        self.viewport_height = height;
        let (header, footer) = self.reevaluate();
        self.set(header, footer)
    }

    fn reevaluate(&self) -> (bool, bool) {
        match self.last_y {
            Some(y) => self.evaluate(y),
            None => (self.state.pinned, self.state.pinned),
        }
    }

    fn evaluate(&self, y: f32) -> (bool, bool) {
        let pinned = self.state.pinned;
        let header = pinned
            || y <= self.config.header_trigger_px
            || (y <= self.config.header_hold_px && self.state.header_visible);

        let from_bottom = self.viewport_height - y;
        let footer = pinned
            || from_bottom <= self.config.footer_trigger_px
            || (from_bottom <= self.config.footer_hold_px && self.state.footer_visible);

        (header, footer)
    }

    fn set(&mut self, header: bool, footer: bool) -> Option<ChromeState> {
        if self.state.header_visible == header && self.state.footer_visible == footer {
            return None;
        }
        self.state.header_visible = header;
        self.state.footer_visible = footer;
        if let Some(listener) = self.listener.as_mut() {
            listener(header, footer);
        }
        Some(self.state)
    }
}
