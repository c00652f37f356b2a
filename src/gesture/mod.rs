//! Gesture disambiguation for the reading surface.
//!
//! Raw pointer, touch, selection and key input is reduced to a small set of
//! [`GestureEvent`]s. The router never sleeps: every delay (double-tap
//! window, long-press threshold, selection settle) is returned to the host as
//! a [`RouterOutput::Schedule`] and comes back later as
//! [`GestureInput::Timer`].

pub mod keys;
mod popup;
mod router;
mod zone;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use popup::{PopupAnchor, PopupPlacement, place_popup};
pub use router::{
    GestureEvent, GestureInput, GestureRouter, InputOrigin, RouterOutput, RouterTask,
    SelectionDetail,
};
pub use zone::{Zone, classify};

/// Thresholds used by the router. All durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Fraction of the width below which a tap is in the left zone
    pub left_zone: f32,
    /// Fraction of the width above which a tap is in the right zone
    pub right_zone: f32,
    pub double_tap_ms: u64,
    pub long_press_ms: u64,
    pub navigation_lock_ms: u64,
    /// Clicks this soon after a real touch end are browser duplicates
    pub synthetic_click_ms: u64,
    pub swipe_threshold_px: f32,
    pub tap_slop_px: f32,
    pub selection_debounce_ms: u64,
    pub selection_settle_ms: u64,
    pub selection_defer_ms: u64,
    pub popup_width: f32,
    pub popup_min_room_above: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            left_zone: 0.30,
            right_zone: 0.70,
            double_tap_ms: 300,
            long_press_ms: 500,
            navigation_lock_ms: 300,
            synthetic_click_ms: 500,
            swipe_threshold_px: 50.0,
            tap_slop_px: 10.0,
            selection_debounce_ms: 300,
            selection_settle_ms: 50,
            selection_defer_ms: 10,
            popup_width: 240.0,
            popup_min_room_above: 120.0,
        }
    }
}

impl GestureConfig {
    pub(crate) fn double_tap(&self) -> Duration {
        Duration::from_millis(self.double_tap_ms)
    }

    pub(crate) fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }

    pub(crate) fn navigation_lock(&self) -> Duration {
        Duration::from_millis(self.navigation_lock_ms)
    }

    pub(crate) fn synthetic_click(&self) -> Duration {
        Duration::from_millis(self.synthetic_click_ms)
    }
}
