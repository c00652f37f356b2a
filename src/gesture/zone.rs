use serde::{Deserialize, Serialize};

use super::GestureConfig;

/// Horizontal tap zone of the reading surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    Left,
    Middle,
    Right,
}

/// Classify `x` (outer-surface coordinates) within a surface `width` wide.
pub fn classify(x: f32, width: f32, config: &GestureConfig) -> Zone {
    if x < config.left_zone * width {
        Zone::Left
    } else if x > config.right_zone * width {
        Zone::Right
    } else {
        Zone::Middle
    }
}
