use serde::{Deserialize, Serialize};

use crate::engine::{Rect, Size};

const EDGE_MARGIN: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopupPlacement {
    Above,
    Below,
}

/// Where the selection popup goes, in outer-surface coordinates.
///
/// `x` is the popup's left edge. `y` is the selection edge the popup attaches
/// to: the top edge when placed above, the bottom edge when placed below.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopupAnchor {
    pub x: f32,
    pub y: f32,
    pub placement: PopupPlacement,
}

/// Anchor a popup of `popup_width` to `selection` (already in outer
/// coordinates), keeping it inside `viewport`.
pub fn place_popup(
    selection: Rect,
    viewport: Size,
    popup_width: f32,
    min_room_above: f32,
) -> PopupAnchor {
    let placement = if selection.y < min_room_above {
        PopupPlacement::Below
    } else {
        PopupPlacement::Above
    };

    let y = match placement {
        PopupPlacement::Above => selection.y,
        PopupPlacement::Below => selection.bottom(),
    };

    let max_x = (viewport.width - popup_width - EDGE_MARGIN).max(EDGE_MARGIN);
    let x = (selection.center_x() - popup_width / 2.0).clamp(EDGE_MARGIN, max_x);

    PopupAnchor { x, y, placement }
}
