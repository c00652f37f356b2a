//! Infinite-scroll strip: pages stacked vertically, appended in batches as
//! the reader nears the bottom.

use std::collections::BTreeSet;
use std::ops::Range;

use log::debug;

use crate::engine::Rect;

/// Fraction of the strip that must be scrolled past before appending
pub const EXTEND_THRESHOLD: f32 = 0.8;

#[derive(Debug, Clone)]
pub struct ScrollStrip {
    page_count: usize,
    radius: usize,
    start: usize,
    /// Exclusive end of the loaded range
    end: usize,
    current: usize,
    /// Appended pages whose images have not settled yet
    extending: BTreeSet<usize>,
}

impl ScrollStrip {
    /// Strip starting at `current` with `radius + 1` pages loaded.
    pub fn new(current: usize, radius: usize, page_count: usize) -> Self {
        let start = current.min(page_count);
        let end = (start + radius + 1).min(page_count);
        Self {
            page_count,
            radius,
            start,
            end,
            current: start,
            extending: BTreeSet::new(),
        }
    }

    /// Contiguous loaded page range.
    pub fn pages(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn is_extending(&self) -> bool {
        !self.extending.is_empty()
    }

    /// Scroll position changed. Returns newly appended pages, if the
    /// reader is close enough to the bottom and no append is in flight.
    pub fn on_scroll(
        &mut self,
        scroll_top: f32,
        client_height: f32,
        scroll_height: f32,
    ) -> Vec<usize> {
        if self.is_extending() || self.end >= self.page_count {
            return Vec::new();
        }
        if scroll_top + client_height < EXTEND_THRESHOLD * scroll_height {
            return Vec::new();
        }

        let new_end = (self.end + self.radius + 1).min(self.page_count);
        let appended: Vec<usize> = (self.end..new_end).collect();
        debug!("Appending pages {}..{new_end} to scroll strip", self.end);
        self.extending.extend(appended.iter().copied());
        self.end = new_end;
        appended
    }

    /// An appended page's image settled (either way).
    pub fn page_settled(&mut self, page: usize) {
        self.extending.remove(&page);
    }

    /// Pick the page whose rectangle straddles the vertical midpoint of the
    /// viewport. `rects` are page rectangles in viewport coordinates.
    pub fn track_current(
        &mut self,
        rects: &[(usize, Rect)],
        viewport_height: f32,
    ) -> Option<usize> {
        let mid = viewport_height / 2.0;
        let (page, _) = rects
            .iter()
            .find(|(_, rect)| rect.y <= mid && rect.bottom() > mid)?;

        if *page == self.current {
            return None;
        }
        self.current = *page;
        Some(*page)
    }
}
