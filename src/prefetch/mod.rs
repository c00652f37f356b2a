//! Adjacent-page prefetch for image-paginated books (comic archives).
//!
//! ```text
//!   PageCommand ──► PagedReader::apply ──► PageEffect
//!                        │                    │ Load(url)
//!                   ImageCache (LRU)          ▼
//!                        ▲              ImageLoaderPool ── workers ── PageSource
//!                        └─ ImageSettled ◄────┘
//! ```
//!
//! The cache never keeps a page outside the prefetch window, the displayed
//! pages and the pending transition target once a recompute has run.

mod cache;
mod comic;
mod loader;
mod paged;
mod scroll;
mod source;
mod window;

use serde::{Deserialize, Serialize};

pub use cache::{CacheEntry, ImageCache};
pub use comic::ComicReader;
pub use loader::{ImageLoaderPool, LoadError, LoadResponse, LoadedImage, load_image};
pub use paged::{PageCommand, PageEffect, PagedReader, min_cache_capacity};
pub use scroll::{EXTEND_THRESHOLD, ScrollStrip};
pub use source::{CbzSource, DirectorySource, PageSource, open_source};
pub use window::{compute_window, displayed_pages};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    /// Pages (or spreads) to prefetch on each side of the current one
    pub radius: usize,
    pub two_page: bool,
    pub workers: usize,
    pub crossfade_ms: u64,
    /// Raised to the minimum needed for `radius` when smaller
    pub cache_capacity: usize,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            radius: 2,
            two_page: false,
            workers: 2,
            crossfade_ms: 150,
            cache_capacity: 0,
        }
    }
}
