//! Paged image reader state
//!
//! Reducer over the displayed page(s), the prefetch window and the image
//! cache. The host executes the returned effects: it starts loads, releases
//! evicted images and swaps what is on screen.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use log::debug;

use super::PrefetchConfig;
use super::cache::ImageCache;
use super::loader::{LoadError, LoadedImage};
use super::window::{compute_window, displayed_pages};

#[derive(Debug)]
pub enum PageCommand {
    GoTo(usize),
    Next,
    Previous,
    SetTwoPage(bool),
    ImageSettled {
        url: String,
        outcome: Result<LoadedImage, LoadError>,
    },
    CrossfadeFinished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEffect {
    /// Start loading this image
    Load(String),
    /// Image left the cache
    Evict(String),
    /// Put these images on screen
    Show { urls: Vec<String>, crossfade: bool },
    /// Keep the old content and indicate loading
    ShowLoading,
    /// Send `CrossfadeFinished` after this long
    ScheduleCrossfadeEnd(Duration),
}

/// Smallest cache that can hold the window, the target spread and the
/// spread still on screen.
pub fn min_cache_capacity(radius: usize) -> usize {
    (2 * radius + 1) * 2 + 2
}

pub struct PagedReader {
    urls: Vec<String>,
    current: usize,
    radius: usize,
    two_page: bool,
    crossfade: Duration,
    cache: ImageCache,
    displayed: Vec<usize>,
    /// Outgoing pages during a crossfade
    previous: Vec<usize>,
    /// Target pages still waiting for their images
    pending: Option<Vec<usize>>,
}

impl PagedReader {
    #[must_use]
    pub fn new(urls: Vec<String>, config: &PrefetchConfig) -> Self {
        let capacity = config.cache_capacity.max(min_cache_capacity(config.radius));
        Self {
            urls,
            current: 0,
            radius: config.radius,
            two_page: config.two_page,
            crossfade: Duration::from_millis(config.crossfade_ms),
            cache: ImageCache::new(capacity),
            displayed: Vec::new(),
            previous: Vec::new(),
            pending: None,
        }
    }

    pub fn page_count(&self) -> usize {
        self.urls.len()
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn is_two_page(&self) -> bool {
        self.two_page
    }

    pub fn is_transitioning(&self) -> bool {
        self.pending.is_some()
    }

    pub fn displayed_urls(&self) -> Vec<String> {
        self.displayed.iter().map(|&p| self.urls[p].clone()).collect()
    }

    pub fn previous_urls(&self) -> Vec<String> {
        self.previous.iter().map(|&p| self.urls[p].clone()).collect()
    }

    /// Current prefetch window (page indices).
    pub fn window(&self) -> BTreeSet<usize> {
        compute_window(self.current, self.radius, self.two_page, self.urls.len())
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn image(&mut self, url: &str) -> Option<Arc<LoadedImage>> {
        self.cache.get(url)
    }

    #[must_use]
    pub fn apply(&mut self, cmd: PageCommand) -> Vec<PageEffect> {
        match cmd {
            PageCommand::GoTo(page) => self.go_to(page),

            PageCommand::Next => {
                let next = self.current + self.step();
                if next >= self.urls.len() {
                    vec![]
                } else {
                    self.go_to(next)
                }
            }

            PageCommand::Previous => {
                if self.current == 0 {
                    vec![]
                } else {
                    self.go_to(self.current.saturating_sub(self.step()))
                }
            }

            PageCommand::SetTwoPage(two_page) => {
                if self.two_page == two_page {
                    return vec![];
                }
                self.two_page = two_page;
                self.current = self.normalize(self.current);
                self.transition()
            }

            PageCommand::ImageSettled { url, outcome } => {
                // Inserting outside the keep set could push a ready target out of the LRU.
                if self.is_kept(&url) {
                    self.cache.settle(&url, outcome);
                } else {
                    debug!("Dropped late image {url}");
                }
                let Some(target) = self.pending.clone() else {
                    return vec![];
                };

                let mut effects = Vec::new();
                for &page in &target {
                    let url = &self.urls[page];
                    if !self.cache.contains(url) && self.cache.request(url) {
                        effects.push(PageEffect::Load(url.clone()));
                    }
                }
                if target.iter().all(|&p| self.cache.is_settled(&self.urls[p])) {
                    effects.extend(self.swap(target, false));
                }
                effects
            }

            PageCommand::CrossfadeFinished => {
                self.previous.clear();
                vec![]
            }
        }
    }

    fn step(&self) -> usize {
        if self.two_page { 2 } else { 1 }
    }

    fn normalize(&self, page: usize) -> usize {
        let page = page.min(self.urls.len().saturating_sub(1));
        if self.two_page { page - page % 2 } else { page }
    }

    fn go_to(&mut self, page: usize) -> Vec<PageEffect> {
        if self.urls.is_empty() {
            return vec![];
        }
        let target = self.normalize(page);
        if target == self.current && self.pending.is_none() && !self.displayed.is_empty() {
            return vec![];
        }
        self.current = target;
        self.transition()
    }

    fn transition(&mut self) -> Vec<PageEffect> {
        let target = displayed_pages(self.current, self.two_page, self.urls.len());
        let window = self.window();
        debug!("Transition to {target:?}, prefetch window {window:?}");

        self.pending = Some(target.clone());
        let mut effects = self.evict_outside_window(&window);

        for &page in target.iter().chain(window.iter()) {
            let url = &self.urls[page];
            if self.cache.request(url) {
                effects.push(PageEffect::Load(url.clone()));
            }
        }

        if target.iter().all(|&p| self.cache.is_ready(&self.urls[p])) {
            effects.extend(self.swap(target, true));
        } else {
            effects.push(PageEffect::ShowLoading);
        }
        effects
    }

    fn swap(&mut self, target: Vec<usize>, crossfade: bool) -> Vec<PageEffect> {
        self.pending = None;
        let had_content = !self.displayed.is_empty();
        self.previous = std::mem::replace(&mut self.displayed, target);

        let crossfade = crossfade && had_content;
        let mut effects = vec![PageEffect::Show {
            urls: self.displayed_urls(),
            crossfade,
        }];
        if crossfade {
            effects.push(PageEffect::ScheduleCrossfadeEnd(self.crossfade));
        } else {
            self.previous.clear();
        }

        let window = self.window();
        effects.extend(self.evict_outside_window(&window));
        effects
    }

    fn is_kept(&self, url: &str) -> bool {
        let Some(page) = self.urls.iter().position(|u| u == url) else {
            return false;
        };
        self.window().contains(&page)
            || self.displayed.contains(&page)
            || self.pending.as_ref().is_some_and(|t| t.contains(&page))
    }

    /// Evict everything outside window ∪ displayed ∪ pending target.
    fn evict_outside_window(&mut self, window: &BTreeSet<usize>) -> Vec<PageEffect> {
        let keep: HashSet<&str> = window
            .iter()
            .chain(self.displayed.iter())
            .chain(self.pending.iter().flatten())
            .map(|&p| self.urls[p].as_str())
            .collect();

        let evicted = self.cache.retain_only(&keep);
        if !evicted.is_empty() {
            debug!("Evicted {} page images", evicted.len());
        }
        evicted.into_iter().map(PageEffect::Evict).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefetch::cache::tests::image;

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("p{i}.png")).collect()
    }

    fn reader(n: usize, radius: usize, two_page: bool) -> PagedReader {
        PagedReader::new(
            urls(n),
            &PrefetchConfig {
                radius,
                two_page,
                ..Default::default()
            },
        )
    }

    fn settle_ok(reader: &mut PagedReader, url: &str) -> Vec<PageEffect> {
        reader.apply(PageCommand::ImageSettled {
            url: url.to_string(),
            outcome: Ok(image(url)),
        })
    }

    fn loads(effects: &[PageEffect]) -> Vec<String> {
        effects
            .iter()
            .filter_map(|e| match e {
                PageEffect::Load(url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    fn settle_loads(reader: &mut PagedReader, effects: &[PageEffect]) {
        for url in loads(effects) {
            let _ = settle_ok(reader, &url);
        }
    }

    #[test]
    fn first_page_loads_target_then_window() {
        let mut r = reader(30, 2, false);
        let effects = r.apply(PageCommand::GoTo(10));
        assert_eq!(
            loads(&effects),
            vec!["p10.png", "p8.png", "p9.png", "p11.png", "p12.png"]
        );
        assert_eq!(effects.last(), Some(&PageEffect::ShowLoading));
        assert!(r.is_transitioning());

        let effects = settle_ok(&mut r, "p10.png");
        assert_eq!(
            effects,
            vec![PageEffect::Show {
                urls: vec!["p10.png".to_string()],
                crossfade: false
            }]
        );
        assert!(!r.is_transitioning());
    }

    #[test]
    fn ready_target_swaps_with_crossfade() {
        let mut r = reader(30, 2, false);
        let effects = r.apply(PageCommand::GoTo(10));
        settle_loads(&mut r, &effects);

        let effects = r.apply(PageCommand::Next);
        assert_eq!(loads(&effects), vec!["p13.png"]);
        assert!(effects.contains(&PageEffect::Show {
            urls: vec!["p11.png".to_string()],
            crossfade: true
        }));
        assert!(effects.contains(&PageEffect::ScheduleCrossfadeEnd(Duration::from_millis(150))));
        assert!(effects.contains(&PageEffect::Evict("p8.png".to_string())));
        assert_eq!(r.previous_urls(), vec!["p10.png"]);

        assert!(r.apply(PageCommand::CrossfadeFinished).is_empty());
        assert!(r.previous_urls().is_empty());
    }

    #[test]
    fn displayed_page_survives_until_swap() {
        let mut r = reader(30, 2, false);
        let effects = r.apply(PageCommand::GoTo(10));
        settle_loads(&mut r, &effects);

        let effects = r.apply(PageCommand::GoTo(20));
        assert!(!effects.contains(&PageEffect::Evict("p10.png".to_string())));
        assert!(r.cache().is_ready("p10.png"));
        assert_eq!(r.displayed_urls(), vec!["p10.png"]);

        let effects = settle_ok(&mut r, "p20.png");
        assert!(effects.contains(&PageEffect::Evict("p10.png".to_string())));
        assert_eq!(r.displayed_urls(), vec!["p20.png"]);
    }

    #[test]
    fn failed_image_does_not_block_swap() {
        let mut r = reader(30, 1, false);
        let _ = r.apply(PageCommand::GoTo(3));
        let effects = r.apply(PageCommand::ImageSettled {
            url: "p3.png".to_string(),
            outcome: Err(LoadError::generic("404")),
        });
        assert_eq!(
            effects,
            vec![PageEffect::Show {
                urls: vec!["p3.png".to_string()],
                crossfade: false
            }]
        );
    }

    #[test]
    fn newer_goto_supersedes_pending_target() {
        let mut r = reader(30, 1, false);
        let _ = r.apply(PageCommand::GoTo(5));
        let _ = r.apply(PageCommand::GoTo(9));

        assert!(settle_ok(&mut r, "p5.png").is_empty());
        let effects = settle_ok(&mut r, "p9.png");
        assert!(effects.contains(&PageEffect::Show {
            urls: vec!["p9.png".to_string()],
            crossfade: false
        }));
    }

    #[test]
    fn late_completion_outside_window_is_dropped() {
        let mut r = reader(30, 1, false);
        let effects = r.apply(PageCommand::GoTo(5));
        settle_loads(&mut r, &effects);
        let _ = r.apply(PageCommand::GoTo(20));

        // p4 was in flight for the old window and completes late.
        assert!(settle_ok(&mut r, "p4.png").is_empty());
        assert!(!r.cache().contains("p4.png"));

        let effects = settle_ok(&mut r, "p20.png");
        assert!(effects.contains(&PageEffect::Show {
            urls: vec!["p20.png".to_string()],
            crossfade: false
        }));
    }

    #[test]
    fn late_completions_cannot_push_out_a_ready_spread() {
        let mut r = reader(60, 1, true);
        let first = r.apply(PageCommand::GoTo(10));
        let second = r.apply(PageCommand::GoTo(20));
        let _ = r.apply(PageCommand::GoTo(40));
        assert!(settle_ok(&mut r, "p40.png").is_empty());

        for url in loads(&first).into_iter().chain(loads(&second)) {
            let _ = settle_ok(&mut r, &url);
        }
        assert!(r.cache().is_ready("p40.png"));

        let effects = settle_ok(&mut r, "p41.png");
        assert!(effects.contains(&PageEffect::Show {
            urls: vec!["p40.png".to_string(), "p41.png".to_string()],
            crossfade: false
        }));
        assert!(!r.is_transitioning());
        assert!(r.cache().len() <= r.cache().capacity());
    }

    #[test]
    fn missing_target_is_requested_again() {
        let mut r = reader(30, 1, false);
        let _ = r.apply(PageCommand::GoTo(5));
        r.cache.clear();

        let effects = settle_ok(&mut r, "p4.png");
        assert_eq!(loads(&effects), vec!["p5.png"]);
        assert!(r.is_transitioning());
        let effects = settle_ok(&mut r, "p5.png");
        assert!(effects.contains(&PageEffect::Show {
            urls: vec!["p5.png".to_string()],
            crossfade: false
        }));
    }

    #[test]
    fn two_page_spreads() {
        let mut r = reader(30, 2, true);
        let effects = r.apply(PageCommand::GoTo(11));
        assert_eq!(r.current(), 10);
        let mut loaded = loads(&effects);
        loaded.sort();
        let mut expected: Vec<String> = [10, 11, 6, 7, 8, 9, 12, 13, 14, 15]
            .iter()
            .map(|i| format!("p{i}.png"))
            .collect();
        expected.sort();
        assert_eq!(loaded, expected);

        settle_loads(&mut r, &effects);
        assert_eq!(r.displayed_urls(), vec!["p10.png", "p11.png"]);

        let _ = r.apply(PageCommand::Next);
        assert_eq!(r.current(), 12);
        assert_eq!(r.displayed_urls(), vec!["p12.png", "p13.png"]);
    }

    #[test]
    fn bounds_are_no_ops() {
        let mut r = reader(3, 1, false);
        let effects = r.apply(PageCommand::GoTo(0));
        settle_loads(&mut r, &effects);
        assert!(r.apply(PageCommand::Previous).is_empty());

        let _ = r.apply(PageCommand::GoTo(99));
        assert_eq!(r.current(), 2);
        assert!(r.apply(PageCommand::Next).is_empty());

        let mut empty = reader(0, 1, false);
        assert!(empty.apply(PageCommand::GoTo(0)).is_empty());
    }

    #[test]
    fn cache_never_exceeds_keep_set() {
        let mut r = reader(100, 2, false);
        for page in [0, 1, 2, 50, 51, 99, 98, 10] {
            let effects = r.apply(PageCommand::GoTo(page));
            settle_loads(&mut r, &effects);
            let mut keep: HashSet<String> = r
                .window()
                .iter()
                .map(|p| format!("p{p}.png"))
                .collect();
            keep.extend(r.displayed_urls());
            assert!(r.cache().len() <= keep.len());
        }
    }
}
