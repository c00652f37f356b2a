//! Comic reader: page source + loader pool + paged state.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, info};

use super::PrefetchConfig;
use super::loader::{ImageLoaderPool, LoadedImage};
use super::paged::{PageCommand, PageEffect, PagedReader};
use super::source::{PageSource, open_source};

pub struct ComicReader {
    pages: PagedReader,
    pool: ImageLoaderPool,
    in_flight: HashSet<String>,
    shown: Vec<String>,
    loading: bool,
    crossfade_deadline: Option<Instant>,
}

impl ComicReader {
    pub fn open(path: &Path, config: &PrefetchConfig) -> Result<Self> {
        let source: Arc<dyn PageSource> = Arc::from(open_source(path)?);
        info!(
            "Opened {} with {} pages",
            path.display(),
            source.page_count()
        );
        Ok(Self::with_source(source, config))
    }

    #[must_use]
    pub fn with_source(source: Arc<dyn PageSource>, config: &PrefetchConfig) -> Self {
        let pages = PagedReader::new(source.urls().to_vec(), config);
        let pool = ImageLoaderPool::new(source, config.workers);
        Self {
            pages,
            pool,
            in_flight: HashSet::new(),
            shown: Vec::new(),
            loading: false,
            crossfade_deadline: None,
        }
    }

    pub fn pages(&self) -> &PagedReader {
        &self.pages
    }

    /// URLs currently on screen.
    pub fn shown(&self) -> &[String] {
        &self.shown
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn image(&mut self, url: &str) -> Option<Arc<LoadedImage>> {
        self.pages.image(url)
    }

    pub fn apply(&mut self, cmd: PageCommand) {
        let effects = self.pages.apply(cmd);
        self.execute(effects);
    }

    fn execute(&mut self, effects: Vec<PageEffect>) {
        let mut rejected = Vec::new();
        for effect in effects {
            match effect {
                PageEffect::Load(url) => match self.pool.submit(&url) {
                    Ok(()) => {
                        self.in_flight.insert(url);
                    }
                    Err(err) => rejected.push((url, err)),
                },
                PageEffect::Evict(url) => debug!("Released {url}"),
                PageEffect::Show { urls, crossfade } => {
                    debug!("Showing {urls:?} (crossfade: {crossfade})");
                    self.shown = urls;
                    self.loading = false;
                }
                PageEffect::ShowLoading => self.loading = true,
                PageEffect::ScheduleCrossfadeEnd(after) => {
                    self.crossfade_deadline = Some(Instant::now() + after);
                }
            }
        }

        for (url, err) in rejected {
            self.apply(PageCommand::ImageSettled {
                url,
                outcome: Err(err),
            });
        }
    }

    /// Feed finished loads and elapsed crossfades back into the state.
    /// Returns the number of loads processed.
    pub fn pump(&mut self) -> usize {
        let responses = self.pool.poll();
        let count = responses.len();
        for response in responses {
            self.in_flight.remove(&response.url);
            self.apply(PageCommand::ImageSettled {
                url: response.url,
                outcome: response.result,
            });
        }

        if self
            .crossfade_deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
        {
            self.crossfade_deadline = None;
            self.apply(PageCommand::CrossfadeFinished);
        }
        count
    }

    /// Block until every requested load has settled or `timeout` passes.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.in_flight.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let Some(response) = self.pool.recv_timeout(deadline - now) else {
                return false;
            };
            self.in_flight.remove(&response.url);
            self.apply(PageCommand::ImageSettled {
                url: response.url,
                outcome: response.result,
            });
        }
        true
    }
}
