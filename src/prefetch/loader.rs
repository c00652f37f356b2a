//! Image loader worker pool
//!
//! Workers pull load requests from a shared flume channel and send results
//! back on a second channel. The owner drains results with [`ImageLoaderPool::poll`],
//! so the cache is only ever touched on the owner's thread.

use std::sync::Arc;
use std::time::Duration;

use flume::{Receiver, Sender};
use log::{debug, warn};
use thiserror::Error;

use super::source::PageSource;

/// A decoded-enough page image: raw bytes plus pixel dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub url: String,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("read {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("archive entry {url}: {source}")]
    Archive {
        url: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("{url} is not a recognizable image")]
    Format { url: String },

    #[error("{detail}")]
    Generic { detail: String },
}

impl LoadError {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}

/// Read `url` from `source` and probe its dimensions.
pub fn load_image(source: &dyn PageSource, url: &str) -> Result<LoadedImage, LoadError> {
    let bytes = source.read(url)?;
    let size = imagesize::blob_size(&bytes).map_err(|_| LoadError::Format {
        url: url.to_string(),
    })?;

    Ok(LoadedImage {
        url: url.to_string(),
        width: u32::try_from(size.width).unwrap_or(u32::MAX),
        height: u32::try_from(size.height).unwrap_or(u32::MAX),
        bytes,
    })
}

#[derive(Debug)]
enum LoadRequest {
    Load { url: String },
    Shutdown,
}

#[derive(Debug)]
pub struct LoadResponse {
    pub url: String,
    pub result: Result<LoadedImage, LoadError>,
}

fn load_worker(
    source: Arc<dyn PageSource>,
    requests: Receiver<LoadRequest>,
    responses: Sender<LoadResponse>,
) {
    for request in requests {
        match request {
            LoadRequest::Load { url } => {
                let result = load_image(source.as_ref(), &url);
                if let Err(err) = &result {
                    warn!("Failed to load page image: {err}");
                }
                if responses.send(LoadResponse { url, result }).is_err() {
                    break;
                }
            }
            LoadRequest::Shutdown => break,
        }
    }
}

pub struct ImageLoaderPool {
    request_tx: Sender<LoadRequest>,
    response_rx: Receiver<LoadResponse>,
    num_workers: usize,
}

impl ImageLoaderPool {
    #[must_use]
    pub fn new(source: Arc<dyn PageSource>, num_workers: usize) -> Self {
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let num_workers = num_workers.max(1);
        for _ in 0..num_workers {
            let source = Arc::clone(&source);
            let rx = request_rx.clone();
            let tx = response_tx.clone();
            std::thread::spawn(move || load_worker(source, rx, tx));
        }
        debug!("Started {num_workers} image loader workers");

        Self {
            request_tx,
            response_rx,
            num_workers,
        }
    }

    /// Queue a load. Fails once every worker has exited.
    pub fn submit(&self, url: &str) -> Result<(), LoadError> {
        self.request_tx
            .send(LoadRequest::Load {
                url: url.to_string(),
            })
            .map_err(|_| {
                warn!("Image loader pool is stopped, cannot load {url}");
                LoadError::generic(format!("loader stopped before {url}"))
            })
    }

    /// Completed loads, without blocking.
    pub fn poll(&self) -> Vec<LoadResponse> {
        self.response_rx.try_iter().collect()
    }

    /// Wait up to `timeout` for the next completed load.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<LoadResponse> {
        self.response_rx.recv_timeout(timeout).ok()
    }

    pub fn shutdown(&self) {
        for _ in 0..self.num_workers {
            let _ = self.request_tx.send(LoadRequest::Shutdown);
        }
    }
}

impl Drop for ImageLoaderPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
