//! Page sources for image-paginated books.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::{debug, info};
use walkdir::WalkDir;

use super::loader::LoadError;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "avif"];

/// Ordered list of page images plus a way to read their bytes.
///
/// Implementations are shared with loader threads.
pub trait PageSource: Send + Sync {
    /// Page URLs in reading order
    fn urls(&self) -> &[String];

    fn read(&self, url: &str) -> Result<Vec<u8>, LoadError>;

    fn page_count(&self) -> usize {
        self.urls().len()
    }
}

fn is_image_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

fn natural_sort(urls: &mut [String]) {
    urls.sort_by(|a, b| natord::compare(a, b));
}

/// Loose image files under a directory, searched recursively.
#[derive(Debug)]
pub struct DirectorySource {
    root: PathBuf,
    urls: Vec<String>,
}

impl DirectorySource {
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            bail!("{} is not a directory", root.display());
        }

        let mut urls: Vec<String> = WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let rel = e.path().strip_prefix(root).ok()?;
                let rel = rel.to_str()?.replace('\\', "/");
                is_image_name(&rel).then_some(rel)
            })
            .collect();
        natural_sort(&mut urls);

        info!("Found {} page images under {}", urls.len(), root.display());
        Ok(Self {
            root: root.to_path_buf(),
            urls,
        })
    }
}

impl PageSource for DirectorySource {
    fn urls(&self) -> &[String] {
        &self.urls
    }

    fn read(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        fs::read(self.root.join(url)).map_err(|source| LoadError::Io {
            url: url.to_string(),
            source,
        })
    }
}

/// Comic book zip archive. Each read reopens the archive so loader threads
/// never share a reader.
#[derive(Debug)]
pub struct CbzSource {
    path: PathBuf,
    urls: Vec<String>,
}

impl CbzSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let archive = zip::ZipArchive::new(file)
            .with_context(|| format!("read archive {}", path.display()))?;

        let mut urls: Vec<String> = archive
            .file_names()
            .filter(|name| !name.ends_with('/') && !name.starts_with("__MACOSX"))
            .filter(|name| is_image_name(name))
            .map(str::to_string)
            .collect();
        natural_sort(&mut urls);

        info!("Found {} page images in {}", urls.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            urls,
        })
    }
}

impl PageSource for CbzSource {
    fn urls(&self) -> &[String] {
        &self.urls
    }

    fn read(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        let file = File::open(&self.path).map_err(|source| LoadError::Io {
            url: url.to_string(),
            source,
        })?;
        let archive_err = |source| LoadError::Archive {
            url: url.to_string(),
            source,
        };
        let mut archive = zip::ZipArchive::new(file).map_err(archive_err)?;
        let mut entry = archive.by_name(url).map_err(archive_err)?;

        let mut bytes = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry.read_to_end(&mut bytes).map_err(|source| LoadError::Io {
            url: url.to_string(),
            source,
        })?;
        debug!("Read {url} ({} bytes)", bytes.len());
        Ok(bytes)
    }
}

/// Open a directory or a `.cbz`/`.zip` archive.
pub fn open_source(path: &Path) -> Result<Box<dyn PageSource>> {
    if path.is_dir() {
        return Ok(Box::new(DirectorySource::open(path)?));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match ext.as_deref() {
        Some("cbz" | "zip") => Ok(Box::new(CbzSource::open(path)?)),
        _ => bail!("unsupported page source {}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use tempfile::TempDir;

    #[test]
    fn directory_pages_in_natural_order() {
        let dir = TempDir::new().unwrap();
        for name in ["page10.png", "page2.png", "page1.jpg", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("extra")).unwrap();
        fs::write(dir.path().join("extra/page3.webp"), b"x").unwrap();

        let source = DirectorySource::open(dir.path()).unwrap();
        assert_eq!(
            source.urls(),
            &["extra/page3.webp", "page1.jpg", "page2.png", "page10.png"]
        );
        assert_eq!(source.read("page2.png").unwrap(), b"x");
        assert!(matches!(source.read("missing.png"), Err(LoadError::Io { .. })));
    }

    #[test]
    fn cbz_pages_and_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book.cbz");
        let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for name in ["011.png", "002.png", "__MACOSX/002.png", "info.xml"] {
            zip.start_file(name, options).unwrap();
            zip.write_all(name.as_bytes()).unwrap();
        }
        zip.finish().unwrap();

        let source = open_source(&path).unwrap();
        assert_eq!(source.urls(), &["002.png", "011.png"]);
        assert_eq!(source.read("011.png").unwrap(), b"011.png");
        assert!(matches!(source.read("nope.png"), Err(LoadError::Archive { .. })));
    }

    #[test]
    fn rejects_unknown_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book.pdf");
        fs::write(&path, b"%PDF").unwrap();
        assert!(open_source(&path).is_err());
    }
}
