//! Directory scanning: discovers image files below a folder and, for ordered
//! playback, groups them by the directory that directly contains them.

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::ExtensionFilter;
use crate::error::Error;

/// Options controlling directory scanning.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Whether to recurse into subdirectories.
    pub recursive: bool,
    /// Extensions treated as images.
    pub extensions: ExtensionFilter,
    /// Sort the output and build a [`DirectoryIndex`].
    pub ordered: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            extensions: ExtensionFilter::default(),
            ordered: false,
        }
    }
}

/// Everything one scan produced. Replaced as a whole on rescan.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub paths: Vec<PathBuf>,
    /// Present only for ordered scans.
    pub index: Option<DirectoryIndex>,
}

/// Byte-wise path string ordering, used for every sorted structure.
pub(crate) fn path_order(a: &Path, b: &Path) -> Ordering {
    a.as_os_str().cmp(b.as_os_str())
}

/// Sorted directories, each with the sorted images it directly contains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryIndex {
    buckets: Vec<(PathBuf, Vec<PathBuf>)>,
}

impl DirectoryIndex {
    /// Group already-collected image paths by parent directory.
    #[must_use]
    pub fn build<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) -> Self {
        let mut buckets: Vec<(PathBuf, Vec<PathBuf>)> = Vec::new();
        for path in paths {
            let Some(dir) = path.parent() else { continue };
            match buckets.binary_search_by(|(d, _)| path_order(d, dir)) {
                Ok(pos) => buckets[pos].1.push(path.clone()),
                Err(pos) => buckets.insert(pos, (dir.to_path_buf(), vec![path.clone()])),
            }
        }
        for (_, bucket) in &mut buckets {
            bucket.sort_by(|a, b| path_order(a, b));
        }
        Self { buckets }
    }

    /// Number of distinct directories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Directory keys in ascending order.
    pub fn dirs(&self) -> impl Iterator<Item = &Path> {
        self.buckets.iter().map(|(d, _)| d.as_path())
    }

    /// Images directly inside `dir`, sorted.
    #[must_use]
    pub fn bucket(&self, dir: &Path) -> Option<&[PathBuf]> {
        self.buckets
            .binary_search_by(|(d, _)| path_order(d, dir))
            .ok()
            .map(|pos| self.buckets[pos].1.as_slice())
    }

    /// Forget `path`; a directory whose last image disappears is dropped.
    pub fn remove(&mut self, path: &Path) -> bool {
        let Some(dir) = path.parent() else {
            return false;
        };
        let Ok(pos) = self.buckets.binary_search_by(|(d, _)| path_order(d, dir)) else {
            return false;
        };
        let bucket = &mut self.buckets[pos].1;
        let Some(at) = bucket.iter().position(|p| p == path) else {
            return false;
        };
        bucket.remove(at);
        if bucket.is_empty() {
            self.buckets.remove(pos);
        }
        true
    }
}

/// Scan `root` for images.
///
/// Unreadable entries below the root are logged and skipped.
///
/// # Errors
/// Returns [`Error::Scan`] if the root itself is missing, not a directory or
/// cannot be listed.
pub fn scan(root: &Path, opts: &ScanOptions) -> Result<ScanResult, Error> {
    let scan_err = |source: io::Error| Error::Scan {
        root: root.to_path_buf(),
        source,
    };

    let meta = fs::metadata(root).map_err(scan_err)?;
    if !meta.is_dir() {
        return Err(scan_err(io::Error::from(io::ErrorKind::NotADirectory)));
    }

    let mut paths = Vec::new();
    if opts.recursive {
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    let source = err
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::other("filesystem loop at scan root"));
                    return Err(scan_err(source));
                }
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if entry.file_type().is_file() && opts.extensions.matches(entry.path()) {
                paths.push(entry.into_path());
            }
        }
    } else {
        for entry in fs::read_dir(root).map_err(scan_err)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(root = %root.display(), error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();
            if path.is_file() && opts.extensions.matches(&path) {
                paths.push(path);
            }
        }
    }

    let index = if opts.ordered {
        paths.sort_by(|a, b| path_order(a, b));
        Some(DirectoryIndex::build(&paths))
    } else {
        None
    };

    debug!(
        root = %root.display(),
        found = paths.len(),
        dirs = index.as_ref().map_or(0, DirectoryIndex::len),
        recursive = opts.recursive,
        "scan complete"
    );
    Ok(ScanResult { paths, index })
}
