use std::path::PathBuf;

use thiserror::Error;

/// Library error type for slideshow operations.
///
/// None of these are fatal to the player; each one is turned into a status
/// report and playback continues from a safe state.
#[derive(Debug, Error)]
pub enum Error {
    /// The scan root is missing, not a directory, or cannot be listed.
    #[error("cannot scan {}: {source}", root.display())]
    Scan {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The image codec rejected the file (corrupt or unsupported format).
    #[error("cannot decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Reading a file or its metadata failed.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Removing a file from disk failed (permissions, read-only media, ...).
    #[error("cannot delete {}: {source}", path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The resampler refused the requested geometry.
    #[error("resize failed: {0}")]
    Resize(String),
}

impl Error {
    /// Whether this error was caused by the file itself rather than by the
    /// environment. Such files are pruned from the playlist.
    #[must_use]
    pub fn is_bad_file(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::Io { .. })
    }
}
