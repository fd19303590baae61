//! Single-slot holder of the image currently shown on a surface.
//!
//! The slot is a `watch` channel: writes replace the whole [`Frame`] under the
//! channel's write lock, reads clone an `Arc` under its read lock, and redraw
//! code can await the next replacement.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;
use tokio::sync::watch;

/// Immutable snapshot of what a surface shows.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    image: Option<Arc<RgbaImage>>,
    path: Option<PathBuf>,
}

impl Frame {
    #[must_use]
    pub fn new(image: Arc<RgbaImage>, path: PathBuf) -> Self {
        Self {
            image: Some(image),
            path: Some(path),
        }
    }

    /// The "nothing shown" frame.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn image(&self) -> Option<&Arc<RgbaImage>> {
        self.image.as_ref()
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

/// Writer side; owned by exactly one surface's producer.
#[derive(Debug)]
pub struct FrameStore {
    tx: watch::Sender<Arc<Frame>>,
}

impl FrameStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_frame(Frame::empty())
    }

    #[must_use]
    pub fn with_frame(frame: Frame) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(frame));
        Self { tx }
    }

    /// Replace image and path together.
    pub fn set(&self, frame: Frame) {
        self.tx.send_replace(Arc::new(frame));
    }

    pub fn clear(&self) {
        self.set(Frame::empty());
    }

    #[must_use]
    pub fn get(&self) -> Arc<Frame> {
        Arc::clone(&self.tx.borrow())
    }

    #[must_use]
    pub fn has_image(&self) -> bool {
        self.tx.borrow().has_image()
    }

    /// Reader handle for a redraw path.
    #[must_use]
    pub fn watch(&self) -> FrameWatcher {
        FrameWatcher {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader side of a [`FrameStore`]; cheap to clone and share between threads.
#[derive(Debug, Clone)]
pub struct FrameWatcher {
    rx: watch::Receiver<Arc<Frame>>,
}

impl FrameWatcher {
    #[must_use]
    pub fn get(&self) -> Arc<Frame> {
        Arc::clone(&self.rx.borrow())
    }

    #[must_use]
    pub fn has_image(&self) -> bool {
        self.rx.borrow().has_image()
    }

    /// Wait for the next write and return the new frame. `None` once the
    /// store is gone.
    pub async fn changed(&mut self) -> Option<Arc<Frame>> {
        self.rx.changed().await.ok()?;
        Some(Arc::clone(&self.rx.borrow_and_update()))
    }
}
