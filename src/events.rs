use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use image::RgbaImage;
use tokio::sync::oneshot;

use crate::config::PlayMode;
use crate::frame::FrameWatcher;
use crate::tree::DirectoryTree;

/// Filesystem changes noticed while a folder is loaded.
#[derive(Debug)]
pub enum InventoryEvent {
    PhotoRemoved(PathBuf),
}

/// Why a decode was requested; automatic advances are dropped once paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Tick,
    Manual,
}

/// Direction used when a failed decode is retried with the next candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
    /// Explicit index or jump; failures continue forward.
    Direct,
}

#[derive(Debug, Clone)]
pub struct LoadPhoto {
    pub path: PathBuf,
    pub origin: Origin,
    pub direction: Direction,
    /// Playback epoch the request belongs to; bumped on every reset.
    pub epoch: u64,
}

#[derive(Debug)]
pub struct PhotoLoaded {
    pub request: LoadPhoto,
    pub result: Result<Arc<RgbaImage>, crate::error::Error>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub severity: Severity,
    pub message: String,
}

impl StatusReport {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Info => f.write_str(&self.message),
            Severity::Error => write!(f, "error: {}", self.message),
        }
    }
}

/// Details shown for the current image.
#[derive(Debug, Clone, PartialEq)]
pub struct FileProperties {
    pub name: String,
    pub size_mib: f64,
    pub modified: String,
}

/// Point-in-time view of the player state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    pub running: bool,
    pub mode: PlayMode,
    pub current_index: Option<usize>,
    pub current_path: Option<PathBuf>,
    pub len: usize,
    pub interval_seconds: u64,
    pub folder: Option<PathBuf>,
    pub recursive: bool,
    pub fullscreen_open: bool,
}

/// Actions accepted by the player. Each one is applied on the player's own
/// task, in arrival order.
#[derive(Debug)]
pub enum Command {
    /// Start when stopped, pause when running.
    StartPause,
    Start,
    Pause,
    Next,
    Previous,
    /// Show the image at an index of the flat collection.
    At(usize),
    /// Show the first image inside a directory of the tree view.
    JumpTo(PathBuf),
    /// Stop, forget the folder and clear every surface.
    Clear,
    ToggleFullscreen,
    SelectFolder(PathBuf),
    /// A dropped file or folder; files select their parent directory.
    Drop(PathBuf),
    /// Raw interval text as typed by the user.
    SetInterval(String),
    SetPlayMode(PlayMode),
    SetRecursive(bool),
    /// Comma separated extension list.
    SetExtensions(String),
    DeleteCurrent,
    Properties(oneshot::Sender<Result<FileProperties, String>>),
    Snapshot(oneshot::Sender<PlaybackSnapshot>),
}

/// Notifications for the embedding UI.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    Status(StatusReport),
    Running(bool),
    DirectoryTree(Option<DirectoryTree>),
    /// The full-screen surface opened (with its frames) or closed.
    Fullscreen(Option<FrameWatcher>),
}
