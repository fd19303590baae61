use crate::error::Error;
use crate::events::{FileProperties, InventoryEvent};
use anyhow::Result;
use chrono::{DateTime, Local};
use notify::event::{ModifyKind, RemoveKind};
use notify::{Event, EventKind, RecursiveMode, Watcher, recommended_watcher};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{self, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Forward removals below `root` to the player until cancelled.
///
/// Additions are ignored; new files only appear after a rescan.
#[instrument(skip(to_player, cancel), fields(root = %root.display()))]
pub async fn watch_removals(
    root: PathBuf,
    recursive: bool,
    to_player: Sender<InventoryEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    // Bridge notify callback -> async channel
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Result<Event>>(128);
    let mut watcher = recommended_watcher(move |res| {
        let _ = watch_tx.blocking_send(res);
    })?;
    let mode = if recursive {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };
    watcher.watch(&root, mode)?;
    debug!("removal watcher initialized");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            maybe = watch_rx.recv() => {
                let Some(res) = maybe else { break };
                match res {
                    Ok(event) => {
                        let removed = match &event.kind {
                            EventKind::Remove(RemoveKind::File | RemoveKind::Any) => true,
                            // Renames out of the tree look like removals of the old name.
                            EventKind::Modify(ModifyKind::Name(_)) => true,
                            _ => false,
                        };
                        if !removed {
                            continue;
                        }
                        for p in event.paths.into_iter().filter(|p| !p.exists()) {
                            info!(path = %p.display(), "fs: removed");
                            if to_player.send(InventoryEvent::PhotoRemoved(p)).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                    Err(err) => error!("watch error: {err}"),
                }
            }
        }
    }
    Ok(())
}

/// Remove a file from disk. A file that is already gone counts as removed.
pub fn delete_file(p: &Path) -> Result<(), Error> {
    debug!(path = %p.display(), "delete: removing file");
    match fs::remove_file(p) {
        Ok(()) => {
            info!(path = %p.display(), "delete: removed");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %p.display(), "delete: source vanished during remove; skipping");
            Ok(())
        }
        Err(source) => Err(Error::Delete {
            path: p.to_path_buf(),
            source,
        }),
    }
}

pub fn properties(p: &Path) -> Result<FileProperties, Error> {
    let meta = fs::metadata(p).map_err(|source| Error::Io {
        path: p.to_path_buf(),
        source,
    })?;
    let modified = meta
        .modified()
        .map(|t| {
            DateTime::<Local>::from(t)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|_| "unknown".to_string());
    Ok(FileProperties {
        name: p
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        size_mib: meta.len() as f64 / 1024.0 / 1024.0,
        modified,
    })
}
