use crate::error::Error;
use crate::events::{LoadPhoto, PhotoLoaded};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Decode a file to RGBA8. The format is sniffed from the content first and
/// the extension second.
pub fn decode_rgba8(path: &Path) -> Result<image::RgbaImage, Error> {
    let io_err = |source| Error::Io {
        path: path.to_path_buf(),
        source,
    };
    let img = image::ImageReader::open(path)
        .map_err(io_err)?
        .with_guessed_format()
        .map_err(io_err)?
        .decode()
        .map_err(|source| Error::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(img.to_rgba8())
}

/// Decode worker.
///
/// Handles one request at a time: the next request is not even received
/// until the previous result has been handed back, so results arrive in
/// request order.
#[instrument(skip_all)]
pub async fn run(
    mut load_rx: Receiver<LoadPhoto>,
    loaded_tx: Sender<PhotoLoaded>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        select! {
            _ = cancel.cancelled() => break,
            maybe_req = load_rx.recv() => {
                let Some(request) = maybe_req else { break };
                let path = request.path.clone();
                let decoded = tokio::task::spawn_blocking(move || decode_rgba8(&path)).await;
                let result = match decoded {
                    Ok(res) => res.map(Arc::new),
                    Err(join_err) => Err(Error::Io {
                        path: request.path.clone(),
                        source: std::io::Error::other(join_err.to_string()),
                    }),
                };
                match &result {
                    Ok(img) => debug!(path = %request.path.display(), width = img.width(), height = img.height(), "decoded"),
                    Err(err) => debug!(path = %request.path.display(), "decode failed: {err}"),
                }
                if loaded_tx.send(PhotoLoaded { request, result }).await.is_err() {
                    debug!("player gone; stopping decode worker");
                    break;
                }
            }
        }
    }
    Ok(())
}
