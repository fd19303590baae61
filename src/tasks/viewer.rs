use crate::config::SurfaceSize;
use crate::frame::{Frame, FrameWatcher};
use crate::render;
use anyhow::{Context, Result};
use image::RgbaImage;
use std::path::PathBuf;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Contents of a surface after a redraw.
#[derive(Debug)]
pub enum Drawn {
    /// Nothing to show; the UI draws its placeholder.
    Placeholder,
    Image(RgbaImage),
}

/// Render a frame at the surface size.
#[must_use]
pub fn draw(frame: &Frame, size: SurfaceSize) -> Drawn {
    match frame.image() {
        Some(img) => Drawn::Image(render::render(img, size.width, size.height)),
        None => Drawn::Placeholder,
    }
}

/// Redraw loop for one surface: waits for frame replacements, renders them
/// and optionally writes the result to `render_to` as PNG.
#[instrument(skip(frames, render_to, cancel))]
pub async fn run(
    surface: &'static str,
    mut frames: FrameWatcher,
    size: SurfaceSize,
    render_to: Option<PathBuf>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut current = frames.get();
    loop {
        let frame = current.clone();
        let drawn = tokio::task::spawn_blocking(move || draw(&frame, size)).await?;
        match drawn {
            Drawn::Placeholder => debug!("showing placeholder"),
            Drawn::Image(canvas) => {
                if let Some(path) = current.path() {
                    info!(path = %path.display(), "displaying");
                }
                if let Some(out) = render_to.clone() {
                    tokio::task::spawn_blocking(move || {
                        canvas
                            .save_with_format(&out, image::ImageFormat::Png)
                            .with_context(|| format!("writing {}", out.display()))
                    })
                    .await??;
                }
            }
        }

        select! {
            _ = cancel.cancelled() => break,
            next = frames.changed() => match next {
                Some(frame) => current = frame,
                None => break,
            },
        }
    }
    debug!("surface closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameStore;
    use image::Rgba;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn empty_frame_draws_placeholder() {
        let drawn = draw(&Frame::empty(), SurfaceSize::default());
        assert!(matches!(drawn, Drawn::Placeholder));
    }

    #[test]
    fn image_is_letterboxed_to_surface() {
        let img = Arc::new(RgbaImage::from_pixel(40, 20, Rgba([255, 0, 0, 255])));
        let frame = Frame::new(img, PathBuf::from("/p/wide.png"));
        let Drawn::Image(canvas) = draw(
            &frame,
            SurfaceSize {
                width: 100,
                height: 100,
            },
        ) else {
            panic!("expected an image");
        };
        assert_eq!(canvas.dimensions(), (100, 100));
        assert_eq!(canvas.get_pixel(0, 0)[3], 0);
        assert_eq!(canvas.get_pixel(50, 50)[3], 255);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn writes_each_frame_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("surface.png");
        let store = FrameStore::new();
        let cancel = CancellationToken::new();
        let size = SurfaceSize {
            width: 8,
            height: 8,
        };
        let task = tokio::spawn(run(
            "main",
            store.watch(),
            size,
            Some(out.clone()),
            cancel.clone(),
        ));

        store.set(Frame::new(
            Arc::new(RgbaImage::new(4, 4)),
            PathBuf::from("/p/a.png"),
        ));
        tokio::time::timeout(Duration::from_secs(5), async {
            while !out.exists() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("frame written");

        cancel.cancel();
        task.await.unwrap().unwrap();
        assert_eq!(image::open(&out).unwrap().width(), 8);
    }
}
