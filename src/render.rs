//! Aspect-preserving "contain" scaling of a decoded image onto a surface.

use fast_image_resize as fir;
use image::{RgbaImage, imageops};
use tracing::debug;

use crate::error::Error;

/// Largest size that fits `src` inside `dst` without distortion.
///
/// The side with the larger relative ratio fills the destination exactly;
/// the other is truncated to whole pixels. Either result may be zero for
/// extreme aspect ratios.
#[must_use]
pub fn fit_within(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> (u32, u32) {
    if src_w == 0 || src_h == 0 {
        return (0, 0);
    }
    let (sw, sh, dw, dh) = (
        u64::from(src_w),
        u64::from(src_h),
        u64::from(dst_w),
        u64::from(dst_h),
    );
    // Compare sw/sh against dw/dh without floating point.
    if sw * dh > dw * sh {
        (dst_w, (dw * sh / sw) as u32)
    } else {
        ((dh * sw / sh) as u32, dst_h)
    }
}

pub fn center_offset(inner_w: u32, inner_h: u32, outer_w: u32, outer_h: u32) -> (u32, u32) {
    let ox = outer_w.saturating_sub(inner_w) / 2;
    let oy = outer_h.saturating_sub(inner_h) / 2;
    (ox, oy)
}

/// Draw `source` centred on a transparent `dst_w` x `dst_h` canvas, scaled
/// to fit. Degenerate sizes give an empty canvas of the requested size.
#[must_use]
pub fn render(source: &RgbaImage, dst_w: u32, dst_h: u32) -> RgbaImage {
    let mut canvas = RgbaImage::new(dst_w, dst_h);
    if dst_w == 0 || dst_h == 0 {
        return canvas;
    }
    let (fit_w, fit_h) = fit_within(source.width(), source.height(), dst_w, dst_h);
    if fit_w == 0 || fit_h == 0 {
        return canvas;
    }
    let scaled = match scale_to_fit(source, fit_w, fit_h) {
        Ok(scaled) => scaled,
        Err(err) => {
            debug!("render skipped: {err}");
            return canvas;
        }
    };
    let (ox, oy) = center_offset(fit_w, fit_h, dst_w, dst_h);
    imageops::replace(&mut canvas, &scaled, i64::from(ox), i64::from(oy));
    canvas
}

/// Scale a decoded image to the size [`fit_within`] chose for it, ready for
/// [`render`] to place at [`center_offset`]. Both sizes must be non-zero; an
/// image already at the fitted size is returned as is.
pub fn scale_to_fit(source: &RgbaImage, fit_w: u32, fit_h: u32) -> Result<RgbaImage, Error> {
    if fit_w == 0 || fit_h == 0 {
        return Err(Error::Resize(format!("cannot scale to {fit_w}x{fit_h}")));
    }
    if source.dimensions() == (fit_w, fit_h) {
        return Ok(source.clone());
    }

    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .map_err(|err| Error::Resize(format!("source view: {err}")))?;
    let mut fitted = fir::images::Image::new(fit_w, fit_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom));
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(&src_view, &mut fitted, Some(&options))
        .map_err(|err| Error::Resize(err.to_string()))?;
    RgbaImage::from_raw(fit_w, fit_h, fitted.into_vec())
        .ok_or_else(|| Error::Resize("scaled buffer has the wrong length".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([200, 30, 30, 255]))
    }

    fn opaque_bounds(img: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, px) in img.enumerate_pixels() {
            if px[3] == 0 {
                continue;
            }
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
        bounds
    }

    #[test]
    fn wide_source_into_square_leaves_bands() {
        assert_eq!(fit_within(4000, 2000, 100, 100), (100, 50));
        let out = render(&solid(400, 200), 100, 100);
        assert_eq!(out.dimensions(), (100, 100));
        assert_eq!(opaque_bounds(&out), Some((0, 25, 99, 74)));
        assert_eq!(out.get_pixel(50, 10)[3], 0);
        assert_eq!(out.get_pixel(50, 90)[3], 0);
    }

    #[test]
    fn tall_source_fills_height() {
        assert_eq!(fit_within(1000, 3000, 300, 300), (100, 300));
        let out = render(&solid(10, 30), 300, 300);
        assert_eq!(out.dimensions(), (300, 300));
        assert_eq!(opaque_bounds(&out), Some((100, 0, 199, 299)));
    }

    #[test]
    fn small_source_is_enlarged() {
        let out = render(&solid(2, 1), 64, 48);
        assert_eq!(opaque_bounds(&out), Some((0, 8, 63, 39)));
    }

    #[test]
    fn output_always_matches_destination() {
        let src = solid(37, 91);
        for (w, h) in [(1, 1), (3, 500), (500, 3), (640, 480), (17, 17)] {
            let out = render(&src, w, h);
            assert_eq!(out.dimensions(), (w, h));
            let (fw, fh) = fit_within(37, 91, w, h);
            if fw > 0 && fh > 0 {
                let src_ratio = 37.0 / 91.0;
                let lo = fw as f64 / (fh + 1) as f64;
                let hi = (fw + 1) as f64 / fh as f64;
                assert!(lo <= src_ratio && src_ratio <= hi, "{w}x{h} -> {fw}x{fh}");
            }
        }
    }

    #[test]
    fn odd_margins_round_towards_the_top_left() {
        // 3:1 into 10x10 fits as 10x3, leaving 7 rows split 3 above and 4 below.
        assert_eq!(fit_within(3, 1, 10, 10), (10, 3));
        assert_eq!(center_offset(10, 3, 10, 10), (0, 3));
        let out = render(&solid(3, 1), 10, 10);
        assert_eq!(opaque_bounds(&out), Some((0, 3, 9, 5)));
    }

    #[test]
    fn scale_to_fit_rejects_empty_targets() {
        let src = solid(4, 2);
        assert!(matches!(scale_to_fit(&src, 0, 2), Err(Error::Resize(_))));
        assert_eq!(scale_to_fit(&src, 4, 2).unwrap(), src);
        let scaled = scale_to_fit(&src, 8, 4).unwrap();
        assert_eq!(scaled.dimensions(), (8, 4));
        assert_eq!(scaled.get_pixel(4, 2)[3], 255);
    }

    #[test]
    fn degenerate_sizes_give_empty_canvas() {
        let src = solid(100, 1);
        assert_eq!(render(&src, 0, 10).dimensions(), (0, 10));
        assert_eq!(render(&src, 10, 0).dimensions(), (10, 0));
        // 100:1 into 10x10 would need a 0.1px tall image.
        let out = render(&src, 10, 10);
        assert_eq!(out.dimensions(), (10, 10));
        assert!(opaque_bounds(&out).is_none());
        let empty = RgbaImage::new(0, 0);
        assert_eq!(render(&empty, 5, 5).dimensions(), (5, 5));
    }
}
