//! Icon encoding: source raster → RGB565 pixel stream.
//!
//! Each icon is shrunk to fit a 48x48 box (aspect ratio kept, never
//! upscaled), flattened to RGB and written as one little-endian `u16` per
//! pixel in row-major order.
//!
//! The encoded width and height are not stored anywhere in the bundle. A
//! consumer has to know them out of band; [`fit_dimensions`] gives the size
//! an icon of a given source size ends up at.

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{BundleError, Stage};

/// Bounding box every icon is shrunk to fit.
pub const MAX_ICON_DIM: u32 = 48;

/// Pack 8-bit channels into RGB565 by truncation.
#[inline]
pub fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    let r5 = u16::from(r >> 3);
    let g6 = u16::from(g >> 2);
    let b5 = u16::from(b >> 3);
    (r5 << 11) | (g6 << 5) | b5
}

/// Dimensions an image of `width` x `height` is encoded at.
///
/// Images already inside the bounding box keep their size. Larger ones are
/// scaled by the smaller of the two axis ratios, rounding to the nearest
/// pixel and never below 1. A zero-length axis stays zero.
pub fn fit_dimensions(width: u32, height: u32) -> (u32, u32) {
    if width <= MAX_ICON_DIM && height <= MAX_ICON_DIM {
        return (width, height);
    }
    let ratio = f64::min(
        f64::from(MAX_ICON_DIM) / f64::from(width),
        f64::from(MAX_ICON_DIM) / f64::from(height),
    );
    let scale = |v: u32| match v {
        0 => 0,
        _ => ((f64::from(v) * ratio).round() as u32).clamp(1, MAX_ICON_DIM),
    };
    (scale(width), scale(height))
}

/// Encode an already decoded image.
pub fn encode_image(image: &DynamicImage) -> Vec<u8> {
    let (width, height) = fit_dimensions(image.width(), image.height());
    let rgb = if (width, height) == (image.width(), image.height()) {
        image.to_rgb8()
    } else {
        image.resize_exact(width, height, FilterType::Lanczos3).to_rgb8()
    };

    let mut out = Vec::with_capacity(rgb.as_raw().len() / 3 * 2);
    for pixel in rgb.pixels() {
        let [r, g, b] = pixel.0;
        out.extend_from_slice(&rgb565(r, g, b).to_le_bytes());
    }
    out
}

/// Decode the image at `path` and encode it.
pub fn encode_icon(path: &Path) -> Result<Vec<u8>, BundleError> {
    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| BundleError::io(Stage::Icon, path, e))?;
    let image = reader.decode().map_err(|source| BundleError::Decode {
        path: path.to_owned(),
        source,
    })?;

    let encoded = encode_image(&image);
    debug!(
        path = %path.display(),
        source_size = ?(image.width(), image.height()),
        encoded_bytes = encoded.len(),
        "encoded icon"
    );
    Ok(encoded)
}

pub fn icon_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("icon_{index}.png"))
}

/// List `icon_0.png`, `icon_1.png`, … in `dir`, stopping at the first
/// missing index. Icons after a gap are never picked up.
pub fn discover_icons(dir: &Path) -> Vec<PathBuf> {
    (0..)
        .map(|index| icon_path(dir, index))
        .take_while(|path| path.exists())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use proptest::prelude::*;
    use std::fs;
    use tempfile::tempdir;

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    #[test]
    fn orange_packs_to_fc00() {
        assert_eq!(rgb565(255, 128, 0), 0xFC00);
        assert_eq!(encode_image(&solid(1, 1, [255, 128, 0])), vec![0x00, 0xFC]);
    }

    #[test]
    fn extremes() {
        assert_eq!(rgb565(0, 0, 0), 0x0000);
        assert_eq!(rgb565(255, 255, 255), 0xFFFF);
        assert_eq!(rgb565(255, 0, 0), 0xF800);
        assert_eq!(rgb565(0, 255, 0), 0x07E0);
        assert_eq!(rgb565(0, 0, 255), 0x001F);
    }

    #[test]
    fn pixels_are_row_major() {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(1, 0, Rgb([255, 0, 0]));
        img.put_pixel(0, 1, Rgb([0, 0, 255]));
        let encoded = encode_image(&DynamicImage::ImageRgb8(img));
        assert_eq!(encoded, vec![0x00, 0x00, 0x00, 0xF8, 0x1F, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn small_images_are_not_upscaled() {
        assert_eq!(fit_dimensions(10, 7), (10, 7));
        assert_eq!(fit_dimensions(48, 48), (48, 48));
        assert_eq!(encode_image(&solid(10, 7, [1, 2, 3])).len(), 10 * 7 * 2);
    }

    #[test]
    fn large_images_fit_the_box() {
        assert_eq!(fit_dimensions(96, 96), (48, 48));
        assert_eq!(fit_dimensions(96, 48), (48, 24));
        assert_eq!(fit_dimensions(30, 100), (14, 48));
        assert_eq!(fit_dimensions(1000, 1), (48, 1));
        assert_eq!(encode_image(&solid(256, 128, [9, 9, 9])).len(), 48 * 24 * 2);
    }

    #[test]
    fn zero_axis_is_never_grown() {
        assert_eq!(fit_dimensions(0, 100), (0, 48));
        assert_eq!(fit_dimensions(100, 0), (48, 0));
        assert_eq!(fit_dimensions(0, 0), (0, 0));
        assert_eq!(fit_dimensions(0, 10), (0, 10));
    }

    #[test]
    fn solid_color_survives_downsampling() {
        let encoded = encode_image(&solid(200, 200, [255, 128, 0]));
        assert_eq!(encoded.len(), 48 * 48 * 2);
        assert!(encoded.chunks(2).all(|px| px == [0x00, 0xFC]));
    }

    #[test]
    fn alpha_is_discarded() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([255, 128, 0, 0]));
        assert_eq!(encode_image(&DynamicImage::ImageRgba8(img)), vec![0x00, 0xFC]);
    }

    #[test]
    fn grayscale_is_flattened() {
        let img = GrayImage::from_pixel(1, 1, Luma([255]));
        assert_eq!(encode_image(&DynamicImage::ImageLuma8(img)), vec![0xFF, 0xFF]);
    }

    #[test]
    fn discovery_stops_at_first_gap() {
        let dir = tempdir().unwrap();
        for i in [0, 1, 3, 4] {
            fs::write(icon_path(dir.path(), i), b"").unwrap();
        }
        let found = discover_icons(dir.path());
        assert_eq!(found, vec![icon_path(dir.path(), 0), icon_path(dir.path(), 1)]);
    }

    #[test]
    fn discovery_without_icon_0_is_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("icon_1.png"), b"").unwrap();
        assert!(discover_icons(dir.path()).is_empty());
    }

    #[test]
    fn encode_icon_reads_png() {
        let dir = tempdir().unwrap();
        let path = icon_path(dir.path(), 0);
        RgbImage::from_pixel(3, 2, Rgb([255, 128, 0])).save(&path).unwrap();
        assert_eq!(encode_icon(&path).unwrap(), [0x00u8, 0xFC].repeat(6));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let dir = tempdir().unwrap();
        let path = icon_path(dir.path(), 0);
        fs::write(&path, b"definitely not a png").unwrap();
        assert!(matches!(encode_icon(&path), Err(BundleError::Decode { .. })));
    }

    #[test]
    fn missing_icon_is_not_found() {
        let dir = tempdir().unwrap();
        let err = encode_icon(&icon_path(dir.path(), 0)).unwrap_err();
        assert!(matches!(err, BundleError::FileNotFound { stage: Stage::Icon, .. }));
    }

    proptest! {
        #[test]
        fn packing_keeps_top_bits(r: u8, g: u8, b: u8) {
            let px = rgb565(r, g, b);
            prop_assert_eq!((px >> 11) as u8, r >> 3);
            prop_assert_eq!(((px >> 5) & 0x3F) as u8, g >> 2);
            prop_assert_eq!((px & 0x1F) as u8, b >> 3);
        }

        #[test]
        fn fitted_size_stays_in_bounds(w in 1u32..4096, h in 1u32..4096) {
            let (fw, fh) = fit_dimensions(w, h);
            prop_assert!(fw >= 1 && fw <= MAX_ICON_DIM);
            prop_assert!(fh >= 1 && fh <= MAX_ICON_DIM);
            prop_assert!(fw <= w && fh <= h);
        }
    }
}
