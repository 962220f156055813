//! Page clean-up before text recognition.
//!
//! Scans and phone photos come with uneven lighting and sensor noise that
//! tesseract reads as stray glyphs. Each page is converted to grayscale,
//! lightly smoothed and binarised with a local-mean threshold so text stays
//! black even where the background is shaded.
//!
//! Only the OCR pipeline uses this; the vision model gets the original pages.

use image::{imageops, DynamicImage, GrayImage, Luma};

/// Side of the square neighbourhood used for the local mean (odd).
const BLOCK_SIZE: u32 = 11;

/// A pixel turns black when it is this much darker than its neighbourhood.
const THRESHOLD_OFFSET: i64 = 2;

/// Gaussian sigma for the denoising pass.
const DENOISE_SIGMA: f32 = 0.6;

/// Grayscale, denoise and binarise a page for recognition.
pub fn prepare_for_ocr(page: &DynamicImage) -> DynamicImage {
    let gray = page.to_luma8();
    let smoothed = imageops::blur(&gray, DENOISE_SIGMA);
    DynamicImage::ImageLuma8(adaptive_threshold(&smoothed, BLOCK_SIZE, THRESHOLD_OFFSET))
}

/// Mean-based adaptive threshold over a `block_size` window.
///
/// Window sums come from an integral image, so the cost does not depend on
/// the window size.
fn adaptive_threshold(image: &GrayImage, block_size: u32, offset: i64) -> GrayImage {
    let (width, height) = image.dimensions();
    let stride = width as usize + 1;

    // integral[(y + 1) * stride + (x + 1)] = sum of pixels in [0..=x] x [0..=y]
    let mut integral = vec![0u64; stride * (height as usize + 1)];
    for y in 0..height as usize {
        let mut row_sum = 0u64;
        for x in 0..width as usize {
            row_sum += u64::from(image.get_pixel(x as u32, y as u32)[0]);
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }

    let half = block_size / 2;
    GrayImage::from_fn(width, height, |x, y| {
        let x0 = x.saturating_sub(half) as usize;
        let y0 = y.saturating_sub(half) as usize;
        let x1 = (x + half + 1).min(width) as usize;
        let y1 = (y + half + 1).min(height) as usize;

        let sum = (integral[y1 * stride + x1] + integral[y0 * stride + x0])
            - (integral[y0 * stride + x1] + integral[y1 * stride + x0]);
        let count = ((x1 - x0) * (y1 - y0)) as u64;
        let mean = (sum / count) as i64;

        if i64::from(image.get_pixel(x, y)[0]) > mean - offset {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// White page with a dark two-pixel horizontal stroke at rows 20–21.
    fn page_with_stroke() -> DynamicImage {
        let mut img = RgbImage::from_pixel(60, 40, Rgb([235, 235, 230]));
        for x in 10..50 {
            for y in 20..22 {
                img.put_pixel(x, y, Rgb([30, 30, 40]));
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn output_is_binary_grayscale_of_same_size() {
        let out = prepare_for_ocr(&page_with_stroke());
        let DynamicImage::ImageLuma8(gray) = &out else {
            panic!("expected a Luma8 image");
        };
        assert_eq!(gray.dimensions(), (60, 40));
        assert!(gray.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn text_stays_dark_and_background_turns_white() {
        let out = prepare_for_ocr(&page_with_stroke()).to_luma8();
        assert_eq!(out.get_pixel(30, 20)[0], 0);
        assert_eq!(out.get_pixel(30, 21)[0], 0);
        assert_eq!(out.get_pixel(2, 2)[0], 255);
        assert_eq!(out.get_pixel(30, 35)[0], 255);
    }

    #[test]
    fn shaded_background_is_not_blackened() {
        // Left half much darker than the right half, no text at all.
        let img = GrayImage::from_fn(40, 20, |x, _| if x < 20 { Luma([90]) } else { Luma([220]) });
        let out = adaptive_threshold(&img, BLOCK_SIZE, THRESHOLD_OFFSET);
        assert_eq!(out.get_pixel(3, 10)[0], 255);
        assert_eq!(out.get_pixel(36, 10)[0], 255);
    }

    #[test]
    fn window_is_clamped_at_edges() {
        let img = GrayImage::from_pixel(3, 3, Luma([128]));
        let out = adaptive_threshold(&img, 31, THRESHOLD_OFFSET);
        assert!(out.pixels().all(|p| p[0] == 255));
    }
}
