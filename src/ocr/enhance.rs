//! Deterministic image cleanup applied before OCR.
//!
//! Grayscale, upscale small scans, denoise, boost contrast and sharpness,
//! then binarize around the mean intensity.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};

/// Scans with either side below this are upscaled.
pub const MIN_OCR_DIMENSION: u32 = 1000;

const CONTRAST_FACTOR: f32 = 1.5;
const SHARPNESS_FACTOR: f32 = 2.0;
/// Binarization threshold as a fraction of the mean intensity.
const THRESHOLD_RATIO: f32 = 0.9;

/// Run the full enhancement pipeline on a decoded image.
pub fn enhance_for_ocr(img: &DynamicImage) -> GrayImage {
    let gray = upscale(img.to_luma8());
    let gray = median3(&gray);
    let gray = adjust_contrast(&gray, CONTRAST_FACTOR);
    let gray = sharpen(&gray, SHARPNESS_FACTOR);
    binarize(&gray, THRESHOLD_RATIO)
}

fn upscale(img: GrayImage) -> GrayImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || (w >= MIN_OCR_DIMENSION && h >= MIN_OCR_DIMENSION) {
        return img;
    }
    let min = MIN_OCR_DIMENSION as f64;
    let scale = (min / w as f64).max(min / h as f64);
    let new_w = (w as f64 * scale).round() as u32;
    let new_h = (h as f64 * scale).round() as u32;
    imageops::resize(&img, new_w, new_h, FilterType::Lanczos3)
}

/// The 3x3 neighborhood of a pixel, replicating edge pixels.
fn neighborhood(img: &GrayImage, x: u32, y: u32) -> [u8; 9] {
    let (w, h) = img.dimensions();
    let mut out = [0u8; 9];
    let mut i = 0;
    for dy in [-1i64, 0, 1] {
        for dx in [-1i64, 0, 1] {
            let nx = (x as i64 + dx).clamp(0, w as i64 - 1) as u32;
            let ny = (y as i64 + dy).clamp(0, h as i64 - 1) as u32;
            out[i] = img.get_pixel(nx, ny)[0];
            i += 1;
        }
    }
    out
}

fn median3(img: &GrayImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let mut window = neighborhood(img, x, y);
        window.sort_unstable();
        Luma([window[4]])
    })
}

fn mean_intensity(img: &GrayImage) -> f32 {
    let count = img.as_raw().len();
    if count == 0 {
        return 0.0;
    }
    let sum: u64 = img.as_raw().iter().map(|&p| p as u64).sum();
    sum as f32 / count as f32
}

fn clamp_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Stretch intensities away from the mean by `factor`.
fn adjust_contrast(img: &GrayImage, factor: f32) -> GrayImage {
    let mean = mean_intensity(img).round();
    let mut out = img.clone();
    for p in out.pixels_mut() {
        p[0] = clamp_u8(mean + factor * (p[0] as f32 - mean));
    }
    out
}

/// Push each pixel away from a smoothed copy of itself by `factor`.
fn sharpen(img: &GrayImage, factor: f32) -> GrayImage {
    // 3x3 smoothing kernel with a weighted center, normalized to 1.
    const KERNEL: [f32; 9] = [1.0, 1.0, 1.0, 1.0, 5.0, 1.0, 1.0, 1.0, 1.0];
    const KERNEL_SUM: f32 = 13.0;

    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let window = neighborhood(img, x, y);
        let smooth: f32 = window
            .iter()
            .zip(KERNEL.iter())
            .map(|(&p, &k)| p as f32 * k)
            .sum::<f32>()
            / KERNEL_SUM;
        let original = img.get_pixel(x, y)[0] as f32;
        Luma([clamp_u8(smooth + factor * (original - smooth))])
    })
}

/// Pure black and white around `ratio` of the mean intensity.
fn binarize(img: &GrayImage, ratio: f32) -> GrayImage {
    let threshold = mean_intensity(img) * ratio;
    let mut out = img.clone();
    for p in out.pixels_mut() {
        p[0] = if (p[0] as f32) < threshold { 0 } else { 255 };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn striped(w: u32, h: u32) -> DynamicImage {
        let img = GrayImage::from_fn(w, h, |x, _| if (x / 2) % 2 == 0 { Luma([30]) } else { Luma([220]) });
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn test_small_image_is_upscaled_keeping_aspect() {
        let out = enhance_for_ocr(&striped(40, 20));
        assert_eq!(out.dimensions(), (2000, 1000));
    }

    #[test]
    fn test_large_image_keeps_dimensions() {
        let img = GrayImage::from_pixel(1000, 1000, Luma([128]));
        let out = upscale(img);
        assert_eq!(out.dimensions(), (1000, 1000));
    }

    #[test]
    fn test_output_is_binary() {
        let out = enhance_for_ocr(&striped(20, 10));
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert!(out.pixels().any(|p| p[0] == 0));
        assert!(out.pixels().any(|p| p[0] == 255));
    }

    #[test]
    fn test_uniform_image_binarizes_white() {
        let img = GrayImage::from_pixel(5, 5, Luma([90]));
        let out = binarize(&adjust_contrast(&img, CONTRAST_FACTOR), THRESHOLD_RATIO);
        assert!(out.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_median_removes_speck() {
        let mut img = GrayImage::from_pixel(5, 5, Luma([200]));
        img.put_pixel(2, 2, Luma([0]));
        let out = median3(&img);
        assert_eq!(out.get_pixel(2, 2)[0], 200);
    }

    #[test]
    fn test_contrast_stretches_from_mean() {
        let img = GrayImage::from_fn(2, 1, |x, _| if x == 0 { Luma([100]) } else { Luma([200]) });
        let out = adjust_contrast(&img, 1.5);
        assert_eq!(out.get_pixel(0, 0)[0], 75);
        assert_eq!(out.get_pixel(1, 0)[0], 225);
    }

    #[test]
    fn test_enhancement_is_deterministic() {
        let a = enhance_for_ocr(&striped(30, 12));
        let b = enhance_for_ocr(&striped(30, 12));
        assert_eq!(a.as_raw(), b.as_raw());
    }
}
