//! Fixed feature extractors feeding the linear head.
//!
//! `Simple` uses a downsampled grayscale image. `Transfer` stands in for a frozen
//! pretrained base: per-channel color histograms plus a coarse RGB thumbnail.

use image::{DynamicImage, imageops::FilterType};
use pictura_training::Architecture;

/// Side of the grayscale grid used by `Architecture::Simple`.
pub const SIMPLE_SIDE: u32 = 16;
/// Histogram bins per RGB channel used by `Architecture::Transfer`.
pub const HISTOGRAM_BINS: usize = 8;
/// Side of the RGB thumbnail used by `Architecture::Transfer`.
pub const THUMBNAIL_SIDE: u32 = 4;

const HISTOGRAM_SAMPLE_SIDE: u32 = 64;

/// Length of the feature vector produced for an architecture.
pub const fn feature_len(architecture: Architecture) -> usize {
    match architecture {
        Architecture::Simple => (SIMPLE_SIDE * SIMPLE_SIDE) as usize,
        Architecture::Transfer => {
            3 * HISTOGRAM_BINS + 3 * (THUMBNAIL_SIDE * THUMBNAIL_SIDE) as usize
        }
    }
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage, image::ImageError> {
    image::load_from_memory(bytes)
}

pub fn extract(architecture: Architecture, image: &DynamicImage) -> Vec<f32> {
    match architecture {
        Architecture::Simple => grayscale_grid(image),
        Architecture::Transfer => {
            let mut features = color_histogram(image);
            features.extend(rgb_thumbnail(image));
            features
        }
    }
}

/// Pixels in [-0.5, 0.5], row-major.
fn grayscale_grid(image: &DynamicImage) -> Vec<f32> {
    image
        .resize_exact(SIMPLE_SIDE, SIMPLE_SIDE, FilterType::Triangle)
        .to_luma8()
        .pixels()
        .map(|p| f32::from(p[0]) / 255.0 - 0.5)
        .collect()
}

/// Normalized per-channel histograms, R bins then G then B.
fn color_histogram(image: &DynamicImage) -> Vec<f32> {
    let rgb = image
        .resize_exact(HISTOGRAM_SAMPLE_SIDE, HISTOGRAM_SAMPLE_SIDE, FilterType::Triangle)
        .to_rgb8();
    let mut bins = vec![0.0f32; 3 * HISTOGRAM_BINS];
    for pixel in rgb.pixels() {
        for channel in 0..3 {
            let bin = usize::from(pixel[channel]) * HISTOGRAM_BINS / 256;
            bins[channel * HISTOGRAM_BINS + bin] += 1.0;
        }
    }
    let total = (rgb.width() * rgb.height()) as f32;
    bins.iter_mut().for_each(|b| *b /= total);
    bins
}

/// HWC layout, values in [-0.5, 0.5].
fn rgb_thumbnail(image: &DynamicImage) -> Vec<f32> {
    image
        .resize_exact(THUMBNAIL_SIDE, THUMBNAIL_SIDE, FilterType::Triangle)
        .to_rgb8()
        .pixels()
        .flat_map(|p| p.0)
        .map(|v| f32::from(v) / 255.0 - 0.5)
        .collect()
}
