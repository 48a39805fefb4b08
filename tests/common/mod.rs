//! Shared helpers for the integration tests

#![allow(dead_code)]

use closet_bgremove::{BackendType, OutputFormat, RemovalConfig};
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};

/// Light garment centred on a dark backdrop; the garment covers the middle half
pub fn garment_photo(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let inside = x >= width / 4 && x < width * 3 / 4 && y >= height / 4 && y < height * 3 / 4;
        if inside {
            Rgb([235, 230, 220])
        } else {
            Rgb([20, 24, 28])
        }
    })
}

/// Save a garment photo as JPEG at `dir/name`
pub fn write_garment_jpeg(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    garment_photo(width, height).save(&path).unwrap();
    path
}

pub fn threshold_config(inverted: bool) -> RemovalConfig {
    RemovalConfig::builder()
        .backend_type(BackendType::Threshold { inverted })
        .output_format(OutputFormat::Png)
        .build()
        .unwrap()
}

/// Mid-grey garment on a dark backdrop, covering the middle half of each axis
pub fn grey_garment_photo(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let inside = x >= width / 4 && x < width * 3 / 4 && y >= height / 4 && y < height * 3 / 4;
        if inside {
            Rgb([118, 122, 126])
        } else {
            Rgb([12, 14, 16])
        }
    })
}

/// Save a grey garment photo as lossless PNG at `dir/name`
pub fn write_grey_garment_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    grey_garment_photo(width, height).save(&path).unwrap();
    path
}
