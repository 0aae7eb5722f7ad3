use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbImage, imageops::FilterType};
use ndarray::Array2;

use crate::{
    error::{Result, ScanError},
    image_utils::gray_to_array,
};

/// Side length of the resampled analysis raster. All feature extraction past
/// the loader works on this fixed geometry so vectors stay comparable across
/// source resolutions.
pub const ANALYSIS_SIZE: u32 = 512;

const ACCEPTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tiff", "tif", "bmp"];

/// Decoded image plus the derived arrays every analyzer consumes.
///
/// All fields are value copies of the decoded pixels; nothing aliases the
/// source bytes and nothing is mutated after construction.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// Original container bytes, kept for the metadata tampering check.
    /// Empty when the image was constructed from an in-memory raster.
    pub raw: Vec<u8>,
    pub rgb: RgbImage,
    /// Full-resolution grayscale, values in [0, 255].
    pub gray: Array2<f64>,
    /// Lanczos-resampled grayscale at `ANALYSIS_SIZE`, values in [0, 255].
    pub resized: Array2<f64>,
    /// `resized` scaled to [0, 1].
    pub normalized: Array2<f64>,
    pub source_width: u32,
    pub source_height: u32,
}

pub struct ImageLoader;

impl ImageLoader {
    /// Decodes raw file bytes with a declared extension.
    ///
    /// TIFF is the supported multi-page container; only the first directory
    /// is rendered. PDF and other non-raster documents are rejected with
    /// `UnsupportedFormat` — rasterizing those is the caller's concern.
    pub fn from_bytes(bytes: &[u8], extension: &str) -> Result<LoadedImage> {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();

        if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(ScanError::UnsupportedFormat(ext));
        }

        let format = ImageFormat::from_extension(&ext)
            .ok_or_else(|| ScanError::UnsupportedFormat(ext.clone()))?;

        let image = image::load_from_memory_with_format(bytes, format)?;
        log::debug!(
            "decoded {}x{} image from {} bytes ({ext})",
            image.width(),
            image.height(),
            bytes.len()
        );

        Ok(Self::build(image, bytes.to_vec()))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<LoadedImage> {
        let extension = path
            .as_ref()
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .ok_or_else(|| ScanError::UnsupportedFormat("<none>".into()))?;
        let bytes = std::fs::read(&path)?;

        Self::from_bytes(&bytes, &extension)
    }

    /// Wraps an already-decoded raster, e.g. one produced by an external
    /// document rasterizer. No container bytes are available for metadata
    /// inspection in this case.
    pub fn from_image(image: DynamicImage) -> LoadedImage {
        Self::build(image, Vec::new())
    }

    fn build(image: DynamicImage, raw: Vec<u8>) -> LoadedImage {
        let rgb = image.to_rgb8();
        let gray_image = image.to_luma8();
        let (source_width, source_height) = gray_image.dimensions();

        let resized_image = DynamicImage::ImageLuma8(gray_image.clone())
            .resize_exact(ANALYSIS_SIZE, ANALYSIS_SIZE, FilterType::Lanczos3)
            .to_luma8();

        let gray = gray_to_array(&gray_image);
        let resized = gray_to_array(&resized_image);
        let normalized = resized.mapv(|v| v / 255.0);

        LoadedImage {
            raw,
            rgb,
            gray,
            resized,
            normalized,
            source_width,
            source_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::io::Cursor;

    fn encode_png(image: &GrayImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(image.clone())
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    #[test]
    fn loads_png_bytes() {
        let source = GrayImage::from_fn(64, 48, |x, y| Luma([((x + y) % 256) as u8]));
        let bytes = encode_png(&source);

        let loaded = ImageLoader::from_bytes(&bytes, "png").unwrap();
        assert_eq!(loaded.source_width, 64);
        assert_eq!(loaded.source_height, 48);
        assert_eq!(loaded.resized.dim(), (512, 512));
        assert_eq!(loaded.normalized.dim(), (512, 512));
        assert!(loaded.normalized.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!(!loaded.raw.is_empty());
    }

    #[test]
    fn rejects_unsupported_extension() {
        let err = ImageLoader::from_bytes(&[0u8; 16], "pdf").unwrap_err();
        assert!(matches!(err, ScanError::UnsupportedFormat(_)));
        assert!(!err.user_message().is_empty());
    }

    #[test]
    fn rejects_undecodable_bytes() {
        let err = ImageLoader::from_bytes(&[0u8; 16], "png").unwrap_err();
        assert!(matches!(err, ScanError::Decode(_)));
    }

    #[test]
    fn from_image_has_no_container_bytes() {
        let source = GrayImage::from_pixel(32, 32, Luma([90]));
        let loaded = ImageLoader::from_image(DynamicImage::ImageLuma8(source));
        assert!(loaded.raw.is_empty());
        assert_eq!(loaded.source_width, 32);
    }
}
