use ndarray::Array2;

use crate::{
    features::PrnuFeatures,
    image_utils::{dynamic_range, fft2_magnitude, gaussian_blur, kurtosis, pearson, skewness},
    loader::LoadedImage,
};

/// Side length of the residual digest used for pattern correlation.
pub const DIGEST_SIZE: usize = 32;

#[derive(Debug, Clone)]
pub struct PrnuConfig {
    pub denoise_sigma: f64,
}

impl Default for PrnuConfig {
    fn default() -> Self {
        Self { denoise_sigma: 3.0 }
    }
}

/// Estimates the sensor noise residual (PRNU) by subtracting a denoised
/// copy of the image from the original.
#[derive(Debug)]
pub struct NoiseResidualExtractor {
    config: PrnuConfig,
}

impl NoiseResidualExtractor {
    pub fn new() -> Self {
        Self::with_config(PrnuConfig::default())
    }

    pub fn with_config(config: PrnuConfig) -> Self {
        Self { config }
    }

    pub fn extract(&self, image: &LoadedImage) -> PrnuFeatures {
        let normalized = &image.normalized;
        let denoised = gaussian_blur(normalized, self.config.denoise_sigma);
        let residual = normalized - &denoised;

        let values = residual.iter().cloned().collect::<Vec<_>>();
        let mean = crate::image_utils::mean(&values);
        let std = crate::image_utils::std_dev(&values);

        let range = dynamic_range(normalized);
        let mean_abs = values.iter().map(|v| v.abs()).sum::<f64>() / values.len() as f64;
        // Uniform input has zero dynamic range and an all-zero residual; the
        // pattern strength is defined as 0 there rather than a division error.
        let pattern_strength = if range < 1e-12 { 0.0 } else { mean_abs / range };

        let fft_energy = if std < 1e-12 {
            0.0
        } else {
            let magnitude = fft2_magnitude(&residual);
            magnitude.iter().sum::<f64>() / magnitude.len() as f64
        };

        PrnuFeatures {
            mean,
            std,
            skewness: skewness(&residual),
            kurtosis: kurtosis(&residual),
            fft_energy,
            pattern_strength,
            autocorrelation: lag1_autocorrelation(&residual),
            digest: residual_digest(&residual),
        }
    }
}

impl Default for NoiseResidualExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Coarse spatial autocorrelation: Pearson correlation between the residual
/// and its one-pixel horizontal shift. Zero-variance residuals map to 0.
fn lag1_autocorrelation(residual: &Array2<f64>) -> f64 {
    let (height, width) = residual.dim();
    if width < 2 {
        return 0.0;
    }

    let mut left = Vec::with_capacity(height * (width - 1));
    let mut right = Vec::with_capacity(height * (width - 1));

    for y in 0..height {
        for x in 0..width - 1 {
            left.push(residual[[y, x]]);
            right.push(residual[[y, x + 1]]);
        }
    }

    pearson(&left, &right).unwrap_or(0.0)
}

/// Block-mean downsample of the residual to a fixed DIGEST_SIZE² grid.
/// The comparison engine correlates digests instead of full-resolution
/// patterns so FeatureVector stays a compact value type.
fn residual_digest(residual: &Array2<f64>) -> Vec<f64> {
    let (height, width) = residual.dim();
    let block_h = (height / DIGEST_SIZE).max(1);
    let block_w = (width / DIGEST_SIZE).max(1);

    let mut digest = Vec::with_capacity(DIGEST_SIZE * DIGEST_SIZE);

    for by in 0..DIGEST_SIZE {
        for bx in 0..DIGEST_SIZE {
            let y0 = (by * block_h).min(height.saturating_sub(1));
            let x0 = (bx * block_w).min(width.saturating_sub(1));
            let y1 = ((by + 1) * block_h).min(height);
            let x1 = ((bx + 1) * block_w).min(width);

            let mut sum = 0.0;
            let mut count = 0usize;
            for y in y0..y1.max(y0 + 1) {
                for x in x0..x1.max(x0 + 1) {
                    if y < height && x < width {
                        sum += residual[[y, x]];
                        count += 1;
                    }
                }
            }

            digest.push(if count > 0 { sum / count as f64 } else { 0.0 });
        }
    }

    digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::ImageLoader;
    use image::{DynamicImage, GrayImage, Luma};

    #[test]
    fn uniform_image_has_zero_pattern_strength() {
        let source = GrayImage::from_pixel(64, 64, Luma([128]));
        let loaded = ImageLoader::from_image(DynamicImage::ImageLuma8(source));

        let features = NoiseResidualExtractor::new().extract(&loaded);
        assert_eq!(features.pattern_strength, 0.0);
        assert!(features.std < 1e-6);
        assert!(features.digest.iter().all(|&v| v.abs() < 1e-6));
    }

    #[test]
    fn textured_image_has_positive_residual() {
        let source = GrayImage::from_fn(96, 96, |x, y| Luma([((x * 7 + y * 13) % 251) as u8]));
        let loaded = ImageLoader::from_image(DynamicImage::ImageLuma8(source));

        let features = NoiseResidualExtractor::new().extract(&loaded);
        assert!(features.std > 0.0);
        assert!(features.pattern_strength > 0.0);
        assert_eq!(features.digest.len(), DIGEST_SIZE * DIGEST_SIZE);
    }
}
