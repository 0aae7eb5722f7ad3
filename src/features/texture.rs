use ndarray::Array2;

use crate::{features::TextureFeatures, loader::LoadedImage};

/// Sources smaller than this on either side carry too few pixel pairs for a
/// meaningful co-occurrence count; they fall back to the zero vector.
pub const MIN_TEXTURE_DIM: u32 = 32;

#[derive(Debug, Clone)]
pub struct TextureConfig {
    pub gray_levels: usize,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self { gray_levels: 16 }
    }
}

/// GLCM texture statistics, averaged over a horizontal and a diagonal
/// offset. Two directions are required: a single-direction matrix is
/// systematically biased by document orientation.
#[derive(Debug)]
pub struct TextureAnalyzer {
    config: TextureConfig,
}

const OFFSETS: [(usize, usize); 2] = [(0, 1), (1, 1)];

impl TextureAnalyzer {
    pub fn new() -> Self {
        Self::with_config(TextureConfig::default())
    }

    pub fn with_config(config: TextureConfig) -> Self {
        Self { config }
    }

    pub fn extract(&self, image: &LoadedImage) -> TextureFeatures {
        if image.source_width < MIN_TEXTURE_DIM || image.source_height < MIN_TEXTURE_DIM {
            log::warn!(
                "source {}x{} below {}px texture minimum, using zero texture vector",
                image.source_width,
                image.source_height,
                MIN_TEXTURE_DIM
            );
            return TextureFeatures::zeroed();
        }

        let quantized = self.quantize(&image.resized);

        let mut per_offset = Vec::with_capacity(OFFSETS.len());
        for &offset in &OFFSETS {
            let glcm = self.co_occurrence(&quantized, offset);
            per_offset.push(self.glcm_properties(&glcm));
        }

        let n = per_offset.len() as f64;
        let avg = |f: fn(&GlcmProperties) -> f64| per_offset.iter().map(f).sum::<f64>() / n;

        let contrasts = per_offset.iter().map(|p| p.contrast).collect::<Vec<_>>();

        TextureFeatures {
            contrast: avg(|p| p.contrast),
            dissimilarity: avg(|p| p.dissimilarity),
            homogeneity: avg(|p| p.homogeneity),
            energy: avg(|p| p.energy),
            correlation: avg(|p| p.correlation),
            contrast_std: crate::image_utils::std_dev(&contrasts),
        }
    }

    fn quantize(&self, gray: &Array2<f64>) -> Array2<usize> {
        let levels = self.config.gray_levels as f64;
        gray.mapv(|v| {
            ((v.clamp(0.0, 255.0) / 256.0) * levels).floor() as usize
        })
    }

    /// Symmetric co-occurrence matrix, normalized to joint probabilities.
    fn co_occurrence(&self, quantized: &Array2<usize>, (dy, dx): (usize, usize)) -> Array2<f64> {
        let levels = self.config.gray_levels;
        let (height, width) = quantized.dim();
        let mut glcm = Array2::zeros((levels, levels));

        for y in 0..height.saturating_sub(dy) {
            for x in 0..width.saturating_sub(dx) {
                let a = quantized[[y, x]];
                let b = quantized[[y + dy, x + dx]];
                glcm[[a, b]] += 1.0;
                glcm[[b, a]] += 1.0;
            }
        }

        let total: f64 = glcm.iter().sum();
        if total > 0.0 {
            glcm.mapv_inplace(|v| v / total);
        }

        glcm
    }

    fn glcm_properties(&self, glcm: &Array2<f64>) -> GlcmProperties {
        let levels = self.config.gray_levels;

        let mut contrast = 0.0;
        let mut dissimilarity = 0.0;
        let mut homogeneity = 0.0;
        let mut energy = 0.0;
        let mut mean_i = 0.0;
        let mut mean_j = 0.0;

        for i in 0..levels {
            for j in 0..levels {
                let p = glcm[[i, j]];
                let diff = i as f64 - j as f64;
                contrast += p * diff * diff;
                dissimilarity += p * diff.abs();
                homogeneity += p / (1.0 + diff * diff);
                energy += p * p;
                mean_i += p * i as f64;
                mean_j += p * j as f64;
            }
        }

        let mut var_i = 0.0;
        let mut var_j = 0.0;
        let mut covariance = 0.0;
        for i in 0..levels {
            for j in 0..levels {
                let p = glcm[[i, j]];
                var_i += p * (i as f64 - mean_i).powi(2);
                var_j += p * (j as f64 - mean_j).powi(2);
                covariance += p * (i as f64 - mean_i) * (j as f64 - mean_j);
            }
        }

        let correlation = if var_i < 1e-12 || var_j < 1e-12 {
            // Flat blocks have no pairwise variance; correlation is neutral.
            0.0
        } else {
            covariance / (var_i.sqrt() * var_j.sqrt())
        };

        GlcmProperties {
            contrast,
            dissimilarity,
            homogeneity,
            energy: energy.sqrt(),
            correlation,
        }
    }
}

impl Default for TextureAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

struct GlcmProperties {
    contrast: f64,
    dissimilarity: f64,
    homogeneity: f64,
    energy: f64,
    correlation: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::ImageLoader;
    use image::{DynamicImage, GrayImage, Luma};

    #[test]
    fn tiny_source_falls_back_to_zero_vector() {
        let source = GrayImage::from_fn(10, 10, |x, y| Luma([(x * 25 + y) as u8]));
        let loaded = ImageLoader::from_image(DynamicImage::ImageLuma8(source));

        let features = TextureAnalyzer::new().extract(&loaded);
        assert_eq!(features, TextureFeatures::zeroed());
    }

    #[test]
    fn uniform_image_has_full_homogeneity() {
        let source = GrayImage::from_pixel(64, 64, Luma([200]));
        let loaded = ImageLoader::from_image(DynamicImage::ImageLuma8(source));

        let features = TextureAnalyzer::new().extract(&loaded);
        assert!((features.homogeneity - 1.0).abs() < 1e-9);
        assert_eq!(features.contrast, 0.0);
        assert!((features.energy - 1.0).abs() < 1e-9);
    }

    #[test]
    fn textured_image_has_contrast_and_bounded_energy() {
        let source = GrayImage::from_fn(128, 128, |x, y| Luma([((x * 31 + y * 17) % 256) as u8]));
        let loaded = ImageLoader::from_image(DynamicImage::ImageLuma8(source));

        let features = TextureAnalyzer::new().extract(&loaded);
        assert!(features.contrast > 0.0);
        assert!(features.energy > 0.0 && features.energy <= 1.0);
        assert!(features.homogeneity > 0.0 && features.homogeneity < 1.0);
    }
}
