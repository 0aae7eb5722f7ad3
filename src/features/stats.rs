use ndarray_stats::QuantileExt;

use crate::{
    features::EntropyFeatures,
    image_utils::{kurtosis, shannon_entropy, skewness},
    loader::LoadedImage,
};

/// Global intensity statistics and Shannon entropy over the resampled
/// 0..255 grayscale raster.
#[derive(Debug)]
pub struct StatisticsAnalyzer;

impl StatisticsAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, image: &LoadedImage) -> EntropyFeatures {
        let resized = &image.resized;
        let values = resized.iter().cloned().collect::<Vec<_>>();

        let mean = crate::image_utils::mean(&values);
        let std = crate::image_utils::std_dev(&values);
        let min = resized.min().map(|v| *v).unwrap_or(0.0);
        let max = resized.max().map(|v| *v).unwrap_or(0.0);

        EntropyFeatures {
            mean,
            std,
            variance: std * std,
            skewness: skewness(resized),
            kurtosis: kurtosis(resized),
            min,
            max,
            range: max - min,
            entropy: shannon_entropy(resized),
        }
    }
}

impl Default for StatisticsAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::ImageLoader;
    use image::{DynamicImage, GrayImage, Luma};

    #[test]
    fn uniform_image_statistics() {
        let source = GrayImage::from_pixel(64, 64, Luma([77]));
        let loaded = ImageLoader::from_image(DynamicImage::ImageLuma8(source));

        let features = StatisticsAnalyzer::new().extract(&loaded);
        assert!((features.mean - 77.0).abs() < 1.0);
        assert_eq!(features.range, 0.0);
        assert_eq!(features.entropy, 0.0);
        assert_eq!(features.skewness, 0.0);
    }

    #[test]
    fn varied_image_has_positive_entropy() {
        let source = GrayImage::from_fn(64, 64, |x, y| Luma([((x + 64 * y) % 256) as u8]));
        let loaded = ImageLoader::from_image(DynamicImage::ImageLuma8(source));

        let features = StatisticsAnalyzer::new().extract(&loaded);
        assert!(features.entropy > 4.0);
        assert!(features.range > 0.0);
        assert!(features.variance > 0.0);
    }
}
