pub mod frequency;
pub mod noise;
pub mod prnu;
pub mod stats;
pub mod texture;
pub mod wavelet;

use serde::{Deserialize, Serialize};

use crate::loader::LoadedImage;

use self::{
    frequency::{FrequencyAnalyzer, RADIAL_BANDS},
    noise::NoiseAnalyzer,
    prnu::NoiseResidualExtractor,
    stats::StatisticsAnalyzer,
    texture::TextureAnalyzer,
    wavelet::WaveletAnalyzer,
};

/// Length of the flattened feature vector consumed by trained classifiers.
pub const FEATURE_DIM: usize = 53;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrnuFeatures {
    pub mean: f64,
    pub std: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub fft_energy: f64,
    pub pattern_strength: f64,
    pub autocorrelation: f64,
    /// 32x32 block-mean downsample of the noise residual; correlated against
    /// another image's digest by the comparison engine.
    pub digest: Vec<f64>,
}

impl PrnuFeatures {
    pub fn zeroed() -> Self {
        Self {
            mean: 0.0,
            std: 0.0,
            skewness: 0.0,
            kurtosis: 0.0,
            fft_energy: 0.0,
            pattern_strength: 0.0,
            autocorrelation: 0.0,
            digest: vec![0.0; prnu::DIGEST_SIZE * prnu::DIGEST_SIZE],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureFeatures {
    pub contrast: f64,
    pub dissimilarity: f64,
    pub homogeneity: f64,
    pub energy: f64,
    pub correlation: f64,
    pub contrast_std: f64,
}

impl TextureFeatures {
    pub fn zeroed() -> Self {
        Self {
            contrast: 0.0,
            dissimilarity: 0.0,
            homogeneity: 0.0,
            energy: 0.0,
            correlation: 0.0,
            contrast_std: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyFeatures {
    pub low_freq_energy: f64,
    pub high_freq_energy: f64,
    pub freq_ratio: f64,
    pub spectral_flatness: f64,
    pub spectral_centroid: f64,
    pub peak_periodicity: f64,
    pub radial_profile: Vec<f64>,
}

impl FrequencyFeatures {
    pub fn zeroed() -> Self {
        Self {
            low_freq_energy: 0.0,
            high_freq_energy: 0.0,
            freq_ratio: 0.0,
            spectral_flatness: 0.0,
            spectral_centroid: 0.0,
            peak_periodicity: 0.0,
            radial_profile: vec![0.0; RADIAL_BANDS],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveletFeatures {
    pub approx_energy: f64,
    pub approx_std: f64,
    pub total_detail_energy: f64,
    /// Level-major: [l1_h, l1_v, l1_d, l2_h, ...].
    pub detail_energies: Vec<f64>,
}

impl WaveletFeatures {
    pub fn zeroed(levels: usize) -> Self {
        Self {
            approx_energy: 0.0,
            approx_std: 0.0,
            total_detail_energy: 0.0,
            detail_energies: vec![0.0; levels * 3],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseFeatures {
    pub noise_mean: f64,
    pub noise_std: f64,
    pub noise_power: f64,
    pub noise_variance: f64,
    pub snr_db: f64,
}

impl NoiseFeatures {
    pub fn zeroed() -> Self {
        Self {
            noise_mean: 0.0,
            noise_std: 0.0,
            noise_power: 0.0,
            noise_variance: 0.0,
            snr_db: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntropyFeatures {
    pub mean: f64,
    pub std: f64,
    pub variance: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub entropy: f64,
}

impl EntropyFeatures {
    pub fn zeroed() -> Self {
        Self {
            mean: 0.0,
            std: 0.0,
            variance: 0.0,
            skewness: 0.0,
            kurtosis: 0.0,
            min: 0.0,
            max: 0.0,
            range: 0.0,
            entropy: 0.0,
        }
    }
}

/// Canonical feature vector: every extraction run populates all six groups.
/// Degenerate inputs fall back to zero-filled sub-vectors, never to missing
/// groups, so matching code never has to branch on vector shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub prnu: PrnuFeatures,
    pub texture: TextureFeatures,
    pub frequency: FrequencyFeatures,
    pub wavelet: WaveletFeatures,
    pub noise: NoiseFeatures,
    pub entropy: EntropyFeatures,
}

impl FeatureVector {
    pub fn zeroed() -> Self {
        Self {
            prnu: PrnuFeatures::zeroed(),
            texture: TextureFeatures::zeroed(),
            frequency: FrequencyFeatures::zeroed(),
            wavelet: WaveletFeatures::zeroed(3),
            noise: NoiseFeatures::zeroed(),
            entropy: EntropyFeatures::zeroed(),
        }
    }

    /// Fixed-order flattening into `FEATURE_DIM` scalars for trained
    /// classifiers. The PRNU digest is deliberately excluded: it encodes the
    /// individual document, not the device class.
    pub fn flatten(&self) -> Vec<f64> {
        let mut v = Vec::with_capacity(FEATURE_DIM);

        v.extend([
            self.prnu.mean,
            self.prnu.std,
            self.prnu.skewness,
            self.prnu.kurtosis,
            self.prnu.fft_energy,
            self.prnu.pattern_strength,
            self.prnu.autocorrelation,
        ]);
        v.extend([
            self.texture.contrast,
            self.texture.dissimilarity,
            self.texture.homogeneity,
            self.texture.energy,
            self.texture.correlation,
            self.texture.contrast_std,
        ]);
        v.extend([
            self.frequency.low_freq_energy,
            self.frequency.high_freq_energy,
            self.frequency.freq_ratio,
            self.frequency.spectral_flatness,
            self.frequency.spectral_centroid,
            self.frequency.peak_periodicity,
        ]);
        let mut profile = self.frequency.radial_profile.clone();
        profile.resize(RADIAL_BANDS, 0.0);
        v.extend(profile);
        v.extend([
            self.wavelet.approx_energy,
            self.wavelet.approx_std,
            self.wavelet.total_detail_energy,
        ]);
        let mut details = self.wavelet.detail_energies.clone();
        details.resize(9, 0.0);
        v.extend(details.into_iter().take(9));
        v.extend([
            self.noise.noise_mean,
            self.noise.noise_std,
            self.noise.noise_power,
            self.noise.noise_variance,
            self.noise.snr_db,
        ]);
        v.extend([
            self.entropy.mean,
            self.entropy.std,
            self.entropy.variance,
            self.entropy.skewness,
            self.entropy.kurtosis,
            self.entropy.min,
            self.entropy.max,
            self.entropy.range,
            self.entropy.entropy,
        ]);

        debug_assert_eq!(v.len(), FEATURE_DIM);
        v
    }

    pub fn all_finite(&self) -> bool {
        self.flatten().iter().all(|v| v.is_finite())
            && self.prnu.digest.iter().all(|v| v.is_finite())
    }
}

/// Runs every analyzer and assembles the canonical vector plus the
/// human-readable summary. The summary is purely descriptive; matching is
/// driven by the numeric vector alone.
#[derive(Debug)]
pub struct FeatureAggregator {
    prnu: NoiseResidualExtractor,
    texture: TextureAnalyzer,
    frequency: FrequencyAnalyzer,
    wavelet: WaveletAnalyzer,
    noise: NoiseAnalyzer,
    statistics: StatisticsAnalyzer,
}

impl FeatureAggregator {
    pub fn new() -> Self {
        Self {
            prnu: NoiseResidualExtractor::new(),
            texture: TextureAnalyzer::new(),
            frequency: FrequencyAnalyzer::new(),
            wavelet: WaveletAnalyzer::new(),
            noise: NoiseAnalyzer::new(),
            statistics: StatisticsAnalyzer::new(),
        }
    }

    pub fn extract(&self, image: &LoadedImage) -> FeatureVector {
        log::debug!(
            "extracting features from {}x{} source",
            image.source_width,
            image.source_height
        );

        FeatureVector {
            prnu: self.prnu.extract(image),
            texture: self.texture.extract(image),
            frequency: self.frequency.extract(image),
            wavelet: self.wavelet.extract(image),
            noise: self.noise.extract(image),
            entropy: self.statistics.extract(image),
        }
    }

    pub fn summarize(&self, features: &FeatureVector) -> Vec<String> {
        vec![
            format!(
                "PRNU: std {:.4}, pattern strength {:.4}",
                features.prnu.std, features.prnu.pattern_strength
            ),
            format!(
                "Texture: energy {:.4}, homogeneity {:.4}",
                features.texture.energy, features.texture.homogeneity
            ),
            format!("Frequency: low/high ratio {:.2}", features.frequency.freq_ratio),
            format!(
                "Wavelet: total detail energy {:.4}",
                features.wavelet.total_detail_energy
            ),
            format!("Noise: SNR {:.2} dB", features.noise.snr_db),
            format!("Entropy: {:.2} bits", features.entropy.entropy),
        ]
    }
}

impl Default for FeatureAggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::ImageLoader;
    use image::{DynamicImage, GrayImage, Luma};

    fn load(source: GrayImage) -> LoadedImage {
        ImageLoader::from_image(DynamicImage::ImageLuma8(source))
    }

    #[test]
    fn all_groups_present_and_finite() {
        let image = load(GrayImage::from_fn(80, 120, |x, y| {
            Luma([((x * 3 + y * 7 + (x * y) % 31) % 256) as u8])
        }));

        let features = FeatureAggregator::new().extract(&image);
        assert!(features.all_finite());
        assert_eq!(features.flatten().len(), FEATURE_DIM);
    }

    #[test]
    fn uniform_image_is_finite_and_does_not_raise() {
        let image = load(GrayImage::from_pixel(64, 64, Luma([128])));
        let features = FeatureAggregator::new().extract(&image);
        assert!(features.all_finite());
        assert_eq!(features.prnu.pattern_strength, 0.0);
    }

    #[test]
    fn tiny_image_gets_zero_texture_group() {
        let image = load(GrayImage::from_fn(10, 10, |x, _| Luma([(x * 20) as u8])));
        let features = FeatureAggregator::new().extract(&image);
        assert_eq!(features.texture, TextureFeatures::zeroed());
        assert!(features.all_finite());
    }

    #[test]
    fn summary_has_one_line_per_group() {
        let image = load(GrayImage::from_pixel(64, 64, Luma([10])));
        let aggregator = FeatureAggregator::new();
        let features = aggregator.extract(&image);
        assert_eq!(aggregator.summarize(&features).len(), 6);
    }
}
