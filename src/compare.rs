use serde::{Deserialize, Serialize};

use crate::{
    features::{FeatureVector, FrequencyFeatures, PrnuFeatures, TextureFeatures, WaveletFeatures},
    image_utils::pearson,
};

/// Aggregate weights for the per-group similarities. PRNU is weighted
/// highest: sensor noise is the most device-specific of the four signals.
#[derive(Debug, Clone)]
pub struct CompareWeights {
    pub prnu: f64,
    pub texture: f64,
    pub frequency: f64,
    pub wavelet: f64,
}

impl Default for CompareWeights {
    fn default() -> Self {
        Self {
            prnu: 0.40,
            texture: 0.25,
            frequency: 0.20,
            wavelet: 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchVerdict {
    SameScannerVeryHigh,
    SameScannerHigh,
    SimilarDeviceClass,
    WeakSimilarity,
    DifferentScanners,
}

impl MatchVerdict {
    /// Thresholds mirror the confidence buckets; boundary values belong to
    /// the stronger verdict.
    pub fn from_similarity(similarity: f64) -> Self {
        if similarity >= 0.90 {
            MatchVerdict::SameScannerVeryHigh
        } else if similarity >= 0.75 {
            MatchVerdict::SameScannerHigh
        } else if similarity >= 0.60 {
            MatchVerdict::SimilarDeviceClass
        } else if similarity >= 0.40 {
            MatchVerdict::WeakSimilarity
        } else {
            MatchVerdict::DifferentScanners
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(
            self,
            MatchVerdict::SameScannerVeryHigh | MatchVerdict::SameScannerHigh
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            MatchVerdict::SameScannerVeryHigh => "High Probability - Same Scanner",
            MatchVerdict::SameScannerHigh => "Likely - Same Scanner",
            MatchVerdict::SimilarDeviceClass => "Possible - Similar Scanner Type",
            MatchVerdict::WeakSimilarity => "Weak Similarity",
            MatchVerdict::DifferentScanners => "Unlikely - Different Scanners",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub prnu_similarity: f64,
    pub texture_similarity: f64,
    pub frequency_similarity: f64,
    pub wavelet_similarity: f64,
    pub overall_similarity: f64,
    pub verdict: MatchVerdict,
    pub analysis: Vec<String>,
}

/// Pure, symmetric comparison of two feature vectors.
#[derive(Debug)]
pub struct ComparisonEngine {
    weights: CompareWeights,
}

impl ComparisonEngine {
    pub fn new() -> Self {
        Self::with_weights(CompareWeights::default())
    }

    pub fn with_weights(weights: CompareWeights) -> Self {
        Self { weights }
    }

    pub fn compare(&self, a: &FeatureVector, b: &FeatureVector) -> ComparisonResult {
        let prnu = prnu_similarity(&a.prnu, &b.prnu);
        let texture = texture_similarity(&a.texture, &b.texture);
        let frequency = frequency_similarity(&a.frequency, &b.frequency);
        let wavelet = wavelet_similarity(&a.wavelet, &b.wavelet);

        let w = &self.weights;
        let total_weight = w.prnu + w.texture + w.frequency + w.wavelet;
        let overall = (prnu * w.prnu
            + texture * w.texture
            + frequency * w.frequency
            + wavelet * w.wavelet)
            / total_weight;

        let verdict = MatchVerdict::from_similarity(overall);

        ComparisonResult {
            prnu_similarity: prnu,
            texture_similarity: texture,
            frequency_similarity: frequency,
            wavelet_similarity: wavelet,
            overall_similarity: overall,
            verdict,
            analysis: self.describe(overall, prnu, texture, frequency),
        }
    }

    fn describe(&self, overall: f64, prnu: f64, texture: f64, frequency: f64) -> Vec<String> {
        let mut analysis = Vec::new();

        if prnu >= 0.8 {
            analysis.push("Strong PRNU pattern match indicates the same sensor".to_string());
        } else if prnu >= 0.6 {
            analysis.push("Moderate PRNU similarity suggests a similar scanner type".to_string());
        } else {
            analysis.push("Low PRNU correlation indicates different scanners".to_string());
        }

        if texture >= 0.7 {
            analysis.push("Consistent texture characteristics across both scans".to_string());
        }
        if frequency >= 0.7 {
            analysis.push("Matching frequency signatures detected".to_string());
        }

        if overall >= 0.90 {
            analysis.push("Multiple indicators strongly support same scanner origin".to_string());
        } else if overall < 0.40 {
            analysis.push("Significant differences suggest different scanner devices".to_string());
        }

        analysis
    }
}

impl Default for ComparisonEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Relative similarity of two scalars: 1 when equal, falling off with the
/// difference measured against the larger magnitude. Symmetric by design.
pub fn scalar_similarity(a: f64, b: f64) -> f64 {
    let scale = a.abs().max(b.abs()).max(1e-3);
    (1.0 - (a - b).abs() / scale).clamp(0.0, 1.0)
}

fn slice_similarity(pairs: &[(f64, f64)]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    pairs.iter().map(|&(a, b)| scalar_similarity(a, b)).sum::<f64>() / pairs.len() as f64
}

/// PRNU similarity: digest correlation carries most of the weight because it
/// is the part that actually discriminates individual sensors; the summary
/// statistics only describe the noise amplitude profile.
fn prnu_similarity(a: &PrnuFeatures, b: &PrnuFeatures) -> f64 {
    let correlation = match pearson(&a.digest, &b.digest) {
        Some(r) => r.max(0.0),
        // Both residuals flat (e.g. two uniform scans): identical patterns.
        // One flat, one not: no pattern agreement.
        None => {
            let flat = |d: &[f64]| d.iter().all(|&v| v.abs() < 1e-12);
            if flat(&a.digest) && flat(&b.digest) { 1.0 } else { 0.0 }
        }
    };

    let stats = slice_similarity(&[
        (a.std, b.std),
        (a.pattern_strength, b.pattern_strength),
        (a.fft_energy, b.fft_energy),
        (a.autocorrelation, b.autocorrelation),
    ]);

    (correlation * 0.7 + stats * 0.3).clamp(0.0, 1.0)
}

fn texture_similarity(a: &TextureFeatures, b: &TextureFeatures) -> f64 {
    slice_similarity(&[
        (a.contrast, b.contrast),
        (a.dissimilarity, b.dissimilarity),
        (a.homogeneity, b.homogeneity),
        (a.energy, b.energy),
        (a.correlation, b.correlation),
    ])
}

fn frequency_similarity(a: &FrequencyFeatures, b: &FrequencyFeatures) -> f64 {
    let scalars = slice_similarity(&[
        (a.low_freq_energy, b.low_freq_energy),
        (a.high_freq_energy, b.high_freq_energy),
        (a.freq_ratio, b.freq_ratio),
        (a.spectral_flatness, b.spectral_flatness),
        (a.spectral_centroid, b.spectral_centroid),
        (a.peak_periodicity, b.peak_periodicity),
    ]);

    let bands = a
        .radial_profile
        .iter()
        .zip(b.radial_profile.iter())
        .map(|(&x, &y)| (x, y))
        .collect::<Vec<_>>();
    let profile = slice_similarity(&bands);

    scalars * 0.6 + profile * 0.4
}

fn wavelet_similarity(a: &WaveletFeatures, b: &WaveletFeatures) -> f64 {
    let mut pairs = vec![
        (a.approx_energy, b.approx_energy),
        (a.approx_std, b.approx_std),
        (a.total_detail_energy, b.total_detail_energy),
    ];
    pairs.extend(
        a.detail_energies
            .iter()
            .zip(b.detail_energies.iter())
            .map(|(&x, &y)| (x, y)),
    );

    slice_similarity(&pairs)
}
