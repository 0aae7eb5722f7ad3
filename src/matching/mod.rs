pub mod database;
pub mod trained;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    compare::scalar_similarity,
    error::{Result, ScanError},
    features::FeatureVector,
};

use self::{
    database::{ScannerSignature, SignatureDatabase},
    trained::TrainedModel,
};

/// Ordinal confidence bucket. Thresholds are exact and boundary values
/// belong to the higher bucket, so downstream reports are reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    VeryHigh,
    High,
    Medium,
    Low,
    VeryLow,
}

impl ConfidenceLevel {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.90 {
            ConfidenceLevel::VeryHigh
        } else if confidence >= 0.75 {
            ConfidenceLevel::High
        } else if confidence >= 0.60 {
            ConfidenceLevel::Medium
        } else if confidence >= 0.40 {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::VeryLow
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceLevel::VeryHigh => "Very High",
            ConfidenceLevel::High => "High",
            ConfidenceLevel::Medium => "Medium",
            ConfidenceLevel::Low => "Low",
            ConfidenceLevel::VeryLow => "Very Low",
        }
    }
}

/// Identification outcome. A plain tree of scalars, strings and lists so
/// any serialization layer can encode it without special cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub brand: String,
    pub model: String,
    /// Rounded to 4 decimal places at construction.
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    pub features_summary: Vec<String>,
    pub primary_indicators: Vec<String>,
    pub secondary_indicators: Vec<String>,
    pub anomalies: Vec<String>,
}

/// Per-group weights for heuristic signature matching. Treated as tunable
/// parameters, not ground truth; the defaults favor the device-specific
/// groups.
#[derive(Debug, Clone)]
pub struct MatchWeights {
    pub prnu: f64,
    pub texture: f64,
    pub frequency: f64,
    pub wavelet: f64,
    pub noise: f64,
    pub entropy: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            prnu: 0.30,
            texture: 0.20,
            frequency: 0.15,
            wavelet: 0.15,
            noise: 0.10,
            entropy: 0.10,
        }
    }
}

/// Matcher variant is chosen once at construction; call sites never branch
/// on which mode is active.
#[derive(Debug)]
pub enum SignatureMatcher {
    Heuristic(HeuristicMatcher),
    Trained(TrainedMatcher),
}

impl SignatureMatcher {
    pub fn heuristic(database: Arc<SignatureDatabase>) -> Result<Self> {
        Ok(SignatureMatcher::Heuristic(HeuristicMatcher::new(database)?))
    }

    pub fn trained(model: TrainedModel) -> Self {
        SignatureMatcher::Trained(TrainedMatcher::new(model))
    }

    pub fn identify(&self, features: &FeatureVector, summary: Vec<String>) -> AnalysisResult {
        match self {
            SignatureMatcher::Heuristic(matcher) => matcher.identify(features, summary),
            SignatureMatcher::Trained(matcher) => matcher.identify(features, summary),
        }
    }
}

#[derive(Debug)]
pub struct HeuristicMatcher {
    database: Arc<SignatureDatabase>,
    weights: MatchWeights,
}

impl HeuristicMatcher {
    /// Fails with `NoSignaturesLoaded` for an empty database: that is a
    /// startup misconfiguration, not a per-request condition.
    pub fn new(database: Arc<SignatureDatabase>) -> Result<Self> {
        if database.is_empty() {
            return Err(ScanError::NoSignaturesLoaded);
        }
        Ok(Self {
            database,
            weights: MatchWeights::default(),
        })
    }

    pub fn with_weights(mut self, weights: MatchWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn identify(&self, features: &FeatureVector, summary: Vec<String>) -> AnalysisResult {
        let mut best: Option<(&ScannerSignature, GroupScores)> = None;

        for signature in self.database.iter() {
            let scores = self.score(features, signature);
            let replace = match &best {
                None => true,
                Some((current, current_scores)) => {
                    let delta = scores.confidence - current_scores.confidence;
                    if delta.abs() < 1e-9 {
                        // Tie: the brand with fewer registered models is the
                        // more specific claim and wins.
                        self.database.model_count(&signature.brand)
                            < self.database.model_count(&current.brand)
                    } else {
                        delta > 0.0
                    }
                }
            };
            if replace {
                best = Some((signature, scores));
            }
        }

        // new() guarantees at least one signature.
        let (signature, scores) = best.expect("non-empty signature database");
        log::debug!(
            "best signature match: {} {} at {:.3}",
            signature.brand,
            signature.model,
            scores.confidence
        );

        build_result(
            signature.brand.clone(),
            signature.model.clone(),
            scores.confidence,
            summary,
            indicators_for(features, &scores, &signature.brand),
        )
    }

    fn score(&self, features: &FeatureVector, signature: &ScannerSignature) -> GroupScores {
        let r = &signature.reference;

        let prnu = group_similarity(&[
            (features.prnu.std, r.prnu.std),
            (features.prnu.pattern_strength, r.prnu.pattern_strength),
            (features.prnu.fft_energy, r.prnu.fft_energy),
            (features.prnu.autocorrelation, r.prnu.autocorrelation),
        ]);
        let texture = group_similarity(&[
            (features.texture.energy, r.texture.energy),
            (features.texture.contrast, r.texture.contrast),
            (features.texture.homogeneity, r.texture.homogeneity),
            (features.texture.correlation, r.texture.correlation),
        ]);
        let frequency = group_similarity(&[
            (features.frequency.freq_ratio, r.frequency.freq_ratio),
            (features.frequency.spectral_flatness, r.frequency.spectral_flatness),
            (features.frequency.peak_periodicity, r.frequency.peak_periodicity),
        ]);
        let wavelet = group_similarity(&[
            (features.wavelet.approx_energy, r.wavelet.approx_energy),
            (features.wavelet.total_detail_energy, r.wavelet.total_detail_energy),
        ]);
        let noise = group_similarity(&[
            (features.noise.noise_std, r.noise.noise_std),
            (features.noise.snr_db, r.noise.snr_db),
        ]);
        let entropy = group_similarity(&[
            (features.entropy.entropy, r.entropy.entropy),
            (features.entropy.std, r.entropy.std),
        ]);

        let w = &self.weights;
        let total = w.prnu + w.texture + w.frequency + w.wavelet + w.noise + w.entropy;
        let weighted = (prnu * w.prnu
            + texture * w.texture
            + frequency * w.frequency
            + wavelet * w.wavelet
            + noise * w.noise
            + entropy * w.entropy)
            / total;

        GroupScores {
            prnu,
            texture,
            frequency,
            wavelet,
            confidence: (weighted + signature.calibration_offset).clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug)]
pub struct TrainedMatcher {
    model: TrainedModel,
}

impl TrainedMatcher {
    pub fn new(model: TrainedModel) -> Self {
        Self { model }
    }

    pub fn identify(&self, features: &FeatureVector, summary: Vec<String>) -> AnalysisResult {
        let prediction = self.model.predict(features);

        let mut primary = vec![format!(
            "Classifier confidence: {:.1}%",
            prediction.confidence * 100.0
        )];
        primary.push(format!(
            "PRNU pattern profile consistent with {} sensors",
            prediction.brand
        ));

        let alternatives = prediction
            .alternatives
            .iter()
            .skip(1)
            .map(|(name, p)| format!("{name} ({:.1}%)", p * 100.0))
            .collect::<Vec<_>>();
        let mut secondary = Vec::new();
        if !alternatives.is_empty() {
            secondary.push(format!("Top alternatives: {}", alternatives.join(", ")));
        }
        secondary.push(format!(
            "Noise profile std: {:.4}",
            features.noise.noise_std
        ));

        // Explainability still comes from the raw vector, not the model.
        let anomalies = feature_anomalies(features);

        build_result(
            prediction.brand,
            prediction.model,
            prediction.confidence,
            summary,
            Indicators {
                primary,
                secondary,
                anomalies,
            },
        )
    }
}

struct GroupScores {
    prnu: f64,
    texture: f64,
    frequency: f64,
    wavelet: f64,
    confidence: f64,
}

struct Indicators {
    primary: Vec<String>,
    secondary: Vec<String>,
    anomalies: Vec<String>,
}

fn group_similarity(pairs: &[(f64, f64)]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    pairs.iter().map(|&(a, b)| scalar_similarity(a, b)).sum::<f64>() / pairs.len() as f64
}

fn indicators_for(features: &FeatureVector, scores: &GroupScores, brand: &str) -> Indicators {
    let mut primary = Vec::new();
    let mut secondary = Vec::new();

    let mut classify = |score: f64, strong: String, weak: String| {
        if score >= 0.75 {
            primary.push(strong);
        } else if score >= 0.50 {
            secondary.push(weak);
        }
    };

    classify(
        scores.prnu,
        format!("PRNU pattern matches {brand} signature"),
        format!("PRNU pattern partially consistent with {brand}"),
    );
    classify(
        scores.texture,
        format!("Texture characteristics consistent with {brand} scanners"),
        "Texture characteristics weakly supportive".to_string(),
    );
    classify(
        scores.frequency,
        format!("Frequency domain analysis indicates {brand} sensor type"),
        "Frequency profile weakly supportive".to_string(),
    );
    classify(
        scores.wavelet,
        "Wavelet energy distribution consistent with flatbed scanner".to_string(),
        "Wavelet energy distribution partially consistent".to_string(),
    );

    secondary.push(format!("Noise profile std: {:.4}", features.noise.noise_std));

    let mut anomalies = feature_anomalies(features);
    for (score, name) in [
        (scores.prnu, "PRNU"),
        (scores.texture, "texture"),
        (scores.frequency, "frequency"),
    ] {
        if score < 0.35 {
            anomalies.push(format!(
                "{name} profile inconsistent with the {brand} reference"
            ));
        }
    }

    Indicators {
        primary,
        secondary,
        anomalies,
    }
}

fn feature_anomalies(features: &FeatureVector) -> Vec<String> {
    let mut anomalies = Vec::new();

    if features.prnu.std > 0.05 {
        anomalies.push("Unusually high PRNU variance detected".to_string());
    }
    if features.noise.snr_db < 10.0 {
        anomalies.push("Low SNR may indicate compression or degradation".to_string());
    }
    if features.entropy.entropy < 1.0 {
        anomalies.push("Very low image entropy; content may be too uniform".to_string());
    }

    anomalies
}

fn build_result(
    brand: String,
    model: String,
    confidence: f64,
    features_summary: Vec<String>,
    indicators: Indicators,
) -> AnalysisResult {
    let confidence = round4(confidence);
    let mut anomalies = indicators.anomalies;
    if anomalies.is_empty() {
        anomalies.push("No anomalies detected".to_string());
    }

    AnalysisResult {
        brand,
        model,
        confidence,
        confidence_level: ConfidenceLevel::from_confidence(confidence),
        features_summary,
        primary_indicators: indicators.primary,
        secondary_indicators: indicators.secondary,
        anomalies,
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FEATURE_DIM, FeatureVector};

    fn reference() -> FeatureVector {
        SignatureDatabase::builtin()
            .get("Canon", "CanoScan LiDE")
            .unwrap()
            .reference
            .clone()
    }

    fn signature(brand: &str, model: &str, offset: f64) -> ScannerSignature {
        ScannerSignature {
            brand: brand.to_string(),
            model: model.to_string(),
            reference: reference(),
            calibration_offset: offset,
        }
    }

    fn two_class_model() -> TrainedModel {
        let json = serde_json::json!({
            "classes": [
                {"brand": "Canon", "model": "CanoScan LiDE",
                 "weights": vec![0.0; FEATURE_DIM], "bias": 3.0},
                {"brand": "HP", "model": "ScanJet Pro",
                 "weights": vec![0.0; FEATURE_DIM], "bias": -3.0},
            ],
            "means": vec![0.0; FEATURE_DIM],
            "scales": vec![1.0; FEATURE_DIM],
        });
        TrainedModel::from_json(&json.to_string()).unwrap()
    }

    #[test]
    fn confidence_buckets_are_a_step_function() {
        assert_eq!(
            ConfidenceLevel::from_confidence(0.91),
            ConfidenceLevel::VeryHigh
        );
        assert_eq!(ConfidenceLevel::from_confidence(0.90), ConfidenceLevel::VeryHigh);
        assert_eq!(ConfidenceLevel::from_confidence(0.75), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_confidence(0.60), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_confidence(0.59999), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_confidence(0.40), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_confidence(0.399), ConfidenceLevel::VeryLow);
    }

    #[test]
    fn empty_database_is_a_startup_error() {
        let err = SignatureMatcher::heuristic(Arc::new(SignatureDatabase::new([]))).unwrap_err();
        assert!(matches!(err, ScanError::NoSignaturesLoaded));
    }

    #[test]
    fn exact_reference_match_has_high_confidence() {
        let db = SignatureDatabase::builtin();
        let reference = db.get("Canon", "CanoScan LiDE").unwrap().reference.clone();

        let matcher = SignatureMatcher::heuristic(Arc::new(db)).unwrap();
        let result = matcher.identify(&reference, vec![]);

        assert_eq!(result.brand, "Canon");
        assert_eq!(result.model, "CanoScan LiDE");
        assert!(result.confidence >= 0.99);
        assert_eq!(result.confidence_level, ConfidenceLevel::VeryHigh);
        assert!(!result.primary_indicators.is_empty());
    }

    #[test]
    fn poor_match_still_returns_best_candidate() {
        let matcher =
            SignatureMatcher::heuristic(Arc::new(SignatureDatabase::builtin())).unwrap();
        let result = matcher.identify(&FeatureVector::zeroed(), vec![]);

        assert!(!result.brand.is_empty());
        assert!(result.confidence < 0.60);
        assert!(!result.anomalies.is_empty());
    }

    #[test]
    fn anomaly_sentinel_when_nothing_flagged() {
        let db = SignatureDatabase::builtin();
        let reference = db.get("Epson", "Expression").unwrap().reference.clone();
        let matcher = SignatureMatcher::heuristic(Arc::new(db)).unwrap();

        let result = matcher.identify(&reference, vec![]);
        assert_eq!(result.anomalies, vec!["No anomalies detected".to_string()]);
    }

    #[test]
    fn confidence_is_rounded_to_four_decimals() {
        assert_eq!(round4(0.123456), 0.1235);
        assert_eq!(round4(1.0), 1.0);
    }

    #[test]
    fn score_ties_break_toward_brand_with_fewer_models() {
        // Every signature carries the same reference vector, so all three
        // score identically. "Alpha" iterates first in the BTreeMap; the tie
        // must still land on the single-model brand.
        let db = SignatureDatabase::new([
            signature("Alpha", "One", 0.0),
            signature("Alpha", "Two", 0.0),
            signature("Zed", "Only", 0.0),
        ]);
        let matcher = SignatureMatcher::heuristic(Arc::new(db)).unwrap();

        let result = matcher.identify(&reference(), vec![]);
        assert_eq!(result.brand, "Zed");
        assert_eq!(result.model, "Only");
    }

    #[test]
    fn calibration_offset_is_clamped_to_unit_interval() {
        let db = SignatureDatabase::new([signature("Cal", "Plus", 0.5)]);
        let matcher = SignatureMatcher::heuristic(Arc::new(db)).unwrap();

        // Exact match scores 1.0 before the offset; the clamp keeps the
        // reported confidence inside [0, 1].
        let result = matcher.identify(&reference(), vec![]);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.confidence_level, ConfidenceLevel::VeryHigh);
    }

    #[test]
    fn trained_matcher_emits_indicators_and_anomaly_sentinel() {
        let matcher = SignatureMatcher::trained(two_class_model());

        let result = matcher.identify(&reference(), vec!["summary".to_string()]);
        assert_eq!(result.brand, "Canon");
        assert_eq!(result.model, "CanoScan LiDE");
        assert!(result.confidence > 0.9);
        assert_eq!(result.confidence_level, ConfidenceLevel::VeryHigh);
        assert!(
            result
                .primary_indicators
                .iter()
                .any(|s| s.contains("Classifier confidence"))
        );
        assert!(
            result
                .secondary_indicators
                .iter()
                .any(|s| s.contains("Top alternatives: HP ScanJet Pro"))
        );
        // The reference vector is healthy, so the sentinel line appears.
        assert_eq!(result.anomalies, vec!["No anomalies detected".to_string()]);
        assert_eq!(result.features_summary, vec!["summary".to_string()]);
    }

    #[test]
    fn confidence_is_rounded_before_bucketing() {
        let result = build_result(
            "Canon".to_string(),
            "CanoScan LiDE".to_string(),
            0.89996,
            vec![],
            Indicators {
                primary: vec![],
                secondary: vec![],
                anomalies: vec![],
            },
        );

        // 0.89996 rounds up to 0.9000, which belongs to the top bucket.
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.confidence_level, ConfidenceLevel::VeryHigh);
    }
}
