use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, ScanError},
    features::{FEATURE_DIM, FeatureVector},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedClass {
    pub brand: String,
    pub model: String,
    pub weights: Vec<f64>,
    pub bias: f64,
}

/// Externally trained linear classifier over the flattened feature vector.
///
/// The training pipeline is out of scope for this crate; it exports the
/// standardization parameters and per-class weights as JSON, which this
/// type validates and evaluates with a softmax over class scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    pub classes: Vec<TrainedClass>,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct Prediction {
    pub brand: String,
    pub model: String,
    pub confidence: f64,
    /// Top alternative classes as ("brand model", probability), best first.
    pub alternatives: Vec<(String, f64)>,
}

impl TrainedModel {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let model: TrainedModel = serde_json::from_reader(reader)
            .map_err(|e| ScanError::InvalidModel(e.to_string()))?;
        model.validate()?;
        Ok(model)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_reader(json.as_bytes())
    }

    fn validate(&self) -> Result<()> {
        if self.classes.is_empty() {
            return Err(ScanError::InvalidModel("model has no classes".into()));
        }
        if self.means.len() != FEATURE_DIM || self.scales.len() != FEATURE_DIM {
            return Err(ScanError::InvalidModel(format!(
                "standardization length {} != feature dimension {FEATURE_DIM}",
                self.means.len()
            )));
        }
        for class in &self.classes {
            if class.weights.len() != FEATURE_DIM {
                return Err(ScanError::InvalidModel(format!(
                    "class '{} {}' has {} weights, expected {FEATURE_DIM}",
                    class.brand,
                    class.model,
                    class.weights.len()
                )));
            }
        }
        Ok(())
    }

    pub fn predict(&self, features: &FeatureVector) -> Prediction {
        let flat = features.flatten();

        let standardized = flat
            .iter()
            .zip(self.means.iter().zip(self.scales.iter()))
            .map(|(&x, (&m, &s))| (x - m) / s.abs().max(1e-9))
            .collect::<Vec<_>>();

        let scores = self
            .classes
            .iter()
            .map(|class| {
                class.bias
                    + class
                        .weights
                        .iter()
                        .zip(standardized.iter())
                        .map(|(&w, &x)| w * x)
                        .sum::<f64>()
            })
            .collect::<Vec<_>>();

        // Softmax with max-shift for numeric stability.
        let max_score = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exps = scores.iter().map(|s| (s - max_score).exp()).collect::<Vec<_>>();
        let sum: f64 = exps.iter().sum();
        let probabilities = exps.iter().map(|e| e / sum).collect::<Vec<_>>();

        let mut ranked = probabilities
            .iter()
            .enumerate()
            .map(|(i, &p)| (i, p))
            .collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let best = &self.classes[ranked[0].0];
        let alternatives = ranked
            .iter()
            .take(3)
            .map(|&(i, p)| {
                let class = &self.classes[i];
                (format!("{} {}", class.brand, class.model), p)
            })
            .collect();

        Prediction {
            brand: best.brand.clone(),
            model: best.model.clone(),
            confidence: ranked[0].1,
            alternatives,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureVector;

    fn model_json(classes: &[(&str, &str, f64)]) -> String {
        let classes = classes
            .iter()
            .map(|&(brand, model, bias)| TrainedClass {
                brand: brand.to_string(),
                model: model.to_string(),
                weights: vec![0.0; FEATURE_DIM],
                bias,
            })
            .collect::<Vec<_>>();
        serde_json::to_string(&TrainedModel {
            classes,
            means: vec![0.0; FEATURE_DIM],
            scales: vec![1.0; FEATURE_DIM],
        })
        .unwrap()
    }

    #[test]
    fn biased_class_wins_prediction() {
        let json = model_json(&[("Canon", "CanoScan LiDE", 2.0), ("HP", "ScanJet Pro", -2.0)]);
        let model = TrainedModel::from_json(&json).unwrap();

        let prediction = model.predict(&FeatureVector::zeroed());
        assert_eq!(prediction.brand, "Canon");
        assert!(prediction.confidence > 0.9);
        assert_eq!(prediction.alternatives.len(), 2);
    }

    #[test]
    fn probabilities_are_normalized() {
        let json = model_json(&[("A", "1", 0.0), ("B", "2", 0.0), ("C", "3", 0.0)]);
        let model = TrainedModel::from_json(&json).unwrap();
        let prediction = model.predict(&FeatureVector::zeroed());
        assert!((prediction.confidence - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_wrong_weight_length() {
        let bad = serde_json::json!({
            "classes": [{"brand": "X", "model": "Y", "weights": [1.0, 2.0], "bias": 0.0}],
            "means": vec![0.0; FEATURE_DIM],
            "scales": vec![1.0; FEATURE_DIM],
        });
        let err = TrainedModel::from_json(&bad.to_string()).unwrap_err();
        assert!(matches!(err, ScanError::InvalidModel(_)));
    }

    #[test]
    fn rejects_empty_model() {
        let bad = serde_json::json!({
            "classes": [],
            "means": vec![0.0; FEATURE_DIM],
            "scales": vec![1.0; FEATURE_DIM],
        });
        assert!(TrainedModel::from_json(&bad.to_string()).is_err());
    }
}
