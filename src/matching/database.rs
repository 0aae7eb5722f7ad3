use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::features::{
    EntropyFeatures, FeatureVector, FrequencyFeatures, NoiseFeatures, PrnuFeatures,
    TextureFeatures, WaveletFeatures, frequency::RADIAL_BANDS,
};

/// Reference profile for one known (brand, model) pair. Immutable after
/// load; calibration offsets come from whatever external training produced
/// the signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerSignature {
    pub brand: String,
    pub model: String,
    pub reference: FeatureVector,
    pub calibration_offset: f64,
}

/// Read-only signature table keyed by (brand, model), built once at startup
/// and shared across analyses. Callers own the database and inject it into
/// the matcher; there is no process-wide registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignatureDatabase {
    signatures: BTreeMap<(String, String), ScannerSignature>,
}

impl SignatureDatabase {
    pub fn new(signatures: impl IntoIterator<Item = ScannerSignature>) -> Self {
        let signatures = signatures
            .into_iter()
            .map(|s| ((s.brand.clone(), s.model.clone()), s))
            .collect();
        Self { signatures }
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScannerSignature> {
        self.signatures.values()
    }

    pub fn get(&self, brand: &str, model: &str) -> Option<&ScannerSignature> {
        self.signatures.get(&(brand.to_string(), model.to_string()))
    }

    /// Number of models registered for a brand; used as the tie-break
    /// criterion (a brand with fewer models is a more specific claim).
    pub fn model_count(&self, brand: &str) -> usize {
        self.signatures.keys().filter(|(b, _)| b == brand).count()
    }

    pub fn brands(&self) -> Vec<String> {
        let mut brands = self
            .signatures
            .keys()
            .map(|(b, _)| b.clone())
            .collect::<Vec<_>>();
        brands.dedup();
        brands
    }

    /// Demo signature table covering the five common office-scanner brands.
    /// The numbers are representative mid-range values, not trained ground
    /// truth; production deployments should load signatures produced by an
    /// external training run instead.
    pub fn builtin() -> Self {
        let entries: &[(&str, &str, f64, f64, f64, f64)] = &[
            // brand, model, prnu_std, texture_energy, freq_ratio, noise_std
            ("Canon", "CanoScan LiDE", 0.020, 0.10, 3.0, 0.012),
            ("Canon", "CanoScan 9000F", 0.018, 0.11, 2.6, 0.011),
            ("Canon", "imageFORMULA", 0.022, 0.09, 3.4, 0.013),
            ("Epson", "Perfection V", 0.017, 0.10, 3.7, 0.015),
            ("Epson", "WorkForce DS", 0.015, 0.12, 4.2, 0.016),
            ("Epson", "Expression", 0.019, 0.11, 3.2, 0.014),
            ("HP", "ScanJet Pro", 0.024, 0.08, 2.6, 0.019),
            ("HP", "ScanJet Enterprise", 0.026, 0.07, 2.3, 0.020),
            ("HP", "ScanJet G", 0.022, 0.09, 2.9, 0.018),
            ("Brother", "ADS Series", 0.015, 0.12, 4.5, 0.010),
            ("Brother", "MFC Series", 0.013, 0.13, 5.1, 0.009),
            ("Brother", "DSmobile", 0.017, 0.11, 3.9, 0.011),
            ("Fujitsu", "ScanSnap", 0.018, 0.09, 3.3, 0.014),
            ("Fujitsu", "fi Series", 0.016, 0.10, 3.8, 0.013),
            ("Fujitsu", "SP Series", 0.020, 0.08, 2.9, 0.015),
        ];

        Self::new(entries.iter().map(
            |&(brand, model, prnu_std, texture_energy, freq_ratio, noise_std)| ScannerSignature {
                brand: brand.to_string(),
                model: model.to_string(),
                reference: reference_vector(prnu_std, texture_energy, freq_ratio, noise_std),
                calibration_offset: 0.0,
            },
        ))
    }
}

fn reference_vector(
    prnu_std: f64,
    texture_energy: f64,
    freq_ratio: f64,
    noise_std: f64,
) -> FeatureVector {
    FeatureVector {
        prnu: PrnuFeatures {
            mean: 0.0,
            std: prnu_std,
            skewness: 0.1,
            kurtosis: 1.2,
            fft_energy: prnu_std * 300.0,
            pattern_strength: prnu_std * 0.8,
            autocorrelation: 0.2,
            digest: vec![0.0; 32 * 32],
        },
        texture: TextureFeatures {
            contrast: 4.0,
            dissimilarity: 1.2,
            homogeneity: 0.6,
            energy: texture_energy,
            correlation: 0.8,
            contrast_std: 0.5,
        },
        frequency: FrequencyFeatures {
            low_freq_energy: 120.0,
            high_freq_energy: 120.0 / freq_ratio,
            freq_ratio,
            spectral_flatness: 0.3,
            spectral_centroid: 255.0,
            peak_periodicity: 40.0,
            radial_profile: vec![80.0; RADIAL_BANDS],
        },
        wavelet: WaveletFeatures {
            approx_energy: 4.0,
            approx_std: 1.5,
            total_detail_energy: 0.3,
            detail_energies: vec![0.05, 0.04, 0.03, 0.04, 0.03, 0.02, 0.03, 0.02, 0.01],
        },
        noise: NoiseFeatures {
            noise_mean: noise_std * 0.8,
            noise_std,
            noise_power: noise_std * noise_std,
            noise_variance: noise_std * noise_std,
            snr_db: 28.0,
        },
        entropy: EntropyFeatures {
            mean: 128.0,
            std: 60.0,
            variance: 3600.0,
            skewness: 0.0,
            kurtosis: -0.5,
            min: 0.0,
            max: 255.0,
            range: 255.0,
            entropy: 7.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_five_brands_with_three_models_each() {
        let db = SignatureDatabase::builtin();
        assert_eq!(db.len(), 15);
        for brand in ["Canon", "Epson", "HP", "Brother", "Fujitsu"] {
            assert_eq!(db.model_count(brand), 3, "{brand}");
        }
    }

    #[test]
    fn lookup_by_brand_and_model() {
        let db = SignatureDatabase::builtin();
        let sig = db.get("Epson", "Perfection V").unwrap();
        assert_eq!(sig.brand, "Epson");
        assert!(sig.reference.all_finite());
    }

    #[test]
    fn empty_database_reports_empty() {
        assert!(SignatureDatabase::new([]).is_empty());
    }
}
