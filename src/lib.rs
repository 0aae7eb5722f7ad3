use std::sync::Arc;

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

pub mod compare;
pub mod error;
pub mod features;
pub mod image_utils;
pub mod loader;
pub mod matching;
pub mod tampering;

pub use compare::{ComparisonEngine, ComparisonResult, MatchVerdict};
pub use error::{Result, ScanError};
pub use features::{FeatureAggregator, FeatureVector};
pub use loader::{ImageLoader, LoadedImage};
pub use matching::{
    AnalysisResult, ConfidenceLevel, SignatureMatcher,
    database::{ScannerSignature, SignatureDatabase},
    trained::TrainedModel,
};
pub use tampering::{RiskLevel, TamperingAnalyzer, TamperingVerdict};

/// Scanner identification engine: extracts device signatures from a scan
/// and matches them against a caller-supplied signature database.
///
/// The database is injected at construction and shared read-only across
/// analyses; a single `ScannerAnalyzer` is safe to use from many threads.
#[derive(Debug)]
pub struct ScannerAnalyzer {
    aggregator: FeatureAggregator,
    matcher: SignatureMatcher,
    comparison: ComparisonEngine,
    tampering: TamperingAnalyzer,
}

impl ScannerAnalyzer {
    /// Heuristic matching against reference signatures.
    pub fn new(database: Arc<SignatureDatabase>) -> Result<Self> {
        Ok(Self {
            aggregator: FeatureAggregator::new(),
            matcher: SignatureMatcher::heuristic(database)?,
            comparison: ComparisonEngine::new(),
            tampering: TamperingAnalyzer::new(),
        })
    }

    /// Classification via an externally trained model; indicator text is
    /// still derived heuristically from the raw feature vector.
    pub fn with_trained_model(model: TrainedModel) -> Self {
        Self {
            aggregator: FeatureAggregator::new(),
            matcher: SignatureMatcher::trained(model),
            comparison: ComparisonEngine::new(),
            tampering: TamperingAnalyzer::new(),
        }
    }

    pub fn analyze(&self, image: &LoadedImage) -> AnalysisResult {
        let features = self.aggregator.extract(image);
        let summary = self.aggregator.summarize(&features);
        self.matcher.identify(&features, summary)
    }

    pub fn analyze_bytes(&self, bytes: &[u8], extension: &str) -> Result<AnalysisResult> {
        let image = ImageLoader::from_bytes(bytes, extension)?;
        Ok(self.analyze(&image))
    }

    pub fn extract_features(&self, image: &LoadedImage) -> FeatureVector {
        self.aggregator.extract(image)
    }

    pub fn compare(&self, a: &FeatureVector, b: &FeatureVector) -> ComparisonResult {
        self.comparison.compare(a, b)
    }

    pub fn compare_images(&self, a: &LoadedImage, b: &LoadedImage) -> ComparisonResult {
        self.comparison
            .compare(&self.aggregator.extract(a), &self.aggregator.extract(b))
    }

    pub fn detect_tampering(&self, image: &LoadedImage) -> Result<TamperingVerdict> {
        self.tampering.detect(image)
    }

    /// Batch analysis across available cores. Items are independent; a
    /// decode failure in one item never aborts its siblings.
    pub fn analyze_batch(&self, items: &[(Vec<u8>, String)]) -> Vec<Result<AnalysisResult>> {
        items
            .par_iter()
            .map(|(bytes, extension)| self.analyze_bytes(bytes, extension))
            .collect()
    }
}
