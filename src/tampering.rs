use std::io::Cursor;

use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::{
    error::Result,
    image_utils::gaussian_blur,
    loader::LoadedImage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    fn score(&self) -> f64 {
        match self {
            Severity::Low => 0.0,
            Severity::Medium => 0.5,
            Severity::High => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechniqueVerdict {
    pub severity: Severity,
    pub score: f64,
    pub analysis: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechniqueResults {
    pub error_level: TechniqueVerdict,
    pub noise_consistency: TechniqueVerdict,
    pub recompression_ghost: TechniqueVerdict,
    pub metadata: TechniqueVerdict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TamperingVerdict {
    pub tampering_detected: bool,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub indicators: Vec<String>,
    pub techniques: TechniqueResults,
}

#[derive(Debug, Clone)]
pub struct TamperingConfig {
    pub ela_quality: u8,
    pub ela_block_size: usize,
    pub noise_block_size: usize,
    pub ghost_qualities: Vec<u8>,
}

impl Default for TamperingConfig {
    fn default() -> Self {
        Self {
            ela_quality: 90,
            ela_block_size: 16,
            noise_block_size: 64,
            ghost_qualities: vec![95, 90, 85, 80, 75],
        }
    }
}

const EDITOR_SIGNATURES: &[&str] = &[
    "photoshop",
    "gimp",
    "lightroom",
    "paint",
    "pixlr",
    "affinity",
];

/// Four independent manipulation checks with a deliberately conservative
/// aggregate: any single High severity forces overall risk High, because a
/// missed manipulation costs more than a false alarm in forensic review.
#[derive(Debug)]
pub struct TamperingAnalyzer {
    config: TamperingConfig,
}

impl TamperingAnalyzer {
    pub fn new() -> Self {
        Self::with_config(TamperingConfig::default())
    }

    pub fn with_config(config: TamperingConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, image: &LoadedImage) -> Result<TamperingVerdict> {
        let error_level = self.error_level_analysis(&image.rgb)?;
        let noise_consistency = self.noise_consistency(image);
        let recompression_ghost = self.recompression_ghosts(&image.rgb)?;
        let metadata = self.metadata_check(&image.raw);

        let techniques = TechniqueResults {
            error_level,
            noise_consistency,
            recompression_ghost,
            metadata,
        };

        Ok(aggregate(techniques))
    }

    /// Re-encode at a fixed quality and look for spatially uneven error:
    /// a pasted region re-compresses differently from its surroundings.
    fn error_level_analysis(&self, rgb: &RgbImage) -> Result<TechniqueVerdict> {
        let recompressed = recompress_jpeg(rgb, self.config.ela_quality)?;

        let (width, height) = rgb.dimensions();
        let block = self.config.ela_block_size as u32;
        let mut block_means = Vec::new();
        let mut max_error = 0.0f64;

        for by in (0..height).step_by(block as usize) {
            for bx in (0..width).step_by(block as usize) {
                let mut sum = 0.0;
                let mut count = 0u32;
                for y in by..(by + block).min(height) {
                    for x in bx..(bx + block).min(width) {
                        let p1 = rgb.get_pixel(x, y);
                        let p2 = recompressed.get_pixel(x, y);
                        let diff = (0..3)
                            .map(|c| (p1[c] as f64 - p2[c] as f64).abs())
                            .sum::<f64>()
                            / 3.0;
                        sum += diff;
                        count += 1;
                        max_error = max_error.max(diff);
                    }
                }
                block_means.push(sum / count as f64);
            }
        }

        let mean_error = block_means.iter().mean();
        let std_error = block_means.iter().population_std_dev();

        let (severity, analysis) = if std_error > 25.0 {
            (
                Severity::High,
                "Strongly inconsistent error levels across regions".to_string(),
            )
        } else if std_error > 15.0 || (max_error > 100.0 && mean_error < 10.0) {
            (
                Severity::Medium,
                "Inconsistent error levels suggest potential editing".to_string(),
            )
        } else {
            (Severity::Low, "Normal error level distribution".to_string())
        };

        Ok(TechniqueVerdict {
            severity,
            score: (std_error / 50.0).min(1.0),
            analysis,
        })
    }

    /// Per-block residual variance against the image-wide median: spliced
    /// content carries its own noise floor.
    fn noise_consistency(&self, image: &LoadedImage) -> TechniqueVerdict {
        let residual = &image.resized - &gaussian_blur(&image.resized, 1.5);
        let (height, width) = residual.dim();
        let block = self.config.noise_block_size;

        let mut block_stds = Vec::new();
        for by in (0..height).step_by(block) {
            for bx in (0..width).step_by(block) {
                let mut values = Vec::with_capacity(block * block);
                for y in by..(by + block).min(height) {
                    for x in bx..(bx + block).min(width) {
                        values.push(residual[[y, x]]);
                    }
                }
                block_stds.push(crate::image_utils::std_dev(&values));
            }
        }

        if block_stds.is_empty() {
            return TechniqueVerdict {
                severity: Severity::Low,
                score: 0.0,
                analysis: "Image too small for block noise analysis".to_string(),
            };
        }

        let mut sorted = block_stds.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median = sorted[sorted.len() / 2];

        let mut deviations = sorted.iter().map(|v| (v - median).abs()).collect::<Vec<_>>();
        deviations.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mad = deviations[deviations.len() / 2] * 1.4826;

        let threshold = (3.0 * mad).max(1e-6);
        let outliers = block_stds
            .iter()
            .filter(|&&v| (v - median).abs() > threshold)
            .count();
        let outlier_fraction = outliers as f64 / block_stds.len() as f64;

        let mean_std = block_stds.iter().mean();
        let variation = if mean_std > 1e-9 {
            block_stds.iter().population_std_dev() / mean_std
        } else {
            0.0
        };

        let (severity, analysis) = if outlier_fraction > 0.25 {
            (
                Severity::High,
                "Large regions deviate from the global noise floor".to_string(),
            )
        } else if variation > 0.4 {
            (
                Severity::Medium,
                "Inconsistent noise patterns across the image".to_string(),
            )
        } else {
            (Severity::Low, "Consistent noise distribution".to_string())
        };

        TechniqueVerdict {
            severity,
            score: outlier_fraction.max(variation.min(1.0)),
            analysis,
        }
    }

    /// Re-encode at several qualities; a plateau in the difference curve
    /// marks a quality the image already passed through.
    fn recompression_ghosts(&self, rgb: &RgbImage) -> Result<TechniqueVerdict> {
        let mut ghost_scores = Vec::with_capacity(self.config.ghost_qualities.len());

        for &quality in &self.config.ghost_qualities {
            let recompressed = recompress_jpeg(rgb, quality)?;
            let mut total = 0.0;
            for (p1, p2) in rgb.pixels().zip(recompressed.pixels()) {
                for c in 0..3 {
                    total += (p1[c] as f64 - p2[c] as f64).abs();
                }
            }
            ghost_scores.push(total / (rgb.width() * rgb.height() * 3) as f64);
        }

        let steps = ghost_scores
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .collect::<Vec<_>>();
        let min_step = steps.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_step = steps.iter().cloned().fold(0.0f64, f64::max);

        let (severity, analysis) = if min_step < 0.1 && max_step > 3.0 {
            (
                Severity::High,
                "Pronounced JPEG ghost; image was previously compressed".to_string(),
            )
        } else if min_step < 0.5 && max_step > 2.0 {
            (
                Severity::Medium,
                "JPEG ghost detected; image likely re-compressed".to_string(),
            )
        } else {
            (Severity::Low, "No significant JPEG ghosts".to_string())
        };

        Ok(TechniqueVerdict {
            severity,
            score: if max_step > 0.0 { (1.0 - min_step / max_step).clamp(0.0, 1.0) } else { 0.0 },
            analysis,
        })
    }

    /// Editor-software signatures in EXIF are the strongest single flag a
    /// scan can carry; genuine scanner output never passes through them.
    fn metadata_check(&self, raw: &[u8]) -> TechniqueVerdict {
        if raw.is_empty() {
            return TechniqueVerdict {
                severity: Severity::Low,
                score: 0.0,
                analysis: "No container metadata available".to_string(),
            };
        }

        let mut cursor = Cursor::new(raw);
        let exif_data = match exif::Reader::new().read_from_container(&mut cursor) {
            Ok(data) => data,
            Err(e) => {
                log::debug!("no EXIF metadata parsed: {e}");
                return TechniqueVerdict {
                    severity: Severity::Low,
                    score: 0.0,
                    analysis: "No EXIF metadata found".to_string(),
                };
            }
        };

        let software = exif_data
            .get_field(exif::Tag::Software, exif::In::PRIMARY)
            .map(|f| f.display_value().to_string().to_lowercase());

        if let Some(software) = software {
            for signature in EDITOR_SIGNATURES {
                if software.contains(signature) {
                    return TechniqueVerdict {
                        severity: Severity::High,
                        score: 1.0,
                        analysis: format!("Edited with: {software}"),
                    };
                }
            }
        }

        let original = exif_data
            .get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY)
            .map(|f| f.display_value().to_string());
        let digitized = exif_data
            .get_field(exif::Tag::DateTimeDigitized, exif::In::PRIMARY)
            .map(|f| f.display_value().to_string());

        if let (Some(original), Some(digitized)) = (&original, &digitized) {
            if original != digitized {
                return TechniqueVerdict {
                    severity: Severity::Medium,
                    score: 0.5,
                    analysis: "Inconsistent original/digitized timestamps".to_string(),
                };
            }
        }

        TechniqueVerdict {
            severity: Severity::Low,
            score: 0.0,
            analysis: "No metadata anomalies".to_string(),
        }
    }
}

impl Default for TamperingAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Any High severity forces overall High risk; otherwise two or more
/// Medium flags escalate to Medium.
pub fn aggregate_risk(severities: &[Severity]) -> RiskLevel {
    if severities.contains(&Severity::High) {
        return RiskLevel::High;
    }
    let medium = severities.iter().filter(|&&s| s == Severity::Medium).count();
    if medium >= 2 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

fn aggregate(techniques: TechniqueResults) -> TamperingVerdict {
    let entries = [
        (&techniques.error_level, "Inconsistent compression levels detected"),
        (&techniques.noise_consistency, "Noise pattern inconsistencies found"),
        (&techniques.recompression_ghost, "JPEG ghost artifacts present"),
        (&techniques.metadata, "Metadata anomalies detected"),
    ];

    let severities = entries.iter().map(|(t, _)| t.severity).collect::<Vec<_>>();
    let risk_level = aggregate_risk(&severities);

    let indicators = entries
        .iter()
        .filter(|(t, _)| t.severity >= Severity::Medium)
        .map(|(_, message)| message.to_string())
        .collect::<Vec<_>>();

    let confidence =
        severities.iter().map(Severity::score).sum::<f64>() / severities.len() as f64;

    TamperingVerdict {
        tampering_detected: risk_level >= RiskLevel::Medium,
        risk_level,
        confidence,
        indicators,
        techniques,
    }
}

fn recompress_jpeg(rgb: &RgbImage, quality: u8) -> Result<RgbImage> {
    let mut buffer = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    DynamicImage::ImageRgb8(rgb.clone()).write_with_encoder(encoder)?;

    buffer.set_position(0);
    let recompressed = image::load_from_memory(&buffer.into_inner())?;
    Ok(recompressed.to_rgb8())
}
