use ndarray::Array2;

use crate::{
    features::FrequencyFeatures,
    image_utils::{fft2_magnitude, fft_shift},
    loader::LoadedImage,
};

/// Number of concentric radial bands in the energy profile.
pub const RADIAL_BANDS: usize = 8;

/// Magnitude-spectrum statistics over the resampled grayscale raster.
/// Scanning mechanisms leave periodic traces (CCD banding, stepper motor
/// ripple) that show up as isolated spectral peaks.
#[derive(Debug)]
pub struct FrequencyAnalyzer;

impl FrequencyAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, image: &LoadedImage) -> FrequencyFeatures {
        let magnitude = fft_shift(&fft2_magnitude(&image.normalized));
        let (height, width) = magnitude.dim();
        let center = (height / 2, width / 2);

        // The DC term only encodes mean brightness, not device structure.
        let mut magnitude = magnitude;
        magnitude[[center.0, center.1]] = 0.0;

        let (low_energy, high_energy) = self.band_energies(&magnitude, center);
        let radial_profile = self.radial_profile(&magnitude, center);

        let total: f64 = magnitude.iter().sum();
        let count = magnitude.len() as f64;
        let mean = total / count;

        let max = magnitude.iter().cloned().fold(0.0f64, f64::max);
        let peak_periodicity = if mean < 1e-12 { 0.0 } else { max / mean };

        let geometric_mean = (magnitude.iter().map(|v| (v + 1e-10).ln()).sum::<f64>() / count).exp();
        let spectral_flatness = if mean < 1e-12 { 0.0 } else { geometric_mean / (mean + 1e-10) };

        let mut weighted_rows = 0.0;
        for y in 0..height {
            let row_sum: f64 = (0..width).map(|x| magnitude[[y, x]]).sum();
            weighted_rows += y as f64 * row_sum;
        }
        let spectral_centroid = if total < 1e-12 { 0.0 } else { weighted_rows / total };

        FrequencyFeatures {
            low_freq_energy: low_energy,
            high_freq_energy: high_energy,
            freq_ratio: low_energy / (high_energy + 1e-10),
            spectral_flatness,
            spectral_centroid,
            peak_periodicity,
            radial_profile,
        }
    }

    /// Low band: central h/8 x w/8 window around DC. High band: everything
    /// outside it. Both reported as mean magnitude.
    fn band_energies(&self, magnitude: &Array2<f64>, center: (usize, usize)) -> (f64, f64) {
        let (height, width) = magnitude.dim();
        let half_h = (height / 8).max(1);
        let half_w = (width / 8).max(1);

        let mut low_sum = 0.0;
        let mut low_count = 0usize;
        let mut high_sum = 0.0;
        let mut high_count = 0usize;

        for y in 0..height {
            for x in 0..width {
                let in_low = y.abs_diff(center.0) < half_h && x.abs_diff(center.1) < half_w;
                if in_low {
                    low_sum += magnitude[[y, x]];
                    low_count += 1;
                } else {
                    high_sum += magnitude[[y, x]];
                    high_count += 1;
                }
            }
        }

        (
            if low_count > 0 { low_sum / low_count as f64 } else { 0.0 },
            if high_count > 0 { high_sum / high_count as f64 } else { 0.0 },
        )
    }

    fn radial_profile(&self, magnitude: &Array2<f64>, center: (usize, usize)) -> Vec<f64> {
        let (height, width) = magnitude.dim();
        let max_radius = ((center.0.min(center.1)) as f64).max(1.0);

        let mut sums = vec![0.0; RADIAL_BANDS];
        let mut counts = vec![0usize; RADIAL_BANDS];

        for y in 0..height {
            for x in 0..width {
                let dy = y as f64 - center.0 as f64;
                let dx = x as f64 - center.1 as f64;
                let radius = (dy * dy + dx * dx).sqrt();
                if radius > max_radius {
                    continue;
                }
                let band = ((radius / max_radius) * RADIAL_BANDS as f64) as usize;
                let band = band.min(RADIAL_BANDS - 1);
                sums[band] += magnitude[[y, x]];
                counts[band] += 1;
            }
        }

        sums.iter()
            .zip(counts.iter())
            .map(|(&s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
            .collect()
    }
}

impl Default for FrequencyAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
