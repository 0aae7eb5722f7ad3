use ndarray::{Array2, s};

use crate::{features::WaveletFeatures, loader::LoadedImage};

#[derive(Debug, Clone)]
pub struct WaveletConfig {
    pub levels: usize,
}

impl Default for WaveletConfig {
    fn default() -> Self {
        Self { levels: 3 }
    }
}

/// Multi-level 2D Haar decomposition. Each level halves the approximation
/// and emits three detail orientations (horizontal, vertical, diagonal).
///
/// Dimension policy: the input is center-cropped once to the nearest
/// multiple of 2^levels before decomposition, so every level divides evenly.
#[derive(Debug)]
pub struct WaveletAnalyzer {
    config: WaveletConfig,
}

impl WaveletAnalyzer {
    pub fn new() -> Self {
        Self::with_config(WaveletConfig::default())
    }

    pub fn with_config(config: WaveletConfig) -> Self {
        Self { config }
    }

    pub fn levels(&self) -> usize {
        self.config.levels
    }

    pub fn extract(&self, image: &LoadedImage) -> WaveletFeatures {
        let multiple = 1usize << self.config.levels;
        let (height, width) = image.normalized.dim();

        if height < multiple || width < multiple {
            log::warn!(
                "raster {height}x{width} too small for a {}-level decomposition",
                self.config.levels
            );
            return WaveletFeatures::zeroed(self.config.levels);
        }

        let mut approx = center_crop(&image.normalized, multiple);
        let mut detail_energies = Vec::with_capacity(self.config.levels * 3);

        for _ in 0..self.config.levels {
            let (next, horizontal, vertical, diagonal) = haar_step(&approx);
            detail_energies.push(mean_abs(&horizontal));
            detail_energies.push(mean_abs(&vertical));
            detail_energies.push(mean_abs(&diagonal));
            approx = next;
        }

        let approx_values = approx.iter().cloned().collect::<Vec<_>>();
        let approx_energy = approx_values.iter().map(|v| v.abs()).sum::<f64>()
            / approx_values.len() as f64;

        WaveletFeatures {
            approx_energy,
            approx_std: crate::image_utils::std_dev(&approx_values),
            total_detail_energy: detail_energies.iter().sum(),
            detail_energies,
        }
    }
}

impl Default for WaveletAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn center_crop(arr: &Array2<f64>, multiple: usize) -> Array2<f64> {
    let (height, width) = arr.dim();
    let new_h = (height / multiple) * multiple;
    let new_w = (width / multiple) * multiple;
    let y0 = (height - new_h) / 2;
    let x0 = (width - new_w) / 2;

    arr.slice(s![y0..y0 + new_h, x0..x0 + new_w]).to_owned()
}

/// One Haar analysis step: 2x2 blocks map to (LL, LH, HL, HH) coefficients.
fn haar_step(arr: &Array2<f64>) -> (Array2<f64>, Array2<f64>, Array2<f64>, Array2<f64>) {
    let (height, width) = arr.dim();
    let half_h = height / 2;
    let half_w = width / 2;

    let mut approx = Array2::zeros((half_h, half_w));
    let mut horizontal = Array2::zeros((half_h, half_w));
    let mut vertical = Array2::zeros((half_h, half_w));
    let mut diagonal = Array2::zeros((half_h, half_w));

    for y in 0..half_h {
        for x in 0..half_w {
            let a = arr[[2 * y, 2 * x]];
            let b = arr[[2 * y, 2 * x + 1]];
            let c = arr[[2 * y + 1, 2 * x]];
            let d = arr[[2 * y + 1, 2 * x + 1]];

            approx[[y, x]] = (a + b + c + d) / 2.0;
            horizontal[[y, x]] = (a + b - c - d) / 2.0;
            vertical[[y, x]] = (a - b + c - d) / 2.0;
            diagonal[[y, x]] = (a - b - c + d) / 2.0;
        }
    }

    (approx, horizontal, vertical, diagonal)
}

fn mean_abs(arr: &Array2<f64>) -> f64 {
    if arr.is_empty() {
        return 0.0;
    }
    arr.iter().map(|v| v.abs()).sum::<f64>() / arr.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::ImageLoader;
    use image::{DynamicImage, GrayImage, Luma};

    #[test]
    fn produces_one_energy_per_level_and_orientation() {
        let source = GrayImage::from_fn(100, 100, |x, y| Luma([((x * 11 + y * 3) % 256) as u8]));
        let loaded = ImageLoader::from_image(DynamicImage::ImageLuma8(source));

        let analyzer = WaveletAnalyzer::new();
        let features = analyzer.extract(&loaded);
        assert_eq!(features.detail_energies.len(), analyzer.levels() * 3);
        assert!(features.detail_energies.iter().all(|v| v.is_finite()));
        assert!(
            (features.total_detail_energy - features.detail_energies.iter().sum::<f64>()).abs()
                < 1e-12
        );
    }

    #[test]
    fn uniform_image_has_zero_detail_energy() {
        let source = GrayImage::from_pixel(64, 64, Luma([100]));
        let loaded = ImageLoader::from_image(DynamicImage::ImageLuma8(source));

        let features = WaveletAnalyzer::new().extract(&loaded);
        assert!(features.detail_energies.iter().all(|&v| v.abs() < 1e-9));
        assert!(features.approx_energy > 0.0);
    }

    #[test]
    fn center_crop_snaps_to_multiple() {
        let arr = Array2::from_elem((37, 41), 1.0);
        let cropped = center_crop(&arr, 8);
        assert_eq!(cropped.dim(), (32, 40));
    }
}
