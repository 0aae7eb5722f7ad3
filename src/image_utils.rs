use image::GrayImage;
use ndarray::Array2;
use ndarray_stats::QuantileExt;
use num_complex::Complex;
use rustfft::FftPlanner;

pub fn gray_to_array(image: &GrayImage) -> Array2<f64> {
    let (width, height) = image.dimensions();
    let mut arr = Array2::zeros((height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        arr[[y as usize, x as usize]] = pixel[0] as f64;
    }

    arr
}

pub fn dynamic_range(arr: &Array2<f64>) -> f64 {
    let min = arr.min().map(|v| *v).unwrap_or(0.0);
    let max = arr.max().map(|v| *v).unwrap_or(0.0);
    max - min
}

/// Separable Gaussian blur with clamped (replicated) borders.
pub fn gaussian_blur(arr: &Array2<f64>, sigma: f64) -> Array2<f64> {
    let radius = (3.0 * sigma).ceil().max(1.0) as i64;
    let mut kernel = Vec::with_capacity((2 * radius + 1) as usize);
    let mut sum = 0.0;

    for i in -radius..=radius {
        let w = (-(i as f64).powi(2) / (2.0 * sigma * sigma)).exp();
        kernel.push(w);
        sum += w;
    }
    for w in kernel.iter_mut() {
        *w /= sum;
    }

    let (height, width) = arr.dim();
    let mut horizontal = Array2::zeros((height, width));
    let mut result = Array2::zeros((height, width));

    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let sx = (x as i64 + k as i64 - radius).clamp(0, width as i64 - 1) as usize;
                acc += arr[[y, sx]] * w;
            }
            horizontal[[y, x]] = acc;
        }
    }

    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let sy = (y as i64 + k as i64 - radius).clamp(0, height as i64 - 1) as usize;
                acc += horizontal[[sy, x]] * w;
            }
            result[[y, x]] = acc;
        }
    }

    result
}

/// 2D FFT magnitude via row FFTs followed by column FFTs.
pub fn fft2_magnitude(arr: &Array2<f64>) -> Array2<f64> {
    let (height, width) = arr.dim();
    let mut planner = FftPlanner::new();
    let row_fft = planner.plan_fft_forward(width);
    let col_fft = planner.plan_fft_forward(height);

    let mut data = arr
        .iter()
        .map(|&v| Complex::new(v, 0.0))
        .collect::<Vec<_>>();

    for row in data.chunks_exact_mut(width) {
        row_fft.process(row);
    }

    let mut column = vec![Complex::new(0.0, 0.0); height];
    for x in 0..width {
        for y in 0..height {
            column[y] = data[y * width + x];
        }
        col_fft.process(&mut column);
        for y in 0..height {
            data[y * width + x] = column[y];
        }
    }

    Array2::from_shape_fn((height, width), |(y, x)| data[y * width + x].norm())
}

/// Shift the zero-frequency term to the center of the spectrum.
pub fn fft_shift(arr: &Array2<f64>) -> Array2<f64> {
    let (height, width) = arr.dim();
    let half_h = height / 2;
    let half_w = width / 2;

    Array2::from_shape_fn((height, width), |(y, x)| {
        arr[[(y + half_h) % height, (x + half_w) % width]]
    })
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

pub fn skewness(arr: &Array2<f64>) -> f64 {
    let values = arr.as_slice().map(|s| s.to_vec()).unwrap_or_else(|| arr.iter().cloned().collect());
    let m = mean(&values);
    let s = std_dev(&values);
    if s < 1e-12 {
        return 0.0;
    }
    values.iter().map(|v| ((v - m) / s).powi(3)).sum::<f64>() / values.len() as f64
}

pub fn kurtosis(arr: &Array2<f64>) -> f64 {
    let values = arr.as_slice().map(|s| s.to_vec()).unwrap_or_else(|| arr.iter().cloned().collect());
    let m = mean(&values);
    let s = std_dev(&values);
    if s < 1e-12 {
        return 0.0;
    }
    values.iter().map(|v| ((v - m) / s).powi(4)).sum::<f64>() / values.len() as f64 - 3.0
}

/// Pearson correlation; `None` when either side has no variance.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mean_a = mean(a);
    let mean_b = mean(b);

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a < 1e-12 || var_b < 1e-12 {
        return None;
    }

    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}

/// Shannon entropy over a 256-bin histogram of values in [0, 255].
pub fn shannon_entropy(arr: &Array2<f64>) -> f64 {
    let mut histogram = [0u64; 256];
    for &v in arr.iter() {
        let bin = v.clamp(0.0, 255.0) as usize;
        histogram[bin] += 1;
    }

    let total = arr.len() as f64;
    if total == 0.0 {
        return 0.0;
    }

    histogram
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn uniform_array_has_zero_entropy_and_moments() {
        let arr = Array2::from_elem((16, 16), 128.0);
        assert_eq!(shannon_entropy(&arr), 0.0);
        assert_eq!(skewness(&arr), 0.0);
        assert_eq!(kurtosis(&arr), 0.0);
    }

    #[test]
    fn pearson_of_identical_series_is_one() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let r = pearson(&a, &a).unwrap();
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_rejects_constant_series() {
        let a = vec![1.0, 1.0, 1.0];
        let b = vec![1.0, 2.0, 3.0];
        assert!(pearson(&a, &b).is_none());
    }

    #[test]
    fn gaussian_blur_preserves_constant_images() {
        let arr = Array2::from_elem((8, 8), 42.0);
        let blurred = gaussian_blur(&arr, 2.0);
        for &v in blurred.iter() {
            assert!((v - 42.0).abs() < 1e-9);
        }
    }

    #[test]
    fn fft_shift_centers_dc_term() {
        let arr = array![[4.0, 0.0], [0.0, 0.0]];
        let shifted = fft_shift(&arr);
        assert_eq!(shifted[[1, 1]], 4.0);
    }
}
