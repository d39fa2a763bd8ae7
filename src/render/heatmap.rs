use crate::render::colormap::Colormap;
use image::{Rgb, RgbImage};
use ndarray::Array2;

/// Share of the largest attributions clipped to full intensity.
pub const DEFAULT_OUTLIER_PERC: f32 = 2.0;

/// Smallest value whose cumulative sum (ascending) reaches `percentile` percent of the total.
pub fn cumulative_sum_threshold(values: &Array2<f32>, percentile: f32) -> f32 {
    let mut sorted: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(f32::total_cmp);

    let total: f64 = sorted.iter().map(|&v| v as f64).sum();
    let target = total * 0.01 * percentile as f64;
    let mut running = 0.0f64;
    for &value in &sorted {
        running += value as f64;
        if running >= target {
            return value;
        }
    }
    sorted[sorted.len() - 1]
}

/// Absolute attributions scaled into `[0, 1]` with the top `outlier_perc` percent clipped.
pub fn normalize_attribution(collapsed: &Array2<f32>, outlier_perc: f32) -> Array2<f32> {
    let magnitude = collapsed.mapv(f32::abs);
    let threshold = cumulative_sum_threshold(&magnitude, 100.0 - outlier_perc);

    if threshold.abs() < 1e-5 {
        tracing::warn!(
            "Attribution scale {:.3e} is approximately zero, heatmap left blank",
            threshold
        );
        if threshold == 0.0 {
            return Array2::zeros(magnitude.raw_dim());
        }
    }

    magnitude.mapv(|v| {
        let scaled = v / threshold;
        if scaled.is_finite() {
            scaled.clamp(0.0, 1.0)
        } else {
            0.0
        }
    })
}

/// Colour the normalized map pixel by pixel.
pub fn heatmap_image(normalized: &Array2<f32>, colormap: &Colormap) -> RgbImage {
    let (height, width) = normalized.dim();
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        Rgb(colormap.map(normalized[[y as usize, x as usize]]))
    })
}
