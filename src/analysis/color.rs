use image::RgbImage;
use image::imageops::{FilterType, resize};
use statrs::statistics::Statistics;

use super::{EPSILON, clamp_score};
use crate::image_utils::channel_planes;

/// Colour test: copies lose the deliberate per-block chromatic perturbation.
/// Three signals are blended: surviving inter-channel separation, surviving
/// per-channel variance, and raw pixel agreement with the reference.
pub struct ColorTest {
    pub diff_weight: f64,
    pub variance_weight: f64,
    pub pixel_weight: f64,
    /// Mean pixel deviation below this is considered exact.
    pub pixel_floor: f64,
    /// Deviation span over which the pixel score falls to zero.
    pub pixel_span: f64,
}

impl Default for ColorTest {
    fn default() -> Self {
        Self {
            diff_weight: 0.3,
            variance_weight: 0.3,
            pixel_weight: 0.4,
            pixel_floor: 5.0,
            pixel_span: 50.0,
        }
    }
}

impl ColorTest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(&self, capture: &RgbImage, reference: &RgbImage) -> f64 {
        let capture = if capture.dimensions() != reference.dimensions() {
            resize(
                capture,
                reference.width(),
                reference.height(),
                FilterType::Triangle,
            )
        } else {
            capture.clone()
        };

        let cap_planes = channel_planes(&capture);
        let ref_planes = channel_planes(reference);

        let cap_diffs = inter_channel_diffs(&cap_planes);
        let ref_diffs = inter_channel_diffs(&ref_planes);

        let mut ratios = Vec::with_capacity(3);
        for (cap, reference) in cap_diffs.iter().zip(ref_diffs.iter()) {
            if *reference > EPSILON {
                ratios.push((cap / reference).min(1.0));
            }
        }
        let diff_ratio = if ratios.is_empty() {
            1.0
        } else {
            ratios.iter().sum::<f64>() / ratios.len() as f64
        };

        let cap_variance: f64 = cap_planes
            .iter()
            .map(|p| p.as_slice().population_variance())
            .sum();
        let ref_variance: f64 = ref_planes
            .iter()
            .map(|p| p.as_slice().population_variance())
            .sum();
        let variance_ratio = (cap_variance / (ref_variance + EPSILON)).min(1.0);

        let pixel_deviation = mean_abs_deviation(&cap_planes, &ref_planes);
        let pixel_score =
            clamp_score(1.0 - (pixel_deviation - self.pixel_floor) / self.pixel_span);

        clamp_score(
            self.diff_weight * diff_ratio
                + self.variance_weight * variance_ratio
                + self.pixel_weight * pixel_score,
        )
    }
}

/// Mean absolute differences `|R-G|`, `|R-B|`, `|G-B|`.
fn inter_channel_diffs(planes: &[Vec<f64>; 3]) -> [f64; 3] {
    let n = planes[0].len().max(1) as f64;
    let mut diffs = [0.0; 3];

    for ((r, g), b) in planes[0].iter().zip(&planes[1]).zip(&planes[2]) {
        diffs[0] += (r - g).abs();
        diffs[1] += (r - b).abs();
        diffs[2] += (g - b).abs();
    }

    diffs.map(|d| d / n)
}

fn mean_abs_deviation(cap: &[Vec<f64>; 3], reference: &[Vec<f64>; 3]) -> f64 {
    let n = (cap[0].len() * 3).max(1) as f64;
    let mut sum = 0.0;

    for channel in 0..3 {
        for (a, b) in cap[channel].iter().zip(&reference[channel]) {
            sum += (a - b).abs();
        }
    }

    sum / n
}
