use image::GrayImage;
use image::imageops::{FilterType, resize};

use super::{EPSILON, clamp_score};
use crate::image_utils::sobel_energy;

/// Gradient test: prints of prints soften edges, so the mean Sobel magnitude
/// of a genuine capture should stay close to the reference's.
pub struct GradientTest {
    /// Energy ratio at or below which the score is zero.
    pub floor: f64,
    /// Ratio span over which the score rises to one.
    pub span: f64,
}

impl Default for GradientTest {
    fn default() -> Self {
        Self {
            floor: 0.15,
            span: 0.45,
        }
    }
}

impl GradientTest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(&self, capture: &GrayImage, reference: &GrayImage) -> f64 {
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

        let cap_energy = sobel_energy(&capture);
        let ref_energy = sobel_energy(reference);
        let ratio = cap_energy / (ref_energy + EPSILON);

        clamp_score((ratio - self.floor) / self.span)
    }
}
