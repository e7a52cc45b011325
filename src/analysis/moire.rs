use image::GrayImage;
use image::imageops::{FilterType, resize};
use ndarray::Array2;
use num_complex::Complex;
use rayon::prelude::*;
use rustfft::FftPlanner;

use super::{EPSILON, clamp_score};
use crate::image_utils::gray_to_array;

/// Moire test: compares the centred log-magnitude Fourier spectra of capture
/// and reference. Re-digitised prints alias the grating and shift spectral
/// energy, which shows up as a large mean deviation between the normalised
/// spectra.
pub struct MoireTest {
    /// Half-extent of the DC block zeroed at the spectrum centre.
    pub dc_mask: usize,
    /// Mean spectral deviation mapping to a zero score.
    pub full_deviation: f64,
}

impl Default for MoireTest {
    fn default() -> Self {
        Self {
            dc_mask: 6,
            full_deviation: 0.20,
        }
    }
}

impl MoireTest {
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

        let cap_spectrum = self.normalized_log_spectrum(&capture);
        let ref_spectrum = self.normalized_log_spectrum(reference);

        let n = cap_spectrum.len().max(1) as f64;
        let deviation = cap_spectrum
            .iter()
            .zip(ref_spectrum.iter())
            .map(|(a, b)| (a - b).abs())
            .sum::<f64>()
            / n;

        clamp_score(1.0 - deviation / self.full_deviation)
    }

    /// Centred log-magnitude spectrum with the DC block zeroed, normalised
    /// by its own maximum.
    fn normalized_log_spectrum(&self, gray: &GrayImage) -> Array2<f64> {
        let pixels = gray_to_array(gray);
        let (height, width) = pixels.dim();

        let spectrum = fft_2d(&pixels);

        let mut magnitude = Array2::zeros((height, width));
        for y in 0..height {
            for x in 0..width {
                // fftshift: move DC to the centre
                let sy = (y + height / 2) % height;
                let sx = (x + width / 2) % width;
                magnitude[[sy, sx]] = (1.0 + spectrum[[y, x]].norm()).ln();
            }
        }

        let cy = height / 2;
        let cx = width / 2;
        for y in cy.saturating_sub(self.dc_mask / 2)..(cy + self.dc_mask / 2).min(height) {
            for x in cx.saturating_sub(self.dc_mask / 2)..(cx + self.dc_mask / 2).min(width) {
                magnitude[[y, x]] = 0.0;
            }
        }

        let max = magnitude.iter().cloned().fold(0.0f64, f64::max);
        magnitude.mapv(|v| v / (max + EPSILON))
    }
}

/// Row-column 2-D FFT. Rows are transformed in parallel, then columns via a
/// transposed buffer.
fn fft_2d(pixels: &Array2<f64>) -> Array2<Complex<f64>> {
    let (height, width) = pixels.dim();

    let mut planner = FftPlanner::new();
    let row_fft = planner.plan_fft_forward(width);
    let col_fft = planner.plan_fft_forward(height);

    let mut rows: Vec<Complex<f64>> = pixels.iter().map(|&v| Complex::new(v, 0.0)).collect();
    rows.par_chunks_mut(width).for_each(|row| {
        row_fft.process(row);
    });

    let mut cols = vec![Complex::new(0.0, 0.0); width * height];
    for y in 0..height {
        for x in 0..width {
            cols[x * height + y] = rows[y * width + x];
        }
    }
    cols.par_chunks_mut(height).for_each(|col| {
        col_fft.process(col);
    });

    let mut out = Array2::from_elem((height, width), Complex::new(0.0, 0.0));
    for y in 0..height {
        for x in 0..width {
            out[[y, x]] = cols[x * height + y];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::PatternSynthesizer;
    use crate::image_utils::rgb_to_gray;
    use image::Luma;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_identical_images_score_one() {
        let master = PatternSynthesizer::new().synthesize(Some(42)).unwrap();
        let gray = rgb_to_gray(&master.image);
        let score = MoireTest::new().score(&gray, &gray);
        assert!(score > 0.999, "score = {score}");
    }

    #[test]
    fn test_noise_scores_below_pattern() {
        let master = PatternSynthesizer::new().synthesize(Some(42)).unwrap();
        let gray = rgb_to_gray(&master.image);

        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let noise = GrayImage::from_fn(512, 512, |_, _| Luma([rng.random::<u8>()]));

        let noise_score = MoireTest::new().score(&noise, &gray);
        assert!(noise_score < 0.9, "noise score = {noise_score}");
    }

    #[test]
    fn test_score_is_clamped() {
        let a = GrayImage::from_pixel(64, 64, Luma([0]));
        let b = GrayImage::from_pixel(64, 64, Luma([255]));
        let score = MoireTest::new().score(&a, &b);
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_spectrum_is_size_tolerant() {
        let master = PatternSynthesizer::new().synthesize(Some(5)).unwrap();
        let gray = rgb_to_gray(&master.image);
        let small = resize(&gray, 400, 400, FilterType::Triangle);

        let score = MoireTest::new().score(&small, &gray);
        assert!((0.0..=1.0).contains(&score));
    }
}
