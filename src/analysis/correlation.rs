use image::GrayImage;
use image::imageops::{FilterType, resize};
use statrs::statistics::Statistics;

use super::{EPSILON, clamp_score};
use crate::image_utils::tile_means;

#[derive(Debug, Clone, Copy)]
pub struct CorrelationScore {
    pub score: f64,
    /// Best raw Pearson correlation across block sizes.
    pub best: f64,
}

/// Correlation test: tiles both images at several block sizes and takes the
/// best Pearson correlation between the tile-mean vectors. Block means
/// survive imperfect registration far better than raw pixels do.
pub struct CorrelationTest {
    pub block_sizes: [u32; 4],
    /// Correlation at which the score saturates.
    pub saturation: f64,
    /// Minimum tiles per side for a block size to count.
    pub min_tiles: u32,
}

impl Default for CorrelationTest {
    fn default() -> Self {
        Self {
            block_sizes: [8, 16, 32, 64],
            saturation: 0.4,
            min_tiles: 4,
        }
    }
}

impl CorrelationTest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(&self, capture: &GrayImage, reference: &GrayImage) -> CorrelationScore {
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

        let (width, height) = reference.dimensions();
        let mut best = 0.0f64;
        let mut measured = false;

        for &block_size in &self.block_sizes {
            if width / block_size < self.min_tiles || height / block_size < self.min_tiles {
                continue;
            }

            let cap_means = tile_means(&capture, block_size);
            let ref_means = tile_means(reference, block_size);
            let correlation = pearson(&cap_means, &ref_means);

            if !measured || correlation > best {
                best = correlation;
                measured = true;
            }
        }

        CorrelationScore {
            score: clamp_score(best / self.saturation),
            best,
        }
    }
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }

    let mean_a = a[..n].mean();
    let mean_b = b[..n].mean();

    let mut covariance = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        covariance += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    covariance / ((var_a * var_b).sqrt() + EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_utils::rgb_to_gray;
    use crate::synthesis::PatternSynthesizer;
    use image::Luma;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn master_gray(seed: i32) -> GrayImage {
        let pattern = PatternSynthesizer::new().synthesize(Some(seed)).unwrap();
        rgb_to_gray(&pattern.image)
    }

    #[test]
    fn test_identical_patterns_saturate() {
        let gray = master_gray(42);
        let result = CorrelationTest::new().score(&gray, &gray);
        assert!(result.best > 0.999);
        assert!((result.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_different_seeds_decorrelate() {
        let a = master_gray(42);
        let b = master_gray(43);
        let result = CorrelationTest::new().score(&a, &b);
        assert!(result.best < 0.4, "best = {}", result.best);
    }

    #[test]
    fn test_noise_has_no_correlation() {
        let gray = master_gray(42);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let noise = GrayImage::from_fn(512, 512, |_, _| Luma([rng.random::<u8>()]));

        let result = CorrelationTest::new().score(&noise, &gray);
        assert!(result.best.abs() < 0.25, "best = {}", result.best);
    }

    #[test]
    fn test_tiny_images_skip_all_block_sizes() {
        let a = GrayImage::from_pixel(16, 16, Luma([100]));
        let result = CorrelationTest::new().score(&a, &a);
        assert_eq!(result.best, 0.0);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_pearson_of_anticorrelated_is_negative() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let b = vec![4.0, 3.0, 2.0, 1.0];
        assert!((pearson(&a, &b) + 1.0).abs() < 1e-9);
    }
}
