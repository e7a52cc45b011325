pub mod blocks;
pub mod chroma;
pub mod grating;
pub mod markers;
pub mod prng;

use std::path::Path;

use image::{GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};

use crate::SynthesisConfig;
use crate::error::{CdpError, Result};
use grating::GratingParams;
use prng::{BLOCK_OFFSET, GRATING_OFFSET, PERTURBATION_OFFSET, SeedStream};

/// Logical identity of a pattern: the seed plus the grating parameters
/// derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternDescriptor {
    pub seed: i32,
    pub pattern_size: u32,
    pub base_freq: f64,
    pub mod_freq: f64,
    pub mod_depth: f64,
}

impl PatternDescriptor {
    /// Derives the grating parameters from the seed. Draw order (base
    /// frequency, modulation frequency, modulation depth) is fixed; the
    /// parameter stream is the seed offset by `GRATING_OFFSET`.
    pub fn from_seed(seed: i32, pattern_size: u32) -> Self {
        let mut stream = SeedStream::new(seed, GRATING_OFFSET);
        Self {
            seed,
            pattern_size,
            base_freq: stream.next_range(20.0, 40.0),
            mod_freq: stream.next_range(2.0, 6.0),
            mod_depth: stream.next_range(0.2, 0.5),
        }
    }

    pub fn grating_params(&self) -> GratingParams {
        GratingParams {
            base_freq: self.base_freq,
            mod_freq: self.mod_freq,
            mod_depth: self.mod_depth,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthesizedPattern {
    pub seed: i32,
    pub descriptor: PatternDescriptor,
    pub image: RgbImage,
}

impl SynthesizedPattern {
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image.save(path)?;
        Ok(())
    }
}

pub struct PatternSynthesizer {
    config: SynthesisConfig,
}

impl PatternSynthesizer {
    pub fn new() -> Self {
        Self {
            config: SynthesisConfig::default(),
        }
    }

    pub fn with_config(config: SynthesisConfig) -> Self {
        Self { config }
    }

    /// Produces the master pattern for `seed`, drawing a fresh seed when
    /// none is given. The output is fully determined by the seed and the
    /// config.
    pub fn synthesize(&self, seed: Option<i32>) -> Result<SynthesizedPattern> {
        let size = self.config.pattern_size;
        if size == 0 {
            return Err(CdpError::InvalidParameter(
                "pattern_size must be positive".into(),
            ));
        }
        if self.config.block_size == 0 {
            return Err(CdpError::InvalidParameter(
                "block_size must be positive".into(),
            ));
        }

        let seed = seed.unwrap_or_else(prng::random_seed);
        let descriptor = PatternDescriptor::from_seed(seed, size);
        log::debug!(
            "synthesizing pattern seed={seed} size={size} base_freq={:.2}",
            descriptor.base_freq
        );

        let grating = grating::grating_field(size, size, &descriptor.grating_params());

        let mut block_stream = SeedStream::new(seed, BLOCK_OFFSET);
        let blocks = blocks::block_field(size, size, self.config.block_size, &mut block_stream);

        let base = blend_fields(&grating, &blocks);

        let mut perturb_stream = SeedStream::new(seed, PERTURBATION_OFFSET);
        let mut image = chroma::perturb_channels(
            &base,
            self.config.block_size,
            self.config.perturbation_intensity,
            &mut perturb_stream,
        );

        markers::stamp_markers(&mut image, self.config.marker_size);

        Ok(SynthesizedPattern {
            seed,
            descriptor,
            image,
        })
    }
}

impl Default for PatternSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Equal-weight blend of the grating and block fields.
fn blend_fields(grating: &GrayImage, blocks: &GrayImage) -> GrayImage {
    let (width, height) = grating.dimensions();
    let mut combined = GrayImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let g = grating.get_pixel(x, y)[0] as f64;
            let b = blocks.get_pixel(x, y)[0] as f64;
            combined.put_pixel(x, y, Luma([(0.5 * g + 0.5 * b) as u8]));
        }
    }

    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesis_is_deterministic() {
        let synth = PatternSynthesizer::new();
        let a = synth.synthesize(Some(42)).unwrap();
        let b = synth.synthesize(Some(42)).unwrap();
        assert_eq!(a.image.as_raw(), b.image.as_raw());
        assert_eq!(a.descriptor, b.descriptor);
    }

    #[test]
    fn test_distinct_seeds_give_distinct_patterns() {
        let synth = PatternSynthesizer::new();
        let a = synth.synthesize(Some(42)).unwrap();
        let b = synth.synthesize(Some(43)).unwrap();
        assert_ne!(a.image.as_raw(), b.image.as_raw());
    }

    #[test]
    fn test_output_dimensions_match_config() {
        let pattern = PatternSynthesizer::new().synthesize(Some(1)).unwrap();
        assert_eq!(pattern.image.dimensions(), (512, 512));
    }

    #[test]
    fn test_descriptor_parameters_are_in_range() {
        let d = PatternDescriptor::from_seed(42, 512);
        assert!((20.0..40.0).contains(&d.base_freq));
        assert!((2.0..6.0).contains(&d.mod_freq));
        assert!((0.2..0.5).contains(&d.mod_depth));
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let synth = PatternSynthesizer::with_config(SynthesisConfig {
            pattern_size: 0,
            ..SynthesisConfig::default()
        });
        assert!(synth.synthesize(Some(1)).is_err());
    }
}
