use image::RgbImage;
use serde::{Deserialize, Serialize};

pub mod analysis;
pub mod detection;
pub mod error;
pub mod image_utils;
pub mod report;
pub mod synthesis;

pub use detection::MarkerSet;
pub use detection::verifier::CaptureVerifier;
pub use error::{CdpError, Result};
pub use report::{AlignmentMethod, ScoreWeights, SubScores, Verdict, VerificationReport};
pub use synthesis::{PatternDescriptor, PatternSynthesizer, SynthesizedPattern};

/// Logical pattern corner. Corner identity is encoded in the fiducial ring
/// count; the stamper and the detector must agree on this mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    /// TL, TR, BL, BR, the insertion order used throughout the pipeline.
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    pub fn ring_count(self) -> u32 {
        match self {
            Corner::TopLeft => 1,
            Corner::TopRight => 2,
            Corner::BottomLeft => 3,
            Corner::BottomRight => 0,
        }
    }

    pub fn from_ring_count(rings: u32) -> Option<Corner> {
        match rings {
            1 => Some(Corner::TopLeft),
            2 => Some(Corner::TopRight),
            3 => Some(Corner::BottomLeft),
            0 => Some(Corner::BottomRight),
            _ => None,
        }
    }
}

/// Axis-aligned pixel region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    pub pattern_size: u32,
    /// Fiducial disk diameter; marker centres sit half this from each edge.
    pub marker_size: u32,
    pub block_size: u32,
    /// Maximum magnitude of the per-block per-channel colour shift.
    pub perturbation_intensity: i32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            pattern_size: 512,
            marker_size: 48,
            block_size: 8,
            perturbation_intensity: 25,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VerifyConfig {
    pub weights: ScoreWeights,
    pub authentic_threshold: f64,
    pub suspicious_threshold: f64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            authentic_threshold: 0.70,
            suspicious_threshold: 0.50,
        }
    }
}

/// Synthesizes the master pattern for `seed`, drawing a fresh seed when none
/// is given.
pub fn synthesize(seed: Option<i32>, pattern_size: u32) -> Result<SynthesizedPattern> {
    PatternSynthesizer::with_config(SynthesisConfig {
        pattern_size,
        ..SynthesisConfig::default()
    })
    .synthesize(seed)
}

/// Verifies a captured photograph against its digital master.
pub fn verify(master: &RgbImage, capture: &RgbImage) -> Result<VerificationReport> {
    CaptureVerifier::new().verify(master, capture)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_count_mapping_round_trips() {
        for corner in Corner::ALL {
            assert_eq!(Corner::from_ring_count(corner.ring_count()), Some(corner));
        }
        assert_eq!(Corner::from_ring_count(4), None);
    }

    #[test]
    fn test_top_level_synthesize_uses_requested_size() {
        let pattern = synthesize(Some(42), 256).unwrap();
        assert_eq!(pattern.image.dimensions(), (256, 256));
        assert_eq!(pattern.seed, 42);
    }

    #[test]
    fn test_synthesize_without_seed_chooses_one() {
        let pattern = synthesize(None, 128).unwrap();
        assert!(pattern.seed >= 0);
    }
}
