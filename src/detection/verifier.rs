use image::RgbImage;

use super::align::align_to_master;
use super::fiducials::FiducialDetector;
use super::localize::PatternLocalizer;
use crate::VerifyConfig;
use crate::analysis::clamp_score;
use crate::analysis::color::ColorTest;
use crate::analysis::correlation::CorrelationTest;
use crate::analysis::gradient::GradientTest;
use crate::analysis::moire::MoireTest;
use crate::error::{CdpError, Result};
use crate::image_utils::rgb_to_gray;
use crate::report::{SubScores, Verdict, VerificationReport};

/// Full verification pipeline: localise the pattern in the capture, identify
/// the fiducials, register against the master, run the four statistical
/// tests and fold them into a verdict.
///
/// Degenerate geometry (no pattern region, missing markers) is never an
/// error; the pipeline falls back to weaker alignment and lets the scores
/// speak. Only unusable input rasters are rejected.
pub struct CaptureVerifier {
    config: VerifyConfig,
    localizer: PatternLocalizer,
    fiducials: FiducialDetector,
}

impl CaptureVerifier {
    pub fn new() -> Self {
        Self::with_config(VerifyConfig::default())
    }

    pub fn with_config(config: VerifyConfig) -> Self {
        Self {
            config,
            localizer: PatternLocalizer::new(),
            fiducials: FiducialDetector::new(),
        }
    }

    pub fn verify(&self, master: &RgbImage, capture: &RgbImage) -> Result<VerificationReport> {
        self.verify_detailed(master, capture).map(|(report, _)| report)
    }

    /// As `verify`, additionally returning the aligned capture for
    /// inspection or persistence.
    pub fn verify_detailed(
        &self,
        master: &RgbImage,
        capture: &RgbImage,
    ) -> Result<(VerificationReport, RgbImage)> {
        if master.width() == 0 || master.height() == 0 {
            return Err(CdpError::InvalidMaster("empty raster".into()));
        }
        if capture.width() == 0 || capture.height() == 0 {
            return Err(CdpError::InvalidCapture("empty raster".into()));
        }

        let localized = self.localizer.locate(capture);
        log::debug!(
            "localiser: pattern_found={} region={:?}",
            localized.pattern_found,
            localized.bounds
        );

        let markers = self.fiducials.detect(&localized.image);
        let markers_found = markers.count();

        let (aligned, alignment_method) =
            align_to_master(&localized.image, &markers, master.width(), master.height());
        log::debug!("aligned with {markers_found} markers via {alignment_method:?}");

        let master_gray = rgb_to_gray(master);
        let aligned_gray = rgb_to_gray(&aligned);

        let scores = SubScores {
            moire: clamp_score(MoireTest::new().score(&aligned_gray, &master_gray)),
            color: clamp_score(ColorTest::new().score(&aligned, master)),
            correlation: clamp_score(
                CorrelationTest::new().score(&aligned_gray, &master_gray).score,
            ),
            gradient: clamp_score(GradientTest::new().score(&aligned_gray, &master_gray)),
        };

        let confidence = self.config.weights.combine(&scores);
        let verdict = Verdict::from_confidence(
            confidence,
            self.config.authentic_threshold,
            self.config.suspicious_threshold,
        );
        log::debug!("verdict {verdict:?} at confidence {confidence:.3}");

        let report = VerificationReport {
            verdict,
            confidence,
            scores,
            weights: self.config.weights,
            markers_found,
            alignment_method,
            pattern_found: localized.pattern_found,
        };

        Ok((report, aligned))
    }
}

impl Default for CaptureVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::AlignmentMethod;
    use crate::synthesis::PatternSynthesizer;

    #[test]
    fn test_empty_master_is_invalid() {
        let empty = RgbImage::new(0, 0);
        let capture = RgbImage::new(8, 8);
        let result = CaptureVerifier::new().verify(&empty, &capture);
        assert!(matches!(result, Err(CdpError::InvalidMaster(_))));
    }

    #[test]
    fn test_empty_capture_is_invalid() {
        let master = RgbImage::new(8, 8);
        let empty = RgbImage::new(0, 0);
        let result = CaptureVerifier::new().verify(&master, &empty);
        assert!(matches!(result, Err(CdpError::InvalidCapture(_))));
    }

    #[test]
    fn test_round_trip_is_authentic() {
        let master = PatternSynthesizer::new().synthesize(Some(42)).unwrap();
        let report = CaptureVerifier::new()
            .verify(&master.image, &master.image)
            .unwrap();

        assert_eq!(report.verdict, Verdict::Authentic);
        assert!(report.confidence >= 0.95, "confidence = {}", report.confidence);
        assert_eq!(report.markers_found, 4);
        assert_eq!(report.alignment_method, AlignmentMethod::Perspective);
    }

    #[test]
    fn test_confidence_matches_weighted_sum() {
        let master = PatternSynthesizer::new().synthesize(Some(3)).unwrap();
        let other = PatternSynthesizer::new().synthesize(Some(4)).unwrap();
        let report = CaptureVerifier::new()
            .verify(&master.image, &other.image)
            .unwrap();

        let expected = report.weights.combine(&report.scores);
        assert!((report.confidence - expected).abs() < 1e-9);
        for score in [
            report.scores.moire,
            report.scores.color,
            report.scores.correlation,
            report.scores.gradient,
        ] {
            assert!((0.0..=1.0).contains(&score));
        }
    }
}
