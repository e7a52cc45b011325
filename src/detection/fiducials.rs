use image::{GrayImage, RgbImage};
use imageproc::filter::gaussian_blur_f32;

use super::MarkerSet;
use super::circles::{Circle, CircleParams, detect_circles};
use crate::Corner;
use crate::image_utils::rgb_to_gray;

#[derive(Debug, Clone)]
pub struct FiducialConfig {
    /// Minimum radial-profile contrast for ring counting.
    pub min_contrast: f64,
    /// Dark threshold position within the profile range.
    pub dark_fraction: f64,
    /// Corner search radius as a fraction of the larger image dimension.
    pub corner_radius_factor: f64,
    pub edge_threshold: f64,
    pub accumulator_thresholds: [u32; 3],
}

impl Default for FiducialConfig {
    fn default() -> Self {
        Self {
            min_contrast: 30.0,
            dark_fraction: 0.35,
            corner_radius_factor: 0.25,
            edge_threshold: 100.0,
            accumulator_thresholds: [40, 30, 20],
        }
    }
}

/// Locates the four corner markers in a rectified pattern image and assigns
/// them to logical corners, primarily by ring count and positionally as a
/// fallback.
pub struct FiducialDetector {
    config: FiducialConfig,
}

impl FiducialDetector {
    pub fn new() -> Self {
        Self {
            config: FiducialConfig::default(),
        }
    }

    pub fn with_config(config: FiducialConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, image: &RgbImage) -> MarkerSet {
        let gray = rgb_to_gray(image);
        let (width, height) = gray.dimensions();
        if width < 16 || height < 16 {
            return MarkerSet::default();
        }

        let scale = width.max(height) as f64 / 512.0;
        let expected_radius = ((20.0 * scale) as u32).max(1);
        let margin = (10.0 * scale) as u32;
        let min_radius = expected_radius.saturating_sub(margin).max(5);
        let max_radius = expected_radius + margin;
        let ring_max_radius = ((25.0 * scale) as i32).max(25);

        let blurred = gaussian_blur_f32(&gray, 2.0);
        let circles = self.detect_marker_circles(&blurred, expected_radius, min_radius, max_radius);
        log::debug!("fiducial detector: {} candidate circles", circles.len());

        let corner_radius = self.config.corner_radius_factor * width.max(height) as f64;
        let candidates = corner_candidates(&circles, width, height, corner_radius);

        let mut markers = MarkerSet::default();

        // first pass: identity from ring count
        let mut unresolved: Vec<(Corner, (f32, f32))> = Vec::new();
        for (image_corner, circle) in candidates.iter().flatten() {
            let centre = (circle.cx, circle.cy);
            match self.count_rings(&gray, centre, ring_max_radius) {
                Some(rings) if Corner::from_ring_count(rings).is_some() => {
                    let logical = Corner::from_ring_count(rings).unwrap_or(*image_corner);
                    if !markers.assign(logical, centre) {
                        unresolved.push((*image_corner, centre));
                    }
                }
                _ => unresolved.push((*image_corner, centre)),
            }
        }

        // second pass: positional fallback into still-free slots
        for (image_corner, centre) in unresolved {
            if markers.is_free(image_corner) {
                markers.assign(image_corner, centre);
            }
        }

        markers
    }

    fn detect_marker_circles(
        &self,
        blurred: &GrayImage,
        expected_radius: u32,
        min_radius: u32,
        max_radius: u32,
    ) -> Vec<Circle> {
        let mut circles = Vec::new();
        for &accumulator_threshold in &self.config.accumulator_thresholds {
            circles = detect_circles(
                blurred,
                &CircleParams {
                    dp: 1.5,
                    min_dist: 2.0 * expected_radius as f64,
                    edge_threshold: self.config.edge_threshold,
                    accumulator_threshold,
                    min_radius,
                    max_radius,
                },
            );
            if circles.len() >= 4 {
                break;
            }
        }
        circles
    }

    /// Mean intensity along 36 rays at each integer radius, thresholded into
    /// dark/light, then counted as light-to-dark transitions. A leading run
    /// of dark samples is a filled disk and reports zero rings. Returns None
    /// when the profile has too little contrast to trust.
    fn count_rings(&self, gray: &GrayImage, centre: (f32, f32), max_radius: i32) -> Option<u32> {
        let (width, height) = gray.dimensions();
        let (cx, cy) = (centre.0 as f64, centre.1 as f64);

        let edge_distance = cx
            .min(cy)
            .min(width as f64 - 1.0 - cx)
            .min(height as f64 - 1.0 - cy);
        let limit = (max_radius as f64).min(edge_distance) as i32;
        if limit < 3 {
            return None;
        }

        let mut profile = Vec::with_capacity(limit as usize + 1);
        for r in 0..=limit {
            if r == 0 {
                profile.push(gray.get_pixel(cx as u32, cy as u32)[0] as f64);
                continue;
            }

            let mut sum = 0.0;
            let mut count = 0u32;
            for step in 0..36 {
                let theta = step as f64 * std::f64::consts::TAU / 36.0;
                let x = (cx + r as f64 * theta.cos()).round();
                let y = (cy + r as f64 * theta.sin()).round();
                if x >= 0.0 && y >= 0.0 && x < width as f64 && y < height as f64 {
                    sum += gray.get_pixel(x as u32, y as u32)[0] as f64;
                    count += 1;
                }
            }
            if count == 0 {
                break;
            }
            profile.push(sum / count as f64);
        }

        let lo = profile.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = profile.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if hi - lo < self.config.min_contrast {
            return None;
        }

        let dark_threshold = lo + self.config.dark_fraction * (hi - lo);
        let dark: Vec<bool> = profile.iter().map(|&v| v < dark_threshold).collect();

        let lead = ((dark.len() / 3).min(6)).max(1);
        if dark[..lead].iter().all(|&d| d) {
            return Some(0);
        }

        let rings = (1..dark.len()).filter(|&i| dark[i] && !dark[i - 1]).count() as u32;
        Some(rings)
    }
}

impl Default for FiducialDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// For each image corner, the detected circle closest to it within
/// `corner_radius`; order is TL, TR, BL, BR.
fn corner_candidates(
    circles: &[Circle],
    width: u32,
    height: u32,
    corner_radius: f64,
) -> [Option<(Corner, Circle)>; 4] {
    let anchors = [
        (Corner::TopLeft, (0.0, 0.0)),
        (Corner::TopRight, (width as f64 - 1.0, 0.0)),
        (Corner::BottomLeft, (0.0, height as f64 - 1.0)),
        (Corner::BottomRight, (width as f64 - 1.0, height as f64 - 1.0)),
    ];

    anchors.map(|(corner, (ax, ay))| {
        let mut best: Option<(f64, Circle)> = None;
        for &circle in circles {
            let dx = circle.cx as f64 - ax;
            let dy = circle.cy as f64 - ay;
            let dist = (dx * dx + dy * dy).sqrt();
            if dist <= corner_radius && best.as_ref().is_none_or(|(d, _)| dist < *d) {
                best = Some((dist, circle));
            }
        }
        best.map(|(_, circle)| (corner, circle))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthesis::PatternSynthesizer;
    use image::Rgb;
    use imageproc::drawing::draw_filled_circle_mut;

    #[test]
    fn test_detects_all_four_markers_on_master() {
        let master = PatternSynthesizer::new().synthesize(Some(42)).unwrap();
        let markers = FiducialDetector::new().detect(&master.image);

        assert_eq!(markers.count(), 4);
        for (corner, centre) in markers.in_order() {
            let (cx, cy) = centre.expect("marker missing");
            let expected = match corner {
                Corner::TopLeft => (24.0, 24.0),
                Corner::TopRight => (488.0, 24.0),
                Corner::BottomLeft => (24.0, 488.0),
                Corner::BottomRight => (488.0, 488.0),
            };
            assert!(
                (cx - expected.0).abs() < 4.0 && (cy - expected.1).abs() < 4.0,
                "{corner:?} at ({cx}, {cy})"
            );
        }
    }

    #[test]
    fn test_ring_counts_identify_corners() {
        let master = PatternSynthesizer::new().synthesize(Some(7)).unwrap();
        let gray = rgb_to_gray(&master.image);
        let detector = FiducialDetector::new();

        assert_eq!(detector.count_rings(&gray, (24.0, 24.0), 25), Some(1));
        assert_eq!(detector.count_rings(&gray, (488.0, 24.0), 25), Some(2));
        assert_eq!(detector.count_rings(&gray, (24.0, 488.0), 25), Some(3));
        assert_eq!(detector.count_rings(&gray, (488.0, 488.0), 25), Some(0));
    }

    #[test]
    fn test_low_contrast_profile_is_rejected() {
        let gray = GrayImage::from_pixel(100, 100, image::Luma([128]));
        let detector = FiducialDetector::new();
        assert_eq!(detector.count_rings(&gray, (50.0, 50.0), 25), None);
    }

    #[test]
    fn test_plain_disks_fall_back_to_positional_assignment() {
        let mut image = RgbImage::from_pixel(512, 512, Rgb([255, 255, 255]));
        for centre in [(24, 24), (488, 24), (24, 488), (488, 488)] {
            draw_filled_circle_mut(&mut image, centre, 20, Rgb([0, 0, 0]));
        }

        let markers = FiducialDetector::new().detect(&image);
        // every disk reads as zero rings; one claims BR, the rest land
        // positionally in their own corners
        assert!(markers.count() >= 3, "found {}", markers.count());
        assert!(markers.bottom_right.is_some());
    }

    #[test]
    fn test_blank_image_has_no_markers() {
        let image = RgbImage::from_pixel(256, 256, Rgb([255, 255, 255]));
        assert_eq!(FiducialDetector::new().detect(&image).count(), 0);
    }
}
