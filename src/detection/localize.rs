use image::RgbImage;
use image::imageops::crop_imm;
use imageproc::contours::{BorderType, find_contours};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use imageproc::distance_transform::Norm;
use imageproc::morphology::close;
use imageproc::point::Point;

use super::circles::{Circle, CircleParams, detect_circles};
use crate::Region;
use crate::image_utils::{image_mean, region_mean, region_stddev, rgb_to_gray};

#[derive(Debug, Clone)]
pub struct LocalizeConfig {
    /// Minimum contour bounding-box area, as a fraction of the image.
    pub min_area_pct: f64,
    pub min_aspect: f64,
    pub max_aspect: f64,
    /// A contour spanning more than this fraction of either image dimension
    /// is the scene, not the pattern.
    pub max_fill: f64,
    /// Regions brighter than `darkness_factor * image_mean` are not dark
    /// enough to be a printed pattern.
    pub darkness_factor: f64,
    /// Rotations below this are treated as axis-aligned and cropped.
    pub axis_aligned_max_deg: f64,
    /// Crop / rectification padding as a fraction of the region size.
    pub pad_pct: f64,
    /// Padding around a marker cluster in the fallback strategy.
    pub cluster_pad_pct: f64,
    pub accumulator_thresholds: [u32; 3],
}

impl Default for LocalizeConfig {
    fn default() -> Self {
        Self {
            min_area_pct: 0.03,
            min_aspect: 0.7,
            max_aspect: 1.4,
            max_fill: 0.9,
            darkness_factor: 0.95,
            axis_aligned_max_deg: 5.0,
            pad_pct: 0.02,
            cluster_pad_pct: 0.10,
            accumulator_thresholds: [40, 30, 20],
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalizedPattern {
    pub image: RgbImage,
    pub bounds: Option<Region>,
    pub pattern_found: bool,
}

/// Finds the printed pattern inside a capture and rectifies it. Two cascaded
/// strategies: a dark-region contour search, then a marker-cluster fallback
/// looking for four circles in a square arrangement. When both fail the full
/// capture is passed through unchanged.
pub struct PatternLocalizer {
    config: LocalizeConfig,
}

impl PatternLocalizer {
    pub fn new() -> Self {
        Self {
            config: LocalizeConfig::default(),
        }
    }

    pub fn with_config(config: LocalizeConfig) -> Self {
        Self { config }
    }

    pub fn locate(&self, capture: &RgbImage) -> LocalizedPattern {
        let gray = rgb_to_gray(capture);

        if let Some(found) = self.locate_by_contour(capture, &gray) {
            return found;
        }
        log::debug!("contour strategy found no pattern region, trying marker cluster");

        if let Some(found) = self.locate_by_marker_cluster(capture, &gray) {
            return found;
        }
        log::warn!("pattern localisation failed, passing full capture through");

        LocalizedPattern {
            image: capture.clone(),
            bounds: None,
            pattern_found: false,
        }
    }

    fn locate_by_contour(
        &self,
        capture: &RgbImage,
        gray: &image::GrayImage,
    ) -> Option<LocalizedPattern> {
        let (width, height) = gray.dimensions();
        if width < 8 || height < 8 {
            return None;
        }

        let blurred = gaussian_blur_f32(gray, 1.1);
        let level = otsu_level(&blurred);
        let binary = threshold(&blurred, level, ThresholdType::BinaryInverted);
        let closed = close(&binary, Norm::LInf, 7);

        let contours = find_contours::<i32>(&closed);
        let global_mean = image_mean(gray);
        let image_area = width as f64 * height as f64;

        let mut best: Option<(f64, Vec<Point<i32>>, Region)> = None;

        for contour in &contours {
            if contour.border_type != BorderType::Outer || contour.parent.is_some() {
                continue;
            }
            let Some(bbox) = bounding_box(&contour.points) else {
                continue;
            };

            if bbox.width as f64 * bbox.height as f64 / image_area < self.config.min_area_pct {
                continue;
            }
            let aspect = bbox.width as f64 / bbox.height.max(1) as f64;
            if aspect <= self.config.min_aspect || aspect >= self.config.max_aspect {
                continue;
            }
            if bbox.width as f64 > self.config.max_fill * width as f64
                || bbox.height as f64 > self.config.max_fill * height as f64
            {
                continue;
            }

            let mean = region_mean(gray, bbox.x, bbox.y, bbox.width, bbox.height);
            if mean > self.config.darkness_factor * global_mean {
                continue;
            }

            let darkness = (global_mean - mean).max(0.0);
            let stddev = region_stddev(gray, bbox.x, bbox.y, bbox.width, bbox.height);
            let score = darkness + stddev;

            if best.as_ref().is_none_or(|(s, _, _)| score > *s) {
                best = Some((score, contour.points.clone(), bbox));
            }
        }

        let (_, points, bbox) = best?;
        Some(self.rectify_contour(capture, &points, bbox))
    }

    fn rectify_contour(
        &self,
        capture: &RgbImage,
        points: &[Point<i32>],
        bbox: Region,
    ) -> LocalizedPattern {
        let rect = min_area_rect(points);

        let mut effective = rect.angle_deg.abs() % 90.0;
        if effective > 45.0 {
            effective = 90.0 - effective;
        }

        if effective < self.config.axis_aligned_max_deg {
            let image = self.crop_padded(capture, bbox, self.config.pad_pct);
            return LocalizedPattern {
                image,
                bounds: Some(bbox),
                pattern_found: true,
            };
        }

        let side = rect.width.max(rect.height).round().max(8.0);
        let pad = (self.config.pad_pct * side) as f32;
        let size = side as f32;
        let [tl, tr, br, bl] = order_quad(&rect.corners);

        let projection = Projection::from_control_points(
            [tl, tr, br, bl],
            [
                (pad, pad),
                (size - pad, pad),
                (size - pad, size - pad),
                (pad, size - pad),
            ],
        );

        match projection {
            Some(projection) => {
                let mut out = RgbImage::new(side as u32, side as u32);
                warp_into(
                    capture,
                    &projection,
                    Interpolation::Bilinear,
                    image::Rgb([0, 0, 0]),
                    &mut out,
                );
                LocalizedPattern {
                    image: out,
                    bounds: Some(bbox),
                    pattern_found: true,
                }
            }
            None => {
                log::warn!("degenerate rectification quad, falling back to axis-aligned crop");
                let image = self.crop_padded(capture, bbox, self.config.pad_pct);
                LocalizedPattern {
                    image,
                    bounds: Some(bbox),
                    pattern_found: true,
                }
            }
        }
    }

    fn locate_by_marker_cluster(
        &self,
        capture: &RgbImage,
        gray: &image::GrayImage,
    ) -> Option<LocalizedPattern> {
        let (width, height) = gray.dimensions();
        let min_dim = width.min(height) as f64;
        let min_radius = ((20.0 * min_dim * 0.08 / 512.0) as u32).max(5);
        let max_radius = ((20.0 * min_dim * 0.95 / 512.0) as u32).max(min_radius + 1);

        let blurred = gaussian_blur_f32(gray, 2.0);

        let mut circles = Vec::new();
        for &accumulator_threshold in &self.config.accumulator_thresholds {
            circles = detect_circles(
                &blurred,
                &CircleParams {
                    dp: 1.5,
                    min_dist: 2.0 * min_radius as f64,
                    edge_threshold: 100.0,
                    accumulator_threshold,
                    min_radius,
                    max_radius,
                },
            );
            if circles.len() >= 4 {
                break;
            }
        }
        if circles.len() < 4 {
            return None;
        }
        circles.truncate(30);

        let group = best_square_group(&circles)?;
        log::debug!("marker cluster found at threshold sweep, {} circles", circles.len());

        let xs: Vec<f64> = group.iter().map(|c| c.cx as f64).collect();
        let ys: Vec<f64> = group.iter().map(|c| c.cy as f64).collect();
        let x0 = xs.iter().cloned().fold(f64::INFINITY, f64::min);
        let x1 = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let y0 = ys.iter().cloned().fold(f64::INFINITY, f64::min);
        let y1 = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let bbox = Region {
            x: x0.max(0.0) as u32,
            y: y0.max(0.0) as u32,
            width: ((x1 - x0).max(1.0)) as u32,
            height: ((y1 - y0).max(1.0)) as u32,
        };
        let image = self.crop_padded(capture, bbox, self.config.cluster_pad_pct);

        Some(LocalizedPattern {
            image,
            bounds: Some(bbox),
            pattern_found: true,
        })
    }

    fn crop_padded(&self, capture: &RgbImage, bbox: Region, pad_pct: f64) -> RgbImage {
        let (width, height) = capture.dimensions();
        let pad_x = (pad_pct * bbox.width as f64) as i64;
        let pad_y = (pad_pct * bbox.height as f64) as i64;

        let x0 = (bbox.x as i64 - pad_x).max(0) as u32;
        let y0 = (bbox.y as i64 - pad_y).max(0) as u32;
        let x1 = ((bbox.x + bbox.width) as i64 + pad_x).min(width as i64) as u32;
        let y1 = ((bbox.y + bbox.height) as i64 + pad_y).min(height as i64) as u32;

        crop_imm(capture, x0, y0, (x1 - x0).max(1), (y1 - y0).max(1)).to_image()
    }
}

impl Default for PatternLocalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn bounding_box(points: &[Point<i32>]) -> Option<Region> {
    let first = points.first()?;
    let mut x0 = first.x;
    let mut y0 = first.y;
    let mut x1 = first.x;
    let mut y1 = first.y;

    for p in points {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }

    Some(Region {
        x: x0.max(0) as u32,
        y: y0.max(0) as u32,
        width: (x1 - x0).max(1) as u32,
        height: (y1 - y0).max(1) as u32,
    })
}

struct RotatedRect {
    corners: [(f32, f32); 4],
    width: f64,
    height: f64,
    angle_deg: f64,
}

/// Minimum-area enclosing rectangle via rotating calipers over the convex
/// hull. The rectangle is canonicalised so `width >= height`.
fn min_area_rect(points: &[Point<i32>]) -> RotatedRect {
    let hull = convex_hull(points);

    let mut best: Option<RotatedRect> = None;
    let n = hull.len();

    for i in 0..n {
        let (x0, y0) = hull[i];
        let (x1, y1) = hull[(i + 1) % n];
        let len = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        if len < 1e-9 {
            continue;
        }
        let ux = (x1 - x0) / len;
        let uy = (y1 - y0) / len;

        let mut min_u = f64::INFINITY;
        let mut max_u = f64::NEG_INFINITY;
        let mut min_v = f64::INFINITY;
        let mut max_v = f64::NEG_INFINITY;

        for &(px, py) in &hull {
            let u = px * ux + py * uy;
            let v = -px * uy + py * ux;
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }

        let w = max_u - min_u;
        let h = max_v - min_v;
        let area = w * h;

        if best
            .as_ref()
            .is_none_or(|b| area < b.width * b.height - 1e-9)
        {
            let corner = |u: f64, v: f64| -> (f32, f32) {
                ((u * ux - v * uy) as f32, (u * uy + v * ux) as f32)
            };
            let corners = [
                corner(min_u, min_v),
                corner(max_u, min_v),
                corner(max_u, max_v),
                corner(min_u, max_v),
            ];

            let (width, height, angle) = if w >= h {
                (w, h, uy.atan2(ux).to_degrees())
            } else {
                (h, w, uy.atan2(ux).to_degrees() + 90.0)
            };

            best = Some(RotatedRect {
                corners,
                width,
                height,
                angle_deg: angle,
            });
        }
    }

    best.unwrap_or(RotatedRect {
        corners: [(0.0, 0.0); 4],
        width: 1.0,
        height: 1.0,
        angle_deg: 0.0,
    })
}

/// Andrew's monotone chain, returning the hull counter-clockwise.
fn convex_hull(points: &[Point<i32>]) -> Vec<(f64, f64)> {
    let mut pts: Vec<(f64, f64)> = points.iter().map(|p| (p.x as f64, p.y as f64)).collect();
    pts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    pts.dedup();

    if pts.len() < 3 {
        return pts;
    }

    let cross = |o: (f64, f64), a: (f64, f64), b: (f64, f64)| -> f64 {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    };

    let mut lower: Vec<(f64, f64)> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<(f64, f64)> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Orders a quad as (TL, TR, BR, BL): sort by y, split into top and bottom
/// pairs, sort each pair by x.
fn order_quad(corners: &[(f32, f32); 4]) -> [(f32, f32); 4] {
    let mut sorted = *corners;
    sorted.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
    });

    let (mut top, mut bottom) = ([sorted[0], sorted[1]], [sorted[2], sorted[3]]);
    if top[0].0 > top[1].0 {
        top.swap(0, 1);
    }
    if bottom[0].0 > bottom[1].0 {
        bottom.swap(0, 1);
    }

    [top[0], top[1], bottom[1], bottom[0]]
}

/// Picks the 4-subset of circles that best forms a square. Of the six
/// pairwise distances the four smallest are sides and the two largest are
/// diagonals; a valid square has near-equal sides, near-equal diagonals and
/// a diagonal-to-side ratio near sqrt(2).
pub fn best_square_group(circles: &[Circle]) -> Option<[Circle; 4]> {
    let n = circles.len();
    if n < 4 {
        return None;
    }

    let mut best: Option<(f64, [Circle; 4])> = None;

    for i in 0..n {
        for j in i + 1..n {
            for k in j + 1..n {
                for l in k + 1..n {
                    let group = [circles[i], circles[j], circles[k], circles[l]];
                    if let Some(score) = square_score(&group)
                        && best.as_ref().is_none_or(|(s, _)| score < *s)
                    {
                        best = Some((score, group));
                    }
                }
            }
        }
    }

    best.map(|(_, g)| g)
}

fn square_score(group: &[Circle; 4]) -> Option<f64> {
    let radii: Vec<f64> = group.iter().map(|c| c.radius as f64).collect();
    let r_min = radii.iter().cloned().fold(f64::INFINITY, f64::min);
    let r_max = radii.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if r_max > 2.0 * r_min {
        return None;
    }

    let mut distances = Vec::with_capacity(6);
    for i in 0..4 {
        for j in i + 1..4 {
            let dx = (group[i].cx - group[j].cx) as f64;
            let dy = (group[i].cy - group[j].cy) as f64;
            distances.push((dx * dx + dy * dy).sqrt());
        }
    }
    distances.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let sides = &distances[..4];
    let diagonals = &distances[4..];

    let side_mean = sides.iter().sum::<f64>() / 4.0;
    let diag_mean = diagonals.iter().sum::<f64>() / 2.0;
    if side_mean < 10.0 {
        return None;
    }

    let side_ratio = sides[3] / (sides[0] + 1e-10);
    let diag_pair_ratio = diagonals[1] / (diagonals[0] + 1e-10);
    if side_ratio >= 1.3 || diag_pair_ratio >= 1.3 {
        return None;
    }

    let diag_ratio = diag_mean / (side_mean * std::f64::consts::SQRT_2 + 1e-10);
    if diag_ratio <= 0.75 || diag_ratio >= 1.35 {
        return None;
    }

    Some((side_ratio - 1.0) + (diag_pair_ratio - 1.0) + (1.0 - diag_ratio).abs())
}
