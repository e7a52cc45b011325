use image::GrayImage;

use crate::image_utils::sobel_derivatives;

/// A detected circle with its accumulator support.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub cx: f32,
    pub cy: f32,
    pub radius: f32,
    pub votes: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct CircleParams {
    /// Inverse accumulator resolution; centres are voted at `1/dp` scale.
    pub dp: f64,
    /// Minimum distance between accepted centres.
    pub min_dist: f64,
    /// Sobel magnitude below which a pixel casts no vote.
    pub edge_threshold: f64,
    /// Minimum accumulator support for a centre.
    pub accumulator_threshold: u32,
    pub min_radius: u32,
    pub max_radius: u32,
}

struct EdgePoint {
    x: f32,
    y: f32,
    dx: f32,
    dy: f32,
}

/// Gradient-voting Hough circle transform.
///
/// Edge pixels vote along both gradient directions for every radius in
/// range; accumulator local maxima above the threshold become centres
/// (centroid-refined over a 3x3 neighbourhood), and each centre takes the
/// mode of its supporting edge distances as radius. The result order is
/// fixed: votes descending, then y, then x.
pub fn detect_circles(gray: &GrayImage, params: &CircleParams) -> Vec<Circle> {
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 || params.max_radius < params.min_radius || params.dp <= 0.0 {
        return Vec::new();
    }

    let edges = extract_edges(gray, params.edge_threshold);
    if edges.is_empty() {
        return Vec::new();
    }

    let acc_w = (width as f64 / params.dp).ceil() as usize;
    let acc_h = (height as f64 / params.dp).ceil() as usize;
    let mut accumulator = vec![0u32; acc_w * acc_h];

    for edge in &edges {
        for radius in params.min_radius..=params.max_radius {
            let r = radius as f32;
            for sign in [-1.0f32, 1.0] {
                let cx = edge.x + sign * edge.dx * r;
                let cy = edge.y + sign * edge.dy * r;
                if cx < 0.0 || cy < 0.0 {
                    continue;
                }
                let ax = (cx as f64 / params.dp) as usize;
                let ay = (cy as f64 / params.dp) as usize;
                if ax < acc_w && ay < acc_h {
                    accumulator[ay * acc_w + ax] += 1;
                }
            }
        }
    }

    let centres = find_centres(&accumulator, acc_w, acc_h, params);
    estimate_radii(&edges, &centres, params)
}

/// Sobel edges, thinned to gradient-direction maxima.
fn extract_edges(gray: &GrayImage, threshold: f64) -> Vec<EdgePoint> {
    let (gx, gy) = sobel_derivatives(gray);
    let (h, w) = gx.dim();
    let mut edges = Vec::new();

    let mag = |x: i64, y: i64| -> f64 {
        if x < 1 || y < 1 || x >= w as i64 - 1 || y >= h as i64 - 1 {
            return 0.0;
        }
        let dx = gx[[y as usize, x as usize]];
        let dy = gy[[y as usize, x as usize]];
        (dx * dx + dy * dy).sqrt()
    };

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let m = mag(x as i64, y as i64);
            if m < threshold {
                continue;
            }

            let dx = gx[[y, x]] / m;
            let dy = gy[[y, x]] / m;
            let step_x = dx.round() as i64;
            let step_y = dy.round() as i64;
            let ahead = mag(x as i64 + step_x, y as i64 + step_y);
            let behind = mag(x as i64 - step_x, y as i64 - step_y);
            if m < ahead || m < behind {
                continue;
            }

            edges.push(EdgePoint {
                x: x as f32,
                y: y as f32,
                dx: dx as f32,
                dy: dy as f32,
            });
        }
    }

    edges
}

fn find_centres(
    accumulator: &[u32],
    acc_w: usize,
    acc_h: usize,
    params: &CircleParams,
) -> Vec<(f32, f32, u32)> {
    let at = |ax: i64, ay: i64| -> u32 {
        if ax < 0 || ay < 0 || ax >= acc_w as i64 || ay >= acc_h as i64 {
            0
        } else {
            accumulator[ay as usize * acc_w + ax as usize]
        }
    };

    let mut candidates = Vec::new();
    for ay in 0..acc_h as i64 {
        for ax in 0..acc_w as i64 {
            let v = at(ax, ay);
            if v < params.accumulator_threshold {
                continue;
            }
            // top-left cell of a plateau wins
            if v > at(ax - 1, ay) && v > at(ax, ay - 1) && v >= at(ax + 1, ay) && v >= at(ax, ay + 1)
            {
                candidates.push((v, ax, ay));
            }
        }
    }

    candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.2.cmp(&b.2)).then(a.1.cmp(&b.1)));

    let mut centres: Vec<(f32, f32, u32)> = Vec::new();
    for (votes, ax, ay) in candidates {
        // vote centroid over the 3x3 neighbourhood
        let mut sum = 0.0f64;
        let mut sum_x = 0.0f64;
        let mut sum_y = 0.0f64;
        for ny in ay - 1..=ay + 1 {
            for nx in ax - 1..=ax + 1 {
                let w = at(nx, ny) as f64;
                sum += w;
                sum_x += w * (nx as f64 + 0.5);
                sum_y += w * (ny as f64 + 0.5);
            }
        }
        if sum <= 0.0 {
            continue;
        }
        let cx = (sum_x / sum * params.dp) as f32;
        let cy = (sum_y / sum * params.dp) as f32;

        let separated = centres.iter().all(|&(ox, oy, _)| {
            let dx = (cx - ox) as f64;
            let dy = (cy - oy) as f64;
            (dx * dx + dy * dy).sqrt() >= params.min_dist
        });
        if separated {
            centres.push((cx, cy, votes));
        }
    }

    centres
}

fn estimate_radii(
    edges: &[EdgePoint],
    centres: &[(f32, f32, u32)],
    params: &CircleParams,
) -> Vec<Circle> {
    let span = (params.max_radius - params.min_radius + 1) as usize;
    let mut circles = Vec::with_capacity(centres.len());

    for &(cx, cy, votes) in centres {
        let mut histogram = vec![0u32; span];
        for edge in edges {
            let dx = (edge.x - cx) as f64;
            let dy = (edge.y - cy) as f64;
            let bin = (dx * dx + dy * dy).sqrt().round() as i64 - params.min_radius as i64;
            if bin >= 0 && (bin as usize) < span {
                histogram[bin as usize] += 1;
            }
        }

        // mode over a 3-bin window absorbs the 1px quantisation split
        let mut best_bin = 0usize;
        let mut best_count = 0u32;
        for bin in 0..span {
            let lo = bin.saturating_sub(1);
            let hi = (bin + 1).min(span - 1);
            let count = histogram[lo..=hi].iter().sum::<u32>();
            if count > best_count {
                best_count = count;
                best_bin = bin;
            }
        }
        if best_count == 0 {
            continue;
        }

        let lo = best_bin.saturating_sub(1);
        let hi = (best_bin + 1).min(span - 1);
        let mut weight = 0.0f64;
        let mut weighted_radius = 0.0f64;
        for bin in lo..=hi {
            weight += histogram[bin] as f64;
            weighted_radius += histogram[bin] as f64 * (params.min_radius as usize + bin) as f64;
        }

        circles.push(Circle {
            cx,
            cy,
            radius: (weighted_radius / weight) as f32,
            votes,
        });
    }

    circles
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};
    use imageproc::drawing::draw_filled_circle_mut;

    fn test_params(min_radius: u32, max_radius: u32) -> CircleParams {
        CircleParams {
            dp: 1.5,
            min_dist: 20.0,
            edge_threshold: 100.0,
            accumulator_threshold: 20,
            min_radius,
            max_radius,
        }
    }

    fn disk_image(centres: &[(i32, i32)], radius: i32) -> GrayImage {
        let mut rgb = RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]));
        for &c in centres {
            draw_filled_circle_mut(&mut rgb, c, radius, Rgb([0, 0, 0]));
        }
        crate::image_utils::rgb_to_gray(&rgb)
    }

    #[test]
    fn test_detects_single_disk() {
        let gray = disk_image(&[(100, 100)], 20);
        let circles = detect_circles(&gray, &test_params(10, 30));

        assert!(!circles.is_empty());
        let best = circles[0];
        assert!((best.cx - 100.0).abs() < 3.0, "cx = {}", best.cx);
        assert!((best.cy - 100.0).abs() < 3.0, "cy = {}", best.cy);
        assert!((best.radius - 20.0).abs() <= 2.0, "r = {}", best.radius);
    }

    #[test]
    fn test_detects_four_disks() {
        let gray = disk_image(&[(40, 40), (160, 40), (40, 160), (160, 160)], 15);
        let circles = detect_circles(&gray, &test_params(8, 25));
        assert!(circles.len() >= 4, "found {}", circles.len());
    }

    #[test]
    fn test_blank_image_yields_nothing() {
        let gray = GrayImage::from_pixel(100, 100, Luma([200]));
        assert!(detect_circles(&gray, &test_params(5, 20)).is_empty());
    }

    #[test]
    fn test_result_is_deterministic() {
        let gray = disk_image(&[(60, 60), (140, 140)], 18);
        let a = detect_circles(&gray, &test_params(10, 25));
        let b = detect_circles(&gray, &test_params(10, 25));
        assert_eq!(a, b);
    }
}
