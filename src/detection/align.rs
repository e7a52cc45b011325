use image::imageops::{FilterType, resize};
use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};

use super::MarkerSet;
use crate::Corner;
use crate::report::AlignmentMethod;

/// Expected marker-centre inset from each master corner.
pub const MARKER_OFFSET: f32 = 24.0;

/// Registers a rectified capture against the master geometry using the
/// strongest transform the detected markers support: perspective with all
/// four, affine with two or three, plain resize otherwise.
pub fn align_to_master(
    image: &RgbImage,
    markers: &MarkerSet,
    master_width: u32,
    master_height: u32,
) -> (RgbImage, AlignmentMethod) {
    let count = markers.count();

    if count == 4
        && let Some(aligned) = align_perspective(image, markers, master_width, master_height)
    {
        return (aligned, AlignmentMethod::Perspective);
    }

    if (2..=4).contains(&count)
        && let Some(aligned) = align_affine(image, markers, master_width, master_height)
    {
        return (aligned, AlignmentMethod::Affine);
    }

    if count >= 2 {
        log::warn!("degenerate marker geometry with {count} markers, resizing instead");
    }
    (
        resize(image, master_width, master_height, FilterType::Triangle),
        AlignmentMethod::Resize,
    )
}

/// Expected destination of a marker centre in master coordinates.
fn expected_destination(corner: Corner, width: u32, height: u32) -> (f32, f32) {
    let (w, h) = (width as f32, height as f32);
    match corner {
        Corner::TopLeft => (MARKER_OFFSET, MARKER_OFFSET),
        Corner::TopRight => (w - MARKER_OFFSET, MARKER_OFFSET),
        Corner::BottomLeft => (MARKER_OFFSET, h - MARKER_OFFSET),
        Corner::BottomRight => (w - MARKER_OFFSET, h - MARKER_OFFSET),
    }
}

fn align_perspective(
    image: &RgbImage,
    markers: &MarkerSet,
    width: u32,
    height: u32,
) -> Option<RgbImage> {
    let tl = markers.get(Corner::TopLeft)?;
    let tr = markers.get(Corner::TopRight)?;
    let br = markers.get(Corner::BottomRight)?;
    let bl = markers.get(Corner::BottomLeft)?;

    let projection = Projection::from_control_points(
        [tl, tr, br, bl],
        [
            expected_destination(Corner::TopLeft, width, height),
            expected_destination(Corner::TopRight, width, height),
            expected_destination(Corner::BottomRight, width, height),
            expected_destination(Corner::BottomLeft, width, height),
        ],
    )?;

    Some(apply(image, &projection, width, height))
}

fn align_affine(
    image: &RgbImage,
    markers: &MarkerSet,
    width: u32,
    height: u32,
) -> Option<RgbImage> {
    // first markers in TL, TR, BL, BR insertion order
    let pairs: Vec<((f32, f32), (f32, f32))> = markers
        .in_order()
        .iter()
        .filter_map(|(corner, centre)| {
            centre.map(|c| (c, expected_destination(*corner, width, height)))
        })
        .take(3)
        .collect();

    let matrix = match pairs.len() {
        3 => affine_from_three(&pairs[0], &pairs[1], &pairs[2])?,
        2 => similarity_from_two(&pairs[0], &pairs[1])?,
        _ => return None,
    };

    let projection = Projection::from_matrix([
        matrix[0][0] as f32,
        matrix[0][1] as f32,
        matrix[0][2] as f32,
        matrix[1][0] as f32,
        matrix[1][1] as f32,
        matrix[1][2] as f32,
        0.0,
        0.0,
        1.0,
    ])?;

    Some(apply(image, &projection, width, height))
}

/// Exact affine through three correspondences, by Cramer's rule.
fn affine_from_three(
    p0: &((f32, f32), (f32, f32)),
    p1: &((f32, f32), (f32, f32)),
    p2: &((f32, f32), (f32, f32)),
) -> Option<[[f64; 3]; 2]> {
    let (x0, y0) = (p0.0.0 as f64, p0.0.1 as f64);
    let (x1, y1) = (p1.0.0 as f64, p1.0.1 as f64);
    let (x2, y2) = (p2.0.0 as f64, p2.0.1 as f64);
    let (u0, v0) = (p0.1.0 as f64, p0.1.1 as f64);
    let (u1, v1) = (p1.1.0 as f64, p1.1.1 as f64);
    let (u2, v2) = (p2.1.0 as f64, p2.1.1 as f64);

    let det = x0 * (y1 - y2) - x1 * (y0 - y2) + x2 * (y0 - y1);
    if det.abs() < 1e-10 {
        return None;
    }

    let a11 = (u0 * (y1 - y2) - u1 * (y0 - y2) + u2 * (y0 - y1)) / det;
    let a12 = (x0 * (u2 - u1) - x1 * (u2 - u0) + x2 * (u1 - u0)) / det;
    let a13 =
        (x0 * (y1 * u2 - y2 * u1) - x1 * (y0 * u2 - y2 * u0) + x2 * (y0 * u1 - y1 * u0)) / det;

    let a21 = (v0 * (y1 - y2) - v1 * (y0 - y2) + v2 * (y0 - y1)) / det;
    let a22 = (x0 * (v2 - v1) - x1 * (v2 - v0) + x2 * (v1 - v0)) / det;
    let a23 =
        (x0 * (y1 * v2 - y2 * v1) - x1 * (y0 * v2 - y2 * v0) + x2 * (y0 * v1 - y1 * v0)) / det;

    Some([[a11, a12, a13], [a21, a22, a23]])
}

/// Four-parameter similarity (rotation, uniform scale, translation) through
/// two correspondences, expressed as an affine matrix.
fn similarity_from_two(
    p0: &((f32, f32), (f32, f32)),
    p1: &((f32, f32), (f32, f32)),
) -> Option<[[f64; 3]; 2]> {
    let (x0, y0) = (p0.0.0 as f64, p0.0.1 as f64);
    let (x1, y1) = (p1.0.0 as f64, p1.0.1 as f64);
    let (u0, v0) = (p0.1.0 as f64, p0.1.1 as f64);
    let (u1, v1) = (p1.1.0 as f64, p1.1.1 as f64);

    let dx = x1 - x0;
    let dy = y1 - y0;
    let du = u1 - u0;
    let dv = v1 - v0;

    let denom = dx * dx + dy * dy;
    if denom < 1e-10 {
        return None;
    }

    let a = (du * dx + dv * dy) / denom;
    let b = (dv * dx - du * dy) / denom;
    let tx = u0 - a * x0 + b * y0;
    let ty = v0 - b * x0 - a * y0;

    Some([[a, -b, tx], [b, a, ty]])
}

fn apply(image: &RgbImage, projection: &Projection, width: u32, height: u32) -> RgbImage {
    let mut out = RgbImage::new(width, height);
    warp_into(
        image,
        projection,
        Interpolation::Bilinear,
        Rgb([0, 0, 0]),
        &mut out,
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn full_markers() -> MarkerSet {
        MarkerSet {
            top_left: Some((24.0, 24.0)),
            top_right: Some((488.0, 24.0)),
            bottom_left: Some((24.0, 488.0)),
            bottom_right: Some((488.0, 488.0)),
        }
    }

    #[test]
    fn test_four_markers_select_perspective() {
        let image = RgbImage::from_pixel(512, 512, Rgb([100, 100, 100]));
        let (aligned, method) = align_to_master(&image, &full_markers(), 512, 512);
        assert_eq!(method, AlignmentMethod::Perspective);
        assert_eq!(aligned.dimensions(), (512, 512));
    }

    #[test]
    fn test_three_markers_select_affine() {
        let mut markers = full_markers();
        markers.bottom_right = None;

        let image = RgbImage::from_pixel(512, 512, Rgb([100, 100, 100]));
        let (_, method) = align_to_master(&image, &markers, 512, 512);
        assert_eq!(method, AlignmentMethod::Affine);
    }

    #[test]
    fn test_two_markers_select_affine() {
        let markers = MarkerSet {
            top_left: Some((24.0, 24.0)),
            bottom_right: Some((488.0, 488.0)),
            ..MarkerSet::default()
        };

        let image = RgbImage::from_pixel(512, 512, Rgb([100, 100, 100]));
        let (_, method) = align_to_master(&image, &markers, 512, 512);
        assert_eq!(method, AlignmentMethod::Affine);
    }

    #[test]
    fn test_few_markers_select_resize() {
        for markers in [
            MarkerSet::default(),
            MarkerSet {
                top_left: Some((24.0, 24.0)),
                ..MarkerSet::default()
            },
        ] {
            let image = RgbImage::from_pixel(600, 400, Rgb([100, 100, 100]));
            let (aligned, method) = align_to_master(&image, &markers, 512, 512);
            assert_eq!(method, AlignmentMethod::Resize);
            assert_eq!(aligned.dimensions(), (512, 512));
        }
    }

    #[test]
    fn test_identity_markers_keep_pixels_in_place() {
        let mut image = RgbImage::from_pixel(512, 512, Rgb([10, 10, 10]));
        image.put_pixel(100, 200, Rgb([250, 0, 0]));

        let (aligned, _) = align_to_master(&image, &full_markers(), 512, 512);
        assert!(aligned.get_pixel(100, 200)[0] >= 248);
    }

    #[test]
    fn test_similarity_from_two_recovers_translation() {
        let m = similarity_from_two(&((0.0, 0.0), (10.0, 5.0)), &((100.0, 0.0), (110.0, 5.0)))
            .unwrap();
        assert!((m[0][0] - 1.0).abs() < 1e-9);
        assert!(m[0][1].abs() < 1e-9);
        assert!((m[0][2] - 10.0).abs() < 1e-9);
        assert!((m[1][2] - 5.0).abs() < 1e-9);
    }
}
