use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;

use crate::Corner;

const RING_THICKNESS: f64 = 3.0;

/// Concentric ring radii stamped per corner. The ring count encodes corner
/// identity: 1 -> top-left, 2 -> top-right, 3 -> bottom-left; bottom-right
/// carries a solid disk instead, read back as zero rings.
pub fn ring_radii(corner: Corner) -> &'static [i32] {
    match corner {
        Corner::TopLeft => &[20],
        Corner::TopRight => &[20, 10],
        Corner::BottomLeft => &[20, 13, 6],
        Corner::BottomRight => &[],
    }
}

const SOLID_DISK_RADIUS: i32 = 20;

/// Stamps the four fiducial markers onto a synthesized pattern: a filled
/// white disk of radius `marker_size/2 - 1` at each corner centre
/// `(off, off)`, `(w-off, off)`, `(off, h-off)`, `(w-off, h-off)` with
/// `off = marker_size/2`, then the identity rings.
pub fn stamp_markers(image: &mut RgbImage, marker_size: u32) {
    let (width, height) = image.dimensions();
    let off = (marker_size / 2) as i32;
    let disk_radius = off - 1;

    let centres = [
        (Corner::TopLeft, (off, off)),
        (Corner::TopRight, (width as i32 - off, off)),
        (Corner::BottomLeft, (off, height as i32 - off)),
        (Corner::BottomRight, (width as i32 - off, height as i32 - off)),
    ];

    for (corner, centre) in centres {
        draw_filled_circle_mut(image, centre, disk_radius, Rgb([255, 255, 255]));

        if corner == Corner::BottomRight {
            draw_filled_circle_mut(image, centre, SOLID_DISK_RADIUS, Rgb([0, 0, 0]));
        } else {
            for &radius in ring_radii(corner) {
                stamp_ring(image, centre, radius as f64);
            }
        }
    }
}

fn stamp_ring(image: &mut RgbImage, centre: (i32, i32), radius: f64) {
    let (width, height) = image.dimensions();
    let half = RING_THICKNESS / 2.0;
    let outer = radius + half;
    let inner = radius - half;

    let x0 = (centre.0 as f64 - outer).floor().max(0.0) as u32;
    let y0 = (centre.1 as f64 - outer).floor().max(0.0) as u32;
    let x1 = ((centre.0 as f64 + outer).ceil() as u32).min(width.saturating_sub(1));
    let y1 = ((centre.1 as f64 + outer).ceil() as u32).min(height.saturating_sub(1));

    for y in y0..=y1 {
        for x in x0..=x1 {
            let dx = x as f64 - centre.0 as f64;
            let dy = y as f64 - centre.1 as f64;
            let dist = (dx * dx + dy * dy).sqrt();
            if dist >= inner && dist <= outer {
                image.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
    }
}
