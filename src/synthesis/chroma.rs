use image::{GrayImage, Rgb, RgbImage};

use super::prng::SeedStream;

/// Expands a grayscale base to RGB and applies per-block per-channel signed
/// shifts drawn uniformly from `[-intensity, +intensity)`, clamped into
/// `[0, 255]`. Blocks are visited row-major; within a block the three
/// channel shifts are drawn in R, G, B order.
pub fn perturb_channels(
    base: &GrayImage,
    block_size: u32,
    intensity: i32,
    stream: &mut SeedStream,
) -> RgbImage {
    let (width, height) = base.dimensions();
    let mut rgb = RgbImage::new(width, height);

    for by in (0..height).step_by(block_size as usize) {
        for bx in (0..width).step_by(block_size as usize) {
            let shifts = [
                stream.next_int(-intensity, intensity),
                stream.next_int(-intensity, intensity),
                stream.next_int(-intensity, intensity),
            ];

            for y in by..(by + block_size).min(height) {
                for x in bx..(bx + block_size).min(width) {
                    let lum = base.get_pixel(x, y)[0] as i32;
                    let px = Rgb([
                        (lum + shifts[0]).clamp(0, 255) as u8,
                        (lum + shifts[1]).clamp(0, 255) as u8,
                        (lum + shifts[2]).clamp(0, 255) as u8,
                    ]);
                    rgb.put_pixel(x, y, px);
                }
            }
        }
    }

    rgb
}
