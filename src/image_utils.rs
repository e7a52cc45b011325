use image::{GrayImage, Luma, RgbImage};
use ndarray::Array2;

pub fn rgb_to_gray(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        let lum =
            (0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64) as u8;
        gray.put_pixel(x, y, Luma([lum]));
    }

    gray
}

pub fn gray_to_array(image: &GrayImage) -> Array2<f64> {
    let (width, height) = image.dimensions();
    let mut arr = Array2::zeros((height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        arr[[y as usize, x as usize]] = pixel[0] as f64;
    }

    arr
}

/// Splits an RGB raster into per-channel float planes, flattened row-major.
pub fn channel_planes(image: &RgbImage) -> [Vec<f64>; 3] {
    let len = (image.width() * image.height()) as usize;
    let mut planes = [
        Vec::with_capacity(len),
        Vec::with_capacity(len),
        Vec::with_capacity(len),
    ];

    for pixel in image.pixels() {
        planes[0].push(pixel[0] as f64);
        planes[1].push(pixel[1] as f64);
        planes[2].push(pixel[2] as f64);
    }

    planes
}

/// 3x3 Sobel derivatives. Border pixels are left at zero.
pub fn sobel_derivatives(gray: &GrayImage) -> (Array2<f64>, Array2<f64>) {
    let (width, height) = gray.dimensions();
    let mut gx = Array2::zeros((height as usize, width as usize));
    let mut gy = Array2::zeros((height as usize, width as usize));

    if width < 3 || height < 3 {
        return (gx, gy);
    }

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let p = |dx: i32, dy: i32| {
                gray.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0] as f64
            };

            let dx = (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1));
            let dy = (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1));

            gx[[y as usize, x as usize]] = dx;
            gy[[y as usize, x as usize]] = dy;
        }
    }

    (gx, gy)
}

/// Mean Sobel gradient magnitude over the whole image.
pub fn sobel_energy(gray: &GrayImage) -> f64 {
    let (gx, gy) = sobel_derivatives(gray);
    let n = gx.len().max(1) as f64;

    gx.iter()
        .zip(gy.iter())
        .map(|(&dx, &dy)| (dx * dx + dy * dy).sqrt())
        .sum::<f64>()
        / n
}

pub fn region_mean(gray: &GrayImage, x: u32, y: u32, width: u32, height: u32) -> f64 {
    let mut sum = 0.0;
    let mut count = 0u64;

    for py in y..(y + height).min(gray.height()) {
        for px in x..(x + width).min(gray.width()) {
            sum += gray.get_pixel(px, py)[0] as f64;
            count += 1;
        }
    }

    if count > 0 { sum / count as f64 } else { 0.0 }
}

pub fn region_stddev(gray: &GrayImage, x: u32, y: u32, width: u32, height: u32) -> f64 {
    let mean = region_mean(gray, x, y, width, height);
    let mut sum_sq = 0.0;
    let mut count = 0u64;

    for py in y..(y + height).min(gray.height()) {
        for px in x..(x + width).min(gray.width()) {
            let diff = gray.get_pixel(px, py)[0] as f64 - mean;
            sum_sq += diff * diff;
            count += 1;
        }
    }

    if count > 0 {
        (sum_sq / count as f64).sqrt()
    } else {
        0.0
    }
}

pub fn image_mean(gray: &GrayImage) -> f64 {
    let n = (gray.width() * gray.height()).max(1) as f64;
    gray.pixels().map(|p| p[0] as f64).sum::<f64>() / n
}

/// Per-tile means for a `block_size` tiling. Partial tiles at the right and
/// bottom edges are excluded so both images tile identically.
pub fn tile_means(gray: &GrayImage, block_size: u32) -> Vec<f64> {
    let (width, height) = gray.dimensions();
    let tiles_x = width / block_size;
    let tiles_y = height / block_size;
    let mut means = Vec::with_capacity((tiles_x * tiles_y) as usize);

    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            means.push(region_mean(
                gray,
                tx * block_size,
                ty * block_size,
                block_size,
                block_size,
            ));
        }
    }

    means
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_gray_conversion_weights() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([255, 255, 255]));

        let gray = rgb_to_gray(&img);
        assert_eq!(gray.get_pixel(0, 0)[0], 76);
        assert_eq!(gray.get_pixel(1, 0)[0], 255);
    }

    #[test]
    fn test_tile_means_excludes_partial_blocks() {
        let gray = GrayImage::from_pixel(20, 20, Luma([100]));
        let means = tile_means(&gray, 8);
        assert_eq!(means.len(), 4);
        assert!(means.iter().all(|&m| (m - 100.0).abs() < 1e-9));
    }

    #[test]
    fn test_sobel_energy_flat_image_is_zero() {
        let gray = GrayImage::from_pixel(16, 16, Luma([128]));
        assert!(sobel_energy(&gray) < 1e-9);
    }
}
