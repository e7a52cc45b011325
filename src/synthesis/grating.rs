use std::f64::consts::TAU;

use image::{GrayImage, Luma};

/// Frequency-modulated sinusoidal grating parameters, in cycles per width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GratingParams {
    pub base_freq: f64,
    pub mod_freq: f64,
    pub mod_depth: f64,
}

/// Renders the vertical grating field. The instantaneous column frequency is
/// `base_freq * (1 + mod_depth * sin(tau * mod_freq * x / width))` and the
/// phase at column x is the running sum of that frequency scaled by
/// `tau / width`. The field has no y-dependence.
pub fn grating_field(width: u32, height: u32, params: &GratingParams) -> GrayImage {
    let mut row = Vec::with_capacity(width as usize);
    let mut phase = 0.0f64;

    for x in 0..width {
        let modulation = (TAU * params.mod_freq * x as f64 / width as f64).sin();
        let freq = params.base_freq * (1.0 + params.mod_depth * modulation);
        phase += freq * TAU / width as f64;
        row.push(((phase.sin() + 1.0) / 2.0 * 255.0) as u8);
    }

    let mut field = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            field.put_pixel(x, y, Luma([row[x as usize]]));
        }
    }

    field
}
