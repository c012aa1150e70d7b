//! Dominant color sampling.
//!
//! At most about 100x100 pixels are visited. Each channel accumulator moves halfway toward
//! every sample (`acc = (acc + v) / 2`), so late samples weigh more than early ones. The
//! result is the channel proportions scaled to 255, not a mean. Stored colors depend on
//! this exact recurrence.

use image::RgbImage;
use tessera_core::Rgb;

const SAMPLES_PER_AXIS: u32 = 100;

fn step(extent: u32) -> usize {
    extent.div_ceil(SAMPLES_PER_AXIS).max(1) as usize
}

pub fn average_color(img: &RgbImage) -> Rgb {
    let (width, height) = img.dimensions();
    let (x_step, y_step) = (step(width), step(height));

    let (mut r, mut g, mut b) = (0f64, 0f64, 0f64);
    for x in (0..width).step_by(x_step) {
        for y in (0..height).step_by(y_step) {
            let [pr, pg, pb] = img.get_pixel(x, y).0;
            r = (r + f64::from(pr)) / 2.0;
            g = (g + f64::from(pg)) / 2.0;
            b = (b + f64::from(pb)) / 2.0;
        }
    }

    let total = r + g + b;
    if total <= 0.0 {
        return Rgb::default();
    }
    // floor, and each share is at most 1.0
    let channel = |acc: f64| (acc / total * 255.0).floor() as u8;
    Rgb {
        r: channel(r),
        g: channel(g),
        b: channel(b),
    }
}
