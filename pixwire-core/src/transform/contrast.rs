//! Contrast adjustment around mid-gray.
//!
//! For each color channel `c`:
//!
//! ```text
//! c' = clamp(((c / 65535 − 0.5) · factor) + 0.5, 0, 1) · 65535
//! ```
//!
//! rounded to the nearest integer. Alpha passes through untouched.

use crate::buffer::{CHANNEL_MAX, ImageBuffer, Pixel};
use crate::command::Command;
use crate::error::PixwireError;

/// What every color channel collapses to at `factor = 0.0`.
pub const MID_GRAY: u16 = 32_768;

pub fn contrast(source: &ImageBuffer, factor: f64) -> Result<ImageBuffer, PixwireError> {
    Command::Contrast { factor }.validate()?;

    let pixels = source
        .pixels()
        .iter()
        .map(|&[r, g, b, a]| -> Pixel {
            [
                adjust(r, factor),
                adjust(g, factor),
                adjust(b, factor),
                a,
            ]
        })
        .collect();
    ImageBuffer::new(source.width(), source.height(), pixels)
}

fn adjust(channel: u16, factor: f64) -> u16 {
    let max = CHANNEL_MAX as f64;
    let normalized = channel as f64 / max - 0.5;
    let stretched = (normalized * factor + 0.5).clamp(0.0, 1.0);
    (stretched * max).round() as u16
}
