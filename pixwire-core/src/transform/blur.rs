//! Box blur.
//!
//! Every output pixel is the mean of the `(2·radius+1)²` square around
//! it, restricted to pixels that exist. The divisor is the number of
//! pixels actually visited, so edges and corners use a smaller kernel
//! instead of pulling in clamped or wrapped samples.

use crate::buffer::{ImageBuffer, Pixel};
use crate::command::Command;
use crate::error::PixwireError;

pub fn blur(source: &ImageBuffer, radius: u32) -> Result<ImageBuffer, PixwireError> {
    Command::Blur { radius }.validate()?;

    let (width, height) = source.dimensions();
    let (w, h) = (width as usize, height as usize);
    let r = radius as usize;

    // Per-column channel sums over the rows currently inside the window.
    // Each source row is added once and removed once as the window slides.
    let mut columns = vec![[0u64; 4]; w];
    let mut prefix = vec![[0u64; 4]; w + 1];
    let mut pixels = Vec::with_capacity(w * h);
    let (mut top, mut bottom) = (0usize, 0usize);

    for y in 0..h {
        let y0 = y.saturating_sub(r);
        let y1 = (y + r).min(h - 1);
        while bottom <= y1 {
            accumulate(&mut columns, source.row(bottom as u32), |sum, c| *sum += c);
            bottom += 1;
        }
        while top < y0 {
            accumulate(&mut columns, source.row(top as u32), |sum, c| *sum -= c);
            top += 1;
        }

        for x in 0..w {
            for ch in 0..4 {
                prefix[x + 1][ch] = prefix[x][ch] + columns[x][ch];
            }
        }

        let rows = (y1 - y0 + 1) as u64;
        for x in 0..w {
            let x0 = x.saturating_sub(r);
            let x1 = (x + r).min(w - 1);
            let sums: [u64; 4] = std::array::from_fn(|ch| prefix[x1 + 1][ch] - prefix[x0][ch]);
            let count = (x1 - x0 + 1) as u64 * rows;
            pixels.push(average(sums, count));
        }
    }

    ImageBuffer::new(width, height, pixels)
}

fn accumulate(columns: &mut [[u64; 4]], row: &[Pixel], op: impl Fn(&mut u64, u64)) {
    for (sums, px) in columns.iter_mut().zip(row) {
        for (sum, &channel) in sums.iter_mut().zip(px) {
            op(sum, channel as u64);
        }
    }
}

/// Rounded integer mean of each channel sum.
fn average(sums: [u64; 4], count: u64) -> Pixel {
    sums.map(|sum| ((sum + count / 2) / count) as u16)
}
