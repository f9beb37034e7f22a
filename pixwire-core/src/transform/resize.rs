//! Bilinear resampling.
//!
//! Destination pixel centers are mapped back onto the source grid with
//! `src = (dst + 0.5) · src_len / dst_len − 0.5`. The two nearest source
//! columns and rows are blended; a tap that falls outside the source is
//! dropped and the remaining weights renormalized.

use crate::buffer::{ImageBuffer, Pixel};
use crate::command::Command;
use crate::error::PixwireError;

pub fn resize(source: &ImageBuffer, width: u32, height: u32) -> Result<ImageBuffer, PixwireError> {
    Command::Resize { width, height }.validate()?;

    let xs = taps(source.width(), width);
    let ys = taps(source.height(), height);

    ImageBuffer::from_fn(width, height, |x, y| {
        let col = &xs[x as usize];
        let row = &ys[y as usize];

        let mut acc = [0f64; 4];
        let mut total = 0f64;
        for &(sy, wy) in row.iter().flatten() {
            for &(sx, wx) in col.iter().flatten() {
                let w = wx * wy;
                if w == 0.0 {
                    continue;
                }
                let p = source.pixel(sx, sy);
                for (a, &c) in acc.iter_mut().zip(&p) {
                    *a += c as f64 * w;
                }
                total += w;
            }
        }

        to_pixel(acc, total)
    })
}

/// Up to two `(source index, weight)` taps per destination index.
type Taps = [Option<(u32, f64)>; 2];

fn taps(src_len: u32, dst_len: u32) -> Vec<Taps> {
    let scale = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|d| {
            let pos = (d as f64 + 0.5) * scale - 0.5;
            let lo = pos.floor();
            let frac = pos - lo;
            let lo = lo as i64;
            [tap(lo, 1.0 - frac, src_len), tap(lo + 1, frac, src_len)]
        })
        .collect()
}

fn tap(index: i64, weight: f64, len: u32) -> Option<(u32, f64)> {
    (index >= 0 && index < len as i64).then_some((index as u32, weight))
}

fn to_pixel(acc: [f64; 4], total: f64) -> Pixel {
    if total <= 0.0 {
        return [0; 4];
    }
    acc.map(|a| (a / total).round().clamp(0.0, u16::MAX as f64) as u16)
}
