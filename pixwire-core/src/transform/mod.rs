//! # Transform engine
//!
//! Stateless `ImageBuffer → ImageBuffer` operations. Each one validates
//! its parameters before touching the destination buffer and never
//! mutates the source.
//!
//! | Module     | Operation                                   |
//! |------------|---------------------------------------------|
//! | `blur`     | Box filter with edge-aware averaging        |
//! | `resize`   | Bilinear resample to an exact size          |
//! | `contrast` | Per-channel stretch around mid-gray         |

pub mod blur;
pub mod contrast;
pub mod resize;

pub use blur::blur;
pub use contrast::{MID_GRAY, contrast};
pub use resize::resize;

use crate::buffer::ImageBuffer;
use crate::command::Command;
use crate::error::PixwireError;

/// Run `command` against `source`.
pub fn apply(command: &Command, source: &ImageBuffer) -> Result<ImageBuffer, PixwireError> {
    match *command {
        Command::Blur { radius } => blur(source, radius),
        Command::Resize { width, height } => resize(source, width, height),
        Command::Contrast { factor } => contrast(source, factor),
    }
}
