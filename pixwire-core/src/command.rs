//! Processing commands carried in the first request frame.
//!
//! Text syntax is `"<action>:<params>"`:
//!
//! | Action     | Params                | Example          |
//! |------------|-----------------------|------------------|
//! | `blur`     | radius (int)          | `blur:3`         |
//! | `resize`   | width `x` height      | `resize:640x480` |
//! | `contrast` | factor (float)        | `contrast:1.5`   |

use std::fmt;
use std::str::FromStr;

use crate::error::PixwireError;

/// Largest width or height a transform may produce or accept.
pub const MAX_DIMENSION: u32 = 16_384;

/// Largest pixel count of any image held in memory (16 megapixels).
///
/// At 8 bytes per pixel this caps a single buffer at 128 MiB.
pub const MAX_PIXELS: u64 = 1 << 24;

/// Largest accepted blur radius.
pub const MAX_BLUR_RADIUS: u32 = 256;

/// A single image transform request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Box blur over a `(2·radius+1)²` neighborhood.
    Blur { radius: u32 },
    /// Bilinear resample to exactly `width × height`.
    Resize { width: u32, height: u32 },
    /// Contrast stretch around mid-gray.
    Contrast { factor: f64 },
}

impl Command {
    /// Name of the action as it appears on the wire.
    pub fn action(&self) -> &'static str {
        match self {
            Command::Blur { .. } => "blur",
            Command::Resize { .. } => "resize",
            Command::Contrast { .. } => "contrast",
        }
    }

    /// Range-check the parameters.
    ///
    /// Called by the parser and again by the transform engine, so a
    /// `Command` built by hand is held to the same rules.
    pub fn validate(&self) -> Result<(), PixwireError> {
        match *self {
            Command::Blur { radius } => {
                if radius == 0 {
                    return Err(PixwireError::invalid("blur radius must be positive"));
                }
                if radius > MAX_BLUR_RADIUS {
                    return Err(PixwireError::invalid(format!(
                        "blur radius {radius} exceeds {MAX_BLUR_RADIUS}"
                    )));
                }
            }
            Command::Resize { width, height } => check_dimensions(width, height)?,
            Command::Contrast { factor } => {
                if !factor.is_finite() {
                    return Err(PixwireError::invalid("contrast factor must be finite"));
                }
            }
        }
        Ok(())
    }
}

/// Both dimensions must lie in `1..=MAX_DIMENSION` and the area must
/// not exceed `MAX_PIXELS`.
pub fn check_dimensions(width: u32, height: u32) -> Result<(), PixwireError> {
    if width == 0 || height == 0 {
        return Err(PixwireError::invalid(format!(
            "dimensions must be positive, got {width}x{height}"
        )));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(PixwireError::invalid(format!(
            "dimensions {width}x{height} exceed {MAX_DIMENSION}"
        )));
    }
    let area = width as u64 * height as u64;
    if area > MAX_PIXELS {
        return Err(PixwireError::invalid(format!(
            "{width}x{height} is {area} pixels, above the {MAX_PIXELS} limit"
        )));
    }
    Ok(())
}

impl FromStr for Command {
    type Err = PixwireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (action, params) = s
            .split_once(':')
            .ok_or_else(|| PixwireError::Parse(format!("expected <action>:<params>, got {s:?}")))?;

        let command = match action {
            "blur" => Command::Blur {
                radius: parse_positive(params, "blur radius")?,
            },
            "resize" => {
                let (w, h) = params.split_once('x').ok_or_else(|| {
                    PixwireError::Parse(format!("expected <width>x<height>, got {params:?}"))
                })?;
                Command::Resize {
                    width: parse_positive(w, "resize width")?,
                    height: parse_positive(h, "resize height")?,
                }
            }
            "contrast" => Command::Contrast {
                factor: params.parse::<f64>().map_err(|e| {
                    PixwireError::Parse(format!("contrast factor {params:?}: {e}"))
                })?,
            },
            other => return Err(PixwireError::Parse(format!("unknown action {other:?}"))),
        };

        command.validate()?;
        Ok(command)
    }
}

/// Parse a signed integer so that `-1` is reported as an out-of-range
/// parameter rather than as unparsable text.
fn parse_positive(text: &str, what: &str) -> Result<u32, PixwireError> {
    let value: i64 = text
        .parse()
        .map_err(|e| PixwireError::Parse(format!("{what} {text:?}: {e}")))?;
    if value <= 0 {
        return Err(PixwireError::invalid(format!(
            "{what} must be positive, got {value}"
        )));
    }
    u32::try_from(value).map_err(|_| PixwireError::invalid(format!("{what} {value} is too large")))
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Blur { radius } => write!(f, "blur:{radius}"),
            Command::Resize { width, height } => write!(f, "resize:{width}x{height}"),
            Command::Contrast { factor } => write!(f, "contrast:{factor}"),
        }
    }
}
