//! Image codec collaborator: bytes ⇄ [`ImageBuffer`].
//!
//! The service only speaks PNG and JPEG. The container format and the
//! channel layout found on decode travel alongside the pixels, so the
//! response is encoded the same way the request was: an 8-bit RGB PNG
//! comes back as an 8-bit RGB PNG. The 16-bit RGBA buffer in between
//! only exists for the arithmetic.

use std::fmt;
use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ImageReader, Limits};

use crate::buffer::{ImageBuffer, Rgba16Image};
use crate::command::{MAX_DIMENSION, MAX_PIXELS};
use crate::error::PixwireError;

/// Default JPEG quality, the same default most encoders ship with.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

// ── ImageFormat ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    /// Conventional file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
        }
    }

    /// Sniff the format from the leading magic bytes.
    pub fn detect(bytes: &[u8]) -> Result<Self, PixwireError> {
        let guessed = image::guess_format(bytes)
            .map_err(|e| PixwireError::UnsupportedFormat(e.to_string()))?;
        Self::try_from(guessed)
    }
}

impl TryFrom<image::ImageFormat> for ImageFormat {
    type Error = PixwireError;

    fn try_from(value: image::ImageFormat) -> Result<Self, Self::Error> {
        match value {
            image::ImageFormat::Png => Ok(ImageFormat::Png),
            image::ImageFormat::Jpeg => Ok(ImageFormat::Jpeg),
            other => Err(PixwireError::UnsupportedFormat(format!("{other:?}"))),
        }
    }
}

impl From<ImageFormat> for image::ImageFormat {
    fn from(value: ImageFormat) -> Self {
        match value {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

// ── PixelLayout ──────────────────────────────────────────────────

/// Channel layout and bit depth of an encoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    L8,
    La8,
    Rgb8,
    Rgba8,
    L16,
    La16,
    Rgb16,
    Rgba16,
}

impl PixelLayout {
    pub fn bits_per_channel(self) -> u8 {
        match self {
            PixelLayout::L8 | PixelLayout::La8 | PixelLayout::Rgb8 | PixelLayout::Rgba8 => 8,
            _ => 16,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(
            self,
            PixelLayout::La8 | PixelLayout::Rgba8 | PixelLayout::La16 | PixelLayout::Rgba16
        )
    }

    pub fn is_gray(self) -> bool {
        matches!(
            self,
            PixelLayout::L8 | PixelLayout::La8 | PixelLayout::L16 | PixelLayout::La16
        )
    }

    /// Narrow a 16-bit RGBA image to this layout.
    fn convert(self, img: DynamicImage) -> DynamicImage {
        match self {
            PixelLayout::L8 => DynamicImage::ImageLuma8(img.to_luma8()),
            PixelLayout::La8 => DynamicImage::ImageLumaA8(img.to_luma_alpha8()),
            PixelLayout::Rgb8 => DynamicImage::ImageRgb8(img.to_rgb8()),
            PixelLayout::Rgba8 => DynamicImage::ImageRgba8(img.to_rgba8()),
            PixelLayout::L16 => DynamicImage::ImageLuma16(img.to_luma16()),
            PixelLayout::La16 => DynamicImage::ImageLumaA16(img.to_luma_alpha16()),
            PixelLayout::Rgb16 => DynamicImage::ImageRgb16(img.to_rgb16()),
            PixelLayout::Rgba16 => img,
        }
    }
}

impl From<ColorType> for PixelLayout {
    /// Float and other exotic layouts fall back to 16-bit RGBA.
    fn from(color: ColorType) -> Self {
        match color {
            ColorType::L8 => PixelLayout::L8,
            ColorType::La8 => PixelLayout::La8,
            ColorType::Rgb8 => PixelLayout::Rgb8,
            ColorType::Rgba8 => PixelLayout::Rgba8,
            ColorType::L16 => PixelLayout::L16,
            ColorType::La16 => PixelLayout::La16,
            ColorType::Rgb16 => PixelLayout::Rgb16,
            _ => PixelLayout::Rgba16,
        }
    }
}

// ── Encoding ─────────────────────────────────────────────────────

/// How an image was (or should be) serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Encoding {
    pub format: ImageFormat,
    pub layout: PixelLayout,
}

impl Encoding {
    pub fn new(format: ImageFormat, layout: PixelLayout) -> Self {
        Self { format, layout }
    }
}

impl From<ImageFormat> for Encoding {
    /// Widest layout the format can hold: 16-bit RGBA for PNG, 8-bit
    /// RGB for JPEG.
    fn from(format: ImageFormat) -> Self {
        let layout = match format {
            ImageFormat::Png => PixelLayout::Rgba16,
            ImageFormat::Jpeg => PixelLayout::Rgb8,
        };
        Self { format, layout }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?}", self.format, self.layout)
    }
}

// ── ImageCodec ───────────────────────────────────────────────────

/// Decode/encode capability the connection handler depends on.
pub trait ImageCodec: Send + Sync + 'static {
    fn decode(&self, bytes: &[u8]) -> Result<(ImageBuffer, Encoding), PixwireError>;

    fn encode(&self, buffer: &ImageBuffer, encoding: Encoding) -> Result<Vec<u8>, PixwireError>;
}

/// Decoder limits matching the in-memory budget, so an oversized image
/// is refused from its header instead of after full decompression.
fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DIMENSION);
    limits.max_image_height = Some(MAX_DIMENSION);
    // Largest decoded buffer: MAX_PIXELS at 16-bit RGBA.
    limits.max_alloc = Some(MAX_PIXELS * 8);
    limits
}

/// [`ImageCodec`] backed by the `image` crate.
///
/// PNG is written back in the layout it arrived in. JPEG has neither
/// alpha nor 16-bit samples, so it is written as 8-bit gray or RGB.
#[derive(Debug, Clone)]
pub struct RasterCodec {
    jpeg_quality: u8,
}

impl RasterCodec {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }
}

impl Default for RasterCodec {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl ImageCodec for RasterCodec {
    fn decode(&self, bytes: &[u8]) -> Result<(ImageBuffer, Encoding), PixwireError> {
        let format = ImageFormat::detect(bytes)?;
        let mut reader = ImageReader::with_format(Cursor::new(bytes), format.into());
        reader.limits(decode_limits());
        let img = reader.decode()?;

        let layout = PixelLayout::from(img.color());
        let buffer = ImageBuffer::try_from(&img)?;
        Ok((buffer, Encoding::new(format, layout)))
    }

    fn encode(&self, buffer: &ImageBuffer, encoding: Encoding) -> Result<Vec<u8>, PixwireError> {
        let img = DynamicImage::ImageRgba16(Rgba16Image::try_from(buffer)?);
        let mut out = Vec::new();
        match encoding.format {
            ImageFormat::Png => {
                encoding
                    .layout
                    .convert(img)
                    .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)?;
            }
            ImageFormat::Jpeg => {
                let mut encoder = JpegEncoder::new_with_quality(&mut out, self.jpeg_quality);
                if encoding.layout.is_gray() {
                    encoder.encode_image(&img.to_luma8())?;
                } else {
                    encoder.encode_image(&img.to_rgb8())?;
                }
            }
        }
        Ok(out)
    }
}
