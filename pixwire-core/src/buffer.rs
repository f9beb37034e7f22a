//! In-memory pixel grid shared by the codec and the transform engine.
//!
//! Pixels are stored row-major as four 16-bit channels (R, G, B, A),
//! each in the linear `0..=65535` range. A buffer never changes after
//! construction; transforms always build a new one.

use crate::command::check_dimensions;
use crate::error::PixwireError;

/// Largest channel value.
pub const CHANNEL_MAX: u16 = u16::MAX;

/// One RGBA pixel with 16 bits per channel.
pub type Pixel = [u16; 4];

// ── ImageBuffer ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Pixel>,
}

impl ImageBuffer {
    /// Wrap an existing pixel vector.
    ///
    /// `pixels.len()` must equal `width * height` and both dimensions
    /// must be in range.
    pub fn new(width: u32, height: u32, pixels: Vec<Pixel>) -> Result<Self, PixwireError> {
        check_dimensions(width, height)?;
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(PixwireError::invalid(format!(
                "pixel count {} does not match {width}x{height}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A buffer where every pixel is `pixel`.
    pub fn filled(width: u32, height: u32, pixel: Pixel) -> Result<Self, PixwireError> {
        check_dimensions(width, height)?;
        Ok(Self {
            width,
            height,
            pixels: vec![pixel; width as usize * height as usize],
        })
    }

    /// Build a buffer by evaluating `f(x, y)` for every coordinate.
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Result<Self, PixwireError>
    where
        F: FnMut(u32, u32) -> Pixel,
    {
        check_dimensions(width, height)?;
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// All pixels, row-major.
    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    /// Returns the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Pixel {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// Returns the pixel at `(x, y)` or `None` outside the grid.
    pub fn get(&self, x: i64, y: i64) -> Option<Pixel> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(self.pixels[y as usize * self.width as usize + x as usize])
    }

    /// Row `y` as a slice of pixels.
    pub fn row(&self, y: u32) -> &[Pixel] {
        let start = y as usize * self.width as usize;
        &self.pixels[start..start + self.width as usize]
    }

    pub fn into_pixels(self) -> Vec<Pixel> {
        self.pixels
    }
}

// ── image crate interop ──────────────────────────────────────────

/// 16-bit RGBA buffer of the `image` crate.
pub type Rgba16Image = image::ImageBuffer<image::Rgba<u16>, Vec<u16>>;

impl TryFrom<&image::DynamicImage> for ImageBuffer {
    type Error = PixwireError;

    fn try_from(img: &image::DynamicImage) -> Result<Self, Self::Error> {
        // Reject before `to_rgba16` allocates the widened copy.
        check_dimensions(img.width(), img.height())?;
        let rgba = img.to_rgba16();
        let (width, height) = rgba.dimensions();
        let pixels = rgba.pixels().map(|p| p.0).collect();
        Self::new(width, height, pixels)
    }
}

impl TryFrom<&ImageBuffer> for Rgba16Image {
    type Error = PixwireError;

    fn try_from(buf: &ImageBuffer) -> Result<Self, Self::Error> {
        let raw: Vec<u16> = buf.pixels.iter().flatten().copied().collect();
        image::ImageBuffer::from_raw(buf.width, buf.height, raw).ok_or_else(|| {
            PixwireError::Codec(format!(
                "{}x{} buffer does not fit its pixel data",
                buf.width, buf.height
            ))
        })
    }
}
