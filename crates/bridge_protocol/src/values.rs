use std::fmt;

use smol_str::SmolStr;
use thiserror::Error;

macro_rules! string_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(SmolStr);

        impl $name {
            pub fn new(raw: impl Into<SmolStr>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self::new(raw)
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self::new(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str(self.as_str())
            }
        }
    };
}

string_key!(
    /// Caller-chosen opaque handle for a scene container.
    ContainerKey
);
string_key!(
    /// Caller-chosen id of an annotation element that owns a blur effect.
    ElementId
);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Straight (non-premultiplied) RGBA color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const BLACK: Rgba = Rgba::new(0, 0, 0, 255);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const fn from_array(bytes: [u8; 4]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2], bytes[3])
    }

    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub const fn rgb(self) -> Rgb {
        Rgb::new(self.r, self.g, self.b)
    }
}

/// Rectangle in surface pixel coordinates, `max` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceRect {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl SurfaceRect {
    pub const fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(
            0,
            0,
            i32::try_from(width).unwrap_or(i32::MAX),
            i32::try_from(height).unwrap_or(i32::MAX),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.min_x >= self.max_x || self.min_y >= self.max_y
    }

    pub fn width(&self) -> u32 {
        if self.is_empty() {
            return 0;
        }
        self.max_x.abs_diff(self.min_x)
    }

    pub fn height(&self) -> u32 {
        if self.is_empty() {
            return 0;
        }
        self.max_y.abs_diff(self.min_y)
    }

    /// Intersects with `[0, width) x [0, height)`; `None` when nothing remains.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<SurfaceRect> {
        let bounds = SurfaceRect::from_size(width, height);
        let clamped = SurfaceRect::new(
            self.min_x.max(bounds.min_x),
            self.min_y.max(bounds.min_y),
            self.max_x.min(bounds.max_x),
            self.max_y.min(bounds.max_y),
        );
        (!clamped.is_empty()).then_some(clamped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PixelBufferError {
    #[error("pixel buffer size {width}x{height} overflows")]
    SizeOverflow { width: u32, height: u32 },
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Tightly packed RGBA8 pixels, row-major, `width * height * 4` bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

fn byte_len(width: u32, height: u32) -> Result<usize, PixelBufferError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or(PixelBufferError::SizeOverflow { width, height })
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, PixelBufferError> {
        let expected = byte_len(width, height)?;
        if data.len() != expected {
            return Err(PixelBufferError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: u32, height: u32, color: Rgba) -> Result<Self, PixelBufferError> {
        let pixel_count = byte_len(width, height)? / 4;
        let mut data = Vec::with_capacity(pixel_count * 4);
        for _ in 0..pixel_count {
            data.extend_from_slice(&color.to_array());
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn transparent(width: u32, height: u32) -> Result<Self, PixelBufferError> {
        Self::filled(width, height, Rgba::TRANSPARENT)
    }

    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            data: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * 4)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        let offset = self.offset(x, y)?;
        let bytes = self.data.get(offset..offset + 4)?;
        Some(Rgba::new(bytes[0], bytes[1], bytes[2], bytes[3]))
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgba) -> bool {
        let Some(offset) = self.offset(x, y) else {
            return false;
        };
        self.data[offset..offset + 4].copy_from_slice(&color.to_array());
        true
    }

    pub fn fill(&mut self, color: Rgba) {
        for pixel in self.data.chunks_exact_mut(4) {
            pixel.copy_from_slice(&color.to_array());
        }
    }

    /// Reads the RGB triple starting at byte `base_index`; bytes past the end read as 0.
    pub fn rgb_at(&self, base_index: usize) -> Rgb {
        let channel = |offset: usize| {
            base_index
                .checked_add(offset)
                .and_then(|index| self.data.get(index))
                .copied()
                .unwrap_or(0)
        };
        Rgb::new(channel(0), channel(1), channel(2))
    }

    /// Copies the part of `rect` that lies inside the buffer.
    pub fn crop(&self, rect: SurfaceRect) -> PixelBuffer {
        let Some(clamped) = rect.clamp_to(self.width, self.height) else {
            return PixelBuffer::empty();
        };
        let width = clamped.width();
        let height = clamped.height();
        let row_bytes = width as usize * 4;
        let mut data = Vec::with_capacity(row_bytes * height as usize);
        for y in clamped.min_y..clamped.max_y {
            let start = (y as usize * self.width as usize + clamped.min_x as usize) * 4;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }
        PixelBuffer {
            width,
            height,
            data,
        }
    }
}

/// Reference to an image the receiving context resolves itself (path or URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageSource(String);

impl ImageSource {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ImageSource {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Encoded image bytes. Not `Clone`: posting them moves ownership to the receiver.
#[derive(PartialEq, Eq)]
pub struct ImageBytes(Vec<u8>);

impl ImageBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for ImageBytes {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "ImageBytes({} bytes)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_at_reads_three_channels_from_base_index() {
        let mut data = vec![0u8; 26 * 4];
        data[100] = 0x10;
        data[101] = 0x20;
        data[102] = 0x30;
        data[103] = 0xFF;
        let buffer = PixelBuffer::new(26, 1, data).expect("valid buffer");
        assert_eq!(buffer.rgb_at(100), Rgb::new(16, 32, 48));
    }

    #[test]
    fn rgb_at_defaults_missing_channels_to_zero() {
        let buffer = PixelBuffer::filled(1, 1, Rgba::new(9, 8, 7, 6)).expect("valid buffer");
        assert_eq!(buffer.rgb_at(2), Rgb::new(7, 6, 0));
        assert_eq!(buffer.rgb_at(usize::MAX), Rgb::BLACK);
    }

    #[test]
    fn new_rejects_length_mismatch() {
        let error = PixelBuffer::new(2, 2, vec![0; 15]).expect_err("short buffer must fail");
        assert_eq!(
            error,
            PixelBufferError::LengthMismatch {
                expected: 16,
                actual: 15
            }
        );
    }

    #[test]
    fn crop_clamps_to_buffer_bounds() {
        let mut buffer = PixelBuffer::transparent(4, 4).expect("valid buffer");
        buffer.set_pixel(3, 3, Rgba::WHITE);
        let cropped = buffer.crop(SurfaceRect::new(2, 2, 10, 10));
        assert_eq!((cropped.width(), cropped.height()), (2, 2));
        assert_eq!(cropped.pixel(1, 1), Some(Rgba::WHITE));

        let outside = buffer.crop(SurfaceRect::new(8, 8, 9, 9));
        assert!(outside.is_empty());
    }

    #[test]
    fn rect_with_inverted_bounds_is_empty() {
        let rect = SurfaceRect::new(5, 5, 1, 8);
        assert!(rect.is_empty());
        assert_eq!(rect.width(), 0);
    }
}
