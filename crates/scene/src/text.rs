use std::fmt;
use std::fs;
use std::path::Path;

use ab_glyph::{Font, FontArc, GlyphId, ScaleFont, point};
use bridge_protocol::{PixelBuffer, Rgba};
use thiserror::Error;

/// Upper bound on the rendered em size, in output pixels.
pub const MAX_TEXT_PIXEL_SIZE: f32 = 512.0;
/// Lines wider than this are cut off at the right edge.
pub const MAX_TEXT_WIDTH: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font_size: f32,
    pub color: Rgba,
    /// Output pixels per logical pixel.
    pub resolution: f32,
}

impl TextStyle {
    /// `font_size * resolution`, clamped to `1..=MAX_TEXT_PIXEL_SIZE`.
    pub fn pixel_size(&self) -> f32 {
        let resolution = if self.resolution.is_finite() && self.resolution > 0.0 {
            self.resolution
        } else {
            1.0
        };
        let size = self.font_size * resolution;
        if size.is_finite() {
            size.clamp(1.0, MAX_TEXT_PIXEL_SIZE)
        } else if size > 0.0 {
            MAX_TEXT_PIXEL_SIZE
        } else {
            1.0
        }
    }
}

/// Turns a single line of text into an unrotated RGBA bitmap.
pub trait TextRasterizer: Send + Sync {
    fn rasterize(&self, text: &str, style: &TextStyle) -> PixelBuffer;
}

#[derive(Debug, Error)]
pub enum FontError {
    #[error("failed to read font `{path}`: {reason}")]
    Io { path: String, reason: String },
    #[error("not a TrueType or OpenType font")]
    Invalid(#[from] ab_glyph::InvalidFont),
}

fn blank_line() -> PixelBuffer {
    PixelBuffer::transparent(1, 1).unwrap_or_else(|_| PixelBuffer::empty())
}

/// Outline rasterizer over a TrueType/OpenType font. Without a font every line renders
/// blank.
#[derive(Clone, Default)]
pub struct FontRasterizer {
    font: Option<FontArc>,
}

impl FontRasterizer {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, FontError> {
        let font = FontArc::try_from_vec(bytes)?;
        Ok(Self { font: Some(font) })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FontError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|error| FontError::Io {
            path: path.display().to_string(),
            reason: error.to_string(),
        })?;
        Self::from_bytes(bytes)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }
}

impl fmt::Debug for FontRasterizer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("FontRasterizer")
            .field("has_font", &self.has_font())
            .finish()
    }
}

impl TextRasterizer for FontRasterizer {
    fn rasterize(&self, text: &str, style: &TextStyle) -> PixelBuffer {
        let Some(font) = self.font.as_ref() else {
            log::debug!("[scene] no font loaded; text renders blank");
            return blank_line();
        };
        if text.is_empty() {
            return blank_line();
        }

        let size = style.pixel_size();
        let scaled = font.as_scaled(size);
        let ascent = scaled.ascent();
        let mut glyphs = Vec::with_capacity(text.len());
        let mut cursor = 0.0f32;
        let mut previous: Option<GlyphId> = None;
        for ch in text.chars() {
            let id = font.glyph_id(ch);
            if let Some(previous) = previous {
                cursor += scaled.kern(previous, id);
            }
            glyphs.push(id.with_scale_and_position(size, point(cursor, ascent)));
            cursor += scaled.h_advance(id);
            previous = Some(id);
        }

        let width = (cursor.ceil().max(1.0) as u32).min(MAX_TEXT_WIDTH);
        let height = scaled.height().ceil().max(1.0) as u32;
        let Ok(mut bitmap) = PixelBuffer::transparent(width, height) else {
            return PixelBuffer::empty();
        };
        let color = style.color;
        for glyph in glyphs {
            let Some(outlined) = font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|glyph_x, glyph_y, coverage| {
                let x = bounds.min.x as i64 + glyph_x as i64;
                let y = bounds.min.y as i64 + glyph_y as i64;
                let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
                    return;
                };
                let alpha = (coverage.clamp(0.0, 1.0) * color.a as f32).round() as u8;
                // Overlapping glyph edges keep the stronger coverage.
                let covered = bitmap.pixel(x, y).map_or(0, |pixel| pixel.a);
                if alpha > covered {
                    bitmap.set_pixel(x, y, Rgba::new(color.r, color.g, color.b, alpha));
                }
            });
        }
        bitmap
    }
}

#[cfg(any(test, feature = "test-helpers"))]
mod block {
    use bridge_protocol::PixelBuffer;

    use super::{MAX_TEXT_WIDTH, TextRasterizer, TextStyle};

    const ADVANCE_RATIO: f32 = 0.5;
    const LINE_HEIGHT_RATIO: f32 = 1.25;
    const GLYPH_INSET_RATIO: f32 = 0.1;

    /// Fontless rasterizer: every visible character becomes a solid block inside its
    /// advance cell. Gives tests exact, font-independent coverage.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct BlockGlyphRasterizer;

    impl TextRasterizer for BlockGlyphRasterizer {
        fn rasterize(&self, text: &str, style: &TextStyle) -> PixelBuffer {
            let scale = style.pixel_size();
            let advance = scale * ADVANCE_RATIO;
            let glyph_count = text.chars().count();
            let width = ((advance * glyph_count as f32).ceil() as u32).clamp(1, MAX_TEXT_WIDTH);
            let height = ((scale * LINE_HEIGHT_RATIO).ceil() as u32).max(1);
            let Ok(mut bitmap) = PixelBuffer::transparent(width, height) else {
                return PixelBuffer::empty();
            };

            let inset = advance * GLYPH_INSET_RATIO;
            let top = (height as f32 * 0.2).floor() as u32;
            let bottom = (height as f32 * 0.9).ceil() as u32;
            for (index, glyph) in text.chars().enumerate() {
                let left = (index as f32 * advance + inset).floor() as u32;
                if left >= width {
                    break;
                }
                if glyph.is_whitespace() {
                    continue;
                }
                let right = ((index as f32 + 1.0) * advance - inset).ceil() as u32;
                for y in top..bottom.min(height) {
                    for x in left..right.min(width) {
                        bitmap.set_pixel(x, y, style.color);
                    }
                }
            }
            bitmap
        }
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use block::BlockGlyphRasterizer;
