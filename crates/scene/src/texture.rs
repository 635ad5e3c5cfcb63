use std::fmt;
use std::sync::Arc;

use bridge_protocol::{ImageSource, PixelBuffer, Rgba};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextureLoadError {
    #[error("image source `{0}` not found")]
    NotFound(String),
    #[error("image source `{image}` could not be decoded: {reason}")]
    Decode { image: String, reason: String },
}

/// Decoded image usable as a sprite source.
///
/// `resolution` is the number of texture pixels per surface pixel; the natural size of
/// the texture is its pixel size divided by it.
#[derive(Clone)]
pub struct Texture {
    pixels: PixelBuffer,
    resolution: f32,
    label: String,
}

impl fmt::Debug for Texture {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Texture")
            .field("label", &self.label)
            .field("pixels", &self.pixels)
            .field("resolution", &self.resolution)
            .finish()
    }
}

impl Texture {
    pub fn new(pixels: PixelBuffer, label: impl Into<String>) -> Self {
        Self {
            pixels,
            resolution: 1.0,
            label: label.into(),
        }
    }

    pub fn with_resolution(mut self, resolution: f32) -> Self {
        self.resolution = if resolution.is_finite() && resolution > 0.0 {
            resolution
        } else {
            1.0
        };
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    pub fn resolution(&self) -> f32 {
        self.resolution
    }

    pub fn natural_width(&self) -> f32 {
        self.pixels.width() as f32 / self.resolution
    }

    pub fn natural_height(&self) -> f32 {
        self.pixels.height() as f32 / self.resolution
    }

    pub(crate) fn texel(&self, x: i64, y: i64) -> Rgba {
        if x < 0 || y < 0 {
            return Rgba::TRANSPARENT;
        }
        self.pixels
            .pixel(x as u32, y as u32)
            .unwrap_or(Rgba::TRANSPARENT)
    }
}

/// Resolves an image source to a texture in the calling context.
pub trait TextureLoader: Send + Sync {
    fn load(&self, source: &ImageSource) -> Result<Texture, TextureLoadError>;
}

/// Loads textures from the filesystem through the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileTextureLoader;

impl TextureLoader for FileTextureLoader {
    fn load(&self, source: &ImageSource) -> Result<Texture, TextureLoadError> {
        let decoded = image::open(source.as_str()).map_err(|error| match error {
            image::ImageError::IoError(io_error)
                if io_error.kind() == std::io::ErrorKind::NotFound =>
            {
                TextureLoadError::NotFound(source.to_string())
            }
            other => TextureLoadError::Decode {
                image: source.to_string(),
                reason: other.to_string(),
            },
        })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        let pixels = PixelBuffer::new(width, height, rgba.into_raw()).map_err(|error| {
            TextureLoadError::Decode {
                image: source.to_string(),
                reason: error.to_string(),
            }
        })?;
        Ok(Texture::new(pixels, source.as_str()))
    }
}

impl<T: TextureLoader + ?Sized> TextureLoader for Arc<T> {
    fn load(&self, source: &ImageSource) -> Result<Texture, TextureLoadError> {
        (**self).load(source)
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use memory::MemoryTextureLoader;

#[cfg(any(test, feature = "test-helpers"))]
mod memory {
    use std::collections::HashMap;

    use super::*;

    /// Serves pre-registered pixel buffers by source string.
    #[derive(Debug, Default, Clone)]
    pub struct MemoryTextureLoader {
        textures: HashMap<String, PixelBuffer>,
    }

    impl MemoryTextureLoader {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_texture(mut self, source: &str, pixels: PixelBuffer) -> Self {
            self.textures.insert(source.to_owned(), pixels);
            self
        }
    }

    impl TextureLoader for MemoryTextureLoader {
        fn load(&self, source: &ImageSource) -> Result<Texture, TextureLoadError> {
            self.textures
                .get(source.as_str())
                .map(|pixels| Texture::new(pixels.clone(), source.as_str()))
                .ok_or_else(|| TextureLoadError::NotFound(source.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_size_accounts_for_resolution() {
        let pixels = PixelBuffer::transparent(40, 20).expect("valid buffer");
        let texture = Texture::new(pixels, "t").with_resolution(2.0);
        assert_eq!(texture.natural_width(), 20.0);
        assert_eq!(texture.natural_height(), 10.0);
    }

    #[test]
    fn invalid_resolution_falls_back_to_one() {
        let pixels = PixelBuffer::transparent(4, 4).expect("valid buffer");
        let texture = Texture::new(pixels, "t").with_resolution(f32::NAN);
        assert_eq!(texture.resolution(), 1.0);
    }

    #[test]
    fn missing_file_reports_not_found() {
        let error = FileTextureLoader
            .load(&ImageSource::new("/definitely/not/here.png"))
            .expect_err("missing file must fail");
        assert_eq!(
            error,
            TextureLoadError::NotFound("/definitely/not/here.png".to_owned())
        );
    }

    #[test]
    fn memory_loader_serves_registered_pixels() {
        let pixels = PixelBuffer::filled(2, 3, Rgba::WHITE).expect("valid buffer");
        let loader = MemoryTextureLoader::new().with_texture("mem://a", pixels);
        let texture = loader.load(&ImageSource::new("mem://a")).expect("registered");
        assert_eq!(texture.natural_width(), 2.0);
        assert!(loader.load(&ImageSource::new("mem://b")).is_err());
    }
}
