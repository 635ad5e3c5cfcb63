use std::fmt;
use std::sync::Arc;

use bridge_protocol::{PixelBuffer, PixelBufferError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("image bytes are malformed: {0}")]
    Malformed(String),
    #[error("decoder module is required but was never provided")]
    MissingModule,
    #[error(transparent)]
    Buffer(#[from] PixelBufferError),
}

/// Opaque decoder blob handed over at preview init and passed back to the decoder on
/// every decode.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct DecoderModule(Vec<u8>);

impl DecoderModule {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for DecoderModule {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "DecoderModule({} bytes)", self.0.len())
    }
}

/// Turns encoded image bytes into an RGBA buffer.
pub trait ImageDecoder: Send + Sync {
    fn decode(
        &self,
        bytes: &[u8],
        module: Option<&DecoderModule>,
    ) -> Result<PixelBuffer, DecodeError>;
}

impl<T: ImageDecoder + ?Sized> ImageDecoder for Arc<T> {
    fn decode(
        &self,
        bytes: &[u8],
        module: Option<&DecoderModule>,
    ) -> Result<PixelBuffer, DecodeError> {
        (**self).decode(bytes, module)
    }
}

/// PNG/JPEG decoding through the `image` crate. The decoder module is not consulted.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn decode(
        &self,
        bytes: &[u8],
        _module: Option<&DecoderModule>,
    ) -> Result<PixelBuffer, DecodeError> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|error| DecodeError::Malformed(error.to_string()))?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(PixelBuffer::new(width, height, rgba.into_raw())?)
    }
}

#[cfg(any(test, feature = "test-helpers"))]
pub use raw::{RawRgbaDecoder, encode_raw_rgba};

#[cfg(any(test, feature = "test-helpers"))]
mod raw {
    use super::*;

    const HEADER_LEN: usize = 8;

    /// Decodes `[width: u32 LE][height: u32 LE][rgba bytes]`. Requires a decoder module
    /// so tests can observe that the stored module reaches the decoder.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct RawRgbaDecoder;

    pub fn encode_raw_rgba(pixels: &PixelBuffer) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + pixels.data().len());
        bytes.extend_from_slice(&pixels.width().to_le_bytes());
        bytes.extend_from_slice(&pixels.height().to_le_bytes());
        bytes.extend_from_slice(pixels.data());
        bytes
    }

    impl ImageDecoder for RawRgbaDecoder {
        fn decode(
            &self,
            bytes: &[u8],
            module: Option<&DecoderModule>,
        ) -> Result<PixelBuffer, DecodeError> {
            if module.is_none() {
                return Err(DecodeError::MissingModule);
            }
            let (header, data) = bytes
                .split_at_checked(HEADER_LEN)
                .ok_or_else(|| DecodeError::Malformed("missing raw header".to_owned()))?;
            let width = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let height = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
            Ok(PixelBuffer::new(width, height, data.to_vec())?)
        }
    }
}
