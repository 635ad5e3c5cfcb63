//! Color sampling engine: a decoded pixel source with an optional history override, and
//! a fixed-size magnified preview around the sample point.

mod decode;
mod fetch;
mod message;
mod preview;
mod state;

/// Default edge length of the preview grid. Always odd so the sample has a center pixel.
pub const PICKER_SIZE: u32 = 11;

#[cfg(any(test, feature = "test-helpers"))]
pub use decode::{RawRgbaDecoder, encode_raw_rgba};
pub use decode::{DecodeError, DecoderModule, ImageCrateDecoder, ImageDecoder};
#[cfg(any(test, feature = "test-helpers"))]
pub use fetch::MapByteFetcher;
pub use fetch::{ByteFetcher, FetchError, FileByteFetcher};
pub use message::{SamplerRequest, SamplerResponse};
pub use preview::{PreviewCanvas, PreviewDisplay, preview_canvas};
pub use state::{SamplerError, SamplerServices, SamplerState, SamplerStats};
