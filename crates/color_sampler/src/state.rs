//! Color sampling engine state and its executors.

use std::fmt;
use std::sync::Arc;

use bridge_protocol::{ImageBytes, ImageSource, PixelBuffer, Rgb, Rgba};
use thiserror::Error;

use crate::PICKER_SIZE;
use crate::decode::{DecodeError, DecoderModule, ImageCrateDecoder, ImageDecoder};
use crate::fetch::{ByteFetcher, FetchError, FileByteFetcher};
use crate::preview::{PreviewCanvas, PreviewSurface};

/// Pixels left uncovered between a crosshair arm and the preview edge.
const CROSSHAIR_EDGE_MARGIN: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SamplerError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[derive(Clone)]
pub struct SamplerServices {
    pub decoder: Arc<dyn ImageDecoder>,
    pub fetcher: Arc<dyn ByteFetcher>,
}

impl Default for SamplerServices {
    fn default() -> Self {
        Self {
            decoder: Arc::new(ImageCrateDecoder),
            fetcher: Arc::new(FileByteFetcher),
        }
    }
}

impl fmt::Debug for SamplerServices {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("SamplerServices").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerStats {
    pub preview_initialized: bool,
    pub picker_size: u32,
    pub decoder_module_len: Option<usize>,
    pub decoded_size: Option<(u32, u32)>,
    pub history_active: bool,
}

#[derive(Debug)]
pub struct SamplerState {
    services: SamplerServices,
    picker_size: u32,
    preview: Option<PreviewSurface>,
    decoder_module: Option<DecoderModule>,
    decoded: Option<PixelBuffer>,
    history_override: Option<PixelBuffer>,
}

impl Default for SamplerState {
    fn default() -> Self {
        Self::new(SamplerServices::default())
    }
}

impl SamplerState {
    pub fn new(services: SamplerServices) -> Self {
        Self {
            services,
            picker_size: PICKER_SIZE,
            preview: None,
            decoder_module: None,
            decoded: None,
            history_override: None,
        }
    }

    /// Overrides the preview edge length. Even sizes are rounded up so the sampled
    /// pixel keeps an exact center.
    pub fn with_picker_size(mut self, picker_size: u32) -> Self {
        self.picker_size = picker_size.max(1) | 1;
        self
    }

    pub fn picker_size(&self) -> u32 {
        self.picker_size
    }

    /// Binds the preview surface and stores the decoder module. Returns false, leaving
    /// the existing binding alone, when already initialized.
    pub fn init_preview_surface(
        &mut self,
        canvas: PreviewCanvas,
        decoder_module: DecoderModule,
    ) -> bool {
        if self.preview.is_some() {
            log::debug!("[sampler] preview surface already initialized");
            return false;
        }
        self.preview = Some(PreviewSurface::new(canvas, self.picker_size));
        self.decoder_module = Some(decoder_module);
        true
    }

    /// Decodes and stores `bytes` as the live pixel source, returning a copy.
    pub fn decode_image(&mut self, bytes: ImageBytes) -> Result<PixelBuffer, SamplerError> {
        let decoded = self
            .services
            .decoder
            .decode(bytes.as_slice(), self.decoder_module.as_ref())?;
        log::debug!(
            "[sampler] decoded {}x{} source",
            decoded.width(),
            decoded.height()
        );
        self.decoded = Some(decoded.clone());
        Ok(decoded)
    }

    /// History override when present, else the decoded image.
    fn pixel_source(&self) -> Option<&PixelBuffer> {
        self.history_override.as_ref().or(self.decoded.as_ref())
    }

    /// Renders the neighborhood of `(x, y)` into the preview and returns the color at
    /// `base_index` of the pixel source. Black when there is no preview or no source.
    pub fn sample_and_render_preview(
        &mut self,
        x: i32,
        y: i32,
        base_index: usize,
        center_line_color: Option<Rgba>,
    ) -> Rgb {
        let source = self.history_override.as_ref().or(self.decoded.as_ref());
        let (Some(preview), Some(source)) = (self.preview.as_mut(), source) else {
            return Rgb::BLACK;
        };

        let size = preview.size();
        let half = (size / 2) as i64;
        let pixels = preview.pixels_mut();
        pixels.fill(Rgba::TRANSPARENT);
        for preview_y in 0..size {
            let source_y = y as i64 - half + preview_y as i64;
            for preview_x in 0..size {
                let source_x = x as i64 - half + preview_x as i64;
                let (Ok(source_x), Ok(source_y)) =
                    (u32::try_from(source_x), u32::try_from(source_y))
                else {
                    continue;
                };
                if let Some(color) = source.pixel(source_x, source_y) {
                    pixels.set_pixel(preview_x, preview_y, color);
                }
            }
        }
        if let Some(color) = center_line_color {
            draw_crosshair(pixels, color);
        }
        preview.present();
        source.rgb_at(base_index)
    }

    pub fn get_preview_pixel_buffer(&self) -> Option<PixelBuffer> {
        self.pixel_source().cloned()
    }

    /// `None` drops the override. Otherwise the source is fetched and decoded; on
    /// failure the previous override stays in place.
    pub fn switch_history_source(
        &mut self,
        source: Option<ImageSource>,
    ) -> Result<(), SamplerError> {
        let Some(source) = source else {
            self.history_override = None;
            return Ok(());
        };
        let bytes = self.services.fetcher.fetch(&source)?;
        let decoded = self
            .services
            .decoder
            .decode(bytes.as_slice(), self.decoder_module.as_ref())?;
        log::debug!("[sampler] history override set from `{source}`");
        self.history_override = Some(decoded);
        Ok(())
    }

    pub fn pick_color(&self, base_index: usize) -> Rgb {
        self.pixel_source()
            .map_or(Rgb::BLACK, |source| source.rgb_at(base_index))
    }

    /// Releases the preview surface and every buffer.
    pub fn dispose(&mut self) {
        self.preview = None;
        self.decoder_module = None;
        self.decoded = None;
        self.history_override = None;
    }

    pub fn describe(&self) -> SamplerStats {
        SamplerStats {
            preview_initialized: self.preview.is_some(),
            picker_size: self.picker_size,
            decoder_module_len: self.decoder_module.as_ref().map(DecoderModule::len),
            decoded_size: self
                .decoded
                .as_ref()
                .map(|decoded| (decoded.width(), decoded.height())),
            history_active: self.history_override.is_some(),
        }
    }
}

/// Four arms pointing at the center pixel, which itself stays untouched.
fn draw_crosshair(pixels: &mut PixelBuffer, color: Rgba) {
    let center = pixels.width() / 2;
    let arm_len = center.saturating_sub(CROSSHAIR_EDGE_MARGIN);
    for distance in 1..=arm_len {
        pixels.set_pixel(center - distance, center, color);
        pixels.set_pixel(center + distance, center, color);
        pixels.set_pixel(center, center - distance, color);
        pixels.set_pixel(center, center + distance, color);
    }
}
