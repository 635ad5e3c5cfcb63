use bridge_protocol::{ImageBytes, ImageSource, Operation, OperationKind, PixelBuffer, Rgb, Rgba};

use crate::decode::DecoderModule;
use crate::preview::PreviewCanvas;
use crate::state::{SamplerError, SamplerState, SamplerStats};

#[derive(Debug)]
pub enum SamplerRequest {
    InitPreviewSurface {
        canvas: PreviewCanvas,
        decoder_module: DecoderModule,
    },
    DecodeImage {
        bytes: ImageBytes,
    },
    Sample {
        x: i32,
        y: i32,
        base_index: usize,
        center_line_color: Option<Rgba>,
    },
    GetPreviewBuffer,
    SwitchHistorySource {
        source: Option<ImageSource>,
    },
    PickColor {
        base_index: usize,
    },
    DescribeSampler,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SamplerResponse {
    InitPreviewSurface(bool),
    DecodeImage(Result<PixelBuffer, SamplerError>),
    Sample(Rgb),
    GetPreviewBuffer(Option<PixelBuffer>),
    SwitchHistorySource(Result<(), SamplerError>),
    PickColor(Rgb),
    DescribeSampler(SamplerStats),
}

impl Operation for SamplerRequest {
    fn kind(&self) -> OperationKind {
        match self {
            SamplerRequest::InitPreviewSurface { .. } => OperationKind::InitPreviewSurface,
            SamplerRequest::DecodeImage { .. } => OperationKind::DecodeImage,
            SamplerRequest::Sample { .. } => OperationKind::Sample,
            SamplerRequest::GetPreviewBuffer => OperationKind::GetPreviewBuffer,
            SamplerRequest::SwitchHistorySource { .. } => OperationKind::SwitchHistorySource,
            SamplerRequest::PickColor { .. } => OperationKind::PickColor,
            SamplerRequest::DescribeSampler => OperationKind::DescribeSampler,
        }
    }
}

impl Operation for SamplerResponse {
    fn kind(&self) -> OperationKind {
        match self {
            SamplerResponse::InitPreviewSurface(_) => OperationKind::InitPreviewSurface,
            SamplerResponse::DecodeImage(_) => OperationKind::DecodeImage,
            SamplerResponse::Sample(_) => OperationKind::Sample,
            SamplerResponse::GetPreviewBuffer(_) => OperationKind::GetPreviewBuffer,
            SamplerResponse::SwitchHistorySource(_) => OperationKind::SwitchHistorySource,
            SamplerResponse::PickColor(_) => OperationKind::PickColor,
            SamplerResponse::DescribeSampler(_) => OperationKind::DescribeSampler,
        }
    }
}

impl SamplerState {
    pub fn handle(&mut self, request: SamplerRequest) -> SamplerResponse {
        match request {
            SamplerRequest::InitPreviewSurface {
                canvas,
                decoder_module,
            } => SamplerResponse::InitPreviewSurface(
                self.init_preview_surface(canvas, decoder_module),
            ),
            SamplerRequest::DecodeImage { bytes } => {
                SamplerResponse::DecodeImage(self.decode_image(bytes))
            }
            SamplerRequest::Sample {
                x,
                y,
                base_index,
                center_line_color,
            } => SamplerResponse::Sample(self.sample_and_render_preview(
                x,
                y,
                base_index,
                center_line_color,
            )),
            SamplerRequest::GetPreviewBuffer => {
                SamplerResponse::GetPreviewBuffer(self.get_preview_pixel_buffer())
            }
            SamplerRequest::SwitchHistorySource { source } => {
                SamplerResponse::SwitchHistorySource(self.switch_history_source(source))
            }
            SamplerRequest::PickColor { base_index } => {
                SamplerResponse::PickColor(self.pick_color(base_index))
            }
            SamplerRequest::DescribeSampler => SamplerResponse::DescribeSampler(self.describe()),
        }
    }
}
