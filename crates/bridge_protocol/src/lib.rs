//! Transport message protocol.
//!
//! Defines the closed set of operations exchanged between the caller context and a
//! worker context, the envelopes that carry them, and the value types both sides agree on.
//! Feature crates (`scene`, `color_sampler`) own their request/response enums; this crate
//! only fixes the operation names, correlation keys and shared payload shapes.

mod mailbox;
mod transfer;
mod values;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub use mailbox::{FramePublisher, FrameView, frame_mailbox};
pub use transfer::{TransferError, Transferable};
pub use values::{
    ContainerKey, ElementId, ImageBytes, ImageSource, PixelBuffer, PixelBufferError, Rgb, Rgba,
    SurfaceRect,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Init,
    Dispose,
    CreateContainer,
    ResizeSurface,
    ClearSurface,
    ExtractPixels,
    RenderToSurface,
    Render,
    AddImageToContainer,
    ClearContainer,
    CreateBlurEffect,
    UpdateBlurEffect,
    DeleteBlurEffect,
    UpdateWatermark,
    DescribeScene,
    InitPreviewSurface,
    DecodeImage,
    Sample,
    GetPreviewBuffer,
    SwitchHistorySource,
    PickColor,
    DescribeSampler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineFamily {
    RenderEngine,
    ColorSampling,
}

impl OperationKind {
    pub const ALL: [OperationKind; 22] = [
        OperationKind::Init,
        OperationKind::Dispose,
        OperationKind::CreateContainer,
        OperationKind::ResizeSurface,
        OperationKind::ClearSurface,
        OperationKind::ExtractPixels,
        OperationKind::RenderToSurface,
        OperationKind::Render,
        OperationKind::AddImageToContainer,
        OperationKind::ClearContainer,
        OperationKind::CreateBlurEffect,
        OperationKind::UpdateBlurEffect,
        OperationKind::DeleteBlurEffect,
        OperationKind::UpdateWatermark,
        OperationKind::DescribeScene,
        OperationKind::InitPreviewSurface,
        OperationKind::DecodeImage,
        OperationKind::Sample,
        OperationKind::GetPreviewBuffer,
        OperationKind::SwitchHistorySource,
        OperationKind::PickColor,
        OperationKind::DescribeSampler,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            OperationKind::Init => "Init",
            OperationKind::Dispose => "Dispose",
            OperationKind::CreateContainer => "CreateContainer",
            OperationKind::ResizeSurface => "ResizeSurface",
            OperationKind::ClearSurface => "ClearSurface",
            OperationKind::ExtractPixels => "ExtractPixels",
            OperationKind::RenderToSurface => "RenderToSurface",
            OperationKind::Render => "Render",
            OperationKind::AddImageToContainer => "AddImageToContainer",
            OperationKind::ClearContainer => "ClearContainer",
            OperationKind::CreateBlurEffect => "CreateBlurEffect",
            OperationKind::UpdateBlurEffect => "UpdateBlurEffect",
            OperationKind::DeleteBlurEffect => "DeleteBlurEffect",
            OperationKind::UpdateWatermark => "UpdateWatermark",
            OperationKind::DescribeScene => "DescribeScene",
            OperationKind::InitPreviewSurface => "InitPreviewSurface",
            OperationKind::DecodeImage => "DecodeImage",
            OperationKind::Sample => "Sample",
            OperationKind::GetPreviewBuffer => "GetPreviewBuffer",
            OperationKind::SwitchHistorySource => "SwitchHistorySource",
            OperationKind::PickColor => "PickColor",
            OperationKind::DescribeSampler => "DescribeSampler",
        }
    }

    pub const fn family(self) -> EngineFamily {
        match self {
            OperationKind::InitPreviewSurface
            | OperationKind::DecodeImage
            | OperationKind::Sample
            | OperationKind::GetPreviewBuffer
            | OperationKind::SwitchHistorySource
            | OperationKind::PickColor
            | OperationKind::DescribeSampler => EngineFamily::ColorSampling,
            _ => EngineFamily::RenderEngine,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}

/// Implemented by every request and response enum that travels through the bridge.
pub trait Operation {
    fn kind(&self) -> OperationKind;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(pub u64);

impl fmt::Display for CallId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{}", self.0)
    }
}

/// Mints monotonically increasing call ids. Ids start at 1.
#[derive(Debug, Default)]
pub struct CallIdAllocator {
    issued: AtomicU64,
}

impl CallIdAllocator {
    pub fn next(&self) -> CallId {
        CallId(self.issued.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }
}

/// Responses are matched on both the operation kind and the call id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallKey {
    pub kind: OperationKind,
    pub call_id: CallId,
}

#[derive(Debug)]
pub struct RequestMessage<Request> {
    pub call_id: CallId,
    pub request: Request,
}

impl<Request: Operation> RequestMessage<Request> {
    pub fn new(call_id: CallId, request: Request) -> Self {
        Self { call_id, request }
    }

    pub fn key(&self) -> CallKey {
        CallKey {
            kind: self.request.kind(),
            call_id: self.call_id,
        }
    }

    pub fn into_parts(self) -> (CallId, Request) {
        (self.call_id, self.request)
    }
}

#[derive(Debug)]
pub struct ResponseMessage<Response> {
    pub call_id: CallId,
    pub response: Response,
}

impl<Response: Operation> ResponseMessage<Response> {
    pub fn new(call_id: CallId, response: Response) -> Self {
        Self { call_id, response }
    }

    pub fn key(&self) -> CallKey {
        CallKey {
            kind: self.response.kind(),
            call_id: self.call_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;

    impl Operation for Ping {
        fn kind(&self) -> OperationKind {
            OperationKind::Render
        }
    }

    #[test]
    fn call_ids_are_unique_and_start_at_one() {
        let allocator = CallIdAllocator::default();
        assert_eq!(allocator.next(), CallId(1));
        assert_eq!(allocator.next(), CallId(2));
        assert_eq!(allocator.issued(), 2);
    }

    #[test]
    fn request_and_response_keys_match_on_kind_and_id() {
        let request = RequestMessage::new(CallId(9), Ping);
        let response = ResponseMessage::new(CallId(9), Ping);
        assert_eq!(request.key(), response.key());

        let other = ResponseMessage::new(CallId(10), Ping);
        assert_ne!(request.key(), other.key());
    }

    #[test]
    fn operation_families_split_render_and_sampling() {
        let sampling = OperationKind::ALL
            .iter()
            .filter(|kind| kind.family() == EngineFamily::ColorSampling)
            .count();
        assert_eq!(sampling, 7);
        assert_eq!(OperationKind::UpdateWatermark.family(), EngineFamily::RenderEngine);
        assert_eq!(OperationKind::PickColor.to_string(), "PickColor");
    }
}
