//! Render engine request/response pair.
//!
//! Responses carry the executor result as-is, so a failure in the worker context
//! reaches the caller exactly as it would locally.

use bridge_protocol::{
    ContainerKey, ElementId, ImageSource, Operation, OperationKind, PixelBuffer, SurfaceRect,
};

use crate::display::SurfaceDisplay;
use crate::state::{BlurProps, InitOptions, RenderedSurface, SceneError, SceneState, SceneStats};
use crate::watermark::{WatermarkDiff, WatermarkProps};

#[derive(Debug, Clone, PartialEq)]
pub enum SceneRequest {
    Init(InitOptions),
    Dispose,
    CreateContainer {
        key: ContainerKey,
    },
    ResizeSurface {
        width: u32,
        height: u32,
    },
    ClearSurface,
    ExtractPixels {
        rect: SurfaceRect,
    },
    RenderToSurface {
        rect: SurfaceRect,
    },
    Render,
    AddImageToContainer {
        key: ContainerKey,
        source: ImageSource,
    },
    ClearContainer {
        key: ContainerKey,
    },
    CreateBlurEffect {
        container: ContainerKey,
        element: ElementId,
    },
    UpdateBlurEffect {
        element: ElementId,
        props: BlurProps,
        update_filter: bool,
    },
    DeleteBlurEffect {
        element: ElementId,
    },
    UpdateWatermark {
        container: ContainerKey,
        props: WatermarkProps,
        text_resolution: f32,
    },
    DescribeScene,
}

#[derive(Debug)]
pub enum SceneResponse {
    Init(Result<SurfaceDisplay, SceneError>),
    Dispose(Result<(), SceneError>),
    CreateContainer(Result<ContainerKey, SceneError>),
    ResizeSurface(Result<(), SceneError>),
    ClearSurface(Result<(), SceneError>),
    ExtractPixels(Result<PixelBuffer, SceneError>),
    RenderToSurface(Result<RenderedSurface, SceneError>),
    Render(Result<u64, SceneError>),
    AddImageToContainer(Result<(), SceneError>),
    ClearContainer(Result<(), SceneError>),
    CreateBlurEffect(Result<(), SceneError>),
    UpdateBlurEffect(Result<(), SceneError>),
    DeleteBlurEffect(Result<(), SceneError>),
    UpdateWatermark(Result<WatermarkDiff, SceneError>),
    DescribeScene(SceneStats),
}

impl Operation for SceneRequest {
    fn kind(&self) -> OperationKind {
        match self {
            SceneRequest::Init(_) => OperationKind::Init,
            SceneRequest::Dispose => OperationKind::Dispose,
            SceneRequest::CreateContainer { .. } => OperationKind::CreateContainer,
            SceneRequest::ResizeSurface { .. } => OperationKind::ResizeSurface,
            SceneRequest::ClearSurface => OperationKind::ClearSurface,
            SceneRequest::ExtractPixels { .. } => OperationKind::ExtractPixels,
            SceneRequest::RenderToSurface { .. } => OperationKind::RenderToSurface,
            SceneRequest::Render => OperationKind::Render,
            SceneRequest::AddImageToContainer { .. } => OperationKind::AddImageToContainer,
            SceneRequest::ClearContainer { .. } => OperationKind::ClearContainer,
            SceneRequest::CreateBlurEffect { .. } => OperationKind::CreateBlurEffect,
            SceneRequest::UpdateBlurEffect { .. } => OperationKind::UpdateBlurEffect,
            SceneRequest::DeleteBlurEffect { .. } => OperationKind::DeleteBlurEffect,
            SceneRequest::UpdateWatermark { .. } => OperationKind::UpdateWatermark,
            SceneRequest::DescribeScene => OperationKind::DescribeScene,
        }
    }
}

impl Operation for SceneResponse {
    fn kind(&self) -> OperationKind {
        match self {
            SceneResponse::Init(_) => OperationKind::Init,
            SceneResponse::Dispose(_) => OperationKind::Dispose,
            SceneResponse::CreateContainer(_) => OperationKind::CreateContainer,
            SceneResponse::ResizeSurface(_) => OperationKind::ResizeSurface,
            SceneResponse::ClearSurface(_) => OperationKind::ClearSurface,
            SceneResponse::ExtractPixels(_) => OperationKind::ExtractPixels,
            SceneResponse::RenderToSurface(_) => OperationKind::RenderToSurface,
            SceneResponse::Render(_) => OperationKind::Render,
            SceneResponse::AddImageToContainer(_) => OperationKind::AddImageToContainer,
            SceneResponse::ClearContainer(_) => OperationKind::ClearContainer,
            SceneResponse::CreateBlurEffect(_) => OperationKind::CreateBlurEffect,
            SceneResponse::UpdateBlurEffect(_) => OperationKind::UpdateBlurEffect,
            SceneResponse::DeleteBlurEffect(_) => OperationKind::DeleteBlurEffect,
            SceneResponse::UpdateWatermark(_) => OperationKind::UpdateWatermark,
            SceneResponse::DescribeScene(_) => OperationKind::DescribeScene,
        }
    }
}

impl SceneState {
    /// Runs the executor matching `request`.
    pub fn handle(&mut self, request: SceneRequest) -> SceneResponse {
        match request {
            SceneRequest::Init(options) => SceneResponse::Init(self.init(options)),
            SceneRequest::Dispose => SceneResponse::Dispose(self.dispose()),
            SceneRequest::CreateContainer { key } => {
                SceneResponse::CreateContainer(self.create_container(key))
            }
            SceneRequest::ResizeSurface { width, height } => {
                SceneResponse::ResizeSurface(self.resize(width, height))
            }
            SceneRequest::ClearSurface => SceneResponse::ClearSurface(self.clear()),
            SceneRequest::ExtractPixels { rect } => {
                SceneResponse::ExtractPixels(self.extract_pixels(rect))
            }
            SceneRequest::RenderToSurface { rect } => {
                SceneResponse::RenderToSurface(self.render_to_surface(rect))
            }
            SceneRequest::Render => SceneResponse::Render(self.render()),
            SceneRequest::AddImageToContainer { key, source } => {
                SceneResponse::AddImageToContainer(self.add_image_to_container(&key, &source))
            }
            SceneRequest::ClearContainer { key } => {
                SceneResponse::ClearContainer(self.clear_container(&key))
            }
            SceneRequest::CreateBlurEffect { container, element } => {
                SceneResponse::CreateBlurEffect(self.create_blur_effect(&container, element))
            }
            SceneRequest::UpdateBlurEffect {
                element,
                props,
                update_filter,
            } => SceneResponse::UpdateBlurEffect(self.update_blur_effect(
                &element,
                props,
                update_filter,
            )),
            SceneRequest::DeleteBlurEffect { element } => {
                SceneResponse::DeleteBlurEffect(self.delete_blur_effect(&element))
            }
            SceneRequest::UpdateWatermark {
                container,
                props,
                text_resolution,
            } => SceneResponse::UpdateWatermark(self.update_watermark(
                &container,
                props,
                text_resolution,
            )),
            SceneRequest::DescribeScene => SceneResponse::DescribeScene(self.describe()),
        }
    }
}
