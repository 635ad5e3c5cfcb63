use std::sync::Arc;

use bridge_protocol::{FramePublisher, FrameView, PixelBuffer, frame_mailbox};

/// Drawable end of a preview surface. Created by the displaying context and moved into
/// whichever context owns the sampler.
#[derive(Debug)]
pub struct PreviewCanvas {
    publisher: FramePublisher,
}

/// Displaying end of a preview surface.
#[derive(Debug)]
pub struct PreviewDisplay {
    frames: FrameView,
}

pub fn preview_canvas() -> (PreviewCanvas, PreviewDisplay) {
    let (publisher, frames) = frame_mailbox();
    (PreviewCanvas { publisher }, PreviewDisplay { frames })
}

impl PreviewCanvas {
    pub(crate) fn present(&self, frame: PixelBuffer) -> u64 {
        self.publisher.publish(frame)
    }
}

impl PreviewDisplay {
    pub fn latest_frame(&self) -> Option<Arc<PixelBuffer>> {
        self.frames.latest()
    }

    pub fn frame_sequence(&self) -> u64 {
        self.frames.sequence()
    }

    pub fn is_connected(&self) -> bool {
        self.frames.is_connected()
    }
}

/// Square preview grid bound to a canvas.
#[derive(Debug)]
pub(crate) struct PreviewSurface {
    canvas: PreviewCanvas,
    pixels: PixelBuffer,
}

impl PreviewSurface {
    pub(crate) fn new(canvas: PreviewCanvas, size: u32) -> Self {
        let pixels = PixelBuffer::transparent(size, size).unwrap_or_else(|_| PixelBuffer::empty());
        Self { canvas, pixels }
    }

    pub(crate) fn size(&self) -> u32 {
        self.pixels.width()
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut PixelBuffer {
        &mut self.pixels
    }

    pub(crate) fn present(&self) -> u64 {
        self.canvas.present(self.pixels.clone())
    }
}
