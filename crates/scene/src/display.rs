use std::sync::Arc;

use bridge_protocol::{FrameView, PixelBuffer};

/// Presentation handle for a surface. Produced by `init` in whichever context owns the
/// scene and handed to the displaying context exactly once.
#[derive(Debug)]
pub struct SurfaceDisplay {
    frames: FrameView,
    width: u32,
    height: u32,
}

impl SurfaceDisplay {
    pub(crate) fn new(frames: FrameView, width: u32, height: u32) -> Self {
        Self {
            frames,
            width,
            height,
        }
    }

    /// Size the surface had when it was initialized.
    pub fn initial_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn latest_frame(&self) -> Option<Arc<PixelBuffer>> {
        self.frames.latest()
    }

    pub fn frame_sequence(&self) -> u64 {
        self.frames.sequence()
    }

    /// False once the owning scene has disposed its surface.
    pub fn is_connected(&self) -> bool {
        self.frames.is_connected()
    }
}
