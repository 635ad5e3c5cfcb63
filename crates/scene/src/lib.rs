//! Render engine: a retained software scene graph with containers, sprites, blur effects
//! and a memoized watermark, driven through `SceneState` executors.

mod blur;
mod compositor;
mod display;
mod geometry;
mod graph;
mod message;
mod state;
mod text;
mod texture;
mod watermark;

pub use blur::{BlurFilter, FULL_BLUR_STRENGTH, blur_strength};
pub use display::SurfaceDisplay;
pub use geometry::{Affine, Bounds, Polygon, Shape};
pub use graph::{Node, NodeKey, NodeKind, SceneGraph, Sprite};
pub use message::{SceneRequest, SceneResponse};
pub use state::{
    BlurEffectStats, BlurProps, ContainerStats, InitOptions, RenderedSurface, SceneError,
    SceneServices, SceneState, SceneStats, SurfaceStats,
};
#[cfg(any(test, feature = "test-helpers"))]
pub use text::BlockGlyphRasterizer;
pub use text::{
    FontError, FontRasterizer, MAX_TEXT_PIXEL_SIZE, MAX_TEXT_WIDTH, TextRasterizer, TextStyle,
};
#[cfg(any(test, feature = "test-helpers"))]
pub use texture::MemoryTextureLoader;
pub use texture::{FileTextureLoader, Texture, TextureLoadError, TextureLoader};
pub use watermark::{
    MAX_TEXT_RESOLUTION, WATERMARK_ALPHA_SCALE, WATERMARK_PADDING, WATERMARK_ROTATION_DEGREES,
    WatermarkCounters, WatermarkDiff, WatermarkProps, WatermarkRect, WatermarkState,
    rotate_with_padding,
};

#[cfg(test)]
mod tests;
