//! Render engine state and its executors.
//!
//! One `SceneState` exists per execution context. Executors are plain `&mut self`
//! methods so the caller-side dispatcher and the worker router drive the same code.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bridge_protocol::{
    ContainerKey, ElementId, FramePublisher, ImageSource, PixelBuffer, Rgba, SurfaceRect,
    TransferError, Transferable, frame_mailbox,
};
use thiserror::Error;

use crate::blur::{BlurFilter, blur_strength};
use crate::compositor::composite;
use crate::display::SurfaceDisplay;
use crate::geometry::Shape;
use crate::graph::{NodeKey, NodeKind, SceneGraph, Sprite};
use crate::text::{FontError, FontRasterizer, TextRasterizer};
use crate::texture::{FileTextureLoader, Texture, TextureLoadError, TextureLoader};
use crate::watermark::{WatermarkCounters, WatermarkDiff, WatermarkProps, WatermarkState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("surface is not initialized")]
    NotInitialized,
    #[error("unknown container `{0}`")]
    UnknownContainer(ContainerKey),
    #[error("no image texture has been loaded")]
    NoActiveTexture,
    #[error("unknown blur effect element `{0}`")]
    UnknownElement(ElementId),
    #[error("invalid surface size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error(transparent)]
    TextureLoad(#[from] TextureLoadError),
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

/// Collaborators a scene resolves in its own context.
#[derive(Clone)]
pub struct SceneServices {
    pub textures: Arc<dyn TextureLoader>,
    pub text: Arc<dyn TextRasterizer>,
}

impl Default for SceneServices {
    fn default() -> Self {
        Self {
            textures: Arc::new(FileTextureLoader),
            text: Arc::new(FontRasterizer::default()),
        }
    }
}

impl SceneServices {
    /// Renders watermark text with the given TrueType or OpenType font.
    pub fn with_font_bytes(mut self, bytes: Vec<u8>) -> Result<Self, FontError> {
        self.text = Arc::new(FontRasterizer::from_bytes(bytes)?);
        Ok(self)
    }
}

impl fmt::Debug for SceneServices {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("SceneServices").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitOptions {
    pub width: u32,
    pub height: u32,
    /// Reported back through `describe`; frames are composited at `width x height`.
    pub resolution: f32,
    pub background: Rgba,
    /// Accepted for call-site compatibility; the software compositor does not antialias.
    pub antialias: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            resolution: 1.0,
            background: Rgba::TRANSPARENT,
            antialias: false,
        }
    }
}

/// Mask and opacity parameters of a blur effect. `angle` is in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BlurProps {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub angle: f32,
    pub zoom: f32,
    /// 0..=100.
    pub opacity: f32,
    /// 0..=100.
    pub blur: f32,
    pub eraser_alpha: Option<f32>,
}

/// A clipped render of the scene. `rect` is the part of the request inside the surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSurface {
    pub rect: SurfaceRect,
    pub pixels: PixelBuffer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceStats {
    pub width: u32,
    pub height: u32,
    pub resolution: f32,
    pub node_count: usize,
    pub frames_rendered: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStats {
    pub key: ContainerKey,
    pub z_index: i32,
    pub children: usize,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlurEffectStats {
    pub element: ElementId,
    pub alpha: f32,
    pub strength: f32,
}

/// Snapshot of a scene, comparable across contexts.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneStats {
    pub surface: Option<SurfaceStats>,
    pub containers: Vec<ContainerStats>,
    pub blur_effects: Vec<BlurEffectStats>,
    pub active_texture: Option<String>,
    pub watermark: WatermarkCounters,
}

#[derive(Debug)]
struct Surface {
    graph: SceneGraph,
    width: u32,
    height: u32,
    resolution: f32,
    background: Rgba,
    publisher: FramePublisher,
    frames_rendered: u64,
}

#[derive(Debug, Clone, Copy)]
struct BlurEffect {
    sprite: NodeKey,
}

#[derive(Debug, Default)]
pub struct SceneState {
    services: SceneServices,
    surface: Option<Surface>,
    containers: HashMap<ContainerKey, NodeKey>,
    active_texture: Option<Arc<Texture>>,
    blur_effects: HashMap<ElementId, BlurEffect>,
    watermark: WatermarkState,
    display: Transferable<SurfaceDisplay>,
}

fn valid_size(width: u32, height: u32) -> Result<(), SceneError> {
    if width == 0 || height == 0 {
        return Err(SceneError::InvalidSize { width, height });
    }
    Ok(())
}

impl SceneState {
    pub fn new(services: SceneServices) -> Self {
        Self {
            services,
            ..Self::default()
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.surface.is_some()
    }

    pub fn watermark(&self) -> &WatermarkState {
        &self.watermark
    }

    /// Builds the surface and hands out its display. Re-initializing disposes the
    /// previous surface first.
    pub fn init(&mut self, options: InitOptions) -> Result<SurfaceDisplay, SceneError> {
        valid_size(options.width, options.height)?;
        if self.surface.is_some() {
            self.dispose()?;
        }
        let (publisher, frames) = frame_mailbox();
        self.surface = Some(Surface {
            graph: SceneGraph::new(),
            width: options.width,
            height: options.height,
            resolution: options.resolution,
            background: options.background,
            publisher,
            frames_rendered: 0,
        });
        self.display = Transferable::new(SurfaceDisplay::new(frames, options.width, options.height));
        log::debug!("[scene] surface {}x{} initialized", options.width, options.height);
        self.take_display()
    }

    /// Moves the display handle out. Fails once it has been handed over.
    pub fn take_display(&mut self) -> Result<SurfaceDisplay, SceneError> {
        Ok(self.display.transfer()?)
    }

    pub fn dispose(&mut self) -> Result<(), SceneError> {
        let surface = self.surface.take().ok_or(SceneError::NotInitialized)?;
        surface.publisher.clear();
        self.containers.clear();
        self.blur_effects.clear();
        self.active_texture = None;
        self.watermark.reset();
        self.display = Transferable::detached();
        log::debug!(
            "[scene] surface disposed after {} frames",
            surface.frames_rendered
        );
        Ok(())
    }

    /// Registers a sortable container under the root. A container already registered
    /// under `key` is detached and destroyed first.
    pub fn create_container(&mut self, key: ContainerKey) -> Result<ContainerKey, SceneError> {
        let surface = self.surface.as_mut().ok_or(SceneError::NotInitialized)?;
        let z_index = i32::try_from(self.containers.len() + 1).unwrap_or(i32::MAX);
        if let Some(previous) = self.containers.remove(&key) {
            log::warn!("[scene] container `{key}` recreated; destroying previous node");
            surface.graph.destroy(previous);
        }
        let container = surface.graph.insert(NodeKind::Container);
        if let Some(node) = surface.graph.get_mut(container) {
            node.z_index = z_index;
            node.sortable_children = true;
        }
        let root = surface.graph.root();
        surface.graph.add_child(root, container);
        self.containers.insert(key.clone(), container);
        self.prune_blur_effects();
        Ok(key)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), SceneError> {
        let surface = self.surface.as_mut().ok_or(SceneError::NotInitialized)?;
        valid_size(width, height)?;
        surface.width = width;
        surface.height = height;
        Ok(())
    }

    /// Empties the root, the container registry, blur effects and watermark nodes, then
    /// renders once.
    pub fn clear(&mut self) -> Result<(), SceneError> {
        let surface = self.surface.as_mut().ok_or(SceneError::NotInitialized)?;
        let root = surface.graph.root();
        surface.graph.remove_children(root);
        self.containers.clear();
        self.blur_effects.clear();
        self.watermark.reset();
        self.render()?;
        Ok(())
    }

    pub fn extract_pixels(&self, rect: SurfaceRect) -> Result<PixelBuffer, SceneError> {
        let surface = self.surface.as_ref().ok_or(SceneError::NotInitialized)?;
        Ok(surface.composite().crop(rect))
    }

    pub fn render_to_surface(&self, rect: SurfaceRect) -> Result<RenderedSurface, SceneError> {
        let surface = self.surface.as_ref().ok_or(SceneError::NotInitialized)?;
        let clipped = rect
            .clamp_to(surface.width, surface.height)
            .unwrap_or(SurfaceRect::new(0, 0, 0, 0));
        Ok(RenderedSurface {
            rect: clipped,
            pixels: surface.composite().crop(rect),
        })
    }

    /// Composites one frame and publishes it to the display. Returns the frame sequence.
    pub fn render(&mut self) -> Result<u64, SceneError> {
        let surface = self.surface.as_mut().ok_or(SceneError::NotInitialized)?;
        let frame = surface.composite();
        surface.frames_rendered += 1;
        Ok(surface.publisher.publish(frame))
    }

    pub fn add_image_to_container(
        &mut self,
        key: &ContainerKey,
        source: &ImageSource,
    ) -> Result<(), SceneError> {
        let surface = self.surface.as_mut().ok_or(SceneError::NotInitialized)?;
        let container = *self
            .containers
            .get(key)
            .ok_or_else(|| SceneError::UnknownContainer(key.clone()))?;
        let texture = Arc::new(self.services.textures.load(source)?);
        let sprite = surface
            .graph
            .insert(NodeKind::Sprite(Sprite::from_texture(texture.clone())));
        surface.graph.add_child(container, sprite);
        log::debug!("[scene] image `{source}` added to `{key}`");
        self.active_texture = Some(texture);
        Ok(())
    }

    /// Removes every child of the container; the registry entry stays.
    pub fn clear_container(&mut self, key: &ContainerKey) -> Result<(), SceneError> {
        let surface = self.surface.as_mut().ok_or(SceneError::NotInitialized)?;
        let container = *self
            .containers
            .get(key)
            .ok_or_else(|| SceneError::UnknownContainer(key.clone()))?;
        surface.graph.remove_children(container);
        self.prune_blur_effects();
        Ok(())
    }

    /// Adds a sprite of the active texture with a blur filter and an empty mask. Nothing
    /// shows until the first `update_blur_effect` draws the mask.
    pub fn create_blur_effect(
        &mut self,
        container_key: &ContainerKey,
        element: ElementId,
    ) -> Result<(), SceneError> {
        let surface = self.surface.as_mut().ok_or(SceneError::NotInitialized)?;
        let container = *self
            .containers
            .get(container_key)
            .ok_or_else(|| SceneError::UnknownContainer(container_key.clone()))?;
        let texture = self
            .active_texture
            .clone()
            .ok_or(SceneError::NoActiveTexture)?;

        if let Some(previous) = self.blur_effects.remove(&element) {
            surface.graph.destroy(previous.sprite);
        }
        let sprite = surface
            .graph
            .insert(NodeKind::Sprite(Sprite::from_texture(texture)));
        let mask = surface.graph.insert(NodeKind::Mask(Shape::new()));
        surface.graph.add_child(container, sprite);
        surface.graph.add_child(container, mask);
        if let Some(node) = surface.graph.get_mut(sprite) {
            node.filter = Some(BlurFilter::new(0.0));
            node.mask = Some(mask);
        }
        self.blur_effects.insert(element, BlurEffect { sprite });
        Ok(())
    }

    pub fn update_blur_effect(
        &mut self,
        element: &ElementId,
        props: BlurProps,
        update_filter: bool,
    ) -> Result<(), SceneError> {
        let surface = self.surface.as_mut().ok_or(SceneError::NotInitialized)?;
        let effect = *self
            .blur_effects
            .get(element)
            .ok_or_else(|| SceneError::UnknownElement(element.clone()))?;
        let mask = surface
            .graph
            .get(effect.sprite)
            .and_then(|node| node.mask)
            .ok_or_else(|| SceneError::UnknownElement(element.clone()))?;

        if let Some(shape) = surface.graph.get_mut(mask).and_then(|node| node.shape_mut()) {
            shape
                .clear()
                .rotate(props.angle)
                .translate(props.x + props.width / 2.0, props.y + props.height / 2.0)
                .scale(props.zoom)
                .rect(
                    -props.width / 2.0,
                    -props.height / 2.0,
                    props.width,
                    props.height,
                )
                .fill();
        }
        if let Some(node) = surface.graph.get_mut(effect.sprite) {
            node.alpha = props.eraser_alpha.unwrap_or(props.opacity / 100.0);
            if update_filter {
                let filter = node.filter.get_or_insert(BlurFilter::new(0.0));
                filter.set_strength(blur_strength(props.blur));
            }
        }
        Ok(())
    }

    pub fn delete_blur_effect(&mut self, element: &ElementId) -> Result<(), SceneError> {
        let surface = self.surface.as_mut().ok_or(SceneError::NotInitialized)?;
        let effect = self
            .blur_effects
            .remove(element)
            .ok_or_else(|| SceneError::UnknownElement(element.clone()))?;
        surface.graph.destroy(effect.sprite);
        Ok(())
    }

    /// Applies watermark props against the props this context last applied, then
    /// renders once. Returns which branches ran.
    pub fn update_watermark(
        &mut self,
        container_key: &ContainerKey,
        props: WatermarkProps,
        text_resolution: f32,
    ) -> Result<WatermarkDiff, SceneError> {
        let surface = self.surface.as_mut().ok_or(SceneError::NotInitialized)?;
        let container = *self
            .containers
            .get(container_key)
            .ok_or_else(|| SceneError::UnknownContainer(container_key.clone()))?;
        let diff = self.watermark.update(
            &mut surface.graph,
            container,
            props,
            text_resolution,
            self.services.text.as_ref(),
        );
        self.render()?;
        Ok(diff)
    }

    pub fn describe(&self) -> SceneStats {
        let Some(surface) = self.surface.as_ref() else {
            return SceneStats {
                surface: None,
                containers: Vec::new(),
                blur_effects: Vec::new(),
                active_texture: None,
                watermark: self.watermark.counters(),
            };
        };

        let mut containers: Vec<ContainerStats> = self
            .containers
            .iter()
            .filter_map(|(key, node_key)| {
                let node = surface.graph.get(*node_key)?;
                Some(ContainerStats {
                    key: key.clone(),
                    z_index: node.z_index,
                    children: node.children().len(),
                    visible: node.visible,
                })
            })
            .collect();
        containers.sort_by(|left, right| left.key.as_str().cmp(right.key.as_str()));

        let mut blur_effects: Vec<BlurEffectStats> = self
            .blur_effects
            .iter()
            .filter_map(|(element, effect)| {
                let node = surface.graph.get(effect.sprite)?;
                Some(BlurEffectStats {
                    element: element.clone(),
                    alpha: node.alpha,
                    strength: node.filter.map_or(0.0, |filter| filter.strength()),
                })
            })
            .collect();
        blur_effects.sort_by(|left, right| left.element.as_str().cmp(right.element.as_str()));

        SceneStats {
            surface: Some(SurfaceStats {
                width: surface.width,
                height: surface.height,
                resolution: surface.resolution,
                node_count: surface.graph.node_count(),
                frames_rendered: surface.frames_rendered,
            }),
            containers,
            blur_effects,
            active_texture: self
                .active_texture
                .as_ref()
                .map(|texture| texture.label().to_owned()),
            watermark: self.watermark.counters(),
        }
    }

    /// Drops registry entries whose sprite went away with a destroyed container.
    fn prune_blur_effects(&mut self) {
        let Some(surface) = self.surface.as_ref() else {
            self.blur_effects.clear();
            return;
        };
        self.blur_effects
            .retain(|_, effect| surface.graph.contains(effect.sprite));
    }
}

impl Surface {
    fn composite(&self) -> PixelBuffer {
        composite(&self.graph, self.width, self.height, self.background)
    }
}
