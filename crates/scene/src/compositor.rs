//! CPU compositor for the scene graph.
//!
//! Sprites are drawn into a layer covering their on-surface bounds (grown by blur padding
//! when a filter is attached), filtered, then blended source-over into the frame with the
//! node alpha and mask coverage applied per pixel.

use bridge_protocol::{PixelBuffer, Rgba};

use crate::graph::{NodeKey, NodeKind, SceneGraph, Sprite};

pub(crate) fn composite(
    graph: &SceneGraph,
    width: u32,
    height: u32,
    background: Rgba,
) -> PixelBuffer {
    let mut frame = match PixelBuffer::filled(width, height, background) {
        Ok(frame) => frame,
        Err(error) => {
            log::warn!("[scene] cannot allocate {width}x{height} frame: {error}");
            return PixelBuffer::empty();
        }
    };
    draw_node(graph, graph.root(), 1.0, &mut frame);
    frame
}

fn draw_node(graph: &SceneGraph, key: NodeKey, parent_alpha: f32, frame: &mut PixelBuffer) {
    let Some(node) = graph.get(key) else {
        return;
    };
    if !node.visible {
        return;
    }
    let alpha = parent_alpha * node.alpha.clamp(0.0, 1.0);
    match &node.kind {
        NodeKind::Container => {
            for child in graph.draw_order(key) {
                draw_node(graph, child, alpha, frame);
            }
        }
        NodeKind::Sprite(sprite) => {
            let mask = node
                .mask
                .and_then(|mask_key| graph.get(mask_key))
                .and_then(|mask_node| mask_node.shape());
            let padding = node.filter.map_or(0, |filter| filter.padding());
            let Some(region) = LayerRegion::for_sprite(sprite, padding, frame) else {
                return;
            };
            let mut layer = region.rasterize(sprite);
            if let Some(filter) = node.filter {
                filter.apply(&mut layer);
            }
            region.blend_into(&layer, frame, alpha, |x, y| {
                mask.is_none_or(|shape| shape.contains(x, y))
            });
        }
        NodeKind::Mask(_) => {}
    }
}

#[derive(Debug, Clone, Copy)]
struct LayerRegion {
    origin_x: u32,
    origin_y: u32,
    width: u32,
    height: u32,
}

impl LayerRegion {
    fn for_sprite(sprite: &Sprite, padding: usize, frame: &PixelBuffer) -> Option<Self> {
        sprite.texture.as_ref()?;
        if !(sprite.width > 0.0 && sprite.height > 0.0) {
            return None;
        }
        let padding = padding as f32;
        let min_x = (sprite.x - padding).floor().max(0.0);
        let min_y = (sprite.y - padding).floor().max(0.0);
        let max_x = (sprite.x + sprite.width + padding).ceil().min(frame.width() as f32);
        let max_y = (sprite.y + sprite.height + padding).ceil().min(frame.height() as f32);
        if min_x >= max_x || min_y >= max_y {
            return None;
        }
        Some(Self {
            origin_x: min_x as u32,
            origin_y: min_y as u32,
            width: (max_x - min_x) as u32,
            height: (max_y - min_y) as u32,
        })
    }

    fn rasterize(&self, sprite: &Sprite) -> PixelBuffer {
        let Ok(mut layer) = PixelBuffer::transparent(self.width, self.height) else {
            return PixelBuffer::empty();
        };
        let Some(texture) = sprite.texture.as_ref() else {
            return layer;
        };
        let texture_width = texture.pixels().width() as f32;
        let texture_height = texture.pixels().height() as f32;
        if texture_width == 0.0 || texture_height == 0.0 {
            return layer;
        }
        for local_y in 0..self.height {
            let center_y = (self.origin_y + local_y) as f32 + 0.5;
            if center_y < sprite.y || center_y >= sprite.y + sprite.height {
                continue;
            }
            for local_x in 0..self.width {
                let center_x = (self.origin_x + local_x) as f32 + 0.5;
                if center_x < sprite.x || center_x >= sprite.x + sprite.width {
                    continue;
                }
                let (texel_x, texel_y) = if sprite.tiling {
                    let resolution = texture.resolution();
                    (
                        ((center_x - sprite.x) * resolution).rem_euclid(texture_width),
                        ((center_y - sprite.y) * resolution).rem_euclid(texture_height),
                    )
                } else {
                    (
                        (center_x - sprite.x) / sprite.width * texture_width,
                        (center_y - sprite.y) / sprite.height * texture_height,
                    )
                };
                let color = texture.texel(texel_x as i64, texel_y as i64);
                layer.set_pixel(local_x, local_y, color);
            }
        }
        layer
    }

    fn blend_into(
        &self,
        layer: &PixelBuffer,
        frame: &mut PixelBuffer,
        alpha: f32,
        covered: impl Fn(f32, f32) -> bool,
    ) {
        if alpha <= 0.0 {
            return;
        }
        for local_y in 0..self.height {
            for local_x in 0..self.width {
                let Some(source) = layer.pixel(local_x, local_y) else {
                    continue;
                };
                if source.a == 0 {
                    continue;
                }
                let x = self.origin_x + local_x;
                let y = self.origin_y + local_y;
                if !covered(x as f32 + 0.5, y as f32 + 0.5) {
                    continue;
                }
                let Some(destination) = frame.pixel(x, y) else {
                    continue;
                };
                frame.set_pixel(x, y, blend_over(destination, source, alpha));
            }
        }
    }
}

/// Straight-alpha source-over.
pub(crate) fn blend_over(destination: Rgba, source: Rgba, alpha: f32) -> Rgba {
    let source_alpha = source.a as f32 / 255.0 * alpha;
    let destination_alpha = destination.a as f32 / 255.0;
    let out_alpha = source_alpha + destination_alpha * (1.0 - source_alpha);
    if out_alpha <= f32::EPSILON {
        return Rgba::TRANSPARENT;
    }
    let channel = |source_channel: u8, destination_channel: u8| {
        let value = (source_channel as f32 * source_alpha
            + destination_channel as f32 * destination_alpha * (1.0 - source_alpha))
            / out_alpha;
        value.round().clamp(0.0, 255.0) as u8
    };
    Rgba::new(
        channel(source.r, destination.r),
        channel(source.g, destination.g),
        channel(source.b, destination.b),
        (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8,
    )
}
