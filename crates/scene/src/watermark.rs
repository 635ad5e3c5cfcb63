//! Watermark sprite with dirty-diff memoization.
//!
//! Each context remembers the last applied `WatermarkProps`. An update only redoes the
//! work whose inputs changed: the text texture (text, font size, color), the sprite alpha
//! (opacity) and the sprite/mask geometry (rect, corner radius) are decided independently.

use std::sync::Arc;

use bridge_protocol::{PixelBuffer, Rgba};

use crate::geometry::Shape;
use crate::graph::{NodeKey, NodeKind, SceneGraph, Sprite};
use crate::text::{TextRasterizer, TextStyle};
use crate::texture::Texture;

pub const WATERMARK_ROTATION_DEGREES: f32 = 45.0;
pub const WATERMARK_PADDING: u32 = 40;
pub const WATERMARK_ALPHA_SCALE: f32 = 0.24;
/// Text resolutions above this are rendered at this density.
pub const MAX_TEXT_RESOLUTION: f32 = 8.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WatermarkRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkProps {
    pub text: String,
    pub font_size: f32,
    pub color: Rgba,
    /// 0..=100.
    pub opacity: f32,
    pub rect: WatermarkRect,
    pub radius: f32,
    pub visible: bool,
}

impl Default for WatermarkProps {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_size: 0.0,
            color: Rgba::TRANSPARENT,
            opacity: 0.0,
            rect: WatermarkRect::default(),
            radius: 0.0,
            visible: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatermarkDiff {
    pub regenerate_texture: bool,
    pub update_alpha: bool,
    pub update_geometry: bool,
}

impl WatermarkDiff {
    pub fn between(last: &WatermarkProps, next: &WatermarkProps) -> Self {
        Self {
            regenerate_texture: last.text != next.text
                || last.font_size != next.font_size
                || last.color != next.color,
            update_alpha: last.opacity != next.opacity,
            update_geometry: last.rect != next.rect || last.radius != next.radius,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatermarkCounters {
    pub texture_regenerations: u64,
    pub alpha_updates: u64,
    pub geometry_updates: u64,
}

#[derive(Debug, Clone, Copy)]
struct WatermarkNodes {
    container: NodeKey,
    sprite: NodeKey,
    mask: NodeKey,
}

#[derive(Debug, Default)]
pub struct WatermarkState {
    nodes: Option<WatermarkNodes>,
    last: WatermarkProps,
    counters: WatermarkCounters,
}

impl WatermarkState {
    pub fn counters(&self) -> WatermarkCounters {
        self.counters
    }

    pub fn last_props(&self) -> &WatermarkProps {
        &self.last
    }

    pub fn sprite(&self) -> Option<NodeKey> {
        self.nodes.map(|nodes| nodes.sprite)
    }

    /// Forgets nodes and memo; counters are cumulative for the state's lifetime.
    pub(crate) fn reset(&mut self) {
        self.nodes = None;
        self.last = WatermarkProps::default();
    }

    pub(crate) fn update(
        &mut self,
        graph: &mut SceneGraph,
        container: NodeKey,
        props: WatermarkProps,
        text_resolution: f32,
        rasterizer: &dyn TextRasterizer,
    ) -> WatermarkDiff {
        if let Some(node) = graph.get_mut(container) {
            node.visible = props.visible;
        }

        let nodes = self.ensure_nodes(graph, container);
        let diff = WatermarkDiff::between(&self.last, &props);

        if diff.regenerate_texture {
            let texture = build_text_texture(rasterizer, &props, text_resolution);
            let sprite = graph.get_mut(nodes.sprite).and_then(|node| node.sprite_mut());
            if let Some(sprite) = sprite {
                sprite.texture = Some(Arc::new(texture));
            }
            self.counters.texture_regenerations += 1;
        }

        if diff.update_alpha {
            if let Some(node) = graph.get_mut(nodes.sprite) {
                node.alpha = (props.opacity / 100.0 * WATERMARK_ALPHA_SCALE).clamp(0.0, 1.0);
            }
            self.counters.alpha_updates += 1;
        }

        if diff.update_geometry {
            let rect = props.rect;
            let sprite = graph.get_mut(nodes.sprite).and_then(|node| node.sprite_mut());
            if let Some(sprite) = sprite {
                sprite.x = rect.x;
                sprite.y = rect.y;
                sprite.width = rect.width;
                sprite.height = rect.height;
            }
            if let Some(shape) = graph.get_mut(nodes.mask).and_then(|node| node.shape_mut()) {
                shape
                    .clear()
                    .round_rect(rect.x, rect.y, rect.width, rect.height, props.radius)
                    .fill();
            }
            self.counters.geometry_updates += 1;
        }

        self.last = props;
        diff
    }

    /// Returns live nodes under `container`, creating them when missing. Creation forces
    /// the alpha and geometry branches of the next diff, and the texture branch for any
    /// non-empty text.
    fn ensure_nodes(&mut self, graph: &mut SceneGraph, container: NodeKey) -> WatermarkNodes {
        if let Some(nodes) = self.nodes {
            let sprite_alive = graph
                .get(nodes.sprite)
                .is_some_and(|node| node.parent() == Some(container));
            if nodes.container == container && sprite_alive && graph.contains(nodes.mask) {
                return nodes;
            }
            graph.destroy(nodes.sprite);
            graph.destroy(nodes.mask);
        }

        let sprite = graph.insert(NodeKind::Sprite(Sprite::tiling()));
        let mask = graph.insert(NodeKind::Mask(Shape::new()));
        graph.add_child(container, sprite);
        graph.add_child(container, mask);
        if let Some(node) = graph.get_mut(sprite) {
            node.mask = Some(mask);
        }
        let nodes = WatermarkNodes {
            container,
            sprite,
            mask,
        };
        self.nodes = Some(nodes);
        self.last.text = String::new();
        self.last.opacity = -1.0;
        // NaN never compares equal, so fresh nodes always get their size and mask.
        self.last.radius = f32::NAN;
        log::debug!("[scene] watermark sprite created");
        nodes
    }
}

fn build_text_texture(
    rasterizer: &dyn TextRasterizer,
    props: &WatermarkProps,
    resolution: f32,
) -> Texture {
    let resolution = if resolution.is_finite() && resolution > 0.0 {
        resolution.min(MAX_TEXT_RESOLUTION)
    } else {
        1.0
    };
    let style = TextStyle {
        font_size: props.font_size,
        color: props.color,
        resolution,
    };
    let line = rasterizer.rasterize(&props.text, &style);
    let padding = (WATERMARK_PADDING as f32 * resolution).round() as u32;
    let rotated = rotate_with_padding(&line, WATERMARK_ROTATION_DEGREES, padding);
    Texture::new(rotated, "watermark").with_resolution(resolution)
}

/// Rotates `source` about its center into a canvas sized to the rotated bounding box plus
/// `padding` on every side. Positive angles turn clockwise on screen.
pub fn rotate_with_padding(source: &PixelBuffer, degrees: f32, padding: u32) -> PixelBuffer {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let source_width = source.width() as f32;
    let source_height = source.height() as f32;
    let rotated_width = (source_width * cos.abs() + source_height * sin.abs()).ceil() as u32;
    let rotated_height = (source_width * sin.abs() + source_height * cos.abs()).ceil() as u32;
    let width = rotated_width + 2 * padding;
    let height = rotated_height + 2 * padding;
    let Ok(mut target) = PixelBuffer::transparent(width, height) else {
        return PixelBuffer::empty();
    };

    let center_x = width as f32 / 2.0;
    let center_y = height as f32 / 2.0;
    for y in 0..height {
        for x in 0..width {
            let relative_x = x as f32 + 0.5 - center_x;
            let relative_y = y as f32 + 0.5 - center_y;
            // Inverse rotation back into source space.
            let source_x = relative_x * cos + relative_y * sin + source_width / 2.0;
            let source_y = -relative_x * sin + relative_y * cos + source_height / 2.0;
            if source_x < 0.0 || source_y < 0.0 {
                continue;
            }
            if let Some(color) = source.pixel(source_x as u32, source_y as u32) {
                target.set_pixel(x, y, color);
            }
        }
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::BlockGlyphRasterizer;

    fn props(text: &str, opacity: f32, rect: WatermarkRect) -> WatermarkProps {
        WatermarkProps {
            text: text.to_owned(),
            font_size: 16.0,
            color: Rgba::opaque(200, 0, 0),
            opacity,
            rect,
            radius: 4.0,
            visible: true,
        }
    }

    fn rect(width: f32) -> WatermarkRect {
        WatermarkRect {
            x: 10.0,
            y: 10.0,
            width,
            height: 80.0,
        }
    }

    fn apply(
        state: &mut WatermarkState,
        graph: &mut SceneGraph,
        container: NodeKey,
        props: WatermarkProps,
    ) -> WatermarkDiff {
        state.update(graph, container, props, 1.0, &BlockGlyphRasterizer)
    }

    fn setup() -> (SceneGraph, NodeKey, WatermarkState) {
        let mut graph = SceneGraph::new();
        let container = graph.insert(NodeKind::Container);
        graph.add_child(graph.root(), container);
        (graph, container, WatermarkState::default())
    }

    #[test]
    fn diff_is_per_branch() {
        let base = props("draft", 50.0, rect(100.0));
        assert_eq!(WatermarkDiff::between(&base, &base), WatermarkDiff::default());

        let opacity_only = props("draft", 60.0, rect(100.0));
        assert_eq!(
            WatermarkDiff::between(&base, &opacity_only),
            WatermarkDiff {
                update_alpha: true,
                ..WatermarkDiff::default()
            }
        );

        let mut radius_only = base.clone();
        radius_only.radius = 12.0;
        assert!(WatermarkDiff::between(&base, &radius_only).update_geometry);

        let mut color_only = base.clone();
        color_only.color = Rgba::WHITE;
        assert!(WatermarkDiff::between(&base, &color_only).regenerate_texture);
    }

    #[test]
    fn creation_resets_memo_text_and_opacity() {
        let (mut graph, container, mut state) = setup();
        let hidden = WatermarkProps::default();
        let diff = apply(&mut state, &mut graph, container, hidden);
        // Opacity 0 still differs from the forced -1; empty text matches the forced "".
        assert!(!diff.regenerate_texture);
        assert!(diff.update_alpha);
        assert!(diff.update_geometry);
        assert_eq!(graph.get(container).map(|node| node.visible), Some(false));
    }

    #[test]
    fn opacity_change_skips_texture_regeneration() {
        let (mut graph, container, mut state) = setup();
        apply(&mut state, &mut graph, container, props("draft", 50.0, rect(100.0)));
        apply(&mut state, &mut graph, container, props("draft", 75.0, rect(100.0)));

        let counters = state.counters();
        assert_eq!(counters.texture_regenerations, 1);
        assert_eq!(counters.alpha_updates, 2);
        assert_eq!(counters.geometry_updates, 1);

        let sprite = state.sprite().expect("sprite created");
        let alpha = graph.get(sprite).map(|node| node.alpha).expect("sprite alive");
        assert!((alpha - 0.75 * WATERMARK_ALPHA_SCALE).abs() < 1e-6);
    }

    #[test]
    fn rect_change_only_updates_geometry() {
        let (mut graph, container, mut state) = setup();
        apply(&mut state, &mut graph, container, props("draft", 50.0, rect(100.0)));
        let diff = apply(&mut state, &mut graph, container, props("draft", 50.0, rect(140.0)));
        assert_eq!(
            diff,
            WatermarkDiff {
                update_geometry: true,
                ..WatermarkDiff::default()
            }
        );
        let sprite = state.sprite().expect("sprite created");
        let width = graph
            .get(sprite)
            .and_then(|node| node.sprite())
            .map(|sprite| sprite.width);
        assert_eq!(width, Some(140.0));
    }

    #[test]
    fn text_change_regenerates_without_touching_alpha_or_geometry() {
        let (mut graph, container, mut state) = setup();
        apply(&mut state, &mut graph, container, props("draft", 50.0, rect(100.0)));
        let diff = apply(&mut state, &mut graph, container, props("final", 50.0, rect(100.0)));
        assert_eq!(
            diff,
            WatermarkDiff {
                regenerate_texture: true,
                ..WatermarkDiff::default()
            }
        );
        assert_eq!(state.counters().texture_regenerations, 2);
    }

    #[test]
    fn destroyed_sprite_is_recreated() {
        let (mut graph, container, mut state) = setup();
        apply(&mut state, &mut graph, container, props("draft", 50.0, rect(100.0)));
        graph.remove_children(container);
        let diff = apply(&mut state, &mut graph, container, props("draft", 50.0, rect(100.0)));
        assert!(diff.regenerate_texture);
        assert!(diff.update_alpha);
        assert!(diff.update_geometry);
        let sprite = state.sprite().expect("sprite recreated");
        let size = graph
            .get(sprite)
            .and_then(|node| node.sprite())
            .map(|sprite| (sprite.width, sprite.height));
        assert_eq!(size, Some((100.0, 80.0)));
        assert_eq!(state.counters().geometry_updates, 2);
    }

    #[test]
    fn oversized_text_requests_stay_bounded() {
        let huge = WatermarkProps {
            font_size: 1e5,
            ..props("draft", 50.0, rect(100.0))
        };
        let texture = build_text_texture(&BlockGlyphRasterizer, &huge, 1e4);
        assert_eq!(texture.resolution(), MAX_TEXT_RESOLUTION);
        // 512px em: a 1280x640 line, rotated to 1358 square plus 2 * 320 padding.
        assert_eq!(texture.pixels().width(), 1998);
        assert_eq!(texture.pixels().height(), 1998);
    }

    #[test]
    fn rotation_grows_canvas_to_rotated_bounds_plus_padding() {
        let line = PixelBuffer::filled(100, 20, Rgba::WHITE).expect("valid buffer");
        let rotated = rotate_with_padding(&line, 45.0, 10);
        // (100 + 20) * cos(45deg) = 84.85 -> 85, plus 2 * 10 padding.
        assert_eq!(rotated.width(), 105);
        assert_eq!(rotated.height(), 105);
        let center = rotated.pixel(52, 52).expect("in bounds");
        assert_eq!(center, Rgba::WHITE);
        assert_eq!(rotated.pixel(0, 0).map(|pixel| pixel.a), Some(0));
    }
}
