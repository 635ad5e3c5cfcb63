use std::sync::Arc;

use bridge_protocol::{
    ContainerKey, ElementId, ImageSource, PixelBuffer, Rgba, SurfaceRect, TransferError,
};

use super::*;

const PHOTO: &str = "mem://photo";
const RED: Rgba = Rgba::opaque(255, 0, 0);

fn scene_with_photo() -> SceneState {
    let photo = PixelBuffer::filled(4, 4, RED).expect("valid buffer");
    let services = SceneServices {
        textures: Arc::new(MemoryTextureLoader::new().with_texture(PHOTO, photo)),
        ..SceneServices::default()
    };
    SceneState::new(services)
}

fn init_small(state: &mut SceneState) -> SurfaceDisplay {
    state
        .init(InitOptions {
            width: 8,
            height: 8,
            background: Rgba::WHITE,
            ..InitOptions::default()
        })
        .expect("init")
}

fn layer() -> ContainerKey {
    ContainerKey::from("layer1")
}

#[test]
fn display_is_handed_out_once_and_shows_rendered_frames() {
    let mut state = scene_with_photo();
    let display = init_small(&mut state);
    assert_eq!(display.initial_size(), (8, 8));
    assert!(display.latest_frame().is_none());

    assert_eq!(
        state.take_display().err(),
        Some(SceneError::Transfer(TransferError::Detached))
    );

    assert_eq!(state.render(), Ok(1));
    let frame = display.latest_frame().expect("frame published");
    assert_eq!(frame.pixel(3, 3), Some(Rgba::WHITE));
    assert_eq!(display.frame_sequence(), 1);
}

#[test]
fn missing_state_is_reported_without_touching_state() {
    let mut state = scene_with_photo();
    assert_eq!(state.create_container(layer()), Err(SceneError::NotInitialized));
    assert_eq!(state.dispose(), Err(SceneError::NotInitialized));
    assert_eq!(
        state.extract_pixels(SurfaceRect::new(0, 0, 1, 1)),
        Err(SceneError::NotInitialized)
    );

    let _display = init_small(&mut state);
    let before = state.describe();
    assert_eq!(
        state.add_image_to_container(&layer(), &ImageSource::new(PHOTO)),
        Err(SceneError::UnknownContainer(layer()))
    );
    state.create_container(layer()).expect("container");
    assert_eq!(
        state.create_blur_effect(&layer(), ElementId::from("e1")),
        Err(SceneError::NoActiveTexture)
    );
    assert_eq!(
        state.update_blur_effect(&ElementId::from("e1"), BlurProps::default(), true),
        Err(SceneError::UnknownElement(ElementId::from("e1")))
    );
    assert_eq!(before.containers.len(), 0);
    assert!(state.describe().blur_effects.is_empty());
}

#[test]
fn duplicate_container_key_replaces_previous_node() {
    let mut state = scene_with_photo();
    let _display = init_small(&mut state);
    assert_eq!(state.create_container(layer()), Ok(layer()));
    state
        .add_image_to_container(&layer(), &ImageSource::new(PHOTO))
        .expect("image");
    assert_eq!(state.create_container(layer()), Ok(layer()));

    let stats = state.describe();
    assert_eq!(stats.containers.len(), 1);
    assert_eq!(stats.containers[0].key, layer());
    assert_eq!(stats.containers[0].children, 0);
    // Root plus the surviving container.
    assert_eq!(stats.surface.map(|surface| surface.node_count), Some(2));
}

#[test]
fn containers_stack_in_creation_order() {
    let mut state = scene_with_photo();
    let _display = init_small(&mut state);
    for key in ["a", "b", "c"] {
        state.create_container(ContainerKey::from(key)).expect("container");
    }
    let z_indices: Vec<i32> = state
        .describe()
        .containers
        .iter()
        .map(|container| container.z_index)
        .collect();
    assert_eq!(z_indices, vec![1, 2, 3]);
}

#[test]
fn added_image_becomes_active_texture_and_renders() {
    let mut state = scene_with_photo();
    let _display = init_small(&mut state);
    state.create_container(layer()).expect("container");
    state
        .add_image_to_container(&layer(), &ImageSource::new(PHOTO))
        .expect("image");
    assert_eq!(state.describe().active_texture.as_deref(), Some(PHOTO));

    let pixels = state
        .extract_pixels(SurfaceRect::new(0, 0, 8, 8))
        .expect("pixels");
    assert_eq!(pixels.pixel(1, 1), Some(RED));
    assert_eq!(pixels.pixel(6, 6), Some(Rgba::WHITE));

    assert_eq!(
        state.add_image_to_container(&layer(), &ImageSource::new("mem://missing")),
        Err(SceneError::TextureLoad(TextureLoadError::NotFound(
            "mem://missing".to_owned()
        )))
    );
}

#[test]
fn render_to_surface_clips_to_surface_bounds() {
    let mut state = scene_with_photo();
    let _display = init_small(&mut state);
    let rendered = state
        .render_to_surface(SurfaceRect::new(4, 4, 20, 6))
        .expect("render");
    assert_eq!(rendered.rect, SurfaceRect::new(4, 4, 8, 6));
    assert_eq!((rendered.pixels.width(), rendered.pixels.height()), (4, 2));

    let outside = state
        .render_to_surface(SurfaceRect::new(50, 50, 60, 60))
        .expect("render");
    assert!(outside.pixels.is_empty());
}

#[test]
fn blur_effect_follows_props() {
    let mut state = scene_with_photo();
    let _display = init_small(&mut state);
    state.create_container(layer()).expect("container");
    state
        .add_image_to_container(&layer(), &ImageSource::new(PHOTO))
        .expect("image");
    let element = ElementId::from("blur-1");
    state
        .create_blur_effect(&layer(), element.clone())
        .expect("blur effect");

    let props = BlurProps {
        x: 0.0,
        y: 0.0,
        width: 4.0,
        height: 4.0,
        angle: 0.0,
        zoom: 1.0,
        opacity: 50.0,
        blur: 50.0,
        eraser_alpha: None,
    };
    state
        .update_blur_effect(&element, props, true)
        .expect("update");
    let stats = state.describe();
    let effect = &stats.blur_effects[0];
    assert_eq!(effect.alpha, 0.5);
    assert_eq!(effect.strength, 16.0);

    let untouched_filter = BlurProps {
        blur: 100.0,
        eraser_alpha: Some(0.2),
        ..props
    };
    state
        .update_blur_effect(&element, untouched_filter, false)
        .expect("update");
    let stats = state.describe();
    let effect = &stats.blur_effects[0];
    assert_eq!(effect.alpha, 0.2);
    assert_eq!(effect.strength, 16.0);

    state.delete_blur_effect(&element).expect("delete");
    assert!(state.describe().blur_effects.is_empty());
    assert_eq!(
        state.delete_blur_effect(&element),
        Err(SceneError::UnknownElement(element))
    );
}

#[test]
fn clearing_a_container_drops_its_blur_effects() {
    let mut state = scene_with_photo();
    let _display = init_small(&mut state);
    state.create_container(layer()).expect("container");
    state
        .add_image_to_container(&layer(), &ImageSource::new(PHOTO))
        .expect("image");
    state
        .create_blur_effect(&layer(), ElementId::from("e"))
        .expect("blur effect");
    state.clear_container(&layer()).expect("clear container");

    let stats = state.describe();
    assert!(stats.blur_effects.is_empty());
    assert_eq!(stats.containers.len(), 1);
    assert_eq!(stats.containers[0].children, 0);
}

#[test]
fn watermark_updates_render_and_count_branches() {
    let mut state = scene_with_photo();
    let display = init_small(&mut state);
    state.create_container(layer()).expect("container");
    let props = WatermarkProps {
        text: "confidential".to_owned(),
        font_size: 12.0,
        color: Rgba::BLACK,
        opacity: 50.0,
        rect: WatermarkRect {
            x: 0.0,
            y: 0.0,
            width: 8.0,
            height: 8.0,
        },
        radius: 2.0,
        visible: true,
    };
    let first = state
        .update_watermark(&layer(), props.clone(), 1.0)
        .expect("watermark");
    assert!(first.regenerate_texture && first.update_alpha && first.update_geometry);

    let dimmer = WatermarkProps {
        opacity: 20.0,
        ..props
    };
    let second = state
        .update_watermark(&layer(), dimmer, 1.0)
        .expect("watermark");
    assert_eq!(
        second,
        WatermarkDiff {
            update_alpha: true,
            ..WatermarkDiff::default()
        }
    );
    assert_eq!(state.describe().watermark.texture_regenerations, 1);
    assert_eq!(display.frame_sequence(), 2);
    assert_eq!(
        state.update_watermark(&ContainerKey::from("nope"), WatermarkProps::default(), 1.0),
        Err(SceneError::UnknownContainer(ContainerKey::from("nope")))
    );
}

const DEJAVU_SANS: &[u8] = include_bytes!("../fixtures/DejaVuSans.ttf");
/// On the rotated text line and inside the rounded mask.
const ON_TEXT_INSIDE_MASK: (u32, u32) = (125, 125);
/// On the rotated text line but cut away by the bottom-right rounded corner.
const ON_TEXT_OUTSIDE_CORNER: (u32, u32) = (138, 138);
/// Outside the watermark rect.
const OFF_RECT: (u32, u32) = (30, 30);

fn watermark_scene(services: SceneServices) -> SceneState {
    let mut state = SceneState::new(services);
    state
        .init(InitOptions {
            width: 200,
            height: 200,
            background: Rgba::WHITE,
            ..InitOptions::default()
        })
        .expect("init");
    state.create_container(layer()).expect("container");
    state
}

fn block_text_services() -> SceneServices {
    SceneServices {
        text: Arc::new(BlockGlyphRasterizer),
        ..SceneServices::default()
    }
}

fn banner() -> WatermarkProps {
    WatermarkProps {
        text: "WATERMARK".to_owned(),
        font_size: 24.0,
        color: Rgba::BLACK,
        opacity: 100.0,
        rect: WatermarkRect {
            x: 60.0,
            y: 60.0,
            width: 80.0,
            height: 80.0,
        },
        radius: 30.0,
        visible: true,
    }
}

fn frame_pixel(state: &SceneState, (x, y): (u32, u32)) -> Rgba {
    state
        .extract_pixels(SurfaceRect::new(0, 0, 200, 200))
        .expect("pixels")
        .pixel(x, y)
        .expect("in bounds")
}

/// White under black text at `opacity / 100 * WATERMARK_ALPHA_SCALE`.
fn tinted() -> Rgba {
    let value = (255.0 * (1.0 - WATERMARK_ALPHA_SCALE)).round() as u8;
    Rgba::opaque(value, value, value)
}

#[test]
fn watermark_tints_text_pixels_inside_its_rounded_mask() {
    let mut state = watermark_scene(block_text_services());
    state
        .update_watermark(&layer(), banner(), 1.0)
        .expect("watermark");
    assert_eq!(frame_pixel(&state, ON_TEXT_INSIDE_MASK), tinted());
    assert_eq!(frame_pixel(&state, ON_TEXT_OUTSIDE_CORNER), Rgba::WHITE);
    assert_eq!(frame_pixel(&state, OFF_RECT), Rgba::WHITE);

    // Square corners uncover the text the rounded mask was hiding.
    let square = WatermarkProps {
        radius: 0.0,
        ..banner()
    };
    let diff = state
        .update_watermark(&layer(), square, 1.0)
        .expect("watermark");
    assert_eq!(
        diff,
        WatermarkDiff {
            update_geometry: true,
            ..WatermarkDiff::default()
        }
    );
    assert_eq!(frame_pixel(&state, ON_TEXT_OUTSIDE_CORNER), tinted());

    let hidden = WatermarkProps {
        visible: false,
        radius: 0.0,
        ..banner()
    };
    state
        .update_watermark(&layer(), hidden, 1.0)
        .expect("watermark");
    assert_eq!(frame_pixel(&state, ON_TEXT_INSIDE_MASK), Rgba::WHITE);
}

#[test]
fn watermark_is_redrawn_after_its_nodes_are_destroyed() {
    let mut state = watermark_scene(block_text_services());
    state
        .update_watermark(&layer(), banner(), 1.0)
        .expect("watermark");
    let before = state
        .extract_pixels(SurfaceRect::new(0, 0, 200, 200))
        .expect("pixels");

    state.clear_container(&layer()).expect("clear container");
    assert_eq!(frame_pixel(&state, ON_TEXT_INSIDE_MASK), Rgba::WHITE);
    let rebuilt = state
        .update_watermark(&layer(), banner(), 1.0)
        .expect("watermark");
    assert!(rebuilt.regenerate_texture && rebuilt.update_alpha && rebuilt.update_geometry);
    let after = state
        .extract_pixels(SurfaceRect::new(0, 0, 200, 200))
        .expect("pixels");
    assert_eq!(before, after);

    // A recreated container also drops the old nodes.
    state.create_container(layer()).expect("container");
    state
        .update_watermark(&layer(), banner(), 1.0)
        .expect("watermark");
    assert_eq!(frame_pixel(&state, ON_TEXT_INSIDE_MASK), tinted());
    assert_eq!(frame_pixel(&state, ON_TEXT_OUTSIDE_CORNER), Rgba::WHITE);
}

#[test]
fn font_backed_watermark_draws_glyphs() {
    let services = SceneServices::default()
        .with_font_bytes(DEJAVU_SANS.to_vec())
        .expect("valid font");
    let mut state = watermark_scene(services);
    let props = WatermarkProps {
        text: "CONFIDENTIAL".to_owned(),
        rect: WatermarkRect {
            x: 0.0,
            y: 0.0,
            width: 200.0,
            height: 200.0,
        },
        radius: 0.0,
        ..banner()
    };
    state
        .update_watermark(&layer(), props, 1.0)
        .expect("watermark");
    let frame = state
        .extract_pixels(SurfaceRect::new(0, 0, 200, 200))
        .expect("pixels");
    let marked = frame
        .data()
        .chunks_exact(4)
        .filter(|pixel| pixel[0] < 255)
        .count();
    assert!(marked > 0);
    assert_eq!(frame.pixel(0, 0), Some(Rgba::WHITE));

    assert!(matches!(
        SceneServices::default().with_font_bytes(vec![1, 2, 3]),
        Err(FontError::Invalid(_))
    ));
}

#[test]
fn clear_empties_registries_and_renders() {
    let mut state = scene_with_photo();
    let display = init_small(&mut state);
    state.create_container(layer()).expect("container");
    state.clear().expect("clear");
    let stats = state.describe();
    assert!(stats.containers.is_empty());
    assert_eq!(stats.surface.map(|surface| surface.node_count), Some(1));
    assert_eq!(display.frame_sequence(), 1);
}

#[test]
fn resize_changes_extracted_frame_size() {
    let mut state = scene_with_photo();
    let _display = init_small(&mut state);
    state.resize(3, 2).expect("resize");
    let pixels = state
        .extract_pixels(SurfaceRect::new(0, 0, 100, 100))
        .expect("pixels");
    assert_eq!((pixels.width(), pixels.height()), (3, 2));
    assert_eq!(
        state.resize(0, 2),
        Err(SceneError::InvalidSize {
            width: 0,
            height: 2
        })
    );
}

#[test]
fn dispose_disconnects_display_and_forgets_state() {
    let mut state = scene_with_photo();
    let display = init_small(&mut state);
    state.create_container(layer()).expect("container");
    state.dispose().expect("dispose");
    assert!(!display.is_connected());
    assert!(!state.is_initialized());
    assert!(state.describe().containers.is_empty());
    assert_eq!(state.render(), Err(SceneError::NotInitialized));
}
