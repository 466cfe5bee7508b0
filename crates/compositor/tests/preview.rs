mod common;

use compositor::{PreviewOptions, PreviewSurface, PreviewVisibility, Uniforms};
use image::{Rgba, RgbaImage};

use common::{as_provider, assert_close, compositor, pattern, program, SimpleProvider, IDENTITY};

fn single_tile(visibility: PreviewVisibility) -> PreviewOptions {
    PreviewOptions {
        tiles: [1.0, 1.0],
        visibility,
        ..PreviewOptions::default()
    }
}

#[test]
fn shown_single_tile_matches_the_visible_surface() {
    let Some(mut compositor) = compositor() else { return };
    let image = pattern(16, 16);
    compositor.load_image(&image).unwrap();
    let identity = as_provider(SimpleProvider::new(
        "identity",
        program(&compositor, "identity", IDENTITY),
        Uniforms::new(),
    ));
    compositor.set_provider(&identity);

    let mut preview =
        PreviewSurface::new(compositor.context(), 16, 16, single_tile(PreviewVisibility::Shown))
            .unwrap();
    preview.render(&compositor);
    assert_close(&preview.snapshot(compositor.context()).unwrap(), &image, 1);
}

#[test]
fn hidden_preview_shows_only_the_backdrop() {
    let Some(mut compositor) = compositor() else { return };
    compositor.load_image(&pattern(16, 16)).unwrap();
    let identity = as_provider(SimpleProvider::new(
        "identity",
        program(&compositor, "identity", IDENTITY),
        Uniforms::new(),
    ));
    compositor.set_provider(&identity);

    let mut preview =
        PreviewSurface::new(compositor.context(), 8, 8, single_tile(PreviewVisibility::Hidden))
            .unwrap();
    preview.render(&compositor);
    let black = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]));
    assert_eq!(preview.snapshot(compositor.context()).unwrap(), black);
}

#[test]
fn preview_without_an_image_is_blank() {
    let Some(compositor) = compositor() else { return };
    let mut preview =
        PreviewSurface::new(compositor.context(), 4, 4, single_tile(PreviewVisibility::Shown))
            .unwrap();
    preview.render(&compositor);
    let black = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
    assert_eq!(preview.snapshot(compositor.context()).unwrap(), black);
}

#[test]
fn preview_follows_frame_signals() {
    let Some(mut compositor) = compositor() else { return };
    let mut preview =
        PreviewSurface::new(compositor.context(), 8, 8, PreviewOptions::default()).unwrap();
    preview.attach(compositor.subscribe());
    assert!(!preview.render_if_ready(&compositor));

    compositor.load_image(&pattern(8, 8)).unwrap();
    let identity = as_provider(SimpleProvider::new(
        "identity",
        program(&compositor, "identity", IDENTITY),
        Uniforms::new(),
    ));
    compositor.set_provider(&identity);

    assert!(preview.render_if_ready(&compositor));
    assert_eq!(preview.last_serial(), Some(1));
    assert!(!preview.render_if_ready(&compositor));

    compositor.render();
    assert!(preview.render_if_ready(&compositor));
    assert_eq!(preview.last_serial(), Some(2));
}

#[test]
fn resizing_and_toggling_the_preview() {
    let Some(compositor) = compositor() else { return };
    let mut preview =
        PreviewSurface::new(compositor.context(), 8, 8, PreviewOptions::default()).unwrap();
    preview.resize(compositor.context(), 20, 10);
    assert_eq!(preview.size(), (20, 10));
    preview.resize(compositor.context(), 0, 0);
    assert_eq!(preview.size(), (1, 1));

    assert_eq!(preview.visibility(), PreviewVisibility::Faded);
    assert_eq!(preview.toggle_fade(), PreviewVisibility::Shown);
    assert_eq!(preview.toggle_fade(), PreviewVisibility::Faded);
    preview.set_visibility(PreviewVisibility::Hidden);
    assert_eq!(preview.toggle_fade(), PreviewVisibility::Shown);

    preview.set_tiles([0.0, 3.0]);
    assert_eq!(preview.options().tiles, [1.0, 3.0]);
}

#[test]
fn tiles_wrap_the_visible_surface() {
    let Some(mut compositor) = compositor() else { return };
    let image = pattern(16, 16);
    compositor.load_image(&image).unwrap();
    let identity = as_provider(SimpleProvider::new(
        "identity",
        program(&compositor, "identity", IDENTITY),
        Uniforms::new(),
    ));
    compositor.set_provider(&identity);
    let visible = compositor.snapshot().unwrap();

    let options = PreviewOptions {
        tiles: [2.0, 2.0],
        visibility: PreviewVisibility::Shown,
        ..PreviewOptions::default()
    };
    let mut preview = PreviewSurface::new(compositor.context(), 32, 32, options).unwrap();
    preview.render(&compositor);
    let tiled = preview.snapshot(compositor.context()).unwrap();

    for (x, y) in [(0, 0), (16, 0), (0, 16), (16, 16)] {
        let quadrant = image::imageops::crop_imm(&tiled, x, y, 16, 16).to_image();
        assert_close(&quadrant, &visible, 1);
    }
}

#[test]
fn stacked_signals_report_the_newest_frame() {
    let Some(mut compositor) = compositor() else { return };
    let mut preview =
        PreviewSurface::new(compositor.context(), 8, 8, PreviewOptions::default()).unwrap();
    preview.attach(compositor.subscribe());

    compositor.load_image(&pattern(8, 8)).unwrap();
    let identity = as_provider(SimpleProvider::new(
        "identity",
        program(&compositor, "identity", IDENTITY),
        Uniforms::new(),
    ));
    compositor.set_provider(&identity);
    compositor.render();
    compositor.render();

    assert!(preview.render_if_ready(&compositor));
    assert_eq!(preview.last_serial(), Some(3));
    assert!(!preview.render_if_ready(&compositor));
}
