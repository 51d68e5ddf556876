use std::io::Cursor;

use super::*;
use crate::assets::source::MemoryImageSource;
use crate::foundation::core::{Canvas, Point, Rgba8Premul};
use crate::layout::resolver::ResolvedBorder;

fn png(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(px));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn white(w: u32, h: u32) -> Raster {
    Raster::filled(
        Canvas::new(w, h).unwrap(),
        Rgba8Premul::from_straight_rgba(255, 255, 255, 255),
    )
}

fn assert_px(r: &Raster, x: u32, y: u32, want: [u8; 4]) {
    let got = r.pixel(x, y).unwrap();
    assert!(
        got.iter().zip(want).all(|(g, w)| g.abs_diff(w) <= 2),
        "pixel ({x},{y}) = {got:?}, want {want:?}"
    );
}

fn images() -> Arc<dyn ImageSource> {
    Arc::new(
        MemoryImageSource::new()
            .with("red.png", png(40, 30, [255, 0, 0, 255]))
            .with("broken.png", b"not a png".to_vec()),
    )
}

fn image_field(reference: &str, anchor: Point) -> ResolvedField {
    ResolvedField {
        name: "photo".to_owned(),
        anchor,
        rotation_rad: 0.0,
        depth: 1,
        display_order: 0,
        content: ResolvedContent::Image(ResolvedImage {
            reference: reference.to_owned(),
            max_width_px: 25.0,
            max_height_px: 25.0,
            border: None,
            rounded: false,
            shadow: None,
        }),
    }
}

fn with_image(field: &mut ResolvedField, f: impl FnOnce(&mut ResolvedImage)) {
    if let ResolvedContent::Image(img) = &mut field.content {
        f(img);
    }
}

fn draw(field: &ResolvedField, dst: &mut Raster) -> ForgeResult<()> {
    let fonts = FontRegistry::empty();
    let images = images();
    let env = FieldEnv {
        fonts: &fonts,
        images: &images,
        fetch_timeout: Duration::from_secs(5),
    };
    render_field(&mut CpuRasterizer::new(), &env, field, dst)
}

#[test]
fn image_is_centered_on_anchor_inside_its_box() {
    let mut canvas = white(100, 100);
    draw(&image_field("red.png", Point::new(50.0, 50.0)), &mut canvas).unwrap();

    // 40x30 fits 25x25 as 25x18.
    assert_px(&canvas, 50, 50, [255, 0, 0, 255]);
    assert_px(&canvas, 39, 43, [255, 0, 0, 255]);
    assert_px(&canvas, 60, 57, [255, 0, 0, 255]);
    assert_px(&canvas, 35, 50, [255, 255, 255, 255]);
    assert_px(&canvas, 50, 38, [255, 255, 255, 255]);
}

#[test]
fn rounded_image_is_clipped_to_a_circle() {
    let mut field = image_field("red.png", Point::new(50.0, 50.0));
    with_image(&mut field, |img| img.rounded = true);
    let mut canvas = white(100, 100);
    draw(&field, &mut canvas).unwrap();

    assert_px(&canvas, 50, 50, [255, 0, 0, 255]);
    // Box corner lies outside the radius-9 circle.
    assert_px(&canvas, 38, 41, [255, 255, 255, 255]);
    assert_px(&canvas, 61, 58, [255, 255, 255, 255]);
}

#[test]
fn border_is_stroked_on_the_box_edge() {
    let mut field = image_field("red.png", Point::new(50.0, 50.0));
    with_image(&mut field, |img| {
        img.border = Some(ResolvedBorder {
            width_px: 4.0,
            color: Color::rgb(0, 0, 255),
        });
    });
    let mut canvas = white(100, 100);
    draw(&field, &mut canvas).unwrap();

    // Left edge sits at x = 37.5; a 4px stroke covers 35.5..39.5.
    assert_px(&canvas, 37, 50, [0, 0, 255, 255]);
    assert_px(&canvas, 50, 50, [255, 0, 0, 255]);
}

#[test]
fn rotation_turns_the_box_about_the_anchor() {
    let mut field = image_field("red.png", Point::new(50.0, 50.0));
    field.rotation_rad = std::f64::consts::FRAC_PI_2;
    let mut canvas = white(100, 100);
    draw(&field, &mut canvas).unwrap();

    // Rotated 25x18 box is 18 wide and 25 tall.
    assert_px(&canvas, 50, 39, [255, 0, 0, 255]);
    assert_px(&canvas, 39, 50, [255, 255, 255, 255]);
}

#[test]
fn shadow_darkens_offset_region_only() {
    let mut field = image_field("red.png", Point::new(50.0, 50.0));
    with_image(&mut field, |img| {
        img.shadow = Some(ResolvedShadow {
            color: Color::rgb(0, 0, 0),
            blur_px: 0.0,
            offset: Vec2::new(10.0, 0.0),
        });
    });
    let mut canvas = white(100, 100);
    draw(&field, &mut canvas).unwrap();

    assert_px(&canvas, 70, 50, [0, 0, 0, 255]);
    assert_px(&canvas, 50, 50, [255, 0, 0, 255]);
    assert_px(&canvas, 30, 50, [255, 255, 255, 255]);
}

#[test]
fn unreadable_images_fail_without_touching_the_canvas() {
    for reference in ["broken.png", "missing.png"] {
        let mut canvas = white(20, 20);
        let before = canvas.clone();
        assert!(draw(&image_field(reference, Point::new(10.0, 10.0)), &mut canvas).is_err());
        assert_eq!(canvas, before);
    }
}

#[test]
fn text_without_fonts_is_an_error() {
    let field = ResolvedField {
        name: "title".to_owned(),
        anchor: Point::new(10.0, 10.0),
        rotation_rad: 0.0,
        depth: 1,
        display_order: 0,
        content: ResolvedContent::Text(ResolvedText {
            text: "Hello".to_owned(),
            font_family: "sans-serif".to_owned(),
            font_size_px: 12.0,
            font_weight: 400,
            color: Color::BLACK,
            align: HAlign::Center,
            vertical_align: VAlign::Middle,
            max_width_px: 100.0,
            line_height_px: 14.4,
            shadow: None,
        }),
    };
    let mut canvas = white(20, 20);
    assert!(matches!(draw(&field, &mut canvas), Err(ForgeError::Font(_))));
}

fn system_fonts() -> Option<FontRegistry> {
    let path = [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    ]
    .into_iter()
    .find(|p| std::path::Path::new(p).exists())?;
    Some(FontRegistry::load(&[path]).unwrap())
}

fn text_field(text: &str, anchor: Point, f: impl FnOnce(&mut ResolvedText)) -> ResolvedField {
    let mut t = ResolvedText {
        text: text.to_owned(),
        font_family: "sans-serif".to_owned(),
        font_size_px: 32.0,
        font_weight: 400,
        color: Color::BLACK,
        align: HAlign::Left,
        vertical_align: VAlign::Middle,
        max_width_px: 0.0,
        line_height_px: 38.4,
        shadow: None,
    };
    f(&mut t);
    ResolvedField {
        name: "title".to_owned(),
        anchor,
        rotation_rad: 0.0,
        depth: 1,
        display_order: 0,
        content: ResolvedContent::Text(t),
    }
}

fn draw_text(fonts: &FontRegistry, field: &ResolvedField, w: u32, h: u32) -> Raster {
    let images = images();
    let env = FieldEnv {
        fonts,
        images: &images,
        fetch_timeout: Duration::from_secs(5),
    };
    let mut canvas = white(w, h);
    render_field(&mut CpuRasterizer::new(), &env, field, &mut canvas).unwrap();
    canvas
}

/// Inclusive bbox `(x0, y0, x1, y1)` of pixels matching `ink`.
fn ink_bbox(r: &Raster, ink: impl Fn([u8; 4]) -> bool) -> Option<(u32, u32, u32, u32)> {
    let mut bbox: Option<(u32, u32, u32, u32)> = None;
    for y in 0..r.height {
        for x in 0..r.width {
            if ink(r.pixel(x, y).unwrap()) {
                bbox = Some(match bbox {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
    }
    bbox
}

fn dark(px: [u8; 4]) -> bool {
    px[0] < 128 && px[1] < 128 && px[2] < 128
}

#[test]
fn left_aligned_text_inks_right_of_anchor() {
    let Some(fonts) = system_fonts() else {
        return;
    };
    let field = text_field("HELLO", Point::new(100.0, 50.0), |_| {});
    let canvas = draw_text(&fonts, &field, 300, 100);

    let (x0, _, x1, _) = ink_bbox(&canvas, dark).unwrap();
    assert!(x0 >= 98, "ink starts at {x0}");
    assert!(x1 > 150);
}

#[test]
fn right_aligned_text_inks_left_of_anchor() {
    let Some(fonts) = system_fonts() else {
        return;
    };
    let field = text_field("HELLO", Point::new(200.0, 50.0), |t| {
        t.align = HAlign::Right;
    });
    let canvas = draw_text(&fonts, &field, 300, 100);

    let (x0, _, x1, _) = ink_bbox(&canvas, dark).unwrap();
    assert!(x1 <= 202, "ink ends at {x1}");
    assert!(x0 < 150);
}

#[test]
fn vertical_align_places_block_relative_to_anchor() {
    let Some(fonts) = system_fonts() else {
        return;
    };
    let anchor = Point::new(150.0, 100.0);
    let bbox = |v: VAlign| {
        let field = text_field("HELLO", anchor, |t| t.vertical_align = v);
        ink_bbox(&draw_text(&fonts, &field, 300, 200), dark).unwrap()
    };

    // Line box is 38.4 px tall.
    let (_, top_y0, _, top_y1) = bbox(VAlign::Top);
    assert!(top_y0 >= 99, "top block starts at {top_y0}");
    assert!(top_y1 <= 140);

    let (_, mid_y0, _, mid_y1) = bbox(VAlign::Middle);
    assert!(mid_y0 < 100 && mid_y1 > 100, "middle block {mid_y0}..{mid_y1}");

    let (_, bot_y0, _, bot_y1) = bbox(VAlign::Bottom);
    assert!(bot_y1 <= 101, "bottom block ends at {bot_y1}");
    assert!(bot_y0 >= 60);

    assert!(top_y0 > mid_y0 && mid_y0 > bot_y0);
}

#[test]
fn wrapped_text_stacks_lines_one_line_height_apart() {
    let Some(fonts) = system_fonts() else {
        return;
    };
    let field = text_field("HELLO HELLO", Point::new(20.0, 20.0), |t| {
        t.vertical_align = VAlign::Top;
        t.max_width_px = 150.0;
    });
    let canvas = draw_text(&fonts, &field, 300, 200);

    let rows: Vec<bool> = (0..canvas.height)
        .map(|y| (0..canvas.width).any(|x| dark(canvas.pixel(x, y).unwrap())))
        .collect();
    let band_starts: Vec<u32> = (0..canvas.height)
        .filter(|&y| rows[y as usize] && (y == 0 || !rows[y as usize - 1]))
        .collect();
    assert_eq!(band_starts.len(), 2, "bands at {band_starts:?}");
    let step = f64::from(band_starts[1] - band_starts[0]);
    assert!((step - 38.4).abs() <= 2.0, "line step {step}");

    // Each line fits the wrap width.
    let (x0, _, x1, _) = ink_bbox(&canvas, dark).unwrap();
    assert!(x0 >= 18 && x1 <= 172, "ink spans {x0}..{x1}");
}

#[test]
fn text_shadow_is_drawn_at_its_offset_under_the_text() {
    let Some(fonts) = system_fonts() else {
        return;
    };
    let field = text_field("HELLO", Point::new(20.0, 20.0), |t| {
        t.vertical_align = VAlign::Top;
        t.shadow = Some(ResolvedShadow {
            color: Color::rgb(255, 0, 0),
            blur_px: 0.0,
            offset: Vec2::new(0.0, 40.0),
        });
    });
    let canvas = draw_text(&fonts, &field, 300, 120);

    let red = |px: [u8; 4]| px[0] > 200 && px[1] < 80 && px[2] < 80;
    let (tx0, ty0, tx1, ty1) = ink_bbox(&canvas, dark).unwrap();
    let (sx0, sy0, sx1, sy1) = ink_bbox(&canvas, red).unwrap();

    assert!(ty1 < 60, "text ends at {ty1}");
    assert!(sy0 >= 60, "shadow starts at {sy0}");
    assert!(u32::abs_diff(sy0, ty0 + 40) <= 2);
    assert!(u32::abs_diff(sy1, ty1 + 40) <= 2);
    assert!(u32::abs_diff(sx0, tx0) <= 1 && u32::abs_diff(sx1, tx1) <= 1);
}
