use std::sync::Arc;
use std::time::Duration;

use vello_cpu::kurbo::Shape;

use crate::assets::color::Color;
use crate::assets::decode::{decode_image, resample};
use crate::assets::fonts::{FontFace, FontRegistry};
use crate::assets::source::{ImageSource, fetch_with_timeout};
use crate::foundation::core::{Affine, Raster, Vec2};
use crate::foundation::error::{ForgeError, ForgeResult};
use crate::layout::resolver::{
    ResolvedContent, ResolvedField, ResolvedImage, ResolvedShadow, ResolvedText, fit_box,
};
use crate::render::blur::blur_layer_in_place;
use crate::render::cpu::{
    CpuRasterizer, affine_to_cpu, image_paint, premul_over_in_place, solid_paint,
};
use crate::scene::field::{HAlign, VAlign};
use crate::text::engine::{ParleyMeasure, TextBrushRgba8};
use crate::text::shaper::wrap;

/// Flattening tolerance for circle clips and borders.
const PATH_TOLERANCE: f64 = 0.1;

/// Everything a field needs from outside the canvas.
pub(crate) struct FieldEnv<'a> {
    pub(crate) fonts: &'a FontRegistry,
    pub(crate) images: &'a Arc<dyn ImageSource>,
    pub(crate) fetch_timeout: Duration,
}

/// Draw one resolved field onto `dst`.
///
/// The field is rasterized into its own layer first; `dst` is only touched once drawing has
/// fully succeeded.
pub(crate) fn render_field(
    rast: &mut CpuRasterizer,
    env: &FieldEnv<'_>,
    field: &ResolvedField,
    dst: &mut Raster,
) -> ForgeResult<()> {
    let base = Affine::translate(field.anchor.to_vec2()) * Affine::rotate(field.rotation_rad);
    let layers = match &field.content {
        ResolvedContent::Text(t) => text_layers(rast, env, base, t, dst)?,
        ResolvedContent::Image(img) => image_layers(rast, env, base, img, dst)?,
    };
    for layer in &layers {
        premul_over_in_place(dst, layer)?;
    }
    Ok(())
}

struct PlacedLine {
    layout: parley::Layout<TextBrushRgba8>,
    origin: Vec2,
}

fn text_layers(
    rast: &mut CpuRasterizer,
    env: &FieldEnv<'_>,
    base: Affine,
    t: &ResolvedText,
    dst: &Raster,
) -> ForgeResult<Vec<Raster>> {
    let face = env
        .fonts
        .resolve_weighted(&t.font_family, t.font_weight)
        .ok_or_else(|| ForgeError::font("no fonts registered"))?;
    let size_px = t.font_size_px as f32;

    let lines = wrap(
        &t.text,
        t.max_width_px,
        ParleyMeasure {
            engine: &mut rast.text,
            face,
            size_px,
            weight: t.font_weight,
        },
    )?;
    if lines.is_empty() {
        return Ok(Vec::new());
    }

    let lh = t.line_height_px;
    let block_h = lh * lines.len() as f64;
    let top = match t.vertical_align {
        VAlign::Top => 0.0,
        VAlign::Middle => -block_h / 2.0,
        VAlign::Bottom => -block_h,
    };

    let mut placed = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        let layout = rast.text.layout_line(
            face,
            line,
            size_px,
            t.font_weight,
            TextBrushRgba8::default(),
        )?;
        let w = f64::from(layout.width());
        let x = match t.align {
            HAlign::Left => 0.0,
            HAlign::Center => -w / 2.0,
            HAlign::Right => -w,
        };
        let y = top + i as f64 * lh + (lh - f64::from(layout.height())) / 2.0;
        placed.push(PlacedLine {
            layout,
            origin: Vec2::new(x, y),
        });
    }

    let canvas = dst.canvas();
    let mut out = Vec::with_capacity(2);
    if let Some(shadow) = &t.shadow {
        let shifted = Affine::translate(shadow.offset) * base;
        let mut layer = rast.draw_layer(canvas, |ctx| {
            paint_lines(ctx, face, &placed, shifted, shadow.color);
            Ok(())
        })?;
        blur_layer_in_place(&mut layer, shadow.blur_px)?;
        out.push(layer);
    }
    out.push(rast.draw_layer(canvas, |ctx| {
        paint_lines(ctx, face, &placed, base, t.color);
        Ok(())
    })?);
    Ok(out)
}

fn paint_lines(
    ctx: &mut vello_cpu::RenderContext,
    face: &FontFace,
    lines: &[PlacedLine],
    base: Affine,
    color: Color,
) {
    ctx.set_paint(solid_paint(color));
    for line in lines {
        ctx.set_transform(affine_to_cpu(base * Affine::translate(line.origin)));
        for l in line.layout.lines() {
            for item in l.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let mut x = run.offset();
                let y = run.baseline();
                let glyphs = run.glyphs().map(|g| {
                    let gx = x + g.x;
                    x += g.advance;
                    vello_cpu::Glyph {
                        id: g.id,
                        x: gx,
                        y: y - g.y,
                    }
                });
                ctx.glyph_run(face.data())
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
    }
}

fn image_layers(
    rast: &mut CpuRasterizer,
    env: &FieldEnv<'_>,
    base: Affine,
    img: &ResolvedImage,
    dst: &Raster,
) -> ForgeResult<Vec<Raster>> {
    let bytes = fetch_with_timeout(env.images, &img.reference, env.fetch_timeout)?;
    let decoded = decode_image(&bytes)?;
    let (bw, bh) = fit_box(
        decoded.width,
        decoded.height,
        img.max_width_px,
        img.max_height_px,
    )
    .ok_or_else(|| ForgeError::validation("image box is empty"))?;
    let scaled = resample(&decoded, bw, bh)?;
    let paint = image_paint(&scaled)?;

    let (w, h) = (f64::from(bw), f64::from(bh));
    let local = base * Affine::translate((-w / 2.0, -h / 2.0));
    let outline = if img.rounded {
        vello_cpu::kurbo::Circle::new((w / 2.0, h / 2.0), w.min(h) / 2.0).to_path(PATH_TOLERANCE)
    } else {
        vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h).to_path(PATH_TOLERANCE)
    };

    let canvas = dst.canvas();
    let mut out = Vec::with_capacity(2);
    if let Some(ResolvedShadow {
        color,
        blur_px,
        offset,
    }) = img.shadow
    {
        let mut layer = rast.draw_layer(canvas, |ctx| {
            ctx.set_transform(affine_to_cpu(Affine::translate(offset) * local));
            ctx.set_paint(solid_paint(color));
            ctx.fill_path(&outline);
            Ok(())
        })?;
        blur_layer_in_place(&mut layer, blur_px)?;
        out.push(layer);
    }

    out.push(rast.draw_layer(canvas, |ctx| {
        ctx.set_transform(affine_to_cpu(local));
        if img.rounded {
            ctx.push_clip_layer(&outline);
        }
        ctx.set_paint(paint);
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));
        if img.rounded {
            ctx.pop_layer();
        }
        if let Some(border) = img.border {
            ctx.set_stroke(vello_cpu::kurbo::Stroke::new(border.width_px));
            ctx.set_paint(solid_paint(border.color));
            ctx.stroke_path(&outline);
        }
        Ok(())
    })?);
    Ok(out)
}

#[cfg(test)]
#[path = "../../tests/unit/render/field.rs"]
mod tests;
