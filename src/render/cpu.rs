use std::sync::Arc;

use crate::foundation::core::{Affine, Canvas, Raster};
use crate::foundation::error::{ForgeError, ForgeResult};
use crate::foundation::math::premul_over_px;
use crate::text::engine::TextLayoutEngine;

/// CPU rasterizer shared by every field of one render.
///
/// Owns a reusable `vello_cpu` context and the Parley layout state. Each layer is drawn from a
/// freshly reset context, so transforms, clips and paints never carry over between fields.
pub(crate) struct CpuRasterizer {
    ctx: Option<vello_cpu::RenderContext>,
    pub(crate) text: TextLayoutEngine,
}

impl Default for CpuRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuRasterizer {
    pub(crate) fn new() -> Self {
        Self {
            ctx: None,
            text: TextLayoutEngine::new(),
        }
    }

    fn with_ctx_mut<R>(
        &mut self,
        width: u16,
        height: u16,
        f: impl FnOnce(&mut vello_cpu::RenderContext) -> ForgeResult<R>,
    ) -> ForgeResult<R> {
        let mut ctx = match self.ctx.take() {
            None => vello_cpu::RenderContext::new(width, height),
            Some(ctx) if ctx.width() == width && ctx.height() == height => ctx,
            Some(_) => vello_cpu::RenderContext::new(width, height),
        };
        ctx.reset();
        let out = f(&mut ctx)?;
        self.ctx = Some(ctx);
        Ok(out)
    }

    /// Draw into a transparent layer the size of `canvas` and return it.
    pub(crate) fn draw_layer(
        &mut self,
        canvas: Canvas,
        f: impl FnOnce(&mut vello_cpu::RenderContext) -> ForgeResult<()>,
    ) -> ForgeResult<Raster> {
        let (w, h) = canvas_u16(canvas)?;
        self.with_ctx_mut(w, h, |ctx| {
            ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
            f(ctx)?;
            let mut pixmap = vello_cpu::Pixmap::new(w, h);
            ctx.flush();
            ctx.render_to_pixmap(&mut pixmap);
            Raster::from_premul(
                canvas.width,
                canvas.height,
                pixmap.data_as_u8_slice().to_vec(),
            )
        })
    }
}

fn canvas_u16(canvas: Canvas) -> ForgeResult<(u16, u16)> {
    let too_big =
        || ForgeError::invalid_dimensions(i64::from(canvas.width), i64::from(canvas.height));
    let w: u16 = canvas.width.try_into().map_err(|_| too_big())?;
    let h: u16 = canvas.height.try_into().map_err(|_| too_big())?;
    Ok((w, h))
}

pub(crate) fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

/// Straight-alpha color as a `vello_cpu` paint.
pub(crate) fn solid_paint(c: crate::assets::color::Color) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn pixmap_from_raster(raster: &Raster) -> ForgeResult<vello_cpu::Pixmap> {
    let (w, h) = canvas_u16(raster.canvas())?;
    // Pixmap stores PremulRgba8; raster bytes are already premultiplied.
    let mut pixels = Vec::<vello_cpu::peniko::color::PremulRgba8>::with_capacity(
        (raster.width as usize) * (raster.height as usize),
    );
    for px in raster.data.chunks_exact(4) {
        pixels.push(vello_cpu::peniko::color::PremulRgba8::from_u8_array([
            px[0], px[1], px[2], px[3],
        ]));
    }
    let opaque = raster.data.chunks_exact(4).all(|px| px[3] == 255);
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels, w, h, !opaque,
    ))
}

/// Image paint sampling `raster` in user space, origin at its top-left corner.
pub(crate) fn image_paint(raster: &Raster) -> ForgeResult<vello_cpu::Image> {
    let pixmap = pixmap_from_raster(raster)?;
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

/// Premultiplied src-over of a whole layer onto `dst`.
pub(crate) fn premul_over_in_place(dst: &mut Raster, src: &Raster) -> ForgeResult<()> {
    if dst.canvas() != src.canvas() || dst.data.len() != src.data.len() {
        return Err(ForgeError::validation(
            "premul_over_in_place expects equal-size rasters",
        ));
    }
    for (d, s) in dst.data.chunks_exact_mut(4).zip(src.data.chunks_exact(4)) {
        if s[3] == 0 {
            continue;
        }
        let out = premul_over_px([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&out);
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/render/cpu.rs"]
mod tests;
