use crate::foundation::core::{PixelBox, Raster};
use crate::foundation::error::{ForgeError, ForgeResult};

/// Largest kernel radius; wider blurs are clamped to it.
pub(crate) const MAX_BLUR_RADIUS_PX: u32 = 64;

/// Gaussian-blur a premultiplied layer in place.
///
/// `blur_px` is twice the Gaussian sigma. The kernel radius is `3 * sigma`, clamped to
/// [`MAX_BLUR_RADIUS_PX`] and to the layer size. Only the bounding box of non-transparent
/// pixels (grown by the kernel radius) is processed.
pub(crate) fn blur_layer_in_place(layer: &mut Raster, blur_px: f64) -> ForgeResult<()> {
    if !blur_px.is_finite() || blur_px < 0.5 {
        return Ok(());
    }
    let max_radius = MAX_BLUR_RADIUS_PX.min(layer.width.max(layer.height)).max(1);
    let sigma = (blur_px / 2.0).min(f64::from(max_radius) / 3.0);
    let radius = ((3.0 * sigma).ceil() as u32).clamp(1, max_radius);
    let kernel = gaussian_kernel_q16(radius, sigma as f32)?;

    let Some(content) = alpha_bounds(layer) else {
        return Ok(());
    };
    let area = grow(content, radius, layer.width, layer.height);

    let src = layer.crop(area)?;
    let mut tmp = vec![0u8; src.data.len()];
    let mut dst = vec![0u8; src.data.len()];
    blur_rgba8_premul_q16(&src.data, &mut dst, &mut tmp, area.width, area.height, &kernel);

    let stride = layer.width as usize * 4;
    let row_len = area.width as usize * 4;
    for (row, chunk) in dst.chunks_exact(row_len).enumerate() {
        let off = (area.y as usize + row) * stride + area.x as usize * 4;
        layer.data[off..off + row_len].copy_from_slice(chunk);
    }
    Ok(())
}

fn alpha_bounds(layer: &Raster) -> Option<PixelBox> {
    let w = layer.width as usize;
    let (mut x0, mut y0, mut x1, mut y1) = (usize::MAX, usize::MAX, 0usize, 0usize);
    for (i, px) in layer.data.chunks_exact(4).enumerate() {
        if px[3] == 0 {
            continue;
        }
        let (x, y) = (i % w, i / w);
        x0 = x0.min(x);
        y0 = y0.min(y);
        x1 = x1.max(x);
        y1 = y1.max(y);
    }
    (x0 != usize::MAX).then(|| PixelBox {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0 + 1) as u32,
        height: (y1 - y0 + 1) as u32,
    })
}

fn grow(b: PixelBox, by: u32, width: u32, height: u32) -> PixelBox {
    let x0 = b.x.saturating_sub(by);
    let y0 = b.y.saturating_sub(by);
    let x1 = (b.x + b.width).saturating_add(by).min(width);
    let y1 = (b.y + b.height).saturating_add(by).min(height);
    PixelBox {
        x: x0,
        y: y0,
        width: x1 - x0,
        height: y1 - y0,
    }
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> ForgeResult<Vec<u32>> {
    if radius == 0 {
        return Ok(vec![1 << 16]);
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(ForgeError::validation("blur sigma must be finite and > 0"));
    }

    let r = i32::try_from(radius)
        .ok()
        .filter(|&r| r <= MAX_BLUR_RADIUS_PX as i32)
        .ok_or_else(|| ForgeError::validation(format!("blur radius {radius} is too large")))?;
    let mut weights_f = Vec::<f64>::with_capacity(2 * radius as usize + 1);
    let mut sum = 0.0f64;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;
    for i in -r..=r {
        let x = f64::from(i);
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }

    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = ((wf / sum) * 65536.0).round() as i64;
        let q = q.clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    // Rounding drift goes to the center tap so the kernel sums to exactly 1.0.
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        weights[mid] = (i64::from(weights[mid]) + delta).clamp(0, 65536) as u32;
    }

    Ok(weights)
}

fn blur_rgba8_premul_q16(
    src: &[u8],
    dst: &mut [u8],
    tmp: &mut [u8],
    width: u32,
    height: u32,
    kernel_q16: &[u32],
) {
    if kernel_q16.len() == 1 {
        dst.copy_from_slice(src);
        return;
    }

    horizontal_blur_q16(src, tmp, width, height, kernel_q16);
    vertical_blur_q16(tmp, dst, width, height, kernel_q16);
}

// Edges sample as transparent, so the shadow fades out instead of smearing.
fn horizontal_blur_q16(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sx = x + ki as i32 - radius;
                if sx < 0 || sx >= w {
                    continue;
                }
                let idx = ((y * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_blur_q16(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sy = y + ki as i32 - radius;
                if sy < 0 || sy >= h {
                    continue;
                }
                let idx = ((sy * w + x) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    let v = (acc + 32768) >> 16;
    (v.min(255)) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/render/blur.rs"]
mod tests;
