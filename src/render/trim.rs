use crate::foundation::core::{PixelBox, Raster};
use crate::foundation::error::ForgeResult;
use crate::foundation::math::unpremultiply_rgba8;

/// Pixels at or below this alpha count as empty.
pub const CONTENT_ALPHA_THRESHOLD: u8 = 10;
/// Straight-alpha channel value at or above which a pixel counts as near-white.
pub const NEAR_WHITE_MIN: u8 = 245;
/// Margin added around the content box.
pub const TRIM_MARGIN_PX: u32 = 5;

/// Outcome of [`trim`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrimResult {
    /// Crop box in source raster coordinates.
    pub crop: PixelBox,
    /// The cropped raster.
    pub raster: Raster,
}

impl TrimResult {
    /// `true` when the crop covers the whole source.
    pub fn is_noop(&self, source_width: u32, source_height: u32) -> bool {
        self.crop.x == 0
            && self.crop.y == 0
            && self.crop.width == source_width
            && self.crop.height == source_height
    }
}

/// Whether a premultiplied pixel counts as content.
///
/// Opaque white is treated as canvas padding, even when it belongs to the design.
pub(crate) fn is_content(px: [u8; 4]) -> bool {
    if px[3] <= CONTENT_ALPHA_THRESHOLD {
        return false;
    }
    let [r, g, b, _] = unpremultiply_rgba8(px);
    !(r >= NEAR_WHITE_MIN && g >= NEAR_WHITE_MIN && b >= NEAR_WHITE_MIN)
}

/// Crop `raster` to the bounding box of its content plus [`TRIM_MARGIN_PX`].
pub fn trim(raster: &Raster) -> ForgeResult<TrimResult> {
    let crop = content_box(raster).unwrap_or_else(|| PixelBox::full(raster.canvas()));
    let raster = if crop == PixelBox::full(raster.canvas()) {
        raster.clone()
    } else {
        raster.crop(crop)?
    };
    Ok(TrimResult { crop, raster })
}

fn content_box(raster: &Raster) -> Option<PixelBox> {
    let w = raster.width as usize;
    let (mut x0, mut y0, mut x1, mut y1) = (usize::MAX, usize::MAX, 0usize, 0usize);
    for (i, px) in raster.data.chunks_exact(4).enumerate() {
        if !is_content([px[0], px[1], px[2], px[3]]) {
            continue;
        }
        let (x, y) = (i % w, i / w);
        x0 = x0.min(x);
        y0 = y0.min(y);
        x1 = x1.max(x);
        y1 = y1.max(y);
    }
    if x0 == usize::MAX {
        return None;
    }

    let m = TRIM_MARGIN_PX as usize;
    let x0 = x0.saturating_sub(m);
    let y0 = y0.saturating_sub(m);
    let x1 = (x1 + m).min(w - 1);
    let y1 = (y1 + m).min(raster.height as usize - 1);
    Some(PixelBox {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0 + 1) as u32,
        height: (y1 - y0 + 1) as u32,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/render/trim.rs"]
mod tests;
