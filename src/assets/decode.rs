use anyhow::Context;

use crate::foundation::core::Raster;
use crate::foundation::error::ForgeResult;

/// Decode any format supported by `image` into a premultiplied raster.
pub(crate) fn decode_image(bytes: &[u8]) -> ForgeResult<Raster> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Raster::from_straight(width, height, rgba.into_raw())
}

/// Decode and resample to exactly `width`x`height` (used for backgrounds).
pub(crate) fn decode_image_resized(bytes: &[u8], width: u32, height: u32) -> ForgeResult<Raster> {
    let dyn_img = image::load_from_memory(bytes).context("decode background from memory")?;
    let rgba = dyn_img.to_rgba8();
    let rgba = if rgba.dimensions() == (width, height) {
        rgba
    } else {
        image::imageops::resize(&rgba, width, height, image::imageops::FilterType::Triangle)
    };
    Raster::from_straight(width, height, rgba.into_raw())
}

/// Resample a premultiplied raster to `width`x`height` with a triangle filter.
pub(crate) fn resample(src: &Raster, width: u32, height: u32) -> ForgeResult<Raster> {
    if (src.width, src.height) == (width, height) {
        return Ok(src.clone());
    }
    let buf = image::RgbaImage::from_raw(src.width, src.height, src.data.clone())
        .context("wrap raster for resampling")?;
    let out = image::imageops::resize(&buf, width, height, image::imageops::FilterType::Triangle);
    Raster::from_premul(width, height, out.into_raw())
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
