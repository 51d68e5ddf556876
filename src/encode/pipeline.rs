use std::borrow::Cow;
use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};

use crate::assets::decode::resample;
use crate::foundation::core::Raster;
use crate::foundation::error::{ForgeError, ForgeResult};
use crate::scene::request::{Container, QualityTier};

/// Encoded output plus what it actually is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedImage {
    /// Encoded bytes.
    pub bytes: Vec<u8>,
    /// Container the bytes are in.
    pub container: Container,
    /// Encoded width.
    pub width: u32,
    /// Encoded height.
    pub height: u32,
}

/// Encode parameters of one quality tier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TierPolicy {
    /// Downscale wider rasters to this width.
    pub max_width: Option<u32>,
    /// Container used when the request names none.
    pub container: Container,
    /// JPEG quality (1..=100).
    pub jpeg_quality: u8,
    /// PNG deflate effort.
    pub png_compression: CompressionType,
    /// Unsharp mask `(sigma, threshold)` applied before encoding.
    pub sharpen: Option<(f32, i32)>,
}

impl TierPolicy {
    /// Parameters for `tier`.
    pub fn for_tier(tier: QualityTier) -> Self {
        let base = Self {
            max_width: None,
            container: Container::Jpeg,
            jpeg_quality: 85,
            png_compression: CompressionType::Default,
            sharpen: None,
        };
        match tier {
            QualityTier::Preview => Self {
                max_width: Some(800),
                jpeg_quality: 60,
                ..base
            },
            QualityTier::Low => Self {
                max_width: Some(1200),
                jpeg_quality: 75,
                ..base
            },
            QualityTier::Medium => base,
            QualityTier::High => Self {
                container: Container::Png,
                jpeg_quality: 95,
                sharpen: Some((0.6, 2)),
                ..base
            },
            QualityTier::Download => Self {
                container: Container::Png,
                jpeg_quality: 95,
                png_compression: CompressionType::Best,
                ..base
            },
        }
    }
}

/// Encode `raster` at `tier`, in `requested` or the tier's default container.
///
/// A failing tuned encode is retried once with the plain encoder for the container on the
/// unmodified raster; only a failing retry is an error.
pub fn encode(
    raster: &Raster,
    tier: QualityTier,
    requested: Option<Container>,
) -> ForgeResult<EncodedImage> {
    let policy = TierPolicy::for_tier(tier);
    let container = requested.unwrap_or(policy.container);
    let raster = match policy.max_width {
        Some(mw) if raster.width > mw => {
            let h = (f64::from(raster.height) * f64::from(mw) / f64::from(raster.width))
                .round()
                .max(1.0) as u32;
            Cow::Owned(resample(raster, mw, h)?)
        }
        _ => Cow::Borrowed(raster),
    };

    let bytes = encode_with_fallback(
        || encode_tuned(&raster, container, &policy),
        || encode_raw(&raster, container),
    )?;
    Ok(EncodedImage {
        bytes,
        container,
        width: raster.width,
        height: raster.height,
    })
}

pub(crate) fn encode_with_fallback(
    primary: impl FnOnce() -> ForgeResult<Vec<u8>>,
    retry: impl FnOnce() -> ForgeResult<Vec<u8>>,
) -> ForgeResult<Vec<u8>> {
    match primary() {
        Ok(bytes) => Ok(bytes),
        Err(first) => {
            tracing::warn!(error = %first, "tuned encode failed, retrying with raw encoder");
            retry().map_err(|second| {
                ForgeError::encode(format!("{first}; raw retry failed: {second}"))
            })
        }
    }
}

fn encode_tuned(raster: &Raster, container: Container, policy: &TierPolicy) -> ForgeResult<Vec<u8>> {
    let mut buf = Vec::new();
    let cursor = Cursor::new(&mut buf);
    let written = match container {
        Container::Jpeg => {
            let rgb = flatten_over_white(raster)?;
            let rgb = match policy.sharpen {
                Some((sigma, threshold)) => image::imageops::unsharpen(&rgb, sigma, threshold),
                None => rgb,
            };
            rgb.write_with_encoder(JpegEncoder::new_with_quality(cursor, policy.jpeg_quality))
        }
        Container::Png => {
            let rgba = straight_rgba(raster)?;
            let rgba = match policy.sharpen {
                Some((sigma, threshold)) => image::imageops::unsharpen(&rgba, sigma, threshold),
                None => rgba,
            };
            rgba.write_with_encoder(PngEncoder::new_with_quality(
                cursor,
                policy.png_compression,
                PngFilter::Adaptive,
            ))
        }
        Container::Webp => {
            let rgba = straight_rgba(raster)?;
            let rgba = match policy.sharpen {
                Some((sigma, threshold)) => image::imageops::unsharpen(&rgba, sigma, threshold),
                None => rgba,
            };
            rgba.write_with_encoder(WebPEncoder::new_lossless(cursor))
        }
    };
    written.map_err(|e| ForgeError::encode(format!("{container:?} encode failed: {e}")))?;
    Ok(buf)
}

fn encode_raw(raster: &Raster, container: Container) -> ForgeResult<Vec<u8>> {
    let (img, format) = match container {
        Container::Jpeg => (
            DynamicImage::ImageRgb8(flatten_over_white(raster)?),
            ImageFormat::Jpeg,
        ),
        Container::Png => (
            DynamicImage::ImageRgba8(straight_rgba(raster)?),
            ImageFormat::Png,
        ),
        Container::Webp => (
            DynamicImage::ImageRgba8(straight_rgba(raster)?),
            ImageFormat::WebP,
        ),
    };
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format)
        .map_err(|e| ForgeError::encode(format!("raw {container:?} encode failed: {e}")))?;
    Ok(buf)
}

fn straight_rgba(raster: &Raster) -> ForgeResult<RgbaImage> {
    RgbaImage::from_raw(raster.width, raster.height, raster.to_straight_rgba())
        .ok_or_else(|| ForgeError::encode("raster size does not match its pixel data"))
}

/// Composite premultiplied pixels over opaque white and drop alpha.
fn flatten_over_white(raster: &Raster) -> ForgeResult<RgbImage> {
    let mut rgb = Vec::with_capacity(raster.data.len() / 4 * 3);
    for px in raster.data.chunks_exact(4) {
        let bg = 255 - px[3];
        rgb.extend_from_slice(&[
            px[0].saturating_add(bg),
            px[1].saturating_add(bg),
            px[2].saturating_add(bg),
        ]);
    }
    RgbImage::from_raw(raster.width, raster.height, rgb)
        .ok_or_else(|| ForgeError::encode("raster size does not match its pixel data"))
}

#[cfg(test)]
#[path = "../../tests/unit/encode/pipeline.rs"]
mod tests;
