use std::sync::Arc;
use std::time::Duration;

use crate::assets::color::Color;
use crate::assets::decode::decode_image_resized;
use crate::assets::source::{ImageSource, fetch_with_timeout};
use crate::foundation::core::{Canvas, Raster};
use crate::foundation::error::{ForgeError, ForgeResult};
use crate::scene::request::BackgroundRef;

/// Frame color of the blank fallback canvas.
pub const FALLBACK_FRAME: Color = Color::rgb(204, 204, 204);

/// Background raster plus whether the blank fallback was used.
#[derive(Clone, Debug)]
pub(crate) struct LoadedBackground {
    pub(crate) raster: Raster,
    pub(crate) fallback: bool,
}

/// Fetch and decode the background at exactly `canvas` size.
pub(crate) fn load_background(
    background: &BackgroundRef,
    images: &Arc<dyn ImageSource>,
    timeout: Duration,
    canvas: Canvas,
) -> ForgeResult<Raster> {
    let bytes = match background {
        BackgroundRef::Reference(r) if r.trim().is_empty() => {
            return Err(ForgeError::background("empty background reference"));
        }
        BackgroundRef::Bytes(b) => Arc::clone(b),
        BackgroundRef::Reference(r) => Arc::new(
            fetch_with_timeout(images, r, timeout)
                .map_err(|e| ForgeError::background(e.to_string()))?,
        ),
    };
    decode_image_resized(&bytes, canvas.width, canvas.height)
        .map_err(|e| ForgeError::background(e.to_string()))
}

/// Like [`load_background`], but never fails: errors yield [`blank_canvas`].
pub(crate) fn load_or_blank(
    background: &BackgroundRef,
    images: &Arc<dyn ImageSource>,
    timeout: Duration,
    canvas: Canvas,
) -> LoadedBackground {
    match load_background(background, images, timeout, canvas) {
        Ok(raster) => LoadedBackground {
            raster,
            fallback: false,
        },
        Err(e) => {
            tracing::warn!(error = %e, "using blank background");
            LoadedBackground {
                raster: blank_canvas(canvas),
                fallback: true,
            }
        }
    }
}

/// Opaque white canvas with a 1px [`FALLBACK_FRAME`] border.
pub fn blank_canvas(canvas: Canvas) -> Raster {
    let mut r = Raster::filled(canvas, Color::WHITE.to_premul());
    let frame = FALLBACK_FRAME.to_premul().to_array();
    let (w, h) = (canvas.width as usize, canvas.height as usize);
    for y in 0..h {
        for x in 0..w {
            if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
                let i = (y * w + x) * 4;
                r.data[i..i + 4].copy_from_slice(&frame);
            }
        }
    }
    r
}

#[cfg(test)]
#[path = "../../tests/unit/render/background.rs"]
mod tests;
