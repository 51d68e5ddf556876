use crate::foundation::error::{ForgeError, ForgeResult};
use crate::foundation::math::{premultiply_rgba8_in_place, unpremultiply_rgba8};

pub use kurbo::{Affine, Point, Rect, Vec2};

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Create a validated canvas; both dimensions must be non-zero.
    pub fn new(width: u32, height: u32) -> ForgeResult<Self> {
        if width == 0 || height == 0 {
            return Err(ForgeError::invalid_dimensions(
                i64::from(width),
                i64::from(height),
            ));
        }
        Ok(Self { width, height })
    }

    /// Total pixel count.
    pub fn area(self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red channel premultiplied by alpha.
    pub r: u8,
    /// Green channel premultiplied by alpha.
    pub g: u8,
    /// Blue channel premultiplied by alpha.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Convert straight-alpha RGBA8 into premultiplied RGBA8.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }

    /// Channels as an array.
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Axis-aligned integer pixel box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize)]
pub struct PixelBox {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelBox {
    /// Box covering a whole canvas.
    pub fn full(canvas: Canvas) -> Self {
        Self {
            x: 0,
            y: 0,
            width: canvas.width,
            height: canvas.height,
        }
    }
}

/// Row-major premultiplied RGBA8 raster.
///
/// This is the only pixel surface passed between pipeline stages. Every render call owns its own
/// rasters; nothing is shared across requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Premultiplied RGBA8 bytes, tightly packed.
    pub data: Vec<u8>,
}

impl Raster {
    /// Fully transparent raster.
    pub fn transparent(canvas: Canvas) -> Self {
        Self {
            width: canvas.width,
            height: canvas.height,
            data: vec![0; canvas.area() * 4],
        }
    }

    /// Raster filled with a single premultiplied color.
    pub fn filled(canvas: Canvas, color: Rgba8Premul) -> Self {
        let px = color.to_array();
        let mut data = Vec::with_capacity(canvas.area() * 4);
        for _ in 0..canvas.area() {
            data.extend_from_slice(&px);
        }
        Self {
            width: canvas.width,
            height: canvas.height,
            data,
        }
    }

    /// Wrap premultiplied bytes, validating the length.
    pub fn from_premul(width: u32, height: u32, data: Vec<u8>) -> ForgeResult<Self> {
        let expected = (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4);
        if data.len() != expected {
            return Err(ForgeError::validation(format!(
                "raster byte len mismatch: got {}, expected {expected}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Premultiply straight-alpha RGBA8 bytes into a raster.
    pub fn from_straight(width: u32, height: u32, mut data: Vec<u8>) -> ForgeResult<Self> {
        premultiply_rgba8_in_place(&mut data);
        Self::from_premul(width, height, data)
    }

    /// Dimensions as a [`Canvas`].
    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    /// Premultiplied pixel at `(x, y)`; `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Straight-alpha copy of the pixel bytes, as expected by encoders.
    pub fn to_straight_rgba(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len());
        for px in self.data.chunks_exact(4) {
            out.extend_from_slice(&unpremultiply_rgba8([px[0], px[1], px[2], px[3]]));
        }
        out
    }

    /// Copy out a sub-rectangle. The box must lie inside the raster.
    pub fn crop(&self, b: PixelBox) -> ForgeResult<Self> {
        if b.width == 0
            || b.height == 0
            || b.x.saturating_add(b.width) > self.width
            || b.y.saturating_add(b.height) > self.height
        {
            return Err(ForgeError::validation(format!(
                "crop box {b:?} outside {}x{} raster",
                self.width, self.height
            )));
        }
        let stride = self.width as usize * 4;
        let row_len = b.width as usize * 4;
        let mut data = Vec::with_capacity(row_len * b.height as usize);
        for y in b.y..b.y + b.height {
            let off = y as usize * stride + b.x as usize * 4;
            data.extend_from_slice(&self.data[off..off + row_len]);
        }
        Ok(Self {
            width: b.width,
            height: b.height,
            data,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
