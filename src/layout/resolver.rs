use std::borrow::Cow;

use crate::assets::color::Color;
use crate::foundation::core::{Canvas, PixelBox, Point, Vec2};
use crate::foundation::error::{ForgeError, ForgeResult};
use crate::scene::field::{Field, FieldKind, HAlign, ImageStyle, Shadow, TextStyle, VAlign};
use crate::scene::request::{ValueMap, value_text};

/// Canvas width the authoring preview lays out at.
pub const REFERENCE_WIDTH: f64 = 1000.0;
/// Smallest logical font size, before scaling.
pub const MIN_FONT_SIZE: f64 = 14.0;
/// Largest logical font size, before scaling.
pub const MAX_FONT_SIZE: f64 = 60.0;

/// Per-request layout frame: canvas size, scale factor and crop origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutContext {
    canvas: Canvas,
    scale: f64,
    origin: (u32, u32),
}

impl LayoutContext {
    /// Validate requested dimensions and compute the scale factor.
    pub fn from_dimensions(width: i64, height: i64) -> ForgeResult<Self> {
        if width <= 0 || height <= 0 || width > i64::from(u32::MAX) || height > i64::from(u32::MAX)
        {
            return Err(ForgeError::invalid_dimensions(width, height));
        }
        Self::new(Canvas::new(width as u32, height as u32)?)
    }

    /// Layout frame for an already-validated canvas.
    pub fn new(canvas: Canvas) -> ForgeResult<Self> {
        if canvas.width == 0 || canvas.height == 0 {
            return Err(ForgeError::invalid_dimensions(
                i64::from(canvas.width),
                i64::from(canvas.height),
            ));
        }
        Ok(Self {
            canvas,
            scale: f64::from(canvas.width) / REFERENCE_WIDTH,
            origin: (0, 0),
        })
    }

    /// Re-base every resolved coordinate onto a crop of the canvas.
    pub fn with_crop(mut self, crop: PixelBox) -> Self {
        self.origin = (crop.x, crop.y);
        self
    }

    /// Output width over [`REFERENCE_WIDTH`].
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Full (uncropped) canvas.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Integer pixel anchor for a percent position, relative to the crop origin.
    pub fn anchor_px(&self, x_pct: f64, y_pct: f64) -> (i64, i64) {
        let px = (x_pct / 100.0 * f64::from(self.canvas.width)).round() as i64;
        let py = (y_pct / 100.0 * f64::from(self.canvas.height)).round() as i64;
        (px - i64::from(self.origin.0), py - i64::from(self.origin.1))
    }

    /// Clamp a logical font size and scale it to output pixels.
    pub fn font_px(&self, logical: f64) -> f64 {
        let logical = if logical.is_finite() {
            logical
        } else {
            MIN_FONT_SIZE
        };
        logical.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE) * self.scale
    }

    fn shadow(&self, s: &Shadow) -> Option<ResolvedShadow> {
        if !s.enabled || s.color.a == 0 {
            return None;
        }
        Some(ResolvedShadow {
            color: s.color,
            blur_px: (s.blur.max(0.0)) * self.scale,
            offset: Vec2::new(s.offset_x * self.scale, s.offset_y * self.scale),
        })
    }

    /// Resolve one visible field against the value map.
    ///
    /// Returns `None` when a value-backed field has no usable value; such fields are skipped,
    /// never failed.
    pub fn resolve(&self, field: &Field, values: &ValueMap) -> Option<ResolvedField> {
        let content = match &field.kind {
            FieldKind::Text { style } => {
                let text = value_text(values, &field.name)?;
                ResolvedContent::Text(self.resolve_text(text, style))
            }
            FieldKind::StaticText { content, style } => {
                if content.trim().is_empty() {
                    return None;
                }
                ResolvedContent::Text(self.resolve_text(Cow::Borrowed(content), style))
            }
            FieldKind::Image { style } => {
                let reference = value_text(values, &field.name)?;
                ResolvedContent::Image(self.resolve_image(reference.into_owned(), style))
            }
            FieldKind::StaticImage { content, style } => {
                if content.trim().is_empty() {
                    return None;
                }
                ResolvedContent::Image(self.resolve_image(content.clone(), style))
            }
        };

        let (px, py) = self.anchor_px(field.position.x, field.position.y);
        Some(ResolvedField {
            name: field.name.clone(),
            anchor: Point::new(px as f64, py as f64),
            rotation_rad: field.rotation_deg.to_radians(),
            depth: field.depth,
            display_order: field.display_order,
            content,
        })
    }

    fn resolve_text(&self, text: Cow<'_, str>, style: &TextStyle) -> ResolvedText {
        let font_size_px = self.font_px(style.font_size);
        let line_height = if style.line_height.is_finite() && style.line_height > 0.0 {
            style.line_height
        } else {
            TextStyle::default().line_height
        };
        ResolvedText {
            text: text.into_owned(),
            font_family: style.font_family.clone(),
            font_size_px,
            font_weight: style.font_weight.0,
            color: style.color,
            align: style.align,
            vertical_align: style.vertical_align,
            max_width_px: style.max_width / 100.0 * f64::from(self.canvas.width),
            line_height_px: font_size_px * line_height,
            shadow: self.shadow(&style.shadow),
        }
    }

    fn resolve_image(&self, reference: String, style: &ImageStyle) -> ResolvedImage {
        ResolvedImage {
            reference,
            // Never larger than the canvas itself.
            max_width_px: (style.max_width.clamp(0.0, 100.0) / 100.0)
                * f64::from(self.canvas.width),
            max_height_px: (style.max_height.clamp(0.0, 100.0) / 100.0)
                * f64::from(self.canvas.height),
            border: style.border.then(|| ResolvedBorder {
                width_px: (style.border_width * self.scale)
                    .min(f64::from(self.canvas.width.max(self.canvas.height)))
                    .max(1.0),
                color: style.border_color,
            }),
            rounded: style.rounded,
            shadow: self.shadow(&style.shadow),
        }
    }
}

/// Largest box with the source aspect ratio that fits inside `max_w` x `max_h`.
///
/// The limiting dimension is chosen by the smaller of the two ratios and the result is
/// floored, so it never exceeds either limit. Degenerate inputs yield `None`.
pub fn fit_box(src_w: u32, src_h: u32, max_w: f64, max_h: f64) -> Option<(u32, u32)> {
    if src_w == 0 || src_h == 0 || max_w.is_nan() || max_h.is_nan() || max_w < 1.0 || max_h < 1.0 {
        return None;
    }
    let sw = f64::from(src_w);
    let sh = f64::from(src_h);
    let ratio = (max_w / sw).min(max_h / sh);
    let w = (sw * ratio).floor().max(1.0);
    let h = (sh * ratio).floor().max(1.0);
    Some((w as u32, h as u32))
}

/// A field with every style default applied and every size in output pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    /// Field name (for diagnostics).
    pub name: String,
    /// Anchor in output pixels, relative to the (possibly cropped) canvas.
    pub anchor: Point,
    /// Rotation about the anchor.
    pub rotation_rad: f64,
    /// Layer index.
    pub depth: i32,
    /// Tie-break among equal depths.
    pub display_order: u32,
    /// What to draw.
    pub content: ResolvedContent,
}

/// Drawable payload of a resolved field.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedContent {
    /// Text block.
    Text(ResolvedText),
    /// Raster image.
    Image(ResolvedImage),
}

/// Concrete text parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedText {
    /// Text to wrap and draw.
    pub text: String,
    /// Requested family.
    pub font_family: String,
    /// Clamped and scaled font size.
    pub font_size_px: f64,
    /// Numeric weight.
    pub font_weight: u16,
    /// Fill color.
    pub color: Color,
    /// Horizontal alignment.
    pub align: HAlign,
    /// Vertical alignment.
    pub vertical_align: VAlign,
    /// Wrap width; `<= 0` means unconstrained.
    pub max_width_px: f64,
    /// Distance between consecutive baselines.
    pub line_height_px: f64,
    /// Optional drop shadow.
    pub shadow: Option<ResolvedShadow>,
}

/// Concrete image parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImage {
    /// Image reference for the image source.
    pub reference: String,
    /// Box width limit.
    pub max_width_px: f64,
    /// Box height limit.
    pub max_height_px: f64,
    /// Optional border stroke.
    pub border: Option<ResolvedBorder>,
    /// Clip to a circle.
    pub rounded: bool,
    /// Optional drop shadow.
    pub shadow: Option<ResolvedShadow>,
}

/// Border stroke in output pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedBorder {
    /// Stroke width.
    pub width_px: f64,
    /// Stroke color.
    pub color: Color,
}

/// Drop shadow in output pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedShadow {
    /// Shadow color.
    pub color: Color,
    /// Blur amount (twice the Gaussian sigma).
    pub blur_px: f64,
    /// Offset in canvas space.
    pub offset: Vec2,
}

#[cfg(test)]
#[path = "../../tests/unit/layout/resolver.rs"]
mod tests;
