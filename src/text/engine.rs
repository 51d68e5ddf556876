use std::borrow::Cow;
use std::collections::HashMap;

use crate::assets::fonts::FontFace;
use crate::foundation::error::{ForgeError, ForgeResult};
use crate::text::shaper::TextMeasure;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// RGBA8 brush color used by Parley text layout.
pub(crate) struct TextBrushRgba8 {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

/// Stateful helper for building single-line Parley layouts from registered faces.
///
/// Each face gets its own font context, keyed by its content hash, so shaping always uses the
/// exact file whose glyphs are painted. Faces sharing a family never share a context.
pub(crate) struct TextLayoutEngine {
    font_ctxs: HashMap<u64, (parley::FontContext, String)>,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
}

impl Default for TextLayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayoutEngine {
    pub(crate) fn new() -> Self {
        Self {
            font_ctxs: HashMap::new(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    /// Shape one line of text without wrapping.
    pub(crate) fn layout_line(
        &mut self,
        face: &FontFace,
        text: &str,
        size_px: f32,
        weight: u16,
        brush: TextBrushRgba8,
    ) -> ForgeResult<parley::Layout<TextBrushRgba8>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(ForgeError::validation(
                "text size_px must be finite and > 0",
            ));
        }

        if !self.font_ctxs.contains_key(&face.key()) {
            let mut font_ctx = parley::FontContext::default();
            let families = font_ctx
                .collection
                .register_fonts(parley::fontique::Blob::from(face.bytes().to_vec()), None);
            let family_id = families
                .first()
                .map(|(id, _)| *id)
                .ok_or_else(|| ForgeError::font("no font families registered from font bytes"))?;
            let family_name = font_ctx
                .collection
                .family_name(family_id)
                .ok_or_else(|| ForgeError::font("registered font family has no name"))?
                .to_string();
            self.font_ctxs.insert(face.key(), (font_ctx, family_name));
        }
        let Some((font_ctx, family_name)) = self.font_ctxs.get_mut(&face.key()) else {
            return Err(ForgeError::font(format!(
                "font context for '{}' missing",
                face.family()
            )));
        };

        let mut builder = self.layout_ctx.ranged_builder(font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(Cow::Owned(family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::FontWeight(
            parley::style::FontWeight::new(f32::from(weight)),
        ));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }
}

/// [`TextMeasure`] backed by Parley shaping against one face.
pub(crate) struct ParleyMeasure<'a> {
    pub(crate) engine: &'a mut TextLayoutEngine,
    pub(crate) face: &'a FontFace,
    pub(crate) size_px: f32,
    pub(crate) weight: u16,
}

impl TextMeasure for ParleyMeasure<'_> {
    fn measure(&mut self, text: &str) -> ForgeResult<f64> {
        let layout = self.engine.layout_line(
            self.face,
            text,
            self.size_px,
            self.weight,
            TextBrushRgba8::default(),
        )?;
        Ok(f64::from(layout.width()))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/text/engine.rs"]
mod tests;
