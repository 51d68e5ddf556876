use serde::Serialize;

use crate::foundation::core::{PixelBox, Raster};
use crate::layout::resolver::{LayoutContext, ResolvedField};
use crate::render::cpu::CpuRasterizer;
use crate::render::field::{FieldEnv, render_field};
use crate::scene::field::Field;
use crate::scene::request::ValueMap;

/// A field that was dropped from the layer stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedField {
    /// Field name.
    pub name: String,
    /// Why it was skipped.
    pub reason: String,
}

/// Recoverable conditions observed while composing one image.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RenderDiagnostics {
    /// The background could not be loaded and a blank canvas was used.
    pub background_fallback: bool,
    /// Crop applied by content trimming, if any.
    pub trimmed: Option<PixelBox>,
    /// Number of fields drawn.
    pub drawn: usize,
    /// Fields that failed to draw.
    pub skipped: Vec<SkippedField>,
}

/// Visible fields in stacking order: `(depth, display_order)` ascending, list order on ties.
pub fn order_layers(fields: &[Field]) -> Vec<&Field> {
    let mut layers: Vec<&Field> = fields.iter().filter(|f| f.visible).collect();
    layers.sort_by_key(|f| (f.depth, f.display_order));
    layers
}

/// Order and resolve fields, dropping those without a usable value.
pub(crate) fn resolve_layers(
    layout: &LayoutContext,
    fields: &[Field],
    values: &ValueMap,
) -> Vec<ResolvedField> {
    order_layers(fields)
        .into_iter()
        .filter_map(|f| {
            let resolved = layout.resolve(f, values);
            if resolved.is_none() {
                tracing::debug!(field = %f.name, kind = f.kind_tag(), "no value, skipping field");
            }
            resolved
        })
        .collect()
}

/// Drives the field renderer over a resolved layer stack.
pub(crate) struct Compositor<'a> {
    pub(crate) env: FieldEnv<'a>,
}

impl Compositor<'_> {
    /// Draw `layers` bottom to top. A failing field is logged, recorded and skipped.
    pub(crate) fn render(
        &self,
        rast: &mut CpuRasterizer,
        canvas: &mut Raster,
        layers: &[ResolvedField],
        diag: &mut RenderDiagnostics,
    ) {
        for layer in layers {
            match render_field(rast, &self.env, layer, canvas) {
                Ok(()) => diag.drawn += 1,
                Err(e) => {
                    tracing::warn!(field = %layer.name, error = %e, "field render failed, skipping");
                    diag.skipped.push(SkippedField {
                        name: layer.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
