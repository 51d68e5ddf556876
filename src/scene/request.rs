use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::foundation::core::Canvas;
use crate::foundation::error::{ForgeError, ForgeResult};
use crate::scene::field::Field;

/// Value-map key that, when holding an array of fields, replaces the template's field list for a
/// single render.
pub const FIELDS_OVERRIDE_KEY: &str = "__fields";

/// Field name -> value. Strings feed text fields and name images for image fields.
pub type ValueMap = BTreeMap<String, serde_json::Value>;

/// Named encode preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    /// Small, fast, lossy.
    Preview,
    /// Medium width, lossy.
    Low,
    /// Full size, lossy.
    #[default]
    Medium,
    /// Full size, sharpened, lossless by default.
    High,
    /// Full size (content-trimmed), maximum-effort lossless.
    Download,
}

impl QualityTier {
    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Download => "download",
        }
    }
}

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    /// PNG (lossless).
    Png,
    /// JPEG (lossy, no alpha).
    #[serde(alias = "jpg")]
    Jpeg,
    /// WebP (lossless encoder).
    Webp,
}

impl Container {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }

    /// MIME type.
    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }
}

/// Canvas-size policy applied to every [`OutputRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizePolicy {
    /// Width used when the caller gives none.
    pub default_width: u32,
    /// Height used when the caller gives none.
    pub default_height: u32,
    /// Width forced for the preview tier.
    pub preview_width: u32,
}

impl Default for SizePolicy {
    fn default() -> Self {
        Self {
            default_width: 2000,
            default_height: 1414,
            preview_width: 800,
        }
    }
}

/// Caller-requested output parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRequest {
    /// Quality tier.
    #[serde(default)]
    pub quality: QualityTier,
    /// Requested width; signed so that bad input surfaces as `InvalidDimensions`.
    #[serde(default)]
    pub width: Option<i64>,
    /// Requested height.
    #[serde(default)]
    pub height: Option<i64>,
    /// Requested container; the tier default applies when absent.
    #[serde(default)]
    pub container: Option<Container>,
}

impl OutputRequest {
    /// Request with a tier and explicit dimensions.
    pub fn sized(quality: QualityTier, width: i64, height: i64) -> Self {
        Self {
            quality,
            width: Some(width),
            height: Some(height),
            container: None,
        }
    }

    /// Resolve the canvas actually rendered.
    ///
    /// Missing dimensions follow the default aspect ratio; the preview tier always renders at
    /// the preview width with the height scaled proportionally.
    pub fn resolve_canvas(&self, policy: SizePolicy) -> ForgeResult<Canvas> {
        let dw = f64::from(policy.default_width);
        let dh = f64::from(policy.default_height);
        let (w, h) = match (self.width, self.height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, (w as f64 * dh / dw).round() as i64),
            (None, Some(h)) => ((h as f64 * dw / dh).round() as i64, h),
            (None, None) => (
                i64::from(policy.default_width),
                i64::from(policy.default_height),
            ),
        };
        if w <= 0 || h <= 0 || w > i64::from(u16::MAX) || h > i64::from(u16::MAX) {
            return Err(ForgeError::invalid_dimensions(w, h));
        }

        let (w, h) = if self.quality == QualityTier::Preview && w != i64::from(policy.preview_width)
        {
            let pw = i64::from(policy.preview_width);
            let ph = ((h as f64) * (pw as f64) / (w as f64)).round().max(1.0) as i64;
            (pw, ph)
        } else {
            (w, h)
        };

        Canvas::new(w as u32, h as u32)
    }
}

/// Background template reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackgroundRef {
    /// Reference resolved through the engine's image source.
    Reference(String),
    /// Bytes already in hand; not representable in JSON.
    #[serde(skip)]
    Bytes(Arc<Vec<u8>>),
}

/// One unit of render work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    /// Template identity (participates in the cache key).
    pub template: String,
    /// Background image.
    pub background: BackgroundRef,
    /// Template field list, in declaration order.
    #[serde(default)]
    pub fields: Vec<Field>,
    /// Per-render values.
    #[serde(default)]
    pub values: ValueMap,
    /// Output parameters.
    #[serde(default)]
    pub output: OutputRequest,
}

impl RenderRequest {
    /// Parse a request from JSON text.
    pub fn from_json_str(s: &str) -> ForgeResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// The field list this render uses.
    ///
    /// An array under [`FIELDS_OVERRIDE_KEY`] replaces the template list. A malformed override is
    /// ignored (with a warning) rather than failing the render.
    pub fn effective_fields(&self) -> Cow<'_, [Field]> {
        let Some(raw) = self.values.get(FIELDS_OVERRIDE_KEY) else {
            return Cow::Borrowed(&self.fields);
        };
        match serde_json::from_value::<Vec<Field>>(raw.clone()) {
            Ok(fields) => Cow::Owned(fields),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed field-list override");
                Cow::Borrowed(&self.fields)
            }
        }
    }
}

/// Scalar value as display text; `None` for missing, null, empty, or non-scalar values.
pub(crate) fn value_text<'a>(values: &'a ValueMap, name: &str) -> Option<Cow<'a, str>> {
    match values.get(name)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(Cow::Borrowed(s.as_str())),
        serde_json::Value::Number(n) => Some(Cow::Owned(n.to_string())),
        serde_json::Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        _ => None,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/request.rs"]
mod tests;
