//! certiforge composites typed fields onto a background template and encodes the result.
//!
//! A render is described by a [`RenderRequest`]: a background, an ordered field list and a
//! value map. [`RenderEngine::render`] lays the fields out against a 1000 px reference width,
//! draws them in `(depth, display_order)` order, encodes at the requested [`QualityTier`] and
//! caches the output under a content [`Fingerprint`].
//!
//! - Build a [`FontRegistry`] and an [`ImageSource`] once
//! - Create a [`RenderEngine`] from [`EngineOpts`]
//! - Call [`RenderEngine::render`] from any number of threads
#![forbid(unsafe_code)]

mod assets;
mod foundation;

pub(crate) mod cache;
pub(crate) mod encode;
pub(crate) mod layout;
pub(crate) mod render;
pub(crate) mod scene;
pub(crate) mod session;
pub(crate) mod text;

pub use crate::foundation::core::{Affine, Canvas, PixelBox, Point, Raster, Rgba8Premul, Vec2};
pub use crate::foundation::error::{ForgeError, ForgeResult};

pub use crate::assets::color::Color;
pub use crate::assets::fonts::{FontFace, FontRegistry};
pub use crate::assets::source::{FsImageSource, ImageSource, MemoryImageSource};
pub use crate::cache::fingerprint::{Fingerprint, FingerprintInput, fingerprint};
pub use crate::cache::store::{
    CacheBackend, CacheOpts, CacheStats, CachedRender, NoCache, ResultCache,
};
pub use crate::encode::pipeline::{EncodedImage, TierPolicy, encode};
pub use crate::layout::resolver::{
    LayoutContext, MAX_FONT_SIZE, MIN_FONT_SIZE, REFERENCE_WIDTH, ResolvedBorder,
    ResolvedContent, ResolvedField, ResolvedImage, ResolvedShadow, ResolvedText, fit_box,
};
pub use crate::render::background::{FALLBACK_FRAME, blank_canvas};
pub use crate::render::compositor::{RenderDiagnostics, SkippedField, order_layers};
pub use crate::render::trim::{TrimResult, trim};
pub use crate::scene::field::{
    Field, FieldKind, FontWeight, HAlign, ImageStyle, Position, Shadow, TextStyle, VAlign,
};
pub use crate::scene::request::{
    BackgroundRef, Container, FIELDS_OVERRIDE_KEY, OutputRequest, QualityTier, RenderRequest,
    SizePolicy, ValueMap,
};
pub use crate::session::config::EngineOpts;
pub use crate::session::render_engine::{EngineStats, RenderEngine, RenderOutput};
pub use crate::text::shaper::{MemoMeasure, TextMeasure, wrap};
