use std::fmt;

use xxhash_rust::xxh3::Xxh3;

use crate::foundation::core::Canvas;
use crate::assets::color::Color;
use crate::scene::field::{Field, FieldKind, ImageStyle, Shadow, TextStyle};
use crate::scene::request::{BackgroundRef, Container, FIELDS_OVERRIDE_KEY, QualityTier, ValueMap};

const XXH3_SEED: u64 = 0x8b5ad4a0c7d8e9f1;

/// Stable 128-bit render fingerprint; the result cache key and output file stem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    pub(crate) hi: u64,
    pub(crate) lo: u64,
}

impl Fingerprint {
    /// 32 lowercase hex characters.
    pub fn to_hex(self) -> String {
        format!("{:016x}{:016x}", self.hi, self.lo)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}{:016x}", self.hi, self.lo)
    }
}

/// Everything that identifies one render's output.
#[derive(Clone, Copy, Debug)]
pub struct FingerprintInput<'a> {
    /// Template identity.
    pub template: &'a str,
    /// Background reference or inline bytes.
    pub background: &'a BackgroundRef,
    /// Effective field list (after any override).
    pub fields: &'a [Field],
    /// Value map.
    pub values: &'a ValueMap,
    /// Quality tier.
    pub tier: QualityTier,
    /// Normalized output canvas.
    pub canvas: Canvas,
    /// Requested container, if any.
    pub container: Option<Container>,
}

/// Compute the fingerprint of a normalized render request.
///
/// Every field, style included, is hashed. Value entries that are not scalars are not.
pub fn fingerprint(input: &FingerprintInput<'_>) -> Fingerprint {
    let mut h = StableHasher::new();
    h.write_str(input.template);
    match input.background {
        BackgroundRef::Reference(r) => {
            h.write_u8(0);
            h.write_str(r);
        }
        BackgroundRef::Bytes(b) => {
            h.write_u8(1);
            h.write_u64(xxhash_rust::xxh3::xxh3_64_with_seed(b, XXH3_SEED));
        }
    }

    h.write_u32(input.fields.len() as u32);
    for f in input.fields {
        write_field(&mut h, f);
    }

    h.write_str(input.tier.as_str());
    h.write_u32(input.canvas.width);
    h.write_u32(input.canvas.height);
    match input.container {
        None => h.write_u8(0),
        Some(c) => {
            h.write_u8(1);
            h.write_str(c.extension());
        }
    }

    // BTreeMap iteration is key-ordered.
    for (k, v) in input.values {
        if k == FIELDS_OVERRIDE_KEY {
            continue;
        }
        write_scalar(&mut h, k, v);
    }
    h.finish()
}

fn write_field(h: &mut StableHasher, f: &Field) {
    match &f.id {
        None => h.write_u8(0),
        Some(id) => {
            h.write_u8(1);
            h.write_str(id);
        }
    }
    h.write_str(&f.name);
    h.write_f64(f.position.x);
    h.write_f64(f.position.y);
    h.write_str(f.kind_tag());
    h.write_i32(f.depth);
    h.write_u32(f.display_order);
    h.write_f64(f.rotation_deg);
    h.write_bool(f.visible);
    match &f.kind {
        FieldKind::Text { style } => write_text_style(h, style),
        FieldKind::StaticText { content, style } => {
            h.write_str(content);
            write_text_style(h, style);
        }
        FieldKind::Image { style } => write_image_style(h, style),
        FieldKind::StaticImage { content, style } => {
            h.write_str(content);
            write_image_style(h, style);
        }
    }
}

fn write_text_style(h: &mut StableHasher, s: &TextStyle) {
    h.write_str(&s.font_family);
    h.write_f64(s.font_size);
    h.write_u32(u32::from(s.font_weight.0));
    write_color(h, s.color);
    h.write_u8(s.align as u8);
    h.write_u8(s.vertical_align as u8);
    h.write_f64(s.max_width);
    h.write_f64(s.line_height);
    write_shadow(h, &s.shadow);
}

fn write_image_style(h: &mut StableHasher, s: &ImageStyle) {
    h.write_f64(s.max_width);
    h.write_f64(s.max_height);
    h.write_bool(s.border);
    h.write_f64(s.border_width);
    write_color(h, s.border_color);
    h.write_bool(s.rounded);
    write_shadow(h, &s.shadow);
}

fn write_shadow(h: &mut StableHasher, s: &Shadow) {
    h.write_bool(s.enabled);
    write_color(h, s.color);
    h.write_f64(s.blur);
    h.write_f64(s.offset_x);
    h.write_f64(s.offset_y);
}

fn write_color(h: &mut StableHasher, c: Color) {
    h.write_bytes(&[c.r, c.g, c.b, c.a]);
}

fn write_scalar(h: &mut StableHasher, key: &str, v: &serde_json::Value) {
    match v {
        serde_json::Value::String(s) => {
            h.write_str(key);
            h.write_u8(b's');
            h.write_str(s);
        }
        serde_json::Value::Number(n) => {
            h.write_str(key);
            h.write_u8(b'n');
            h.write_str(&n.to_string());
        }
        serde_json::Value::Bool(b) => {
            h.write_str(key);
            h.write_u8(b'b');
            h.write_bool(*b);
        }
        serde_json::Value::Null | serde_json::Value::Array(_) | serde_json::Value::Object(_) => {}
    }
}

struct StableHasher {
    inner: Xxh3,
}

impl StableHasher {
    fn new() -> Self {
        Self {
            inner: Xxh3::with_seed(XXH3_SEED),
        }
    }

    fn write_bytes(&mut self, b: &[u8]) {
        self.inner.update(b);
    }

    fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_i32(&mut self, v: i32) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        self.write_u64(v.to_bits());
    }

    fn write_str(&mut self, s: &str) {
        self.write_u32(s.len() as u32);
        self.write_bytes(s.as_bytes());
    }

    fn finish(self) -> Fingerprint {
        let v = self.inner.digest128();
        Fingerprint {
            hi: (v >> 64) as u64,
            lo: v as u64,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/fingerprint.rs"]
mod tests;
