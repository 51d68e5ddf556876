use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::foundation::error::{ForgeError, ForgeResult};

const FONT_EXTENSIONS: [&str; 3] = ["ttf", "otf", "ttc"];

/// One registered font file.
#[derive(Clone)]
pub struct FontFace {
    family: String,
    weight: u16,
    italic: bool,
    key: u64,
    bytes: Arc<Vec<u8>>,
    data: vello_cpu::peniko::FontData,
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace")
            .field("family", &self.family)
            .field("weight", &self.weight)
            .field("italic", &self.italic)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl FontFace {
    /// Family name as reported by the font's name table.
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Weight class from the font's OS/2 table.
    pub fn weight(&self) -> u16 {
        self.weight
    }

    /// Italic or oblique face.
    pub fn is_italic(&self) -> bool {
        self.italic
    }

    /// Content hash of the font bytes; identifies the face across registries.
    pub(crate) fn key(&self) -> u64 {
        self.key
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn data(&self) -> &vello_cpu::peniko::FontData {
        &self.data
    }
}

/// Process-wide set of fonts available to text fields.
///
/// Built once at startup with [`FontRegistry::load`] and shared (behind `Arc`) by every render.
/// Only registered fonts are ever used, so output never depends on host system fonts.
#[derive(Clone, Debug, Default)]
pub struct FontRegistry {
    faces: Vec<FontFace>,
}

impl FontRegistry {
    /// Registry without any fonts. Text fields fail (and are skipped) against it.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every font file named by `paths`.
    ///
    /// Directories are scanned (non-recursively, in sorted order) for `.ttf`/`.otf`/`.ttc`
    /// files. Unreadable or unparsable files are skipped with a warning; it is an error only when
    /// nothing at all could be registered.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> ForgeResult<Self> {
        let mut reg = Self::empty();
        for p in paths {
            for file in font_files(p.as_ref()) {
                let bytes = match std::fs::read(&file) {
                    Ok(b) => b,
                    Err(e) => {
                        tracing::warn!(path = %file.display(), error = %e, "skipping unreadable font");
                        continue;
                    }
                };
                if let Err(e) = reg.register_bytes(bytes) {
                    tracing::warn!(path = %file.display(), error = %e, "skipping font");
                }
            }
        }
        if reg.faces.is_empty() {
            return Err(ForgeError::font("no usable fonts found in the given paths"));
        }
        Ok(reg)
    }

    /// Register raw font bytes and return the family name it was registered under.
    ///
    /// Several files may share a family (Regular, Bold, ...); each stays a separate face.
    pub fn register_bytes(&mut self, bytes: Vec<u8>) -> ForgeResult<String> {
        let (family, weight, italic) = face_info_of(&bytes)?;
        let key = xxhash_rust::xxh3::xxh3_64(&bytes);
        let bytes = Arc::new(bytes);
        let data = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(bytes.as_ref().clone()),
            0,
        );
        self.faces.push(FontFace {
            family: family.clone(),
            weight,
            italic,
            key,
            bytes,
            data,
        });
        Ok(family)
    }

    /// Registered faces in registration order.
    pub fn faces(&self) -> &[FontFace] {
        &self.faces
    }

    /// Return `true` when no fonts are registered.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Resolve a family name (case-insensitive) at normal weight.
    pub fn resolve(&self, family: &str) -> Option<&FontFace> {
        self.resolve_weighted(family, 400)
    }

    /// Resolve a family name (case-insensitive) to its face closest to `weight`.
    ///
    /// Upright faces win over italic ones, then the smallest weight distance, then
    /// registration order. Unknown and generic families (`sans-serif`, `serif`, ...) fall back
    /// to the family of the first registered face; `None` only for an empty registry.
    pub fn resolve_weighted(&self, family: &str, weight: u16) -> Option<&FontFace> {
        let wanted = family.trim().trim_matches(|c| c == '"' || c == '\'');
        let anchor = self
            .faces
            .iter()
            .find(|f| f.family.eq_ignore_ascii_case(wanted))
            .or_else(|| self.faces.first())?;
        self.faces
            .iter()
            .filter(|f| f.family == anchor.family)
            .min_by_key(|f| (f.italic, f.weight.abs_diff(weight)))
    }
}

fn font_files(path: &Path) -> Vec<PathBuf> {
    if !path.is_dir() {
        return vec![path.to_path_buf()];
    }
    let Ok(rd) = std::fs::read_dir(path) else {
        tracing::warn!(path = %path.display(), "font directory is not readable");
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = rd
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| FONT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        })
        .collect();
    files.sort();
    files
}

/// Family name, weight class and italic flag of the first face in `bytes`.
fn face_info_of(bytes: &[u8]) -> ForgeResult<(String, u16, bool)> {
    let mut ctx = parley::FontContext::default();
    let families = ctx
        .collection
        .register_fonts(parley::fontique::Blob::from(bytes.to_vec()), None);
    let (family_id, infos) = families
        .first()
        .ok_or_else(|| ForgeError::font("no font families registered from font bytes"))?;
    let (weight, italic) = infos.first().map_or((400, false), |info| {
        (
            info.weight().value().clamp(1.0, 1000.0).round() as u16,
            !matches!(info.style(), parley::fontique::FontStyle::Normal),
        )
    });
    let family = ctx
        .collection
        .family_name(*family_id)
        .map(str::to_owned)
        .ok_or_else(|| ForgeError::font("registered font family has no name"))?;
    Ok((family, weight, italic))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/fonts.rs"]
mod tests;
