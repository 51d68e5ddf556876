use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::time::Duration;

use crate::foundation::error::{ForgeError, ForgeResult};

/// Capability that turns an image reference into bytes.
///
/// Reference resolution (paths, URLs, object-store keys, fallbacks, placeholders) belongs to the
/// implementor. The engine only ever sees "bytes or error".
pub trait ImageSource: Send + Sync {
    /// Resolve `reference` to encoded image bytes.
    fn fetch(&self, reference: &str) -> ForgeResult<Vec<u8>>;
}

/// Filesystem-backed [`ImageSource`] rooted at a directory.
#[derive(Clone, Debug)]
pub struct FsImageSource {
    root: PathBuf,
}

impl FsImageSource {
    /// Create a source resolving relative references under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ImageSource for FsImageSource {
    fn fetch(&self, reference: &str) -> ForgeResult<Vec<u8>> {
        let norm = normalize_rel_path(reference)?;
        let p = self.root.join(Path::new(&norm));
        std::fs::read(&p)
            .map_err(|e| ForgeError::fetch(format!("failed to read '{}': {e}", p.display())))
    }
}

/// In-memory [`ImageSource`], keyed by exact reference string.
#[derive(Clone, Debug, Default)]
pub struct MemoryImageSource {
    entries: HashMap<String, Arc<Vec<u8>>>,
}

impl MemoryImageSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register bytes under `reference`, replacing any previous entry.
    pub fn insert(&mut self, reference: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(reference.into(), Arc::new(bytes));
    }

    /// Builder-style [`MemoryImageSource::insert`].
    pub fn with(mut self, reference: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(reference, bytes);
        self
    }
}

impl ImageSource for MemoryImageSource {
    fn fetch(&self, reference: &str) -> ForgeResult<Vec<u8>> {
        self.entries
            .get(reference)
            .map(|b| b.as_ref().clone())
            .ok_or_else(|| ForgeError::fetch(format!("unknown image reference '{reference}'")))
    }
}

/// Normalize and validate source-relative paths.
///
/// The normalized result uses `/` separators, removes `.` segments, and rejects absolute paths or
/// parent traversals (`..`).
pub(crate) fn normalize_rel_path(source: &str) -> ForgeResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(ForgeError::validation("image paths must be relative"));
    }
    if s.is_empty() {
        return Err(ForgeError::validation("image path must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(ForgeError::validation("image paths must not contain '..'"));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(ForgeError::validation("image path must contain a file name"));
    }

    Ok(out.join("/"))
}

/// Fetch through `source` on a worker thread, giving up after `timeout`.
///
/// A stuck fetch is abandoned, not joined: the worker finishes (or hangs) on its own and its
/// result is dropped.
pub(crate) fn fetch_with_timeout(
    source: &Arc<dyn ImageSource>,
    reference: &str,
    timeout: Duration,
) -> ForgeResult<Vec<u8>> {
    let (tx, rx) = mpsc::sync_channel(1);
    let src = Arc::clone(source);
    let owned = reference.to_owned();
    std::thread::Builder::new()
        .name("certiforge-fetch".to_owned())
        .spawn(move || {
            // Receiver may be gone after a timeout.
            let _ = tx.send(src.fetch(&owned));
        })
        .map_err(|e| ForgeError::fetch(format!("failed to spawn fetch worker: {e}")))?;

    match rx.recv_timeout(timeout) {
        Ok(res) => res,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(ForgeError::fetch(format!(
            "fetching '{reference}' timed out after {} ms",
            timeout.as_millis()
        ))),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(ForgeError::fetch(format!(
            "fetch worker for '{reference}' exited without a result"
        ))),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/source.rs"]
mod tests;
