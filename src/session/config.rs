use std::path::PathBuf;
use std::time::Duration;

use crate::cache::store::CacheOpts;
use crate::scene::request::SizePolicy;

/// Engine configuration.
///
/// Construct with [`EngineOpts::default`] and adjust fields, or call [`EngineOpts::from_env`] to
/// overlay `CERTIFORGE_*` environment variables on the defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineOpts {
    /// Directory rendered files are written to.
    pub output_dir: PathBuf,
    /// Default dimensions and the preview width.
    pub size: SizePolicy,
    /// Upper bound on a single image fetch.
    pub fetch_timeout: Duration,
    /// Also render and cache a `preview`-tier rendition after a low/medium/high render.
    ///
    /// The preview is composed at its own canvas, so its bytes match a later preview request.
    pub warm_preview: bool,
    /// Result cache sizing.
    pub cache: CacheOpts,
}

impl Default for EngineOpts {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir().join("certiforge"),
            size: SizePolicy::default(),
            fetch_timeout: Duration::from_secs(10),
            warm_preview: false,
            cache: CacheOpts::default(),
        }
    }
}

impl EngineOpts {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        Self::default().overlay(|k| std::env::var(k).ok())
    }

    /// Overlay values from `lookup`. Unparseable values are ignored.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup("CERTIFORGE_OUTPUT_DIR").filter(|v| !v.trim().is_empty()) {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(ms) = parse::<u64>(&lookup, "CERTIFORGE_FETCH_TIMEOUT_MS").filter(|&n| n > 0) {
            self.fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = lookup("CERTIFORGE_WARM_PREVIEW").and_then(|v| parse_bool(&v)) {
            self.warm_preview = v;
        }
        if let Some(n) = parse::<usize>(&lookup, "CERTIFORGE_CACHE_CAPACITY") {
            self.cache.capacity = n;
        }
        if let Some(s) = parse::<u64>(&lookup, "CERTIFORGE_CACHE_TTL_SECS").filter(|&n| n > 0) {
            self.cache.ttl = Duration::from_secs(s);
        }
        self
    }
}

fn parse<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse::<T>().ok())
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/config.rs"]
mod tests;
