use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context as _;

use crate::assets::fonts::FontRegistry;
use crate::assets::source::ImageSource;
use crate::cache::fingerprint::{Fingerprint, FingerprintInput, fingerprint};
use crate::cache::store::{CacheBackend, CachedRender, ResultCache};
use crate::encode::pipeline::{EncodedImage, encode};
use crate::foundation::core::{Canvas, Raster};
use crate::foundation::error::ForgeResult;
use crate::layout::resolver::LayoutContext;
use crate::render::background::load_or_blank;
use crate::render::compositor::{Compositor, RenderDiagnostics, resolve_layers};
use crate::render::cpu::CpuRasterizer;
use crate::render::field::FieldEnv;
use crate::render::trim::trim;
use crate::scene::field::Field;
use crate::scene::request::{Container, OutputRequest, QualityTier, RenderRequest};
use crate::session::config::EngineOpts;

/// A finished render, fresh or served from the cache.
#[derive(Clone, Debug)]
pub struct RenderOutput {
    /// File the bytes were written to.
    pub path: PathBuf,
    /// Encoded bytes.
    pub bytes: Arc<Vec<u8>>,
    /// Container of `bytes`.
    pub container: Container,
    /// Tier the request asked for.
    pub quality: QualityTier,
    /// Encoded width.
    pub width: u32,
    /// Encoded height.
    pub height: u32,
    /// Cache key; also the file stem of `path`.
    pub fingerprint: Fingerprint,
    /// Served from the result cache without rendering.
    pub cache_hit: bool,
    /// Recoverable conditions seen while composing. Empty on a cache hit.
    pub diagnostics: RenderDiagnostics,
}

/// Engine counters since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Requests that went through compositing.
    pub renders: u64,
    /// Requests answered from the cache.
    pub cache_hits: u64,
}

/// Turns [`RenderRequest`]s into encoded files.
///
/// Fonts and the image source are injected once and shared read-only; the cache is the only
/// shared mutable state, so one engine can serve many threads through an `Arc`.
pub struct RenderEngine {
    opts: EngineOpts,
    fonts: Arc<FontRegistry>,
    images: Arc<dyn ImageSource>,
    cache: Arc<dyn CacheBackend>,
    renders: AtomicU64,
    cache_hits: AtomicU64,
}

impl std::fmt::Debug for RenderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderEngine")
            .field("opts", &self.opts)
            .field("fonts", &self.fonts.faces().len())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl RenderEngine {
    /// Engine backed by an in-memory [`ResultCache`] sized from `opts.cache`.
    pub fn new(opts: EngineOpts, fonts: Arc<FontRegistry>, images: Arc<dyn ImageSource>) -> Self {
        let cache: Arc<dyn CacheBackend> = Arc::new(ResultCache::with_opts(opts.cache));
        Self {
            opts,
            fonts,
            images,
            cache,
            renders: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    /// Replace the cache backend.
    pub fn with_cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = cache;
        self
    }

    pub fn opts(&self) -> &EngineOpts {
        &self.opts
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            renders: self.renders.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }

    /// Cache key of `req` after normalization.
    pub fn fingerprint(&self, req: &RenderRequest) -> ForgeResult<Fingerprint> {
        let canvas = req.output.resolve_canvas(self.opts.size)?;
        let fields = req.effective_fields();
        Ok(key_for(req, &fields, &req.output, canvas))
    }

    /// Render, encode and persist `req`, or return the cached result.
    ///
    /// Only invalid dimensions, a failed encode (after its retry) and a failed file write are
    /// errors. A missing background, a failing field and a failing cache are logged and
    /// absorbed.
    #[tracing::instrument(
        skip_all,
        fields(template = %req.template, tier = req.output.quality.as_str())
    )]
    pub fn render(&self, req: &RenderRequest) -> ForgeResult<RenderOutput> {
        let tier = req.output.quality;
        let canvas = req.output.resolve_canvas(self.opts.size)?;
        let fields = req.effective_fields();
        let key = key_for(req, &fields, &req.output, canvas);

        if let Some(hit) = self.cache_get(&key) {
            tracing::debug!(%key, "cache hit");
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(RenderOutput {
                path: hit.path,
                bytes: hit.bytes,
                container: hit.container,
                quality: tier,
                width: hit.width,
                height: hit.height,
                fingerprint: key,
                cache_hit: true,
                diagnostics: RenderDiagnostics::default(),
            });
        }

        let (raster, diagnostics) = self.compose(req, &fields, canvas)?;
        self.renders.fetch_add(1, Ordering::Relaxed);

        let warm = self.warm_preview_target(req, &fields, tier);
        let (primary, preview) = rayon::join(
            || encode(&raster, tier, req.output.container),
            || warm.and_then(|(pkey, pcanvas)| self.warm_preview(req, &fields, pkey, pcanvas)),
        );
        let encoded = primary?;

        let path = self.persist(key, &encoded)?;
        let out = RenderOutput {
            path,
            bytes: Arc::new(encoded.bytes),
            container: encoded.container,
            quality: tier,
            width: encoded.width,
            height: encoded.height,
            fingerprint: key,
            cache_hit: false,
            diagnostics,
        };
        self.cache_put(
            key,
            CachedRender {
                path: out.path.clone(),
                bytes: Arc::clone(&out.bytes),
                container: out.container,
                width: out.width,
                height: out.height,
            },
        );

        if let Some((pkey, pencoded)) = preview {
            match self.persist(pkey, &pencoded) {
                Ok(ppath) => self.cache_put(
                    pkey,
                    CachedRender {
                        path: ppath,
                        bytes: Arc::new(pencoded.bytes),
                        container: pencoded.container,
                        width: pencoded.width,
                        height: pencoded.height,
                    },
                ),
                Err(e) => tracing::warn!(error = %e, "preview warm-up write failed"),
            }
        }

        Ok(out)
    }

    /// Composite `req` without encoding, persisting or touching the cache.
    pub fn render_raster(&self, req: &RenderRequest) -> ForgeResult<(Raster, RenderDiagnostics)> {
        let canvas = req.output.resolve_canvas(self.opts.size)?;
        let fields = req.effective_fields();
        self.compose(req, &fields, canvas)
    }

    fn compose(
        &self,
        req: &RenderRequest,
        fields: &[Field],
        canvas: Canvas,
    ) -> ForgeResult<(Raster, RenderDiagnostics)> {
        let mut diag = RenderDiagnostics::default();
        let bg = load_or_blank(
            &req.background,
            &self.images,
            self.opts.fetch_timeout,
            canvas,
        );
        diag.background_fallback = bg.fallback;

        let mut layout = LayoutContext::new(canvas)?;
        let mut raster = bg.raster;
        if req.output.quality == QualityTier::Download {
            let trimmed = trim(&raster)?;
            if !trimmed.is_noop(canvas.width, canvas.height) {
                tracing::debug!(crop = ?trimmed.crop, "trimmed background padding");
                layout = layout.with_crop(trimmed.crop);
                diag.trimmed = Some(trimmed.crop);
                raster = trimmed.raster;
            }
        }

        let layers = resolve_layers(&layout, fields, &req.values);
        let compositor = Compositor {
            env: FieldEnv {
                fonts: &self.fonts,
                images: &self.images,
                fetch_timeout: self.opts.fetch_timeout,
            },
        };
        let mut rast = CpuRasterizer::new();
        compositor.render(&mut rast, &mut raster, &layers, &mut diag);
        Ok((raster, diag))
    }

    /// Key and canvas of the preview rendition to warm alongside `tier`, if any.
    fn warm_preview_target(
        &self,
        req: &RenderRequest,
        fields: &[Field],
        tier: QualityTier,
    ) -> Option<(Fingerprint, Canvas)> {
        if !self.opts.warm_preview
            || !matches!(
                tier,
                QualityTier::Low | QualityTier::Medium | QualityTier::High
            )
        {
            return None;
        }
        let output = OutputRequest {
            quality: QualityTier::Preview,
            container: None,
            ..req.output.clone()
        };
        let canvas = output.resolve_canvas(self.opts.size).ok()?;
        Some((key_for(req, fields, &output, canvas), canvas))
    }

    /// Compose and encode the preview rendition at its own canvas, exactly as a preview
    /// request would. Best effort: failures are logged and dropped.
    fn warm_preview(
        &self,
        req: &RenderRequest,
        fields: &[Field],
        key: Fingerprint,
        canvas: Canvas,
    ) -> Option<(Fingerprint, EncodedImage)> {
        let encoded = self
            .compose(req, fields, canvas)
            .and_then(|(raster, _)| encode(&raster, QualityTier::Preview, None));
        match encoded {
            Ok(e) => Some((key, e)),
            Err(e) => {
                tracing::warn!(error = %e, "preview warm-up failed");
                None
            }
        }
    }

    fn cache_get(&self, key: &Fingerprint) -> Option<CachedRender> {
        match self.cache.get(key) {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, "cache lookup failed, rendering");
                None
            }
        }
    }

    fn cache_put(&self, key: Fingerprint, value: CachedRender) {
        if let Err(e) = self.cache.put(key, value) {
            tracing::warn!(error = %e, "cache store failed");
        }
    }

    fn persist(&self, key: Fingerprint, encoded: &EncodedImage) -> ForgeResult<PathBuf> {
        let dir = &self.opts.output_dir;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create output dir '{}'", dir.display()))?;
        let path = dir.join(format!("{key}.{}", encoded.container.extension()));
        write_atomic(&path, &encoded.bytes)?;
        Ok(path)
    }
}

fn key_for(
    req: &RenderRequest,
    fields: &[Field],
    output: &OutputRequest,
    canvas: Canvas,
) -> Fingerprint {
    fingerprint(&FingerprintInput {
        template: &req.template,
        background: &req.background,
        fields,
        values: &req.values,
        tier: output.quality,
        canvas,
        container: output.container,
    })
}

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Write through a sibling temp file and `rename`; the temp file never outlives a failure.
fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_extension(format!("{}.{nanos}.{seq}.tmp", std::process::id()));

    let res = std::fs::write(&tmp, bytes).and_then(|()| std::fs::rename(&tmp, path));
    if let Err(e) = res {
        let _ = std::fs::remove_file(&tmp);
        return Err(anyhow::Error::new(e).context(format!("write '{}'", path.display())));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/session/render_engine.rs"]
mod tests;
