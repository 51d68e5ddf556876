use std::io::Cursor;
use std::time::Duration;

use super::*;
use crate::assets::source::MemoryImageSource;
use crate::cache::store::NoCache;
use crate::foundation::error::ForgeError;
use crate::scene::field::{ImageStyle, Position};
use crate::scene::request::BackgroundRef;

fn png(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(px));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn scratch_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "certiforge-engine-{tag}-{}-{nanos}",
        std::process::id()
    ))
}

fn engine(tag: &str, warm_preview: bool) -> RenderEngine {
    let images: Arc<dyn ImageSource> = Arc::new(
        MemoryImageSource::new()
            .with("bg.png", png(40, 30, [0, 0, 255, 255]))
            .with("dot.png", png(4, 4, [255, 0, 0, 255])),
    );
    let opts = EngineOpts {
        output_dir: scratch_dir(tag),
        warm_preview,
        fetch_timeout: Duration::from_secs(5),
        ..EngineOpts::default()
    };
    RenderEngine::new(opts, Arc::new(FontRegistry::empty()), images)
}

fn request(tier: QualityTier, w: i64, h: i64) -> RenderRequest {
    RenderRequest {
        template: "card".to_owned(),
        background: BackgroundRef::Reference("bg.png".to_owned()),
        fields: vec![Field::image(
            "photo",
            Position::new(50.0, 50.0),
            ImageStyle::default(),
        )],
        values: [("photo".to_owned(), serde_json::json!("dot.png"))]
            .into_iter()
            .collect(),
        output: OutputRequest::sized(tier, w, h),
    }
}

struct BrokenCache;

impl CacheBackend for BrokenCache {
    fn get(&self, _key: &Fingerprint) -> ForgeResult<Option<CachedRender>> {
        Err(ForgeError::cache("offline"))
    }

    fn put(&self, _key: Fingerprint, _value: CachedRender) -> ForgeResult<()> {
        Err(ForgeError::cache("offline"))
    }
}

#[test]
fn render_writes_file_named_by_fingerprint() {
    let e = engine("write", false);
    let out = e.render(&request(QualityTier::Medium, 200, 150)).unwrap();
    assert!(!out.cache_hit);
    assert_eq!(out.container, Container::Jpeg);
    assert_eq!((out.width, out.height), (200, 150));
    assert_eq!(
        out.path.file_name().unwrap().to_str().unwrap(),
        format!("{}.jpg", out.fingerprint)
    );
    assert_eq!(std::fs::read(&out.path).unwrap(), *out.bytes);
    assert_eq!(out.diagnostics.drawn, 1);
    let _ = std::fs::remove_dir_all(&e.opts().output_dir);
}

#[test]
fn second_render_is_served_from_cache() {
    let e = engine("hit", false);
    let req = request(QualityTier::High, 120, 90);
    let first = e.render(&req).unwrap();
    let second = e.render(&req).unwrap();
    assert!(second.cache_hit);
    assert_eq!(first.bytes, second.bytes);
    assert_eq!(first.path, second.path);
    assert_eq!(
        e.stats(),
        EngineStats {
            renders: 1,
            cache_hits: 1
        }
    );
    let _ = std::fs::remove_dir_all(&e.opts().output_dir);
}

#[test]
fn cache_failures_are_misses() {
    let e = engine("broken-cache", false).with_cache(Arc::new(BrokenCache));
    let req = request(QualityTier::Medium, 80, 60);
    e.render(&req).unwrap();
    let again = e.render(&req).unwrap();
    assert!(!again.cache_hit);
    assert_eq!(e.stats().renders, 2);
    let _ = std::fs::remove_dir_all(&e.opts().output_dir);
}

#[test]
fn no_cache_always_renders() {
    let e = engine("nocache", false).with_cache(Arc::new(NoCache));
    let req = request(QualityTier::Low, 80, 60);
    e.render(&req).unwrap();
    e.render(&req).unwrap();
    assert_eq!(e.stats().renders, 2);
    let _ = std::fs::remove_dir_all(&e.opts().output_dir);
}

#[test]
fn invalid_dimensions_fail_before_rendering() {
    let e = engine("invalid", false);
    let err = e.render(&request(QualityTier::Medium, 0, 100)).unwrap_err();
    assert!(matches!(err, ForgeError::InvalidDimensions { .. }));
    assert_eq!(e.stats().renders, 0);
    assert!(!e.opts().output_dir.exists());
}

#[test]
fn warm_preview_populates_the_preview_key() {
    let e = engine("warm", true);
    let out = e.render(&request(QualityTier::Medium, 1600, 1200)).unwrap();
    assert!(!out.cache_hit);

    let preview = e.render(&request(QualityTier::Preview, 1600, 1200)).unwrap();
    assert!(preview.cache_hit);
    assert_eq!((preview.width, preview.height), (800, 600));
    assert_eq!(preview.container, Container::Jpeg);
    assert!(preview.path.exists());
    assert_eq!(e.stats().renders, 1);
    let _ = std::fs::remove_dir_all(&e.opts().output_dir);
}

#[test]
fn warmed_preview_matches_a_native_preview_render() {
    let warm = engine("warm-bytes", true);
    warm.render(&request(QualityTier::High, 1600, 1200)).unwrap();
    let served = warm
        .render(&request(QualityTier::Preview, 1600, 1200))
        .unwrap();
    assert!(served.cache_hit);

    let cold = engine("cold-bytes", false).with_cache(Arc::new(NoCache));
    let native = cold
        .render(&request(QualityTier::Preview, 1600, 1200))
        .unwrap();
    assert!(!native.cache_hit);
    assert_eq!(served.fingerprint, native.fingerprint);
    assert_eq!(served.bytes, native.bytes);

    let _ = std::fs::remove_dir_all(&warm.opts().output_dir);
    let _ = std::fs::remove_dir_all(&cold.opts().output_dir);
}

#[test]
fn download_trims_background_padding() {
    let mut bg = image::RgbaImage::from_pixel(100, 100, image::Rgba([255, 255, 255, 255]));
    for y in 40..60 {
        for x in 30..70 {
            bg.put_pixel(x, y, image::Rgba([10, 10, 10, 255]));
        }
    }
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(bg)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();

    let e = engine("trim", false);
    let mut req = request(QualityTier::Download, 100, 100);
    req.background = BackgroundRef::Bytes(Arc::new(bytes));
    req.fields.clear();

    let (raster, diag) = e.render_raster(&req).unwrap();
    let crop = diag.trimmed.unwrap();
    assert_eq!((crop.x, crop.y, crop.width, crop.height), (25, 35, 50, 30));
    assert_eq!(raster.canvas(), Canvas::new(50, 30).unwrap());

    let out = e.render(&req).unwrap();
    assert_eq!(out.container, Container::Png);
    assert_eq!((out.width, out.height), (50, 30));
    let _ = std::fs::remove_dir_all(&e.opts().output_dir);
}

#[test]
fn atomic_write_leaves_no_temp_files() {
    let dir = scratch_dir("atomic");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("out.png");
    write_atomic(&path, b"abc").unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"abc");

    let missing = dir.join("no-such-dir").join("out.png");
    assert!(write_atomic(&missing, b"abc").is_err());

    let names: Vec<_> = std::fs::read_dir(&dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(names, vec!["out.png".to_owned()]);
    let _ = std::fs::remove_dir_all(&dir);
}
