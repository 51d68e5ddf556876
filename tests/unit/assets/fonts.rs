use super::*;

const SYSTEM_FONTS: [&str; 3] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
];

fn system_font() -> Option<&'static str> {
    SYSTEM_FONTS
        .into_iter()
        .find(|p| std::path::Path::new(p).exists())
}

#[test]
fn empty_registry_resolves_nothing() {
    let reg = FontRegistry::empty();
    assert!(reg.is_empty());
    assert!(reg.resolve("sans-serif").is_none());
}

#[test]
fn load_without_fonts_is_an_error() {
    let tmp = std::env::temp_dir().join(format!("certiforge_no_fonts_{}", std::process::id()));
    std::fs::create_dir_all(&tmp).unwrap();
    std::fs::write(tmp.join("readme.txt"), b"not a font").unwrap();

    assert!(matches!(FontRegistry::load(&[&tmp]), Err(ForgeError::Font(_))));

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn garbage_bytes_are_rejected() {
    let mut reg = FontRegistry::empty();
    assert!(reg.register_bytes(b"definitely not a font".to_vec()).is_err());
    assert!(reg.is_empty());
}

#[test]
fn system_font_loads_and_falls_back_if_present() {
    let Some(path) = system_font() else {
        return;
    };
    let reg = FontRegistry::load(&[path]).unwrap();
    let first = reg.faces()[0].family().to_owned();
    assert!(!first.is_empty());
    assert_eq!(reg.resolve(&first.to_uppercase()).unwrap().family(), first);
    assert_eq!(reg.resolve("sans-serif").unwrap().family(), first);
    assert!(!reg.faces()[0].bytes().is_empty());
}

#[test]
fn weighted_lookup_picks_the_closest_upright_face() {
    let dir = "/usr/share/fonts/truetype/dejavu";
    let files = [
        format!("{dir}/DejaVuSans-Bold.ttf"),
        format!("{dir}/DejaVuSans-Oblique.ttf"),
        format!("{dir}/DejaVuSans.ttf"),
    ];
    if !files.iter().all(|p| std::path::Path::new(p).exists()) {
        return;
    }
    let reg = FontRegistry::load(&files).unwrap();
    assert_eq!(reg.faces().len(), 3);
    assert!(reg.faces().iter().all(|f| f.family() == reg.faces()[0].family()));
    assert!(reg.faces()[1].is_italic());

    let bold = reg.resolve_weighted("dejavu sans", 700).unwrap();
    assert_eq!(bold.weight(), 700);
    assert!(!bold.is_italic());

    let regular = reg.resolve("DejaVu Sans").unwrap();
    assert_eq!(regular.weight(), 400);
    assert!(!regular.is_italic());
    assert_ne!(regular.key(), bold.key());

    // Generic families use the first face's family, then weight.
    assert_eq!(reg.resolve_weighted("serif", 900).unwrap().weight(), 700);
}
