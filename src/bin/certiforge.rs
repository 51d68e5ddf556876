use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "certiforge", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a request and print the output path.
    Render(RenderArgs),
    /// Print the cache key of a request.
    Fingerprint(FingerprintArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Render request JSON.
    #[arg(long)]
    request: PathBuf,

    /// Directory image references are resolved against.
    #[arg(long)]
    assets: PathBuf,

    /// Font files or directories (repeatable).
    #[arg(long = "fonts")]
    fonts: Vec<PathBuf>,

    /// Directory rendered files are written to.
    #[arg(long)]
    out_dir: PathBuf,

    /// Print render diagnostics as JSON on stderr.
    #[arg(long, default_value_t = false)]
    diagnostics: bool,
}

#[derive(Parser, Debug)]
struct FingerprintArgs {
    /// Render request JSON.
    #[arg(long)]
    request: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Fingerprint(args) => cmd_fingerprint(args),
    }
}

fn read_request(path: &Path) -> anyhow::Result<certiforge::RenderRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read request '{}'", path.display()))?;
    certiforge::RenderRequest::from_json_str(&text)
        .with_context(|| format!("parse request '{}'", path.display()))
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let req = read_request(&args.request)?;

    let fonts = if args.fonts.is_empty() {
        tracing::warn!("no fonts given; text fields will be skipped");
        certiforge::FontRegistry::empty()
    } else {
        certiforge::FontRegistry::load(args.fonts.as_slice()).context("load fonts")?
    };
    let images: Arc<dyn certiforge::ImageSource> =
        Arc::new(certiforge::FsImageSource::new(args.assets));

    let opts = certiforge::EngineOpts {
        output_dir: args.out_dir,
        ..certiforge::EngineOpts::from_env()
    };
    let engine = certiforge::RenderEngine::new(opts, Arc::new(fonts), images);
    let out = engine.render(&req).context("render")?;

    if args.diagnostics {
        eprintln!("{}", serde_json::to_string_pretty(&out.diagnostics)?);
    }
    println!("{}", out.path.display());
    Ok(())
}

fn cmd_fingerprint(args: FingerprintArgs) -> anyhow::Result<()> {
    let req = read_request(&args.request)?;
    let engine = certiforge::RenderEngine::new(
        certiforge::EngineOpts::from_env(),
        Arc::new(certiforge::FontRegistry::empty()),
        Arc::new(certiforge::MemoryImageSource::new()),
    );
    println!("{}", engine.fingerprint(&req)?);
    Ok(())
}
