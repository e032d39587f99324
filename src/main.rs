use clap::Parser;
use rayon::prelude::*;
use serde::Serialize;
use slurtrace::{PageLayout, RetrievalConfig, RetrievalReport, ThresholdMethod};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "slurtrace", about = "Retrieve slurs from binarized music pages")]
#[command(version)]
struct Cli {
    /// Page images (PNG, JPEG, BMP). Each page needs a layout JSON next to
    /// it, same stem with a .json extension, unless --layout is given.
    #[arg(required = true)]
    pages: Vec<PathBuf>,

    /// Layout JSON (interline, staves, systems) shared by all pages.
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Retrieval preset (JSON); missing fields take their default value.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Report path (JSON). Printed to stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory receiving one overlay PNG per page.
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Overlay pixels per image pixel.
    #[arg(long, default_value = "2.0")]
    zoom: f32,

    /// Fixed brightness threshold (0-255). Overrides Otsu auto-detection.
    #[arg(long)]
    threshold: Option<u8>,

    /// Invert the image before thresholding.
    #[arg(long)]
    invert: bool,

    /// Input pages already are one-pixel skeletons.
    #[arg(long)]
    no_thin: bool,
}

#[derive(Serialize)]
struct PageReport {
    page: PathBuf,
    #[serde(flatten)]
    retrieval: RetrievalReport,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RetrievalConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => RetrievalConfig::default(),
    };
    if let Some(t) = cli.threshold {
        config.threshold = ThresholdMethod::Fixed(t);
    }
    config.invert |= cli.invert;
    config.thin &= !cli.no_thin;

    let shared_layout = match &cli.layout {
        Some(path) => Some(load_layout(path)?),
        None => None,
    };
    if let Some(dir) = &cli.overlay {
        std::fs::create_dir_all(dir)?;
    }

    let results: Vec<(PathBuf, Result<RetrievalReport, String>)> = cli
        .pages
        .par_iter()
        .map(|page| {
            let _span = tracing::info_span!("page", path = %page.display()).entered();
            let result = process_page(page, shared_layout.as_ref(), &config, &cli).map_err(|e| e.to_string());
            (page.clone(), result)
        })
        .collect();

    let mut reports = Vec::new();
    let mut failed = 0;
    for (page, result) in results {
        match result {
            Ok(retrieval) => reports.push(PageReport { page, retrieval }),
            Err(err) => {
                tracing::error!("{}: {}", page.display(), err);
                failed += 1;
            }
        }
    }

    let json = serde_json::to_string_pretty(&reports)?;
    match &cli.output {
        Some(path) => {
            std::fs::write(path, &json)?;
            tracing::info!("report written to {}", path.display());
        }
        None => println!("{}", json),
    }

    if failed > 0 {
        return Err(format!("{} of {} pages failed", failed, cli.pages.len()).into());
    }
    Ok(())
}

fn load_layout(path: &Path) -> Result<PageLayout, slurtrace::CurveError> {
    PageLayout::from_json(&std::fs::read_to_string(path)?)
}

fn process_page(
    page: &Path,
    shared_layout: Option<&PageLayout>,
    config: &RetrievalConfig,
    cli: &Cli,
) -> Result<RetrievalReport, slurtrace::CurveError> {
    let own_layout;
    let layout = match shared_layout {
        Some(layout) => layout,
        None => {
            own_layout = load_layout(&page.with_extension("json"))?;
            &own_layout
        }
    };

    let retrieval = slurtrace::retrieve_page(page, layout, config)?;

    if let Some(dir) = &cli.overlay {
        let stem = page.file_stem().map_or_else(|| "page".into(), |s| s.to_string_lossy());
        let path = dir.join(format!("{}_slurs.png", stem));
        slurtrace::render::write_overlay(&retrieval.skeleton, &retrieval.curves, cli.zoom, &path)?;
        tracing::info!("overlay {}", path.display());
    }
    Ok(retrieval.report())
}
