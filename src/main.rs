use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context as _;
use clap::Parser;
use topo_common::configs::get_settings;
use topo_maps::config::TerrainConfig;
use topo_maps::pipeline::{run_with_settings, RunOutcome, TerrainOutputs};
use topo_maps::progress::{CancelToken, Milestone, ProgressObserver, TracingObserver};
use topo_raster::{read_arcascii, write_arcascii};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "topo_maps", version)]
#[command(about = "Derives slope, TPI, TRI and hillshade from a DEM and renders a styled topographic map")]
struct Args {
    /// Input elevation grid (ESRI ASCII).
    #[arg(long)]
    dem: PathBuf,

    /// Run configuration JSON.
    #[arg(long)]
    config: PathBuf,

    /// Output PNG for the composite.
    #[arg(long)]
    output: PathBuf,

    /// Directory for exported index grids (ESRI ASCII). Defaults to the
    /// directory of the output image.
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Environment settings JSON; settings.json in the working directory when
    /// omitted.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{0},topo_maps={0},topo_raster={0},topo_common={0}",
            default_level
        ))
    });
    fmt().with_env_filter(filter).with_target(false).init();
}

fn main() {
    let args = Args::parse();
    match run(&args) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("run cancelled, nothing written");
            process::exit(2);
        }
        Err(err) => {
            eprintln!("Error: {:#}", err);
            process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when the run was cancelled.
fn run(args: &Args) -> anyhow::Result<bool> {
    let settings = get_settings(args.settings.as_deref()).context("reading environment settings")?;
    init_logging(args.verbose || settings.verbose_mode);

    let text = fs::read_to_string(&args.config)
        .with_context(|| format!("reading configuration {}", args.config.display()))?;
    let config = TerrainConfig::from_json(&text)
        .with_context(|| format!("invalid configuration {}", args.config.display()))?;
    let dem = read_arcascii(&args.dem)
        .with_context(|| format!("reading elevation grid {}", args.dem.display()))?;
    tracing::info!(
        rows = dem.configs.rows,
        columns = dem.configs.columns,
        cell_size = dem.cell_size(),
        "read {}",
        args.dem.display()
    );

    let observer = TracingObserver;
    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::warn!("interrupt received, cancelling");
        on_interrupt.cancel();
    }) {
        tracing::warn!("could not install the interrupt handler: {}", e);
    }
    let outputs = match run_with_settings(&config, &dem, &settings, &observer, &cancel)? {
        RunOutcome::Completed(outputs) => outputs,
        RunOutcome::Cancelled => return Ok(false),
    };
    if cancel.is_cancelled() {
        return Ok(false);
    }

    observer.milestone(Milestone::WriteStart);
    let export_dir = match &args.export_dir {
        Some(dir) => dir.clone(),
        None => args
            .output
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    write_outputs(&outputs, &args.output, &export_dir)?;
    Ok(true)
}

fn write_outputs(outputs: &TerrainOutputs, output: &Path, export_dir: &Path) -> anyhow::Result<()> {
    match &outputs.composite {
        Some(raster) => {
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            raster
                .to_image()
                .save_with_format(output, image::ImageFormat::Png)
                .with_context(|| format!("writing PNG {}", output.display()))?;
            tracing::info!("wrote {}", output.display());
        }
        None => tracing::warn!("the configuration has no composite section, {} not written", output.display()),
    }

    if outputs.exports.is_empty() {
        return Ok(());
    }
    if !export_dir.as_os_str().is_empty() {
        fs::create_dir_all(export_dir)
            .with_context(|| format!("creating {}", export_dir.display()))?;
    }
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("topo_map");
    for (kind, grid) in &outputs.exports {
        let path = export_dir.join(format!("{}_{}.asc", stem, kind));
        if path.exists() {
            tracing::warn!("overwriting {}", path.display());
        }
        write_arcascii(grid, &path).with_context(|| format!("writing {}", path.display()))?;
        tracing::info!("wrote {}", path.display());
    }
    Ok(())
}
