use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use threadreel_core::{
    Assembler, AssemblyConfig, AssemblyError, AssemblyRequest, AssetSource, AssetStore,
    EncoderSettings, FfmpegEncoder, ProgressUpdate, SegmentManifest,
    config::{DEFAULT_BATCH_SIZE, DEFAULT_PRESET, FFMPEG_ENV_VAR},
    format_seconds, get_root_work_dir,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const BAR_STEPS: u64 = 1000;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

#[derive(Parser)]
#[command(name = "threadreel")]
#[command(about = "Assemble narrated segments over a looping background into a vertical short video")]
struct Cli {
    /// Background video (path or http(s) URL)
    background: String,

    /// JSON manifest listing the narrated segments in order
    manifest: PathBuf,

    /// Where to write the finished video
    #[arg(short, long, default_value = "threadreel.mp4")]
    output: PathBuf,

    /// Images overlaid per encode job
    #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// ffmpeg binary to run
    #[arg(long, env = FFMPEG_ENV_VAR, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// x264 preset passed to every encode job
    #[arg(long, default_value = DEFAULT_PRESET)]
    preset: String,

    /// Parent directory for per-run working directories
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Leave the run directory on disk afterwards
    #[arg(long)]
    keep_work_dir: bool,

    /// Log encoder jobs and stage transitions
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn create_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::new(BAR_STEPS);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {msg:<22} [{bar:30.cyan/blue}] {percent:>3}%",
        )?
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .progress_chars("=> "),
    );
    pb.enable_steady_tick(Duration::from_millis(80));
    Ok(pb)
}

fn render(bar: &ProgressBar, update: &ProgressUpdate) {
    bar.set_message(update.stage.clone());
    let position = update
        .fraction
        .map(|f| (f * BAR_STEPS as f64).round() as u64)
        .unwrap_or(0);
    bar.set_position(position);
}

async fn load_request(background: &str, manifest_path: &Path) -> Result<AssemblyRequest> {
    let manifest = SegmentManifest::load(manifest_path)
        .await
        .with_context(|| format!("reading manifest {}", manifest_path.display()))?;
    let base_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    let segments = manifest.into_segments(base_dir)?;

    Ok(AssemblyRequest {
        background: AssetSource::from_reference(background),
        segments,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    println!(
        "\n{}  {}\n",
        style("threadreel").cyan().bold(),
        style("Short Video Assembler").dim()
    );

    let request = match load_request(&cli.background, &cli.manifest).await {
        Ok(request) => request,
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    };
    let total_seconds: f64 = request.segments.iter().map(|s| s.duration_seconds).sum();
    println!(
        "{} Manifest: {} segments, {}s of narration",
        style("✓").green().bold(),
        request.segments.len(),
        format_seconds(total_seconds)
    );

    let config = AssemblyConfig {
        encoder: EncoderSettings {
            program: cli.ffmpeg,
            preset: cli.preset,
        },
        ..AssemblyConfig::default()
    }
    .with_batch_size(cli.batch_size)
    .with_work_root(cli.work_dir.unwrap_or_else(get_root_work_dir));

    debug!(
        program = %config.encoder.program.display(),
        preset = %config.encoder.preset,
        batch_size = config.batch_size,
        work_root = %config.work_root.display(),
        "configuration resolved"
    );

    let store = AssetStore::create_in(&config.work_root).await?;
    if cli.keep_work_dir {
        store.keep_on_drop();
        println!(
            "{} Run directory: {}",
            style("✓").green().bold(),
            style(store.root().display()).dim()
        );
    }

    let cancel = CancellationToken::new();
    let assembler = Assembler::new(config.clone(), FfmpegEncoder::new(config.encoder))
        .with_cancellation_token(cancel.clone());
    println!("{}", style("─".repeat(60)).dim());

    let start = Instant::now();
    let bar = create_bar()?;
    let status = assembler.status();
    let result = {
        let assembly = assembler.assemble_in(&store, &request);
        tokio::pin!(assembly);

        let mut interrupted = false;
        loop {
            tokio::select! {
                result = &mut assembly => break result,
                update = status.recv() => render(&bar, &update),
                _ = tokio::signal::ctrl_c(), if !interrupted => {
                    interrupted = true;
                    warn!("interrupt received, cancelling at the next job boundary");
                    bar.set_message("cancelling...");
                    cancel.cancel();
                }
            }
        }
    };
    bar.finish_and_clear();
    // the run directory goes away here unless --keep-work-dir was given
    drop(store);

    let video = match result {
        Ok(video) => video,
        Err(AssemblyError::Cancelled) => {
            eprintln!("{} Cancelled", style("✗").yellow().bold());
            std::process::exit(130);
        }
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    tokio::fs::write(&cli.output, &video.bytes)
        .await
        .with_context(|| format!("writing {}", cli.output.display()))?;

    println!(
        "{} Assembled: {}s in {} batches {}",
        style("✓").green().bold(),
        format_seconds(video.duration_seconds),
        video.batch_count,
        style(format!("[{}]", format_duration(start.elapsed()))).dim()
    );
    println!(
        "\n{} {} {}\n",
        style("Saved:").dim(),
        style(cli.output.display()).cyan(),
        style(format!("({})", video.mime_type)).dim()
    );

    Ok(())
}
