//! CLI binary for pid-parts.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `IngestConfig`, prints the JSON parts list to stdout, and optionally
//! writes the Markdown table to a file. All diagnostics go to stderr —
//! stdout carries only the JSON artifact so the command pipes cleanly.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pid_parts::{format, ingest, save_markdown, IngestConfig, IngestProgressCallback};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live tile-by-tile progress bar.
/// Tiles complete out of order in concurrent mode, so only counters are
/// shown, never "current tile".
struct CliProgressCallback {
    bar: ProgressBar,
    parse_errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} tiles  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_prefix("Detecting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            parse_errors: AtomicUsize::new(0),
        })
    }
}

impl IngestProgressCallback for CliProgressCallback {
    fn on_ingest_start(&self, total_tiles: usize) {
        self.bar.set_length(total_tiles as u64);
    }

    fn on_tile_complete(&self, _tile: usize, _total: usize, _detections: usize) {
        self.bar.inc(1);
    }

    fn on_tile_parse_error(&self, tile: usize, _total: usize, detail: &str) {
        self.parse_errors.fetch_add(1, Ordering::SeqCst);
        let msg = if detail.len() > 80 {
            format!("{}\u{2026}", &detail[..79])
        } else {
            detail.to_string()
        };
        self.bar
            .println(format!("  {} tile {:>3}  {}", red("✗"), tile, red(&msg)));
        self.bar.inc(1);
    }

    fn on_ingest_complete(&self, total_tiles: usize, components: usize) {
        self.bar.finish_and_clear();
        let failed = self.parse_errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} components from {} tiles",
                green("✔"),
                bold(&components.to_string()),
                total_tiles
            );
        } else {
            eprintln!(
                "{} {} components from {} tiles  ({} tiles skipped)",
                green("✔"),
                bold(&components.to_string()),
                total_tiles,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Parts list as JSON on stdout
  pid-ingest drawing.pdf

  # Also write the Markdown table next to the PDF
  pid-ingest drawing.pdf --save-markdown

  # Markdown to a chosen path, custom model
  pid-ingest drawing.pdf -m -o parts.md --model openai/gpt-4o

  # Second sheet of a multi-page drawing set
  pid-ingest drawing.pdf --page 2

ENVIRONMENT VARIABLES:
  OPENROUTER_API_KEY   OpenRouter API key (required)
  OPENROUTER_BASE_URL  API endpoint (default: https://openrouter.ai/api/v1)
  INGESTION_MODEL      Detection model (default: google/gemini-2.0-flash-lite-001)

SETUP:
  1. Set API key:  export OPENROUTER_API_KEY=sk-or-...
  2. Ingest:       pid-ingest drawing.pdf -m
"#;

/// Extract a deduplicated parts list from a P&ID drawing.
#[derive(Parser, Debug)]
#[command(
    name = "pid-ingest",
    version,
    about = "Extract a parts list from a P&ID drawing PDF using a vision LLM",
    long_about = "Rasterise a P&ID drawing, slice it into overlapping tiles, detect \
instruments, valves, and line classes with a vision language model, and emit a \
deduplicated parts list as JSON (stdout) and optionally Markdown.",
    arg_required_else_help = true,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the P&ID drawing PDF.
    pdf: PathBuf,

    /// Save the generated Markdown table to a file.
    #[arg(short = 'm', long)]
    save_markdown: bool,

    /// Output filename for the Markdown (default: <pdf_stem>.md).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Detection model ID (overrides INGESTION_MODEL).
    #[arg(long)]
    model: Option<String>,

    /// 1-indexed page of the PDF to ingest.
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Rendering DPI (72–600).
    #[arg(long, default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Tile edge length in pixels.
    #[arg(long, default_value_t = 1200)]
    tile_px: u32,

    /// Overlap fraction between adjacent tiles, in [0, 1).
    #[arg(long, default_value_t = 0.15)]
    overlap: f64,

    /// Number of concurrent detection API calls (1 = sequential).
    #[arg(short, long, default_value_t = 4)]
    concurrency: usize,

    /// Disable the progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors and the JSON artifact.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config (fails fast on a missing API key) ───────────────────
    let config = build_config(&cli, show_progress)?;

    // ── Run ingestion ────────────────────────────────────────────────────
    let output = ingest(&cli.pdf, &config)
        .await
        .context("Ingestion failed")?;

    // ── JSON to stdout, always ───────────────────────────────────────────
    let json = format::to_json(&output.parts).context("Failed to serialise parts list")?;
    {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(json.as_bytes())
            .and_then(|_| handle.write_all(b"\n"))
            .context("Failed to write to stdout")?;
    }

    // ── Optional Markdown file ───────────────────────────────────────────
    if cli.save_markdown {
        let md_path = cli
            .output
            .clone()
            .unwrap_or_else(|| cli.pdf.with_extension("md"));
        save_markdown(&output.parts, &md_path)
            .await
            .context("Failed to save Markdown")?;
        if !cli.quiet {
            eprintln!("Markdown saved to {}", bold(&md_path.display().to_string()));
        }
    }

    if !cli.quiet && !show_progress {
        // Only print inline stats when the progress callback is disabled
        // (the callback already printed its own summary line).
        let s = &output.stats;
        eprintln!(
            "{} components from {} detections across {} tiles in {}ms",
            s.components, s.records_detected, s.tiles_total, s.total_duration_ms
        );
        if s.tiles_failed_parse > 0 {
            eprintln!("  {} tiles skipped (unparseable response)", s.tiles_failed_parse);
        }
        if s.records_rejected > 0 {
            eprintln!(
                "  {} records rejected (schema violations)",
                dim(&s.records_rejected.to_string())
            );
        }
    }

    Ok(())
}

/// Map CLI args onto the environment-seeded `IngestConfig`.
fn build_config(cli: &Cli, show_progress: bool) -> Result<IngestConfig> {
    // Environment is read exactly once, here, before any file or network
    // I/O. A missing key aborts immediately.
    let env = IngestConfig::from_env().context("Configuration error")?;

    let mut builder = IngestConfig::builder()
        .api_key(env.api_key)
        .base_url(env.base_url)
        .model(cli.model.clone().unwrap_or(env.model))
        .page(cli.page)
        .dpi(cli.dpi)
        .tile_px(cli.tile_px)
        .overlap(cli.overlap)
        .concurrency(cli.concurrency);

    if show_progress {
        builder = builder.progress_callback(CliProgressCallback::new());
    }

    builder.build().context("Invalid configuration")
}
