//! # pid-parts
//!
//! Extract a deduplicated parts list from a Process & Instrumentation
//! Diagram (P&ID) PDF using a vision language model.
//!
//! ## Why this crate?
//!
//! Auditing a piping diagram means transcribing every instrument, valve,
//! and line class into a component inventory — tedious, error-prone work.
//! Classical symbol detectors need per-symbol-library training; instead
//! this crate rasterises the sheet and lets a vision model read it tile by
//! tile, the way a human auditor scans a drawing with a loupe.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input   validate the drawing file (magic bytes)
//!  ├─ 2. Render  rasterise one page via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Tile    slice into overlapping 1200 px tiles (15% overlap)
//!  ├─ 4. Detect  per-tile vision-model calls → raw component records
//!  ├─ 5. Merge   tile-local → page coords, collapse duplicate tags
//!  └─ 6. Format  JSON parts list + optional Markdown table
//! ```
//!
//! Overlap means a symbol cut by one tile boundary appears whole in a
//! neighbour; the duplicate detections that creates are collapsed by
//! keeping the highest-confidence record per tag.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pid_parts::{ingest, format, IngestConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads OPENROUTER_API_KEY / OPENROUTER_BASE_URL / INGESTION_MODEL
//!     let config = IngestConfig::from_env()?;
//!     let output = ingest("drawing.pdf", &config).await?;
//!     println!("{}", format::to_json(&output.parts)?);
//!     eprintln!(
//!         "{} components from {} tiles",
//!         output.stats.components, output.stats.tiles_total
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pid-ingest` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only
//! deps:
//! ```toml
//! pid-parts = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod format;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{IngestConfig, IngestConfigBuilder, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use error::{IngestError, ParseError};
pub use ingest::{ingest, ingest_sync, save_markdown};
pub use output::{BBox, Component, ComponentStatus, IngestOutput, IngestStats};
pub use progress::{IngestProgressCallback, ProgressCallback};
