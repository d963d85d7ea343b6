//! Ingestion entry points: run the full pipeline over one drawing.
//!
//! [`ingest`] waits for every tile and returns the merged parts list.
//! Tiles are independent, so their detection calls run through
//! `buffer_unordered` up to `config.concurrency` at a time; results are
//! re-sorted into row-major tile order before merging, so the output is
//! byte-identical to a sequential run regardless of completion order.

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::format;
use crate::output::{Component, IngestOutput, IngestStats};
use crate::pipeline::detect::{Detector, TileDetection};
use crate::pipeline::{encode, input, merge, render, tile};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Per-tile outcome carried from the detection tasks to the merge stage.
struct TileReport {
    index: usize,
    x_off: u32,
    y_off: u32,
    detections: Vec<TileDetection>,
    rejected: usize,
    parse_failed: bool,
}

/// Ingest a P&ID drawing into a deduplicated parts list.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `pdf` — Local path to the drawing PDF
/// * `config` — Ingestion configuration (see [`IngestConfig::from_env`])
///
/// # Returns
/// `Ok(IngestOutput)` on success, even if some tiles produced unparseable
/// responses (check `output.stats.tiles_failed_parse`).
///
/// # Errors
/// Returns `Err(IngestError)` only for fatal errors:
/// - File not found / not a valid PDF / page out of range
/// - Empty page raster
/// - Any detection API transport or status failure
pub async fn ingest(
    pdf: impl AsRef<Path>,
    config: &IngestConfig,
) -> Result<IngestOutput, IngestError> {
    let total_start = Instant::now();
    let pdf = pdf.as_ref();
    info!("Starting ingestion: {}", pdf.display());

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let pdf_path = input::resolve_input(pdf)?;

    // ── Step 2: Build the detector ───────────────────────────────────────
    let detector = Arc::new(Detector::new(config)?);

    // ── Step 3: Rasterise the page ───────────────────────────────────────
    let render_start = Instant::now();
    let page = render::render_page(&pdf_path, config).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    let (page_width, page_height) = (page.width(), page.height());
    info!(
        "Rendered page {} → {}x{} px in {}ms",
        config.page, page_width, page_height, render_duration_ms
    );

    // ── Step 4: Slice into tiles ─────────────────────────────────────────
    let grid = tile::slice_page(&page, config.tile_px, config.overlap)?;
    let (cols, rows) = grid.dims();
    let tiles: Vec<tile::Tile> = grid.collect();
    let total_tiles = tiles.len();
    debug!("Sliced page into {}x{} grid ({} tiles)", cols, rows, total_tiles);

    if let Some(ref cb) = config.progress_callback {
        cb.on_ingest_start(total_tiles);
    }

    // ── Step 5: Detect components per tile ───────────────────────────────
    let detect_start = Instant::now();
    let mut reports: Vec<TileReport> = stream::iter(tiles.into_iter().enumerate().map(
        |(index, t)| {
            let detector = Arc::clone(&detector);
            let callback = config.progress_callback.clone();
            async move {
                if let Some(ref cb) = callback {
                    cb.on_tile_start(index, total_tiles);
                }

                let (tile_w, tile_h) = (t.image.width(), t.image.height());
                let b64 = encode::encode_tile(&t.image).map_err(|e| {
                    IngestError::Internal(format!("Tile {index} PNG encoding failed: {e}"))
                })?;

                let report = match detector.detect_tile(index, &b64, tile_w, tile_h).await? {
                    Ok(parsed) => {
                        if let Some(ref cb) = callback {
                            cb.on_tile_complete(index, total_tiles, parsed.detections.len());
                        }
                        TileReport {
                            index,
                            x_off: t.x_off,
                            y_off: t.y_off,
                            detections: parsed.detections,
                            rejected: parsed.rejected,
                            parse_failed: false,
                        }
                    }
                    Err(parse_err) => {
                        warn!("{parse_err}; skipping tile");
                        if let Some(ref cb) = callback {
                            cb.on_tile_parse_error(index, total_tiles, &parse_err.to_string());
                        }
                        TileReport {
                            index,
                            x_off: t.x_off,
                            y_off: t.y_off,
                            detections: Vec::new(),
                            rejected: 0,
                            parse_failed: true,
                        }
                    }
                };
                Ok::<TileReport, IngestError>(report)
            }
        },
    ))
    .buffer_unordered(config.concurrency)
    .try_collect()
    .await?;
    let detect_duration_ms = detect_start.elapsed().as_millis() as u64;

    // Restore row-major tile-scan order so the merge tie-break is
    // independent of completion order.
    reports.sort_by_key(|r| r.index);

    // ── Step 6: Map to page coordinates and accumulate ───────────────────
    let mut tiles_failed_parse = 0;
    let mut records_rejected = 0;
    let mut records: Vec<Component> = Vec::new();
    for report in reports {
        tiles_failed_parse += report.parse_failed as usize;
        records_rejected += report.rejected;
        for det in report.detections {
            records.push(merge::to_page_coords(det, report.x_off, report.y_off));
        }
    }
    let records_detected = records.len();

    // ── Step 7: Deduplicate ──────────────────────────────────────────────
    let parts = merge::dedupe(records);

    let stats = IngestStats {
        page_width,
        page_height,
        tiles_total: total_tiles,
        tiles_parsed: total_tiles - tiles_failed_parse,
        tiles_failed_parse,
        records_detected,
        records_rejected,
        components: parts.len(),
        render_duration_ms,
        detect_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Ingestion complete: {} components from {} detections across {} tiles ({}ms)",
        stats.components, stats.records_detected, stats.tiles_total, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_ingest_complete(total_tiles, parts.len());
    }

    Ok(IngestOutput { parts, stats })
}

/// Synchronous wrapper around [`ingest`].
///
/// Creates a temporary tokio runtime internally.
pub fn ingest_sync(
    pdf: impl AsRef<Path>,
    config: &IngestConfig,
) -> Result<IngestOutput, IngestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| IngestError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(ingest(pdf, config))
}

/// Write the parts list as a Markdown table to `path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn save_markdown(
    parts: &[Component],
    path: impl AsRef<Path>,
) -> Result<(), IngestError> {
    let path = path.as_ref();
    let markdown = format::to_markdown(parts);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                IngestError::OutputWriteFailed {
                    path: path.to_path_buf(),
                    source: e,
                }
            })?;
        }
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, &markdown)
        .await
        .map_err(|e| IngestError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| IngestError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    Ok(())
}
