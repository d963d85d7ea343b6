//! Progress-callback trait for per-tile ingestion events.
//!
//! Inject an [`Arc<dyn IngestProgressCallback>`] via
//! [`crate::config::IngestConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline processes each tile. The CLI uses this
//! to drive its progress bar; library callers can forward events to a
//! channel, a log, or nothing at all — every method has a default no-op
//! implementation.
//!
//! Implementations must be `Send + Sync`: when `concurrency > 1` the
//! per-tile methods may be called from different tasks at the same time,
//! so shared mutable state needs a `Mutex` or atomics.

use std::sync::Arc;

/// Called by the ingestion pipeline as it processes each tile.
pub trait IngestProgressCallback: Send + Sync {
    /// Called once after tiling, before any detection call.
    ///
    /// # Arguments
    /// * `total_tiles` — number of tiles that will be sent for detection
    fn on_ingest_start(&self, total_tiles: usize) {
        let _ = total_tiles;
    }

    /// Called when a tile's detection call begins.
    fn on_tile_start(&self, tile: usize, total_tiles: usize) {
        let _ = (tile, total_tiles);
    }

    /// Called when a tile's response parsed successfully.
    ///
    /// `detections` is the number of records accepted from this tile.
    fn on_tile_complete(&self, tile: usize, total_tiles: usize, detections: usize) {
        let _ = (tile, total_tiles, detections);
    }

    /// Called when a tile's response was unusable and the tile was skipped.
    fn on_tile_parse_error(&self, tile: usize, total_tiles: usize, detail: &str) {
        let _ = (tile, total_tiles, detail);
    }

    /// Called once after merging, with the final component count.
    fn on_ingest_complete(&self, total_tiles: usize, components: usize) {
        let _ = (total_tiles, components);
    }
}

/// Convenience alias for the callback handle stored in the config.
pub type ProgressCallback = Arc<dyn IngestProgressCallback>;
