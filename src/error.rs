//! Error types for the pid-parts library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`IngestError`] — **Fatal**: the ingestion cannot proceed at all
//!   (bad input file, missing API key, detection endpoint unreachable,
//!   output not writable). Returned as `Err(IngestError)` from the
//!   top-level `ingest*` functions.
//!
//! * [`ParseError`] — **Non-fatal**: one tile's model response did not
//!   match the expected detection schema. The offending tile contributes
//!   zero records, the failure is logged and counted in
//!   [`crate::output::IngestStats`], and the run continues.
//!
//! The separation keeps the per-tile recovery policy out of the caller's
//! way: a drawing with one garbled tile still produces a parts list.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pid-parts library.
///
/// Tile-level schema violations use [`ParseError`] and are recovered
/// inside the pipeline rather than propagated here.
#[derive(Debug, Error)]
pub enum IngestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Selected page number exceeds the actual page count.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// pdfium-render returned an error for the selected page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The page raster has zero extent; there is nothing to tile.
    #[error("Page rendered to an empty {width}x{height} raster")]
    EmptyPage { width: u32, height: u32 },

    // ── Detection errors ──────────────────────────────────────────────────
    /// No OpenRouter API key was available when the config was built.
    #[error(
        "OPENROUTER_API_KEY is not set.\n\
         Get a key at https://openrouter.ai and export it before running."
    )]
    ApiKeyMissing,

    /// The detection endpoint answered with a non-success HTTP status.
    #[error("Detection API returned HTTP {status} for tile {tile}: {detail}")]
    DetectionFailed {
        tile: usize,
        status: u16,
        detail: String,
    },

    /// The request never produced an HTTP response (DNS, TLS, connection).
    #[error("Detection request failed for tile {tile}: {reason}")]
    DetectionRequestFailed { tile: usize, reason: String },

    /// The detection call exceeded the configured per-request timeout.
    #[error("Detection call timed out after {secs}s on tile {tile}")]
    ApiTimeout { tile: usize, secs: u64 },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the Markdown output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
         Install pdfium system-wide or place libpdfium next to the binary."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal schema failure for a single tile's model response.
///
/// Recovered where it occurs: the tile yields zero records and the run
/// continues. Individual bad records inside an otherwise valid response
/// are skipped and counted without producing a `ParseError` at all.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// The response content was not a JSON object, even after stripping
    /// Markdown code fences.
    #[error("tile {tile}: response is not a JSON object: {detail}")]
    NotJson { tile: usize, detail: String },

    /// The API response carried no choices / no message content.
    #[error("tile {tile}: response contained no content")]
    EmptyResponse { tile: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_failed_display() {
        let e = IngestError::DetectionFailed {
            tile: 3,
            status: 429,
            detail: "rate limited".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("429"), "got: {msg}");
        assert!(msg.contains("tile 3"));
    }

    #[test]
    fn api_key_missing_mentions_variable() {
        assert!(IngestError::ApiKeyMissing
            .to_string()
            .contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn empty_page_display() {
        let e = IngestError::EmptyPage {
            width: 0,
            height: 0,
        };
        assert!(e.to_string().contains("0x0"));
    }

    #[test]
    fn parse_error_display() {
        let e = ParseError::NotJson {
            tile: 7,
            detail: "expected value at line 1".into(),
        };
        assert!(e.to_string().contains("tile 7"));
    }
}
