//! Pipeline stages for P&ID parts ingestion.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. switch rendering backend) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ tile ──▶ encode ──▶ detect ──▶ merge
//! (path)    (pdfium)   (grid)   (base64)   (VLM)      (dedup)
//! ```
//!
//! 1. [`input`]  — validate the user-supplied PDF path
//! 2. [`render`] — rasterise the selected page; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`tile`]   — slice the raster into overlapping square tiles
//! 4. [`encode`] — PNG-encode and base64-wrap each tile for the
//!    multimodal API request body
//! 5. [`detect`] — call the vision model and parse its detections against
//!    a strict schema; the only stage with network I/O
//! 6. [`merge`]  — offset tile-local boxes to page coordinates and
//!    collapse duplicate tags from overlap regions

pub mod detect;
pub mod encode;
pub mod input;
pub mod merge;
pub mod render;
pub mod tile;
