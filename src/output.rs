//! Output types: detected components, run statistics, and the final
//! parts-list artifact.
//!
//! A [`Component`] is immutable once produced by detection; the pipeline
//! only moves it (tile-local → page-global coordinates) and selects among
//! duplicates. The parts list itself is a plain `Vec<Component>` sorted by
//! tag — the tag is the key, and tag order makes every artifact (JSON,
//! Markdown, logs) deterministic across runs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned bounding box `(x1, y1, x2, y2)` in pixel coordinates.
///
/// Tile-local until the merge stage offsets it; page-global afterwards.
/// `x1 <= x2` and `y1 <= y2` always hold — detection records violating
/// that are rejected before a `BBox` is ever constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBox(pub u32, pub u32, pub u32, pub u32);

impl BBox {
    /// Translate by a tile origin, producing page-global coordinates.
    pub fn offset(self, x_off: u32, y_off: u32) -> BBox {
        BBox(
            self.0 + x_off,
            self.1 + y_off,
            self.2 + x_off,
            self.3 + y_off,
        )
    }
}

/// Processing state of a detected component.
///
/// Serialized in SCREAMING_SNAKE_CASE to match the detection schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentStatus {
    /// Freshly produced by the detection pass.
    #[default]
    Ingested,
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentStatus::Ingested => f.write_str("INGESTED"),
        }
    }
}

/// One detected P&ID component (instrument, valve, or line class).
///
/// The `tag` (e.g. `PT-101`) identifies the physical component; duplicate
/// detections of the same tag from overlapping tiles are collapsed by the
/// merge stage, keeping the highest-confidence record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Unique textual identifier, e.g. `PT-101`.
    pub tag: String,
    /// Component class, e.g. `PT` or `Gate Valve`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Nominal size, e.g. `2"`, when the drawing states one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Page-global bounding box in pixels.
    pub bbox: BBox,
    /// Detection confidence in `[0, 1]`.
    pub conf: f32,
    /// Processing state.
    pub status: ComponentStatus,
}

/// Counters and timings for one ingestion run.
///
/// `tiles_total = tiles_parsed + tiles_failed_parse` always holds on a
/// run that reached the merge stage. `records_rejected` counts individual
/// detection records dropped for schema violations inside otherwise valid
/// tile responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    /// Rendered page width in pixels.
    pub page_width: u32,
    /// Rendered page height in pixels.
    pub page_height: u32,
    /// Number of tiles the page was sliced into.
    pub tiles_total: usize,
    /// Tiles whose model response parsed into a detection set.
    pub tiles_parsed: usize,
    /// Tiles whose model response was unusable (recovered, zero records).
    pub tiles_failed_parse: usize,
    /// Raw detection records accepted across all tiles, pre-dedup.
    pub records_detected: usize,
    /// Records rejected for schema violations (bad bbox, conf out of range).
    pub records_rejected: usize,
    /// Components in the final deduplicated parts list.
    pub components: usize,
    /// Wall-clock time spent rasterising, in milliseconds.
    pub render_duration_ms: u64,
    /// Wall-clock time spent in detection calls, in milliseconds.
    pub detect_duration_ms: u64,
    /// Total wall-clock time for the run, in milliseconds.
    pub total_duration_ms: u64,
}

/// Result of a successful ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOutput {
    /// Deduplicated components, sorted by tag.
    pub parts: Vec<Component>,
    /// Run counters and timings.
    pub stats: IngestStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_offset_translates_all_corners() {
        let b = BBox(10, 20, 30, 40).offset(100, 200);
        assert_eq!(b, BBox(110, 220, 130, 240));
    }

    #[test]
    fn status_serializes_screaming() {
        let json = serde_json::to_string(&ComponentStatus::Ingested).unwrap();
        assert_eq!(json, "\"INGESTED\"");
    }

    #[test]
    fn component_json_field_names() {
        let c = Component {
            tag: "FT-200".into(),
            kind: "FT".into(),
            size: None,
            bbox: BBox(10, 10, 50, 50),
            conf: 0.85,
            status: ComponentStatus::Ingested,
        };
        let v: serde_json::Value = serde_json::to_value(&c).unwrap();
        assert_eq!(v["type"], "FT");
        assert_eq!(v["bbox"], serde_json::json!([10, 10, 50, 50]));
        assert_eq!(v["status"], "INGESTED");
        // absent size is omitted, not null
        assert!(v.get("size").is_none());
    }
}
