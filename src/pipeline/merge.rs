//! Merging: lift tile-local detections to page coordinates and collapse
//! duplicate tags.
//!
//! Tile overlap means one physical component can be detected by up to
//! four tiles, each reporting it in its own local coordinates and with
//! its own confidence. This stage makes the records comparable
//! ([`to_page_coords`]) and then keeps exactly one record per tag
//! ([`dedupe`]).
//!
//! ## Merge policy
//!
//! Highest confidence wins; an exact tie keeps the record encountered
//! first in tile-scan order (row-major). When duplicate records disagree
//! on type or size, the winner's full field set is kept wholesale and the
//! disagreement is logged — the output schema has no place for conflict
//! annotations, and a half-merged record would belong to neither
//! detection.

use crate::output::{Component, ComponentStatus};
use crate::pipeline::detect::TileDetection;
use std::collections::HashMap;
use tracing::warn;

/// Lift one tile-local detection into a page-global [`Component`].
///
/// Pure and total: adds the tile origin to each bbox coordinate. The
/// inverse is subtracting the same origin.
pub fn to_page_coords(det: TileDetection, x_off: u32, y_off: u32) -> Component {
    Component {
        tag: det.tag,
        kind: det.kind,
        size: det.size,
        bbox: det.bbox.offset(x_off, y_off),
        conf: det.conf,
        status: ComponentStatus::Ingested,
    }
}

/// Collapse duplicate tags, keeping the highest-confidence record.
///
/// Deterministic and total: any input list, including the empty list,
/// produces a defined output, sorted by tag. Idempotent — deduplicating
/// an already-deduplicated list returns the same list.
pub fn dedupe(records: Vec<Component>) -> Vec<Component> {
    let mut by_tag: HashMap<String, Component> = HashMap::with_capacity(records.len());

    for record in records {
        match by_tag.get(&record.tag) {
            None => {
                by_tag.insert(record.tag.clone(), record);
            }
            Some(existing) => {
                if record.kind != existing.kind || record.size != existing.size {
                    warn!(
                        "Tag '{}': duplicate detections disagree on type/size \
                         ({}/{:?} vs {}/{:?}); keeping the higher-confidence record",
                        record.tag, existing.kind, existing.size, record.kind, record.size
                    );
                }
                // Strictly greater: an exact tie keeps the earlier record.
                if record.conf > existing.conf {
                    by_tag.insert(record.tag.clone(), record);
                }
            }
        }
    }

    let mut out: Vec<Component> = by_tag.into_values().collect();
    out.sort_by(|a, b| a.tag.cmp(&b.tag));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BBox;

    fn det(tag: &str, kind: &str, bbox: BBox, conf: f32) -> TileDetection {
        TileDetection {
            tag: tag.into(),
            kind: kind.into(),
            size: None,
            bbox,
            conf,
        }
    }

    fn comp(tag: &str, conf: f32) -> Component {
        Component {
            tag: tag.into(),
            kind: "PT".into(),
            size: None,
            bbox: BBox(0, 0, 10, 10),
            conf,
            status: ComponentStatus::Ingested,
        }
    }

    #[test]
    fn mapping_adds_tile_origin() {
        let c = to_page_coords(det("PT-101", "PT", BBox(10, 20, 30, 40), 0.9), 1020, 2040);
        assert_eq!(c.bbox, BBox(1030, 2060, 1050, 2080));
    }

    #[test]
    fn mapping_at_origin_is_identity() {
        let c = to_page_coords(det("FT-200", "FT", BBox(10, 10, 50, 50), 0.85), 0, 0);
        assert_eq!(c.bbox, BBox(10, 10, 50, 50));
    }

    #[test]
    fn mapping_is_reversible() {
        let local = BBox(15, 25, 35, 45);
        let c = to_page_coords(det("V-1", "Valve", local, 0.5), 300, 400);
        let BBox(x1, y1, x2, y2) = c.bbox;
        assert_eq!(BBox(x1 - 300, y1 - 400, x2 - 300, y2 - 400), local);
    }

    #[test]
    fn higher_confidence_wins() {
        let out = dedupe(vec![comp("PT-101", 0.7), comp("PT-101", 0.9)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].conf, 0.9);
    }

    #[test]
    fn higher_confidence_wins_regardless_of_order() {
        let out = dedupe(vec![comp("PT-101", 0.9), comp("PT-101", 0.7)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].conf, 0.9);
    }

    #[test]
    fn exact_tie_keeps_first_encountered() {
        let mut first = comp("PT-101", 0.8);
        first.kind = "first".into();
        let mut second = comp("PT-101", 0.8);
        second.kind = "second".into();

        let out = dedupe(vec![first, second]);
        assert_eq!(out[0].kind, "first");
    }

    #[test]
    fn winner_field_set_kept_wholesale() {
        let mut low = comp("LT-103", 0.6);
        low.kind = "LT".into();
        low.size = Some("3\"".into());
        let mut high = comp("LT-103", 0.8);
        high.kind = "Level Transmitter".into();
        high.size = None;

        let out = dedupe(vec![low, high]);
        assert_eq!(out[0].kind, "Level Transmitter");
        assert_eq!(out[0].size, None);
    }

    #[test]
    fn no_duplicate_tags_in_output() {
        let out = dedupe(vec![
            comp("A", 0.1),
            comp("B", 0.2),
            comp("A", 0.3),
            comp("B", 0.4),
            comp("A", 0.2),
        ]);
        let mut tags: Vec<&str> = out.iter().map(|c| c.tag.as_str()).collect();
        tags.dedup();
        assert_eq!(tags, vec!["A", "B"]);
    }

    #[test]
    fn empty_input_produces_empty_output() {
        assert!(dedupe(Vec::new()).is_empty());
    }

    #[test]
    fn dedupe_is_idempotent() {
        let once = dedupe(vec![
            comp("PT-101", 0.7),
            comp("FT-102", 0.9),
            comp("PT-101", 0.95),
        ]);
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn output_sorted_by_tag() {
        let out = dedupe(vec![comp("PT-101", 0.9), comp("FT-102", 0.8), comp("LT-103", 0.7)]);
        let tags: Vec<&str> = out.iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(tags, vec!["FT-102", "LT-103", "PT-101"]);
    }
}
