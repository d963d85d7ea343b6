//! Detection prompts for the vision model.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — tightening the output contract (field
//!    names, coordinate convention) requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without a
//!    live model, so a wording regression that breaks the JSON contract is
//!    caught in review rather than production.

/// System prompt defining the detector's role and the exact JSON shape
/// the response parser expects.
///
/// The coordinate convention matters: bbox values are pixels **within the
/// tile image the model was shown**, never full-page coordinates. The
/// merge stage adds the tile offset afterwards.
pub const SYSTEM_PROMPT: &str = "You are an OCR-plus detector for process & instrumentation \
diagrams. Return ONLY valid JSON. Keys are tag strings; values are objects with fields: \
tag (string), type (string), size (string or null), bbox (list of 4 integers \
[x1, y1, x2, y2] in pixels relative to THIS image), conf (float between 0 and 1).";

/// User prompt sent alongside each tile image.
pub const USER_PROMPT: &str = "Detect every instrument, valve or line class in this tile. \
Return `{}` if none. BBox coords are pixels within this tile image.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_names_every_field() {
        for field in ["tag", "type", "size", "bbox", "conf"] {
            assert!(SYSTEM_PROMPT.contains(field), "missing field: {field}");
        }
    }

    #[test]
    fn prompts_pin_tile_local_coordinates() {
        assert!(SYSTEM_PROMPT.contains("relative to THIS image"));
        assert!(USER_PROMPT.contains("within this tile"));
    }
}
