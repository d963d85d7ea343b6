//! Formatting: render the deduplicated parts list as JSON and Markdown.
//!
//! The Markdown column set and header text are fixed — downstream audit
//! tooling diffs these tables between drawing revisions, so the shape is
//! part of the output contract, not a presentation choice. The header row
//! is emitted even for an empty list: a table with zero data rows and a
//! missing table are different audit results.

use crate::output::Component;

/// Fixed Markdown table header.
const MD_HEADER: &str = "| Tag | Type | Size | Confidence | Status |\n\
                         |-----|------|------|------------|--------|";

/// Placeholder for an absent size.
const NO_SIZE: &str = "—";

/// Render the parts list as a pretty-printed JSON array.
///
/// Fields per record: `tag, type, size, bbox, conf, status` (size omitted
/// when absent).
pub fn to_json(parts: &[Component]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(parts)
}

/// Render the parts list as a Markdown table.
///
/// One row per component, in the list's (tag) order. Confidence renders as
/// a whole percentage, `round(conf * 100)`.
pub fn to_markdown(parts: &[Component]) -> String {
    let mut out = String::from(MD_HEADER);
    for c in parts {
        out.push_str(&format!(
            "\n| {} | {} | {} | {}% | {} |",
            c.tag,
            c.kind,
            c.size.as_deref().unwrap_or(NO_SIZE),
            (c.conf * 100.0).round() as u32,
            c.status,
        ));
    }
    out.push('\n');
    out
}
