//! Detection: send one tile to the vision model and parse its response
//! against a strict schema.
//!
//! The model endpoint is an OpenRouter-compatible chat-completions API,
//! treated as an opaque request/response service: a system prompt, the
//! user instruction, and the tile PNG go in; a JSON object keyed by tag
//! comes out. This module owns both halves — the HTTP call and the
//! response schema — so the rest of the pipeline never sees wire types.
//!
//! ## Failure policy
//!
//! Transport and HTTP-status failures are fatal ([`IngestError`]): the
//! caller decides whether to re-run, and a half-detected drawing is worse
//! than no output. Schema failures are local ([`ParseError`] for a whole
//! response, a counter for individual bad records): one confused tile
//! should not discard the other thirty-five.

use crate::config::IngestConfig;
use crate::error::{IngestError, ParseError};
use crate::output::BBox;
use crate::prompts::{SYSTEM_PROMPT, USER_PROMPT};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

// ── Wire types (OpenRouter chat completions) ─────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    #[serde(flatten)]
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text { content: String },
    Multimodal { content: Vec<ContentPart> },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

// ── Detection schema ─────────────────────────────────────────────────────

/// One raw detection record as the model is asked to emit it.
///
/// Every field is optional at the deserialization layer so that a single
/// ill-typed field rejects only its own record, with a precise reason,
/// instead of failing the whole tile. Unknown extra fields are ignored;
/// known fields with wrong types are not.
#[derive(Debug, Deserialize)]
struct RawDetection {
    #[serde(default)]
    tag: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    size: Option<String>,
    bbox: Option<Vec<i64>>,
    conf: Option<f64>,
}

/// A validated detection with tile-local coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct TileDetection {
    pub tag: String,
    pub kind: String,
    pub size: Option<String>,
    /// Bounding box in pixels relative to the tile image.
    pub bbox: BBox,
    pub conf: f32,
}

/// Outcome of parsing one tile's response content.
#[derive(Debug, Default)]
pub struct ParsedTile {
    /// Records that passed schema validation, in key order.
    pub detections: Vec<TileDetection>,
    /// Records dropped for schema violations.
    pub rejected: usize,
}

// ── HTTP client ──────────────────────────────────────────────────────────

/// Synchronous-per-tile detection client for an OpenRouter-compatible
/// endpoint. One instance is shared across all tile calls.
pub struct Detector {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    timeout_secs: u64,
}

impl Detector {
    /// Build a detector from the run configuration.
    pub fn new(config: &IngestConfig) -> Result<Self, IngestError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| IngestError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.api_timeout_secs,
        })
    }

    /// Send one tile for detection and parse the response.
    ///
    /// `tile_w`/`tile_h` are the tile's actual (possibly edge-clipped)
    /// dimensions, used to validate that returned boxes lie within it.
    ///
    /// # Errors
    /// Fatal [`IngestError`] on transport failure, timeout, or non-2xx
    /// status. Schema problems never error: they surface as
    /// `ParsedTile::rejected` or, for an unusable response, as the inner
    /// `Err(ParseError)` which the caller recovers from.
    pub async fn detect_tile(
        &self,
        tile: usize,
        png_b64: &str,
        tile_w: u32,
        tile_h: u32,
    ) -> Result<Result<ParsedTile, ParseError>, IngestError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: MessageContent::Text {
                        content: SYSTEM_PROMPT.to_string(),
                    },
                },
                Message {
                    role: "user".to_string(),
                    content: MessageContent::Multimodal {
                        content: vec![
                            ContentPart::Text {
                                text: USER_PROMPT.to_string(),
                            },
                            ContentPart::ImageUrl {
                                image_url: ImageUrl {
                                    url: format!("data:image/png;base64,{png_b64}"),
                                    detail: "high".to_string(),
                                },
                            },
                        ],
                    },
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    IngestError::ApiTimeout {
                        tile,
                        secs: self.timeout_secs,
                    }
                } else {
                    IngestError::DetectionRequestFailed {
                        tile,
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            IngestError::DetectionRequestFailed {
                tile,
                reason: format!("reading response body: {e}"),
            }
        })?;

        if !status.is_success() {
            return Err(IngestError::DetectionFailed {
                tile,
                status: status.as_u16(),
                detail: truncate(&body, 300),
            });
        }

        // From here on, everything is a recoverable per-tile concern.
        let content = match serde_json::from_str::<ChatResponse>(&body) {
            Ok(r) => r
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content),
            Err(e) => {
                return Ok(Err(ParseError::NotJson {
                    tile,
                    detail: format!("response envelope: {e}"),
                }))
            }
        };

        let Some(content) = content else {
            return Ok(Err(ParseError::EmptyResponse { tile }));
        };

        debug!("Tile {}: {} bytes of model output", tile, content.len());
        Ok(parse_detections(tile, &content, tile_w, tile_h))
    }
}

// ── Response parsing ─────────────────────────────────────────────────────

// Models sometimes fence their output despite the prompt; same quirk and
// same fix as Markdown-producing VLMs.
static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n(.*)\n```\s*$").unwrap());

fn strip_fences(content: &str) -> &str {
    match RE_OUTER_FENCES.captures(content) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(content),
        None => content,
    }
}

/// Parse a model response into validated tile-local detections.
///
/// The response must be a JSON object keyed by tag. Individual records
/// failing validation are skipped and counted; a response that is not a
/// JSON object at all is a [`ParseError`].
pub fn parse_detections(
    tile: usize,
    content: &str,
    tile_w: u32,
    tile_h: u32,
) -> Result<ParsedTile, ParseError> {
    let stripped = strip_fences(content.trim());

    let records: BTreeMap<String, serde_json::Value> = serde_json::from_str(stripped)
        .map_err(|e| ParseError::NotJson {
            tile,
            detail: e.to_string(),
        })?;

    let mut parsed = ParsedTile::default();

    for (key, value) in records {
        let raw: RawDetection = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                warn!("Tile {}: record '{}' has ill-typed fields: {}", tile, key, e);
                parsed.rejected += 1;
                continue;
            }
        };

        match validate_record(&key, raw, tile_w, tile_h) {
            Ok(det) => parsed.detections.push(det),
            Err(reason) => {
                warn!("Tile {}: record '{}' rejected: {}", tile, key, reason);
                parsed.rejected += 1;
            }
        }
    }

    Ok(parsed)
}

/// Validate one raw record, producing a tile-local [`TileDetection`].
///
/// Rejection reasons are returned as strings for logging; the policy is
/// reject-not-repair (no clamping, no field synthesis beyond the tag-key
/// fallback the schema documents).
fn validate_record(
    key: &str,
    raw: RawDetection,
    tile_w: u32,
    tile_h: u32,
) -> Result<TileDetection, String> {
    let kind = raw
        .kind
        .filter(|k| !k.is_empty())
        .ok_or("missing 'type' field")?;

    let conf = raw.conf.ok_or("missing 'conf' field")?;
    if !conf.is_finite() || !(0.0..=1.0).contains(&conf) {
        return Err(format!("confidence {conf} outside [0, 1]"));
    }

    let bbox = raw.bbox.ok_or("missing 'bbox' field")?;
    let &[x1, y1, x2, y2] = bbox.as_slice() else {
        return Err(format!("bbox has {} coordinates, expected 4", bbox.len()));
    };
    if x1 < 0 || y1 < 0 {
        return Err(format!("bbox has negative coordinates [{x1}, {y1}, {x2}, {y2}]"));
    }
    if x2 < x1 || y2 < y1 {
        return Err(format!("bbox corners inverted [{x1}, {y1}, {x2}, {y2}]"));
    }
    if x2 > tile_w as i64 || y2 > tile_h as i64 {
        return Err(format!(
            "bbox [{x1}, {y1}, {x2}, {y2}] exceeds tile extent {tile_w}x{tile_h}"
        ));
    }

    // A record without its own tag inherits the object key it was filed
    // under; the model repeats the tag in both places when well-behaved.
    let tag = raw
        .tag
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| key.to_string());

    Ok(TileDetection {
        tag,
        kind,
        size: raw.size.filter(|s| !s.is_empty()),
        bbox: BBox(x1 as u32, y1 as u32, x2 as u32, y2 as u32),
        conf: conf as f32,
    })
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TILE: u32 = 1200;

    fn parse(content: &str) -> ParsedTile {
        parse_detections(0, content, TILE, TILE).expect("should parse")
    }

    #[test]
    fn valid_record_accepted() {
        let p = parse(
            r#"{"PT-101": {"tag": "PT-101", "type": "PT", "size": "2\"",
                "bbox": [10, 20, 30, 40], "conf": 0.95}}"#,
        );
        assert_eq!(p.rejected, 0);
        assert_eq!(
            p.detections,
            vec![TileDetection {
                tag: "PT-101".into(),
                kind: "PT".into(),
                size: Some("2\"".into()),
                bbox: BBox(10, 20, 30, 40),
                conf: 0.95,
            }]
        );
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let p = parse(
            "```json\n{\"PIT-102\": {\"tag\":\"PIT-102\",\"type\":\"PT\",\"size\":\"2\",\"bbox\":[10,20,30,40],\"conf\":0.95}}\n```",
        );
        assert_eq!(p.detections.len(), 1);
        assert_eq!(p.detections[0].tag, "PIT-102");
    }

    #[test]
    fn bare_fence_without_language_is_unwrapped() {
        let p = parse("```\n{}\n```");
        assert!(p.detections.is_empty());
        assert_eq!(p.rejected, 0);
    }

    #[test]
    fn empty_object_is_zero_detections() {
        let p = parse("{}");
        assert!(p.detections.is_empty());
        assert_eq!(p.rejected, 0);
    }

    #[test]
    fn non_json_is_parse_error() {
        let err = parse_detections(3, "This is not valid JSON", TILE, TILE).unwrap_err();
        assert!(matches!(err, ParseError::NotJson { tile: 3, .. }));
    }

    #[test]
    fn confidence_above_one_rejected_not_clamped() {
        let p = parse(r#"{"V-1": {"type": "Valve", "bbox": [0, 0, 5, 5], "conf": 1.7}}"#);
        assert!(p.detections.is_empty());
        assert_eq!(p.rejected, 1);
    }

    #[test]
    fn negative_confidence_rejected() {
        let p = parse(r#"{"V-1": {"type": "Valve", "bbox": [0, 0, 5, 5], "conf": -0.2}}"#);
        assert_eq!(p.rejected, 1);
    }

    #[test]
    fn inverted_bbox_rejected() {
        let p = parse(r#"{"V-1": {"type": "Valve", "bbox": [30, 0, 10, 5], "conf": 0.5}}"#);
        assert_eq!(p.rejected, 1);
    }

    #[test]
    fn bbox_exceeding_tile_rejected() {
        let p = parse(r#"{"V-1": {"type": "Valve", "bbox": [0, 0, 1300, 5], "conf": 0.5}}"#);
        assert_eq!(p.rejected, 1);
    }

    #[test]
    fn bbox_wrong_arity_rejected() {
        let p = parse(r#"{"V-1": {"type": "Valve", "bbox": [0, 0, 5], "conf": 0.5}}"#);
        assert_eq!(p.rejected, 1);
    }

    #[test]
    fn missing_type_rejected() {
        let p = parse(r#"{"V-1": {"bbox": [0, 0, 5, 5], "conf": 0.5}}"#);
        assert_eq!(p.rejected, 1);
    }

    #[test]
    fn missing_tag_falls_back_to_key() {
        let p = parse(r#"{"FV-220": {"type": "FV", "bbox": [0, 0, 5, 5], "conf": 0.5}}"#);
        assert_eq!(p.detections[0].tag, "FV-220");
    }

    #[test]
    fn ill_typed_size_rejects_only_that_record() {
        let p = parse(
            r#"{"A-1": {"type": "PT", "size": ["2"], "bbox": [0, 0, 5, 5], "conf": 0.5},
               "B-2": {"type": "FT", "bbox": [0, 0, 5, 5], "conf": 0.6}}"#,
        );
        assert_eq!(p.rejected, 1);
        assert_eq!(p.detections.len(), 1);
        assert_eq!(p.detections[0].tag, "B-2");
    }

    #[test]
    fn extra_fields_are_ignored() {
        let p = parse(
            r#"{"PT-101": {"tag": "PT-101", "type": "PT", "size": null,
                "bbox": [10, 20, 30, 40], "conf": 0.9, "status": "INGESTED"}}"#,
        );
        assert_eq!(p.rejected, 0);
        assert_eq!(p.detections.len(), 1);
        assert_eq!(p.detections[0].size, None);
    }

    #[test]
    fn bbox_touching_tile_edge_accepted() {
        let p = parse(r#"{"V-1": {"type": "Valve", "bbox": [0, 0, 1200, 1200], "conf": 0.5}}"#);
        assert_eq!(p.rejected, 0);
        assert_eq!(p.detections[0].bbox, BBox(0, 0, 1200, 1200));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "αβγδε";
        let t = truncate(s, 3);
        assert!(t.starts_with('α'));
    }
}
