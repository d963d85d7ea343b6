//! Configuration types for P&ID parts ingestion.
//!
//! All ingestion behaviour is controlled through [`IngestConfig`], built via
//! its [`IngestConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across tasks, serialise them for logging, and
//! diff two runs to understand why their outputs differ.
//!
//! Environment state is read in exactly one place:
//! [`IngestConfig::from_env`], called once at process start. No other
//! component touches the environment — the detector, renderer, and tiler
//! all receive the values they need through this struct.

use crate::error::IngestError;
use crate::progress::IngestProgressCallback;
use std::fmt;
use std::sync::Arc;

/// Default OpenRouter endpoint; overridable via `OPENROUTER_BASE_URL`.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default detection model; overridable via `INGESTION_MODEL`.
pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-lite-001";

/// Configuration for one ingestion run.
///
/// Built via [`IngestConfig::from_env()`] (reads `OPENROUTER_API_KEY`,
/// `OPENROUTER_BASE_URL`, `INGESTION_MODEL` once) or assembled explicitly
/// through [`IngestConfig::builder()`] when the caller owns the key.
///
/// # Example
/// ```rust
/// use pid_parts::IngestConfig;
///
/// let config = IngestConfig::builder()
///     .api_key("sk-or-...")
///     .tile_px(1200)
///     .concurrency(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct IngestConfig {
    /// OpenRouter API key. Required; `from_env` fails fast without it.
    pub api_key: String,

    /// Base URL of the OpenRouter-compatible endpoint.
    /// Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Vision model identifier sent with each detection request.
    /// Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Rendering DPI used when rasterising the PDF page. Range: 72–600.
    /// Default: 300.
    ///
    /// P&ID sheets carry dense small-font tag text; 300 DPI keeps valve and
    /// instrument tags legible inside a 1200 px tile. Lowering it shrinks
    /// the tile grid (fewer API calls) at the cost of detection recall.
    pub dpi: u32,

    /// Edge length of each square tile in pixels. Default: 1200.
    pub tile_px: u32,

    /// Fraction of overlap between adjacent tiles, in `[0, 1)`.
    /// Default: 0.15.
    ///
    /// Overlap lets symbols that straddle a tile boundary appear whole in
    /// at least one tile; the duplicates it creates are collapsed later by
    /// the merge stage.
    pub overlap: f64,

    /// 1-indexed page of the PDF to ingest. Default: 1.
    pub page: usize,

    /// Number of concurrent detection API calls. Default: 4.
    ///
    /// Tiles are independent, so calls may overlap freely; results are
    /// re-sorted into row-major tile order before merging, making the
    /// output identical to a sequential run. Set to 1 for strictly
    /// sequential processing.
    pub concurrency: usize,

    /// Sampling temperature for the detection completion. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per tile. Default: 3400.
    pub max_tokens: usize,

    /// Per-detection-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Optional per-tile progress callback (used by the CLI progress bar).
    pub progress_callback: Option<Arc<dyn IngestProgressCallback>>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            dpi: 300,
            tile_px: 1200,
            overlap: 0.15,
            page: 1,
            concurrency: 4,
            temperature: 0.1,
            max_tokens: 3400,
            api_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dpi", &self.dpi)
            .field("tile_px", &self.tile_px)
            .field("overlap", &self.overlap)
            .field("page", &self.page)
            .field("concurrency", &self.concurrency)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl IngestConfig {
    /// Create a new builder for `IngestConfig`.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a config from the process environment.
    ///
    /// This is the only place in the crate that reads environment
    /// variables:
    ///
    /// * `OPENROUTER_API_KEY` — required; [`IngestError::ApiKeyMissing`]
    ///   if absent or empty, before any file or network I/O happens.
    /// * `OPENROUTER_BASE_URL` — optional, defaults to
    ///   [`DEFAULT_BASE_URL`].
    /// * `INGESTION_MODEL` — optional, defaults to [`DEFAULT_MODEL`].
    pub fn from_env() -> Result<Self, IngestError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or(IngestError::ApiKeyMissing)?;

        let mut config = Self {
            api_key,
            ..Self::default()
        };
        if let Ok(url) = std::env::var("OPENROUTER_BASE_URL") {
            if !url.is_empty() {
                config.base_url = url;
            }
        }
        if let Ok(model) = std::env::var("INGESTION_MODEL") {
            if !model.is_empty() {
                config.model = model;
            }
        }
        Ok(config)
    }

    /// Tile step size in pixels: `tile_px * (1 - overlap)`, truncated.
    ///
    /// 1200 px tiles at 15% overlap step 1020 px.
    pub fn stride(&self) -> u32 {
        ((self.tile_px as f64) * (1.0 - self.overlap)) as u32
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn tile_px(mut self, px: u32) -> Self {
        self.config.tile_px = px.max(64);
        self
    }

    pub fn overlap(mut self, fraction: f64) -> Self {
        self.config.overlap = fraction;
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.config.page = page.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn IngestProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        let c = &self.config;
        if c.api_key.is_empty() {
            return Err(IngestError::ApiKeyMissing);
        }
        if !(0.0..1.0).contains(&c.overlap) {
            return Err(IngestError::InvalidConfig(format!(
                "Overlap must be in [0, 1), got {}",
                c.overlap
            )));
        }
        if c.tile_px < 64 {
            return Err(IngestError::InvalidConfig(format!(
                "Tile size must be ≥ 64 px, got {}",
                c.tile_px
            )));
        }
        if c.stride() == 0 {
            return Err(IngestError::InvalidConfig(format!(
                "Tile stride is zero (tile_px={}, overlap={})",
                c.tile_px, c.overlap
            )));
        }
        if c.concurrency == 0 {
            return Err(IngestError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> IngestConfigBuilder {
        IngestConfig::builder().api_key("test-key")
    }

    #[test]
    fn defaults_match_contract() {
        let c = base().build().unwrap();
        assert_eq!(c.tile_px, 1200);
        assert_eq!(c.overlap, 0.15);
        assert_eq!(c.dpi, 300);
        assert_eq!(c.base_url, DEFAULT_BASE_URL);
        assert_eq!(c.model, DEFAULT_MODEL);
    }

    #[test]
    fn stride_matches_contract() {
        let c = base().build().unwrap();
        assert_eq!(c.stride(), 1020);

        let c = base().tile_px(200).overlap(0.25).build().unwrap();
        assert_eq!(c.stride(), 150);
    }

    #[test]
    fn missing_key_rejected() {
        let err = IngestConfig::builder().build().unwrap_err();
        assert!(matches!(err, IngestError::ApiKeyMissing));
    }

    #[test]
    fn full_overlap_rejected() {
        let err = base().overlap(1.0).build().unwrap_err();
        assert!(matches!(err, IngestError::InvalidConfig(_)));
    }

    #[test]
    fn negative_overlap_rejected() {
        let err = base().overlap(-0.1).build().unwrap_err();
        assert!(matches!(err, IngestError::InvalidConfig(_)));
    }

    #[test]
    fn builder_clamps() {
        let c = base().dpi(9999).concurrency(0).page(0).build().unwrap();
        assert_eq!(c.dpi, 600);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.page, 1);
    }

    #[test]
    fn debug_redacts_key() {
        let c = base().build().unwrap();
        let dbg = format!("{:?}", c);
        assert!(!dbg.contains("test-key"));
        assert!(dbg.contains("<redacted>"));
    }
}
