//! Configuration types for layout-preserving PDF translation.
//!
//! All job behaviour is controlled through [`TranslationConfig`], built via
//! its [`TranslationConfigBuilder`]. One struct holds every knob so a config
//! can be shared across jobs, logged, and diffed between runs.

use crate::error::TranslateError;
use crate::pipeline::translator::Translator;
use crate::progress::ProgressCallback;
use asset_cache::FontPair;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Bhashini/Dhruva inference pipeline endpoint.
pub const DEFAULT_BHASHINI_ENDPOINT: &str =
    "https://dhruva-api.bhashini.gov.in/services/inference/pipeline";

const NOTO_DEVANAGARI_REGULAR_URL: &str =
    "https://fonts.gstatic.com/s/notosansdevanagari/v19/TuGOUUk6hG0ZmCpvLS_T-gsinh1DAmOLDqULTSapqo4.ttf";
const NOTO_DEVANAGARI_BOLD_URL: &str =
    "https://fonts.gstatic.com/s/notosansdevanagari/v19/TuGWUUk6hG0ZmCpvLS_T-gsinNZRkI3u-lOTqDYoxvA.ttf";

/// Configuration for one document translation job.
///
/// Built via [`TranslationConfig::builder()`] or [`TranslationConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_layout_translate::TranslationConfig;
///
/// let config = TranslationConfig::builder()
///     .languages("mr", "hi")
///     .batch_size(10)
///     .inter_batch_delay_ms(250)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct TranslationConfig {
    /// Source language code. Default: `"mr"`.
    pub source_language: String,

    /// Target language code. Default: `"hi"`.
    pub target_language: String,

    /// The pipeline's default language. Default: `"en"`.
    ///
    /// When the target equals this language the output uses the built-in
    /// Latin font family and no width expansion; any other target uses the
    /// provisioned script fonts and [`Self::script_expansion`].
    pub latin_language: String,

    /// Strings per translation call. Range: 1–100. Default: 20.
    pub batch_size: usize,

    /// Minimum interval between two batch dispatches, in ms. Default: 300.
    pub inter_batch_delay_ms: u64,

    /// Batches allowed in flight at once. Default: 1 (strictly sequential).
    ///
    /// Results are re-interleaved by fragment index, so raising this never
    /// changes the output, only how hard the service is pushed.
    pub max_in_flight: usize,

    /// Retries per batch before falling back to the source text. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in ms, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout for the translation service, in seconds. Default: 30.
    pub api_timeout_secs: u64,

    /// Timeout for URL inputs and font downloads, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Vertical distance within which fragments share a line. Default: 5.0.
    pub y_tolerance: f32,

    /// Width multiplier for non-Latin targets. Default: 1.2.
    pub script_expansion: f32,

    /// Draw every fragment at its line's anchor `y`. Default: false.
    pub snap_to_line: bool,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Which translation service to call. Default: Bhashini.
    pub service: TranslationService,

    /// Pre-constructed translator. Takes precedence over `service`.
    pub translator: Option<Arc<dyn Translator>>,

    /// Fonts used for non-Latin targets. Default: Noto Sans Devanagari.
    pub script_fonts: ScriptFonts,

    /// Directory for provisioned fonts. Default: `<cache>/pdftranslate/fonts`.
    pub asset_dir: Option<PathBuf>,

    /// Optional per-batch progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            source_language: "mr".to_string(),
            target_language: "hi".to_string(),
            latin_language: "en".to_string(),
            batch_size: 20,
            inter_batch_delay_ms: 300,
            max_in_flight: 1,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 30,
            download_timeout_secs: 120,
            y_tolerance: 5.0,
            script_expansion: 1.2,
            snap_to_line: false,
            password: None,
            service: TranslationService::default(),
            translator: None,
            script_fonts: ScriptFonts::default(),
            asset_dir: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TranslationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationConfig")
            .field("source_language", &self.source_language)
            .field("target_language", &self.target_language)
            .field("latin_language", &self.latin_language)
            .field("batch_size", &self.batch_size)
            .field("inter_batch_delay_ms", &self.inter_batch_delay_ms)
            .field("max_in_flight", &self.max_in_flight)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("y_tolerance", &self.y_tolerance)
            .field("script_expansion", &self.script_expansion)
            .field("snap_to_line", &self.snap_to_line)
            .field("service", &self.service)
            .field("translator", &self.translator.as_ref().map(|t| t.name().to_string()))
            .field("script_fonts", &self.script_fonts.family)
            .finish()
    }
}

impl TranslationConfig {
    /// Create a new builder for `TranslationConfig`.
    pub fn builder() -> TranslationConfigBuilder {
        TranslationConfigBuilder {
            config: Self::default(),
        }
    }

    /// `true` when the target is the pipeline's default (Latin) language.
    pub fn is_latin_target(&self) -> bool {
        self.target_language
            .eq_ignore_ascii_case(&self.latin_language)
    }

    /// Width multiplier applied to every drawn fragment.
    pub fn expansion_factor(&self) -> f32 {
        if self.is_latin_target() {
            1.0
        } else {
            self.script_expansion
        }
    }
}

/// Builder for [`TranslationConfig`].
pub struct TranslationConfigBuilder {
    config: TranslationConfig,
}

impl fmt::Debug for TranslationConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.config.fmt(f)
    }
}

impl TranslationConfigBuilder {
    pub fn languages(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.config.source_language = source.into();
        self.config.target_language = target.into();
        self
    }

    pub fn source_language(mut self, lang: impl Into<String>) -> Self {
        self.config.source_language = lang.into();
        self
    }

    pub fn target_language(mut self, lang: impl Into<String>) -> Self {
        self.config.target_language = lang.into();
        self
    }

    pub fn latin_language(mut self, lang: impl Into<String>) -> Self {
        self.config.latin_language = lang.into();
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n.clamp(1, 100);
        self
    }

    pub fn inter_batch_delay_ms(mut self, ms: u64) -> Self {
        self.config.inter_batch_delay_ms = ms;
        self
    }

    pub fn max_in_flight(mut self, n: usize) -> Self {
        self.config.max_in_flight = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn y_tolerance(mut self, tolerance: f32) -> Self {
        self.config.y_tolerance = tolerance;
        self
    }

    pub fn script_expansion(mut self, factor: f32) -> Self {
        self.config.script_expansion = factor;
        self
    }

    pub fn snap_to_line(mut self, v: bool) -> Self {
        self.config.snap_to_line = v;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn service(mut self, service: TranslationService) -> Self {
        self.config.service = service;
        self
    }

    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.config.translator = Some(translator);
        self
    }

    pub fn script_fonts(mut self, fonts: ScriptFonts) -> Self {
        self.config.script_fonts = fonts;
        self
    }

    pub fn asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.asset_dir = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<TranslationConfig, TranslateError> {
        let c = &self.config;
        if c.source_language.trim().is_empty() || c.target_language.trim().is_empty() {
            return Err(TranslateError::InvalidConfig(
                "source and target language codes must be non-empty".into(),
            ));
        }
        if c.batch_size == 0 {
            return Err(TranslateError::InvalidConfig("Batch size must be ≥ 1".into()));
        }
        if c.max_in_flight == 0 {
            return Err(TranslateError::InvalidConfig(
                "max_in_flight must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(TranslateError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if !c.y_tolerance.is_finite() || c.y_tolerance < 0.0 {
            return Err(TranslateError::InvalidConfig(format!(
                "y_tolerance must be a finite, non-negative number, got {}",
                c.y_tolerance
            )));
        }
        if !c.script_expansion.is_finite() || c.script_expansion < 1.0 {
            return Err(TranslateError::InvalidConfig(format!(
                "script_expansion must be ≥ 1.0, got {}",
                c.script_expansion
            )));
        }
        Ok(self.config)
    }
}

// ── Service & fonts ──────────────────────────────────────────────────────

/// External text-translation capability to call per batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TranslationService {
    /// Bhashini/Dhruva inference pipeline. `api_key` falls back to the
    /// `BHASHINI_API_KEY` environment variable.
    Bhashini {
        endpoint: String,
        api_key: Option<String>,
    },
    /// Any chat model reachable through edgequake-llm. Both fields fall back
    /// to `EDGEQUAKE_LLM_PROVIDER` / `EDGEQUAKE_MODEL` and provider
    /// auto-detection.
    Llm {
        provider: Option<String>,
        model: Option<String>,
    },
}

impl Default for TranslationService {
    fn default() -> Self {
        TranslationService::Bhashini {
            endpoint: DEFAULT_BHASHINI_ENDPOINT.to_string(),
            api_key: None,
        }
    }
}

/// Remote regular/bold faces of the non-Latin target-script family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptFonts {
    pub family: String,
    pub regular_url: String,
    pub bold_url: String,
}

impl Default for ScriptFonts {
    fn default() -> Self {
        Self {
            family: "NotoSansDevanagari".to_string(),
            regular_url: NOTO_DEVANAGARI_REGULAR_URL.to_string(),
            bold_url: NOTO_DEVANAGARI_BOLD_URL.to_string(),
        }
    }
}

impl ScriptFonts {
    pub fn font_pair(&self) -> FontPair {
        FontPair::new(&self.family, &self.regular_url, &self.bold_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_marathi_to_hindi() {
        let c = TranslationConfig::default();
        assert_eq!(c.source_language, "mr");
        assert_eq!(c.target_language, "hi");
        assert_eq!(c.batch_size, 20);
        assert_eq!(c.inter_batch_delay_ms, 300);
        assert_eq!(c.max_in_flight, 1);
        assert_eq!(c.y_tolerance, 5.0);
    }

    #[test]
    fn expansion_depends_on_target_only() {
        let hi = TranslationConfig::default();
        assert!(!hi.is_latin_target());
        assert_eq!(hi.expansion_factor(), 1.2);

        let en = TranslationConfig::builder()
            .languages("hi", "EN")
            .build()
            .unwrap();
        assert!(en.is_latin_target());
        assert_eq!(en.expansion_factor(), 1.0);
    }

    #[test]
    fn builder_clamps_batch_size() {
        let c = TranslationConfig::builder().batch_size(0).build().unwrap();
        assert_eq!(c.batch_size, 1);
        let c = TranslationConfig::builder().batch_size(500).build().unwrap();
        assert_eq!(c.batch_size, 100);
    }

    #[test]
    fn builder_rejects_bad_values() {
        assert!(TranslationConfig::builder().y_tolerance(f32::NAN).build().is_err());
        assert!(TranslationConfig::builder().script_expansion(0.8).build().is_err());
        assert!(TranslationConfig::builder().languages("", "hi").build().is_err());
    }

    #[test]
    fn zero_api_timeout_is_rejected() {
        let err = TranslationConfig::builder().api_timeout_secs(0).build().unwrap_err();
        assert!(matches!(err, TranslateError::InvalidConfig(ref m) if m.contains("api_timeout_secs")));
        let c = TranslationConfig::builder().api_timeout_secs(1).build().unwrap();
        assert_eq!(c.api_timeout_secs, 1);
    }

    #[test]
    fn script_fonts_pair_names() {
        let pair = ScriptFonts::default().font_pair();
        assert_eq!(pair.regular.file_name, "NotoSansDevanagari-Regular.ttf");
        assert!(pair.bold.url.starts_with("https://fonts.gstatic.com/"));
    }
}
