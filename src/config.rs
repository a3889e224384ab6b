//! Configuration for the conversion service.
//!
//! All service behaviour is controlled through [`ServiceConfig`], built via
//! its [`ServiceConfigBuilder`]. The server binary maps CLI flags and
//! `PDF2HTML_*` environment variables onto the builder; tests build configs
//! directly with a temporary storage root.

use crate::error::Pdf2HtmlError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default provider when none is named.
pub const DEFAULT_PROVIDER: &str = "gemini";
/// Default model for both alt text and HTML generation.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Configuration of the conversion service.
///
/// # Example
/// ```rust
/// use edgequake_pdf2html::ServiceConfig;
/// use std::time::Duration;
///
/// let config = ServiceConfig::builder()
///     .storage_root("/var/lib/pdf2html")
///     .retention(Duration::from_secs(30 * 60))
///     .max_concurrent_jobs(4)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ServiceConfig {
    /// Directory under which one sub-directory per job is created. Default: `data`.
    pub storage_root: PathBuf,

    /// Age past which a job directory is removed by the sweep. Default: 1 hour.
    ///
    /// Long enough for a user to open and download every output of a
    /// conversion, short enough that a small disk does not fill up.
    pub retention: Duration,

    /// Maximum accepted request body in bytes. Default: 30 MiB.
    pub max_upload_bytes: usize,

    /// Number of conversions allowed to run at once. Default: 2.
    ///
    /// Every job holds the whole PDF, its page renders and several model
    /// requests in flight; two keeps memory flat on small instances.
    pub max_concurrent_jobs: usize,

    /// Refuse new jobs while the storage root holds more than this many
    /// bytes after a sweep. `None` disables the check. Default: 1 GiB.
    pub max_storage_bytes: Option<u64>,

    /// LLM provider name (e.g. "gemini", "openai"). Default: "gemini".
    pub provider_name: Option<String>,

    /// LLM model identifier. Default: "gemini-2.5-flash".
    pub model: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.3.
    pub temperature: f32,

    /// Maximum tokens the model may generate for one HTML document. Default: 16384.
    pub max_tokens: usize,

    /// Maximum tokens for one alt-text answer. Default: 256.
    pub alt_text_max_tokens: usize,

    /// Maximum retry attempts on a failed model call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 180.
    ///
    /// A whole-document HTML answer for a long PDF can take minutes.
    pub api_timeout_secs: u64,

    /// Longest edge, in pixels, of page renders sent to the model. Default: 1600.
    pub render_max_pixels: u32,

    /// Alt text used when the model fails to describe an image.
    ///
    /// `None` (default) makes such a failure abort the job.
    pub alt_text_fallback: Option<String>,

    /// Pause between consecutive alt-text calls in milliseconds. Default: 0.
    pub request_spacing_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("data"),
            retention: Duration::from_secs(60 * 60),
            max_upload_bytes: 30 * 1024 * 1024,
            max_concurrent_jobs: 2,
            max_storage_bytes: Some(1024 * 1024 * 1024),
            provider_name: None,
            model: None,
            provider: None,
            temperature: 0.3,
            max_tokens: 16384,
            alt_text_max_tokens: 256,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 180,
            render_max_pixels: 1600,
            alt_text_fallback: None,
            request_spacing_ms: 0,
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("storage_root", &self.storage_root)
            .field("retention", &self.retention)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("max_concurrent_jobs", &self.max_concurrent_jobs)
            .field("max_storage_bytes", &self.max_storage_bytes)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("alt_text_fallback", &self.alt_text_fallback)
            .finish()
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }

    /// Provider name, falling back to [`DEFAULT_PROVIDER`].
    pub fn provider_name_or_default(&self) -> &str {
        self.provider_name.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }

    /// Model, falling back to [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.storage_root = root.into();
        self
    }

    pub fn retention(mut self, retention: Duration) -> Self {
        self.config.retention = retention;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn max_concurrent_jobs(mut self, n: usize) -> Self {
        self.config.max_concurrent_jobs = n.max(1);
        self
    }

    pub fn max_storage_bytes(mut self, bytes: Option<u64>) -> Self {
        self.config.max_storage_bytes = bytes;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
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

    pub fn alt_text_max_tokens(mut self, n: usize) -> Self {
        self.config.alt_text_max_tokens = n;
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

    pub fn render_max_pixels(mut self, px: u32) -> Self {
        self.config.render_max_pixels = px.max(100);
        self
    }

    pub fn alt_text_fallback(mut self, text: impl Into<String>) -> Self {
        self.config.alt_text_fallback = Some(text.into());
        self
    }

    pub fn request_spacing_ms(mut self, ms: u64) -> Self {
        self.config.request_spacing_ms = ms;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, Pdf2HtmlError> {
        let c = &self.config;
        if c.storage_root.as_os_str().is_empty() {
            return Err(Pdf2HtmlError::InvalidConfig(
                "Storage root must not be empty".into(),
            ));
        }
        if c.retention.is_zero() {
            return Err(Pdf2HtmlError::InvalidConfig(
                "Retention must be greater than zero".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(Pdf2HtmlError::InvalidConfig(
                "Upload limit must be ≥ 1 byte".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(Pdf2HtmlError::InvalidConfig(
                "API timeout must be ≥ 1s".into(),
            ));
        }
        Ok(self.config)
    }
}
