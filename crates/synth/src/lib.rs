//! # Tabula Synth
//!
//! Translates a natural-language question into a single expression over `df`.
//!
//! ## Architecture
//!
//! ```text
//! question + schema preview
//!     │
//!     ├──> Prompt (fixed template, two substitution points)
//!     │
//!     ├──> CompletionBackend::complete   (one call, bounded by a timeout)
//!     │       ├─ OpenAiBackend      chat/completions over HTTPS
//!     │       ├─ HeuristicBackend   offline keyword rules
//!     │       └─ ScriptedBackend    fixed output, for tests
//!     │
//!     └──> normalize + check_expression ──> expression text
//! ```
//!
//! The synthesizer never evaluates anything. A screened expression may still
//! use operations the executor refuses; that decision belongs to the
//! executor's whitelist.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tabula_synth::{ScriptedBackend, Synthesizer};
//! use tabula_table::Table;
//!
//! let table = Table::from_reader("revenue\n400\n600\n".as_bytes()).unwrap();
//! let preview = table.schema_preview(5);
//! let synth = Synthesizer::new(
//!     Arc::new(ScriptedBackend::new("```python\ndf['revenue'].sum()\n```")),
//!     Duration::from_secs(30),
//! );
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let expression = runtime
//!     .block_on(synth.synthesize("What is the total revenue?", &preview))
//!     .unwrap();
//! assert_eq!(expression, "df['revenue'].sum()");
//! ```

mod backend;
mod error;
mod heuristic;
mod prompt;
mod sanitize;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tabula_table::SchemaPreview;

pub use backend::{CompletionBackend, OpenAiBackend, ScriptedBackend};
pub use error::{Result, SynthesisError};
pub use heuristic::HeuristicBackend;
pub use prompt::{Prompt, PROMPT_TEMPLATE};
pub use sanitize::{check_expression, normalize};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Which backend answers questions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthMode {
    #[default]
    OpenAi,
    Heuristic,
}

impl SynthMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Heuristic => "heuristic",
        }
    }
}

impl FromStr for SynthMode {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "heuristic" | "stub" => Ok(Self::Heuristic),
            other => Err(format!(
                "Unsupported TABULA_SYNTH_MODE '{other}' (expected 'openai' or 'heuristic')"
            )),
        }
    }
}

impl fmt::Display for SynthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model provider settings
#[derive(Clone, PartialEq, Eq)]
pub struct ModelSettings {
    pub mode: SynthMode,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            mode: SynthMode::default(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSettings")
            .field("mode", &self.mode)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ModelSettings {
    /// Validate settings
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.timeout.is_zero() {
            return Err("model timeout must be > 0".to_string());
        }
        if self.mode == SynthMode::OpenAi {
            if self.model.trim().is_empty() {
                return Err("model name must not be empty".to_string());
            }
            if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
                return Err(format!("base URL '{}' must be http(s)", self.base_url));
            }
            if self.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
                return Err("OPENAI_API_KEY is required in openai mode".to_string());
            }
        }
        Ok(())
    }

    /// Builds the backend these settings describe.
    pub fn backend(&self) -> Result<Arc<dyn CompletionBackend>> {
        match self.mode {
            SynthMode::Heuristic => Ok(Arc::new(HeuristicBackend::new())),
            SynthMode::OpenAi => {
                let api_key = self.api_key.clone().unwrap_or_default();
                let backend =
                    OpenAiBackend::new(&self.base_url, api_key, self.model.clone(), self.timeout)?;
                Ok(Arc::new(backend))
            }
        }
    }
}

/// Question → expression, with one bounded backend call per question
#[derive(Clone)]
pub struct Synthesizer {
    backend: Arc<dyn CompletionBackend>,
    timeout: Duration,
}

impl Synthesizer {
    pub fn new(backend: Arc<dyn CompletionBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn from_settings(settings: &ModelSettings) -> Result<Self> {
        Ok(Self::new(settings.backend()?, settings.timeout))
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Renders the prompt, asks the backend once and screens the reply.
    pub async fn synthesize(&self, question: &str, preview: &SchemaPreview) -> Result<String> {
        let prompt = Prompt::new(question, preview);
        let raw = match tokio::time::timeout(self.timeout, self.backend.complete(&prompt)).await {
            Ok(reply) => reply?,
            Err(_) => {
                log::warn!(
                    "{} backend did not answer within {:?}",
                    self.backend.name(),
                    self.timeout
                );
                return Err(SynthesisError::Timeout(self.timeout));
            }
        };
        log::debug!("Raw completion from {}: {raw:?}", self.backend.name());

        let expression = normalize(&raw);
        check_expression(&expression)?;
        Ok(expression)
    }
}
