use anyhow::{anyhow, Context as AnyhowContext, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tabula_expr::Limits;
use tabula_synth::{ModelSettings, SynthMode};
use tabula_table::DEFAULT_PREVIEW_ROWS;

pub const DEFAULT_DATA_PATH: &str = "data/transactions.csv";
pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_ALLOW_ORIGIN: &str = "http://localhost:5500";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataConfig {
    pub path: PathBuf,
    pub preview_rows: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATA_PATH),
            preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: String,
    /// Allow binding to non-loopback addresses.
    pub public: bool,
    /// The single origin allowed to call `/query` from a browser.
    pub allow_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            public: false,
            allow_origin: DEFAULT_ALLOW_ORIGIN.to_string(),
        }
    }
}

/// Fully resolved process configuration. Loaded once at startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub data: DataConfig,
    pub server: ServerConfig,
    pub model: ModelSettings,
    pub limits: Limits,
}

/// Command-line values; they win over every other layer.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub data: Option<PathBuf>,
    pub bind: Option<String>,
    pub public: bool,
    pub allow_origin: Option<String>,
    pub preview_rows: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    data: Option<RawData>,
    server: Option<RawServer>,
    model: Option<RawModel>,
    limits: Option<RawLimits>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawData {
    path: Option<PathBuf>,
    preview_rows: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawServer {
    bind: Option<String>,
    public: Option<bool>,
    allow_origin: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModel {
    mode: Option<SynthMode>,
    model: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLimits {
    max_steps: Option<u64>,
    max_duration_ms: Option<u64>,
    max_result_cells: Option<usize>,
}

impl Config {
    /// Resolves configuration with precedence CLI flag > environment > file > default.
    pub fn load(file: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let raw = match file {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                parse_raw(&text)
                    .with_context(|| format!("Invalid config file {}", path.display()))?
            }
            None => RawConfig::default(),
        };
        Self::from_layers(raw, |key| std::env::var(key).ok(), overrides)
    }

    /// Parses a TOML document on its own, without environment or flags.
    pub fn from_toml(text: &str) -> Result<Self> {
        Self::from_layers(parse_raw(text)?, |_| None, &Overrides::default())
    }

    fn from_layers(
        raw: RawConfig,
        env: impl Fn(&str) -> Option<String>,
        overrides: &Overrides,
    ) -> Result<Self> {
        let lookup = |key: &str| env(key).filter(|value| !value.trim().is_empty());
        let mut config = merge(raw);

        if let Some(path) = lookup("TABULA_DATA") {
            config.data.path = PathBuf::from(path);
        }
        if let Some(mode) = lookup("TABULA_SYNTH_MODE") {
            config.model.mode = mode.parse().map_err(|err: String| anyhow!(err))?;
        }
        if let Some(model) = lookup("TABULA_MODEL") {
            config.model.model = model;
        }
        if let Some(base_url) = lookup("OPENAI_BASE_URL") {
            config.model.base_url = base_url;
        }
        config.model.api_key = lookup("OPENAI_API_KEY");

        if let Some(path) = &overrides.data {
            config.data.path = path.clone();
        }
        if let Some(rows) = overrides.preview_rows {
            config.data.preview_rows = rows;
        }
        if let Some(bind) = &overrides.bind {
            config.server.bind = bind.clone();
        }
        if let Some(origin) = &overrides.allow_origin {
            config.server.allow_origin = origin.clone();
        }
        if overrides.public {
            config.server.public = true;
        }

        config.validate().map_err(|err| anyhow!(err))?;
        Ok(config)
    }

    /// Validate everything except model credentials, which only matter to
    /// commands that call the model.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.data.preview_rows == 0 {
            return Err("preview_rows must be > 0".to_string());
        }
        if self.server.allow_origin.trim().is_empty() {
            return Err("allow_origin must not be empty".to_string());
        }
        if self.model.timeout.is_zero() {
            return Err("model timeout must be > 0".to_string());
        }
        self.limits.validate()
    }
}

fn parse_raw(text: &str) -> Result<RawConfig> {
    toml::from_str(text).map_err(|err| anyhow!("Config parse error: {err}"))
}

fn merge(raw: RawConfig) -> Config {
    let defaults = Config::default();

    let data = raw.data.unwrap_or_default();
    let server = raw.server.unwrap_or_default();
    let model = raw.model.unwrap_or_default();
    let limits = raw.limits.unwrap_or_default();

    Config {
        data: DataConfig {
            path: data.path.unwrap_or(defaults.data.path),
            preview_rows: data.preview_rows.unwrap_or(defaults.data.preview_rows),
        },
        server: ServerConfig {
            bind: server.bind.unwrap_or(defaults.server.bind),
            public: server.public.unwrap_or(defaults.server.public),
            allow_origin: server.allow_origin.unwrap_or(defaults.server.allow_origin),
        },
        model: ModelSettings {
            mode: model.mode.unwrap_or(defaults.model.mode),
            model: model.model.unwrap_or(defaults.model.model),
            base_url: model.base_url.unwrap_or(defaults.model.base_url),
            api_key: None,
            timeout: model
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.model.timeout),
        },
        limits: Limits {
            max_steps: limits.max_steps.unwrap_or(defaults.limits.max_steps),
            max_duration: limits
                .max_duration_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.limits.max_duration),
            max_result_cells: limits
                .max_result_cells
                .unwrap_or(defaults.limits.max_result_cells),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_follow_the_observed_service() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:5000");
        assert_eq!(config.server.allow_origin, "http://localhost:5500");
        assert_eq!(config.data.preview_rows, 5);
        assert_eq!(config.model.timeout, Duration::from_secs(30));
        assert_eq!(config.limits, Limits::default());
        assert!(!config.server.public);
    }

    #[test]
    fn file_values_are_read() {
        let config = Config::from_toml(
            r#"
            [data]
            path = "sales.csv"
            preview_rows = 3

            [server]
            bind = "127.0.0.1:8080"
            public = true

            [model]
            mode = "heuristic"
            timeout_secs = 10

            [limits]
            max_result_cells = 50
            max_duration_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.data.path, PathBuf::from("sales.csv"));
        assert_eq!(config.data.preview_rows, 3);
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert!(config.server.public);
        assert_eq!(config.model.mode, SynthMode::Heuristic);
        assert_eq!(config.model.timeout, Duration::from_secs(10));
        assert_eq!(config.limits.max_result_cells, 50);
        assert_eq!(config.limits.max_duration, Duration::from_millis(250));
        assert_eq!(config.limits.max_steps, Limits::default().max_steps);
    }

    #[test]
    fn flag_beats_env_beats_file() {
        let raw = parse_raw("[data]\npath = \"file.csv\"\n[model]\nmodel = \"file-model\"\n").unwrap();
        let env = env_of(&[
            ("TABULA_DATA", "env.csv"),
            ("TABULA_MODEL", "env-model"),
            ("TABULA_SYNTH_MODE", "heuristic"),
            ("OPENAI_API_KEY", "sk-env"),
        ]);
        let overrides = Overrides {
            data: Some(PathBuf::from("flag.csv")),
            ..Overrides::default()
        };
        let config = Config::from_layers(raw, env, &overrides).unwrap();
        assert_eq!(config.data.path, PathBuf::from("flag.csv"));
        assert_eq!(config.model.model, "env-model");
        assert_eq!(config.model.mode, SynthMode::Heuristic);
        assert_eq!(config.model.api_key.as_deref(), Some("sk-env"));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(Config::from_toml("[data]\nunknown = 1\n").is_err());
        assert!(Config::from_toml("[limits]\nmax_steps = 0\n").is_err());
        assert!(Config::from_toml("[model]\nmode = \"gpt\"\n").is_err());
        let raw = RawConfig::default();
        let env = env_of(&[("TABULA_SYNTH_MODE", "telepathy")]);
        assert!(Config::from_layers(raw, env, &Overrides::default()).is_err());
    }
}
