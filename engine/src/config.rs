use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

use scoresheet_providers::GeminiConfig;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "SCORESHEET_CONFIG";

/// Checked in order when `[api_keys].google` is not set.
const GOOGLE_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY"];

// Default value function for serde (bool::default() is false, so only true needs a fn)
pub(crate) const fn default_true() -> bool {
    true
}

const fn default_max_edit_distance() -> usize {
    crate::matching::DEFAULT_MAX_EDIT_DISTANCE
}

#[derive(Debug, Default, Deserialize)]
pub struct ScoresheetConfig {
    pub recognizer: Option<RecognizerConfig>,
    pub api_keys: Option<ApiKeys>,
    pub matching: Option<MatchingConfig>,
    pub pipeline: Option<PipelineSection>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// `[recognizer]`: Gemini model selection and transport.
#[derive(Debug, Default, Deserialize)]
pub struct RecognizerConfig {
    /// Model used for move transcription.
    pub model: Option<String>,
    /// Model used for header and clock extraction.
    pub fast_model: Option<String>,
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

#[derive(Default, Deserialize)]
pub struct ApiKeys {
    pub google: Option<String>,
}

// Manual Debug impl to prevent leaking API keys in logs.
impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let google = if self.google.is_some() {
            "[REDACTED]"
        } else {
            "None"
        };
        f.debug_struct("ApiKeys").field("google", &google).finish()
    }
}

/// `[matching]`: how candidates are matched to legal moves.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MatchingConfig {
    #[serde(default = "default_max_edit_distance")]
    pub max_edit_distance: usize,
    /// Send the legal moves of the position along with each move request.
    #[serde(default = "default_true")]
    pub hint_legal_moves: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_edit_distance: default_max_edit_distance(),
            hint_legal_moves: true,
        }
    }
}

/// `[pipeline]`
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PipelineSection {
    /// Run the three stages concurrently. `false` runs them one after another.
    #[serde(default = "default_true")]
    pub concurrent_stages: bool,
    pub max_plies: Option<usize>,
    /// Cancel the run after this many seconds, keeping partial results.
    pub timeout_secs: Option<u64>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            concurrent_stages: true,
            max_plies: None,
            timeout_secs: None,
        }
    }
}

fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".scoresheet").join("config.toml"))
}

/// Expand `${VAR}` references from the environment. Unset variables expand
/// to the empty string; an unclosed `${` is kept as written.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut i = 0;

    while i < value.len() {
        if value[i..].starts_with("${") {
            let start = i + 2;
            if let Some(end_rel) = value[start..].find('}') {
                let end = start + end_rel;
                let var = &value[start..end];
                if !var.is_empty() {
                    let replacement = env::var(var).unwrap_or_default();
                    out.push_str(&replacement);
                }
                i = end + 1;
                continue;
            }
        }

        let Some(ch) = value[i..].chars().next() else {
            break;
        };
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}

impl ScoresheetConfig {
    /// Load from the default location. `Ok(None)` when no file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Google API key from the config file (with `${VAR}` expansion), falling
    /// back to `GEMINI_API_KEY` then `GOOGLE_API_KEY`.
    #[must_use]
    pub fn google_api_key(&self) -> Option<String> {
        let configured = self
            .api_keys
            .as_ref()
            .and_then(|keys| keys.google.as_deref())
            .map(expand_env_vars)
            .filter(|key| !key.trim().is_empty());

        configured.or_else(|| {
            GOOGLE_KEY_ENV_VARS
                .iter()
                .filter_map(|name| env::var(name).ok())
                .find(|key| !key.trim().is_empty())
        })
    }

    /// Gemini client settings, or `None` when no API key is available.
    #[must_use]
    pub fn gemini_config(&self) -> Option<GeminiConfig> {
        let mut config = GeminiConfig::new(self.google_api_key()?);
        if let Some(section) = &self.recognizer {
            if let Some(model) = section.model.as_deref().filter(|m| !m.trim().is_empty()) {
                config.model = model.trim().to_string();
            }
            if let Some(model) = section
                .fast_model
                .as_deref()
                .filter(|m| !m.trim().is_empty())
            {
                config.fast_model = model.trim().to_string();
            }
            if let Some(base_url) = section.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
                config.base_url = base_url.trim().trim_end_matches('/').to_string();
            }
            if let Some(secs) = section.request_timeout_secs {
                config.request_timeout = Duration::from_secs(secs);
            }
            if let Some(retries) = section.max_retries {
                config.retry.max_retries = retries;
            }
        }
        Some(config)
    }

    #[must_use]
    pub fn matching(&self) -> MatchingConfig {
        self.matching.unwrap_or_default()
    }

    #[must_use]
    pub fn pipeline(&self) -> PipelineSection {
        self.pipeline.unwrap_or_default()
    }
}
