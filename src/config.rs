//! Process-wide settings.
//!
//! Built once at startup: an optional YAML file (path in `SHIKSHA_CONFIG`),
//! then environment overrides:
//!
//! | Variable | Setting |
//! |----------|---------|
//! | `GEMINI_API_KEY`, `GOOGLE_API_KEY`, `GOOGLE_GENAI_API_KEY` | `api_key` (first set wins) |
//! | `SHIKSHA_DEFAULT_MODEL` | `default_model` |
//! | `SHIKSHA_BASE_URL` | `base_url` |
//! | `AI_HTTP_TIMEOUT_SECS` | `timeout_secs` |
//! | `AI_PROXY_URL` | `proxy_url` |

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, ErrorContext};
use crate::model::{ModelDefaults, SafetyPolicy, DEFAULT_BASE_URL};
use crate::Result;

pub const DEFAULT_MODEL: &str = "googleai/gemini-2.0-flash";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const CONFIG_PATH_VAR: &str = "SHIKSHA_CONFIG";

const API_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY", "GOOGLE_GENAI_API_KEY"];

#[derive(Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub api_key: Option<String>,
    /// Model used by flows that do not name one.
    pub default_model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub proxy_url: Option<String>,
    /// Default safety thresholds; per-flow policies override per category.
    pub safety: SafetyPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            proxy_url: None,
            safety: SafetyPolicy::new(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("default_model", &self.default_model)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("proxy_url", &self.proxy_url)
            .field("safety", &self.safety)
            .finish()
    }
}

impl Settings {
    /// Load from `SHIKSHA_CONFIG` (if set) and the process environment.
    pub fn from_env() -> Result<Self> {
        let base = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_yaml_file(path.trim())?,
            _ => Self::default(),
        };
        let settings = base.apply_env_with(|name| std::env::var(name).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("Failed to read settings file: {}", e),
                ErrorContext::new()
                    .with_field_path(path.display().to_string())
                    .with_source("settings"),
            )
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str::<Settings>(content).map_err(|e| {
            Error::configuration_with_context(
                format!("Invalid settings: {}", e),
                ErrorContext::new().with_source("settings"),
            )
        })
    }

    /// Apply environment overrides through `lookup`. Empty values are ignored.
    pub fn apply_env_with<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = API_KEY_VARS.iter().find_map(|name| get(*name)) {
            self.api_key = Some(key);
        }
        if let Some(model) = get("SHIKSHA_DEFAULT_MODEL") {
            self.default_model = model;
        }
        if let Some(url) = get("SHIKSHA_BASE_URL") {
            self.base_url = url;
        }
        if let Some(raw) = get("AI_HTTP_TIMEOUT_SECS") {
            self.timeout_secs = raw.parse::<u64>().map_err(|_| {
                Error::configuration_with_context(
                    "AI_HTTP_TIMEOUT_SECS must be a whole number of seconds",
                    ErrorContext::new()
                        .with_field_path("timeout_secs")
                        .with_details(format!("got '{}'", raw))
                        .with_source("environment"),
                )
            })?;
        }
        if let Some(proxy) = get("AI_PROXY_URL") {
            self.proxy_url = Some(proxy);
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url).map_err(|e| {
            Error::configuration_with_context(
                format!("Invalid base URL: {}", e),
                ErrorContext::new()
                    .with_field_path("settings.base_url")
                    .with_details(self.base_url.clone())
                    .with_source("settings"),
            )
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::configuration_with_context(
                "Base URL must use http or https",
                ErrorContext::new()
                    .with_field_path("settings.base_url")
                    .with_details(self.base_url.clone())
                    .with_source("settings"),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(Error::configuration_with_context(
                "Timeout must be at least one second",
                ErrorContext::new()
                    .with_field_path("settings.timeout_secs")
                    .with_source("settings"),
            ));
        }
        if self.default_model.trim().is_empty() {
            return Err(Error::configuration_with_context(
                "Default model must not be empty",
                ErrorContext::new()
                    .with_field_path("settings.default_model")
                    .with_source("settings"),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn model_defaults(&self) -> ModelDefaults {
        ModelDefaults::new(self.default_model.clone()).with_safety(self.safety.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HarmBlockThreshold, HarmCategory};
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.timeout(), Duration::from_secs(60));
        assert_eq!(settings.model_defaults().model, DEFAULT_MODEL);
    }

    #[test]
    fn test_env_overrides() {
        let settings = Settings::default()
            .apply_env_with(env(&[
                ("GOOGLE_API_KEY", "k2"),
                ("GOOGLE_GENAI_API_KEY", "k3"),
                ("SHIKSHA_DEFAULT_MODEL", "googleai/gemini-1.5-flash"),
                ("AI_HTTP_TIMEOUT_SECS", "15"),
                ("AI_PROXY_URL", "  "),
            ]))
            .unwrap();
        assert_eq!(settings.api_key.as_deref(), Some("k2"));
        assert_eq!(settings.default_model, "googleai/gemini-1.5-flash");
        assert_eq!(settings.timeout_secs, 15);
        assert_eq!(settings.proxy_url, None);
    }

    #[test]
    fn test_bad_timeout_rejected() {
        let err = Settings::default()
            .apply_env_with(env(&[("AI_HTTP_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("timeout_secs")
        );
    }

    #[test]
    fn test_yaml_with_safety() {
        let settings = Settings::from_yaml_str(
            "default_model: googleai/gemini-2.0-flash\n\
             timeout_secs: 30\n\
             safety:\n  harassment: block_only_high\n",
        )
        .unwrap();
        assert_eq!(settings.timeout_secs, 30);
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(
            settings.model_defaults().safety.get(HarmCategory::Harassment),
            Some(HarmBlockThreshold::BlockOnlyHigh)
        );

        assert!(Settings::from_yaml_str("timeout: 3\n").is_err());
        assert_eq!(Settings::from_yaml_str("").unwrap(), Settings::default());
    }

    #[test]
    fn test_validate_base_url() {
        let mut settings = Settings::default();
        settings.base_url = "not a url".into();
        assert!(settings.validate().is_err());
        settings.base_url = "ftp://example.com".into();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let settings = Settings {
            api_key: Some("AIza-secret".into()),
            ..Settings::default()
        };
        assert!(!format!("{:?}", settings).contains("AIza-secret"));
    }
}
