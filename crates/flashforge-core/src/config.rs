//! Generator configuration
//!
//! Layered: built-in defaults, then `<config dir>/flashforge/config.toml`, then
//! `FLASHFORGE_*` environment variables. A missing endpoint is not an error
//! here; sessions report it as `NotConfigured`.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::stream::WireEncoding;
use crate::types::MAX_PROMPT_CHARS;

pub const ENV_ENDPOINT: &str = "FLASHFORGE_ENDPOINT";
pub const ENV_TIMEOUT_SECS: &str = "FLASHFORGE_TIMEOUT_SECS";
pub const ENV_ENCODING: &str = "FLASHFORGE_ENCODING";

const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Which wire encoding to decode a streaming body with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncodingPreference {
    /// Follow the response `Content-Type`
    #[default]
    Auto,
    Flat,
    EventStream,
}

impl EncodingPreference {
    pub fn resolve(self, content_type: Option<&str>) -> WireEncoding {
        match self {
            EncodingPreference::Auto => WireEncoding::from_content_type(content_type),
            EncodingPreference::Flat => WireEncoding::Flat,
            EncodingPreference::EventStream => WireEncoding::EventStream,
        }
    }
}

impl FromStr for EncodingPreference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(EncodingPreference::Auto),
            "flat" | "text" => Ok(EncodingPreference::Flat),
            "event-stream" | "sse" => Ok(EncodingPreference::EventStream),
            other => Err(anyhow!(
                "unknown encoding '{}' (expected auto, flat or event-stream)",
                other
            )),
        }
    }
}

/// Settings shared by every session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub endpoint: Option<Url>,
    pub encoding: EncodingPreference,
    /// Longest wait for the next chunk of a streaming response
    pub inactivity_timeout: Duration,
    /// Deadline for a complete (non-streaming) response
    pub request_timeout: Duration,
    pub max_prompt_chars: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            encoding: EncodingPreference::Auto,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_prompt_chars: MAX_PROMPT_CHARS,
        }
    }
}

/// On-disk shape of `config.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    endpoint: Option<String>,
    encoding: Option<EncodingPreference>,
    inactivity_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

impl GeneratorConfig {
    /// Default config location: `<config dir>/flashforge/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("flashforge").join("config.toml"))
    }

    /// Defaults, then the default config file if present, then the environment
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path().as_deref())
    }

    /// Like [`GeneratorConfig::load`] with an explicit file
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                debug!("Loaded config from {}", path.display());
                Self::from_toml_str(&content)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        let mut config = Self::default();
        if let Some(endpoint) = file.endpoint {
            config.endpoint = Some(parse_endpoint(&endpoint)?);
        }
        if let Some(encoding) = file.encoding {
            config.encoding = encoding;
        }
        if let Some(secs) = file.inactivity_timeout_secs {
            config.inactivity_timeout = timeout_secs(secs)?;
        }
        if let Some(secs) = file.request_timeout_secs {
            config.request_timeout = timeout_secs(secs)?;
        }
        Ok(config)
    }

    /// Apply `FLASHFORGE_*` overrides read through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|v| !v.trim().is_empty()) {
            self.endpoint = Some(parse_endpoint(&endpoint).context(ENV_ENDPOINT)?);
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds", ENV_TIMEOUT_SECS))?;
            self.inactivity_timeout = timeout_secs(secs)?;
        }
        if let Some(encoding) = lookup(ENV_ENCODING) {
            self.encoding = encoding.parse().context(ENV_ENCODING)?;
        }
        Ok(())
    }
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("invalid endpoint URL '{}'", raw))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(anyhow!("endpoint must be http or https, got '{}'", other)),
    }
}

fn timeout_secs(secs: u64) -> Result<Duration> {
    if secs == 0 {
        return Err(anyhow!("timeouts must be at least one second"));
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = GeneratorConfig::default();
        assert!(config.endpoint.is_none());
        assert_eq!(config.encoding, EncodingPreference::Auto);
        assert_eq!(config.inactivity_timeout, Duration::from_secs(30));
        assert_eq!(config.max_prompt_chars, 250);
    }

    #[test]
    fn test_toml_file() {
        let config = GeneratorConfig::from_toml_str(
            r#"
            endpoint = "https://cards.example.com/api/generate"
            encoding = "event-stream"
            inactivity_timeout_secs = 10
            "#,
        )
        .unwrap();
        assert_eq!(
            config.endpoint.unwrap().as_str(),
            "https://cards.example.com/api/generate"
        );
        assert_eq!(config.encoding, EncodingPreference::EventStream);
        assert_eq!(config.inactivity_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(GeneratorConfig::from_toml_str("endpont = \"x\"").is_err());
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut config =
            GeneratorConfig::from_toml_str("endpoint = \"https://a.example.com\"").unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_ENDPOINT, "http://localhost:8787/generate"),
            (ENV_TIMEOUT_SECS, "5"),
            (ENV_ENCODING, "flat"),
        ]);
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.endpoint.unwrap().port(), Some(8787));
        assert_eq!(config.inactivity_timeout, Duration::from_secs(5));
        assert_eq!(config.encoding, EncodingPreference::Flat);
    }

    #[test]
    fn test_bad_values_rejected() {
        assert!(GeneratorConfig::from_toml_str("endpoint = \"ftp://x\"").is_err());
        assert!(GeneratorConfig::from_toml_str("inactivity_timeout_secs = 0").is_err());
        let mut config = GeneratorConfig::default();
        assert!(config
            .apply_overrides(|key| (key == ENV_TIMEOUT_SECS).then(|| "soon".to_string()))
            .is_err());
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = GeneratorConfig::load_from(Some(&dir.path().join("absent.toml")));
        assert!(config.is_ok());
    }

    #[test]
    fn test_encoding_resolution() {
        assert_eq!(
            EncodingPreference::Auto.resolve(Some("text/event-stream")),
            WireEncoding::EventStream
        );
        assert_eq!(
            EncodingPreference::Flat.resolve(Some("text/event-stream")),
            WireEncoding::Flat
        );
        assert_eq!("sse".parse::<EncodingPreference>().unwrap(), EncodingPreference::EventStream);
        assert!("xml".parse::<EncodingPreference>().is_err());
    }
}
