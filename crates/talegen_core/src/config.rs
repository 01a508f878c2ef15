use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://www.wikidot.com/xml-rpc-api.php";
pub const DEFAULT_TAG: &str = "tale";
pub const DEFAULT_OUTPUT_DIR: &str = "pages";

/// Whether finished pages are written locally or published to the wiki.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiMode {
    #[default]
    ReadOnly,
    ReadWrite,
}

impl ApiMode {
    pub fn parse(value: &str) -> Result<Self> {
        if value.eq_ignore_ascii_case("ro") {
            return Ok(Self::ReadOnly);
        }
        if value.eq_ignore_ascii_case("rw") {
            return Ok(Self::ReadWrite);
        }
        bail!("unsupported api mode: {value} (expected ro|rw)")
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "ro",
            Self::ReadWrite => "rw",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct TalegenConfig {
    #[serde(default)]
    pub wikidot: WikidotSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikidotSection {
    pub site: Option<String>,
    pub user: Option<String>,
    pub api_url: Option<String>,
    pub mode: Option<String>,
    pub tag: Option<String>,
    pub output_dir: Option<String>,
}

impl TalegenConfig {
    /// Resolve the target site: env WIKIDOT_SITE > config. Required.
    pub fn site(&self) -> Result<String> {
        if let Some(value) = env_override("WIKIDOT_SITE") {
            return Ok(value);
        }
        match &self.wikidot.site {
            Some(site) if !site.trim().is_empty() => Ok(site.trim().to_string()),
            _ => bail!("no wikidot site configured (set WIKIDOT_SITE or [wikidot].site)"),
        }
    }

    /// Resolve the API username: env WIKIDOT_API_USER > config. Required.
    pub fn api_user(&self) -> Result<String> {
        if let Some(value) = env_override("WIKIDOT_API_USER") {
            return Ok(value);
        }
        match &self.wikidot.user {
            Some(user) if !user.trim().is_empty() => Ok(user.trim().to_string()),
            _ => bail!("no wikidot API user configured (set WIKIDOT_API_USER or [wikidot].user)"),
        }
    }

    /// The API key is a secret and only ever comes from the environment.
    pub fn api_key(&self) -> Result<String> {
        env_override("WIKIDOT_API_KEY")
            .context("no wikidot API key configured (set WIKIDOT_API_KEY)")
    }

    /// Resolve the API endpoint: env WIKIDOT_API_URL > config > default.
    pub fn api_url(&self) -> String {
        if let Some(value) = env_override("WIKIDOT_API_URL") {
            return value;
        }
        self.wikidot
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    /// Resolve the sink mode: env WIKIDOT_API_MODE > config > read-only.
    pub fn api_mode(&self) -> Result<ApiMode> {
        if let Some(value) = env_override("WIKIDOT_API_MODE") {
            return ApiMode::parse(&value);
        }
        match &self.wikidot.mode {
            Some(mode) => ApiMode::parse(mode),
            None => Ok(ApiMode::ReadOnly),
        }
    }

    /// Resolve the tale tag: env WIKIDOT_TAG > config > "tale".
    pub fn tag(&self) -> String {
        if let Some(value) = env_override("WIKIDOT_TAG") {
            return value;
        }
        self.wikidot
            .tag
            .clone()
            .unwrap_or_else(|| DEFAULT_TAG.to_string())
    }

    /// Resolve the local output directory for read-only mode.
    pub fn output_dir(&self) -> String {
        if let Some(value) = env_override("WIKIDOT_OUTPUT_DIR") {
            return value;
        }
        self.wikidot
            .output_dir
            .clone()
            .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string())
    }
}

fn env_override(name: &str) -> Option<String> {
    let value = env::var(name).ok()?;
    let trimmed = value.trim().to_string();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

/// Load a TalegenConfig from a TOML file. Returns default if it is missing.
pub fn load_config(config_path: &Path) -> Result<TalegenConfig> {
    if !config_path.exists() {
        return Ok(TalegenConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: TalegenConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}
