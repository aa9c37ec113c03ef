use std::{collections::HashMap, fs, path::Path};

use anyhow::{bail, Context};
use url::Url;

pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8000";
pub const SETTINGS_FILE: &str = "analysis_client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub service_url: Url,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
        }
    }
}

impl ClientSettings {
    pub fn with_service_url(raw: &str) -> anyhow::Result<Self> {
        Ok(Self {
            service_url: parse_service_url(raw)?,
        })
    }
}

/// Defaults, then `analysis_client.toml` in the working directory, then the
/// environment.
pub fn load_settings() -> anyhow::Result<ClientSettings> {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

fn load_settings_from(
    settings_file: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<ClientSettings> {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(settings_file) {
        let file_cfg = toml::from_str::<HashMap<String, String>>(&raw)
            .with_context(|| format!("invalid settings file '{}'", settings_file.display()))?;
        if let Some(v) = file_cfg.get("service_url") {
            settings.service_url = parse_service_url(v)?;
        }
    }

    if let Some(v) = env("ANALYSIS_SERVICE_URL") {
        settings.service_url = parse_service_url(&v)?;
    }
    if let Some(v) = env("APP__SERVICE_URL") {
        settings.service_url = parse_service_url(&v)?;
    }

    Ok(settings)
}

pub fn parse_service_url(raw: &str) -> anyhow::Result<Url> {
    let normalized = normalize_service_url(raw);
    let url = Url::parse(&normalized)
        .with_context(|| format!("invalid analysis service url '{normalized}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("analysis service url must be http or https, got '{normalized}'");
    }
    Ok(url)
}

fn normalize_service_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_SERVICE_URL.to_string();
    }
    trimmed.to_string()
}

fn default_service_url() -> Url {
    Url::parse(DEFAULT_SERVICE_URL).expect("default service url is valid")
}
