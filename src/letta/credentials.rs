use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://api.letta.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    Flag,
    Env,
    Settings,
    Default,
}

impl CredentialSource {
    pub fn as_str(self) -> &'static str {
        match self {
            CredentialSource::Flag => "flag",
            CredentialSource::Env => "env",
            CredentialSource::Settings => "settings",
            CredentialSource::Default => "default",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub agent_id: String,
    pub agent_id_source: CredentialSource,
    pub api_key: String,
    pub api_key_source: CredentialSource,
    pub base_url: String,
    pub base_url_source: CredentialSource,
}

/// The `env` table of the Letta settings file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LettaSettings {
    #[serde(default)]
    env: BTreeMap<String, Value>,
}

impl LettaSettings {
    pub fn env_len(&self) -> usize {
        self.env.len()
    }

    fn env_value(&self, key: &str) -> Option<String> {
        self.env
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ToOwned::to_owned)
    }
}

pub fn env_non_empty(var: &str) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// `$LETTA_HOME`, or `~/.letta`.
pub fn letta_home() -> Option<PathBuf> {
    if let Some(custom) = env_non_empty("LETTA_HOME") {
        return Some(PathBuf::from(custom));
    }
    Some(dirs::home_dir()?.join(".letta"))
}

pub fn settings_path() -> Option<PathBuf> {
    Some(letta_home()?.join("settings.json"))
}

/// Read the settings file leniently; a missing or unparsable file counts as empty.
pub fn load_settings() -> LettaSettings {
    let Some(path) = settings_path() else {
        return LettaSettings::default();
    };
    let Ok(raw) = fs::read_to_string(&path) else {
        return LettaSettings::default();
    };
    match json5::from_str::<LettaSettings>(&raw) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "ignoring unreadable Letta settings file");
            LettaSettings::default()
        }
    }
}

fn resolve_with<F>(
    agent_id_flag: Option<&str>,
    env_lookup: F,
    settings: &LettaSettings,
) -> Result<Credentials, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| -> Option<(String, CredentialSource)> {
        env_lookup(key)
            .map(|v| (v, CredentialSource::Env))
            .or_else(|| settings.env_value(key).map(|v| (v, CredentialSource::Settings)))
    };

    let (api_key, api_key_source) = lookup("LETTA_API_KEY").ok_or(ConfigError::MissingApiKey)?;

    let (agent_id, agent_id_source) = agent_id_flag
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| (v.to_string(), CredentialSource::Flag))
        .or_else(|| lookup("LETTA_AGENT_ID"))
        .ok_or(ConfigError::MissingAgentId)?;

    let (base_url, base_url_source) = lookup("LETTA_BASE_URL")
        .unwrap_or_else(|| (DEFAULT_BASE_URL.to_string(), CredentialSource::Default));

    Ok(Credentials {
        agent_id,
        agent_id_source,
        api_key,
        api_key_source,
        base_url: base_url.trim_end_matches('/').to_string(),
        base_url_source,
    })
}

/// Flag, then process environment (already seeded from `.env`), then the
/// settings file. Only the base URL has a default.
pub fn resolve_credentials(agent_id_flag: Option<&str>) -> Result<Credentials, ConfigError> {
    resolve_with(agent_id_flag, env_non_empty, &load_settings())
}

pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return "***".to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
