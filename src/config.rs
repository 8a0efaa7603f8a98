//! Application configuration: optional `tabload.config.json` discovery and
//! connection-setting resolution.
//!
//! Candidate locations, first hit wins: `tabload.config.json` in the
//! working directory and each of its ancestors, then
//! `~/.tabload/config.json`, then `/etc/tabload/config.json`. Malformed
//! candidates are skipped rather than failing the run.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use log::debug;
use serde::Deserialize;

use crate::profile::{ImportProfile, NameStyle};
use crate::writer::DEFAULT_SCHEMA;

pub const CONFIG_FILE_NAME: &str = "tabload.config.json";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseConfig {
    pub default_connection_string: Option<String>,
    pub default_schema: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            default_connection_string: None,
            default_schema: DEFAULT_SCHEMA.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DefaultsConfig {
    pub column_name_style: NameStyle,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            column_name_style: NameStyle::SnakeCase,
        }
    }
}

impl AppConfig {
    /// Loads the first readable, well-formed config from the candidate
    /// locations; defaults otherwise.
    pub fn load() -> Self {
        let candidates = candidate_paths();
        Self::load_from_candidates(&candidates)
    }

    fn load_from_candidates(candidates: &[PathBuf]) -> Self {
        for path in candidates {
            if !path.is_file() {
                continue;
            }
            match read_config(path) {
                Ok(config) => {
                    debug!("Loaded configuration from {path:?}");
                    return config;
                }
                Err(err) => {
                    debug!("Skipping malformed config {path:?}: {err}");
                }
            }
        }
        AppConfig::default()
    }
}

fn read_config(path: &Path) -> anyhow::Result<AppConfig> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(mut current) = env::current_dir() {
        loop {
            paths.push(current.join(CONFIG_FILE_NAME));
            if !current.pop() {
                break;
            }
        }
    }

    if let Some(home) = env::var_os("HOME").filter(|h| !h.is_empty()) {
        paths.push(PathBuf::from(home).join(".tabload").join("config.json"));
    }

    paths.push(PathBuf::from("/etc/tabload/config.json"));
    paths
}

/// Connection string and schema for a write phase, after precedence rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub connection_string: Option<String>,
    pub schema: String,
}

/// Resolution precedence: CLI flag, then profile, then config file; the
/// schema falls back to `dbo`.
pub fn resolve_connection(
    cli_connection_string: Option<&str>,
    cli_schema: Option<&str>,
    profile: &ImportProfile,
    config: &AppConfig,
) -> ConnectionSettings {
    let connection_string = first_non_empty(&[
        cli_connection_string,
        profile.table_connection_string.as_deref(),
        config.database.default_connection_string.as_deref(),
    ]);

    let schema = first_non_empty(&[
        cli_schema,
        profile.table_schema.as_deref(),
        Some(config.database.default_schema.as_str()),
        Some(DEFAULT_SCHEMA),
    ])
    .unwrap_or_else(|| DEFAULT_SCHEMA.to_string());

    ConnectionSettings {
        connection_string,
        schema,
    }
}

fn first_non_empty(values: &[Option<&str>]) -> Option<String> {
    values
        .iter()
        .flatten()
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(str::to_string)
}
