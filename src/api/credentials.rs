//! TurboDocx credentials loading
//!
//! Supports:
//! - Environment variables (TURBODOCX_API_KEY, TURBODOCX_ORG_ID, TURBODOCX_BASE_URL)
//! - Named `[profile]` sections in ~/.turbodocx/credentials (or TURBODOCX_CREDENTIALS_FILE)

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.turbodocx.com";
pub const DEFAULT_PROFILE: &str = "default";

const API_KEY_VAR: &str = "TURBODOCX_API_KEY";
const ORG_ID_VAR: &str = "TURBODOCX_ORG_ID";
const BASE_URL_VAR: &str = "TURBODOCX_BASE_URL";
const CREDENTIALS_FILE_VAR: &str = "TURBODOCX_CREDENTIALS_FILE";

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error(
        "No credentials found for profile '{profile}'. Set TURBODOCX_API_KEY/TURBODOCX_ORG_ID or add the profile to {path}"
    )]
    NotFound { profile: String, path: String },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Credential bundle used for every request of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// API key or JWT, sent as a bearer token
    pub api_key: String,
    /// Organization UUID, sent as `x-rapiddocx-org-id`
    pub org_id: String,
    /// API base URL without a trailing slash
    pub base_url: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, org_id: impl Into<String>, base_url: Option<&str>) -> Self {
        Self {
            api_key: api_key.into(),
            org_id: org_id.into(),
            base_url: normalize_base_url(base_url.unwrap_or(DEFAULT_BASE_URL)),
        }
    }

    /// Replace the base URL (e.g., from a command-line override)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Load credentials for a given profile
pub fn load_credentials(profile: &str) -> Result<Credentials, CredentialsError> {
    // 1. Environment variables (default profile only)
    if profile == DEFAULT_PROFILE {
        if let Ok(creds) = load_from_env() {
            debug!("Loaded credentials from environment variables");
            return Ok(creds);
        }
    }

    // 2. Credentials file
    let path = credentials_file_path()?;
    if path.exists() {
        let creds = load_from_file(&path, profile)?;
        debug!(
            "Loaded credentials from {:?} for profile '{}'",
            path, profile
        );
        return Ok(creds);
    }

    Err(CredentialsError::NotFound {
        profile: profile.to_string(),
        path: path.display().to_string(),
    })
}

/// Load credentials from environment variables
fn load_from_env() -> Result<Credentials> {
    let api_key = env::var(API_KEY_VAR).map_err(|_| anyhow!("{} not set", API_KEY_VAR))?;
    let org_id = env::var(ORG_ID_VAR).map_err(|_| anyhow!("{} not set", ORG_ID_VAR))?;
    let base_url = env::var(BASE_URL_VAR).ok();

    Ok(Credentials::new(api_key, org_id, base_url.as_deref()))
}

/// Path of the credentials file
pub fn credentials_file_path() -> Result<PathBuf> {
    if let Ok(path) = env::var(CREDENTIALS_FILE_VAR) {
        return Ok(PathBuf::from(path));
    }

    dirs::home_dir()
        .map(|h| h.join(".turbodocx").join("credentials"))
        .ok_or_else(|| anyhow!("Could not find home directory"))
}

/// Load one profile from an INI-style credentials file
pub fn load_from_file(path: &Path, profile: &str) -> Result<Credentials, CredentialsError> {
    let content =
        fs::read_to_string(path).map_err(|e| anyhow!("Could not read {:?}: {}", path, e))?;

    let sections = parse_ini_file(&content);
    let section = sections
        .get(profile)
        .ok_or_else(|| CredentialsError::NotFound {
            profile: profile.to_string(),
            path: path.display().to_string(),
        })?;

    credentials_from_section(profile, section).map_err(CredentialsError::Other)
}

fn credentials_from_section(profile: &str, section: &HashMap<String, String>) -> Result<Credentials> {
    let api_key = section
        .get("api_key")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("api_key not found for profile '{}'", profile))?;
    let org_id = section
        .get("org_id")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("org_id not found for profile '{}'", profile))?;

    Ok(Credentials::new(
        api_key.clone(),
        org_id.clone(),
        section.get("base_url").map(String::as_str),
    ))
}

/// Split a credentials file into `[name]` sections of `key = value` pairs.
///
/// Blank lines and `#`/`;` comments are ignored, as are pairs before the first
/// section header.
fn parse_ini_file(content: &str) -> HashMap<String, HashMap<String, String>> {
    let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current: Option<String> = None;

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with(['#', ';']) {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_string();
            sections.entry(name.clone()).or_default();
            current = Some(name);
        } else if let (Some(section), Some((key, value))) = (&current, line.split_once('=')) {
            sections
                .entry(section.clone())
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    sections
}
