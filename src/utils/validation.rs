/// Input validation for tool parameters.
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

const MIN_API_KEY_LEN: usize = 20;

pub fn validate_api_key(api_key: &str) -> Result<()> {
    if api_key.trim().is_empty() {
        return Err(RagError::validation("API key must be a non-empty string"));
    }
    if api_key.len() < MIN_API_KEY_LEN {
        return Err(RagError::validation("API key appears to be too short"));
    }
    Ok(())
}

pub fn validate_directory_path(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(RagError::validation("Directory path cannot be empty"));
    }
    let dir = Path::new(path);
    if !dir.exists() {
        return Err(RagError::FileNotFound(format!(
            "Directory not found: {path}"
        )));
    }
    if !dir.is_dir() {
        return Err(RagError::validation(format!(
            "Path is not a directory: {path}"
        )));
    }
    Ok(())
}

pub fn validate_file_path(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(RagError::validation("File path cannot be empty"));
    }
    let file = Path::new(path);
    if !file.exists() {
        return Err(RagError::FileNotFound(format!("File not found: {path}")));
    }
    if !file.is_file() {
        return Err(RagError::validation(format!("Path is not a file: {path}")));
    }
    Ok(())
}

pub fn validate_positive(value: i64, name: &str) -> Result<()> {
    if value <= 0 {
        return Err(RagError::validation(format!("{name} must be positive")));
    }
    Ok(())
}

pub fn validate_range(value: f64, name: &str, min: Option<f64>, max: Option<f64>) -> Result<()> {
    if let Some(min) = min {
        if value < min {
            return Err(RagError::validation(format!("{name} must be at least {min}")));
        }
    }
    if let Some(max) = max {
        if value > max {
            return Err(RagError::validation(format!("{name} must be at most {max}")));
        }
    }
    Ok(())
}

/// Reject the call when any of the named string parameters is blank.
pub fn require_params(params: &[(&str, &str)]) -> Result<()> {
    let missing: Vec<&str> = params
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(RagError::validation(format!(
            "Missing required parameters: {}",
            missing.join(", ")
        )))
    }
}

// ── Query mode ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    #[default]
    Hybrid,
    Local,
    Global,
    Naive,
    Mix,
    Bypass,
}

impl QueryMode {
    pub const ALL: [QueryMode; 6] = [
        Self::Hybrid,
        Self::Local,
        Self::Global,
        Self::Naive,
        Self::Mix,
        Self::Bypass,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hybrid => "hybrid",
            Self::Local => "local",
            Self::Global => "global",
            Self::Naive => "naive",
            Self::Mix => "mix",
            Self::Bypass => "bypass",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryMode {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|m| m.as_str()).collect();
                RagError::validation(format!(
                    "Invalid query mode: {s}. Valid modes: {}",
                    valid.join(", ")
                ))
            })
    }
}

// ── Parse method ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMethod {
    #[default]
    Auto,
    Ocr,
    Txt,
}

impl ParseMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Ocr => "ocr",
            Self::Txt => "txt",
        }
    }
}

impl FromStr for ParseMethod {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(Self::Auto),
            "ocr" => Ok(Self::Ocr),
            "txt" => Ok(Self::Txt),
            other => Err(RagError::validation(format!(
                "Invalid parse method: {other}. Valid methods: auto, ocr, txt"
            ))),
        }
    }
}
