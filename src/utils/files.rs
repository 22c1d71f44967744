use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{RagError, Result};

const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Turn `path` into an absolute, lexically normalized path.
///
/// The path does not need to exist. Symlinks are resolved when it does, so
/// two spellings of the same directory map to the same key.
pub fn validate_path(path: &str) -> Result<PathBuf> {
    if path.trim().is_empty() {
        return Err(RagError::validation("Path cannot be empty"));
    }

    let p = Path::new(path);
    if let Ok(canonical) = p.canonicalize() {
        return Ok(canonical);
    }

    let absolute = std::path::absolute(p)
        .map_err(|e| RagError::validation(format!("Invalid path: {path} ({e})")))?;
    Ok(normalize(&absolute))
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub fn ensure_directory(directory: &Path) -> Result<()> {
    std::fs::create_dir_all(directory)?;
    Ok(())
}

/// SHA-256 of the file contents as lowercase hex.
pub fn file_hash(file_path: &Path) -> Result<String> {
    let mut file = File::open(file_path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn file_size_mb(file_path: &Path) -> Result<f64> {
    let bytes = std::fs::metadata(file_path)?.len();
    Ok(bytes as f64 / (1024.0 * 1024.0))
}

/// Extension with a leading dot, lowercased (`"report.PDF"` → `".pdf"`).
#[must_use]
pub fn dotted_extension(file_path: &Path) -> String {
    file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

#[must_use]
pub fn is_supported_file(file_path: &Path, extensions: &[String]) -> bool {
    let ext = dotted_extension(file_path);
    !ext.is_empty() && extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
}

/// Replace characters that are invalid in file names on common platforms.
#[must_use]
pub fn safe_filename(filename: &str) -> String {
    let replaced: String = filename
        .chars()
        .map(|c| {
            if INVALID_FILENAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}
