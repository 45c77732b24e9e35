//! Artifact delivery: filename derivation and writing to disk
//!
//! The browser-side "synthetic download click" of the original client becomes
//! an atomic write into the configured download directory: the artifact is
//! written to a temp sibling first and renamed into place, and the temp file
//! is cleaned up on failure so repeated deliveries never accumulate partial
//! files.

use crate::config::{DeliveryConfig, FileCollisionAction};
use crate::error::{DeliveryError, Result};
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Characters stripped from labels before they are used as filenames
const UNSAFE_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Sanitize a task label for use as a file basename
///
/// Strips path-unsafe characters, collapses runs of whitespace into single
/// spaces, and trims. Returns `None` when nothing usable survives (empty or
/// all-unsafe input), signalling that the fallback name should be used.
///
/// # Examples
///
/// ```
/// use artifact_dl::delivery::sanitize_label;
///
/// assert_eq!(sanitize_label("Lote Enero"), Some("Lote Enero".to_string()));
/// assert_eq!(sanitize_label("a/b:c"), Some("a b c".to_string()));
/// assert_eq!(sanitize_label("???"), None);
/// ```
#[must_use]
pub fn sanitize_label(label: &str) -> Option<String> {
    let replaced: String = label
        .chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { ' ' } else { c })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Extract the suggested filename from a Content-Disposition header value
///
/// Handles both `filename="file.zip"` and the RFC 5987 form
/// `filename*=UTF-8''file%20name.zip`. Any path components in the header are
/// discarded — only the final file name is kept, so a hostile header cannot
/// steer the write outside the download directory.
#[must_use]
pub fn disposition_filename(value: &str) -> Option<String> {
    for part in value.split(';') {
        let part = part.trim();
        if let Some(encoded) = part.strip_prefix("filename*=") {
            // Format is: charset'lang'encoded-filename
            if let Some(idx) = encoded.rfind('\'')
                && let Ok(decoded) = urlencoding::decode(&encoded[idx + 1..])
            {
                return strip_path(decoded.as_ref());
            }
        } else if let Some(name) = part.strip_prefix("filename=") {
            return strip_path(name.trim_matches('"'));
        }
    }
    None
}

fn strip_path(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
}

/// Derive the delivered filename for an artifact
///
/// Preference order:
/// 1. the server-provided disposition filename, taken as-is;
/// 2. the sanitized task label plus the configured default extension;
/// 3. the configured fallback basename plus the default extension.
#[must_use]
pub fn derive_filename(
    disposition_name: Option<&str>,
    label: &str,
    config: &DeliveryConfig,
) -> String {
    if let Some(name) = disposition_name
        && !name.is_empty()
    {
        return name.to_string();
    }

    let basename = sanitize_label(label).unwrap_or_else(|| config.fallback_basename.clone());
    format!("{}.{}", basename, config.default_extension)
}

/// Resolve a delivery target path according to the collision action
///
/// For `Rename`, tries `name (1).ext`, `name (2).ext`, ... until a free name
/// is found. For `Skip`, an existing file is an error. For `Overwrite`, the
/// original path is returned unchanged.
pub fn unique_path(path: &Path, action: FileCollisionAction) -> Result<PathBuf> {
    match action {
        FileCollisionAction::Overwrite => Ok(path.to_path_buf()),
        FileCollisionAction::Skip => {
            if path.exists() {
                return Err(DeliveryError::FileCollision {
                    path: path.to_path_buf(),
                }
                .into());
            }
            Ok(path.to_path_buf())
        }
        FileCollisionAction::Rename => {
            if !path.exists() {
                return Ok(path.to_path_buf());
            }

            let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(|| {
                DeliveryError::InvalidPath {
                    path: path.to_path_buf(),
                    reason: "cannot extract file stem".to_string(),
                }
            })?;
            let extension = path.extension().and_then(|e| e.to_str());
            let parent = path.parent().ok_or_else(|| DeliveryError::InvalidPath {
                path: path.to_path_buf(),
                reason: "cannot extract parent directory".to_string(),
            })?;

            for i in 1..=MAX_RENAME_ATTEMPTS {
                let candidate = match extension {
                    Some(ext) => format!("{} ({}).{}", stem, i, ext),
                    None => format!("{} ({})", stem, i),
                };
                let candidate = parent.join(candidate);
                if !candidate.exists() {
                    return Ok(candidate);
                }
            }

            Err(DeliveryError::FileCollision {
                path: path.to_path_buf(),
            }
            .into())
        }
    }
}

/// Write artifact bytes into the download directory
///
/// The data lands in a `.part` temp sibling first and is renamed over the
/// final name, so an interrupted delivery never leaves a truncated artifact
/// under the real filename. Returns the final path.
pub async fn write_artifact(
    dir: &Path,
    filename: &str,
    data: &[u8],
    action: FileCollisionAction,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let target = unique_path(&dir.join(filename), action)?;
    let tmp_name = match target.file_name().and_then(|n| n.to_str()) {
        Some(name) => format!(".{name}.part"),
        None => {
            return Err(DeliveryError::InvalidPath {
                path: target,
                reason: "target has no file name".to_string(),
            }
            .into());
        }
    };
    let tmp = dir.join(tmp_name);

    if let Err(e) = tokio::fs::write(&tmp, data).await {
        tokio::fs::remove_file(&tmp).await.ok();
        return Err(DeliveryError::WriteFailed {
            path: target,
            reason: e.to_string(),
        }
        .into());
    }

    if let Err(e) = tokio::fs::rename(&tmp, &target).await {
        tokio::fs::remove_file(&tmp).await.ok();
        return Err(DeliveryError::WriteFailed {
            path: target,
            reason: e.to_string(),
        }
        .into());
    }

    Ok(target)
}
