//! Result file writers.
//!
//! Results are written as pretty JSON (machine records) and plain text (human
//! summaries). Parent directories are created on demand.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::AppError;

/// Turn a free-form name into a filesystem-safe slug.
///
/// `"Mandate Face Masks In Public Spaces"` -> `mandate_face_masks_in_public_spaces`;
/// `"grace period / security deposit for rent"` -> `grace_period_security_deposit_for_rent`.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if out.is_empty() { "unnamed".to_string() } else { out }
}

pub fn ensure_parent_dir(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::usage(format!("Failed to create directory '{}': {e}", parent.display())))?;
    }
    Ok(())
}

/// Serialize `value` as pretty JSON to `path`.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    ensure_parent_dir(path)?;
    let file = File::create(path)
        .map_err(|e| AppError::usage(format!("Failed to create JSON '{}': {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| AppError::runtime(format!("Failed to serialize JSON '{}': {e}", path.display())))?;
    writer
        .write_all(b"\n")
        .and_then(|_| writer.flush())
        .map_err(|e| AppError::usage(format!("Failed to write JSON '{}': {e}", path.display())))
}

pub fn write_text(path: &Path, text: &str) -> Result<(), AppError> {
    ensure_parent_dir(path)?;
    fs::write(path, text).map_err(|e| AppError::usage(format!("Failed to write '{}': {e}", path.display())))
}

/// `<results>/batch/<layout>/<policy_slug>/<dependent>/<model>` (no extension).
pub fn combination_stem(results: &Path, layout: &str, policy: &str, dependent: &str, model: &str) -> PathBuf {
    results
        .join("batch")
        .join(slugify(layout))
        .join(slugify(policy))
        .join(dependent)
        .join(slugify(model))
}

pub fn batch_summary_path(results: &Path) -> PathBuf {
    results.join("batch").join("summary.json")
}

/// `<results>/single_policy/<layout>__<dependent>.json`.
pub fn single_policy_path(results: &Path, layout: &str, dependent: &str) -> PathBuf {
    results
        .join("single_policy")
        .join(format!("{}__{dependent}.json", slugify(layout)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_filesystem_safe() {
        assert_eq!(slugify("Mandate Face Masks In Public Spaces"), "mandate_face_masks_in_public_spaces");
        assert_eq!(
            slugify("grace period / security deposit for rent"),
            "grace_period_security_deposit_for_rent"
        );
        assert_eq!(slugify("  --weird__name!! "), "weird_name");
        assert_eq!(slugify("///"), "unnamed");
    }

    #[test]
    fn result_paths_follow_layout() {
        let root = Path::new("out");
        assert_eq!(
            combination_stem(root, "weekly", "Stop Initiation Of Evictions", "new_cases", "ols"),
            PathBuf::from("out/batch/weekly/stop_initiation_of_evictions/new_cases/ols")
        );
        assert_eq!(
            single_policy_path(root, "weekly", "new_deaths"),
            PathBuf::from("out/single_policy/weekly__new_deaths.json")
        );
    }

    #[test]
    fn writes_json_creating_directories() {
        let dir = std::env::temp_dir().join(format!("pim-export-{}", std::process::id()));
        let path = dir.join("nested").join("value.json");
        write_json(&path, &serde_json::json!({"a": 1})).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let back: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back["a"], 1);
        fs::remove_dir_all(&dir).ok();
    }
}
