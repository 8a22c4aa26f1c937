//! Golden-file snapshots for deterministic pool output.
//!
//! Snapshots are canonical pretty JSON with object keys sorted, so a diff against the file on
//! disk only shows real changes. Rerun with `PARTICLES_UPDATE_SNAPSHOTS=1` to rewrite them.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Environment variable that enables snapshot updates.
pub const UPDATE_SNAPSHOTS_ENV: &str = "PARTICLES_UPDATE_SNAPSHOTS";

/// Assert that `value` matches the JSON snapshot stored at `path`.
///
/// With `PARTICLES_UPDATE_SNAPSHOTS=1` the file is (over)written instead.
pub fn assert_json_snapshot<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    let actual = canonical_json(value)?;

    if should_update_snapshots() {
        write_snapshot(path, &actual)?;
        return Ok(());
    }

    let expected = fs::read_to_string(path).with_context(|| {
        format!(
            "Snapshot missing at {} (run with {}=1 to create it)",
            path.display(),
            UPDATE_SNAPSHOTS_ENV
        )
    })?;

    if normalize_newlines(&expected) != actual {
        let line = first_difference(&expected, &actual);
        anyhow::bail!(
            "Snapshot mismatch at {} line {} (run with {}=1 to update)",
            path.display(),
            line,
            UPDATE_SNAPSHOTS_ENV
        );
    }

    Ok(())
}

fn should_update_snapshots() -> bool {
    matches!(
        std::env::var(UPDATE_SNAPSHOTS_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE") | Ok("yes") | Ok("YES")
    )
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
}

fn first_difference(expected: &str, actual: &str) -> usize {
    expected
        .lines()
        .zip(actual.lines())
        .position(|(a, b)| a != b)
        .map(|idx| idx + 1)
        .unwrap_or_else(|| expected.lines().count().min(actual.lines().count()) + 1)
}

fn write_snapshot(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create snapshot directory {}", parent.display()))?;
    }
    fs::write(path, contents)
        .with_context(|| format!("Failed to write snapshot {}", path.display()))
}

/// Render `value` the way snapshot files store it.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value).context("Failed to serialize snapshot value")?;
    let value = canonicalize_value(value);
    let mut s = serde_json::to_string_pretty(&value).context("Failed to format snapshot JSON")?;
    s.push('\n');
    Ok(s)
}

fn canonicalize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = serde_json::Map::with_capacity(entries.len());
            for (k, v) in entries {
                out.insert(k, canonicalize_value(v));
            }
            Value::Object(out)
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize_value).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_keys() {
        let text = canonical_json(&json!({ "b": 1, "a": [2.5, 0.0] })).unwrap();
        assert_eq!(text, "{\n  \"a\": [\n    2.5,\n    0.0\n  ],\n  \"b\": 1\n}\n");
    }

    #[test]
    fn matching_snapshot_passes_and_mismatch_fails() {
        let path = crate::temp_path("particles_snapshot", "json");
        fs::write(&path, canonical_json(&json!({ "cursor": 3 })).unwrap()).unwrap();

        assert!(assert_json_snapshot(&path, &json!({ "cursor": 3 })).is_ok());
        let err = assert_json_snapshot(&path, &json!({ "cursor": 4 })).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn missing_snapshot_reports_update_hint() {
        let path = crate::temp_path("particles_missing", "json");
        if should_update_snapshots() {
            return;
        }
        let err = assert_json_snapshot(&path, &json!({})).unwrap_err();
        assert!(err.to_string().contains(UPDATE_SNAPSHOTS_ENV));
    }
}
