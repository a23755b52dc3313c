//! Options file loading
//!
//! Options files may be JSON, YAML or TOML; the format is picked from the
//! file extension. Command-line overrides are merged on top without
//! touching the loaded document.

use serde_json::{Map, Value};
use std::path::Path;

use crate::error::{BudgetError, Result};

/// Read and parse an options file
pub fn load_options(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        BudgetError::file_error(format!(
            "Failed to read options file '{}': {}",
            path.display(),
            e
        ))
    })?;

    tracing::debug!(path = %path.display(), bytes = content.len(), "Loaded options file");
    parse_options(path, &content)
}

/// Parse options content based on the file extension (JSON when unknown)
pub fn parse_options(path: &Path, content: &str) -> Result<Value> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(content)?),
        Some("toml") => Ok(toml::from_str(content)?),
        _ => Ok(serde_json::from_str(content)?),
    }
}

/// Merge overrides into an options document, returning a new document.
///
/// Top-level keys replace the loaded value; a `budget` object is merged
/// key by key. A missing document starts empty. A non-object document is
/// returned unchanged so normalization can reject it.
pub fn merge_overrides(base: Option<&Value>, overrides: &Map<String, Value>) -> Option<Value> {
    let mut merged = match base {
        None | Some(Value::Null) if overrides.is_empty() => return base.cloned(),
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(other) => return Some(other.clone()),
    };

    for (key, value) in overrides {
        if key == "budget" {
            if let (Some(Value::Object(existing)), Value::Object(incoming)) =
                (merged.get_mut(key), value)
            {
                for (metric, threshold) in incoming {
                    existing.insert(metric.clone(), threshold.clone());
                }
                continue;
            }
        }
        merged.insert(key.clone(), value.clone());
    }

    Some(Value::Object(merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_parse_json() {
        let value = parse_options(Path::new("opts.json"), r#"{"url": "https://a.test"}"#).unwrap();
        assert_eq!(value["url"], json!("https://a.test"));
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = "url: https://a.test\nbudget:\n  loadTime: 1000\n";
        let value = parse_options(Path::new("opts.yml"), yaml).unwrap();
        assert_eq!(value["budget"]["loadTime"], json!(1000));
    }

    #[test]
    fn test_parse_toml() {
        let toml = "url = \"https://a.test\"\nruns = 3\n\n[budget]\nrender = 500\n";
        let value = parse_options(Path::new("opts.toml"), toml).unwrap();
        assert_eq!(value["runs"], json!(3));
        assert_eq!(value["budget"]["render"], json!(500));
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = parse_options(Path::new("opts.json"), "{not json").unwrap_err();
        assert!(matches!(err, BudgetError::ParseError(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_options(Path::new("/nonexistent/options.json")).unwrap_err();
        assert!(matches!(err, BudgetError::FileError(_)));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"url": "https://a.test", "runs": 2}}"#).unwrap();
        let value = load_options(file.path()).unwrap();
        assert_eq!(value["runs"], json!(2));
    }

    #[test]
    fn test_merge_overrides_budget_keys() {
        let base = json!({"url": "https://a.test", "budget": {"loadTime": 1000, "render": 500}});
        let mut overrides = Map::new();
        overrides.insert("runs".to_string(), json!(3));
        overrides.insert("budget".to_string(), json!({"render": 400}));

        let merged = merge_overrides(Some(&base), &overrides).unwrap();
        assert_eq!(merged["runs"], json!(3));
        assert_eq!(merged["budget"]["loadTime"], json!(1000));
        assert_eq!(merged["budget"]["render"], json!(400));
        assert_eq!(base["budget"]["render"], json!(500));
    }

    #[test]
    fn test_merge_without_base() {
        let mut overrides = Map::new();
        overrides.insert("url".to_string(), json!("https://b.test"));
        let merged = merge_overrides(None, &overrides).unwrap();
        assert_eq!(merged, json!({"url": "https://b.test"}));

        assert_eq!(merge_overrides(None, &Map::new()), None);
    }

    #[test]
    fn test_merge_keeps_non_object_base() {
        let mut overrides = Map::new();
        overrides.insert("url".to_string(), json!("https://b.test"));
        let merged = merge_overrides(Some(&json!([1, 2])), &overrides).unwrap();
        assert_eq!(merged, json!([1, 2]));
    }
}
