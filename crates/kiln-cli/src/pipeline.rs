//! Pipeline file loading.

use anyhow::Context;
use kiln_core::task::BuildConfig;
use std::path::Path;

/// Read a pipeline file in the submission shape. `.json` files are parsed as
/// JSON, anything else as YAML.
pub fn load(path: &Path) -> anyhow::Result<BuildConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config: BuildConfig = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?,
        _ => serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML in {}", path.display()))?,
    };

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiln.yaml");
        std::fs::write(
            &path,
            r#"
tasks:
  - id: build
    command: cargo build
  - id: test
    command: cargo test
    dependencies: [build]
    cwd: crates/core
"#,
        )
        .unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.tasks.len(), 2);
        assert_eq!(config.tasks[1].dependencies, vec!["build"]);
        assert_eq!(
            config.tasks[1].working_directory.as_deref(),
            Some(Path::new("crates/core"))
        );
    }

    #[test]
    fn test_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        std::fs::write(&path, r#"{"tasks":[{"id":"a","command":"true"}]}"#).unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.tasks[0].id, "a");
    }

    #[test]
    fn test_empty_pipeline_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, r#"{"tasks":[]}"#).unwrap();

        assert!(load(&path).is_err());
    }
}
