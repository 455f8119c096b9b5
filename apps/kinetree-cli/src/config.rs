use anyhow::{Context, bail};
use kinetree_kernel::WorldConfig;
use std::path::Path;

/// Read a world config, YAML or JSON by file extension.
pub fn load_config(path: &Path) -> anyhow::Result<WorldConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => serde_yaml::from_str(&text)
            .with_context(|| format!("parsing YAML config {}", path.display()))?,
        Some("json") => serde_json::from_str(&text)
            .with_context(|| format!("parsing JSON config {}", path.display()))?,
        _ => bail!("unsupported config format: {}", path.display()),
    };
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinetree_kernel::{BoundsPolicy, LockPolicy};

    #[test]
    fn yaml_config_parsed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("world.yaml");
        std::fs::write(&path, "bounds_policy: clamp\nlock_policy: fail_fast\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.bounds_policy, BoundsPolicy::Clamp);
        assert_eq!(config.lock_policy, LockPolicy::FailFast);
        assert!(config.validate_on_commit);
    }

    #[test]
    fn json_config_parsed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("world.json");
        std::fs::write(&path, r#"{"validate_on_commit": false}"#).unwrap();
        let config = load_config(&path).unwrap();
        assert!(!config.validate_on_commit);
        assert_eq!(config.bounds_policy, BoundsPolicy::Reject);
    }

    #[test]
    fn unknown_extension_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("world.toml");
        std::fs::write(&path, "").unwrap();
        assert!(load_config(&path).is_err());
    }
}
