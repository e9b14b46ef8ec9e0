//! Optional `.uniast/config.toml` at the repository root. Absent or
//! unparsable config falls back to defaults with a warning rather than
//! aborting the run.

use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct UniastConfig {
    pub discovery: DiscoveryConfig,
    pub workdist: WorkdistConfig,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Extra exclude patterns appended to the built-in defaults.
    #[serde(default)]
    pub excludes: Vec<String>,
    /// Extra regexes identifying generator-output files, beyond the
    /// built-in `_pb.go`/`.generated.ts`-style defaults.
    #[serde(default)]
    pub generator_patterns: Vec<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct WorkdistConfig {
    /// Overrides the evaluator's worker-count heuristic when set.
    pub worker_count: Option<usize>,
}

impl UniastConfig {
    /// Loads `.uniast/config.toml` from `root`. Returns the default
    /// config if the file doesn't exist or fails to parse.
    pub fn load(root: &Path) -> Self {
        Self::load_from_path(&root.join(".uniast").join("config.toml"))
    }

    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read config, using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_yields_default() {
        let temp = TempDir::new().expect("temp dir");
        let config = UniastConfig::load(temp.path());
        assert!(config.discovery.excludes.is_empty());
        assert!(config.workdist.worker_count.is_none());
    }

    #[test]
    fn loads_valid_config() {
        let temp = TempDir::new().expect("temp dir");
        let dir = temp.path().join(".uniast");
        std::fs::create_dir_all(&dir).expect("create .uniast");
        std::fs::write(
            dir.join("config.toml"),
            r#"
[discovery]
excludes = ["testdata"]

[workdist]
worker_count = 4
"#,
        )
        .expect("write config");

        let config = UniastConfig::load(temp.path());
        assert_eq!(config.discovery.excludes, vec!["testdata".to_string()]);
        assert_eq!(config.workdist.worker_count, Some(4));
    }

    #[test]
    fn malformed_config_falls_back_to_default() {
        let temp = TempDir::new().expect("temp dir");
        let dir = temp.path().join(".uniast");
        std::fs::create_dir_all(&dir).expect("create .uniast");
        std::fs::write(dir.join("config.toml"), "not valid toml = = =").expect("write config");

        let config = UniastConfig::load(temp.path());
        assert!(config.discovery.excludes.is_empty());
    }
}
