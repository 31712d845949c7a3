use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use storyboard_editor::ProjectSettings;

pub const DEFAULT_CONFIG_NAME: &str = "storyboard.config.json";

/// Storyboard CLI configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Project file the commands operate on
    #[serde(default = "default_project_file")]
    pub project_file: String,

    /// Settings for projects created by `storyboard init`
    #[serde(default)]
    pub defaults: ProjectSettings,
}

fn default_project_file() -> String {
    "storyboard.json".to_string()
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &Path) -> anyhow::Result<Self> {
        let config_path = cwd.join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            // Return default config if none exists
            Ok(Config::default())
        }
    }

    /// Get absolute path to the project file
    pub fn project_path(&self, cwd: &Path) -> PathBuf {
        cwd.join(&self.project_file)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_file: default_project_file(),
            defaults: ProjectSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyboard_editor::GridSize;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "projectFile": "boards/pilot.json",
            "defaults": {
                "numberFormat": "SC-01",
                "defaultGrid": { "rows": 3, "cols": 2 }
            }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.project_file, "boards/pilot.json");
        assert_eq!(config.defaults.number_format.as_str(), "SC-01");
        assert_eq!(config.defaults.default_grid, GridSize::new(3, 2));
        assert_eq!(config.defaults.aspect_ratio, "16:9");
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.project_file, "storyboard.json");
        assert_eq!(config.defaults.default_grid.capacity(), 8);
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.project_path(dir.path()), dir.path().join("storyboard.json"));
    }
}
