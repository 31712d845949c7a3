use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::numbering::NumberFormat;
use crate::pages::GridSize;
use crate::scheduler::CoalesceConfig;

/// Project-level settings, stored alongside pages and shots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectSettings {
    /// Shot number format, e.g. `"01"` or `"SH-001"`
    pub number_format: NumberFormat,

    /// Grid for the first page of a new project
    pub default_grid: GridSize,

    /// Opaque aspect-ratio tag for new pages
    pub aspect_ratio: String,

    /// Debounce window for coalesced renumbering
    pub coalesce_window_ms: u64,

    /// Hard deadline for coalesced renumbering
    pub coalesce_max_wait_ms: u64,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            number_format: NumberFormat::default(),
            default_grid: GridSize::default(),
            aspect_ratio: "16:9".to_string(),
            coalesce_window_ms: 16,
            coalesce_max_wait_ms: 100,
        }
    }
}

impl ProjectSettings {
    pub fn coalesce_config(&self) -> CoalesceConfig {
        CoalesceConfig::from_millis(self.coalesce_window_ms, self.coalesce_max_wait_ms)
    }

    /// Replace values that would break the core (zero-capacity grid)
    pub fn sanitized(mut self) -> Self {
        if self.default_grid.capacity() == 0 {
            warn!(
                rows = self.default_grid.rows,
                cols = self.default_grid.cols,
                "Default grid has no capacity, using 2x4"
            );
            self.default_grid = GridSize::default();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_settings() {
        let json = r#"{
            "numberFormat": "SH-001",
            "defaultGrid": { "rows": 3, "cols": 3 },
            "aspectRatio": "2.39:1"
        }"#;

        let settings: ProjectSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.number_format.as_str(), "SH-001");
        assert_eq!(settings.default_grid, GridSize::new(3, 3));
        assert_eq!(settings.aspect_ratio, "2.39:1");
        assert_eq!(settings.coalesce_window_ms, 16);
    }

    #[test]
    fn test_default_settings() {
        let settings = ProjectSettings::default();
        assert_eq!(settings.number_format.as_str(), "01");
        assert_eq!(settings.default_grid.capacity(), 8);
    }

    #[test]
    fn test_sanitized_replaces_zero_grid() {
        let settings = ProjectSettings {
            default_grid: GridSize::new(0, 3),
            ..ProjectSettings::default()
        }
        .sanitized();
        assert_eq!(settings.default_grid, GridSize::default());
    }
}
