//! # Project Files
//!
//! JSON encoding of `(pages, shots, shotOrder, settings)`.
//!
//! Loading is lenient. Only an unreadable file or syntactically invalid JSON
//! is an error; every structural problem is logged and replaced by the
//! smallest valid state:
//!
//! - `pages` missing or not an array: one empty page
//! - page grid with rows/cols <= 0: default grid
//! - unreadable page or shot record: skipped
//! - `shotOrder` missing or not an array of strings: derived by
//!   concatenating the pages' lists
//!
//! The loaded state then goes through the reconciliation guard, so pages
//! always end up as a projection of the ordering.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::ProjectSettings;
use crate::errors::EditorResult;
use crate::ids::{PageId, ShotId};
use crate::pages::{GridSize, Page};
use crate::project::Project;
use crate::reconcile::ReconcileOutcome;
use crate::shots::Shot;

pub const FORMAT_VERSION: u64 = 1;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectFile<'a> {
    version: u64,
    name: &'a str,
    settings: &'a ProjectSettings,
    active_page: &'a str,
    pages: &'a [Page],
    shots: Vec<&'a Shot>,
    shot_order: &'a [ShotId],
}

pub fn to_json(project: &Project) -> EditorResult<String> {
    let file = ProjectFile {
        version: FORMAT_VERSION,
        name: project.name(),
        settings: project.settings(),
        active_page: project.active_page(),
        pages: project.pages().pages(),
        shots: project.shots().iter_ordered().collect(),
        shot_order: project.shots().order(),
    };
    Ok(serde_json::to_string_pretty(&file)?)
}

/// Parse a project file, falling back to `fallback_name` when it has none
pub fn from_json(source: &str, fallback_name: &str) -> EditorResult<(Project, ReconcileOutcome)> {
    let value: Value = serde_json::from_str(source)?;
    project_from_value(value, fallback_name)
}

pub fn read_project(path: &Path) -> EditorResult<(Project, ReconcileOutcome)> {
    let source = fs::read_to_string(path)?;
    let fallback_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled");
    debug!(path = %path.display(), bytes = source.len(), "Reading project");
    from_json(&source, fallback_name)
}

pub fn write_project(project: &Project, path: &Path) -> EditorResult<()> {
    fs::write(path, to_json(project)?)?;
    Ok(())
}

fn project_from_value(value: Value, fallback_name: &str) -> EditorResult<(Project, ReconcileOutcome)> {
    let Value::Object(mut root) = value else {
        warn!("Project root is not an object, starting empty");
        return Project::from_parts(
            fallback_name,
            ProjectSettings::default(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            None,
        );
    };

    if let Some(version) = root.get("version").and_then(Value::as_u64) {
        if version > FORMAT_VERSION {
            warn!(version, supported = FORMAT_VERSION, "Project file is newer than this build");
        }
    }

    let name = match root.remove("name") {
        Some(Value::String(name)) if !name.is_empty() => name,
        _ => fallback_name.to_string(),
    };
    let settings = read_settings(root.remove("settings"));
    let pages = read_pages(root.remove("pages"), &settings);
    let shots = read_shots(root.remove("shots"));
    let order = read_order(root.remove("shotOrder"), &pages);
    let active_page: Option<PageId> = match root.remove("activePage") {
        Some(Value::String(id)) => Some(id),
        _ => None,
    };

    debug!(
        name = %name,
        pages = pages.len(),
        shots = shots.len(),
        ordered = order.len(),
        "Loaded project records"
    );
    Project::from_parts(&name, settings, shots, order, pages, active_page)
}

fn read_settings(value: Option<Value>) -> ProjectSettings {
    let settings = match value {
        None => ProjectSettings::default(),
        Some(value) => serde_json::from_value(value).unwrap_or_else(|err| {
            warn!(%err, "Unreadable settings, using defaults");
            ProjectSettings::default()
        }),
    };
    settings.sanitized()
}

fn read_pages(value: Option<Value>, settings: &ProjectSettings) -> Vec<Page> {
    let items = match value {
        Some(Value::Array(items)) => items,
        Some(_) => {
            warn!("Pages are not an array, using one empty page");
            return Vec::new();
        }
        None => {
            warn!("Project has no pages, using one empty page");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match item {
            Value::Object(map) => read_page(index, map, settings),
            _ => {
                warn!(index, "Skipping page record that is not an object");
                None
            }
        })
        .collect()
}

fn read_page(index: usize, mut map: Map<String, Value>, settings: &ProjectSettings) -> Option<Page> {
    let id = match map.remove("id") {
        Some(Value::String(id)) if !id.is_empty() => id,
        _ => {
            warn!(index, "Skipping page without an id");
            return None;
        }
    };
    let name = match map.remove("name") {
        Some(Value::String(name)) => name,
        _ => format!("Page {}", index + 1),
    };
    let shot_ids = match map.remove("shotIds") {
        Some(Value::Array(ids)) => strings(ids),
        _ => Vec::new(),
    };
    let grid = read_grid(map.remove("grid"), settings.default_grid, &id);
    let aspect_ratio = match map.remove("aspectRatio") {
        Some(Value::String(tag)) => tag,
        _ => settings.aspect_ratio.clone(),
    };

    Some(Page {
        id,
        name,
        shot_ids,
        grid,
        aspect_ratio,
    })
}

fn read_grid(value: Option<Value>, fallback: GridSize, page_id: &str) -> GridSize {
    let dimension = |v: &Value, key: &str| {
        v.get(key)
            .and_then(Value::as_i64)
            .filter(|n| *n > 0)
            .and_then(|n| u32::try_from(n).ok())
    };

    match value {
        Some(v) => match (dimension(&v, "rows"), dimension(&v, "cols")) {
            (Some(rows), Some(cols)) => GridSize::new(rows, cols),
            _ => {
                warn!(page_id = %page_id, grid = %v, "Invalid page grid, using default");
                fallback
            }
        },
        None => fallback,
    }
}

fn read_shots(value: Option<Value>) -> Vec<Shot> {
    let items = match value {
        Some(Value::Array(items)) => items,
        Some(_) => {
            warn!("Shots are not an array, ignoring them");
            return Vec::new();
        }
        None => return Vec::new(),
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<Shot>(item) {
            Ok(shot) => Some(shot),
            Err(err) => {
                warn!(index, %err, "Skipping unreadable shot record");
                None
            }
        })
        .collect()
}

fn read_order(value: Option<Value>, pages: &[Page]) -> Vec<ShotId> {
    match value {
        Some(Value::Array(items)) if items.iter().all(Value::is_string) => strings(items),
        other => {
            if other.is_some() {
                warn!("Shot order is malformed, deriving it from pages");
            } else {
                debug!("No shot order stored, deriving it from pages");
            }
            pages.iter().flat_map(|p| p.shot_ids.iter().cloned()).collect()
        }
    }
}

fn strings(values: Vec<Value>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shots::ShotContent;

    fn sample() -> Project {
        let settings = ProjectSettings {
            default_grid: GridSize::new(1, 3),
            ..ProjectSettings::default()
        };
        let mut project = Project::new("sample", settings);
        for i in 0..5 {
            project
                .create_shot(ShotContent {
                    description: format!("shot {}", i),
                    ..ShotContent::default()
                })
                .unwrap();
        }
        let first = project.shots().order()[0].clone();
        project.create_sub_shot(&first).unwrap();
        project.flush_renumber();
        project
    }

    fn slices(project: &Project) -> Vec<Vec<ShotId>> {
        project.pages().pages().iter().map(|p| p.shot_ids.clone()).collect()
    }

    #[test]
    fn test_round_trip() {
        let project = sample();
        let json = to_json(&project).unwrap();

        let (loaded, outcome) = from_json(&json, "fallback").unwrap();

        assert!(!outcome.changed());
        assert_eq!(loaded.name(), "sample");
        assert_eq!(loaded.shots().order(), project.shots().order());
        assert_eq!(slices(&loaded), slices(&project));
        assert_eq!(loaded.shot(&project.shots().order()[1]).unwrap().number, "01b");
    }

    #[test]
    fn test_missing_order_is_derived_from_pages() {
        let project = sample();
        let mut value: Value = serde_json::from_str(&to_json(&project).unwrap()).unwrap();
        value.as_object_mut().unwrap().remove("shotOrder");

        let (loaded, _) = project_from_value(value, "fallback").unwrap();
        assert_eq!(loaded.shots().order(), project.shots().order());
        assert_eq!(slices(&loaded), slices(&project));
    }

    #[test]
    fn test_malformed_order_is_derived_from_pages() {
        let project = sample();
        let mut value: Value = serde_json::from_str(&to_json(&project).unwrap()).unwrap();
        value["shotOrder"] = serde_json::json!(["a", 3]);

        let (loaded, _) = project_from_value(value, "fallback").unwrap();
        assert_eq!(loaded.shots().order(), project.shots().order());
    }

    #[test]
    fn test_non_array_pages_fall_back_to_one_page() {
        let json = r#"{ "name": "broken", "pages": 7, "shots": [] }"#;
        let (loaded, _) = from_json(json, "fallback").unwrap();

        assert_eq!(loaded.pages().len(), 1);
        assert_eq!(loaded.pages().first().grid, GridSize::default());
        assert_eq!(loaded.shot_count(), 0);
    }

    #[test]
    fn test_invalid_grid_and_records_are_repaired() {
        let json = r#"{
            "pages": [
                { "id": "p1", "name": "Page 1", "shotIds": ["a", "b", "c"], "grid": { "rows": 0, "cols": -2 } },
                { "name": "no id" }
            ],
            "shots": [
                { "id": "a" },
                { "id": "b", "subShotGroupId": "g1" },
                { "description": "no id" },
                { "id": "c" }
            ]
        }"#;

        let (loaded, outcome) = from_json(json, "repair").unwrap();

        assert_eq!(loaded.name(), "repair");
        assert_eq!(loaded.pages().first().grid, GridSize::default());
        assert_eq!(loaded.shots().order(), ["a", "b", "c"]);
        // A lone group member is dissolved
        assert!(outcome.groups_healed);
        assert_eq!(loaded.shot("b").unwrap().sub_shot_group_id, None);
        assert_eq!(loaded.shot("c").unwrap().number, "03");
    }

    #[test]
    fn test_oversized_number_format_loads() {
        let json = format!(
            r#"{{ "settings": {{ "numberFormat": "SH-{}" }}, "shots": [{{ "id": "a" }}] }}"#,
            "0".repeat(70_000)
        );
        let (loaded, _) = from_json(&json, "wide").unwrap();

        let number = &loaded.shot("a").unwrap().number;
        assert!(number.starts_with("SH-"));
        assert!(number.ends_with('1'));
        assert_eq!(number.len(), 3 + crate::numbering::MAX_NUMBER_WIDTH);
    }

    #[test]
    fn test_non_object_root_starts_empty() {
        let (loaded, _) = from_json("[1, 2, 3]", "empty").unwrap();
        assert_eq!(loaded.name(), "empty");
        assert_eq!(loaded.pages().len(), 1);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(from_json("{ not json", "x").is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.json");

        let mut project = sample();
        project.save_as(&path).unwrap();
        assert!(!project.is_dirty());

        let loaded = Project::open(&path).unwrap();
        assert!(!loaded.is_dirty());
        assert_eq!(loaded.path(), Some(path.as_path()));
        assert_eq!(slices(&loaded), slices(&project));
    }
}
