pub mod apply;
pub mod check;
pub mod grid;
pub mod init;
pub mod shots;
pub mod show;

pub use apply::{apply, ApplyArgs};
pub use check::{check, CheckArgs};
pub use grid::{grid, GridArgs};
pub use init::{init, InitArgs};
pub use shots::{add, delete, move_shot, sub, AddArgs, DeleteArgs, MoveArgs, SubArgs};
pub use show::{show, ShowArgs};

use anyhow::{anyhow, Context as _, Result};
use std::path::{Path, PathBuf};
use storyboard_editor::{Project, ShotId};
use tracing::debug;

use crate::config::Config;

/// Where commands find their project
#[derive(Debug)]
pub struct Context {
    pub cwd: PathBuf,
    pub config: Config,
    /// `--project` override of the configured project file
    pub project: Option<PathBuf>,
}

impl Context {
    pub fn load(cwd: PathBuf, project: Option<PathBuf>) -> Result<Self> {
        let config = Config::load(&cwd)?;
        debug!(cwd = %cwd.display(), project_file = %config.project_file, "Loaded CLI config");
        Ok(Self { cwd, config, project })
    }

    pub fn project_path(&self) -> PathBuf {
        match &self.project {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.cwd.join(path),
            None => self.config.project_path(&self.cwd),
        }
    }

    pub fn open(&self) -> Result<Project> {
        let path = self.project_path();
        open_project(&path)
    }
}

pub fn open_project(path: &Path) -> Result<Project> {
    if !path.exists() {
        return Err(anyhow!(
            "No project at {} (run `storyboard init` first)",
            path.display()
        ));
    }
    Project::open(path).with_context(|| format!("Failed to open {}", path.display()))
}

/// Resolve a shot reference: an id, or a display number such as `03` / `02b`
pub fn resolve_shot(project: &Project, reference: &str) -> Result<ShotId> {
    if project.shot(reference).is_some() {
        return Ok(reference.to_string());
    }
    project
        .shots()
        .iter_ordered()
        .find(|s| s.number == reference)
        .map(|s| s.id.clone())
        .ok_or_else(|| anyhow!("No shot with id or number '{}'", reference))
}

/// Resolve a page reference: an id, or a 1-based page position
pub fn resolve_page(project: &Project, reference: &str) -> Result<String> {
    if project.pages().get(reference).is_some() {
        return Ok(reference.to_string());
    }
    reference
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|index| project.pages().page_at(index))
        .map(|p| p.id.clone())
        .ok_or_else(|| storyboard_editor::EditorError::UnknownPage(reference.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyboard_editor::{ProjectSettings, ShotContent};

    #[test]
    fn test_resolve_shot_by_number() {
        let mut project = Project::new("cli", ProjectSettings::default());
        let first = project.create_shot(ShotContent::default()).unwrap();
        let sub = project.create_sub_shot(&first).unwrap().unwrap();

        assert_eq!(resolve_shot(&project, &first).unwrap(), first);
        assert_eq!(resolve_shot(&project, "01b").unwrap(), sub);
        assert!(resolve_shot(&project, "99").is_err());
    }

    #[test]
    fn test_resolve_page_by_position() {
        let project = Project::new("cli", ProjectSettings::default());
        let first = project.pages().first().id.clone();

        assert_eq!(resolve_page(&project, "1").unwrap(), first);
        assert_eq!(resolve_page(&project, &first).unwrap(), first);
        assert!(resolve_page(&project, "0").is_err());
        assert!(resolve_page(&project, "2").is_err());
    }
}
