//! # Storyboard Mutations
//!
//! Every user-level operation as a serializable value, so edits can be
//! scripted, logged or replayed. `Project::apply` is the single entry point.
//!
//! ## Semantics
//!
//! ### Unknown ids
//! - Every id-addressed mutation is a no-op on an unknown id
//! - A no-op does not bump the revision or trigger a settle pass
//!
//! ### Ordering
//! - `target_index` / `position` are insertion slots in the ordering as it is
//!   *before* the moved shots are removed
//! - Indices past the end clamp to the end
//!
//! ### Pages
//! - `DeletePage` deletes the shots on the page, not only the page
//! - `UpdateGridSize` resizes every page (capacity is uniform)

use serde::{Deserialize, Serialize};

use crate::ids::{GroupId, PageId, ShotId};
use crate::shots::{ShotContent, ShotPatch};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Mutation {
    /// Append a new shot to the ordering
    CreateShot {
        #[serde(default)]
        content: ShotContent,
    },

    /// Create a shot at a global position (incremental layout path)
    InsertShot {
        index: usize,
        #[serde(default)]
        content: ShotContent,
    },

    DeleteShot {
        shot_id: ShotId,
    },

    /// Content-only update; never touches ordering or grouping
    UpdateShot {
        shot_id: ShotId,
        patch: ShotPatch,
    },

    CreateSubShot {
        parent_id: ShotId,
    },

    RemoveFromSubGroup {
        shot_id: ShotId,
    },

    InsertIntoSubGroup {
        shot_id: ShotId,
        group_id: GroupId,
        position: usize,
    },

    MoveShot {
        shot_id: ShotId,
        target_index: usize,
    },

    MoveShotGroup {
        group_id: GroupId,
        target_index: usize,
    },

    SetShotOrder {
        order: Vec<ShotId>,
    },

    CreatePage {
        #[serde(default)]
        name: Option<String>,
    },

    DeletePage {
        page_id: PageId,
    },

    RenamePage {
        page_id: PageId,
        name: String,
    },

    /// Copy a page together with its shots
    DuplicatePage {
        page_id: PageId,
    },

    UpdateGridSize {
        page_id: PageId,
        rows: u32,
        cols: u32,
    },

    UpdateAspectRatio {
        page_id: PageId,
        aspect_ratio: String,
    },

    SetNumberFormat {
        format: String,
    },
}

/// Field-less discriminant of `Mutation`, used to plan settle work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    CreateShot,
    InsertShot,
    DeleteShot,
    UpdateShot,
    CreateSubShot,
    RemoveFromSubGroup,
    InsertIntoSubGroup,
    MoveShot,
    MoveShotGroup,
    SetShotOrder,
    CreatePage,
    DeletePage,
    RenamePage,
    DuplicatePage,
    UpdateGridSize,
    UpdateAspectRatio,
    SetNumberFormat,
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::CreateShot { .. } => MutationKind::CreateShot,
            Mutation::InsertShot { .. } => MutationKind::InsertShot,
            Mutation::DeleteShot { .. } => MutationKind::DeleteShot,
            Mutation::UpdateShot { .. } => MutationKind::UpdateShot,
            Mutation::CreateSubShot { .. } => MutationKind::CreateSubShot,
            Mutation::RemoveFromSubGroup { .. } => MutationKind::RemoveFromSubGroup,
            Mutation::InsertIntoSubGroup { .. } => MutationKind::InsertIntoSubGroup,
            Mutation::MoveShot { .. } => MutationKind::MoveShot,
            Mutation::MoveShotGroup { .. } => MutationKind::MoveShotGroup,
            Mutation::SetShotOrder { .. } => MutationKind::SetShotOrder,
            Mutation::CreatePage { .. } => MutationKind::CreatePage,
            Mutation::DeletePage { .. } => MutationKind::DeletePage,
            Mutation::RenamePage { .. } => MutationKind::RenamePage,
            Mutation::DuplicatePage { .. } => MutationKind::DuplicatePage,
            Mutation::UpdateGridSize { .. } => MutationKind::UpdateGridSize,
            Mutation::UpdateAspectRatio { .. } => MutationKind::UpdateAspectRatio,
            Mutation::SetNumberFormat { .. } => MutationKind::SetNumberFormat,
        }
    }
}

/// Result of applying a mutation
#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult {
    /// Project revision after the mutation
    pub revision: u64,

    /// Whether the mutation changed anything
    pub changed: bool,

    /// Id of the shot or page the mutation created, if any
    pub created: Option<String>,
}
