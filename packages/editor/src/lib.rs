//! # Storyboard Editor
//!
//! Core editing engine for storyboards: shots in one canonical order,
//! projected onto fixed-capacity pages.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ shots: entities + canonical ordering        │
//! │  - create / delete / move / sub-shot groups │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ redistribute: ordering → page slices        │
//! │  - overflow / projection / backflow         │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ numbering: ordering + groups → "01", "02a"  │
//! │  - immediate or coalesced                   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ project: settle pipeline, batching,         │
//! │ reconciliation, persistence                 │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Ordering is source of truth**: page slices and numbers are derived views
//! 2. **Settle after every structural edit**: redistribute, then renumber
//! 3. **Self-healing**: drifted pages are re-projected, never merged
//! 4. **Unknown ids are no-ops**: stale UI references never raise errors
//!
//! ## Usage
//!
//! ```rust,no_run
//! use storyboard_editor::{Project, ProjectSettings, ShotContent};
//!
//! # fn main() -> Result<(), storyboard_editor::EditorError> {
//! let mut project = Project::new("Pilot", ProjectSettings::default());
//!
//! let first = project.create_shot(ShotContent::default())?;
//! project.create_sub_shot(&first)?;
//!
//! // Numbers coalesce; flush before reading them
//! project.flush_renumber();
//!
//! project.save_as("pilot.storyboard.json")?;
//! # Ok(())
//! # }
//! ```

mod batch;
mod config;
mod errors;
mod ids;
mod mutations;
mod numbering;
mod pages;
mod persistence;
mod post_effects;
mod project;
mod reconcile;
mod redistribute;
mod scheduler;
mod shots;
mod subscribers;

pub use batch::{BatchScope, PendingSettle, RenumberMode};
pub use config::ProjectSettings;
pub use errors::{EditorError, EditorResult};
pub use ids::{project_seed, GroupId, IdGenerator, PageId, ShotId};
pub use mutations::{Mutation, MutationKind, MutationResult};
pub use numbering::{
    compute_numbers, renumber, sub_letter, NumberFormat, RenumberSnapshot, MAX_NUMBER_WIDTH,
};
pub use pages::{GridSize, Page, PageEvent, PageRepository};
pub use persistence::{from_json, read_project, to_json, write_project, FORMAT_VERSION};
pub use post_effects::{EffectPlan, LayoutEffect, PostEffect, PostEffectEngine};
pub use project::{
    ExportPage, ExportSnapshot, Project, ProjectStorage, SettleRequester, SettleStats,
};
pub use reconcile::{detect_drift, DriftReport, ReconcileOutcome};
pub use redistribute::{
    pull_backflow, push_overflow, uniform_capacity, RedistributionReport, Redistributor,
};
pub use scheduler::{CoalesceConfig, Coalescer};
pub use shots::{Shot, ShotContent, ShotEvent, ShotPatch, ShotRepository};
pub use subscribers::{SubscriptionId, Subscribers};
