//! # Project Handle
//!
//! A `Project` owns one storyboard: the shot repository (canonical
//! ordering), the page repository (per-page slices) and the settle pipeline
//! that keeps the two consistent.
//!
//! Projects can be:
//! - **Memory-backed**: Temporary, for tests and scripted edits
//! - **File-backed**: Single-user editing with JSON persistence
//!
//! ## Settle pipeline
//!
//! ```text
//! mutation → repository change → plan (post-effects)
//!                                   ↓
//!             batch open? ── yes → deferred until the outermost end_batch
//!                                   ↓ no
//!             pass in flight? ─ yes → SettleRequester, rerun after the pass
//!                                   ↓ no
//!             layout (verify | redistribute) → renumber (immediate | coalesced)
//! ```
//!
//! Coalesced renumbering is driven by `tick()` / `tick_at()`. Anything that
//! observes numbers from outside (`snapshot_for_export`, `save`) flushes it
//! first.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::batch::{BatchScope, RenumberMode};
use crate::config::ProjectSettings;
use crate::errors::{EditorError, EditorResult};
use crate::ids::{GroupId, IdGenerator, PageId, ShotId};
use crate::mutations::{Mutation, MutationKind, MutationResult};
use crate::numbering::{compute_numbers, renumber, NumberFormat, RenumberSnapshot};
use crate::pages::{GridSize, Page, PageEvent, PageRepository};
use crate::persistence;
use crate::post_effects::{EffectPlan, LayoutEffect, PostEffectEngine};
use crate::reconcile::{detect_drift, ReconcileOutcome};
use crate::redistribute::{
    pull_backflow, push_overflow, uniform_capacity, RedistributionReport, Redistributor,
};
use crate::scheduler::Coalescer;
use crate::shots::{Shot, ShotContent, ShotEvent, ShotPatch, ShotRepository};
use crate::subscribers::SubscriptionId;

/// Settle requests arriving during a pass beyond this many reruns are dropped
const MAX_DEFERRED_RERUNS: usize = 8;

/// Cloneable handle that asks the owning project for a settle pass
///
/// Repository listeners cannot reach the project, so they hold one of these.
/// A request raised while a pass is running is served right after it; one
/// raised outside a pass is served by the next `pump()` or `tick()`.
#[derive(Debug, Clone, Default)]
pub struct SettleRequester(Rc<Cell<bool>>);

impl SettleRequester {
    pub fn request(&self) {
        self.0.set(true);
    }

    pub fn is_requested(&self) -> bool {
        self.0.get()
    }

    fn take(&self) -> bool {
        self.0.replace(false)
    }
}

/// Counters for settle work, used to verify batching and coalescing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettleStats {
    pub redistribution_passes: u64,
    pub renumber_passes: u64,
    pub renumber_requests: u64,
    pub suppressed: u64,
    pub deferred_reruns: u64,
}

/// Storage backend for a project
#[derive(Debug)]
pub enum ProjectStorage {
    /// In-memory only (tests, scripted edits)
    Memory,

    /// Backed by a JSON project file
    File { path: PathBuf, dirty: bool },
}

/// Read-only view handed to exporters
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    pub name: String,
    pub number_format: String,
    pub shot_count: usize,
    pub pages: Vec<ExportPage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPage {
    pub id: PageId,
    pub name: String,
    pub grid: GridSize,
    pub aspect_ratio: String,
    /// Global index of the page's first slot
    pub offset: usize,
    pub shots: Vec<Shot>,
}

/// Editable storyboard project
#[derive(Debug)]
pub struct Project {
    name: String,

    /// Increments on every mutation that changed something
    revision: u64,

    settings: ProjectSettings,
    shots: ShotRepository,
    pages: PageRepository,
    active_page: PageId,

    redistributor: Redistributor,
    effects: PostEffectEngine,
    renumber_queue: Coalescer<RenumberSnapshot>,
    batch: BatchScope,
    requester: SettleRequester,
    settling: bool,
    stats: SettleStats,

    storage: ProjectStorage,
}

impl Project {
    /// Create an empty memory-backed project holding one empty page
    pub fn new(name: &str, settings: ProjectSettings) -> Self {
        let settings = settings.sanitized();
        let shots = ShotRepository::new(IdGenerator::new(name));
        let pages = PageRepository::new(
            IdGenerator::new(name),
            settings.default_grid,
            settings.aspect_ratio.clone(),
        );
        let active_page = pages.first().id.clone();

        Self {
            name: name.to_string(),
            revision: 0,
            renumber_queue: Coalescer::new(settings.coalesce_config()),
            settings,
            shots,
            pages,
            active_page,
            redistributor: Redistributor::new(),
            effects: PostEffectEngine::new(),
            batch: BatchScope::new(),
            requester: SettleRequester::default(),
            settling: false,
            stats: SettleStats::default(),
            storage: ProjectStorage::Memory,
        }
    }

    /// Build a project from loaded state and run the reconciliation guard
    /// over it
    pub(crate) fn from_parts(
        name: &str,
        settings: ProjectSettings,
        shots: Vec<Shot>,
        order: Vec<ShotId>,
        pages: Vec<Page>,
        active_page: Option<PageId>,
    ) -> EditorResult<(Self, ReconcileOutcome)> {
        let mut project = Self::new(name, settings);
        project.shots.replace_all(shots, order);
        let grid = project.settings.default_grid;
        let aspect = project.settings.aspect_ratio.clone();
        project.pages.replace_all(pages, grid, &aspect);

        if let Some(active) = active_page {
            project.active_page = active;
        }
        project.retarget_active();

        let outcome = project.reconcile()?;
        Ok((project, outcome))
    }

    /// Open a project file
    pub fn open(path: impl AsRef<Path>) -> EditorResult<Self> {
        let path = path.as_ref();
        let (mut project, outcome) = persistence::read_project(path)?;
        let dirty = outcome.changed();
        if dirty {
            info!(path = %path.display(), "Project needed repair on open");
        }
        project.storage = ProjectStorage::File {
            path: path.to_path_buf(),
            dirty,
        };
        Ok(project)
    }

    /// Save to the backing file
    pub fn save(&mut self) -> EditorResult<()> {
        let path = match &self.storage {
            ProjectStorage::File { path, .. } => path.clone(),
            ProjectStorage::Memory => return Err(EditorError::NotFileBacked),
        };
        self.write_to(&path)
    }

    /// Save to `path` and make the project file-backed there
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> EditorResult<()> {
        let path = path.as_ref().to_path_buf();
        self.write_to(&path)?;
        self.storage = ProjectStorage::File { path, dirty: false };
        Ok(())
    }

    fn write_to(&mut self, path: &Path) -> EditorResult<()> {
        self.flush_renumber();
        persistence::write_project(self, path)?;
        if let ProjectStorage::File { dirty, .. } = &mut self.storage {
            *dirty = false;
        }
        info!(path = %path.display(), shots = self.shots.len(), pages = self.pages.len(), "Saved project");
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.storage {
            ProjectStorage::File { path, .. } => Some(path),
            ProjectStorage::Memory => None,
        }
    }

    pub fn is_dirty(&self) -> bool {
        matches!(self.storage, ProjectStorage::File { dirty: true, .. })
    }

    fn mark_dirty(&mut self) {
        if let ProjectStorage::File { dirty, .. } = &mut self.storage {
            *dirty = true;
        }
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn settings(&self) -> &ProjectSettings {
        &self.settings
    }

    pub fn number_format(&self) -> &NumberFormat {
        &self.settings.number_format
    }

    pub fn shots(&self) -> &ShotRepository {
        &self.shots
    }

    pub fn pages(&self) -> &PageRepository {
        &self.pages
    }

    pub fn stats(&self) -> SettleStats {
        self.stats
    }

    pub fn shot(&self, id: &str) -> Option<&Shot> {
        self.shots.get(id)
    }

    pub fn shot_count(&self) -> usize {
        self.shots.len()
    }

    pub fn global_shot_index(&self, id: &str) -> Option<usize> {
        self.shots.index_of(id)
    }

    /// Number of shots on a page
    pub fn total_shots(&self, page_id: &str) -> Option<usize> {
        self.pages.get(page_id).map(|p| p.shot_ids.len())
    }

    /// Global index of the page's first slot
    pub fn page_offset(&self, page_id: &str) -> Option<usize> {
        let index = self.pages.index_of(page_id)?;
        Some(self.pages.pages()[..index].iter().map(|p| p.shot_ids.len()).sum())
    }

    /// Shots on a page in display order
    pub fn page_shots(&self, page_id: &str) -> Vec<&Shot> {
        self.pages
            .get(page_id)
            .map(|p| p.shot_ids.iter().filter_map(|id| self.shots.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn active_page(&self) -> &PageId {
        &self.active_page
    }

    pub fn set_active_page(&mut self, page_id: &str) -> bool {
        if self.pages.get(page_id).is_none() {
            return false;
        }
        self.active_page = page_id.to_string();
        true
    }

    pub fn subscribe_shots(&mut self, listener: impl FnMut(&ShotEvent) + 'static) -> SubscriptionId {
        self.shots.subscribe(listener)
    }

    pub fn subscribe_pages(&mut self, listener: impl FnMut(&PageEvent) + 'static) -> SubscriptionId {
        self.pages.subscribe(listener)
    }

    pub fn settle_requester(&self) -> SettleRequester {
        self.requester.clone()
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Apply a serialized mutation
    pub fn apply(&mut self, mutation: Mutation) -> EditorResult<MutationResult> {
        let before = self.revision;

        let created = match mutation {
            Mutation::CreateShot { content } => Some(self.create_shot(content)?),
            Mutation::InsertShot { index, content } => Some(self.insert_shot(index, content)?),
            Mutation::DeleteShot { shot_id } => {
                self.delete_shot(&shot_id)?;
                None
            }
            Mutation::UpdateShot { shot_id, patch } => {
                self.update_shot(&shot_id, &patch)?;
                None
            }
            Mutation::CreateSubShot { parent_id } => self.create_sub_shot(&parent_id)?,
            Mutation::RemoveFromSubGroup { shot_id } => {
                self.remove_from_sub_group(&shot_id)?;
                None
            }
            Mutation::InsertIntoSubGroup {
                shot_id,
                group_id,
                position,
            } => {
                self.insert_into_sub_group(&shot_id, &group_id, position)?;
                None
            }
            Mutation::MoveShot {
                shot_id,
                target_index,
            } => {
                self.move_shot(&shot_id, target_index)?;
                None
            }
            Mutation::MoveShotGroup {
                group_id,
                target_index,
            } => {
                self.move_shot_group(&group_id, target_index)?;
                None
            }
            Mutation::SetShotOrder { order } => {
                self.set_shot_order(order)?;
                None
            }
            Mutation::CreatePage { name } => Some(self.create_page(name.as_deref())?),
            Mutation::DeletePage { page_id } => {
                self.delete_page(&page_id)?;
                None
            }
            Mutation::RenamePage { page_id, name } => {
                self.rename_page(&page_id, &name)?;
                None
            }
            Mutation::DuplicatePage { page_id } => {
                self.duplicate_page(&page_id)?.into_iter().next()
            }
            Mutation::UpdateGridSize {
                page_id,
                rows,
                cols,
            } => {
                self.set_grid_size(&page_id, rows, cols)?;
                None
            }
            Mutation::UpdateAspectRatio {
                page_id,
                aspect_ratio,
            } => {
                self.set_aspect_ratio(&page_id, &aspect_ratio)?;
                None
            }
            Mutation::SetNumberFormat { format } => {
                self.set_number_format(&format)?;
                None
            }
        };

        Ok(MutationResult {
            revision: self.revision,
            changed: self.revision != before,
            created,
        })
    }

    pub fn create_shot(&mut self, content: ShotContent) -> EditorResult<ShotId> {
        let id = self.shots.create_shot(content);
        self.finish(MutationKind::CreateShot, true)?;
        Ok(id)
    }

    /// Create a shot at a global position, placing it on its page directly
    pub fn insert_shot(&mut self, index: usize, content: ShotContent) -> EditorResult<ShotId> {
        let id = self.shots.insert_shot(index, content);
        if !self.batch.is_open() {
            self.place_incrementally(&id)?;
        }
        self.finish(MutationKind::InsertShot, true)?;
        Ok(id)
    }

    pub fn delete_shot(&mut self, id: &str) -> EditorResult<bool> {
        let page_id = self.pages.page_of_shot(id).map(|p| p.id.clone());
        let removed = self.shots.delete_shot(id);
        if removed && !self.batch.is_open() {
            if let Some(page_id) = page_id {
                self.pages.remove_shot_from_page(&page_id, id);
                let capacity = uniform_capacity(&self.pages)?;
                pull_backflow(&mut self.pages, capacity);
            }
        }
        self.finish(MutationKind::DeleteShot, removed)?;
        Ok(removed)
    }

    pub fn update_shot(&mut self, id: &str, patch: &ShotPatch) -> EditorResult<bool> {
        let changed = self.shots.update_shot(id, patch);
        self.finish(MutationKind::UpdateShot, changed)?;
        Ok(changed)
    }

    pub fn create_sub_shot(&mut self, parent_id: &str) -> EditorResult<Option<ShotId>> {
        let id = self.shots.create_sub_shot(parent_id);
        self.finish(MutationKind::CreateSubShot, id.is_some())?;
        Ok(id)
    }

    pub fn remove_from_sub_group(&mut self, id: &str) -> EditorResult<bool> {
        let changed = self.shots.remove_from_sub_group(id);
        self.finish(MutationKind::RemoveFromSubGroup, changed)?;
        Ok(changed)
    }

    pub fn insert_into_sub_group(&mut self, id: &str, group: &str, position: usize) -> EditorResult<bool> {
        let changed = self.shots.insert_into_sub_group(id, group, position);
        self.finish(MutationKind::InsertIntoSubGroup, changed)?;
        Ok(changed)
    }

    pub fn move_shot(&mut self, id: &str, target_index: usize) -> EditorResult<bool> {
        let changed = self.shots.move_shot(id, target_index);
        self.finish(MutationKind::MoveShot, changed)?;
        Ok(changed)
    }

    pub fn move_shot_group(&mut self, group: &str, target_index: usize) -> EditorResult<bool> {
        let changed = self.shots.move_shot_group(group, target_index);
        self.finish(MutationKind::MoveShotGroup, changed)?;
        Ok(changed)
    }

    pub fn set_shot_order(&mut self, order: Vec<ShotId>) -> EditorResult<()> {
        self.shots.set_shot_order(order);
        self.finish(MutationKind::SetShotOrder, true)
    }

    /// Append an empty page. It stays until the next settle pass, which
    /// removes trailing empty pages.
    pub fn create_page(&mut self, name: Option<&str>) -> EditorResult<PageId> {
        let id = self.pages.create_page(name);
        self.finish(MutationKind::CreatePage, true)?;
        Ok(id)
    }

    /// Delete a page together with its shots, settling once
    ///
    /// The only page is kept (emptied).
    pub fn delete_page(&mut self, page_id: &str) -> EditorResult<bool> {
        let Some(page) = self.pages.get(page_id) else {
            debug!(page_id = %page_id, "Ignoring delete of unknown page");
            return Ok(false);
        };
        let doomed = page.shot_ids.clone();
        let description = format!("Delete {}", page.name);

        self.batch(|project| {
            project.batch.set_description(description);
            for shot_id in &doomed {
                project.delete_shot(shot_id)?;
            }
            let removed = project.pages.delete_page(page_id);
            project.finish(MutationKind::DeletePage, removed || !doomed.is_empty())?;
            Ok(removed || !doomed.is_empty())
        })
    }

    pub fn rename_page(&mut self, page_id: &str, name: &str) -> EditorResult<bool> {
        let changed = self.pages.rename_page(page_id, name);
        self.finish(MutationKind::RenamePage, changed)?;
        Ok(changed)
    }

    /// Deep-copy a page's shots (fresh ids, fresh groups) and insert the
    /// copies right after the source page's last shot. Returns the copies.
    pub fn duplicate_page(&mut self, page_id: &str) -> EditorResult<Vec<ShotId>> {
        let Some(page) = self.pages.get(page_id) else {
            debug!(page_id = %page_id, "Ignoring duplicate of unknown page");
            return Ok(Vec::new());
        };
        let source = page.shot_ids.clone();
        let insert_at = match source.last().and_then(|id| self.shots.index_of(id)) {
            Some(index) => index + 1,
            None => self.page_offset(page_id).unwrap_or(self.shots.len()),
        };

        let copies = self.shots.duplicate_shots(&source, insert_at);
        self.finish(MutationKind::DuplicatePage, !copies.is_empty())?;
        Ok(copies)
    }

    /// Resize the grid. Capacity is uniform, so every page takes the grid.
    pub fn set_grid_size(&mut self, page_id: &str, rows: u32, cols: u32) -> EditorResult<bool> {
        let grid = GridSize::new(rows, cols);
        if grid.capacity() == 0 {
            return Err(EditorError::InvalidCapacity { rows, cols });
        }
        if self.pages.get(page_id).is_none() {
            debug!(page_id = %page_id, "Ignoring grid change on unknown page");
            return Ok(false);
        }

        let stale: Vec<PageId> = self
            .pages
            .pages()
            .iter()
            .filter(|p| p.grid != grid)
            .map(|p| p.id.clone())
            .collect();
        for id in &stale {
            self.pages.update_grid_size(id, grid);
        }

        let changed = !stale.is_empty();
        self.finish(MutationKind::UpdateGridSize, changed)?;
        Ok(changed)
    }

    pub fn set_aspect_ratio(&mut self, page_id: &str, tag: &str) -> EditorResult<bool> {
        let changed = self.pages.update_aspect_ratio(page_id, tag);
        self.finish(MutationKind::UpdateAspectRatio, changed)?;
        Ok(changed)
    }

    pub fn set_number_format(&mut self, format: &str) -> EditorResult<bool> {
        let format = NumberFormat::parse(format);
        let changed = format != self.settings.number_format;
        self.settings.number_format = format;
        self.finish(MutationKind::SetNumberFormat, changed)?;
        Ok(changed)
    }

    /// Copy a sub-shot group id out for callers holding a shot id
    pub fn group_of(&self, shot_id: &str) -> Option<GroupId> {
        self.shots.group_of(shot_id).cloned()
    }

    // ---------------------------------------------------------------------
    // Batching
    // ---------------------------------------------------------------------

    pub fn begin_batch(&mut self) {
        self.batch.begin();
    }

    /// Close a batch level; closing the outermost one runs a single settle
    /// pass if anything was deferred inside it. Numbering runs in the
    /// strongest mode any deferred edit asked for.
    pub fn end_batch(&mut self) -> EditorResult<()> {
        let Some(pending) = self.batch.end() else {
            return Ok(());
        };
        debug!(
            suppressed = pending.suppressed,
            mode = ?pending.mode,
            description = pending.description.as_deref().unwrap_or(""),
            "Settling batch"
        );
        self.run_settle(LayoutEffect::Redistribute, Some(pending.mode))
    }

    pub fn set_batch_description(&mut self, description: impl Into<String>) {
        self.batch.set_description(description);
    }

    /// Run `f` inside a batch scope. The scope is closed even when `f` fails.
    pub fn batch<T>(&mut self, f: impl FnOnce(&mut Self) -> EditorResult<T>) -> EditorResult<T> {
        self.begin_batch();
        let result = f(self);
        let settled = self.end_batch();
        let value = result?;
        settled?;
        Ok(value)
    }

    // ---------------------------------------------------------------------
    // Numbering
    // ---------------------------------------------------------------------

    /// Renumber every shot now, dropping any pending coalesced renumber
    pub fn renumber_now(&mut self) -> usize {
        self.renumber_queue.cancel();
        let count = renumber(&mut self.shots, &self.settings.number_format, Utc::now());
        self.stats.renumber_passes += 1;
        count
    }

    /// Queue a coalesced renumber of the current state
    pub fn request_renumber(&mut self) {
        self.request_renumber_at(Instant::now());
    }

    pub fn request_renumber_at(&mut self, now: Instant) {
        if self.batch.is_open() {
            self.batch.defer(RenumberMode::Coalesced);
            self.stats.suppressed += 1;
            return;
        }
        let snapshot = RenumberSnapshot::capture(&self.shots, &self.settings.number_format);
        self.renumber_queue.schedule(snapshot, now);
        self.stats.renumber_requests += 1;
    }

    pub fn renumber_pending(&self) -> bool {
        self.renumber_queue.is_pending()
    }

    /// Drive deferred work: a due coalesced renumber and settle requests
    /// raised by listeners. Returns true if anything ran.
    pub fn tick(&mut self) -> EditorResult<bool> {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> EditorResult<bool> {
        let mut worked = false;
        if let Some(snapshot) = self.renumber_queue.poll(now) {
            self.apply_snapshot(snapshot);
            worked = true;
        }
        Ok(self.pump()? || worked)
    }

    /// Apply a pending coalesced renumber immediately
    pub fn flush_renumber(&mut self) -> bool {
        match self.renumber_queue.flush() {
            Some(snapshot) => {
                self.apply_snapshot(snapshot);
                true
            }
            None => false,
        }
    }

    fn apply_snapshot(&mut self, snapshot: RenumberSnapshot) {
        let numbers = snapshot.compute();
        let count = self.shots.apply_numbers(&numbers, Utc::now());
        self.stats.renumber_passes += 1;
        debug!(count, coalesced = self.renumber_queue.coalesced(), "Applied coalesced renumber");
    }

    fn numbers_stale(&self) -> bool {
        let numbers = compute_numbers(
            self.shots.order(),
            |id| self.shots.group_of(id).map(String::as_str),
            &self.settings.number_format,
        );
        numbers
            .iter()
            .any(|(id, number)| self.shots.get(id).map(|s| &s.number != number).unwrap_or(false))
    }

    // ---------------------------------------------------------------------
    // Settle pipeline
    // ---------------------------------------------------------------------

    /// Serve settle requests raised outside a pass
    pub fn pump(&mut self) -> EditorResult<bool> {
        if self.settling || !self.requester.is_requested() {
            return Ok(false);
        }
        if self.batch.is_open() {
            self.requester.take();
            self.batch.defer(RenumberMode::Immediate);
            self.stats.suppressed += 1;
            return Ok(false);
        }
        self.run_settle(LayoutEffect::Redistribute, Some(RenumberMode::Immediate))?;
        Ok(true)
    }

    fn finish(&mut self, kind: MutationKind, changed: bool) -> EditorResult<()> {
        if !changed {
            debug!(?kind, "Mutation changed nothing");
            return Ok(());
        }
        self.revision += 1;

        let plan = self.effects.plan(kind);
        if plan.dirty {
            self.mark_dirty();
        }
        if plan.needs_settle() {
            self.settle(plan)?;
        }
        Ok(())
    }

    fn settle(&mut self, plan: EffectPlan) -> EditorResult<()> {
        if self.batch.is_open() {
            self.batch.defer(plan.renumber.unwrap_or(RenumberMode::Immediate));
            self.stats.suppressed += 1;
            return Ok(());
        }
        if self.settling {
            self.requester.request();
            return Ok(());
        }
        self.run_settle(plan.layout, plan.renumber)
    }

    #[instrument(level = "debug", skip(self), fields(revision = self.revision))]
    fn run_settle(&mut self, layout: LayoutEffect, renumber: Option<RenumberMode>) -> EditorResult<()> {
        // Requests raised before this pass are covered by it
        self.requester.take();
        self.settling = true;

        let mut result = self.settle_pass(layout, renumber);
        let mut reruns = 0;
        while result.is_ok() && self.requester.take() {
            if reruns == MAX_DEFERRED_RERUNS {
                warn!(reruns, "Settle requests kept arriving, dropping the rest");
                break;
            }
            reruns += 1;
            self.stats.deferred_reruns += 1;
            result = self.settle_pass(LayoutEffect::Redistribute, Some(RenumberMode::Immediate));
        }

        self.settling = false;
        result
    }

    fn settle_pass(&mut self, layout: LayoutEffect, renumber: Option<RenumberMode>) -> EditorResult<()> {
        match layout {
            LayoutEffect::None => {}
            LayoutEffect::Verify => {
                let drift = detect_drift(self.shots.order(), &self.pages);
                if !drift.is_consistent() {
                    debug!(?drift, "Incremental layout drifted, running full pass");
                    self.redistribute()?;
                }
            }
            LayoutEffect::Redistribute => {
                self.redistribute()?;
            }
        }

        match renumber {
            Some(RenumberMode::Immediate) => {
                self.renumber_now();
            }
            Some(RenumberMode::Coalesced) => self.request_renumber(),
            None => {}
        }

        self.retarget_active();
        Ok(())
    }

    fn redistribute(&mut self) -> EditorResult<RedistributionReport> {
        let report = self.redistributor.redistribute(self.shots.order(), &mut self.pages)?;
        self.stats.redistribution_passes += 1;
        self.retarget_active();
        Ok(report)
    }

    /// Insert a freshly created shot into its projected slot and cascade
    /// any overflow forward
    fn place_incrementally(&mut self, id: &str) -> EditorResult<()> {
        let capacity = uniform_capacity(&self.pages)?;
        let Some(position) = self.shots.index_of(id) else {
            return Ok(());
        };

        let page_index = (position / capacity).min(self.pages.len().saturating_sub(1));
        let slot = position - page_index * capacity;
        if let Some(slice) = self.pages.slice_mut(page_index) {
            let slot = slot.min(slice.len());
            slice.insert(slot, id.to_string());
        }
        self.pages.notify_slice_changed(page_index);
        push_overflow(&mut self.pages, page_index, capacity);
        Ok(())
    }

    /// Point the active page at the last page if it no longer exists
    fn retarget_active(&mut self) {
        if self.pages.get(&self.active_page).is_none() {
            let last = self.pages.last().id.clone();
            debug!(from = %self.active_page, to = %last, "Active page removed, retargeting");
            self.active_page = last;
        }
    }

    // ---------------------------------------------------------------------
    // Reconciliation
    // ---------------------------------------------------------------------

    /// Heal groups, re-project pages if they drifted from the ordering and
    /// renumber if anything changed or numbers are stale. A second call
    /// changes nothing.
    #[instrument(level = "debug", skip(self), fields(shots = self.shots.len(), pages = self.pages.len()))]
    pub fn reconcile(&mut self) -> EditorResult<ReconcileOutcome> {
        let mut outcome = ReconcileOutcome {
            groups_healed: self.shots.heal_groups(),
            drift: detect_drift(self.shots.order(), &self.pages),
            ..ReconcileOutcome::default()
        };

        let drifted = !outcome.drift.is_consistent();
        if drifted {
            warn!(
                missing = outcome.drift.missing_from_pages.len(),
                unknown = outcome.drift.unknown_on_pages.len(),
                duplicates = outcome.drift.duplicates_on_pages.len(),
                out_of_order = outcome.drift.out_of_order,
                misplaced = outcome.drift.misplaced_pages.len(),
                "Pages drifted from shot order, re-projecting"
            );
            outcome.redistribution = Some(self.redistribute()?);
        }

        if drifted || outcome.groups_healed || self.numbers_stale() {
            outcome.renumbered = self.renumber_now();
        }
        self.retarget_active();

        if outcome.changed() {
            self.mark_dirty();
        }
        Ok(outcome)
    }

    /// Flush numbering, reconcile and hand out a read-only view
    pub fn snapshot_for_export(&mut self) -> EditorResult<ExportSnapshot> {
        self.flush_renumber();
        self.reconcile()?;

        let mut offset = 0;
        let pages = self
            .pages
            .pages()
            .iter()
            .map(|page| {
                let shots: Vec<Shot> = page
                    .shot_ids
                    .iter()
                    .filter_map(|id| self.shots.get(id).cloned())
                    .collect();
                let export = ExportPage {
                    id: page.id.clone(),
                    name: page.name.clone(),
                    grid: page.grid,
                    aspect_ratio: page.aspect_ratio.clone(),
                    offset,
                    shots,
                };
                offset += page.shot_ids.len();
                export
            })
            .collect();

        Ok(ExportSnapshot {
            name: self.name.clone(),
            number_format: self.settings.number_format.to_string(),
            shot_count: self.shots.len(),
            pages,
        })
    }
}
