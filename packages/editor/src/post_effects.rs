//! # Post-Effect System
//!
//! Mutations trigger follow-up work to keep the project consistent:
//! - Membership/order/grouping/capacity change -> redistribute pages
//! - Anything the numbering depends on -> renumber (coalesced or immediate)
//! - Any change at all -> mark the project dirty for persistence
//!
//! Post-effects are:
//! - **Deterministic**: Same mutation kind always plans the same work
//! - **Composable**: Each effect contributes to one `EffectPlan`

use crate::batch::RenumberMode;
use crate::mutations::MutationKind;

/// How the page layout must be brought back in line after a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LayoutEffect {
    #[default]
    None,
    /// Layout was maintained incrementally (single insert or delete); only
    /// check for drift
    Verify,
    /// Full redistribution pass
    Redistribute,
}

/// Work planned for one mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EffectPlan {
    pub layout: LayoutEffect,
    pub renumber: Option<RenumberMode>,
    pub dirty: bool,
}

impl EffectPlan {
    pub fn needs_settle(&self) -> bool {
        self.layout != LayoutEffect::None || self.renumber.is_some()
    }
}

/// Post-effect that contributes to a mutation's plan
pub trait PostEffect: std::fmt::Debug {
    fn analyze(&self, kind: MutationKind, plan: &mut EffectPlan);
}

/// Structural mutations need the pages re-projected
#[derive(Debug)]
pub struct RedistributeOnStructureChange;

impl PostEffect for RedistributeOnStructureChange {
    fn analyze(&self, kind: MutationKind, plan: &mut EffectPlan) {
        use MutationKind::*;

        let layout = match kind {
            InsertShot | DeleteShot => LayoutEffect::Verify,
            CreateShot | CreateSubShot | RemoveFromSubGroup | InsertIntoSubGroup
            | MoveShot | MoveShotGroup | SetShotOrder | DeletePage | DuplicatePage
            | UpdateGridSize => LayoutEffect::Redistribute,
            UpdateShot | CreatePage | RenamePage | UpdateAspectRatio | SetNumberFormat => {
                LayoutEffect::None
            }
        };
        plan.layout = plan.layout.max(layout);
    }
}

/// Numbers follow order, grouping and format
///
/// High-frequency edits (appending, dragging) coalesce; structural edits
/// renumber before returning.
#[derive(Debug)]
pub struct RenumberOnOrderChange;

impl PostEffect for RenumberOnOrderChange {
    fn analyze(&self, kind: MutationKind, plan: &mut EffectPlan) {
        use MutationKind::*;

        let mode = match kind {
            CreateShot | InsertShot | MoveShot | MoveShotGroup | SetShotOrder => {
                Some(RenumberMode::Coalesced)
            }
            DeleteShot | CreateSubShot | RemoveFromSubGroup | InsertIntoSubGroup | DeletePage
            | DuplicatePage | UpdateGridSize | SetNumberFormat => Some(RenumberMode::Immediate),
            UpdateShot | CreatePage | RenamePage | UpdateAspectRatio => None,
        };
        plan.renumber = match (plan.renumber, mode) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

/// Every mutation needs persisting
#[derive(Debug)]
pub struct MarkDirty;

impl PostEffect for MarkDirty {
    fn analyze(&self, _kind: MutationKind, plan: &mut EffectPlan) {
        plan.dirty = true;
    }
}

/// Post-effect engine that combines all registered effects
#[derive(Debug)]
pub struct PostEffectEngine {
    effects: Vec<Box<dyn PostEffect>>,
}

impl PostEffectEngine {
    /// Create engine with default effects
    pub fn new() -> Self {
        Self {
            effects: vec![
                Box::new(RedistributeOnStructureChange),
                Box::new(RenumberOnOrderChange),
                Box::new(MarkDirty),
            ],
        }
    }

    pub fn plan(&self, kind: MutationKind) -> EffectPlan {
        let mut plan = EffectPlan::default();
        for effect in &self.effects {
            effect.analyze(kind, &mut plan);
        }
        plan
    }
}

impl Default for PostEffectEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_effect_engine_creation() {
        let engine = PostEffectEngine::new();
        assert_eq!(engine.effects.len(), 3);
    }

    #[test]
    fn test_content_update_only_marks_dirty() {
        let plan = PostEffectEngine::new().plan(MutationKind::UpdateShot);
        assert!(!plan.needs_settle());
        assert!(plan.dirty);
    }

    #[test]
    fn test_delete_verifies_and_renumbers_immediately() {
        let plan = PostEffectEngine::new().plan(MutationKind::DeleteShot);
        assert_eq!(plan.layout, LayoutEffect::Verify);
        assert_eq!(plan.renumber, Some(RenumberMode::Immediate));
    }

    #[test]
    fn test_drag_reorder_coalesces_numbering() {
        let plan = PostEffectEngine::new().plan(MutationKind::MoveShot);
        assert_eq!(plan.layout, LayoutEffect::Redistribute);
        assert_eq!(plan.renumber, Some(RenumberMode::Coalesced));
    }

    #[test]
    fn test_insert_only_verifies_layout() {
        let plan = PostEffectEngine::new().plan(MutationKind::InsertShot);
        assert_eq!(plan.layout, LayoutEffect::Verify);
    }

    #[test]
    fn test_page_delete_redistributes() {
        let plan = PostEffectEngine::new().plan(MutationKind::DeletePage);
        assert_eq!(plan.layout, LayoutEffect::Redistribute);
        assert_eq!(plan.renumber, Some(RenumberMode::Immediate));
    }

    #[test]
    fn test_format_change_renumbers_without_layout() {
        let plan = PostEffectEngine::new().plan(MutationKind::SetNumberFormat);
        assert_eq!(plan.layout, LayoutEffect::None);
        assert_eq!(plan.renumber, Some(RenumberMode::Immediate));
    }
}
