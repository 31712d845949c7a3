//! # Reconciliation Guard
//!
//! Detects drift between the pages' slices and the canonical ordering. This
//! is a check, not a merge: when anything disagrees the ordering wins and the
//! pages are re-projected from it.
//!
//! Drift covers:
//!
//! - ids in the ordering that no page holds, and ids on pages the ordering
//!   does not know
//! - ids held by more than one page slot
//! - same ids, different sequence
//! - a layout that is not the projection (capacity overrun, under-filled
//!   interior page, empty trailing pages, stray grid)

use std::collections::HashSet;

use crate::ids::{PageId, ShotId};
use crate::pages::PageRepository;
use crate::redistribute::RedistributionReport;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriftReport {
    pub missing_from_pages: Vec<ShotId>,
    pub unknown_on_pages: Vec<ShotId>,
    pub duplicates_on_pages: Vec<ShotId>,
    pub out_of_order: bool,
    pub misplaced_pages: Vec<PageId>,
}

impl DriftReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_from_pages.is_empty()
            && self.unknown_on_pages.is_empty()
            && self.duplicates_on_pages.is_empty()
            && !self.out_of_order
            && self.misplaced_pages.is_empty()
    }

    /// Membership drift only: the set comparison of page ids vs ordering ids
    pub fn membership_differs(&self) -> bool {
        !self.missing_from_pages.is_empty() || !self.unknown_on_pages.is_empty()
    }
}

/// Outcome of one reconciliation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileOutcome {
    pub drift: DriftReport,
    pub groups_healed: bool,
    pub redistribution: Option<RedistributionReport>,
    pub renumbered: usize,
}

impl ReconcileOutcome {
    pub fn changed(&self) -> bool {
        self.groups_healed
            || self.renumbered > 0
            || self.redistribution.as_ref().map(|r| r.changed()).unwrap_or(false)
    }
}

pub fn detect_drift(order: &[ShotId], pages: &PageRepository) -> DriftReport {
    let mut report = DriftReport::default();

    let on_pages: Vec<&ShotId> = pages.pages().iter().flat_map(|p| p.shot_ids.iter()).collect();
    let order_set: HashSet<&ShotId> = order.iter().collect();
    let mut page_set: HashSet<&ShotId> = HashSet::with_capacity(on_pages.len());

    for id in &on_pages {
        if !page_set.insert(*id) {
            report.duplicates_on_pages.push((*id).clone());
        }
        if !order_set.contains(*id) {
            report.unknown_on_pages.push((*id).clone());
        }
    }
    report.missing_from_pages = order
        .iter()
        .filter(|id| !page_set.contains(id))
        .cloned()
        .collect();

    if report.membership_differs() || !report.duplicates_on_pages.is_empty() {
        return report;
    }
    report.out_of_order = on_pages.iter().zip(order).any(|(a, b)| *a != b);

    let grid = pages.first().grid;
    let capacity = grid.capacity();
    if capacity == 0 {
        report.misplaced_pages = pages.pages().iter().map(|p| p.id.clone()).collect();
        return report;
    }
    let expected_pages = order.len().div_ceil(capacity).max(1);
    for (index, page) in pages.pages().iter().enumerate() {
        let start = (index * capacity).min(order.len());
        let end = (start + capacity).min(order.len());
        let projected = index < expected_pages && page.shot_ids.as_slice() == &order[start..end];
        if !projected || page.grid != grid {
            report.misplaced_pages.push(page.id.clone());
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdGenerator;
    use crate::pages::GridSize;
    use crate::redistribute::Redistributor;

    fn order(n: usize) -> Vec<ShotId> {
        (1..=n).map(|i| format!("s{}", i)).collect()
    }

    fn projected(n: usize, rows: u32, cols: u32) -> (Vec<ShotId>, PageRepository) {
        let mut pages =
            PageRepository::new(IdGenerator::from_seed("t".to_string()), GridSize::new(rows, cols), "16:9");
        let order = order(n);
        Redistributor::new().redistribute(&order, &mut pages).unwrap();
        (order, pages)
    }

    #[test]
    fn test_projection_is_consistent() {
        let (order, pages) = projected(10, 2, 4);
        assert!(detect_drift(&order, &pages).is_consistent());

        let (order, pages) = projected(0, 2, 4);
        assert!(detect_drift(&order, &pages).is_consistent());
    }

    #[test]
    fn test_membership_drift() {
        let (mut order, mut pages) = projected(4, 2, 4);
        let first = pages.first().id.clone();
        pages.add_shot_to_page(&first, "stale", None);
        order.push("s5".to_string());

        let drift = detect_drift(&order, &pages);
        assert_eq!(drift.unknown_on_pages, vec!["stale"]);
        assert_eq!(drift.missing_from_pages, vec!["s5"]);
        assert!(drift.membership_differs());
    }

    #[test]
    fn test_order_drift() {
        let (order, mut pages) = projected(4, 2, 4);
        let first = pages.first().id.clone();
        pages.reorder_shots_in_page(&first, 0, 3);

        let drift = detect_drift(&order, &pages);
        assert!(!drift.membership_differs());
        assert!(drift.out_of_order);
    }

    #[test]
    fn test_layout_drift() {
        let (order, mut pages) = projected(9, 2, 2);
        // Move s8 from page 2 to the front of page 3: same sequence, bad layout
        let second = pages.page_at(1).unwrap().id.clone();
        let third = pages.page_at(2).unwrap().id.clone();
        pages.remove_shot_from_page(&second, "s8");
        pages.add_shot_to_page(&third, "s8", Some(0));

        let drift = detect_drift(&order, &pages);
        assert!(!drift.out_of_order);
        assert_eq!(drift.misplaced_pages, vec![second, third]);
    }

    #[test]
    fn test_duplicates_detected() {
        let (order, mut pages) = projected(3, 2, 4);
        let first = pages.first().id.clone();
        let copy = pages.duplicate_page(&first).unwrap();

        let drift = detect_drift(&order, &pages);
        assert_eq!(drift.duplicates_on_pages.len(), 3);
        assert!(pages.get(&copy).is_some());
    }
}
