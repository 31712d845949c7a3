//! # Redistribution Engine
//!
//! Projects the canonical ordering onto pages. One pass runs three steps:
//!
//! ```text
//! 1. overflow   append pages (cloning page 1) until pages x capacity >= shots
//! 2. project    page i  <-  order[i*cap .. (i+1)*cap]   (unconditional)
//! 3. backflow   drop the trailing run of empty pages, keeping at least one
//! ```
//!
//! Capacity is uniform: it is read from the first page, and pages carrying a
//! different grid are aligned to it before projection.
//!
//! `push_overflow` / `pull_backflow` are the incremental forms used when a
//! single shot enters or leaves a page. Applied to a consistent layout they
//! produce the same slices as a full pass.

use tracing::{debug, instrument, warn};

use crate::errors::{EditorError, EditorResult};
use crate::ids::{PageId, ShotId};
use crate::pages::PageRepository;

/// What a redistribution pass changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RedistributionReport {
    pub pages_created: usize,
    pub pages_removed: Vec<PageId>,
    pub pages_aligned: usize,
    pub slices_changed: usize,
}

impl RedistributionReport {
    pub fn changed(&self) -> bool {
        self.pages_created > 0
            || !self.pages_removed.is_empty()
            || self.pages_aligned > 0
            || self.slices_changed > 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct Redistributor {
    /// Overrides the overflow loop's iteration guard (default: shots + 1)
    max_iterations: Option<usize>,
}

impl Redistributor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(max_iterations: usize) -> Self {
        Self {
            max_iterations: Some(max_iterations),
        }
    }

    /// Run overflow, projection and backflow against `order`
    #[instrument(level = "debug", skip_all, fields(shots = order.len(), pages = pages.len()))]
    pub fn redistribute(
        &self,
        order: &[ShotId],
        pages: &mut PageRepository,
    ) -> EditorResult<RedistributionReport> {
        let mut report = RedistributionReport::default();

        let capacity = uniform_capacity(pages)?;
        report.pages_aligned = align_grids(pages);

        // 1. Overflow expansion
        let limit = self.max_iterations.unwrap_or(order.len() + 1);
        let mut iterations = 0;
        while order.len() > pages.len() * capacity {
            if iterations >= limit {
                return Err(EditorError::RedistributionLimit { iterations });
            }
            pages.create_page(None);
            report.pages_created += 1;
            iterations += 1;
        }

        // 2. Slice projection
        for index in 0..pages.len() {
            let start = (index * capacity).min(order.len());
            let end = (start + capacity).min(order.len());
            if pages.set_slice(index, &order[start..end]) {
                report.slices_changed += 1;
            }
        }

        // 3. Backflow contraction
        report.pages_removed = drop_empty_suffix(pages);

        if report.changed() {
            debug!(
                created = report.pages_created,
                removed = report.pages_removed.len(),
                slices = report.slices_changed,
                "Redistributed shots"
            );
        }
        Ok(report)
    }
}

/// Capacity of the first page; zero is a programming error
pub fn uniform_capacity(pages: &PageRepository) -> EditorResult<usize> {
    let grid = pages.first().grid;
    match grid.capacity() {
        0 => Err(EditorError::InvalidCapacity {
            rows: grid.rows,
            cols: grid.cols,
        }),
        capacity => Ok(capacity),
    }
}

fn align_grids(pages: &mut PageRepository) -> usize {
    let grid = pages.first().grid;
    let stray: Vec<PageId> = pages
        .pages()
        .iter()
        .filter(|p| p.grid != grid)
        .map(|p| p.id.clone())
        .collect();
    for id in &stray {
        warn!(page_id = %id, rows = grid.rows, cols = grid.cols, "Aligning page grid to first page");
        pages.update_grid_size(id, grid);
    }
    stray.len()
}

fn drop_empty_suffix(pages: &mut PageRepository) -> Vec<PageId> {
    let keep = pages
        .pages()
        .iter()
        .rposition(|p| !p.shot_ids.is_empty())
        .map(|i| i + 1)
        .unwrap_or(1);
    pages.truncate(keep)
}

/// Cascade overflow forward from page `from`: any shots beyond capacity move
/// to the front of the next page, creating it when needed. Returns the number
/// of pages created.
pub fn push_overflow(pages: &mut PageRepository, from: usize, capacity: usize) -> usize {
    let mut created = 0;
    let mut index = from;

    loop {
        let Some(slice) = pages.slice_mut(index) else {
            break;
        };
        if slice.len() <= capacity {
            break;
        }
        let overflow = slice.split_off(capacity);
        pages.notify_slice_changed(index);

        if index + 1 == pages.len() {
            pages.create_page(None);
            created += 1;
        }
        if let Some(next) = pages.slice_mut(index + 1) {
            next.splice(0..0, overflow);
        }
        pages.notify_slice_changed(index + 1);
        index += 1;
    }

    created
}

/// Pull shots forward so every page but the last is full, then drop empty
/// trailing pages. Returns the removed page ids.
pub fn pull_backflow(pages: &mut PageRepository, capacity: usize) -> Vec<PageId> {
    for index in 0..pages.len() {
        let mut need = match pages.slice_mut(index) {
            Some(slice) if slice.len() < capacity => capacity - slice.len(),
            _ => continue,
        };

        let mut pulled = Vec::new();
        let mut donor = index + 1;
        while need > 0 && donor < pages.len() {
            if let Some(slice) = pages.slice_mut(donor) {
                let take = need.min(slice.len());
                pulled.extend(slice.drain(..take));
                need -= take;
                if take > 0 {
                    pages.notify_slice_changed(donor);
                }
            }
            donor += 1;
        }

        if pulled.is_empty() {
            break;
        }
        if let Some(slice) = pages.slice_mut(index) {
            slice.extend(pulled);
        }
        pages.notify_slice_changed(index);
    }

    drop_empty_suffix(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdGenerator;
    use crate::pages::GridSize;

    fn pages(rows: u32, cols: u32) -> PageRepository {
        PageRepository::new(IdGenerator::from_seed("t".to_string()), GridSize::new(rows, cols), "16:9")
    }

    fn order(n: usize) -> Vec<ShotId> {
        (1..=n).map(|i| format!("s{}", i)).collect()
    }

    fn slices(pages: &PageRepository) -> Vec<Vec<ShotId>> {
        pages.pages().iter().map(|p| p.shot_ids.clone()).collect()
    }

    #[test]
    fn test_overflow_creates_pages() {
        let mut pages = pages(2, 4);
        let order = order(10);

        let report = Redistributor::new().redistribute(&order, &mut pages).unwrap();

        assert_eq!(report.pages_created, 1);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages.page_at(0).unwrap().shot_ids, order[..8]);
        assert_eq!(pages.page_at(1).unwrap().shot_ids, order[8..]);
    }

    #[test]
    fn test_backflow_removes_empty_trailing_pages() {
        let mut pages = pages(2, 2);
        let engine = Redistributor::new();
        engine.redistribute(&order(9), &mut pages).unwrap();
        assert_eq!(pages.len(), 3);

        let report = engine.redistribute(&order(3), &mut pages).unwrap();
        assert_eq!(report.pages_removed.len(), 2);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages.first().shot_ids.len(), 3);
    }

    #[test]
    fn test_empty_order_keeps_one_empty_page() {
        let mut pages = pages(2, 4);
        pages.create_page(None);

        Redistributor::new().redistribute(&[], &mut pages).unwrap();

        assert_eq!(pages.len(), 1);
        assert!(pages.first().shot_ids.is_empty());
    }

    #[test]
    fn test_projection_overwrites_stale_slices() {
        let mut pages = pages(1, 2);
        let first = pages.first().id.clone();
        pages.add_shot_to_page(&first, "ghost", None);

        Redistributor::new().redistribute(&order(3), &mut pages).unwrap();

        assert_eq!(slices(&pages), vec![order(2), vec!["s3".to_string()]]);
    }

    #[test]
    fn test_zero_capacity_fails_fast() {
        let mut pages = pages(0, 4);
        let err = Redistributor::new().redistribute(&order(1), &mut pages).unwrap_err();
        assert!(matches!(err, EditorError::InvalidCapacity { rows: 0, cols: 4 }));
    }

    #[test]
    fn test_iteration_guard() {
        let mut pages = pages(1, 1);
        let err = Redistributor::with_max_iterations(2)
            .redistribute(&order(5), &mut pages)
            .unwrap_err();
        assert!(matches!(err, EditorError::RedistributionLimit { iterations: 2 }));
    }

    #[test]
    fn test_stray_grids_are_aligned() {
        let mut pages = pages(2, 2);
        let second = pages.create_page(None);
        pages.update_grid_size(&second, GridSize::new(5, 5));

        let report = Redistributor::new().redistribute(&order(6), &mut pages).unwrap();

        assert_eq!(report.pages_aligned, 1);
        assert_eq!(pages.get(&second).unwrap().grid, GridSize::new(2, 2));
        assert_eq!(pages.get(&second).unwrap().shot_ids.len(), 2);
    }

    #[test]
    fn test_incremental_insert_matches_projection() {
        let mut incremental = pages(1, 3);
        let mut full = pages(1, 3);
        let engine = Redistributor::new();
        let mut order = order(6);
        engine.redistribute(&order, &mut incremental).unwrap();

        // Insert at global index 1 -> page 0, slot 1
        order.insert(1, "new".to_string());
        let page = incremental.first().id.clone();
        incremental.add_shot_to_page(&page, "new", Some(1));
        let created = push_overflow(&mut incremental, 0, 3);

        engine.redistribute(&order, &mut full).unwrap();
        assert_eq!(created, 1);
        assert_eq!(slices(&incremental), slices(&full));
    }

    #[test]
    fn test_incremental_delete_matches_projection() {
        let mut incremental = pages(1, 3);
        let mut full = pages(1, 3);
        let engine = Redistributor::new();
        let mut order = order(7);
        engine.redistribute(&order, &mut incremental).unwrap();

        for victim in ["s2", "s5", "s7"] {
            order.retain(|s| s != victim);
            let page = incremental.page_of_shot(victim).unwrap().id.clone();
            incremental.remove_shot_from_page(&page, victim);
            pull_backflow(&mut incremental, 3);
        }

        engine.redistribute(&order, &mut full).unwrap();
        assert_eq!(slices(&incremental), slices(&full));
        assert_eq!(incremental.len(), 2);
    }
}
