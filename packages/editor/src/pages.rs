//! # Page Repository
//!
//! Pages hold ordered shot-id slices plus a grid (capacity = rows x cols) and
//! an opaque aspect-ratio tag. The repository never enforces capacity; the
//! redistribution engine owns that.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ids::{IdGenerator, PageId, ShotId};
use crate::subscribers::{SubscriptionId, Subscribers};

const DEFAULT_NAME_PREFIX: &str = "Page ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    pub rows: u32,
    pub cols: u32,
}

impl GridSize {
    pub const fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    pub fn capacity(&self) -> usize {
        self.rows as usize * self.cols as usize
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self::new(2, 4)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: PageId,
    pub name: String,
    pub shot_ids: Vec<ShotId>,
    pub grid: GridSize,
    pub aspect_ratio: String,
}

impl Page {
    pub fn capacity(&self) -> usize {
        self.grid.capacity()
    }

    pub fn is_full(&self) -> bool {
        self.shot_ids.len() >= self.capacity()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    Created(PageId),
    Deleted(PageId),
    Renamed(PageId),
    SliceChanged(PageId),
    GridChanged(PageId),
    AspectChanged(PageId),
    Replaced,
}

fn is_default_name(name: &str) -> bool {
    name.strip_prefix(DEFAULT_NAME_PREFIX)
        .map(|n| n.parse::<u32>().is_ok())
        .unwrap_or(false)
}

#[derive(Debug)]
pub struct PageRepository {
    pages: Vec<Page>,
    ids: IdGenerator,
    subscribers: Subscribers<PageEvent>,
}

impl PageRepository {
    /// Create a repository holding one empty page
    pub fn new(ids: IdGenerator, grid: GridSize, aspect_ratio: impl Into<String>) -> Self {
        let mut repo = Self {
            pages: Vec::new(),
            ids,
            subscribers: Subscribers::new(),
        };
        let id = repo.ids.page_id();
        repo.pages.push(Page {
            id,
            name: format!("{}1", DEFAULT_NAME_PREFIX),
            shot_ids: Vec::new(),
            grid,
            aspect_ratio: aspect_ratio.into(),
        });
        repo
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&PageEvent) + 'static) -> SubscriptionId {
        self.subscribers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.id == id)
    }

    pub fn page_at(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.pages.iter().position(|p| p.id == id)
    }

    /// Always present: the repository never drops its last page
    pub fn first(&self) -> &Page {
        &self.pages[0]
    }

    pub fn last(&self) -> &Page {
        &self.pages[self.pages.len() - 1]
    }

    /// Page currently holding `shot_id`
    pub fn page_of_shot(&self, shot_id: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.shot_ids.iter().any(|s| s == shot_id))
    }

    /// Append an empty page cloning the first page's grid and aspect tag
    pub fn create_page(&mut self, name: Option<&str>) -> PageId {
        let id = self.ids.page_id();
        let name = match name {
            Some(name) => name.to_string(),
            None => self.lowest_unused_name(),
        };
        let template = self.first();
        let page = Page {
            id: id.clone(),
            name,
            shot_ids: Vec::new(),
            grid: template.grid,
            aspect_ratio: template.aspect_ratio.clone(),
        };
        self.pages.push(page);

        debug!(page_id = %id, pages = self.pages.len(), "Created page");
        self.subscribers.emit(&PageEvent::Created(id.clone()));
        id
    }

    /// Remove a page. The only page cannot be deleted.
    pub fn delete_page(&mut self, id: &str) -> bool {
        if self.pages.len() <= 1 {
            debug!(page_id = %id, "Refusing to delete the only page");
            return false;
        }
        let Some(index) = self.index_of(id) else {
            return false;
        };
        self.pages.remove(index);
        self.subscribers.emit(&PageEvent::Deleted(id.to_string()));
        self.reindex_names();
        true
    }

    /// Drop every page from `index` on, keeping at least one page.
    /// Returns the removed page ids.
    pub fn truncate(&mut self, index: usize) -> Vec<PageId> {
        let index = index.max(1);
        if index >= self.pages.len() {
            return Vec::new();
        }
        let removed: Vec<PageId> = self.pages.drain(index..).map(|p| p.id).collect();
        for id in &removed {
            self.subscribers.emit(&PageEvent::Deleted(id.clone()));
        }
        self.reindex_names();
        removed
    }

    pub fn rename_page(&mut self, id: &str, name: &str) -> bool {
        let Some(page) = self.pages.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        page.name = name.to_string();
        self.subscribers.emit(&PageEvent::Renamed(id.to_string()));
        true
    }

    /// Copy a page (its id list only) and insert it after the source
    pub fn duplicate_page(&mut self, id: &str) -> Option<PageId> {
        let index = self.index_of(id)?;
        let new_id = self.ids.page_id();
        let mut copy = self.pages[index].clone();
        copy.id = new_id.clone();
        copy.name = format!("{} copy", copy.name);
        self.pages.insert(index + 1, copy);

        self.subscribers.emit(&PageEvent::Created(new_id.clone()));
        self.reindex_names();
        Some(new_id)
    }

    pub fn update_grid_size(&mut self, id: &str, grid: GridSize) -> bool {
        let Some(page) = self.pages.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        if page.grid == grid {
            return true;
        }
        page.grid = grid;
        self.subscribers.emit(&PageEvent::GridChanged(id.to_string()));
        true
    }

    pub fn update_aspect_ratio(&mut self, id: &str, tag: &str) -> bool {
        let Some(page) = self.pages.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        page.aspect_ratio = tag.to_string();
        self.subscribers.emit(&PageEvent::AspectChanged(id.to_string()));
        true
    }

    /// Insert a shot id into a page slice (`None` appends)
    pub fn add_shot_to_page(&mut self, page_id: &str, shot_id: &str, index: Option<usize>) -> bool {
        let Some(page) = self.pages.iter_mut().find(|p| p.id == page_id) else {
            return false;
        };
        let index = index.unwrap_or(page.shot_ids.len()).min(page.shot_ids.len());
        page.shot_ids.insert(index, shot_id.to_string());
        self.subscribers.emit(&PageEvent::SliceChanged(page_id.to_string()));
        true
    }

    pub fn remove_shot_from_page(&mut self, page_id: &str, shot_id: &str) -> bool {
        let Some(page) = self.pages.iter_mut().find(|p| p.id == page_id) else {
            return false;
        };
        let before = page.shot_ids.len();
        page.shot_ids.retain(|s| s != shot_id);
        if page.shot_ids.len() == before {
            return false;
        }
        self.subscribers.emit(&PageEvent::SliceChanged(page_id.to_string()));
        true
    }

    pub fn reorder_shots_in_page(&mut self, page_id: &str, from: usize, to: usize) -> bool {
        let Some(page) = self.pages.iter_mut().find(|p| p.id == page_id) else {
            return false;
        };
        if from >= page.shot_ids.len() {
            return false;
        }
        let shot = page.shot_ids.remove(from);
        let to = to.min(page.shot_ids.len());
        page.shot_ids.insert(to, shot);
        self.subscribers.emit(&PageEvent::SliceChanged(page_id.to_string()));
        true
    }

    /// Overwrite the slice of the page at `index`. Returns true if it changed.
    pub fn set_slice(&mut self, index: usize, shot_ids: &[ShotId]) -> bool {
        let Some(page) = self.pages.get_mut(index) else {
            return false;
        };
        if page.shot_ids.as_slice() == shot_ids {
            return false;
        }
        page.shot_ids = shot_ids.to_vec();
        let id = page.id.clone();
        self.subscribers.emit(&PageEvent::SliceChanged(id));
        true
    }

    /// Mutable slice access for the incremental overflow path
    pub(crate) fn slice_mut(&mut self, index: usize) -> Option<&mut Vec<ShotId>> {
        self.pages.get_mut(index).map(|p| &mut p.shot_ids)
    }

    pub(crate) fn notify_slice_changed(&mut self, index: usize) {
        if let Some(page) = self.pages.get(index) {
            let id = page.id.clone();
            self.subscribers.emit(&PageEvent::SliceChanged(id));
        }
    }

    /// Bulk replace used by persistence. An empty list is replaced by one
    /// empty page built from `fallback_grid`.
    pub fn replace_all(&mut self, pages: Vec<Page>, fallback_grid: GridSize, fallback_aspect: &str) {
        for page in &pages {
            self.ids.observe(&page.id);
        }
        self.pages = pages;
        if self.pages.is_empty() {
            let id = self.ids.page_id();
            self.pages.push(Page {
                id,
                name: format!("{}1", DEFAULT_NAME_PREFIX),
                shot_ids: Vec::new(),
                grid: fallback_grid,
                aspect_ratio: fallback_aspect.to_string(),
            });
        }
        self.subscribers.emit(&PageEvent::Replaced);
    }

    fn lowest_unused_name(&self) -> String {
        let mut n = 1;
        loop {
            let candidate = format!("{}{}", DEFAULT_NAME_PREFIX, n);
            if !self.pages.iter().any(|p| p.name == candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Default-named pages take their 1-based position; custom names stay
    fn reindex_names(&mut self) {
        for (i, page) in self.pages.iter_mut().enumerate() {
            if !is_default_name(&page.name) {
                continue;
            }
            let name = format!("{}{}", DEFAULT_NAME_PREFIX, i + 1);
            if page.name != name {
                page.name = name;
                self.subscribers.emit(&PageEvent::Renamed(page.id.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> PageRepository {
        PageRepository::new(IdGenerator::from_seed("t".to_string()), GridSize::new(2, 4), "16:9")
    }

    fn names(repo: &PageRepository) -> Vec<&str> {
        repo.pages().iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_starts_with_one_page() {
        let repo = repo();
        assert_eq!(repo.len(), 1);
        assert_eq!(repo.first().name, "Page 1");
        assert_eq!(repo.first().capacity(), 8);
    }

    #[test]
    fn test_create_page_clones_first_page_template() {
        let mut repo = repo();
        let first = repo.first().id.clone();
        repo.update_grid_size(&first, GridSize::new(3, 3));
        repo.update_aspect_ratio(&first, "4:3");

        let id = repo.create_page(None);
        let page = repo.get(&id).unwrap();
        assert_eq!(page.name, "Page 2");
        assert_eq!(page.grid, GridSize::new(3, 3));
        assert_eq!(page.aspect_ratio, "4:3");
    }

    #[test]
    fn test_default_name_uses_lowest_unused_number() {
        let mut repo = repo();
        let first = repo.first().id.clone();
        repo.rename_page(&first, "Opening");

        repo.create_page(None);
        assert_eq!(names(&repo), vec!["Opening", "Page 1"]);
    }

    #[test]
    fn test_delete_keeps_last_page_and_reindexes() {
        let mut repo = repo();
        let p2 = repo.create_page(None);
        let p3 = repo.create_page(Some("Finale"));
        let p4 = repo.create_page(None);

        assert!(repo.delete_page(&p2));
        assert_eq!(names(&repo), vec!["Page 1", "Finale", "Page 3"]);
        assert_eq!(repo.get(&p4).unwrap().name, "Page 3");

        repo.delete_page(&p3);
        repo.delete_page(&p4);
        let only = repo.first().id.clone();
        assert!(!repo.delete_page(&only));
        assert_eq!(repo.len(), 1);
        assert!(!repo.delete_page("missing"));
    }

    #[test]
    fn test_duplicate_page_copies_ids_only() {
        let mut repo = repo();
        let first = repo.first().id.clone();
        repo.add_shot_to_page(&first, "s1", None);
        repo.add_shot_to_page(&first, "s2", None);

        let copy = repo.duplicate_page(&first).unwrap();
        assert_eq!(repo.index_of(&copy), Some(1));
        assert_eq!(repo.get(&copy).unwrap().shot_ids, vec!["s1", "s2"]);
        assert_eq!(repo.get(&copy).unwrap().name, "Page 1 copy");
    }

    #[test]
    fn test_slice_mutators_do_not_enforce_capacity() {
        let mut repo = repo();
        let first = repo.first().id.clone();
        for i in 0..10 {
            repo.add_shot_to_page(&first, &format!("s{}", i), None);
        }
        assert_eq!(repo.first().shot_ids.len(), 10);

        assert!(repo.reorder_shots_in_page(&first, 0, 9));
        assert_eq!(repo.first().shot_ids.last().map(String::as_str), Some("s0"));
        assert!(repo.remove_shot_from_page(&first, "s0"));
        assert!(!repo.remove_shot_from_page(&first, "s0"));
    }

    #[test]
    fn test_truncate_never_drops_first_page() {
        let mut repo = repo();
        let p2 = repo.create_page(None);
        repo.create_page(None);

        let removed = repo.truncate(0);
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0], p2);
        assert_eq!(repo.len(), 1);
    }
}
