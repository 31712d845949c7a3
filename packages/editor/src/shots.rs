//! # Shot Repository
//!
//! Owns shot entities and the canonical ordering (`order`). A shot's position
//! is never stored on the shot; it is its index in `order`.
//!
//! ## Grouping
//!
//! Shots sharing a `sub_shot_group_id` form a sub-shot group. Every operation
//! that can disturb adjacency finishes by healing the affected groups:
//!
//! - a run of one member has its group cleared (dissolved)
//! - a second run of the same group gets a fresh group id
//!
//! so a group id is always carried by at least two contiguous shots.
//!
//! Lookups by unknown id are silent no-ops. UI layers race deletions against
//! in-flight edits and must not see errors for it.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ids::{GroupId, IdGenerator, ShotId};
use crate::subscribers::{SubscriptionId, Subscribers};

/// Opaque shot content. Never interpreted by the core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShotContent {
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub dialogue: String,

    #[serde(default)]
    pub notes: String,

    /// Reference into external image storage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shot {
    pub id: ShotId,

    /// Display number, derived by the numbering engine
    #[serde(default)]
    pub number: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_shot_group_id: Option<GroupId>,

    #[serde(flatten)]
    pub content: ShotContent,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Shot {
    fn new(id: ShotId, content: ShotContent, group: Option<GroupId>) -> Self {
        let now = Utc::now();
        Self {
            id,
            number: String::new(),
            sub_shot_group_id: group,
            content,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial content update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShotPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialogue: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,

    #[serde(default)]
    pub clear_image_ref: bool,
}

impl ShotPatch {
    fn merge_into(&self, content: &mut ShotContent) {
        if let Some(description) = &self.description {
            content.description = description.clone();
        }
        if let Some(dialogue) = &self.dialogue {
            content.dialogue = dialogue.clone();
        }
        if let Some(notes) = &self.notes {
            content.notes = notes.clone();
        }
        if self.clear_image_ref {
            content.image_ref = None;
        }
        if let Some(image_ref) = &self.image_ref {
            content.image_ref = Some(image_ref.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShotEvent {
    Created(ShotId),
    Updated(ShotId),
    Deleted(ShotId),
    OrderChanged,
    GroupDissolved { group: GroupId, survivor: ShotId },
    GroupSplit { group: GroupId, new_group: GroupId },
    Renumbered { count: usize },
    Replaced,
}

#[derive(Debug)]
pub struct ShotRepository {
    shots: HashMap<ShotId, Shot>,
    order: Vec<ShotId>,
    ids: IdGenerator,
    subscribers: Subscribers<ShotEvent>,
}

impl ShotRepository {
    pub fn new(ids: IdGenerator) -> Self {
        Self {
            shots: HashMap::new(),
            order: Vec::new(),
            ids,
            subscribers: Subscribers::new(),
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&ShotEvent) + 'static) -> SubscriptionId {
        self.subscribers.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub fn get(&self, id: &str) -> Option<&Shot> {
        self.shots.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.shots.contains_key(id)
    }

    /// Canonical ordering
    pub fn order(&self) -> &[ShotId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.order.iter().position(|s| s == id)
    }

    pub fn group_of(&self, id: &str) -> Option<&GroupId> {
        self.shots.get(id).and_then(|s| s.sub_shot_group_id.as_ref())
    }

    /// Members of a group in canonical order
    pub fn group_members(&self, group: &str) -> Vec<ShotId> {
        self.order
            .iter()
            .filter(|id| self.group_of(id).map(|g| g == group).unwrap_or(false))
            .cloned()
            .collect()
    }

    /// Shots in canonical order
    pub fn iter_ordered(&self) -> impl Iterator<Item = &Shot> {
        self.order.iter().filter_map(|id| self.shots.get(id))
    }

    /// Every stored shot, in no particular order
    pub fn all(&self) -> impl Iterator<Item = &Shot> {
        self.shots.values()
    }

    pub fn create_shot(&mut self, content: ShotContent) -> ShotId {
        let id = self.ids.shot_id();
        self.shots.insert(id.clone(), Shot::new(id.clone(), content, None));
        self.order.push(id.clone());

        debug!(shot_id = %id, position = self.order.len() - 1, "Created shot");
        self.subscribers.emit(&ShotEvent::Created(id.clone()));
        id
    }

    /// Create a shot at `index` in the ordering (clamped to the end)
    pub fn insert_shot(&mut self, index: usize, content: ShotContent) -> ShotId {
        let id = self.ids.shot_id();
        let index = index.min(self.order.len());
        self.shots.insert(id.clone(), Shot::new(id.clone(), content, None));
        self.order.insert(index, id.clone());

        // Landing inside a group makes the new shot a member of it
        self.adopt_surrounding_group(index);

        debug!(shot_id = %id, position = index, "Inserted shot");
        self.subscribers.emit(&ShotEvent::Created(id.clone()));
        id
    }

    /// Remove a shot; returns false for unknown ids
    pub fn delete_shot(&mut self, id: &str) -> bool {
        let Some(shot) = self.shots.remove(id) else {
            debug!(shot_id = %id, "Ignoring delete of unknown shot");
            return false;
        };
        self.order.retain(|s| s != id);
        self.subscribers.emit(&ShotEvent::Deleted(id.to_string()));

        if let Some(group) = shot.sub_shot_group_id {
            self.heal_groups_matching(|g| g == group.as_str());
        }
        true
    }

    pub fn update_shot(&mut self, id: &str, patch: &ShotPatch) -> bool {
        let Some(shot) = self.shots.get_mut(id) else {
            debug!(shot_id = %id, "Ignoring update of unknown shot");
            return false;
        };
        patch.merge_into(&mut shot.content);
        shot.updated_at = Utc::now();

        self.subscribers.emit(&ShotEvent::Updated(id.to_string()));
        true
    }

    /// Create a sub-shot right after `parent_id`, sharing (or founding) its group
    pub fn create_sub_shot(&mut self, parent_id: &str) -> Option<ShotId> {
        let parent_index = self.index_of(parent_id)?;

        let group = match self.group_of(parent_id) {
            Some(group) => group.clone(),
            None => {
                let group = self.ids.group_id();
                if let Some(parent) = self.shots.get_mut(parent_id) {
                    parent.sub_shot_group_id = Some(group.clone());
                    parent.updated_at = Utc::now();
                }
                group
            }
        };

        let id = self.ids.shot_id();
        self.shots.insert(
            id.clone(),
            Shot::new(id.clone(), ShotContent::default(), Some(group.clone())),
        );
        self.order.insert(parent_index + 1, id.clone());

        debug!(shot_id = %id, parent_id = %parent_id, group = %group, "Created sub-shot");
        self.subscribers.emit(&ShotEvent::Created(id.clone()));
        Some(id)
    }

    pub fn remove_from_sub_group(&mut self, id: &str) -> bool {
        let Some(group) = self.group_of(id).cloned() else {
            return false;
        };
        if let Some(shot) = self.shots.get_mut(id) {
            shot.sub_shot_group_id = None;
            shot.updated_at = Utc::now();
        }
        self.subscribers.emit(&ShotEvent::Updated(id.to_string()));

        // Pulling a middle member out leaves two runs behind
        self.heal_groups_matching(|g| g == group.as_str());
        true
    }

    /// Detach `id` from its group, join `target_group` and relocate to
    /// `position` (a pre-removal insertion slot, like `move_shot`).
    ///
    /// The slot is clamped to the edges of the target group's run, so the
    /// shot always lands next to its new group and never inside another one.
    /// A group with no other live member cannot be joined.
    pub fn insert_into_sub_group(&mut self, id: &str, target_group: &str, position: usize) -> bool {
        let Some(from) = self.index_of(id) else {
            return false;
        };
        let old_group = self.group_of(id).cloned();

        let moved = self.order.remove(from);
        let run: Vec<usize> = self
            .order
            .iter()
            .enumerate()
            .filter(|(_, s)| self.group_of(s).map(|g| g == target_group).unwrap_or(false))
            .map(|(i, _)| i)
            .collect();
        let (Some(&first), Some(&last)) = (run.first(), run.last()) else {
            self.order.insert(from, moved);
            debug!(shot_id = %id, group = %target_group, "Ignoring insert into empty group");
            return false;
        };

        let requested = if from < position { position - 1 } else { position };
        let insert_at = requested.clamp(first, last + 1);
        self.order.insert(insert_at, moved);

        if let Some(shot) = self.shots.get_mut(id) {
            shot.sub_shot_group_id = Some(target_group.to_string());
            shot.updated_at = Utc::now();
        }

        self.subscribers.emit(&ShotEvent::Updated(id.to_string()));
        self.subscribers.emit(&ShotEvent::OrderChanged);
        self.heal_groups_matching(|g| g == target_group || Some(g) == old_group.as_deref());
        true
    }

    /// Replace the ordering wholesale
    ///
    /// Unknown and duplicate ids are dropped and live shots missing from
    /// `new_order` are appended, so every live shot appears exactly once.
    pub fn set_shot_order(&mut self, new_order: Vec<ShotId>) {
        let mut seen = HashSet::with_capacity(new_order.len());
        let mut order: Vec<ShotId> = new_order
            .into_iter()
            .filter(|id| self.shots.contains_key(id) && seen.insert(id.clone()))
            .collect();

        let missing: Vec<ShotId> = self
            .order
            .iter()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();
        if !missing.is_empty() {
            debug!(count = missing.len(), "Appending shots missing from new order");
            order.extend(missing);
        }

        self.order = order;
        self.subscribers.emit(&ShotEvent::OrderChanged);
        self.heal_groups_matching(|_| true);
    }

    /// Move one shot to the pre-removal insertion slot `target_index`
    pub fn move_shot(&mut self, id: &str, target_index: usize) -> bool {
        if !self.shots.contains_key(id) {
            return false;
        }
        let old_group = self.group_of(id).cloned();
        let Some(new_index) = self.relocate(id, target_index) else {
            return false;
        };

        // Dropped between two members of a group: join it
        let adopted = self.adopt_surrounding_group(new_index);

        self.subscribers.emit(&ShotEvent::OrderChanged);
        if old_group.is_some() || adopted.is_some() {
            self.heal_groups_matching(|g| {
                Some(g) == old_group.as_deref() || Some(g) == adopted.as_deref()
            });
        }
        true
    }

    /// Move every member of `group` as one contiguous block
    pub fn move_shot_group(&mut self, group: &str, target_index: usize) -> bool {
        let positions: Vec<usize> = self
            .order
            .iter()
            .enumerate()
            .filter(|(_, id)| self.group_of(id).map(|g| g == group).unwrap_or(false))
            .map(|(i, _)| i)
            .collect();
        if positions.is_empty() {
            debug!(group = %group, "Ignoring move of unknown group");
            return false;
        }

        let shift = positions.iter().filter(|&&p| p < target_index).count();
        let members: Vec<ShotId> = positions.iter().map(|&p| self.order[p].clone()).collect();
        let member_set: HashSet<&ShotId> = members.iter().collect();
        let mut remaining: Vec<ShotId> = self
            .order
            .iter()
            .filter(|id| !member_set.contains(id))
            .cloned()
            .collect();

        let mut insert_at = target_index.saturating_sub(shift).min(remaining.len());
        insert_at = self.snap_out_of_group(&remaining, insert_at);

        let tail = remaining.split_off(insert_at);
        remaining.extend(members);
        remaining.extend(tail);
        self.order = remaining;

        self.subscribers.emit(&ShotEvent::OrderChanged);
        true
    }

    /// Copy shots (content and grouping, with fresh ids) and insert the copies
    /// as one block at `insert_at`
    pub fn duplicate_shots(&mut self, source: &[ShotId], insert_at: usize) -> Vec<ShotId> {
        let mut group_map: HashMap<GroupId, GroupId> = HashMap::new();
        let mut copies = Vec::new();

        for id in source {
            let Some(original) = self.shots.get(id) else {
                continue;
            };
            let content = original.content.clone();
            let group = original.sub_shot_group_id.clone();

            let new_group = group.map(|g| {
                group_map
                    .entry(g)
                    .or_insert_with(|| self.ids.group_id())
                    .clone()
            });
            let new_id = self.ids.shot_id();
            self.shots
                .insert(new_id.clone(), Shot::new(new_id.clone(), content, new_group));
            copies.push(new_id);
        }

        // Copies never split a group running across `insert_at`
        let insert_at = self.snap_out_of_group(&self.order, insert_at.min(self.order.len()));
        let tail = self.order.split_off(insert_at);
        self.order.extend(copies.iter().cloned());
        self.order.extend(tail);

        for id in &copies {
            self.subscribers.emit(&ShotEvent::Created(id.clone()));
        }
        // Copies of a partially selected group may be singletons
        let fresh: HashSet<GroupId> = group_map.into_values().collect();
        self.heal_groups_matching(|g| fresh.contains(g));
        copies
    }

    /// Write display numbers computed by the numbering engine
    pub fn apply_numbers(&mut self, numbers: &[(ShotId, String)], now: DateTime<Utc>) -> usize {
        let mut count = 0;
        for (id, number) in numbers {
            if let Some(shot) = self.shots.get_mut(id) {
                shot.number = number.clone();
                shot.updated_at = now;
                count += 1;
            }
        }
        self.subscribers.emit(&ShotEvent::Renumbered { count });
        count
    }

    /// Bulk replace used by persistence. Ordering is sanitized like
    /// `set_shot_order`.
    pub fn replace_all(&mut self, shots: Vec<Shot>, order: Vec<ShotId>) {
        self.shots = shots
            .into_iter()
            .map(|shot| {
                self.ids.observe(&shot.id);
                if let Some(group) = &shot.sub_shot_group_id {
                    self.ids.observe(group);
                }
                (shot.id.clone(), shot)
            })
            .collect();

        let mut seen = HashSet::new();
        let mut sanitized: Vec<ShotId> = order
            .into_iter()
            .filter(|id| self.shots.contains_key(id) && seen.insert(id.clone()))
            .collect();

        let mut orphans: Vec<&Shot> = self.shots.values().filter(|s| !seen.contains(&s.id)).collect();
        if !orphans.is_empty() {
            orphans.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
            debug!(count = orphans.len(), "Appending shots absent from ordering");
            sanitized.extend(orphans.into_iter().map(|s| s.id.clone()));
        }

        self.order = sanitized;
        self.subscribers.emit(&ShotEvent::Replaced);
    }

    /// Enforce group contiguity and dissolve singleton groups everywhere.
    /// Returns true if anything changed.
    pub fn heal_groups(&mut self) -> bool {
        self.heal_groups_matching(|_| true)
    }

    fn heal_groups_matching(&mut self, affects: impl Fn(&str) -> bool) -> bool {
        // Maximal runs of equal group ids: (group, start, end_exclusive)
        let mut runs: Vec<(GroupId, usize, usize)> = Vec::new();
        for (i, id) in self.order.iter().enumerate() {
            let Some(group) = self.group_of(id) else {
                continue;
            };
            match runs.last_mut() {
                Some((g, _, end)) if g == group && *end == i => *end = i + 1,
                _ => runs.push((group.clone(), i, i + 1)),
            }
        }

        let mut kept: HashSet<GroupId> = HashSet::new();
        let mut changed = false;
        let now = Utc::now();

        for (group, start, end) in runs {
            if !affects(&group) {
                continue;
            }
            if end - start == 1 {
                let survivor = self.order[start].clone();
                if let Some(shot) = self.shots.get_mut(&survivor) {
                    shot.sub_shot_group_id = None;
                    shot.updated_at = now;
                }
                debug!(group = %group, shot_id = %survivor, "Dissolved single-member group");
                self.subscribers.emit(&ShotEvent::GroupDissolved { group, survivor });
                changed = true;
            } else if !kept.insert(group.clone()) {
                let new_group = self.ids.group_id();
                for id in &self.order[start..end] {
                    if let Some(shot) = self.shots.get_mut(id) {
                        shot.sub_shot_group_id = Some(new_group.clone());
                        shot.updated_at = now;
                    }
                }
                debug!(group = %group, new_group = %new_group, "Split non-contiguous group");
                self.subscribers.emit(&ShotEvent::GroupSplit { group, new_group });
                changed = true;
            }
        }

        changed
    }

    /// Remove `id` and reinsert it at the pre-removal slot `target_index`.
    /// Returns the shot's new index.
    fn relocate(&mut self, id: &str, target_index: usize) -> Option<usize> {
        let from = self.index_of(id)?;
        let moved = self.order.remove(from);
        let insert_at = if from < target_index {
            target_index - 1
        } else {
            target_index
        }
        .min(self.order.len());
        self.order.insert(insert_at, moved);
        Some(insert_at)
    }

    /// If the shot at `index` sits between two members of the same group,
    /// make it a member. Returns the adopted group.
    fn adopt_surrounding_group(&mut self, index: usize) -> Option<GroupId> {
        if index == 0 || index + 1 >= self.order.len() {
            return None;
        }
        let before = self.group_of(&self.order[index - 1]).cloned()?;
        let after = self.group_of(&self.order[index + 1]).cloned()?;
        if before != after {
            return None;
        }

        let id = self.order[index].clone();
        let shot = self.shots.get_mut(&id)?;
        if shot.sub_shot_group_id.as_ref() == Some(&before) {
            return None;
        }
        shot.sub_shot_group_id = Some(before.clone());
        shot.updated_at = Utc::now();
        Some(before)
    }

    /// Push an insertion index that would land inside a group run to the end
    /// of that run
    fn snap_out_of_group(&self, order: &[ShotId], mut index: usize) -> usize {
        while index > 0 && index < order.len() {
            let before = self.group_of(&order[index - 1]);
            let after = self.group_of(&order[index]);
            match (before, after) {
                (Some(b), Some(a)) if a == b => index += 1,
                _ => break,
            }
        }
        index
    }
}
