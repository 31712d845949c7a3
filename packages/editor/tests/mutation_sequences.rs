//! Long mutation sequences applied through `Project::apply`
//!
//! This tests:
//! - JSON mutation scripts
//! - Mixed create / group / move / delete chains
//! - Page-level operations interleaved with shot edits
//! - Project integrity after every step

use std::collections::HashSet;

use storyboard_editor::{
    compute_numbers, detect_drift, GridSize, Mutation, Project, ProjectSettings, ShotContent,
    ShotId,
};

fn check(project: &mut Project, step: usize) {
    project.flush_renumber();
    let order = project.shots().order().to_vec();

    let unique: HashSet<&ShotId> = order.iter().collect();
    assert_eq!(unique.len(), order.len(), "step {}: duplicate ids", step);

    let drift = detect_drift(&order, project.pages());
    assert!(drift.is_consistent(), "step {}: {:?}", step, drift);

    let mut seen_groups = HashSet::new();
    let mut previous = None;
    for id in &order {
        let group = project.group_of(id);
        if let Some(g) = &group {
            if previous.as_ref() != Some(g) {
                assert!(seen_groups.insert(g.clone()), "step {}: split group {}", step, g);
                assert!(project.shots().group_members(g).len() >= 2, "step {}: singleton {}", step, g);
            }
        }
        previous = group;
    }

    let shots = project.shots();
    let expected = compute_numbers(&order, |id| shots.group_of(id).map(String::as_str), project.number_format());
    for (id, number) in expected {
        assert_eq!(shots.get(&id).map(|s| s.number.as_str()), Some(number.as_str()), "step {}", step);
    }
}

/// Small deterministic generator so failures reproduce
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: usize) -> usize {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 33) as usize) % bound.max(1)
    }
}

fn pick(project: &Project, rng: &mut Lcg) -> Option<ShotId> {
    let order = project.shots().order();
    if order.is_empty() {
        return None;
    }
    Some(order[rng.next(order.len())].clone())
}

#[test]
fn test_json_script() {
    let script = r#"[
        { "CreateShot": { "content": { "description": "Wide" } } },
        { "CreateShot": { "content": { "description": "Close" } } },
        { "CreateShot": {} },
        { "SetNumberFormat": { "format": "SH-100" } }
    ]"#;
    let mutations: Vec<Mutation> = serde_json::from_str(script).unwrap();

    let mut project = Project::new("script", ProjectSettings::default());
    for (step, mutation) in mutations.into_iter().enumerate() {
        project.apply(mutation).unwrap();
        check(&mut project, step);
    }

    let numbers: Vec<&str> = project.shots().iter_ordered().map(|s| s.number.as_str()).collect();
    assert_eq!(numbers, vec!["SH-001", "SH-002", "SH-003"]);
    assert_eq!(project.shots().iter_ordered().next().unwrap().content.description, "Wide");
}

#[test]
fn test_group_chain() {
    let mut project = Project::new("chain", ProjectSettings::default());
    let a = project.create_shot(ShotContent::default()).unwrap();
    let b = project.create_shot(ShotContent::default()).unwrap();
    let c = project.create_shot(ShotContent::default()).unwrap();

    // a, a1, a2, b, c
    let a1 = project.create_sub_shot(&a).unwrap().unwrap();
    let a2 = project.create_sub_shot(&a1).unwrap().unwrap();
    let group = project.group_of(&a).unwrap();
    check(&mut project, 0);

    // Pull the middle member out: two singleton runs dissolve
    project.remove_from_sub_group(&a1).unwrap();
    check(&mut project, 1);
    assert_eq!(project.group_of(&a), None);
    assert_eq!(project.group_of(&a2), None);

    // Rebuild a group from b and c
    let b1 = project.create_sub_shot(&b).unwrap().unwrap();
    let joined = project.group_of(&b).unwrap();
    project.insert_into_sub_group(&c, &joined, project.global_shot_index(&b1).unwrap() + 1).unwrap();
    check(&mut project, 2);
    assert_eq!(project.shots().group_members(&joined), vec![b.clone(), b1, c.clone()]);
    assert!(project.shots().group_members(&group).is_empty());

    // Moving a member out of the middle splits the group
    project.move_shot(&c, 0).unwrap();
    project.move_shot(&b, 0).unwrap();
    check(&mut project, 3);
    assert_eq!(project.group_of(&b), None);
    assert_eq!(project.group_of(&c), None);
}

#[test]
fn test_insert_into_group_across_another_group() {
    let mut project = Project::new("join", ProjectSettings::default());
    let a = project.create_shot(ShotContent::default()).unwrap();
    let y = project.create_shot(ShotContent::default()).unwrap();
    let s = project.create_shot(ShotContent::default()).unwrap();
    let a1 = project.create_sub_shot(&a).unwrap().unwrap();
    let y1 = project.create_sub_shot(&y).unwrap().unwrap();
    project.create_sub_shot(&y1).unwrap();
    check(&mut project, 0);

    // Slot 3 falls between y and y1
    let group_id = project.group_of(&a).unwrap();
    project
        .apply(Mutation::InsertIntoSubGroup {
            shot_id: s.clone(),
            group_id: group_id.clone(),
            position: 3,
        })
        .unwrap();
    check(&mut project, 1);

    assert_eq!(project.shots().group_members(&group_id), vec![a, a1, s]);
    let numbers: Vec<&str> = project.shots().iter_ordered().map(|s| s.number.as_str()).collect();
    assert_eq!(numbers, vec!["01a", "01b", "01c", "02a", "02b", "02c"]);
    assert!(!project.reconcile().unwrap().changed());
}

#[test]
fn test_duplicate_page_with_group_on_the_boundary() {
    let settings = ProjectSettings {
        default_grid: GridSize::new(1, 2),
        ..ProjectSettings::default()
    };
    let mut project = Project::new("boundary", settings);
    project.create_shot(ShotContent::default()).unwrap();
    let b = project.create_shot(ShotContent::default()).unwrap();
    project.create_sub_shot(&b).unwrap();
    check(&mut project, 0);

    for step in 1..=3 {
        let page_id = project.pages().first().id.clone();
        project.apply(Mutation::DuplicatePage { page_id }).unwrap();
        check(&mut project, step);
    }
    assert!(!project.reconcile().unwrap().changed());
}

#[test]
fn test_random_sequences_keep_invariants() {
    for seed in 1..=8u64 {
        let settings = ProjectSettings {
            default_grid: GridSize::new(2, 2),
            ..ProjectSettings::default()
        };
        let mut project = Project::new(&format!("seed-{}", seed), settings);
        let mut rng = Lcg(seed);

        for step in 0..200 {
            let mutation = match rng.next(13) {
                0..=2 => Mutation::CreateShot {
                    content: ShotContent::default(),
                },
                3 => Mutation::InsertShot {
                    index: rng.next(project.shot_count() + 1),
                    content: ShotContent::default(),
                },
                4 => match pick(&project, &mut rng) {
                    Some(shot_id) => Mutation::DeleteShot { shot_id },
                    None => continue,
                },
                5 => match pick(&project, &mut rng) {
                    Some(parent_id) => Mutation::CreateSubShot { parent_id },
                    None => continue,
                },
                6 => match pick(&project, &mut rng) {
                    Some(shot_id) => Mutation::MoveShot {
                        shot_id,
                        target_index: rng.next(project.shot_count() + 1),
                    },
                    None => continue,
                },
                7 => match pick(&project, &mut rng).and_then(|id| project.group_of(&id)) {
                    Some(group_id) => Mutation::MoveShotGroup {
                        group_id,
                        target_index: rng.next(project.shot_count() + 1),
                    },
                    None => continue,
                },
                8 => match pick(&project, &mut rng) {
                    Some(shot_id) => Mutation::RemoveFromSubGroup { shot_id },
                    None => continue,
                },
                9 => {
                    let index = rng.next(project.pages().len());
                    let page_id = project.pages().page_at(index).unwrap().id.clone();
                    if rng.next(3) == 0 {
                        Mutation::DeletePage { page_id }
                    } else {
                        Mutation::DuplicatePage { page_id }
                    }
                }
                10 => Mutation::UpdateGridSize {
                    page_id: project.pages().first().id.clone(),
                    rows: 1 + rng.next(3) as u32,
                    cols: 1 + rng.next(3) as u32,
                },
                11 => {
                    let target = pick(&project, &mut rng).and_then(|id| project.group_of(&id));
                    match (pick(&project, &mut rng), target) {
                        (Some(shot_id), Some(group_id)) => Mutation::InsertIntoSubGroup {
                            shot_id,
                            group_id,
                            position: rng.next(project.shot_count() + 1),
                        },
                        _ => continue,
                    }
                }
                _ => {
                    let mut order = project.shots().order().to_vec();
                    order.reverse();
                    Mutation::SetShotOrder { order }
                }
            };

            project.apply(mutation).unwrap();
            check(&mut project, step);
        }

        let outcome = project.reconcile().unwrap();
        assert!(!outcome.changed(), "seed {}: reconcile changed a settled project", seed);
    }
}
