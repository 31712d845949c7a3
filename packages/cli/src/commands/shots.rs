use crate::commands::{resolve_page, resolve_shot, Context};
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use storyboard_editor::{Project, ShotContent};

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Number of shots to add
    #[arg(short, long, default_value_t = 1)]
    pub count: usize,

    /// Description for the new shots
    #[arg(short, long, default_value = "")]
    pub description: String,

    /// Insert at this global position instead of appending
    #[arg(long)]
    pub at: Option<usize>,
}

#[derive(Debug, Args)]
pub struct SubArgs {
    /// Parent shot (id or number)
    pub parent: String,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Shots to delete (ids or numbers)
    pub shots: Vec<String>,

    /// Delete a whole page and its shots (id or 1-based position)
    #[arg(long, conflicts_with = "shots")]
    pub page: Option<String>,
}

#[derive(Debug, Args)]
pub struct MoveArgs {
    /// Shot to move (id or number)
    pub shot: String,

    /// Target slot in the ordering as it is before the move
    pub index: usize,

    /// Move the shot's whole sub-shot group
    #[arg(short, long)]
    pub group: bool,
}

pub fn add(args: AddArgs, ctx: &Context) -> Result<()> {
    let mut project = ctx.open()?;
    let content = ShotContent {
        description: args.description.clone(),
        ..ShotContent::default()
    };

    let created = project.batch(|p| {
        (0..args.count)
            .map(|i| match args.at {
                Some(at) => p.insert_shot(at + i, content.clone()),
                None => p.create_shot(content.clone()),
            })
            .collect::<Result<Vec<_>, _>>()
    })?;
    project.save()?;

    for id in &created {
        print_shot(&project, id);
    }
    summary(&project);
    Ok(())
}

pub fn sub(args: SubArgs, ctx: &Context) -> Result<()> {
    let mut project = ctx.open()?;
    let parent = resolve_shot(&project, &args.parent)?;

    let id = project
        .create_sub_shot(&parent)?
        .ok_or_else(|| anyhow!("Shot '{}' disappeared", args.parent))?;
    project.save()?;

    print_shot(&project, &id);
    Ok(())
}

pub fn delete(args: DeleteArgs, ctx: &Context) -> Result<()> {
    let mut project = ctx.open()?;

    if let Some(page) = &args.page {
        let page = resolve_page(&project, page)?;
        let count = project.total_shots(&page).unwrap_or(0);
        project.delete_page(&page)?;
        println!("{} Deleted page with {} shots", "✓".green(), count);
    } else {
        if args.shots.is_empty() {
            return Err(anyhow!("Nothing to delete: pass shot ids/numbers or --page"));
        }
        // Resolve every reference before numbers shift
        let ids = args
            .shots
            .iter()
            .map(|r| resolve_shot(&project, r))
            .collect::<Result<Vec<_>>>()?;
        project.batch(|p| {
            for id in &ids {
                p.delete_shot(id)?;
            }
            Ok(())
        })?;
        println!("{} Deleted {} shots", "✓".green(), ids.len());
    }

    project.save()?;
    summary(&project);
    Ok(())
}

pub fn move_shot(args: MoveArgs, ctx: &Context) -> Result<()> {
    let mut project = ctx.open()?;
    let id = resolve_shot(&project, &args.shot)?;

    let moved = if args.group {
        let group = project
            .group_of(&id)
            .ok_or_else(|| anyhow!("Shot '{}' is not in a sub-shot group", args.shot))?;
        project.move_shot_group(&group, args.index)?
    } else {
        project.move_shot(&id, args.index)?
    };
    project.flush_renumber();

    if moved {
        project.save()?;
        print_shot(&project, &id);
    } else {
        println!("Shot '{}' is already there", args.shot);
    }
    Ok(())
}

pub(crate) fn print_shot(project: &Project, id: &str) {
    let Some(shot) = project.shot(id) else {
        return;
    };
    let page = project
        .pages()
        .page_of_shot(id)
        .map(|p| p.name.as_str())
        .unwrap_or("-");
    println!(
        "  {} {:<6} {} {}",
        "✓".green(),
        shot.number.bright_white().bold(),
        page.dimmed(),
        shot.id.dimmed()
    );
}

fn summary(project: &Project) {
    println!(
        "   {} shots on {} pages",
        project.shot_count(),
        project.pages().len()
    );
}
