use crate::commands::{resolve_page, Context};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use storyboard_editor::ExportPage;

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Only show one page (id or 1-based position)
    #[arg(long)]
    pub page: Option<String>,

    /// Print the export snapshot as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn show(args: ShowArgs, ctx: &Context) -> Result<()> {
    let mut project = ctx.open()?;
    let only = args
        .page
        .as_deref()
        .map(|page| resolve_page(&project, page))
        .transpose()?;

    let mut snapshot = project.snapshot_for_export()?;
    if let Some(only) = &only {
        snapshot.pages.retain(|p| &p.id == only);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!(
        "{} {} ({} shots, format {})",
        "🎬".bright_blue(),
        snapshot.name.bold(),
        snapshot.shot_count,
        snapshot.number_format
    );
    for page in &snapshot.pages {
        print_page(page);
    }
    Ok(())
}

fn print_page(page: &ExportPage) {
    println!();
    println!(
        "{} {}  {}x{} {}",
        page.name.bright_white().bold(),
        format!("[{}/{}]", page.shots.len(), page.grid.rows * page.grid.cols).dimmed(),
        page.grid.rows,
        page.grid.cols,
        page.aspect_ratio.dimmed()
    );
    if page.shots.is_empty() {
        println!("   {}", "(empty)".dimmed());
    }
    for (slot, shot) in page.shots.iter().enumerate() {
        let description = if shot.content.description.is_empty() {
            "-"
        } else {
            shot.content.description.as_str()
        };
        let grouped = if shot.sub_shot_group_id.is_some() { "↳" } else { " " };
        println!(
            "   {:>4} {} {:<6} {}",
            page.offset + slot + 1,
            grouped,
            shot.number,
            description
        );
    }
}
