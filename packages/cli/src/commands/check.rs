use crate::commands::Context;
use anyhow::{anyhow, Context as _, Result};
use clap::Args;
use colored::Colorize;
use storyboard_editor::read_project;

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Save the repaired project
    #[arg(long)]
    pub fix: bool,
}

/// Load the project through the reconciliation guard and report what it had
/// to repair
pub fn check(args: CheckArgs, ctx: &Context) -> Result<()> {
    let path = ctx.project_path();
    if !path.exists() {
        return Err(anyhow!("No project at {}", path.display()));
    }
    println!("🔍 {} {}", "Checking".green().bold(), path.display());

    let (mut project, outcome) =
        read_project(&path).with_context(|| format!("Failed to read {}", path.display()))?;

    if !outcome.changed() {
        println!("   {} Pages, ordering and numbers are consistent", "✓".green());
        println!(
            "   {} shots on {} pages",
            project.shot_count(),
            project.pages().len()
        );
        return Ok(());
    }

    println!("   {} Project needed repair", "⚠️".yellow());
    let drift = &outcome.drift;
    if !drift.missing_from_pages.is_empty() {
        println!("     missing from pages: {}", drift.missing_from_pages.join(", "));
    }
    if !drift.unknown_on_pages.is_empty() {
        println!("     unknown on pages:   {}", drift.unknown_on_pages.join(", "));
    }
    if !drift.duplicates_on_pages.is_empty() {
        println!("     duplicated:         {}", drift.duplicates_on_pages.join(", "));
    }
    if drift.out_of_order {
        println!("     pages out of order");
    }
    if !drift.misplaced_pages.is_empty() {
        println!("     misplaced pages:    {}", drift.misplaced_pages.join(", "));
    }
    if outcome.groups_healed {
        println!("     sub-shot groups healed");
    }
    if outcome.renumbered > 0 {
        println!("     {} shots renumbered", outcome.renumbered);
    }

    if args.fix {
        project.save_as(&path)?;
        println!("   {} Saved repaired project", "✓".green());
    } else {
        println!("   Run with --fix to save the repair");
    }
    Ok(())
}
