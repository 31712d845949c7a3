use crate::commands::Context;
use anyhow::{Context as _, Result};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use storyboard_editor::Mutation;

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// JSON file holding a list of mutations
    pub script: PathBuf,

    /// Apply without saving
    #[arg(long)]
    pub dry_run: bool,
}

pub fn apply(args: ApplyArgs, ctx: &Context) -> Result<()> {
    let source = fs::read_to_string(&args.script)
        .with_context(|| format!("Failed to read {}", args.script.display()))?;
    let mutations: Vec<Mutation> = serde_json::from_str(&source)
        .with_context(|| format!("{} is not a list of mutations", args.script.display()))?;

    let mut project = ctx.open()?;
    let total = mutations.len();

    // One settle pass for the whole script
    let results = project.batch(|p| {
        mutations
            .into_iter()
            .map(|m| p.apply(m))
            .collect::<Result<Vec<_>, _>>()
    })?;

    let changed = results.iter().filter(|r| r.changed).count();
    for (index, result) in results.iter().enumerate() {
        let marker = if result.changed { "✓".green() } else { "·".dimmed() };
        match &result.created {
            Some(id) => println!("  {} #{} created {}", marker, index + 1, id),
            None => println!("  {} #{}", marker, index + 1),
        }
    }

    if args.dry_run {
        println!("{} {} of {} mutations would change the project", "Dry run:".yellow(), changed, total);
        return Ok(());
    }

    project.save()?;
    println!();
    println!(
        "✨ {} {} of {} mutations changed the project (revision {})",
        "Done".green().bold(),
        changed,
        total,
        project.revision()
    );
    Ok(())
}
