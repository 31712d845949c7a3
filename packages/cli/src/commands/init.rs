use crate::commands::Context;
use crate::config::{Config, DEFAULT_CONFIG_NAME};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::fs;
use storyboard_editor::{GridSize, NumberFormat, Project};

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Project name (defaults to the directory name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Grid rows per page
    #[arg(long)]
    pub rows: Option<u32>,

    /// Grid columns per page
    #[arg(long)]
    pub cols: Option<u32>,

    /// Shot number format, e.g. "01" or "SH-001"
    #[arg(short = 'F', long)]
    pub format: Option<String>,

    /// Force overwrite existing config and project
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join(DEFAULT_CONFIG_NAME);
    let project_path = ctx.project_path();

    // Check if project already exists
    if project_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            project_path.display().to_string().bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    println!("{}", "📝 Initializing storyboard...".bright_blue().bold());

    let mut config = if config_path.exists() && !args.force {
        ctx.config.clone()
    } else {
        Config::default()
    };
    if let Some(path) = &ctx.project {
        config.project_file = path.display().to_string();
    }

    let grid = config.defaults.default_grid;
    let rows = args.rows.unwrap_or(grid.rows);
    let cols = args.cols.unwrap_or(grid.cols);
    if rows == 0 || cols == 0 {
        return Err(anyhow::anyhow!("Grid must be at least 1x1, got {}x{}", rows, cols));
    }
    config.defaults.default_grid = GridSize::new(rows, cols);
    if let Some(format) = &args.format {
        config.defaults.number_format = NumberFormat::parse(format);
    }

    // Write config file
    let config_json = serde_json::to_string_pretty(&config)?;
    fs::write(&config_path, config_json)?;
    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);

    let name = args.name.unwrap_or_else(|| {
        ctx.cwd
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled".to_string())
    });
    if let Some(parent) = project_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut project = Project::new(&name, config.defaults.clone());
    project.save_as(&project_path)?;
    println!("  {} Created {}", "✓".green(), project_path.display());

    println!();
    println!("{}", "✅ Storyboard initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Run: storyboard add --count 4");
    println!("  2. Run: storyboard show");

    Ok(())
}
