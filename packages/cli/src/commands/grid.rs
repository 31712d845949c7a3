use crate::commands::{resolve_page, Context};
use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Debug, Args)]
pub struct GridArgs {
    /// Rows per page
    pub rows: u32,

    /// Columns per page
    pub cols: u32,

    /// Page to resize (id or 1-based position); capacity is uniform, so
    /// every page takes the new grid
    #[arg(short, long, default_value = "1")]
    pub page: String,
}

pub fn grid(args: GridArgs, ctx: &Context) -> Result<()> {
    let mut project = ctx.open()?;
    let page = resolve_page(&project, &args.page)?;
    let pages_before = project.pages().len();

    if project.set_grid_size(&page, args.rows, args.cols)? {
        project.save()?;
        println!(
            "{} Grid is now {}x{} ({} → {} pages)",
            "✓".green(),
            args.rows,
            args.cols,
            pages_before,
            project.pages().len()
        );
    } else {
        println!("Grid is already {}x{}", args.rows, args.cols);
    }

    Ok(())
}
