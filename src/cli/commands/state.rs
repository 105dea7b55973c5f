//! Crawl state management commands.

use console::style;

use crate::config::Settings;
use crate::models::RunState;
use crate::repository::{CursorStore, SqliteCursorStore};

fn open_cursor(settings: &Settings) -> anyhow::Result<SqliteCursorStore> {
    settings.ensure_directories()?;
    Ok(SqliteCursorStore::new(&settings.database_path())?)
}

/// Show the crawl cursor.
pub fn cmd_state_show(settings: &Settings) -> anyhow::Result<()> {
    let cursor = open_cursor(settings)?.get()?;

    println!("\n{}", style("Crawl State").bold());
    println!("{}", "-".repeat(40));
    let state = match cursor.run_state {
        RunState::Run => style(cursor.run_state.as_str()).green(),
        RunState::Stop => style(cursor.run_state.as_str()).yellow(),
    };
    println!("{:<20} {}", "Run state:", state);
    println!("{:<20} {}", "Offset:", cursor.offset);
    println!(
        "{:<20} {}",
        "Database:",
        settings.database_path().display()
    );

    Ok(())
}

/// Ask a running crawl to stop at its next page boundary.
pub fn cmd_state_stop(settings: &Settings) -> anyhow::Result<()> {
    open_cursor(settings)?.request_stop()?;
    println!(
        "{} Stop requested; the crawl exits after its current page",
        style("✓").green()
    );
    Ok(())
}

/// Clear a pending stop request.
pub fn cmd_state_resume(settings: &Settings) -> anyhow::Result<()> {
    open_cursor(settings)?.resume()?;
    println!("{} Run state set to run", style("✓").green());
    Ok(())
}

/// Reset the cursor to offset 0.
pub fn cmd_state_reset(settings: &Settings, confirm: bool) -> anyhow::Result<()> {
    if !confirm {
        println!(
            "{} This will reset the crawl cursor to offset 0.",
            style("!").yellow()
        );
        println!("  Stored artifacts are kept and skipped on the next crawl.");
        println!("  Use --confirm to proceed.");
        return Ok(());
    }

    open_cursor(settings)?.reset()?;
    println!("{} Crawl cursor reset", style("✓").green());
    Ok(())
}
