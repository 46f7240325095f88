use colored::Colorize;
use dialoguer::Confirm;
use issue_semsearch::embeddings::TARGET_DIMENSION;
use issue_semsearch::error::{Result, SemSearchError};
use issue_semsearch::Config;

use super::open_store;

pub fn cmd_migrate(config: &Config, yes: bool) -> Result<()> {
    let store = open_store(config)?;
    let stats = store.stats()?;

    println!(
        "{}",
        format!(
            "Re-declare embedding store: {} -> {} dimensions",
            stats.declared_width, TARGET_DIMENSION
        )
        .bold()
        .yellow()
    );
    println!("{}", "=".repeat(60).yellow());

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "This clears all {} stored embeddings; the next sync regenerates them. Continue?",
                stats.total_records
            ))
            .default(false)
            .interact()
            .map_err(|e| SemSearchError::Config(format!("Confirmation cancelled: {}", e)))?;

        if !confirmed {
            println!("{}", "Migration cancelled.".yellow());
            return Ok(());
        }
    }

    let cleared = store.redeclare(TARGET_DIMENSION)?;
    tracing::info!(
        cleared,
        width = TARGET_DIMENSION,
        path = %store.path().display(),
        "embedding store re-declared"
    );

    println!(
        "{} Cleared {} records, store declared at {} dimensions.",
        "Done!".green().bold(),
        cleared,
        TARGET_DIMENSION
    );
    println!("\nRegenerate embeddings with:");
    println!("  {}", "issue-semsearch sync --as <admin login>".cyan());

    Ok(())
}
