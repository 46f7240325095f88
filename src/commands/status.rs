use colored::Colorize;
use issue_semsearch::embeddings::fingerprint::fingerprint;
use issue_semsearch::embeddings::TARGET_DIMENSION;
use issue_semsearch::error::Result;
use issue_semsearch::issues::IssueSource;
use issue_semsearch::Config;

use super::{load_catalog, open_store};

pub fn cmd_status(config: &Config) -> Result<()> {
    let catalog = load_catalog(config)?;
    let store = open_store(config)?;
    let stats = store.stats()?;
    let hashes = store.content_hashes()?;

    // Compare stored fingerprints with current issue content
    let mut current = 0;
    let mut stale = 0;
    let mut unindexed = 0;
    for issue_id in catalog.issue_ids()? {
        let Some(content) = catalog.content(issue_id)? else {
            continue;
        };
        match hashes.get(&issue_id) {
            Some(Some(hash)) if *hash == fingerprint(&content) => current += 1,
            Some(Some(_)) => stale += 1,
            _ => unindexed += 1,
        }
    }

    let store_size = stats.disk_bytes;

    println!("{}", "Issue Semantic Search Status".green().bold());
    println!("{}", "=".repeat(40));
    println!(
        "  Data directory:    {}",
        config.data_dir.display().to_string().cyan()
    );
    println!(
        "  Enabled:           {}",
        if config.settings.enabled {
            "yes".green()
        } else {
            "no".yellow()
        }
    );
    println!(
        "  Embedding model:   {}",
        config.settings.embedding_model.cyan()
    );
    println!("  API endpoint:      {}", config.settings.api_base_url());
    println!(
        "  Store size:        {}",
        humansize::format_size(store_size, humansize::BINARY)
    );

    let width = if stats.declared_width == TARGET_DIMENSION {
        stats.declared_width.to_string().normal()
    } else {
        format!(
            "{} (expected {}, run `issue-semsearch migrate`)",
            stats.declared_width, TARGET_DIMENSION
        )
        .red()
    };
    println!("  Declared width:    {}", width);

    println!("  Issues:            {}", catalog.len());
    println!("  Records:           {}", stats.total_records);
    println!("  Without vector:    {}", stats.without_vector);
    println!("  Up to date:        {}", current);
    println!("  Stale:             {}", stale);
    println!("  Not indexed:       {}", unindexed);

    if !stats.by_model.is_empty() {
        println!("  By model:");
        let mut models: Vec<_> = stats.by_model.iter().collect();
        models.sort();
        for (model, count) in models {
            println!("    {}: {}", model, count);
        }
    }

    Ok(())
}
