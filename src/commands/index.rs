use colored::Colorize;
use issue_semsearch::embeddings::EmbeddingGenerator;
use issue_semsearch::error::Result;
use issue_semsearch::indexing::{IndexOutcome, IndexingPipeline};
use issue_semsearch::Config;

use super::{current_thread_runtime, load_catalog, open_store, print_disabled_notice};

pub fn cmd_index(config: &Config, issue_id: u64) -> Result<()> {
    if !config.settings.enabled {
        print_disabled_notice();
        return Ok(());
    }

    let catalog = load_catalog(config)?;
    let generator = EmbeddingGenerator::from_config(config)?;
    let pipeline = IndexingPipeline::new(generator, open_store(config)?, true);

    let rt = current_thread_runtime()?;
    let outcome = rt.block_on(pipeline.run(catalog.as_ref(), issue_id))?;

    match outcome {
        IndexOutcome::Indexed { original_dimension } => println!(
            "{} issue #{} ({} dimensions from {})",
            "Indexed".green().bold(),
            issue_id,
            original_dimension,
            config.settings.embedding_model.cyan()
        ),
        IndexOutcome::Skipped => println!(
            "{} issue #{} is already up to date",
            "Skipped".dimmed(),
            issue_id
        ),
        IndexOutcome::Missing => println!(
            "{}",
            format!("Issue #{} not found, nothing to index.", issue_id).yellow()
        ),
        IndexOutcome::Disabled => print_disabled_notice(),
    }

    Ok(())
}
