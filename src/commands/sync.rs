use std::sync::Arc;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use issue_semsearch::embeddings::EmbeddingGenerator;
use issue_semsearch::error::{Result, SemSearchError};
use issue_semsearch::indexing::{
    authorize_sync, sync_all, IndexOutcome, IndexingPipeline, Observer, WorkerPool,
};
use issue_semsearch::issues::IssueId;
use issue_semsearch::Config;

use super::{load_catalog, open_store, pool_options, worker_runtime};

pub fn cmd_sync(config: &Config, as_login: &str, workers: Option<usize>) -> Result<()> {
    let catalog = load_catalog(config)?;
    let principal = catalog.principal(as_login)?;
    authorize_sync(config.settings.enabled, principal)?;

    let generator = EmbeddingGenerator::from_config(config)?;
    let pipeline = Arc::new(IndexingPipeline::new(generator, open_store(config)?, true));
    let options = pool_options(config, workers);

    println!(
        "{} {} issues with {} workers ({})",
        "Syncing".green().bold(),
        catalog.len(),
        options.workers,
        config.settings.embedding_model.cyan()
    );

    let pb = ProgressBar::new(catalog.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map_err(|e| SemSearchError::Config(format!("progress template: {}", e)))?
            .progress_chars("=>-"),
    );

    let progress = pb.clone();
    let observer: Observer = Arc::new(move |issue_id: IssueId, result: &Result<IndexOutcome>| {
        if result.is_err() {
            progress.set_message(format!("#{} failed", issue_id));
        }
        progress.inc(1);
    });

    let rt = worker_runtime(options.workers)?;
    let report = rt.block_on(async {
        let pool = WorkerPool::start(pipeline, catalog.clone(), options, Some(observer));
        let scheduled = sync_all(catalog.as_ref(), &pool);
        let report = pool.shutdown().await;
        scheduled.map(|_| report)
    })?;
    pb.finish_and_clear();

    println!("{} Sync finished:", "Done!".green().bold());
    println!("  Indexed:  {}", report.indexed);
    println!("  Skipped:  {}", report.skipped);
    if report.missing > 0 {
        println!("  Missing:  {}", report.missing);
    }
    if report.failed > 0 {
        println!(
            "  {}",
            format!("Failed:   {} (see log output for details)", report.failed).red()
        );
    }

    Ok(())
}
