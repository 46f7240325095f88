pub mod index;
pub mod migrate;
pub mod notify;
pub mod search;
pub mod status;
pub mod sync;

use std::sync::Arc;

use colored::Colorize;
use issue_semsearch::embeddings::EmbeddingStore;
use issue_semsearch::error::{Result, SemSearchError};
use issue_semsearch::indexing::PoolOptions;
use issue_semsearch::issues::IssueCatalog;
use issue_semsearch::Config;

fn current_thread_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| SemSearchError::Config(format!("tokio runtime: {}", e)))
}

fn worker_runtime(workers: usize) -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers.max(1))
        .enable_all()
        .build()
        .map_err(|e| SemSearchError::Config(format!("tokio runtime: {}", e)))
}

fn open_store(config: &Config) -> Result<Arc<EmbeddingStore>> {
    Ok(Arc::new(EmbeddingStore::open(config.store_path())?))
}

fn load_catalog(config: &Config) -> Result<Arc<IssueCatalog>> {
    let catalog = IssueCatalog::load_or_empty(&config.catalog_path())?;
    if catalog.is_empty() {
        tracing::warn!(path = %config.catalog_path().display(), "issue catalog is empty");
    }
    Ok(Arc::new(catalog))
}

fn pool_options(config: &Config, workers: Option<usize>) -> PoolOptions {
    PoolOptions {
        workers: workers.unwrap_or(config.settings.workers).max(1),
        max_attempts: config.settings.max_attempts,
        ..PoolOptions::default()
    }
}

fn print_disabled_notice() {
    println!(
        "{}",
        "Semantic search is disabled. Set \"enabled\": true in settings.json to index issues."
            .yellow()
    );
}
