//! Keeping the embedding store in step with issue content.

pub mod hooks;
pub mod queue;

use std::sync::Arc;

use crate::embeddings::fingerprint::{embedding_text, fingerprint};
use crate::embeddings::normalize::normalize;
use crate::embeddings::{Embedder, EmbeddingRecord, EmbeddingStore};
use crate::error::{Result, SemSearchError};
use crate::issues::{IssueContent, IssueId, IssueSource, Principal};

pub use hooks::{HostEvent, IssueHooks};
pub use queue::{sync_all, IssueChanged, Observer, PoolOptions, PoolReport, Scheduler, WorkerPool};

/// Bulk sync needs the feature switched on and an administrator.
pub fn authorize_sync(enabled: bool, principal: &Principal) -> Result<()> {
    if !enabled {
        return Err(SemSearchError::Disabled);
    }
    if !principal.admin {
        return Err(SemSearchError::AccessDenied(format!(
            "{} is not allowed to sync embeddings",
            principal.login
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    /// Stored record already matches the content and model
    Skipped,
    Indexed { original_dimension: usize },
    /// The issue no longer exists
    Missing,
    /// Indexing is switched off in settings
    Disabled,
}

/// Generate, normalize and store the embedding of one issue at a time.
pub struct IndexingPipeline<E> {
    embedder: E,
    store: Arc<EmbeddingStore>,
    enabled: bool,
}

impl<E: Embedder> IndexingPipeline<E> {
    pub fn new(embedder: E, store: Arc<EmbeddingStore>, enabled: bool) -> Self {
        Self {
            embedder,
            store,
            enabled,
        }
    }

    pub fn store(&self) -> &EmbeddingStore {
        &self.store
    }

    /// Index one issue.
    ///
    /// A no-op when the stored fingerprint and model already match. On any
    /// failure the previously stored record is left as it was.
    pub async fn index(&self, issue: &IssueContent) -> Result<IndexOutcome> {
        let new_fingerprint = fingerprint(issue);
        let model = self.embedder.model();

        let existing = self.store.find_or_initialize(issue.id)?;
        if existing.is_current(&new_fingerprint, model) {
            tracing::debug!(issue_id = issue.id, "embedding up to date");
            return Ok(IndexOutcome::Skipped);
        }

        let generated = self.embedder.generate(&embedding_text(issue)).await?;
        let original_dimension = generated.original_dimension;
        let vector = normalize(generated.vector)?;

        self.store.save_record(EmbeddingRecord::refreshed(
            issue.id,
            vector,
            new_fingerprint,
            model,
            original_dimension,
        ))?;

        tracing::info!(
            issue_id = issue.id,
            model,
            original_dimension,
            "generated embedding"
        );
        Ok(IndexOutcome::Indexed { original_dimension })
    }

    /// Load `issue_id` from `source` and index it, honouring the enabled flag.
    pub async fn run<S>(&self, source: &S, issue_id: IssueId) -> Result<IndexOutcome>
    where
        S: IssueSource + Sync,
    {
        if !self.enabled {
            return Ok(IndexOutcome::Disabled);
        }

        let Some(issue) = source.content(issue_id)? else {
            tracing::debug!(issue_id, "issue not found, nothing to index");
            return Ok(IndexOutcome::Missing);
        };

        self.index(&issue).await.inspect_err(|e| {
            tracing::error!(issue_id, error = %e, "failed to generate embedding");
        })
    }
}
