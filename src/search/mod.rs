//! Nearest-neighbour search over stored issue embeddings.

pub mod shaper;

use std::collections::HashSet;
use std::sync::Arc;

use crate::embeddings::normalize::normalize;
use crate::embeddings::{Embedder, EmbeddingStore, EmbeddingVector};
use crate::error::{Result, SemSearchError};
use crate::issues::{IssueId, IssueSource, Principal, VisibilityOracle};

pub use shaper::{shape, DisplayResult, RawResult};

/// Ranks stored embeddings against a query vector and joins display attributes.
pub struct SimilaritySearchEngine {
    store: Arc<EmbeddingStore>,
}

impl SimilaritySearchEngine {
    pub fn new(store: Arc<EmbeddingStore>) -> Self {
        Self { store }
    }

    /// Up to `k` issues closest to `query`, ascending by distance.
    ///
    /// Records whose issue is unknown to `source` never take one of the `k`
    /// slots. Visibility is not applied here.
    pub fn search<S>(&self, query: &EmbeddingVector, k: usize, source: &S) -> Result<Vec<RawResult>>
    where
        S: IssueSource + ?Sized,
    {
        let known: HashSet<IssueId> = source.issue_ids()?.into_iter().collect();

        let neighbors = self
            .store
            .nearest(query, k, |id| known.contains(&id))
            .inspect_err(|e| self.log_store_failure(query, e))?;

        let mut rows = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            if let Some(summary) = source.summary(neighbor.issue_id)? {
                rows.push(RawResult::joined(summary, neighbor.distance));
            }
        }
        Ok(rows)
    }

    fn log_store_failure(&self, query: &EmbeddingVector, error: &SemSearchError) {
        match self.store.declared_width() {
            Ok(declared_width) => tracing::error!(
                error = %error,
                declared_width,
                query_width = query.as_slice().len(),
                "vector search failed"
            ),
            Err(debug_error) => tracing::error!(
                error = %error,
                debug_error = %debug_error,
                "vector search failed, declared width unavailable"
            ),
        }
    }
}

/// Administrators may always search. Everyone else needs the feature enabled
/// and the "use semantic search" permission.
pub fn authorize_search(enabled: bool, principal: &Principal) -> Result<()> {
    if principal.admin {
        return Ok(());
    }
    if !enabled {
        return Err(SemSearchError::Disabled);
    }
    if !principal.use_semantic_search {
        return Err(SemSearchError::AccessDenied(format!(
            "{} may not use semantic search",
            principal.login
        )));
    }
    Ok(())
}

/// Free-text query in, visible ranked issues out.
pub struct SemanticSearchService<E, C> {
    embedder: E,
    engine: SimilaritySearchEngine,
    catalog: Arc<C>,
    enabled: bool,
    default_limit: usize,
}

impl<E, C> SemanticSearchService<E, C>
where
    E: Embedder,
    C: IssueSource + VisibilityOracle,
{
    pub fn new(
        embedder: E,
        store: Arc<EmbeddingStore>,
        catalog: Arc<C>,
        enabled: bool,
        default_limit: usize,
    ) -> Self {
        Self {
            embedder,
            engine: SimilaritySearchEngine::new(store),
            catalog,
            enabled,
            default_limit,
        }
    }

    /// Run `query` for `principal`.
    ///
    /// A blank query returns nothing without calling the embedding API.
    /// Embedding failures come back as [`SemSearchError::Embedding`] so the
    /// caller can show them as a notice.
    pub async fn search(
        &self,
        query: &str,
        principal: &Principal,
        limit: Option<usize>,
    ) -> Result<Vec<DisplayResult>> {
        authorize_search(self.enabled, principal)?;

        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let limit = limit.unwrap_or(self.default_limit);

        let generated = self.embedder.generate(query).await?;
        let original_dimension = generated.original_dimension;
        let key = normalize(generated.vector)?;
        tracing::debug!(original_dimension, "query embedding generated");

        let raw = self.engine.search(&key, limit, self.catalog.as_ref())?;
        let found = raw.len();
        let results = shape(raw, principal, self.catalog.as_ref())?;

        tracing::info!(
            principal = %principal.login,
            found,
            visible = results.len(),
            "semantic search finished"
        );
        Ok(results)
    }
}
