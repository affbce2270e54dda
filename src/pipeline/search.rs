//! Searcher: text query → embedding → filtered nearest-neighbour query.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::embedding::EmbeddingProvider;
use crate::vectors::{Filter, VectorCollection};

/// Result of a search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The query was blank; nothing ran.
    Skipped,
    /// Matching image names, closest first.
    Results(Vec<String>),
}

#[derive(Clone)]
pub struct Searcher {
    collection: Arc<dyn VectorCollection>,
    embedding: Arc<dyn EmbeddingProvider>,
    limit: usize,
    filter: Filter,
}

impl Searcher {
    pub fn new(
        collection: Arc<dyn VectorCollection>,
        embedding: Arc<dyn EmbeddingProvider>,
        limit: usize,
        filter: Filter,
    ) -> Self {
        Self {
            collection,
            embedding,
            limit,
            filter,
        }
    }

    /// Searcher restricted to the configured image types.
    pub fn from_config(
        collection: Arc<dyn VectorCollection>,
        embedding: Arc<dyn EmbeddingProvider>,
        config: &crate::config::SearchConfig,
    ) -> Self {
        Self::new(
            collection,
            embedding,
            config.max_results,
            Filter::any_type(&config.types),
        )
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Synchronous search. Blank queries are skipped without touching the model or
    /// the collection.
    pub fn search_blocking(&self, query: &str) -> Result<SearchOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchOutcome::Skipped);
        }

        let vector = self
            .embedding
            .embed_text(query)
            .context("failed to embed query")?;
        let names = self
            .collection
            .query(&vector, self.limit, &self.filter)
            .context("vector query failed")?;

        tracing::info!(query, results = names.len(), "search complete");
        Ok(SearchOutcome::Results(names))
    }

    /// [`Searcher::search_blocking`] on the blocking pool.
    pub async fn search(&self, query: &str) -> Result<SearchOutcome> {
        if query.trim().is_empty() {
            return Ok(SearchOutcome::Skipped);
        }
        let searcher = self.clone();
        let query = query.to_string();
        tokio::task::spawn_blocking(move || searcher.search_blocking(&query))
            .await
            .context("search task failed")?
    }
}
