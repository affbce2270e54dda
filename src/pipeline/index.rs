//! Indexer: image files → embedding records → collection upsert → index rebuild.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::embedding::EmbeddingProvider;
use crate::vectors::{Record, VectorCollection};

#[derive(Clone)]
pub struct Indexer {
    collection: Arc<dyn VectorCollection>,
    embedding: Arc<dyn EmbeddingProvider>,
}

impl Indexer {
    pub fn new(
        collection: Arc<dyn VectorCollection>,
        embedding: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            collection,
            embedding,
        }
    }

    /// Embed every `dir/<name>` image, upsert all records in one batch and rebuild
    /// the index. Any failure aborts before the upsert; nothing is partially written.
    ///
    /// Synchronous: runs inference and blocking database calls.
    pub fn index_files(&self, names: &[String], dir: &Path) -> Result<usize> {
        let mut records = Vec::with_capacity(names.len());
        for name in names {
            let path = dir.join(name);
            let image = image::ImageReader::open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?
                .with_guessed_format()
                .with_context(|| format!("failed to read {name}"))?
                .decode()
                .with_context(|| format!("failed to decode image {name}"))?;

            let vector = self
                .embedding
                .embed_image(&image)
                .with_context(|| format!("failed to embed {name}"))?;
            records.push(Record::for_image(name, vector));
        }

        if records.is_empty() {
            return Ok(0);
        }

        self.collection
            .upsert(&records)
            .context("failed to upsert embeddings")?;
        tracing::info!(
            collection = %self.collection.name(),
            count = records.len(),
            "uploaded images to collection"
        );

        self.collection
            .create_index()
            .context("failed to rebuild index")?;
        tracing::info!(collection = %self.collection.name(), "index created");

        Ok(records.len())
    }

    /// [`Indexer::index_files`] on the blocking pool.
    pub async fn index(&self, names: Vec<String>, dir: PathBuf) -> Result<usize> {
        let indexer = self.clone();
        tokio::task::spawn_blocking(move || indexer.index_files(&names, &dir))
            .await
            .context("indexing task failed")?
    }
}
