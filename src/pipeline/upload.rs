//! Uploader: bucket writes followed by indexing, with compensating removal.
//!
//! Order of operations for a batch:
//!
//! 1. validate every name (no side effects yet);
//! 2. write each file to a scratch directory and upload it to the bucket;
//! 3. index all uploaded names;
//! 4. if step 2 or 3 fails, remove the objects this batch created and return the error.
//!
//! Names that already existed before the batch are overwritten in place and never
//! removed by the rollback: their earlier record still describes them. The scratch
//! directory is removed when the batch ends, successful or not.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tempfile::TempDir;

use super::Indexer;
use crate::storage::{validate_object_name, NameError, ObjectStore};

/// One file from the upload form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// What the last upload interaction did; rendered as a banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    /// No upload in this interaction.
    NotAttempted,
    /// The upload button was pressed with no files.
    NothingSelected,
    Indexed { names: Vec<String> },
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    InvalidName(#[from] NameError),
    #[error("upload failed: {0:#}")]
    Failed(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct Uploader {
    store: Arc<dyn ObjectStore>,
    indexer: Indexer,
    scratch_dir: PathBuf,
    accepted_types: Vec<String>,
}

/// Objects written so far in one batch.
#[derive(Default)]
struct Written {
    /// Every name uploaded, in order, without repeats.
    names: Vec<String>,
    /// Names that did not exist in the bucket before this batch.
    created: Vec<String>,
}

impl Uploader {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        indexer: Indexer,
        scratch_dir: PathBuf,
        accepted_types: Vec<String>,
    ) -> Self {
        Self {
            store,
            indexer,
            scratch_dir,
            accepted_types,
        }
    }

    pub async fn upload(&self, files: Vec<UploadedFile>) -> Result<UploadOutcome, UploadError> {
        if files.is_empty() {
            tracing::info!("upload pressed with no files");
            return Ok(UploadOutcome::NothingSelected);
        }

        for file in &files {
            validate_object_name(&file.name, &self.accepted_types)?;
        }

        let existing: HashSet<String> = self
            .store
            .list()
            .await
            .context("failed to list bucket before upload")?
            .into_iter()
            .map(|o| o.name)
            .collect();

        let root = self.scratch_dir.clone();
        let batch = tokio::task::spawn_blocking(move || scratch_batch(&root))
            .await
            .context("scratch dir task failed")??;
        tracing::info!(count = files.len(), "uploading images");

        let result = self.run_batch(batch.path(), files, &existing).await;

        let dir = batch.path().to_path_buf();
        match tokio::task::spawn_blocking(move || batch.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(dir = %dir.display(), error = %e, "failed to remove scratch dir")
            }
            Err(e) => tracing::warn!(dir = %dir.display(), error = %e, "scratch cleanup task failed"),
        }

        let names = result?;
        tracing::info!(names = ?names, "upload done");
        Ok(UploadOutcome::Indexed { names })
    }

    async fn run_batch(
        &self,
        dir: &Path,
        files: Vec<UploadedFile>,
        existing: &HashSet<String>,
    ) -> anyhow::Result<Vec<String>> {
        let mut written = Written::default();
        for file in files {
            if let Err(e) = self.write_and_upload(dir, file, existing, &mut written).await {
                self.roll_back(&written).await;
                return Err(e);
            }
        }

        if let Err(e) = self.indexer.index(written.names.clone(), dir.to_path_buf()).await {
            self.roll_back(&written).await;
            return Err(e);
        }
        Ok(written.names)
    }

    async fn write_and_upload(
        &self,
        dir: &Path,
        file: UploadedFile,
        existing: &HashSet<String>,
        written: &mut Written,
    ) -> anyhow::Result<()> {
        let path = dir.join(&file.name);
        tokio::fs::write(&path, &file.bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        self.store
            .upload(&file.name, file.bytes, &file.content_type)
            .await?;

        // A repeated name overwrites in place; index it once.
        if !written.names.contains(&file.name) {
            if !existing.contains(&file.name) {
                written.created.push(file.name.clone());
            }
            written.names.push(file.name);
        }
        Ok(())
    }

    /// Remove objects a failed batch created. Overwritten objects stay, since the
    /// collection still holds their earlier record. Failures here are logged, not
    /// returned, so the caller still sees the original error.
    async fn roll_back(&self, written: &Written) {
        let overwritten: Vec<&String> = written
            .names
            .iter()
            .filter(|n| !written.created.contains(n))
            .collect();
        if !overwritten.is_empty() {
            tracing::warn!(
                names = ?overwritten,
                "failed batch overwrote existing objects, left in place with their earlier records"
            );
        }
        if written.created.is_empty() {
            return;
        }
        tracing::warn!(names = ?written.created, "removing objects created by failed batch");
        if let Err(e) = self.store.remove(&written.created).await {
            tracing::error!(names = ?written.created, error = %e, "rollback failed, objects left orphaned");
        }
    }
}

/// A fresh `batch-*` directory under the scratch root, removed when dropped or closed.
fn scratch_batch(root: &Path) -> anyhow::Result<TempDir> {
    std::fs::create_dir_all(root)
        .with_context(|| format!("failed to create scratch root {}", root.display()))?;
    tempfile::Builder::new()
        .prefix("batch-")
        .tempdir_in(root)
        .with_context(|| format!("failed to create scratch dir in {}", root.display()))
}
