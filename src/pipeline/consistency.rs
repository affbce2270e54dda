//! Bucket ↔ collection drift detection.
//!
//! Every record id should name exactly one bucket object. Nothing repairs drift
//! automatically; this only reports it.

use std::collections::BTreeSet;

use serde::Serialize;

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct Drift {
    /// Bucket objects with no embedding record.
    pub missing_vectors: Vec<String>,
    /// Embedding records with no bucket object.
    pub orphan_vectors: Vec<String>,
}

impl Drift {
    pub fn is_consistent(&self) -> bool {
        self.missing_vectors.is_empty() && self.orphan_vectors.is_empty()
    }
}

/// Compare bucket object names with collection ids. Output lists are sorted.
pub fn drift<A, B>(bucket_names: A, collection_ids: B) -> Drift
where
    A: IntoIterator<Item = String>,
    B: IntoIterator<Item = String>,
{
    let bucket: BTreeSet<String> = bucket_names.into_iter().collect();
    let collection: BTreeSet<String> = collection_ids.into_iter().collect();
    Drift {
        missing_vectors: bucket.difference(&collection).cloned().collect(),
        orphan_vectors: collection.difference(&bucket).cloned().collect(),
    }
}
