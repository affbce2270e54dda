//! Vector collection: named store of `(id, vector, metadata)` records.
//!
//! Provides the [`VectorCollection`] trait, the [`Record`] type, distance
//! [`Measure`]s and the metadata [`Filter`] language. [`postgres::PgCollection`]
//! is the Postgres/pgvector implementation.

pub mod filter;
pub mod postgres;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use filter::{Filter, FilterError};

/// A single embedding record. `id` is the image name and the collection's primary key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: serde_json::Value,
}

impl Record {
    /// Build the record for an uploaded image. Metadata is `{"type": <suffix>}`.
    pub fn for_image(name: &str, vector: Vec<f32>) -> Self {
        let file_type = crate::storage::file_type(name).unwrap_or_default();
        Self {
            id: name.to_string(),
            vector,
            metadata: serde_json::json!({ "type": file_type }),
        }
    }
}

/// Distance measure used for ordering query results and building the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    #[default]
    Cosine,
    L2,
    InnerProduct,
}

impl Measure {
    pub const ALL: [Measure; 3] = [Measure::Cosine, Measure::L2, Measure::InnerProduct];

    /// pgvector distance operator.
    pub fn operator(&self) -> &'static str {
        match self {
            Self::Cosine => "<=>",
            Self::L2 => "<->",
            Self::InnerProduct => "<#>",
        }
    }

    /// pgvector index operator class.
    pub fn ops(&self) -> &'static str {
        match self {
            Self::Cosine => "vector_cosine_ops",
            Self::L2 => "vector_l2_ops",
            Self::InnerProduct => "vector_ip_ops",
        }
    }

    /// Distance between two vectors with the same semantics as the pgvector operator
    /// (smaller is closer).
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        match self {
            Self::Cosine => {
                let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    1.0
                } else {
                    1.0 - dot / (norm_a * norm_b)
                }
            }
            Self::L2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
            Self::InnerProduct => -dot,
        }
    }
}

impl std::fmt::Display for Measure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Cosine => "cosine",
            Self::L2 => "l2",
            Self::InnerProduct => "inner_product",
        })
    }
}

/// A named vector collection with a fixed dimension.
///
/// Methods are synchronous; callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait VectorCollection: Send + Sync {
    fn name(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Insert or overwrite records by id. All records are written or none are.
    fn upsert(&self, records: &[Record]) -> Result<()>;

    /// Drop and rebuild the search index over the whole collection.
    fn create_index(&self) -> Result<()>;

    /// Ids of the `limit` nearest records matching `filter`, closest first.
    fn query(&self, vector: &[f32], limit: usize, filter: &Filter) -> Result<Vec<String>>;

    fn count(&self) -> Result<usize>;

    /// All record ids, sorted.
    fn ids(&self) -> Result<Vec<String>>;
}
