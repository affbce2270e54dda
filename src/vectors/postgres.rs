//! Postgres + pgvector collection.
//!
//! Collections live in the `vecs` schema as
//! `vecs."<name>"(id TEXT PRIMARY KEY, vec vector(<dim>), metadata JSONB)`.
//! The client is synchronous; call it from `spawn_blocking`.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use pgvector::Vector;
use postgres::types::ToSql;
use postgres::{Client, NoTls};

use super::filter::SqlParam;
use super::{Filter, Measure, Record, VectorCollection};

pub const SCHEMA: &str = "vecs";

pub struct PgCollection {
    client: Mutex<Client>,
    name: String,
    dimension: usize,
    measure: Measure,
}

impl PgCollection {
    /// Connect and get-or-create the collection. Fails if a collection with the same
    /// name already exists with a different dimension.
    pub fn connect(
        connection_string: &str,
        name: &str,
        dimension: usize,
        measure: Measure,
    ) -> Result<Self> {
        validate_collection_name(name)?;

        let mut client = Client::connect(connection_string, NoTls)
            .context("failed to connect to Postgres")?;

        client
            .batch_execute(&format!(
                "CREATE EXTENSION IF NOT EXISTS vector;
                 CREATE SCHEMA IF NOT EXISTS {SCHEMA};
                 CREATE TABLE IF NOT EXISTS {table} (
                     id TEXT PRIMARY KEY,
                     vec vector({dimension}) NOT NULL,
                     metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb
                 );",
                table = table_name(name),
            ))
            .context("failed to create collection")?;

        let existing: i32 = client
            .query_one(
                "SELECT atttypmod FROM pg_attribute
                 WHERE attrelid = $1::text::regclass AND attname = 'vec'",
                &[&table_name(name)],
            )
            .context("failed to read collection dimension")?
            .get(0);
        anyhow::ensure!(
            existing as usize == dimension,
            "collection {name} has dimension {existing}, expected {dimension}"
        );

        tracing::info!(collection = %name, dimension, measure = %measure, "vector collection ready");

        Ok(Self {
            client: Mutex::new(client),
            name: name.to_string(),
            dimension,
            measure,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Client>> {
        self.client
            .lock()
            .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))
    }

    fn table(&self) -> String {
        table_name(&self.name)
    }
}

impl VectorCollection for PgCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn upsert(&self, records: &[Record]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        for record in records {
            anyhow::ensure!(
                record.vector.len() == self.dimension,
                "record {} has {} dimensions, collection expects {}",
                record.id,
                record.vector.len(),
                self.dimension
            );
        }

        let mut client = self.lock()?;
        let mut tx = client.transaction()?;
        let stmt = tx.prepare(&format!(
            "INSERT INTO {} (id, vec, metadata) VALUES ($1, $2, $3)
             ON CONFLICT (id) DO UPDATE SET vec = EXCLUDED.vec, metadata = EXCLUDED.metadata",
            self.table()
        ))?;

        for record in records {
            let vector = Vector::from(record.vector.clone());
            tx.execute(&stmt, &[&record.id, &vector, &record.metadata])
                .with_context(|| format!("failed to upsert {}", record.id))?;
        }
        tx.commit()?;

        tracing::debug!(collection = %self.name, count = records.len(), "records upserted");
        Ok(())
    }

    fn create_index(&self) -> Result<()> {
        let mut sql = String::new();
        for measure in Measure::ALL {
            sql.push_str(&format!(
                "DROP INDEX IF EXISTS {SCHEMA}.\"{}\";\n",
                index_name(&self.name, measure)
            ));
        }
        sql.push_str(&format!(
            "CREATE INDEX \"{}\" ON {} USING hnsw (vec {});",
            index_name(&self.name, self.measure),
            self.table(),
            self.measure.ops()
        ));

        let mut client = self.lock()?;
        let mut tx = client.transaction()?;
        tx.batch_execute(&sql).context("failed to rebuild index")?;
        tx.commit()?;

        tracing::info!(collection = %self.name, measure = %self.measure, "index rebuilt");
        Ok(())
    }

    /// The HNSW scan filters its `ef_search` candidates after the fact, so a selective
    /// filter over a large collection can return fewer than `limit` rows.
    fn query(&self, vector: &[f32], limit: usize, filter: &Filter) -> Result<Vec<String>> {
        anyhow::ensure!(
            vector.len() == self.dimension,
            "query has {} dimensions, collection expects {}",
            vector.len(),
            self.dimension
        );

        let (clause, filter_params) = filter.to_sql("metadata", 3);
        let sql = format!(
            "SELECT id FROM {} WHERE {clause} ORDER BY vec {} $1 LIMIT $2",
            self.table(),
            self.measure.operator()
        );

        let mut params: Vec<Box<dyn ToSql + Sync>> = vec![
            Box::new(Vector::from(vector.to_vec())),
            Box::new(limit as i64),
        ];
        for param in filter_params {
            params.push(match param {
                SqlParam::Text(text) => Box::new(text) as Box<dyn ToSql + Sync>,
                SqlParam::Json(value) => Box::new(value) as Box<dyn ToSql + Sync>,
            });
        }
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref()).collect();

        let mut client = self.lock()?;
        let rows = client.query(&sql, &refs).context("vector query failed")?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    fn count(&self) -> Result<usize> {
        let mut client = self.lock()?;
        let count: i64 = client
            .query_one(&format!("SELECT COUNT(*) FROM {}", self.table()), &[])?
            .get(0);
        Ok(count as usize)
    }

    fn ids(&self) -> Result<Vec<String>> {
        let mut client = self.lock()?;
        let rows = client.query(&format!("SELECT id FROM {} ORDER BY id", self.table()), &[])?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }
}

/// Collection names become SQL identifiers, so only `[A-Za-z0-9_]` is allowed.
pub fn validate_collection_name(name: &str) -> Result<()> {
    anyhow::ensure!(
        !name.is_empty()
            && name.len() <= 48
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
        "invalid collection name: {name:?}"
    );
    Ok(())
}

fn table_name(name: &str) -> String {
    format!("{SCHEMA}.\"{name}\"")
}

fn index_name(name: &str, measure: Measure) -> String {
    format!("ix_{}_hnsw_{name}", measure.ops())
}
