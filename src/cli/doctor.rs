//! CLI `doctor` command: check config, model files, bucket and collection.

use anyhow::Result;
use picsearch::config::PicsearchConfig;
use picsearch::embedding::clip::model_files;
use picsearch::pipeline::consistency::drift;
use picsearch::storage::supabase::SupabaseStorage;
use picsearch::storage::ObjectStore;

/// Names shown per drift list before truncating.
const SHOW_MAX: usize = 10;

/// Print a health report. Problems are reported, not returned as errors.
pub async fn doctor(config: PicsearchConfig) -> Result<()> {
    println!("picsearch Health Report");
    println!("=======================");
    println!();

    let config_ok = match config.validate() {
        Ok(()) => {
            println!("Configuration:     OK");
            true
        }
        Err(e) => {
            println!("Configuration:     {e}");
            false
        }
    };

    let cache_dir = picsearch::config::expand_tilde(&config.embedding.cache_dir);
    println!();
    println!("Model files ({}):", config.embedding.model);
    for path in model_files(&cache_dir) {
        let status = if path.exists() { "present" } else { "MISSING" };
        println!("  {:<18} {status}", format!("{}:", file_label(&path)));
    }

    if !config_ok {
        println!();
        println!("Fix the configuration to check the bucket and the collection.");
        return Ok(());
    }

    println!();
    let bucket_names = match list_bucket(&config).await {
        Ok(names) => {
            println!("Bucket {:<11} {} object(s)", format!("{}:", config.storage.bucket), names.len());
            Some(names)
        }
        Err(e) => {
            println!("Bucket:            unreachable ({e:#})");
            None
        }
    };

    let collection_ids = match crate::server::connect_collection(&config).await {
        Ok(collection) => {
            let ids = tokio::task::spawn_blocking(move || {
                let count = collection.count()?;
                let ids = collection.ids()?;
                anyhow::Ok((count, ids))
            })
            .await?;
            match ids {
                Ok((count, ids)) => {
                    println!("Collection {:<7} {count} record(s)", format!("{}:", config.database.collection));
                    Some(ids)
                }
                Err(e) => {
                    println!("Collection:        query failed ({e:#})");
                    None
                }
            }
        }
        Err(e) => {
            println!("Collection:        unreachable ({e:#})");
            None
        }
    };

    if let (Some(bucket), Some(ids)) = (bucket_names, collection_ids) {
        let report = drift(bucket, ids);
        println!();
        if report.is_consistent() {
            println!("Consistency:       OK (every object has exactly one record)");
        } else {
            println!("Consistency:       DRIFT");
            print_names("Objects without a record", &report.missing_vectors);
            print_names("Records without an object", &report.orphan_vectors);
        }
    }

    Ok(())
}

async fn list_bucket(config: &PicsearchConfig) -> Result<Vec<String>> {
    let store = SupabaseStorage::from_config(config)?;
    let objects = store.list().await?;
    Ok(objects.into_iter().map(|o| o.name).collect())
}

fn file_label(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn print_names(label: &str, names: &[String]) {
    if names.is_empty() {
        return;
    }
    println!("  {label} ({}):", names.len());
    for name in names.iter().take(SHOW_MAX) {
        println!("    {name}");
    }
    if names.len() > SHOW_MAX {
        println!("    ... and {} more", names.len() - SHOW_MAX);
    }
}
