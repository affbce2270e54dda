use anyhow::Result;
use picsearch::config::PicsearchConfig;
use picsearch::pipeline::{SearchOutcome, Searcher};

/// Run a text search from the terminal and print matching names with their URLs.
pub async fn search(config: PicsearchConfig, query: &str) -> Result<()> {
    let backends = crate::server::setup_shared_state(config).await?;
    let searcher = Searcher::from_config(
        backends.collection,
        backends.embedding,
        &backends.config.search,
    );

    let names = match searcher.search(query).await? {
        SearchOutcome::Skipped => {
            println!("Empty query, nothing to search.");
            return Ok(());
        }
        SearchOutcome::Results(names) => names,
    };

    if names.is_empty() {
        println!("No matching images.");
        return Ok(());
    }

    println!("Top {} of {} for {query:?}:", names.len(), searcher.limit());
    for (i, name) in names.iter().enumerate() {
        println!("  {}. {name}  {}", i + 1, backends.store.public_url(name));
    }
    Ok(())
}
