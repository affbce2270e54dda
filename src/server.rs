//! Web server initialization.
//!
//! [`setup_shared_state`] connects every backend once; [`serve`] wires the result into
//! the router and runs it until ctrl-c.

use std::sync::Arc;

use anyhow::{Context, Result};
use picsearch::auth::gotrue::GoTrueClient;
use picsearch::auth::IdentityProvider;
use picsearch::config::PicsearchConfig;
use picsearch::embedding::{self, EmbeddingProvider, EMBEDDING_DIM};
use picsearch::storage::supabase::SupabaseStorage;
use picsearch::storage::ObjectStore;
use picsearch::vectors::postgres::PgCollection;
use picsearch::vectors::VectorCollection;
use picsearch::web::{self, AppState};

/// Backends shared by the server and the CLI commands.
pub struct Backends {
    pub config: Arc<PicsearchConfig>,
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn ObjectStore>,
    pub collection: Arc<dyn VectorCollection>,
    pub embedding: Arc<dyn EmbeddingProvider>,
}

/// Validate config, connect to the collection and load the model.
pub async fn setup_shared_state(config: PicsearchConfig) -> Result<Backends> {
    config.validate()?;

    let identity: Arc<dyn IdentityProvider> =
        Arc::new(GoTrueClient::new(&config.auth.url, &config.auth.key)?);
    let store: Arc<dyn ObjectStore> = Arc::new(SupabaseStorage::from_config(&config)?);
    tracing::info!(bucket = %config.storage.bucket, "object store ready");

    let collection = connect_collection(&config).await?;
    tracing::info!(
        collection = %config.database.collection,
        measure = %config.database.measure,
        "vector collection ready"
    );

    let embedding_config = config.embedding.clone();
    let provider = tokio::task::spawn_blocking(move || embedding::create_provider(&embedding_config))
        .await
        .context("model loading task failed")??;
    let embedding: Arc<dyn EmbeddingProvider> = Arc::from(provider);
    tracing::info!(model = %config.embedding.model, "embedding provider ready");

    Ok(Backends {
        config: Arc::new(config),
        identity,
        store,
        collection,
        embedding,
    })
}

/// The Postgres client is synchronous, so it is opened on the blocking pool.
pub async fn connect_collection(config: &PicsearchConfig) -> Result<Arc<dyn VectorCollection>> {
    let conn_str = config.database.connection_string();
    let name = config.database.collection.clone();
    let measure = config.database.measure;
    let collection = tokio::task::spawn_blocking(move || {
        PgCollection::connect(&conn_str, &name, EMBEDDING_DIM, measure)
    })
    .await
    .context("database connect task failed")??;
    Ok(Arc::new(collection))
}

/// Start the web server on `server.bind`.
pub async fn serve(config: PicsearchConfig) -> Result<()> {
    let bind_addr = config.server.bind.clone();
    tracing::info!(addr = %bind_addr, "starting picsearch");

    let backends = setup_shared_state(config).await?;
    let state = AppState::new(
        backends.config,
        backends.identity,
        backends.store,
        backends.collection,
        backends.embedding,
    )?;
    let router = web::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "listening at http://{bind_addr}/");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
