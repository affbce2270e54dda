//! Text-searchable image gallery.
//!
//! Signed-in users upload PNG/JPG images. Each image is stored in a public object
//! bucket and embedded with CLIP ViT-B/32; the 512-dimensional vector is upserted into
//! a pgvector collection keyed by the file name. Anyone (or only signed-in users,
//! depending on [`config::AccessPolicy`]) can type a phrase, which is embedded into the
//! same space and matched against the collection, and the closest images are shown in
//! a grid.
//!
//! # Architecture
//!
//! - **Identity**: GoTrue-compatible password sign-in; the access token lives in a cookie
//! - **Storage**: Supabase-compatible object bucket, public URLs for display
//! - **Embeddings**: Local ONNX Runtime with CLIP text and vision towers (512 dimensions)
//! - **Vectors**: Postgres + pgvector, HNSW index, JSONB metadata filters
//! - **Transport**: server-rendered HTML over axum
//!
//! # Modules
//!
//! - [`config`]: configuration from TOML, `.env` and environment variables
//! - [`auth`]: identity provider seam and access policy
//! - [`storage`]: object bucket seam and file name rules
//! - [`embedding`]: image and text embedding via ONNX Runtime
//! - [`vectors`]: vector collection seam, metadata filters, pgvector backend
//! - [`pipeline`]: upload → index → search workflow
//! - [`gallery`]: grid layout of image tiles
//! - [`web`]: routes, handlers and the page template

pub mod auth;
pub mod config;
pub mod embedding;
pub mod error;
pub mod gallery;
pub mod pipeline;
pub mod storage;
pub mod vectors;
pub mod web;
