//! Upload → index → search workflow.
//!
//! - [`upload::Uploader`] writes files to the bucket and hands them to the indexer,
//!   removing what it wrote if a later step fails.
//! - [`index::Indexer`] embeds images and upserts them into the vector collection,
//!   then rebuilds the collection index.
//! - [`search::Searcher`] embeds a text query and returns the nearest image names.
//! - [`consistency`] compares bucket contents with collection contents.

pub mod consistency;
pub mod index;
pub mod search;
pub mod upload;

pub use index::Indexer;
pub use search::{SearchOutcome, Searcher};
pub use upload::{UploadError, UploadOutcome, UploadedFile, Uploader};
