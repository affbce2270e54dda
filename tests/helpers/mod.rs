#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use image::{DynamicImage, ImageFormat, RgbImage};
use serde_json::Value;

use picsearch::auth::{IdentityProvider, Session, SignInError};
use picsearch::config::PicsearchConfig;
use picsearch::embedding::{EmbeddingProvider, EMBEDDING_DIM};
use picsearch::pipeline::{Indexer, Searcher, UploadedFile, Uploader};
use picsearch::storage::{ObjectStore, StoredObject};
use picsearch::vectors::{Filter, Measure, Record, VectorCollection};

pub const CDN: &str = "https://cdn.test/images/";
pub const ALICE_TOKEN: &str = "tok-alice";
pub const ALICE_EMAIL: &str = "alice@example.com";
pub const ALICE_PASSWORD: &str = "correct horse";

/// Deterministic one-hot vector with a spike at `slot`.
pub fn one_hot(slot: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[slot % EMBEDDING_DIM] = 1.0;
    v
}

/// Encode a `width`×1 image in the format implied by `name`'s extension.
/// [`FakeEmbedder`] maps an image to the slot equal to its width.
pub fn image_bytes(name: &str, width: u32) -> Vec<u8> {
    let format = if name.to_ascii_lowercase().ends_with(".png") {
        ImageFormat::Png
    } else {
        ImageFormat::Jpeg
    };
    let image = DynamicImage::ImageRgb8(RgbImage::new(width, 1));
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

pub fn uploaded(name: &str, width: u32) -> UploadedFile {
    let content_type = if name.ends_with(".png") { "image/png" } else { "image/jpeg" };
    UploadedFile {
        name: name.to_string(),
        content_type: content_type.to_string(),
        bytes: image_bytes(name, width),
    }
}

// ---------------------------------------------------------------------------
// Embedding
// ---------------------------------------------------------------------------

/// Images embed to `one_hot(width)`; texts embed to the slot registered for them.
#[derive(Default)]
pub struct FakeEmbedder {
    labels: Mutex<BTreeMap<String, usize>>,
    pub fail_images: AtomicBool,
    pub text_calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn with_label(self, text: &str, slot: usize) -> Self {
        self.labels.lock().unwrap().insert(text.to_string(), slot);
        self
    }
}

impl EmbeddingProvider for FakeEmbedder {
    fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        let slot = self
            .labels
            .lock()
            .unwrap()
            .get(text)
            .copied()
            .unwrap_or(EMBEDDING_DIM - 1);
        Ok(one_hot(slot))
    }

    fn embed_image(&self, image: &DynamicImage) -> Result<Vec<f32>> {
        anyhow::ensure!(!self.fail_images.load(Ordering::SeqCst), "inference failed");
        Ok(one_hot(image.width() as usize))
    }
}

// ---------------------------------------------------------------------------
// Vector collection
// ---------------------------------------------------------------------------

/// Brute-force cosine collection.
#[derive(Default)]
pub struct MemoryCollection {
    records: Mutex<BTreeMap<String, (Vec<f32>, Value)>>,
    pub index_builds: AtomicUsize,
    pub fail_upsert: AtomicBool,
}

impl MemoryCollection {
    pub fn metadata(&self, id: &str) -> Option<Value> {
        self.records.lock().unwrap().get(id).map(|(_, m)| m.clone())
    }

    pub fn vector(&self, id: &str) -> Option<Vec<f32>> {
        self.records.lock().unwrap().get(id).map(|(v, _)| v.clone())
    }

    pub fn insert(&self, id: &str, vector: Vec<f32>, metadata: Value) {
        self.records
            .lock()
            .unwrap()
            .insert(id.to_string(), (vector, metadata));
    }
}

impl VectorCollection for MemoryCollection {
    fn name(&self) -> &str {
        "image_vectors"
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIM
    }

    fn upsert(&self, records: &[Record]) -> Result<()> {
        anyhow::ensure!(!self.fail_upsert.load(Ordering::SeqCst), "collection unavailable");
        let mut map = self.records.lock().unwrap();
        for r in records {
            map.insert(r.id.clone(), (r.vector.clone(), r.metadata.clone()));
        }
        Ok(())
    }

    fn create_index(&self) -> Result<()> {
        self.index_builds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn query(&self, vector: &[f32], limit: usize, filter: &Filter) -> Result<Vec<String>> {
        let map = self.records.lock().unwrap();
        let mut hits: Vec<(f32, &String)> = map
            .iter()
            .filter(|(_, (_, metadata))| filter.matches(metadata))
            .map(|(id, (v, _))| (Measure::Cosine.distance(vector, v), id))
            .collect();
        hits.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));
        Ok(hits.into_iter().take(limit).map(|(_, id)| id.clone()).collect())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.records.lock().unwrap().len())
    }

    fn ids(&self) -> Result<Vec<String>> {
        Ok(self.records.lock().unwrap().keys().cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// Object store
// ---------------------------------------------------------------------------

struct Entry {
    name: String,
    bytes: Vec<u8>,
    created_at: DateTime<Utc>,
}

/// In-memory bucket with monotonically increasing creation times.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<Vec<Entry>>,
    clock: AtomicUsize,
    /// Uploads of this name fail.
    pub fail_name: Mutex<Option<String>>,
    pub removed: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn names(&self) -> Vec<String> {
        self.objects.lock().unwrap().iter().map(|e| e.name.clone()).collect()
    }

    pub fn bytes(&self, name: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.bytes.clone())
    }

    fn tick(&self) -> DateTime<Utc> {
        let t = self.clock.fetch_add(1, Ordering::SeqCst) as i64;
        Utc.timestamp_opt(1_700_000_000 + t, 0).unwrap()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload(&self, name: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        if self.fail_name.lock().unwrap().as_deref() == Some(name) {
            anyhow::bail!("storage rejected {name}");
        }
        let created_at = self.tick();
        let mut objects = self.objects.lock().unwrap();
        match objects.iter_mut().find(|e| e.name == name) {
            Some(existing) => existing.bytes = bytes,
            None => objects.push(Entry {
                name: name.to_string(),
                bytes,
                created_at,
            }),
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<StoredObject>> {
        let mut listed: Vec<StoredObject> = self
            .objects
            .lock()
            .unwrap()
            .iter()
            .map(|e| StoredObject {
                name: e.name.clone(),
                created_at: Some(e.created_at),
            })
            .collect();
        listed.sort_by_key(|o| o.created_at);
        Ok(listed)
    }

    async fn remove(&self, names: &[String]) -> Result<()> {
        self.objects.lock().unwrap().retain(|e| !names.contains(&e.name));
        self.removed.lock().unwrap().extend(names.iter().cloned());
        Ok(())
    }

    fn public_url(&self, name: &str) -> String {
        format!("{CDN}{name}")
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Knows one user: alice, whose token is [`ALICE_TOKEN`].
#[derive(Default)]
pub struct FakeIdentity {
    pub signed_out: Mutex<Vec<String>>,
}

fn alice() -> Session {
    Session {
        access_token: ALICE_TOKEN.to_string(),
        email: ALICE_EMAIL.to_string(),
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, SignInError> {
        if email == ALICE_EMAIL && password == ALICE_PASSWORD {
            Ok(alice())
        } else {
            Err(SignInError::InvalidCredentials)
        }
    }

    async fn verify(&self, access_token: &str) -> Result<Option<Session>> {
        Ok((access_token == ALICE_TOKEN).then(alice))
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        self.signed_out.lock().unwrap().push(access_token.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// Fakes plus a config pointing at a temporary scratch directory.
pub struct Harness {
    pub config: PicsearchConfig,
    pub store: Arc<MemoryStore>,
    pub collection: Arc<MemoryCollection>,
    pub embedder: Arc<FakeEmbedder>,
    pub identity: Arc<FakeIdentity>,
    pub scratch: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_embedder(FakeEmbedder::default().with_label("a dog", 10))
    }

    pub fn with_embedder(embedder: FakeEmbedder) -> Self {
        let scratch = tempfile::tempdir().unwrap();
        let mut config = PicsearchConfig::default();
        config.storage.public_url = CDN.to_string();
        config.upload.scratch_dir = scratch.path().to_string_lossy().into_owned();
        Self {
            config,
            store: Arc::new(MemoryStore::default()),
            collection: Arc::new(MemoryCollection::default()),
            embedder: Arc::new(embedder),
            identity: Arc::new(FakeIdentity::default()),
            scratch,
        }
    }

    pub fn indexer(&self) -> Indexer {
        Indexer::new(self.collection.clone(), self.embedder.clone())
    }

    pub fn uploader(&self) -> Uploader {
        Uploader::new(
            self.store.clone(),
            self.indexer(),
            self.scratch.path().to_path_buf(),
            self.config.upload.accepted_types.clone(),
        )
    }

    pub fn searcher(&self) -> Searcher {
        Searcher::from_config(
            self.collection.clone(),
            self.embedder.clone(),
            &self.config.search,
        )
    }

    pub fn app_state(&self) -> picsearch::web::AppState {
        picsearch::web::AppState::new(
            Arc::new(self.config.clone()),
            self.identity.clone(),
            self.store.clone(),
            self.collection.clone(),
            self.embedder.clone(),
        )
        .unwrap()
    }

    /// Entries left in the scratch root (batch directories should all be gone).
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch.path()).unwrap().count()
    }
}
