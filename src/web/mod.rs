//! HTTP surface: one page plus the form endpoints that drive it.
//!
//! | Route          | Purpose                                            |
//! |----------------|----------------------------------------------------|
//! | `GET /`        | gallery, or search results when `?q=` is non-blank |
//! | `POST /upload` | multipart `files`, needs a session                 |
//! | `POST /login`  | form `email` + `password`, sets the session cookie |
//! | `POST /logout` | clears the session cookie                          |
//! | `GET /healthz` | liveness                                           |

pub mod page;

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tera::Tera;
use tower_http::trace::TraceLayer;

use crate::auth::{can_search, can_upload, IdentityProvider, Session, SignInError};
use crate::config::PicsearchConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{AppError, AppResult};
use crate::gallery::{listing_names, Gallery};
use crate::pipeline::{Indexer, SearchOutcome, Searcher, UploadedFile, Uploader};
use crate::storage::ObjectStore;
use crate::vectors::VectorCollection;

use page::{Mode, PageView};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    config: Arc<PicsearchConfig>,
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn ObjectStore>,
    uploader: Uploader,
    searcher: Searcher,
    templates: Arc<Tera>,
    url_prefix: String,
}

impl AppState {
    pub fn new(
        config: Arc<PicsearchConfig>,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn ObjectStore>,
        collection: Arc<dyn VectorCollection>,
        embedding: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let indexer = Indexer::new(collection.clone(), embedding.clone());
        let uploader = Uploader::new(
            store.clone(),
            indexer,
            config.resolved_scratch_dir(),
            config.upload.accepted_types.clone(),
        );
        let searcher = Searcher::from_config(collection, embedding, &config.search);
        let templates = page::templates()?;
        let url_prefix = config.public_url_prefix();

        Ok(Self {
            config,
            identity,
            store,
            uploader,
            searcher,
            templates,
            url_prefix,
        })
    }

    /// Session for the cookie on this request, if any. A provider outage is logged and
    /// treated as anonymous so the public parts of the page keep working.
    async fn session(&self, jar: &CookieJar) -> Option<Session> {
        let token = jar.get(&self.config.auth.cookie_name)?.value().to_string();
        if token.is_empty() {
            return None;
        }
        match self.identity.verify(&token).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "session verification failed");
                None
            }
        }
    }

    fn page(&self, session: Option<&Session>) -> PageView {
        PageView::new(
            session,
            &self.config.upload.accepted_types,
            self.config.gallery.row_size,
        )
    }

    /// Fill the grid from the bucket listing.
    async fn fill_listing(&self, view: &mut PageView) -> AppResult<()> {
        let objects = self.store.list().await?;
        let names = listing_names(&objects, &self.config.gallery);
        view.mode = Mode::Gallery;
        view.gallery = Gallery::build(&names, &self.url_prefix, self.config.gallery.row_size);
        Ok(())
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.upload.max_bytes;
    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

async fn index(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<SearchParams>,
) -> AppResult<Html<String>> {
    let session = state.session(&jar).await;
    let mut view = state.page(session.as_ref());

    if !can_search(state.config.auth.gate, session.as_ref()) {
        view.can_search = false;
        view.mode = Mode::Locked;
        return view.render(&state.templates);
    }

    view.query = params.q.clone();
    match state.searcher.search(&params.q).await? {
        SearchOutcome::Results(names) => {
            view.mode = Mode::Search;
            view.gallery = Gallery::build(&names, &state.url_prefix, state.config.gallery.row_size);
        }
        SearchOutcome::Skipped => state.fill_listing(&mut view).await?,
    }
    view.render(&state.templates)
}

async fn upload(
    State(state): State<AppState>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> AppResult<Html<String>> {
    let session = state.session(&jar).await;
    if !can_upload(session.as_ref()) {
        return Err(AppError::Unauthorized);
    }

    let files = read_files(&mut multipart).await?;
    let outcome = state.uploader.upload(files).await?;

    let mut view = state.page(session.as_ref());
    view.upload = outcome;
    state.fill_listing(&mut view).await?;
    view.render(&state.templates)
}

/// Collect the `files` parts. Parts without a file name or without content are what
/// browsers send when nothing was selected, so they are skipped.
async fn read_files(multipart: &mut Multipart) -> AppResult<Vec<UploadedFile>> {
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        if name.is_empty() || bytes.is_empty() {
            continue;
        }
        files.push(UploadedFile {
            name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Ok(files)
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    email: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    match state.identity.sign_in(&form.email, &form.password).await {
        Ok(session) => {
            let cookie = Cookie::build((state.config.auth.cookie_name.clone(), session.access_token))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .build();
            Ok((jar.add(cookie), Redirect::to("/")).into_response())
        }
        Err(SignInError::InvalidCredentials) => {
            let mut view = state.page(None);
            view.login_error = Some("Invalid login credentials".to_string());
            if can_search(state.config.auth.gate, None) {
                state.fill_listing(&mut view).await?;
            } else {
                view.can_search = false;
                view.mode = Mode::Locked;
            }
            Ok(view.render(&state.templates)?.into_response())
        }
        Err(SignInError::Provider(e)) => Err(AppError::Internal(e)),
    }
}

async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let name = state.config.auth.cookie_name.clone();
    if let Some(token) = jar.get(&name).map(|c| c.value().to_string()) {
        if let Err(e) = state.identity.sign_out(&token).await {
            tracing::warn!(error = %e, "sign-out failed, clearing cookie anyway");
        }
    }
    (jar.remove(Cookie::build((name, "")).path("/")), Redirect::to("/"))
}

async fn healthz() -> &'static str {
    "ok"
}
