//! Page view model and template rendering.

use std::sync::Arc;

use axum::response::Html;
use serde::Serialize;
use tera::{Context, Tera};

use crate::auth::Session;
use crate::error::AppResult;
use crate::gallery::Gallery;
use crate::pipeline::UploadOutcome;

const TPL_INDEX: &str = include_str!("templates/index.html");

/// Templates are embedded so the binary is self-contained.
pub fn templates() -> tera::Result<Arc<Tera>> {
    let mut tera = Tera::default();
    tera.add_raw_template("index.html", TPL_INDEX)?;
    Ok(Arc::new(tera))
}

/// What the grid is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Bucket listing.
    Gallery,
    Search,
    /// Anonymous visitor under a login-for-everything policy.
    Locked,
}

/// Everything one render of the page needs. Built fresh per request.
#[derive(Debug, Serialize)]
pub struct PageView {
    pub email: Option<String>,
    pub can_search: bool,
    pub mode: Mode,
    pub query: String,
    pub gallery: Gallery,
    pub row_size: usize,
    pub upload: UploadOutcome,
    pub login_error: Option<String>,
    /// `accept` attribute for the file input, e.g. `.png,.jpg`.
    pub accept: String,
}

impl PageView {
    pub fn new(session: Option<&Session>, accepted_types: &[String], row_size: usize) -> Self {
        Self {
            email: session.map(|s| s.email.clone()),
            can_search: true,
            mode: Mode::Gallery,
            query: String::new(),
            gallery: Gallery::default(),
            row_size,
            upload: UploadOutcome::NotAttempted,
            login_error: None,
            accept: accepted_types
                .iter()
                .map(|t| format!(".{t}"))
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    pub fn render(&self, tera: &Tera) -> AppResult<Html<String>> {
        let mut context = Context::new();
        context.insert("vm", self);
        Ok(Html(tera.render("index.html", &context)?))
    }
}
