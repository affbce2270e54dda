//! Object-storage bucket.
//!
//! The bucket is a flat namespace keyed by file name. [`ObjectStore`] is the seam;
//! [`supabase::SupabaseStorage`] talks to the storage REST API.

pub mod supabase;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A bucket listing entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredObject {
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `bytes` at `name`, overwriting any existing object.
    async fn upload(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// All objects, oldest first.
    async fn list(&self) -> Result<Vec<StoredObject>>;

    async fn remove(&self, names: &[String]) -> Result<()>;

    /// Public URL of an object.
    fn public_url(&self, name: &str) -> String;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NameError {
    #[error("file name is empty")]
    Empty,
    #[error("file name {0:?} must not contain path separators")]
    PathSeparator(String),
    #[error("file name {0:?} has no extension")]
    NoExtension(String),
    #[error("file type {0:?} is not accepted")]
    NotAccepted(String),
}

/// Public URL of `name` under `prefix`, with the name percent-encoded as one path
/// segment. Falls back to plain concatenation when the prefix is not an absolute URL.
pub fn object_url(prefix: &str, name: &str) -> String {
    let Ok(mut url) = reqwest::Url::parse(prefix) else {
        return format!("{prefix}{name}");
    };
    match url.path_segments_mut() {
        Ok(mut segments) => {
            segments.pop_if_empty().push(name);
        }
        Err(()) => return format!("{prefix}{name}"),
    }
    url.to_string()
}

/// Suffix after the last `.`, if there is a non-empty one.
pub fn file_type(name: &str) -> Option<&str> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

/// Check that `name` can be used as a flat bucket key and that its suffix is one of
/// `accepted` (compared case-insensitively). Returns the suffix.
pub fn validate_object_name<'a, S: AsRef<str>>(
    name: &'a str,
    accepted: &[S],
) -> Result<&'a str, NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(NameError::PathSeparator(name.to_string()));
    }
    let ext = file_type(name).ok_or_else(|| NameError::NoExtension(name.to_string()))?;
    if !accepted.iter().any(|a| a.as_ref().eq_ignore_ascii_case(ext)) {
        return Err(NameError::NotAccepted(ext.to_string()));
    }
    Ok(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCEPTED: [&str; 2] = ["png", "jpg"];

    #[test]
    fn object_url_encodes_the_name() {
        let prefix = "https://cdn.test/storage/v1/object/public/images/";
        assert_eq!(object_url(prefix, "dog.jpg"), format!("{prefix}dog.jpg"));
        assert_eq!(
            object_url(prefix, "my cat#1.png"),
            format!("{prefix}my%20cat%231.png")
        );
        assert_eq!(object_url(prefix, "50%?.png"), format!("{prefix}50%25%3F.png"));
    }

    #[test]
    fn object_url_without_absolute_prefix_concatenates() {
        assert_eq!(object_url("p/", "a.png"), "p/a.png");
    }

    #[test]
    fn file_type_is_last_suffix() {
        assert_eq!(file_type("cat.png"), Some("png"));
        assert_eq!(file_type("my.cat.jpg"), Some("jpg"));
        assert_eq!(file_type("README"), None);
        assert_eq!(file_type("trailing."), None);
    }

    #[test]
    fn accepts_plain_image_names() {
        assert_eq!(validate_object_name("dog.jpg", &ACCEPTED), Ok("jpg"));
        assert_eq!(validate_object_name("Dog.PNG", &ACCEPTED), Ok("PNG"));
    }

    #[test]
    fn rejects_bad_names() {
        assert_eq!(validate_object_name("", &ACCEPTED), Err(NameError::Empty));
        assert_eq!(
            validate_object_name("../etc/passwd.png", &ACCEPTED),
            Err(NameError::PathSeparator("../etc/passwd.png".into()))
        );
        assert_eq!(
            validate_object_name("dir\\a.png", &ACCEPTED),
            Err(NameError::PathSeparator("dir\\a.png".into()))
        );
        assert_eq!(
            validate_object_name("noext", &ACCEPTED),
            Err(NameError::NoExtension("noext".into()))
        );
        assert_eq!(
            validate_object_name("anim.gif", &ACCEPTED),
            Err(NameError::NotAccepted("gif".into()))
        );
    }

    #[test]
    fn listing_entry_parses_created_at() {
        let obj: StoredObject = serde_json::from_value(serde_json::json!({
            "name": "a.png",
            "id": "9f0c",
            "created_at": "2024-01-02T03:04:05.000Z",
            "metadata": {"size": 10}
        }))
        .unwrap();
        assert_eq!(obj.name, "a.png");
        assert!(obj.created_at.is_some());
    }
}
