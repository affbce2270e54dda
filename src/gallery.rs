//! Gallery rendering: image names → rows of tiles.
//!
//! Rows hold [`GalleryConfig::row_size`] tiles (5 by default). A bucket listing is
//! ordered by creation time, optionally narrowed to one file type and optionally
//! started at the second object; search results are shown as returned.

use serde::Serialize;

use crate::config::GalleryConfig;
use crate::storage::{file_type, object_url, StoredObject};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tile {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Gallery {
    pub rows: Vec<Vec<Tile>>,
}

impl Gallery {
    /// Lay out `names` in rows of `row_size`, each tile addressed as `url_prefix` plus
    /// the percent-encoded name.
    pub fn build(names: &[String], url_prefix: &str, row_size: usize) -> Self {
        let tiles: Vec<Tile> = names
            .iter()
            .map(|name| Tile {
                name: name.clone(),
                url: object_url(url_prefix, name),
            })
            .collect();
        Self {
            rows: group_rows(&tiles, row_size),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn tile_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }
}

/// Split `items` into consecutive groups of `size` (the last may be shorter).
/// A size of 0 is treated as 1.
pub fn group_rows<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items.chunks(size.max(1)).map(<[T]>::to_vec).collect()
}

/// Names to show when no search is active: oldest first, then the optional type
/// filter, then the optional skip of the first remaining object.
pub fn listing_names(objects: &[StoredObject], config: &GalleryConfig) -> Vec<String> {
    let mut sorted: Vec<&StoredObject> = objects.iter().collect();
    sorted.sort_by_key(|o| o.created_at);

    let skip = usize::from(config.skip_first);
    sorted
        .into_iter()
        .filter(|o| match &config.only_type {
            Some(wanted) => file_type(&o.name) == Some(wanted.as_str()),
            None => true,
        })
        .skip(skip)
        .map(|o| o.name.clone())
        .collect()
}
