//! Catalog entries discovered from a dictionary site.
//!
//! Entries are immutable once parsed from a listing page; everything
//! downstream (path planning, fetching, reporting) only reads them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Dictionary site an entry was discovered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Sougou,
    Baidu,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::Sougou, SourceKind::Baidu];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sougou => "sougou",
            Self::Baidu => "baidu",
        }
    }

    /// File extension the downstream converters expect for this source.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Sougou => "scel",
            Self::Baidu => "bdict",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category directory names from the catalog root down to the leaf category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryPath(Vec<String>);

impl CategoryPath {
    /// A single-component path for a top-level category.
    pub fn root(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    /// Path of a sub-category below this one.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut components = self.0.clone();
        components.push(name.into());
        Self(components)
    }

    pub fn components(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CategoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// One downloadable dictionary found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Site the entry was discovered on.
    pub source: SourceKind,
    /// Category the entry is listed under.
    pub category: CategoryPath,
    /// Display name as shown by the site (may be empty).
    pub name: String,
    /// Site-specific dictionary id.
    pub id: String,
    /// Absolute download URL.
    pub url: String,
    /// Size advertised by the listing, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_hint: Option<u64>,
}

impl CatalogEntry {
    /// Key used to de-duplicate entries within a run.
    pub fn dedup_key(&self) -> &str {
        &self.url
    }

    /// Short human-readable label for logs, e.g. `sougou:城市信息_1234`.
    pub fn label(&self) -> String {
        format!("{}:{}_{}", self.source, self.name, self.id)
    }
}
