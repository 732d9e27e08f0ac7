//! Catalog sites and breadth-first discovery of their dictionaries.
//!
//! Each site knows how to seed a crawl and how to turn one fetched page
//! into further pages and leaf entries. Parsing is synchronous and pure;
//! all network access happens in [`discovery`].

mod baidu;
pub mod discovery;
mod extract;
mod sougou;

pub use baidu::Baidu;
pub use discovery::{discover, DiscoveryReport, EntryFilter};
pub use extract::normalize_url;
pub use sougou::Sougou;

use crate::models::{CatalogEntry, CategoryPath, SourceKind};

/// What a page is, which decides how it gets parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    /// Site root listing the top-level categories.
    Index,
    /// Category landing page carrying the title and pagination.
    Category,
    /// Page listing city sub-categories.
    CityIndex,
    /// One page of dictionaries inside a category.
    Listing,
    /// Recommended dictionaries that belong to no category.
    Recommended,
}

/// A page scheduled for fetching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRef {
    pub url: String,
    pub kind: PageKind,
    /// Category the page belongs to. Empty until a category title is known.
    pub category: CategoryPath,
    /// Category id for category pages.
    pub id: String,
    /// Link text the page was found under.
    pub name: String,
}

impl PageRef {
    pub fn new(url: impl Into<String>, kind: PageKind, category: CategoryPath) -> Self {
        Self {
            url: url.into(),
            kind,
            category,
            id: String::new(),
            name: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Something found on a catalog page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractedLink {
    /// A category or pagination link to crawl further.
    Page(PageRef),
    /// A downloadable dictionary.
    Entry(CatalogEntry),
}

impl ExtractedLink {
    pub fn is_category(&self) -> bool {
        matches!(self, Self::Page(_))
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Page(page) => &page.url,
            Self::Entry(entry) => &entry.url,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Page(page) => &page.name,
            Self::Entry(entry) => &entry.name,
        }
    }
}

/// Per-site crawl rules.
pub trait CatalogSite: Send + Sync {
    fn source(&self) -> SourceKind;

    /// Starting points. `None` means every category on the index page.
    fn seeds(&self, categories: Option<&[String]>) -> Vec<ExtractedLink>;

    /// Parse a fetched page into further pages and entries, in document order.
    fn extract_links(&self, page: &PageRef, html: &str) -> Vec<ExtractedLink>;
}

/// Build the site implementation for a source.
pub fn site_for(source: SourceKind) -> Box<dyn CatalogSite> {
    match source {
        SourceKind::Sougou => Box::new(Sougou::new()),
        SourceKind::Baidu => Box::new(Baidu::new()),
    }
}
