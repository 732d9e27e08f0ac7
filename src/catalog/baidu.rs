//! Baidu input method dictionary catalog (`shurufa.baidu.com`).

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use tracing::debug;

use super::extract::{page_count, select_all, text_of, title_of};
use super::{CatalogSite, ExtractedLink, PageKind, PageRef};
use crate::models::{CatalogEntry, CategoryPath, SourceKind};

pub const BASE_URL: &str = "https://shurufa.baidu.com";

/// Pagination anchors on a category page.
static PAGINATION_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"dict_list\?cid=(\d+)&page=(\d+)#page").unwrap());

#[derive(Debug, Clone)]
pub struct Baidu {
    base_url: String,
}

impl Baidu {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn category_page(&self, id: &str) -> PageRef {
        PageRef::new(
            format!("{}/dict_list?cid={}", self.base_url, id),
            PageKind::Category,
            CategoryPath::default(),
        )
        .with_id(id)
    }

    fn parse_index(&self, document: &Html) -> Vec<ExtractedLink> {
        select_all(
            document,
            r#"a[data-stats="webDictPage.dictSort.category1"]"#,
        )
        .iter()
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            let id = href.split_once('=').map(|(_, id)| id.trim())?;
            if id.is_empty() {
                return None;
            }
            Some(ExtractedLink::Page(
                self.category_page(id).with_name(text_of(anchor)),
            ))
        })
        .collect()
    }

    fn parse_category(&self, page: &PageRef, document: &Html) -> Vec<ExtractedLink> {
        let title = title_of(document).unwrap_or_else(|| page.name.clone());
        let label = title.rsplit('-').next().unwrap_or("").trim();
        let category = CategoryPath::root(format!("{}_{}", label, page.id));

        let pager: Vec<String> = select_all(document, "a[href]")
            .iter()
            .filter(|a| {
                a.value()
                    .attr("href")
                    .is_some_and(|href| PAGINATION_HREF.is_match(href))
            })
            .map(text_of)
            .collect();
        let pages = page_count(&pager);
        debug!("Baidu category {} has {} page(s)", category, pages);

        (1..=pages)
            .map(|n| {
                ExtractedLink::Page(
                    PageRef::new(
                        format!("{}&page={}", page.url, n),
                        PageKind::Listing,
                        category.clone(),
                    )
                    .with_id(page.id.clone()),
                )
            })
            .collect()
    }

    fn parse_listing(&self, page: &PageRef, document: &Html) -> Vec<ExtractedLink> {
        select_all(document, "a.dict-down.dictClick")
            .iter()
            .filter_map(|anchor| {
                let id = anchor.value().attr("dict-innerid")?.trim();
                if id.is_empty() {
                    return None;
                }
                let name = anchor.value().attr("dict-name").unwrap_or("").trim();
                Some(ExtractedLink::Entry(CatalogEntry {
                    source: SourceKind::Baidu,
                    category: page.category.clone(),
                    name: name.to_string(),
                    id: id.to_string(),
                    url: format!("{}/dict_innerid_download?innerid={}", self.base_url, id),
                    size_hint: None,
                }))
            })
            .collect()
    }
}

impl Default for Baidu {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogSite for Baidu {
    fn source(&self) -> SourceKind {
        SourceKind::Baidu
    }

    fn seeds(&self, categories: Option<&[String]>) -> Vec<ExtractedLink> {
        match categories {
            None => vec![ExtractedLink::Page(PageRef::new(
                format!("{}/dict", self.base_url),
                PageKind::Index,
                CategoryPath::default(),
            ))],
            Some(ids) => ids
                .iter()
                .map(|id| ExtractedLink::Page(self.category_page(id.trim())))
                .collect(),
        }
    }

    fn extract_links(&self, page: &PageRef, html: &str) -> Vec<ExtractedLink> {
        let document = Html::parse_document(html);
        match page.kind {
            PageKind::Index => self.parse_index(&document),
            PageKind::Category => self.parse_category(page, &document),
            PageKind::Listing => self.parse_listing(page, &document),
            PageKind::CityIndex | PageKind::Recommended => Vec::new(),
        }
    }
}
