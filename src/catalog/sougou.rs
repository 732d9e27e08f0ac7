//! Sougou pinyin dictionary catalog (`pinyin.sogou.com`).

use scraper::Html;
use tracing::{debug, warn};

use super::extract::{last_segment, page_count, resolve_href, select_all, select_first, text_of, title_of};
use super::{CatalogSite, ExtractedLink, PageKind, PageRef};
use crate::models::{CatalogEntry, CategoryPath, SourceKind};

pub const BASE_URL: &str = "https://pinyin.sogou.com";

/// Pseudo-category for dictionaries listed outside any category.
const UNCATEGORIZED_ID: &str = "0";
const UNCATEGORIZED_DIR: &str = "未分类_0";
const OFFICIAL_DICT_ID: &str = "4";
const OFFICIAL_DICT_NAME: &str = "网络流行新词【官方推荐】";

/// City dictionaries have no landing page of their own; their sub-categories
/// are listed on category 180 and all belong to 167.
const CITY_ID: &str = "167";
const CITY_DIR: &str = "城市信息大全_167";
const CITY_LIST_ID: &str = "180";

#[derive(Debug, Clone)]
pub struct Sougou {
    base_url: String,
}

impl Sougou {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn index_url(&self) -> String {
        format!("{}/dict/", self.base_url)
    }

    fn category_url(&self, id: &str) -> String {
        format!("{}/dict/cate/index/{}", self.base_url, id)
    }

    /// Links to start crawling a single top-level category.
    fn category_seed(&self, id: &str) -> Vec<ExtractedLink> {
        match id {
            UNCATEGORIZED_ID => {
                let category = CategoryPath::root(UNCATEGORIZED_DIR);
                let official = CatalogEntry {
                    source: SourceKind::Sougou,
                    category: category.clone(),
                    name: OFFICIAL_DICT_NAME.to_string(),
                    id: OFFICIAL_DICT_ID.to_string(),
                    url: format!(
                        "{}/d/dict/download_cell.php?id={}&name={}",
                        self.base_url,
                        OFFICIAL_DICT_ID,
                        urlencoding::encode(OFFICIAL_DICT_NAME)
                    ),
                    size_hint: None,
                };
                let recommended = PageRef::new(
                    format!("{}/dict/detail/index/{}", self.base_url, OFFICIAL_DICT_ID),
                    PageKind::Recommended,
                    category,
                );
                vec![ExtractedLink::Entry(official), ExtractedLink::Page(recommended)]
            }
            CITY_ID => vec![ExtractedLink::Page(
                PageRef::new(
                    self.category_url(CITY_LIST_ID),
                    PageKind::CityIndex,
                    CategoryPath::root(CITY_DIR),
                )
                .with_id(CITY_ID),
            )],
            _ => vec![ExtractedLink::Page(
                PageRef::new(
                    self.category_url(id),
                    PageKind::Category,
                    CategoryPath::default(),
                )
                .with_id(id),
            )],
        }
    }

    fn parse_index(&self, document: &Html) -> Vec<ExtractedLink> {
        let mut links = self.category_seed(UNCATEGORIZED_ID);
        for anchor in select_all(document, "div.dict_category_list_title a") {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let path = href.split('?').next().unwrap_or(href);
            let id = last_segment(path.trim_end_matches('/'));
            if id.is_empty() {
                continue;
            }
            let mut seed = self.category_seed(id);
            for link in &mut seed {
                if let ExtractedLink::Page(page) = link {
                    page.name = text_of(&anchor);
                }
            }
            links.extend(seed);
        }
        links
    }

    fn parse_category(&self, page: &PageRef, document: &Html) -> Vec<ExtractedLink> {
        let title = title_of(document).unwrap_or_else(|| page.name.clone());
        let label = title.split('_').next().unwrap_or("").trim();
        let dir = format!("{}_{}", label, page.id);
        let category = if page.category.is_empty() {
            CategoryPath::root(dir)
        } else {
            page.category.child(dir)
        };

        let pager: Vec<String> = select_all(document, "div#dict_page_list a")
            .iter()
            .map(text_of)
            .collect();
        let pages = page_count(&pager);
        debug!("Sougou category {} has {} page(s)", category, pages);

        let base = page.url.trim_end_matches('/');
        (1..=pages)
            .map(|n| {
                ExtractedLink::Page(
                    PageRef::new(
                        format!("{}/default/{}", base, n),
                        PageKind::Listing,
                        category.clone(),
                    )
                    .with_id(page.id.clone()),
                )
            })
            .collect()
    }

    fn parse_city_index(&self, page: &PageRef, document: &Html) -> Vec<ExtractedLink> {
        select_all(document, "div.citylistcate a")
            .iter()
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?;
                let id = last_segment(href.trim_end_matches('/'));
                if id.is_empty() {
                    return None;
                }
                Some(ExtractedLink::Page(
                    PageRef::new(self.category_url(id), PageKind::Category, page.category.clone())
                        .with_id(id)
                        .with_name(text_of(anchor)),
                ))
            })
            .collect()
    }

    fn parse_listing(&self, page: &PageRef, document: &Html) -> Vec<ExtractedLink> {
        let mut links = Vec::new();
        for block in select_all(document, "div.dict_detail_block") {
            let Some(title) = select_first(&block, "div.detail_title a") else {
                continue;
            };
            let id = title
                .value()
                .attr("href")
                .map(|href| last_segment(href.trim_end_matches('/')).to_string())
                .unwrap_or_default();
            let url = select_first(&block, "div.dict_dl_btn a")
                .and_then(|a| a.value().attr("href").map(str::to_string))
                .and_then(|href| resolve_href(&page.url, &href));

            match url {
                Some(url) if !id.is_empty() => links.push(ExtractedLink::Entry(CatalogEntry {
                    source: SourceKind::Sougou,
                    category: page.category.clone(),
                    name: text_of(&title),
                    id,
                    url,
                    size_hint: None,
                })),
                _ => warn!("Skipping malformed Sougou entry on {}", page.url),
            }
        }
        links
    }

    fn parse_recommended(&self, page: &PageRef, document: &Html) -> Vec<ExtractedLink> {
        let mut links = Vec::new();
        for block in select_all(document, "div.rcmd_dict") {
            let Some(title) = select_first(&block, "div.rcmd_dict_title a") else {
                continue;
            };
            let id = title
                .value()
                .attr("href")
                .map(|href| last_segment(href.trim_end_matches('/')).to_string())
                .unwrap_or_default();
            let url = select_first(&block, "div.rcmd_dict_dl_btn a")
                .and_then(|a| a.value().attr("href").map(str::to_string))
                .and_then(|href| resolve_href(&page.url, &href));

            if let (Some(url), false) = (url, id.is_empty()) {
                links.push(ExtractedLink::Entry(CatalogEntry {
                    source: SourceKind::Sougou,
                    category: page.category.clone(),
                    name: text_of(&title),
                    id,
                    url,
                    size_hint: None,
                }));
            }
        }
        links
    }
}

impl Default for Sougou {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogSite for Sougou {
    fn source(&self) -> SourceKind {
        SourceKind::Sougou
    }

    fn seeds(&self, categories: Option<&[String]>) -> Vec<ExtractedLink> {
        match categories {
            None => vec![ExtractedLink::Page(PageRef::new(
                self.index_url(),
                PageKind::Index,
                CategoryPath::default(),
            ))],
            Some(ids) => ids.iter().flat_map(|id| self.category_seed(id.trim())).collect(),
        }
    }

    fn extract_links(&self, page: &PageRef, html: &str) -> Vec<ExtractedLink> {
        let document = Html::parse_document(html);
        match page.kind {
            PageKind::Index => self.parse_index(&document),
            PageKind::Category => self.parse_category(page, &document),
            PageKind::CityIndex => self.parse_city_index(page, &document),
            PageKind::Listing => self.parse_listing(page, &document),
            PageKind::Recommended => self.parse_recommended(page, &document),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(links: &[ExtractedLink]) -> Vec<&PageRef> {
        links
            .iter()
            .filter_map(|l| match l {
                ExtractedLink::Page(p) => Some(p),
                ExtractedLink::Entry(_) => None,
            })
            .collect()
    }

    fn entries(links: &[ExtractedLink]) -> Vec<&CatalogEntry> {
        links
            .iter()
            .filter_map(|l| match l {
                ExtractedLink::Entry(e) => Some(e),
                ExtractedLink::Page(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_index_lists_categories_and_uncategorized() {
        let html = r#"<html><body>
            <div class="dict_category_list_title"><a href="/dict/cate/index/1?rf=dictindex">城市信息</a></div>
            <div class="dict_category_list_title"><a href="/dict/cate/index/167?rf=dictindex">城市信息大全</a></div>
        </body></html>"#;
        let site = Sougou::new();
        let root = &site.seeds(None);
        let ExtractedLink::Page(index) = &root[0] else {
            panic!("expected index page");
        };
        let links = site.extract_links(index, html);

        let official = entries(&links);
        assert_eq!(official.len(), 1);
        assert_eq!(official[0].id, "4");
        assert_eq!(official[0].category.to_string(), "未分类_0");

        let pages = pages(&links);
        assert_eq!(pages[0].kind, PageKind::Recommended);
        assert_eq!(pages[1].url, "https://pinyin.sogou.com/dict/cate/index/1");
        assert_eq!(pages[1].kind, PageKind::Category);
        assert_eq!(pages[2].url, "https://pinyin.sogou.com/dict/cate/index/180");
        assert_eq!(pages[2].kind, PageKind::CityIndex);
    }

    #[test]
    fn test_category_paginates() {
        let html = r##"<html><head><title>自然科学_搜狗输入法词库</title></head><body>
            <div id="dict_page_list"><a href="#">1</a><a href="#">2</a><a href="#">3</a><a href="#">下一页</a></div>
        </body></html>"##;
        let site = Sougou::new();
        let page = PageRef::new(
            "https://pinyin.sogou.com/dict/cate/index/1",
            PageKind::Category,
            CategoryPath::default(),
        )
        .with_id("1");
        let links = site.extract_links(&page, html);
        let pages = pages(&links);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[2].url, "https://pinyin.sogou.com/dict/cate/index/1/default/3");
        assert!(pages.iter().all(|p| p.category.to_string() == "自然科学_1"));
    }

    #[test]
    fn test_city_category_nests_under_city_root() {
        let html = "<html><head><title>北京_搜狗输入法词库</title></head><body></body></html>";
        let site = Sougou::new();
        let page = PageRef::new(
            "https://pinyin.sogou.com/dict/cate/index/360",
            PageKind::Category,
            CategoryPath::root(CITY_DIR),
        )
        .with_id("360");
        let links = site.extract_links(&page, html);
        let pages = pages(&links);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].category.to_string(), "城市信息大全_167/北京_360");
    }

    #[test]
    fn test_listing_extracts_entries() {
        let html = r#"<html><body>
            <div class="dict_detail_block">
                <div class="detail_title"><a href="/dict/detail/index/15117">天线行业/BSA</a></div>
                <div class="dict_dl_btn"><a href="https://pinyin.sogou.com/d/dict/download_cell.php?id=15117&amp;name=x">下载</a></div>
            </div>
            <div class="dict_detail_block">
                <div class="detail_title"><a href="/dict/detail/index/2">no link</a></div>
            </div>
        </body></html>"#;
        let site = Sougou::new();
        let page = PageRef::new(
            "https://pinyin.sogou.com/dict/cate/index/1/default/1",
            PageKind::Listing,
            CategoryPath::root("自然科学_1"),
        );
        let links = site.extract_links(&page, html);
        let entries = entries(&links);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "天线行业/BSA");
        assert_eq!(entries[0].id, "15117");
        assert_eq!(
            entries[0].url,
            "https://pinyin.sogou.com/d/dict/download_cell.php?id=15117&name=x"
        );
    }

    #[test]
    fn test_explicit_categories_skip_index() {
        let site = Sougou::new();
        let seeds = site.seeds(Some(&["167".to_string(), "0".to_string()]));
        assert!(seeds.iter().all(|l| l.url() != "https://pinyin.sogou.com/dict/"));
        assert_eq!(seeds.len(), 3);
    }
}
