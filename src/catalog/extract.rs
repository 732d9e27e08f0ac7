//! Small HTML and URL helpers shared by the site parsers.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

/// Resolve an href against the page it appeared on.
///
/// Handles absolute, root-relative, protocol-relative and relative links.
pub fn resolve_href(page_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    let base = Url::parse(page_url).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

/// Canonical form used to de-duplicate page URLs: parsed, fragment removed.
pub fn normalize_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.trim().to_string(),
    }
}

/// Part after the last `/`.
pub fn last_segment(s: &str) -> &str {
    s.rsplit('/').next().unwrap_or(s)
}

/// Select all elements matching `css` under the document root.
pub fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(e) => {
            debug!("Invalid selector {}: {:?}", css, e);
            Vec::new()
        }
    }
}

/// First element matching `css` below `element`.
pub fn select_first<'a>(element: &ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    element.select(&selector).next()
}

/// Whitespace-trimmed text content of an element.
pub fn text_of(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Text of the document `<title>`.
pub fn title_of(document: &Html) -> Option<String> {
    select_all(document, "title")
        .first()
        .map(text_of)
        .filter(|t| !t.is_empty())
}

/// Number of listing pages given the pagination links of a category page.
///
/// Fewer than two links means a single page. Otherwise the second-to-last
/// link (the one before "next") holds the last page number.
pub fn page_count(link_texts: &[String]) -> u32 {
    if link_texts.len() < 2 {
        return 1;
    }
    let candidate = &link_texts[link_texts.len() - 2];
    match candidate.trim().parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => {
            debug!("Unparseable page number {:?}, assuming one page", candidate);
            1
        }
    }
}
