use ofertas_common::{OfertasError, Result};
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

/// Compile a CSS selector taken from configuration.
pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| OfertasError::Config(format!("invalid selector {css:?}: {e}")))
}

/// Collapse runs of whitespace into single spaces.
pub(crate) fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of an element, whitespace collapsed.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    squash(&el.text().collect::<Vec<_>>().join(" "))
}

/// Text of the whole document without `script`/`style` bodies.
pub(crate) fn page_text(doc: &Html) -> String {
    let mut parts = Vec::new();
    for node in doc.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .is_some_and(|name| matches!(name, "script" | "style" | "noscript"));
        if !hidden {
            parts.push(&**text);
        }
    }
    squash(&parts.join(" "))
}

/// Resolve an `href` against the page it was found on.
///
/// Fragments, `javascript:` and `mailto:` links are not offers.
pub(crate) fn absolute_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// First `a[href]` under `el`, resolved.
pub(crate) fn first_link(el: ElementRef<'_>, anchors: &Selector, base: &Url) -> Option<Url> {
    el.select(anchors)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| absolute_link(base, href))
}

/// `base` with `param=page` added to its query.
pub(crate) fn page_url(base: &Url, param: &str, page: usize) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut().append_pair(param, &page.to_string());
    url
}
