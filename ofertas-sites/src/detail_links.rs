//! Listing pages whose links lead to one detail page per offer.
use async_trait::async_trait;
use ofertas_common::{OfertasError, Result};
use ofertas_config::DetailLinksLayout;
use ofertas_core::{RawOffer, RawOfferSource};
use ofertas_http::{HttpClient, RequestOpts};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

use crate::html::{absolute_link, element_text, page_text, selector};

/// Used when no title selector matches on a detail page.
const FALLBACK_TITLE_CHARS: usize = 120;

pub struct DetailParser {
    anchors: Selector,
    titles: Vec<Selector>,
    layout: DetailLinksLayout,
}

impl DetailParser {
    pub fn new(layout: DetailLinksLayout) -> Result<Self> {
        let titles = layout
            .title_selectors
            .iter()
            .map(|css| selector(css))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            anchors: selector("a[href]")?,
            titles,
            layout,
        })
    }

    fn wanted_text(&self, text: &str) -> bool {
        let low = text.to_lowercase();
        let has = |words: &[String]| words.iter().any(|w| !w.is_empty() && low.contains(&w.to_lowercase()));
        !text.is_empty()
            && (self.layout.link_text_keywords.is_empty() || has(&self.layout.link_text_keywords))
            && !has(&self.layout.skip_link_texts)
    }

    /// The listing itself, or the index page the detail paths hang off.
    fn is_index(&self, url: &Url, base: &Url) -> bool {
        let trimmed = |u: &Url| u.path().trim_end_matches('/').to_string();
        let section = self.layout.link_contains.trim_end_matches('/');
        trimmed(url) == trimmed(base) || (!section.is_empty() && trimmed(url).ends_with(section))
    }

    /// Distinct detail URLs on the listing page, in document order.
    pub fn parse_listing(&self, html: &str, base: &Url) -> Vec<Url> {
        let doc = Html::parse_document(html);
        let mut seen = HashSet::new();
        doc.select(&self.anchors)
            .filter(|a| self.wanted_text(&element_text(*a)))
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| absolute_link(base, href))
            .filter(|url| url.as_str().contains(self.layout.link_contains.as_str()))
            .filter(|url| !self.is_index(url, base))
            .filter(|url| seen.insert(url.to_string()))
            .take(self.layout.max_details)
            .collect()
    }

    /// Bundle for one detail page; `None` when the page has no text at all.
    pub fn parse_detail(&self, html: &str, url: &Url) -> Option<RawOffer> {
        let doc = Html::parse_document(html);
        let text = page_text(&doc);
        if text.is_empty() {
            return None;
        }

        let title = self
            .titles
            .iter()
            .filter_map(|sel| doc.select(sel).next())
            .map(element_text)
            .find(|t| !t.is_empty())
            .unwrap_or_else(|| text.chars().take(FALLBACK_TITLE_CHARS).collect());

        let low = text.to_lowercase();
        let mentions = |words: &[String]| {
            words
                .iter()
                .any(|w| !w.is_empty() && low.contains(&w.to_lowercase()))
        };
        let status = if mentions(&self.layout.open_keywords) {
            Some("Abierta".to_string())
        } else if mentions(&self.layout.closed_keywords) {
            Some("Cerrada".to_string())
        } else {
            None
        };

        let mut raw = RawOffer::new(title);
        raw.link = Some(url.to_string());
        raw.status = status;
        raw.context = Some(text);
        Some(raw)
    }
}

pub struct DetailLinksSource {
    institute: String,
    url: String,
    http: HttpClient,
    parser: DetailParser,
}

impl DetailLinksSource {
    pub fn new(
        institute: String,
        url: String,
        http: HttpClient,
        layout: DetailLinksLayout,
    ) -> Result<Self> {
        Ok(Self {
            institute,
            url,
            http,
            parser: DetailParser::new(layout)?,
        })
    }
}

#[async_trait]
impl RawOfferSource for DetailLinksSource {
    fn institute(&self) -> &str {
        &self.institute
    }

    async fn collect(&self) -> Result<Vec<RawOffer>> {
        let base = Url::parse(&self.url)
            .map_err(|e| OfertasError::Config(format!("{}: {e}", self.url)))?;
        let listing = self
            .http
            .get_text(&self.url, RequestOpts::default())
            .await
            .map_err(|e| OfertasError::source(&self.institute, e.to_string()))?;
        let links = self.parser.parse_listing(&listing, &base);
        tracing::debug!(institute=%self.institute, links=links.len(), "sites.detail_links.listing");

        let mut out = Vec::with_capacity(links.len());
        for link in links {
            match self.http.get_text(link.as_str(), RequestOpts::default()).await {
                Ok(html) => {
                    if let Some(raw) = self.parser.parse_detail(&html, &link) {
                        out.push(raw);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        institute=%self.institute,
                        url=%link,
                        error=%e,
                        "sites.detail_links.detail_failed"
                    );
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> DetailLinksLayout {
        DetailLinksLayout {
            link_contains: "/convocatorias/ref-".into(),
            title_selectors: vec!["h1".into(), ".entry-title".into(), "h2".into()],
            open_keywords: vec!["abierta".into(), "publicada".into(), "vigente".into()],
            closed_keywords: vec!["cerrada".into(), "finalizada".into()],
            max_details: 10,
            link_text_keywords: Vec::new(),
            skip_link_texts: Vec::new(),
        }
    }

    #[test]
    fn listing_keeps_distinct_matching_links() {
        let html = r#"
<ul>
  <li><a href="/convocatorias/ref-12_2025-tecnico-laboratorio/">REF 12/2025 Técnico de laboratorio</a></li>
  <li><a href="https://ibsal.es/convocatorias/ref-12_2025-tecnico-laboratorio/">Ver bases</a></li>
  <li><a href="/convocatorias/ref-13_2025-data-manager/"><img src="x.png"></a></li>
  <li><a href="/noticias/congreso/">Congreso</a></li>
  <li><a href="/convocatorias/ref-14_2025-gestor/">REF 14/2025 Gestor</a></li>
</ul>"#;
        let base = Url::parse("https://ibsal.es/convocatorias-de-empleo/").unwrap();
        let links = DetailParser::new(layout()).unwrap().parse_listing(html, &base);
        let links: Vec<&str> = links.iter().map(|u| u.as_str()).collect();
        assert_eq!(
            links,
            [
                "https://ibsal.es/convocatorias/ref-12_2025-tecnico-laboratorio/",
                "https://ibsal.es/convocatorias/ref-14_2025-gestor/",
            ]
        );
    }

    #[test]
    fn listing_text_filters_and_index_pages() {
        let html = r#"
<nav>
  <a href="/es/ofertas-empleo/ofertas-de-empleo-ibis/">Ofertas de empleo</a>
  <a href="/es/ofertas-empleo/ofertas-de-empleo-ibis/contacto/">Contacto oferta</a>
</nav>
<a href="/es/ofertas-empleo/ofertas-de-empleo-ibis/oferta-tecnico-citometria/">Oferta: técnico de citometría</a>
<a href="/es/ofertas-empleo/ofertas-de-empleo-ibis/postdoc-neuro/">Investigador postdoctoral</a>
<a href="/es/ofertas-empleo/ofertas-de-empleo-ibis/convocatoria-gestor/">Convocatoria gestor de proyectos</a>"#;
        let layout = DetailLinksLayout {
            link_contains: "/ofertas-de-empleo-ibis/".into(),
            link_text_keywords: vec!["convocatoria".into(), "oferta".into(), "empleo".into(), "plaza".into()],
            skip_link_texts: vec!["inicio".into(), "contacto".into(), "aviso".into()],
            ..layout()
        };
        let base = Url::parse("https://www.ibis-sevilla.es/es/ofertas-empleo/").unwrap();
        let links = DetailParser::new(layout).unwrap().parse_listing(html, &base);
        let links: Vec<&str> = links.iter().map(|u| u.as_str()).collect();
        assert_eq!(
            links,
            [
                "https://www.ibis-sevilla.es/es/ofertas-empleo/ofertas-de-empleo-ibis/oferta-tecnico-citometria/",
                "https://www.ibis-sevilla.es/es/ofertas-empleo/ofertas-de-empleo-ibis/convocatoria-gestor/",
            ]
        );
    }

    #[test]
    fn listing_respects_max_details() {
        let html = r#"<a href="/convocatorias/ref-1/">Uno</a><a href="/convocatorias/ref-2/">Dos</a>"#;
        let base = Url::parse("https://ibsal.es/").unwrap();
        let mut layout = layout();
        layout.max_details = 1;
        assert_eq!(DetailParser::new(layout).unwrap().parse_listing(html, &base).len(), 1);
    }

    #[test]
    fn detail_page_yields_title_status_and_context() {
        let html = r#"<html><body>
<header><h2>IBSAL</h2></header>
<article>
  <h1 class="entry-title">REF 12/2025 Técnico/a de laboratorio</h1>
  <p>Convocatoria publicada el 3 de marzo de 2025.</p>
  <p>Plazo de presentación hasta el 24/03/2025.</p>
</article>
</body></html>"#;
        let url = Url::parse("https://ibsal.es/convocatorias/ref-12_2025-tecnico-laboratorio/").unwrap();
        let raw = DetailParser::new(layout()).unwrap().parse_detail(html, &url).unwrap();

        assert_eq!(raw.title, "REF 12/2025 Técnico/a de laboratorio");
        assert_eq!(raw.status.as_deref(), Some("Abierta"));
        assert_eq!(raw.link.as_deref(), Some(url.as_str()));
        let context = raw.context.unwrap();
        assert!(context.contains("3 de marzo de 2025"));
        assert!(context.contains("24/03/2025"));
    }

    #[test]
    fn closed_detail_and_title_fallback() {
        let html = "<html><body><p>Proceso finalizado. Convocatoria cerrada el 01/02/2025.</p></body></html>";
        let url = Url::parse("https://ibsal.es/convocatorias/ref-1/").unwrap();
        let raw = DetailParser::new(layout()).unwrap().parse_detail(html, &url).unwrap();
        assert_eq!(raw.status.as_deref(), Some("Cerrada"));
        assert_eq!(raw.title, "Proceso finalizado. Convocatoria cerrada el 01/02/2025.");
    }

    #[test]
    fn empty_detail_is_skipped() {
        let url = Url::parse("https://ibsal.es/convocatorias/ref-1/").unwrap();
        assert!(DetailParser::new(layout()).unwrap().parse_detail("<html></html>", &url).is_none());
    }
}
