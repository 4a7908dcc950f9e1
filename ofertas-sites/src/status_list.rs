//! Containers that pair offer links with "Abierta"/"Cerrada" labels.
use async_trait::async_trait;
use ofertas_common::{OfertasError, Result};
use ofertas_config::StatusListLayout;
use ofertas_core::{RawOffer, RawOfferSource};
use ofertas_http::{HttpClient, RequestOpts};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::html::{absolute_link, element_text, page_url, selector};

const OPEN_STATUS: &str = "Abierta";

pub struct StatusListParser {
    container: Selector,
    links: Selector,
    status: Selector,
    pages: Option<Selector>,
    layout: StatusListLayout,
}

fn contains_any(text: &str, tokens: &[String]) -> bool {
    tokens
        .iter()
        .any(|t| !t.is_empty() && text.contains(&t.to_lowercase()))
}

impl StatusListParser {
    pub fn new(layout: StatusListLayout) -> Result<Self> {
        Ok(Self {
            container: selector(&layout.container)?,
            links: selector(&layout.link_selector)?,
            status: selector(&layout.status_selector)?,
            pages: layout
                .pagination
                .as_ref()
                .map(|p| selector(&p.selector))
                .transpose()?,
            layout,
        })
    }

    /// A container counts as open when its open labels outnumber the closed ones.
    fn is_open(&self, container: ElementRef<'_>) -> bool {
        let (mut open, mut closed) = (0usize, 0usize);
        for label in container.select(&self.status) {
            let text = element_text(label).to_lowercase();
            if contains_any(&text, &self.layout.open_tokens) {
                open += 1;
            } else if contains_any(&text, &self.layout.closed_tokens) {
                closed += 1;
            }
        }
        open > closed
    }

    /// Highest page number linked from the pagination block, at least 1.
    pub fn page_count(&self, html: &str) -> usize {
        let Some(pages) = &self.pages else {
            return 1;
        };
        let doc = Html::parse_document(html);
        doc.select(pages)
            .filter_map(|a| element_text(a).parse::<usize>().ok())
            .fold(1, usize::max)
    }

    fn wanted_text(&self, text: &str) -> bool {
        let keywords = &self.layout.link_text_keywords;
        keywords.is_empty() || contains_any(&text.to_lowercase(), keywords)
    }

    pub fn parse(&self, html: &str, base: &Url) -> Vec<RawOffer> {
        let doc = Html::parse_document(html);
        let mut out = Vec::new();

        for container in doc.select(&self.container) {
            if container.select(&self.status).next().is_none() || !self.is_open(container) {
                continue;
            }
            for anchor in container.select(&self.links) {
                let text = element_text(anchor);
                if !self.wanted_text(&text) {
                    continue;
                }
                let Some(url) = anchor
                    .value()
                    .attr("href")
                    .and_then(|href| absolute_link(base, href))
                else {
                    continue;
                };
                if let Some(fragment) = &self.layout.link_contains {
                    if !url.as_str().contains(fragment.as_str()) {
                        continue;
                    }
                }
                let mut raw = RawOffer::new(text);
                raw.link = Some(url.into());
                raw.status = Some(OPEN_STATUS.to_string());
                raw.context = Some(element_text(container));
                out.push(raw);
            }
        }
        out
    }
}

pub struct StatusListSource {
    institute: String,
    url: String,
    http: HttpClient,
    parser: StatusListParser,
}

impl StatusListSource {
    pub fn new(
        institute: String,
        url: String,
        http: HttpClient,
        layout: StatusListLayout,
    ) -> Result<Self> {
        Ok(Self {
            institute,
            url,
            http,
            parser: StatusListParser::new(layout)?,
        })
    }
}

#[async_trait]
impl RawOfferSource for StatusListSource {
    fn institute(&self) -> &str {
        &self.institute
    }

    async fn collect(&self) -> Result<Vec<RawOffer>> {
        let base = Url::parse(&self.url)
            .map_err(|e| OfertasError::Config(format!("{}: {e}", self.url)))?;
        let html = self
            .http
            .get_text(&self.url, RequestOpts::default())
            .await
            .map_err(|e| OfertasError::source(&self.institute, e.to_string()))?;
        let mut bundles = self.parser.parse(&html, &base);

        if let Some(pagination) = &self.parser.layout.pagination {
            let last = self.parser.page_count(&html).min(pagination.max_pages);
            for page in 2..=last {
                let url = page_url(&base, &pagination.query_param, page);
                match self.http.get_text(url.as_str(), RequestOpts::default()).await {
                    Ok(html) => bundles.extend(self.parser.parse(&html, &url)),
                    Err(e) => {
                        // Later pages are best effort; keep what was read.
                        tracing::warn!(institute=%self.institute, page, error=%e, "sites.status_list.page_failed");
                        break;
                    }
                }
            }
        }
        tracing::debug!(institute=%self.institute, bundles=bundles.len(), "sites.status_list.parsed");
        Ok(bundles)
    }
}
