//! Offers published as rows of an HTML table.
use async_trait::async_trait;
use ofertas_common::{OfertasError, Result};
use ofertas_config::TableLayout;
use ofertas_core::{RawOffer, RawOfferSource};
use ofertas_http::{HttpClient, RequestOpts};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::cards::CardParser;
use crate::html::{element_text, first_link, selector};

pub struct TableParser {
    rows: Selector,
    anchors: Selector,
    fallback: Option<CardParser>,
    layout: TableLayout,
}

impl TableParser {
    pub fn new(layout: TableLayout) -> Result<Self> {
        Ok(Self {
            rows: selector(&layout.row_selector)?,
            anchors: selector("a[href]")?,
            fallback: layout.fallback.clone().map(CardParser::new).transpose()?,
            layout,
        })
    }

    /// One bundle per data row; header rows and short rows are skipped.
    /// Without any row the configured fallback cards are read instead.
    pub fn parse(&self, html: &str, base: &Url) -> Vec<RawOffer> {
        let doc = Html::parse_document(html);
        let rows = self.rows(&doc, base);
        match &self.fallback {
            Some(cards) if rows.is_empty() => cards.parse_document(&doc, base),
            _ => rows,
        }
    }

    fn rows(&self, doc: &Html, base: &Url) -> Vec<RawOffer> {
        let mut out = Vec::new();
        let mut started = false;
        let mut current_table = None;

        for row in doc.select(&self.rows) {
            let table = row
                .ancestors()
                .find(|n| n.value().as_element().is_some_and(|e| e.name() == "table"))
                .map(|n| n.id());
            let first_of_table = !started || table != current_table;
            started = true;
            current_table = table;
            if self.layout.skip_header && first_of_table {
                continue;
            }

            let cells: Vec<ElementRef<'_>> = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|c| matches!(c.value().name(), "td" | "th"))
                .collect();
            if cells.is_empty() || cells.len() < self.layout.min_cells {
                continue;
            }
            let text_at = |idx: Option<usize>| {
                idx.and_then(|i| cells.get(i))
                    .map(|c| element_text(*c))
                    .filter(|t| !t.is_empty())
            };
            let Some(title) = text_at(Some(self.layout.title)) else {
                continue;
            };

            let link = match self.layout.link {
                Some(i) => cells.get(i).and_then(|c| first_link(*c, &self.anchors, base)),
                None => first_link(row, &self.anchors, base),
            };

            let mut raw = RawOffer::new(title);
            raw.reference = text_at(self.layout.reference);
            raw.start_text = text_at(self.layout.start);
            raw.deadline_text = text_at(self.layout.deadline);
            raw.status = text_at(self.layout.status);
            raw.link = link.map(String::from);
            if self.layout.deadline.is_none() {
                raw.context = Some(element_text(row));
            }
            out.push(raw);
        }
        out
    }
}

pub struct TableSource {
    institute: String,
    url: String,
    http: HttpClient,
    parser: TableParser,
}

impl TableSource {
    pub fn new(institute: String, url: String, http: HttpClient, layout: TableLayout) -> Result<Self> {
        Ok(Self {
            institute,
            url,
            http,
            parser: TableParser::new(layout)?,
        })
    }
}

#[async_trait]
impl RawOfferSource for TableSource {
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
        let rows = self.parser.parse(&html, &base);
        tracing::debug!(institute=%self.institute, rows=rows.len(), "sites.table.parsed");
        Ok(rows)
    }
}
