//! Offers recognised by a code marker inside free page text.
//!
//! Every marker match opens a window of text around it. A window that does
//! not mention an open keyword is ignored; otherwise its title runs from the
//! title anchor (e.g. "Resolución ...") up to the end of the marker, and the
//! whole window is handed to the normaliser as date context.
use async_trait::async_trait;
use ofertas_common::{OfertasError, Result};
use ofertas_config::TextBlocksLayout;
use ofertas_core::{RawOffer, RawOfferSource};
use ofertas_http::{HttpClient, RequestOpts};
use regex::Regex;
use scraper::Html;

use crate::html::page_text;

pub struct TextBlockParser {
    marker: Regex,
    layout: TextBlocksLayout,
}

/// Byte offset `n` characters before `end`, clamped to the start.
fn chars_back(text: &str, end: usize, n: usize) -> usize {
    text[..end]
        .char_indices()
        .rev()
        .take(n)
        .last()
        .map_or(end, |(i, _)| i)
}

/// Byte offset `n` characters after `start`, clamped to the end.
fn chars_forward(text: &str, start: usize, n: usize) -> usize {
    text[start..]
        .char_indices()
        .nth(n)
        .map_or(text.len(), |(i, _)| start + i)
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect::<String>().trim().to_string()
}

impl TextBlockParser {
    pub fn new(layout: TextBlocksLayout) -> Result<Self> {
        let marker = Regex::new(&layout.marker)
            .map_err(|e| OfertasError::Config(format!("invalid marker {:?}: {e}", layout.marker)))?;
        Ok(Self { marker, layout })
    }

    pub fn parse(&self, html: &str, page_url: &str) -> Vec<RawOffer> {
        let doc = Html::parse_document(html);
        self.parse_text(&page_text(&doc), page_url)
    }

    /// Same as [`Self::parse`] over already extracted, whitespace-normalised text.
    pub fn parse_text(&self, text: &str, page_url: &str) -> Vec<RawOffer> {
        let mut out = Vec::new();
        let anchor = self.layout.title_anchor.to_ascii_lowercase();

        for m in self.marker.find_iter(text) {
            let start = chars_back(text, m.start(), self.layout.before);
            let end = chars_forward(text, m.end(), self.layout.after);
            let window = &text[start..end];

            let low = window.to_lowercase();
            let open = self
                .layout
                .open_keywords
                .iter()
                .any(|k| !k.is_empty() && low.contains(&k.to_lowercase()));
            if !open {
                continue;
            }

            // ASCII lowercasing keeps byte offsets aligned with `window`.
            let marker_end = m.end() - start;
            let title_start = if anchor.is_empty() {
                0
            } else {
                window[..marker_end]
                    .to_ascii_lowercase()
                    .find(&anchor)
                    .unwrap_or(0)
            };
            let mut title = truncate_chars(&window[title_start..marker_end], self.layout.max_title_chars);
            if title.chars().count() < self.layout.min_title_chars {
                title = truncate_chars(window, self.layout.max_title_chars);
            }

            let mut raw = RawOffer::new(title);
            raw.reference = Some(m.as_str().trim_matches(|c| c == '(' || c == ')').to_string());
            raw.link = Some(page_url.to_string());
            raw.status = Some("Abierta".to_string());
            raw.context = Some(window.to_string());
            out.push(raw);
        }
        out
    }
}

pub struct TextBlocksSource {
    institute: String,
    url: String,
    http: HttpClient,
    parser: TextBlockParser,
}

impl TextBlocksSource {
    pub fn new(
        institute: String,
        url: String,
        http: HttpClient,
        layout: TextBlocksLayout,
    ) -> Result<Self> {
        Ok(Self {
            institute,
            url,
            http,
            parser: TextBlockParser::new(layout)?,
        })
    }
}

#[async_trait]
impl RawOfferSource for TextBlocksSource {
    fn institute(&self) -> &str {
        &self.institute
    }

    async fn collect(&self) -> Result<Vec<RawOffer>> {
        let html = self
            .http
            .get_text(&self.url, RequestOpts::default())
            .await
            .map_err(|e| OfertasError::source(&self.institute, e.to_string()))?;
        let blocks = self.parser.parse(&html, &self.url);
        tracing::debug!(institute=%self.institute, blocks=blocks.len(), "sites.text_blocks.parsed");
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> TextBlocksLayout {
        TextBlocksLayout {
            marker: r"\(IMIB\d+_C\d+\)".into(),
            before: 300,
            after: 600,
            open_keywords: vec!["abierto".into(), "abierta".into()],
            title_anchor: "resoluci".into(),
            min_title_chars: 20,
            max_title_chars: 220,
        }
    }

    const URL: &str = "https://www.imib.es/rrhh/ofertasDeEmpleo.jsf";

    #[test]
    fn open_block_yields_title_reference_and_context() {
        let text = "Ofertas de empleo Resolución de convocatoria de un contrato de técnico de apoyo \
                    (IMIB25_C07) Estado: Plazo abierto. Fecha de publicación 03/03/2025. \
                    Fin de plazo 21/03/2025.";
        let blocks = TextBlockParser::new(layout()).unwrap().parse_text(text, URL);

        assert_eq!(blocks.len(), 1);
        let b = &blocks[0];
        assert_eq!(
            b.title,
            "Resolución de convocatoria de un contrato de técnico de apoyo (IMIB25_C07)"
        );
        assert_eq!(b.reference.as_deref(), Some("IMIB25_C07"));
        assert_eq!(b.link.as_deref(), Some(URL));
        let ctx = b.context.as_deref().unwrap();
        assert!(ctx.contains("03/03/2025") && ctx.contains("21/03/2025"));
    }

    #[test]
    fn closed_blocks_are_skipped() {
        let text = "Resolución de contrato predoctoral (IMIB24_C02) Estado: Cerrado. 01/02/2024";
        assert!(TextBlockParser::new(layout()).unwrap().parse_text(text, URL).is_empty());
    }

    #[test]
    fn short_titles_fall_back_to_window_head() {
        let text = "Técnico (IMIB5_C1) abierta hasta 30/04/2025";
        let blocks = TextBlockParser::new(layout()).unwrap().parse_text(text, URL);
        assert_eq!(blocks[0].title, text);
    }

    #[test]
    fn windows_are_bounded_in_characters() {
        let mut layout = layout();
        layout.before = 4;
        layout.after = 8;
        let text = "ñññññ ÁÁ (IMIB1_C1) abierta y más texto";
        let blocks = TextBlockParser::new(layout).unwrap().parse_text(text, URL);
        assert_eq!(blocks[0].context.as_deref(), Some(" ÁÁ (IMIB1_C1) abierta"));
    }

    #[test]
    fn invalid_marker_is_a_config_error() {
        let mut layout = layout();
        layout.marker = "(IMIB".into();
        assert!(matches!(TextBlockParser::new(layout), Err(OfertasError::Config(_))));
    }
}
