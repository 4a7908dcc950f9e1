//! Self-contained offer cards, such as job-board entries.
use async_trait::async_trait;
use ofertas_common::{OfertasError, Result};
use ofertas_config::CardsLayout;
use ofertas_core::{RawOffer, RawOfferSource};
use ofertas_http::{HttpClient, RequestOpts};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::html::{absolute_link, element_text, first_link, selector};

/// Shorter card texts are decoration, not offers.
const MIN_CARD_CHARS: usize = 6;

fn mentions(haystack: &str, words: &[String]) -> bool {
    words
        .iter()
        .any(|w| !w.is_empty() && haystack.contains(&w.to_lowercase()))
}

pub struct CardParser {
    candidates: Vec<Selector>,
    titles: Vec<Selector>,
    anchors: Selector,
    layout: CardsLayout,
}

impl CardParser {
    pub fn new(layout: CardsLayout) -> Result<Self> {
        if layout.selectors.is_empty() {
            return Err(OfertasError::Config("cards layout without selectors".into()));
        }
        let compile = |list: &[String]| list.iter().map(|css| selector(css)).collect::<Result<Vec<_>>>();
        Ok(Self {
            candidates: compile(&layout.selectors)?,
            titles: compile(&layout.title_selectors)?,
            anchors: selector("a[href]")?,
            layout,
        })
    }

    pub fn parse(&self, html: &str, base: &Url) -> Vec<RawOffer> {
        self.parse_document(&Html::parse_document(html), base)
    }

    /// Cards of the first selector that yields any; later selectors are
    /// only tried when earlier ones find nothing usable.
    pub(crate) fn parse_document(&self, doc: &Html, base: &Url) -> Vec<RawOffer> {
        for candidate in &self.candidates {
            let cards: Vec<RawOffer> = doc
                .select(candidate)
                .filter_map(|card| self.bundle(card, base))
                .take(self.layout.max_cards)
                .collect();
            if !cards.is_empty() {
                return cards;
            }
        }
        Vec::new()
    }

    fn accepts(&self, card: ElementRef<'_>, text: &str) -> bool {
        if text.chars().count() < MIN_CARD_CHARS {
            return false;
        }
        let low = text.to_lowercase();
        if mentions(&low, &self.layout.exclude_keywords) {
            return false;
        }
        let href = card.value().attr("href").unwrap_or_default().to_lowercase();
        self.layout.keywords.is_empty()
            || mentions(&low, &self.layout.keywords)
            || mentions(&href, &self.layout.keywords)
    }

    fn bundle(&self, card: ElementRef<'_>, base: &Url) -> Option<RawOffer> {
        let text = element_text(card);
        if !self.accepts(card, &text) {
            return None;
        }

        let title = self
            .titles
            .iter()
            .filter_map(|sel| card.select(sel).next())
            .map(element_text)
            .find(|t| !t.is_empty())
            .unwrap_or_else(|| {
                text.split_whitespace()
                    .take(self.layout.title_words)
                    .collect::<Vec<_>>()
                    .join(" ")
            });
        let link = if card.value().name() == "a" {
            card.value().attr("href").and_then(|href| absolute_link(base, href))
        } else {
            first_link(card, &self.anchors, base)
        };

        let mut raw = RawOffer::new(title);
        raw.link = link.map(String::from);
        raw.context = Some(text);
        Some(raw)
    }
}

pub struct CardsSource {
    institute: String,
    url: String,
    http: HttpClient,
    parser: CardParser,
}

impl CardsSource {
    pub fn new(institute: String, url: String, http: HttpClient, layout: CardsLayout) -> Result<Self> {
        Ok(Self {
            institute,
            url,
            http,
            parser: CardParser::new(layout)?,
        })
    }
}

#[async_trait]
impl RawOfferSource for CardsSource {
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
        let cards = self.parser.parse(&html, &base);
        tracing::debug!(institute=%self.institute, cards=cards.len(), "sites.cards.parsed");
        Ok(cards)
    }
}
