//! Download links listed under one heading, up to the next heading.
use async_trait::async_trait;
use ofertas_common::{OfertasError, Result};
use ofertas_config::SectionLinksLayout;
use ofertas_core::{RawOffer, RawOfferSource};
use ofertas_http::{HttpClient, RequestOpts};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::html::{absolute_link, element_text, selector, squash};

pub struct SectionLinkParser {
    heading: Selector,
    anchors: Selector,
    layout: SectionLinksLayout,
}

impl SectionLinkParser {
    pub fn new(layout: SectionLinksLayout) -> Result<Self> {
        Ok(Self {
            heading: selector(&layout.heading)?,
            anchors: selector("a[href]")?,
            layout,
        })
    }

    pub fn parse(&self, html: &str, base: &Url) -> Vec<RawOffer> {
        let doc = Html::parse_document(html);
        let wanted = self.layout.heading_contains.to_lowercase();
        let Some(heading) = doc
            .select(&self.heading)
            .find(|h| element_text(*h).to_lowercase().contains(&wanted))
        else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for sibling in heading.next_siblings().filter_map(ElementRef::wrap) {
            if self.heading.matches(&sibling) {
                break;
            }
            let own = (sibling.value().name() == "a").then_some(sibling);
            for anchor in own.into_iter().chain(sibling.select(&self.anchors)) {
                if let Some(raw) = self.bundle(anchor, base) {
                    out.push(raw);
                }
            }
        }
        out
    }

    fn bundle(&self, anchor: ElementRef<'_>, base: &Url) -> Option<RawOffer> {
        let label = element_text(anchor);
        if let Some(needle) = &self.layout.link_text_contains {
            if !label.to_lowercase().contains(&needle.to_lowercase()) {
                return None;
            }
        }
        let url = absolute_link(base, anchor.value().attr("href")?)?;
        if let Some(suffix) = &self.layout.link_suffix {
            if !url.path().to_lowercase().ends_with(&suffix.to_lowercase()) {
                return None;
            }
        }

        let context = anchor
            .parent()
            .and_then(ElementRef::wrap)
            .map(element_text)
            .unwrap_or_default();
        let described = squash(&context.replace(&label, " "));
        let title = if described.is_empty() {
            file_title(&url)
        } else {
            self.clip(described)
        };

        let mut raw = RawOffer::new(title);
        raw.link = Some(url.into());
        raw.context = Some(context).filter(|c| !c.is_empty());
        Some(raw)
    }

    fn clip(&self, text: String) -> String {
        if text.chars().count() <= self.layout.max_title_chars {
            return text;
        }
        let mut cut: String = text.chars().take(self.layout.max_title_chars).collect();
        cut.push_str("...");
        cut
    }
}

/// `Oferta_tecnico-lab.pdf` becomes `Oferta tecnico lab`.
fn file_title(url: &Url) -> String {
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    squash(&stem.replace(['_', '-'], " "))
}

pub struct SectionLinksSource {
    institute: String,
    url: String,
    http: HttpClient,
    parser: SectionLinkParser,
}

impl SectionLinksSource {
    pub fn new(
        institute: String,
        url: String,
        http: HttpClient,
        layout: SectionLinksLayout,
    ) -> Result<Self> {
        Ok(Self {
            institute,
            url,
            http,
            parser: SectionLinkParser::new(layout)?,
        })
    }
}

#[async_trait]
impl RawOfferSource for SectionLinksSource {
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
        let links = self.parser.parse(&html, &base);
        tracing::debug!(institute=%self.institute, links=links.len(), "sites.section_links.parsed");
        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRINCESA: &str = r#"
<html><body><div class="entry-content">
<h3>Ofertas Disponibles</h3>
<p>Técnico/a de laboratorio para el grupo de inmunología. Plazo hasta el 30/04/2025
  <a href="/wp-content/uploads/2025/04/oferta-tecnico-inmunologia.pdf">Descargar oferta</a></p>
<ul><li><a href="/wp-content/uploads/2025/04/Investigador_postdoctoral-cardio.pdf">Descargar oferta</a></li></ul>
<p><a href="/fundacion/contacto/">Descargar formulario de contacto</a></p>
<h3>Ofertas Cerradas</h3>
<p>Gestor de proyectos <a href="/wp-content/uploads/2024/11/gestor.pdf">Descargar oferta</a></p>
</div></body></html>"#;

    fn layout() -> SectionLinksLayout {
        SectionLinksLayout {
            heading: "h3".into(),
            heading_contains: "disponibles".into(),
            link_text_contains: Some("descargar".into()),
            link_suffix: Some(".pdf".into()),
            max_title_chars: 100,
        }
    }

    #[test]
    fn reads_only_the_matching_section() {
        let base = Url::parse("https://www.iis-princesa.org/fundacion/ofertas-de-empleo/").unwrap();
        let links = SectionLinkParser::new(layout()).unwrap().parse(PRINCESA, &base);

        assert_eq!(links.len(), 2);
        assert_eq!(
            links[0].title,
            "Técnico/a de laboratorio para el grupo de inmunología. Plazo hasta el 30/04/2025"
        );
        assert_eq!(
            links[0].link.as_deref(),
            Some("https://www.iis-princesa.org/wp-content/uploads/2025/04/oferta-tecnico-inmunologia.pdf")
        );
        assert!(links[0].context.as_deref().unwrap().contains("30/04/2025"));
        assert_eq!(links[1].title, "Investigador postdoctoral cardio");
    }

    #[test]
    fn long_descriptions_are_clipped() {
        let mut layout = layout();
        layout.max_title_chars = 9;
        let base = Url::parse("https://www.iis-princesa.org/").unwrap();
        let links = SectionLinkParser::new(layout).unwrap().parse(PRINCESA, &base);
        assert_eq!(links[0].title, "Técnico/a...");
    }

    #[test]
    fn missing_heading_yields_nothing() {
        let base = Url::parse("https://www.iis-princesa.org/").unwrap();
        let html = "<h3>Noticias</h3><p><a href='/a.pdf'>Descargar oferta</a></p>";
        assert!(SectionLinkParser::new(layout()).unwrap().parse(html, &base).is_empty());
    }
}
