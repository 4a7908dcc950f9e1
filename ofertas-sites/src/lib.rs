//! Site adapters that turn institute web pages into raw offer bundles.
//!
//! - `table`: rows of an HTML table with known column positions, with
//!   optional fallback cards
//! - `status_list`: link containers carrying open/closed labels, optionally
//!   across numbered pages
//! - `detail_links`: listing page + one detail page per offer
//! - `text_blocks`: offer codes found in free text
//! - `cards`: self-contained job-board cards
//! - `section_links`: download links under one page heading
//!
//! Each adapter pairs a pure parser (HTML in, [`RawOffer`] bundles out) with
//! a [`RawOfferSource`] that fetches the page through [`HttpClient`].
//! [`build_source`] picks the adapter named by an institute's `kind`.
//!
//! [`RawOffer`]: ofertas_core::RawOffer

pub mod cards;
pub mod detail_links;
mod html;
pub mod section_links;
pub mod status_list;
pub mod table;
pub mod text_blocks;

use ofertas_common::Result;
use ofertas_config::{InstituteSpec, SiteKind};
use ofertas_core::RawOfferSource;
use ofertas_http::HttpClient;

pub use cards::{CardParser, CardsSource};
pub use detail_links::{DetailLinksSource, DetailParser};
pub use section_links::{SectionLinkParser, SectionLinksSource};
pub use status_list::{StatusListParser, StatusListSource};
pub use table::{TableParser, TableSource};
pub use text_blocks::{TextBlockParser, TextBlocksSource};

/// Map one configured institute to its adapter.
///
/// Selectors and marker patterns are compiled here, so a bad layout fails
/// before any page is fetched.
///
/// ```
/// use ofertas_config::OfertasConfigLoader;
/// use ofertas_http::HttpClient;
///
/// let cfg = OfertasConfigLoader::new()
///     .with_yaml_str(r#"
/// institutes:
///   - id: IISGM
///     url: https://www.iisgm.com/ofertas-de-empleo/
///     kind: status_list
/// "#)
///     .load()
///     .unwrap();
/// let http = HttpClient::new("ofertas").unwrap();
///
/// let source = ofertas_sites::build_source(&cfg.institutes[0], http).unwrap();
/// assert_eq!(source.institute(), "IISGM");
/// ```
pub fn build_source(spec: &InstituteSpec, http: HttpClient) -> Result<Box<dyn RawOfferSource>> {
    let id = spec.id.clone();
    let url = spec.url.clone();
    let source: Box<dyn RawOfferSource> = match &spec.site {
        SiteKind::Table { layout } => Box::new(TableSource::new(id, url, http, layout.clone())?),
        SiteKind::StatusList { layout } => {
            Box::new(StatusListSource::new(id, url, http, layout.clone())?)
        }
        SiteKind::DetailLinks { layout } => {
            Box::new(DetailLinksSource::new(id, url, http, layout.clone())?)
        }
        SiteKind::TextBlocks { layout } => {
            Box::new(TextBlocksSource::new(id, url, http, layout.clone())?)
        }
        SiteKind::Cards { layout } => Box::new(CardsSource::new(id, url, http, layout.clone())?),
        SiteKind::SectionLinks { layout } => {
            Box::new(SectionLinksSource::new(id, url, http, layout.clone())?)
        }
    };
    tracing::debug!(institute=%spec.id, kind=spec.site.name(), "sites.source.built");
    Ok(source)
}
