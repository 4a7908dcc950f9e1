use async_trait::async_trait;
use ofertas_common::Result;

use crate::offer::RawOffer;

/// Something that can produce the raw offer bundles of one institute.
///
/// Implementations own fetching and site-specific extraction; the
/// normalizer only ever sees the returned bundles.
#[async_trait]
pub trait RawOfferSource: Send + Sync {
    /// Institute identifier, used for logging and reporting.
    fn institute(&self) -> &str;

    /// Produce the raw bundles for this run.
    async fn collect(&self) -> Result<Vec<RawOffer>>;
}
