//! Date recognition and offer normalisation for research-institute job
//! listings.
//!
//! - [`dates`]: Spanish-locale date parsing, extraction and open/closed checks
//! - [`offer`]: canonical [`JobOffer`] records, filtering and deduplication
//! - [`source`]: the [`RawOfferSource`] capability site adapters implement
//!
//! Everything here is synchronous and pure apart from reading the local
//! clock, so it can be shared freely between tasks.
//!
//! ```rust
//! use ofertas_core::{normalize_batch, OfferPolicy, RawOffer};
//!
//! let mut raw = RawOffer::new("Técnico de laboratorio");
//! raw.status = Some("Cerrada".into());
//!
//! let outcome = normalize_batch(vec![raw], &OfferPolicy::new("IISGM"));
//! assert!(outcome.offers.is_empty());
//! assert_eq!(outcome.discarded, 1);
//! ```

pub mod dates;
pub mod offer;
pub mod source;

pub use dates::DateCandidate;
pub use offer::{
    build, deduplicate, normalize_batch, BatchOutcome, DateSlots, DedupKey, JobOffer, LoneDate,
    OfferPolicy, RawOffer,
};
pub use source::RawOfferSource;
