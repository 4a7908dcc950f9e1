use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::dates::{self, DateCandidate};

/// Canonical, display-ready job offer.
///
/// Dates are kept as `DD/MM/YYYY` strings; JSON keys follow the Spanish
/// names used by the published snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOffer {
    #[serde(rename = "iis")]
    pub institute: String,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "fecha_inicio", default)]
    pub start_date: Option<String>,
    #[serde(rename = "fecha_limite", default)]
    pub deadline: Option<String>,
    #[serde(rename = "enlace", default)]
    pub link: Option<String>,
    #[serde(rename = "estado", default)]
    pub status: Option<String>,
    #[serde(rename = "provincia", default)]
    pub province: Option<String>,
    #[serde(rename = "categoria", default)]
    pub category: Option<String>,
    #[serde(rename = "titulacion", default)]
    pub qualification: Option<String>,
    #[serde(rename = "centro", default)]
    pub center: Option<String>,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "referencia", default)]
    pub reference: Option<String>,
}

/// Loosely structured fields as a site adapter scraped them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOffer {
    pub title: String,
    pub link: Option<String>,
    /// Text expected to hold the start date (a table cell, a label).
    pub start_text: Option<String>,
    /// Text expected to hold the deadline.
    pub deadline_text: Option<String>,
    /// Surrounding text scanned for dates when the explicit slots are empty.
    pub context: Option<String>,
    pub status: Option<String>,
    pub province: Option<String>,
    pub category: Option<String>,
    pub qualification: Option<String>,
    pub center: Option<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
}

impl RawOffer {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// How many date slots a site publishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSlots {
    /// Only a deadline is expected; the latest date found fills it.
    #[default]
    Deadline,
    /// Earliest date is the start, latest the deadline.
    StartAndDeadline,
}

/// What to do with a single distinct date when two slots are expected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoneDate {
    #[default]
    Deadline,
    Both,
}

/// Secondary component of the deduplication key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupKey {
    #[default]
    Link,
    Reference,
}

/// Site-supplied rules that decide which raw bundles become offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferPolicy {
    pub institute: String,
    pub min_title_length: usize,
    /// Lowercase status fragments that mark an offer as closed.
    pub closed_tokens: Vec<String>,
    pub dates: DateSlots,
    pub lone_date: LoneDate,
    pub dedup: DedupKey,
    /// Titles containing any of these fragments are not job offers.
    pub exclude_title_keywords: Vec<String>,
    pub default_province: Option<String>,
    pub default_center: Option<String>,
}

pub const DEFAULT_CLOSED_TOKENS: [&str; 4] = ["cerrada", "cerrado", "finalizada", "finalizado"];
pub const DEFAULT_MIN_TITLE_LENGTH: usize = 5;

impl OfferPolicy {
    pub fn new(institute: impl Into<String>) -> Self {
        Self {
            institute: institute.into(),
            min_title_length: DEFAULT_MIN_TITLE_LENGTH,
            closed_tokens: DEFAULT_CLOSED_TOKENS.iter().map(|t| t.to_string()).collect(),
            dates: DateSlots::default(),
            lone_date: LoneDate::default(),
            dedup: DedupKey::default(),
            exclude_title_keywords: Vec::new(),
            default_province: None,
            default_center: None,
        }
    }

    pub fn with_min_title_length(mut self, len: usize) -> Self {
        self.min_title_length = len;
        self
    }

    pub fn with_dates(mut self, dates: DateSlots, lone_date: LoneDate) -> Self {
        self.dates = dates;
        self.lone_date = lone_date;
        self
    }

    pub fn with_dedup(mut self, dedup: DedupKey) -> Self {
        self.dedup = dedup;
        self
    }

    fn is_closed(&self, status: &str) -> bool {
        let status = status.to_lowercase();
        self.closed_tokens
            .iter()
            .any(|token| !token.is_empty() && status.contains(&token.to_lowercase()))
    }

    fn is_excluded(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        self.exclude_title_keywords
            .iter()
            .any(|kw| !kw.is_empty() && title.contains(&kw.to_lowercase()))
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|v| !v.is_empty())
}

fn absolute_link(link: Option<String>) -> Option<String> {
    let link = clean(link)?;
    Url::parse(&link).ok().map(|_| link)
}

#[derive(Debug, Default)]
struct ResolvedDates {
    start: Option<NaiveDate>,
    deadline: Option<NaiveDate>,
}

/// `None` means an explicit deadline text was given but held no date.
fn resolve_dates(raw: &RawOffer, policy: &OfferPolicy) -> Option<ResolvedDates> {
    let mut resolved = ResolvedDates::default();

    if let Some(text) = raw.deadline_text.as_deref().filter(|t| !t.trim().is_empty()) {
        let deadline = dates::latest(&dates::extract_all(text)).or_else(|| dates::parse(text));
        resolved.deadline = Some(deadline?);
    }
    if let Some(text) = raw.start_text.as_deref().filter(|t| !t.trim().is_empty()) {
        resolved.start = dates::earliest(&dates::extract_all(text)).or_else(|| dates::parse(text));
    }

    let wants_start = policy.dates == DateSlots::StartAndDeadline;
    if resolved.deadline.is_some() && (resolved.start.is_some() || !wants_start) {
        return Some(resolved);
    }

    let found: Vec<DateCandidate> = raw
        .context
        .as_deref()
        .map(dates::extract_all)
        .unwrap_or_default();
    let (Some(first), Some(last)) = (dates::earliest(&found), dates::latest(&found)) else {
        return Some(resolved);
    };

    if resolved.deadline.is_none() {
        resolved.deadline = Some(last);
    }
    if wants_start && resolved.start.is_none() {
        let lone = first == last;
        let before_deadline = resolved.deadline.is_none_or(|d| first <= d);
        if before_deadline && (!lone || policy.lone_date == LoneDate::Both) {
            resolved.start = Some(first);
        }
    }
    Some(resolved)
}

/// Turn a raw bundle into an open offer, or discard it.
///
/// Discards when the title is shorter than the policy minimum, when the
/// status carries a closed token, when the title matches an excluded
/// keyword, when an explicit deadline text cannot be resolved, or when the
/// resolved deadline has already passed.
///
/// ```
/// use ofertas_core::offer::{build, OfferPolicy, RawOffer};
///
/// let policy = OfferPolicy::new("IBSAL").with_min_title_length(5);
/// assert!(build(RawOffer::new("AB"), &policy).is_none());
///
/// let offer = build(RawOffer::new("A valid offer title"), &policy).unwrap();
/// assert_eq!(offer.institute, "IBSAL");
/// assert_eq!(offer.deadline, None);
/// ```
pub fn build(raw: RawOffer, policy: &OfferPolicy) -> Option<JobOffer> {
    build_on(raw, policy, dates::today())
}

/// [`build`] against an explicit reference date.
pub fn build_on(raw: RawOffer, policy: &OfferPolicy, today: NaiveDate) -> Option<JobOffer> {
    let title = raw.title.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() || title.chars().count() < policy.min_title_length {
        return None;
    }
    if raw.status.as_deref().is_some_and(|s| policy.is_closed(s)) {
        return None;
    }
    if policy.is_excluded(&title) {
        return None;
    }

    let resolved = resolve_dates(&raw, policy)?;
    if resolved.deadline.is_some_and(|d| d < today) {
        return None;
    }

    Some(JobOffer {
        institute: policy.institute.clone(),
        title,
        start_date: resolved.start.map(dates::format),
        deadline: resolved.deadline.map(dates::format),
        link: absolute_link(raw.link),
        status: clean(raw.status),
        province: clean(raw.province).or_else(|| policy.default_province.clone()),
        category: clean(raw.category),
        qualification: clean(raw.qualification),
        center: clean(raw.center).or_else(|| policy.default_center.clone()),
        description: clean(raw.description),
        reference: clean(raw.reference),
    })
}

fn dedup_key(offer: &JobOffer, key: DedupKey) -> (String, String) {
    let secondary = match key {
        DedupKey::Link => offer.link.as_deref(),
        DedupKey::Reference => offer.reference.as_deref(),
    };
    (
        offer.title.trim().to_lowercase(),
        secondary.unwrap_or_default().trim().to_string(),
    )
}

/// Keep the first offer of every `(title, link | reference)` key, in order.
pub fn deduplicate(offers: Vec<JobOffer>, key: DedupKey) -> Vec<JobOffer> {
    let mut seen = HashSet::new();
    offers
        .into_iter()
        .filter(|offer| seen.insert(dedup_key(offer, key)))
        .collect()
}

/// Outcome of normalising one institute's raw bundles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub offers: Vec<JobOffer>,
    /// Raw bundles received from the source.
    pub seen: usize,
    /// Bundles dropped by [`build`].
    pub discarded: usize,
    /// Offers collapsed by [`deduplicate`].
    pub duplicates: usize,
}

/// Build every bundle with `policy`, then deduplicate.
pub fn normalize_batch(raws: Vec<RawOffer>, policy: &OfferPolicy) -> BatchOutcome {
    normalize_batch_on(raws, policy, dates::today())
}

/// [`normalize_batch`] against an explicit reference date.
pub fn normalize_batch_on(
    raws: Vec<RawOffer>,
    policy: &OfferPolicy,
    today: NaiveDate,
) -> BatchOutcome {
    let seen = raws.len();
    let built: Vec<JobOffer> = raws
        .into_iter()
        .filter_map(|raw| build_on(raw, policy, today))
        .collect();
    let discarded = seen - built.len();
    let before = built.len();
    let offers = deduplicate(built, policy.dedup);
    BatchOutcome {
        duplicates: before - offers.len(),
        offers,
        seen,
        discarded,
    }
}
