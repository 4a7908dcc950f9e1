use std::sync::LazyLock;

use chrono::{Local, NaiveDate};
use regex::{Captures, Regex};

/// A date found somewhere inside a larger block of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateCandidate {
    /// The exact substring that matched, as it appeared in the input.
    pub matched: String,
    pub date: NaiveDate,
}

/// Recognised textual shapes, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// `15/12/2024`
    SlashDayFirst,
    /// `15-12-2024`
    DashDayFirst,
    /// `15 de diciembre de 2024`
    DayDeMonthDeYear,
    /// `15 diciembre 2024`
    DayMonthYear,
    /// `2024-12-15`
    YearFirst,
}

struct DatePattern {
    shape: Shape,
    regex: Regex,
}

const PATTERN_SOURCES: [(Shape, &str); 5] = [
    (Shape::SlashDayFirst, r"(\d{1,2})/(\d{1,2})/(\d{4})"),
    (Shape::DashDayFirst, r"(\d{1,2})-(\d{1,2})-(\d{4})"),
    (Shape::DayDeMonthDeYear, r"(\d{1,2})\s+de\s+(\w+)\s+de\s+(\d{4})"),
    (Shape::DayMonthYear, r"(\d{1,2})\s+(\w+)\s+(\d{4})"),
    (Shape::YearFirst, r"(\d{4})-(\d{1,2})-(\d{1,2})"),
];

static PATTERNS: LazyLock<Vec<DatePattern>> = LazyLock::new(|| {
    PATTERN_SOURCES
        .iter()
        .map(|(shape, source)| DatePattern {
            shape: *shape,
            regex: Regex::new(&format!("(?i){source}")).expect("static date pattern compiles"),
        })
        .collect()
});

/// Spanish month names and their 3-letter abbreviations.
const MONTHS_ES: [(&str, u32); 25] = [
    ("enero", 1),
    ("febrero", 2),
    ("marzo", 3),
    ("abril", 4),
    ("mayo", 5),
    ("junio", 6),
    ("julio", 7),
    ("agosto", 8),
    ("septiembre", 9),
    ("setiembre", 9),
    ("octubre", 10),
    ("noviembre", 11),
    ("diciembre", 12),
    ("ene", 1),
    ("feb", 2),
    ("mar", 3),
    ("abr", 4),
    ("may", 5),
    ("jun", 6),
    ("jul", 7),
    ("ago", 8),
    ("sep", 9),
    ("oct", 10),
    ("nov", 11),
    ("dic", 12),
];

fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    MONTHS_ES
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, number)| *number)
}

fn capture<T: std::str::FromStr>(caps: &Captures<'_>, idx: usize) -> Option<T> {
    caps.get(idx)?.as_str().parse().ok()
}

impl DatePattern {
    /// Build a calendar date from a match. `None` when the numbers do not
    /// form a real date or the month name is unknown.
    fn construct(&self, caps: &Captures<'_>) -> Option<NaiveDate> {
        let (year, month, day) = match self.shape {
            Shape::SlashDayFirst | Shape::DashDayFirst => {
                (capture(caps, 3)?, capture(caps, 2)?, capture(caps, 1)?)
            }
            Shape::DayDeMonthDeYear | Shape::DayMonthYear => (
                capture(caps, 3)?,
                month_number(caps.get(2)?.as_str())?,
                capture(caps, 1)?,
            ),
            Shape::YearFirst => (capture(caps, 1)?, capture(caps, 2)?, capture(caps, 3)?),
        };
        if year < 1 {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

/// Parse the first recognisable date in `text`.
///
/// Shapes are tried in a fixed order (`DD/MM/YYYY`, `DD-MM-YYYY`,
/// `DD de <mes> de YYYY`, `DD <mes> YYYY`, `YYYY-MM-DD`) and the first one
/// that both matches and yields a valid calendar date wins. Numeric dates are
/// always read day-first.
///
/// ```
/// use chrono::NaiveDate;
/// use ofertas_core::dates;
///
/// let expected = NaiveDate::from_ymd_opt(2024, 12, 15);
/// assert_eq!(dates::parse("15/12/2024"), expected);
/// assert_eq!(dates::parse("Plazo: 15 de Diciembre de 2024"), expected);
/// assert_eq!(dates::parse("32/01/2024"), None);
/// ```
pub fn parse(text: &str) -> Option<NaiveDate> {
    let normalized = text.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    PATTERNS.iter().find_map(|pattern| {
        pattern
            .regex
            .captures(&normalized)
            .and_then(|caps| pattern.construct(&caps))
    })
}

/// Find every date embedded in `text`.
///
/// Results follow pattern order first and then position within the text, so
/// callers that need chronological order must sort by [`DateCandidate::date`].
pub fn extract_all(text: &str) -> Vec<DateCandidate> {
    PATTERNS
        .iter()
        .flat_map(|pattern| pattern.regex.find_iter(text))
        .filter_map(|m| {
            let date = parse(m.as_str())?;
            Some(DateCandidate {
                matched: m.as_str().to_string(),
                date,
            })
        })
        .collect()
}

/// Chronologically first candidate.
pub fn earliest(candidates: &[DateCandidate]) -> Option<NaiveDate> {
    candidates.iter().map(|c| c.date).min()
}

/// Chronologically last candidate.
pub fn latest(candidates: &[DateCandidate]) -> Option<NaiveDate> {
    candidates.iter().map(|c| c.date).max()
}

/// The local calendar date.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// `true` when `text` parses to today or a later date. Unparseable text is
/// treated as expired.
pub fn is_open(text: &str) -> bool {
    is_open_on(text, today())
}

/// [`is_open`] against an explicit reference date.
pub fn is_open_on(text: &str, today: NaiveDate) -> bool {
    parse(text).is_some_and(|date| date >= today)
}

/// Days from today until the parsed date; negative once it has passed.
pub fn days_until(text: &str) -> Option<i64> {
    days_until_on(text, today())
}

/// [`days_until`] against an explicit reference date.
pub fn days_until_on(text: &str, today: NaiveDate) -> Option<i64> {
    parse(text).map(|date| date.signed_duration_since(today).num_days())
}

/// Render as `DD/MM/YYYY`.
///
/// ```
/// use chrono::NaiveDate;
///
/// let date = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
/// assert_eq!(ofertas_core::dates::format(date), "05/01/2025");
/// ```
pub fn format(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}
