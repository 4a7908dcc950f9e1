//! Loader for `ofertas.yaml` with environment overlays.
//!
//! The file lists the institutes to harvest, how each page is laid out
//! (`kind` + `layout`) and the normalisation policy applied to its offers.
//! `OFERTAS__`-prefixed environment variables override file values (nested
//! keys are separated by `__`) and `${VAR}` placeholders inside string values
//! are expanded after all sources are merged.
use config::{Config, ConfigError, Environment, File};
use ofertas_common::observability::LogFormat;
use ofertas_core::{DateSlots, DedupKey, LoneDate, OfferPolicy};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const CONFIG_FILE_NAME: &str = "ofertas.yaml";

#[derive(Debug, Deserialize)]
pub struct OfertasConfig {
    pub version: Option<String>,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub institutes: Vec<InstituteSpec>,
}

impl OfertasConfig {
    /// Institutes not explicitly disabled, in file order.
    pub fn enabled_institutes(&self) -> impl Iterator<Item = &InstituteSpec> {
        self.institutes.iter().filter(|i| i.enabled.unwrap_or(true))
    }

    pub fn institute(&self, id: &str) -> Option<&InstituteSpec> {
        self.institutes
            .iter()
            .find(|i| i.id.eq_ignore_ascii_case(id))
    }

    fn validate(&self) -> Result<(), LoadError> {
        let mut seen = HashSet::new();
        for inst in &self.institutes {
            if inst.id.trim().is_empty() {
                return Err(LoadError::EmptyId);
            }
            if !seen.insert(inst.id.to_lowercase()) {
                return Err(LoadError::DuplicateId(inst.id.clone()));
            }
            url::Url::parse(&inst.url).map_err(|e| LoadError::InvalidUrl {
                id: inst.id.clone(),
                url: inst.url.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Settings for a whole harvesting run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Pause between two institutes.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Where JSON snapshots are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default)]
    pub log: LogSpec,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_delay_ms(),
            output_dir: default_output_dir(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            log: LogSpec::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogSpec {
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub stderr: bool,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub filter: Option<String>,
}

fn default_delay_ms() -> u64 {
    2000
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114 Safari/537.36".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_retries() -> usize {
    2
}

/// Shared fields + the per-kind page layout.
#[derive(Debug, Clone, Deserialize)]
pub struct InstituteSpec {
    pub id: String,
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Listing page to fetch.
    pub url: String,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub center: Option<String>,
    #[serde(default)]
    pub policy: PolicySpec,
    #[serde(flatten)]
    pub site: SiteKind,
}

impl InstituteSpec {
    /// Normalisation policy for this institute, defaults filled in.
    pub fn policy(&self) -> OfferPolicy {
        let mut policy = OfferPolicy::new(self.id.clone()).with_dates(self.policy.dates, self.policy.lone_date);
        if let Some(len) = self.policy.min_title_length {
            policy = policy.with_min_title_length(len);
        }
        if let Some(tokens) = &self.policy.closed_tokens {
            policy.closed_tokens = tokens.iter().map(|t| t.to_lowercase()).collect();
        }
        policy.dedup = self.policy.dedup;
        policy.exclude_title_keywords = self.policy.exclude_title_keywords.clone();
        policy.default_province = self.province.clone();
        policy.default_center = self.center.clone().or_else(|| Some(self.id.clone()));
        policy
    }
}

/// Per-institute overrides of the normalisation policy.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicySpec {
    #[serde(default)]
    pub min_title_length: Option<usize>,
    #[serde(default)]
    pub closed_tokens: Option<Vec<String>>,
    #[serde(default)]
    pub dates: DateSlots,
    #[serde(default)]
    pub lone_date: LoneDate,
    #[serde(default)]
    pub dedup: DedupKey,
    #[serde(default)]
    pub exclude_title_keywords: Vec<String>,
}

/// The tag is `kind`; the payload lives in `layout`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SiteKind {
    Table { layout: TableLayout },
    StatusList {
        #[serde(default)]
        layout: StatusListLayout,
    },
    DetailLinks { layout: DetailLinksLayout },
    TextBlocks { layout: TextBlocksLayout },
    Cards { layout: CardsLayout },
    SectionLinks { layout: SectionLinksLayout },
}

impl SiteKind {
    pub fn name(&self) -> &'static str {
        match self {
            SiteKind::Table { .. } => "table",
            SiteKind::StatusList { .. } => "status_list",
            SiteKind::DetailLinks { .. } => "detail_links",
            SiteKind::TextBlocks { .. } => "text_blocks",
            SiteKind::Cards { .. } => "cards",
            SiteKind::SectionLinks { .. } => "section_links",
        }
    }
}

/// Offers published as rows of an HTML table. Column indices are 0-based.
#[derive(Debug, Clone, Deserialize)]
pub struct TableLayout {
    #[serde(default = "default_row_selector")]
    pub row_selector: String,
    #[serde(default = "default_true")]
    pub skip_header: bool,
    /// Rows with fewer cells are ignored.
    #[serde(default)]
    pub min_cells: usize,
    pub title: usize,
    #[serde(default)]
    pub reference: Option<usize>,
    #[serde(default)]
    pub start: Option<usize>,
    #[serde(default)]
    pub deadline: Option<usize>,
    #[serde(default)]
    pub status: Option<usize>,
    /// Cell holding the offer link; the first anchor of the row otherwise.
    #[serde(default)]
    pub link: Option<usize>,
    /// Cards read instead when the table yields no rows.
    #[serde(default)]
    pub fallback: Option<CardsLayout>,
}

/// Blocks that pair offer links with open/closed status labels.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusListLayout {
    #[serde(default = "default_container")]
    pub container: String,
    #[serde(default = "default_link_selector")]
    pub link_selector: String,
    #[serde(default = "default_status_selector")]
    pub status_selector: String,
    #[serde(default = "default_open_status")]
    pub open_tokens: Vec<String>,
    #[serde(default = "default_closed_status")]
    pub closed_tokens: Vec<String>,
    /// Only links whose absolute URL contains this fragment are offers.
    #[serde(default)]
    pub link_contains: Option<String>,
    /// When non-empty, the link text must mention one of these words.
    #[serde(default)]
    pub link_text_keywords: Vec<String>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// Numbered result pages reached through `?<query_param>=<n>`.
#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    /// Links whose numeric text gives the page count.
    #[serde(default = "default_page_links")]
    pub selector: String,
    /// Upper bound on pages read, the first one included.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default = "default_page_param")]
    pub query_param: String,
}

impl Default for StatusListLayout {
    fn default() -> Self {
        Self {
            container: default_container(),
            link_selector: default_link_selector(),
            status_selector: default_status_selector(),
            open_tokens: default_open_status(),
            closed_tokens: default_closed_status(),
            link_contains: None,
            link_text_keywords: Vec::new(),
            pagination: None,
        }
    }
}

/// A listing page whose links lead to one detail page per offer.
#[derive(Debug, Clone, Deserialize)]
pub struct DetailLinksLayout {
    pub link_contains: String,
    #[serde(default = "default_title_selectors")]
    pub title_selectors: Vec<String>,
    #[serde(default = "default_open_keywords")]
    pub open_keywords: Vec<String>,
    #[serde(default = "default_closed_keywords")]
    pub closed_keywords: Vec<String>,
    /// Cap on detail pages fetched per run.
    #[serde(default = "default_max_details")]
    pub max_details: usize,
    /// When non-empty, listing link texts must mention one of these words.
    #[serde(default)]
    pub link_text_keywords: Vec<String>,
    /// Listing links whose text mentions any of these are navigation.
    #[serde(default)]
    pub skip_link_texts: Vec<String>,
}

/// Offers recognised by a code marker inside free page text.
#[derive(Debug, Clone, Deserialize)]
pub struct TextBlocksLayout {
    /// Regular expression matching the offer code, e.g. `\(IMIB\d+_C\d+\)`.
    pub marker: String,
    #[serde(default = "default_before")]
    pub before: usize,
    #[serde(default = "default_after")]
    pub after: usize,
    #[serde(default = "default_block_open_keywords")]
    pub open_keywords: Vec<String>,
    #[serde(default = "default_title_anchor")]
    pub title_anchor: String,
    #[serde(default = "default_min_title_chars")]
    pub min_title_chars: usize,
    #[serde(default = "default_max_title_chars")]
    pub max_title_chars: usize,
}

/// Self-contained offer cards (job boards, generic listings).
#[derive(Debug, Clone, Deserialize)]
pub struct CardsLayout {
    /// Tried in order; the first selector with an accepted card wins.
    pub selectors: Vec<String>,
    #[serde(default = "default_card_title_selectors")]
    pub title_selectors: Vec<String>,
    /// Words of card text used as title when no title selector matches.
    #[serde(default = "default_title_words")]
    pub title_words: usize,
    /// When non-empty, card text or link must mention one of these.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Cards whose text mentions any of these are skipped.
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    #[serde(default = "default_max_cards")]
    pub max_cards: usize,
}

/// Download links listed under one heading of the page.
#[derive(Debug, Clone, Deserialize)]
pub struct SectionLinksLayout {
    #[serde(default = "default_heading")]
    pub heading: String,
    /// Case-insensitive text identifying the heading of the section.
    pub heading_contains: String,
    #[serde(default)]
    pub link_text_contains: Option<String>,
    /// Required ending of the link path, e.g. `.pdf`.
    #[serde(default)]
    pub link_suffix: Option<String>,
    #[serde(default = "default_section_title_chars")]
    pub max_title_chars: usize,
}

fn default_true() -> bool {
    true
}
fn default_row_selector() -> String {
    "table tr".into()
}
fn default_container() -> String {
    "div".into()
}
fn default_link_selector() -> String {
    "a[href]".into()
}
fn default_status_selector() -> String {
    "p.status".into()
}
fn default_open_status() -> Vec<String> {
    vec!["abierta".into()]
}
fn default_closed_status() -> Vec<String> {
    vec!["cerrada".into()]
}
fn default_title_selectors() -> Vec<String> {
    ["h1", ".entry-title", "h2", ".title"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_open_keywords() -> Vec<String> {
    vec!["abierta".into(), "publicada".into(), "vigente".into()]
}
fn default_closed_keywords() -> Vec<String> {
    vec!["cerrada".into(), "finalizada".into()]
}
fn default_max_details() -> usize {
    40
}
fn default_page_links() -> String {
    ".pagination a[href]".into()
}
fn default_max_pages() -> usize {
    3
}
fn default_page_param() -> String {
    "page".into()
}
fn default_card_title_selectors() -> Vec<String> {
    [
        "h1", "h2", "h3", "h4", "h5", "h6", ".title", ".titulo", ".job-title", ".position-title",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_title_words() -> usize {
    10
}
fn default_max_cards() -> usize {
    20
}
fn default_heading() -> String {
    "h3".into()
}
fn default_section_title_chars() -> usize {
    100
}
fn default_before() -> usize {
    300
}
fn default_after() -> usize {
    600
}
fn default_block_open_keywords() -> Vec<String> {
    vec!["abierto".into(), "abierta".into()]
}
fn default_title_anchor() -> String {
    "resoluci".into()
}
fn default_min_title_chars() -> usize {
    20
}
fn default_max_title_chars() -> usize {
    220
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("institute entry with an empty id")]
    EmptyId,
    #[error("duplicate institute id: {0}")]
    DuplicateId(String),
    #[error("institute {id}: invalid url {url:?}: {reason}")]
    InvalidUrl {
        id: String,
        url: String,
        reason: String,
    },
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// `./ofertas.yaml` when present, otherwise `<config dir>/ofertas/ofertas.yaml`.
pub fn default_config_path() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    dirs::config_dir()
        .map(|dir| dir.join("ofertas").join(CONFIG_FILE_NAME))
        .unwrap_or(local)
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct OfertasConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for OfertasConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl OfertasConfigLoader {
    /// Start with `OFERTAS__` env overrides only.
    ///
    /// ```
    /// use ofertas_config::OfertasConfigLoader;
    ///
    /// let config = OfertasConfigLoader::new()
    ///     .with_yaml_str("version: '1'\ninstitutes: []")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert!(config.institutes.is_empty());
    /// assert_eq!(config.run.delay_ms, 2000);
    /// ```
    pub fn new() -> Self {
        let builder = Config::builder().add_source(
            Environment::with_prefix("OFERTAS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
        Self { builder }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Like [`Self::with_file`] but a missing file is not an error.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use ofertas_config::{OfertasConfigLoader, SiteKind};
    ///
    /// let cfg = OfertasConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// version: "test"
    /// institutes:
    ///   - id: "IISGM"
    ///     url: "https://www.iisgm.com/ofertas-de-empleo/"
    ///     kind: "status_list"
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.institutes.len(), 1);
    /// assert!(matches!(cfg.institutes[0].site, SiteKind::StatusList { .. }));
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// `${VAR}` placeholders are expanded before the strongly typed structs
    /// are materialised, and institute entries are validated (non-empty,
    /// unique ids and absolute URLs).
    ///
    /// ```
    /// use ofertas_config::OfertasConfigLoader;
    ///
    /// unsafe { std::env::set_var("OFERTAS_DOC_UA", "ofertas-bot/1.0"); }
    ///
    /// let config = OfertasConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// run:
    ///   user_agent: "${OFERTAS_DOC_UA}"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.run.user_agent, "ofertas-bot/1.0");
    ///
    /// unsafe { std::env::remove_var("OFERTAS_DOC_UA"); }
    /// ```
    pub fn load(self) -> Result<OfertasConfig, LoadError> {
        let cfg = self.builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: OfertasConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        typed.validate()?;

        Ok(typed)
    }
}
