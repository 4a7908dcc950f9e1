use anyhow::{Result, bail};
use chrono::NaiveDate;
use ofertas_config::OfertasConfig;
use ofertas_core::offer::normalize_batch_on;
use ofertas_core::{JobOffer, OfferPolicy, RawOfferSource};
use ofertas_http::HttpClient;
use std::time::Duration;
use tokio::time::sleep;

/// One institute ready to be harvested.
pub struct Site {
    pub policy: OfferPolicy,
    pub source: Box<dyn RawOfferSource>,
}

/// Offers kept for one institute, in configuration order.
#[derive(Debug, Clone)]
pub struct InstituteRun {
    pub institute: String,
    pub offers: Vec<JobOffer>,
    pub failed: bool,
}

pub struct Runner {
    sites: Vec<Site>,
    delay: Duration,
}

impl Runner {
    pub fn new(sites: Vec<Site>, delay: Duration) -> Self {
        Self { sites, delay }
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Harvest every site one after another.
    ///
    /// A failing site is logged and reported with no offers; the run goes on.
    pub async fn run(self, today: NaiveDate) -> Vec<InstituteRun> {
        let total = self.sites.len();
        let mut results = Vec::with_capacity(total);

        for (idx, site) in self.sites.into_iter().enumerate() {
            let institute = site.source.institute().to_string();
            tracing::info!(%institute, position = idx + 1, total, "runner.site.start");

            let (offers, failed) = match site.source.collect().await {
                Ok(raws) => {
                    let outcome = normalize_batch_on(raws, &site.policy, today);
                    tracing::info!(
                        %institute,
                        seen = outcome.seen,
                        discarded = outcome.discarded,
                        duplicates = outcome.duplicates,
                        kept = outcome.offers.len(),
                        "runner.site.done"
                    );
                    (outcome.offers, false)
                }
                Err(e) => {
                    tracing::warn!(%institute, error = %e, "runner.site.failed");
                    (Vec::new(), true)
                }
            };
            results.push(InstituteRun {
                institute,
                offers,
                failed,
            });

            if idx + 1 < total && !self.delay.is_zero() {
                sleep(self.delay).await;
            }
        }
        results
    }
}

/// Build the runner for the enabled institutes, optionally narrowed by id.
pub fn build_from_config(cfg: &OfertasConfig, only: &[String]) -> Result<Runner> {
    for id in only {
        if cfg.institute(id).is_none() {
            bail!("unknown institute: {id}");
        }
    }

    let http = HttpClient::new(&cfg.run.user_agent)?
        .with_timeout(Duration::from_secs(cfg.run.timeout_secs))
        .with_retries(cfg.run.retries);

    let mut sites = Vec::new();
    for spec in cfg.enabled_institutes() {
        if !only.is_empty() && !only.iter().any(|id| id.eq_ignore_ascii_case(&spec.id)) {
            continue;
        }
        let source = ofertas_sites::build_source(spec, http.clone())?;
        sites.push(Site {
            policy: spec.policy(),
            source,
        });
    }
    if sites.is_empty() {
        tracing::warn!(only = ?only, "runner.no_sites");
    }

    Ok(Runner::new(sites, Duration::from_millis(cfg.run.delay_ms)))
}
