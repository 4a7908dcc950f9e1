//! Console report and JSON snapshot of a harvesting run.
use chrono::{DateTime, Local};
use ofertas_common::Result;
use ofertas_core::JobOffer;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::runner::InstituteRun;

const RULE_WIDTH: usize = 60;

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

/// `centro - título | Inicio: x | Límite: y | Link: z`
pub fn offer_line(offer: &JobOffer) -> String {
    format!(
        "{} - {} | Inicio: {} | Límite: {} | Link: {}",
        offer.center.as_deref().unwrap_or("Centro no especificado"),
        offer.title,
        or_dash(offer.start_date.as_deref()),
        or_dash(offer.deadline.as_deref()),
        or_dash(offer.link.as_deref()),
    )
}

/// Block printed after each institute.
pub fn institute_block(run: &InstituteRun) -> String {
    let name = run.institute.to_uppercase();
    let mut out = format!("\n{name}\n{}\n", "-".repeat(name.chars().count() + 4));
    if run.offers.is_empty() {
        out.push_str("Sin ofertas abiertas\n");
    } else {
        for offer in &run.offers {
            let _ = writeln!(out, "{}", offer_line(offer));
        }
    }
    out
}

pub fn total_offers(results: &[InstituteRun]) -> usize {
    results.iter().map(|r| r.offers.len()).sum()
}

/// Grand total plus one line per institute.
pub fn summary(results: &[InstituteRun]) -> String {
    let mut out = format!("\nTOTAL: {} ofertas\n{}\n", total_offers(results), "=".repeat(RULE_WIDTH));
    for run in results {
        let note = if run.failed { " (error)" } else { "" };
        let _ = writeln!(out, "  {}: {} ofertas{note}", run.institute, run.offers.len());
    }
    out
}

struct Centers<'a>(&'a [InstituteRun]);

#[derive(Serialize)]
struct Center<'a> {
    total_ofertas: usize,
    ofertas: &'a [JobOffer],
}

impl Serialize for Centers<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for run in self.0 {
            map.serialize_entry(
                &run.institute,
                &Center {
                    total_ofertas: run.offers.len(),
                    ofertas: &run.offers,
                },
            )?;
        }
        map.end()
    }
}

/// Snapshot document, institutes kept in run order.
#[derive(Serialize)]
pub struct Snapshot<'a> {
    timestamp: String,
    total_ofertas: usize,
    centros: Centers<'a>,
}

impl<'a> Snapshot<'a> {
    pub fn new(results: &'a [InstituteRun], now: DateTime<Local>) -> Self {
        Self {
            timestamp: now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            total_ofertas: total_offers(results),
            centros: Centers(results),
        }
    }
}

/// `<output_dir>/ofertas_YYYYmmdd_HHMMSS.json`
pub fn default_snapshot_path(output_dir: &Path, now: DateTime<Local>) -> PathBuf {
    output_dir.join(format!("ofertas_{}.json", now.format("%Y%m%d_%H%M%S")))
}

/// Write the snapshot as pretty JSON, creating parent directories.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot<'_>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, json)?;
    tracing::info!(path = %path.display(), total = snapshot.total_ofertas, "report.snapshot.saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 10, 9, 5, 7).unwrap()
    }

    fn results() -> Vec<InstituteRun> {
        vec![
            InstituteRun {
                institute: "Puerta_Hierro".into(),
                offers: vec![JobOffer {
                    institute: "Puerta_Hierro".into(),
                    title: "Técnico de laboratorio".into(),
                    start_date: Some("01/03/2025".into()),
                    deadline: Some("31/03/2025".into()),
                    center: Some("Hospital Puerta de Hierro".into()),
                    ..JobOffer::default()
                }],
                failed: false,
            },
            InstituteRun {
                institute: "IMIB".into(),
                offers: vec![],
                failed: true,
            },
        ]
    }

    #[test]
    fn console_lines_match_report_format() {
        let r = results();
        assert_eq!(
            offer_line(&r[0].offers[0]),
            "Hospital Puerta de Hierro - Técnico de laboratorio | Inicio: 01/03/2025 | Límite: 31/03/2025 | Link: -"
        );
        assert_eq!(institute_block(&r[1]), "\nIMIB\n--------\nSin ofertas abiertas\n");
        let s = summary(&r);
        assert!(s.contains("TOTAL: 1 ofertas"));
        assert!(s.contains("  IMIB: 0 ofertas (error)"));
    }

    #[test]
    fn snapshot_keeps_run_order_and_spanish_keys() {
        let r = results();
        let json = serde_json::to_value(Snapshot::new(&r, now())).unwrap();

        assert_eq!(json["timestamp"], "2025-03-10T09:05:07.000000");
        assert_eq!(json["total_ofertas"], 1);
        let centros = json["centros"].as_object().unwrap();
        assert_eq!(centros["IMIB"]["total_ofertas"], 0);
        let first = &centros["Puerta_Hierro"]["ofertas"][0];
        assert_eq!(first["iis"], "Puerta_Hierro");
        assert_eq!(first["titulo"], "Técnico de laboratorio");
        assert_eq!(first["fecha_limite"], "31/03/2025");

        let text = serde_json::to_string(&Snapshot::new(&r, now())).unwrap();
        assert!(text.find("Puerta_Hierro").unwrap() < text.find("IMIB").unwrap());
    }

    #[test]
    fn saves_under_timestamped_name() {
        let tmp = tempfile::tempdir().unwrap();
        let path = default_snapshot_path(&tmp.path().join("data"), now());
        assert!(path.ends_with("data/ofertas_20250310_090507.json"));

        let r = results();
        save_snapshot(&path, &Snapshot::new(&r, now())).unwrap();
        let back: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back["centros"]["Puerta_Hierro"]["total_ofertas"], 1);
    }
}
