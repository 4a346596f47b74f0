use crate::output;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Operational stage of the river gauge, by level in meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiverStage {
    Normal,
    Watch,
    Attention,
    Alert,
    Emergency,
}

impl RiverStage {
    pub fn from_level(meters: f64) -> Self {
        if meters <= 3.0 {
            RiverStage::Normal
        } else if meters <= 4.0 {
            RiverStage::Watch
        } else if meters <= 6.0 {
            RiverStage::Attention
        } else if meters <= 8.0 {
            RiverStage::Alert
        } else {
            RiverStage::Emergency
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiverStage::Normal => "Normal",
            RiverStage::Watch => "Watch",
            RiverStage::Attention => "Attention",
            RiverStage::Alert => "Alert",
            RiverStage::Emergency => "Maximum alert",
        }
    }

    /// Severity color used by status displays.
    pub fn color_name(&self) -> &'static str {
        match self {
            RiverStage::Normal => "green",
            RiverStage::Watch => "blue",
            RiverStage::Attention => "yellow",
            RiverStage::Alert => "orange",
            RiverStage::Emergency => "red",
        }
    }
}

impl fmt::Display for RiverStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }
}

/// One civil-defense incident record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub date: String,
    pub kind: String,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub severity: Severity,
    /// Gauge level at registration time, when known.
    pub river_level: Option<f64>,
}

/// Flat-file incident log.
pub struct IncidentLog {
    path: PathBuf,
    incidents: Vec<Incident>,
}

impl IncidentLog {
    /// Load the log; a missing file is an empty log, a corrupt one is an
    /// error.
    pub fn load(path: &Path) -> Result<Self> {
        let incidents = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("corrupt incident log {}", path.display()))?
        } else {
            Vec::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            incidents,
        })
    }

    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }

    pub fn add(&mut self, incident: Incident) {
        self.incidents.push(incident);
    }

    pub fn save(&self) -> Result<()> {
        let contents = serde_json::to_string_pretty(&self.incidents)?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }

    /// Plain-text summary: totals, per-kind and per-severity breakdowns,
    /// optionally the current gauge stage, then every record.
    pub fn render_report(&self, current_level: Option<f64>) -> String {
        use std::collections::BTreeMap;

        let mut out = String::new();
        out.push_str("Civil defense incident report\n");
        out.push_str(&format!("Generated: {}\n\n", output::timestamp()));
        out.push_str(&format!("Total incidents: {}\n", self.incidents.len()));

        let mut by_kind: BTreeMap<&str, usize> = BTreeMap::new();
        let mut by_severity: BTreeMap<&str, usize> = BTreeMap::new();
        for incident in &self.incidents {
            *by_kind.entry(incident.kind.as_str()).or_default() += 1;
            *by_severity.entry(incident.severity.label()).or_default() += 1;
        }
        out.push_str("By kind:\n");
        for (kind, count) in &by_kind {
            out.push_str(&format!("  {kind}: {count}\n"));
        }
        out.push_str("By severity:\n");
        for (severity, count) in &by_severity {
            out.push_str(&format!("  {severity}: {count}\n"));
        }

        if let Some(level) = current_level {
            let stage = RiverStage::from_level(level);
            out.push_str(&format!("\nCurrent river level: {level:.2} m ({stage})\n"));
        }

        if !self.incidents.is_empty() {
            out.push('\n');
            for incident in &self.incidents {
                let level = incident
                    .river_level
                    .map(|l| format!("{l:.2} m"))
                    .unwrap_or_else(|| "-".to_string());
                out.push_str(&format!(
                    "{} | {} | {} | ({:.4}, {:.4}) | {} | river {}\n",
                    incident.date,
                    incident.kind,
                    incident.location,
                    incident.latitude,
                    incident.longitude,
                    incident.severity.label(),
                    level
                ));
            }
        }
        out
    }
}

/// Status line for a gauge reading, e.g. `4.20 m (Attention)`.
pub fn format_level(meters: f64) -> String {
    let stage = RiverStage::from_level(meters);
    format!("{meters:.2} m ({stage})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_boundaries() {
        assert_eq!(RiverStage::from_level(0.0), RiverStage::Normal);
        assert_eq!(RiverStage::from_level(3.0), RiverStage::Normal);
        assert_eq!(RiverStage::from_level(3.01), RiverStage::Watch);
        assert_eq!(RiverStage::from_level(4.0), RiverStage::Watch);
        assert_eq!(RiverStage::from_level(5.5), RiverStage::Attention);
        assert_eq!(RiverStage::from_level(8.0), RiverStage::Alert);
        assert_eq!(RiverStage::from_level(8.01), RiverStage::Emergency);
    }

    fn sample_incident() -> Incident {
        Incident {
            date: "2025-06-01 14:30".to_string(),
            kind: "Flood".to_string(),
            location: "Downtown".to_string(),
            latitude: -26.9194,
            longitude: -49.0661,
            severity: Severity::High,
            river_level: Some(6.4),
        }
    }

    #[test]
    fn log_round_trips_through_json() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("incidents.json");

        let mut log = IncidentLog::load(&path)?;
        assert!(log.incidents().is_empty());
        log.add(sample_incident());
        log.save()?;

        let reloaded = IncidentLog::load(&path)?;
        assert_eq!(reloaded.incidents().len(), 1);
        assert_eq!(reloaded.incidents()[0].kind, "Flood");
        assert_eq!(reloaded.incidents()[0].severity, Severity::High);
        Ok(())
    }

    #[test]
    fn corrupt_log_is_an_error() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("incidents.json");
        std::fs::write(&path, "{ not json")?;
        assert!(IncidentLog::load(&path).is_err());
        Ok(())
    }

    #[test]
    fn report_summarizes_incidents() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let mut log = IncidentLog::load(&dir.path().join("incidents.json"))?;
        log.add(sample_incident());
        log.add(Incident {
            kind: "Landslide".to_string(),
            severity: Severity::Critical,
            ..sample_incident()
        });

        let report = log.render_report(Some(6.4));
        assert!(report.contains("Total incidents: 2"));
        assert!(report.contains("Flood: 1"));
        assert!(report.contains("Landslide: 1"));
        assert!(report.contains("Critical: 1"));
        assert!(report.contains("6.40 m (Alert)"));
        Ok(())
    }

    #[test]
    fn level_formatting() {
        assert_eq!(format_level(2.5), "2.50 m (Normal)");
        assert_eq!(format_level(9.1), "9.10 m (Maximum alert)");
    }
}
