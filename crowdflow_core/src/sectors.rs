//! Sector density reports - a key-value overlay next to the grid.
//!
//! Stewards and the image classifier report a coarse density label per named
//! section. These reports are not tied to grid cells and do not feed the
//! occupancy map; they are kept for display and manual confirmation.

use crowdflow_env::DensityLevel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::SystemTime;

/// Where a sector report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSource {
    Manual,
    Classifier,
}

/// Latest density label for one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorReport {
    pub section_id: String,
    pub level: DensityLevel,
    pub source: ReportSource,
    pub reported_at: SystemTime,
}

/// Section id -> latest report. Last write wins.
#[derive(Debug, Default)]
pub struct SectorReports {
    by_section: HashMap<String, SectorReport>,
}

impl SectorReports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a report, returning the one it replaced.
    pub fn record(&mut self, report: SectorReport) -> Option<SectorReport> {
        self.by_section.insert(report.section_id.clone(), report)
    }

    pub fn get(&self, section_id: &str) -> Option<&SectorReport> {
        self.by_section.get(section_id)
    }

    /// All reports, sorted by section id.
    pub fn all(&self) -> Vec<SectorReport> {
        let mut reports: Vec<SectorReport> = self.by_section.values().cloned().collect();
        reports.sort_by(|a, b| a.section_id.cmp(&b.section_id));
        reports
    }

    pub fn len(&self) -> usize {
        self.by_section.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_section.is_empty()
    }
}
