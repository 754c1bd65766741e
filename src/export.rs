use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ReputationError, Result};
use crate::reputation::pipeline::ScoringReport;

#[derive(Debug, Serialize)]
pub struct ExportRepository {
    pub name: String,
    pub owner: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportContributor {
    pub username: String,
    pub contributions: i64,
    pub additions: i64,
    pub deletions: i64,
    pub commits: i64,
    pub impact_score: f64,
}

/// Snapshot of one scoring run, contributors ordered by descending score.
/// Keys are camelCase, matching the dashboard's "Export JSON" download.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisExport {
    pub repository: ExportRepository,
    pub formula_version: u32,
    pub contributors: Vec<ExportContributor>,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisExport {
    pub fn from_report(report: &ScoringReport, analyzed_at: DateTime<Utc>) -> AnalysisExport {
        AnalysisExport {
            repository: ExportRepository {
                name: report.repo.clone(),
                owner: report.owner.clone(),
                url: format!("https://github.com/{}/{}", report.owner, report.repo),
            },
            formula_version: report.formula_version,
            contributors: report
                .outcomes
                .iter()
                .map(|o| ExportContributor {
                    username: o.aggregate.username.clone(),
                    contributions: o.aggregate.contributions,
                    additions: o.aggregate.additions,
                    deletions: o.aggregate.deletions,
                    commits: o.aggregate.commits,
                    impact_score: (o.score * 100.0).round() / 100.0,
                })
                .collect(),
            analyzed_at,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ReputationError::InvalidInput(format!("cannot serialize export: {e}")))
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?).map_err(|e| {
            ReputationError::InvalidInput(format!("cannot write {}: {e}", path.display()))
        })
    }
}
