use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::effectiveness::AggregateReport;
use crate::visualize::ScatterChart;

/// Run metadata stamped into every rendered artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub generated_at: String,
    pub root: String,
    pub tool_version: String,
}

/// Sink that turns the aggregate report and its charts into artifacts.
///
/// Implementations own the on-disk layout; the pipeline only hands over data.
pub trait ReportRenderer: Send + Sync {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    /// Write all artifacts into `out_dir` and return their paths.
    fn render(
        &self,
        report: &AggregateReport,
        charts: &[ScatterChart],
        meta: &ReportMeta,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>>;
}
