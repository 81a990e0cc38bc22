pub mod json;
pub mod markdown;
pub mod svg;
pub mod text;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use rigeval_core::effectiveness::AggregateReport;
use rigeval_core::renderer::{ReportMeta, ReportRenderer};
use rigeval_core::visualize::ScatterChart;

pub const SUMMARY_FILE: &str = "summary.json";
pub const ANALYSIS_FILE: &str = "analysis.md";

/// Writes one SVG per chart plus `summary.json` and `analysis.md`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileRenderer;

impl FileRenderer {
    pub fn new() -> Self {
        Self
    }
}

fn write_file(path: PathBuf, content: &str) -> Result<PathBuf> {
    std::fs::write(&path, content)
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    tracing::debug!(path = %path.display(), "wrote artifact");
    Ok(path)
}

impl ReportRenderer for FileRenderer {
    fn name(&self) -> &str {
        "files"
    }

    fn render(
        &self,
        report: &AggregateReport,
        charts: &[ScatterChart],
        meta: &ReportMeta,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(charts.len() + 2);
        for chart in charts {
            written.push(write_file(
                out_dir.join(format!("{}.svg", chart.file_stem)),
                &svg::render_chart(chart),
            )?);
        }
        written.push(write_file(
            out_dir.join(SUMMARY_FILE),
            &json::format_report(report, charts, meta, false),
        )?);
        written.push(write_file(
            out_dir.join(ANALYSIS_FILE),
            &markdown::format_report(report, charts, meta),
        )?);
        Ok(written)
    }
}
