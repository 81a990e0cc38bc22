use serde::Serialize;

use rigeval_core::effectiveness::AggregateReport;
use rigeval_core::evaluate::EvaluationResult;
use rigeval_core::pipeline::ScoreSet;
use rigeval_core::renderer::ReportMeta;
use rigeval_core::visualize::ScatterChart;

/// `summary.json` layout: run metadata, the aggregate report and chart data.
#[derive(Debug, Serialize)]
pub struct SummaryOutput<'a> {
    pub meta: &'a ReportMeta,
    #[serde(flatten)]
    pub report: &'a AggregateReport,
    pub charts: &'a [ScatterChart],
}

fn to_json<T: Serialize>(value: &T, compact: bool) -> String {
    if compact {
        serde_json::to_string(value).expect("report types should be serializable")
    } else {
        serde_json::to_string_pretty(value).expect("report types should be serializable")
    }
}

/// Format the full aggregate report as JSON.
pub fn format_report(
    report: &AggregateReport,
    charts: &[ScatterChart],
    meta: &ReportMeta,
    compact: bool,
) -> String {
    to_json(
        &SummaryOutput {
            meta,
            report,
            charts,
        },
        compact,
    )
}

/// Format a scored comparison set as JSON.
pub fn format_scores(scores: &ScoreSet, compact: bool) -> String {
    to_json(scores, compact)
}

/// Format one evaluation result as JSON.
pub fn format_evaluation(result: &EvaluationResult, compact: bool) -> String {
    to_json(result, compact)
}
