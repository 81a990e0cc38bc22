use std::collections::BTreeMap;

use rigeval_core::effectiveness::{AggregateReport, Correlation, GroupDelta};
use rigeval_core::renderer::ReportMeta;
use rigeval_core::visualize::ScatterChart;

fn signed(value: f64) -> String {
    format!("{value:+.1}")
}

fn optional(value: Option<f64>) -> String {
    value.map(signed).unwrap_or_else(|| "n/a".to_string())
}

fn group_table(out: &mut String, heading: &str, column: &str, groups: &BTreeMap<String, GroupDelta>) {
    if groups.is_empty() {
        return;
    }
    out.push_str(&format!("\n## {heading}\n\n"));
    out.push_str(&format!("| {column} | Questions | Runs | Without | With | Delta |\n"));
    out.push_str("|---|-----------|------|---------|------|-------|\n");
    for (name, group) in groups {
        out.push_str(&format!(
            "| {} | {} | {} | {:.1}% | {:.1}% | {} |\n",
            name,
            group.questions,
            group.runs,
            group.mean_without,
            group.mean_with,
            signed(group.mean_delta),
        ));
    }
}

fn correlation_row(label: &str, correlation: Option<&Correlation>) -> String {
    match correlation {
        Some(c) => format!(
            "| {label} | {:.3} | {:.3} | {} | {} |\n",
            c.r, c.r_squared, c.n, c.strength
        ),
        None => format!("| {label} | n/a | n/a | - | undefined |\n"),
    }
}

/// Format the aggregate report as Markdown (`analysis.md`).
pub fn format_report(report: &AggregateReport, charts: &[ScatterChart], meta: &ReportMeta) -> String {
    let mut out = String::new();

    out.push_str("# Build-Graph Complexity vs Metadata Effectiveness\n\n");
    out.push_str(&format!(
        "Generated {} from `{}` (rigeval {})\n\n",
        meta.generated_at, meta.root, meta.tool_version
    ));

    // Headline
    out.push_str("## Correlation with Complexity\n\n");
    out.push_str("| Metric | r | R² | n | Strength |\n");
    out.push_str("|--------|---|----|---|----------|\n");
    out.push_str(&correlation_row(
        "Accuracy delta",
        report.accuracy_correlation.as_ref(),
    ));
    out.push_str(&correlation_row(
        "Time reduction",
        report.time_correlation.as_ref(),
    ));
    out.push_str(&format!(
        "\n- **Repositories analyzed:** {}\n- **Repositories rejected:** {}\n- **Agent comparisons:** {}\n- **Mean accuracy delta:** {} pp\n- **Mean time reduction:** {} %\n- **Mean efficiency gain:** {} %\n",
        report.overall.repositories,
        report.overall.rejected,
        report.overall.records,
        optional(report.overall.mean_accuracy_delta),
        optional(report.overall.mean_time_reduction_pct),
        optional(report.overall.mean_efficiency_gain_pct),
    ));

    // Complexity
    out.push_str("\n## Repository Complexity\n\n");
    out.push_str("| Repository | Raw | Normalized | Level | Components | Languages | Externals | Depth | Aggregators | Cross-language |\n");
    out.push_str("|------------|-----|------------|-------|------------|-----------|-----------|-------|-------------|----------------|\n");
    for r in &report.repositories {
        let c = &r.complexity;
        let m = &c.metrics;
        out.push_str(&format!(
            "| {} | {:.0} | {:.1} | {} | {} | {} | {} | {} | {} | {} |\n",
            r.repository,
            c.raw_score,
            c.normalized_score,
            c.level,
            m.component_count,
            m.languages.join(", "),
            m.external_count,
            m.max_dependency_depth,
            m.aggregator_count,
            if m.has_cross_language_dependency { "yes" } else { "no" },
        ));
    }

    out.push_str("\n### Score Derivation\n\n");
    for r in &report.repositories {
        let b = &r.complexity.breakdown;
        out.push_str(&format!(
            "- **{}**: components {:.0} + languages {:.0} + externals {:.0} + depth {:.0} + aggregators {:.0} + cross-language {:.0} = **{:.0}**\n",
            r.repository,
            b.components,
            b.languages,
            b.externals,
            b.depth,
            b.aggregators,
            b.cross_language,
            b.total(),
        ));
    }

    // Effectiveness
    if !report.agents.is_empty() {
        out.push_str("\n## Effectiveness by Agent\n\n");
        out.push_str("| Agent | Repositories | Without | With | Delta | Time reduction | Efficiency gain | r (accuracy) |\n");
        out.push_str("|-------|--------------|---------|------|-------|----------------|-----------------|--------------|\n");
        for a in &report.agents {
            out.push_str(&format!(
                "| {} | {} | {:.1}% | {:.1}% | {} | {}% | {}% | {} |\n",
                a.agent,
                a.repositories,
                a.mean_accuracy_without,
                a.mean_accuracy_with,
                signed(a.mean_accuracy_delta),
                signed(a.mean_time_reduction_pct),
                signed(a.mean_efficiency_gain_pct),
                a.accuracy_correlation
                    .map(|c| format!("{:.3}", c.r))
                    .unwrap_or_else(|| "n/a".to_string()),
            ));
        }

        out.push_str("\n## Results by Repository\n\n");
        out.push_str("| Repository | Agent | Without | With | Delta | Time without | Time with | Reduction | Efficiency gain |\n");
        out.push_str("|------------|-------|---------|------|-------|--------------|-----------|-----------|-----------------|\n");
        for r in &report.repositories {
            for e in &r.effectiveness {
                out.push_str(&format!(
                    "| {} | {} | {:.1}% | {:.1}% | {} | {:.0}s | {:.0}s | {}% | {}% |\n",
                    r.repository,
                    e.agent,
                    e.accuracy_without,
                    e.accuracy_with,
                    signed(e.accuracy_delta),
                    e.time_without,
                    e.time_with,
                    signed(e.time_reduction_pct),
                    signed(e.efficiency_gain_pct),
                ));
            }
        }
    }

    group_table(&mut out, "Improvement by Difficulty", "Difficulty", &report.by_difficulty);
    group_table(&mut out, "Improvement by Category", "Category", &report.by_category);
    for r in &report.repositories {
        if r.by_category.len() > 1 {
            group_table(
                &mut out,
                &format!("Categories in {}", r.repository),
                "Category",
                &r.by_category,
            );
        }
    }

    // Charts
    if !charts.is_empty() {
        out.push_str("\n## Charts\n\n");
        for chart in charts {
            out.push_str(&format!(
                "![{}]({}.svg)\n\n",
                chart.title, chart.file_stem
            ));
        }
        if let Some(first) = charts.first() {
            let legend: Vec<String> = first
                .series
                .iter()
                .map(|s| format!("{} = {}", s.agent, s.marker))
                .collect();
            if !legend.is_empty() {
                out.push_str(&format!("Markers: {}\n", legend.join(", ")));
            }
        }
    }

    if !report.failures.is_empty() {
        out.push_str("\n## Rejected Repositories\n\n");
        out.push_str("| Repository | Kind | Error |\n");
        out.push_str("|------------|------|-------|\n");
        for f in &report.failures {
            out.push_str(&format!(
                "| {} | {} | {} |\n",
                f.repository,
                f.kind,
                f.error.replace('|', "\\|")
            ));
        }
    }

    if !report.warnings.is_empty() {
        out.push_str("\n## Warnings\n\n");
        for w in &report.warnings {
            out.push_str(&format!("- {w}\n"));
        }
    }

    out
}
