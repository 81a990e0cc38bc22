use colored::{ColoredString, Colorize};

use rigeval_core::effectiveness::{AggregateReport, Correlation};
use rigeval_core::pipeline::ScoreSet;
use rigeval_core::types::ComplexityLevel;

fn level_colored(level: ComplexityLevel) -> ColoredString {
    let label = level.to_string();
    match level {
        ComplexityLevel::Low => label.green(),
        ComplexityLevel::Medium => label.yellow(),
        ComplexityLevel::High => label.red(),
    }
}

fn delta_colored(value: f64) -> ColoredString {
    let label = format!("{value:+.1}");
    if value > 0.0 {
        label.green()
    } else if value < 0.0 {
        label.red()
    } else {
        label.normal()
    }
}

fn correlation_line(label: &str, correlation: Option<&Correlation>) -> String {
    match correlation {
        Some(c) => format!(
            "  {label:<16} r = {:.3}  R² = {:.3}  n = {}  ({})\n",
            c.r, c.r_squared, c.n, c.strength
        ),
        None => format!("  {label:<16} {}\n", "undefined (insufficient sample)".dimmed()),
    }
}

/// Format the aggregate report for terminal output.
pub fn format_report(report: &AggregateReport) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "\n{}\n",
        "rigeval - Complexity vs Metadata Effectiveness".bold()
    ));
    out.push_str(&format!("{}\n\n", "=".repeat(48)));

    out.push_str(&format!("{}\n", "Correlation with complexity".bold()));
    out.push_str(&correlation_line(
        "accuracy delta",
        report.accuracy_correlation.as_ref(),
    ));
    out.push_str(&correlation_line(
        "time reduction",
        report.time_correlation.as_ref(),
    ));

    out.push_str(&format!(
        "\n{}: {} analyzed, {} rejected, {} agent comparison(s)\n",
        "Summary".bold(),
        report.overall.repositories,
        report.overall.rejected,
        report.overall.records,
    ));

    out.push_str(&format!("\n{}\n{}\n", "Repositories".bold(), "-".repeat(48)));
    for r in &report.repositories {
        let c = &r.complexity;
        let accuracy = r
            .mean_accuracy_delta
            .map(|d| delta_colored(d).to_string())
            .unwrap_or_else(|| "n/a".dimmed().to_string());
        let time = r
            .mean_time_reduction_pct
            .map(|d| format!("{}%", delta_colored(d)))
            .unwrap_or_else(|| "n/a".dimmed().to_string());
        out.push_str(&format!(
            "  {:<32} {:>6.1} {:<6}  raw {:>5.0}  accuracy {}  time {}\n",
            r.repository,
            c.normalized_score,
            level_colored(c.level),
            c.raw_score,
            accuracy,
            time,
        ));
    }

    if !report.agents.is_empty() {
        out.push_str(&format!("\n{}\n{}\n", "Agents".bold(), "-".repeat(48)));
        for a in &report.agents {
            out.push_str(&format!(
                "  {:<16} {} repo(s)  {:.1}% -> {:.1}%  accuracy {}  time {}%  efficiency {}%\n",
                a.agent,
                a.repositories,
                a.mean_accuracy_without,
                a.mean_accuracy_with,
                delta_colored(a.mean_accuracy_delta),
                delta_colored(a.mean_time_reduction_pct),
                delta_colored(a.mean_efficiency_gain_pct),
            ));
        }
    }

    for (heading, groups) in [
        ("By difficulty", &report.by_difficulty),
        ("By category", &report.by_category),
    ] {
        if groups.is_empty() {
            continue;
        }
        out.push_str(&format!("\n{}\n{}\n", heading.bold(), "-".repeat(48)));
        for (name, g) in groups {
            out.push_str(&format!(
                "  {:<16} {} question(s)  {:.1}% -> {:.1}%  accuracy {}\n",
                name,
                g.questions,
                g.mean_without,
                g.mean_with,
                delta_colored(g.mean_delta),
            ));
        }
    }

    if !report.failures.is_empty() {
        out.push_str(&format!(
            "\n{} ({})\n{}\n",
            "Rejected".red().bold(),
            report.failures.len(),
            "-".repeat(48)
        ));
        for f in &report.failures {
            out.push_str(&format!("  {} [{}] {}\n", "ERROR".red().bold(), f.kind, f.error));
        }
    }

    if !report.warnings.is_empty() {
        out.push_str(&format!("\n{}\n", "Warnings".yellow().bold()));
        for w in &report.warnings {
            out.push_str(&format!("  {} {w}\n", "WARN".yellow().bold()));
        }
    }

    out.push('\n');
    out
}

/// Format the report for `--strict` runs. Returns (text, passed).
pub fn format_strict(report: &AggregateReport) -> (String, bool) {
    let passed = report.failures.is_empty();
    let mut out = format_report(report);
    if passed {
        out.push_str(&format!("{}\n", "STRICT CHECK PASSED".green().bold()));
    } else {
        out.push_str(&format!(
            "{}: {} repository(ies) rejected\n",
            "STRICT CHECK FAILED".red().bold(),
            report.failures.len()
        ));
    }
    (out, passed)
}

/// Format a scored comparison set for terminal output.
pub fn format_scores(scores: &ScoreSet) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{}\n", "rigeval - Build-Graph Complexity".bold()));
    out.push_str(&format!("{}\n\n", "=".repeat(48)));

    for r in &scores.repositories {
        let c = &r.complexity;
        let m = &c.metrics;
        out.push_str(&format!(
            "{}  {:.1}/100 {}  (raw {:.0})\n",
            r.repository.bold(),
            c.normalized_score,
            level_colored(c.level),
            c.raw_score,
        ));
        out.push_str(&format!(
            "  components {}  languages {} [{}]  externals {}  depth {}  aggregators {}  cross-language {}\n",
            m.component_count,
            m.language_count,
            m.languages.join(", "),
            m.external_count,
            m.max_dependency_depth,
            m.aggregator_count,
            if m.has_cross_language_dependency { "yes" } else { "no" },
        ));
    }

    for f in &scores.failures {
        out.push_str(&format!("{} [{}] {}\n", "ERROR".red().bold(), f.kind, f.error));
    }

    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigeval_core::config::{Config, LevelThresholds};
    use rigeval_core::effectiveness::{aggregate, RepositoryAnalysis};
    use rigeval_core::evaluate::{BucketScore, EvaluationResult};
    use rigeval_core::pipeline::score_set;
    use rigeval_core::types::RunMode;
    use std::collections::BTreeMap;

    fn scores() -> ScoreSet {
        let graphs = vec![
            (
                "hello".to_string(),
                r#"{"components": {
                    "hello": {"kind": "executable", "language": "cxx"},
                    "util": {"kind": "library", "language": "cxx"}
                }}"#
                .to_string(),
            ),
            (
                "loop".to_string(),
                r#"{"components": {"a": {"kind": "module", "language": "go", "dependencies": ["a"]}}}"#
                    .to_string(),
            ),
        ];
        score_set(&graphs, &Config::default())
    }

    #[test]
    fn test_format_scores() {
        colored::control::set_override(false);
        let out = format_scores(&scores());
        assert!(out.contains("hello  100.0/100 HIGH  (raw 14)"));
        assert!(out.contains("languages 1 [cxx]"));
        assert!(out.contains("[cyclic_dependency]"));
        assert!(out.contains("a -> a"));
    }

    #[test]
    fn test_format_report_groups_and_efficiency() {
        let metrics = score_set(
            &[(
                "hello".to_string(),
                r#"{"components": {"hello": {"kind": "executable", "language": "cxx"}}}"#.to_string(),
            )],
            &Config::default(),
        );
        let repository = &metrics.repositories[0];
        let run = |mode: RunMode, accuracy: f64, earned: f64| EvaluationResult {
            repository: "hello".to_string(),
            agent: "claude".to_string(),
            mode,
            per_question: Vec::new(),
            accuracy_pct: accuracy,
            elapsed_seconds: 100.0,
            by_difficulty: BTreeMap::from([(
                "hard".to_string(),
                BucketScore {
                    earned,
                    max: 2,
                    percentage: earned * 50.0,
                },
            )]),
            by_category: BTreeMap::new(),
        };
        let analysis = RepositoryAnalysis {
            repository: "hello".to_string(),
            metrics: repository.complexity.metrics.clone(),
            breakdown: repository.complexity.breakdown.clone(),
            evaluations: vec![
                run(RunMode::WithMetadata, 100.0, 2.0),
                run(RunMode::WithoutMetadata, 50.0, 0.0),
            ],
        };
        let report = aggregate(&[analysis], Vec::new(), LevelThresholds::default()).unwrap();

        colored::control::set_override(false);
        let out = format_report(&report);
        assert!(out.contains("accuracy +50.0  time +0.0%  efficiency +100.0%"));
        assert!(out.contains("By difficulty"));
        assert!(out.contains("hard              2 question(s)  0.0% -> 100.0%  accuracy +100.0"));
        assert!(!out.contains("By category"));
    }
}
