use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::LevelThresholds;
use crate::error::{AggregateError, InsufficientSampleError};
use crate::evaluate::{BucketScore, EvaluationResult};
use crate::normalize::ComparisonContext;
use crate::scoring::{ComplexityBreakdown, ComplexityMetrics};
use crate::types::{round1, ComplexityLevel, RunMode};

/// With-metadata vs without-metadata outcome of one agent on one repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectivenessRecord {
    pub repository: String,
    pub agent: String,
    pub accuracy_with: f64,
    pub accuracy_without: f64,
    /// Percentage points gained with metadata.
    pub accuracy_delta: f64,
    pub time_with: f64,
    pub time_without: f64,
    /// Share of the without-metadata time saved, in percent.
    pub time_reduction_pct: f64,
    pub time_saved_seconds: f64,
    /// Change in accuracy-per-second, in percent.
    pub efficiency_gain_pct: f64,
}

/// Derive the effectiveness deltas between the two runs of one agent.
pub fn compare(with_meta: &EvaluationResult, without_meta: &EvaluationResult) -> EffectivenessRecord {
    let time_with = with_meta.elapsed_seconds;
    let time_without = without_meta.elapsed_seconds;
    let time_reduction_pct = if time_without > 0.0 {
        round1((time_without - time_with) / time_without * 100.0)
    } else {
        0.0
    };

    let efficiency = |accuracy: f64, seconds: f64| {
        if seconds > 0.0 {
            accuracy / seconds
        } else {
            0.0
        }
    };
    let eff_with = efficiency(with_meta.accuracy_pct, time_with);
    let eff_without = efficiency(without_meta.accuracy_pct, time_without);
    let efficiency_gain_pct = if eff_without > 0.0 {
        round1((eff_with - eff_without) / eff_without * 100.0)
    } else {
        0.0
    };

    EffectivenessRecord {
        repository: with_meta.repository.clone(),
        agent: with_meta.agent.clone(),
        accuracy_with: with_meta.accuracy_pct,
        accuracy_without: without_meta.accuracy_pct,
        accuracy_delta: round1(with_meta.accuracy_pct - without_meta.accuracy_pct),
        time_with,
        time_without,
        time_reduction_pct,
        time_saved_seconds: round1(time_without - time_with),
        efficiency_gain_pct,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorrelationStrength {
    NearPerfect,
    Strong,
    Moderate,
    Weak,
}

impl CorrelationStrength {
    fn from_r_squared(r_squared: f64) -> Self {
        if r_squared > 0.9 {
            CorrelationStrength::NearPerfect
        } else if r_squared > 0.7 {
            CorrelationStrength::Strong
        } else if r_squared > 0.4 {
            CorrelationStrength::Moderate
        } else {
            CorrelationStrength::Weak
        }
    }
}

impl fmt::Display for CorrelationStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationStrength::NearPerfect => write!(f, "near-perfect"),
            CorrelationStrength::Strong => write!(f, "strong"),
            CorrelationStrength::Moderate => write!(f, "moderate"),
            CorrelationStrength::Weak => write!(f, "weak"),
        }
    }
}

/// Least-squares line y = slope * x + intercept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trendline {
    pub slope: f64,
    pub intercept: f64,
}

impl Trendline {
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub r: f64,
    pub r_squared: f64,
    pub n: usize,
    pub strength: CorrelationStrength,
    pub trend: Trendline,
}

/// Pearson correlation of paired (complexity, delta) samples.
pub fn correlate(samples: &[(f64, f64)]) -> Result<Correlation, InsufficientSampleError> {
    let mut xs: Vec<f64> = samples.iter().map(|(x, _)| *x).collect();
    xs.sort_by(f64::total_cmp);
    xs.dedup();
    if xs.len() < 2 {
        return Err(InsufficientSampleError::TooFewDistinct { found: xs.len() });
    }

    let n = samples.len() as f64;
    let mean_x = samples.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = samples.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in samples {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if syy == 0.0 {
        return Err(InsufficientSampleError::ConstantResponse);
    }

    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    let r_squared = r * r;
    let slope = sxy / sxx;
    Ok(Correlation {
        r,
        r_squared,
        n: samples.len(),
        strength: CorrelationStrength::from_r_squared(r_squared),
        trend: Trendline {
            slope,
            intercept: mean_y - slope * mean_x,
        },
    })
}

/// Output of the per-repository stage: raw complexity plus every evaluated run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryAnalysis {
    pub repository: String,
    pub metrics: ComplexityMetrics,
    pub breakdown: ComplexityBreakdown,
    pub evaluations: Vec<EvaluationResult>,
}

/// A repository rejected by a graph-level error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryFailure {
    pub repository: String,
    pub kind: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityRecord {
    pub raw_score: f64,
    pub normalized_score: f64,
    pub level: ComplexityLevel,
    pub metrics: ComplexityMetrics,
    pub breakdown: ComplexityBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub repository: String,
    pub complexity: ComplexityRecord,
    pub effectiveness: Vec<EffectivenessRecord>,
    pub mean_accuracy_delta: Option<f64>,
    pub mean_time_reduction_pct: Option<f64>,
    pub mean_efficiency_gain_pct: Option<f64>,
    /// Question category -> with vs without accuracy across this repository's agents.
    pub by_category: BTreeMap<String, GroupDelta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub agent: String,
    pub repositories: usize,
    pub mean_accuracy_with: f64,
    pub mean_accuracy_without: f64,
    pub mean_accuracy_delta: f64,
    pub mean_time_reduction_pct: f64,
    pub mean_efficiency_gain_pct: f64,
    pub accuracy_correlation: Option<Correlation>,
    pub time_correlation: Option<Correlation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallSummary {
    pub repositories: usize,
    pub rejected: usize,
    pub records: usize,
    pub mean_accuracy_delta: Option<f64>,
    pub mean_time_reduction_pct: Option<f64>,
    pub mean_efficiency_gain_pct: Option<f64>,
}

/// With vs without accuracy of one question difficulty or category, averaged
/// over every paired run that asked such questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDelta {
    /// Questions in the group, counted once per repository.
    pub questions: usize,
    pub runs: usize,
    pub mean_with: f64,
    pub mean_without: f64,
    pub mean_delta: f64,
}

/// Cross-repository result of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub repositories: Vec<RepositorySummary>,
    pub agents: Vec<AgentSummary>,
    pub overall: OverallSummary,
    /// Normalized complexity vs per-repository mean accuracy delta.
    pub accuracy_correlation: Option<Correlation>,
    /// Normalized complexity vs per-repository mean time reduction.
    pub time_correlation: Option<Correlation>,
    pub by_difficulty: BTreeMap<String, GroupDelta>,
    pub by_category: BTreeMap<String, GroupDelta>,
    pub warnings: Vec<String>,
    pub failures: Vec<RepositoryFailure>,
}

impl AggregateReport {
    pub fn records(&self) -> impl Iterator<Item = &EffectivenessRecord> + '_ {
        self.repositories.iter().flat_map(|r| r.effectiveness.iter())
    }

    pub fn normalized_score_of(&self, repository: &str) -> Option<f64> {
        self.repositories
            .iter()
            .find(|r| r.repository == repository)
            .map(|r| r.complexity.normalized_score)
    }
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| round1(sum / count as f64))
}

fn correlate_or_warn(
    label: &str,
    samples: &[(f64, f64)],
    warnings: &mut Vec<String>,
) -> Option<Correlation> {
    match correlate(samples) {
        Ok(correlation) => Some(correlation),
        Err(e) => {
            tracing::warn!("{label} correlation omitted: {e}");
            warnings.push(format!("{label} correlation omitted: {e}"));
            None
        }
    }
}

type RunPair<'a> = (&'a EvaluationResult, &'a EvaluationResult);

/// Pair the two modes of each agent. Agents missing a mode are reported and skipped.
fn pair_runs<'a>(
    repository: &str,
    evaluations: &'a [EvaluationResult],
    warnings: &mut Vec<String>,
) -> Vec<RunPair<'a>> {
    let mut by_agent: BTreeMap<&str, (Option<&EvaluationResult>, Option<&EvaluationResult>)> =
        BTreeMap::new();
    for evaluation in evaluations {
        let slot = by_agent.entry(evaluation.agent.as_str()).or_default();
        match evaluation.mode {
            RunMode::WithMetadata => slot.0 = Some(evaluation),
            RunMode::WithoutMetadata => slot.1 = Some(evaluation),
        }
    }

    let mut pairs = Vec::with_capacity(by_agent.len());
    for (agent, pair) in by_agent {
        match pair {
            (Some(with_meta), Some(without_meta)) => pairs.push((with_meta, without_meta)),
            (Some(_), None) | (None, Some(_)) => {
                let missing = if pair.0.is_none() {
                    RunMode::WithMetadata
                } else {
                    RunMode::WithoutMetadata
                };
                let message =
                    format!("repository '{repository}': agent '{agent}' has no {missing} run, skipped");
                tracing::warn!("{message}");
                warnings.push(message);
            }
            (None, None) => {}
        }
    }
    pairs
}

#[derive(Default)]
struct GroupSamples<'a> {
    questions: BTreeMap<&'a str, usize>,
    with: Vec<f64>,
    without: Vec<f64>,
    delta: Vec<f64>,
}

/// Average with vs without bucket percentages over paired runs. A bucket
/// absent from one side of a pair counts as 0 there.
fn group_deltas<'a>(
    pairs: &[RunPair<'a>],
    buckets: impl Fn(&'a EvaluationResult) -> &'a BTreeMap<String, BucketScore>,
) -> BTreeMap<String, GroupDelta> {
    let mut groups: BTreeMap<&'a str, GroupSamples<'a>> = BTreeMap::new();
    for &(with_meta, without_meta) in pairs {
        let with_buckets = buckets(with_meta);
        let without_buckets = buckets(without_meta);
        let names: BTreeSet<&'a String> = with_buckets.keys().chain(without_buckets.keys()).collect();
        for name in names {
            let group = groups.entry(name.as_str()).or_default();
            let with_score = with_buckets.get(name);
            let without_score = without_buckets.get(name);
            let max = with_score.or(without_score).map_or(0, |b| b.max);
            let questions = group.questions.entry(with_meta.repository.as_str()).or_insert(0);
            *questions = (*questions).max(max);

            let with_pct = with_score.map_or(0.0, |b| b.percentage);
            let without_pct = without_score.map_or(0.0, |b| b.percentage);
            group.with.push(with_pct);
            group.without.push(without_pct);
            group.delta.push(with_pct - without_pct);
        }
    }
    groups
        .into_iter()
        .map(|(name, group)| {
            (
                name.to_string(),
                GroupDelta {
                    questions: group.questions.values().sum(),
                    runs: group.delta.len(),
                    mean_with: mean(group.with).unwrap_or(0.0),
                    mean_without: mean(group.without).unwrap_or(0.0),
                    mean_delta: mean(group.delta).unwrap_or(0.0),
                },
            )
        })
        .collect()
}

/// Combine per-repository analyses into the aggregate report.
///
/// Pure: the output depends only on the inputs, and every record is built
/// fresh rather than updated in place.
pub fn aggregate(
    analyses: &[RepositoryAnalysis],
    failures: Vec<RepositoryFailure>,
    thresholds: LevelThresholds,
) -> Result<AggregateReport, AggregateError> {
    if analyses.is_empty() {
        return Err(AggregateError::EmptyComparisonSet {
            rejected: failures.len(),
        });
    }

    let context = ComparisonContext::new(
        analyses
            .iter()
            .map(|a| (a.repository.as_str(), a.metrics.raw_score)),
        thresholds,
    );
    let mut warnings = Vec::new();

    let mut all_pairs: Vec<RunPair<'_>> = Vec::new();
    let mut repositories: Vec<RepositorySummary> = Vec::with_capacity(analyses.len());
    for analysis in analyses {
        let normalized = context.normalize(analysis.metrics.raw_score);
        let pairs = pair_runs(&analysis.repository, &analysis.evaluations, &mut warnings);
        let effectiveness: Vec<EffectivenessRecord> =
            pairs.iter().map(|&(with_meta, without_meta)| compare(with_meta, without_meta)).collect();
        repositories.push(RepositorySummary {
            repository: analysis.repository.clone(),
            complexity: ComplexityRecord {
                raw_score: analysis.metrics.raw_score,
                normalized_score: normalized.normalized_score,
                level: normalized.level,
                metrics: analysis.metrics.clone(),
                breakdown: analysis.breakdown.clone(),
            },
            mean_accuracy_delta: mean(effectiveness.iter().map(|r| r.accuracy_delta)),
            mean_time_reduction_pct: mean(effectiveness.iter().map(|r| r.time_reduction_pct)),
            mean_efficiency_gain_pct: mean(effectiveness.iter().map(|r| r.efficiency_gain_pct)),
            by_category: group_deltas(&pairs, |e| &e.by_category),
            effectiveness,
        });
        all_pairs.extend(pairs);
    }

    let accuracy_samples: Vec<(f64, f64)> = repositories
        .iter()
        .filter_map(|r| Some((r.complexity.normalized_score, r.mean_accuracy_delta?)))
        .collect();
    let time_samples: Vec<(f64, f64)> = repositories
        .iter()
        .filter_map(|r| Some((r.complexity.normalized_score, r.mean_time_reduction_pct?)))
        .collect();
    let accuracy_correlation = correlate_or_warn("accuracy delta", &accuracy_samples, &mut warnings);
    let time_correlation = correlate_or_warn("time reduction", &time_samples, &mut warnings);

    let mut per_agent: BTreeMap<&str, Vec<(f64, &EffectivenessRecord)>> = BTreeMap::new();
    for summary in &repositories {
        for record in &summary.effectiveness {
            per_agent
                .entry(record.agent.as_str())
                .or_default()
                .push((summary.complexity.normalized_score, record));
        }
    }

    let mut agents: Vec<AgentSummary> = Vec::with_capacity(per_agent.len());
    for (agent, rows) in &per_agent {
        let accuracy: Vec<(f64, f64)> = rows.iter().map(|(x, r)| (*x, r.accuracy_delta)).collect();
        let time: Vec<(f64, f64)> = rows.iter().map(|(x, r)| (*x, r.time_reduction_pct)).collect();
        agents.push(AgentSummary {
            agent: agent.to_string(),
            repositories: rows.len(),
            mean_accuracy_with: mean(rows.iter().map(|(_, r)| r.accuracy_with)).unwrap_or(0.0),
            mean_accuracy_without: mean(rows.iter().map(|(_, r)| r.accuracy_without))
                .unwrap_or(0.0),
            mean_accuracy_delta: mean(rows.iter().map(|(_, r)| r.accuracy_delta)).unwrap_or(0.0),
            mean_time_reduction_pct: mean(rows.iter().map(|(_, r)| r.time_reduction_pct))
                .unwrap_or(0.0),
            mean_efficiency_gain_pct: mean(rows.iter().map(|(_, r)| r.efficiency_gain_pct))
                .unwrap_or(0.0),
            accuracy_correlation: correlate_or_warn(
                &format!("agent '{agent}' accuracy delta"),
                &accuracy,
                &mut warnings,
            ),
            time_correlation: correlate_or_warn(
                &format!("agent '{agent}' time reduction"),
                &time,
                &mut warnings,
            ),
        });
    }

    let records: Vec<&EffectivenessRecord> =
        repositories.iter().flat_map(|r| r.effectiveness.iter()).collect();
    let overall = OverallSummary {
        repositories: repositories.len(),
        rejected: failures.len(),
        records: records.len(),
        mean_accuracy_delta: mean(records.iter().map(|r| r.accuracy_delta)),
        mean_time_reduction_pct: mean(records.iter().map(|r| r.time_reduction_pct)),
        mean_efficiency_gain_pct: mean(records.iter().map(|r| r.efficiency_gain_pct)),
    };
    let by_difficulty = group_deltas(&all_pairs, |e| &e.by_difficulty);
    let by_category = group_deltas(&all_pairs, |e| &e.by_category);

    tracing::info!(
        repositories = overall.repositories,
        rejected = overall.rejected,
        records = overall.records,
        "aggregated comparison set"
    );

    Ok(AggregateReport {
        repositories,
        agents,
        overall,
        accuracy_correlation,
        time_correlation,
        by_difficulty,
        by_category,
        warnings,
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(repository: &str, agent: &str, mode: RunMode, accuracy: f64, seconds: f64) -> EvaluationResult {
        EvaluationResult {
            repository: repository.to_string(),
            agent: agent.to_string(),
            mode,
            per_question: Vec::new(),
            accuracy_pct: accuracy,
            elapsed_seconds: seconds,
            by_difficulty: BTreeMap::new(),
            by_category: BTreeMap::new(),
        }
    }

    fn metrics(raw_score: f64) -> ComplexityMetrics {
        ComplexityMetrics {
            component_count: 1,
            language_count: 1,
            languages: vec!["cxx".to_string()],
            external_count: 0,
            max_dependency_depth: 0,
            aggregator_count: 0,
            has_cross_language_dependency: false,
            parallel_buildable_count: 1,
            test_count: 0,
            raw_score,
        }
    }

    fn breakdown() -> ComplexityBreakdown {
        ComplexityBreakdown {
            components: 0.0,
            languages: 0.0,
            externals: 0.0,
            depth: 0.0,
            aggregators: 0.0,
            cross_language: 0.0,
        }
    }

    fn analysis(repository: &str, raw: f64, runs: &[(&str, f64, f64, f64, f64)]) -> RepositoryAnalysis {
        let mut evaluations = Vec::new();
        for (agent, acc_with, acc_without, t_with, t_without) in runs {
            evaluations.push(result(repository, agent, RunMode::WithMetadata, *acc_with, *t_with));
            evaluations.push(result(repository, agent, RunMode::WithoutMetadata, *acc_without, *t_without));
        }
        RepositoryAnalysis {
            repository: repository.to_string(),
            metrics: metrics(raw),
            breakdown: breakdown(),
            evaluations,
        }
    }

    #[test]
    fn test_accuracy_delta_reference_example() {
        let with_meta = result("r", "claude", RunMode::WithMetadata, 75.6, 80.0);
        let without_meta = result("r", "claude", RunMode::WithoutMetadata, 58.9, 100.0);
        let record = compare(&with_meta, &without_meta);
        assert!((record.accuracy_delta - 16.7).abs() < 1e-9);
        assert!((record.time_reduction_pct - 20.0).abs() < 1e-9);
        assert!((record.time_saved_seconds - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_baseline_time_gives_zero_reduction() {
        let with_meta = result("r", "a", RunMode::WithMetadata, 50.0, 10.0);
        let without_meta = result("r", "a", RunMode::WithoutMetadata, 50.0, 0.0);
        let record = compare(&with_meta, &without_meta);
        assert_eq!(record.time_reduction_pct, 0.0);
        assert_eq!(record.efficiency_gain_pct, 0.0);
    }

    #[test]
    fn test_slower_run_gives_negative_reduction() {
        let with_meta = result("r", "a", RunMode::WithMetadata, 50.0, 150.0);
        let without_meta = result("r", "a", RunMode::WithoutMetadata, 50.0, 100.0);
        let record = compare(&with_meta, &without_meta);
        assert!((record.time_reduction_pct + 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_correlation_reference_example() {
        let c = correlate(&[(9.4, 2.2), (34.2, 6.7), (100.0, 16.7)]).unwrap();
        assert!(c.r > 0.99, "r = {}", c.r);
        assert_eq!(c.n, 3);
        assert_eq!(c.strength, CorrelationStrength::NearPerfect);
        assert!(c.trend.slope > 0.0);
    }

    #[test]
    fn test_correlation_negative_and_perfect() {
        let c = correlate(&[(0.0, 10.0), (50.0, 5.0), (100.0, 0.0)]).unwrap();
        assert!((c.r + 1.0).abs() < 1e-12);
        assert!((c.trend.at(20.0) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_correlation_needs_two_distinct_x() {
        assert_eq!(
            correlate(&[(50.0, 1.0), (50.0, 9.0)]),
            Err(InsufficientSampleError::TooFewDistinct { found: 1 })
        );
        assert_eq!(
            correlate(&[]),
            Err(InsufficientSampleError::TooFewDistinct { found: 0 })
        );
        assert_eq!(
            correlate(&[(10.0, 3.0), (90.0, 3.0)]),
            Err(InsufficientSampleError::ConstantResponse)
        );
    }

    #[test]
    fn test_aggregate_normalizes_and_correlates() {
        let analyses = vec![
            analysis("hello", 14.0, &[("claude", 60.0, 57.8, 90.0, 100.0)]),
            analysis("jni", 51.0, &[("claude", 70.0, 63.3, 60.0, 100.0)]),
            analysis("metaffi", 149.0, &[("claude", 75.6, 58.9, 50.0, 100.0)]),
        ];
        let report = aggregate(&analyses, Vec::new(), LevelThresholds::default()).unwrap();
        assert_eq!(report.repositories.len(), 3);
        assert!((report.repositories[0].complexity.normalized_score - 9.4).abs() < 1e-9);
        assert_eq!(report.repositories[0].complexity.level, ComplexityLevel::Low);
        assert!((report.repositories[2].complexity.normalized_score - 100.0).abs() < f64::EPSILON);

        let accuracy = report.accuracy_correlation.unwrap();
        assert!(accuracy.r > 0.99);
        assert_eq!(accuracy.n, 3);
        assert!(report.time_correlation.is_some());
        assert!(report.warnings.is_empty());

        assert_eq!(report.agents.len(), 1);
        assert_eq!(report.agents[0].repositories, 3);
        assert_eq!(report.overall.records, 3);
        assert_eq!(report.records().count(), 3);
    }

    #[test]
    fn test_aggregate_skips_agent_missing_a_mode() {
        let mut partial = analysis("solo", 20.0, &[("claude", 80.0, 70.0, 10.0, 20.0)]);
        partial
            .evaluations
            .push(result("solo", "cursor", RunMode::WithMetadata, 50.0, 10.0));
        let report = aggregate(&[partial], Vec::new(), LevelThresholds::default()).unwrap();
        assert_eq!(report.repositories[0].effectiveness.len(), 1);
        assert!(report.warnings.iter().any(|w| w.contains("cursor")));
    }

    #[test]
    fn test_degenerate_correlation_is_omitted_with_warning() {
        let report = aggregate(
            &[analysis("only", 30.0, &[("claude", 80.0, 60.0, 10.0, 20.0)])],
            Vec::new(),
            LevelThresholds::default(),
        )
        .unwrap();
        assert!(report.accuracy_correlation.is_none());
        assert!(report.time_correlation.is_none());
        assert_eq!(report.warnings.len(), 4);
        assert!(report.warnings[0].starts_with("accuracy delta correlation omitted"));
        assert!(report.warnings[2].starts_with("agent 'claude' accuracy delta correlation omitted"));
        assert!((report.repositories[0].complexity.normalized_score - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_comparison_set_is_an_error() {
        let failures = vec![RepositoryFailure {
            repository: "broken".to_string(),
            kind: "cyclic_dependency".to_string(),
            error: "cycle".to_string(),
        }];
        assert_eq!(
            aggregate(&[], failures, LevelThresholds::default()),
            Err(AggregateError::EmptyComparisonSet { rejected: 1 })
        );
    }

    #[test]
    fn test_failures_are_carried_into_report() {
        let failures = vec![RepositoryFailure {
            repository: "broken".to_string(),
            kind: "malformed_graph".to_string(),
            error: "undeclared".to_string(),
        }];
        let report = aggregate(
            &[analysis("ok", 10.0, &[])],
            failures,
            LevelThresholds::default(),
        )
        .unwrap();
        assert_eq!(report.overall.rejected, 1);
        assert_eq!(report.failures[0].repository, "broken");
        assert_eq!(report.repositories[0].mean_accuracy_delta, None);
    }

    #[test]
    fn test_agent_with_too_few_repositories_gets_warning() {
        let analyses = vec![
            analysis(
                "hello",
                14.0,
                &[("claude", 60.0, 50.0, 90.0, 100.0), ("codex", 70.0, 40.0, 30.0, 60.0)],
            ),
            analysis("jni", 51.0, &[("claude", 80.0, 50.0, 60.0, 100.0)]),
        ];
        let report = aggregate(&analyses, Vec::new(), LevelThresholds::default()).unwrap();

        let claude = &report.agents[0];
        assert_eq!(claude.agent, "claude");
        assert!(claude.accuracy_correlation.is_some());
        let codex = &report.agents[1];
        assert_eq!(codex.agent, "codex");
        assert!(codex.accuracy_correlation.is_none());
        assert!(codex.time_correlation.is_none());

        let codex_warnings: Vec<&String> = report
            .warnings
            .iter()
            .filter(|w| w.starts_with("agent 'codex'"))
            .collect();
        assert_eq!(codex_warnings.len(), 2, "{:?}", report.warnings);
        assert!(codex_warnings[0].contains("accuracy delta correlation omitted"));
        assert!(codex_warnings[1].contains("time reduction correlation omitted"));
        assert!(!report.warnings.iter().any(|w| w.starts_with("agent 'claude'")));
    }

    fn bucket(earned: f64, max: usize) -> BucketScore {
        BucketScore {
            earned,
            max,
            percentage: round1(earned / max as f64 * 100.0),
        }
    }

    fn with_buckets(
        mut run: EvaluationResult,
        difficulty: &[(&str, f64, usize)],
        category: &[(&str, f64, usize)],
    ) -> EvaluationResult {
        run.by_difficulty = difficulty
            .iter()
            .map(|(name, earned, max)| (name.to_string(), bucket(*earned, *max)))
            .collect();
        run.by_category = category
            .iter()
            .map(|(name, earned, max)| (name.to_string(), bucket(*earned, *max)))
            .collect();
        run
    }

    #[test]
    fn test_improvement_by_difficulty_and_category() {
        let hello = RepositoryAnalysis {
            repository: "hello".to_string(),
            metrics: metrics(14.0),
            breakdown: breakdown(),
            evaluations: vec![
                with_buckets(
                    result("hello", "claude", RunMode::WithMetadata, 100.0, 10.0),
                    &[("easy", 2.0, 2), ("hard", 1.0, 1)],
                    &[("build_system", 3.0, 3)],
                ),
                with_buckets(
                    result("hello", "claude", RunMode::WithoutMetadata, 33.3, 20.0),
                    &[("easy", 1.0, 2)],
                    &[("build_system", 1.0, 3)],
                ),
            ],
        };
        let jni = RepositoryAnalysis {
            repository: "jni".to_string(),
            metrics: metrics(51.0),
            breakdown: breakdown(),
            evaluations: vec![
                with_buckets(
                    result("jni", "claude", RunMode::WithMetadata, 50.0, 10.0),
                    &[("easy", 1.0, 2)],
                    &[("testing", 1.0, 2)],
                ),
                with_buckets(
                    result("jni", "claude", RunMode::WithoutMetadata, 50.0, 10.0),
                    &[("easy", 1.0, 2)],
                    &[("testing", 1.0, 2)],
                ),
            ],
        };
        let report = aggregate(&[hello, jni], Vec::new(), LevelThresholds::default()).unwrap();

        // easy: hello +50, jni +0.
        let easy = &report.by_difficulty["easy"];
        assert_eq!(easy.questions, 4);
        assert_eq!(easy.runs, 2);
        assert_eq!(easy.mean_with, 75.0);
        assert_eq!(easy.mean_without, 50.0);
        assert_eq!(easy.mean_delta, 25.0);

        // hard is missing from the without run, so it counts as 0 there.
        let hard = &report.by_difficulty["hard"];
        assert_eq!(hard.questions, 1);
        assert_eq!(hard.mean_delta, 100.0);

        assert_eq!(report.by_category["build_system"].mean_delta, 66.7);
        assert_eq!(report.by_category["testing"].mean_delta, 0.0);
        assert_eq!(report.repositories[0].by_category.len(), 1);
        assert!(report.repositories[0].by_category.contains_key("build_system"));

        // Accuracy per second: 100/10 vs 33.3/20.
        let record = &report.repositories[0].effectiveness[0];
        assert_eq!(record.efficiency_gain_pct, 500.6);
        assert_eq!(report.repositories[0].mean_efficiency_gain_pct, Some(500.6));
        assert_eq!(report.agents[0].mean_efficiency_gain_pct, 250.3);
    }
}
