use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;

use crate::bundle::{self, InputBundle};
use crate::config::Config;
use crate::effectiveness::{
    self, AggregateReport, ComplexityRecord, RepositoryAnalysis, RepositoryFailure,
};
use crate::error::{GraphError, PipelineError, Stage};
use crate::evaluate::{self, AnswerKey, AnswerSet};
use crate::graph::RepositoryGraph;
use crate::normalize::ComparisonContext;
use crate::renderer::{ReportMeta, ReportRenderer};
use crate::scoring::ComplexityScorer;
use crate::visualize::{self, ScatterChart};

/// Everything one run produced.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub report: AggregateReport,
    pub charts: Vec<ScatterChart>,
    pub meta: ReportMeta,
    pub written: Vec<PathBuf>,
}

/// Outcome of analyzing one bundle: usable, or rejected by a graph-level error.
type BundleOutcome = Result<RepositoryAnalysis, RepositoryFailure>;

/// Discover -> PerRepositoryAnalyze -> Aggregate -> Visualize -> Render.
///
/// Single pass, no retries. Graph-level defects reject only their repository;
/// every other failure aborts the run with its stage and identifiers.
pub struct ReportPipeline {
    config: Config,
    scorer: ComplexityScorer,
    renderer: Box<dyn ReportRenderer>,
}

impl ReportPipeline {
    pub fn new(config: Config, renderer: Box<dyn ReportRenderer>) -> Self {
        let scorer = ComplexityScorer::new(config.scoring.clone());
        Self {
            config,
            scorer,
            renderer,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every stage and write the artifacts into `out_dir`.
    pub fn run(&self, root: &Path, out_dir: &Path) -> Result<PipelineOutcome, PipelineError> {
        let (report, charts) = self.analyze(root, Some(out_dir))?;

        let meta = ReportMeta {
            generated_at: chrono::Utc::now().to_rfc3339(),
            root: root.display().to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        tracing::info!(renderer = self.renderer.name(), out = %out_dir.display(), "render");
        std::fs::create_dir_all(out_dir)
            .map_err(|e| PipelineError::new(Stage::Render, e))?;
        let written = self
            .renderer
            .render(&report, &charts, &meta, out_dir)
            .map_err(|e| PipelineError::new(Stage::Render, e))?;

        Ok(PipelineOutcome {
            report,
            charts,
            meta,
            written,
        })
    }

    /// Run every stage up to and including Visualize.
    pub fn analyze(
        &self,
        root: &Path,
        skip: Option<&Path>,
    ) -> Result<(AggregateReport, Vec<ScatterChart>), PipelineError> {
        tracing::info!(root = %root.display(), "discover");
        let bundles = bundle::discover(root, &self.config.bundle, skip)?;
        if bundles.is_empty() {
            return Err(PipelineError::new(
                Stage::Discover,
                anyhow::anyhow!(
                    "no bundle matching '{}' under '{}'",
                    self.config.bundle.ground_truth,
                    root.display()
                ),
            ));
        }

        tracing::info!(bundles = bundles.len(), "per-repository analyze");
        let outcomes: Vec<Result<BundleOutcome, PipelineError>> = bundles
            .par_iter()
            .map(|bundle| self.analyze_bundle(bundle))
            .collect();

        let mut analyses = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome? {
                Ok(analysis) => analyses.push(analysis),
                Err(failure) => failures.push(failure),
            }
        }

        tracing::info!(
            analyzed = analyses.len(),
            rejected = failures.len(),
            "aggregate"
        );
        let report = effectiveness::aggregate(&analyses, failures, self.config.levels)
            .map_err(|e| PipelineError::new(Stage::Aggregate, e))?;

        tracing::info!("visualize");
        let charts = visualize::build_charts(&report, &self.config.charts)
            .map_err(|e| PipelineError::new(Stage::Visualize, e))?;

        Ok((report, charts))
    }

    fn analyze_bundle(&self, bundle: &InputBundle) -> Result<BundleOutcome, PipelineError> {
        let repository = bundle.repository.as_str();
        let fatal = |e: anyhow::Error| {
            PipelineError::new(Stage::PerRepositoryAnalyze, e).in_repository(repository)
        };

        let json = bundle.read_ground_truth().map_err(fatal)?;
        let scored = RepositoryGraph::from_json(repository, &json)
            .and_then(|graph| self.scorer.score(&graph).map_err(GraphError::from));
        let metrics = match scored {
            Ok(metrics) => metrics,
            Err(e) => {
                tracing::warn!(repository, "rejected: {e}");
                return Ok(Err(RepositoryFailure {
                    repository: repository.to_string(),
                    kind: e.kind_name().to_string(),
                    error: e.to_string(),
                }));
            }
        };
        let breakdown = self.scorer.breakdown(&metrics);

        let key = AnswerKey::load(&bundle.questions).map_err(fatal)?;
        let mut evaluations = Vec::with_capacity(bundle.answers.len());
        for file in &bundle.answers {
            let answers = AnswerSet::load(&file.path, repository, &file.agent, file.mode)
                .map_err(|e| fatal(e).for_agent(file.agent.clone()))?;
            evaluations.push(evaluate::evaluate(&answers, &key));
        }

        tracing::debug!(
            repository,
            raw_score = metrics.raw_score,
            runs = evaluations.len(),
            "analyzed"
        );
        Ok(Ok(RepositoryAnalysis {
            repository: repository.to_string(),
            metrics,
            breakdown,
            evaluations,
        }))
    }
}

/// Complexity of one repository scored outside a full run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRepository {
    pub repository: String,
    pub complexity: ComplexityRecord,
}

/// Ground-truth graphs scored and normalized as one comparison set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSet {
    pub repositories: Vec<ScoredRepository>,
    pub failures: Vec<RepositoryFailure>,
}

/// Score `(repository, ground-truth JSON)` pairs and normalize the survivors
/// against each other. Rejected graphs do not take part in normalization.
pub fn score_set(graphs: &[(String, String)], config: &Config) -> ScoreSet {
    let scorer = ComplexityScorer::new(config.scoring.clone());
    let mut scored = Vec::with_capacity(graphs.len());
    let mut failures = Vec::new();
    for (repository, json) in graphs {
        let result = RepositoryGraph::from_json(repository, json)
            .and_then(|graph| scorer.score(&graph).map_err(GraphError::from));
        match result {
            Ok(metrics) => scored.push((repository.as_str(), metrics)),
            Err(e) => {
                tracing::warn!(repository = %repository, "rejected: {e}");
                failures.push(RepositoryFailure {
                    repository: repository.clone(),
                    kind: e.kind_name().to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    let context = ComparisonContext::new(
        scored.iter().map(|(id, m)| (*id, m.raw_score)),
        config.levels,
    );
    let repositories = scored
        .into_iter()
        .map(|(repository, metrics)| {
            let normalized = context.normalize(metrics.raw_score);
            ScoredRepository {
                repository: repository.to_string(),
                complexity: ComplexityRecord {
                    raw_score: metrics.raw_score,
                    normalized_score: normalized.normalized_score,
                    level: normalized.level,
                    breakdown: scorer.breakdown(&metrics),
                    metrics,
                },
            }
        })
        .collect();

    ScoreSet {
        repositories,
        failures,
    }
}
