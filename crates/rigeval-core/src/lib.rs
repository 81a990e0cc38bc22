pub mod bundle;
pub mod config;
pub mod effectiveness;
pub mod error;
pub mod evaluate;
pub mod graph;
pub mod normalize;
pub mod pipeline;
pub mod renderer;
pub mod scoring;
pub mod types;
pub mod visualize;

pub use config::Config;
pub use effectiveness::{AggregateReport, Correlation, EffectivenessRecord};
pub use error::{
    AggregateError, ConfigError, CyclicDependencyError, GraphError, InsufficientSampleError,
    MalformedGraphError, PipelineError, Stage, VisualizationError,
};
pub use evaluate::{AnswerKey, AnswerSet, EvaluationResult};
pub use graph::RepositoryGraph;
pub use normalize::ComparisonContext;
pub use pipeline::{score_set, PipelineOutcome, ReportPipeline, ScoreSet, ScoredRepository};
pub use renderer::{ReportMeta, ReportRenderer};
pub use scoring::{ComplexityMetrics, ComplexityScorer};
pub use types::*;
