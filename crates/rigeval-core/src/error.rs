use std::fmt;

use thiserror::Error;

use crate::types::ComponentId;

/// A dependency names something that is neither a component nor a declared external.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("repository '{repository}': component '{component}' depends on undeclared '{dependency}'")]
pub struct MalformedGraphError {
    pub repository: String,
    pub component: ComponentId,
    pub dependency: String,
}

/// Depth traversal revisited a component already on the current path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("repository '{repository}': cyclic dependency {}", format_cycle(.cycle))]
pub struct CyclicDependencyError {
    pub repository: String,
    /// Offending path; the first and last entries are the same component.
    pub cycle: Vec<ComponentId>,
}

fn format_cycle(cycle: &[ComponentId]) -> String {
    cycle
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Data-integrity defects that abort analysis of a single repository.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error(transparent)]
    Malformed(#[from] MalformedGraphError),
    #[error(transparent)]
    Cyclic(#[from] CyclicDependencyError),
    #[error("repository '{repository}': invalid ground truth: {message}")]
    Parse { repository: String, message: String },
}

impl GraphError {
    pub fn kind_name(&self) -> &'static str {
        match self {
            GraphError::Malformed(_) => "malformed_graph",
            GraphError::Cyclic(_) => "cyclic_dependency",
            GraphError::Parse { .. } => "invalid_ground_truth",
        }
    }
}

/// Correlation is undefined for the given paired samples.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InsufficientSampleError {
    #[error("insufficient sample: {found} distinct x value(s), at least 2 required")]
    TooFewDistinct { found: usize },
    #[error("insufficient sample: y values are constant")]
    ConstantResponse,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("weight '{name}' must be non-negative, got {value}")]
    NegativeWeight { name: &'static str, value: f64 },
    #[error("'{name}' ({value}) must exceed component_weight ({component})")]
    WeightOrdering {
        name: &'static str,
        value: f64,
        component: f64,
    },
    #[error("level thresholds must satisfy 0 < low < medium <= 100, got low={low}, medium={medium}")]
    Thresholds { low: f64, medium: f64 },
    #[error("unknown marker shape '{shape}' for agent '{agent}'")]
    UnknownMarker { agent: String, shape: String },
    #[error("agents '{first}' and '{second}' are pinned to the same marker '{shape}'")]
    DuplicateMarker {
        first: String,
        second: String,
        shape: String,
    },
    #[error("invalid bundle pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("no repository could be analyzed ({rejected} rejected)")]
    EmptyComparisonSet { rejected: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VisualizationError {
    #[error("{agents} agents exceed the {available} distinct marker glyphs")]
    MarkersExhausted { agents: usize, available: usize },
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Discover,
    PerRepositoryAnalyze,
    Aggregate,
    Visualize,
    Render,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Discover => write!(f, "discover"),
            Stage::PerRepositoryAnalyze => write!(f, "per-repository analyze"),
            Stage::Aggregate => write!(f, "aggregate"),
            Stage::Visualize => write!(f, "visualize"),
            Stage::Render => write!(f, "render"),
        }
    }
}

/// Fatal pipeline failure with the stage and identifiers where it happened.
#[derive(Debug, Error)]
#[error("{stage} stage failed{}: {cause:#}", describe_scope(.repository.as_deref(), .agent.as_deref()))]
pub struct PipelineError {
    pub stage: Stage,
    pub repository: Option<String>,
    pub agent: Option<String>,
    pub cause: anyhow::Error,
}

impl PipelineError {
    pub fn new(stage: Stage, cause: impl Into<anyhow::Error>) -> Self {
        Self {
            stage,
            repository: None,
            agent: None,
            cause: cause.into(),
        }
    }

    pub fn in_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn for_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }
}

fn describe_scope(repository: Option<&str>, agent: Option<&str>) -> String {
    match (repository, agent) {
        (Some(r), Some(a)) => format!(" [repository '{r}', agent '{a}']"),
        (Some(r), None) => format!(" [repository '{r}']"),
        (None, Some(a)) => format!(" [agent '{a}']"),
        (None, None) => String::new(),
    }
}
