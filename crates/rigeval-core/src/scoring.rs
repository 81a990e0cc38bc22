use std::collections::BTreeSet;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::error::CyclicDependencyError;
use crate::graph::{GraphNode, RepositoryGraph};
use crate::types::{ComponentId, ComponentKind};

/// Raw complexity metrics of one repository graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityMetrics {
    pub component_count: usize,
    pub language_count: usize,
    pub languages: Vec<String>,
    pub external_count: usize,
    pub max_dependency_depth: usize,
    pub aggregator_count: usize,
    pub has_cross_language_dependency: bool,
    /// Components with no dependencies at all.
    pub parallel_buildable_count: usize,
    pub test_count: usize,
    pub raw_score: f64,
}

/// Contribution of each factor to the raw score (count x weight).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityBreakdown {
    pub components: f64,
    pub languages: f64,
    pub externals: f64,
    pub depth: f64,
    pub aggregators: f64,
    pub cross_language: f64,
}

impl ComplexityBreakdown {
    pub fn total(&self) -> f64 {
        self.components
            + self.languages
            + self.externals
            + self.depth
            + self.aggregators
            + self.cross_language
    }
}

/// Weighted six-factor scorer. Holds only the weights, so it is pure per graph.
#[derive(Debug, Clone, Default)]
pub struct ComplexityScorer {
    weights: ScoringConfig,
}

impl ComplexityScorer {
    pub fn new(weights: ScoringConfig) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringConfig {
        &self.weights
    }

    /// Compute raw (unnormalized) metrics for a graph.
    pub fn score(&self, graph: &RepositoryGraph) -> Result<ComplexityMetrics, CyclicDependencyError> {
        let max_dependency_depth = max_dependency_depth(graph)?;

        let languages: BTreeSet<&str> = graph.components().map(|c| c.language.as_str()).collect();

        let mut externals: BTreeSet<&str> = BTreeSet::new();
        for component in graph.components() {
            externals.extend(component.externals.iter().map(String::as_str));
            externals.extend(
                component
                    .dependencies
                    .iter()
                    .map(ComponentId::as_str)
                    .filter(|d| graph.is_external(d)),
            );
        }

        let aggregator_count = graph
            .components()
            .filter(|c| c.kind == ComponentKind::Aggregator)
            .count();

        let parallel_buildable_count = graph
            .components()
            .filter(|c| c.dependencies.is_empty())
            .count();

        let mut metrics = ComplexityMetrics {
            component_count: graph.component_count(),
            language_count: languages.len(),
            languages: languages.iter().map(|l| l.to_string()).collect(),
            external_count: externals.len(),
            max_dependency_depth,
            aggregator_count,
            has_cross_language_dependency: has_cross_language_dependency(graph),
            parallel_buildable_count,
            test_count: graph.test_count(),
            raw_score: 0.0,
        };
        metrics.raw_score = self.breakdown(&metrics).total();
        Ok(metrics)
    }

    /// Per-factor contributions for already computed metrics.
    pub fn breakdown(&self, metrics: &ComplexityMetrics) -> ComplexityBreakdown {
        let w = &self.weights;
        ComplexityBreakdown {
            components: metrics.component_count as f64 * w.component_weight,
            languages: metrics.language_count as f64 * w.language_weight,
            externals: metrics.external_count as f64 * w.external_weight,
            depth: metrics.max_dependency_depth as f64 * w.depth_weight,
            aggregators: metrics.aggregator_count as f64 * w.aggregator_weight,
            cross_language: if metrics.has_cross_language_dependency {
                w.cross_language_bonus
            } else {
                0.0
            },
        }
    }
}

/// True iff some component directly depends on a component with another language.
pub fn has_cross_language_dependency(graph: &RepositoryGraph) -> bool {
    graph.components().any(|component| {
        component.dependencies.iter().any(|dep| {
            graph
                .language_of(dep.as_str())
                .is_some_and(|lang| lang != component.language)
        })
    })
}

struct Frame {
    node: NodeIndex,
    deps: Vec<NodeIndex>,
    next: usize,
    deepest: usize,
}

/// Longest dependency chain over all components.
///
/// depth(c) = 0 without dependencies, else 1 + max depth of its dependencies.
/// Externals are leaves. Uses an explicit stack with an on-path set for cycle
/// detection and a per-node cache so shared subgraphs are visited once.
pub fn max_dependency_depth(graph: &RepositoryGraph) -> Result<usize, CyclicDependencyError> {
    let inner = graph.inner();
    let mut memo: Vec<Option<usize>> = vec![None; inner.node_count()];
    let mut on_path: Vec<bool> = vec![false; inner.node_count()];
    let mut max_depth = 0;

    let frame_for = |node: NodeIndex| Frame {
        node,
        deps: inner.neighbors(node).collect(),
        next: 0,
        deepest: 0,
    };

    for &start in graph.component_indices() {
        if let Some(depth) = memo[start.index()] {
            max_depth = max_depth.max(depth);
            continue;
        }

        let mut stack = vec![frame_for(start)];
        on_path[start.index()] = true;

        while let Some(frame) = stack.last_mut() {
            if frame.next < frame.deps.len() {
                let dep = frame.deps[frame.next];
                frame.next += 1;

                if let Some(depth) = memo[dep.index()] {
                    frame.deepest = frame.deepest.max(depth + 1);
                    continue;
                }
                if on_path[dep.index()] {
                    return Err(cycle_error(graph, &stack, dep));
                }
                on_path[dep.index()] = true;
                stack.push(frame_for(dep));
                continue;
            }

            let depth = if frame.deps.is_empty() {
                0
            } else {
                frame.deepest
            };
            let node = frame.node;
            stack.pop();
            memo[node.index()] = Some(depth);
            on_path[node.index()] = false;
            if let Some(parent) = stack.last_mut() {
                parent.deepest = parent.deepest.max(depth + 1);
            }
        }

        if let Some(depth) = memo[start.index()] {
            max_depth = max_depth.max(depth);
        }
    }

    Ok(max_depth)
}

fn cycle_error(graph: &RepositoryGraph, stack: &[Frame], reentered: NodeIndex) -> CyclicDependencyError {
    let inner = graph.inner();
    let id_of = |idx: NodeIndex| match &inner[idx] {
        GraphNode::Component(c) => c.id.clone(),
        GraphNode::External(e) => ComponentId::new(e.0.clone()),
    };
    let start = stack
        .iter()
        .position(|f| f.node == reentered)
        .unwrap_or(0);
    let mut cycle: Vec<ComponentId> = stack[start..].iter().map(|f| id_of(f.node)).collect();
    cycle.push(id_of(reentered));
    CyclicDependencyError {
        repository: graph.name().to_string(),
        cycle,
    }
}
