use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, MalformedGraphError};
use crate::types::{Component, ComponentId, ComponentKind, External};

/// Ground-truth description of one component, as produced by an extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawComponent {
    pub kind: ComponentKind,
    pub language: String,
    #[serde(default, alias = "depends_on_ids")]
    pub dependencies: Vec<String>,
    #[serde(default, alias = "external_packages")]
    pub externals: Vec<String>,
}

/// Ground-truth graph input: component id -> description plus declared externals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroundTruth {
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub components: BTreeMap<String, RawComponent>,
    #[serde(default)]
    pub externals: Vec<String>,
    #[serde(default)]
    pub tests: Vec<String>,
}

/// Node in the dependency graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GraphNode {
    Component(Component),
    External(External),
}

impl GraphNode {
    pub fn id(&self) -> &str {
        match self {
            GraphNode::Component(c) => c.id.as_str(),
            GraphNode::External(e) => &e.0,
        }
    }

    pub fn as_component(&self) -> Option<&Component> {
        match self {
            GraphNode::Component(c) => Some(c),
            GraphNode::External(_) => None,
        }
    }
}

/// Immutable build graph of one repository.
///
/// Components and externals are both nodes; every edge starts at a component.
#[derive(Debug)]
pub struct RepositoryGraph {
    name: String,
    graph: DiGraph<GraphNode, ()>,
    components: Vec<NodeIndex>,
    externals: Vec<NodeIndex>,
    index: HashMap<String, NodeIndex>,
    test_count: usize,
}

impl RepositoryGraph {
    /// Build a graph from ground truth, rejecting dependencies that name
    /// neither a component nor a declared external.
    pub fn load(name: &str, raw: &GroundTruth) -> Result<Self, GraphError> {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        let mut components = Vec::with_capacity(raw.components.len());

        for (id, rc) in &raw.components {
            let id = id.trim();
            if id.is_empty() {
                return Err(GraphError::Parse {
                    repository: name.to_string(),
                    message: "component with an empty id".to_string(),
                });
            }
            if index.contains_key(id) {
                return Err(GraphError::Parse {
                    repository: name.to_string(),
                    message: format!("duplicate component id '{id}'"),
                });
            }
            let mut dependencies: Vec<ComponentId> = Vec::with_capacity(rc.dependencies.len());
            for dep in &rc.dependencies {
                let dep = ComponentId::new(dep.trim());
                if !dependencies.contains(&dep) {
                    dependencies.push(dep);
                }
            }
            let component = Component {
                id: ComponentId::new(id),
                kind: rc.kind,
                language: rc.language.trim().to_lowercase(),
                dependencies,
                externals: rc.externals.iter().map(|e| e.trim().to_string()).collect(),
            };
            let idx = graph.add_node(GraphNode::Component(component));
            index.insert(id.to_string(), idx);
            components.push(idx);
        }

        // Declared externals: the top-level list plus every component's own list.
        let mut declared: BTreeSet<String> =
            raw.externals.iter().map(|e| e.trim().to_string()).collect();
        for rc in raw.components.values() {
            declared.extend(rc.externals.iter().map(|e| e.trim().to_string()));
        }
        let mut externals = Vec::new();
        for ext in declared {
            if index.contains_key(&ext) {
                continue;
            }
            let idx = graph.add_node(GraphNode::External(External(ext.clone())));
            index.insert(ext, idx);
            externals.push(idx);
        }

        let mut edges = Vec::new();
        for &from in &components {
            let Some(component) = graph[from].as_component() else {
                continue;
            };
            for dep in &component.dependencies {
                match index.get(dep.as_str()) {
                    Some(&to) => edges.push((from, to)),
                    None => {
                        return Err(MalformedGraphError {
                            repository: name.to_string(),
                            component: component.id.clone(),
                            dependency: dep.0.clone(),
                        }
                        .into())
                    }
                }
            }
        }
        for (from, to) in edges {
            graph.add_edge(from, to, ());
        }

        Ok(Self {
            name: name.to_string(),
            graph,
            components,
            externals,
            index,
            test_count: raw.tests.len(),
        })
    }

    /// Parse ground-truth JSON and build the graph.
    pub fn from_json(name: &str, json: &str) -> Result<Self, GraphError> {
        let raw: GroundTruth = serde_json::from_str(json).map_err(|e| GraphError::Parse {
            repository: name.to_string(),
            message: e.to_string(),
        })?;
        Self::load(name, &raw)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Components ordered by id.
    pub fn components(&self) -> impl Iterator<Item = &Component> + '_ {
        self.components
            .iter()
            .filter_map(|&idx| self.graph[idx].as_component())
    }

    pub fn component(&self, id: &str) -> Option<&Component> {
        self.index
            .get(id)
            .and_then(|&idx| self.graph[idx].as_component())
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Declared externals, ordered by name.
    pub fn externals(&self) -> Vec<&External> {
        self.externals
            .iter()
            .filter_map(|&idx| match &self.graph[idx] {
                GraphNode::External(e) => Some(e),
                GraphNode::Component(_) => None,
            })
            .collect()
    }

    pub fn test_count(&self) -> usize {
        self.test_count
    }

    /// Direct dependency ids of a component, in declaration order.
    pub fn neighbors(&self, component_id: &str) -> &[ComponentId] {
        self.component(component_id)
            .map(|c| c.dependencies.as_slice())
            .unwrap_or(&[])
    }

    pub fn language_of(&self, component_id: &str) -> Option<&str> {
        self.component(component_id).map(|c| c.language.as_str())
    }

    pub fn is_external(&self, id: &str) -> bool {
        self.index
            .get(id)
            .is_some_and(|&idx| matches!(self.graph[idx], GraphNode::External(_)))
    }

    /// Iterate over all edges with their source and target nodes.
    pub fn edges_with_nodes(&self) -> Vec<(&GraphNode, &GraphNode)> {
        self.graph
            .edge_references()
            .map(|e| (&self.graph[e.source()], &self.graph[e.target()]))
            .collect()
    }

    pub(crate) fn inner(&self) -> &DiGraph<GraphNode, ()> {
        &self.graph
    }

    pub(crate) fn component_indices(&self) -> &[NodeIndex] {
        &self.components
    }
}
