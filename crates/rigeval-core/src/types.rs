use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of a build component, unique within one repository graph.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(pub String);

impl ComponentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structural kind of a build component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Module,
    /// Organizes other components without producing an artifact of its own.
    Aggregator,
    Executable,
    #[serde(alias = "static_library", alias = "shared_library")]
    Library,
    /// Packaged artifact such as a jar.
    #[serde(alias = "jar")]
    Artifact,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentKind::Module => write!(f, "module"),
            ComponentKind::Aggregator => write!(f, "aggregator"),
            ComponentKind::Executable => write!(f, "executable"),
            ComponentKind::Library => write!(f, "library"),
            ComponentKind::Artifact => write!(f, "artifact"),
        }
    }
}

/// A buildable unit of a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub kind: ComponentKind,
    /// Canonical (trimmed, lowercase) language tag.
    pub language: String,
    /// Direct dependencies in declaration order, without duplicates.
    pub dependencies: Vec<ComponentId>,
    pub externals: BTreeSet<String>,
}

/// Third-party package. Only its identity matters.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct External(pub String);

impl fmt::Display for External {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Complexity bucket derived from the normalized score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for ComplexityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComplexityLevel::Low => write!(f, "LOW"),
            ComplexityLevel::Medium => write!(f, "MEDIUM"),
            ComplexityLevel::High => write!(f, "HIGH"),
        }
    }
}

impl std::str::FromStr for ComplexityLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LOW" => Ok(ComplexityLevel::Low),
            "MEDIUM" => Ok(ComplexityLevel::Medium),
            "HIGH" => Ok(ComplexityLevel::High),
            _ => Err(anyhow::anyhow!("unknown complexity level: {s}")),
        }
    }
}

/// Whether an agent run had access to the structured build metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    WithMetadata,
    WithoutMetadata,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::WithMetadata => write!(f, "with-metadata"),
            RunMode::WithoutMetadata => write!(f, "without-metadata"),
        }
    }
}

/// Round to one decimal place, the precision every reported percentage uses.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
