use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ConfigError;
use crate::types::ComplexityLevel;
use crate::visualize::Marker;

/// Name of the configuration file looked up from the comparison root upwards.
pub const CONFIG_FILE_NAME: &str = ".rigeval.toml";

/// Top-level configuration from `.rigeval.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub levels: LevelThresholds,
    #[serde(default)]
    pub bundle: BundleConfig,
    #[serde(default)]
    pub charts: ChartConfig,
}

/// Weights of the six complexity factors.
///
/// Language diversity and dependency depth must outweigh component count;
/// `Config::validate` enforces that ordering for custom weightings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_component_weight")]
    pub component_weight: f64,
    #[serde(default = "default_language_weight")]
    pub language_weight: f64,
    #[serde(default = "default_external_weight")]
    pub external_weight: f64,
    #[serde(default = "default_depth_weight")]
    pub depth_weight: f64,
    #[serde(default = "default_aggregator_weight")]
    pub aggregator_weight: f64,
    #[serde(default = "default_cross_language_bonus")]
    pub cross_language_bonus: f64,
}

fn default_component_weight() -> f64 {
    2.0
}
fn default_language_weight() -> f64 {
    10.0
}
fn default_external_weight() -> f64 {
    3.0
}
fn default_depth_weight() -> f64 {
    8.0
}
fn default_aggregator_weight() -> f64 {
    5.0
}
fn default_cross_language_bonus() -> f64 {
    15.0
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            component_weight: default_component_weight(),
            language_weight: default_language_weight(),
            external_weight: default_external_weight(),
            depth_weight: default_depth_weight(),
            aggregator_weight: default_aggregator_weight(),
            cross_language_bonus: default_cross_language_bonus(),
        }
    }
}

/// Cut-offs applied to the normalized (0-100) score, never to the raw score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelThresholds {
    #[serde(default = "default_low_threshold")]
    pub low: f64,
    #[serde(default = "default_medium_threshold")]
    pub medium: f64,
}

fn default_low_threshold() -> f64 {
    40.0
}
fn default_medium_threshold() -> f64 {
    70.0
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self {
            low: default_low_threshold(),
            medium: default_medium_threshold(),
        }
    }
}

impl LevelThresholds {
    /// `LOW` below `low`, `MEDIUM` below `medium`, `HIGH` otherwise.
    pub fn level_for(&self, normalized_score: f64) -> ComplexityLevel {
        if normalized_score < self.low {
            ComplexityLevel::Low
        } else if normalized_score < self.medium {
            ComplexityLevel::Medium
        } else {
            ComplexityLevel::High
        }
    }
}

/// File-name patterns describing one repository's input bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    #[serde(default = "default_ground_truth_pattern")]
    pub ground_truth: String,
    #[serde(default = "default_questions_pattern")]
    pub questions: String,
    #[serde(default = "default_answers_pattern")]
    pub answers: String,
    #[serde(default = "default_with_suffix")]
    pub with_metadata_suffix: String,
    #[serde(default = "default_without_suffix")]
    pub without_metadata_suffix: String,
}

fn default_ground_truth_pattern() -> String {
    "*ground_truth.json".to_string()
}
fn default_questions_pattern() -> String {
    "evaluation_questions.json".to_string()
}
fn default_answers_pattern() -> String {
    "*_answers.json".to_string()
}
fn default_with_suffix() -> String {
    "_RIG".to_string()
}
fn default_without_suffix() -> String {
    "_NORIG".to_string()
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            ground_truth: default_ground_truth_pattern(),
            questions: default_questions_pattern(),
            answers: default_answers_pattern(),
            with_metadata_suffix: default_with_suffix(),
            without_metadata_suffix: default_without_suffix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    #[serde(default = "default_chart_width")]
    pub width: u32,
    #[serde(default = "default_chart_height")]
    pub height: u32,
    /// Agent name -> marker shape name (e.g. `claude = "circle"`).
    #[serde(default)]
    pub markers: BTreeMap<String, String>,
}

fn default_chart_width() -> u32 {
    900
}
fn default_chart_height() -> u32 {
    700
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: default_chart_width(),
            height: default_chart_height(),
            markers: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from a `.rigeval.toml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config: Config = toml::from_str(&content).with_context(|| {
            format!(
                "failed to parse '{}'. Run `rigeval init` to create a valid config file",
                path.display()
            )
        })?;
        config
            .validate()
            .with_context(|| format!("invalid configuration in '{}'", path.display()))?;
        Ok(config)
    }

    /// Load from `.rigeval.toml` in the given directory or any ancestor, or return defaults.
    pub fn load_or_default(dir: &Path) -> Self {
        let start = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        let mut current = start.as_path();
        loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!(
                            "failed to load config from '{}': {e:#}. Using defaults.",
                            config_path.display()
                        );
                        Self::default()
                    }
                };
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Self::default()
    }

    /// Check weight ordering, thresholds and marker pins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.scoring;
        let weights = [
            ("component_weight", s.component_weight),
            ("language_weight", s.language_weight),
            ("external_weight", s.external_weight),
            ("depth_weight", s.depth_weight),
            ("aggregator_weight", s.aggregator_weight),
            ("cross_language_bonus", s.cross_language_bonus),
        ];
        for (name, value) in weights {
            if value.is_nan() || value < 0.0 {
                return Err(ConfigError::NegativeWeight { name, value });
            }
        }
        for (name, value) in [
            ("language_weight", s.language_weight),
            ("depth_weight", s.depth_weight),
        ] {
            if value <= s.component_weight {
                return Err(ConfigError::WeightOrdering {
                    name,
                    value,
                    component: s.component_weight,
                });
            }
        }

        let l = &self.levels;
        if !(l.low > 0.0 && l.low < l.medium && l.medium <= 100.0) {
            return Err(ConfigError::Thresholds {
                low: l.low,
                medium: l.medium,
            });
        }

        let mut pinned: BTreeMap<Marker, &str> = BTreeMap::new();
        for (agent, shape_name) in &self.charts.markers {
            let marker: Marker = shape_name
                .parse()
                .map_err(|_| ConfigError::UnknownMarker {
                    agent: agent.clone(),
                    shape: shape_name.clone(),
                })?;
            if let Some(first) = pinned.insert(marker, agent) {
                return Err(ConfigError::DuplicateMarker {
                    first: first.to_string(),
                    second: agent.clone(),
                    shape: shape_name.clone(),
                });
            }
        }

        for pattern in [
            &self.bundle.ground_truth,
            &self.bundle.questions,
            &self.bundle.answers,
        ] {
            globset::Glob::new(pattern).map_err(|e| ConfigError::Pattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        }

        Ok(())
    }

    /// Generate default TOML content for `rigeval init`.
    pub fn default_toml() -> String {
        r#"# rigeval - build-graph complexity and metadata effectiveness analysis

[scoring]
# raw = components*component_weight + languages*language_weight
#     + externals*external_weight + max_depth*depth_weight
#     + aggregators*aggregator_weight + (cross-language ? cross_language_bonus : 0)
# language_weight and depth_weight must stay above component_weight.
component_weight = 2
language_weight = 10
external_weight = 3
depth_weight = 8
aggregator_weight = 5
cross_language_bonus = 15

[levels]
# Applied to the normalized 0-100 score: LOW < low <= MEDIUM < medium <= HIGH
low = 40
medium = 70

[bundle]
# A directory containing a ground-truth file is one repository bundle.
ground_truth = "*ground_truth.json"
questions = "evaluation_questions.json"
answers = "*_answers.json"
with_metadata_suffix = "_RIG"
without_metadata_suffix = "_NORIG"

[charts]
width = 900
height = 700

# Pin agents to marker shapes: circle, square, triangle, diamond, cross, star
# (append "-hollow" for the unfilled variant).
# [charts.markers]
# claude = "circle"
# codex = "square"
# cursor = "triangle"
"#
        .to_string()
    }
}
