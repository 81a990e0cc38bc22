use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ChartConfig;
use crate::effectiveness::{AggregateReport, Correlation, EffectivenessRecord, Trendline};
use crate::error::VisualizationError;

/// Stable file stem of the complexity vs accuracy delta chart.
pub const ACCURACY_CHART: &str = "complexity_vs_accuracy_delta";
/// Stable file stem of the complexity vs time reduction chart.
pub const TIME_CHART: &str = "complexity_vs_time_reduction";

/// Horizontal range of every complexity chart; normalized scores live in 0..=100.
pub const X_RANGE: (f64, f64) = (-5.0, 105.0);

const PALETTE: &[&str] = &[
    "#3498DB", "#9B59B6", "#F39C12", "#16A085", "#E74C3C", "#34495E", "#D35400", "#7F8C8D",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerShape {
    Circle,
    Square,
    Triangle,
    Diamond,
    Cross,
    Star,
}

impl MarkerShape {
    pub const ALL: [MarkerShape; 6] = [
        MarkerShape::Circle,
        MarkerShape::Square,
        MarkerShape::Triangle,
        MarkerShape::Diamond,
        MarkerShape::Cross,
        MarkerShape::Star,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MarkerShape::Circle => "circle",
            MarkerShape::Square => "square",
            MarkerShape::Triangle => "triangle",
            MarkerShape::Diamond => "diamond",
            MarkerShape::Cross => "cross",
            MarkerShape::Star => "star",
        }
    }
}

/// A glyph: shape plus fill. Filled and hollow variants are distinct glyphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Marker {
    pub shape: MarkerShape,
    pub filled: bool,
}

impl Marker {
    /// Every glyph in assignment order: filled shapes first, then hollow ones.
    pub fn all() -> Vec<Marker> {
        [true, false]
            .into_iter()
            .flat_map(|filled| MarkerShape::ALL.into_iter().map(move |shape| Marker { shape, filled }))
            .collect()
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.filled {
            write!(f, "{}", self.shape.name())
        } else {
            write!(f, "{}-hollow", self.shape.name())
        }
    }
}

impl FromStr for Marker {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let (name, filled) = match s.strip_suffix("-hollow") {
            Some(name) => (name, false),
            None => (s.as_str(), true),
        };
        let shape = MarkerShape::ALL
            .into_iter()
            .find(|shape| shape.name() == name)
            .ok_or_else(|| anyhow::anyhow!("unknown marker shape: {s}"))?;
        Ok(Marker { shape, filled })
    }
}

/// Give every agent a distinct glyph.
///
/// Pinned agents keep their configured glyph; the rest take the next unused
/// glyph in sorted agent order.
pub fn assign_markers<'a, I>(
    agents: I,
    pins: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, Marker>, VisualizationError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut agents: Vec<&str> = agents.into_iter().collect();
    agents.sort_unstable();
    agents.dedup();

    let available = Marker::all();
    if agents.len() > available.len() {
        return Err(VisualizationError::MarkersExhausted {
            agents: agents.len(),
            available: available.len(),
        });
    }

    let mut assigned: BTreeMap<String, Marker> = BTreeMap::new();
    for agent in &agents {
        let Some(pin) = pins.get(*agent) else {
            continue;
        };
        match pin.parse::<Marker>() {
            Ok(marker) if !assigned.values().any(|m| *m == marker) => {
                assigned.insert(agent.to_string(), marker);
            }
            Ok(marker) => tracing::warn!("marker '{marker}' pinned twice, '{agent}' gets another"),
            Err(e) => tracing::warn!("ignoring marker pin for '{agent}': {e}"),
        }
    }

    let total = available.len();
    let free: Vec<Marker> = available
        .into_iter()
        .filter(|m| !assigned.values().any(|taken| taken == m))
        .collect();
    let mut free = free.into_iter();
    for agent in &agents {
        if assigned.contains_key(*agent) {
            continue;
        }
        let marker = free.next().ok_or(VisualizationError::MarkersExhausted {
            agents: agents.len(),
            available: total,
        })?;
        assigned.insert(agent.to_string(), marker);
    }
    Ok(assigned)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    /// Repository the point belongs to.
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterSeries {
    pub agent: String,
    pub marker: Marker,
    pub color: String,
    pub points: Vec<ScatterPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartTrend {
    pub line: Trendline,
    pub r_squared: f64,
}

/// Renderer-independent description of one scatter chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterChart {
    pub file_stem: String,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_range: (f64, f64),
    pub width: u32,
    pub height: u32,
    pub series: Vec<ScatterSeries>,
    pub trend: Option<ChartTrend>,
}

impl ScatterChart {
    /// Smallest and largest y over all points, or `None` for an empty chart.
    pub fn y_extent(&self) -> Option<(f64, f64)> {
        self.series
            .iter()
            .flat_map(|s| s.points.iter().map(|p| p.y))
            .fold(None, |acc, y| match acc {
                None => Some((y, y)),
                Some((lo, hi)) => Some((lo.min(y), hi.max(y))),
            })
    }
}

struct ChartSpec {
    file_stem: &'static str,
    title: &'static str,
    y_label: &'static str,
    value: fn(&EffectivenessRecord) -> f64,
    correlation: Option<Correlation>,
}

/// Build the complexity-vs-delta charts of an aggregate report.
pub fn build_charts(
    report: &AggregateReport,
    config: &ChartConfig,
) -> Result<Vec<ScatterChart>, VisualizationError> {
    let markers = assign_markers(report.agents.iter().map(|a| a.agent.as_str()), &config.markers)?;

    let specs = [
        ChartSpec {
            file_stem: ACCURACY_CHART,
            title: "Repository Complexity vs Accuracy Improvement",
            y_label: "Accuracy improvement with metadata (percentage points)",
            value: |r| r.accuracy_delta,
            correlation: report.accuracy_correlation,
        },
        ChartSpec {
            file_stem: TIME_CHART,
            title: "Repository Complexity vs Time Reduction",
            y_label: "Time reduction with metadata (%)",
            value: |r| r.time_reduction_pct,
            correlation: report.time_correlation,
        },
    ];

    let charts = specs
        .into_iter()
        .map(|spec| {
            let series = markers
                .iter()
                .enumerate()
                .map(|(i, (agent, marker))| ScatterSeries {
                    agent: agent.clone(),
                    marker: *marker,
                    color: PALETTE[i % PALETTE.len()].to_string(),
                    points: report
                        .repositories
                        .iter()
                        .flat_map(|summary| {
                            summary
                                .effectiveness
                                .iter()
                                .filter(|r| &r.agent == agent)
                                .map(|r| ScatterPoint {
                                    x: summary.complexity.normalized_score,
                                    y: (spec.value)(r),
                                    label: summary.repository.clone(),
                                })
                        })
                        .collect(),
                })
                .collect();
            ScatterChart {
                file_stem: spec.file_stem.to_string(),
                title: spec.title.to_string(),
                x_label: "Repository complexity (normalized 0-100)".to_string(),
                y_label: spec.y_label.to_string(),
                x_range: X_RANGE,
                width: config.width,
                height: config.height,
                series,
                trend: spec.correlation.map(|c| ChartTrend {
                    line: c.trend,
                    r_squared: c.r_squared,
                }),
            }
        })
        .collect();
    Ok(charts)
}
