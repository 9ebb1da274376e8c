use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::VisError;

/// The interchangeable visual representations of the pool vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderMode {
    /// Newest frame only, as a 2D curve over angle.
    Line,
    /// Polar curves, one per retained frame.
    PolarLines,
    /// Polar ring segments, one ring per retained frame.
    #[default]
    PolarArcs,
    /// Pseudo-3D stack of curves receding with age.
    Waterfall,
    /// Angle/time heat map.
    Tiled,
}

impl RenderMode {
    pub const ALL: [RenderMode; 5] = [
        RenderMode::Line,
        RenderMode::PolarLines,
        RenderMode::PolarArcs,
        RenderMode::Waterfall,
        RenderMode::Tiled,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RenderMode::Line => "line",
            RenderMode::PolarLines => "polar-lines",
            RenderMode::PolarArcs => "polar-arcs",
            RenderMode::Waterfall => "waterfall",
            RenderMode::Tiled => "tiled",
        }
    }

    /// Whether the mode keeps a time window of past frames.
    pub fn is_windowed(self) -> bool {
        !matches!(self, RenderMode::Line)
    }

    /// Polar lines and polar arcs share history and convert in place.
    pub fn is_polar(self) -> bool {
        matches!(self, RenderMode::PolarLines | RenderMode::PolarArcs)
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RenderMode {
    type Err = VisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RenderMode::ALL
            .into_iter()
            .find(|mode| mode.name() == s)
            .ok_or_else(|| VisError::UnknownMode(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Plotted position plus the raw bin value it was drawn from. Waterfall
/// stacking moves `x` and `y` but never `value`.
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

/// Open curve through one frame's bins. `age` 0 is the newest frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub age: usize,
    pub points: Vec<Point>,
}

/// Annular sector covering one bin of one retained frame. Angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArcSegment {
    pub age: usize,
    pub start_angle: f64,
    pub end_angle: f64,
    pub inner_radius: f64,
    pub outer_radius: f64,
    pub value: f64,
}

/// Rectangle covering one bin over one pull interval. Times in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub age: usize,
    pub start_angle: f64,
    pub end_angle: f64,
    pub start_time: f64,
    pub end_time: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    Polyline(Polyline),
    Arc(ArcSegment),
    Tile(Tile),
}

/// Transformed data handed to the external renderer for a single redraw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub mode: RenderMode,
    /// Time axis domain in seconds, present for windowed modes.
    pub time_domain: Option<(f64, f64)>,
    /// Value axis domain, `(0, y_max)`.
    pub value_domain: (f64, f64),
    pub primitives: Vec<Primitive>,
}

impl Scene {
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Largest raw bin value carried by any primitive; 0 for an empty scene.
    pub fn peak(&self) -> f64 {
        self.primitives
            .iter()
            .map(|primitive| match primitive {
                Primitive::Polyline(line) => line
                    .points
                    .iter()
                    .map(|p| p.value)
                    .fold(f64::NEG_INFINITY, f64::max),
                Primitive::Arc(arc) => arc.value,
                Primitive::Tile(tile) => tile.value,
            })
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_mode_name() {
        for mode in RenderMode::ALL {
            assert_eq!(mode.name().parse::<RenderMode>().unwrap(), mode);
        }
    }

    #[test]
    fn rejects_unknown_mode() {
        let err = "spiral".parse::<RenderMode>().unwrap_err();
        assert!(format!("{err}").contains("spiral"));
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&RenderMode::PolarArcs).unwrap();
        assert_eq!(json, "\"polar-arcs\"");
    }
}
