use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{RenderMode, Result};

/// Backend flavour the client talks to. A plain TCP relay has no pooling
/// stage, so pooling parameters are never pushed to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    #[default]
    Mha,
    Tcp,
}

impl ServerType {
    pub fn has_pooling(self) -> bool {
        matches!(self, ServerType::Mha)
    }
}

/// Values read once when the client is launched.
///
/// Numeric fields are never validated: a missing or non-numeric entry is kept
/// as `NaN` and flows into the geometry as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchParameters {
    pub min_angle: f64,
    pub max_angle: f64,
    pub model_length: f64,
    pub ws_port: f64,
    pub server_type: ServerType,
}

impl Default for LaunchParameters {
    fn default() -> Self {
        Self {
            min_angle: f64::NAN,
            max_angle: f64::NAN,
            model_length: f64::NAN,
            ws_port: f64::NAN,
            server_type: ServerType::Mha,
        }
    }
}

impl LaunchParameters {
    /// Parses a `key=value&key=value` query string; a leading `?` is ignored.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(query.split('&').filter(|pair| !pair.is_empty()).map(|pair| {
            match pair.split_once('=') {
                Some((key, value)) => (key, value),
                None => (pair, ""),
            }
        }))
    }

    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            match key.trim() {
                "min_angle" => params.min_angle = parse_number(value),
                "max_angle" => params.max_angle = parse_number(value),
                "model_length" => params.model_length = parse_number(value),
                "ws_port" => params.ws_port = parse_number(value),
                "server_type" if value.trim() == "tcp" => params.server_type = ServerType::Tcp,
                "server_type" => params.server_type = ServerType::Mha,
                other => tracing::debug!(key = other, "ignoring unknown launch parameter"),
            }
        }
        params
    }

    /// Bin count used to size buffers. An invalid sentinel degrades to zero
    /// bins, which makes every inbound frame fail the length check.
    pub fn bins(&self) -> usize {
        if self.model_length.is_finite() && self.model_length >= 1.0 {
            self.model_length as usize
        } else {
            0
        }
    }

    /// Default websocket endpoint on the local host, if `ws_port` is usable.
    pub fn default_url(&self) -> Option<String> {
        (self.ws_port.is_finite() && self.ws_port > 0.0)
            .then(|| format!("ws://127.0.0.1:{}/ws", self.ws_port as u16))
    }
}

fn parse_number(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(f64::NAN)
}

/// Client-side defaults for the mutable session values and control widgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub mode: RenderMode,
    pub num_lines: usize,
    /// Total window time in milliseconds.
    pub duration: f64,
    /// Pull period in milliseconds used by the line mode.
    pub interval: f64,
    pub rate_limiting: bool,
    pub pooling: PoolingConfig,
    pub beamformer: bool,
    pub display: DisplayConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::default(),
            num_lines: 20,
            duration: 1000.0,
            interval: 50.0,
            rate_limiting: true,
            pooling: PoolingConfig::default(),
            beamformer: false,
            display: DisplayConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Pooling stage settings, kept as the strings the widgets hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolingConfig {
    pub wndlen: String,
    pub alpha: String,
    pub kind: String,
}

impl Default for PoolingConfig {
    fn default() -> Self {
        Self {
            wndlen: "40".to_string(),
            alpha: "0.1".to_string(),
            kind: "max".to_string(),
        }
    }
}

/// Presentation settings that only affect geometry and the camera overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Upper bound of the value axis.
    pub y_max: f64,
    /// Waterfall shift per retained line along the angle axis, in degrees.
    pub x_offset: f64,
    /// Waterfall shift per retained line along the value axis.
    pub y_offset: f64,
    /// Horizontal field of view of the camera, in degrees.
    pub angle_width: f64,
    /// Mirror the camera image horizontally.
    pub flip_video: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            y_max: 1.0,
            x_offset: 1.5,
            y_offset: 0.02,
            angle_width: 90.0,
            flip_video: false,
        }
    }
}

/// One change to a [`DisplayConfig`] field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayChange {
    YMax(f64),
    XOffset(f64),
    YOffset(f64),
    AngleWidth(f64),
    FlipVideo(bool),
}

impl DisplayConfig {
    pub fn apply(&mut self, change: DisplayChange) {
        match change {
            DisplayChange::YMax(value) => self.y_max = value,
            DisplayChange::XOffset(value) => self.x_offset = value,
            DisplayChange::YOffset(value) => self.y_offset = value,
            DisplayChange::AngleWidth(value) => self.angle_width = value,
            DisplayChange::FlipVideo(flip) => self.flip_video = flip,
        }
    }
}
