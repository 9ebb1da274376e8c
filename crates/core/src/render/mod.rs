use serde::{Deserialize, Serialize};

use crate::{
    config::DisplayConfig,
    mapping::{build_scene, AngleAxis, GeometryContext},
    pacing::CorrectionPolicy,
    BufferShape, RenderMode, Scene, WindowBuffer,
};

/// User-visible rate-limit indicator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PacingStatus {
    Ok,
    Degraded { overshoot: f64 },
}

impl PacingStatus {
    pub fn message(&self) -> String {
        match self {
            PacingStatus::Ok => String::new(),
            PacingStatus::Degraded { overshoot } => {
                format!("backend is {overshoot:.1} ms behind the requested rate")
            }
        }
    }
}

/// Callbacks implemented by the external renderer. The core only ever hands
/// it read-only views.
pub trait RenderHooks {
    fn on_frame(&mut self, _scene: &Scene) {}
    fn on_resize(&mut self, _num_lines: usize) {}
    fn on_reshape(&mut self, _flattened: bool) {}
    fn on_mode_switch(&mut self, _from: RenderMode, _to: RenderMode) {}
    fn on_status(&mut self, _status: PacingStatus) {}
}

/// Renderer that discards everything; useful for headless sessions.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl RenderHooks for NullRenderer {}

/// Contract each render mode imposes on the shared buffer and pacing.
pub fn shape_for(mode: RenderMode) -> BufferShape {
    match mode {
        RenderMode::Line => BufferShape::Frame,
        RenderMode::PolarLines | RenderMode::Waterfall => BufferShape::History,
        RenderMode::PolarArcs | RenderMode::Tiled => BufferShape::Flattened,
    }
}

pub fn policy_for(mode: RenderMode) -> CorrectionPolicy {
    if mode.is_windowed() {
        CorrectionPolicy::ReduceLines
    } else {
        CorrectionPolicy::IncreaseInterval
    }
}

/// How the buffer must change when the active mode switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    /// Lossless conversion between the two polar shapes.
    Reshape { to_flattened: bool },
    /// Incompatible contracts: start again from zeros.
    Rebuild(BufferShape),
}

pub fn transition(from: RenderMode, to: RenderMode) -> Transition {
    if from == to {
        Transition::Unchanged
    } else if from.is_polar() && to.is_polar() {
        Transition::Reshape {
            to_flattened: shape_for(to) == BufferShape::Flattened,
        }
    } else {
        Transition::Rebuild(shape_for(to))
    }
}

/// Holds the single active render mode and forwards events to the renderer.
pub struct RenderDispatch {
    mode: RenderMode,
    hooks: Box<dyn RenderHooks>,
    frames_drawn: u64,
}

impl RenderDispatch {
    pub fn new(mode: RenderMode, hooks: Box<dyn RenderHooks>) -> Self {
        Self {
            mode,
            hooks,
            frames_drawn: 0,
        }
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Makes `to` the active mode and returns the buffer transition it needs.
    pub fn switch(&mut self, to: RenderMode) -> Transition {
        let from = self.mode;
        let step = transition(from, to);
        if step != Transition::Unchanged {
            self.mode = to;
            self.hooks.on_mode_switch(from, to);
        }
        step
    }

    pub fn resized(&mut self, num_lines: usize) {
        self.hooks.on_resize(num_lines);
    }

    pub fn reshaped(&mut self, flattened: bool) {
        self.hooks.on_reshape(flattened);
    }

    pub fn status(&mut self, status: PacingStatus) {
        self.hooks.on_status(status);
    }

    /// Builds the active mode's scene from `buffer` and hands it over.
    pub fn notify(&mut self, buffer: &WindowBuffer, ctx: &GeometryContext) {
        let scene = build_scene(self.mode, buffer, ctx);
        self.hooks.on_frame(&scene);
        self.frames_drawn += 1;
    }
}

impl std::fmt::Debug for RenderDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderDispatch")
            .field("mode", &self.mode)
            .field("frames_drawn", &self.frames_drawn)
            .finish()
    }
}

/// Pixel box of the plotted axes as reported by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlotBox {
    pub left: f64,
    pub width: f64,
    /// Height of the container the overlay is aligned in.
    pub height: f64,
}

/// Intrinsic pixel size of the live camera element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoSize {
    pub width: f64,
    pub height: f64,
}

/// Where the camera overlay goes so its field of view lines up with the
/// angle axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayPlacement {
    pub left: f64,
    pub width: f64,
    pub height: f64,
    /// Vertical offset inside the container. Positive moves the video down.
    pub margin_top: f64,
    pub flipped: bool,
}

/// Spans the camera's `angle_width` field of view, centred on 0 degrees, over
/// the matching stretch of the angle axis.
///
/// A video taller than the container is centred vertically; a shorter one is
/// pushed to the bottom edge.
pub fn overlay_placement(
    mode: RenderMode,
    axis: &AngleAxis,
    display: &DisplayConfig,
    plot: PlotBox,
    video: VideoSize,
    num_lines: usize,
) -> OverlayPlacement {
    let span = axis.max_angle - axis.min_angle;
    let scale = if span.is_finite() && span != 0.0 {
        plot.width / span
    } else {
        0.0
    };
    let shift = match mode {
        RenderMode::Waterfall => num_lines.saturating_sub(1) as f64 * display.x_offset,
        _ => 0.0,
    };
    let half = display.angle_width / 2.0;
    let left = plot.left + (shift - half - axis.min_angle) * scale;
    let width = display.angle_width * scale;

    let height = if video.width > 0.0 {
        width * video.height / video.width
    } else {
        0.0
    };
    let mut margin_top = -(height - plot.height) / 2.0;
    if height < plot.height {
        margin_top *= 2.0;
    }

    OverlayPlacement {
        left,
        width,
        height,
        margin_top,
        flipped: display.flip_video,
    }
}
