//! Explicit session context shared by the connection manager, the pacing
//! controller and the window buffer.
//!
//! Every parameter change runs through [`Session::recompute`], which applies
//! the derived-value updates in a fixed order:
//!
//! 1. reshape, rebuild or resize the window buffer;
//! 2. derive `interval = duration / num_lines` for windowed modes;
//! 3. sync the pacing target;
//! 4. fire render hooks and redraw.
//!
//! The returned [`Recompute`] tells the caller whether the pull cadence moved.

use crate::{
    config::{
        ClientConfig, DisplayChange, DisplayConfig, LaunchParameters, PoolingConfig, ServerType,
    },
    mapping::{AngleAxis, GeometryContext},
    pacing::{Correction, PacingController, Verdict},
    protocol::{BackendParam, ClientMessage},
    render::{
        overlay_placement, policy_for, shape_for, OverlayPlacement, PacingStatus, PlotBox,
        RenderDispatch, RenderHooks, Transition, VideoSize,
    },
    RenderMode, Result, WindowBuffer,
};

/// Session values: fixed at open (bins and angle range) plus the mutable
/// window parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionParameters {
    pub model_length: usize,
    pub min_angle: f64,
    pub max_angle: f64,
    pub num_lines: usize,
    /// Total window time in milliseconds.
    pub duration: f64,
    /// Pull period in milliseconds.
    pub interval: f64,
}

/// Outcome of one pass through the recomputation pipeline.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Recompute {
    /// New pull period, if it changed.
    pub interval: Option<f64>,
}

impl Recompute {
    pub fn interval_changed(&self) -> bool {
        self.interval.is_some()
    }
}

/// A single requested change to the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Change {
    NumLines(usize),
    Duration(f64),
    Interval(f64),
    Mode(RenderMode),
    Display(DisplayChange),
}

pub struct Session {
    params: SessionParameters,
    server_type: ServerType,
    pooling: PoolingConfig,
    beamformer: bool,
    display: DisplayConfig,
    buffer: WindowBuffer,
    pacer: PacingController,
    dispatch: RenderDispatch,
}

impl Session {
    /// Creates the context for a freshly opened connection. The buffer starts
    /// zero-filled for the configured mode.
    pub fn open(
        launch: &LaunchParameters,
        config: &ClientConfig,
        hooks: Box<dyn RenderHooks>,
    ) -> Self {
        let model_length = launch.bins();
        let mode = config.mode;
        let num_lines = config.num_lines.max(1);
        let interval = if mode.is_windowed() {
            config.duration / num_lines as f64
        } else {
            config.interval
        };

        let params = SessionParameters {
            model_length,
            min_angle: launch.min_angle,
            max_angle: launch.max_angle,
            num_lines,
            duration: config.duration,
            interval,
        };

        let mut pacer = PacingController::new(interval, policy_for(mode));
        if !config.rate_limiting {
            pacer.set_enabled(false);
        }

        tracing::info!(%mode, model_length, num_lines, interval, "session opened");

        Self {
            params,
            server_type: launch.server_type,
            pooling: config.pooling.clone(),
            beamformer: config.beamformer,
            display: config.display,
            buffer: WindowBuffer::zeroed(shape_for(mode), model_length, num_lines),
            pacer,
            dispatch: RenderDispatch::new(mode, hooks),
        }
    }

    pub fn params(&self) -> &SessionParameters {
        &self.params
    }

    pub fn mode(&self) -> RenderMode {
        self.dispatch.mode()
    }

    pub fn buffer(&self) -> &WindowBuffer {
        &self.buffer
    }

    pub fn pacer(&self) -> &PacingController {
        &self.pacer
    }

    pub fn server_type(&self) -> ServerType {
        self.server_type
    }

    pub fn beamformer(&self) -> bool {
        self.beamformer
    }

    pub fn display(&self) -> &DisplayConfig {
        &self.display
    }

    pub fn frames_drawn(&self) -> u64 {
        self.dispatch.frames_drawn()
    }

    pub fn geometry(&self) -> GeometryContext {
        GeometryContext {
            axis: AngleAxis::new(
                self.params.min_angle,
                self.params.max_angle,
                self.params.model_length,
            ),
            interval: self.params.interval,
            duration: self.params.duration,
            display: self.display,
        }
    }

    /// Camera overlay placement for the active mode, given the geometry the
    /// renderer and the video element report back.
    pub fn overlay(&self, plot: PlotBox, video: VideoSize) -> OverlayPlacement {
        let ctx = self.geometry();
        overlay_placement(
            self.mode(),
            &ctx.axis,
            &self.display,
            plot,
            video,
            self.params.num_lines,
        )
    }

    /// Stores an inbound frame and redraws. A frame with the wrong bin count
    /// is rejected and the buffer keeps its previous contents.
    pub fn ingest(&mut self, frame: &[f64]) -> Result<()> {
        self.buffer.mutate(frame)?;
        self.redraw();
        Ok(())
    }

    /// Feeds one round trip (milliseconds) to the pacing controller and
    /// applies any correction it requests.
    pub fn observe_round_trip(&mut self, delta: f64) -> (Verdict, Recompute) {
        let verdict = self.pacer.observe(delta, self.params.duration);

        if verdict.changed {
            let status = if verdict.degraded {
                tracing::warn!(overshoot = verdict.overshoot, "backend falling behind pull rate");
                PacingStatus::Degraded {
                    overshoot: verdict.overshoot,
                }
            } else {
                tracing::info!("backend keeping up with pull rate again");
                PacingStatus::Ok
            };
            self.dispatch.status(status);
        }

        let recompute = match verdict.correction {
            Some(Correction::SetInterval(interval)) => self.recompute(Change::Interval(interval)),
            Some(Correction::SetNumLines(num_lines)) => self.recompute(Change::NumLines(num_lines)),
            None => Recompute::default(),
        };
        if let Some(correction) = verdict.correction {
            tracing::info!(?correction, overshoot = verdict.overshoot, "pacing correction applied");
        }

        (verdict, recompute)
    }

    /// Sets the window length. Zero is raised to a single line.
    pub fn set_num_lines(&mut self, num_lines: usize) -> Recompute {
        self.recompute(Change::NumLines(num_lines))
    }

    pub fn set_duration(&mut self, duration: f64) -> Recompute {
        self.recompute(Change::Duration(duration))
    }

    /// Sets the pull period directly. Windowed modes derive their period
    /// from the window, so this only sticks in line mode.
    pub fn set_interval(&mut self, interval: f64) -> Recompute {
        self.recompute(Change::Interval(interval))
    }

    pub fn set_mode(&mut self, mode: RenderMode) -> Recompute {
        self.recompute(Change::Mode(mode))
    }

    pub fn set_display(&mut self, change: DisplayChange) -> Recompute {
        self.recompute(Change::Display(change))
    }

    pub fn set_rate_limiting(&mut self, enabled: bool) {
        self.pacer.set_enabled(enabled);
    }

    /// Records a control-widget value and returns the message to push, if
    /// the backend has a use for it.
    pub fn set_param(&mut self, param: BackendParam) -> Option<ClientMessage> {
        match &param {
            BackendParam::PoolingWndlen(value) => self.pooling.wndlen = value.clone(),
            BackendParam::PoolingAlpha(value) => self.pooling.alpha = value.clone(),
            BackendParam::PoolingType(value) => self.pooling.kind = value.clone(),
            BackendParam::Beamformer(enabled) => self.beamformer = *enabled,
        }
        if param.is_pooling() && !self.server_type.has_pooling() {
            return None;
        }
        Some(param.into())
    }

    /// Messages pushed once the link opens.
    pub fn open_messages(&self) -> Vec<ClientMessage> {
        if !self.server_type.has_pooling() {
            return Vec::new();
        }
        vec![
            BackendParam::PoolingWndlen(self.pooling.wndlen.clone()).into(),
            BackendParam::PoolingAlpha(self.pooling.alpha.clone()).into(),
            BackendParam::PoolingType(self.pooling.kind.clone()).into(),
        ]
    }

    /// Messages pushed every time the pull loop (re)starts.
    pub fn start_messages(&self) -> Vec<ClientMessage> {
        let mut messages = Vec::with_capacity(3);
        if self.server_type.has_pooling() {
            messages.push(BackendParam::PoolingWndlen(self.pooling.wndlen.clone()).into());
            messages.push(BackendParam::PoolingType(self.pooling.kind.clone()).into());
        }
        messages.push(ClientMessage::new_interval(self.params.interval));
        messages
    }

    pub fn redraw(&mut self) {
        let ctx = self.geometry();
        self.dispatch.notify(&self.buffer, &ctx);
    }

    pub fn recompute(&mut self, change: Change) -> Recompute {
        let old_interval = self.params.interval;
        let mode = self.dispatch.mode();

        // 1. buffer
        match change {
            Change::NumLines(num_lines) => {
                let num_lines = num_lines.max(1);
                self.buffer.resize(num_lines);
                self.params.num_lines = num_lines;
                self.dispatch.resized(num_lines);
            }
            Change::Duration(duration) => self.params.duration = duration,
            Change::Interval(interval) if !mode.is_windowed() => self.params.interval = interval,
            Change::Interval(interval) => {
                tracing::debug!(interval, %mode, "ignoring direct interval for windowed mode");
            }
            Change::Mode(to) => self.switch_mode(to),
            Change::Display(change) => self.display.apply(change),
        }

        // 2. derived interval
        let mode = self.dispatch.mode();
        if mode.is_windowed() {
            self.params.interval = self.params.duration / self.params.num_lines as f64;
        }

        // 3. pacing
        self.pacer.set_target_interval(self.params.interval);
        self.pacer.set_policy(policy_for(mode));

        // 4. render
        self.redraw();

        let interval = self.params.interval;
        Recompute {
            interval: (interval != old_interval).then_some(interval),
        }
    }

    fn switch_mode(&mut self, to: RenderMode) {
        let from = self.dispatch.mode();
        match self.dispatch.switch(to) {
            Transition::Unchanged => {}
            Transition::Reshape { to_flattened } => {
                // Both polar shapes are windowed histories, so this cannot fail.
                if let Err(err) = self.buffer.reshape(to_flattened) {
                    tracing::warn!(%err, "reshape failed; rebuilding buffer");
                    self.rebuild(to);
                }
                self.dispatch.reshaped(to_flattened);
            }
            Transition::Rebuild(_) => self.rebuild(to),
        }
        tracing::info!(%from, %to, "render mode switched");
    }

    fn rebuild(&mut self, mode: RenderMode) {
        self.buffer = WindowBuffer::zeroed(
            shape_for(mode),
            self.params.model_length,
            self.params.num_lines,
        );
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("params", &self.params)
            .field("server_type", &self.server_type)
            .field("mode", &self.dispatch.mode())
            .field("buffer_len", &self.buffer.len())
            .field("pacer", &self.pacer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{BufferShape, Scene};

    #[derive(Debug, Default)]
    struct Events {
        frames: Vec<Scene>,
        resizes: Vec<usize>,
        reshapes: Vec<bool>,
        switches: Vec<(RenderMode, RenderMode)>,
        statuses: Vec<PacingStatus>,
    }

    struct Recorder(Rc<RefCell<Events>>);

    impl RenderHooks for Recorder {
        fn on_frame(&mut self, scene: &Scene) {
            self.0.borrow_mut().frames.push(scene.clone());
        }
        fn on_resize(&mut self, num_lines: usize) {
            self.0.borrow_mut().resizes.push(num_lines);
        }
        fn on_reshape(&mut self, flattened: bool) {
            self.0.borrow_mut().reshapes.push(flattened);
        }
        fn on_mode_switch(&mut self, from: RenderMode, to: RenderMode) {
            self.0.borrow_mut().switches.push((from, to));
        }
        fn on_status(&mut self, status: PacingStatus) {
            self.0.borrow_mut().statuses.push(status);
        }
    }

    fn launch(model_length: usize) -> LaunchParameters {
        LaunchParameters::from_query(&format!(
            "min_angle=-90&max_angle=90&model_length={model_length}&ws_port=9090"
        ))
    }

    fn open_session(mode: RenderMode, num_lines: usize) -> (Session, Rc<RefCell<Events>>) {
        let events = Rc::new(RefCell::new(Events::default()));
        let config = ClientConfig {
            mode,
            num_lines,
            ..ClientConfig::default()
        };
        let session = Session::open(&launch(5), &config, Box::new(Recorder(events.clone())));
        (session, events)
    }

    #[test]
    fn opens_with_zeroed_buffer_and_derived_interval() {
        let (session, _) = open_session(RenderMode::Tiled, 20);
        assert_eq!(session.buffer().len(), 100);
        assert!(session.buffer().to_flat().iter().all(|v| *v == 0.0));
        assert_eq!(session.params().interval, 50.0);
        assert_eq!(session.pacer().target_interval(), 50.0);
    }

    #[test]
    fn fewer_lines_recompute_interval() {
        let (mut session, events) = open_session(RenderMode::Tiled, 20);
        let recompute = session.set_num_lines(10);

        assert_eq!(recompute.interval, Some(100.0));
        assert_eq!(session.params().interval, 100.0);
        assert_eq!(session.buffer().len(), 50);
        assert_eq!(session.pacer().target_interval(), 100.0);
        assert_eq!(events.borrow().resizes, vec![10]);
        assert_eq!(events.borrow().frames.len(), 1);
    }

    #[test]
    fn duration_change_recomputes_interval() {
        let (mut session, _) = open_session(RenderMode::Waterfall, 10);
        let recompute = session.set_duration(2000.0);
        assert_eq!(recompute.interval, Some(200.0));

        let unchanged = session.set_duration(2000.0);
        assert!(!unchanged.interval_changed());
    }

    #[test]
    fn line_mode_accepts_direct_interval() {
        let (mut session, _) = open_session(RenderMode::Line, 20);
        assert_eq!(session.params().interval, 50.0);
        assert_eq!(session.set_interval(80.0).interval, Some(80.0));

        let (mut windowed, _) = open_session(RenderMode::Tiled, 20);
        assert!(!windowed.set_interval(80.0).interval_changed());
        assert_eq!(windowed.params().interval, 50.0);
    }

    #[test]
    fn rejected_frame_does_not_redraw() {
        let (mut session, events) = open_session(RenderMode::PolarArcs, 3);
        let before = session.buffer().clone();
        assert!(session.ingest(&[1.0, 2.0]).is_err());
        assert_eq!(session.buffer(), &before);
        assert!(events.borrow().frames.is_empty());

        session.ingest(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(&session.buffer().to_flat()[..6], &[1.0, 2.0, 3.0, 4.0, 5.0, 0.0]);
        assert_eq!(events.borrow().frames.len(), 1);
    }

    #[test]
    fn polar_switch_preserves_history() {
        let (mut session, events) = open_session(RenderMode::PolarLines, 3);
        session.ingest(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        session.ingest(&[6.0, 7.0, 8.0, 9.0, 10.0]).unwrap();
        let history = session.buffer().clone();

        let _ = session.set_mode(RenderMode::PolarArcs);
        assert_eq!(session.buffer().shape(), BufferShape::Flattened);
        assert_eq!(session.buffer().to_flat(), history.to_flat());

        let _ = session.set_mode(RenderMode::PolarLines);
        assert_eq!(session.buffer(), &history);
        assert_eq!(events.borrow().reshapes, vec![true, false]);
        assert_eq!(events.borrow().switches.len(), 2);
    }

    #[test]
    fn incompatible_switch_rebuilds_from_zero() {
        let (mut session, _) = open_session(RenderMode::Waterfall, 4);
        session.ingest(&[1.0; 5]).unwrap();

        let recompute = session.set_mode(RenderMode::Tiled);
        assert!(!recompute.interval_changed());
        assert_eq!(session.buffer().shape(), BufferShape::Flattened);
        assert_eq!(session.buffer().len(), 20);
        assert!(session.buffer().to_flat().iter().all(|v| *v == 0.0));

        let _ = session.set_mode(RenderMode::Line);
        assert_eq!(session.buffer().shape(), BufferShape::Frame);
        assert_eq!(session.pacer().policy(), policy_for(RenderMode::Line));
    }

    #[test]
    fn line_mode_correction_raises_interval() {
        let (mut session, events) = open_session(RenderMode::Line, 20);
        let (verdict, recompute) = session.observe_round_trip(500.0);

        // 50 * 0.95 + 500 * 0.05 = 72.5, overshoot 22.5 rounds to 23.
        assert!(verdict.degraded);
        assert_eq!(recompute.interval, Some(73.0));
        assert_eq!(session.pacer().smoothed_delta(), 0.0);
        assert_eq!(session.pacer().target_interval(), 73.0);
        assert!(matches!(
            events.borrow().statuses[..],
            [PacingStatus::Degraded { .. }]
        ));
    }

    #[test]
    fn windowed_correction_trades_lines_for_cadence() {
        let (mut session, events) = open_session(RenderMode::Tiled, 20);
        let (_, recompute) = session.observe_round_trip(550.0);

        // 50 * 0.95 + 550 * 0.05 = 75, overshoot 25, round(1000 / 75) = 13.
        assert_eq!(session.params().num_lines, 13);
        assert_eq!(session.buffer().len(), 65);
        assert_eq!(recompute.interval, Some(1000.0 / 13.0));
        assert_eq!(events.borrow().resizes, vec![13]);
    }

    #[test]
    fn fractional_line_interval_is_corrected_to_whole_milliseconds() {
        let (mut session, _) = open_session(RenderMode::Tiled, 13);
        let _ = session.set_mode(RenderMode::Line);
        assert_eq!(session.params().interval, 1000.0 / 13.0);

        let (_, recompute) = session.observe_round_trip(600.0);
        assert_eq!(recompute.interval, Some(103.0));
        assert_eq!(session.pacer().target_interval(), 103.0);
    }

    #[test]
    fn zero_lines_are_raised_to_one() {
        let (mut session, events) = open_session(RenderMode::Waterfall, 4);
        let recompute = session.set_num_lines(0);

        assert_eq!(session.params().num_lines, 1);
        assert_eq!(session.buffer().lines(), 1);
        assert_eq!(recompute.interval, Some(1000.0));
        assert!(session.pacer().target_interval().is_finite());
        assert_eq!(events.borrow().resizes, vec![1]);

        let (opened, _) = open_session(RenderMode::Tiled, 0);
        assert_eq!(opened.params().num_lines, 1);
        assert_eq!(opened.params().interval, 1000.0);
    }

    #[test]
    fn waterfall_overlay_tracks_window_depth() {
        let (mut session, _) = open_session(RenderMode::Waterfall, 5);
        // 180 px over 180 degrees.
        let plot = PlotBox {
            left: 10.0,
            width: 180.0,
            height: 300.0,
        };
        let video = VideoSize {
            width: 640.0,
            height: 480.0,
        };
        assert_eq!(session.overlay(plot, video).left, 10.0 + 45.0 + 4.0 * 1.5);

        let _ = session.set_num_lines(1);
        let placement = session.overlay(plot, video);
        assert_eq!(placement.left, 55.0);
        assert_eq!(placement.width, 90.0);
        assert_eq!(placement.height, 67.5);
    }

    #[test]
    fn display_changes_redraw_without_touching_cadence() {
        let (mut session, events) = open_session(RenderMode::Waterfall, 3);
        let recompute = session.set_display(DisplayChange::YMax(0.5));

        assert!(!recompute.interval_changed());
        assert_eq!(session.display().y_max, 0.5);
        assert_eq!(events.borrow().frames.len(), 1);
        assert_eq!(events.borrow().frames[0].value_domain, (0.0, 0.5));

        let _ = session.set_display(DisplayChange::AngleWidth(180.0));
        let plot = PlotBox {
            left: 0.0,
            width: 180.0,
            height: 100.0,
        };
        let video = VideoSize {
            width: 4.0,
            height: 3.0,
        };
        let placement = session.overlay(plot, video);
        assert_eq!(placement.width, 180.0);
        assert_eq!(placement.left, 2.0 * 1.5);
    }

    #[test]
    fn tcp_backend_gets_no_pooling_messages() {
        let events = Rc::new(RefCell::new(Events::default()));
        let launch = LaunchParameters::from_query("model_length=5&server_type=tcp");
        let mut session = Session::open(
            &launch,
            &ClientConfig::default(),
            Box::new(Recorder(events)),
        );

        assert!(session.open_messages().is_empty());
        assert_eq!(session.start_messages(), vec![ClientMessage::new_interval(50.0)]);
        assert!(session
            .set_param(BackendParam::PoolingAlpha("0.5".into()))
            .is_none());
        assert_eq!(
            session.set_param(BackendParam::Beamformer(true)),
            Some(ClientMessage::Beamformer { beamformer: true })
        );
        assert!(session.beamformer());
    }
}
