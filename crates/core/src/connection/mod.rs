//! Connection manager: owns the duplex link and the session context, issues
//! pulls on the pacing cadence and routes replies.
//!
//! Everything runs as one cooperative loop on a single task, so inbound
//! frames are handled strictly in arrival order and a redraw never sees a
//! half-applied mutation.

pub mod websocket;

use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    time::Instant,
};

use crate::{
    config::DisplayChange,
    protocol::{BackendParam, ClientMessage, ServerMessage},
    session::Recompute,
    timeline::{period_from_ms, PullTimer},
    RenderMode, Result, Session, VisError,
};

/// Text-frame duplex channel to the backend.
#[derive(Debug)]
pub struct Link {
    pub outbound: UnboundedSender<String>,
    pub inbound: UnboundedReceiver<String>,
}

impl Link {
    /// Creates a connected in-memory pair. The second half is the backend's
    /// side: it receives what the client sends and the other way round.
    pub fn pair() -> (Link, Link) {
        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();
        (
            Link {
                outbound: client_tx,
                inbound: client_rx,
            },
            Link {
                outbound: server_tx,
                inbound: server_rx,
            },
        )
    }
}

/// Requests from the control widgets.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    Start,
    Stop,
    SetNumLines(usize),
    SetDuration(f64),
    SetInterval(f64),
    SetMode(RenderMode),
    SetRateLimiting(bool),
    SetDisplay(DisplayChange),
    SendParam(BackendParam),
    Close,
}

#[derive(Debug)]
pub struct ConnectionManager {
    session: Session,
    link: Link,
    timer: PullTimer,
    last_pull: Option<Instant>,
}

impl ConnectionManager {
    /// Takes ownership of an established link and pushes the initial
    /// backend configuration. The pull loop stays idle until [`start`].
    ///
    /// [`start`]: ConnectionManager::start
    pub fn open(link: Link, session: Session) -> Result<Self> {
        let mut manager = Self {
            session,
            link,
            timer: PullTimer::new(),
            last_pull: None,
        };
        for message in manager.session.open_messages() {
            manager.push(&message)?;
        }
        manager.session.redraw();
        Ok(manager)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn timer(&self) -> &PullTimer {
        &self.timer
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_active()
    }

    /// Installs the pull loop at the current interval, replacing any running
    /// one, and tells the backend the cadence.
    pub fn start(&mut self) -> Result<()> {
        self.timer.stop();
        for message in self.session.start_messages() {
            self.push(&message)?;
        }
        let interval = self.session.params().interval;
        self.timer.start(period_from_ms(interval));
        tracing::info!(interval, "pull loop started");
        Ok(())
    }

    /// Cancels the pending pull, if any.
    pub fn stop(&mut self) {
        if self.timer.is_active() {
            tracing::info!("pull loop stopped");
        }
        self.timer.stop();
    }

    pub fn send_param(&mut self, param: BackendParam) -> Result<()> {
        match self.session.set_param(param) {
            Some(message) => self.push(&message),
            None => Ok(()),
        }
    }

    pub fn apply(&mut self, control: Control) -> Result<()> {
        let recompute = match control {
            Control::Start => return self.start(),
            Control::Stop => {
                self.stop();
                return Ok(());
            }
            Control::SetNumLines(num_lines) => self.session.set_num_lines(num_lines),
            Control::SetDuration(duration) => self.session.set_duration(duration),
            Control::SetInterval(interval) => self.session.set_interval(interval),
            Control::SetMode(mode) => self.session.set_mode(mode),
            Control::SetRateLimiting(enabled) => {
                self.session.set_rate_limiting(enabled);
                return Ok(());
            }
            Control::SetDisplay(change) => self.session.set_display(change),
            Control::SendParam(param) => return self.send_param(param),
            Control::Close => {
                self.stop();
                return Ok(());
            }
        };
        self.reschedule(recompute)
    }

    /// Sends one pull request and remembers when it left.
    pub fn pull(&mut self) -> Result<()> {
        self.last_pull = Some(Instant::now());
        self.push(&ClientMessage::pull())
    }

    /// Routes one inbound text frame. Malformed payloads are dropped for
    /// this cycle; the buffer keeps its previous contents.
    pub fn handle_inbound(&mut self, text: &str, received_at: Instant) -> Result<()> {
        let message = match ServerMessage::parse(text) {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!(%err, "dropping unparsable payload");
                return Ok(());
            }
        };

        if let Err(err) = self.session.ingest(&message.data) {
            tracing::debug!(%err, "dropping payload");
            return Ok(());
        }

        if let Some(sent_at) = self.last_pull {
            let delta = received_at.saturating_duration_since(sent_at).as_secs_f64() * 1000.0;
            let (_, recompute) = self.session.observe_round_trip(delta);
            self.reschedule(recompute)?;
        }
        Ok(())
    }

    /// Drives the client until it is closed or the link drops, then hands
    /// back the session with its last-known state.
    pub async fn run(mut self, mut controls: UnboundedReceiver<Control>) -> Result<Session> {
        let mut controls_open = true;
        loop {
            tokio::select! {
                _ = self.timer.tick() => {
                    if let Err(err) = self.pull() {
                        tracing::warn!(%err, "pull failed; halting");
                        break;
                    }
                }
                inbound = self.link.inbound.recv() => match inbound {
                    Some(text) => {
                        if let Err(err) = self.handle_inbound(&text, Instant::now()) {
                            tracing::warn!(%err, "connection lost; halting");
                            break;
                        }
                    }
                    None => {
                        tracing::warn!("connection closed by backend");
                        break;
                    }
                },
                control = controls.recv(), if controls_open => match control {
                    Some(Control::Close) => break,
                    Some(control) => {
                        if let Err(err) = self.apply(control) {
                            tracing::warn!(%err, "connection lost; halting");
                            break;
                        }
                    }
                    None => controls_open = false,
                },
            }
        }
        self.stop();
        Ok(self.session)
    }

    /// Moves the pull loop to a new interval, only if it is running.
    fn reschedule(&mut self, recompute: Recompute) -> Result<()> {
        if recompute.interval_changed() && self.timer.is_active() {
            self.start()?;
        }
        Ok(())
    }

    fn push(&self, message: &ClientMessage) -> Result<()> {
        let text = message.to_text()?;
        self.link
            .outbound
            .send(text)
            .map_err(|_| VisError::ChannelClosed)
    }
}
