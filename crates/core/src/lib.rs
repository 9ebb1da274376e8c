//! Core library for the DOA visualiser client.
//!
//! The client pulls direction-of-arrival pool vectors from a backend over a
//! websocket and keeps them in a rolling window that several interchangeable
//! render modes read from. Each module owns one piece of that pipeline:
//! pacing the pulls, holding the window, mapping it onto geometry, and
//! driving the connection.

pub mod config;
pub mod connection;
pub mod error;
pub mod mapping;
pub mod pacing;
pub mod protocol;
pub mod render;
pub mod scene;
pub mod session;
pub mod timeline;
pub mod window;

pub use config::{
    ClientConfig, DisplayChange, DisplayConfig, LaunchParameters, PoolingConfig, ServerType,
};
pub use connection::{ConnectionManager, Control, Link};
pub use error::{Result, VisError};
pub use mapping::{AngleAxis, GeometryContext};
pub use pacing::{Correction, CorrectionPolicy, PacingController, Verdict};
pub use protocol::{BackendParam, ClientMessage, ServerMessage};
pub use render::{
    overlay_placement, NullRenderer, OverlayPlacement, PacingStatus, PlotBox, RenderDispatch,
    RenderHooks, VideoSize,
};
pub use scene::{RenderMode, Scene};
pub use session::{Recompute, Session, SessionParameters};
pub use timeline::PullTimer;
pub use window::{BufferShape, WindowBuffer};
