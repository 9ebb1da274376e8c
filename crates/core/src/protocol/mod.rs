//! JSON text messages exchanged with the backend over the duplex socket.

use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    SendData,
}

/// Client to server message. Each variant serialises to a single-key object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientMessage {
    Command { command: Command },
    /// Pull period in seconds.
    NewInterval { new_interval: f64 },
    PoolingWndlen { new_pooling_wndlen: String },
    PoolingAlpha { new_pooling_alpha: String },
    PoolingType { new_pooling_type: String },
    Beamformer { beamformer: bool },
}

impl ClientMessage {
    pub fn pull() -> Self {
        ClientMessage::Command {
            command: Command::SendData,
        }
    }

    pub fn new_interval(interval_ms: f64) -> Self {
        ClientMessage::NewInterval {
            new_interval: interval_ms / 1000.0,
        }
    }

    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// One-shot backend parameters the control widgets can push.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendParam {
    PoolingWndlen(String),
    PoolingAlpha(String),
    PoolingType(String),
    Beamformer(bool),
}

impl BackendParam {
    pub fn is_pooling(&self) -> bool {
        !matches!(self, BackendParam::Beamformer(_))
    }
}

impl From<BackendParam> for ClientMessage {
    fn from(param: BackendParam) -> Self {
        match param {
            BackendParam::PoolingWndlen(value) => ClientMessage::PoolingWndlen {
                new_pooling_wndlen: value,
            },
            BackendParam::PoolingAlpha(value) => ClientMessage::PoolingAlpha {
                new_pooling_alpha: value,
            },
            BackendParam::PoolingType(value) => ClientMessage::PoolingType {
                new_pooling_type: value,
            },
            BackendParam::Beamformer(beamformer) => ClientMessage::Beamformer { beamformer },
        }
    }
}

/// Server to client payload carrying one observation frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    pub data: Vec<f64>,
}

impl ServerMessage {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
