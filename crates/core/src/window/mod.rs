//! Rolling store of observation frames shared by every render mode.
//!
//! The buffer has one of three shapes:
//!
//! - [`BufferShape::Frame`]: a single frame replaced on every receipt.
//! - [`BufferShape::History`]: `num_lines` frames, newest first.
//! - [`BufferShape::Flattened`]: `num_lines * model_length` scalars, newest
//!   block first.
//!
//! Its length always matches the shape's contract. Frames with the wrong bin
//! count are rejected without touching the contents.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{Result, VisError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferShape {
    Frame,
    History,
    Flattened,
}

impl BufferShape {
    fn name(self) -> &'static str {
        match self {
            BufferShape::Frame => "scalar-frame",
            BufferShape::History => "vector-history",
            BufferShape::Flattened => "flattened-history",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Store {
    Frame(Vec<f64>),
    History(VecDeque<Vec<f64>>),
    Flattened(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowBuffer {
    model_length: usize,
    /// Window depth, tracked separately so it survives zero-bin frames.
    num_lines: usize,
    store: Store,
}

impl WindowBuffer {
    /// Creates a zero-filled buffer of the requested shape.
    pub fn zeroed(shape: BufferShape, model_length: usize, num_lines: usize) -> Self {
        let store = match shape {
            BufferShape::Frame => Store::Frame(vec![0.0; model_length]),
            BufferShape::History => {
                Store::History((0..num_lines).map(|_| vec![0.0; model_length]).collect())
            }
            BufferShape::Flattened => Store::Flattened(vec![0.0; num_lines * model_length]),
        };
        Self {
            model_length,
            num_lines,
            store,
        }
    }

    pub fn shape(&self) -> BufferShape {
        match self.store {
            Store::Frame(_) => BufferShape::Frame,
            Store::History(_) => BufferShape::History,
            Store::Flattened(_) => BufferShape::Flattened,
        }
    }

    pub fn model_length(&self) -> usize {
        self.model_length
    }

    /// Length in the shape's own units: bins, frames or scalars.
    pub fn len(&self) -> usize {
        match &self.store {
            Store::Frame(frame) => frame.len(),
            Store::History(frames) => frames.len(),
            Store::Flattened(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of retained frames.
    pub fn lines(&self) -> usize {
        match self.store {
            Store::Frame(_) => 1,
            Store::History(_) | Store::Flattened(_) => self.num_lines,
        }
    }

    /// Inserts one frame according to the shape's rule.
    pub fn mutate(&mut self, frame: &[f64]) -> Result<()> {
        if frame.len() != self.model_length {
            return Err(VisError::FrameLength {
                expected: self.model_length,
                actual: frame.len(),
            });
        }

        match &mut self.store {
            Store::Frame(current) => current.copy_from_slice(frame),
            Store::History(frames) => {
                if frames.is_empty() {
                    return Ok(());
                }
                frames.pop_back();
                frames.push_front(frame.to_vec());
            }
            Store::Flattened(values) => {
                if values.is_empty() {
                    return Ok(());
                }
                values.truncate(values.len() - frame.len());
                values.splice(0..0, frame.iter().copied());
            }
        }
        Ok(())
    }

    /// Changes the window depth, preserving the newest `min(old, new)` frames.
    /// The scalar frame is not time-windowed and ignores this.
    pub fn resize(&mut self, num_lines: usize) {
        let model_length = self.model_length;
        match &mut self.store {
            Store::Frame(_) => {}
            Store::History(frames) => {
                frames.truncate(num_lines);
                while frames.len() < num_lines {
                    frames.push_back(vec![0.0; model_length]);
                }
            }
            Store::Flattened(values) => values.resize(num_lines * model_length, 0.0),
        }
        self.num_lines = num_lines;
    }

    /// Converts between vector-history and flattened-history without losing
    /// or reordering any value.
    pub fn reshape(&mut self, to_flattened: bool) -> Result<()> {
        let (model_length, num_lines) = (self.model_length, self.num_lines);
        let store = std::mem::replace(&mut self.store, Store::Frame(Vec::new()));
        self.store = match (store, to_flattened) {
            (Store::History(frames), true) => {
                Store::Flattened(frames.into_iter().flatten().collect())
            }
            (Store::Flattened(values), false) => {
                let frames = if model_length == 0 {
                    (0..num_lines).map(|_| Vec::new()).collect()
                } else {
                    values.chunks_exact(model_length).map(<[f64]>::to_vec).collect()
                };
                Store::History(frames)
            }
            (store @ Store::History(_), false) | (store @ Store::Flattened(_), true) => store,
            (store @ Store::Frame(_), _) => {
                self.store = store;
                return Err(VisError::Reshape(BufferShape::Frame.name()));
            }
        };
        Ok(())
    }

    /// Retained frames, newest first.
    pub fn rows(&self) -> Vec<&[f64]> {
        match &self.store {
            Store::Frame(frame) => vec![frame.as_slice()],
            Store::History(frames) => frames.iter().map(Vec::as_slice).collect(),
            Store::Flattened(_) if self.model_length == 0 => vec![&[][..]; self.num_lines],
            Store::Flattened(values) => values.chunks_exact(self.model_length).collect(),
        }
    }

    /// Contents as one flat sequence, newest block first.
    pub fn to_flat(&self) -> Vec<f64> {
        self.rows().concat()
    }
}
