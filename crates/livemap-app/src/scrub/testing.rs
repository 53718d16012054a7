//! Scripted decoder and helpers for driving the scrubber in tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::error::DecodeError;
use crate::media::fixtures::PALETTE;
use crate::media::decoder::TrackInfo;
use crate::media::{DecodedFrame, FrameDecoder, TrackFormat};

pub const FRAME_SIZE: u32 = 4;

/// Solid frame in `PALETTE[index]`.
pub fn palette_frame(index: u32) -> DecodedFrame {
    let [r, g, b] = PALETTE[index as usize % PALETTE.len()];
    DecodedFrame {
        data: [r, g, b, 255].repeat((FRAME_SIZE * FRAME_SIZE) as usize),
        width: FRAME_SIZE,
        height: FRAME_SIZE,
        delay_ms: 100,
    }
}

/// Decoder that records calls and optionally waits for permission per decode.
pub struct ScriptedDecoder {
    info: TrackInfo,
    calls: Arc<Mutex<Vec<u32>>>,
    gate: Option<Receiver<()>>,
    failing: HashSet<u32>,
    alive: Arc<()>,
}

/// Test-side handle to a [`ScriptedDecoder`].
#[derive(Clone)]
pub struct Script {
    calls: Arc<Mutex<Vec<u32>>>,
    gate: Option<Sender<()>>,
    decoder: Weak<()>,
}

impl Script {
    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }

    /// False once the decoder has been dropped by its thread.
    pub fn decoder_alive(&self) -> bool {
        self.decoder.strong_count() > 0
    }

    /// Let one gated decode finish.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.send(()).unwrap();
        }
    }

    /// Block until `count` decodes have started.
    pub fn wait_for_calls(&self, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.calls.lock().unwrap().len() < count {
            assert!(Instant::now() < deadline, "decoder never reached {count} calls");
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

impl ScriptedDecoder {
    pub fn new(frame_count: u32) -> (Self, Script) {
        Self::build(frame_count, false)
    }

    /// Every decode waits for [`Script::release`].
    pub fn gated(frame_count: u32) -> (Self, Script) {
        Self::build(frame_count, true)
    }

    fn build(frame_count: u32, gated: bool) -> (Self, Script) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (gate_tx, gate_rx) = if gated {
            let (tx, rx) = crossbeam_channel::unbounded();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };
        let decoder = Self {
            info: TrackInfo {
                format: TrackFormat::WebP,
                width: FRAME_SIZE,
                height: FRAME_SIZE,
                frame_count,
            },
            calls: calls.clone(),
            gate: gate_rx,
            failing: HashSet::new(),
            alive: Arc::new(()),
        };
        let script = Script {
            calls,
            gate: gate_tx,
            decoder: Arc::downgrade(&decoder.alive),
        };
        (decoder, script)
    }

    pub fn failing(mut self, index: u32) -> Self {
        self.failing.insert(index);
        self
    }
}

impl FrameDecoder for ScriptedDecoder {
    fn track(&self) -> &TrackInfo {
        &self.info
    }

    fn decode(&mut self, index: u32) -> Result<DecodedFrame, DecodeError> {
        self.calls.lock().unwrap().push(index);
        if let Some(gate) = &self.gate {
            gate.recv().map_err(|_| DecodeError::WorkerGone)?;
        }
        if self.failing.contains(&index) {
            return Err(DecodeError::Malformed(format!("scripted failure at {index}")));
        }
        if index >= self.info.frame_count {
            return Err(DecodeError::IndexOutOfRange {
                index,
                count: self.info.frame_count,
            });
        }
        Ok(palette_frame(index))
    }
}

/// Poll `f` until it returns true or a few seconds pass.
pub fn eventually(mut f: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !f() {
        assert!(Instant::now() < deadline, "condition not met in time");
        std::thread::sleep(Duration::from_millis(1));
    }
}
