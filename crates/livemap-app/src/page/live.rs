use std::thread;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, TryRecvError};

use crate::media::decoder::{decode_all, open_track};
use crate::media::fetch::fetch_bytes;
use crate::media::{DecodedFrame, TrackFormat};

/// Load progress of the live image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Complete,
    Failed,
}

/// The map image as the page shows it on its own: loads in the background
/// and then plays its animation on a loop.
pub struct LiveImage {
    source: Option<String>,
    state: LoadState,
    loader: Option<Receiver<Result<Vec<DecodedFrame>>>>,
    frames: Vec<DecodedFrame>,
    current_frame: usize,
    frame_elapsed_ms: f64,
}

impl LiveImage {
    /// Start loading `source` on a helper thread.
    pub fn load(source: Option<String>) -> Self {
        let mut image = Self {
            source: source.clone(),
            state: LoadState::Loading,
            loader: None,
            frames: Vec::new(),
            current_frame: 0,
            frame_elapsed_ms: 0.0,
        };

        let Some(source) = source else {
            log::warn!("No map source configured");
            image.state = LoadState::Failed;
            return image;
        };

        let (tx, rx) = bounded(1);
        let spawned = thread::Builder::new()
            .name("livemap-live-image".into())
            .spawn(move || {
                let _ = tx.send(load_frames(&source));
            });
        match spawned {
            Ok(_) => image.loader = Some(rx),
            Err(e) => {
                log::error!("Failed to spawn live image loader: {e}");
                image.state = LoadState::Failed;
            }
        }
        image
    }

    /// An already loaded image.
    pub fn from_frames(frames: Vec<DecodedFrame>) -> Self {
        let state = if frames.is_empty() {
            LoadState::Failed
        } else {
            LoadState::Complete
        };
        Self {
            source: None,
            state,
            loader: None,
            frames,
            current_frame: 0,
            frame_elapsed_ms: 0.0,
        }
    }

    /// Pick up the loader result. Returns true on the call that completes loading.
    pub fn poll(&mut self) -> bool {
        let Some(rx) = &self.loader else {
            return false;
        };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => Err(anyhow::anyhow!("loader thread exited")),
        };
        self.loader = None;

        match result {
            Ok(frames) if !frames.is_empty() => {
                let first = &frames[0];
                log::info!(
                    "Live image loaded: {}x{}, {} frame{}",
                    first.width,
                    first.height,
                    frames.len(),
                    if frames.len() == 1 { "" } else { "s" }
                );
                self.frames = frames;
                self.state = LoadState::Complete;
                true
            }
            Ok(_) => {
                log::warn!("Live image has no frames");
                self.state = LoadState::Failed;
                false
            }
            Err(e) => {
                log::warn!("Live image failed to load: {e:#}");
                self.state = LoadState::Failed;
                false
            }
        }
    }

    /// Advance playback by `dt_secs`, looping at the end.
    pub fn advance(&mut self, dt_secs: f32) {
        let num_frames = self.frames.len();
        if num_frames <= 1 {
            return;
        }

        self.frame_elapsed_ms += f64::from(dt_secs) * 1000.0;
        loop {
            let current_delay = f64::from(self.frames[self.current_frame].delay_ms.max(1));
            if self.frame_elapsed_ms < current_delay {
                break;
            }
            self.frame_elapsed_ms -= current_delay;
            self.current_frame = (self.current_frame + 1) % num_frames;
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_complete(&self) -> bool {
        self.state == LoadState::Complete
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn frame_index(&self) -> usize {
        self.current_frame
    }

    /// Pixels currently on screen. `None` until complete.
    pub fn current_frame(&self) -> Option<&DecodedFrame> {
        if !self.is_complete() {
            return None;
        }
        self.frames.get(self.current_frame).filter(|f| !f.is_empty())
    }

    pub fn natural_size(&self) -> Option<(u32, u32)> {
        self.current_frame().map(|f| (f.width, f.height))
    }
}

/// Fetch and fully decode a source. Still formats load as a single frame.
fn load_frames(source: &str) -> Result<Vec<DecodedFrame>> {
    let bytes = fetch_bytes(source).with_context(|| format!("fetching {source}"))?;

    if TrackFormat::sniff(&bytes).is_some() {
        let mut track = open_track(bytes)?;
        return Ok(decode_all(track.as_mut())?);
    }

    let image = image::load_from_memory(&bytes)
        .context("unrecognized image format")?
        .to_rgba8();
    Ok(vec![DecodedFrame {
        width: image.width(),
        height: image.height(),
        data: image.into_raw(),
        delay_ms: 0,
    }])
}
