use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::error::{DecodeError, InitError};
use crate::media::decoder::{open_track, FrameDecoder, TrackInfo};
use crate::media::fetch::fetch_bytes;
use crate::media::{BitmapLedger, FrameBitmap};

/// Generation number of a decode request. Later requests carry larger tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct RenderToken(u64);

impl RenderToken {
    /// The token issued after this one.
    pub fn next(self) -> Self {
        RenderToken(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// Request sent to the decode thread.
#[derive(Debug, Clone, Copy)]
pub struct FrameRequest {
    pub index: u32,
    pub token: RenderToken,
}

/// Result sent back from the decode thread.
#[derive(Debug)]
pub struct FrameResult {
    pub index: u32,
    pub token: RenderToken,
    pub bitmap: Result<FrameBitmap, DecodeError>,
}

/// An opened animated source plus the thread that decodes its frames.
///
/// Immutable after construction. Dropping it detaches the thread, which
/// exits after any decode already running.
pub struct DecodeSession {
    source: Arc<[u8]>,
    track: TrackInfo,
    request_tx: Option<Sender<FrameRequest>>,
    result_rx: Receiver<FrameResult>,
    ledger: BitmapLedger,
}

impl DecodeSession {
    /// Fetch `source` and open its track. Blocking; run off the UI thread.
    pub fn open(source: &str) -> Result<Self, InitError> {
        let bytes = fetch_bytes(source)?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Arc<[u8]>) -> Result<Self, InitError> {
        let decoder = open_track(bytes.clone())?;
        Self::with_decoder(bytes, decoder)
    }

    /// Start a session over an already opened decoder.
    pub fn with_decoder(
        source: Arc<[u8]>,
        decoder: Box<dyn FrameDecoder>,
    ) -> Result<Self, InitError> {
        let track = decoder.track().clone();
        // Single-frame sources gain nothing from scrubbing
        if track.frame_count < 2 {
            return Err(InitError::TooFewFrames(track.frame_count));
        }

        let (request_tx, request_rx) = unbounded::<FrameRequest>();
        let (result_tx, result_rx) = unbounded::<FrameResult>();
        let ledger = BitmapLedger::new();
        let worker_ledger = ledger.clone();

        thread::Builder::new()
            .name("livemap-frame-decoder".into())
            .spawn(move || {
                Self::decode_thread(decoder, request_rx, result_tx, worker_ledger);
            })
            .map_err(|e| {
                log::error!("Failed to spawn frame decoder thread: {e}");
                InitError::Decode(DecodeError::WorkerGone)
            })?;

        log::info!(
            "Decode session opened: {} {}x{}, {} frames, {} bytes",
            track.format.mime_type(),
            track.width,
            track.height,
            track.frame_count,
            source.len()
        );

        Ok(Self {
            source,
            track,
            request_tx: Some(request_tx),
            result_rx,
            ledger,
        })
    }

    pub fn track(&self) -> &TrackInfo {
        &self.track
    }

    pub fn frame_count(&self) -> u32 {
        self.track.frame_count
    }

    /// Bitmaps decoded but not yet released.
    pub fn outstanding_bitmaps(&self) -> usize {
        self.ledger.outstanding()
    }

    /// Queue a decode. A newer request supersedes any still queued.
    pub fn submit(&self, request: FrameRequest) -> Result<(), DecodeError> {
        let Some(tx) = &self.request_tx else {
            return Err(DecodeError::WorkerGone);
        };
        tx.send(request).map_err(|_| DecodeError::WorkerGone)
    }

    /// Poll for a completed decode.
    pub fn try_recv(&self) -> Result<Option<FrameResult>, DecodeError> {
        match self.result_rx.try_recv() {
            Ok(result) => Ok(Some(result)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(DecodeError::WorkerGone),
        }
    }

    /// Background thread: take the newest request, decode it, send it back.
    fn decode_thread(
        mut decoder: Box<dyn FrameDecoder>,
        request_rx: Receiver<FrameRequest>,
        result_tx: Sender<FrameResult>,
        ledger: BitmapLedger,
    ) {
        loop {
            let mut request = match request_rx.recv() {
                Ok(r) => r,
                Err(_) => {
                    log::debug!("Frame decoder exiting (session dropped)");
                    return;
                }
            };

            // Older queued requests are already stale
            while let Ok(newer) = request_rx.try_recv() {
                log::trace!(
                    "Frame decoder: skipping frame {} (token {}) for frame {} (token {})",
                    request.index,
                    request.token.value(),
                    newer.index,
                    newer.token.value()
                );
                request = newer;
            }

            let bitmap = decoder
                .decode(request.index)
                .map(|frame| ledger.track(frame));
            let result = FrameResult {
                index: request.index,
                token: request.token,
                bitmap,
            };
            if result_tx.send(result).is_err() {
                return;
            }
        }
    }
}

impl Drop for DecodeSession {
    fn drop(&mut self) {
        // Dropping the sender ends the decode loop
        self.request_tx.take();
        log::debug!("Decode session closed ({} source bytes released)", self.source.len());
    }
}
