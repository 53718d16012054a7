use crate::error::{DecodeError, InitError};
use crate::surface::SurfaceTarget;

use super::Activity;
use super::progress::{scroll_progress, target_frame_index, ScrollGeometry};
use super::schedule::FrameScheduler;
use super::session::{DecodeSession, FrameRequest, FrameResult, RenderToken};

/// Lifecycle of the scrubber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrubState {
    /// Waiting for the first frame.
    Uninitialized,
    /// First frame drawn, no input seen yet.
    Ready,
    /// Following scroll input.
    Active,
}

/// Last computed progress plus the frames shown and in flight.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProgressState {
    pub normalized_progress: f32,
    pub last_rendered: Option<u32>,
    /// Frame of the newest outstanding request.
    pub in_flight: Option<u32>,
}

/// Outcome of draining decode completions.
#[derive(Debug)]
pub enum ScrubPoll {
    Idle,
    /// A current result was drawn.
    Drew(u32),
    /// Frame 0 arrived; the scrubber is usable.
    BecameReady,
    /// Warm-up failed. The scrubber must be discarded.
    Failed(InitError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrubStats {
    pub drawn: u64,
    pub stale: u64,
    pub failed: u64,
    pub redundant: u64,
}

/// Drives frame decodes from scroll position.
pub struct ScrubController {
    session: DecodeSession,
    state: ScrubState,
    progress: ProgressState,
    latest_token: RenderToken,
    scheduler: FrameScheduler,
    start_fraction: f32,
    stats: ScrubStats,
    worker_lost: bool,
}

impl ScrubController {
    /// Take ownership of an opened session and start decoding frame 0.
    pub fn new(session: DecodeSession, start_fraction: f32) -> Self {
        let mut controller = Self {
            session,
            state: ScrubState::Uninitialized,
            progress: ProgressState::default(),
            latest_token: RenderToken::default(),
            scheduler: FrameScheduler::new(),
            start_fraction,
            stats: ScrubStats::default(),
            worker_lost: false,
        };
        controller.decode_frame(0);
        controller
    }

    pub fn state(&self) -> ScrubState {
        self.state
    }

    pub fn progress(&self) -> ProgressState {
        self.progress
    }

    pub fn stats(&self) -> ScrubStats {
        self.stats
    }

    pub fn session(&self) -> &DecodeSession {
        &self.session
    }

    pub fn is_update_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    fn next_token(&mut self) -> RenderToken {
        self.latest_token = self.latest_token.next();
        self.latest_token
    }

    /// Request `index` from the decode thread.
    ///
    /// Returns `None` when the frame is already on the surface or being
    /// decoded, or the request could not be queued.
    pub fn decode_frame(&mut self, index: u32) -> Option<RenderToken> {
        let wanted = Some(index);
        if self.progress.last_rendered == wanted || self.progress.in_flight == wanted {
            self.stats.redundant += 1;
            return None;
        }
        let token = self.next_token();
        match self.session.submit(FrameRequest { index, token }) {
            Ok(()) => {
                self.progress.in_flight = wanted;
                Some(token)
            }
            Err(e) => {
                self.report_worker_lost(&e);
                None
            }
        }
    }

    /// Note page activity. Returns true if an update is now pending.
    pub fn on_activity(&mut self, activity: Activity) -> bool {
        match self.state {
            ScrubState::Uninitialized => return false,
            ScrubState::Ready => {
                log::debug!("Scrub active after first {activity:?}");
                self.state = ScrubState::Active;
            }
            ScrubState::Active => {}
        }
        if activity == Activity::Resize {
            // Same frame must be redrawn at the new surface size
            self.progress.last_rendered = None;
        }
        self.scheduler.request();
        true
    }

    /// Run the pending update, if any, against the current geometry.
    pub fn on_refresh(&mut self, geometry: &ScrollGeometry) -> Option<RenderToken> {
        if !self.scheduler.take() {
            return None;
        }
        let progress = scroll_progress(geometry, self.start_fraction);
        self.progress.normalized_progress = progress;
        let index = target_frame_index(progress, self.session.frame_count())?;
        self.decode_frame(index)
    }

    /// Apply finished decodes to the surface.
    pub fn poll(&mut self, target: &mut SurfaceTarget<'_>) -> ScrubPoll {
        let mut outcome = ScrubPoll::Idle;
        loop {
            let result = match self.session.try_recv() {
                Ok(Some(result)) => result,
                Ok(None) => return outcome,
                Err(e) => {
                    if self.state == ScrubState::Uninitialized {
                        return ScrubPoll::Failed(InitError::WarmUp(e));
                    }
                    self.report_worker_lost(&e);
                    return outcome;
                }
            };
            match self.apply(result, target) {
                ScrubPoll::Idle => {}
                drew @ ScrubPoll::Drew(_) => outcome = drew,
                decisive => return decisive,
            }
        }
    }

    fn apply(&mut self, result: FrameResult, target: &mut SurfaceTarget<'_>) -> ScrubPoll {
        let FrameResult {
            index,
            token,
            bitmap,
        } = result;

        if token != self.latest_token {
            self.stats.stale += 1;
            log::trace!(
                "Discarding stale frame {index} (token {} < {})",
                token.value(),
                self.latest_token.value()
            );
            if let Ok(bitmap) = bitmap {
                bitmap.close();
            }
            return ScrubPoll::Idle;
        }
        self.progress.in_flight = None;

        let bitmap = match bitmap {
            Ok(bitmap) => bitmap,
            Err(e) if self.state == ScrubState::Uninitialized => {
                return ScrubPoll::Failed(InitError::WarmUp(e));
            }
            Err(e) => {
                self.stats.failed += 1;
                log::warn!("Frame {index} failed to decode, skipping update: {e}");
                return ScrubPoll::Idle;
            }
        };

        let drawn = target.draw(bitmap.frame());
        bitmap.close();
        if drawn {
            self.progress.last_rendered = Some(index);
            self.stats.drawn += 1;
        }

        if self.state == ScrubState::Uninitialized {
            self.state = ScrubState::Ready;
            // Sync with wherever the page is already scrolled
            self.scheduler.request();
            let track = self.session.track();
            log::info!(
                "Scrubber ready: {} {}x{}, {} frames",
                track.format.mime_type(),
                track.width,
                track.height,
                track.frame_count
            );
            return ScrubPoll::BecameReady;
        }

        if drawn { ScrubPoll::Drew(index) } else { ScrubPoll::Idle }
    }

    fn report_worker_lost(&mut self, e: &DecodeError) {
        if !self.worker_lost {
            self.worker_lost = true;
            log::warn!("Frame decoder unavailable, scrubbing stalled: {e}");
        }
    }
}

impl Drop for ScrubController {
    fn drop(&mut self) {
        let ScrubStats {
            drawn,
            stale,
            failed,
            redundant,
        } = self.stats;
        log::debug!(
            "Scrubber stopped at {:.3} (frame {:?}): {drawn} drawn, {stale} stale, {failed} failed, {redundant} redundant",
            self.progress.normalized_progress,
            self.progress.last_rendered
        );
    }
}
