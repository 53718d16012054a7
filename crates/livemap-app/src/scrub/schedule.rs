/// Coalesces update requests to at most one per display refresh.
///
/// Events call [`request`](Self::request); the frame loop calls
/// [`take`](Self::take) once per refresh.
#[derive(Debug, Default)]
pub struct FrameScheduler {
    pending: bool,
    coalesced: u64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for an update on the next refresh. Returns true if this call
    /// scheduled it, false if one was already pending.
    pub fn request(&mut self) -> bool {
        if self.pending {
            self.coalesced += 1;
            return false;
        }
        self.pending = true;
        true
    }

    /// Consume the pending update, if any.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Requests folded into an already-pending update.
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_collapses_to_one_update() {
        let mut scheduler = FrameScheduler::new();
        assert!(scheduler.request());
        for _ in 0..20 {
            assert!(!scheduler.request());
        }
        assert_eq!(scheduler.coalesced(), 20);

        assert!(scheduler.take());
        assert!(!scheduler.take());
    }

    #[test]
    fn next_refresh_can_schedule_again() {
        let mut scheduler = FrameScheduler::new();
        scheduler.request();
        scheduler.take();
        assert!(!scheduler.is_pending());
        assert!(scheduler.request());
        assert!(scheduler.is_pending());
    }
}
