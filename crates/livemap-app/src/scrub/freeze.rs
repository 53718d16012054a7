use std::time::{Duration, Instant};

use crate::media::DecodedFrame;
use crate::surface::SurfaceTarget;

use super::Activity;

/// Quiet time after the last scroll input before the still frame returns.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(160);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreezeState {
    /// Live image visible and animating.
    Active,
    /// Snapshot shown over the live image.
    Frozen,
}

/// Shows a snapshot of the live image whenever scrolling settles.
///
/// Without frame-level decoding the animation cannot follow the scroll
/// position, so it plays only while the user is scrolling.
pub struct FreezeController {
    state: FreezeState,
    reduced_motion: bool,
    quiet_period: Duration,
    deadline: Option<Instant>,
    activated: bool,
    captures: u64,
}

impl FreezeController {
    pub fn new(reduced_motion: bool, quiet_period: Duration) -> Self {
        Self {
            state: FreezeState::Active,
            reduced_motion,
            quiet_period,
            deadline: None,
            activated: false,
            captures: 0,
        }
    }

    pub fn state(&self) -> FreezeState {
        self.state
    }

    pub fn is_frozen(&self) -> bool {
        self.state == FreezeState::Frozen
    }

    /// Snapshots taken so far.
    pub fn captures(&self) -> u64 {
        self.captures
    }

    /// When the pending re-freeze fires, if one is scheduled.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Copy the live image onto the surface. `live` is `None` until the
    /// image has finished loading.
    fn capture(&mut self, live: Option<&DecodedFrame>, target: &mut SurfaceTarget<'_>) -> bool {
        let Some(frame) = live.filter(|f| !f.is_empty()) else {
            return false;
        };
        if !target.draw(frame) {
            return false;
        }
        self.captures += 1;
        true
    }

    fn freeze(&mut self, live: Option<&DecodedFrame>, target: &mut SurfaceTarget<'_>) {
        if self.capture(live, target) {
            self.state = FreezeState::Frozen;
        }
    }

    pub fn on_activity(
        &mut self,
        activity: Activity,
        now: Instant,
        live: Option<&DecodedFrame>,
        target: &mut SurfaceTarget<'_>,
    ) {
        if !activity.is_scroll() {
            // Snapshot must follow the new geometry
            if self.is_frozen() {
                self.capture(live, target);
            }
            return;
        }

        if self.reduced_motion {
            self.freeze(live, target);
            return;
        }

        self.state = FreezeState::Active;
        self.deadline = Some(now + self.quiet_period);
    }

    /// Advance timers. Call once per refresh.
    pub fn tick(&mut self, now: Instant, live: Option<&DecodedFrame>, target: &mut SurfaceTarget<'_>) {
        if !self.activated {
            if live.is_none() {
                return;
            }
            self.activated = true;
            log::debug!("Live image loaded, freezing map");
            self.freeze(live, target);
        }

        if let Some(deadline) = self.deadline {
            if now >= deadline {
                self.deadline = None;
                self.freeze(live, target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::fixtures::PALETTE;
    use crate::page::layout::LayoutBox;
    use crate::scrub::testing::{palette_frame, FRAME_SIZE};
    use crate::surface::RenderSurface;
    use image::Rgba;

    const QUIET: Duration = Duration::from_millis(160);

    fn target(surface: &mut RenderSurface, css_width: f32) -> SurfaceTarget<'_> {
        SurfaceTarget {
            surface,
            reference: LayoutBox {
                x: 0.0,
                y: 0.0,
                width: css_width,
                height: FRAME_SIZE as f32,
            },
            device_pixel_ratio: 1.0,
        }
    }

    fn shown(surface: &RenderSurface) -> Rgba<u8> {
        *surface.pixels().get_pixel(0, 0)
    }

    fn color(index: u32) -> Rgba<u8> {
        let [r, g, b] = PALETTE[index as usize];
        Rgba([r, g, b, 255])
    }

    fn activated(reduced_motion: bool, surface: &mut RenderSurface, now: Instant) -> FreezeController {
        let mut freeze = FreezeController::new(reduced_motion, QUIET);
        freeze.tick(now, Some(&palette_frame(0)), &mut target(surface, 4.0));
        freeze
    }

    #[test]
    fn freezes_once_live_image_loads() {
        let mut surface = RenderSurface::new();
        let mut freeze = FreezeController::new(false, QUIET);
        let now = Instant::now();

        freeze.tick(now, None, &mut target(&mut surface, 4.0));
        assert_eq!(freeze.state(), FreezeState::Active);
        assert_eq!(freeze.captures(), 0);

        freeze.tick(now, Some(&palette_frame(2)), &mut target(&mut surface, 4.0));
        assert!(freeze.is_frozen());
        assert_eq!(freeze.captures(), 1);
        assert_eq!(shown(&surface), color(2));
    }

    #[test]
    fn scroll_unfreezes_until_quiet_period_passes() {
        let mut surface = RenderSurface::new();
        let t0 = Instant::now();
        let mut freeze = activated(false, &mut surface, t0);

        freeze.on_activity(Activity::Scroll, t0, Some(&palette_frame(1)), &mut target(&mut surface, 4.0));
        assert_eq!(freeze.state(), FreezeState::Active);
        assert_eq!(freeze.next_deadline(), Some(t0 + QUIET));

        let live = palette_frame(4);
        freeze.tick(t0 + Duration::from_millis(100), Some(&live), &mut target(&mut surface, 4.0));
        assert_eq!(freeze.state(), FreezeState::Active);

        freeze.tick(t0 + QUIET, Some(&live), &mut target(&mut surface, 4.0));
        assert!(freeze.is_frozen());
        assert_eq!(freeze.captures(), 2);
        // Snapshot is the frame visible at freeze time
        assert_eq!(shown(&surface), color(4));
        assert!(freeze.next_deadline().is_none());
    }

    #[test]
    fn continued_activity_restarts_debounce() {
        let mut surface = RenderSurface::new();
        let t0 = Instant::now();
        let mut freeze = activated(false, &mut surface, t0);
        let live = palette_frame(3);

        freeze.on_activity(Activity::Wheel, t0, Some(&live), &mut target(&mut surface, 4.0));
        freeze.on_activity(
            Activity::Touch,
            t0 + Duration::from_millis(100),
            Some(&live),
            &mut target(&mut surface, 4.0),
        );

        freeze.tick(t0 + Duration::from_millis(200), Some(&live), &mut target(&mut surface, 4.0));
        assert_eq!(freeze.state(), FreezeState::Active);

        freeze.tick(t0 + Duration::from_millis(260), Some(&live), &mut target(&mut surface, 4.0));
        assert!(freeze.is_frozen());
    }

    #[test]
    fn reduced_motion_never_unfreezes() {
        let mut surface = RenderSurface::new();
        let t0 = Instant::now();
        let mut freeze = activated(true, &mut surface, t0);
        assert!(freeze.is_frozen());

        for (i, activity) in [Activity::Scroll, Activity::Wheel, Activity::Touch].into_iter().enumerate() {
            let live = palette_frame(i as u32 + 5);
            freeze.on_activity(activity, t0, Some(&live), &mut target(&mut surface, 4.0));
            assert!(freeze.is_frozen());
            assert!(freeze.next_deadline().is_none());
            assert_eq!(shown(&surface), color(i as u32 + 5));
        }
        assert_eq!(freeze.captures(), 4);
    }

    #[test]
    fn resize_while_frozen_recaptures_at_new_geometry() {
        let mut surface = RenderSurface::new();
        let t0 = Instant::now();
        let mut freeze = activated(false, &mut surface, t0);
        assert_eq!(surface.pixels().dimensions(), (4, 4));

        freeze.on_activity(Activity::Resize, t0, Some(&palette_frame(6)), &mut target(&mut surface, 10.0));
        assert!(freeze.is_frozen());
        assert_eq!(freeze.captures(), 2);
        assert_eq!(surface.pixels().dimensions(), (10, 4));
        assert_eq!(shown(&surface), color(6));
    }

    #[test]
    fn resize_while_active_does_not_capture() {
        let mut surface = RenderSurface::new();
        let t0 = Instant::now();
        let mut freeze = activated(false, &mut surface, t0);
        freeze.on_activity(Activity::Scroll, t0, Some(&palette_frame(0)), &mut target(&mut surface, 4.0));

        freeze.on_activity(Activity::Resize, t0, Some(&palette_frame(0)), &mut target(&mut surface, 10.0));
        assert_eq!(freeze.captures(), 1);
        assert_eq!(freeze.state(), FreezeState::Active);
    }

    #[test]
    fn incomplete_live_image_is_not_captured() {
        let mut surface = RenderSurface::new();
        let t0 = Instant::now();
        let mut freeze = activated(false, &mut surface, t0);
        freeze.on_activity(Activity::Scroll, t0, None, &mut target(&mut surface, 4.0));

        freeze.tick(t0 + QUIET, None, &mut target(&mut surface, 4.0));
        assert_eq!(freeze.state(), FreezeState::Active);
        assert_eq!(freeze.captures(), 1);

        let empty = DecodedFrame {
            data: Vec::new(),
            width: 0,
            height: 0,
            delay_ms: 0,
        };
        freeze.on_activity(Activity::Scroll, t0, None, &mut target(&mut surface, 4.0));
        freeze.tick(t0 + QUIET, Some(&empty), &mut target(&mut surface, 4.0));
        assert_eq!(freeze.state(), FreezeState::Active);
    }
}
