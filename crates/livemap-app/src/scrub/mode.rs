use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, TryRecvError};

use crate::error::{DecodeError, InitError};
use crate::media::DecodedFrame;
use crate::page::layout::RegionFlags;
use crate::surface::SurfaceTarget;

use super::controller::{ScrubController, ScrubPoll};
use super::freeze::{FreezeController, DEFAULT_QUIET_PERIOD};
use super::progress::{ScrollGeometry, DEFAULT_START_FRACTION};
use super::session::DecodeSession;
use super::Activity;

/// What the host environment offers, queried once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub reduced_motion: bool,
    pub frame_decoding: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeConfig {
    /// Viewport fraction at which scrubbing starts.
    pub start_fraction: f32,
    /// Debounce before the fallback re-freezes.
    pub quiet_period: Duration,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            start_fraction: DEFAULT_START_FRACTION,
            quiet_period: DEFAULT_QUIET_PERIOD,
        }
    }
}

/// The page state a controller sees during one event or refresh.
pub struct HostView<'a> {
    pub target: SurfaceTarget<'a>,
    pub geometry: ScrollGeometry,
    /// Currently visible frame of the live image, once it has loaded.
    pub live_frame: Option<&'a DecodedFrame>,
    pub flags: &'a mut RegionFlags,
}

/// Scrub initialization in progress.
pub struct Resolver {
    opening: Option<Receiver<Result<DecodeSession, InitError>>>,
    warming: Option<ScrubController>,
    config: ModeConfig,
}

impl Resolver {
    /// Returns the final mode once initialization has settled.
    fn advance(&mut self, target: &mut SurfaceTarget<'_>) -> Option<MapMode> {
        if let Some(rx) = &self.opening {
            match rx.try_recv() {
                Ok(Ok(session)) => {
                    self.opening = None;
                    self.warming = Some(ScrubController::new(session, self.config.start_fraction));
                }
                Ok(Err(e)) => return Some(self.fall_back(e)),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    return Some(self.fall_back(InitError::Decode(DecodeError::WorkerGone)));
                }
            }
        }

        match self.warming.as_mut()?.poll(target) {
            ScrubPoll::BecameReady => self.warming.take().map(MapMode::Scrub),
            ScrubPoll::Failed(e) => {
                // Drops the session and its decode thread
                self.warming = None;
                Some(self.fall_back(e))
            }
            ScrubPoll::Idle | ScrubPoll::Drew(_) => None,
        }
    }

    fn fall_back(&self, reason: InitError) -> MapMode {
        // Reduced motion never reaches the resolver
        MapMode::fallback(reason, false, self.config)
    }
}

/// Which controller owns the map surface. Chosen once per page view.
pub enum MapMode {
    Resolving(Resolver),
    Scrub(ScrubController),
    Freeze(FreezeController),
}

impl MapMode {
    /// Pick a mode for `source`, opening it on a helper thread.
    pub fn select(caps: Capabilities, source: Option<String>, config: ModeConfig) -> Self {
        Self::select_with(caps, config, move || {
            let source = source.ok_or(InitError::MissingSource)?;
            DecodeSession::open(&source)
        })
    }

    /// Like [`select`](Self::select) with a custom session opener.
    pub fn select_with<F>(caps: Capabilities, config: ModeConfig, open: F) -> Self
    where
        F: FnOnce() -> Result<DecodeSession, InitError> + Send + 'static,
    {
        if caps.reduced_motion {
            return Self::fallback(InitError::ReducedMotion, true, config);
        }
        if !caps.frame_decoding {
            return Self::fallback(InitError::CapabilityAbsent, false, config);
        }

        let (tx, rx) = bounded(1);
        let spawned = thread::Builder::new()
            .name("livemap-scrub-init".into())
            .spawn(move || {
                let _ = tx.send(open());
            });
        if let Err(e) = spawned {
            log::error!("Failed to spawn scrub init thread: {e}");
            return Self::fallback(InitError::Decode(DecodeError::WorkerGone), false, config);
        }

        MapMode::Resolving(Resolver {
            opening: Some(rx),
            warming: None,
            config,
        })
    }

    fn fallback(reason: InitError, reduced_motion: bool, config: ModeConfig) -> Self {
        match reason {
            InitError::ReducedMotion | InitError::CapabilityAbsent => {
                log::info!("Map scrubbing disabled ({reason}), using still-frame mode");
            }
            _ => log::warn!("Map scrubbing unavailable ({reason}), using still-frame mode"),
        }
        MapMode::Freeze(FreezeController::new(reduced_motion, config.quiet_period))
    }

    pub fn name(&self) -> &'static str {
        match self {
            MapMode::Resolving(_) => "resolving",
            MapMode::Scrub(_) => "scrub",
            MapMode::Freeze(_) => "freeze",
        }
    }

    pub fn is_resolving(&self) -> bool {
        matches!(self, MapMode::Resolving(_))
    }

    pub fn as_scrub(&self) -> Option<&ScrubController> {
        match self {
            MapMode::Scrub(ctrl) => Some(ctrl),
            _ => None,
        }
    }

    pub fn as_freeze(&self) -> Option<&FreezeController> {
        match self {
            MapMode::Freeze(freeze) => Some(freeze),
            _ => None,
        }
    }

    /// Route page activity to the active controller.
    /// Returns false while the mode is still being decided.
    pub fn on_activity(&mut self, activity: Activity, now: Instant, view: &mut HostView<'_>) -> bool {
        match self {
            MapMode::Resolving(_) => false,
            MapMode::Scrub(ctrl) => ctrl.on_activity(activity),
            MapMode::Freeze(freeze) => {
                freeze.on_activity(activity, now, view.live_frame, &mut view.target);
                view.flags.still = freeze.is_frozen();
                true
            }
        }
    }

    /// Per-refresh work: settle the mode, run pending updates, apply results.
    ///
    /// Returns true on the refresh that left `Resolving`.
    pub fn refresh(&mut self, now: Instant, view: &mut HostView<'_>) -> bool {
        let mut resolved_now = false;
        if let MapMode::Resolving(resolver) = self {
            if let Some(resolved) = resolver.advance(&mut view.target) {
                log::info!("Map mode resolved: {}", resolved.name());
                *self = resolved;
                view.flags.scrub_ready = matches!(self, MapMode::Scrub(_));
                resolved_now = true;
            }
        }

        match self {
            MapMode::Resolving(_) => {}
            MapMode::Scrub(ctrl) => {
                ctrl.on_refresh(&view.geometry);
                if let ScrubPoll::Failed(e) = ctrl.poll(&mut view.target) {
                    log::warn!("Scrubber failed after warm-up: {e}");
                }
            }
            MapMode::Freeze(freeze) => {
                freeze.tick(now, view.live_frame, &mut view.target);
                view.flags.still = freeze.is_frozen();
            }
        }
        resolved_now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::fixtures::{animated_gif, PALETTE};
    use crate::page::layout::LayoutBox;
    use crate::scrub::testing::{eventually, palette_frame, ScriptedDecoder, FRAME_SIZE};
    use crate::scrub::controller::ScrubState;
    use crate::scrub::freeze::FreezeState;
    use crate::surface::RenderSurface;
    use image::Rgba;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    const SCRUB: Capabilities = Capabilities {
        reduced_motion: false,
        frame_decoding: true,
    };

    fn view<'a>(
        surface: &'a mut RenderSurface,
        flags: &'a mut RegionFlags,
        live_frame: Option<&'a DecodedFrame>,
    ) -> HostView<'a> {
        HostView {
            target: SurfaceTarget {
                surface,
                reference: LayoutBox {
                    x: 0.0,
                    y: 0.0,
                    width: FRAME_SIZE as f32,
                    height: FRAME_SIZE as f32,
                },
                device_pixel_ratio: 1.0,
            },
            geometry: ScrollGeometry {
                region_top: 720.0,
                region_height: 600.0,
                viewport_height: 800.0,
            },
            live_frame,
            flags,
        }
    }

    fn resolve(mode: &mut MapMode, surface: &mut RenderSurface, flags: &mut RegionFlags) {
        eventually(|| {
            mode.refresh(Instant::now(), &mut view(surface, flags, None));
            !mode.is_resolving()
        });
    }

    fn scripted(frame_count: u32) -> (MapMode, crate::scrub::testing::Script) {
        let (decoder, script) = ScriptedDecoder::new(frame_count);
        let mode = MapMode::select_with(SCRUB, ModeConfig::default(), move || {
            DecodeSession::with_decoder(Arc::from(&[][..]), Box::new(decoder))
        });
        (mode, script)
    }

    #[test]
    fn reduced_motion_goes_straight_to_freeze() {
        let opened = Arc::new(AtomicBool::new(false));
        let flag = opened.clone();
        let caps = Capabilities {
            reduced_motion: true,
            frame_decoding: true,
        };
        let mode = MapMode::select_with(caps, ModeConfig::default(), move || {
            flag.store(true, Ordering::SeqCst);
            Err(InitError::MissingSource)
        });
        assert_eq!(mode.name(), "freeze");
        assert!(!opened.load(Ordering::SeqCst));
    }

    #[test]
    fn missing_decoding_support_goes_to_freeze() {
        let caps = Capabilities {
            reduced_motion: false,
            frame_decoding: false,
        };
        let mode = MapMode::select(caps, Some("map.webp".into()), ModeConfig::default());
        assert!(mode.as_freeze().is_some());
    }

    #[test]
    fn multi_frame_source_selects_scrub() {
        let (mut mode, script) = scripted(10);
        let mut surface = RenderSurface::new();
        let mut flags = RegionFlags::default();
        assert!(mode.is_resolving());

        resolve(&mut mode, &mut surface, &mut flags);
        assert_eq!(mode.name(), "scrub");
        assert!(flags.scrub_ready);
        assert!(!flags.still);
        assert_eq!(script.calls(), vec![0]);
        let [r, g, b] = PALETTE[0];
        assert_eq!(*surface.pixels().get_pixel(0, 0), Rgba([r, g, b, 255]));
    }

    #[test]
    fn resolution_reported_once() {
        let (mut mode, _script) = scripted(10);
        let mut surface = RenderSurface::new();
        let mut flags = RegionFlags::default();

        let mut resolutions = 0;
        eventually(|| {
            if mode.refresh(Instant::now(), &mut view(&mut surface, &mut flags, None)) {
                resolutions += 1;
            }
            !mode.is_resolving()
        });
        for _ in 0..5 {
            if mode.refresh(Instant::now(), &mut view(&mut surface, &mut flags, None)) {
                resolutions += 1;
            }
        }
        assert_eq!(resolutions, 1);
        assert_eq!(mode.name(), "scrub");
    }

    #[test]
    fn single_frame_source_falls_back_without_decoding() {
        let (mut mode, script) = scripted(1);
        let mut surface = RenderSurface::new();
        let mut flags = RegionFlags::default();

        resolve(&mut mode, &mut surface, &mut flags);
        assert_eq!(mode.name(), "freeze");
        assert!(!flags.scrub_ready);

        let live = palette_frame(2);
        for _ in 0..5 {
            mode.on_activity(Activity::Scroll, Instant::now(), &mut view(&mut surface, &mut flags, Some(&live)));
            mode.refresh(Instant::now(), &mut view(&mut surface, &mut flags, Some(&live)));
        }
        assert!(script.calls().is_empty());
    }

    #[test]
    fn single_frame_gif_falls_back() {
        let bytes = animated_gif(1, 3, 3);
        let mut mode = MapMode::select_with(SCRUB, ModeConfig::default(), move || {
            DecodeSession::from_bytes(bytes)
        });
        let mut surface = RenderSurface::new();
        let mut flags = RegionFlags::default();
        resolve(&mut mode, &mut surface, &mut flags);
        assert!(mode.as_freeze().is_some());
    }

    #[test]
    fn unreachable_source_falls_back() {
        let mut mode = MapMode::select(SCRUB, Some("/nonexistent/map.webp".into()), ModeConfig::default());
        let mut surface = RenderSurface::new();
        let mut flags = RegionFlags::default();
        resolve(&mut mode, &mut surface, &mut flags);
        assert!(mode.as_freeze().is_some());

        let mut mode = MapMode::select(SCRUB, None, ModeConfig::default());
        resolve(&mut mode, &mut surface, &mut flags);
        assert!(mode.as_freeze().is_some());
    }

    #[test]
    fn warm_up_failure_falls_back() {
        let (decoder, _script) = ScriptedDecoder::new(4);
        let decoder = decoder.failing(0);
        let mut mode = MapMode::select_with(SCRUB, ModeConfig::default(), move || {
            DecodeSession::with_decoder(Arc::from(&[][..]), Box::new(decoder))
        });
        let mut surface = RenderSurface::new();
        let mut flags = RegionFlags::default();
        resolve(&mut mode, &mut surface, &mut flags);
        assert!(mode.as_freeze().is_some());
        assert!(!flags.scrub_ready);
    }

    #[test]
    fn events_ignored_while_resolving() {
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);
        let (decoder, script) = ScriptedDecoder::new(4);
        let mut mode = MapMode::select_with(SCRUB, ModeConfig::default(), move || {
            let _ = release_rx.recv();
            DecodeSession::with_decoder(Arc::from(&[][..]), Box::new(decoder))
        });
        let mut surface = RenderSurface::new();
        let mut flags = RegionFlags::default();
        let live = palette_frame(1);

        let routed = mode.on_activity(Activity::Scroll, Instant::now(), &mut view(&mut surface, &mut flags, Some(&live)));
        assert!(!routed);
        mode.refresh(Instant::now(), &mut view(&mut surface, &mut flags, Some(&live)));
        assert!(mode.is_resolving());
        assert_eq!(flags, RegionFlags::default());
        assert_eq!(surface.draw_count(), 0);

        release_tx.send(()).unwrap();
        resolve(&mut mode, &mut surface, &mut flags);
        assert_eq!(script.calls(), vec![0]);
    }

    #[test]
    fn scrub_mode_never_freezes() {
        let (mut mode, _script) = scripted(10);
        let mut surface = RenderSurface::new();
        let mut flags = RegionFlags::default();
        resolve(&mut mode, &mut surface, &mut flags);

        let live = palette_frame(9);
        let t0 = Instant::now();
        mode.on_activity(Activity::Scroll, t0, &mut view(&mut surface, &mut flags, Some(&live)));
        mode.refresh(t0 + Duration::from_secs(1), &mut view(&mut surface, &mut flags, Some(&live)));
        assert!(!flags.still);
        assert_eq!(mode.as_scrub().map(ScrubController::state), Some(ScrubState::Active));
    }

    #[test]
    fn freeze_mode_sets_still_flag() {
        let mode_caps = Capabilities {
            reduced_motion: false,
            frame_decoding: false,
        };
        let mut mode = MapMode::select(mode_caps, None, ModeConfig::default());
        let mut surface = RenderSurface::new();
        let mut flags = RegionFlags::default();
        let live = palette_frame(3);

        mode.refresh(Instant::now(), &mut view(&mut surface, &mut flags, Some(&live)));
        assert!(flags.still);
        assert!(!flags.scrub_ready);
        assert_eq!(mode.as_freeze().map(FreezeController::state), Some(FreezeState::Frozen));

        mode.on_activity(Activity::Scroll, Instant::now(), &mut view(&mut surface, &mut flags, Some(&live)));
        assert!(!flags.still);
    }
}
