use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use winit::dpi::PhysicalSize;
use winit::event::{MouseScrollDelta, Touch, TouchPhase};
use winit::keyboard::KeyCode;
use winit::window::Window;

use crate::gpu::{GpuContext, Presenter};
use crate::page::{LiveImage, PageCompositor, PageLayout};
use crate::scrub::{Activity, Capabilities, HostView, MapMode};
use crate::settings::SettingsConfig;
use crate::surface::{RenderSurface, SurfaceTarget};

/// Share of the viewport moved by PageUp/PageDown/Space.
const PAGE_SCROLL_FRACTION: f32 = 0.9;

pub struct App {
    pub gpu: GpuContext,
    pub window: Arc<Window>,
    presenter: Presenter,
    compositor: PageCompositor,
    layout: PageLayout,
    live: LiveImage,
    surface: RenderSurface,
    mode: MapMode,
    dpr_override: Option<f64>,
    wheel_line_px: f32,
    touch: Option<(u64, f64)>,
    last_frame: Instant,
    pub quit_requested: bool,
}

impl App {
    pub fn new(window: Arc<Window>, settings: &SettingsConfig, caps: Capabilities) -> Result<Self> {
        let gpu = GpuContext::new(window.clone())?;
        let presenter = Presenter::new(&gpu.device, gpu.format);

        let dpr = settings
            .device_pixel_ratio
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or_else(|| window.scale_factor());
        let size = window.inner_size();
        let layout = PageLayout::new(
            settings.page,
            (f64::from(size.width) / dpr) as f32,
            (f64::from(size.height) / dpr) as f32,
            dpr,
        );

        let live = LiveImage::load(settings.source.clone());
        let mode = MapMode::select(caps, settings.source.clone(), settings.mode_config());

        if !mode.is_resolving() {
            window.set_title(&Self::title(&mode));
        }
        log::info!(
            "Page {}x{} @{dpr}x, source {}",
            layout.viewport_width(),
            layout.viewport_height(),
            settings.source.as_deref().unwrap_or("<none>")
        );

        Ok(Self {
            gpu,
            window,
            presenter,
            compositor: PageCompositor::new(),
            layout,
            live,
            surface: RenderSurface::new(),
            mode,
            dpr_override: settings.device_pixel_ratio,
            wheel_line_px: settings.wheel_line_px,
            touch: None,
            last_frame: Instant::now(),
            quit_requested: false,
        })
    }

    /// Run `f` against the map mode and this refresh's view of the page.
    fn with_view<R>(&mut self, f: impl FnOnce(&mut MapMode, &mut HostView<'_>) -> R) -> R {
        let mut view = HostView {
            target: SurfaceTarget {
                surface: &mut self.surface,
                reference: self.layout.image_rect(),
                device_pixel_ratio: self.layout.device_pixel_ratio(),
            },
            geometry: self.layout.scroll_geometry(),
            live_frame: self.live.current_frame(),
            flags: &mut self.layout.flags,
        };
        f(&mut self.mode, &mut view)
    }

    fn title(mode: &MapMode) -> String {
        format!("livemap ({})", mode.name())
    }

    fn notify(&mut self, activity: Activity) {
        let now = Instant::now();
        self.with_view(|mode, view| mode.on_activity(activity, now, view));
    }

    fn scroll_by(&mut self, dy: f32) -> bool {
        let moved = self.layout.scroll_by(dy);
        if moved {
            self.notify(Activity::Scroll);
        }
        moved
    }

    pub fn on_wheel(&mut self, delta: MouseScrollDelta) {
        let dy = match delta {
            MouseScrollDelta::LineDelta(_, y) => -y * self.wheel_line_px,
            MouseScrollDelta::PixelDelta(pos) => (-pos.y / self.layout.device_pixel_ratio()) as f32,
        };
        self.notify(Activity::Wheel);
        self.scroll_by(dy);
    }

    pub fn on_touch(&mut self, touch: Touch) {
        let y = touch.location.y;
        match touch.phase {
            TouchPhase::Started => self.touch = Some((touch.id, y)),
            TouchPhase::Moved => {
                let Some((id, last_y)) = self.touch else {
                    return;
                };
                if id != touch.id {
                    return;
                }
                self.touch = Some((id, y));
                let dy = ((last_y - y) / self.layout.device_pixel_ratio()) as f32;
                self.notify(Activity::Touch);
                self.scroll_by(dy);
            }
            TouchPhase::Ended | TouchPhase::Cancelled => {
                if self.touch.is_some_and(|(id, _)| id == touch.id) {
                    self.touch = None;
                }
            }
        }
    }

    /// Keyboard scrolling. Returns false for keys the page ignores.
    pub fn on_key(&mut self, key: KeyCode) -> bool {
        let page = self.layout.viewport_height() * PAGE_SCROLL_FRACTION;
        match key {
            KeyCode::ArrowDown => self.scroll_by(self.wheel_line_px),
            KeyCode::ArrowUp => self.scroll_by(-self.wheel_line_px),
            KeyCode::PageDown | KeyCode::Space => self.scroll_by(page),
            KeyCode::PageUp => self.scroll_by(-page),
            KeyCode::Home => self.scroll_by(-self.layout.scroll_y()),
            KeyCode::End => self.scroll_by(self.layout.max_scroll() - self.layout.scroll_y()),
            _ => return false,
        };
        true
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.gpu.resize(size.width, size.height);
        self.relayout(size, self.window.scale_factor());
    }

    pub fn rescale(&mut self, scale_factor: f64) {
        self.relayout(self.window.inner_size(), scale_factor);
    }

    fn relayout(&mut self, size: PhysicalSize<u32>, scale_factor: f64) {
        let dpr = self.dpr_override.unwrap_or(scale_factor);
        self.layout.set_viewport(
            (f64::from(size.width) / dpr) as f32,
            (f64::from(size.height) / dpr) as f32,
            dpr,
        );
        self.notify(Activity::Resize);
    }

    /// Per-refresh work: loading, playback, and the map mode's scheduled update.
    pub fn update(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        if self.live.poll() {
            if let Some((width, height)) = self.live.natural_size() {
                self.layout.set_image_size(width, height);
                // Image box changed shape
                self.notify(Activity::Resize);
            }
        }
        self.live.advance(dt);

        if self.with_view(|mode, view| mode.refresh(now, view)) {
            self.window.set_title(&Self::title(&self.mode));
        }
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let frame = self.compositor.compose(&self.layout, &self.live, &self.surface);
        self.presenter.upload(&self.gpu.device, &self.gpu.queue, frame);
        self.presenter.render(&self.gpu)
    }
}
