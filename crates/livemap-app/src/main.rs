mod accessibility;
mod app;
mod error;
mod gpu;
mod media;
mod page;
mod scrub;
mod settings;
mod surface;

use std::sync::Arc;

use anyhow::Result;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

use accessibility::ReducedMotion;
use app::App;
use scrub::Capabilities;
use settings::{LaunchOptions, SettingsConfig};

struct LivemapApp {
    app: Option<App>,
    window: Option<Arc<Window>>,
    settings: SettingsConfig,
    caps: Capabilities,
}

impl LivemapApp {
    fn new(settings: SettingsConfig, caps: Capabilities) -> Self {
        Self {
            app: None,
            window: None,
            settings,
            caps,
        }
    }
}

impl ApplicationHandler for LivemapApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = WindowAttributes::default()
            .with_title("livemap")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 800));
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());

        match App::new(window, &self.settings, self.caps) {
            Ok(app) => {
                self.app = Some(app);
                log::info!("livemap initialized");
            }
            Err(e) => {
                log::error!("Failed to initialize app: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(app) = self.app.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                app.quit_requested = true;
            }
            WindowEvent::Resized(size) => {
                app.resize(size);
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                app.rescale(scale_factor);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                app.on_wheel(delta);
            }
            WindowEvent::Touch(touch) => {
                app.on_touch(touch);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                if key == KeyCode::Escape {
                    app.quit_requested = true;
                } else {
                    app.on_key(key);
                }
            }
            WindowEvent::RedrawRequested => {
                app.update();

                match app.render() {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let w = app.gpu.surface_config.width;
                        let h = app.gpu.surface_config.height;
                        app.gpu.resize(w, h);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of GPU memory");
                        event_loop.exit();
                    }
                    Err(e) => {
                        log::warn!("Surface error: {e}");
                    }
                }

                app.window.request_redraw();
            }
            _ => {}
        }

        if app.quit_requested {
            event_loop.exit();
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let options = LaunchOptions::from_args(std::env::args().skip(1));
    let mut settings = SettingsConfig::load();
    options.apply(&mut settings);
    if options.save_settings {
        settings.save();
    }

    let reduced_motion = ReducedMotion::detect().with_override(settings.reduced_motion);
    let caps = Capabilities {
        reduced_motion: reduced_motion.should_reduce(),
        frame_decoding: settings.frame_decoding,
    };
    log::info!(
        "Capabilities: reduced motion {}, frame decoding {}",
        caps.reduced_motion,
        caps.frame_decoding
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(winit::event_loop::ControlFlow::Poll);

    let mut app = LivemapApp::new(settings, caps);
    event_loop.run_app(&mut app)?;

    Ok(())
}
