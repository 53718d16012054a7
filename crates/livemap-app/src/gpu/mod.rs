pub mod context;
pub mod fullscreen_quad;
pub mod present;

pub use context::GpuContext;
pub use present::Presenter;
