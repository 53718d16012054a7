pub mod controller;
pub mod freeze;
pub mod mode;
pub mod progress;
pub mod schedule;
pub mod session;
#[cfg(test)]
pub mod testing;

pub use mode::{Capabilities, HostView, MapMode, ModeConfig};

/// Page activity the controllers react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Scroll,
    Wheel,
    Touch,
    Resize,
}

impl Activity {
    /// Scroll-like input, as opposed to layout changes.
    pub fn is_scroll(self) -> bool {
        !matches!(self, Activity::Resize)
    }
}
