/// The desktop's reduced-motion preference, queried once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReducedMotion {
    pub system: bool,
    pub user_override: Option<bool>,
}

impl ReducedMotion {
    pub fn detect() -> Self {
        let system = detect_system_preference();
        if system {
            log::info!("Desktop prefers reduced motion");
        }
        Self {
            system,
            user_override: None,
        }
    }

    /// Settings or command line take precedence over the desktop.
    pub fn with_override(self, user_override: Option<bool>) -> Self {
        Self {
            user_override,
            ..self
        }
    }

    pub fn should_reduce(&self) -> bool {
        self.user_override.unwrap_or(self.system)
    }
}

#[cfg(target_os = "linux")]
fn detect_system_preference() -> bool {
    // GNOME: org.gnome.desktop.interface enable-animations
    std::process::Command::new("gsettings")
        .args(["get", "org.gnome.desktop.interface", "enable-animations"])
        .output()
        .ok()
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .is_some_and(|s| parse_enable_animations(&s))
}

#[cfg(not(target_os = "linux"))]
fn detect_system_preference() -> bool {
    false
}

/// `gsettings` prints `false` when animations are turned off.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_enable_animations(output: &str) -> bool {
    output.trim() == "false"
}
