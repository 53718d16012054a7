use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::page::layout::PageConfig;
use crate::scrub::freeze::DEFAULT_QUIET_PERIOD;
use crate::scrub::progress::DEFAULT_START_FRACTION;
use crate::scrub::ModeConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub version: u32,
    /// URL or path of the animated map.
    pub source: Option<String>,
    pub scrub_start_fraction: f32,
    pub freeze_quiet_ms: u64,
    /// Forces reduced motion on or off regardless of the desktop setting.
    pub reduced_motion: Option<bool>,
    /// Allow frame-level decoding. Off forces the still-frame mode.
    pub frame_decoding: bool,
    pub device_pixel_ratio: Option<f64>,
    pub page: PageConfig,
    /// Scroll distance of one mouse wheel notch, in CSS pixels.
    pub wheel_line_px: f32,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            version: 1,
            source: None,
            scrub_start_fraction: DEFAULT_START_FRACTION,
            freeze_quiet_ms: DEFAULT_QUIET_PERIOD.as_millis() as u64,
            reduced_motion: None,
            frame_decoding: true,
            device_pixel_ratio: None,
            page: PageConfig::default(),
            wheel_line_px: 40.0,
        }
    }
}

impl SettingsConfig {
    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("livemap").join("settings.json"))
    }

    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Missing or invalid files yield defaults.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid settings file {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) {
        let Some(path) = Self::default_path() else {
            return;
        };
        match self.save_to(&path) {
            Ok(()) => log::info!("Settings saved to {}", path.display()),
            Err(e) => log::warn!("Failed to save settings: {e:#}"),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Scrub and freeze tuning, with out-of-range values replaced by defaults.
    pub fn mode_config(&self) -> ModeConfig {
        let start_fraction = if self.scrub_start_fraction.is_finite() && self.scrub_start_fraction > 0.0 {
            self.scrub_start_fraction
        } else {
            DEFAULT_START_FRACTION
        };
        ModeConfig {
            start_fraction,
            quiet_period: Duration::from_millis(self.freeze_quiet_ms),
        }
    }
}

/// Command-line overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    pub source: Option<String>,
    pub reduced_motion: bool,
    pub no_scrub: bool,
    pub save_settings: bool,
}

impl LaunchOptions {
    /// Parse arguments, excluding the program name.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = Self::default();
        for arg in args {
            match arg.as_str() {
                "--reduced-motion" => options.reduced_motion = true,
                "--no-scrub" => options.no_scrub = true,
                "--save-settings" => options.save_settings = true,
                flag if flag.starts_with("--") => log::warn!("Unknown option {flag}"),
                _ => options.source = Some(arg),
            }
        }
        options
    }

    pub fn apply(&self, settings: &mut SettingsConfig) {
        if let Some(source) = &self.source {
            settings.source = Some(source.clone());
        }
        if self.reduced_motion {
            settings.reduced_motion = Some(true);
        }
        if self.no_scrub {
            settings.frame_decoding = false;
        }
    }
}
