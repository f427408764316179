//! Session configuration.

use serde::{Deserialize, Serialize};

use crate::brush::{BrushSettings, Color};
use crate::error::ConfigError;

/// Default number of undo states kept per canvas.
pub const DEFAULT_HISTORY_DEPTH: usize = 50;

/// Default number of live events buffered while waiting for a snapshot.
pub const DEFAULT_MAX_BUFFERED_EVENTS: usize = 10_000;

/// Size and background of the shared canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasSettings {
    pub width: u32,
    pub height: u32,
    pub background: Color,
}

impl Default for CanvasSettings {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 1000,
            background: Color::white(),
        }
    }
}

/// Tunables for one client session. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    /// Maximum undo states kept; the oldest is dropped first.
    pub history_depth: usize,
    /// Maximum live events held before the join snapshot arrives.
    pub max_buffered_events: usize,
    pub canvas: CanvasSettings,
    pub default_brush: BrushSettings,
    pub default_eraser: BrushSettings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_depth: DEFAULT_HISTORY_DEPTH,
            max_buffered_events: DEFAULT_MAX_BUFFERED_EVENTS,
            canvas: CanvasSettings::default(),
            default_brush: BrushSettings::default_brush(),
            default_eraser: BrushSettings::default_eraser(),
        }
    }
}

impl SessionConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_buffered_events == 0 {
            return Err(ConfigError::Invalid(
                "maxBufferedEvents must be at least 1".to_string(),
            ));
        }
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "canvas size must be non-zero, got {}x{}",
                self.canvas.width, self.canvas.height
            )));
        }
        for (name, brush) in [
            ("defaultBrush", &self.default_brush),
            ("defaultEraser", &self.default_eraser),
        ] {
            if !(brush.size.is_finite() && brush.size > 0.0) {
                return Err(ConfigError::Invalid(format!("{name}.size must be positive")));
            }
            if !(brush.spacing.is_finite() && brush.spacing > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name}.spacing must be positive"
                )));
            }
            if !(0.0..=1.0).contains(&brush.opacity) {
                return Err(ConfigError::Invalid(format!(
                    "{name}.opacity must be within [0, 1]"
                )));
            }
        }
        Ok(())
    }
}
