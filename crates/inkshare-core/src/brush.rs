//! Brush and eraser parameters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// RGBA8 color, serialized as a `#rrggbb` / `#rrggbbaa` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const fn black() -> Self {
        Self::rgb(0, 0, 0)
    }

    pub const fn white() -> Self {
        Self::rgb(255, 255, 255)
    }

    /// Format as `#rrggbb`, or `#rrggbbaa` when not fully opaque.
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = String;

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| format!("color must start with '#': {s}"))?;
        let channel = |range: std::ops::Range<usize>| {
            hex.get(range)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| format!("invalid hex color: {s}"))
        };
        match hex.len() {
            3 => Ok(Self::rgb(
                channel(0..1)? * 17,
                channel(1..2)? * 17,
                channel(2..3)? * 17,
            )),
            6 => Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
            8 => Ok(Self::new(
                channel(0..2)?,
                channel(2..4)?,
                channel(4..6)?,
                channel(6..8)?,
            )),
            _ => Err(format!("invalid hex color length: {s}")),
        }
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Shape of the brush tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipType {
    #[default]
    Circle,
    Square,
}

/// Parameters of a brush or eraser.
///
/// Every artist owns its own copy. A stroke captures a copy at start, so
/// later changes never alter strokes already in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrushSettings {
    pub color: Color,
    /// Opacity in `[0, 1]`.
    pub opacity: f64,
    /// Tip diameter in canvas units.
    pub size: f64,
    /// Dab spacing as a percentage of the tip diameter.
    pub spacing: f64,
    #[serde(default)]
    pub tip_type: TipType,
    pub hardness: f64,
    #[serde(default)]
    pub use_size_pressure: bool,
    #[serde(default)]
    pub use_opacity_pressure: bool,
}

impl BrushSettings {
    /// Default brush of a fresh canvas.
    pub fn default_brush() -> Self {
        Self {
            color: Color::rgb(0x03, 0xB3, 0xFF),
            opacity: 1.0,
            size: 10.0,
            spacing: 2.0,
            tip_type: TipType::Circle,
            hardness: 2.0,
            use_size_pressure: true,
            use_opacity_pressure: false,
        }
    }

    /// Default eraser of a fresh canvas.
    pub fn default_eraser() -> Self {
        Self {
            color: Color::white(),
            ..Self::default_brush()
        }
    }

    /// Minimum distance between two kept stroke nodes.
    pub fn node_spacing(&self) -> f64 {
        self.size * self.spacing / 100.0
    }

    /// Clamp values received from a peer into their valid ranges.
    ///
    /// Non-positive or non-finite size and spacing fall back to `fallback`.
    pub fn sanitized(mut self, fallback: &BrushSettings) -> Self {
        self.opacity = if self.opacity.is_finite() {
            self.opacity.clamp(0.0, 1.0)
        } else {
            fallback.opacity
        };
        if !(self.size.is_finite() && self.size > 0.0) {
            self.size = fallback.size;
        }
        if !(self.spacing.is_finite() && self.spacing > 0.0) {
            self.spacing = fallback.spacing;
        }
        if !self.hardness.is_finite() {
            self.hardness = fallback.hardness;
        }
        self
    }
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self::default_brush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_colors() {
        assert_eq!("#03B3FF".parse::<Color>().unwrap(), Color::rgb(3, 179, 255));
        assert_eq!("#fff".parse::<Color>().unwrap(), Color::white());
        assert_eq!(
            "#00000080".parse::<Color>().unwrap(),
            Color::new(0, 0, 0, 128)
        );
        assert!("03B3FF".parse::<Color>().is_err());
        assert!("#12345".parse::<Color>().is_err());
        assert!("#GGGGGG".parse::<Color>().is_err());
    }

    #[test]
    fn test_color_serializes_as_hex() {
        let json = serde_json::to_string(&Color::rgb(255, 0, 16)).unwrap();
        assert_eq!(json, "\"#FF0010\"");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Color::rgb(255, 0, 16));
    }

    #[test]
    fn test_brush_settings_wire_names() {
        let json = serde_json::to_value(BrushSettings::default_brush()).unwrap();
        assert_eq!(json["color"], "#03B3FF");
        assert_eq!(json["tipType"], "circle");
        assert_eq!(json["useSizePressure"], true);
        assert_eq!(json["useOpacityPressure"], false);
    }

    #[test]
    fn test_node_spacing() {
        let brush = BrushSettings::default_brush();
        assert!((brush.node_spacing() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_sanitized_clamps_values() {
        let fallback = BrushSettings::default_brush();
        let wild = BrushSettings {
            opacity: 3.0,
            size: -1.0,
            spacing: f64::NAN,
            ..fallback.clone()
        };
        let clean = wild.sanitized(&fallback);
        assert_eq!(clean.opacity, 1.0);
        assert_eq!(clean.size, fallback.size);
        assert_eq!(clean.spacing, fallback.spacing);
    }
}
