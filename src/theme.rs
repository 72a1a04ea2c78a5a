//! Colors used to draw the month grids of a data source.

use std::{fmt::Display, str::FromStr};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

impl FromStr for Color {
    type Err = anyhow::Error;

    /// Accepts `#rrggbb` and `#rrggbbaa`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| anyhow!("Color {s} should start with #"))?;
        if !hex.is_ascii() || !matches!(hex.len(), 6 | 8) {
            return Err(anyhow!("Can't parse {s} into a color"));
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
        let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Color::rgba(channel(0)?, channel(2)?, channel(4)?, alpha))
    }
}

impl TryFrom<String> for Color {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_string()
    }
}

/// Gradient used to paint the cells of one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorTheme {
    pub start: Color,
    pub main: Color,
    pub end: Color,
}

impl ColorTheme {
    /// Theme used when there is nothing to show.
    pub const BLANK: ColorTheme = ColorTheme::new(
        Color::TRANSPARENT,
        Color::TRANSPARENT,
        Color::TRANSPARENT,
    );

    pub const fn new(start: Color, main: Color, end: Color) -> Self {
        Self { start, main, end }
    }
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self::BLANK
    }
}

/// Themes of the current month and the previous month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorThemePair {
    pub primary: ColorTheme,
    pub secondary: ColorTheme,
}

/// Maps a data source to the colors its grids are drawn with. Must not have side effects.
#[cfg_attr(test, mockall::automock)]
pub trait ColorThemeProvider {
    fn color_theme(&self, source_id: &str) -> ColorThemePair;
}

const PALETTE: [ColorTheme; 5] = [
    ColorTheme::new(
        Color::rgb(0xe9, 0x54, 0x20),
        Color::rgb(0xf0, 0x7d, 0x4e),
        Color::rgb(0xf7, 0xb2, 0x96),
    ),
    ColorTheme::new(
        Color::rgb(0x19, 0xb6, 0xee),
        Color::rgb(0x5c, 0xcb, 0xf3),
        Color::rgb(0xa3, 0xe1, 0xf8),
    ),
    ColorTheme::new(
        Color::rgb(0x3e, 0xb3, 0x4f),
        Color::rgb(0x73, 0xc8, 0x7f),
        Color::rgb(0xb1, 0xe0, 0xb8),
    ),
    ColorTheme::new(
        Color::rgb(0x77, 0x21, 0x6f),
        Color::rgb(0x9b, 0x5a, 0x95),
        Color::rgb(0xc9, 0xa4, 0xc5),
    ),
    ColorTheme::new(
        Color::rgb(0xef, 0xb7, 0x3e),
        Color::rgb(0xf3, 0xcb, 0x74),
        Color::rgb(0xf8, 0xe2, 0xb2),
    ),
];

/// Default provider that derives a theme from the source id, so a source keeps its colors
/// between runs. The secondary theme is the next palette entry.
#[derive(Debug, Clone)]
pub struct PaletteThemeProvider {
    palette: Vec<ColorTheme>,
}

impl Default for PaletteThemeProvider {
    fn default() -> Self {
        Self::new(PALETTE.to_vec())
    }
}

impl PaletteThemeProvider {
    /// `palette` must not be empty.
    pub fn new(palette: Vec<ColorTheme>) -> Self {
        assert!(!palette.is_empty(), "palette needs at least one theme");
        Self { palette }
    }
}

impl ColorThemeProvider for PaletteThemeProvider {
    fn color_theme(&self, source_id: &str) -> ColorThemePair {
        // FNV-1a
        let hash = source_id
            .bytes()
            .fold(0xcbf29ce484222325u64, |hash, byte| {
                (hash ^ byte as u64).wrapping_mul(0x100000001b3)
            });
        let index = (hash % self.palette.len() as u64) as usize;
        ColorThemePair {
            primary: self.palette[index],
            secondary: self.palette[(index + 1) % self.palette.len()],
        }
    }
}
