//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use crate::Palette;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// One Dark defaults (exact hex values from onedark.theme).
const ONEDARK_PALETTE: [Color; 6] = [
    Color::Rgb(0x98, 0xC3, 0x79), // green
    Color::Rgb(0xE5, 0xC0, 0x7B), // yellow
    Color::Rgb(0xE0, 0x6C, 0x75), // red
    Color::Rgb(0x61, 0xAF, 0xEF), // blue
    Color::Rgb(0xC6, 0x78, 0xDD), // magenta
    Color::Rgb(0x56, 0xB6, 0xC2), // cyan
];

const HIGH_CONTRAST_PALETTE: [Color; 6] = [
    Color::Rgb(0x00, 0xFF, 0x00),
    Color::Rgb(0xFF, 0xFF, 0x00),
    Color::Rgb(0xFF, 0x00, 0x00),
    Color::Rgb(0x00, 0x88, 0xFF),
    Color::Rgb(0xFF, 0x00, 0xFF),
    Color::Rgb(0x00, 0xFF, 0xFF),
];

/// Avoids red/green pairs.
const COLORBLIND_PALETTE: [Color; 6] = [
    Color::Rgb(0x00, 0x77, 0xBB), // blue
    Color::Rgb(0xEE, 0x77, 0x33), // orange
    Color::Rgb(0x00, 0x99, 0x88), // teal
    Color::Rgb(0xCC, 0x33, 0x11), // red
    Color::Rgb(0xEE, 0x33, 0x77), // magenta
    Color::Rgb(0xBB, 0xBB, 0x00), // yellow
];

/// UI colours plus the six-colour palette used by the built-in pictures.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Built-in picture colours (index 0..=5): green, yellow, red, blue, magenta, cyan.
    pub palette: [Color; 6],
    /// Surface background.
    pub bg: Color,
    /// Borders and the board outline.
    pub div_line: Color,
    /// Text (stats, menu entries).
    pub main_fg: Color,
    /// Titles and selection.
    pub title: Color,
    /// Hints and secondary text.
    pub inactive_fg: Color,
    /// Flash colour for freshly merged groups.
    pub highlight: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

impl Theme {
    pub fn onedark_default() -> Self {
        Self {
            palette: ONEDARK_PALETTE,
            bg: Color::Rgb(0x28, 0x2C, 0x34),
            div_line: Color::Rgb(0x3F, 0x44, 0x4F),
            main_fg: Color::Rgb(0xAB, 0xB2, 0xBF),
            title: Color::Rgb(0xE5, 0xC0, 0x7B),
            inactive_fg: Color::Rgb(0x5C, 0x63, 0x70),
            highlight: Color::Rgb(0xFF, 0xFF, 0xFF),
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// Falls back to One Dark defaults if path is None or the file is missing.
    pub fn load(path: Option<&Path>, palette: Palette) -> Result<Self, ThemeError> {
        let path = match path {
            Some(p) if p.exists() => p,
            _ => {
                let mut theme = Self::onedark_default();
                theme.apply_palette(palette);
                return Ok(theme);
            }
        };
        let s = std::fs::read_to_string(path)?;
        let map = parse_theme_file(&s);
        let mut theme = Self::from_map(&map);
        theme.apply_palette(palette);
        Ok(theme)
    }

    /// Swap the picture palette for high-contrast or colorblind variants.
    pub fn apply_palette(&mut self, palette: Palette) {
        match palette {
            Palette::Normal => {}
            Palette::HighContrast => self.palette = HIGH_CONTRAST_PALETTE,
            Palette::Colorblind => self.palette = COLORBLIND_PALETTE,
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).and_then(|v| parse_hex(v).ok());
        let d = Self::onedark_default();
        Self {
            palette: [
                get("mem_box").or_else(|| get("cpu_start")).unwrap_or(d.palette[0]),
                get("title").or_else(|| get("cpu_mid")).unwrap_or(d.palette[1]),
                get("cpu_end").or_else(|| get("temp_end")).unwrap_or(d.palette[2]),
                get("cpu_box").unwrap_or(d.palette[3]),
                get("net_box").unwrap_or(d.palette[4]),
                get("hi_fg").or_else(|| get("proc_misc")).unwrap_or(d.palette[5]),
            ],
            bg: get("main_bg").or_else(|| get("meter_bg")).unwrap_or(d.bg),
            div_line: get("div_line").unwrap_or(d.div_line),
            main_fg: get("main_fg").unwrap_or(d.main_fg),
            title: get("title").unwrap_or(d.title),
            inactive_fg: get("inactive_fg").unwrap_or(d.inactive_fg),
            highlight: get("selected_fg").or_else(|| get("hi_fg")).unwrap_or(d.highlight),
        }
    }

    /// Palette colour for index (wraps).
    #[inline]
    pub fn palette_color(&self, index: usize) -> Color {
        self.palette[index % self.palette.len()]
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(eq) = rest.find('=') {
            let value = rest[eq + 1..]
                .trim()
                .trim_matches('"')
                .trim_matches('\'')
                .to_string();
            if !value.is_empty() {
                map.insert(key.to_string(), value);
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&s[range], 16).map_err(|_| ThemeError::InvalidHex(s.to_string()))
    };
    let (r, g, b) = match s.len() {
        6 if s.is_ascii() => (channel(0..2)?, channel(2..4)?, channel(4..6)?),
        3 if s.is_ascii() => (channel(0..1)? * 17, channel(1..2)? * 17, channel(2..3)? * 17),
        _ => return Err(ThemeError::InvalidHex(s.to_string())),
    };
    Ok(Color::Rgb(r, g, b))
}
