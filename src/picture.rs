//! Picture source: decode an image file or paint a built-in pattern, fit it onto the
//! surface and cut it into one pixel tile per piece.

use crate::Pattern;
use crate::theme::Theme;
use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use ratatui::style::Color;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Largest share of the surface the solved board may cover, per axis.
const BOARD_SHARE: f64 = 0.6;

/// Built-in pictures are painted at this size, then resized like any file.
const BUILTIN_WIDTH: u32 = 192;
const BUILTIN_HEIGHT: u32 = 128;

#[derive(Debug, Error)]
pub enum PictureError {
    #[error("failed to load {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{0} has no pixels")]
    Empty(PathBuf),
}

/// Board geometry chosen for a surface: piece size and top-left of the solved picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardFit {
    pub piece_width: i32,
    pub piece_height: i32,
    pub board_x: i32,
    pub board_y: i32,
}

/// Fit an `n`×`n` board with the given aspect ratio (width / height) into the surface, centred.
pub fn fit_board(surface_width: i32, surface_height: i32, n: usize, aspect: f64) -> BoardFit {
    let n = n.max(1) as i32;
    let max_w = f64::from(surface_width) * BOARD_SHARE;
    let max_h = f64::from(surface_height) * BOARD_SHARE;
    let aspect = if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 };
    let board_w = max_w.min(max_h * aspect);
    let board_h = board_w / aspect;
    let piece_width = (board_w as i32) / n;
    let piece_height = (board_h as i32) / n;
    BoardFit {
        piece_width,
        piece_height,
        board_x: (surface_width - piece_width * n) / 2,
        board_y: (surface_height - piece_height * n) / 2,
    }
}

/// Pixels of one piece, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    width: usize,
    height: usize,
    pixels: Vec<Color>,
}

impl Tile {
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y * self.width + x).copied()
    }
}

#[derive(Debug, Clone)]
pub struct Picture {
    image: RgbImage,
    label: String,
}

impl Picture {
    pub fn load(path: &Path) -> Result<Self, PictureError> {
        let image = image::open(path)
            .map_err(|source| PictureError::Decode {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgb8();
        if image.width() == 0 || image.height() == 0 {
            return Err(PictureError::Empty(path.to_path_buf()));
        }
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { image, label })
    }

    /// Paint a built-in pattern from the theme palette.
    pub fn builtin(pattern: Pattern, theme: &Theme) -> Self {
        let (w, h) = (BUILTIN_WIDTH, BUILTIN_HEIGHT);
        let image = match pattern {
            Pattern::Sunset => paint_sunset(w, h, theme),
            Pattern::Rings => paint_rings(w, h, theme),
            Pattern::Plaid => paint_plaid(w, h, theme),
        };
        Self {
            image,
            label: pattern.label().to_string(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Width / height.
    pub fn aspect(&self) -> f64 {
        f64::from(self.image.width()) / f64::from(self.image.height())
    }

    /// Resize to the board and cut one tile per piece id (row-major).
    pub fn slice(&self, n: usize, piece_width: i32, piece_height: i32) -> Vec<Tile> {
        let pw = piece_width.max(1) as u32;
        let ph = piece_height.max(1) as u32;
        let (bw, bh) = (pw * n as u32, ph * n as u32);
        let board = if self.image.dimensions() == (bw, bh) {
            self.image.clone()
        } else {
            image::imageops::resize(&self.image, bw, bh, FilterType::Triangle)
        };
        let mut tiles = Vec::with_capacity(n * n);
        for row in 0..n as u32 {
            for col in 0..n as u32 {
                let mut pixels = Vec::with_capacity((pw * ph) as usize);
                for y in 0..ph {
                    for x in 0..pw {
                        pixels.push(to_color(board.get_pixel(col * pw + x, row * ph + y)));
                    }
                }
                tiles.push(Tile {
                    width: pw as usize,
                    height: ph as usize,
                    pixels,
                });
            }
        }
        tiles
    }
}

#[inline]
fn to_color(p: &Rgb<u8>) -> Color {
    Color::Rgb(p[0], p[1], p[2])
}

fn rgb_of(color: Color) -> [u8; 3] {
    match color {
        Color::Rgb(r, g, b) => [r, g, b],
        Color::Black => [0, 0, 0],
        Color::White => [255, 255, 255],
        _ => [128, 128, 128],
    }
}

fn lerp(a: Color, b: Color, t: f64) -> Rgb<u8> {
    let (a, b) = (rgb_of(a), rgb_of(b));
    let t = t.clamp(0.0, 1.0);
    let mix = |i: usize| (f64::from(a[i]) + (f64::from(b[i]) - f64::from(a[i])) * t).round() as u8;
    Rgb([mix(0), mix(1), mix(2)])
}

/// Sky gradient, a sun and a striped sea.
fn paint_sunset(w: u32, h: u32, theme: &Theme) -> RgbImage {
    let horizon = h * 3 / 5;
    let (sun_x, sun_y, sun_r) = (f64::from(w) * 0.65, f64::from(horizon), f64::from(h) / 4.0);
    RgbImage::from_fn(w, h, |x, y| {
        let (fx, fy) = (f64::from(x), f64::from(y));
        if y < horizon {
            let d = ((fx - sun_x).powi(2) + (fy - sun_y).powi(2)).sqrt();
            if d < sun_r {
                return lerp(theme.palette[1], theme.palette[2], d / sun_r);
            }
            lerp(theme.palette[4], theme.palette[1], fy / f64::from(horizon))
        } else {
            let depth = f64::from(y - horizon) / f64::from(h - horizon);
            let wave = ((fx / 9.0) + f64::from(y) * 0.8).sin() * 0.15;
            lerp(theme.palette[5], theme.palette[3], depth + wave)
        }
    })
}

/// Concentric rings around an off-centre point, cycling through the palette.
fn paint_rings(w: u32, h: u32, theme: &Theme) -> RgbImage {
    let (cx, cy) = (f64::from(w) * 0.4, f64::from(h) * 0.45);
    RgbImage::from_fn(w, h, |x, y| {
        let d = ((f64::from(x) - cx).powi(2) + (f64::from(y) - cy).powi(2)).sqrt();
        let band = (d / 11.0) as usize;
        let t = (d / 11.0).fract();
        lerp(theme.palette_color(band), theme.palette_color(band + 1), t * t)
    })
}

/// Overlapping vertical and horizontal stripes.
fn paint_plaid(w: u32, h: u32, theme: &Theme) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| {
        let vertical = theme.palette_color((x / 16) as usize);
        let horizontal = theme.palette_color((y / 12) as usize + 3);
        let weave = if (x + y) % 4 < 2 { 0.35 } else { 0.65 };
        lerp(vertical, horizontal, weave)
    })
}
