//! Jigtui: drag-and-merge jigsaw puzzle in the terminal.

mod app;
mod error;
mod grid;
mod input;
mod logger;
mod merge;
mod picture;
mod session;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use picture::Picture;
use std::path::PathBuf;

/// Options derived from CLI that affect the game (grid size, seed, snapping, effects).
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub difficulty: usize,
    pub seed: Option<u64>,
    pub snap_home: bool,
    pub no_menu: bool,
    pub no_animation: bool,
    pub frame_rate: f64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        logger::init_logger(path, Some("jigtui".to_string()))
            .with_context(|| format!("cannot open log file {}", path.display()))?;
    }
    let theme = match theme::Theme::load(args.theme.as_deref(), args.palette) {
        Ok(theme) => theme,
        Err(e) => {
            crate::log!("theme fallback to One Dark: {}", e);
            let mut theme = theme::Theme::default();
            theme.apply_palette(args.palette);
            theme
        }
    };
    let pictures = collect_pictures(&args, &theme)?;
    let config = GameConfig {
        difficulty: args.difficulty,
        seed: args.seed,
        snap_home: args.snap_home,
        no_menu: args.no_menu,
        no_animation: args.no_animation,
        frame_rate: args.frame_rate,
    };
    let mut app = App::new(config, theme, pictures)?;
    app.run()?;
    Ok(())
}

/// `--image` first, then the selected built-in pattern, then the other patterns.
fn collect_pictures(args: &Args, theme: &theme::Theme) -> Result<Vec<Picture>> {
    let mut pictures = Vec::new();
    if let Some(path) = &args.image {
        pictures.push(Picture::load(path)?);
    }
    pictures.push(Picture::builtin(args.pattern, theme));
    for pattern in Pattern::value_variants() {
        if *pattern != args.pattern {
            pictures.push(Picture::builtin(*pattern, theme));
        }
    }
    Ok(pictures)
}

fn parse_difficulty(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|_| format!("`{}` is not a number", s))?;
    if app::MenuState::DIFFICULTIES.contains(&n) {
        Ok(n)
    } else {
        Err(format!("difficulty must be between 2 and 8, got {}", n))
    }
}

/// Jigsaw puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "jigtui",
    version,
    about = "Jigsaw puzzle in the terminal. Drag scattered pieces together; aligned neighbours merge.",
    long_about = "Jigtui slices a picture into an N×N grid of pieces and scatters them around the board.\n\n\
        Drag pieces with the mouse. When a piece is dropped next to its true neighbour, the two \
        snap together and move as one group from then on. Merges can cascade. The puzzle is \
        done when a single group remains.\n\n\
        CONTROLS:\n  Mouse drag  Move a group     R  Restart     N  Main menu     Q / Esc  Quit\n  \
        Arrows/hjkl Navigate menus   Enter/Space  Select\n\n\
        Use --image to play with your own picture and --theme to load a btop-style theme (e.g. onedark.theme)."
)]
pub struct Args {
    /// Picture to slice (PNG, JPEG, GIF, BMP, WebP). Uses a built-in pattern if not set.
    #[arg(short, long, value_name = "FILE")]
    pub image: Option<PathBuf>,

    /// Built-in picture used when no --image is given (also selectable in the menu).
    #[arg(short, long, default_value = "sunset")]
    pub pattern: Pattern,

    /// Pieces per side (2-8): the puzzle has N×N pieces.
    #[arg(short, long, default_value = "4", value_name = "N", value_parser = parse_difficulty)]
    pub difficulty: usize,

    /// Seed for scattering pieces. Random if not set.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Snap a group onto its correct place when dropped within a quarter piece of it.
    #[arg(long)]
    pub snap_home: bool,

    /// Skip main menu and start the puzzle immediately.
    #[arg(long)]
    pub no_menu: bool,

    /// Disable merge flash and completion effects.
    #[arg(long)]
    pub no_animation: bool,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette for built-in pictures: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Append timestamped log lines to FILE.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Target render frames per second.
    #[arg(long, default_value = "30.0", value_name = "RATE")]
    pub frame_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Pattern {
    #[default]
    Sunset,
    Rings,
    Plaid,
}

impl Pattern {
    pub fn label(self) -> &'static str {
        match self {
            Self::Sunset => "Sunset",
            Self::Rings => "Rings",
            Self::Plaid => "Plaid",
        }
    }
}
