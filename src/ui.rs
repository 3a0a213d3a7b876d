//! Layout and drawing: menu, puzzle surface, sidebar, completion and quit overlays.

use crate::app::{MenuState, MenuTab, QuitOption, Screen};
use crate::grid::{Direction, GroupId, Piece};
use crate::input::Drag;
use crate::picture::Tile;
use crate::session::PuzzleSession;
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Layout, Position, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Widget};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

pub const SIDEBAR_WIDTH: u16 = 26;

/// Flash on a freshly merged group.
const MERGE_FLASH_MS: u32 = 350;
/// Completion celebration over the whole board.
const CELEBRATION_MS: u32 = 1500;

/// Everything the draw pass reads.
pub struct View<'a> {
    pub screen: Screen,
    pub theme: &'a Theme,
    pub session: Option<&'a PuzzleSession>,
    pub tiles: &'a [Tile],
    pub drag: Option<&'a Drag>,
    pub menu: &'a MenuState,
    pub picture_label: &'a str,
    pub elapsed: Duration,
    pub quit_selected: QuitOption,
    pub notice: Option<&'a str>,
    pub now: Instant,
}

/// tachyonfx state that outlives a frame.
#[derive(Default)]
pub struct Effects {
    pending_flash: Option<GroupId>,
    flash: Option<Effect>,
    pending_celebration: bool,
    celebration: Option<Effect>,
    last_process: Option<Instant>,
}

impl Effects {
    /// Flash `group` on the next frame (positions are final by then).
    pub fn flash_group(&mut self, group: GroupId) {
        self.pending_flash = Some(group);
        self.flash = None;
    }

    pub fn celebrate(&mut self) {
        self.pending_celebration = true;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn delta(&mut self, now: Instant) -> TfxDuration {
        let delta = self
            .last_process
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or(Duration::ZERO);
        self.last_process = Some(now);
        TfxDuration::from_millis(delta.as_millis().min(u32::MAX as u128) as u32)
    }
}

/// Playfield panel (left) and sidebar (right).
fn game_layout(area: Rect) -> (Rect, Rect) {
    let [panel, sidebar] =
        Layout::horizontal([Constraint::Fill(1), Constraint::Length(SIDEBAR_WIDTH)]).areas(area);
    (panel, sidebar)
}

/// Terminal cells pieces are drawn into.
pub fn surface_rect(area: Rect) -> Rect {
    let (panel, _) = game_layout(area);
    Block::default().borders(Borders::ALL).inner(panel)
}

/// Surface size in pixels: one column wide, two pixels per row.
pub fn surface_pixels(surface: Rect) -> (i32, i32) {
    (i32::from(surface.width), i32::from(surface.height) * 2)
}

/// Terminal cell → surface pixel (top half of the cell). May fall outside the surface.
pub fn pointer_to_surface(column: u16, row: u16, surface: Rect) -> (i32, i32) {
    (
        i32::from(column) - i32::from(surface.x),
        (i32::from(row) - i32::from(surface.y)) * 2,
    )
}

/// Terminal cells covered by a piece, clipped to the surface.
fn piece_cells(piece: &Piece, surface: Rect) -> impl Iterator<Item = (u16, u16)> + use<> {
    let (sw, sh) = surface_pixels(surface);
    let x0 = piece.x.max(0);
    let x1 = (piece.x + piece.width).min(sw);
    let y0 = piece.y.max(0) / 2;
    let y1 = ((piece.y + piece.height).min(sh) + 1) / 2;
    let (sx, sy) = (i32::from(surface.x), i32::from(surface.y));
    (y0..y1).flat_map(move |row| {
        (x0..x1).map(move |col| ((sx + col) as u16, (sy + row) as u16))
    })
}

fn rgb(color: Color) -> (u8, u8, u8) {
    match color {
        Color::Rgb(r, g, b) => (r, g, b),
        Color::Black => (0, 0, 0),
        Color::White => (255, 255, 255),
        Color::DarkGray => (64, 64, 64),
        _ => (128, 128, 128),
    }
}

fn shade(color: Color, factor: f32) -> Color {
    let (r, g, b) = rgb(color);
    let scale = |c: u8| (c as f32 * factor).clamp(0.0, 255.0) as u8;
    Color::Rgb(scale(r), scale(g), scale(b))
}

fn blend(a: Color, b: Color, t: f32) -> Color {
    let (ar, ag, ab) = rgb(a);
    let (br, bg, bb) = rgb(b);
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    Color::Rgb(mix(ar, br), mix(ag, bg), mix(ab, bb))
}

/// Pixel buffer for the surface; flushed to the terminal as half-blocks.
struct Canvas {
    width: i32,
    height: i32,
    pixels: Vec<Color>,
}

impl Canvas {
    fn new(width: i32, height: i32, bg: Color) -> Self {
        let (width, height) = (width.max(0), height.max(0));
        Self {
            width,
            height,
            pixels: vec![bg; (width * height) as usize],
        }
    }

    #[inline]
    fn set(&mut self, x: i32, y: i32, color: Color) {
        if x >= 0 && y >= 0 && x < self.width && y < self.height {
            self.pixels[(y * self.width + x) as usize] = color;
        }
    }

    fn get(&self, x: i32, y: i32) -> Option<Color> {
        if x >= 0 && y >= 0 && x < self.width && y < self.height {
            Some(self.pixels[(y * self.width + x) as usize])
        } else {
            None
        }
    }

    fn fill(&mut self, x: i32, y: i32, w: i32, h: i32, color: Color) {
        for py in y..y + h {
            for px in x..x + w {
                self.set(px, py, color);
            }
        }
    }

    fn flush(&self, buf: &mut Buffer, surface: Rect) {
        for row in 0..surface.height {
            for col in 0..surface.width {
                let (x, y) = (i32::from(col), i32::from(row) * 2);
                let (Some(top), Some(bottom)) = (self.get(x, y), self.get(x, y + 1)) else {
                    continue;
                };
                buf[(surface.x + col, surface.y + row)]
                    .set_symbol("▀")
                    .set_style(Style::default().fg(top).bg(bottom));
            }
        }
    }
}

/// Sides of a piece not joined to a neighbour of the same group.
fn open_sides(piece: &Piece, pieces: &[Piece]) -> [bool; 4] {
    let mut open = [true; 4];
    for n in piece.adjacent() {
        if pieces[n.id].group_id == piece.group_id {
            open[n.direction as usize] = false;
        }
    }
    open
}

fn paint_piece(
    canvas: &mut Canvas,
    piece: &Piece,
    tile: Option<&Tile>,
    open: [bool; 4],
    offset: (i32, i32),
    fallback: Color,
) {
    let (dx, dy) = offset;
    for ty in 0..piece.height {
        for tx in 0..piece.width {
            let mut color = tile
                .and_then(|t| t.pixel(tx as usize, ty as usize))
                .unwrap_or(fallback);
            let edge = (open[Direction::Up as usize] && ty == 0)
                || (open[Direction::Down as usize] && ty == piece.height - 1)
                || (open[Direction::Left as usize] && tx == 0)
                || (open[Direction::Right as usize] && tx == piece.width - 1);
            if edge {
                color = shade(color, 0.7);
            }
            canvas.set(piece.x + dx + tx, piece.y + dy + ty, color);
        }
    }
}

/// Board outline, then every group bottom to top; the dragged group follows the pointer.
fn draw_surface(
    buf: &mut Buffer,
    surface: Rect,
    session: &PuzzleSession,
    tiles: &[Tile],
    drag: Option<&Drag>,
    theme: &Theme,
) {
    let (sw, sh) = surface_pixels(surface);
    let mut canvas = Canvas::new(sw, sh, theme.bg);

    let (bx, by, bw, bh) = session.board_rect();
    canvas.fill(bx - 1, by - 1, bw + 2, bh + 2, theme.div_line);
    canvas.fill(bx, by, bw, bh, blend(theme.bg, theme.div_line, 0.35));

    let pieces = session.pieces();
    for &group in session.z_order() {
        let (dx, dy) = match drag {
            Some(d) if d.group == group => session
                .group_origin(group)
                .map(|(ox, oy)| (d.origin.0 - ox, d.origin.1 - oy))
                .unwrap_or((0, 0)),
            _ => (0, 0),
        };
        for piece in session.members(group) {
            let open = open_sides(piece, pieces);
            paint_piece(
                &mut canvas,
                piece,
                tiles.get(piece.id),
                open,
                (dx, dy),
                theme.inactive_fg,
            );
        }
    }
    canvas.flush(buf, surface);
}

/// Draw current screen; starts and advances tachyonfx effects.
pub fn draw(frame: &mut Frame, view: &View, effects: &mut Effects) {
    let area = frame.area();
    match view.screen {
        Screen::Menu => draw_menu(frame, view, area),
        Screen::Playing | Screen::Complete | Screen::QuitMenu => {
            let Some(session) = view.session else {
                draw_menu(frame, view, area);
                return;
            };
            draw_game(frame, view, session, area);
            apply_effects(frame, view, session, effects, surface_rect(area));
            match view.screen {
                Screen::Complete => draw_complete(frame, view, session, area),
                Screen::QuitMenu => draw_quit_menu(frame, view.theme, view.quit_selected),
                _ => {}
            }
        }
    }
}

fn apply_effects(
    frame: &mut Frame,
    view: &View,
    session: &PuzzleSession,
    effects: &mut Effects,
    surface: Rect,
) {
    let delta = effects.delta(view.now);

    if let Some(group) = effects.pending_flash.take() {
        let cells: HashSet<(u16, u16)> = session
            .members(group)
            .flat_map(|p| piece_cells(p, surface))
            .collect();
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            cells.contains(&(pos.x, pos.y))
        }));
        let c = view.theme.highlight;
        let effect = fx::fade_from(c, c, (MERGE_FLASH_MS, Interpolation::Linear))
            .with_filter(filter)
            .with_area(surface);
        effects.flash = Some(effect);
    }
    if effects.pending_celebration {
        effects.pending_celebration = false;
        let (bx, by, bw, bh) = session.board_rect();
        let board = Rect {
            x: surface.x + bx.max(0) as u16,
            y: surface.y + (by.max(0) / 2) as u16,
            width: bw.max(0) as u16,
            height: ((bh + 1) / 2).max(0) as u16,
        }
        .intersection(surface);
        let c = view.theme.title;
        let effect = fx::fade_from(c, c, (CELEBRATION_MS, Interpolation::QuadOut)).with_area(board);
        effects.celebration = Some(effect);
    }

    if let Some(effect) = effects.flash.as_mut() {
        frame.render_effect(effect, surface, delta);
    }
    if let Some(effect) = effects.celebration.as_mut() {
        frame.render_effect(effect, surface, delta);
    }
    if effects.flash.as_ref().is_some_and(|e| e.done()) {
        effects.flash = None;
    }
    if effects.celebration.as_ref().is_some_and(|e| e.done()) {
        effects.celebration = None;
    }
}

fn draw_game(frame: &mut Frame, view: &View, session: &PuzzleSession, area: Rect) {
    let theme = view.theme;
    let (panel, sidebar) = game_layout(area);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(
            format!(" Jigtui  | {} ", view.picture_label),
            theme.title,
        ));
    let surface = block.inner(panel);
    block.render(panel, frame.buffer_mut());
    draw_surface(frame.buffer_mut(), surface, session, view.tiles, view.drag, theme);
    draw_sidebar(frame, view, session, sidebar);
}

fn format_clock(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn draw_sidebar(frame: &mut Frame, view: &View, session: &PuzzleSession, area: Rect) {
    let theme = view.theme;
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let [stats_outer, _, progress_outer, _, help_outer] = Layout::vertical([
        Constraint::Length(9),
        Constraint::Length(1),
        Constraint::Length(4),
        Constraint::Length(1),
        Constraint::Length(7),
    ])
    .areas(area);

    let n = session.difficulty();
    let stat = |label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(label, title_style),
            Span::styled(value, fg_style),
        ])
    };
    let stats = vec![
        stat("Puzzle: ", format!("{}×{}", n, n)),
        stat("Groups left: ", session.group_count().to_string()),
        stat("Pieces home: ", format!("{}/{}", session.placed_count(), n * n)),
        stat("Moves: ", session.moves().to_string()),
        stat("Merges: ", session.merge_count().to_string()),
        stat("Time: ", format_clock(view.elapsed)),
        stat("Seed: ", session.seed().to_string()),
    ];
    let stats_block = Block::default().borders(Borders::ALL).border_style(border_style);
    let stats_inner = stats_block.inner(stats_outer);
    stats_block.render(stats_outer, frame.buffer_mut());
    Paragraph::new(Text::from(stats)).render(stats_inner, frame.buffer_mut());

    let progress_block = Block::default().borders(Borders::ALL).border_style(border_style);
    let progress_inner = progress_block.inner(progress_outer);
    progress_block.render(progress_outer, frame.buffer_mut());
    let [label_area, gauge_area] =
        Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(progress_inner);
    Paragraph::new(Line::from(Span::styled("Progress", title_style)))
        .render(label_area, frame.buffer_mut());
    let total = (n * n).max(2) - 1;
    let joined = (n * n).saturating_sub(session.group_count());
    Gauge::default()
        .ratio((joined as f64 / total as f64).clamp(0.0, 1.0))
        .gauge_style(Style::default().fg(theme.palette_color(0)))
        .render(gauge_area, frame.buffer_mut());

    let key = |k: &'static str, what: &'static str| {
        Line::from(vec![
            Span::styled(k, Style::default().fg(theme.palette_color(3))),
            Span::styled(what, Style::default().fg(theme.inactive_fg)),
        ])
    };
    let help = vec![
        key("Drag   ", "move a group"),
        key("R      ", "restart"),
        key("N      ", "main menu"),
        key("Q/Esc  ", "quit"),
    ];
    let help_block = Block::default().borders(Borders::ALL).border_style(border_style);
    let help_inner = help_block.inner(help_outer);
    help_block.render(help_outer, frame.buffer_mut());
    Paragraph::new(Text::from(help)).render(help_inner, frame.buffer_mut());
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

fn draw_menu(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let menu = view.menu;
    let popup = centered(area, 48, 20);

    let highlight_style = Style::default()
        .fg(Color::Black)
        .bg(theme.palette_color(1))
        .bold();
    let selected_style = Style::default().fg(theme.palette_color(1)).bold();
    let normal_style = Style::default().fg(theme.main_fg);
    let tab_style = |current: bool, selected: bool| {
        if current {
            highlight_style
        } else if selected {
            selected_style
        } else {
            normal_style
        }
    };

    let on_difficulty = menu.current_tab == MenuTab::Difficulty;
    let mut difficulty = Vec::new();
    for n in MenuState::DIFFICULTIES {
        let selected = menu.selected_difficulty == n;
        difficulty.push(Span::styled(
            format!(" {} ", n),
            tab_style(on_difficulty && selected, selected),
        ));
        difficulty.push(Span::from(" "));
    }

    let on_picture = menu.current_tab == MenuTab::Picture;
    let picture = Line::from(vec![
        Span::styled(" ◀ ", Style::default().fg(theme.inactive_fg)),
        Span::styled(
            format!(" {} ", view.picture_label),
            tab_style(on_picture, true),
        ),
        Span::styled(" ▶ ", Style::default().fg(theme.inactive_fg)),
    ]);

    let start = Span::styled(
        " [ START PUZZLE ] ",
        tab_style(menu.current_tab == MenuTab::Start, false),
    );

    let mut lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled(" Jig ", Style::default().fg(theme.palette_color(2)).bold()),
            Span::styled(" tui ", Style::default().fg(theme.main_fg).bold()),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            " ─ PIECES PER SIDE ─ ",
            Style::default().fg(theme.div_line),
        )),
        Line::from(difficulty),
        Line::from(""),
        Line::from(Span::styled(
            " ─ PICTURE ─ ",
            Style::default().fg(theme.div_line),
        )),
        picture,
        Line::from(""),
        Line::from(""),
        Line::from(start),
        Line::from(""),
    ];
    match view.notice {
        Some(notice) => lines.push(Line::from(Span::styled(
            format!(" {} ", notice),
            Style::default().fg(theme.palette_color(2)),
        ))),
        None => lines.push(Line::from("")),
    }
    lines.extend([
        Line::from(""),
        Line::from(vec![
            Span::styled(" ↕ ", Style::default().fg(theme.palette_color(3))),
            Span::from("NAVIGATE   "),
            Span::styled(" ↔ ", Style::default().fg(theme.palette_color(3))),
            Span::from("CHANGE   "),
            Span::styled(" ENTER ", Style::default().fg(theme.palette_color(3))),
            Span::from("START"),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            " [Q] QUIT ",
            Style::default().fg(theme.inactive_fg),
        )),
    ]);

    let p = Paragraph::new(lines).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
    );

    // Slide in from below, ease-out cubic.
    let elapsed = view.now.saturating_duration_since(menu.animation_start).as_millis() as f32;
    let t = (elapsed / 500.0).min(1.0);
    let offset = ((1.0 - t).powi(3) * 10.0) as u16;
    let mut anim_popup = popup;
    anim_popup.y = anim_popup.y.saturating_add(offset);
    anim_popup = anim_popup.intersection(area);
    p.render(anim_popup, frame.buffer_mut());
}

fn draw_complete(frame: &mut Frame, view: &View, session: &PuzzleSession, area: Rect) {
    let theme = view.theme;
    let popup = centered(area, 34, 11);
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            " Puzzle complete! ",
            Style::default().fg(theme.bg).bg(theme.title).bold(),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!(" Moves: {}  Merges: {} ", session.moves(), session.merge_count()),
            Style::default().fg(theme.main_fg),
        )),
        Line::from(Span::styled(
            format!(" Time: {} ", format_clock(view.elapsed)),
            Style::default().fg(theme.main_fg),
        )),
        Line::from(""),
        Line::from(Span::styled(
            " R Restart  N Menu  Q Quit ",
            Style::default().fg(theme.main_fg),
        )),
        Line::from(""),
    ];
    let buf = frame.buffer_mut();
    for y in popup.top()..popup.bottom() {
        for x in popup.left()..popup.right() {
            buf[(x, y)].reset();
        }
    }
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .style(Style::default().bg(theme.bg))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
                .title(Span::styled(" Jigtui ", theme.title)),
        )
        .render(popup, buf);
}

fn draw_quit_menu(frame: &mut Frame, theme: &Theme, selected: QuitOption) {
    let area = frame.area();
    let quit_rect = centered(area, 24, 8);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.title))
        .title(" Quit? ");

    for y in quit_rect.top()..quit_rect.bottom() {
        for x in quit_rect.left()..quit_rect.right() {
            frame.buffer_mut()[(x, y)]
                .set_symbol(" ")
                .set_style(Style::default().bg(theme.bg));
        }
    }

    let inner = block.inner(quit_rect);
    block.render(quit_rect, frame.buffer_mut());

    let options = [
        (QuitOption::Resume, " Resume "),
        (QuitOption::MainMenu, " Main Menu "),
        (QuitOption::Exit, " Exit "),
    ];

    for (i, (opt, label)) in options.iter().enumerate() {
        let style = if *opt == selected {
            Style::default().fg(theme.bg).bg(theme.title).bold()
        } else {
            Style::default().fg(theme.title)
        };
        let rx = inner.x + (inner.width.saturating_sub(label.len() as u16)) / 2;
        let ry = inner.y + 1 + i as u16 * 2;
        if ry < inner.bottom() {
            frame.buffer_mut().set_string(rx, ry, label, style);
        }
    }
}
