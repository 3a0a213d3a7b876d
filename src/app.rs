//! App: terminal init, main loop, mouse drags and key handling.

use crate::GameConfig;
use crate::grid::GroupId;
use crate::input::{Action, DragTracker, key_to_action};
use crate::merge::MergeResult;
use crate::picture::{Picture, Tile, fit_board};
use crate::session::{PuzzleSession, SCATTER_MARGIN, SessionConfig};
use crate::theme::Theme;
use crate::ui::{self, Effects, View};
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ratatui::DefaultTerminal;
use ratatui::layout::Rect;
use std::time::{Duration, Instant};

/// Pause between the last merge and the completion announcement.
const COMPLETE_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Menu,
    Playing,
    Complete,
    QuitMenu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitOption {
    Resume,
    MainMenu,
    Exit,
}

impl QuitOption {
    fn next(self) -> Self {
        match self {
            Self::Resume => Self::MainMenu,
            Self::MainMenu => Self::Exit,
            Self::Exit => Self::Resume,
        }
    }

    fn prev(self) -> Self {
        match self {
            Self::Resume => Self::Exit,
            Self::MainMenu => Self::Resume,
            Self::Exit => Self::MainMenu,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuTab {
    Difficulty,
    Picture,
    Start,
}

impl MenuTab {
    fn next(self) -> Self {
        match self {
            Self::Difficulty => Self::Picture,
            Self::Picture => Self::Start,
            Self::Start => Self::Difficulty,
        }
    }

    fn prev(self) -> Self {
        match self {
            Self::Difficulty => Self::Start,
            Self::Picture => Self::Difficulty,
            Self::Start => Self::Picture,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuState {
    pub current_tab: MenuTab,
    pub selected_difficulty: usize,
    pub selected_picture: usize,
    pub animation_start: Instant,
}

impl MenuState {
    pub const DIFFICULTIES: [usize; 7] = [2, 3, 4, 5, 6, 7, 8];

    fn new(difficulty: usize) -> Self {
        Self {
            current_tab: MenuTab::Difficulty,
            selected_difficulty: difficulty,
            selected_picture: 0,
            animation_start: Instant::now(),
        }
    }

    /// Step the value under the cursor left (-1) or right (+1).
    fn change(&mut self, step: isize, pictures: usize) {
        match self.current_tab {
            MenuTab::Difficulty => {
                let list = Self::DIFFICULTIES;
                let i = list
                    .iter()
                    .position(|&n| n == self.selected_difficulty)
                    .unwrap_or(0);
                self.selected_difficulty = list[wrap(i, step, list.len())];
            }
            MenuTab::Picture => {
                self.selected_picture = wrap(self.selected_picture, step, pictures);
            }
            MenuTab::Start => {}
        }
    }
}

fn wrap(i: usize, step: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (i as isize + step).rem_euclid(len as isize) as usize
}

pub struct App {
    config: GameConfig,
    theme: Theme,
    /// Loaded file first (if any), then the built-in patterns.
    pictures: Vec<Picture>,
    session: Option<PuzzleSession>,
    tiles: Vec<Tile>,
    drag: DragTracker,
    effects: Effects,
    screen: Screen,
    menu_state: MenuState,
    quit_selected: QuitOption,
    game_start: Instant,
    /// Set when the last merge lands; the Complete screen follows after a short delay.
    completed_at: Option<Instant>,
    finish_time: Option<Duration>,
    seeds: StdRng,
    area: Rect,
    notice: Option<String>,
}

impl App {
    pub fn new(config: GameConfig, theme: Theme, pictures: Vec<Picture>) -> Result<Self> {
        anyhow::ensure!(!pictures.is_empty(), "no picture to play with");
        let seeds = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::seed_from_u64(rand::rng().random()),
        };
        let now = Instant::now();
        Ok(Self {
            menu_state: MenuState::new(config.difficulty),
            screen: if config.no_menu {
                Screen::Playing
            } else {
                Screen::Menu
            },
            config,
            theme,
            pictures,
            session: None,
            tiles: Vec::new(),
            drag: DragTracker::default(),
            effects: Effects::default(),
            quit_selected: QuitOption::Resume,
            game_start: now,
            completed_at: None,
            finish_time: None,
            seeds,
            area: Rect::default(),
            notice: None,
        })
    }

    fn picture(&self) -> &Picture {
        let i = self.menu_state.selected_picture.min(self.pictures.len() - 1);
        &self.pictures[i]
    }

    /// Fit the selected picture to the current terminal and scatter a fresh game.
    fn start_game(&mut self) {
        let surface = ui::surface_rect(self.area);
        let (sw, sh) = ui::surface_pixels(surface);
        let n = self.menu_state.selected_difficulty;
        let fit = fit_board(sw, sh, n, self.picture().aspect());
        let config = SessionConfig {
            difficulty: n,
            piece_width: fit.piece_width,
            piece_height: fit.piece_height,
            board_x: fit.board_x,
            board_y: fit.board_y,
            surface_width: sw,
            surface_height: sh,
            margin: SCATTER_MARGIN.min(sw.min(sh) / 10),
            snap_home: self.config.snap_home,
        };
        let seed = self.seeds.random();
        match PuzzleSession::new(config, seed) {
            Ok(session) => {
                crate::log!("picture: {}", self.picture().label());
                self.tiles = self.picture().slice(n, fit.piece_width, fit.piece_height);
                self.session = Some(session);
                self.screen = Screen::Playing;
                self.notice = None;
            }
            Err(e) => {
                crate::log!("cannot start {}x{} game: {}", n, n, e);
                self.session = None;
                self.screen = Screen::Menu;
                self.notice = Some("Terminal too small for this puzzle".to_string());
            }
        }
        self.drag.cancel();
        self.effects.clear();
        self.game_start = Instant::now();
        self.completed_at = None;
        self.finish_time = None;
    }

    fn open_menu(&mut self) {
        self.screen = Screen::Menu;
        self.drag.cancel();
        self.menu_state.animation_start = Instant::now();
    }

    fn elapsed(&self) -> Duration {
        self.finish_time.unwrap_or_else(|| self.game_start.elapsed())
    }

    fn on_release_result(&mut self, group: GroupId, result: &MergeResult) {
        if result.merged && !self.config.no_animation {
            self.effects.flash_group(group);
        }
        if result.complete && self.completed_at.is_none() {
            let elapsed = self.game_start.elapsed();
            self.completed_at = Some(Instant::now());
            self.finish_time = Some(elapsed);
            if let Some(session) = &self.session {
                crate::log!(
                    "completed in {} moves, {:.1}s",
                    session.moves(),
                    elapsed.as_secs_f64()
                );
            }
            if !self.config.no_animation {
                self.effects.celebrate();
            }
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.screen != Screen::Playing {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.is_complete() {
            return;
        }
        let surface = ui::surface_rect(self.area);
        let pointer = ui::pointer_to_surface(mouse.column, mouse.row, surface);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(group) = session.group_at(pointer.0, pointer.1) {
                    session.bring_to_front(group);
                    if let Some(origin) = session.group_origin(group) {
                        self.drag.begin(group, origin, pointer);
                    }
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => self.drag.update(pointer),
            MouseEventKind::Up(MouseButton::Left) => {
                let Some((group, x, y)) = self.drag.finish(pointer) else {
                    return;
                };
                match session.release(group, x, y) {
                    Ok(result) => self.on_release_result(group, &result),
                    Err(e) => crate::log!("release ignored: {}", e),
                }
            }
            _ => {}
        }
    }

    /// Returns false when the app should exit.
    fn handle_action(&mut self, action: Action) -> bool {
        match self.screen {
            Screen::Menu => match action {
                Action::Quit => return false,
                Action::Up => self.menu_state.current_tab = self.menu_state.current_tab.prev(),
                Action::Down => self.menu_state.current_tab = self.menu_state.current_tab.next(),
                Action::Left => self.menu_state.change(-1, self.pictures.len()),
                Action::Right => self.menu_state.change(1, self.pictures.len()),
                Action::Confirm => {
                    if self.menu_state.current_tab == MenuTab::Start {
                        self.start_game();
                    } else {
                        self.menu_state.current_tab = MenuTab::Start;
                    }
                }
                _ => {}
            },
            Screen::Playing => match action {
                Action::Quit => {
                    self.drag.cancel();
                    self.screen = Screen::QuitMenu;
                    self.quit_selected = QuitOption::Resume;
                }
                Action::Restart => self.start_game(),
                Action::Menu => self.open_menu(),
                _ => {}
            },
            Screen::QuitMenu => match action {
                Action::Down | Action::Right => self.quit_selected = self.quit_selected.next(),
                Action::Up | Action::Left => self.quit_selected = self.quit_selected.prev(),
                Action::Confirm => match self.quit_selected {
                    QuitOption::Resume => self.screen = Screen::Playing,
                    QuitOption::MainMenu => self.open_menu(),
                    QuitOption::Exit => return false,
                },
                Action::Quit => self.screen = Screen::Playing,
                _ => {}
            },
            Screen::Complete => match action {
                Action::Quit => return false,
                Action::Restart => self.start_game(),
                Action::Menu | Action::Confirm => self.open_menu(),
                _ => {}
            },
        }
        true
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{DisableMouseCapture, EnableMouseCapture},
            execute,
            terminal::{
                EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode, size,
            },
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let (cols, rows) = size()?;
        self.area = Rect::new(0, 0, cols, rows);
        if self.screen == Screen::Playing {
            self.start_game();
        }

        let result = self.run_loop(&mut terminal);

        execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.config.frame_rate.max(1.0));
        loop {
            let now = Instant::now();

            if self.screen == Screen::Playing
                && self
                    .completed_at
                    .is_some_and(|t| t.elapsed() >= Duration::from_millis(COMPLETE_DELAY_MS))
            {
                self.screen = Screen::Complete;
            }

            let label = self.picture().label().to_string();
            let elapsed = self.elapsed();
            terminal.draw(|f| {
                self.area = f.area();
                let view = View {
                    screen: self.screen,
                    theme: &self.theme,
                    session: self.session.as_ref(),
                    tiles: &self.tiles,
                    drag: self.drag.active(),
                    menu: &self.menu_state,
                    picture_label: &label,
                    elapsed,
                    quit_selected: self.quit_selected,
                    notice: self.notice.as_deref(),
                    now,
                };
                ui::draw(f, &view, &mut self.effects);
            })?;

            let timeout = frame_duration.saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    match event::read()? {
                        Event::Key(key) if key.kind == KeyEventKind::Press => {
                            if !self.handle_action(key_to_action(key)) {
                                return Ok(());
                            }
                        }
                        Event::Mouse(mouse) => self.handle_mouse(mouse),
                        Event::Resize(cols, rows) => self.area = Rect::new(0, 0, cols, rows),
                        _ => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pattern;
    use crossterm::event::KeyModifiers;

    fn app() -> App {
        let config = GameConfig {
            difficulty: 3,
            seed: Some(11),
            snap_home: false,
            no_menu: false,
            no_animation: false,
            frame_rate: 30.0,
        };
        let theme = Theme::default();
        let pictures = vec![
            Picture::builtin(Pattern::Sunset, &theme),
            Picture::builtin(Pattern::Rings, &theme),
        ];
        let mut app = App::new(config, theme, pictures).unwrap();
        app.area = Rect::new(0, 0, 120, 40);
        app
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn test_menu_navigation_wraps() {
        let mut app = app();
        assert!(app.handle_action(Action::Left));
        assert_eq!(app.menu_state.selected_difficulty, 2);
        app.handle_action(Action::Left);
        assert_eq!(app.menu_state.selected_difficulty, 8);
        app.handle_action(Action::Down);
        app.handle_action(Action::Right);
        app.handle_action(Action::Right);
        assert_eq!(app.menu_state.selected_picture, 0);
        app.handle_action(Action::Up);
        app.handle_action(Action::Up);
        assert_eq!(app.menu_state.current_tab, MenuTab::Start);
    }

    #[test]
    fn test_start_fits_board_inside_surface() {
        let mut app = app();
        app.handle_action(Action::Confirm);
        app.handle_action(Action::Confirm);
        assert_eq!(app.screen, Screen::Playing);
        let session = app.session.as_ref().unwrap();
        assert_eq!(app.tiles.len(), 9);
        let (sw, sh) = ui::surface_pixels(ui::surface_rect(app.area));
        let (bx, by, bw, bh) = session.board_rect();
        assert!(bx >= 0 && by >= 0 && bx + bw <= sw && by + bh <= sh);
    }

    #[test]
    fn test_tiny_terminal_returns_to_menu_with_notice() {
        let mut app = app();
        app.area = Rect::new(0, 0, SIDEBAR_PLUS_BORDER, 3);
        app.menu_state.selected_difficulty = 8;
        app.start_game();
        assert_eq!(app.screen, Screen::Menu);
        assert!(app.session.is_none());
        assert!(app.notice.is_some());
    }

    const SIDEBAR_PLUS_BORDER: u16 = ui::SIDEBAR_WIDTH + 4;

    #[test]
    fn test_quit_menu_flow() {
        let mut app = app();
        app.start_game();
        app.handle_action(Action::Quit);
        assert_eq!(app.screen, Screen::QuitMenu);
        app.handle_action(Action::Down);
        assert_eq!(app.quit_selected, QuitOption::MainMenu);
        app.handle_action(Action::Confirm);
        assert_eq!(app.screen, Screen::Menu);
        app.handle_action(Action::Confirm);
        app.handle_action(Action::Confirm);
        app.handle_action(Action::Quit);
        app.handle_action(Action::Up);
        assert_eq!(app.quit_selected, QuitOption::Exit);
        assert!(!app.handle_action(Action::Confirm));
    }

    #[test]
    fn test_mouse_drag_releases_group_once() {
        let mut app = app();
        app.start_game();
        let surface = ui::surface_rect(app.area);
        let session = app.session.as_ref().unwrap();
        let top = *session.z_order().last().unwrap();
        let (ox, oy) = session.group_origin(top).unwrap();
        let col = surface.x + ox as u16;
        let row = surface.y + (oy as u16).div_ceil(2);

        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), col, row));
        assert_eq!(app.drag.active().map(|d| d.group), Some(top));
        app.handle_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), col + 1, row));
        app.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), col + 1, row));
        assert!(app.drag.active().is_none());
        let session = app.session.as_ref().unwrap();
        assert_eq!(session.moves(), 1);
        assert_eq!(session.z_order().last().copied(), Some(top));
    }

    #[test]
    fn test_restart_rescatters_with_next_seed() {
        let mut app = app();
        app.start_game();
        let first = app.session.as_ref().unwrap().seed();
        app.handle_action(Action::Restart);
        let second = app.session.as_ref().unwrap().seed();
        assert_ne!(first, second);
        assert_eq!(app.session.as_ref().unwrap().moves(), 0);
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap(0, -1, 7), 6);
        assert_eq!(wrap(6, 1, 7), 0);
        assert_eq!(wrap(3, 1, 0), 0);
    }
}
