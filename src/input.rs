//! Key bindings (normal and vim-style) and the mouse drag tracker.

use crate::grid::GroupId;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Action from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
    Confirm,
    Restart,
    Menu,
    Quit,
    None,
}

/// Map key event to action. Supports both normal (arrows, Enter) and vim (hjkl, Space).
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent { code, modifiers, .. } = key;
    if modifiers == KeyModifiers::CONTROL && code == KeyCode::Char('c') {
        return Action::Quit;
    }
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod {
        return Action::None;
    }
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('r') | KeyCode::Char('R') => Action::Restart,
        KeyCode::Char('n') | KeyCode::Char('N') => Action::Menu,
        KeyCode::Up | KeyCode::Char('k') => Action::Up,
        KeyCode::Down | KeyCode::Char('j') => Action::Down,
        KeyCode::Left | KeyCode::Char('h') => Action::Left,
        KeyCode::Right | KeyCode::Char('l') => Action::Right,
        KeyCode::Enter | KeyCode::Char(' ') => Action::Confirm,
        _ => Action::None,
    }
}

/// A group held by the mouse. `origin` is where its top-left is drawn right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drag {
    pub group: GroupId,
    pub origin: (i32, i32),
    /// Pointer position relative to the group's top-left when grabbed.
    grab: (i32, i32),
}

/// Turns press / move / release pointer events (in surface pixels) into one
/// release per gesture.
#[derive(Debug, Default)]
pub struct DragTracker {
    active: Option<Drag>,
}

impl DragTracker {
    pub fn begin(&mut self, group: GroupId, origin: (i32, i32), pointer: (i32, i32)) {
        self.active = Some(Drag {
            group,
            origin,
            grab: (pointer.0 - origin.0, pointer.1 - origin.1),
        });
    }

    /// Follow the pointer, keeping the grab point under it.
    pub fn update(&mut self, pointer: (i32, i32)) {
        if let Some(drag) = self.active.as_mut() {
            drag.origin = (pointer.0 - drag.grab.0, pointer.1 - drag.grab.1);
        }
    }

    /// End the gesture: the group and the top-left origin it was dropped at.
    pub fn finish(&mut self, pointer: (i32, i32)) -> Option<(GroupId, i32, i32)> {
        self.update(pointer);
        self.active
            .take()
            .map(|drag| (drag.group, drag.origin.0, drag.origin.1))
    }

    pub fn cancel(&mut self) {
        self.active = None;
    }

    pub fn active(&self) -> Option<&Drag> {
        self.active.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventKind;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        let mut event = KeyEvent::new(code, modifiers);
        event.kind = KeyEventKind::Press;
        event
    }

    #[test]
    fn test_normal_and_vim_bindings_agree() {
        let none = KeyModifiers::NONE;
        assert_eq!(key_to_action(key(KeyCode::Up, none)), Action::Up);
        assert_eq!(key_to_action(key(KeyCode::Char('k'), none)), Action::Up);
        assert_eq!(key_to_action(key(KeyCode::Left, none)), Action::Left);
        assert_eq!(key_to_action(key(KeyCode::Char('h'), none)), Action::Left);
        assert_eq!(key_to_action(key(KeyCode::Enter, none)), Action::Confirm);
        assert_eq!(key_to_action(key(KeyCode::Char(' '), none)), Action::Confirm);
        assert_eq!(key_to_action(key(KeyCode::Esc, none)), Action::Quit);
        assert_eq!(key_to_action(key(KeyCode::Char('r'), none)), Action::Restart);
        assert_eq!(key_to_action(key(KeyCode::Char('n'), none)), Action::Menu);
    }

    #[test]
    fn test_modifiers() {
        assert_eq!(
            key_to_action(key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Action::Quit
        );
        assert_eq!(
            key_to_action(key(KeyCode::Char('r'), KeyModifiers::ALT)),
            Action::None
        );
        assert_eq!(
            key_to_action(key(KeyCode::Char('R'), KeyModifiers::SHIFT)),
            Action::Restart
        );
    }

    #[test]
    fn test_drag_keeps_grab_offset() {
        let mut tracker = DragTracker::default();
        tracker.begin(7, (100, 50), (104, 53));
        tracker.update((120, 60));
        assert_eq!(tracker.active().map(|d| d.origin), Some((116, 57)));
        assert_eq!(tracker.finish((130, 61)), Some((7, 126, 58)));
        assert!(tracker.active().is_none());
    }

    #[test]
    fn test_one_release_per_gesture() {
        let mut tracker = DragTracker::default();
        assert_eq!(tracker.finish((1, 1)), None);
        tracker.begin(2, (0, 0), (0, 0));
        assert_eq!(tracker.finish((3, 4)), Some((2, 3, 4)));
        assert_eq!(tracker.finish((3, 4)), None);
        tracker.begin(2, (0, 0), (0, 0));
        tracker.cancel();
        assert_eq!(tracker.finish((9, 9)), None);
    }
}
