use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    ToggleSimulation,
    NextTable,
    PrevTable,
    ScrollUp,
    ScrollDown,
    None,
}

pub fn map_key(key: KeyEvent) -> Action {
    if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c')) {
        return Action::Quit;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('s') => Action::ToggleSimulation,
        KeyCode::Tab => Action::NextTable,
        KeyCode::BackTab => Action::PrevTable,
        KeyCode::Up | KeyCode::Char('k') => Action::ScrollUp,
        KeyCode::Down | KeyCode::Char('j') => Action::ScrollDown,
        _ => Action::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_key() {
        let plain = |code| KeyEvent::new(code, KeyModifiers::NONE);

        assert_eq!(map_key(plain(KeyCode::Char('q'))), Action::Quit);
        assert_eq!(map_key(plain(KeyCode::Esc)), Action::Quit);
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Action::Quit
        );
        assert_eq!(map_key(plain(KeyCode::Char('c'))), Action::None);
        assert_eq!(map_key(plain(KeyCode::Char('s'))), Action::ToggleSimulation);
        assert_eq!(map_key(plain(KeyCode::Tab)), Action::NextTable);
        assert_eq!(map_key(plain(KeyCode::Down)), Action::ScrollDown);
    }
}
