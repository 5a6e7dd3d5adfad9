//! Key bindings for the main view
//!
//! [`BINDINGS`] drives both event dispatch and the help popup.

use crossterm::event::KeyCode;

/// What a key press does outside of username input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    NextTab,
    PrevTab,
    /// 1-based tab number
    JumpTab(u8),
    PrevYear,
    NextYear,
    /// (weeks, days) to move the day cursor by
    MoveCursor(i32, i32),
    Refresh,
    EditUser,
    ToggleHelp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Navigation,
    General,
}

impl Section {
    pub fn title(self) -> &'static str {
        match self {
            Self::Navigation => "Navigation",
            Self::General => "General",
        }
    }
}

/// One help row and the keys behind it
#[derive(Debug)]
pub struct Binding {
    pub section: Section,
    pub label: &'static str,
    pub description: &'static str,
    pub keys: &'static [(KeyCode, Action)],
}

pub const BINDINGS: &[Binding] = &[
    Binding {
        section: Section::Navigation,
        label: "Tab / Shift+Tab",
        description: "Switch view",
        keys: &[
            (KeyCode::Tab, Action::NextTab),
            (KeyCode::BackTab, Action::PrevTab),
        ],
    },
    Binding {
        section: Section::Navigation,
        label: "1-2",
        description: "Jump to view",
        keys: &[
            (KeyCode::Char('1'), Action::JumpTab(1)),
            (KeyCode::Char('2'), Action::JumpTab(2)),
        ],
    },
    Binding {
        section: Section::Navigation,
        label: "Left / Right",
        description: "Previous/next year",
        keys: &[
            (KeyCode::Left, Action::PrevYear),
            (KeyCode::Right, Action::NextYear),
        ],
    },
    Binding {
        section: Section::Navigation,
        label: "h / j / k / l",
        description: "Move day cursor",
        keys: &[
            (KeyCode::Char('h'), Action::MoveCursor(-1, 0)),
            (KeyCode::Char('j'), Action::MoveCursor(0, 1)),
            (KeyCode::Char('k'), Action::MoveCursor(0, -1)),
            (KeyCode::Char('l'), Action::MoveCursor(1, 0)),
        ],
    },
    Binding {
        section: Section::Navigation,
        label: "r",
        description: "Refresh from network",
        keys: &[
            (KeyCode::Char('r'), Action::Refresh),
            (KeyCode::Char('R'), Action::Refresh),
        ],
    },
    Binding {
        section: Section::Navigation,
        label: "/",
        description: "Change user",
        keys: &[(KeyCode::Char('/'), Action::EditUser)],
    },
    Binding {
        section: Section::General,
        label: "q / Esc",
        description: "Quit",
        keys: &[
            (KeyCode::Char('q'), Action::Quit),
            (KeyCode::Char('Q'), Action::Quit),
            (KeyCode::Esc, Action::Quit),
        ],
    },
    Binding {
        section: Section::General,
        label: "?",
        description: "Toggle help",
        keys: &[(KeyCode::Char('?'), Action::ToggleHelp)],
    },
];

pub fn action_for(code: KeyCode) -> Option<Action> {
    BINDINGS
        .iter()
        .flat_map(|b| b.keys.iter())
        .find(|(key, _)| *key == code)
        .map(|(_, action)| *action)
}

/// Bindings grouped by section, in table order
pub fn sections() -> Vec<(Section, Vec<&'static Binding>)> {
    let mut grouped: Vec<(Section, Vec<&'static Binding>)> = Vec::new();
    for binding in BINDINGS {
        match grouped.iter_mut().find(|(s, _)| *s == binding.section) {
            Some((_, rows)) => rows.push(binding),
            None => grouped.push((binding.section, vec![binding])),
        }
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_action_lookup() {
        assert_eq!(action_for(KeyCode::Esc), Some(Action::Quit));
        assert_eq!(action_for(KeyCode::Char('2')), Some(Action::JumpTab(2)));
        assert_eq!(action_for(KeyCode::Char('k')), Some(Action::MoveCursor(0, -1)));
        assert_eq!(action_for(KeyCode::Char('x')), None);
        assert_eq!(action_for(KeyCode::Enter), None);
    }

    #[test]
    fn test_keys_are_unique() {
        let mut seen = HashSet::new();
        for (key, _) in BINDINGS.iter().flat_map(|b| b.keys.iter()) {
            assert!(seen.insert(*key), "{:?} bound twice", key);
        }
    }

    #[test]
    fn test_sections_keep_table_order() {
        let sections = sections();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].0, Section::Navigation);
        assert_eq!(sections[0].1.len(), 6);
        assert_eq!(sections[1].1[0].label, "q / Esc");
        let rows: usize = sections.iter().map(|(_, rows)| rows.len()).sum();
        assert_eq!(rows, BINDINGS.len());
    }
}
