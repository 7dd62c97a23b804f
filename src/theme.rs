//! Light/dark theming for the terminal surface

use crate::prefs::PreferenceStore;
use serde::{Deserialize, Serialize};

/// Preference key holding "true" or "false"
pub const DARK_MODE_KEY: &str = "darkMode";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

/// ANSI escape sequences for one theme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub text: &'static str,
    pub card: &'static str,
    pub label: &'static str,
    pub banner: &'static str,
    pub reset: &'static str,
}

const RESET: &str = "\x1b[0m";

const DARK: Palette = Palette {
    text: "\x1b[1;97m",
    card: "\x1b[48;5;236m",
    label: "\x1b[38;5;246m",
    banner: "\x1b[1;97;42m",
    reset: RESET,
};

const LIGHT: Palette = Palette {
    text: "\x1b[1;30m",
    card: "\x1b[48;5;255m",
    label: "\x1b[38;5;244m",
    banner: "\x1b[1;97;42m",
    reset: RESET,
};

impl Theme {
    /// Theme at startup: the stored preference, else dark between 18:00 and 06:00
    pub fn initial(store: &dyn PreferenceStore, hour: i8) -> Self {
        match store.get(DARK_MODE_KEY) {
            Some(value) if !value.is_empty() => Self::from_dark(value == "true"),
            _ => Self::from_dark(!(6..18).contains(&hour)),
        }
    }

    /// Flip the theme and persist the choice
    pub fn toggle(self, store: &mut dyn PreferenceStore) -> Self {
        let next = Self::from_dark(!self.is_dark());
        if let Err(e) = store.set(DARK_MODE_KEY, &next.is_dark().to_string()) {
            log::warn!("Failed to save theme preference: {:#}", e);
        }
        next
    }

    pub fn is_dark(self) -> bool {
        self == Theme::Dark
    }

    pub fn palette(self) -> &'static Palette {
        match self {
            Theme::Light => &LIGHT,
            Theme::Dark => &DARK,
        }
    }

    /// Label of the control that switches to the other theme
    pub fn toggle_label(self) -> &'static str {
        match self {
            Theme::Light => "Dark Mode",
            Theme::Dark => "Light Mode",
        }
    }

    fn from_dark(dark: bool) -> Self {
        if dark { Theme::Dark } else { Theme::Light }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::MemoryPreferenceStore;

    #[test]
    fn test_initial_follows_hour_without_preference() {
        let store = MemoryPreferenceStore::default();
        assert_eq!(Theme::initial(&store, 5), Theme::Dark);
        assert_eq!(Theme::initial(&store, 6), Theme::Light);
        assert_eq!(Theme::initial(&store, 17), Theme::Light);
        assert_eq!(Theme::initial(&store, 18), Theme::Dark);
    }

    #[test]
    fn test_stored_preference_wins() {
        let mut store = MemoryPreferenceStore::default();
        store.set(DARK_MODE_KEY, "false").unwrap();
        assert_eq!(Theme::initial(&store, 23), Theme::Light);

        store.set(DARK_MODE_KEY, "true").unwrap();
        assert_eq!(Theme::initial(&store, 12), Theme::Dark);

        store.set(DARK_MODE_KEY, "").unwrap();
        assert_eq!(Theme::initial(&store, 12), Theme::Light);
    }

    #[test]
    fn test_toggle_writes_once() {
        let mut store = MemoryPreferenceStore::default();
        let theme = Theme::Light.toggle(&mut store);
        assert_eq!(theme, Theme::Dark);
        assert_eq!(store.get(DARK_MODE_KEY).as_deref(), Some("true"));

        let theme = theme.toggle(&mut store);
        assert_eq!(theme, Theme::Light);
        assert_eq!(store.get(DARK_MODE_KEY).as_deref(), Some("false"));
        assert_eq!(theme.toggle_label(), "Dark Mode");
    }
}
