//! Keyboard routing and focus-theft mitigation.
//!
//! Keyboard events arrive from the embedded surface via a before-input
//! hook, filtered to key-down only — key-up after a swap would double-fire
//! navigation on the newly-active View. Three modes decide whether a key
//! is swallowed (forwarded to the host) or passed through to the page.

use iced::keyboard::key::Named;
use iced::keyboard::{self, Key};

/// A key-down, decoupled from `iced::keyboard::Event` so routing logic is
/// plain-data testable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoutedKey {
    Character(String),
    ArrowLeft,
    ArrowRight,
    Escape,
    Other,
}

impl RoutedKey {
    pub fn from_event(event: &keyboard::Event) -> Option<Self> {
        let keyboard::Event::KeyPressed { key, .. } = event else {
            return None;
        };
        Some(match key {
            Key::Named(Named::ArrowLeft) => RoutedKey::ArrowLeft,
            Key::Named(Named::ArrowRight) => RoutedKey::ArrowRight,
            Key::Named(Named::Escape) => RoutedKey::Escape,
            Key::Character(c) => RoutedKey::Character(c.as_str().to_lowercase()),
            _ => RoutedKey::Other,
        })
    }
}

/// Which keys the Normal-mode app-owned set swallows and forwards to the
/// host UI instead of the page.
fn is_app_owned(key: &RoutedKey) -> bool {
    matches!(
        key,
        RoutedKey::ArrowLeft | RoutedKey::ArrowRight | RoutedKey::Escape
    ) || matches!(
        key,
        RoutedKey::Character(c)
            if matches!(c.as_str(), "m" | "w" | "p" | "h" | "+" | "-" | "=" | "_" | "#")
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Only Escape / Ctrl+I are forwarded; everything else passes through
    /// for form typing. Reset on every article change.
    Input,
    /// Certain keys (mute, arrows) pass through to the page regardless of
    /// mode, because the page itself is driving fullscreen video controls.
    VideoFullscreen,
}

/// What to do with a key-down that arrived on some View.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Routing {
    /// Swallow on the originating View; forward to the host UI.
    ForwardToHost,
    /// Let the page handle it.
    PassThrough,
    /// Focus was stolen mid-prefetch: forward this key to the active View
    /// and refocus it instead of letting the background View keep it.
    RedirectToActive,
}

pub fn route_key(mode: InputMode, key: &RoutedKey, is_active_view: bool, ctrl: bool) -> Routing {
    if !is_active_view && matches!(key, RoutedKey::ArrowLeft | RoutedKey::ArrowRight) {
        return Routing::RedirectToActive;
    }
    match mode {
        InputMode::VideoFullscreen => Routing::PassThrough,
        InputMode::Input => {
            if matches!(key, RoutedKey::Escape) || (ctrl && matches!(key, RoutedKey::Character(c) if c == "i"))
            {
                Routing::ForwardToHost
            } else {
                Routing::PassThrough
            }
        }
        InputMode::Normal => {
            if is_app_owned(key) {
                Routing::ForwardToHost
            } else {
                Routing::PassThrough
            }
        }
    }
}

/// Any time a background View fires a navigation-start event while the
/// active View is ready, the active View should be refocused after
/// `delay`. This function only decides *whether* to refocus; the Pool
/// schedules the delayed refocus itself via `iced::Task`.
pub fn should_refocus_on_background_navigation(active_view_is_ready: bool) -> bool {
    active_view_is_ready
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_mode_swallows_app_owned_keys() {
        let r = route_key(
            InputMode::Normal,
            &RoutedKey::Character("m".into()),
            true,
            false,
        );
        assert_eq!(r, Routing::ForwardToHost);
    }

    #[test]
    fn normal_mode_passes_through_other_keys() {
        let r = route_key(
            InputMode::Normal,
            &RoutedKey::Character("a".into()),
            true,
            false,
        );
        assert_eq!(r, Routing::PassThrough);
    }

    #[test]
    fn input_mode_only_forwards_escape_and_ctrl_i() {
        assert_eq!(
            route_key(InputMode::Input, &RoutedKey::Escape, true, false),
            Routing::ForwardToHost
        );
        assert_eq!(
            route_key(
                InputMode::Input,
                &RoutedKey::Character("i".into()),
                true,
                true
            ),
            Routing::ForwardToHost
        );
        assert_eq!(
            route_key(
                InputMode::Input,
                &RoutedKey::Character("x".into()),
                true,
                false
            ),
            Routing::PassThrough
        );
    }

    #[test]
    fn video_fullscreen_always_passes_through() {
        assert_eq!(
            route_key(
                InputMode::VideoFullscreen,
                &RoutedKey::Character("m".into()),
                true,
                false
            ),
            Routing::PassThrough
        );
    }

    #[test]
    fn arrow_key_on_background_view_redirects_to_active() {
        let r = route_key(InputMode::Normal, &RoutedKey::ArrowRight, false, false);
        assert_eq!(r, Routing::RedirectToActive);
    }
}
