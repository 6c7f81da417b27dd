//! The `Surface` trait: the per-View abstraction over an embedded
//! rendering engine.
//!
//! This is deliberately single-view-per-instance, in contrast to the
//! multi-view-per-engine shape of [`crate::engines::Engine`] (which this
//! crate keeps around as the concrete rasterizer underneath
//! [`litehtml::LitehtmlSurface`]). One `Surface` maps onto one [`View`],
//! which keeps placement/zoom/focus logic free of view-id bookkeeping.

use iced::keyboard;
use iced::mouse;
use iced::Point;
use iced::Size;

use crate::engines::PageType;
use crate::ImageInfo;

/// The CPU-rasterizer backend (default; no exotic native deps).
#[cfg(feature = "litehtml")]
pub mod litehtml;

/// Deterministic, synchronously-resolving test double. Every unit test in
/// this crate exercises pool/scheduler/placement/focus logic against this
/// rather than a real rendering engine.
pub mod fake;

/// Screen-space placement of a View, in logical pixels.
///
/// Off-screen Views keep their real `width`/`height` and move only `x`/`y`
/// to a large negative coordinate (see [`crate::placement`]) so renderer
/// state such as scroll position and video playback survives the move.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn size(&self) -> Size<u32> {
        Size::new(self.width.max(1.0) as u32, self.height.max(1.0) as u32)
    }
}

/// Outcome of a [`View::load`](crate::view::View::load) call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// dom-ready fired, or the load timed out and partial content is
    /// acceptable — both are treated as success per the spec.
    Ready,
    /// The navigation was aborted (user navigated away mid-load). Silent,
    /// never surfaced as an error.
    Aborted,
}

/// A single headless browsing surface.
///
/// Implementations are not required to be `Send` across an await point —
/// the pool runs on a single-threaded cooperative loop (see
/// `SCHEDULING MODEL` in the crate's design notes) — but `Send` is kept so
/// the pool can be driven from a `tokio` current-thread or multi-thread
/// runtime interchangeably.
pub trait Surface: Send {
    /// Navigate to a URL or inline HTML document.
    fn goto(&mut self, page: PageType);
    /// Stop any in-flight navigation. Maps to ABORTED, which is silent.
    fn stop(&mut self);
    /// Drive pending engine work (layout, pending image loads, ...).
    fn update(&mut self);
    /// Re-rasterize at the given size.
    fn render(&mut self, size: Size<u32>);
    /// Resize the surface (also called for off-screen Views so they are
    /// correctly sized before reappearing).
    fn resize(&mut self, size: Size<u32>);
    /// Whether this surface can fetch and render URLs natively, or relies
    /// on the caller to fetch HTML and call `goto(PageType::Html(..))`.
    fn handles_urls(&self) -> bool {
        true
    }

    fn handle_keyboard_event(&mut self, event: keyboard::Event);
    fn handle_mouse_event(&mut self, point: Point, event: mouse::Event);
    fn scroll(&mut self, delta: mouse::ScrollDelta);

    /// Discard any cached document state and re-fetch/re-render the
    /// current URL. Default no-op for engines without a notion of reload.
    fn reload(&mut self) {}
    /// Step back in this surface's own navigation history, if it keeps one.
    fn go_back(&mut self) {}
    /// Step forward in this surface's own navigation history, if it keeps one.
    fn go_forward(&mut self) {}
    /// Whether `go_back`/`go_forward` would currently do anything.
    fn can_go_back(&self) -> bool {
        false
    }
    fn can_go_forward(&self) -> bool {
        false
    }

    fn get_url(&self) -> String;
    fn get_title(&self) -> String;
    fn get_view(&self) -> &ImageInfo;

    /// Take the last anchor click URL, if any (same-page vs. navigate
    /// resolution happens above this trait).
    fn take_anchor_click(&mut self) -> Option<String> {
        None
    }

    fn focus(&mut self) {}
    fn unfocus(&mut self) {}

    /// CSS zoom as a multiplicative factor (already clamped by the caller).
    fn set_css_zoom(&mut self, _factor: f32) {}
    /// Device-emulation based zoom, used in visual-zoom mode.
    fn set_visual_zoom(&mut self, _factor: f32, _enabled: bool) {}
    fn set_mobile_mode(&mut self, _on: bool) {}

    /// Mute/pause (becoming inactive) or unmute/resume (becoming active)
    /// any playing media.
    fn set_media_muted(&mut self, _muted: bool) {}
}
