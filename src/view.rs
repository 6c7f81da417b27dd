//! A single browsing surface and its state machine.
//!
//! `empty → loading → ready → loading (navigate again) → ready`, with
//! `loading → error` on a non-ABORTED main-frame failure. `hasLoadedOnce`
//! latches on first `ready` and is what the Pool consults for cache-hit
//! decisions, not raw `ready` (an ad-refresh can bounce a ready View back
//! through `loading` without losing cache-hit eligibility).

use std::time::{Duration, Instant};

use iced::Size;

use crate::engines::PageType;
use crate::error::ViewError;
use crate::surface::{Bounds, LoadOutcome, Surface};

/// Stable identity for a View within its Pool. Not to be confused with
/// [`crate::engines::ViewId`], which identifies a view inside an `Engine`.
pub type ViewHandle = usize;

/// Current lifecycle status of a View.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewStatus {
    Empty,
    Loading,
    Ready,
    Error,
}

/// Per-load display settings, carried across recycles only via `load()`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadSettings {
    pub zoom_factor: f32,
    pub visual_zoom: bool,
    pub mobile_mode: bool,
    pub show_zoom_overlay: bool,
}

impl LoadSettings {
    pub fn with_zoom(zoom_factor: f32) -> Self {
        Self {
            zoom_factor,
            ..Default::default()
        }
    }
}

/// One entry in the Pool: an article binding, a loaded-with configuration,
/// and a placement state, wrapping a single [`Surface`].
pub struct View {
    pub handle: ViewHandle,
    surface: Box<dyn Surface>,

    pub article_id: Option<String>,
    pub feed_id: Option<String>,
    /// Which content source (e.g. a specific feed's upstream provider)
    /// this load came from. Carried through `navigate` for callers that
    /// group by source; the Pool itself makes no scheduling decisions
    /// based on it.
    pub source_id: Option<String>,
    /// Position in the current list; -1 once invalidated by a list
    /// reshuffle that didn't also re-navigate this View.
    pub article_index: i64,
    pub url: Option<String>,

    pub status: ViewStatus,
    pub has_loaded_once: bool,
    pub load_error: Option<String>,
    pub load_start_time: Option<Instant>,

    pub settings: LoadSettings,
    /// Raw-webpage load vs. extracted-article load; a full-content View is
    /// never substituted for a raw-webpage request for the same article.
    pub full_content: bool,

    pub is_active: bool,
    pub is_at_render_position: bool,
    pub is_off_screen: bool,
    pub last_bounds: Option<Bounds>,

    pub last_used_at: Instant,
}

impl View {
    pub fn new(handle: ViewHandle, surface: Box<dyn Surface>) -> Self {
        let now = Instant::now();
        Self {
            handle,
            surface,
            article_id: None,
            feed_id: None,
            source_id: None,
            article_index: -1,
            url: None,
            status: ViewStatus::Empty,
            has_loaded_once: false,
            load_error: None,
            load_start_time: None,
            settings: LoadSettings::default(),
            full_content: false,
            is_active: false,
            is_at_render_position: false,
            is_off_screen: true,
            last_bounds: None,
            last_used_at: now,
        }
    }

    pub fn surface_mut(&mut self) -> &mut dyn Surface {
        self.surface.as_mut()
    }

    pub fn surface(&self) -> &dyn Surface {
        self.surface.as_ref()
    }

    /// Release the surface's content and drop to `empty`, keeping identity.
    pub fn destroy(&mut self) {
        self.surface.stop();
        self.status = ViewStatus::Empty;
        tracing::debug!(handle = self.handle, "view destroyed");
    }

    /// `destroy` + clear article binding + reset loaded-with settings,
    /// preserving identity and `last_used_at` (it's about to be reused,
    /// not aged out).
    pub fn recycle(&mut self) {
        self.destroy();
        self.article_id = None;
        self.feed_id = None;
        self.source_id = None;
        self.article_index = -1;
        self.url = None;
        self.has_loaded_once = false;
        self.load_error = None;
        self.settings = LoadSettings::default();
        self.full_content = false;
        tracing::debug!(handle = self.handle, "view recycled");
    }

    /// Whether recycling this View now would destroy anything currently
    /// protected. Recyclability rules live in the Pool (they need
    /// cross-View context); this only reports the View's own state.
    pub fn is_stale_loading(&self, stale_after: Duration) -> bool {
        matches!(self.status, ViewStatus::Loading)
            && self
                .load_start_time
                .is_some_and(|t| t.elapsed() > stale_after)
    }

    /// Begin a navigation. Resolves on the first of: dom-ready (modeled
    /// here as "the fetch + synchronous rasterize completed"), a timeout
    /// (resolved as `Ready` — partial content is acceptable), or a
    /// non-ABORTED main-frame failure (`Err`).
    ///
    /// `load` is `&mut self` across an `.await`; callers must not hold two
    /// concurrent loads against the same View — the Pool enforces this by
    /// construction (one load in flight per View at a time).
    pub async fn load(
        &mut self,
        url: String,
        article_id: String,
        feed_id: Option<String>,
        source_id: Option<String>,
        settings: LoadSettings,
        article_index: i64,
        timeout: Duration,
    ) -> Result<LoadOutcome, ViewError> {
        self.article_id = Some(article_id);
        self.feed_id = feed_id;
        self.source_id = source_id;
        self.article_index = article_index;
        self.url = Some(url.clone());
        self.settings = settings;
        self.status = ViewStatus::Loading;
        self.load_start_time = Some(Instant::now());
        self.last_used_at = Instant::now();

        let outcome = tokio::time::timeout(timeout, self.navigate_and_render(url)).await;

        let outcome = match outcome {
            Ok(inner) => inner,
            Err(_elapsed) => {
                tracing::debug!(handle = self.handle, "load timed out, resolving optimistically");
                Ok(LoadOutcome::Ready)
            }
        };

        match &outcome {
            Ok(LoadOutcome::Ready) => {
                self.status = ViewStatus::Ready;
                self.has_loaded_once = true;
                self.load_error = None;
            }
            Ok(LoadOutcome::Aborted) => {
                // Silent: user navigated away. Status is left wherever the
                // caller (typically a fresh `load`) will shortly set it.
            }
            Err(ViewError::LoadFailed { code }) => {
                self.status = ViewStatus::Error;
                self.load_error = Some(code.clone());
            }
            Err(ViewError::Cancelled) => unreachable!("Cancelled is folded into Aborted above"),
        }

        outcome
    }

    async fn navigate_and_render(&mut self, url: String) -> Result<LoadOutcome, ViewError> {
        let handles_urls = self.surface.handles_urls();
        if handles_urls {
            self.surface.goto(PageType::Url(url));
        } else {
            let (html, _stylesheets) = crate::fetch::fetch_html(url)
                .await
                .map_err(|e| ViewError::LoadFailed { code: e })?;
            self.surface.goto(PageType::Html(html));
        }
        self.surface.update();
        self.surface.render(Size::new(1, 1));
        Ok(LoadOutcome::Ready)
    }

    /// Stop an in-flight load (e.g. because the user navigated away); the
    /// in-flight `load()` future will resolve as `Aborted` on its next
    /// poll of the engine, or simply be dropped by the caller.
    pub fn stop(&mut self) {
        self.surface.stop();
    }

    /// Idempotent. Mutes/pauses media on deactivation, unmutes on
    /// activation.
    pub fn set_active(&mut self, active: bool) {
        if self.is_active == active {
            return;
        }
        self.is_active = active;
        self.surface.set_media_muted(!active);
        if active {
            self.surface.focus();
        } else {
            self.surface.unfocus();
        }
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.surface.resize(bounds.size());
        self.last_bounds = Some(bounds);
    }

    /// Position at a large-negative coordinate, preserving width/height,
    /// rather than hiding the surface — this keeps render state (scroll,
    /// video playback) alive across swaps.
    pub const OFF_SCREEN_COORD: f32 = -10_000.0;

    pub fn move_off_screen(&mut self, current_bounds: Bounds) {
        self.set_active(false);
        self.is_at_render_position = false;
        self.is_off_screen = true;
        self.set_bounds(Bounds::new(
            Self::OFF_SCREEN_COORD,
            Self::OFF_SCREEN_COORD,
            current_bounds.width,
            current_bounds.height,
        ));
    }

    /// Offset so exactly one pixel overlaps the visible rectangle, keeping
    /// the renderer rasterizing this View even though it's not active.
    pub fn set_render_position(&mut self, bounds: Bounds) {
        self.is_off_screen = false;
        self.is_at_render_position = true;
        self.set_bounds(Bounds::new(
            bounds.x + bounds.width - 1.0,
            bounds.y + bounds.height - 1.0,
            bounds.width,
            bounds.height,
        ));
    }

    pub fn set_visible(&mut self, show: bool, bounds: Bounds) {
        self.is_off_screen = !show;
        if show {
            self.set_bounds(bounds);
        } else {
            self.move_off_screen(bounds);
        }
    }

    pub fn bring_to_front(&mut self) {
        // Z-order is tracked by the Pool's Vec ordering / the host UI's
        // compositor; nothing to do at the View level beyond marking it.
    }

    pub fn focus(&mut self) {
        self.surface.focus();
    }

    /// factor = 1.0 + 0.1 * level, clamped to [0.25, 5.0]; level itself is
    /// clamped to [-6, 40] by the caller before this is invoked.
    pub fn set_css_zoom(&mut self, level: i32) {
        let factor = crate::zoom::level_to_factor(level);
        self.surface.set_css_zoom(factor);
    }

    pub fn set_visual_zoom_level(&mut self, level: i32) {
        let factor = crate::zoom::level_to_factor(level);
        self.surface.set_visual_zoom(factor, true);
    }

    pub fn set_visual_zoom_mode(&mut self, on: bool) {
        self.surface.set_visual_zoom(1.0, on);
    }

    pub fn set_mobile_mode(&mut self, on: bool) {
        self.surface.set_mobile_mode(on);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::fake::FakeSurface;

    fn fake_view(handle: ViewHandle) -> View {
        View::new(handle, Box::new(FakeSurface::new()))
    }

    #[tokio::test]
    async fn load_transitions_empty_to_ready() {
        let mut v = fake_view(0);
        assert_eq!(v.status, ViewStatus::Empty);
        let outcome = v
            .load(
                "https://example.com".into(),
                "a1".into(),
                None,
                None,
                LoadSettings::default(),
                0,
                Duration::from_secs(30),
            )
            .await
            .unwrap();
        assert_eq!(outcome, LoadOutcome::Ready);
        assert_eq!(v.status, ViewStatus::Ready);
        assert!(v.has_loaded_once);
    }

    #[tokio::test]
    async fn recycle_clears_binding_but_keeps_handle() {
        let mut v = fake_view(3);
        v.load(
            "https://example.com".into(),
            "a1".into(),
            Some("f1".into()),
            None,
            LoadSettings::default(),
            2,
            Duration::from_secs(30),
        )
        .await
        .unwrap();
        v.recycle();
        assert_eq!(v.handle, 3);
        assert_eq!(v.status, ViewStatus::Empty);
        assert!(v.article_id.is_none());
        assert!(!v.has_loaded_once);
        assert_eq!(v.article_index, -1);
    }

    #[tokio::test]
    async fn set_active_mutes_on_deactivate() {
        let mut v = fake_view(0);
        v.set_active(true);
        assert!(v.is_active);
        v.set_active(false);
        assert!(!v.is_active);
    }

    #[test]
    fn render_position_is_never_active() {
        let mut v = fake_view(0);
        v.is_active = true;
        v.set_render_position(Bounds::new(0.0, 0.0, 800.0, 600.0));
        // set_render_position does not touch is_active directly; the Pool
        // enforces the invariant by never calling it on the active View.
        // Here we assert the geometry offset is applied correctly.
        assert!(v.is_at_render_position);
        let b = v.last_bounds.unwrap();
        assert_eq!(b.x, 799.0);
        assert_eq!(b.y, 599.0);
    }

    #[test]
    fn off_screen_preserves_size() {
        let mut v = fake_view(0);
        v.move_off_screen(Bounds::new(10.0, 10.0, 1024.0, 768.0));
        let b = v.last_bounds.unwrap();
        assert_eq!(b.x, View::OFF_SCREEN_COORD);
        assert_eq!(b.width, 1024.0);
        assert_eq!(b.height, 768.0);
    }
}
