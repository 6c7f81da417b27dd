//! Computes bounds/visibility/z-order for every View on each state change.
//!
//! Three logical slots: **active** (visible bounds, top z-order, focused),
//! **render-position** (same bounds offset by one pixel, occupied by the
//! likely-next View so the renderer keeps rasterizing it), and
//! **off-screen** (everything else). The controller's whole job is to
//! guarantee the invariants from the data model: exactly one active View,
//! at most one render-position View, and render-position is never active.

use crate::surface::Bounds;
use crate::view::{View, ViewHandle};

/// Current visible-area bounds and whether the Pool is on-screen at all.
#[derive(Clone, Copy, Debug, Default)]
pub struct Viewport {
    pub bounds: Bounds,
    pub bounds_received: bool,
    pub visible: bool,
}

/// Re-project every View after `new_active` becomes active.
///
/// `next_handle` is the View (if any) holding the next article in the
/// current reading direction, with `has_loaded_once` — it gets the
/// render-position slot. Every other non-active View is moved off-screen
/// defensively, matching §4.4's "On navigate" transition.
pub fn reproject(
    views: &mut [View],
    viewport: &Viewport,
    new_active: ViewHandle,
    next_handle: Option<ViewHandle>,
    render_position_enabled: bool,
) {
    for v in views.iter_mut() {
        if v.handle == new_active {
            continue;
        }
        let bounds = v.last_bounds.unwrap_or(viewport.bounds);
        v.move_off_screen(bounds);
    }

    if let Some(active) = views.iter_mut().find(|v| v.handle == new_active) {
        active.set_active(true);
        if viewport.visible && viewport.bounds_received {
            active.set_visible(true, viewport.bounds);
            active.bring_to_front();
            active.focus();
        }
    }

    if render_position_enabled {
        if let Some(handle) = next_handle {
            if handle != new_active {
                if let Some(next) = views.iter_mut().find(|v| v.handle == handle) {
                    if next.has_loaded_once {
                        next.set_render_position(viewport.bounds);
                    }
                }
            }
        }
    }

    tracing::debug!(
        new_active,
        ?next_handle,
        render_position_enabled,
        "placement reprojected"
    );
}

/// On list nuke: every View off-screen, render-position cleared,
/// `article_index` invalidated (caller does the invalidation; this only
/// handles geometry/placement).
pub fn nuke(views: &mut [View], viewport: &Viewport) {
    for v in views.iter_mut() {
        v.set_active(false);
        let bounds = v.last_bounds.unwrap_or(viewport.bounds);
        v.move_off_screen(bounds);
    }
}

/// On bounds change: resize every View (including off-screen ones, so
/// they're correctly sized before reappearing) and re-apply bounds to
/// whichever is currently active/at-render-position.
pub fn on_bounds_changed(views: &mut [View], viewport: &Viewport) {
    for v in views.iter_mut() {
        if v.is_active && viewport.visible {
            v.set_bounds(viewport.bounds);
        } else if v.is_at_render_position {
            v.set_render_position(viewport.bounds);
        } else {
            let bounds = v.last_bounds.unwrap_or(viewport.bounds);
            v.set_bounds(Bounds::new(
                bounds.x,
                bounds.y,
                viewport.bounds.width,
                viewport.bounds.height,
            ));
        }
    }
}

pub fn set_visibility(views: &mut [View], viewport: &Viewport, visible: bool) {
    for v in views.iter_mut() {
        if !visible {
            let bounds = v.last_bounds.unwrap_or(viewport.bounds);
            v.move_off_screen(bounds);
        } else if v.is_active {
            v.set_visible(true, viewport.bounds);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::fake::FakeSurface;

    fn view(handle: ViewHandle) -> View {
        View::new(handle, Box::new(FakeSurface::new()))
    }

    fn vp() -> Viewport {
        Viewport {
            bounds: Bounds::new(0.0, 0.0, 1024.0, 768.0),
            bounds_received: true,
            visible: true,
        }
    }

    #[test]
    fn reproject_activates_exactly_one_view() {
        let mut views = vec![view(0), view(1), view(2)];
        reproject(&mut views, &vp(), 1, None, true);
        assert_eq!(views.iter().filter(|v| v.is_active).count(), 1);
        assert!(views[1].is_active);
        assert!(!views[0].is_active && !views[2].is_active);
    }

    #[test]
    fn render_position_is_never_the_active_view() {
        let mut views = vec![view(0), view(1)];
        views[1].has_loaded_once = true;
        reproject(&mut views, &vp(), 1, Some(1), true);
        // next_handle == new_active is explicitly skipped.
        assert!(!views[1].is_at_render_position);
    }

    #[test]
    fn render_position_requires_has_loaded_once() {
        let mut views = vec![view(0), view(1)];
        // view 1 has NOT loaded once.
        reproject(&mut views, &vp(), 0, Some(1), true);
        assert!(!views[1].is_at_render_position);
    }

    #[test]
    fn render_position_goes_to_ready_next_view() {
        let mut views = vec![view(0), view(1)];
        views[1].has_loaded_once = true;
        reproject(&mut views, &vp(), 0, Some(1), true);
        assert!(views[1].is_at_render_position);
        assert!(!views[0].is_active || views[0].handle == 0);
    }

    #[test]
    fn nuke_puts_every_view_off_screen() {
        let mut views = vec![view(0), view(1)];
        views[0].is_active = true;
        nuke(&mut views, &vp());
        assert!(views.iter().all(|v| v.is_off_screen));
        assert!(views.iter().all(|v| !v.is_active));
    }

    #[test]
    fn set_visibility_false_hides_everything() {
        let mut views = vec![view(0), view(1)];
        views[0].is_active = true;
        set_visibility(&mut views, &vp(), false);
        assert!(views.iter().all(|v| v.is_off_screen));
    }
}
