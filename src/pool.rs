//! The Content View Pool: owns every [`View`], resolves navigate/prefetch
//! requests into View actions, and enforces the single-active +
//! render-position invariants via [`crate::placement`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use iced::Size;

use crate::bridge::{Action, ArticleInfo, CapturedPrefetch, OpenTarget, PoolEvent, PrefetchRequest};
use crate::config::PoolConfig;
use crate::error::{PoolError, ViewError};
use crate::focus::{route_key, InputMode, Routing, RoutedKey};
use crate::placement::{self, Viewport};
use crate::scheduler::{self, Direction, PrefetchScheduler};
use crate::surface::{Bounds, Surface};
use crate::translation::TranslationService;
use crate::view::{LoadSettings, View, ViewHandle, ViewStatus};

type SurfaceFactory = Box<dyn Fn(Size<u32>) -> Box<dyn Surface> + Send + Sync>;

/// A process-singleton-shaped owner of every View in the window. Nothing
/// prevents an application from holding several `Pool`s (e.g. one per
/// window) — the design notes call this out as a non-functional
/// singleton convention, not a hard constraint.
pub struct Pool {
    config: PoolConfig,
    surface_factory: SurfaceFactory,
    next_handle: ViewHandle,
    views: Vec<View>,

    active_view: Option<ViewHandle>,
    render_position_view: Option<ViewHandle>,

    menu_key: Option<String>,
    current_article_index: i64,
    article_list_length: i64,
    direction: Direction,

    scheduler: PrefetchScheduler,
    pool_generation: u64,
    awaiting_first_navigation_after_nuke: bool,

    viewport: Viewport,
    video_fullscreen: bool,
    zoom: crate::zoom::ZoomState,
    mobile_mode: bool,
    input_mode: InputMode,

    translation: Arc<TranslationService>,
    events: VecDeque<PoolEvent>,
}

impl Pool {
    pub fn new(
        config: PoolConfig,
        translation: Arc<TranslationService>,
        surface_factory: impl Fn(Size<u32>) -> Box<dyn Surface> + Send + Sync + 'static,
    ) -> Self {
        Self {
            config: config.normalized(),
            surface_factory: Box::new(surface_factory),
            next_handle: 0,
            views: Vec::new(),
            active_view: None,
            render_position_view: None,
            menu_key: None,
            current_article_index: -1,
            article_list_length: 0,
            direction: Direction::Unknown,
            scheduler: PrefetchScheduler::new(),
            pool_generation: 0,
            awaiting_first_navigation_after_nuke: false,
            viewport: Viewport::default(),
            video_fullscreen: false,
            zoom: crate::zoom::ZoomState::default(),
            mobile_mode: false,
            input_mode: InputMode::Normal,
            translation,
            events: VecDeque::new(),
        }
    }

    pub fn drain_events(&mut self) -> Vec<PoolEvent> {
        self.events.drain(..).collect()
    }

    fn push_event(&mut self, event: PoolEvent) {
        self.events.push_back(event);
    }

    fn new_view(&mut self) -> ViewHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        let size = self.viewport.bounds.size();
        let surface = (self.surface_factory)(size);
        self.views.push(View::new(handle, surface));
        handle
    }

    fn view(&self, handle: ViewHandle) -> &View {
        self.views
            .iter()
            .find(|v| v.handle == handle)
            .expect("handle must refer to a live view")
    }

    fn view_mut(&mut self, handle: ViewHandle) -> &mut View {
        self.views
            .iter_mut()
            .find(|v| v.handle == handle)
            .expect("handle must refer to a live view")
    }

    fn protected_or_pending(&self, article_id: &str) -> bool {
        self.scheduler.protected.contains(article_id) || self.scheduler.pending.contains(article_id)
    }

    /// Whether `view` may currently be recycled, per the shared exclusion
    /// rules used by both the navigate and prefetch selection paths.
    fn is_recyclable(&self, view: &View, prefetch_targets: &[i64]) -> bool {
        if view.is_active {
            return false;
        }
        if matches!(view.status, ViewStatus::Loading)
            && !view.is_stale_loading(Duration::from_secs(self.config.stale_loading_secs))
        {
            return false;
        }
        if let Some(id) = &view.article_id {
            if self.protected_or_pending(id) {
                return false;
            }
        }
        if view.status == ViewStatus::Ready && prefetch_targets.contains(&view.article_index) {
            return false;
        }
        true
    }

    fn recycle_score(&self, view: &View, now: Instant) -> f64 {
        if view.article_id.is_none() {
            return -1000.0;
        }
        if view.status == ViewStatus::Error {
            return -900.0;
        }
        -(now.duration_since(view.last_used_at).as_secs_f64())
    }

    /// §4.5 `getOrCreateView`: existing match, else empty, else create
    /// below size limit, else recycle lowest-scoring candidate.
    fn get_or_create_view(&mut self, article_id: &str) -> ViewHandle {
        if let Some(v) = self.views.iter().find(|v| v.article_id.as_deref() == Some(article_id)) {
            return v.handle;
        }
        if let Some(v) = self.views.iter().find(|v| matches!(v.status, ViewStatus::Empty)) {
            return v.handle;
        }
        if self.views.len() < self.config.pool_size {
            return self.new_view();
        }
        self.find_recyclable_view(&[])
            .expect("pool_size >= MIN_POOL_SIZE guarantees a candidate exists")
    }

    fn find_recyclable_view(&self, prefetch_targets: &[i64]) -> Option<ViewHandle> {
        let now = Instant::now();
        self.views
            .iter()
            .filter(|v| self.is_recyclable(v, prefetch_targets))
            .min_by(|a, b| {
                self.recycle_score(a, now)
                    .partial_cmp(&self.recycle_score(b, now))
                    .unwrap()
            })
            .map(|v| v.handle)
    }

    /// §4.5 `findFreeView`: empty non-active, else create below limit,
    /// else an LRU candidate that satisfies the non-recyclable exclusions.
    ///
    /// Unlike [`Pool::get_or_create_view`] (used by `navigate`, which clears
    /// `protected`/`pending` via `cancel_prefetch` first), this can
    /// legitimately find no candidate mid-cascade: by the Nth target,
    /// `protected` holds the active article plus every prior target in this
    /// cycle, which can cover every non-active View at once. §7 classifies
    /// that as *Prefetch-blocked* — callers must treat `None` as a skip.
    fn find_free_view(&mut self, prefetch_targets: &[i64]) -> Option<ViewHandle> {
        if let Some(v) = self
            .views
            .iter()
            .find(|v| matches!(v.status, ViewStatus::Empty) && !v.is_active)
        {
            return Some(v.handle);
        }
        if self.views.len() < self.config.pool_size {
            return Some(self.new_view());
        }
        self.find_recyclable_view(prefetch_targets)
    }

    fn next_article_in_direction(&self) -> Option<i64> {
        match self.direction {
            Direction::Forward => Some(self.current_article_index + 1),
            Direction::Backward => Some(self.current_article_index - 1),
            Direction::Unknown => Some(self.current_article_index + 1),
        }
    }

    fn reproject(&mut self, new_active: ViewHandle) {
        let next_index = self.next_article_in_direction();
        let next_handle = next_index.and_then(|idx| {
            self.views
                .iter()
                .find(|v| v.article_index == idx && v.has_loaded_once)
                .map(|v| v.handle)
        });
        placement::reproject(
            &mut self.views,
            &self.viewport,
            new_active,
            next_handle,
            self.config.render_position_enabled,
        );
        self.active_view = Some(new_active);
        self.render_position_view = next_handle.filter(|_| self.config.render_position_enabled);
    }

    fn current_prefetch_targets(&self) -> Vec<i64> {
        scheduler::determine_prefetch_targets(
            self.current_article_index,
            self.article_list_length,
            self.direction,
        )
    }

    /// §4.2 `navigate`.
    pub async fn navigate(
        &mut self,
        article_id: String,
        url: String,
        feed_id: Option<String>,
        source_id: Option<String>,
        settings: LoadSettings,
        index: i64,
        list_length: i64,
        menu_key: String,
    ) -> Result<bool, PoolError> {
        self.awaiting_first_navigation_after_nuke = false;
        let is_new_list = self.menu_key.as_deref() != Some(menu_key.as_str());
        self.cancel_prefetch();
        self.menu_key = Some(menu_key.clone());

        self.direction = scheduler::next_direction(
            is_new_list || self.current_article_index < 0,
            self.current_article_index,
            index,
            list_length - 1,
        );
        self.scheduler.direction = self.direction;
        self.current_article_index = index;
        self.article_list_length = list_length;

        // Cache hit.
        if let Some(handle) = self
            .views
            .iter()
            .find(|v| v.article_id.as_deref() == Some(article_id.as_str()) && v.has_loaded_once)
            .map(|v| v.handle)
        {
            let zoom_level = self.zoom.level_for(feed_id.as_deref().unwrap_or(""));
            if (crate::zoom::level_to_factor(zoom_level) - settings.zoom_factor).abs() > 0.01 {
                self.view_mut(handle).set_css_zoom(zoom_level);
            }
            self.reproject(handle);
            tracing::info!(article_id, handle, "navigate cache hit");
            self.schedule_prefetch();
            self.push_event(PoolEvent::NavigationComplete { article_id });
            return Ok(true);
        }

        // Cache miss.
        let handle = self.get_or_create_view(&article_id);
        if let Some(prev) = self.active_view {
            if prev != handle {
                let prev_view = self.view_mut(prev);
                if matches!(prev_view.status, ViewStatus::Loading) {
                    prev_view.stop();
                }
                prev_view.set_active(false);
            }
        }
        self.view_mut(handle).set_active(true);
        if self.viewport.bounds_received {
            self.view_mut(handle).set_bounds(self.viewport.bounds);
        }

        let timeout = Duration::from_secs(self.config.load_timeout_secs);
        let load_result = self
            .view_mut(handle)
            .load(url, article_id.clone(), feed_id, source_id, settings, index, timeout)
            .await;

        // Re-check the view is still active: the user may have navigated
        // away while this load was in flight.
        if self.active_view != Some(handle) {
            tracing::debug!(handle, "load resolved after user navigated away, discarding");
            return Ok(true);
        }

        match load_result {
            Err(ViewError::LoadFailed { code }) => {
                self.push_event(PoolEvent::Error {
                    article_id: article_id.clone(),
                    message: code.clone(),
                });
                return Err(PoolError::NavigationFailed {
                    article_id,
                    source: ViewError::LoadFailed { code },
                });
            }
            _ => {}
        }

        self.reproject(handle);
        self.schedule_prefetch();
        if let Some(feed) = self.view(handle).feed_id.clone() {
            let level = self.zoom.level_for(&feed);
            self.push_event(PoolEvent::ZoomChanged {
                level,
                feed_id: Some(feed),
                view_handle: handle,
            });
        }
        self.push_event(PoolEvent::NavigationComplete { article_id });
        Ok(true)
    }

    /// §4.3 `executePrefetch`, invoked after every successful navigation.
    fn schedule_prefetch(&mut self) {
        if !self.config.prefetch_enabled || self.awaiting_first_navigation_after_nuke {
            return;
        }
        let targets = self.current_prefetch_targets();
        let already_ready: Vec<i64> = targets
            .iter()
            .copied()
            .filter(|idx| self.views.iter().any(|v| v.article_index == *idx && v.has_loaded_once))
            .collect();
        let active_article = self.active_view.map(|h| self.view(h).article_id.clone()).flatten();
        let menu_key = self.menu_key.clone().unwrap_or_default();
        self.scheduler.begin_cycle(menu_key.clone(), targets, &already_ready, active_article);
        self.request_next_prefetch();
    }

    fn request_next_prefetch(&mut self) {
        if let Some(idx) = self.scheduler.next_target() {
            let menu_key = self.scheduler.current_menu_key().unwrap_or_default().to_string();
            self.push_event(PoolEvent::RequestPrefetchInfo {
                article_index: idx,
                menu_key,
            });
        }
        self.push_event(PoolEvent::PrefetchStatus(self.scheduler.status(None)));
    }

    /// §4.2 `prefetch`: fire-and-forget, also the cascade step driven by a
    /// `prefetchInfo` response.
    pub async fn prefetch(&mut self, request: PrefetchRequest) {
        if !self.config.prefetch_enabled || self.awaiting_first_navigation_after_nuke {
            tracing::debug!("prefetch dropped: disabled or awaiting first navigation");
            return;
        }
        if !self.scheduler.accepts_response(&request.menu_key) {
            tracing::debug!(menu_key = %request.menu_key, "stale prefetch response dropped");
            return;
        }
        self.scheduler.protected.insert(request.article_id.clone());

        if let Some(existing) = self
            .views
            .iter()
            .find(|v| v.article_id.as_deref() == Some(request.article_id.as_str()))
            .map(|v| v.handle)
        {
            let status = self.view(existing).status.clone();
            match status {
                ViewStatus::Ready if self.view(existing).has_loaded_once => {
                    self.scheduler.on_prefetch_complete(request.article_index);
                    self.request_next_prefetch();
                    return;
                }
                ViewStatus::Loading
                    if !self
                        .view(existing)
                        .is_stale_loading(Duration::from_secs(self.config.stale_loading_secs)) =>
                {
                    // Leave it; its own completion will cascade forward.
                    return;
                }
                ViewStatus::Loading => {
                    self.view_mut(existing).recycle();
                }
                _ => {}
            }
            self.run_prefetch_load(existing, request).await;
            return;
        }

        let targets = self.current_prefetch_targets();
        let Some(handle) = self.find_free_view(&targets) else {
            tracing::debug!(
                article_id = %request.article_id,
                article_index = request.article_index,
                "prefetch blocked: no free or recyclable view this cycle, skipping"
            );
            self.scheduler.on_prefetch_complete(request.article_index);
            self.request_next_prefetch();
            return;
        };
        self.scheduler.pending.insert(request.article_id.clone());
        self.run_prefetch_load(handle, request).await;
    }

    async fn run_prefetch_load(&mut self, handle: ViewHandle, request: PrefetchRequest) {
        let full_content = matches!(
            request.article_info.as_ref().and_then(|i| i.open_target),
            Some(OpenTarget::FullContent)
        );
        let timeout = Duration::from_secs(self.config.load_timeout_secs);
        let article_id = request.article_id.clone();
        let article_index = request.article_index;
        let result = self
            .view_mut(handle)
            .load(
                request.url,
                request.article_id,
                request.feed_id,
                None,
                request.settings,
                request.article_index,
                timeout,
            )
            .await;
        self.view_mut(handle).full_content = full_content;
        self.scheduler.pending.remove(&article_id);
        if let Err(ViewError::LoadFailed { code }) = result {
            tracing::debug!(article_id, code, "prefetch load failed, cascade continues");
        }
        self.scheduler.on_prefetch_complete(article_index);
        self.request_next_prefetch();
    }

    /// A dedicated full-content prefetch: fetch raw HTML, optionally
    /// translate, render into a synthetic document, and `load` it as a
    /// full-content View.
    pub async fn prefetch_full_content(&mut self, mut request: PrefetchRequest, translate_to: Option<String>) {
        let Some(info) = request.article_info.clone() else {
            return self.prefetch(request).await;
        };
        let content = info.item_content.clone().unwrap_or_default();
        let title = info.item_title.clone().unwrap_or_default();
        let (title, _snippet, content) = if let Some(lang) = translate_to {
            let (t, s, c) = self
                .translation
                .translate_article(&title, "", &content, &lang)
                .await;
            (t.text, s.text, c.text)
        } else {
            (title, String::new(), content)
        };
        let doc = format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            crate::util::html_escape(&title),
            content
        );
        request.url = format!("data:text/html,{}", urlencode_minimal(&doc));
        request.article_info = Some(ArticleInfo {
            open_target: Some(OpenTarget::FullContent),
            ..info
        });
        self.prefetch(request).await;
    }

    /// §4.3 `cancelPrefetch`: clears queue/pending/protected and stops+
    /// recycles every non-active loading View.
    pub fn cancel_prefetch(&mut self) {
        self.scheduler.cancel();
        let active = self.active_view;
        for v in self.views.iter_mut() {
            if Some(v.handle) != active && matches!(v.status, ViewStatus::Loading) {
                v.stop();
                v.recycle();
            }
        }
    }

    /// On list change: destroy every View, bump the generation counter,
    /// and reject prefetches until the next navigation.
    pub fn on_list_changed(&mut self) {
        placement::nuke(&mut self.views, &self.viewport);
        self.views.clear();
        self.next_handle = 0;
        self.active_view = None;
        self.render_position_view = None;
        self.current_article_index = -1;
        self.article_list_length = 0;
        self.direction = Direction::Unknown;
        self.scheduler.reset_for_nuke();
        self.pool_generation += 1;
        self.awaiting_first_navigation_after_nuke = true;
        tracing::info!(generation = self.pool_generation, "pool nuked on list change");
    }

    /// §6 `nuke`: recycle just the active View (a reader mode switch, e.g.
    /// local ⇄ webpage), as opposed to [`Pool::on_list_changed`]'s full
    /// teardown of every View in the pool.
    pub fn nuke(&mut self) {
        let Some(handle) = self.active_view else { return };
        self.view_mut(handle).move_off_screen(self.viewport.bounds);
        self.view_mut(handle).recycle();
        self.active_view = None;
        if self.render_position_view == Some(handle) {
            self.render_position_view = None;
        }
        tracing::info!(handle, "active view nuked (mode switch)");
    }

    /// On feed refresh: keep View content, invalidate every non-active
    /// View's `article_index`, preserve the active View's index.
    pub fn on_feed_refreshed(&mut self) {
        let active = self.active_view;
        for v in self.views.iter_mut() {
            if Some(v.handle) != active {
                v.article_index = -1;
            }
        }
    }

    pub fn set_bounds(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.viewport.bounds = Bounds::new(x, y, width, height);
        self.viewport.bounds_received = true;
        placement::on_bounds_changed(&mut self.views, &self.viewport);
    }

    pub fn set_visibility(&mut self, visible: bool) {
        self.viewport.visible = visible;
        placement::set_visibility(&mut self.views, &self.viewport, visible);
    }

    pub fn set_reading_direction(&mut self, direction: Direction) {
        self.direction = direction;
        self.scheduler.direction = direction;
    }

    /// §4.7 zoom: apply to the active View then sync every sibling with
    /// the same `feedId`. Refuses re-entrant requests and requests inside
    /// the pending-confirm window.
    pub fn set_css_zoom(&mut self, level: i32) {
        if self.zoom.is_locked() {
            tracing::debug!(level, "zoom request refused: locked");
            return;
        }
        let Some(active) = self.active_view else { return };
        let feed_id = self.view(active).feed_id.clone().unwrap_or_default();
        let level = self
            .zoom
            .begin_request(&feed_id, level, Duration::from_millis(self.config.zoom_pending_confirm_ms));
        self.view_mut(active).set_css_zoom(level);

        self.zoom.begin_sync();
        let sibling_handles: Vec<ViewHandle> = self
            .views
            .iter()
            .filter(|v| v.handle != active && v.feed_id.as_deref() == Some(feed_id.as_str()))
            .map(|v| v.handle)
            .collect();
        for h in sibling_handles {
            self.view_mut(h).set_css_zoom(level);
        }
        self.zoom.end_sync();

        self.push_event(PoolEvent::ZoomChanged {
            level,
            feed_id: Some(feed_id),
            view_handle: active,
        });
    }

    pub fn zoom_step(&mut self, delta: i32) {
        let Some(active) = self.active_view else { return };
        let feed_id = self.view(active).feed_id.clone().unwrap_or_default();
        let current = self.zoom.level_for(&feed_id);
        self.set_css_zoom(current + delta);
    }

    pub fn zoom_reset(&mut self) {
        self.set_css_zoom(0);
    }

    pub fn set_visual_zoom_mode(&mut self, on: bool) {
        if let Some(active) = self.active_view {
            self.view_mut(active).set_visual_zoom_mode(on);
        }
    }

    pub fn set_mobile_mode(&mut self, on: bool) {
        self.mobile_mode = on;
        if let Some(active) = self.active_view {
            self.view_mut(active).set_mobile_mode(on);
        }
    }

    /// §6 navigation helpers: thin wrappers over the active View's
    /// `Surface`. `executeJavaScript` has no counterpart here — litehtml
    /// has no JavaScript engine to run it against.
    pub fn go_back(&mut self) {
        if let Some(active) = self.active_view {
            self.view_mut(active).surface_mut().go_back();
        }
    }

    pub fn go_forward(&mut self) {
        if let Some(active) = self.active_view {
            self.view_mut(active).surface_mut().go_forward();
        }
    }

    pub fn can_go_back(&self) -> bool {
        self.active_view
            .is_some_and(|h| self.view(h).surface().can_go_back())
    }

    pub fn can_go_forward(&self) -> bool {
        self.active_view
            .is_some_and(|h| self.view(h).surface().can_go_forward())
    }

    pub fn reload(&mut self) {
        if let Some(active) = self.active_view {
            self.view_mut(active).surface_mut().reload();
        }
    }

    pub fn stop(&mut self) {
        if let Some(active) = self.active_view {
            self.view_mut(active).stop();
        }
    }

    pub fn get_url(&self) -> Option<String> {
        self.active_view.map(|h| self.view(h).surface().get_url())
    }

    /// Snapshot whatever a prefetched View currently shows, for an instant
    /// placeholder while the real View is reprojected into place.
    pub fn capture_prefetched(&self, article_id: &str) -> Option<CapturedPrefetch> {
        let view = self
            .views
            .iter()
            .find(|v| v.article_id.as_deref() == Some(article_id))?;
        Some(CapturedPrefetch {
            loading: matches!(view.status, ViewStatus::Loading),
            screenshot: view.surface().get_view().as_handle(),
        })
    }

    /// Dispatch a UI-issued [`Action`]. The sole entry point a host needs to
    /// drive the Pool, mirroring the teacher's `WebView::update(Action)`.
    pub async fn dispatch(&mut self, action: Action) {
        match action {
            Action::Navigate {
                article_id,
                url,
                feed_id,
                source_id,
                settings,
                index,
                list_length,
                menu_key,
            } => {
                let id = article_id.clone();
                if let Err(err) = self
                    .navigate(
                        article_id, url, feed_id, source_id, settings, index, list_length, menu_key,
                    )
                    .await
                {
                    tracing::warn!(article_id = id, error = %err, "navigate failed");
                }
            }
            Action::Prefetch(request) => self.prefetch(request).await,
            Action::PrefetchInfo(request) => {
                let translate_to = request
                    .article_info
                    .as_ref()
                    .and_then(|info| info.translate_to.clone());
                let is_full_content = matches!(
                    request.article_info.as_ref().and_then(|info| info.open_target),
                    Some(OpenTarget::FullContent)
                );
                if is_full_content {
                    self.prefetch_full_content(request, translate_to).await;
                } else {
                    self.prefetch(request).await;
                }
            }
            Action::SetBounds { x, y, width, height } => self.set_bounds(x, y, width, height),
            Action::SetVisibility(visible) => self.set_visibility(visible),
            Action::SetReadingDirection(direction) => self.set_reading_direction(direction),
            Action::OnListChanged => self.on_list_changed(),
            Action::OnFeedRefreshed => self.on_feed_refreshed(),
            Action::SetZoomFactor(factor) => self.set_css_zoom(crate::zoom::factor_to_level(factor)),
            Action::SetCssZoom(level) => self.set_css_zoom(level),
            Action::ZoomStep(delta) => self.zoom_step(delta),
            Action::ZoomReset => self.zoom_reset(),
            Action::SetVisualZoomMode(on) => self.set_visual_zoom_mode(on),
            Action::SetMobileMode(on) => self.set_mobile_mode(on),
            Action::GoBack => self.go_back(),
            Action::GoForward => self.go_forward(),
            Action::Reload => self.reload(),
            Action::Stop => self.stop(),
            Action::Nuke => self.nuke(),
            Action::EnterVideoFullscreen => self.enter_video_fullscreen(),
            Action::ExitVideoFullscreen => self.exit_video_fullscreen(),
        }
    }

    pub fn enter_video_fullscreen(&mut self) {
        self.video_fullscreen = true;
        if let Some(active) = self.active_view {
            self.view_mut(active).set_visual_zoom_mode(false);
        }
        self.push_event(PoolEvent::VideoFullscreen(true));
    }

    pub fn exit_video_fullscreen(&mut self) {
        self.video_fullscreen = false;
        if let Some(active) = self.active_view {
            self.view_mut(active).set_visual_zoom_mode(true);
        }
        self.push_event(PoolEvent::VideoFullscreen(false));
    }

    fn input_mode_for(&self) -> InputMode {
        if self.video_fullscreen {
            InputMode::VideoFullscreen
        } else {
            self.input_mode
        }
    }

    pub fn set_input_mode(&mut self, mode: InputMode) {
        self.input_mode = mode;
    }

    /// Route a key-down that arrived on `origin`. Handles focus-theft
    /// redirection (§4.6 scenario 4) by emitting `RedirectInput`.
    pub fn handle_key_down(&mut self, origin: ViewHandle, event: &iced::keyboard::Event) {
        let Some(key) = RoutedKey::from_event(event) else { return };
        let is_active = Some(origin) == self.active_view;
        let ctrl = matches!(event, iced::keyboard::Event::KeyPressed { modifiers, .. } if modifiers.control());
        match route_key(self.input_mode_for(), &key, is_active, ctrl) {
            Routing::RedirectToActive => {
                if let Some(active) = self.active_view {
                    self.push_event(PoolEvent::RedirectInput { to_view: active, key });
                    self.view_mut(active).focus();
                }
            }
            Routing::ForwardToHost | Routing::PassThrough => {}
        }
    }

    /// Any background View starting a navigation should trigger a refocus
    /// of a ready active View, after a short delay (§4.6).
    pub fn on_background_view_navigation_started(&mut self, handle: ViewHandle) {
        if Some(handle) == self.active_view {
            return;
        }
        let active_ready = self
            .active_view
            .is_some_and(|h| self.view(h).status == ViewStatus::Ready);
        if crate::focus::should_refocus_on_background_navigation(active_ready) {
            self.push_event(PoolEvent::RequestRefocus {
                delay_ms: self.config.focus_refocus_delay_ms,
            });
        }
    }

    pub fn prefetch_status(&self) -> crate::scheduler::PrefetchStatus {
        self.scheduler.status(None)
    }

    pub fn is_awaiting_first_navigation_after_nuke(&self) -> bool {
        self.awaiting_first_navigation_after_nuke
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn active_view_handle(&self) -> Option<ViewHandle> {
        self.active_view
    }

    pub fn render_position_view_handle(&self) -> Option<ViewHandle> {
        self.render_position_view
    }

    pub fn pool_generation(&self) -> u64 {
        self.pool_generation
    }
}

/// Minimal percent-encoding for a synthetic `data:` URL; full RFC 3986
/// encoding isn't needed since the only caller is `prefetch_full_content`
/// encoding its own generated HTML.
fn urlencode_minimal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TranslationConfig;
    use crate::surface::fake::FakeSurface;

    fn test_pool() -> Pool {
        let config = PoolConfig {
            pool_size: 3,
            ..PoolConfig::default()
        };
        Pool::new(
            config,
            Arc::new(TranslationService::new(TranslationConfig::default())),
            |_size| Box::new(FakeSurface::new()) as Box<dyn Surface>,
        )
    }

    fn settings() -> LoadSettings {
        LoadSettings::default()
    }

    #[tokio::test]
    async fn cache_miss_then_hit_reuses_view_and_redirects_render_position() {
        let mut pool = test_pool();
        pool.navigate("a1".into(), "https://x/1".into(), None, None, settings(), 0, 5, "M1".into())
            .await
            .unwrap();
        assert_eq!(pool.active_view_handle(), Some(0));
        assert_eq!(pool.direction, Direction::Forward);

        // Simulate the UI answering the forward prefetch-info request for a2.
        pool.prefetch(PrefetchRequest {
            article_index: 1,
            article_id: "a2".into(),
            url: "https://x/2".into(),
            feed_id: None,
            settings: settings(),
            article_info: None,
            menu_key: "M1".into(),
        })
        .await;
        assert!(pool.views.iter().any(|v| v.article_id.as_deref() == Some("a2")));

        pool.navigate("a2".into(), "https://x/2".into(), None, None, settings(), 1, 5, "M1".into())
            .await
            .unwrap();
        // a2's view became active without re-loading (cache hit): only two
        // views should exist (a1, a2), not three.
        assert_eq!(pool.view_count(), 2);
        assert!(pool.view(pool.active_view_handle().unwrap()).article_id.as_deref() == Some("a2"));
    }

    #[tokio::test]
    async fn list_nuke_drops_prefetch_until_next_navigation() {
        let mut pool = test_pool();
        pool.navigate("a1".into(), "https://x/1".into(), None, None, settings(), 0, 3, "M1".into())
            .await
            .unwrap();
        pool.on_list_changed();
        assert_eq!(pool.view_count(), 0);
        assert!(pool.is_awaiting_first_navigation_after_nuke());

        pool.prefetch(PrefetchRequest {
            article_index: 0,
            article_id: "x".into(),
            url: "https://x/x".into(),
            feed_id: None,
            settings: settings(),
            article_info: None,
            menu_key: "M2".into(),
        })
        .await;
        assert_eq!(pool.view_count(), 0, "prefetch before first post-nuke navigation must be dropped");

        pool.navigate("a1".into(), "https://x/1".into(), None, None, settings(), 0, 3, "M2".into())
            .await
            .unwrap();
        assert!(!pool.is_awaiting_first_navigation_after_nuke());
    }

    #[tokio::test]
    async fn stale_menu_key_prefetch_response_is_dropped() {
        let mut pool = test_pool();
        pool.navigate("a1".into(), "https://x/1".into(), None, None, settings(), 0, 5, "M1".into())
            .await
            .unwrap();
        // UI switched lists; a response for the old menu_key arrives late.
        pool.navigate("b1".into(), "https://y/1".into(), None, None, settings(), 0, 5, "M2".into())
            .await
            .unwrap();

        pool.prefetch(PrefetchRequest {
            article_index: 1,
            article_id: "a2-stale".into(),
            url: "https://x/2".into(),
            feed_id: None,
            settings: settings(),
            article_info: None,
            menu_key: "M1".into(),
        })
        .await;
        assert!(!pool.views.iter().any(|v| v.article_id.as_deref() == Some("a2-stale")));
    }

    #[tokio::test]
    async fn at_most_one_active_and_render_position_never_active() {
        let mut pool = test_pool();
        pool.navigate("a1".into(), "https://x/1".into(), None, None, settings(), 0, 5, "M1".into())
            .await
            .unwrap();
        let active_count = pool.views.iter().filter(|v| v.is_active).count();
        assert_eq!(active_count, 1);
        assert!(pool
            .views
            .iter()
            .all(|v| !(v.is_active && v.is_at_render_position)));
    }

    #[tokio::test]
    async fn small_scope_nuke_recycles_only_the_active_view() {
        let mut pool = test_pool();
        pool.navigate("a1".into(), "https://x/1".into(), None, None, settings(), 0, 5, "M1".into())
            .await
            .unwrap();
        pool.prefetch(PrefetchRequest {
            article_index: 1,
            article_id: "a2".into(),
            url: "https://x/2".into(),
            feed_id: None,
            settings: settings(),
            article_info: None,
            menu_key: "M1".into(),
        })
        .await;
        assert_eq!(pool.view_count(), 2);

        pool.nuke();
        assert!(pool.active_view_handle().is_none());
        // The prefetched sibling survives; only the active view was recycled.
        assert_eq!(pool.view_count(), 2);
        assert!(pool.views.iter().any(|v| v.article_id.as_deref() == Some("a2")));
        assert!(!pool.views.iter().any(|v| v.article_id.as_deref() == Some("a1")));
    }

    #[tokio::test]
    async fn dispatch_routes_navigation_helper_actions_to_the_active_view() {
        // A 2-view pool so the 3rd navigation recycles view 0, giving its
        // underlying surface a second history entry to go back through.
        let mut pool = Pool::new(
            PoolConfig {
                pool_size: 2,
                ..PoolConfig::default()
            },
            Arc::new(TranslationService::new(TranslationConfig::default())),
            |_size| Box::new(FakeSurface::new()) as Box<dyn Surface>,
        );
        pool.dispatch(Action::Navigate {
            article_id: "a1".into(),
            url: "https://x/1".into(),
            feed_id: None,
            source_id: None,
            settings: settings(),
            index: 0,
            list_length: 3,
            menu_key: "M1".into(),
        })
        .await;
        pool.dispatch(Action::Navigate {
            article_id: "a2".into(),
            url: "https://x/2".into(),
            feed_id: None,
            source_id: None,
            settings: settings(),
            index: 1,
            list_length: 3,
            menu_key: "M1".into(),
        })
        .await;
        assert!(!pool.can_go_back());

        // Recycles view 0 (now inactive) to serve a3, appending a second
        // history entry to its surface.
        pool.dispatch(Action::Navigate {
            article_id: "a3".into(),
            url: "https://x/3".into(),
            feed_id: None,
            source_id: None,
            settings: settings(),
            index: 2,
            list_length: 3,
            menu_key: "M1".into(),
        })
        .await;
        assert!(pool.can_go_back());

        pool.dispatch(Action::GoBack).await;
        assert!(!pool.can_go_back());

        pool.dispatch(Action::Reload).await;
        pool.dispatch(Action::Nuke).await;
        assert!(pool.active_view_handle().is_none());
    }

    #[tokio::test]
    async fn capture_prefetched_reports_loading_state() {
        let mut pool = test_pool();
        pool.navigate("a1".into(), "https://x/1".into(), None, None, settings(), 0, 5, "M1".into())
            .await
            .unwrap();
        pool.prefetch(PrefetchRequest {
            article_index: 1,
            article_id: "a2".into(),
            url: "https://x/2".into(),
            feed_id: None,
            settings: settings(),
            article_info: None,
            menu_key: "M1".into(),
        })
        .await;
        let captured = pool.capture_prefetched("a2").expect("a2 should have a view");
        assert!(!captured.loading);
        assert!(pool.capture_prefetched("does-not-exist").is_none());
    }

    /// §7 Prefetch-blocked: by the 3rd target of a 3-pool-size cascade,
    /// `protected` already covers the active article plus both prior
    /// targets, so every non-active View is excluded. `prefetch` must
    /// absorb this as a skip rather than panic.
    #[tokio::test]
    async fn prefetch_skips_when_every_view_is_protected() {
        let mut pool = test_pool();
        pool.navigate("a1".into(), "https://x/1".into(), None, None, settings(), 0, 5, "M1".into())
            .await
            .unwrap();

        for (index, id) in [(1i64, "a2"), (2, "a3")] {
            pool.prefetch(PrefetchRequest {
                article_index: index,
                article_id: id.into(),
                url: format!("https://x/{id}"),
                feed_id: None,
                settings: settings(),
                article_info: None,
                menu_key: "M1".into(),
            })
            .await;
        }
        assert_eq!(pool.view_count(), 3, "pool_size caps views at 3");

        // The 3rd cascade target (a4) arrives with no free or recyclable
        // View left: V0 is active, V1/V2 hold a2/a3, both protected.
        pool.prefetch(PrefetchRequest {
            article_index: 3,
            article_id: "a4".into(),
            url: "https://x/4".into(),
            feed_id: None,
            settings: settings(),
            article_info: None,
            menu_key: "M1".into(),
        })
        .await;

        assert_eq!(pool.view_count(), 3, "no view was created or recycled for a4");
        assert!(
            pool.views.iter().all(|v| v.article_id.as_deref() != Some("a4")),
            "a4 must not have been loaded into any view"
        );
        assert!(
            pool.views.iter().any(|v| v.article_id.as_deref() == Some("a2")),
            "a2 must survive the blocked skip"
        );
        assert!(
            pool.views.iter().any(|v| v.article_id.as_deref() == Some("a3")),
            "a3 must survive the blocked skip"
        );
    }
}
