//! The narrow surface through which the host UI drives the [`Pool`].
//!
//! The UI never reads View internals directly (except `get_pool_status`,
//! for debugging) — it sends `Action`s in and drains `PoolEvent`s out.
//! This mirrors the teacher's `Action -> Task<Message>` widget update
//! pattern, generalized from one widget's dispatch loop to the whole Pool.

use iced::widget::image;

use crate::scheduler::Direction;
use crate::view::LoadSettings;

/// Where an article should open, carried on a prefetch-info response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenTarget {
    Local,
    Webpage,
    External,
    FullContent,
}

/// Extra article metadata the UI attaches to a `prefetchInfo` response,
/// used by the full-content / translation path.
#[derive(Clone, Debug, Default)]
pub struct ArticleInfo {
    pub item_link: Option<String>,
    pub item_content: Option<String>,
    pub item_title: Option<String>,
    pub item_date: Option<String>,
    pub open_target: Option<OpenTarget>,
    pub text_dir: Option<String>,
    pub font_size: Option<u32>,
    pub font_family: Option<String>,
    pub locale: Option<String>,
    pub translate_to: Option<String>,
}

/// A response to a scheduler-issued prefetch-info request, or a direct
/// fire-and-forget prefetch request from the UI — both feed
/// [`crate::pool::Pool::prefetch`].
#[derive(Clone, Debug)]
pub struct PrefetchRequest {
    pub article_index: i64,
    pub article_id: String,
    pub url: String,
    pub feed_id: Option<String>,
    pub settings: LoadSettings,
    pub article_info: Option<ArticleInfo>,
    pub menu_key: String,
}

/// Requests the UI sends into the Pool.
#[derive(Clone, Debug)]
pub enum Action {
    Navigate {
        article_id: String,
        url: String,
        feed_id: Option<String>,
        source_id: Option<String>,
        settings: LoadSettings,
        index: i64,
        list_length: i64,
        menu_key: String,
    },
    Prefetch(PrefetchRequest),
    PrefetchInfo(PrefetchRequest),
    SetBounds {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    SetVisibility(bool),
    SetReadingDirection(Direction),
    OnListChanged,
    OnFeedRefreshed,
    SetZoomFactor(f32),
    SetCssZoom(i32),
    ZoomStep(i32),
    ZoomReset,
    SetVisualZoomMode(bool),
    SetMobileMode(bool),
    GoBack,
    GoForward,
    Reload,
    Stop,
    Nuke,
    EnterVideoFullscreen,
    ExitVideoFullscreen,
}

/// The result of [`crate::pool::Pool::capture_prefetched`]: a snapshot of
/// whatever a prefetched View currently shows, for an instant-transition
/// placeholder while the real View is reprojected into place.
#[derive(Clone, Debug)]
pub struct CapturedPrefetch {
    pub loading: bool,
    pub screenshot: image::Handle,
}

/// Events the Pool emits for the UI to observe.
#[derive(Clone, Debug)]
pub enum PoolEvent {
    NavigationComplete {
        article_id: String,
    },
    PrefetchStatus(crate::scheduler::PrefetchStatus),
    ZoomChanged {
        level: i32,
        feed_id: Option<String>,
        view_handle: usize,
    },
    VideoFullscreen(bool),
    Error {
        article_id: String,
        message: String,
    },
    /// The scheduler wants the UI to resolve the next prefetch target into
    /// a `PrefetchInfo` action (or report it can't).
    RequestPrefetchInfo {
        article_index: i64,
        menu_key: String,
    },
    /// A background View's navigation-start fired focus-theft mitigation;
    /// the host should refocus its active View's widget after `delay_ms`.
    RequestRefocus {
        delay_ms: u64,
    },
    /// A key-down was redirected from a background View to the active one.
    RedirectInput {
        to_view: usize,
        key: crate::focus::RoutedKey,
    },
}
