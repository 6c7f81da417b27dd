//! Typed errors for the view/translation/pool subsystems.
//!
//! Internal subsystems use `thiserror` enums; only `PoolError` is meant to
//! cross the crate boundary (from `Pool::navigate`). Everything else is
//! absorbed and logged per the propagation rule: prefetch, recycle and
//! stale-response conditions never surface as errors.

use thiserror::Error;

/// Failure of a single [`crate::view::View::load`] call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ViewError {
    /// A non-ABORTED main-frame navigation failure.
    #[error("load failed: {code}")]
    LoadFailed {
        /// Engine-reported failure code.
        code: String,
    },
    /// Navigation was aborted by the user (e.g. navigated away mid-load).
    /// Never escapes `View::load`'s public `Result` — callers see
    /// `Ok(LoadOutcome::Aborted)` instead.
    #[error("load cancelled")]
    Cancelled,
}

/// Internal translation failures. `TranslationService::translate_*` methods
/// never return `Err` — failures fold into a `Translation { was_translated:
/// false, .. }` result instead, per the absorb-don't-surface rule.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranslationError {
    /// Provider is in cool-down after a recent 429.
    #[error("translation provider rate-limited")]
    RateLimited,
    /// Transport-level failure reaching the provider.
    #[error("translation network error: {0}")]
    Network(String),
    /// Provider responded but rejected the request.
    #[error("translation provider error: {0}")]
    Provider(String),
}

/// Errors surfaced to the host UI from [`crate::pool::Pool`].
///
/// Only raised when a user-initiated `navigate()` itself fails to load;
/// every other internal condition (prefetch skip, recycle refusal, stale
/// `menuKey`) is logged and absorbed without an `Err`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The View chosen for a user-initiated navigation failed to load.
    #[error("navigation to {article_id} failed: {source}")]
    NavigationFailed {
        /// The article that failed to load.
        article_id: String,
        /// The underlying view error.
        #[source]
        source: ViewError,
    },
}
