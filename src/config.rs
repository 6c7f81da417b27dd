//! Pool and translation configuration, loaded from TOML.
//!
//! Mirrors the pack's config convention: every field is `#[serde(default)]`
//! so a missing file, or a file missing individual keys, silently falls
//! back to sane defaults rather than failing to start.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Hard ceiling on pool size regardless of what a config file requests.
pub const MAX_POOL_SIZE: usize = 7;
/// Floor on pool size; below this, recycling can't keep up with a
/// 3-deep forward/backward prefetch cascade.
pub const MIN_POOL_SIZE: usize = 2;

fn default_pool_size() -> usize {
    6
}
fn default_true() -> bool {
    true
}
fn default_cascade_depth() -> usize {
    3
}
fn default_stale_loading_secs() -> u64 {
    60
}
fn default_load_timeout_secs() -> u64 {
    30
}
fn default_focus_refocus_delay_ms() -> u64 {
    150
}
fn default_debug_preview_debounce_ms() -> u64 {
    200
}
fn default_zoom_pending_confirm_ms() -> u64 {
    100
}

/// Pool sizing and timing knobs.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Requested pool size; clamped to `[MIN_POOL_SIZE, MAX_POOL_SIZE]` in
    /// [`PoolConfig::normalized`], not rejected.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_true")]
    pub prefetch_enabled: bool,
    #[serde(default = "default_cascade_depth")]
    pub cascade_depth: usize,
    #[serde(default = "default_stale_loading_secs")]
    pub stale_loading_secs: u64,
    #[serde(default = "default_load_timeout_secs")]
    pub load_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub render_position_enabled: bool,
    #[serde(default = "default_focus_refocus_delay_ms")]
    pub focus_refocus_delay_ms: u64,
    #[serde(default = "default_debug_preview_debounce_ms")]
    pub debug_preview_debounce_ms: u64,
    #[serde(default = "default_zoom_pending_confirm_ms")]
    pub zoom_pending_confirm_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            prefetch_enabled: true,
            cascade_depth: default_cascade_depth(),
            stale_loading_secs: default_stale_loading_secs(),
            load_timeout_secs: default_load_timeout_secs(),
            render_position_enabled: true,
            focus_refocus_delay_ms: default_focus_refocus_delay_ms(),
            debug_preview_debounce_ms: default_debug_preview_debounce_ms(),
            zoom_pending_confirm_ms: default_zoom_pending_confirm_ms(),
        }
    }
}

impl PoolConfig {
    /// Clamp `pool_size` into `[MIN_POOL_SIZE, MAX_POOL_SIZE]`. Call this
    /// once at construction; values outside the range are clamped, not
    /// treated as configuration errors.
    pub fn normalized(mut self) -> Self {
        self.pool_size = self.pool_size.clamp(MIN_POOL_SIZE, MAX_POOL_SIZE);
        self
    }
}

fn default_cache_capacity() -> usize {
    500
}
fn default_cache_evict_batch() -> usize {
    100
}
fn default_base_delay_ms() -> u64 {
    2000
}
fn default_max_delay_ms() -> u64 {
    60_000
}
fn default_cooldown_secs() -> u64 {
    60
}

/// Which external translation backend to use.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranslationProvider {
    /// Self-hosted HTTP endpoint with native HTML-aware translation.
    SelfHosted {
        endpoint: String,
        #[serde(default)]
        api_key: Option<String>,
    },
    /// Free web-scrape provider with tight quotas.
    WebScrape,
}

impl Default for TranslationProvider {
    fn default() -> Self {
        TranslationProvider::WebScrape
    }
}

/// Translation service tuning: cache size, queue delay and backoff.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub provider: TranslationProvider,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_cache_evict_batch")]
    pub cache_evict_batch: usize,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            cache_capacity: default_cache_capacity(),
            cache_evict_batch: default_cache_evict_batch(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

/// Load a [`PoolConfig`] from a TOML string, falling back to defaults for
/// anything missing or on outright parse failure of individual sections.
pub fn parse_pool_config(toml_str: &str) -> Result<PoolConfig, toml::de::Error> {
    toml::from_str::<PoolConfig>(toml_str).map(PoolConfig::normalized)
}

/// Load a [`TranslationConfig`] from a TOML string.
pub fn parse_translation_config(toml_str: &str) -> Result<TranslationConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Read and parse a [`PoolConfig`] from disk, the outer boundary a host
/// application actually calls at startup. A missing file falls back to
/// defaults (same convention as `parse_pool_config("")`); anything else
/// that goes wrong reading or parsing it is a real startup error.
pub fn load_pool_config(path: &Path) -> anyhow::Result<PoolConfig> {
    let toml_str = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no pool config file, using defaults");
            String::new()
        }
        Err(e) => {
            return Err(e).with_context(|| format!("reading pool config at {}", path.display()))
        }
    };
    parse_pool_config(&toml_str)
        .with_context(|| format!("parsing pool config at {}", path.display()))
}

/// Read and parse a [`TranslationConfig`] from disk; same missing-file
/// convention as [`load_pool_config`].
pub fn load_translation_config(path: &Path) -> anyhow::Result<TranslationConfig> {
    let toml_str = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no translation config file, using defaults");
            String::new()
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("reading translation config at {}", path.display()))
        }
    };
    parse_translation_config(&toml_str)
        .with_context(|| format!("parsing translation config at {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = PoolConfig::default();
        assert_eq!(cfg.pool_size, 6);
        assert!(cfg.prefetch_enabled);
        assert_eq!(cfg.cascade_depth, 3);
        assert_eq!(cfg.stale_loading_secs, 60);
    }

    #[test]
    fn pool_size_clamps_high() {
        let cfg = parse_pool_config("pool_size = 99").unwrap();
        assert_eq!(cfg.pool_size, MAX_POOL_SIZE);
    }

    #[test]
    fn pool_size_clamps_low() {
        let cfg = parse_pool_config("pool_size = 0").unwrap();
        assert_eq!(cfg.pool_size, MIN_POOL_SIZE);
    }

    #[test]
    fn missing_file_is_all_defaults() {
        let cfg = parse_pool_config("").unwrap();
        assert_eq!(cfg.pool_size, 6);
    }

    #[test]
    fn translation_provider_defaults_to_web_scrape() {
        let cfg = TranslationConfig::default();
        assert_eq!(cfg.provider, TranslationProvider::WebScrape);
        assert_eq!(cfg.cache_capacity, 500);
    }

    #[test]
    fn load_pool_config_missing_file_is_defaults() -> anyhow::Result<()> {
        let cfg = load_pool_config(Path::new("/nonexistent/content-view-pool.toml"))?;
        assert_eq!(cfg.pool_size, 6);
        Ok(())
    }

    #[test]
    fn load_pool_config_reads_real_file() -> anyhow::Result<()> {
        let dir = std::env::temp_dir().join("content_view_pool_config_test");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("pool.toml");
        std::fs::write(&path, "pool_size = 4\ncascade_depth = 2\n")?;

        let cfg = load_pool_config(&path)?;
        assert_eq!(cfg.pool_size, 4);
        assert_eq!(cfg.cascade_depth, 2);

        std::fs::remove_dir_all(&dir).ok();
        Ok(())
    }

    #[test]
    fn load_pool_config_invalid_toml_is_an_error() {
        let dir = std::env::temp_dir().join("content_view_pool_config_test_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("pool.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        assert!(load_pool_config(&path).is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}
