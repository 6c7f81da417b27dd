//! A bounded cache of headless browsing surfaces ("views") that
//! pre-renders likely-next articles so reader navigation feels instant.
//!
//! The [`pool::Pool`] owns a small number of [`view::View`]s, each
//! wrapping a [`surface::Surface`] (a CPU HTML rasterizer by default).
//! It resolves `navigate`/`prefetch` requests into View actions, runs a
//! direction-aware cascaded [`scheduler`], and keeps exactly one View
//! on-screen via the [`placement`] controller while the rest sit off-screen
//! or at "render position" (one pixel visible, so the renderer keeps
//! painting the likely-next article).
//!
//! # Basic usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use content_view_pool::{config::PoolConfig, pool::Pool, surface::litehtml::LitehtmlSurface};
//! use content_view_pool::config::TranslationConfig;
//! use content_view_pool::translation::TranslationService;
//!
//! let translation = Arc::new(TranslationService::new(TranslationConfig::default()));
//! let mut pool = Pool::new(PoolConfig::default(), translation, |size| {
//!     Box::new(LitehtmlSurface::new(size))
//! });
//! ```

/// Engine trait and engine implementations (the multi-view-per-instance
/// rasterizer backends; see [`surface`] for the single-view adapter the
/// Pool actually drives).
pub mod engines;
pub use engines::{Engine, PageType, PixelFormat, ViewId};

#[cfg(feature = "litehtml")]
pub use engines::litehtml::Litehtml;

pub mod bridge;
pub mod config;
pub mod error;
pub mod focus;
pub mod placement;
pub mod pool;
pub mod scheduler;
pub mod surface;
pub mod translation;
pub mod view;
pub mod zoom;

pub(crate) mod util;
pub(crate) mod fetch;

use iced::widget::image;

/// Image details for passing a rendered frame around.
#[derive(Clone, Debug)]
pub struct ImageInfo {
    width: u32,
    height: u32,
    handle: image::Handle,
}

impl Default for ImageInfo {
    fn default() -> Self {
        let pixels = vec![255; (Self::WIDTH as usize * Self::HEIGHT as usize) * 4];
        Self {
            width: Self::WIDTH,
            height: Self::HEIGHT,
            handle: image::Handle::from_rgba(Self::WIDTH, Self::HEIGHT, pixels),
        }
    }
}

impl ImageInfo {
    // The default dimensions
    const WIDTH: u32 = 800;
    const HEIGHT: u32 = 800;

    fn new(mut pixels: Vec<u8>, format: PixelFormat, width: u32, height: u32) -> Self {
        // R, G, B, A
        assert_eq!(pixels.len() % 4, 0);

        if let PixelFormat::Bgra = format {
            pixels.chunks_mut(4).for_each(|chunk| chunk.swap(0, 2));
        }

        Self {
            width,
            height,
            handle: image::Handle::from_rgba(width, height, pixels),
        }
    }

    /// Get the image handle for direct rendering.
    pub fn as_handle(&self) -> image::Handle {
        self.handle.clone()
    }

    /// Image width.
    pub fn image_width(&self) -> u32 {
        self.width
    }

    /// Image height.
    pub fn image_height(&self) -> u32 {
        self.height
    }

    fn blank(width: u32, height: u32) -> Self {
        let pixels = vec![255; (width as usize * height as usize) * 4];
        Self {
            width,
            height,
            handle: image::Handle::from_rgba(width, height, pixels),
        }
    }
}
