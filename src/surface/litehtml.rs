//! [`Surface`] adapter over the CPU-rasterizer [`Litehtml`] engine.
//!
//! `Litehtml` is a multi-view engine (one instance renders many views,
//! indexed by [`ViewId`]); this adapter pins it to exactly one view so it
//! fits the single-view-per-`Surface` model the Pool expects. The engine
//! itself is untouched — including its unsafe self-referential document
//! storage — this file only wraps it.

use iced::keyboard;
use iced::mouse;
use iced::{Point, Size};

use crate::engines::litehtml::Litehtml;
use crate::engines::{Engine, PageType, ViewId};
use crate::surface::Surface;
use crate::ImageInfo;

/// One [`Litehtml`] engine instance holding exactly one view.
pub struct LitehtmlSurface {
    engine: Litehtml,
    id: ViewId,
}

impl LitehtmlSurface {
    /// Create a new surface with the given initial logical size.
    pub fn new(size: Size<u32>) -> Self {
        let mut engine = Litehtml::default();
        let id = engine.new_view(size, None);
        Self { engine, id }
    }
}

impl Surface for LitehtmlSurface {
    fn goto(&mut self, page: PageType) {
        self.engine.goto(self.id, page);
    }

    fn stop(&mut self) {
        // litehtml has no in-flight network navigation of its own — the
        // HTTP fetch that feeds it lives in `crate::fetch` and is
        // cancelled by dropping the owning future.
    }

    fn update(&mut self) {
        self.engine.update();
    }

    fn render(&mut self, size: Size<u32>) {
        self.engine.request_render(self.id, size);
    }

    fn resize(&mut self, size: Size<u32>) {
        self.engine.resize(size);
    }

    fn handles_urls(&self) -> bool {
        self.engine.handles_urls()
    }

    fn handle_keyboard_event(&mut self, event: keyboard::Event) {
        self.engine.handle_keyboard_event(self.id, event);
    }

    fn handle_mouse_event(&mut self, point: Point, event: mouse::Event) {
        self.engine.handle_mouse_event(self.id, point, event);
    }

    fn scroll(&mut self, delta: mouse::ScrollDelta) {
        self.engine.scroll(self.id, delta);
    }

    fn reload(&mut self) {
        self.engine.refresh(self.id);
    }

    fn go_back(&mut self) {
        self.engine.go_back(self.id);
    }

    fn go_forward(&mut self) {
        self.engine.go_forward(self.id);
    }

    fn get_url(&self) -> String {
        self.engine.get_url(self.id)
    }

    fn get_title(&self) -> String {
        self.engine.get_title(self.id)
    }

    fn get_view(&self) -> &ImageInfo {
        self.engine.get_view(self.id)
    }

    fn take_anchor_click(&mut self) -> Option<String> {
        self.engine.take_anchor_click(self.id)
    }

    fn focus(&mut self) {
        self.engine.focus();
    }

    fn unfocus(&mut self) {
        self.engine.unfocus();
    }
}
