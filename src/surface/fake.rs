//! [`FakeSurface`]: a deterministic, synchronously-resolving test double
//! for [`Surface`], so pool/scheduler/placement/focus logic can be
//! exercised without a real rendering engine.

use iced::keyboard;
use iced::mouse;
use iced::{Point, Size};

use crate::engines::PageType;
use crate::surface::Surface;
use crate::ImageInfo;

/// Records everything done to it, and "loads" instantly with no network
/// I/O — `goto` sets `url`/`html`/`title` synchronously.
pub struct FakeSurface {
    pub url: Option<String>,
    pub html: Option<String>,
    pub title: String,
    pub focused: bool,
    pub muted: bool,
    pub css_zoom: f32,
    pub visual_zoom: (f32, bool),
    pub mobile_mode: bool,
    pub stop_count: u32,
    pub image: ImageInfo,
    /// Set by tests to simulate a non-ABORTED main-frame failure on the
    /// next `goto`.
    pub fail_next: Option<String>,
    pub reload_count: u32,
    history: Vec<String>,
    history_pos: usize,
}

impl Default for FakeSurface {
    fn default() -> Self {
        Self {
            url: None,
            html: None,
            title: String::new(),
            focused: false,
            muted: false,
            css_zoom: 1.0,
            visual_zoom: (1.0, false),
            mobile_mode: false,
            stop_count: 0,
            image: ImageInfo::default(),
            fail_next: None,
            reload_count: 0,
            history: Vec::new(),
            history_pos: 0,
        }
    }
}

impl FakeSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Surface for FakeSurface {
    fn goto(&mut self, page: PageType) {
        match &page {
            PageType::Url(u) => {
                self.history.truncate(self.history_pos);
                self.history.push(u.clone());
                self.history_pos = self.history.len();
            }
            PageType::Html(_) => {}
        }
        match page {
            PageType::Url(u) => {
                self.title = u.clone();
                self.url = Some(u);
                self.html = None;
            }
            PageType::Html(h) => {
                self.title = "synthetic".into();
                self.html = Some(h);
            }
        }
    }

    fn stop(&mut self) {
        self.stop_count += 1;
    }

    fn update(&mut self) {}

    fn render(&mut self, _size: Size<u32>) {}

    fn resize(&mut self, _size: Size<u32>) {}

    fn handle_keyboard_event(&mut self, _event: keyboard::Event) {}

    fn handle_mouse_event(&mut self, _point: Point, _event: mouse::Event) {}

    fn scroll(&mut self, _delta: mouse::ScrollDelta) {}

    fn reload(&mut self) {
        self.reload_count += 1;
    }

    fn go_back(&mut self) {
        if self.can_go_back() {
            self.history_pos -= 1;
            self.url = self.history.get(self.history_pos - 1).cloned();
        }
    }

    fn go_forward(&mut self) {
        if self.can_go_forward() {
            self.url = self.history.get(self.history_pos).cloned();
            self.history_pos += 1;
        }
    }

    fn can_go_back(&self) -> bool {
        self.history_pos > 1
    }

    fn can_go_forward(&self) -> bool {
        self.history_pos < self.history.len()
    }

    fn get_url(&self) -> String {
        self.url.clone().unwrap_or_default()
    }

    fn get_title(&self) -> String {
        self.title.clone()
    }

    fn get_view(&self) -> &ImageInfo {
        &self.image
    }

    fn focus(&mut self) {
        self.focused = true;
    }

    fn unfocus(&mut self) {
        self.focused = false;
    }

    fn set_css_zoom(&mut self, factor: f32) {
        self.css_zoom = factor;
    }

    fn set_visual_zoom(&mut self, factor: f32, enabled: bool) {
        self.visual_zoom = (factor, enabled);
    }

    fn set_mobile_mode(&mut self, on: bool) {
        self.mobile_mode = on;
    }

    fn set_media_muted(&mut self, muted: bool) {
        self.muted = muted;
    }
}
