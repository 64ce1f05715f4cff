//! Render context: camera, painter list and the frame they draw into.

use std::cell::Cell;
use std::rc::Rc;

use super::animation::{Animation, AnimationId, AnimationManager};
use super::camera::{CameraProjection, OrthographicCamera, ViewTransform};
use crate::event::{Event, Subscription};

// ── Frame ──

/// Depth comparison of an incoming fragment against the stored depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthFunc {
    #[default]
    Less,
    LessEqual,
    Always,
}

/// Depth test configuration, set by `DepthPainter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthState {
    pub enabled: bool,
    pub func: DepthFunc,
    /// Whether passing fragments write their depth.
    pub mask: bool,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            enabled: false,
            func: DepthFunc::Less,
            mask: true,
        }
    }
}

impl DepthState {
    pub fn passes(&self, incoming: f32, stored: f32) -> bool {
        if !self.enabled {
            return true;
        }
        match self.func {
            DepthFunc::Less => incoming < stored,
            DepthFunc::LessEqual => incoming <= stored,
            DepthFunc::Always => true,
        }
    }

    /// Depth is only written while testing is enabled.
    pub fn writes(&self) -> bool {
        self.enabled && self.mask
    }
}

/// RGBA8 color plus f32 depth, row-major, top row first.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub color: Vec<u8>,
    pub depth: Vec<f32>,
    pub depth_state: DepthState,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let n = width as usize * height as usize;
        Self {
            width,
            height,
            color: vec![0; n * 4],
            depth: vec![f32::INFINITY; n],
            depth_state: DepthState::default(),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.width != width.max(1) || self.height != height.max(1) {
            *self = Frame::new(width, height);
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.color[i],
            self.color[i + 1],
            self.color[i + 2],
            self.color[i + 3],
        ]
    }

    pub fn depth_at(&self, x: u32, y: u32) -> f32 {
        self.depth[y as usize * self.width as usize + x as usize]
    }
}

/// One step of the per-frame pipeline. Painters run in insertion order.
pub trait Painter {
    fn name(&self) -> &'static str;
    fn paint(&mut self, frame: &mut Frame, view: &ViewTransform);
}

// ── Context ──

/// Failure to bring up a rendering backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextError {
    pub message: String,
}

impl std::fmt::Display for ContextError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "render context: {}", self.message)
    }
}

impl std::error::Error for ContextError {}

pub struct RenderContext {
    camera: OrthographicCamera,
    painters: Vec<Box<dyn Painter>>,
    animations: AnimationManager,
    frame: Frame,
    /// Bumped every time `render` repaints `frame`.
    frame_serial: u64,
    /// Fired after the viewport changes size.
    pub event_resize: Event<CameraProjection>,
    dirty: Rc<Cell<bool>>,
    _camera_watch: Subscription,
}

impl RenderContext {
    pub fn new(mut camera: OrthographicCamera, width: u32, height: u32) -> Self {
        camera.set_screen_size(width.max(1) as f32, height.max(1) as f32);
        let dirty = Rc::new(Cell::new(true));
        let d = Rc::clone(&dirty);
        let camera_watch = camera
            .event_transform_change
            .subscribe(move |_| d.set(true));
        Self {
            camera,
            painters: Vec::new(),
            animations: AnimationManager::new(),
            frame: Frame::new(width, height),
            frame_serial: 0,
            event_resize: Event::new(),
            dirty,
            _camera_watch: camera_watch,
        }
    }

    pub fn camera(&self) -> &OrthographicCamera {
        &self.camera
    }

    pub(crate) fn camera_mut(&mut self) -> &mut OrthographicCamera {
        &mut self.camera
    }

    pub fn width(&self) -> u32 {
        self.frame.width
    }

    pub fn height(&self) -> u32 {
        self.frame.height
    }

    /// Change the viewport size. No-op when the size is unchanged.
    pub fn resize(&mut self, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if width == self.frame.width && height == self.frame.height {
            return;
        }
        self.camera.set_screen_size(width as f32, height as f32);
        self.frame.resize(width, height);
        self.dirty.set(true);
        self.event_resize.dispatch(&self.camera.projection());
    }

    pub fn add(&mut self, painter: Box<dyn Painter>) {
        self.painters.push(painter);
        self.dirty.set(true);
    }

    pub fn remove_all(&mut self) {
        self.painters.clear();
        self.dirty.set(true);
    }

    pub fn painter_names(&self) -> Vec<&'static str> {
        self.painters.iter().map(|p| p.name()).collect()
    }

    /// Request a repaint on the next `render`.
    pub fn paint(&self) {
        self.dirty.set(true);
    }

    pub fn needs_paint(&self) -> bool {
        self.dirty.get()
    }

    pub fn anim_schedule(&mut self, animation: Animation) -> AnimationId {
        self.dirty.set(true);
        self.animations.schedule(animation)
    }

    pub fn anim_cancel(&mut self, id: AnimationId) {
        self.animations.cancel(id);
    }

    /// Advance animations. Returns true while any are still running.
    pub fn update(&mut self, now_ms: f64) -> bool {
        if !self.animations.is_active() {
            return false;
        }
        self.animations.update(&mut self.camera, now_ms)
    }

    /// Run the painters if a repaint was requested and return the frame.
    pub fn render(&mut self) -> &Frame {
        if self.dirty.replace(false) {
            let view = self.camera.view();
            run_painters(&mut self.painters, &mut self.frame, &view);
            self.frame_serial += 1;
        }
        &self.frame
    }

    /// Paint the current view into a fresh frame of the given size.
    pub fn render_offscreen(&mut self, width: u32, height: u32) -> Frame {
        let mut frame = Frame::new(width, height);
        let view = self.camera.view_with_size(frame.width, frame.height);
        run_painters(&mut self.painters, &mut frame, &view);
        frame
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn frame_serial(&self) -> u64 {
        self.frame_serial
    }

    pub fn is_animating(&self) -> bool {
        self.animations.is_active()
    }
}

fn run_painters(painters: &mut [Box<dyn Painter>], frame: &mut Frame, view: &ViewTransform) {
    frame.depth_state = DepthState::default();
    for painter in painters.iter_mut() {
        painter.paint(frame, view);
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("size", &(self.frame.width, self.frame.height))
            .field("painters", &self.painter_names())
            .field("animations", &self.animations)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct CountingPainter(Rc<Cell<u32>>);

    impl Painter for CountingPainter {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn paint(&mut self, _frame: &mut Frame, _view: &ViewTransform) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn depth_funcs() {
        let mut s = DepthState {
            enabled: true,
            func: DepthFunc::Less,
            mask: true,
        };
        assert!(!s.passes(1.0, 1.0));
        s.func = DepthFunc::LessEqual;
        assert!(s.passes(1.0, 1.0));
        assert!(!s.passes(1.1, 1.0));
        s.enabled = false;
        assert!(s.passes(5.0, 1.0));
        assert!(!s.writes());
    }

    #[test]
    fn render_only_when_requested() {
        let hits = Rc::new(Cell::new(0));
        let mut ctx = RenderContext::new(OrthographicCamera::default(), 8, 8);
        ctx.add(Box::new(CountingPainter(Rc::clone(&hits))));
        ctx.render();
        ctx.render();
        assert_eq!(hits.get(), 1);
        assert_eq!(ctx.frame_serial(), 1);
        ctx.camera_mut().set_zoom(2.0);
        assert!(ctx.needs_paint());
        ctx.render();
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn resize_fires_event_once_per_change() {
        let mut ctx = RenderContext::new(OrthographicCamera::default(), 8, 8);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = ctx
            .event_resize
            .subscribe(move |p: &CameraProjection| s.borrow_mut().push(p.screen_height));
        ctx.resize(100, 50);
        ctx.resize(100, 50);
        ctx.resize(100, 0);
        assert_eq!(*seen.borrow(), vec![50.0, 1.0]);
        assert_eq!((ctx.width(), ctx.height()), (100, 1));
    }

    #[test]
    fn remove_all_keeps_camera() {
        let hits = Rc::new(Cell::new(0));
        let mut ctx = RenderContext::new(OrthographicCamera::default(), 8, 8);
        ctx.camera_mut().set_zoom(4.0);
        ctx.add(Box::new(CountingPainter(Rc::clone(&hits))));
        ctx.remove_all();
        assert!(ctx.painter_names().is_empty());
        assert_eq!(ctx.camera().zoom(), 4.0);
    }

    #[test]
    fn offscreen_render_has_requested_size() {
        let mut ctx = RenderContext::new(OrthographicCamera::default(), 8, 8);
        let frame = ctx.render_offscreen(32, 16);
        assert_eq!((frame.width, frame.height), (32, 16));
        assert_eq!(frame.color.len(), 32 * 16 * 4);
    }
}
