//! SWC viewer orchestration: load → parse → segments → render context.
//!
//! Lifecycle:
//!   Idle → Loading → Ready → (Reloading on href change) → Ready
//!   any → Failed on fetch or render-context errors
//!   any → Disposed (terminal)
//!
//! The render context is created once and reused across reloads; only its
//! painters are replaced.

pub mod loader;

use std::sync::Arc;

use glam::{Quat, Vec2};

use crate::config::{Backend, Coloring, ViewerConfig};
use crate::geometry::{nodes_to_segments, SegmentStats, SegmentsData};
use crate::net::{resolve_href, DefaultFetcher, FetchError, Fetcher};
use crate::render::animation::interpolate_camera;
use crate::render::controller::OrbitController;
use crate::render::gizmo::{self, GizmoAxis, GizmoHandle};
use crate::render::painters::cpu_pipeline;
use crate::render::palette::{self, Legend};
use crate::render::{ContextError, Frame, OrthographicCamera, Painter, RenderContext};
use crate::scalebar::{DrawOp, PixelScaleWatcher, ScalebarAttributes, Scalebar};
use crate::swc::{parse_swc, CellNodeType, CellNodes};

use loader::{Loader, Wakeup};

#[cfg(feature = "gpu")]
use std::rc::Rc;

#[cfg(feature = "gpu")]
use crate::render::gpu_renderer::{GpuRenderer, GpuSegmentsPainter};
#[cfg(feature = "gpu")]
use crate::render::painters::{ClearPainter, DepthPainter, SegmentStyle};
#[cfg(feature = "gpu")]
use crate::render::DepthFunc;

/// Viewport used until the host reports a size.
const DEFAULT_VIEWPORT: (u32, u32) = (640, 480);

// ── State / errors ──

/// Errors the host is expected to show instead of a rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerError {
    Fetch(FetchError),
    RenderContext(ContextError),
}

impl std::fmt::Display for ViewerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewerError::Fetch(e) => write!(f, "failed to load morphology: {e}"),
            ViewerError::RenderContext(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ViewerError {}

impl From<FetchError> for ViewerError {
    fn from(e: FetchError) -> Self {
        ViewerError::Fetch(e)
    }
}

impl From<ContextError> for ViewerError {
    fn from(e: ContextError) -> Self {
        ViewerError::RenderContext(e)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerState {
    Idle,
    Loading,
    Ready,
    /// A new href is loading while the previous morphology stays on screen.
    Reloading,
    Failed(ViewerError),
    Disposed,
}

/// Everything derived from one SWC text.
struct Morphology {
    nodes: CellNodes,
    segments: Arc<SegmentsData>,
    max_distance: f32,
    present: Vec<CellNodeType>,
}

impl Morphology {
    fn from_text(text: &str) -> Self {
        let parsed = parse_swc(text);
        let (nodes, max_distance) = parsed.with_soma_distance();
        let segments = Arc::new(nodes_to_segments(&nodes));
        let present = CellNodeType::ALL
            .into_iter()
            .filter(|t| nodes.iter().any(|n| n.node_type == *t))
            .collect();
        Self {
            nodes,
            segments,
            max_distance,
            present,
        }
    }
}

// ── Viewer ──

pub struct SwcViewer {
    config: ViewerConfig,
    state: ViewerState,
    href: Option<String>,
    loader: Loader,
    viewport: (u32, u32),
    context: Option<RenderContext>,
    controller: Option<OrbitController>,
    watcher: PixelScaleWatcher,
    scalebar: Scalebar,
    morphology: Option<Morphology>,
    #[cfg(feature = "gpu")]
    gpu: Option<Rc<GpuRenderer>>,
}

impl SwcViewer {
    pub fn new(config: ViewerConfig) -> Self {
        Self::with_fetcher(config, Arc::new(DefaultFetcher::new()))
    }

    pub fn with_fetcher(config: ViewerConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let watcher = PixelScaleWatcher::new();
        let scalebar = Scalebar::new(&watcher, config.scalebar.clone());
        Self {
            config,
            state: ViewerState::Idle,
            href: None,
            loader: Loader::new(fetcher),
            viewport: DEFAULT_VIEWPORT,
            context: None,
            controller: None,
            watcher,
            scalebar,
            morphology: None,
            #[cfg(feature = "gpu")]
            gpu: None,
        }
    }

    /// Called from the loader thread when a fetch completes, e.g. to wake
    /// the UI loop.
    pub fn set_wakeup(&mut self, wakeup: impl Fn() + Send + Sync + 'static) {
        let wakeup: Wakeup = Arc::new(wakeup);
        self.loader.set_wakeup(Some(wakeup));
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    /// Start loading `href`, superseding any load in flight.
    pub fn set_href(&mut self, href: &str) {
        if self.state == ViewerState::Disposed {
            return;
        }
        self.href = Some(href.to_string());
        let url = match resolve_href(self.config.base_url.as_deref(), href) {
            Ok(url) => url,
            Err(e) => {
                self.loader.cancel();
                self.fail(e.into());
                return;
            }
        };
        self.state = match self.state {
            ViewerState::Ready | ViewerState::Reloading => ViewerState::Reloading,
            _ => ViewerState::Loading,
        };
        log::info!("loading {url}");
        self.loader.start(url);
    }

    /// Pick up a finished load. Returns true if the state changed.
    pub fn poll(&mut self) -> bool {
        if self.state == ViewerState::Disposed {
            return false;
        }
        match self.loader.poll() {
            Some(Ok(text)) => {
                self.load_text(&text);
                true
            }
            Some(Err(e)) => {
                self.fail(e.into());
                true
            }
            None => false,
        }
    }

    /// Replace the displayed morphology with `text`.
    pub fn load_text(&mut self, text: &str) {
        if self.state == ViewerState::Disposed {
            return;
        }
        let morphology = Morphology::from_text(text);
        let stats = morphology.segments.stats();
        log::info!(
            "loaded {} nodes / {} segments ({} dangling, {} soma-excluded)",
            morphology.nodes.len(),
            morphology.segments.len(),
            stats.dangling,
            stats.soma_excluded
        );

        if let Err(e) = self.ensure_context() {
            self.fail(e.into());
            return;
        }
        let painters = match self.segment_painters(Arc::clone(&morphology.segments)) {
            Ok(painters) => painters,
            Err(e) => {
                self.fail(e.into());
                return;
            }
        };

        if let Some(context) = self.context.as_mut() {
            context.remove_all();
            fit_camera(context.camera_mut(), &morphology.nodes, &self.config);
            for painter in painters {
                context.add(painter);
            }
            context.paint();
        }
        self.watcher.set_context(self.context.as_ref());
        self.morphology = Some(morphology);
        self.state = ViewerState::Ready;
    }

    /// Switch coloring and rebuild the segment painters.
    pub fn set_coloring(&mut self, coloring: Coloring) {
        if self.config.coloring == coloring {
            return;
        }
        self.config.coloring = coloring;
        let Some(segments) = self.morphology.as_ref().map(|m| Arc::clone(&m.segments)) else {
            return;
        };
        match self.segment_painters(segments) {
            Ok(painters) => {
                if let Some(context) = self.context.as_mut() {
                    context.remove_all();
                    for painter in painters {
                        context.add(painter);
                    }
                }
            }
            Err(e) => self.fail(e.into()),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        if let Some(context) = self.context.as_mut() {
            context.resize(width, height);
        }
    }

    // ── Interaction ──

    pub fn drag(&mut self, delta: Vec2, now_ms: f64) {
        if let (Some(context), Some(controller)) = (self.context.as_mut(), self.controller.as_mut()) {
            controller.drag(context.camera_mut(), delta, now_ms);
        }
    }

    pub fn release(&mut self, now_ms: f64) {
        if let Some(controller) = self.controller.as_mut() {
            controller.release(now_ms);
        }
    }

    /// Zoom by scroll notches (positive zooms in).
    pub fn scroll(&mut self, steps: f32) {
        if let (Some(context), Some(controller)) = (self.context.as_mut(), self.controller.as_ref()) {
            controller.scroll(context.camera_mut(), steps);
        }
    }

    pub fn gizmo_handles(&self, radius: f32) -> Vec<GizmoHandle> {
        self.context
            .as_ref()
            .map(|c| gizmo::layout(c.camera(), radius))
            .unwrap_or_default()
    }

    /// Jump the camera to look along `axis`.
    pub fn orient_to(&mut self, axis: GizmoAxis) {
        let duration = self.config.gizmo_duration_ms;
        if let Some(context) = self.context.as_mut() {
            let from = context.camera().orientation();
            interpolate_camera(context, from, axis.orientation(), duration);
        }
    }

    /// Click on the gizmo at `point` (relative to its center).
    pub fn pick_gizmo(&mut self, point: Vec2, radius: f32, hit_radius: f32) -> Option<GizmoAxis> {
        let axis = gizmo::pick(&self.gizmo_handles(radius), point, hit_radius)?;
        self.orient_to(axis);
        Some(axis)
    }

    // ── Rendering ──

    /// Advance inertia and animations, then repaint if needed.
    pub fn frame(&mut self, now_ms: f64) -> Option<&Frame> {
        let context = self.context.as_mut()?;
        if let Some(controller) = self.controller.as_mut() {
            controller.update(context.camera_mut(), now_ms);
        }
        context.update(now_ms);
        Some(context.render())
    }

    /// True while the camera is moving on its own.
    pub fn is_animating(&self) -> bool {
        let spinning = self.controller.as_ref().is_some_and(|c| c.is_spinning());
        let busy = self
            .context
            .as_ref()
            .is_some_and(|c| c.needs_paint() || c.is_animating());
        spinning || busy
    }

    /// Render the current view off-screen at the given size.
    pub fn snapshot(&mut self, width: u32, height: u32) -> Option<Frame> {
        self.context
            .as_mut()
            .map(|c| c.render_offscreen(width, height))
    }

    pub fn context(&self) -> Option<&RenderContext> {
        self.context.as_ref()
    }

    // ── Overlays ──

    pub fn pixel_scale(&self) -> f64 {
        self.watcher.pixel_scale()
    }

    pub fn watcher(&self) -> &PixelScaleWatcher {
        &self.watcher
    }

    pub fn scalebar_attributes(&self) -> Option<ScalebarAttributes> {
        self.scalebar.attributes()
    }

    /// Scale bar draw calls for an overlay of the given size.
    pub fn scalebar_ops(&mut self, width: f64, height: f64) -> Option<&[DrawOp]> {
        if self.state != ViewerState::Ready && self.state != ViewerState::Reloading {
            return None;
        }
        self.scalebar.draw_ops(width, height)
    }

    pub fn legend(&self) -> Option<Legend> {
        let m = self.morphology.as_ref()?;
        Some(palette::legend(
            self.config.coloring,
            &m.present,
            m.max_distance,
            &self.config.scalebar.unit,
        ))
    }

    pub fn nodes(&self) -> Option<&CellNodes> {
        self.morphology.as_ref().map(|m| &m.nodes)
    }

    pub fn segment_stats(&self) -> Option<SegmentStats> {
        self.morphology.as_ref().map(|m| m.segments.stats())
    }

    pub fn segment_count(&self) -> usize {
        self.morphology.as_ref().map_or(0, |m| m.segments.len())
    }

    // ── Teardown ──

    /// Detach the watcher, drop the context and GPU resources, and ignore
    /// any load still in flight.
    pub fn dispose(&mut self) {
        if self.state == ViewerState::Disposed {
            return;
        }
        self.loader.cancel();
        self.watcher.set_context(None);
        self.controller = None;
        self.context = None;
        self.morphology = None;
        #[cfg(feature = "gpu")]
        {
            self.gpu = None;
        }
        self.state = ViewerState::Disposed;
        log::info!("viewer disposed");
    }

    // ── Internals ──

    fn fail(&mut self, error: ViewerError) {
        log::warn!("{error}");
        self.state = ViewerState::Failed(error);
    }

    /// Create the context, controller and backend once.
    fn ensure_context(&mut self) -> Result<(), ContextError> {
        if self.context.is_some() {
            return Ok(());
        }
        let (width, height) = self.viewport;
        if width == 0 || height == 0 {
            return Err(ContextError {
                message: format!("viewport has no area ({width}×{height})"),
            });
        }
        self.init_backend()?;
        let camera = OrthographicCamera::new(self.config.near, self.config.far);
        self.context = Some(RenderContext::new(camera, width, height));
        self.controller = Some(OrbitController::new(&self.config));
        Ok(())
    }

    #[cfg(feature = "gpu")]
    fn init_backend(&mut self) -> Result<(), ContextError> {
        if self.config.backend == Backend::Cpu {
            return Ok(());
        }
        self.gpu = GpuRenderer::new().map(Rc::new);
        match (self.config.backend, &self.gpu) {
            (Backend::Gpu, None) => Err(ContextError {
                message: "no GPU adapter available".to_string(),
            }),
            (Backend::Auto, None) => {
                log::info!("no GPU adapter, using the CPU rasterizer");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    #[cfg(not(feature = "gpu"))]
    fn init_backend(&mut self) -> Result<(), ContextError> {
        match self.config.backend {
            Backend::Gpu => Err(ContextError {
                message: "built without GPU support".to_string(),
            }),
            Backend::Auto | Backend::Cpu => Ok(()),
        }
    }

    #[cfg(feature = "gpu")]
    fn segment_painters(&self, data: Arc<SegmentsData>) -> Result<Vec<Box<dyn Painter>>, ContextError> {
        match &self.gpu {
            Some(gpu) if self.config.backend != Backend::Cpu => {
                let style = SegmentStyle::from_config(&self.config);
                Ok(vec![
                    Box::new(ClearPainter::new(self.config.background_color)),
                    Box::new(DepthPainter::new(true, DepthFunc::LessEqual, true)),
                    Box::new(GpuSegmentsPainter::new(Rc::clone(gpu), data, style)),
                ])
            }
            _ => Ok(cpu_pipeline(data, &self.config)),
        }
    }

    #[cfg(not(feature = "gpu"))]
    fn segment_painters(&self, data: Arc<SegmentsData>) -> Result<Vec<Box<dyn Painter>>, ContextError> {
        Ok(cpu_pipeline(data, &self.config))
    }
}

impl Drop for SwcViewer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for SwcViewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwcViewer")
            .field("state", &self.state)
            .field("href", &self.href)
            .field("context", &self.context)
            .finish()
    }
}

/// Target the center; show `camera_headroom` × the vertical half-extent.
fn fit_camera(camera: &mut OrthographicCamera, nodes: &CellNodes, config: &ViewerConfig) {
    let half = nodes.bbox().half_extent();
    let mut extent = half.y;
    if !(extent > 0.0) {
        // Flat in y: fall back to the largest extent, then to one unit.
        extent = half.max_element();
        if !(extent > 0.0) {
            extent = 1.0;
        }
    }
    camera.set_orientation(Quat::IDENTITY);
    camera.set_zoom(1.0);
    camera.set_target(nodes.center());
    camera.set_space_height_at_target(config.camera_headroom * extent);
}

#[cfg(test)]
mod tests {
    use super::loader::tests::{wait_for, TestFetcher};
    use super::*;
    use glam::Vec3;

    const THREE_NODES: &str = "1 1 0 0 0 5 -1\n2 2 0 10 0 1 1\n3 2 0 20 0 1 2\n";
    const OTHER: &str = "1 3 0 0 0 1 -1\n2 3 0 -40 0 1 1\n";

    fn cpu() -> ViewerConfig {
        ViewerConfig::default().with_backend(Backend::Cpu)
    }

    fn viewer(fetcher: TestFetcher) -> (SwcViewer, Arc<TestFetcher>) {
        let fetcher = Arc::new(fetcher);
        let v = SwcViewer::with_fetcher(cpu(), Arc::clone(&fetcher) as Arc<dyn Fetcher>);
        (v, fetcher)
    }

    fn settle(v: &mut SwcViewer) -> bool {
        wait_for(|| v.poll().then_some(())).is_some()
    }

    #[test]
    fn load_reaches_ready() {
        let (mut v, _) = viewer(TestFetcher::default().with("a.swc", THREE_NODES));
        assert_eq!(*v.state(), ViewerState::Idle);
        v.set_href("a.swc");
        assert_eq!(*v.state(), ViewerState::Loading);
        assert!(settle(&mut v));
        assert_eq!(*v.state(), ViewerState::Ready);
        assert_eq!(v.nodes().map(|n| n.len()), Some(3));
        assert_eq!(v.segment_count(), 1);
        assert_eq!(v.segment_stats().map(|s| s.soma_excluded), Some(1));
    }

    #[test]
    fn camera_fits_morphology() {
        let mut v = SwcViewer::with_fetcher(cpu(), Arc::new(TestFetcher::default()));
        v.load_text(THREE_NODES);
        let camera = v.context().map(|c| c.camera()).unwrap();
        assert_eq!(camera.target(), Vec3::new(0.0, 10.0, 0.0));
        assert!((camera.space_height_at_target() - 25.0).abs() < 1e-5);
        assert_eq!(
            v.context().unwrap().painter_names(),
            vec!["clear", "depth", "segments-fill", "segments-outline"]
        );
    }

    #[test]
    fn fetch_failure_is_surfaced() {
        let (mut v, _) = viewer(TestFetcher::default().failing("missing.swc", 404));
        v.set_href("missing.swc");
        assert!(settle(&mut v));
        match v.state() {
            ViewerState::Failed(ViewerError::Fetch(e)) => assert_eq!(e.status, Some(404)),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn reload_reuses_context_and_reattaches_watcher() {
        let (mut v, _) = viewer(
            TestFetcher::default()
                .with("a.swc", THREE_NODES)
                .with("b.swc", OTHER),
        );
        v.set_href("a.swc");
        assert!(settle(&mut v));
        let first = v.context().map(|c| c as *const RenderContext);
        v.set_href("b.swc");
        assert_eq!(*v.state(), ViewerState::Reloading);
        assert!(settle(&mut v));
        assert_eq!(*v.state(), ViewerState::Ready);
        assert_eq!(v.context().map(|c| c as *const RenderContext), first);
        let ctx = v.context().unwrap();
        assert_eq!(ctx.event_resize.listener_count(), 1);
        assert_eq!(ctx.painter_names().len(), 4);
        // 2.5 × half of 40 over 480 px.
        assert!((v.pixel_scale() - 50.0 / 480.0).abs() < 1e-9);
    }

    #[test]
    fn stale_load_is_discarded() {
        let (mut v, fetcher) = viewer(
            TestFetcher::default()
                .with("slow.swc", OTHER)
                .with("fast.swc", THREE_NODES)
                .gated("slow.swc"),
        );
        v.set_href("slow.swc");
        v.set_href("fast.swc");
        assert!(settle(&mut v));
        fetcher.release("slow.swc");
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(!v.poll());
        assert_eq!(v.nodes().map(|n| n.len()), Some(3));
    }

    #[test]
    fn unresolvable_href_cancels_pending_load() {
        let fetcher = Arc::new(
            TestFetcher::default()
                .with("https://a.org/old.swc", OTHER)
                .gated("https://a.org/old.swc"),
        );
        let config = cpu().with_base_url("not a url");
        let mut v = SwcViewer::with_fetcher(config, Arc::clone(&fetcher) as Arc<dyn Fetcher>);
        v.set_href("https://a.org/old.swc");
        assert_eq!(*v.state(), ViewerState::Loading);
        v.set_href("new.swc");
        assert!(matches!(v.state(), ViewerState::Failed(ViewerError::Fetch(_))));
        fetcher.release("https://a.org/old.swc");
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(!v.poll());
        assert!(matches!(v.state(), ViewerState::Failed(ViewerError::Fetch(_))));
        assert_eq!(v.href(), Some("new.swc"));
        assert!(v.nodes().is_none());
    }

    #[test]
    fn dispose_detaches_everything() {
        let mut v = SwcViewer::with_fetcher(cpu(), Arc::new(TestFetcher::default()));
        v.load_text(THREE_NODES);
        assert!(v.watcher().is_attached());
        v.dispose();
        assert_eq!(*v.state(), ViewerState::Disposed);
        assert!(!v.watcher().is_attached());
        assert!(v.context().is_none());
        assert_eq!(v.pixel_scale(), 1.0);
        v.set_href("a.swc");
        assert_eq!(*v.state(), ViewerState::Disposed);
    }

    #[test]
    fn zero_viewport_fails_context_creation() {
        let mut v = SwcViewer::with_fetcher(cpu(), Arc::new(TestFetcher::default()));
        v.resize(0, 300);
        v.load_text(THREE_NODES);
        assert!(matches!(v.state(), ViewerState::Failed(ViewerError::RenderContext(_))));
    }

    #[test]
    fn frame_renders_and_snapshot_has_size() {
        let mut v = SwcViewer::with_fetcher(cpu(), Arc::new(TestFetcher::default()));
        v.resize(64, 64);
        v.load_text(THREE_NODES);
        let frame = v.frame(0.0).unwrap();
        assert_eq!((frame.width, frame.height), (64, 64));
        assert!(frame.color.chunks(4).any(|px| px != [255, 255, 255, 255]));
        let shot = v.snapshot(128, 32).unwrap();
        assert_eq!(shot.color.len(), 128 * 32 * 4);
    }

    #[test]
    fn gizmo_pick_animates_camera() {
        let mut v = SwcViewer::with_fetcher(cpu(), Arc::new(TestFetcher::default()));
        v.load_text(THREE_NODES);
        let axis = v.pick_gizmo(Vec2::new(30.0, 0.0), 30.0, 6.0);
        assert_eq!(axis, Some(GizmoAxis::PosX));
        v.frame(0.0);
        v.frame(600.0);
        let back = v.context().unwrap().camera().back();
        assert!(back.distance(Vec3::X) < 1e-4);
    }

    #[test]
    fn legend_follows_coloring() {
        let mut v = SwcViewer::with_fetcher(cpu(), Arc::new(TestFetcher::default()));
        v.load_text(THREE_NODES);
        match v.legend() {
            Some(Legend::Discrete(entries)) => {
                let labels: Vec<_> = entries.iter().map(|(l, _)| l.as_str()).collect();
                assert_eq!(labels, vec!["Soma", "Axon"]);
            }
            other => panic!("unexpected legend {other:?}"),
        }
        v.set_coloring(Coloring::Distance);
        assert!(matches!(v.legend(), Some(Legend::Ramp { .. })));
        assert_eq!(v.context().unwrap().painter_names().len(), 4);
    }
}
