//! CPU painters: clear, depth configuration and the segment passes.
//!
//! Segments are rasterized as tapered capsules in screen space. Each pixel
//! inside a capsule gets the depth of the capsule surface facing the viewer,
//! so intersecting branches resolve correctly through the depth test.

use std::sync::Arc;

use glam::{Vec2, Vec3};
use rayon::prelude::*;

use super::camera::ViewTransform;
use super::context::{DepthFunc, DepthState, Frame, Painter};
use super::palette;
use crate::config::{Coloring, ViewerConfig};
use crate::geometry::{SegmentInstance, SegmentsData};

/// Rows per rayon work item.
const BAND_ROWS: usize = 16;

/// Capsules thinner than this are widened so they stay visible.
pub const MIN_PIXEL_RADIUS: f32 = 0.5;

// ── Clear / depth ──

#[derive(Debug, Clone, Copy)]
pub struct ClearPainter {
    pub color: [f32; 4],
    pub depth: f32,
}

impl ClearPainter {
    pub fn new(color: [f32; 4]) -> Self {
        Self {
            color,
            depth: f32::INFINITY,
        }
    }
}

impl Painter for ClearPainter {
    fn name(&self) -> &'static str {
        "clear"
    }

    fn paint(&mut self, frame: &mut Frame, _view: &ViewTransform) {
        let rgba = [
            (self.color[0].clamp(0.0, 1.0) * 255.0) as u8,
            (self.color[1].clamp(0.0, 1.0) * 255.0) as u8,
            (self.color[2].clamp(0.0, 1.0) * 255.0) as u8,
            (self.color[3].clamp(0.0, 1.0) * 255.0) as u8,
        ];
        frame
            .color
            .par_chunks_exact_mut(4)
            .for_each(|px| px.copy_from_slice(&rgba));
        frame.depth.fill(self.depth);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DepthPainter {
    pub state: DepthState,
}

impl DepthPainter {
    pub fn new(enabled: bool, func: DepthFunc, mask: bool) -> Self {
        Self {
            state: DepthState { enabled, func, mask },
        }
    }
}

impl Painter for DepthPainter {
    fn name(&self) -> &'static str {
        "depth"
    }

    fn paint(&mut self, frame: &mut Frame, _view: &ViewTransform) {
        frame.depth_state = self.state;
    }
}

// ── Segments ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentPass {
    /// Palette colored and lit.
    Fill,
    /// Enlarged, flat colored, depth-shifted toward the viewer.
    Outline,
}

/// Appearance shared by the fill and outline passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentStyle {
    pub coloring: Coloring,
    pub outline_radius_multiplier: f32,
    pub outline_depth_shift: f32,
    pub outline_color: [f32; 3],
}

impl SegmentStyle {
    pub fn from_config(config: &ViewerConfig) -> Self {
        Self {
            coloring: config.coloring,
            outline_radius_multiplier: config.outline_radius_multiplier.max(1.0),
            outline_depth_shift: config.outline_depth_shift,
            outline_color: palette::OUTLINE_COLOR,
        }
    }
}

impl Default for SegmentStyle {
    fn default() -> Self {
        Self::from_config(&ViewerConfig::default())
    }
}

/// View-space light, as in the browser's toon shading.
pub fn light_dir() -> Vec3 {
    Vec3::new(0.5, 0.8, 0.3).normalize()
}

/// Two-tone toon shading with rim light. `n` is the view-space normal; the
/// viewer looks down -Z.
pub fn toon_shade(mat: Vec3, n: Vec3) -> Vec3 {
    let n_dot_l = n.dot(light_dir()).max(0.0);
    let toon = if n_dot_l > 0.5 { 1.0 } else { 0.0 };
    let shadow_col = mat * 0.35 + Vec3::new(0.05, 0.03, 0.08);
    let col = mat * toon + shadow_col * (1.0 - toon);
    let rim = (1.0 - n.z.max(0.0)).powf(3.0) * 0.6;
    let rim_col = mat * 0.5 + Vec3::splat(0.5);
    col + rim_col * rim
}

/// One segment in frame coordinates.
#[derive(Debug, Clone, Copy)]
struct Projected {
    a: Vec2,
    b: Vec2,
    depth_a: f32,
    depth_b: f32,
    /// Fill radius in pixels
    radius_a: f32,
    radius_b: f32,
    uv_a: [f32; 2],
    uv_b: [f32; 2],
    min: Vec2,
    max: Vec2,
}

/// Closest point on the axis for one pixel.
#[derive(Debug, Clone, Copy)]
struct Sample {
    t: f32,
    offset: Vec2,
    /// Fill radius at `t`, pixels
    radius: f32,
}

impl Projected {
    fn new(seg: &SegmentInstance, view: &ViewTransform, reach: f32) -> Option<Self> {
        let pa = view.project(seg.start());
        let pb = view.project(seg.end());
        let radius_a = (seg.start_radius() / view.pixel_scale).max(MIN_PIXEL_RADIUS);
        let radius_b = (seg.end_radius() / view.pixel_scale).max(MIN_PIXEL_RADIUS);
        let pad = radius_a.max(radius_b) * reach;
        let (a, b) = (pa.truncate(), pb.truncate());
        let min = a.min(b) - Vec2::splat(pad);
        let max = a.max(b) + Vec2::splat(pad);
        if !min.is_finite() || !max.is_finite() {
            return None;
        }
        if max.x < 0.0 || max.y < 0.0 || min.x > view.width as f32 || min.y > view.height as f32 {
            return None;
        }
        Some(Self {
            a,
            b,
            depth_a: pa.z,
            depth_b: pb.z,
            radius_a,
            radius_b,
            uv_a: seg.uv_a,
            uv_b: seg.uv_b,
            min,
            max,
        })
    }

    fn sample(&self, p: Vec2, reach: f32) -> Option<Sample> {
        let ab = self.b - self.a;
        let len2 = ab.length_squared();
        let t = if len2 > 1e-12 {
            ((p - self.a).dot(ab) / len2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let offset = p - (self.a + ab * t);
        let radius = self.radius_a + (self.radius_b - self.radius_a) * t;
        let reach_radius = radius * reach;
        if offset.length_squared() > reach_radius * reach_radius {
            return None;
        }
        Some(Sample { t, offset, radius })
    }

    fn axis_depth(&self, t: f32) -> f32 {
        self.depth_a + (self.depth_b - self.depth_a) * t
    }

    fn uv(&self, t: f32) -> (f32, f32) {
        (
            self.uv_a[0] + (self.uv_b[0] - self.uv_a[0]) * t,
            self.uv_a[1] + (self.uv_b[1] - self.uv_a[1]) * t,
        )
    }
}

/// Pixel-space box covered by `seg` with its radius scaled by `reach`, or
/// `None` when it lies entirely outside the view.
#[cfg(feature = "gpu")]
pub(crate) fn screen_bounds(
    seg: &SegmentInstance,
    view: &ViewTransform,
    reach: f32,
) -> Option<(Vec2, Vec2)> {
    Projected::new(seg, view, reach).map(|p| (p.min, p.max))
}

/// Draws every segment of a `SegmentsData` as capsules, in one pass.
pub struct SegmentsPainter {
    data: Arc<SegmentsData>,
    pass: SegmentPass,
    style: SegmentStyle,
}

impl SegmentsPainter {
    pub fn new(data: Arc<SegmentsData>, pass: SegmentPass, style: SegmentStyle) -> Self {
        Self { data, pass, style }
    }

    pub fn pass(&self) -> SegmentPass {
        self.pass
    }

    fn reach(&self) -> f32 {
        match self.pass {
            SegmentPass::Fill => 1.0,
            SegmentPass::Outline => self.style.outline_radius_multiplier,
        }
    }

    /// Depth and color of this pass at one pixel, if covered.
    fn shade(&self, seg: &Projected, s: &Sample, pixel_scale: f32) -> Option<(f32, [u8; 4])> {
        let axis = seg.axis_depth(s.t);
        match self.pass {
            SegmentPass::Fill => {
                let d2 = s.offset.length_squared();
                let r2 = s.radius * s.radius;
                if d2 > r2 {
                    return None;
                }
                let h = (r2 - d2).sqrt();
                let n = Vec3::new(s.offset.x / s.radius, -s.offset.y / s.radius, h / s.radius);
                let (u, v) = seg.uv(s.t);
                let mat = Vec3::from(palette::base_color(self.style.coloring, u, v));
                let col = toon_shade(mat, n);
                Some((axis - h * pixel_scale, palette::to_rgba8(col.to_array())))
            }
            SegmentPass::Outline => {
                let depth = axis - self.style.outline_depth_shift * s.radius * pixel_scale;
                Some((depth, palette::to_rgba8(self.style.outline_color)))
            }
        }
    }
}

impl Painter for SegmentsPainter {
    fn name(&self) -> &'static str {
        match self.pass {
            SegmentPass::Fill => "segments-fill",
            SegmentPass::Outline => "segments-outline",
        }
    }

    fn paint(&mut self, frame: &mut Frame, view: &ViewTransform) {
        let reach = self.reach();
        let projected: Vec<Projected> = self
            .data
            .instances()
            .par_iter()
            .filter_map(|seg| Projected::new(seg, view, reach))
            .collect();
        if projected.is_empty() {
            return;
        }

        let width = frame.width as usize;
        let depth_state = frame.depth_state;
        let pixel_scale = view.pixel_scale;
        let this = &*self;

        frame
            .color
            .par_chunks_mut(BAND_ROWS * width * 4)
            .zip(frame.depth.par_chunks_mut(BAND_ROWS * width))
            .enumerate()
            .for_each(|(band, (color, depth))| {
                let y0 = band * BAND_ROWS;
                let y1 = y0 + depth.len() / width;
                // Segments in buffer order, so equal depths resolve the same way every frame.
                for seg in &projected {
                    if seg.max.y < y0 as f32 || seg.min.y >= y1 as f32 {
                        continue;
                    }
                    // Clamp in f32: huge radii would saturate the cast.
                    let ys = seg.min.y.floor().clamp(y0 as f32, y1 as f32) as usize;
                    let ye = (seg.max.y.ceil() + 1.0).clamp(0.0, y1 as f32) as usize;
                    let xs = seg.min.x.floor().clamp(0.0, width as f32) as usize;
                    let xe = (seg.max.x.ceil() + 1.0).clamp(0.0, width as f32) as usize;
                    for y in ys..ye {
                        for x in xs..xe {
                            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                            let Some(s) = seg.sample(p, reach) else {
                                continue;
                            };
                            let Some((d, rgba)) = this.shade(seg, &s, pixel_scale) else {
                                continue;
                            };
                            let i = (y - y0) * width + x;
                            if !depth_state.passes(d, depth[i]) {
                                continue;
                            }
                            if depth_state.writes() {
                                depth[i] = d;
                            }
                            color[i * 4..i * 4 + 4].copy_from_slice(&rgba);
                        }
                    }
                }
            });
    }
}

/// Clear → depth (LEQUAL) → fill → outline.
pub fn cpu_pipeline(data: Arc<SegmentsData>, config: &ViewerConfig) -> Vec<Box<dyn Painter>> {
    let style = SegmentStyle::from_config(config);
    vec![
        Box::new(ClearPainter::new(config.background_color)),
        Box::new(DepthPainter::new(true, DepthFunc::LessEqual, true)),
        Box::new(SegmentsPainter::new(Arc::clone(&data), SegmentPass::Fill, style)),
        Box::new(SegmentsPainter::new(data, SegmentPass::Outline, style)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::nodes_to_segments;
    use crate::render::camera::OrthographicCamera;
    use crate::swc::parse_swc;

    fn view(size: u32, world_height: f32) -> ViewTransform {
        let mut cam = OrthographicCamera::default();
        cam.set_space_height_at_target(world_height);
        cam.set_screen_size(size as f32, size as f32);
        cam.view()
    }

    fn run(painters: &mut [Box<dyn Painter>], size: u32, view: &ViewTransform) -> Frame {
        let mut frame = Frame::new(size, size);
        for p in painters.iter_mut() {
            p.paint(&mut frame, view);
        }
        frame
    }

    #[test]
    fn clear_fills_color_and_depth() {
        let mut frame = Frame::new(4, 4);
        let v = view(4, 4.0);
        ClearPainter::new([1.0, 0.0, 0.0, 1.0]).paint(&mut frame, &v);
        assert_eq!(frame.pixel(3, 3), [255, 0, 0, 255]);
        assert_eq!(frame.depth_at(0, 0), f32::INFINITY);
    }

    #[test]
    fn toon_shading_has_two_tones() {
        let mat = Vec3::new(0.8, 0.2, 0.2);
        let lit = toon_shade(mat, light_dir());
        let dark = toon_shade(mat, -light_dir());
        assert!(lit.x > dark.x, "lit side should be brighter");
    }

    #[test]
    fn segment_covers_its_axis_and_outline_rings_it() {
        // Horizontal axon segment through the middle of a 64 px frame.
        let text = "1 2 -20 0 0 4 -1\n2 2 20 0 0 4 1\n";
        let data = Arc::new(nodes_to_segments(&parse_swc(text)));
        let v = view(64, 64.0);
        let mut painters = cpu_pipeline(data, &ViewerConfig::default());
        let frame = run(&mut painters, 64, &v);

        let center = frame.pixel(32, 32);
        assert_ne!(center, [255, 255, 255, 255], "axis pixel should be painted");
        assert!(frame.depth_at(32, 32) < 0.0, "surface is in front of the axis");

        // Radius 4 px, outline reaches 4.8 px: row 32 - 4.5 is outline only.
        assert_eq!(frame.pixel(32, 27), [0, 0, 0, 255]);
        // Far away stays background.
        assert_eq!(frame.pixel(32, 5), [255, 255, 255, 255]);
    }

    #[test]
    fn nearer_segment_wins_at_crossing() {
        // Two crossing segments, the vertical one closer to the viewer (+z).
        let text = "1 2 -20 0 -10 3 -1\n2 2 20 0 -10 3 1\n3 3 0 -20 10 3 -1\n4 3 0 20 10 3 3\n";
        let data = Arc::new(nodes_to_segments(&parse_swc(text)));
        let v = view(64, 64.0);
        let config = ViewerConfig::default();
        let mut painters = cpu_pipeline(data, &config);
        let frame = run(&mut painters, 64, &v);
        let basal = palette::section_color(crate::swc::CellNodeType::BasalDendrite.texture_coord());
        let px = frame.pixel(32, 32);
        let mat = Vec3::from(basal);
        // Pixel center sits 0.5 px right of the vertical axis.
        let h = (9.0f32 - 0.25).sqrt();
        let n = Vec3::new(0.5 / 3.0, 0.0, h / 3.0);
        let expected = palette::to_rgba8(toon_shade(mat, n).to_array());
        for c in 0..3 {
            assert!((px[c] as i32 - expected[c] as i32).abs() <= 8, "pixel {px:?} vs {expected:?}");
        }
    }

    #[test]
    fn huge_radius_does_not_overflow_pixel_bounds() {
        let text = "1 2 0 0 0 1e25 -1\n2 2 0 10 0 1 1\n";
        let data = Arc::new(nodes_to_segments(&parse_swc(text)));
        assert_eq!(data.len(), 1);
        let v = view(64, 64.0);
        let mut painters = cpu_pipeline(data, &ViewerConfig::default());
        let frame = run(&mut painters, 64, &v);
        assert_eq!(frame.color.len(), 64 * 64 * 4);
    }

    #[test]
    fn offscreen_segments_are_skipped() {
        let text = "1 2 1000 1000 0 1 -1\n2 2 1010 1000 0 1 1\n";
        let data = Arc::new(nodes_to_segments(&parse_swc(text)));
        let v = view(32, 32.0);
        let mut painters = cpu_pipeline(data, &ViewerConfig::default());
        let frame = run(&mut painters, 32, &v);
        assert!(frame.color.chunks(4).all(|px| px == [255, 255, 255, 255]));
    }
}
