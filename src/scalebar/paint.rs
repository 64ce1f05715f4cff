//! Drawing the scale bar onto a 2D canvas.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::compute::{compute_scalebar_attributes, ScalebarAttributes, ScalebarOptions};
use super::watcher::PixelScaleWatcher;
use crate::event::Subscription;

/// Minimal 2D canvas the scale bar draws on.
pub trait Canvas2d {
    /// Size the host lays the canvas out at.
    fn client_size(&self) -> (f64, f64);
    /// Set the backing size; also clears the canvas.
    fn set_size(&mut self, width: f64, height: f64);
    fn set_style(&mut self, color: [f32; 4], font_height: f32);
    fn stroke_line(&mut self, from: (f64, f64), to: (f64, f64));
    fn fill_text(&mut self, text: &str, x: f64, y: f64);
}

/// Ticks every `size_in_pixel` from x = 0.5, each but the first labelled.
pub fn paint_scalebar(
    canvas: &mut dyn Canvas2d,
    attributes: &ScalebarAttributes,
    options: &ScalebarOptions,
) {
    let (w, h) = canvas.client_size();
    // No device-pixel-ratio scaling: backing size equals client size.
    canvas.set_size(w, h);
    if !(attributes.size_in_pixel > 0.0) || !attributes.size_in_pixel.is_finite() {
        return;
    }
    let font_height = options.font_height as f64;
    let margin = font_height / 4.0;
    canvas.set_style(options.color, options.font_height);

    // Half-pixel offset keeps one-pixel lines crisp.
    let mut x = 0.5;
    let y = (font_height + h) / 2.0;
    let mut n = 0;
    while x < w {
        if n > 0 {
            canvas.fill_text(&attributes.label(n), x + margin, y);
        }
        canvas.stroke_line((x, 0.0), (x, h));
        x += attributes.size_in_pixel;
        n += 1;
    }
}

// ── Recording canvas ──

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Style { color: [f32; 4], font_height: f32 },
    Line { from: (f64, f64), to: (f64, f64) },
    Text { text: String, x: f64, y: f64 },
}

/// Canvas that keeps the draw calls so a host can replay them every frame.
#[derive(Debug, Clone, Default)]
pub struct RecordingCanvas {
    client: (f64, f64),
    size: (f64, f64),
    ops: Vec<DrawOp>,
}

impl RecordingCanvas {
    pub fn new(client_width: f64, client_height: f64) -> Self {
        Self {
            client: (client_width, client_height),
            ..Self::default()
        }
    }

    pub fn set_client_size(&mut self, width: f64, height: f64) {
        self.client = (width, height);
    }

    pub fn size(&self) -> (f64, f64) {
        self.size
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }
}

impl Canvas2d for RecordingCanvas {
    fn client_size(&self) -> (f64, f64) {
        self.client
    }

    fn set_size(&mut self, width: f64, height: f64) {
        self.size = (width, height);
        self.ops.clear();
    }

    fn set_style(&mut self, color: [f32; 4], font_height: f32) {
        self.ops.push(DrawOp::Style { color, font_height });
    }

    fn stroke_line(&mut self, from: (f64, f64), to: (f64, f64)) {
        self.ops.push(DrawOp::Line { from, to });
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        self.ops.push(DrawOp::Text {
            text: text.to_string(),
            x,
            y,
        });
    }
}

// ── Component ──

/// Scale bar bound to a watcher. Recomputes only on pixel-scale events and
/// re-records its drawing only when those or the client size change.
pub struct Scalebar {
    options: ScalebarOptions,
    attributes: Rc<RefCell<Option<ScalebarAttributes>>>,
    dirty: Rc<Cell<bool>>,
    canvas: RecordingCanvas,
    _watch: Subscription,
}

impl Scalebar {
    pub fn new(watcher: &PixelScaleWatcher, options: ScalebarOptions) -> Self {
        let attributes = Rc::new(RefCell::new(compute_scalebar_attributes(
            watcher.pixel_scale(),
            &options,
        )));
        let dirty = Rc::new(Cell::new(true));

        let (a, d, o) = (Rc::clone(&attributes), Rc::clone(&dirty), options.clone());
        let watch = watcher
            .event_pixel_scale_change
            .subscribe(move |scale: &f64| {
                *a.borrow_mut() = compute_scalebar_attributes(*scale, &o);
                d.set(true);
            });

        Self {
            options,
            attributes,
            dirty,
            canvas: RecordingCanvas::default(),
            _watch: watch,
        }
    }

    pub fn attributes(&self) -> Option<ScalebarAttributes> {
        self.attributes.borrow().clone()
    }

    pub fn options(&self) -> &ScalebarOptions {
        &self.options
    }

    /// Draw calls for a canvas of the given client size. `None` hides the bar.
    pub fn draw_ops(&mut self, client_width: f64, client_height: f64) -> Option<&[DrawOp]> {
        let attributes = self.attributes.borrow().clone()?;
        if self.dirty.get() || self.canvas.size() != (client_width, client_height) {
            self.canvas.set_client_size(client_width, client_height);
            paint_scalebar(&mut self.canvas, &attributes, &self.options);
            self.dirty.set(false);
        }
        Some(self.canvas.ops())
    }
}

impl std::fmt::Debug for Scalebar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scalebar")
            .field("attributes", &self.attributes.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{OrthographicCamera, RenderContext};

    fn lines(ops: &[DrawOp]) -> Vec<f64> {
        ops.iter()
            .filter_map(|op| match op {
                DrawOp::Line { from, .. } => Some(from.0),
                _ => None,
            })
            .collect()
    }

    fn texts(ops: &[DrawOp]) -> Vec<(String, f64, f64)> {
        ops.iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, x, y } => Some((text.clone(), *x, *y)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn ticks_start_at_half_pixel() {
        let mut canvas = RecordingCanvas::new(250.0, 20.0);
        let attrs = ScalebarAttributes {
            size_in_pixel: 100.0,
            value: 50.0,
            unit: "µm".into(),
        };
        paint_scalebar(&mut canvas, &attrs, &ScalebarOptions::default());
        assert_eq!(canvas.size(), (250.0, 20.0));
        assert_eq!(lines(canvas.ops()), vec![0.5, 100.5, 200.5]);
        assert_eq!(
            texts(canvas.ops()),
            vec![
                ("50 µm".to_string(), 103.5, 16.0),
                ("100 µm".to_string(), 203.5, 16.0),
            ]
        );
    }

    #[test]
    fn zero_size_draws_nothing() {
        let mut canvas = RecordingCanvas::new(100.0, 20.0);
        let attrs = ScalebarAttributes {
            size_in_pixel: 0.0,
            value: 1.0,
            unit: "µm".into(),
        };
        paint_scalebar(&mut canvas, &attrs, &ScalebarOptions::default());
        assert!(canvas.ops().is_empty());
    }

    #[test]
    fn component_follows_watcher() {
        let mut camera = OrthographicCamera::default();
        camera.set_space_height_at_target(500.0);
        let mut ctx = RenderContext::new(camera, 300, 500);
        let mut watcher = PixelScaleWatcher::new();
        watcher.set_context(Some(&ctx));

        let mut bar = Scalebar::new(&watcher, ScalebarOptions::default());
        assert_eq!(bar.attributes().map(|a| a.value), Some(100.0));
        let first = bar.draw_ops(300.0, 20.0).map(|ops| ops.to_vec());

        ctx.camera_mut().set_zoom(10.0);
        assert_eq!(bar.attributes().map(|a| a.value), Some(10.0));
        let second = bar.draw_ops(300.0, 20.0).map(|ops| ops.to_vec());
        assert_ne!(first, second);
    }
}
