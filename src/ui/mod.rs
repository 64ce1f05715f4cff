//! egui helpers for the viewer window: frame upload, scale bar replay,
//! legend and gizmo widgets.

use eframe::egui;
use morpho_viewer::render::gizmo::GizmoHandle;
use morpho_viewer::render::palette::{self, Legend};
use morpho_viewer::render::Frame;
use morpho_viewer::scalebar::DrawOp;

// ─── Conversions ──────────────────────────────────────────────────────────────

pub fn color32(c: [f32; 3]) -> egui::Color32 {
    egui::Color32::from_rgb(
        (c[0].clamp(0.0, 1.0) * 255.0) as u8,
        (c[1].clamp(0.0, 1.0) * 255.0) as u8,
        (c[2].clamp(0.0, 1.0) * 255.0) as u8,
    )
}

fn color32_rgba(c: [f32; 4]) -> egui::Color32 {
    egui::Color32::from_rgba_unmultiplied(
        (c[0].clamp(0.0, 1.0) * 255.0) as u8,
        (c[1].clamp(0.0, 1.0) * 255.0) as u8,
        (c[2].clamp(0.0, 1.0) * 255.0) as u8,
        (c[3].clamp(0.0, 1.0) * 255.0) as u8,
    )
}

pub fn frame_image(frame: &Frame) -> egui::ColorImage {
    egui::ColorImage::from_rgba_unmultiplied(
        [frame.width as usize, frame.height as usize],
        &frame.color,
    )
}

// ─── Scale bar ────────────────────────────────────────────────────────────────

/// Replay recorded scale bar calls inside `rect`.
pub fn paint_draw_ops(painter: &egui::Painter, rect: egui::Rect, ops: &[DrawOp]) {
    let mut color = egui::Color32::BLACK;
    let mut font = egui::FontId::proportional(12.0);
    let at = |x: f64, y: f64| rect.min + egui::vec2(x as f32, y as f32);

    for op in ops {
        match op {
            DrawOp::Style { color: c, font_height } => {
                color = color32_rgba(*c);
                font = egui::FontId::proportional(*font_height);
            }
            DrawOp::Line { from, to } => {
                painter.line_segment([at(from.0, from.1), at(to.0, to.1)], egui::Stroke::new(1.0, color));
            }
            DrawOp::Text { text, x, y } => {
                // Canvas text is placed by its baseline.
                painter.text(at(*x, *y), egui::Align2::LEFT_BOTTOM, text, font.clone(), color);
            }
        }
    }
}

// ─── Legend ───────────────────────────────────────────────────────────────────

pub fn legend_widget(ui: &mut egui::Ui, legend: &Legend) {
    match legend {
        Legend::Discrete(entries) => {
            for (label, color) in entries {
                ui.horizontal(|ui| {
                    let (rect, _) = ui.allocate_exact_size(egui::vec2(12.0, 12.0), egui::Sense::hover());
                    ui.painter().rect_filled(rect, 2.0, color32(*color));
                    ui.label(label.as_str());
                });
            }
        }
        Legend::Ramp {
            label_min,
            label_max,
            colors,
        } => {
            let (rect, _) = ui.allocate_exact_size(egui::vec2(140.0, 12.0), egui::Sense::hover());
            let steps = 32;
            let w = rect.width() / steps as f32;
            for i in 0..steps {
                let t = (i as f32 + 0.5) / steps as f32;
                let c = palette::ramp_color(colors, t);
                let r = egui::Rect::from_min_size(
                    rect.min + egui::vec2(i as f32 * w, 0.0),
                    egui::vec2(w + 0.5, rect.height()),
                );
                ui.painter().rect_filled(r, 0.0, color32(c));
            }
            ui.horizontal(|ui| {
                ui.label(label_min.as_str());
                ui.add_space(60.0);
                ui.label(label_max.as_str());
            });
        }
    }
}

// ─── Gizmo ────────────────────────────────────────────────────────────────────

pub const GIZMO_RADIUS: f32 = 32.0;
pub const GIZMO_HANDLE: f32 = 9.0;

/// Draw handles around `center`, back to front.
pub fn paint_gizmo(painter: &egui::Painter, center: egui::Pos2, handles: &[GizmoHandle]) {
    painter.circle_filled(center, GIZMO_RADIUS + GIZMO_HANDLE, egui::Color32::from_white_alpha(40));
    for h in handles {
        let pos = center + egui::vec2(h.offset.x, h.offset.y);
        let positive = h.axis.label().starts_with('+');
        let base = color32(h.axis.color());
        if positive {
            painter.line_segment([center, pos], egui::Stroke::new(2.0, base));
            painter.circle_filled(pos, GIZMO_HANDLE, base);
            painter.text(
                pos,
                egui::Align2::CENTER_CENTER,
                &h.axis.label()[1..],
                egui::FontId::proportional(11.0),
                egui::Color32::WHITE,
            );
        } else {
            painter.circle_stroke(pos, GIZMO_HANDLE * 0.8, egui::Stroke::new(2.0, base));
        }
    }
}
