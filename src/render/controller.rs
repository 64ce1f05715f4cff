//! Orbit controller: drag to rotate around the target, scroll to zoom.

use glam::{Quat, Vec2};

use super::camera::OrthographicCamera;
use crate::config::ViewerConfig;

pub struct OrbitController {
    /// Radians per dragged pixel
    speed: f32,
    inertia_ms: f32,
    min_zoom: f32,
    max_zoom: f32,
    dragging: bool,
    last_drag_ms: Option<f64>,
    /// Pixels per millisecond
    velocity: Vec2,
    spin: Option<Spin>,
}

/// Rotation that continues after release.
#[derive(Debug, Clone, Copy)]
struct Spin {
    velocity: Vec2,
    released_ms: f64,
    last_ms: f64,
}

impl OrbitController {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            speed: config.orbit_speed,
            inertia_ms: config.orbit_inertia_ms.max(0.0),
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom.max(config.min_zoom),
            dragging: false,
            last_drag_ms: None,
            velocity: Vec2::ZERO,
            spin: None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn is_spinning(&self) -> bool {
        self.spin.is_some()
    }

    /// Pointer moved by `delta` pixels with the button down.
    pub fn drag(&mut self, camera: &mut OrthographicCamera, delta: Vec2, now_ms: f64) {
        if !self.dragging {
            self.dragging = true;
            self.spin = None;
            self.velocity = Vec2::ZERO;
            self.last_drag_ms = None;
        }
        if let Some(last) = self.last_drag_ms {
            let dt = (now_ms - last).max(1.0) as f32;
            // Smooth to avoid a single jittery event deciding the spin.
            self.velocity = self.velocity * 0.5 + (delta / dt) * 0.5;
        }
        self.last_drag_ms = Some(now_ms);
        self.rotate(camera, delta);
    }

    pub fn release(&mut self, now_ms: f64) {
        if !self.dragging {
            return;
        }
        self.dragging = false;
        let recent = self
            .last_drag_ms
            .map(|t| now_ms - t < 100.0)
            .unwrap_or(false);
        self.spin = (recent && self.inertia_ms > 0.0 && self.velocity != Vec2::ZERO).then(|| Spin {
            velocity: self.velocity,
            released_ms: now_ms,
            last_ms: now_ms,
        });
        self.last_drag_ms = None;
    }

    /// Zoom by `steps` notches (positive zooms in).
    pub fn scroll(&self, camera: &mut OrthographicCamera, steps: f32) {
        let zoom = (camera.zoom() * 1.1f32.powf(steps)).clamp(self.min_zoom, self.max_zoom);
        if zoom != camera.zoom() {
            camera.set_zoom(zoom);
        }
    }

    /// Continue the post-release spin. Returns true while still spinning.
    pub fn update(&mut self, camera: &mut OrthographicCamera, now_ms: f64) -> bool {
        let Some(mut spin) = self.spin else {
            return false;
        };
        let end = spin.released_ms + self.inertia_ms as f64;
        let to = now_ms.min(end);
        if to > spin.last_ms {
            // Velocity falls linearly to zero at `end`; integrate over [last, to].
            let decay = |t: f64| ((end - t) / self.inertia_ms as f64) as f32;
            let (d0, d1) = (decay(spin.last_ms), decay(to));
            let dt = (to - spin.last_ms) as f32;
            self.rotate(camera, spin.velocity * dt * (d0 + d1) * 0.5);
            spin.last_ms = to;
        }
        if now_ms >= end {
            self.spin = None;
            false
        } else {
            self.spin = Some(spin);
            true
        }
    }

    fn rotate(&self, camera: &mut OrthographicCamera, delta: Vec2) {
        if delta == Vec2::ZERO {
            return;
        }
        let yaw = Quat::from_axis_angle(camera.up(), -delta.x * self.speed);
        let pitch = Quat::from_axis_angle(camera.right(), -delta.y * self.speed);
        camera.set_orientation(yaw * pitch * camera.orientation());
    }
}

impl std::fmt::Debug for OrbitController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrbitController")
            .field("dragging", &self.dragging)
            .field("spinning", &self.spin.is_some())
            .finish()
    }
}
