//! Orthographic orbit camera.
//!
//! The camera looks at `target` from the direction given by `orientation`
//! (camera → world rotation; the camera looks down its local -Z axis). The
//! visible world height at the target is `space_height_at_target / zoom`.

use glam::{Quat, Vec3};

use crate::event::Event;

/// The three values the on-screen scale depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraProjection {
    pub space_height_at_target: f32,
    pub zoom: f32,
    pub screen_height: f32,
}

impl CameraProjection {
    /// World units per screen pixel.
    pub fn pixel_scale(&self) -> f64 {
        self.space_height_at_target as f64 / (self.zoom as f64 * self.screen_height as f64)
    }

    /// Exact equality of all three fields, bit for bit.
    pub fn same_bits(&self, other: &CameraProjection) -> bool {
        self.space_height_at_target.to_bits() == other.space_height_at_target.to_bits()
            && self.zoom.to_bits() == other.zoom.to_bits()
            && self.screen_height.to_bits() == other.screen_height.to_bits()
    }
}

/// Everything a painter needs to map world space to the frame buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub target: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    /// Unit vector from the target towards the viewer.
    pub back: Vec3,
    pub pixel_scale: f32,
    pub width: u32,
    pub height: u32,
}

impl ViewTransform {
    /// World point → (screen x, screen y, depth). Depth grows away from the
    /// viewer and is 0 at the target plane; both are in world units.
    pub fn project(&self, p: Vec3) -> Vec3 {
        let rel = p - self.target;
        Vec3::new(
            rel.dot(self.right) / self.pixel_scale + self.width as f32 * 0.5,
            self.height as f32 * 0.5 - rel.dot(self.up) / self.pixel_scale,
            -rel.dot(self.back),
        )
    }
}

#[derive(Debug)]
pub struct OrthographicCamera {
    target: Vec3,
    orientation: Quat,
    space_height_at_target: f32,
    zoom: f32,
    screen_width: f32,
    screen_height: f32,
    pub near: f32,
    pub far: f32,
    /// Fired after any change of target, orientation, zoom or height.
    pub event_transform_change: Event<CameraProjection>,
}

impl Default for OrthographicCamera {
    fn default() -> Self {
        Self::new(1e-3, 1e6)
    }
}

impl OrthographicCamera {
    pub fn new(near: f32, far: f32) -> Self {
        Self {
            target: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            space_height_at_target: 1.0,
            zoom: 1.0,
            screen_width: 1.0,
            screen_height: 1.0,
            near,
            far,
            event_transform_change: Event::new(),
        }
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    pub fn space_height_at_target(&self) -> f32 {
        self.space_height_at_target
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn screen_width(&self) -> f32 {
        self.screen_width
    }

    pub fn screen_height(&self) -> f32 {
        self.screen_height
    }

    pub fn projection(&self) -> CameraProjection {
        CameraProjection {
            space_height_at_target: self.space_height_at_target,
            zoom: self.zoom,
            screen_height: self.screen_height,
        }
    }

    pub fn pixel_scale(&self) -> f64 {
        self.projection().pixel_scale()
    }

    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
        self.notify();
    }

    pub fn set_orientation(&mut self, orientation: Quat) {
        self.orientation = orientation.normalize();
        self.notify();
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom;
        self.notify();
    }

    pub fn set_space_height_at_target(&mut self, height: f32) {
        self.space_height_at_target = height;
        self.notify();
    }

    /// Viewport size in pixels. Does not fire `event_transform_change`; the
    /// owning context reports resizes through its own event.
    pub fn set_screen_size(&mut self, width: f32, height: f32) {
        self.screen_width = width.max(1.0);
        self.screen_height = height.max(1.0);
    }

    pub fn right(&self) -> Vec3 {
        self.orientation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.orientation * Vec3::Y
    }

    pub fn back(&self) -> Vec3 {
        self.orientation * Vec3::Z
    }

    pub fn view(&self) -> ViewTransform {
        self.view_with_size(self.screen_width as u32, self.screen_height as u32)
    }

    /// View for a frame of another size that shows the same world region
    /// vertically (used for off-screen snapshots).
    pub fn view_with_size(&self, width: u32, height: u32) -> ViewTransform {
        let height = height.max(1);
        ViewTransform {
            target: self.target,
            right: self.right(),
            up: self.up(),
            back: self.back(),
            pixel_scale: self.space_height_at_target / (self.zoom * height as f32),
            width: width.max(1),
            height,
        }
    }

    fn notify(&self) {
        self.event_transform_change.dispatch(&self.projection());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn pixel_scale_formula() {
        let p = CameraProjection {
            space_height_at_target: 10.0,
            zoom: 2.0,
            screen_height: 500.0,
        };
        assert!((p.pixel_scale() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn setters_fire_transform_change() {
        let mut cam = OrthographicCamera::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = cam
            .event_transform_change
            .subscribe(move |p: &CameraProjection| s.borrow_mut().push(p.zoom));
        cam.set_zoom(3.0);
        cam.set_target(Vec3::ONE);
        cam.set_screen_size(800.0, 600.0);
        assert_eq!(*seen.borrow(), vec![3.0, 3.0]);
    }

    #[test]
    fn project_centers_target() {
        let mut cam = OrthographicCamera::default();
        cam.set_target(Vec3::new(5.0, 5.0, 5.0));
        cam.set_space_height_at_target(100.0);
        cam.set_screen_size(200.0, 100.0);
        let view = cam.view();
        let c = view.project(Vec3::new(5.0, 5.0, 5.0));
        assert_eq!((c.x, c.y, c.z), (100.0, 50.0, 0.0));
        // One world unit up is one pixel up (pixel scale 1).
        let up = view.project(Vec3::new(5.0, 6.0, 5.0));
        assert!((up.y - 49.0).abs() < 1e-4);
        // Closer to the viewer means smaller depth.
        let near = view.project(Vec3::new(5.0, 5.0, 6.0));
        assert!(near.z < 0.0);
    }

    #[test]
    fn snapshot_view_keeps_world_height() {
        let mut cam = OrthographicCamera::default();
        cam.set_space_height_at_target(50.0);
        cam.set_screen_size(100.0, 100.0);
        let small = cam.view();
        let large = cam.view_with_size(400, 200);
        assert!((small.pixel_scale - 0.5).abs() < 1e-6);
        assert!((large.pixel_scale - 0.25).abs() < 1e-6);
    }
}
