//! Timed camera actions with easing.

use glam::Quat;

use super::camera::OrthographicCamera;
use super::context::RenderContext;

/// Maps linear progress in `[0, 1]` to eased progress.
pub type EasingFunction = fn(f32) -> f32;

pub fn ease_linear(t: f32) -> f32 {
    t
}

pub fn ease_in_out_cubic(t: f32) -> f32 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        let k = -2.0 * t + 2.0;
        1.0 - k * k * k * 0.5
    }
}

/// What an animation does to the camera at a given progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraAction {
    Orientation { from: Quat, to: Quat },
    Zoom { from: f32, to: f32 },
}

impl CameraAction {
    fn apply(&self, camera: &mut OrthographicCamera, alpha: f32) {
        match *self {
            CameraAction::Orientation { from, to } => {
                camera.set_orientation(from.slerp(to, alpha));
            }
            CameraAction::Zoom { from, to } => {
                camera.set_zoom(from + (to - from) * alpha);
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Animation {
    pub action: CameraAction,
    pub duration_ms: f32,
    pub easing: EasingFunction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnimationId(u64);

struct Running {
    id: AnimationId,
    animation: Animation,
    /// Set on the first update after scheduling.
    start_ms: Option<f64>,
}

#[derive(Default)]
pub struct AnimationManager {
    next_id: u64,
    running: Vec<Running>,
}

impl AnimationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, animation: Animation) -> AnimationId {
        let id = AnimationId(self.next_id);
        self.next_id += 1;
        self.running.push(Running {
            id,
            animation,
            start_ms: None,
        });
        id
    }

    pub fn cancel(&mut self, id: AnimationId) {
        self.running.retain(|r| r.id != id);
    }

    pub fn is_active(&self) -> bool {
        !self.running.is_empty()
    }

    /// Advance all animations to `now_ms`. Returns true while any remain.
    pub fn update(&mut self, camera: &mut OrthographicCamera, now_ms: f64) -> bool {
        for r in &mut self.running {
            let start = *r.start_ms.get_or_insert(now_ms);
            let duration = r.animation.duration_ms.max(f32::EPSILON) as f64;
            let alpha = ((now_ms - start) / duration).clamp(0.0, 1.0) as f32;
            r.animation.action.apply(camera, (r.animation.easing)(alpha));
            if alpha >= 1.0 {
                r.start_ms = Some(f64::NEG_INFINITY);
            }
        }
        self.running.retain(|r| r.start_ms != Some(f64::NEG_INFINITY));
        self.is_active()
    }
}

impl std::fmt::Debug for AnimationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationManager")
            .field("running", &self.running.len())
            .finish()
    }
}

/// Put the camera at `from` and animate its orientation to `to`.
pub fn interpolate_camera(
    context: &mut RenderContext,
    from: Quat,
    to: Quat,
    duration_ms: f32,
) -> AnimationId {
    context.camera_mut().set_orientation(from);
    let id = context.anim_schedule(Animation {
        action: CameraAction::Orientation { from, to },
        duration_ms,
        easing: ease_in_out_cubic,
    });
    context.paint();
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cubic_easing_is_symmetric() {
        assert_eq!(ease_in_out_cubic(0.0), 0.0);
        assert_eq!(ease_in_out_cubic(1.0), 1.0);
        assert!((ease_in_out_cubic(0.5) - 0.5).abs() < 1e-6);
        let a = ease_in_out_cubic(0.2);
        let b = ease_in_out_cubic(0.8);
        assert!((a + b - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zoom_animation_runs_to_completion() {
        let mut camera = OrthographicCamera::default();
        let mut manager = AnimationManager::new();
        manager.schedule(Animation {
            action: CameraAction::Zoom { from: 1.0, to: 3.0 },
            duration_ms: 100.0,
            easing: ease_linear,
        });
        assert!(manager.update(&mut camera, 1000.0));
        assert_eq!(camera.zoom(), 1.0);
        assert!(manager.update(&mut camera, 1050.0));
        assert!((camera.zoom() - 2.0).abs() < 1e-5);
        assert!(!manager.update(&mut camera, 1100.0));
        assert_eq!(camera.zoom(), 3.0);
    }

    #[test]
    fn cancelled_animation_stops() {
        let mut camera = OrthographicCamera::default();
        let mut manager = AnimationManager::new();
        let id = manager.schedule(Animation {
            action: CameraAction::Zoom { from: 1.0, to: 5.0 },
            duration_ms: 100.0,
            easing: ease_linear,
        });
        manager.cancel(id);
        assert!(!manager.update(&mut camera, 0.0));
        assert_eq!(camera.zoom(), 1.0);
    }

    #[test]
    fn interpolation_reaches_target_orientation() {
        let mut ctx = RenderContext::new(OrthographicCamera::default(), 64, 64);
        let to = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        interpolate_camera(&mut ctx, Quat::IDENTITY, to, 500.0);
        assert!(ctx.update(0.0));
        assert!(ctx.update(250.0));
        assert!(!ctx.update(500.0));
        assert!(ctx.camera().orientation().angle_between(to) < 1e-4);
    }
}
