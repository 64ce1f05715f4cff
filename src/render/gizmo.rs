//! Orientation gizmo: six axis buttons that jump the camera to look along
//! an axis.

use glam::{Quat, Vec2, Vec3};

use super::camera::OrthographicCamera;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GizmoAxis {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl GizmoAxis {
    pub const ALL: [GizmoAxis; 6] = [
        GizmoAxis::PosX,
        GizmoAxis::NegX,
        GizmoAxis::PosY,
        GizmoAxis::NegY,
        GizmoAxis::PosZ,
        GizmoAxis::NegZ,
    ];

    pub fn label(self) -> &'static str {
        match self {
            GizmoAxis::PosX => "+X",
            GizmoAxis::NegX => "-X",
            GizmoAxis::PosY => "+Y",
            GizmoAxis::NegY => "-Y",
            GizmoAxis::PosZ => "+Z",
            GizmoAxis::NegZ => "-Z",
        }
    }

    pub fn direction(self) -> Vec3 {
        match self {
            GizmoAxis::PosX => Vec3::X,
            GizmoAxis::NegX => Vec3::NEG_X,
            GizmoAxis::PosY => Vec3::Y,
            GizmoAxis::NegY => Vec3::NEG_Y,
            GizmoAxis::PosZ => Vec3::Z,
            GizmoAxis::NegZ => Vec3::NEG_Z,
        }
    }

    /// Camera orientation that puts the viewer on this axis side, looking
    /// at the target. Y views keep +Z/-Z as screen up.
    pub fn orientation(self) -> Quat {
        let back = self.direction();
        let up = match self {
            GizmoAxis::PosY => Vec3::NEG_Z,
            GizmoAxis::NegY => Vec3::Z,
            _ => Vec3::Y,
        };
        let right = up.cross(back);
        Quat::from_mat3(&glam::Mat3::from_cols(right, up, back))
    }

    /// Display color of the axis handle (X red, Y green, Z blue).
    pub fn color(self) -> [f32; 3] {
        match self {
            GizmoAxis::PosX | GizmoAxis::NegX => [0.90, 0.25, 0.25],
            GizmoAxis::PosY | GizmoAxis::NegY => [0.30, 0.75, 0.30],
            GizmoAxis::PosZ | GizmoAxis::NegZ => [0.25, 0.45, 0.95],
        }
    }
}

/// One handle as drawn on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GizmoHandle {
    pub axis: GizmoAxis,
    /// Offset from the gizmo center, pixels, screen y down
    pub offset: Vec2,
    /// Larger is nearer to the viewer
    pub facing: f32,
}

/// Handle positions for the current camera, back to front.
pub fn layout(camera: &OrthographicCamera, radius: f32) -> Vec<GizmoHandle> {
    let (right, up, back) = (camera.right(), camera.up(), camera.back());
    let mut handles: Vec<GizmoHandle> = GizmoAxis::ALL
        .iter()
        .map(|&axis| {
            let d = axis.direction();
            GizmoHandle {
                axis,
                offset: Vec2::new(d.dot(right), -d.dot(up)) * radius,
                facing: d.dot(back),
            }
        })
        .collect();
    handles.sort_by(|a, b| a.facing.total_cmp(&b.facing));
    handles
}

/// Front-most handle within `hit_radius` of `point` (relative to the gizmo
/// center).
pub fn pick(handles: &[GizmoHandle], point: Vec2, hit_radius: f32) -> Option<GizmoAxis> {
    handles
        .iter()
        .rev()
        .find(|h| h.offset.distance(point) <= hit_radius)
        .map(|h| h.axis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientations_look_along_axes() {
        for axis in GizmoAxis::ALL {
            let q = axis.orientation();
            let back = q * Vec3::Z;
            assert!(back.distance(axis.direction()) < 1e-5, "{:?}", axis);
            assert!((q.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn default_camera_faces_pos_z() {
        let cam = OrthographicCamera::default();
        let handles = layout(&cam, 30.0);
        assert_eq!(handles.last().map(|h| h.axis), Some(GizmoAxis::PosZ));
        let x = handles.iter().find(|h| h.axis == GizmoAxis::PosX);
        assert_eq!(x.map(|h| h.offset), Some(Vec2::new(30.0, 0.0)));
    }

    #[test]
    fn pick_prefers_front_handle() {
        let cam = OrthographicCamera::default();
        let handles = layout(&cam, 30.0);
        // +Z and -Z both project onto the center.
        assert_eq!(pick(&handles, Vec2::ZERO, 8.0), Some(GizmoAxis::PosZ));
        assert_eq!(pick(&handles, Vec2::new(0.0, -29.0), 8.0), Some(GizmoAxis::PosY));
        assert_eq!(pick(&handles, Vec2::new(20.0, 20.0), 5.0), None);
    }
}
