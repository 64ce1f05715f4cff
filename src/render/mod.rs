pub mod animation;
pub mod camera;
pub mod context;
pub mod controller;
pub mod gizmo;
pub mod painters;
pub mod palette;

#[cfg(feature = "gpu")]
pub mod gpu_renderer;

pub use camera::{CameraProjection, OrthographicCamera, ViewTransform};
pub use context::{ContextError, DepthFunc, DepthState, Frame, Painter, RenderContext};
