//! Camera-aware scale bar.
//!
//! `PixelScaleWatcher` reduces camera and viewport changes to distinct
//! pixel-scale events; `compute` turns a pixel scale into a round tick
//! value; `paint` draws the ticks on a 2D canvas.

pub mod compute;
pub mod paint;
pub mod watcher;

pub use compute::{compute_scalebar_attributes, ScalebarAttributes, ScalebarOptions};
pub use paint::{paint_scalebar, Canvas2d, DrawOp, RecordingCanvas, Scalebar};
pub use watcher::PixelScaleWatcher;
