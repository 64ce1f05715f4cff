pub mod config;
pub mod event;
pub mod geometry;
pub mod net;
pub mod render;
pub mod scalebar;
pub mod swc;
pub mod viewer;

pub use config::ViewerConfig;
pub use viewer::{SwcViewer, ViewerError, ViewerState};
