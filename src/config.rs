//! Viewer configuration.

use crate::scalebar::ScalebarOptions;

/// Which renderer paints the segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// GPU when available, CPU otherwise.
    #[default]
    Auto,
    Cpu,
    /// GPU or fail.
    Gpu,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Backend::Auto),
            "cpu" => Ok(Backend::Cpu),
            "gpu" => Ok(Backend::Gpu),
            other => Err(format!("unknown backend '{other}' (auto, cpu, gpu)")),
        }
    }
}

/// How segments are colored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Coloring {
    /// One color per structure type (soma, axon, ...).
    #[default]
    Section,
    /// Ramp over the path distance to the soma.
    Distance,
}

impl std::str::FromStr for Coloring {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "section" => Ok(Coloring::Section),
            "distance" => Ok(Coloring::Distance),
            other => Err(format!("unknown coloring '{other}' (section, distance)")),
        }
    }
}

/// Configuration for one `SwcViewer`.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Prefix for relative hrefs (`{base_url}/{href}`)
    pub base_url: Option<String>,
    pub backend: Backend,
    pub coloring: Coloring,
    /// Visible world height as a multiple of the morphology's vertical half-extent
    pub camera_headroom: f32,
    pub near: f32,
    pub far: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Time for orbit inertia to die out after release (ms)
    pub orbit_inertia_ms: f32,
    /// Radians per dragged pixel
    pub orbit_speed: f32,
    /// Radius multiplier of the outline pass
    pub outline_radius_multiplier: f32,
    /// Outline depth offset toward the viewer, as a fraction of the local radius
    pub outline_depth_shift: f32,
    pub background_color: [f32; 4],
    pub scalebar: ScalebarOptions,
    /// Duration of gizmo camera jumps (ms)
    pub gizmo_duration_ms: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            backend: Backend::Auto,
            coloring: Coloring::Section,
            camera_headroom: 2.5,
            near: 1e-3,
            far: 1e6,
            min_zoom: 0.1,
            max_zoom: 100.0,
            orbit_inertia_ms: 500.0,
            orbit_speed: 0.008,
            outline_radius_multiplier: 1.2,
            outline_depth_shift: 0.25,
            background_color: [1.0, 1.0, 1.0, 1.0],
            scalebar: ScalebarOptions::default(),
            gizmo_duration_ms: 500.0,
        }
    }
}

impl ViewerConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_coloring(mut self, coloring: Coloring) -> Self {
        self.coloring = coloring;
        self
    }

    pub fn with_background(mut self, color: [f32; 4]) -> Self {
        self.background_color = color;
        self
    }
}
