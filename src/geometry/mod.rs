//! Renderable geometry derived from a node graph.

pub mod segments;

pub use segments::{
    is_soma_exclusion, nodes_to_segments, SegmentInstance, SegmentStats, SegmentsData,
};
