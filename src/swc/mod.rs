//! SWC morphology model.
//!
//! An SWC file is a flat list of traced sample points. Each point names its
//! parent by index, so the file describes a forest of trees:
//!   - `lines` : line splitting and `#` comment stripping
//!   - `parser`: text → `CellNodes`
//!   - `nodes` : indexed, immutable node graph with bounding box

pub mod lines;
pub mod nodes;
pub mod parser;

use glam::Vec3;

pub use nodes::{Aabb, CellNodes};
pub use parser::parse_swc;

/// Number of palette slots (one per `CellNodeType`).
pub const PALETTE_SLOTS: usize = 5;

/// Structure identifier of a traced point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellNodeType {
    Soma,
    Axon,
    BasalDendrite,
    ApicalDendrite,
    Unknown,
}

impl CellNodeType {
    /// Every type, in palette slot order.
    pub const ALL: [CellNodeType; PALETTE_SLOTS] = [
        CellNodeType::Soma,
        CellNodeType::Axon,
        CellNodeType::BasalDendrite,
        CellNodeType::ApicalDendrite,
        CellNodeType::Unknown,
    ];

    /// Map a raw SWC type code. Only codes strictly inside `(0, 5)` are
    /// recognised; anything else (0, negatives, 5+, fractions) is `Unknown`.
    pub fn from_code(code: f64) -> Self {
        if !(code > 0.0 && code < 5.0) || code.fract() != 0.0 {
            return CellNodeType::Unknown;
        }
        match code as i32 {
            1 => CellNodeType::Soma,
            2 => CellNodeType::Axon,
            3 => CellNodeType::BasalDendrite,
            4 => CellNodeType::ApicalDendrite,
            _ => CellNodeType::Unknown,
        }
    }

    /// Palette slot in `0..PALETTE_SLOTS`.
    pub fn palette_slot(self) -> usize {
        match self {
            CellNodeType::Soma => 0,
            CellNodeType::Axon => 1,
            CellNodeType::BasalDendrite => 2,
            CellNodeType::ApicalDendrite => 3,
            CellNodeType::Unknown => 4,
        }
    }

    /// Palette texture coordinate: the center of this type's slot.
    pub fn texture_coord(self) -> f32 {
        (self.palette_slot() as f32 + 0.5) / PALETTE_SLOTS as f32
    }

    /// Inverse of `texture_coord`, clamped to the last slot.
    pub fn from_texture_coord(v: f32) -> Self {
        let slot = (v.clamp(0.0, 1.0) * PALETTE_SLOTS as f32) as usize;
        Self::ALL[slot.min(PALETTE_SLOTS - 1)]
    }
}

/// One sample point of a traced neuron.
#[derive(Debug, Clone, PartialEq)]
pub struct CellNode {
    /// Identifier as written in the file. Not contiguous, not sorted.
    pub index: i64,
    /// Index of the parent node; negative for roots.
    pub parent: i64,
    pub node_type: CellNodeType,
    pub position: Vec3,
    pub radius: f32,
    /// Normalized distance to the soma (0 until computed).
    pub u: f32,
    /// Palette coordinate derived from `node_type`.
    pub v: f32,
}

impl CellNode {
    pub fn is_root(&self) -> bool {
        self.parent < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_code_range_is_exclusive() {
        assert_eq!(CellNodeType::from_code(0.0), CellNodeType::Unknown);
        assert_eq!(CellNodeType::from_code(1.0), CellNodeType::Soma);
        assert_eq!(CellNodeType::from_code(2.0), CellNodeType::Axon);
        assert_eq!(CellNodeType::from_code(3.0), CellNodeType::BasalDendrite);
        assert_eq!(CellNodeType::from_code(4.0), CellNodeType::ApicalDendrite);
        assert_eq!(CellNodeType::from_code(5.0), CellNodeType::Unknown);
        assert_eq!(CellNodeType::from_code(-1.0), CellNodeType::Unknown);
        assert_eq!(CellNodeType::from_code(2.5), CellNodeType::Unknown);
        assert_eq!(CellNodeType::from_code(f64::NAN), CellNodeType::Unknown);
    }

    #[test]
    fn texture_coord_is_slot_center() {
        let expected = [0.1, 0.3, 0.5, 0.7, 0.9];
        for (t, v) in CellNodeType::ALL.iter().zip(expected) {
            assert!((t.texture_coord() - v).abs() < 1e-6, "{:?}", t);
            assert_eq!(CellNodeType::from_texture_coord(t.texture_coord()), *t);
        }
    }
}
