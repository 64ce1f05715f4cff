//! Colors for segment rendering and the legend.

use crate::config::Coloring;
use crate::swc::{CellNodeType, PALETTE_SLOTS};

/// One discrete palette slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaletteEntry {
    pub node_type: CellNodeType,
    pub label: &'static str,
    pub color: [f32; 3],
}

/// Section palette, indexed by `CellNodeType::palette_slot`.
pub const SECTION_PALETTE: [PaletteEntry; PALETTE_SLOTS] = [
    PaletteEntry {
        node_type: CellNodeType::Soma,
        label: "Soma",
        color: [0.25, 0.25, 0.30],
    },
    PaletteEntry {
        node_type: CellNodeType::Axon,
        label: "Axon",
        color: [0.20, 0.45, 0.95],
    },
    PaletteEntry {
        node_type: CellNodeType::BasalDendrite,
        label: "Basal dendrite",
        color: [0.90, 0.25, 0.20],
    },
    PaletteEntry {
        node_type: CellNodeType::ApicalDendrite,
        label: "Apical dendrite",
        color: [0.80, 0.25, 0.80],
    },
    PaletteEntry {
        node_type: CellNodeType::Unknown,
        label: "Unknown",
        color: [0.60, 0.60, 0.60],
    },
];

/// Distance ramp, soma (u = 0) to farthest tip (u = 1).
pub const DISTANCE_RAMP: [[f32; 3]; 4] = [
    [0.27, 0.00, 0.33],
    [0.19, 0.41, 0.56],
    [0.21, 0.72, 0.47],
    [0.99, 0.91, 0.15],
];

/// Outline color of the cel-shaded look.
pub const OUTLINE_COLOR: [f32; 3] = [0.0, 0.0, 0.0];

pub fn entry(node_type: CellNodeType) -> &'static PaletteEntry {
    &SECTION_PALETTE[node_type.palette_slot()]
}

/// Nearest-slot lookup of the palette coordinate `v`.
pub fn section_color(v: f32) -> [f32; 3] {
    entry(CellNodeType::from_texture_coord(v)).color
}

/// Linear lookup into `DISTANCE_RAMP`.
pub fn distance_color(u: f32) -> [f32; 3] {
    ramp_color(&DISTANCE_RAMP, u)
}

/// Piecewise linear lookup into `colors` at `t` in [0, 1].
pub fn ramp_color(colors: &[[f32; 3]], t: f32) -> [f32; 3] {
    match colors.len() {
        0 => [0.0; 3],
        1 => colors[0],
        n => {
            let s = t.clamp(0.0, 1.0) * (n - 1) as f32;
            let i = (s as usize).min(n - 2);
            let f = s - i as f32;
            let (a, b) = (colors[i], colors[i + 1]);
            [
                a[0] + (b[0] - a[0]) * f,
                a[1] + (b[1] - a[1]) * f,
                a[2] + (b[2] - a[2]) * f,
            ]
        }
    }
}

pub fn base_color(coloring: Coloring, u: f32, v: f32) -> [f32; 3] {
    match coloring {
        Coloring::Section => section_color(v),
        Coloring::Distance => distance_color(u),
    }
}

/// What the legend should show for the current coloring.
#[derive(Debug, Clone, PartialEq)]
pub enum Legend {
    Discrete(Vec<(String, [f32; 3])>),
    Ramp {
        label_min: String,
        label_max: String,
        colors: Vec<[f32; 3]>,
    },
}

/// Legend for `coloring`. Discrete entries are limited to the types that
/// actually occur (`present`), in slot order.
pub fn legend(coloring: Coloring, present: &[CellNodeType], max_distance: f32, unit: &str) -> Legend {
    match coloring {
        Coloring::Section => Legend::Discrete(
            SECTION_PALETTE
                .iter()
                .filter(|e| present.contains(&e.node_type))
                .map(|e| (e.label.to_string(), e.color))
                .collect(),
        ),
        Coloring::Distance => Legend::Ramp {
            label_min: format!("0 {unit}"),
            label_max: format!("{:.0} {unit}", max_distance),
            colors: DISTANCE_RAMP.to_vec(),
        },
    }
}

/// Float RGB → packed RGBA bytes.
pub fn to_rgba8(c: [f32; 3]) -> [u8; 4] {
    [
        (c[0].clamp(0.0, 1.0) * 255.0) as u8,
        (c[1].clamp(0.0, 1.0) * 255.0) as u8,
        (c[2].clamp(0.0, 1.0) * 255.0) as u8,
        255,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_in_slot_order() {
        for (slot, e) in SECTION_PALETTE.iter().enumerate() {
            assert_eq!(e.node_type.palette_slot(), slot);
        }
    }

    #[test]
    fn section_lookup_uses_slot_centers() {
        assert_eq!(section_color(0.3), entry(CellNodeType::Axon).color);
        assert_eq!(section_color(0.9), entry(CellNodeType::Unknown).color);
        // Out of range coordinates clamp to the edge slots.
        assert_eq!(section_color(-1.0), entry(CellNodeType::Soma).color);
        assert_eq!(section_color(7.0), entry(CellNodeType::Unknown).color);
    }

    #[test]
    fn ramp_endpoints() {
        assert_eq!(distance_color(0.0), DISTANCE_RAMP[0]);
        assert_eq!(distance_color(1.0), DISTANCE_RAMP[3]);
    }

    #[test]
    fn ramp_interpolates_between_stops() {
        let colors = [[0.0, 0.0, 0.0], [1.0, 0.5, 0.0]];
        assert_eq!(ramp_color(&colors, 0.5), [0.5, 0.25, 0.0]);
        assert_eq!(ramp_color(&colors, 2.0), colors[1]);
        assert_eq!(ramp_color(&colors[..1], 0.7), colors[0]);
        assert_eq!(ramp_color(&[], 0.7), [0.0; 3]);
    }

    #[test]
    fn legend_lists_present_types_only() {
        let l = legend(
            Coloring::Section,
            &[CellNodeType::Axon, CellNodeType::Soma],
            0.0,
            "µm",
        );
        match l {
            Legend::Discrete(items) => {
                let labels: Vec<&str> = items.iter().map(|(s, _)| s.as_str()).collect();
                assert_eq!(labels, vec!["Soma", "Axon"]);
            }
            other => panic!("unexpected legend {:?}", other),
        }
    }

    #[test]
    fn distance_legend_labels() {
        let l = legend(Coloring::Distance, &[], 812.4, "µm");
        assert_eq!(
            l,
            Legend::Ramp {
                label_min: "0 µm".into(),
                label_max: "812 µm".into(),
                colors: DISTANCE_RAMP.to_vec(),
            }
        );
    }
}
