//! Parent → child segments as a flat instancing buffer.
//!
//! One `SegmentInstance` per drawable edge; both endpoints carry position,
//! radius and the (u, v) palette coordinates, so a renderer can draw a
//! tapered capsule per instance without looking at the graph again.

use glam::Vec3;

use crate::swc::{Aabb, CellNode, CellNodeType, CellNodes};

/// GPU layout: 48 bytes, matches the `Segment` struct of the WGSL kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "gpu", derive(bytemuck::Pod, bytemuck::Zeroable))]
pub struct SegmentInstance {
    /// Child endpoint: x, y, z, radius
    pub a: [f32; 4],
    /// Parent endpoint: x, y, z, radius
    pub b: [f32; 4],
    /// Child (u, v)
    pub uv_a: [f32; 2],
    /// Parent (u, v)
    pub uv_b: [f32; 2],
}

impl SegmentInstance {
    fn new(child: &CellNode, parent: &CellNode) -> Self {
        Self {
            a: endpoint(child),
            b: endpoint(parent),
            uv_a: [child.u, child.v],
            uv_b: [parent.u, parent.v],
        }
    }

    pub fn start(&self) -> Vec3 {
        Vec3::new(self.a[0], self.a[1], self.a[2])
    }

    pub fn end(&self) -> Vec3 {
        Vec3::new(self.b[0], self.b[1], self.b[2])
    }

    pub fn start_radius(&self) -> f32 {
        self.a[3]
    }

    pub fn end_radius(&self) -> f32 {
        self.b[3]
    }
}

fn endpoint(node: &CellNode) -> [f32; 4] {
    [node.position.x, node.position.y, node.position.z, node.radius]
}

/// Edges that were not turned into segments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentStats {
    /// Parent index not present in the graph.
    pub dangling: usize,
    /// Soma parent with a non-soma child.
    pub soma_excluded: usize,
}

/// Read-only segment buffer built from one `CellNodes`.
#[derive(Debug, Clone, Default)]
pub struct SegmentsData {
    instances: Vec<SegmentInstance>,
    stats: SegmentStats,
    bounds: Aabb,
}

impl SegmentsData {
    pub fn instances(&self) -> &[SegmentInstance] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn stats(&self) -> SegmentStats {
        self.stats
    }

    /// Bounds of all capsules, radius included.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }
}

/// The soma is drawn as a body of its own; a segment from a soma point to
/// the first point of a neurite would cut through it.
pub fn is_soma_exclusion(parent: CellNodeType, child: CellNodeType) -> bool {
    parent == CellNodeType::Soma && child != CellNodeType::Soma
}

/// Build the segment buffer. Output follows the graph's file order.
pub fn nodes_to_segments(nodes: &CellNodes) -> SegmentsData {
    let mut instances = Vec::with_capacity(nodes.len());
    let mut stats = SegmentStats::default();

    nodes.for_each(|child| {
        if child.is_root() {
            return;
        }
        let Some(parent) = nodes.get_by_index(child.parent) else {
            stats.dangling += 1;
            return;
        };
        if is_soma_exclusion(parent.node_type, child.node_type) {
            stats.soma_excluded += 1;
            return;
        }
        instances.push(SegmentInstance::new(child, parent));
    });

    if stats.dangling > 0 {
        log::debug!("segments: {} nodes reference a missing parent", stats.dangling);
    }

    let bounds = Aabb::from_points(instances.iter().flat_map(|s| {
        let ra = Vec3::splat(s.start_radius());
        let rb = Vec3::splat(s.end_radius());
        [s.start() - ra, s.start() + ra, s.end() - rb, s.end() + rb]
    }));

    SegmentsData {
        instances,
        stats,
        bounds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swc::parse_swc;

    #[test]
    fn soma_exclusion_predicate() {
        use CellNodeType::*;
        assert!(is_soma_exclusion(Soma, Axon));
        assert!(is_soma_exclusion(Soma, BasalDendrite));
        assert!(is_soma_exclusion(Soma, Unknown));
        assert!(!is_soma_exclusion(Soma, Soma));
        assert!(!is_soma_exclusion(Axon, Soma));
        assert!(!is_soma_exclusion(ApicalDendrite, ApicalDendrite));
    }

    #[test]
    fn soma_to_axon_link_is_dropped() {
        let nodes = parse_swc("1 1 0 0 0 5 -1\n2 2 1 0 0 1 1\n3 2 2 0 0 1 2\n");
        assert_eq!(nodes.len(), 3);
        let data = nodes_to_segments(&nodes);
        assert_eq!(data.len(), 1);
        let seg = data.instances()[0];
        assert_eq!(seg.start(), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(seg.end(), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(seg.start_radius(), 1.0);
        assert!((seg.uv_a[1] - 0.3).abs() < 1e-6);
        assert_eq!(data.stats().soma_excluded, 1);
    }

    #[test]
    fn dangling_parents_are_skipped() {
        let nodes = parse_swc("1 2 0 0 0 1 -1\n2 2 1 0 0 1 1\n3 2 2 0 0 1 50\n");
        let data = nodes_to_segments(&nodes);
        assert_eq!(data.len(), 1);
        assert_eq!(data.stats().dangling, 1);
    }

    #[test]
    fn file_order_does_not_matter_for_lookup() {
        // Child listed before its parent.
        let nodes = parse_swc("3 3 2 0 0 1 2\n2 3 1 0 0 1 1\n1 3 0 0 0 1 -1\n");
        let data = nodes_to_segments(&nodes);
        assert_eq!(data.len(), 2);
        // Output follows file order: node 3 first.
        assert_eq!(data.instances()[0].start(), Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn count_bounded_by_resolvable_non_roots() {
        let text = "1 1 0 0 0 5 -1\n2 1 0 1 0 5 1\n3 3 0 2 0 1 2\n4 4 0 3 0 1 3\n5 2 9 9 9 1 8\n";
        let nodes = parse_swc(text);
        let data = nodes_to_segments(&nodes);
        let resolvable = nodes
            .iter()
            .filter(|n| !n.is_root() && nodes.get_by_index(n.parent).is_some())
            .count();
        assert!(data.len() <= resolvable);
        // 1→2 soma/soma kept, 2→3 soma/basal excluded, 3→4 kept, 5 dangling.
        assert_eq!(data.len(), 2);
        for seg in data.instances() {
            let child = CellNodeType::from_texture_coord(seg.uv_a[1]);
            let parent = CellNodeType::from_texture_coord(seg.uv_b[1]);
            assert!(!is_soma_exclusion(parent, child));
        }
    }

    #[test]
    fn bounds_include_radius() {
        let nodes = parse_swc("1 2 0 0 0 1 -1\n2 2 10 0 0 2 1\n");
        let data = nodes_to_segments(&nodes);
        assert_eq!(data.bounds().min, Vec3::new(-1.0, -2.0, -2.0));
        assert_eq!(data.bounds().max, Vec3::new(12.0, 2.0, 2.0));
    }

    #[cfg(feature = "gpu")]
    #[test]
    fn instance_layout_is_48_bytes() {
        assert_eq!(std::mem::size_of::<SegmentInstance>(), 48);
        let data = [SegmentInstance::default(); 2];
        let bytes: &[u8] = bytemuck::cast_slice(&data);
        assert_eq!(bytes.len(), 96);
    }
}
