//! Indexed node graph.

use std::collections::{HashMap, HashSet};

use glam::Vec3;

use super::{CellNode, CellNodeType};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Bounding box of `points`; all zeros when there are none.
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        let mut mn = Vec3::splat(f32::MAX);
        let mut mx = Vec3::splat(f32::MIN);
        for p in points {
            mn = mn.min(p);
            mx = mx.max(p);
        }
        if mn.x > mx.x {
            return Self::default();
        }
        Self { min: mn, max: mx }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn half_extent(&self) -> Vec3 {
        self.size() * 0.5
    }
}

/// All nodes of one parsed file. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct CellNodes {
    nodes: Vec<CellNode>,
    /// Declared node index → position in `nodes`.
    by_index: HashMap<i64, usize>,
    bbox: Aabb,
}

impl CellNodes {
    pub fn new(nodes: Vec<CellNode>) -> Self {
        let mut by_index = HashMap::with_capacity(nodes.len());
        for (slot, node) in nodes.iter().enumerate() {
            // Duplicate indices: the last occurrence wins.
            by_index.insert(node.index, slot);
        }
        let bbox = Aabb::from_points(nodes.iter().map(|n| n.position));
        Self {
            nodes,
            by_index,
            bbox,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node whose declared `index` is `index`.
    pub fn get_by_index(&self, index: i64) -> Option<&CellNode> {
        self.by_index.get(&index).map(|&slot| &self.nodes[slot])
    }

    /// Nodes in file order.
    pub fn iter(&self) -> std::slice::Iter<'_, CellNode> {
        self.nodes.iter()
    }

    pub fn for_each<F: FnMut(&CellNode)>(&self, f: F) {
        self.nodes.iter().for_each(f);
    }

    pub fn bbox(&self) -> Aabb {
        self.bbox
    }

    pub fn center(&self) -> Vec3 {
        self.bbox.center()
    }

    /// Copy of this graph where `u` holds the path length to the nearest
    /// soma (or root) ancestor, normalized by the longest such path.
    /// Also returns that longest path length in world units.
    pub fn with_soma_distance(&self) -> (CellNodes, f32) {
        let mut distance: HashMap<i64, f32> = HashMap::with_capacity(self.nodes.len());

        for node in &self.nodes {
            if distance.contains_key(&node.index) {
                continue;
            }
            // Walk up until a known distance, a soma, a root or a broken link.
            let mut path: Vec<&CellNode> = Vec::new();
            let mut seen: HashSet<i64> = HashSet::new();
            let mut current = node;
            let mut base = 0.0f32;
            loop {
                if let Some(&d) = distance.get(&current.index) {
                    base = d;
                    break;
                }
                if !seen.insert(current.index) {
                    break;
                }
                if current.node_type == CellNodeType::Soma || current.is_root() {
                    distance.insert(current.index, 0.0);
                    break;
                }
                path.push(current);
                match self.get_by_index(current.parent) {
                    Some(parent) => current = parent,
                    None => break,
                }
            }
            // `path` runs child → ancestor; assign distances ancestor first.
            let mut acc = base;
            let mut above = current;
            for n in path.iter().rev() {
                if n.index != above.index && distance.contains_key(&above.index) {
                    acc += n.position.distance(above.position);
                }
                distance.insert(n.index, acc);
                above = n;
            }
        }

        let max = distance.values().copied().fold(0.0f32, f32::max);
        let scale = if max > 0.0 { 1.0 / max } else { 0.0 };
        let nodes = self
            .nodes
            .iter()
            .map(|n| CellNode {
                u: distance.get(&n.index).copied().unwrap_or(0.0) * scale,
                ..n.clone()
            })
            .collect();
        (CellNodes::new(nodes), max)
    }
}

impl<'a> IntoIterator for &'a CellNodes {
    type Item = &'a CellNode;
    type IntoIter = std::slice::Iter<'a, CellNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}
