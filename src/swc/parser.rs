//! SWC text parser.
//!
//! Each data line holds seven whitespace separated fields:
//! `index type x y z radius parent`. Extra fields are ignored. Lines with
//! fewer fields, or whose leading fields are not numbers, are dropped.

use glam::Vec3;

use super::lines::{for_each_line, tokens};
use super::nodes::CellNodes;
use super::{CellNode, CellNodeType};

/// Number of leading fields read from a data line.
const SWC_FIELDS: usize = 7;

/// Parse SWC `content` into a node graph. Never fails: malformed lines are
/// skipped and the remaining lines are still read.
pub fn parse_swc(content: &str) -> CellNodes {
    let mut nodes = Vec::new();
    let mut dropped = 0usize;

    for (line_no, line) in for_each_line(content).enumerate() {
        match parse_line(line) {
            Some(node) => nodes.push(node),
            None => {
                if !super::lines::strip_comment(line).is_empty() {
                    dropped += 1;
                    log::debug!("swc: dropped line {}: {:?}", line_no + 1, line);
                }
            }
        }
    }

    if dropped > 0 {
        log::debug!("swc: {} malformed lines skipped", dropped);
    }
    CellNodes::new(nodes)
}

/// Parse one line. `None` when it has fewer than seven fields or one of
/// them is not a number.
pub fn parse_line(line: &str) -> Option<CellNode> {
    let mut fields = [0f64; SWC_FIELDS];
    let mut count = 0;
    for token in tokens(line).take(SWC_FIELDS) {
        fields[count] = token.parse::<f64>().ok()?;
        count += 1;
    }
    if count < SWC_FIELDS {
        return None;
    }

    let [index, raw_type, x, y, z, radius, parent] = fields;
    let node_type = CellNodeType::from_code(raw_type);
    Some(CellNode {
        index: index as i64,
        // Any negative parent, fractional ones included, marks a root.
        parent: if parent < 0.0 { -1 } else { parent as i64 },
        node_type,
        position: Vec3::new(x as f32, y as f32, z as f32),
        radius: radius as f32,
        u: 0.0,
        v: node_type.texture_coord(),
    })
}
