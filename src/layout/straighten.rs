use std::collections::{HashMap, HashSet};

use crate::config::LayoutConfig;

use super::loops::Graph;
use super::types::{NodeFlags, NodeIdx, NodeKind};

/// Assign x-coordinates with a fixed pipeline of local passes. Every pass
/// only moves nodes rightward and preserves the left-to-right order of each
/// layer, so the pipeline converges without a fixed-point search and small
/// input changes cannot reorder the picture.
pub(super) fn straighten(g: &mut Graph, config: &LayoutConfig) {
    for _ in 0..config.layout_iterations {
        straighten_children(g, config);
        push_into_loops(g);
        straighten_dummy_runs(g, config);
    }
    straighten_dummy_runs(g, config);

    for i in 0..config.nearly_straight_iterations {
        if i % 2 == 0 {
            straighten_nearly_straight(g, config, true);
        } else {
            straighten_nearly_straight(g, config, false);
        }
    }

    straighten_conservative(g, config);
    straighten_dummy_runs(g, config);
    suck_in_leftmost_dummies(g, config);
}

fn is_backedge_block(g: &Graph, node: NodeIdx) -> bool {
    match g.nodes[node.idx()].kind {
        NodeKind::Block(b) => g.blocks[b.idx()].is_backedge,
        _ => false,
    }
}

/// Minimum gap required between `prev` and its right neighbor `cur`.
fn required_gap(g: &Graph, config: &LayoutConfig, prev: NodeIdx, cur: NodeIdx) -> f32 {
    if is_backedge_block(g, prev) {
        // The return column hangs at the pushout distance; anything else
        // must clear the column line as well.
        if g.nodes[cur.idx()].is_dummy() {
            return config.backedge_arrow_pushout;
        }
        return config.backedge_arrow_pushout + config.block_gap + config.port_start;
    }
    let mut gap = config.block_gap;
    if g.nodes[prev.idx()].is_dummy() && !g.nodes[cur.idx()].is_dummy() {
        // First non-dummy after a dummy run: leave room for the incoming
        // edge to meet the block's port.
        gap += config.port_start;
    }
    gap
}

/// Sweep a layer left-to-right, shifting nodes right until every neighbor
/// pair respects its gap.
fn push_neighbors(g: &mut Graph, config: &LayoutConfig, layer: usize) {
    for i in 1..g.layers[layer].len() {
        let prev = g.layers[layer][i - 1];
        let cur = g.layers[layer][i];
        let min_x = g.nodes[prev.idx()].right() + required_gap(g, config, prev, cur);
        if g.nodes[cur.idx()].pos.x < min_x {
            g.nodes[cur.idx()].pos.x = min_x;
        }
    }
}

fn push_neighbors_all(g: &mut Graph, config: &LayoutConfig) {
    for layer in 0..g.layers.len() {
        push_neighbors(g, config, layer);
    }
}

/// Top-down: pull each node's children right so the child's input port
/// lines up under the parent port feeding it. Only a child whose *first*
/// source is this node moves, only rightward, and never past a sibling
/// already shifted this layer, so layer order is preserved.
fn straighten_children(g: &mut Graph, config: &LayoutConfig) {
    for layer in 0..g.layers.len() {
        push_neighbors(g, config, layer);
        if layer + 1 >= g.layers.len() {
            continue;
        }

        let mut index_in_next: HashMap<NodeIdx, usize> = HashMap::new();
        for (i, &n) in g.layers[layer + 1].iter().enumerate() {
            index_in_next.insert(n, i);
        }

        let mut highest_shifted: Option<usize> = None;
        let mut shifted: HashSet<NodeIdx> = HashSet::new();
        for pos in 0..g.layers[layer].len() {
            let node = g.layers[layer][pos];
            for port in 0..g.nodes[node.idx()].dst_nodes.len() {
                let child = g.nodes[node.idx()].dst_nodes[port];
                if !child.is_set() || g.nodes[child.idx()].layer != layer + 1 {
                    continue;
                }
                if g.nodes[child.idx()].src_nodes.first() != Some(&node) {
                    continue;
                }
                if shifted.contains(&child) {
                    continue;
                }
                let child_index = index_in_next[&child];
                if let Some(highest) = highest_shifted {
                    if child_index <= highest {
                        continue;
                    }
                }
                let target = g.nodes[node.idx()].pos.x + port as f32 * config.port_spacing;
                if target > g.nodes[child.idx()].pos.x {
                    g.nodes[child.idx()].pos.x = target;
                    shifted.insert(child);
                    highest_shifted = Some(child_index);
                }
            }
        }
    }
}

/// Loop bodies never stick out left of their header.
fn push_into_loops(g: &mut Graph) {
    for i in 0..g.nodes.len() {
        let NodeKind::Block(b) = g.nodes[i].kind else {
            continue;
        };
        let mut lp = g.blocks[b.idx()].loop_id;
        while !g.loops[lp.idx()].is_synthetic() {
            let header = g.loops[lp.idx()].header;
            if header != b {
                if let Some(header_node) = g.blocks[header.idx()].node {
                    let header_x = g.nodes[header_node.idx()].pos.x;
                    if g.nodes[i].pos.x < header_x {
                        g.nodes[i].pos.x = header_x;
                    }
                }
            }
            match g.loops[lp.idx()].parent {
                Some(parent) => lp = parent,
                None => break,
            }
        }
    }
}

/// A dummy column (all dummies sharing a final destination) is meant to be
/// one vertical line. Backedge columns anchor just right of their backedge
/// block; forward columns settle at their current rightmost member.
fn straighten_dummy_runs(g: &mut Graph, config: &LayoutConfig) {
    let mut columns: HashMap<(bool, u32), Vec<NodeIdx>> = HashMap::new();
    for node in &g.nodes {
        if let Some(dst) = node.dst_block() {
            columns
                .entry((node.is_backedge_dummy(), dst.0))
                .or_default()
                .push(node.id);
        }
    }

    let mut ordered: Vec<_> = columns.into_iter().collect();
    ordered.sort_by_key(|(key, _)| *key);
    for ((is_backedge, dst), members) in ordered {
        let mut target = f32::MIN;
        if is_backedge {
            if let Some(backedge_node) = g.blocks[dst as usize].node {
                target = g.nodes[backedge_node.idx()].right() + config.backedge_arrow_pushout;
            }
        }
        for &m in &members {
            target = target.max(g.nodes[m.idx()].pos.x);
        }
        for &m in &members {
            g.nodes[m.idx()].pos.x = target;
        }
    }

    push_neighbors_all(g, config);
}

/// Align almost-vertical dummy edges exactly. Alternating sweep direction
/// lets an alignment propagate along a chain in both directions.
fn straighten_nearly_straight(g: &mut Graph, config: &LayoutConfig, upward: bool) {
    let order: Vec<usize> = if upward {
        (0..g.layers.len()).rev().collect()
    } else {
        (0..g.layers.len()).collect()
    };
    for layer in order {
        for i in 0..g.layers[layer].len() {
            let node = g.layers[layer][i];
            if !g.nodes[node.idx()].is_dummy() {
                continue;
            }
            if g.nodes[node.idx()]
                .flags
                .contains(NodeFlags::IMMINENT_BACKEDGE_DUMMY)
            {
                // This edge runs sideways into the backedge block; pulling
                // the endpoints together would fight the arrow pushout.
                continue;
            }
            let dst = g.nodes[node.idx()].dst_nodes[0];
            if !dst.is_set() {
                continue;
            }
            let a = g.nodes[node.idx()].pos.x;
            let b = g.nodes[dst.idx()].pos.x;
            if (a - b).abs() <= config.nearly_straight {
                let aligned = a.max(b);
                g.nodes[node.idx()].pos.x = aligned;
                g.nodes[dst.idx()].pos.x = aligned;
            }
        }
    }
}

/// Right-to-left per layer: move each block right by the smallest delta
/// that lines it up with a parent port or a child port, as long as nothing
/// to the right (other than trivially movable rightmost dummies) would
/// overlap.
fn straighten_conservative(g: &mut Graph, config: &LayoutConfig) {
    for layer in 0..g.layers.len() {
        for i in (0..g.layers[layer].len()).rev() {
            let node = g.layers[layer][i];
            let NodeKind::Block(_) = g.nodes[node.idx()].kind else {
                continue;
            };
            if is_backedge_block(g, node) {
                continue;
            }

            let mut candidates: Vec<f32> = Vec::new();
            let mut already_aligned = false;
            for &src in &g.nodes[node.idx()].src_nodes {
                if g.nodes[src.idx()].layer + 1 != layer {
                    continue;
                }
                let Some(port) = g.nodes[src.idx()].dst_nodes.iter().position(|&d| d == node)
                else {
                    continue;
                };
                let delta = g.nodes[src.idx()].pos.x + port as f32 * config.port_spacing
                    - g.nodes[node.idx()].pos.x;
                if delta == 0.0 {
                    already_aligned = true;
                } else if delta > 0.0 {
                    candidates.push(delta);
                }
            }
            for (port, &child) in g.nodes[node.idx()].dst_nodes.iter().enumerate() {
                if !child.is_set() || g.nodes[child.idx()].layer != layer + 1 {
                    continue;
                }
                let delta = g.nodes[child.idx()].pos.x
                    - g.nodes[node.idx()].pos.x
                    - port as f32 * config.port_spacing;
                if delta == 0.0 {
                    already_aligned = true;
                } else if delta > 0.0 {
                    candidates.push(delta);
                }
            }
            // A node with a straight edge stays put; moving it would trade
            // one straight edge for another.
            if already_aligned || candidates.is_empty() {
                continue;
            }
            candidates.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

            let limit = g.layers[layer][i + 1..]
                .iter()
                .find(|n| !g.nodes[n.idx()].flags.contains(NodeFlags::RIGHTMOST_DUMMY))
                .map(|n| g.nodes[n.idx()].pos.x);
            for delta in candidates {
                let fits = match limit {
                    Some(limit) => {
                        g.nodes[node.idx()].right() + delta + config.block_gap <= limit
                    }
                    None => true,
                };
                if fits {
                    g.nodes[node.idx()].pos.x += delta;
                    break;
                }
            }
        }
    }
}

/// Leftmost dummy runs start far left of the content. Pull each column as
/// far right as its neighbors, its sources' ports, and its destination
/// block allow, keeping the column a single vertical line.
fn suck_in_leftmost_dummies(g: &mut Graph, config: &LayoutConfig) {
    let mut column_safe: HashMap<(bool, u32), f32> = HashMap::new();

    for layer in 0..g.layers.len() {
        let run_len = g.layers[layer]
            .iter()
            .take_while(|n| g.nodes[n.idx()].flags.contains(NodeFlags::LEFTMOST_DUMMY))
            .count();
        if run_len == 0 {
            continue;
        }
        let mut bound = match g.layers[layer].get(run_len) {
            Some(&next) => {
                let prev = g.layers[layer][run_len - 1];
                g.nodes[next.idx()].pos.x - required_gap(g, config, prev, next)
            }
            None => f32::INFINITY,
        };
        for i in (0..run_len).rev() {
            let node = g.layers[layer][i];
            let mut safe = bound;
            for &src in &g.nodes[node.idx()].src_nodes {
                if let Some(port) = g.nodes[src.idx()].dst_nodes.iter().position(|&d| d == node)
                {
                    safe = safe
                        .min(g.nodes[src.idx()].pos.x + port as f32 * config.port_spacing);
                }
            }
            let dst = g.nodes[node.idx()]
                .dst_block()
                .expect("leftmost run contains only dummies");
            if let Some(dst_node) = g.blocks[dst.idx()].node {
                safe = safe.min(g.nodes[dst_node.idx()].pos.x);
            }
            let key = (g.nodes[node.idx()].is_backedge_dummy(), dst.0);
            let entry = column_safe.entry(key).or_insert(f32::INFINITY);
            *entry = entry.min(safe);
            bound = safe - config.block_gap;
        }
    }

    for i in 0..g.nodes.len() {
        if !g.nodes[i].flags.contains(NodeFlags::LEFTMOST_DUMMY) {
            continue;
        }
        let Some(dst) = g.nodes[i].dst_block() else {
            continue;
        };
        let key = (g.nodes[i].is_backedge_dummy(), dst.0);
        if let Some(&safe) = column_safe.get(&key) {
            if safe.is_finite() && safe > g.nodes[i].pos.x {
                g.nodes[i].pos.x = safe;
            }
        }
    }
}
