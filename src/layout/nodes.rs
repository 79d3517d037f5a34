use std::collections::HashMap;

use log::warn;

use super::loops::Graph;
use super::types::{BlockIdx, LayoutNode, LoopIdx, NodeFlags, NodeIdx, NodeKind, Vec2};

/// A forward edge still in flight: `src`'s port `port` will eventually reach
/// block `dst` on a deeper layer.
struct ActiveEdge {
    src: NodeIdx,
    port: usize,
    dst: BlockIdx,
}

/// Materialize layout nodes layer by layer: block nodes for the blocks,
/// forward dummies for edges crossing a layer, and one return-column dummy
/// per active loop per layer. After all layers are built, over-extended
/// return columns are pruned and edge-of-layer dummy runs are flagged.
pub(super) fn materialize(g: &mut Graph) {
    let max_layer = g.blocks.iter().map(|b| b.layer).max().unwrap_or(-1);
    if max_layer < 0 {
        return;
    }
    let layer_count = (max_layer + 1) as usize;
    let mut blocks_by_layer: Vec<Vec<BlockIdx>> = vec![Vec::new(); layer_count];
    for (i, block) in g.blocks.iter().enumerate() {
        if block.layer >= 0 {
            blocks_by_layer[block.layer as usize].push(BlockIdx(i as u32));
        }
    }

    g.layers = vec![Vec::new(); layer_count];
    let mut active: Vec<ActiveEdge> = Vec::new();
    let mut latest_backedge_dummy: HashMap<BlockIdx, NodeIdx> = HashMap::new();

    for layer in 0..layer_count {
        // Edges whose destination sits on this layer terminate here; the
        // rest extend through a dummy.
        let mut arriving = Vec::new();
        let mut surviving = Vec::new();
        for edge in active.drain(..) {
            if g.blocks[edge.dst.idx()].layer as usize == layer {
                arriving.push(edge);
            } else {
                surviving.push(edge);
            }
        }

        // Forward dummies, coalesced by final destination. The surviving
        // edge is re-rooted at the dummy's single port so the chain extends
        // one layer at a time.
        let mut dummy_for: HashMap<BlockIdx, NodeIdx> = HashMap::new();
        let mut chained: Vec<ActiveEdge> = Vec::new();
        for edge in surviving {
            let dummy = match dummy_for.get(&edge.dst) {
                Some(&d) => d,
                None => {
                    let d = new_node(g, NodeKind::ForwardDummy { dst: edge.dst }, layer, 1);
                    g.layers[layer].push(d);
                    dummy_for.insert(edge.dst, d);
                    chained.push(ActiveEdge {
                        src: d,
                        port: 0,
                        dst: edge.dst,
                    });
                    d
                }
            };
            connect(g, edge.src, edge.port, dummy);
        }
        active = chained;

        // Every loop with a block on this layer keeps its return column
        // alive. The column dummy is anchored after the loop's rightmost
        // block; inner loops come before outer ones at a shared anchor.
        let mut pending: Vec<(LoopIdx, BlockIdx)> = Vec::new();
        for &b in &blocks_by_layer[layer] {
            let mut lp = g.blocks[b.idx()].loop_id;
            while !g.loops[lp.idx()].is_synthetic() {
                match pending.iter_mut().find(|(seen, _)| *seen == lp) {
                    Some(entry) => entry.1 = b,
                    None => pending.push((lp, b)),
                }
                match g.loops[lp.idx()].parent {
                    Some(parent) => lp = parent,
                    None => break,
                }
            }
        }
        let mut anchors: HashMap<BlockIdx, Vec<LoopIdx>> = HashMap::new();
        for (lp, anchor) in pending {
            anchors.entry(anchor).or_default().push(lp);
        }
        for list in anchors.values_mut() {
            list.sort_by_key(|lp| std::cmp::Reverse(g.loops[lp.idx()].depth));
        }

        // Block nodes, with terminating edges wired in and this layer's
        // backedge dummies interleaved right of their anchor block.
        for &b in &blocks_by_layer[layer] {
            let ports = g.blocks[b.idx()].succs.len();
            let size = g.blocks[b.idx()].size;
            let node = new_node_sized(g, NodeKind::Block(b), layer, size, ports);
            g.blocks[b.idx()].node = Some(node);
            g.layers[layer].push(node);
            for edge in arriving.iter().filter(|e| e.dst == b) {
                connect(g, edge.src, edge.port, node);
            }

            let Some(loops_here) = anchors.get(&b) else {
                continue;
            };
            for &lp in loops_here {
                let backedge = g.loops[lp.idx()].backedge();
                let target = match latest_backedge_dummy.get(&backedge) {
                    Some(&prev) => Some((prev, false)),
                    None => g.blocks[backedge.idx()].node.map(|n| (n, true)),
                };
                let Some((target, imminent)) = target else {
                    // Unreachable backedge block; the loop has no column.
                    warn!(
                        "backedge block {} has no layout node; skipping its return column",
                        g.blocks[backedge.idx()].id
                    );
                    continue;
                };
                let dummy = new_node(g, NodeKind::BackedgeDummy { dst: backedge }, layer, 1);
                g.layers[layer].push(dummy);
                connect(g, dummy, 0, target);
                if imminent {
                    g.nodes[dummy.idx()].flags |= NodeFlags::IMMINENT_BACKEDGE_DUMMY;
                }
                latest_backedge_dummy.insert(backedge, dummy);
            }
        }

        // Emit this layer's outgoing edges now that every node and column
        // dummy of the layer exists.
        for &b in &blocks_by_layer[layer] {
            let node = g.blocks[b.idx()].node.expect("block node just created");
            if g.blocks[b.idx()].is_backedge {
                let header = g.blocks[b.idx()].succs[0];
                if let Some(header_node) = g.blocks[header.idx()].node {
                    connect(g, node, 0, header_node);
                }
                continue;
            }
            let succs = g.blocks[b.idx()].succs.clone();
            for (port, &succ) in succs.iter().enumerate() {
                if g.blocks[succ.idx()].is_backedge {
                    let target = latest_backedge_dummy
                        .get(&succ)
                        .copied()
                        .or(g.blocks[succ.idx()].node);
                    match target {
                        Some(target) => connect(g, node, port, target),
                        None => warn!(
                            "no return column for backedge block {}",
                            g.blocks[succ.idx()].id
                        ),
                    }
                } else {
                    active.push(ActiveEdge {
                        src: node,
                        port,
                        dst: succ,
                    });
                }
            }
        }
    }

    if !active.is_empty() {
        debug_assert!(false, "forward edges left unterminated after all layers");
        warn!("{} forward edges never reached their destination", active.len());
    }

    prune_orphan_columns(g);
    flag_edge_dummies(g);
    check_wiring(g);
}

fn new_node(g: &mut Graph, kind: NodeKind, layer: usize, ports: usize) -> NodeIdx {
    new_node_sized(g, kind, layer, Vec2::default(), ports)
}

fn new_node_sized(g: &mut Graph, kind: NodeKind, layer: usize, size: Vec2, ports: usize) -> NodeIdx {
    let id = NodeIdx(g.nodes.len() as u32);
    g.nodes.push(LayoutNode::new(id, kind, layer, size, ports));
    id
}

fn connect(g: &mut Graph, src: NodeIdx, port: usize, dst: NodeIdx) {
    debug_assert!(
        !g.nodes[src.idx()].dst_nodes[port].is_set(),
        "destination port wired twice"
    );
    g.nodes[src.idx()].dst_nodes[port] = dst;
    g.nodes[dst.idx()].src_nodes.push(src);
}

/// A return column is created on every layer its loop touches, which can
/// reach past the deepest block that actually jumps to the backedge. Remove
/// sourceless column dummies bottom-up, stopping at the first node that
/// still has another input.
fn prune_orphan_columns(g: &mut Graph) {
    let mut removed = vec![false; g.nodes.len()];
    let mut queue: Vec<NodeIdx> = g
        .nodes
        .iter()
        .filter(|n| n.is_backedge_dummy() && n.src_nodes.is_empty())
        .map(|n| n.id)
        .collect();

    while let Some(n) = queue.pop() {
        if removed[n.idx()] {
            continue;
        }
        removed[n.idx()] = true;
        let dst = g.nodes[n.idx()].dst_nodes[0];
        if dst.is_set() {
            g.nodes[dst.idx()].src_nodes.retain(|&s| s != n);
            if g.nodes[dst.idx()].is_backedge_dummy() && g.nodes[dst.idx()].src_nodes.is_empty() {
                queue.push(dst);
            }
        }
    }

    if !removed.contains(&true) {
        return;
    }

    // Compact the arena and remap every index.
    let mut remap = vec![NodeIdx::UNSET; g.nodes.len()];
    let mut kept: Vec<LayoutNode> = Vec::with_capacity(g.nodes.len());
    for node in g.nodes.drain(..) {
        if removed[node.id.idx()] {
            continue;
        }
        let new_id = NodeIdx(kept.len() as u32);
        remap[node.id.idx()] = new_id;
        let mut node = node;
        node.id = new_id;
        kept.push(node);
    }
    for node in &mut kept {
        for src in &mut node.src_nodes {
            *src = remap[src.idx()];
        }
        for dst in &mut node.dst_nodes {
            if dst.is_set() {
                *dst = remap[dst.idx()];
            }
        }
    }
    g.nodes = kept;
    for layer in &mut g.layers {
        layer.retain(|n| remap[n.idx()].is_set());
        for n in layer.iter_mut() {
            *n = remap[n.idx()];
        }
    }
    for block in &mut g.blocks {
        if let Some(n) = block.node {
            block.node = Some(remap[n.idx()]);
        }
    }
}

/// Contiguous dummy runs at either end of a layer get special treatment in
/// the straightener, so mark them now.
fn flag_edge_dummies(g: &mut Graph) {
    for layer in &g.layers {
        for &n in layer {
            if !g.nodes[n.idx()].is_dummy() {
                break;
            }
            g.nodes[n.idx()].flags |= NodeFlags::LEFTMOST_DUMMY;
        }
        for &n in layer.iter().rev() {
            if !g.nodes[n.idx()].is_dummy() {
                break;
            }
            g.nodes[n.idx()].flags |= NodeFlags::RIGHTMOST_DUMMY;
        }
    }
}

fn check_wiring(g: &Graph) {
    for node in &g.nodes {
        match node.kind {
            NodeKind::Block(b) => {
                let expected = g.blocks[b.idx()].succs.len();
                let wired = node.dst_nodes.iter().filter(|d| d.is_set()).count();
                if node.dst_nodes.len() != expected || wired != expected {
                    debug_assert!(false, "block node {:?} has unwired ports", node.id);
                    warn!(
                        "block {} has {wired} of {expected} edges wired",
                        g.blocks[b.idx()].id
                    );
                }
            }
            NodeKind::ForwardDummy { .. } | NodeKind::BackedgeDummy { .. } => {
                if node.dst_nodes.len() != 1 || !node.dst_nodes[0].is_set() {
                    debug_assert!(false, "dummy {:?} without destination", node.id);
                    warn!("dummy node without a destination");
                }
                if node.src_nodes.is_empty() && !node.is_backedge_dummy() {
                    debug_assert!(false, "orphan forward dummy {:?}", node.id);
                    warn!("orphan forward dummy survived materialization");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::layering::assign_layers;
    use crate::layout::loops::{build_graph, classify_loops};
    use crate::layout::testutil::block;

    fn materialized(blocks: &[crate::ir::Block]) -> Graph {
        let mut g = build_graph(blocks).unwrap();
        classify_loops(&mut g).unwrap();
        assign_layers(&mut g);
        materialize(&mut g);
        g
    }

    #[test]
    fn long_edge_grows_one_dummy_per_layer() {
        // 0 -> 1 -> 2 -> 3 plus the skip edge 0 -> 3.
        let g = materialized(&[
            block(0, 0, &[], &[], &[1, 3]),
            block(1, 0, &[], &[0], &[2]),
            block(2, 0, &[], &[1], &[3]),
            block(3, 0, &[], &[0, 2], &[]),
        ]);
        let dummies: Vec<_> = g.nodes.iter().filter(|n| n.is_dummy()).collect();
        assert_eq!(dummies.len(), 2);
        assert!(dummies.iter().all(|d| d.dst_block() == Some(BlockIdx(3))));
        assert_eq!(dummies[0].layer, 1);
        assert_eq!(dummies[1].layer, 2);
        // Chain: block0 -> dummy@1 -> dummy@2 -> block3.
        let final_node = g.blocks[3].node.unwrap();
        assert_eq!(g.nodes[dummies[1].id.idx()].dst_nodes[0], final_node);
        assert_eq!(g.nodes[final_node.idx()].src_nodes.len(), 2);
    }

    #[test]
    fn simple_loop_builds_one_column() {
        // 0(header) -> 2, 0 -> 1(backedge) -> 0.
        let g = materialized(&[
            block(0, 1, &["loopheader"], &[1], &[2, 1]),
            block(1, 1, &["backedge"], &[0], &[0]),
            block(2, 0, &[], &[0], &[]),
        ]);
        let columns: Vec<_> = g.nodes.iter().filter(|n| n.is_backedge_dummy()).collect();
        assert_eq!(columns.len(), 1);
        let dummy = columns[0];
        assert!(dummy.flags.contains(NodeFlags::IMMINENT_BACKEDGE_DUMMY));
        assert_eq!(dummy.dst_nodes[0], g.blocks[1].node.unwrap());
        // Header's edge to the backedge block is routed through the column.
        let header_node = &g.nodes[g.blocks[0].node.unwrap().idx()];
        assert_eq!(header_node.dst_nodes[1], dummy.id);
        // Backedge block returns straight to the header.
        let backedge_node = &g.nodes[g.blocks[1].node.unwrap().idx()];
        assert_eq!(backedge_node.dst_nodes[0], g.blocks[0].node.unwrap());
    }

    #[test]
    fn column_stops_at_loop_bottom() {
        // header -> A -> B(backedge); A also exits to X below the loop.
        // The column spans layers 0..=1 and every surviving dummy keeps a
        // source; no column dummy appears on X's layer.
        let g = materialized(&[
            block(0, 1, &["loopheader"], &[2], &[1]),
            block(1, 1, &[], &[0], &[2, 3]),
            block(2, 1, &["backedge"], &[1], &[0]),
            block(3, 0, &[], &[1], &[]),
        ]);
        let column_layers: Vec<usize> = g
            .nodes
            .iter()
            .filter(|n| n.is_backedge_dummy())
            .inspect(|n| assert!(!n.src_nodes.is_empty()))
            .map(|n| n.layer)
            .collect();
        assert_eq!(column_layers, vec![0, 1]);
    }

    #[test]
    fn every_block_port_is_wired() {
        let g = materialized(&[
            block(0, 0, &[], &[], &[1, 2]),
            block(1, 0, &[], &[0], &[3]),
            block(2, 0, &[], &[0], &[3]),
            block(3, 0, &[], &[1, 2], &[]),
        ]);
        for node in &g.nodes {
            if let NodeKind::Block(b) = node.kind {
                assert_eq!(node.dst_nodes.len(), g.blocks[b.idx()].succs.len());
                assert!(node.dst_nodes.iter().all(|d| d.is_set()));
            }
        }
    }
}
