use super::loops::Graph;
use super::types::BlockIdx;

#[derive(Debug, Clone, Copy)]
struct Frame {
    block: BlockIdx,
    /// Candidate layer this block was entered at.
    layer: i32,
    succ_next: usize,
    outgoing_next: usize,
}

/// Assign every reachable block an integer layer. Forward walk from each
/// root; a block's layer is the maximum candidate it is entered at. Loop-exit
/// successors are not layered when first seen; they are collected on the
/// enclosing loop and entered at `header.layer + loop_height` once the body
/// has been walked, which pins post-loop code strictly below the whole loop
/// even when a path leaves the loop early.
///
/// The walk is an explicit frame stack, not recursion; Ion graphs get deep
/// enough to overflow a thread stack.
pub(super) fn assign_layers(g: &mut Graph) {
    let mut entered = vec![false; g.blocks.len()];
    let mut frames: Vec<Frame> = Vec::new();

    for r in 0..g.roots.len() {
        let root = g.roots[r];
        enter(g, &mut entered, &mut frames, root, 0);

        while let Some(&frame) = frames.last() {
            let block = frame.block;
            let info = &g.blocks[block.idx()];

            if frame.succ_next < info.succs.len() {
                let succ = info.succs[frame.succ_next];
                frames.last_mut().expect("frame present").succ_next += 1;
                if g.blocks[succ.idx()].loop_depth < g.blocks[block.idx()].loop_depth {
                    // Leaving one or more loops: defer to the innermost
                    // enclosing loop until its height is known.
                    let lp = g.blocks[block.idx()].loop_id;
                    if !g.loops[lp.idx()].outgoing_edges.contains(&succ) {
                        g.loops[lp.idx()].outgoing_edges.push(succ);
                    }
                } else {
                    enter(g, &mut entered, &mut frames, succ, frame.layer + 1);
                }
                continue;
            }

            if info.is_loop_header {
                let lp = g.loop_of_header[&block];
                if frame.outgoing_next < g.loops[lp.idx()].outgoing_edges.len() {
                    let succ = g.loops[lp.idx()].outgoing_edges[frame.outgoing_next];
                    frames.last_mut().expect("frame present").outgoing_next += 1;
                    let below_body =
                        g.blocks[block.idx()].layer + g.loops[lp.idx()].loop_height as i32;
                    enter(g, &mut entered, &mut frames, succ, below_body);
                    continue;
                }
            }

            frames.pop();
        }
    }
}

fn enter(
    g: &mut Graph,
    entered: &mut [bool],
    frames: &mut Vec<Frame>,
    block: BlockIdx,
    candidate: i32,
) {
    if g.blocks[block.idx()].is_backedge {
        // A backedge block shares its header's layer and is never walked
        // out of.
        let header = g.blocks[block.idx()].succs[0];
        g.blocks[block.idx()].layer = g.blocks[header.idx()].layer;
        return;
    }

    let current = g.blocks[block.idx()].layer;
    if entered[block.idx()] && current >= candidate {
        return;
    }
    entered[block.idx()] = true;
    let layer = current.max(candidate);
    g.blocks[block.idx()].layer = layer;

    // The block just grew (or confirmed) every enclosing loop's extent.
    let mut lp = g.blocks[block.idx()].loop_id;
    while !g.loops[lp.idx()].is_synthetic() {
        let header = g.loops[lp.idx()].header;
        let span = (layer - g.blocks[header.idx()].layer + 1).max(0) as u32;
        if span > g.loops[lp.idx()].loop_height {
            g.loops[lp.idx()].loop_height = span;
        }
        match g.loops[lp.idx()].parent {
            Some(parent) => lp = parent,
            None => break,
        }
    }

    frames.push(Frame {
        block,
        layer,
        succ_next: 0,
        outgoing_next: 0,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::loops::{build_graph, classify_loops};
    use crate::layout::testutil::block;

    fn layered(blocks: &[crate::ir::Block]) -> Graph {
        let mut g = build_graph(blocks).unwrap();
        classify_loops(&mut g).unwrap();
        assign_layers(&mut g);
        g
    }

    #[test]
    fn straight_line_layers() {
        let g = layered(&[
            block(0, 0, &[], &[], &[1]),
            block(1, 0, &[], &[0], &[2]),
            block(2, 0, &[], &[1], &[]),
        ]);
        assert_eq!(g.blocks[0].layer, 0);
        assert_eq!(g.blocks[1].layer, 1);
        assert_eq!(g.blocks[2].layer, 2);
    }

    #[test]
    fn diamond_join_takes_longest_path() {
        let g = layered(&[
            block(0, 0, &[], &[], &[1, 2]),
            block(1, 0, &[], &[0], &[3]),
            block(2, 0, &[], &[0], &[3]),
            block(3, 0, &[], &[1, 2], &[]),
        ]);
        assert_eq!(g.blocks[1].layer, 1);
        assert_eq!(g.blocks[2].layer, 1);
        assert_eq!(g.blocks[3].layer, 2);
    }

    #[test]
    fn backedge_shares_header_layer() {
        // 0(header) -> 2 (exit), 0 -> 1(backedge) -> 0
        let g = layered(&[
            block(0, 1, &["loopheader"], &[1], &[2, 1]),
            block(1, 1, &["backedge"], &[0], &[0]),
            block(2, 0, &[], &[0], &[]),
        ]);
        assert_eq!(g.blocks[0].layer, 0);
        assert_eq!(g.blocks[1].layer, 0);
        assert_eq!(g.blocks[2].layer, 1);
        let lp = g.loop_of_header[&BlockIdx(0)];
        assert_eq!(g.loops[lp.idx()].loop_height, 1);
    }

    #[test]
    fn early_exit_lands_below_the_loop() {
        // H(header) -> A -> B(backedge) -> H, H -> X with X outside the loop.
        let g = layered(&[
            block(0, 1, &["loopheader"], &[2], &[1, 3]),
            block(1, 1, &[], &[0], &[2]),
            block(2, 1, &["backedge"], &[1], &[0]),
            block(3, 0, &[], &[0], &[]),
        ]);
        let lp = g.loop_of_header[&BlockIdx(0)];
        let height = g.loops[lp.idx()].loop_height as i32;
        assert_eq!(height, 2);
        assert_eq!(g.blocks[3].layer, g.blocks[0].layer + height);
        assert!(g.blocks[3].layer > g.blocks[1].layer);
    }

    #[test]
    fn nested_loops_share_exit() {
        // O(header) -> I(header) -> A -> IB(backedge->I); I -> OB(backedge->O);
        // O -> E and I exits feed E through O's deferral.
        let g = layered(&[
            block(0, 1, &["loopheader"], &[5], &[1, 6]),
            block(1, 2, &["loopheader"], &[0, 3], &[2, 4]),
            block(2, 2, &[], &[1], &[3]),
            block(3, 2, &["backedge"], &[2], &[1]),
            block(4, 1, &[], &[1], &[5]),
            block(5, 1, &["backedge"], &[4], &[0]),
            block(6, 0, &[], &[0], &[]),
        ]);
        let outer = g.loop_of_header[&BlockIdx(0)];
        let inner = g.loop_of_header[&BlockIdx(1)];
        let outer_height = g.loops[outer.idx()].loop_height as i32;
        let inner_height = g.loops[inner.idx()].loop_height as i32;
        assert!(g.blocks[6].layer >= g.blocks[0].layer + outer_height);
        assert!(
            outer_height
                >= inner_height + (g.blocks[1].layer - g.blocks[0].layer) + 1
        );
    }
}
