use std::collections::HashMap;

use crate::ir;

use super::error::LayoutError;
use super::types::{BlockIdx, BlockLayout, LoopIdx, LoopLayout, Vec2};

/// Working state shared by the pipeline stages. `blocks` is parallel to the
/// input block list; loops and nodes are appended as the stages run.
#[derive(Debug)]
pub(super) struct Graph {
    pub blocks: Vec<BlockLayout>,
    pub loops: Vec<LoopLayout>,
    pub roots: Vec<BlockIdx>,
    pub loop_of_header: HashMap<BlockIdx, LoopIdx>,
    pub nodes: Vec<super::types::LayoutNode>,
    pub layers: Vec<Vec<super::types::NodeIdx>>,
}

/// Build adjacency from the id lists, find the CFG roots, and create one
/// loop context per root (synthetic) and per true loop header. Validates the
/// loop shape the rest of the pipeline depends on.
pub(super) fn build_graph(blocks: &[ir::Block]) -> Result<Graph, LayoutError> {
    let mut index_of = HashMap::with_capacity(blocks.len());
    for (i, block) in blocks.iter().enumerate() {
        index_of.insert(block.id, BlockIdx(i as u32));
    }

    let mut layouts = Vec::with_capacity(blocks.len());
    for block in blocks {
        layouts.push(BlockLayout {
            id: block.id,
            number: block.number,
            loop_depth: block.loop_depth,
            is_loop_header: block.is_loop_header(),
            is_backedge: block.is_backedge(),
            preds: block.predecessors.iter().map(|id| index_of[id]).collect(),
            succs: block.successors.iter().map(|id| index_of[id]).collect(),
            lines: Vec::new(),
            size: Vec2::default(),
            layer: -1,
            loop_id: LoopIdx(0),
            node: None,
        });
    }

    let mut loops = Vec::new();
    let mut loop_of_header = HashMap::new();
    let mut roots = Vec::new();

    for (i, block) in layouts.iter().enumerate() {
        let idx = BlockIdx(i as u32);
        if block.preds.is_empty() {
            roots.push(idx);
            loop_of_header.insert(idx, LoopIdx(loops.len() as u32));
            loops.push(LoopLayout::synthetic_root(idx));
        }
    }

    for (i, block) in layouts.iter().enumerate() {
        let idx = BlockIdx(i as u32);
        if block.is_backedge {
            if block.succs.len() != 1 {
                return Err(LayoutError::BackedgeSuccCount {
                    block: block.id,
                    count: block.succs.len(),
                });
            }
            if !layouts[block.succs[0].idx()].is_loop_header {
                return Err(LayoutError::BackedgeTarget { block: block.id });
            }
        }
        if block.is_loop_header {
            let backedges: Vec<BlockIdx> = block
                .preds
                .iter()
                .copied()
                .filter(|p| layouts[p.idx()].is_backedge)
                .collect();
            if backedges.len() != 1 {
                return Err(LayoutError::BackedgePredCount {
                    header: block.id,
                    count: backedges.len(),
                });
            }
            loop_of_header.insert(idx, LoopIdx(loops.len() as u32));
            loops.push(LoopLayout::true_loop(idx, block.loop_depth, backedges[0]));
        }
    }

    Ok(Graph {
        blocks: layouts,
        loops,
        roots,
        loop_of_header,
        nodes: Vec::new(),
        layers: Vec::new(),
    })
}

/// Assign every reachable block its innermost enclosing loop and link the
/// loop tree. Depth-first from each root, in successor order, carrying one
/// stack of loop contexts indexed by loop depth. The stack is truncated on
/// every visit and never restored on backtrack; headers push their own loop
/// at their own depth. Backedge blocks are never traversed out of.
pub(super) fn classify_loops(g: &mut Graph) -> Result<(), LayoutError> {
    let mut visited = vec![false; g.blocks.len()];

    for r in 0..g.roots.len() {
        let root = g.roots[r];
        if visited[root.idx()] {
            continue;
        }
        let mut loop_stack: Vec<LoopIdx> = Vec::new();
        visited[root.idx()] = true;
        enter_block(g, root, &mut loop_stack)?;

        // (block, next successor index) frames reproduce the recursion.
        let mut frames: Vec<(BlockIdx, usize)> = vec![(root, 0)];
        while let Some(&(block, next)) = frames.last() {
            let info = &g.blocks[block.idx()];
            if info.is_backedge || next >= info.succs.len() {
                frames.pop();
                continue;
            }
            let succ = info.succs[next];
            frames.last_mut().expect("frame present").1 += 1;
            if !visited[succ.idx()] {
                visited[succ.idx()] = true;
                enter_block(g, succ, &mut loop_stack)?;
                frames.push((succ, 0));
            }
        }
    }
    Ok(())
}

fn enter_block(
    g: &mut Graph,
    block: BlockIdx,
    loop_stack: &mut Vec<LoopIdx>,
) -> Result<(), LayoutError> {
    let depth = g.blocks[block.idx()].loop_depth as usize;
    if g.blocks[block.idx()].is_loop_header || g.roots.contains(&block) {
        // Entering a loop context: the stack must hold exactly the enclosing
        // contexts (depths 0..depth), whether we come from a parent loop or
        // sideways out of a sibling loop's body.
        loop_stack.truncate(depth);
        if loop_stack.len() != depth {
            return Err(LayoutError::LoopDepthMismatch {
                block: g.blocks[block.idx()].id,
                depth: depth as u32,
                found: loop_stack.len(),
            });
        }
        let lp = g.loop_of_header[&block];
        g.loops[lp.idx()].parent = loop_stack.last().copied();
        loop_stack.push(lp);
    } else {
        loop_stack.truncate(depth + 1);
        if loop_stack.len() != depth + 1 {
            return Err(LayoutError::LoopDepthMismatch {
                block: g.blocks[block.idx()].id,
                depth: depth as u32,
                found: loop_stack.len().saturating_sub(1),
            });
        }
    }
    g.blocks[block.idx()].loop_id = loop_stack[depth];
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::testutil::block;

    #[test]
    fn single_root_becomes_synthetic_context() {
        let blocks = vec![block(0, 0, &[], &[], &[1]), block(1, 0, &[], &[0], &[])];
        let mut g = build_graph(&blocks).unwrap();
        classify_loops(&mut g).unwrap();
        assert_eq!(g.roots, vec![BlockIdx(0)]);
        assert_eq!(g.loops.len(), 1);
        assert!(g.loops[0].is_synthetic());
        assert_eq!(g.blocks[1].loop_id, g.blocks[0].loop_id);
    }

    #[test]
    fn loop_membership_and_tree() {
        // 0 -> 1(header) -> 2 -> 3(backedge) -> 1, 1 -> 4
        let blocks = vec![
            block(0, 0, &[], &[], &[1]),
            block(1, 1, &["loopheader"], &[0, 3], &[2, 4]),
            block(2, 1, &[], &[1], &[3]),
            block(3, 1, &["backedge"], &[2], &[1]),
            block(4, 0, &[], &[1], &[]),
        ];
        let mut g = build_graph(&blocks).unwrap();
        classify_loops(&mut g).unwrap();
        let header_loop = g.loop_of_header[&BlockIdx(1)];
        assert_eq!(g.blocks[1].loop_id, header_loop);
        assert_eq!(g.blocks[2].loop_id, header_loop);
        assert_eq!(g.blocks[3].loop_id, header_loop);
        assert_eq!(g.blocks[4].loop_id, g.blocks[0].loop_id);
        assert_eq!(
            g.loops[header_loop.idx()].parent,
            Some(g.blocks[0].loop_id)
        );
        assert_eq!(g.loops[header_loop.idx()].backedge(), BlockIdx(3));
    }

    #[test]
    fn header_without_backedge_is_rejected() {
        let blocks = vec![
            block(0, 0, &[], &[], &[1]),
            block(1, 1, &["loopheader"], &[0], &[]),
        ];
        let err = build_graph(&blocks).unwrap_err();
        assert!(matches!(err, LayoutError::BackedgePredCount { count: 0, .. }));
    }

    #[test]
    fn backedge_with_two_successors_is_rejected() {
        let blocks = vec![
            block(0, 0, &[], &[], &[1]),
            block(1, 1, &["loopheader"], &[0, 2], &[2]),
            block(2, 1, &["backedge"], &[1], &[1, 0]),
        ];
        let err = build_graph(&blocks).unwrap_err();
        assert!(matches!(err, LayoutError::BackedgeSuccCount { count: 2, .. }));
    }

    #[test]
    fn synthetic_backedge_access_panics() {
        let result = std::panic::catch_unwind(|| {
            LoopLayout::synthetic_root(BlockIdx(0)).backedge();
        });
        assert!(result.is_err());
    }
}
