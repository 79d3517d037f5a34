use thiserror::Error;

use crate::ir::BlockId;

/// Malformed-IR conditions that abort layout. No partial geometry is
/// produced; callers render a failure placeholder instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("loop header {header} has {count} backedge predecessors, expected exactly 1")]
    BackedgePredCount { header: BlockId, count: usize },

    #[error("backedge block {block} has {count} successors, expected exactly 1")]
    BackedgeSuccCount { block: BlockId, count: usize },

    #[error("backedge block {block} does not lead to a loop header")]
    BackedgeTarget { block: BlockId },

    #[error(
        "block {block} has loop depth {depth} but the traversal reached it at depth {found}"
    )]
    LoopDepthMismatch {
        block: BlockId,
        depth: u32,
        found: usize,
    },
}
