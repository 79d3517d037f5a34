use bitflags::bitflags;

use crate::ir::BlockId;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Index into the per-pass block arena (same order as the input block list).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockIdx(pub u32);

/// Index into the per-pass loop arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoopIdx(pub u32);

/// Index into the layout-node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIdx(pub u32);

impl BlockIdx {
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

impl LoopIdx {
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

impl NodeIdx {
    /// Placeholder for a destination slot that has not been wired yet.
    /// Materialization fills every slot; a surviving placeholder is a bug.
    pub const UNSET: NodeIdx = NodeIdx(u32::MAX);

    pub fn idx(self) -> usize {
        self.0 as usize
    }

    pub fn is_set(self) -> bool {
        self != Self::UNSET
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeFlags: u8 {
        /// Part of the contiguous dummy run at the left edge of its layer.
        const LEFTMOST_DUMMY = 1 << 0;
        /// Part of the contiguous dummy run at the right edge of its layer.
        const RIGHTMOST_DUMMY = 1 << 1;
        /// Backedge dummy wired directly into the backedge block's node.
        const IMMINENT_BACKEDGE_DUMMY = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Owns a block; size equals the block's measured size.
    Block(BlockIdx),
    /// Zero-size stand-in for one layer of a multi-layer forward edge.
    /// `dst` is the block the edge finally leads to.
    ForwardDummy { dst: BlockIdx },
    /// Zero-size stand-in for one layer of a backedge return column.
    /// `dst` is the backedge block the column climbs to.
    BackedgeDummy { dst: BlockIdx },
}

#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub id: NodeIdx,
    pub kind: NodeKind,
    pub layer: usize,
    pub pos: Vec2,
    pub size: Vec2,
    /// Incoming neighbors in arrival order.
    pub src_nodes: Vec<NodeIdx>,
    /// Outgoing neighbors, one slot per source port.
    pub dst_nodes: Vec<NodeIdx>,
    /// Vertical joint offset per destination, filled by the joint router.
    pub joint_offsets: Vec<f32>,
    pub flags: NodeFlags,
}

impl LayoutNode {
    pub fn new(id: NodeIdx, kind: NodeKind, layer: usize, size: Vec2, ports: usize) -> Self {
        Self {
            id,
            kind,
            layer,
            pos: Vec2::default(),
            size,
            src_nodes: Vec::new(),
            dst_nodes: vec![NodeIdx::UNSET; ports],
            joint_offsets: vec![0.0; ports],
            flags: NodeFlags::empty(),
        }
    }

    pub fn is_dummy(&self) -> bool {
        !matches!(self.kind, NodeKind::Block(_))
    }

    pub fn is_backedge_dummy(&self) -> bool {
        matches!(self.kind, NodeKind::BackedgeDummy { .. })
    }

    pub fn block(&self) -> Option<BlockIdx> {
        match self.kind {
            NodeKind::Block(b) => Some(b),
            _ => None,
        }
    }

    /// Final destination block of a dummy's edge.
    pub fn dst_block(&self) -> Option<BlockIdx> {
        match self.kind {
            NodeKind::ForwardDummy { dst } | NodeKind::BackedgeDummy { dst } => Some(dst),
            NodeKind::Block(_) => None,
        }
    }

    pub fn right(&self) -> f32 {
        self.pos.x + self.size.x
    }
}

/// Per-block layout state, parallel to the input block list.
#[derive(Debug, Clone)]
pub struct BlockLayout {
    pub id: BlockId,
    pub number: u32,
    pub loop_depth: u32,
    pub is_loop_header: bool,
    pub is_backedge: bool,
    pub preds: Vec<BlockIdx>,
    pub succs: Vec<BlockIdx>,
    /// Rendered text lines (header line + one per instruction).
    pub lines: Vec<String>,
    pub size: Vec2,
    /// Layer assigned by the layerer; -1 until assigned (unreachable blocks
    /// keep -1 and are skipped by materialization).
    pub layer: i32,
    /// Innermost enclosing loop.
    pub loop_id: LoopIdx,
    /// Back-reference to the node materialized for this block.
    pub node: Option<NodeIdx>,
}

/// One loop context: a true loop (headed by a `loopheader` block) or the
/// synthetic context of a CFG root.
#[derive(Debug, Clone)]
pub struct LoopLayout {
    pub header: BlockIdx,
    pub parent: Option<LoopIdx>,
    pub depth: u32,
    /// Layers spanned by the loop body, computed during layering.
    pub loop_height: u32,
    /// Loop-exit successors collected during layering, layered only after
    /// the body height is known.
    pub outgoing_edges: Vec<BlockIdx>,
    backedge: Option<BlockIdx>,
}

impl LoopLayout {
    pub fn true_loop(header: BlockIdx, depth: u32, backedge: BlockIdx) -> Self {
        Self {
            header,
            parent: None,
            depth,
            loop_height: 0,
            outgoing_edges: Vec::new(),
            backedge: Some(backedge),
        }
    }

    pub fn synthetic_root(header: BlockIdx) -> Self {
        Self {
            header,
            parent: None,
            depth: 0,
            loop_height: 0,
            outgoing_edges: Vec::new(),
            backedge: None,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.backedge.is_none()
    }

    /// The unique backedge predecessor of this loop's header. Synthetic root
    /// contexts have none; asking for it is a programmer error.
    pub fn backedge(&self) -> BlockIdx {
        self.backedge
            .expect("synthetic root context has no backedge")
    }
}

/// Geometry handed to the renderer. All coordinates include the outer
/// content padding.
#[derive(Debug, Clone)]
pub struct PassLayout {
    pub blocks: Vec<BlockLayout>,
    pub loops: Vec<LoopLayout>,
    pub nodes: Vec<LayoutNode>,
    /// Nodes per layer in left-to-right order.
    pub nodes_by_layer: Vec<Vec<NodeIdx>>,
    pub layer_ys: Vec<f32>,
    pub layer_heights: Vec<f32>,
    pub track_heights: Vec<f32>,
    pub width: f32,
    pub height: f32,
}

/// How a wired connection should be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Ordinary forward flow into the next layer (block or forward dummy).
    ForwardDownward,
    /// Return-column segment climbing from one backedge dummy to the next.
    ForwardUpwardBetweenDummies,
    /// A block handing its edge into the current layer's return column.
    ToBackedgeDummy,
    /// The column's last segment, sideways into the backedge block itself.
    ToBackedgeFinal,
    /// The backedge block re-entering its loop header.
    LoopHeaderReturn,
}

#[derive(Debug, Clone, Copy)]
pub struct EdgeRef {
    pub src: NodeIdx,
    pub port: usize,
    pub dst: NodeIdx,
    pub kind: EdgeKind,
    pub joint_offset: f32,
}

impl PassLayout {
    pub fn node(&self, idx: NodeIdx) -> &LayoutNode {
        &self.nodes[idx.idx()]
    }

    pub fn block(&self, idx: BlockIdx) -> &BlockLayout {
        &self.blocks[idx.idx()]
    }

    pub fn loop_ctx(&self, idx: LoopIdx) -> &LoopLayout {
        &self.loops[idx.idx()]
    }

    pub fn edge_kind(&self, src: NodeIdx, dst: NodeIdx) -> EdgeKind {
        let src_node = self.node(src);
        let dst_node = self.node(dst);
        match (src_node.kind, dst_node.kind) {
            (NodeKind::Block(b), _) if self.block(b).is_backedge => EdgeKind::LoopHeaderReturn,
            (NodeKind::BackedgeDummy { .. }, NodeKind::BackedgeDummy { .. }) => {
                EdgeKind::ForwardUpwardBetweenDummies
            }
            (_, NodeKind::BackedgeDummy { .. }) => EdgeKind::ToBackedgeDummy,
            (NodeKind::BackedgeDummy { .. }, NodeKind::Block(_)) => EdgeKind::ToBackedgeFinal,
            _ => EdgeKind::ForwardDownward,
        }
    }

    /// Every wired connection, in node order.
    pub fn edges(&self) -> impl Iterator<Item = EdgeRef> + '_ {
        self.nodes.iter().flat_map(move |node| {
            node.dst_nodes
                .iter()
                .enumerate()
                .filter(|(_, dst)| dst.is_set())
                .map(move |(port, &dst)| EdgeRef {
                    src: node.id,
                    port,
                    dst,
                    kind: self.edge_kind(node.id, dst),
                    joint_offset: node.joint_offsets[port],
                })
        })
    }
}
