mod error;
mod layering;
mod loops;
mod nodes;
mod routing;
mod straighten;
pub(crate) mod types;

pub use error::LayoutError;
pub use types::*;

use crate::config::LayoutConfig;
use crate::ir::{Block, IrKind, Pass};
use crate::text_metrics;
use crate::theme::Theme;

/// Lay out one pass of one function: classify loops, assign layers,
/// materialize layout nodes, straighten x, route joints, assign y.
/// Malformed IR aborts with an error and produces no geometry.
pub fn compute_pass_layout(
    pass: &Pass,
    kind: IrKind,
    theme: &Theme,
    config: &LayoutConfig,
) -> Result<PassLayout, LayoutError> {
    let blocks = pass.blocks(kind);
    let mut g = loops::build_graph(blocks)?;
    measure_blocks(&mut g, blocks, theme, config);
    loops::classify_loops(&mut g)?;
    layering::assign_layers(&mut g);
    nodes::materialize(&mut g);
    straighten::straighten(&mut g, config);
    let track_heights = routing::route_joints(&mut g, config);
    let (layer_ys, layer_heights, width, height) =
        routing::verticalize(&mut g, config, &track_heights);

    Ok(PassLayout {
        blocks: g.blocks,
        loops: g.loops,
        nodes: g.nodes,
        nodes_by_layer: g.layers,
        layer_ys,
        layer_heights,
        track_heights,
        width,
        height,
    })
}

/// Turn each block into its rendered text lines and measure them. The size
/// also reserves room for the block's output ports so arrows never start
/// outside their block.
fn measure_blocks(g: &mut loops::Graph, blocks: &[Block], theme: &Theme, config: &LayoutConfig) {
    for (i, block) in blocks.iter().enumerate() {
        let mut lines = Vec::with_capacity(block.instructions.len() + 1);
        lines.push(format!("Block {}", block.number));
        for instruction in &block.instructions {
            lines.push(format!("{} {}", instruction.id, instruction.opcode));
        }
        let (text_width, text_height) = text_metrics::measure_lines(
            &lines,
            theme.font_size,
            config.line_height,
            &theme.font_family,
        );
        let port_span = if block.successors.len() > 1 {
            2.0 * config.port_start + (block.successors.len() - 1) as f32 * config.port_spacing
        } else {
            0.0
        };
        let width = (text_width + 2.0 * config.block_padding)
            .max(config.min_block_width)
            .max(port_span);
        let height = text_height + 2.0 * config.block_padding;
        g.blocks[i].lines = lines;
        g.blocks[i].size = Vec2::new(width, height);
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use crate::ir::{Block, BlockId};

    /// Shorthand block constructor for layout tests.
    pub(crate) fn block(
        id: u32,
        loop_depth: u32,
        attributes: &[&str],
        preds: &[u32],
        succs: &[u32],
    ) -> Block {
        Block {
            id: BlockId(id),
            number: id,
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
            loop_depth,
            predecessors: preds.iter().map(|&p| BlockId(p)).collect(),
            successors: succs.iter().map(|&s| BlockId(s)).collect(),
            instructions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::BlockList;

    #[test]
    fn empty_pass_produces_empty_geometry() {
        let pass = Pass {
            name: "empty".to_string(),
            mir: BlockList::default(),
            lir: BlockList::default(),
        };
        let layout = compute_pass_layout(
            &pass,
            IrKind::Mir,
            &Theme::light(),
            &LayoutConfig::default(),
        )
        .unwrap();
        assert!(layout.nodes.is_empty());
        assert!(layout.nodes_by_layer.is_empty());
    }

    #[test]
    fn pass_layout_carries_block_text() {
        let pass = Pass {
            name: "p".to_string(),
            mir: BlockList {
                blocks: vec![testutil::block(0, 0, &[], &[], &[])],
            },
            lir: BlockList::default(),
        };
        let layout = compute_pass_layout(
            &pass,
            IrKind::Mir,
            &Theme::light(),
            &LayoutConfig::default(),
        )
        .unwrap();
        assert_eq!(layout.blocks[0].lines[0], "Block 0");
        assert!(layout.blocks[0].size.x >= LayoutConfig::default().min_block_width);
        assert_eq!(layout.nodes_by_layer.len(), 1);
    }
}
