use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;

use crate::layout::{NodeKind, PassLayout};

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub width: f32,
    pub height: f32,
    pub layer_ys: Vec<f32>,
    pub layer_heights: Vec<f32>,
    pub track_heights: Vec<f32>,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: u32,
    pub kind: String,
    pub layer: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub block: Option<u32>,
    pub dst_block: Option<u32>,
    pub flags: String,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub src: u32,
    pub port: usize,
    pub dst: u32,
    pub kind: String,
    pub joint_offset: f32,
}

impl LayoutDump {
    pub fn from_layout(layout: &PassLayout) -> Self {
        let nodes = layout
            .nodes
            .iter()
            .map(|node| NodeDump {
                id: node.id.0,
                kind: match node.kind {
                    NodeKind::Block(_) => "block".to_string(),
                    NodeKind::ForwardDummy { .. } => "forward-dummy".to_string(),
                    NodeKind::BackedgeDummy { .. } => "backedge-dummy".to_string(),
                },
                layer: node.layer,
                x: node.pos.x,
                y: node.pos.y,
                width: node.size.x,
                height: node.size.y,
                block: node.block().map(|b| layout.block(b).id.0),
                dst_block: node.dst_block().map(|b| layout.block(b).id.0),
                flags: format!("{:?}", node.flags),
            })
            .collect();

        let edges = layout
            .edges()
            .map(|edge| EdgeDump {
                src: edge.src.0,
                port: edge.port,
                dst: edge.dst.0,
                kind: format!("{:?}", edge.kind),
                joint_offset: edge.joint_offset,
            })
            .collect();

        LayoutDump {
            width: layout.width,
            height: layout.height,
            layer_ys: layout.layer_ys.clone(),
            layer_heights: layout.layer_heights.clone(),
            track_heights: layout.track_heights.clone(),
            nodes,
            edges,
        }
    }
}

pub fn write_layout_dump(path: &Path, layout: &PassLayout) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_layout(layout);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
