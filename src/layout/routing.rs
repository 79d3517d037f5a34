use crate::config::LayoutConfig;

use super::loops::Graph;
use super::types::{NodeIdx, NodeKind};

#[derive(Debug, Clone, Copy)]
struct Joint {
    src: NodeIdx,
    port: usize,
    dst: NodeIdx,
    x1: f32,
    x2: f32,
}

impl Joint {
    fn lo(&self) -> f32 {
        self.x1.min(self.x2)
    }

    fn hi(&self) -> f32 {
        self.x1.max(self.x2)
    }

    fn overlaps(&self, other: &Joint) -> bool {
        self.lo() <= other.hi() && other.lo() <= self.hi()
    }
}

/// Resolve each layer band's horizontal edge segments into parallel tracks
/// and record the per-port vertical offset. Returns the stacked track
/// height per band, consumed by the verticalizer.
pub(super) fn route_joints(g: &mut Graph, config: &LayoutConfig) -> Vec<f32> {
    let mut track_heights = vec![0.0f32; g.layers.len()];

    for band in 0..g.layers.len() {
        let mut joints: Vec<Joint> = Vec::new();
        collect_band_joints(g, config, band, &mut joints);
        if joints.is_empty() {
            continue;
        }
        joints.sort_by(|a, b| a.x1.partial_cmp(&b.x1).unwrap_or(std::cmp::Ordering::Equal));

        let rightward: Vec<Joint> = joints.iter().copied().filter(|j| j.x2 >= j.x1).collect();
        let leftward: Vec<Joint> = joints.iter().copied().filter(|j| j.x2 < j.x1).collect();
        let right_tracks = assign_tracks(rightward);
        let left_tracks = assign_tracks(leftward);

        let total = right_tracks.len() + left_tracks.len();
        track_heights[band] = (total.saturating_sub(1)) as f32 * config.joint_spacing;

        // Rightward tracks reversed, then leftward, spread symmetrically
        // around the band's midline.
        let ordered: Vec<&Vec<Joint>> = right_tracks
            .iter()
            .rev()
            .chain(left_tracks.iter())
            .collect();
        for (i, track) in ordered.iter().enumerate() {
            let offset = (i as f32 - (total as f32 - 1.0) / 2.0) * config.joint_spacing;
            for joint in track.iter() {
                g.nodes[joint.src.idx()].joint_offsets[joint.port] = offset;
            }
        }
    }

    track_heights
}

/// Joints of the band between `band` and `band + 1`: downward edges out of
/// this layer and upward return-column edges from the next one. Edges whose
/// two ports nearly coincide are drawn as a single curve and get no joint.
fn collect_band_joints(g: &Graph, config: &LayoutConfig, band: usize, out: &mut Vec<Joint>) {
    let consider = |src: NodeIdx, g: &Graph, out: &mut Vec<Joint>| {
        if matches!(g.nodes[src.idx()].kind, NodeKind::Block(b) if g.blocks[b.idx()].is_backedge)
        {
            return;
        }
        for (port, &dst) in g.nodes[src.idx()].dst_nodes.iter().enumerate() {
            if !dst.is_set() {
                continue;
            }
            let src_layer = g.nodes[src.idx()].layer;
            let dst_layer = g.nodes[dst.idx()].layer;
            let crosses_band = src_layer.min(dst_layer) == band && src_layer.abs_diff(dst_layer) == 1;
            // A block handing into its layer's return column also swings
            // through the band below that layer.
            let into_column = src_layer == band
                && dst_layer == band
                && g.nodes[dst.idx()].is_backedge_dummy();
            if !crosses_band && !into_column {
                continue;
            }
            let x1 = g.nodes[src.idx()].pos.x
                + config.port_start
                + port as f32 * config.port_spacing;
            let x2 = g.nodes[dst.idx()].pos.x + config.port_start;
            if (x2 - x1).abs() < 2.0 * config.arrow_radius {
                continue;
            }
            out.push(Joint {
                src,
                port,
                dst,
                x1,
                x2,
            });
        }
    };

    for &n in &g.layers[band] {
        consider(n, g, out);
    }
    if band + 1 < g.layers.len() {
        for &n in &g.layers[band + 1] {
            consider(n, g, out);
        }
    }
}

/// Greedy track assignment. Joints sharing a destination fuse into one
/// track regardless of overlap; otherwise a joint takes the innermost
/// (most recently opened) track it fits into, opening a new one when none
/// fits.
fn assign_tracks(joints: Vec<Joint>) -> Vec<Vec<Joint>> {
    let mut tracks: Vec<Vec<Joint>> = Vec::new();
    'next: for joint in joints {
        for track in tracks.iter_mut() {
            if track.iter().any(|other| other.dst == joint.dst) {
                track.push(joint);
                continue 'next;
            }
        }
        for track in tracks.iter_mut().rev() {
            if !track.iter().any(|other| other.overlaps(&joint)) {
                track.push(joint);
                continue 'next;
            }
        }
        tracks.push(vec![joint]);
    }
    tracks
}

/// Assign layer y-positions top-down: each layer clears the previous
/// layer's tallest node plus the padded track stack of the band between
/// them. Returns per-layer heights and the padded bounding box, and shifts
/// the whole graph by the content padding.
pub(super) fn verticalize(
    g: &mut Graph,
    config: &LayoutConfig,
    track_heights: &[f32],
) -> (Vec<f32>, Vec<f32>, f32, f32) {
    let mut layer_ys = Vec::with_capacity(g.layers.len());
    let mut layer_heights = Vec::with_capacity(g.layers.len());
    let mut y = config.content_padding;
    let mut bottom = config.content_padding;

    for layer in 0..g.layers.len() {
        let mut layer_height = 0.0f32;
        for &n in &g.layers[layer] {
            layer_height = layer_height.max(g.nodes[n.idx()].size.y);
        }
        for &n in &g.layers[layer] {
            g.nodes[n.idx()].pos.y = y;
        }
        layer_ys.push(y);
        layer_heights.push(layer_height);
        bottom = y + layer_height;
        y = bottom + config.track_padding + track_heights[layer] + config.track_padding;
    }

    // A loop bottoming out on the last layer still swings its latch edge
    // through the band below it.
    if let Some(&last) = track_heights.last() {
        if last > 0.0 {
            bottom += 2.0 * config.track_padding + last;
        }
    }

    let mut max_extent = 0.0f32;
    for node in &mut g.nodes {
        node.pos.x += config.content_padding;
        let extent = if node.is_dummy() {
            // A dummy's drawn line runs through its port.
            node.pos.x + config.port_start
        } else {
            node.right()
        };
        max_extent = max_extent.max(extent);
    }

    let width = max_extent + config.content_padding;
    let height = bottom + config.content_padding;
    (layer_ys, layer_heights, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joint(x1: f32, x2: f32, src: u32, dst: u32) -> Joint {
        Joint {
            src: NodeIdx(src),
            port: 0,
            dst: NodeIdx(dst),
            x1,
            x2,
        }
    }

    #[test]
    fn overlapping_joints_take_separate_tracks() {
        let tracks = assign_tracks(vec![joint(0.0, 100.0, 0, 1), joint(50.0, 150.0, 2, 3)]);
        assert_eq!(tracks.len(), 2);
    }

    #[test]
    fn disjoint_joints_share_a_track() {
        let tracks = assign_tracks(vec![joint(0.0, 40.0, 0, 1), joint(100.0, 160.0, 2, 3)]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].len(), 2);
    }

    #[test]
    fn shared_destination_fuses() {
        let tracks = assign_tracks(vec![joint(0.0, 100.0, 0, 9), joint(50.0, 100.0, 1, 9)]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].len(), 2);
    }

    #[test]
    fn closed_interval_touching_counts_as_overlap() {
        let tracks = assign_tracks(vec![joint(0.0, 100.0, 0, 1), joint(100.0, 200.0, 2, 3)]);
        assert_eq!(tracks.len(), 2);
    }
}
