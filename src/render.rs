use std::path::Path;

use anyhow::Result;
use log::warn;

use crate::config::{LayoutConfig, RenderConfig};
use crate::layout::{EdgeKind, EdgeRef, NodeIdx, PassLayout};
use crate::theme::Theme;

pub fn render_svg(layout: &PassLayout, theme: &Theme, config: &LayoutConfig) -> String {
    let width = layout.width.max(2.0 * config.content_padding);
    let height = layout.height.max(2.0 * config.content_padding);
    let mut svg = String::new();

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    ));

    svg.push_str("<defs>");
    svg.push_str(&format!(
        "<marker id=\"arrow\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"6\" markerHeight=\"6\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{}\"/></marker>",
        theme.edge_color
    ));
    svg.push_str(&format!(
        "<marker id=\"arrow-backedge\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"6\" markerHeight=\"6\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{}\"/></marker>",
        theme.backedge_color
    ));
    svg.push_str("</defs>");

    for edge in layout.edges() {
        svg.push_str(&edge_svg(layout, &edge, theme, config));
    }

    for node in &layout.nodes {
        let Some(b) = node.block() else {
            continue;
        };
        let block = layout.block(b);
        let fill = if block.is_loop_header {
            &theme.loop_header_fill
        } else if block.is_backedge {
            &theme.backedge_block_fill
        } else {
            &theme.block_fill
        };
        svg.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"6\" ry=\"6\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1.4\"/>",
            node.pos.x, node.pos.y, node.size.x, node.size.y, fill, theme.block_border
        ));
        svg.push_str(&block_text_svg(layout, node.id, theme, config));
    }

    svg.push_str("</svg>");
    svg
}

/// Placeholder image shown when the layout engine rejects a pass.
pub fn render_error_svg(message: &str, theme: &Theme) -> String {
    let mut svg = String::new();
    svg.push_str(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"480\" height=\"120\" viewBox=\"0 0 480 120\">",
    );
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    ));
    svg.push_str(&format!(
        "<rect x=\"8\" y=\"8\" width=\"464\" height=\"104\" rx=\"6\" fill=\"{}\" stroke=\"{}\"/>",
        theme.backedge_block_fill, theme.block_border
    ));
    svg.push_str(&format!(
        "<text x=\"24\" y=\"48\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">Layout failed</text>",
        theme.font_family, theme.font_size, theme.block_header_color
    ));
    svg.push_str(&format!(
        "<text x=\"24\" y=\"76\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
        theme.font_family,
        theme.font_size,
        theme.block_text_color,
        escape_xml(message)
    ));
    svg.push_str("</svg>");
    svg
}

fn block_text_svg(layout: &PassLayout, node: NodeIdx, theme: &Theme, config: &LayoutConfig) -> String {
    let n = layout.node(node);
    let block = layout.block(n.block().expect("text only on block nodes"));
    let x = n.pos.x + config.block_padding;
    let line_height = theme.font_size * config.line_height;
    let mut text = String::new();
    for (i, line) in block.lines.iter().enumerate() {
        let y = n.pos.y + config.block_padding + (i as f32 + 0.8) * line_height;
        let fill = if i == 0 {
            &theme.block_header_color
        } else {
            &theme.block_text_color
        };
        text.push_str(&format!(
            "<text x=\"{x:.2}\" y=\"{y:.2}\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
            theme.font_family,
            theme.font_size,
            fill,
            escape_xml(line)
        ));
    }
    text
}

/// Midline of the routing band below `layer`.
fn band_center(layout: &PassLayout, config: &LayoutConfig, layer: usize) -> f32 {
    let top = layout.layer_ys[layer] + layout.layer_heights[layer];
    let bottom = if layer + 1 < layout.layer_ys.len() {
        layout.layer_ys[layer + 1]
    } else {
        top + 2.0 * config.track_padding
    };
    (top + bottom) / 2.0
}

fn edge_svg(layout: &PassLayout, edge: &EdgeRef, theme: &Theme, config: &LayoutConfig) -> String {
    let src = layout.node(edge.src);
    let dst = layout.node(edge.dst);
    let r = config.arrow_radius;

    let x1 = src.pos.x + config.port_start + edge.port as f32 * config.port_spacing;
    let x2 = dst.pos.x + config.port_start;

    let (d, color, arrow) = match edge.kind {
        EdgeKind::ForwardDownward => {
            let y1 = src.pos.y + src.size.y;
            let y2 = dst.pos.y;
            let d = if (x2 - x1).abs() < 2.0 * r {
                bezier_path(x1, y1, x2, y2)
            } else {
                let joint_y = band_center(layout, config, src.layer) + edge.joint_offset;
                if y1 + r > joint_y {
                    debug_assert!(false, "joint above source port");
                    warn!("joint track overlaps its source layer; drawing anyway");
                }
                step_down_path(x1, y1, x2, y2, joint_y, r)
            };
            (d, &theme.edge_color, dst.block().is_some())
        }
        EdgeKind::ForwardUpwardBetweenDummies => {
            let y1 = src.pos.y;
            let y2 = dst.pos.y;
            let d = if (x2 - x1).abs() < f32::EPSILON {
                format!("M {x1:.2} {y1:.2} L {x2:.2} {y2:.2}")
            } else {
                bezier_path(x1, y1, x2, y2)
            };
            (d, &theme.backedge_color, false)
        }
        EdgeKind::ToBackedgeDummy => {
            let y1 = src.pos.y + src.size.y;
            let joint_y = band_center(layout, config, src.layer) + edge.joint_offset;
            let d = step_down_up_path(x1, y1, x2, dst.pos.y, joint_y, r);
            (d, &theme.backedge_color, false)
        }
        EdgeKind::ToBackedgeFinal => {
            // The column drops alongside the backedge block and enters its
            // right edge.
            let y1 = src.pos.y;
            let entry_y = dst.pos.y + config.header_arrow_pushdown;
            let d = format!(
                "M {x1:.2} {y1:.2} V {:.2} Q {x1:.2} {entry_y:.2} {:.2} {entry_y:.2} H {:.2}",
                entry_y - r,
                x1 - r,
                dst.right()
            );
            (d, &theme.backedge_color, true)
        }
        EdgeKind::LoopHeaderReturn => {
            // Sideways from the backedge block into the header's right edge.
            let entry_y = dst.pos.y + config.header_arrow_pushdown;
            let d = format!(
                "M {:.2} {entry_y:.2} H {:.2}",
                src.pos.x,
                dst.right()
            );
            (d, &theme.backedge_color, true)
        }
    };

    let marker = if arrow {
        if edge.kind == EdgeKind::ForwardDownward {
            " marker-end=\"url(#arrow)\""
        } else {
            " marker-end=\"url(#arrow-backedge)\""
        }
    } else {
        ""
    };
    format!(
        "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.4\"{}/>",
        d, color, marker
    )
}

/// Two-bend right-angled path: down from the source port, along the joint,
/// down into the destination port.
fn step_down_path(x1: f32, y1: f32, x2: f32, y2: f32, joint_y: f32, r: f32) -> String {
    let sign = if x2 > x1 { 1.0 } else { -1.0 };
    format!(
        "M {x1:.2} {y1:.2} V {:.2} Q {x1:.2} {joint_y:.2} {:.2} {joint_y:.2} H {:.2} Q {x2:.2} {joint_y:.2} {x2:.2} {:.2} V {y2:.2}",
        joint_y - r,
        x1 + sign * r,
        x2 - sign * r,
        joint_y + r
    )
}

/// Down from the source port, along the joint, then up into the return
/// column on the same layer.
fn step_down_up_path(x1: f32, y1: f32, x2: f32, y2: f32, joint_y: f32, r: f32) -> String {
    let sign = if x2 > x1 { 1.0 } else { -1.0 };
    format!(
        "M {x1:.2} {y1:.2} V {:.2} Q {x1:.2} {joint_y:.2} {:.2} {joint_y:.2} H {:.2} Q {x2:.2} {joint_y:.2} {x2:.2} {:.2} V {y2:.2}",
        joint_y - r,
        x1 + sign * r,
        x2 - sign * r,
        joint_y - r
    )
}

/// Fallback when the two ports are too close for right-angled bends.
fn bezier_path(x1: f32, y1: f32, x2: f32, y2: f32) -> String {
    let mid = (y1 + y2) / 2.0;
    format!("M {x1:.2} {y1:.2} C {x1:.2} {mid:.2} {x2:.2} {mid:.2} {x2:.2} {y2:.2}")
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

pub fn write_output_png(
    svg: &str,
    output: &Path,
    render_cfg: &RenderConfig,
    theme: &Theme,
) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = primary_font(&theme.font_family);
    opt.default_size = usvg::Size::from_wh(render_cfg.width, render_cfg.height)
        .unwrap_or(usvg::Size::from_wh(800.0, 600.0).unwrap());
    opt.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn primary_font(fonts: &str) -> String {
    fonts
        .split(',')
        .map(|s| s.trim().trim_matches('"'))
        .find(|s| !s.is_empty())
        .unwrap_or("monospace")
        .to_string()
}
