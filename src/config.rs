use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::theme::Theme;

/// Tunables of the layout pipeline. Field defaults are the shipping values;
/// a config file may override any subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Outer margin around the whole graph.
    pub content_padding: f32,
    /// Minimum horizontal gap between same-layer neighbors.
    pub block_gap: f32,
    /// X offset of port 0 from a node's left edge.
    pub port_start: f32,
    /// Stride between consecutive output ports.
    pub port_spacing: f32,
    /// Corner radius of right-angled edge bends.
    pub arrow_radius: f32,
    /// Vertical padding above and below a layer's joint tracks.
    pub track_padding: f32,
    /// Vertical distance between parallel joint tracks.
    pub joint_spacing: f32,
    /// Horizontal distance from a backedge block to its return column.
    pub backedge_arrow_pushout: f32,
    /// Y offset of the loop re-entry arrow below the header's top edge.
    pub header_arrow_pushdown: f32,
    /// Horizontal offset under which an edge counts as nearly straight.
    pub nearly_straight: f32,
    /// Repetitions of the children/loops/dummy-runs straightening stage.
    pub layout_iterations: usize,
    /// Repetitions of the nearly-straight up/down stage.
    pub nearly_straight_iterations: usize,
    /// Inner padding between a block's border and its text.
    pub block_padding: f32,
    /// Lower bound on block width, so empty blocks stay clickable.
    pub min_block_width: f32,
    /// Line height as a multiple of the font size.
    pub line_height: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            content_padding: 20.0,
            block_gap: 44.0,
            port_start: 16.0,
            port_spacing: 60.0,
            arrow_radius: 12.0,
            track_padding: 36.0,
            joint_spacing: 16.0,
            backedge_arrow_pushout: 32.0,
            header_arrow_pushdown: 16.0,
            nearly_straight: 30.0,
            layout_iterations: 2,
            nearly_straight_iterations: 4,
            block_padding: 10.0,
            min_block_width: 80.0,
            line_height: 1.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: Theme::light(),
            layout: LayoutConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: Config = serde_json::from_str(&content)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipping_values() {
        let config = LayoutConfig::default();
        assert_eq!(config.block_gap, 44.0);
        assert_eq!(config.port_spacing, 60.0);
        assert_eq!(config.layout_iterations, 2);
    }

    #[test]
    fn partial_config_overrides() {
        let config: Config =
            serde_json::from_str(r#"{"layout": {"block_gap": 60.0}}"#).unwrap();
        assert_eq!(config.layout.block_gap, 60.0);
        assert_eq!(config.layout.port_start, 16.0);
    }

    #[test]
    fn partial_theme_merges_onto_defaults() {
        let config: Config =
            serde_json::from_str(r##"{"theme": {"background": "#000000"}}"##).unwrap();
        assert_eq!(config.theme.background, "#000000");
        assert_eq!(config.theme.block_fill, Theme::light().block_fill);
    }
}
