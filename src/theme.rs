use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub background: String,
    pub block_fill: String,
    pub block_border: String,
    pub block_text_color: String,
    pub block_header_color: String,
    pub loop_header_fill: String,
    pub backedge_block_fill: String,
    pub edge_color: String,
    pub backedge_color: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self::light()
    }
}

impl Theme {
    pub fn light() -> Self {
        Self {
            font_family: "ui-monospace, SFMono-Regular, Menlo, Consolas, monospace".to_string(),
            font_size: 12.0,
            background: "#FFFFFF".to_string(),
            block_fill: "#F8FAFF".to_string(),
            block_border: "#C7D2E5".to_string(),
            block_text_color: "#1C2430".to_string(),
            block_header_color: "#3A4A63".to_string(),
            loop_header_fill: "#EAF2E6".to_string(),
            backedge_block_fill: "#EEF0F4".to_string(),
            edge_color: "#7A8AA6".to_string(),
            backedge_color: "#B0784A".to_string(),
        }
    }

    pub fn dark() -> Self {
        Self {
            font_family: "ui-monospace, SFMono-Regular, Menlo, Consolas, monospace".to_string(),
            font_size: 12.0,
            background: "#14181F".to_string(),
            block_fill: "#1D232E".to_string(),
            block_border: "#3A4556".to_string(),
            block_text_color: "#D6DEE9".to_string(),
            block_header_color: "#9FB2CC".to_string(),
            loop_header_fill: "#1F2B22".to_string(),
            backedge_block_fill: "#232733".to_string(),
            edge_color: "#8394AD".to_string(),
            backedge_color: "#C98F5E".to_string(),
        }
    }
}
