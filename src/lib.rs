pub mod cli;
pub mod config;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod parser;
pub mod render;
pub mod text_metrics;
pub mod theme;

pub use cli::run;
pub use config::{Config, LayoutConfig, load_config};
pub use ir::{IonDocument, IrKind};
pub use layout::{LayoutError, PassLayout, compute_pass_layout};
pub use parser::parse_ion;
pub use render::{render_error_svg, render_svg};
pub use theme::Theme;
