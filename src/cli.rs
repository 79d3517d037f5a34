use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use log::warn;
use regex::Regex;

use crate::config::load_config;
use crate::ir::{IonDocument, IonFunction, IrKind, Pass};
use crate::layout::compute_pass_layout;
use crate::layout_dump::write_layout_dump;
use crate::parser::parse_ion;
use crate::render::{render_error_svg, render_svg, write_output_png, write_output_svg};

#[derive(Parser, Debug)]
#[command(name = "ionr", version, about = "Ion compilation graph renderer")]
pub struct Args {
    /// Input Ion JSON file, or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file (svg/png). Defaults to stdout for SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file overriding theme/layout defaults
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Function index to render
    #[arg(short = 'f', long = "function", default_value_t = 0)]
    pub function: usize,

    /// Select the first function whose name matches this regex instead
    #[arg(short = 'F', long = "function-name")]
    pub function_name: Option<String>,

    /// Pass index to render. Defaults to the last pass.
    #[arg(short = 'p', long = "pass")]
    pub pass: Option<usize>,

    /// Which instruction level to lay out
    #[arg(long = "ir", value_enum, default_value = "mir")]
    pub ir: IrArg,

    /// List functions and passes, then exit
    #[arg(long = "list")]
    pub list: bool,

    /// Write the layout geometry as JSON to this path
    #[arg(long = "dump-layout")]
    pub dump_layout: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Svg,
    Png,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum IrArg {
    Mir,
    Lir,
}

impl From<IrArg> for IrKind {
    fn from(arg: IrArg) -> Self {
        match arg {
            IrArg::Mir => IrKind::Mir,
            IrArg::Lir => IrKind::Lir,
        }
    }
}

pub fn run() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    let input = read_input(args.input.as_deref())?;
    let document = parse_ion(&input)?;

    if args.list {
        print_listing(&document);
        return Ok(());
    }

    let function = select_function(&document, &args)?;
    let pass = select_pass(function, args.pass)?;
    let kind = IrKind::from(args.ir);

    let svg = match compute_pass_layout(pass, kind, &config.theme, &config.layout) {
        Ok(layout) => {
            if let Some(path) = &args.dump_layout {
                write_layout_dump(path, &layout)
                    .with_context(|| format!("writing layout dump {}", path.display()))?;
            }
            render_svg(&layout, &config.theme, &config.layout)
        }
        Err(err) => {
            warn!(
                "layout of function {:?}, pass {:?} failed: {err}",
                function.name, pass.name
            );
            render_error_svg(&err.to_string(), &config.theme)
        }
    };

    match args.output_format {
        OutputFormat::Svg => write_output_svg(&svg, args.output.as_deref())?,
        OutputFormat::Png => {
            let output = args
                .output
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("Output path required for png output"))?;
            write_output_png(&svg, output, &config.render, &config.theme)?;
        }
    }

    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path == Path::new("-") {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            return Ok(buf);
        }
        return std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn print_listing(document: &IonDocument) {
    for (i, function) in document.functions.iter().enumerate() {
        println!(
            "[{i}] {} ({} passes)",
            display_name(&function.name),
            function.passes.len()
        );
        for (j, pass) in function.passes.iter().enumerate() {
            println!(
                "    [{j}] {} (mir: {} blocks, lir: {} blocks)",
                pass.name,
                pass.mir.blocks.len(),
                pass.lir.blocks.len()
            );
        }
    }
}

fn display_name(name: &str) -> &str {
    if name.is_empty() { "(anonymous)" } else { name }
}

fn select_function<'a>(document: &'a IonDocument, args: &Args) -> Result<&'a IonFunction> {
    if let Some(pattern) = &args.function_name {
        let re = Regex::new(pattern).with_context(|| format!("invalid regex {pattern:?}"))?;
        return document
            .functions
            .iter()
            .find(|f| re.is_match(&f.name))
            .ok_or_else(|| anyhow::anyhow!("no function matches {pattern:?}"));
    }
    document.functions.get(args.function).ok_or_else(|| {
        anyhow::anyhow!(
            "function index {} out of range ({} functions)",
            args.function,
            document.functions.len()
        )
    })
}

fn select_pass(function: &IonFunction, index: Option<usize>) -> Result<&Pass> {
    if function.passes.is_empty() {
        bail!("function {:?} has no passes", function.name);
    }
    match index {
        Some(i) => function.passes.get(i).ok_or_else(|| {
            anyhow::anyhow!(
                "pass index {i} out of range ({} passes)",
                function.passes.len()
            )
        }),
        None => Ok(function.passes.last().expect("non-empty passes")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::BlockList;

    fn doc() -> IonDocument {
        IonDocument {
            functions: vec![
                IonFunction {
                    name: "outer".to_string(),
                    passes: vec![
                        Pass {
                            name: "BuildSSA".to_string(),
                            mir: BlockList::default(),
                            lir: BlockList::default(),
                        },
                        Pass {
                            name: "GVN".to_string(),
                            mir: BlockList::default(),
                            lir: BlockList::default(),
                        },
                    ],
                },
                IonFunction {
                    name: "inner/helper".to_string(),
                    passes: vec![Pass {
                        name: "BuildSSA".to_string(),
                        mir: BlockList::default(),
                        lir: BlockList::default(),
                    }],
                },
            ],
        }
    }

    fn base_args() -> Args {
        Args::parse_from(["ionr", "-i", "x.json"])
    }

    #[test]
    fn selects_function_by_index() {
        let document = doc();
        let mut args = base_args();
        args.function = 1;
        let f = select_function(&document, &args).unwrap();
        assert_eq!(f.name, "inner/helper");
    }

    #[test]
    fn selects_function_by_regex() {
        let document = doc();
        let mut args = base_args();
        args.function_name = Some("helper".to_string());
        let f = select_function(&document, &args).unwrap();
        assert_eq!(f.name, "inner/helper");
    }

    #[test]
    fn default_pass_is_last() {
        let document = doc();
        let pass = select_pass(&document.functions[0], None).unwrap();
        assert_eq!(pass.name, "GVN");
    }

    #[test]
    fn pass_index_out_of_range_errors() {
        let document = doc();
        assert!(select_pass(&document.functions[0], Some(7)).is_err());
    }
}
