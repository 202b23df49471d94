use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use pcbmill::task;
use pcbmill::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pcbmill", about = "Mill PCBs from Gerber and Excellon files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Isolation routing around the copper of a Gerber layer
    Isolate(Common),
    /// Clear all non-copper area of a Gerber layer
    Clear(Common),
    /// Board outline cut with holding gaps
    Cutout(Common),
    /// Drill program from an Excellon file
    Drill {
        #[command(flatten)]
        common: Common,

        /// Only these tool numbers (all tools if omitted)
        #[arg(short, long, value_delimiter = ',')]
        tools: Vec<u32>,

        /// Pause for a tool change between tool groups
        #[arg(long)]
        toolchange: bool,
    },
    /// Print a JSON summary of any supported file
    Inspect(Common),
}

#[derive(Args)]
struct Common {
    /// Input file (.gbr/.gtl/..., .drl/.xln/..., .nc/.ngc/...)
    input: PathBuf,

    /// JSON configuration (defaults if not specified)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct Summary {
    kind: String,
    units: Units,
    bounds: Option<[f64; 4]>,
    polygons: usize,
    lines: usize,
    points: usize,
    diagnostics: Vec<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Isolate(common) => {
            let (config, model) = load_model(&common)?;
            let gcode = run("isolate", move || -> pcbmill::error::Result<GCode> {
                let planner = ToolpathPlanner::new(config.planner);
                let toolpaths = planner.isolation_toolpaths(&model)?;
                CncJobGenerator::new(config.job).generate_from_geometry(&toolpaths.solid_geometry)
            })?;
            write_output(&common, &gcode.text())
        }
        Command::Clear(common) => {
            let (config, model) = load_model(&common)?;
            let gcode = run("clear", move || -> pcbmill::error::Result<GCode> {
                let planner = ToolpathPlanner::new(config.planner);
                let chains = planner.clear_non_copper(&model)?;
                CncJobGenerator::new(config.job).generate_from_chains(&chains)
            })?;
            write_output(&common, &gcode.text())
        }
        Command::Cutout(common) => {
            let (config, model) = load_model(&common)?;
            let gcode = run("cutout", move || -> pcbmill::error::Result<GCode> {
                let planner = ToolpathPlanner::new(config.planner);
                let cutout = planner.board_cutout(&model)?;
                CncJobGenerator::new(config.job).generate_from_geometry(&cutout.solid_geometry)
            })?;
            write_output(&common, &gcode.text())
        }
        Command::Drill {
            common,
            tools,
            toolchange,
        } => {
            let config = load_config(&common)?;
            let Document::Excellon(mut drills) = open(&common.input)? else {
                bail!("{} is not an Excellon file", common.input.display());
            };
            drills.convert_units(config.job.units);
            let selection = if tools.is_empty() {
                ToolSelection::All
            } else {
                ToolSelection::Tools(tools)
            };
            let gcode = run("drill", move || {
                CncJobGenerator::new(config.job).generate_from_excellon_by_tool(
                    &drills,
                    &selection,
                    toolchange,
                )
            })?;
            write_output(&common, &gcode.text())
        }
        Command::Inspect(common) => {
            let mut document = open(&common.input)?;
            let kind = format!("{:?}", document.kind());
            let units = document.units();
            let bounds = document
                .bounds()
                .map(|b| [b.min().x, b.min().y, b.max().x, b.max().y]);
            let geometry = document.create_geometry();
            let (polygons, lines, points) = (
                geometry.polygons.len(),
                geometry.lines.len(),
                geometry.points.len(),
            );
            let summary = Summary {
                kind,
                units,
                bounds,
                polygons,
                lines,
                points,
                diagnostics: document.diagnostics().iter().map(ToString::to_string).collect(),
            };
            let json = serde_json::to_string_pretty(&summary).context("serialize summary")?;
            write_output(&common, &json)
        }
    }
}

/// Run an engine call on a worker thread and wait for it.
fn run<T, F>(name: &str, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> pcbmill::error::Result<T> + Send + 'static,
{
    let pending = task::spawn(name, work).with_context(|| format!("start {name}"))?;
    let value = pending.wait().with_context(|| format!("{name} task"))??;
    Ok(value)
}

fn load_config(common: &Common) -> Result<CamConfig> {
    match &common.config {
        Some(path) => CamConfig::load_from_path(path),
        None => Ok(CamConfig::default()),
    }
}

fn open(path: &Path) -> Result<Document> {
    let owned = path.to_path_buf();
    run("parse", move || Document::open(owned)).with_context(|| format!("load {}", path.display()))
}

/// Gerber layer as a geometry model in the configured units.
fn load_model(common: &Common) -> Result<(CamConfig, GeometryModel)> {
    let config = load_config(common)?;
    let mut document = open(&common.input)?;
    if !matches!(document, Document::Gerber(_)) {
        bail!("{} is not a Gerber file", common.input.display());
    }
    document.convert_units(config.job.units);

    let name = common
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "board".to_string());
    let model = document.to_model(name);
    for diagnostic in document.diagnostics() {
        eprintln!("warning: {diagnostic}");
    }
    Ok((config, model))
}

fn write_output(common: &Common, text: &str) -> Result<()> {
    match &common.output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("write {}", path.display()))?;
            eprintln!("Written to {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}
