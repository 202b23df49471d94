//! Gerber/Excellon to CNC toolpath engine.
//!
//! Board files are parsed into documents, documents yield [`SolidGeometry`],
//! the [`ToolpathPlanner`] derives isolation, clearing and cutout paths from
//! it, and [`CncJobGenerator`] turns those paths into G-code.

pub mod cnc;
pub mod config;
pub mod connect;
pub mod document;
pub mod error;
pub mod excellon;
pub mod geometry;
pub mod gerber;
pub mod number_format;
pub mod planner;
pub mod pocket;
pub mod task;
pub mod units;

pub use cnc::*;
pub use config::{CamConfig, JobConfig, PlannerConfig};
pub use connect::{bridge_within, chains_to_lines, paint_connect, path_connect, ToolpathChain};
pub use document::{CamObject, Document, DocumentKind};
pub use error::{CamError, Diagnostic};
pub use excellon::{DrillHit, ExcellonDocument, Tool};
pub use geometry::*;
pub use gerber::aperture::{Aperture, ApertureShape};
pub use gerber::{Flash, GerberDocument, PathSegment, Region};
pub use number_format::{NumberFormat, ZeroSuppression};
pub use planner::{cutout_lines, CutoutGaps, ToolpathPlanner};
pub use pocket::paint_area;
pub use units::Units;
