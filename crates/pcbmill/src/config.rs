use crate::planner::CutoutGaps;
use crate::units::Units;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Options for deriving toolpath geometry. Lengths are in the units of the
/// enclosing [`CamConfig`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub isolation_tool_diameter: f64,
    pub isolation_passes: usize,
    /// Fraction of the tool diameter shared by consecutive isolation passes.
    pub isolation_overlap: f64,
    pub non_copper_margin: f64,
    pub non_copper_rounded: bool,
    pub paint_tool_diameter: f64,
    pub paint_overlap: f64,
    /// Distance kept from copper when clearing.
    pub paint_margin: f64,
    pub cutout_tool_diameter: f64,
    pub cutout_margin: f64,
    pub cutout_gap_size: f64,
    pub cutout_gaps: CutoutGaps,
    /// Share of a widened bridge's area allowed outside the clearing boundary
    /// before the connector lifts the tool instead of walking.
    pub boundary_tolerance: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            isolation_tool_diameter: 0.016,
            isolation_passes: 1,
            isolation_overlap: 0.15,
            non_copper_margin: 0.0,
            non_copper_rounded: false,
            paint_tool_diameter: 0.04,
            paint_overlap: 0.15,
            paint_margin: 0.01,
            cutout_tool_diameter: 0.1,
            cutout_margin: 0.1,
            cutout_gap_size: 0.15,
            cutout_gaps: CutoutGaps::Four,
            boundary_tolerance: 1e-6,
        }
    }
}

impl PlannerConfig {
    /// Rescale every length option by `factor`.
    pub fn convert_units(&mut self, factor: f64) {
        self.isolation_tool_diameter *= factor;
        self.non_copper_margin *= factor;
        self.paint_tool_diameter *= factor;
        self.paint_margin *= factor;
        self.cutout_tool_diameter *= factor;
        self.cutout_margin *= factor;
        self.cutout_gap_size *= factor;
    }
}

/// Machine settings for G-code emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub units: Units,
    pub z_cut: f64,
    pub z_move: f64,
    /// Feed in units per minute.
    pub feedrate: f64,
    pub spindle_speed: Option<f64>,
    /// When set, cuts are repeated at increasing depth down to `z_cut`.
    pub depth_per_pass: Option<f64>,
    pub toolchange_z: f64,
    pub dwell_seconds: f64,
    pub coordinate_decimals: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            units: Units::Inch,
            z_cut: -0.002,
            z_move: 0.1,
            feedrate: 3.0,
            spindle_speed: None,
            depth_per_pass: None,
            toolchange_z: 1.0,
            dwell_seconds: 1.0,
            coordinate_decimals: 4,
        }
    }
}

impl JobConfig {
    pub fn convert_units(&mut self, factor: f64) {
        self.z_cut *= factor;
        self.z_move *= factor;
        self.feedrate *= factor;
        self.toolchange_z *= factor;
        if let Some(depth) = self.depth_per_pass.as_mut() {
            *depth *= factor;
        }
    }
}

/// Complete option set handed to every planning and generation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CamConfig {
    pub planner: PlannerConfig,
    pub job: JobConfig,
}

impl CamConfig {
    /// Load a configuration from the provided path. Missing files yield defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::debug!("{} not found, using default configuration", path.display());
            return Ok(Self::default());
        }

        let data = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
        let config: CamConfig = serde_json::from_slice(&data).context("deserialize config")?;
        Ok(config)
    }

    /// Persist the configuration as pretty JSON, ensuring the directory exists.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create config directory {}", parent.display()))?;
        }

        let data = serde_json::to_vec_pretty(self).context("serialize config to JSON bytes")?;
        fs::write(path, data).with_context(|| format!("write config {}", path.display()))
    }

    /// Switch the unit system, rescaling every length; returns the factor.
    pub fn convert_units(&mut self, target: Units) -> f64 {
        let factor = self.job.units.factor_to(target);
        self.planner.convert_units(factor);
        self.job.convert_units(factor);
        self.job.units = target;
        factor
    }
}
