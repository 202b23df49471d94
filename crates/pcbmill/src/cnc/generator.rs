use super::{CncJob, GCode};
use crate::config::JobConfig;
use crate::connect::ToolpathChain;
use crate::error::{CamError, Result};
use crate::excellon::ExcellonDocument;
use crate::geometry::SolidGeometry;
use geo::Coord;
use std::collections::BTreeMap;

/// Which drill tools to emit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ToolSelection {
    #[default]
    All,
    Tools(Vec<u32>),
}

/// Turns geometry and drill lists into G-code for one machine setup.
pub struct CncJobGenerator {
    pub config: JobConfig,
}

impl CncJobGenerator {
    pub fn new(config: JobConfig) -> Self {
        Self { config }
    }

    /// Cut every polygon ring, line and point of `geometry`.
    ///
    /// Polygon rings are traversed through their distinct vertices; line
    /// members are followed exactly as stored.
    pub fn generate_from_geometry(&self, geometry: &SolidGeometry) -> Result<GCode> {
        self.validate()?;
        if geometry.is_empty() {
            return Err(CamError::EmptyGeometry("G-code generation"));
        }

        let mut gcode = self.preamble();
        for polygon in &geometry.polygons {
            self.cut(&mut gcode, distinct_vertices(&polygon.exterior().0));
            for interior in polygon.interiors() {
                self.cut(&mut gcode, distinct_vertices(&interior.0));
            }
        }
        for line in &geometry.lines {
            self.cut(&mut gcode, &line.0);
        }
        for point in &geometry.points {
            self.drill(&mut gcode, point.0);
        }
        self.postamble(&mut gcode);

        log::info!("generated {} G-code lines", gcode.lines.len());
        Ok(gcode)
    }

    /// Cut each connected chain with a single plunge.
    pub fn generate_from_chains(&self, chains: &[ToolpathChain]) -> Result<GCode> {
        self.validate()?;
        if chains.is_empty() {
            return Err(CamError::EmptyGeometry("G-code generation"));
        }

        let mut gcode = self.preamble();
        for chain in chains {
            self.cut(&mut gcode, &chain.coords);
        }
        self.postamble(&mut gcode);

        log::info!(
            "generated {} G-code lines for {} chains",
            gcode.lines.len(),
            chains.len()
        );
        Ok(gcode)
    }

    /// Drill the selected tools' hits grouped by tool, optionally stopping for a
    /// tool change between groups.
    pub fn generate_from_excellon_by_tool(
        &self,
        document: &ExcellonDocument,
        selection: &ToolSelection,
        toolchange: bool,
    ) -> Result<GCode> {
        self.validate()?;

        let tools: Vec<u32> = match selection {
            ToolSelection::All => document.tools.keys().copied().collect(),
            ToolSelection::Tools(ids) => {
                if let Some(missing) = ids.iter().find(|id| !document.tools.contains_key(id)) {
                    return Err(CamError::UnknownTool(*missing));
                }
                ids.clone()
            }
        };

        let mut groups: BTreeMap<u32, Vec<Coord<f64>>> = BTreeMap::new();
        for tool in &tools {
            let hits: Vec<Coord<f64>> = document.hits_for_tool(*tool).map(|h| h.point).collect();
            if !hits.is_empty() {
                groups.insert(*tool, hits);
            }
        }
        if groups.is_empty() {
            return Err(CamError::EmptyGeometry("drill job"));
        }

        let mut gcode = self.preamble();
        for (index, (tool, hits)) in groups.iter().enumerate() {
            let diameter = document.tools.get(tool).map_or(0.0, |t| t.diameter);
            if toolchange && index > 0 {
                self.toolchange(&mut gcode, *tool, diameter);
            } else {
                gcode.push(format!("(T{tool} dia={})", self.fmt(diameter)));
            }
            for hit in hits {
                self.drill(&mut gcode, *hit);
            }
        }
        self.postamble(&mut gcode);

        log::info!(
            "drill job: {} tools, {} G-code lines",
            groups.len(),
            gcode.lines.len()
        );
        Ok(gcode)
    }

    /// Wrap emitted code into a job object.
    pub fn job(&self, name: impl Into<String>, gcode: GCode) -> Result<CncJob> {
        CncJob::from_gcode(name, self.config.clone(), gcode)
    }

    /// Unit code, absolute positioning, feed mode and value, initial retract,
    /// spindle on, dwell.
    pub fn preamble(&self) -> GCode {
        let c = &self.config;
        let mut gcode = GCode::default();
        gcode.push(c.units.gcode());
        gcode.push("G90");
        gcode.push("G94");
        gcode.push(format!("F{}", self.fmt(c.feedrate)));
        gcode.push(format!("G00 Z{}", self.fmt(c.z_move)));
        gcode.push(self.spindle_on());
        gcode.push(format!("G04 P{}", c.dwell_seconds));
        gcode
    }

    /// Retract, return to origin, spindle off.
    pub fn postamble(&self, gcode: &mut GCode) {
        gcode.push(format!("G00 Z{}", self.fmt(self.config.z_move)));
        gcode.push(format!("G00 X{} Y{}", self.fmt(0.0), self.fmt(0.0)));
        gcode.push("M05");
    }

    /// Cutting depths, shallowest first, ending at `z_cut`.
    pub fn depths(&self) -> Vec<f64> {
        let z_cut = self.config.z_cut;
        match self.config.depth_per_pass {
            Some(step) if step > 0.0 && z_cut < 0.0 => {
                let passes = (-z_cut / step - 1e-9).ceil().max(1.0) as usize;
                (1..=passes)
                    .map(|pass| (-(pass as f64) * step).max(z_cut))
                    .collect()
            }
            _ => vec![z_cut],
        }
    }

    fn validate(&self) -> Result<()> {
        let c = &self.config;
        if c.feedrate <= 0.0 {
            return Err(CamError::InvalidParameter(format!(
                "feedrate must be positive, got {}",
                c.feedrate
            )));
        }
        if c.z_move <= c.z_cut {
            return Err(CamError::InvalidParameter(format!(
                "travel height {} must be above cut depth {}",
                c.z_move, c.z_cut
            )));
        }
        Ok(())
    }

    /// rapid-to-start, plunge, feed through `coords`, retract; once per depth.
    fn cut(&self, gcode: &mut GCode, coords: &[Coord<f64>]) {
        let Some((start, rest)) = coords.split_first() else {
            return;
        };
        for depth in self.depths() {
            gcode.push(format!("G00 X{} Y{}", self.fmt(start.x), self.fmt(start.y)));
            gcode.push(format!("G01 Z{}", self.fmt(depth)));
            for c in rest {
                gcode.push(format!("G01 X{} Y{}", self.fmt(c.x), self.fmt(c.y)));
            }
            gcode.push(format!("G00 Z{}", self.fmt(self.config.z_move)));
        }
    }

    fn drill(&self, gcode: &mut GCode, at: Coord<f64>) {
        gcode.push(format!("G00 X{} Y{}", self.fmt(at.x), self.fmt(at.y)));
        gcode.push(format!("G01 Z{}", self.fmt(self.config.z_cut)));
        gcode.push(format!("G00 Z{}", self.fmt(self.config.z_move)));
    }

    fn toolchange(&self, gcode: &mut GCode, tool: u32, diameter: f64) {
        gcode.push(format!("G00 Z{}", self.fmt(self.config.toolchange_z)));
        gcode.push(format!("T{tool}"));
        gcode.push("M05");
        gcode.push("M06");
        gcode.push(format!("(MSG, Change to tool dia={})", self.fmt(diameter)));
        gcode.push("M00");
        gcode.push(format!("G00 Z{}", self.fmt(self.config.z_move)));
        gcode.push(self.spindle_on());
    }

    fn spindle_on(&self) -> String {
        match self.config.spindle_speed {
            Some(speed) => format!("M03 S{speed}"),
            None => "M03".to_string(),
        }
    }

    fn fmt(&self, value: f64) -> String {
        let value = if value == 0.0 { 0.0 } else { value };
        format!("{value:.prec$}", prec = self.config.coordinate_decimals)
    }
}

/// Ring vertices without the closing repeat of the first one.
fn distinct_vertices(ring: &[Coord<f64>]) -> &[Coord<f64>] {
    match ring {
        [first, .., last] if first == last => &ring[..ring.len() - 1],
        _ => ring,
    }
}
