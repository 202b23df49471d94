//! Manufacturing geometry derived from a board's copper.

use crate::config::PlannerConfig;
use crate::connect::{self, ToolpathChain};
use crate::error::{CamError, Result};
use crate::geometry::{shapes, GeometryModel, SolidGeometry};
use crate::pocket;
use geo::{BooleanOps, Buffer, Coord, LineString, MultiPolygon, Rect};
use serde::{Deserialize, Serialize};

/// Where the cutout leaves bridges holding the board to its stock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CutoutGaps {
    /// One gap in the middle of the top and of the bottom side.
    TopBottom,
    /// One gap in the middle of the left and of the right side.
    LeftRight,
    /// One gap in the middle of every side.
    #[default]
    Four,
}

pub struct ToolpathPlanner {
    pub config: PlannerConfig,
}

impl ToolpathPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Centre-line offset of isolation pass `pass` (0-based).
    pub fn isolation_offset(pass: usize, tool_diameter: f64, overlap: f64) -> f64 {
        let i = pass as f64;
        (2.0 * i + 1.0) / 2.0 * tool_diameter - i * overlap * tool_diameter
    }

    /// One buffered outline per configured isolation pass, innermost first.
    pub fn isolation_passes(&self, model: &GeometryModel) -> Result<Vec<MultiPolygon<f64>>> {
        let PlannerConfig {
            isolation_tool_diameter: diameter,
            isolation_passes: passes,
            isolation_overlap: overlap,
            ..
        } = self.config;
        if diameter <= 0.0 {
            return Err(CamError::InvalidParameter(format!(
                "isolation tool diameter must be positive, got {diameter}"
            )));
        }
        if !(0.0..1.0).contains(&overlap) {
            return Err(CamError::InvalidParameter(format!(
                "isolation overlap must be in [0, 1), got {overlap}"
            )));
        }
        if model.solid_geometry.is_empty() {
            return Err(CamError::EmptyGeometry("isolation"));
        }

        Ok((0..passes.max(1))
            .map(|pass| {
                let offset = Self::isolation_offset(pass, diameter, overlap);
                log::debug!("isolation pass {pass}: offset {offset:.6}");
                model.isolation_geometry(offset)
            })
            .collect())
    }

    /// Isolation cut lines of every pass as a line geometry.
    pub fn isolation_toolpaths(&self, model: &GeometryModel) -> Result<GeometryModel> {
        let passes = self.isolation_passes(model)?;
        let mut lines = Vec::new();
        for pass in passes {
            lines.extend(SolidGeometry::from_polygons(pass).rings());
        }
        log::info!("isolation: {} rings", lines.len());
        Ok(GeometryModel::new(
            format!("{}_iso", model.name),
            model.units,
            SolidGeometry::from_lines(lines),
        ))
    }

    /// Bounding envelope grown by `margin`; corners rounded on request.
    pub fn bounding_box(
        &self,
        model: &GeometryModel,
        margin: f64,
        rounded: bool,
    ) -> Result<MultiPolygon<f64>> {
        let bounds = model
            .bounds()
            .ok_or(CamError::EmptyGeometry("bounding box"))?;
        Ok(if rounded && margin > 0.0 {
            bounds.to_polygon().buffer(margin)
        } else {
            MultiPolygon(vec![shapes::expand_rect(bounds, margin).to_polygon()])
        })
    }

    /// Everything inside the grown envelope that is not copper.
    pub fn non_copper(
        &self,
        model: &GeometryModel,
        margin: f64,
        rounded: bool,
    ) -> Result<MultiPolygon<f64>> {
        let envelope = self.bounding_box(model, margin, rounded)?;
        Ok(envelope.difference(&model.solid_geometry.union()))
    }

    /// Concentric clearing rings inside `boundary`, outermost first.
    pub fn paint_area(
        &self,
        boundary: &MultiPolygon<f64>,
        tool_diameter: f64,
        overlap: f64,
    ) -> Result<Vec<LineString<f64>>> {
        pocket::paint_area(boundary, tool_diameter, overlap)
    }

    /// Cut lines around the bounds grown by `margin`, leaving `gap_size`-wide
    /// bridges centred on the middle of the chosen sides.
    pub fn cutout(
        &self,
        model: &GeometryModel,
        margin: f64,
        gap_size: f64,
        gaps: CutoutGaps,
    ) -> Result<GeometryModel> {
        let bounds = model.bounds().ok_or(CamError::EmptyGeometry("cutout"))?;
        let lines = cutout_lines(shapes::expand_rect(bounds, margin), gap_size, gaps)?;
        Ok(GeometryModel::new(
            format!("{}_cutout", model.name),
            model.units,
            SolidGeometry::from_lines(lines),
        ))
    }

    /// Board cutout with the configured tool: the tool centre runs a radius
    /// outside the margin and gaps widen by a diameter so the bridges keep
    /// their nominal size.
    pub fn board_cutout(&self, model: &GeometryModel) -> Result<GeometryModel> {
        let diameter = self.config.cutout_tool_diameter;
        self.cutout(
            model,
            self.config.cutout_margin + diameter / 2.0,
            self.config.cutout_gap_size + diameter,
            self.config.cutout_gaps,
        )
    }

    /// Clear all non-copper area: pocket the envelope minus copper (kept
    /// `paint_margin` away from it) and join the rings by in-material moves.
    pub fn clear_non_copper(&self, model: &GeometryModel) -> Result<Vec<ToolpathChain>> {
        let config = &self.config;
        let copper = model.solid_geometry.union();
        let keep_out = if config.paint_margin > 0.0 {
            copper.buffer(config.paint_margin)
        } else {
            copper
        };
        let envelope =
            self.bounding_box(model, config.non_copper_margin, config.non_copper_rounded)?;
        let area = envelope.difference(&keep_out);

        let rings = self.paint_area(&area, config.paint_tool_diameter, config.paint_overlap)?;
        let chains = ToolpathChain::from_lines(&rings);
        Ok(connect::paint_connect(
            chains,
            &area,
            config.paint_tool_diameter,
            config.boundary_tolerance,
        ))
    }
}

/// Perimeter of `rect` split into 2 or 4 polylines around the gaps.
pub fn cutout_lines(rect: Rect<f64>, gap_size: f64, gaps: CutoutGaps) -> Result<Vec<LineString<f64>>> {
    let (min, max) = (rect.min(), rect.max());
    let shortest = match gaps {
        CutoutGaps::TopBottom => rect.width(),
        CutoutGaps::LeftRight => rect.height(),
        CutoutGaps::Four => rect.width().min(rect.height()),
    };
    if gap_size < 0.0 || gap_size >= shortest {
        return Err(CamError::InvalidParameter(format!(
            "gap size {gap_size} does not fit a side of length {shortest}"
        )));
    }

    let g = gap_size / 2.0;
    let mx = (min.x + max.x) / 2.0;
    let my = (min.y + max.y) / 2.0;
    let c = |x: f64, y: f64| Coord { x, y };

    let paths = match gaps {
        CutoutGaps::TopBottom => vec![
            vec![c(mx - g, max.y), c(min.x, max.y), c(min.x, min.y), c(mx - g, min.y)],
            vec![c(mx + g, min.y), c(max.x, min.y), c(max.x, max.y), c(mx + g, max.y)],
        ],
        CutoutGaps::LeftRight => vec![
            vec![c(min.x, my - g), c(min.x, min.y), c(max.x, min.y), c(max.x, my - g)],
            vec![c(max.x, my + g), c(max.x, max.y), c(min.x, max.y), c(min.x, my + g)],
        ],
        CutoutGaps::Four => vec![
            vec![c(min.x, my - g), c(min.x, min.y), c(mx - g, min.y)],
            vec![c(mx + g, min.y), c(max.x, min.y), c(max.x, my - g)],
            vec![c(max.x, my + g), c(max.x, max.y), c(mx + g, max.y)],
            vec![c(mx - g, max.y), c(min.x, max.y), c(min.x, my + g)],
        ],
    };
    Ok(paths.into_iter().map(LineString::from).collect())
}
