use crate::cnc::CncJob;
use crate::error::{CamError, Diagnostic, Result};
use crate::excellon::ExcellonDocument;
use crate::geometry::{GeometryModel, MirrorAxis, SolidGeometry};
use crate::gerber::GerberDocument;
use crate::units::Units;
use geo::{Coord, Rect};
use std::fs;
use std::path::Path;

/// Operations every loaded or derived object supports.
pub trait CamObject {
    fn units(&self) -> Units;

    /// Cached geometry, recomputed after any transform.
    fn create_geometry(&mut self) -> &SolidGeometry;

    /// Rescale to `target` and return the factor used.
    fn convert_units(&mut self, target: Units) -> f64;

    fn bounds(&self) -> Option<Rect<f64>>;

    fn scale(&mut self, factor: f64);

    fn offset(&mut self, dx: f64, dy: f64);

    fn mirror(&mut self, axis: MirrorAxis, about: Coord<f64>);

    fn diagnostics(&self) -> &[Diagnostic] {
        &[]
    }
}

macro_rules! impl_cam_object {
    ($ty:ty, units: |$s:ident| $units:expr) => {
        impl CamObject for $ty {
            fn units(&self) -> Units {
                let $s = self;
                $units
            }

            fn create_geometry(&mut self) -> &SolidGeometry {
                <$ty>::create_geometry(self)
            }

            fn convert_units(&mut self, target: Units) -> f64 {
                <$ty>::convert_units(self, target)
            }

            fn bounds(&self) -> Option<Rect<f64>> {
                <$ty>::bounds(self)
            }

            fn scale(&mut self, factor: f64) {
                <$ty>::scale(self, factor)
            }

            fn offset(&mut self, dx: f64, dy: f64) {
                <$ty>::offset(self, dx, dy)
            }

            fn mirror(&mut self, axis: MirrorAxis, about: Coord<f64>) {
                <$ty>::mirror(self, axis, about)
            }

            fn diagnostics(&self) -> &[Diagnostic] {
                &self.diagnostics
            }
        }
    };
}

impl_cam_object!(GerberDocument, units: |doc| doc.units);
impl_cam_object!(ExcellonDocument, units: |doc| doc.units);
impl_cam_object!(CncJob, units: |job| job.units());

impl CamObject for GeometryModel {
    fn units(&self) -> Units {
        self.units
    }

    fn create_geometry(&mut self) -> &SolidGeometry {
        &self.solid_geometry
    }

    fn convert_units(&mut self, target: Units) -> f64 {
        GeometryModel::convert_units(self, target)
    }

    fn bounds(&self) -> Option<Rect<f64>> {
        GeometryModel::bounds(self)
    }

    fn scale(&mut self, factor: f64) {
        GeometryModel::scale(self, factor)
    }

    fn offset(&mut self, dx: f64, dy: f64) {
        GeometryModel::offset(self, dx, dy)
    }

    fn mirror(&mut self, axis: MirrorAxis, about: Coord<f64>) {
        GeometryModel::mirror(self, axis, about)
    }
}

/// What a file holds, judged by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Gerber,
    Excellon,
    CncJob,
    Geometry,
}

impl DocumentKind {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let extension = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "gbr" | "gtl" | "gbl" | "gto" | "gts" | "gbs" | "gko" | "gm1" | "art" | "pho" => {
                Some(DocumentKind::Gerber)
            }
            "drl" | "xln" | "txt" | "exc" | "drd" => Some(DocumentKind::Excellon),
            "nc" | "ngc" | "gcode" | "tap" | "cnc" => Some(DocumentKind::CncJob),
            _ => None,
        }
    }
}

/// Every kind of object the engine loads or produces.
#[derive(Debug, Clone)]
pub enum Document {
    Gerber(GerberDocument),
    Excellon(ExcellonDocument),
    CncJob(CncJob),
    Geometry(GeometryModel),
}

impl Document {
    pub fn parse(kind: DocumentKind, text: &str) -> Result<Self> {
        match kind {
            DocumentKind::Gerber => GerberDocument::parse(text).map(Document::Gerber),
            DocumentKind::Excellon => ExcellonDocument::parse(text).map(Document::Excellon),
            DocumentKind::CncJob => CncJob::parse("cncjob", text).map(Document::CncJob),
            DocumentKind::Geometry => Err(CamError::InvalidParameter(
                "geometry objects are derived, not parsed from text".to_string(),
            )),
        }
    }

    /// Read and parse a file, choosing the reader by extension.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let kind = DocumentKind::from_path(path).ok_or_else(|| {
            CamError::InvalidParameter(format!("unrecognised file type: {}", path.display()))
        })?;
        let text = fs::read_to_string(path)?;
        log::debug!("opening {} as {kind:?}", path.display());

        let mut document = Self::parse(kind, &text)?;
        if let (Document::CncJob(job), Some(stem)) = (&mut document, path.file_stem()) {
            job.name = stem.to_string_lossy().into_owned();
        }
        Ok(document)
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            Document::Gerber(_) => DocumentKind::Gerber,
            Document::Excellon(_) => DocumentKind::Excellon,
            Document::CncJob(_) => DocumentKind::CncJob,
            Document::Geometry(_) => DocumentKind::Geometry,
        }
    }

    fn inner(&self) -> &dyn CamObject {
        match self {
            Document::Gerber(doc) => doc,
            Document::Excellon(doc) => doc,
            Document::CncJob(job) => job,
            Document::Geometry(model) => model,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn CamObject {
        match self {
            Document::Gerber(doc) => doc,
            Document::Excellon(doc) => doc,
            Document::CncJob(job) => job,
            Document::Geometry(model) => model,
        }
    }

    /// Snapshot of the geometry as a standalone model.
    pub fn to_model(&mut self, name: impl Into<String>) -> GeometryModel {
        let units = self.units();
        GeometryModel::new(name, units, self.create_geometry().clone())
    }
}

impl CamObject for Document {
    fn units(&self) -> Units {
        self.inner().units()
    }

    fn create_geometry(&mut self) -> &SolidGeometry {
        self.inner_mut().create_geometry()
    }

    fn convert_units(&mut self, target: Units) -> f64 {
        self.inner_mut().convert_units(target)
    }

    fn bounds(&self) -> Option<Rect<f64>> {
        self.inner().bounds()
    }

    fn scale(&mut self, factor: f64) {
        self.inner_mut().scale(factor)
    }

    fn offset(&mut self, dx: f64, dy: f64) {
        self.inner_mut().offset(dx, dy)
    }

    fn mirror(&mut self, axis: MirrorAxis, about: Coord<f64>) {
        self.inner_mut().mirror(axis, about)
    }

    fn diagnostics(&self) -> &[Diagnostic] {
        self.inner().diagnostics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    const GERBER: &str = "%FSLAX23Y23*%\n%MOIN*%\n%ADD10C,0.01*%\nD10*\nX001000Y001000D03*\nM02*\n";

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(DocumentKind::from_path("top.GTL"), Some(DocumentKind::Gerber));
        assert_eq!(DocumentKind::from_path("board.drl"), Some(DocumentKind::Excellon));
        assert_eq!(DocumentKind::from_path("iso.ngc"), Some(DocumentKind::CncJob));
        assert_eq!(DocumentKind::from_path("readme"), None);
        assert_eq!(DocumentKind::from_path("notes.md"), None);
    }

    #[test]
    fn test_dispatch_through_trait() {
        let mut document = Document::parse(DocumentKind::Gerber, GERBER).unwrap();
        assert_eq!(document.kind(), DocumentKind::Gerber);
        assert_eq!(document.units(), Units::Inch);
        assert_eq!(document.create_geometry().polygons.len(), 1);

        let factor = document.convert_units(Units::Millimeter);
        assert_relative_eq!(factor, 25.4);
        let bounds = document.bounds().unwrap();
        assert_relative_eq!(bounds.center().x, 25.4, epsilon = 1e-6);

        let back = document.convert_units(Units::Inch);
        assert_relative_eq!(factor * back, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_geometry_documents_are_not_parsed() {
        assert!(matches!(
            Document::parse(DocumentKind::Geometry, ""),
            Err(CamError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_open_reads_file() {
        let mut file = tempfile::Builder::new().suffix(".gbr").tempfile().unwrap();
        file.write_all(GERBER.as_bytes()).unwrap();

        let mut document = Document::open(file.path()).unwrap();
        let model = document.to_model("copper");
        assert_eq!(model.units, Units::Inch);
        assert!(!model.solid_geometry.is_empty());
    }

    #[test]
    fn test_open_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Document::open(dir.path().join("absent.drl")).unwrap_err();
        assert!(matches!(err, CamError::Io(_)));
    }
}
