//! Canvas-to-document mapping and problem region lookup
//!
//! Worksheets are annotated with vertical bands per page, one per problem or
//! sub-part. A pause on the canvas is mapped into document space and matched
//! to the band it falls in, or the nearest one when it lands in a gap.

use serde::{Deserialize, Serialize};

/// One authored problem band on a page, in document coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemRegion {
    pub page: usize,
    pub y_start: f64,
    pub y_end: f64,
    /// Sub-part label such as "a" or "ii"; empty for the question stem
    #[serde(default)]
    pub label: String,
}

impl ProblemRegion {
    fn contains(&self, y: f64) -> bool {
        self.y_start <= y && y < self.y_end
    }

    /// Distance from `y` to the closer edge of the band
    fn edge_distance(&self, y: f64) -> f64 {
        (y - self.y_start).abs().min((y - self.y_end).abs())
    }
}

/// All authored regions of a document, in authoring order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProblemRegionData(pub Vec<ProblemRegion>);

impl ProblemRegionData {
    pub fn new(regions: Vec<ProblemRegion>) -> Self {
        Self(regions)
    }

    pub fn regions(&self) -> &[ProblemRegion] {
        &self.0
    }

    pub fn on_page(&self, page: usize) -> impl Iterator<Item = &ProblemRegion> {
        self.0.iter().filter(move |region| region.page == page)
    }
}

/// Result of region lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRegion {
    /// `None` means the question stem rather than a sub-part
    pub label: Option<String>,
}

impl ResolvedRegion {
    pub fn stem() -> Self {
        Self { label: None }
    }

    pub fn is_stem(&self) -> bool {
        self.label.is_none()
    }

    fn from_region(region: &ProblemRegion) -> Self {
        let label = region.label.trim();
        Self {
            label: (!label.is_empty()).then(|| label.to_string()),
        }
    }
}

pub struct CoordinateMapper;

impl CoordinateMapper {
    /// Undo the canvas zoom: `canvas_y / render_scale`
    pub fn canvas_to_document_y(canvas_y: f64, render_scale: f64) -> f64 {
        canvas_y / render_scale
    }
}

pub struct RegionResolver;

impl RegionResolver {
    /// Find the region for a document-space y on `page`.
    ///
    /// `None` only when there is no region data or nothing on that page.
    /// The first region containing `y` wins; failing that, the region with
    /// the closest edge, earlier regions winning ties.
    pub fn resolve(
        document_y: f64,
        page: usize,
        region_data: Option<&ProblemRegionData>,
    ) -> Option<ResolvedRegion> {
        let data = region_data?;

        let mut nearest: Option<(&ProblemRegion, f64)> = None;
        for region in data.on_page(page) {
            if region.contains(document_y) {
                return Some(ResolvedRegion::from_region(region));
            }

            let distance = region.edge_distance(document_y);
            match nearest {
                Some((_, best)) if distance >= best || distance.is_nan() => {}
                _ => nearest = Some((region, distance)),
            }
        }

        nearest.map(|(region, _)| ResolvedRegion::from_region(region))
    }

    /// Map a canvas y into document space and resolve it
    pub fn resolve_canvas_y(
        canvas_y: f64,
        render_scale: f64,
        page: usize,
        region_data: Option<&ProblemRegionData>,
    ) -> Option<ResolvedRegion> {
        if !render_scale.is_finite() || render_scale <= 0.0 {
            tracing::debug!("Ignoring pause with render scale {}", render_scale);
            return None;
        }

        let document_y = CoordinateMapper::canvas_to_document_y(canvas_y, render_scale);
        Self::resolve(document_y, page, region_data)
    }
}
