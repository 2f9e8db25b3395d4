//! Region assignment: which extruder prints which geometry
//!
//! Three strategies produce the same output shape, an [`Assignment`]:
//!
//! - [`assign_by_object`]: every source stays its own mesh object.
//! - [`assign_by_height_band`]: sources are merged into one object and the
//!   extruders are described as declared height bands.
//! - [`assign_by_geometry`]: legacy mode for unlabeled meshes. Bands are
//!   still declared, but every triangle is additionally classified by its
//!   centroid height so the colors can be painted per triangle.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::merge::{MergeInput, MergedMesh};
use crate::model::{
    Extruder, Mesh, PartAssignment, SourceRegion, TextInfo, Transform, ZInterval,
};

/// How regions are expressed in the packaged file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackagingMode {
    /// One mesh object per source under a composite object
    #[default]
    SeparateParts,
    /// One merged mesh object with declared height bands
    HeightBands,
    /// One unlabeled mesh painted per triangle by height (legacy)
    PaintedBands,
}

impl PackagingMode {
    /// Name as used in configuration and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            PackagingMode::SeparateParts => "separate_parts",
            PackagingMode::HeightBands => "height_bands",
            PackagingMode::PaintedBands => "painted_bands",
        }
    }
}

impl std::str::FromStr for PackagingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "separate_parts" | "separate" => Ok(PackagingMode::SeparateParts),
            "height_bands" | "bands" => Ok(PackagingMode::HeightBands),
            "painted_bands" | "painted" => Ok(PackagingMode::PaintedBands),
            other => Err(Error::Config(format!(
                "Unknown packaging mode '{}'. Expected separate_parts, height_bands or painted_bands",
                other
            ))),
        }
    }
}

/// A declared height band
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    /// Half-open height interval
    pub interval: ZInterval,
    /// Extruder painting the band
    pub extruder: Extruder,
    /// Display name
    pub name: String,
    /// Text descriptor when the band is rendered text
    pub text: Option<TextInfo>,
}

impl Band {
    /// Create a band
    pub fn new(interval: ZInterval, extruder: Extruder, name: impl Into<String>) -> Self {
        Self {
            interval,
            extruder,
            name: name.into(),
            text: None,
        }
    }
}

/// A validated, interval-disjoint set of bands ordered by height
#[derive(Debug, Clone, PartialEq)]
pub struct HeightBands {
    bands: Vec<Band>,
}

impl HeightBands {
    /// Validate and order a band declaration
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRegion`] for an empty declaration or an empty,
    ///   inverted or non-finite interval
    /// - [`Error::RegionOverlap`] if any two intervals share a point
    pub fn new(mut bands: Vec<Band>) -> Result<Self> {
        if bands.is_empty() {
            return Err(Error::InvalidRegion(
                "At least one height band must be declared".to_string(),
            ));
        }

        if let Some(bad) = bands.iter().find(|b| !b.interval.is_valid()) {
            return Err(Error::InvalidRegion(format!(
                "Band '{}' has unusable interval {}",
                bad.name, bad.interval
            )));
        }

        bands.sort_by(|a, b| a.interval.low.total_cmp(&b.interval.low));

        for pair in bands.windows(2) {
            if pair[0].interval.overlaps(&pair[1].interval) {
                return Err(Error::RegionOverlap(format!(
                    "Band '{}' {} overlaps band '{}' {}",
                    pair[0].name, pair[0].interval, pair[1].name, pair[1].interval
                )));
            }
        }

        Ok(Self { bands })
    }

    /// Bands from the declared extents of source regions
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRegion`] if a region has no declared extent, plus the
    /// errors of [`HeightBands::new`].
    pub fn from_regions<'a>(regions: impl IntoIterator<Item = &'a SourceRegion>) -> Result<Self> {
        let bands = regions
            .into_iter()
            .map(|region| {
                let interval = region.extent.ok_or_else(|| {
                    Error::InvalidRegion(format!(
                        "Region '{}' has no declared height extent",
                        region.label
                    ))
                })?;
                Ok(Band {
                    interval,
                    extruder: region.extruder,
                    name: region.display_name.clone(),
                    text: region.text.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(bands)
    }

    /// Bands from lowest to highest
    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// Index of the band containing `z`
    ///
    /// Bands are half-open, so a height exactly on a boundary belongs to
    /// the band starting there. The topmost band has no upper limit. Heights
    /// below the lowest band or inside a gap belong to no band.
    pub fn index_for_z(&self, z: f64) -> Option<usize> {
        let top = self.bands.len() - 1;
        self.bands.iter().enumerate().find_map(|(i, band)| {
            let inside = if i == top {
                band.interval.low <= z
            } else {
                band.interval.contains(z)
            };
            inside.then_some(i)
        })
    }

    /// Band containing `z`, see [`HeightBands::index_for_z`]
    pub fn band_for_z(&self, z: f64) -> Option<&Band> {
        self.index_for_z(z).map(|i| &self.bands[i])
    }

    /// Band index of every triangle, judged by centroid height
    ///
    /// Centroids outside every band fall to the nearest band below, or the
    /// lowest band when under all of them.
    pub fn classify_triangles(&self, mesh: &Mesh) -> Vec<usize> {
        let mut unbanded = 0usize;
        let classes = mesh
            .triangles
            .iter()
            .map(|triangle| {
                let z = mesh
                    .corners(triangle)
                    .map(|c| (f64::from(c[0].z) + f64::from(c[1].z) + f64::from(c[2].z)) / 3.0)
                    .unwrap_or(f64::NEG_INFINITY);
                self.index_for_z(z).unwrap_or_else(|| {
                    unbanded += 1;
                    self.bands
                        .iter()
                        .rposition(|b| b.interval.low <= z)
                        .unwrap_or(0)
                })
            })
            .collect();

        if unbanded > 0 {
            warn!(unbanded, "Triangles outside every declared band were snapped to the nearest band");
        }
        classes
    }
}

/// A mesh object to be emitted, in ID allocation order
#[derive(Debug, Clone, PartialEq)]
pub struct AssignedObject {
    /// Object name
    pub name: String,
    /// Geometry in final coordinates
    pub mesh: Mesh,
}

/// Per-triangle painting of a single mesh object
#[derive(Debug, Clone, PartialEq)]
pub struct TrianglePaint {
    /// Extruder of each paint slot, in band order
    pub slots: Vec<Extruder>,
    /// Slot of each triangle
    pub triangle_slots: Vec<usize>,
}

/// Output of region assignment, ready for the document builder
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Strategy that produced this assignment
    pub mode: PackagingMode,
    /// Mesh objects, in order
    pub objects: Vec<AssignedObject>,
    /// Part assignments referencing `objects` by index
    pub parts: Vec<PartAssignment>,
    /// Triangle painting for [`PackagingMode::PaintedBands`]
    pub paint: Option<TrianglePaint>,
}

impl Assignment {
    /// Extruders used by the parts, in part order without repeats
    pub fn extruders(&self) -> Vec<Extruder> {
        let mut seen = Vec::new();
        for part in &self.parts {
            if !seen.contains(&part.extruder) {
                seen.push(part.extruder);
            }
        }
        seen
    }
}

/// Keep every source as its own object
///
/// Each source's Z offset is applied to its own mesh; the mapping from
/// source to object is purely positional.
pub fn assign_by_object(inputs: Vec<MergeInput>) -> Assignment {
    let mut objects = Vec::with_capacity(inputs.len());
    let mut parts = Vec::with_capacity(inputs.len());

    for (source_index, input) in inputs.into_iter().enumerate() {
        let MergeInput {
            mut mesh,
            region,
            z_offset,
        } = input;
        mesh.translate_z(z_offset);

        parts.push(PartAssignment {
            source_index,
            extruder: region.extruder,
            name: region.display_name.clone(),
            transform: Transform::IDENTITY,
            band: None,
            text: region.text,
        });
        objects.push(AssignedObject {
            name: region.display_name,
            mesh,
        });
    }

    debug!(objects = objects.len(), "Assigned extruders by object");
    Assignment {
        mode: PackagingMode::SeparateParts,
        objects,
        parts,
        paint: None,
    }
}

/// Describe a merged mesh as declared height bands
///
/// Bands come from the sources' declared extents, not from measuring the
/// geometry.
///
/// # Errors
///
/// [`Error::InvalidRegion`] or [`Error::RegionOverlap`] for a bad declaration.
pub fn assign_by_height_band(merged: MergedMesh, object_name: &str) -> Result<Assignment> {
    let bands = HeightBands::from_regions(merged.spans.iter().map(|s| &s.region))?;
    let parts = band_parts(&bands);

    debug!(bands = parts.len(), "Assigned extruders by declared height band");
    Ok(Assignment {
        mode: PackagingMode::HeightBands,
        objects: vec![AssignedObject {
            name: object_name.to_string(),
            mesh: merged.mesh,
        }],
        parts,
        paint: None,
    })
}

/// Paint an unlabeled mesh by measuring triangle heights against declared bands
pub fn assign_by_geometry(mesh: Mesh, bands: &HeightBands, object_name: &str) -> Assignment {
    let triangle_slots = bands.classify_triangles(&mesh);
    let slots = bands.bands().iter().map(|b| b.extruder).collect();

    debug!(
        triangles = triangle_slots.len(),
        bands = bands.bands().len(),
        "Painted triangles by height"
    );
    Assignment {
        mode: PackagingMode::PaintedBands,
        objects: vec![AssignedObject {
            name: object_name.to_string(),
            mesh,
        }],
        parts: band_parts(bands),
        paint: Some(TrianglePaint {
            slots,
            triangle_slots,
        }),
    }
}

fn band_parts(bands: &HeightBands) -> Vec<PartAssignment> {
    bands
        .bands()
        .iter()
        .map(|band| PartAssignment {
            source_index: 0,
            extruder: band.extruder,
            name: band.name.clone(),
            transform: Transform::IDENTITY,
            band: Some(band.interval),
            text: band.text.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge;
    use crate::model::Vertex;

    fn ext(i: u8) -> Extruder {
        Extruder::new(i).unwrap()
    }

    fn flat(z: f32) -> Mesh {
        let mut mesh = Mesh::new();
        mesh.push_facet([
            Vertex::new(0.0, 0.0, z),
            Vertex::new(1.0, 0.0, z),
            Vertex::new(0.0, 1.0, z),
        ]);
        mesh
    }

    fn plate_bands() -> HeightBands {
        HeightBands::new(vec![
            Band::new(ZInterval::new(0.0, 2.0), ext(1), "Base"),
            Band::new(ZInterval::new(2.0, 3.2), ext(2), "Text"),
        ])
        .unwrap()
    }

    #[test]
    fn test_boundary_belongs_to_upper_band() {
        let bands = plate_bands();
        assert_eq!(bands.band_for_z(2.0).map(|b| b.extruder), Some(ext(2)));
        assert_eq!(bands.band_for_z(1.999_999).map(|b| b.extruder), Some(ext(1)));
        assert_eq!(bands.band_for_z(0.0).map(|b| b.extruder), Some(ext(1)));
    }

    #[test]
    fn test_top_band_is_unbounded() {
        let bands = plate_bands();
        assert_eq!(bands.index_for_z(3.2), Some(1));
        assert_eq!(bands.index_for_z(3.200_001), Some(1));
        assert_eq!(bands.index_for_z(-0.1), None);
    }

    #[test]
    fn test_overlapping_bands_rejected() {
        let err = HeightBands::new(vec![
            Band::new(ZInterval::new(0.0, 2.0), ext(1), "a"),
            Band::new(ZInterval::new(1.0, 3.0), ext(2), "b"),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::RegionOverlap(_)), "got {:?}", err);
    }

    #[test]
    fn test_bands_sorted_by_height() {
        let bands = HeightBands::new(vec![
            Band::new(ZInterval::new(2.0, 3.0), ext(2), "upper"),
            Band::new(ZInterval::new(0.0, 2.0), ext(1), "lower"),
        ])
        .unwrap();
        assert_eq!(bands.bands()[0].name, "lower");
    }

    #[test]
    fn test_invalid_band_declarations() {
        assert!(matches!(
            HeightBands::new(Vec::new()),
            Err(Error::InvalidRegion(_))
        ));
        assert!(matches!(
            HeightBands::new(vec![Band::new(ZInterval::new(2.0, 1.0), ext(1), "x")]),
            Err(Error::InvalidRegion(_))
        ));
    }

    #[test]
    fn test_region_without_extent_cannot_band() {
        let regions = [SourceRegion::new("base", "Base", ext(1))];
        assert!(matches!(
            HeightBands::from_regions(&regions),
            Err(Error::InvalidRegion(_))
        ));
    }

    #[test]
    fn test_assign_by_object_keeps_sources_apart() {
        let assignment = assign_by_object(vec![
            MergeInput::new(flat(0.0), SourceRegion::new("base", "Ada - Base", ext(1))),
            MergeInput::new(flat(0.0), SourceRegion::new("text", "Ada - Text", ext(2)))
                .with_z_offset(2.0),
        ]);

        assert_eq!(assignment.mode, PackagingMode::SeparateParts);
        assert_eq!(assignment.objects.len(), 2);
        assert_eq!(assignment.objects[1].mesh.vertices[0].z, 2.0);
        assert_eq!(assignment.parts[1].source_index, 1);
        assert_eq!(assignment.parts[1].extruder, ext(2));
        assert_eq!(assignment.extruders(), vec![ext(1), ext(2)]);
    }

    #[test]
    fn test_assign_by_height_band() {
        let merged = merge(vec![
            MergeInput::new(
                flat(0.0),
                SourceRegion::new("base", "Base", ext(1)).with_extent(ZInterval::new(0.0, 2.0)),
            ),
            MergeInput::new(
                flat(0.0),
                SourceRegion::new("text", "Text", ext(2)).with_extent(ZInterval::stacked(2.0, 1.2)),
            )
            .with_z_offset(2.0),
        ]);
        let assignment = assign_by_height_band(merged, "Ada").unwrap();

        assert_eq!(assignment.objects.len(), 1);
        assert_eq!(assignment.objects[0].mesh.triangle_count(), 2);
        assert_eq!(assignment.parts.len(), 2);
        assert!(assignment.parts.iter().all(|p| p.source_index == 0));
        let band = assignment.parts[1].band.unwrap();
        assert_eq!(band.low, 2.0);
        assert!((band.high - 3.2).abs() < 1e-9);
    }

    #[test]
    fn test_overlapping_extents_fail_assignment() {
        let merged = merge(vec![
            MergeInput::new(
                flat(0.0),
                SourceRegion::new("a", "A", ext(1)).with_extent(ZInterval::new(0.0, 2.0)),
            ),
            MergeInput::new(
                flat(1.0),
                SourceRegion::new("b", "B", ext(2)).with_extent(ZInterval::new(1.0, 3.0)),
            ),
        ]);
        assert!(matches!(
            assign_by_height_band(merged, "x"),
            Err(Error::RegionOverlap(_))
        ));
    }

    #[test]
    fn test_assign_by_geometry_paints_by_centroid() {
        let mut mesh = flat(0.0);
        mesh.append(&flat(2.0));
        mesh.append(&flat(3.2));
        // side wall spanning both bands, centroid at 1.0
        mesh.push_facet([
            Vertex::new(0.0, 0.0, 0.0),
            Vertex::new(1.0, 0.0, 0.0),
            Vertex::new(0.0, 0.0, 3.0),
        ]);

        let assignment = assign_by_geometry(mesh, &plate_bands(), "Ada");
        let paint = assignment.paint.unwrap();
        assert_eq!(paint.slots, vec![ext(1), ext(2)]);
        assert_eq!(paint.triangle_slots, vec![0, 1, 1, 0]);
    }

    #[test]
    fn test_packaging_mode_parsing() {
        assert_eq!(
            "height_bands".parse::<PackagingMode>().unwrap(),
            PackagingMode::HeightBands
        );
        assert_eq!(
            "painted".parse::<PackagingMode>().unwrap(),
            PackagingMode::PaintedBands
        );
        assert!("rainbow".parse::<PackagingMode>().is_err());
    }
}
