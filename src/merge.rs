//! Geometry merging
//!
//! Concatenates meshes into one indexed buffer in input order, applying only
//! the caller's per-source Z offset, and records where each source landed.

use std::ops::Range;

use tracing::debug;

use crate::model::{Mesh, SourceRegion};

/// One input to [`merge`]
#[derive(Debug, Clone)]
pub struct MergeInput {
    /// Geometry of the source
    pub mesh: Mesh,
    /// Region the geometry belongs to
    pub region: SourceRegion,
    /// Additive Z offset applied while merging
    pub z_offset: f32,
}

impl MergeInput {
    /// Input with no Z offset
    pub fn new(mesh: Mesh, region: SourceRegion) -> Self {
        Self {
            mesh,
            region,
            z_offset: 0.0,
        }
    }

    /// Set the Z offset
    pub fn with_z_offset(mut self, z_offset: f32) -> Self {
        self.z_offset = z_offset;
        self
    }
}

/// Where one source ended up in the merged buffer
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpan {
    /// The source's region
    pub region: SourceRegion,
    /// Z offset that was applied
    pub z_offset: f32,
    /// Vertex index range
    pub vertices: Range<usize>,
    /// Triangle index range
    pub triangles: Range<usize>,
}

/// Result of merging
#[derive(Debug, Clone, PartialEq)]
pub struct MergedMesh {
    /// The concatenated mesh
    pub mesh: Mesh,
    /// One span per input, in input order
    pub spans: Vec<SourceSpan>,
}

impl MergedMesh {
    /// Span containing a triangle index
    pub fn span_of_triangle(&self, triangle: usize) -> Option<&SourceSpan> {
        self.spans.iter().find(|s| s.triangles.contains(&triangle))
    }
}

/// Merge sources into a single mesh
///
/// Spans are contiguous, disjoint and together cover
/// `0..vertex_count` and `0..triangle_count` exactly. Empty sources get
/// empty ranges at their position.
pub fn merge(inputs: Vec<MergeInput>) -> MergedMesh {
    let total: usize = inputs.iter().map(|i| i.mesh.triangle_count()).sum();
    let mut mesh = Mesh::with_capacity(total);
    let mut spans = Vec::with_capacity(inputs.len());

    for MergeInput {
        mesh: mut source,
        region,
        z_offset,
    } in inputs
    {
        source.translate_z(z_offset);
        let (vertices, triangles) = mesh.append(&source);
        debug!(
            label = %region.label,
            z_offset,
            vertices = ?vertices,
            triangles = ?triangles,
            "Merged source mesh"
        );
        spans.push(SourceSpan {
            region,
            z_offset,
            vertices,
            triangles,
        });
    }

    MergedMesh { mesh, spans }
}
