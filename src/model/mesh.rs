//! Triangle mesh types shared by ingestion, merging and document output

use std::ops::Range;

/// A vertex position in millimeters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
    /// Z coordinate
    pub z: f32,
}

impl Vertex {
    /// Create a new vertex
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// True if all coordinates are finite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// A triangle referencing three vertices of the enclosing mesh
///
/// Index order defines the outward-facing winding.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    /// First vertex index
    pub v1: usize,
    /// Second vertex index
    pub v2: usize,
    /// Third vertex index
    pub v3: usize,
    /// Property group ID (painted meshes only)
    pub pid: Option<u32>,
    /// Index into the property group for the whole triangle
    pub p1: Option<usize>,
}

impl Triangle {
    /// Create a new triangle
    pub fn new(v1: usize, v2: usize, v3: usize) -> Self {
        Self {
            v1,
            v2,
            v3,
            pid: None,
            p1: None,
        }
    }

    /// Vertex indices in winding order
    pub fn indices(&self) -> [usize; 3] {
        [self.v1, self.v2, self.v3]
    }
}

/// A flat triangle mesh
///
/// Every triangle owns the three vertices appended with it, so
/// `vertices.len() == 3 * triangles.len()` holds for meshes built through
/// [`Mesh::push_facet`]. Vertices are never deduplicated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Vertex positions
    pub vertices: Vec<Vertex>,
    /// Triangles indexing into `vertices`
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    /// Create an empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty mesh with room for `triangles` facets
    pub fn with_capacity(triangles: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(triangles * 3),
            triangles: Vec::with_capacity(triangles),
        }
    }

    /// Append a facet, giving it three fresh vertices
    pub fn push_facet(&mut self, corners: [Vertex; 3]) {
        let base = self.vertices.len();
        self.vertices.extend_from_slice(&corners);
        self.triangles.push(Triangle::new(base, base + 1, base + 2));
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// True if the mesh has no triangles
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Shift every vertex along Z
    pub fn translate_z(&mut self, offset: f32) {
        if offset == 0.0 {
            return;
        }
        for v in &mut self.vertices {
            v.z += offset;
        }
    }

    /// Lowest and highest Z over all vertices, `None` for an empty mesh
    pub fn z_bounds(&self) -> Option<(f32, f32)> {
        self.vertices.iter().fold(None, |acc, v| match acc {
            None => Some((v.z, v.z)),
            Some((lo, hi)) => Some((lo.min(v.z), hi.max(v.z))),
        })
    }

    /// Corner positions of a triangle
    pub fn corners(&self, triangle: &Triangle) -> Option<[Vertex; 3]> {
        Some([
            *self.vertices.get(triangle.v1)?,
            *self.vertices.get(triangle.v2)?,
            *self.vertices.get(triangle.v3)?,
        ])
    }

    /// Append all of `other`, rebasing its indices; returns the vertex and
    /// triangle ranges it now occupies
    pub fn append(&mut self, other: &Mesh) -> (Range<usize>, Range<usize>) {
        let vertex_start = self.vertices.len();
        let triangle_start = self.triangles.len();

        self.vertices.extend_from_slice(&other.vertices);
        self.triangles.extend(other.triangles.iter().map(|t| Triangle {
            v1: t.v1 + vertex_start,
            v2: t.v2 + vertex_start,
            v3: t.v3 + vertex_start,
            pid: t.pid,
            p1: t.p1,
        }));

        (
            vertex_start..self.vertices.len(),
            triangle_start..self.triangles.len(),
        )
    }
}
