//! Mesh ingestion from renderer output
//!
//! The renderer writes STL (binary or ASCII). Facets are consumed as a flat
//! stream: each facet appends three fresh vertices in the order the file
//! lists them, so winding is preserved and nothing is deduplicated.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{Mesh, Vertex};

/// Read an STL mesh from a seekable reader
///
/// An STL with zero facets yields an empty mesh; whether that is acceptable
/// is up to the caller.
///
/// # Errors
///
/// [`Error::MeshFormat`] if the stream is truncated, a facet does not have
/// exactly three vertices, or a coordinate is NaN or infinite.
pub fn read_stl<R: Read + Seek>(reader: &mut R) -> Result<Mesh> {
    let facets = stl_io::create_stl_reader(reader)
        .map_err(|e| Error::mesh_format(format!("Unreadable STL stream: {}", e)))?;

    let mut mesh = Mesh::new();
    for (index, facet) in facets.enumerate() {
        let facet = facet
            .map_err(|e| Error::mesh_format(format!("Facet {}: {}", index, e)))?;

        let corners = facet.vertices.map(|v| Vertex::new(v[0], v[1], v[2]));
        if let Some(bad) = corners.iter().find(|v| !v.is_finite()) {
            return Err(Error::mesh_format(format!(
                "Facet {} has a non-finite coordinate ({}, {}, {})",
                index, bad.x, bad.y, bad.z
            )));
        }
        mesh.push_facet(corners);
    }

    debug!(
        triangles = mesh.triangle_count(),
        vertices = mesh.vertex_count(),
        "Ingested STL mesh"
    );
    Ok(mesh)
}

/// Load an STL mesh from a file
///
/// A missing or unreadable file is a [`Error::MeshFormat`]: the renderer
/// reporting success does not guarantee it produced output.
pub fn load_stl(path: &Path) -> Result<Mesh> {
    let file = File::open(path).map_err(|e| {
        Error::mesh_format(format!("Cannot open mesh file '{}': {}", path.display(), e))
    })?;
    let mut reader = BufReader::new(file);
    read_stl(&mut reader).map_err(|e| match e {
        Error::MeshFormat(msg) => Error::MeshFormat(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn binary_stl(facets: &[[[f32; 3]; 3]]) -> Vec<u8> {
        let mut bytes = vec![0u8; 80];
        bytes.extend_from_slice(&(facets.len() as u32).to_le_bytes());
        for facet in facets {
            bytes.extend_from_slice(&[0u8; 12]);
            for corner in facet {
                for c in corner {
                    bytes.extend_from_slice(&c.to_le_bytes());
                }
            }
            bytes.extend_from_slice(&[0u8; 2]);
        }
        bytes
    }

    const UNIT: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];

    #[test]
    fn test_read_binary_stl() {
        let raised = [[0.0, 0.0, 2.0], [0.0, 1.0, 2.0], [1.0, 0.0, 2.0]];
        let bytes = binary_stl(&[UNIT, raised]);
        let mesh = read_stl(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.triangles[1].indices(), [3, 4, 5]);
        // winding kept as listed
        assert_eq!(mesh.vertices[4], Vertex::new(0.0, 1.0, 2.0));
        assert_eq!(mesh.vertices[5], Vertex::new(1.0, 0.0, 2.0));
    }

    #[test]
    fn test_read_empty_binary_stl() {
        let bytes = binary_stl(&[]);
        let mesh = read_stl(&mut Cursor::new(bytes)).unwrap();
        assert!(mesh.is_empty());
        assert_eq!(mesh.vertex_count(), 0);
    }

    #[test]
    fn test_truncated_binary_stl() {
        let mut bytes = binary_stl(&[UNIT, UNIT]);
        bytes.truncate(bytes.len() - 30);
        let err = read_stl(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, Error::MeshFormat(_)), "got {:?}", err);
    }

    #[test]
    fn test_non_finite_coordinate() {
        let bad = [[0.0, 0.0, 0.0], [f32::NAN, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let bytes = binary_stl(&[UNIT, bad]);
        let err = read_stl(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, Error::MeshFormat(_)));
        assert!(err.to_string().contains("Facet 1"));
    }

    #[test]
    fn test_read_ascii_stl() {
        let text = "solid plate\n\
            facet normal 0 0 1\n\
            outer loop\n\
            vertex 0 0 0\n\
            vertex 1 0 0\n\
            vertex 0 1 0\n\
            endloop\n\
            endfacet\n\
            endsolid plate\n";
        let mesh = read_stl(&mut Cursor::new(text.as_bytes().to_vec())).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.vertices[1], Vertex::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_load_missing_file_is_mesh_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_stl(&dir.path().join("never_rendered.stl")).unwrap_err();
        assert!(matches!(err, Error::MeshFormat(_)));
        assert!(err.to_string().contains("never_rendered.stl"));
    }
}
