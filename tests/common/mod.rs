//! Shared fixtures for integration tests
//!
//! Meshes are built from explicit facets so every test knows exactly which
//! triangle lands where, and [`FixtureRenderer`] stands in for the external
//! renderer by writing those meshes as binary STL.

#![allow(dead_code)]

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use nameplate3mf::geometry::{GeometryProgram, ProgramKind};
use nameplate3mf::model::{Extruder, Mesh, Vertex};
use nameplate3mf::{Error, Renderer, Result};

/// One facet as three corners
pub type Facet = [[f32; 3]; 3];

/// Base slab fixture: two floor facets at `z0` and two wall facets reaching `z1`
///
/// Every centroid lies in `[z0, z1)`.
pub fn slab(width: f32, z0: f32, z1: f32) -> Vec<Facet> {
    vec![
        [[0.0, 0.0, z0], [0.0, 10.0, z0], [width, 0.0, z0]],
        [[width, 0.0, z0], [0.0, 10.0, z0], [width, 10.0, z0]],
        [[0.0, 0.0, z0], [width, 0.0, z0], [width, 0.0, z1]],
        [[0.0, 0.0, z0], [width, 0.0, z1], [0.0, 0.0, z1]],
    ]
}

/// Glyph fixture: a floor facet at `z0` and a roof facet at `z1`
pub fn glyph(z0: f32, z1: f32) -> Vec<Facet> {
    vec![
        [[2.0, 2.0, z0], [4.0, 2.0, z0], [3.0, 6.0, z0]],
        [[2.0, 2.0, z1], [3.0, 6.0, z1], [4.0, 2.0, z1]],
    ]
}

/// Mesh with three fresh vertices per facet
pub fn mesh(facets: &[Facet]) -> Mesh {
    let mut mesh = Mesh::new();
    for facet in facets {
        mesh.push_facet(facet.map(|[x, y, z]| Vertex::new(x, y, z)));
    }
    mesh
}

/// Write facets as a binary STL file
pub fn write_stl(path: &Path, facets: &[Facet]) -> std::io::Result<()> {
    let triangles: Vec<stl_io::Triangle> = facets
        .iter()
        .map(|facet| stl_io::Triangle {
            normal: stl_io::Normal::new([0.0, 0.0, 0.0]),
            vertices: facet.map(stl_io::Vertex::new),
        })
        .collect();
    let mut writer = BufWriter::new(File::create(path)?);
    stl_io::write_stl(&mut writer, triangles.iter())
}

/// Extruder by index
pub fn ext(index: u8) -> Extruder {
    Extruder::new(index).unwrap()
}

/// Renderer writing fixed meshes: a 4-facet slab for the base, a 2-facet
/// glyph from z = 0 for the label, and both stacked for the combined solid
#[derive(Debug, Clone, Copy)]
pub struct FixtureRenderer {
    /// Plate thickness the fixtures are built for
    pub base_thickness: f32,
    /// Label height
    pub text_height: f32,
}

impl Default for FixtureRenderer {
    fn default() -> Self {
        Self {
            base_thickness: 2.0,
            text_height: 1.2,
        }
    }
}

impl FixtureRenderer {
    pub fn facets(&self, kind: ProgramKind) -> Vec<Facet> {
        let top = self.base_thickness + self.text_height;
        match kind {
            ProgramKind::Base => slab(40.0, 0.0, self.base_thickness),
            ProgramKind::Text => glyph(0.0, self.text_height),
            ProgramKind::Combined => {
                let mut facets = slab(40.0, 0.0, self.base_thickness);
                facets.extend(glyph(self.base_thickness, top));
                facets
            }
        }
    }
}

impl Renderer for FixtureRenderer {
    fn render(&self, program: &GeometryProgram, output: &Path) -> Result<()> {
        write_stl(output, &self.facets(program.kind()))?;
        Ok(())
    }
}

/// Renderer that always fails like a crashed process
#[derive(Debug, Clone, Copy, Default)]
pub struct CrashingRenderer;

impl Renderer for CrashingRenderer {
    fn render(&self, _program: &GeometryProgram, _output: &Path) -> Result<()> {
        Err(Error::RendererInvocation(
            "renderer exited with exit status: 1".to_string(),
        ))
    }
}

/// Names of the entries in a directory, sorted
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
