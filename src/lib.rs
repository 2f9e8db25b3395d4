//! # nameplate3mf
//!
//! Turns a name into a slicer-ready, multi-color 3MF nameplate.
//!
//! An external renderer compiles geometry programs into STL meshes; this
//! crate ingests them, assigns extruders to regions, builds the
//! interlocking package documents and writes the archive atomically.
//!
//! ## Pipeline
//!
//! 1. [`ingest`]: STL → [`Mesh`], one fresh vertex triple per facet
//! 2. [`merge`]: concatenate meshes, recording each source's index ranges
//! 3. [`region`]: pick extruders by object, by declared height band, or by
//!    painting triangles against bands
//! 4. [`builder`]: allocate IDs and build content types, relationships,
//!    the model document and the slicer settings document
//! 5. [`opc::write_package`]: validate, stage, write and rename into place
//!
//! [`pipeline`] wires these together with a [`renderer::Renderer`] per
//! name, and runs batches that report every name's outcome.
//!
//! ## Example
//!
//! ```no_run
//! use nameplate3mf::builder::{BuildOptions, build_documents};
//! use nameplate3mf::ingest::load_stl;
//! use nameplate3mf::merge::{MergeInput, merge};
//! use nameplate3mf::model::{Extruder, SourceRegion, ZInterval};
//! use nameplate3mf::opc::write_package;
//! use nameplate3mf::region::assign_by_height_band;
//! use std::path::Path;
//!
//! # fn main() -> nameplate3mf::Result<()> {
//! let base = load_stl(Path::new("base.stl"))?;
//! let text = load_stl(Path::new("text.stl"))?;
//! let text_extruder = Extruder::new(2).expect("nonzero");
//!
//! let merged = merge(vec![
//!     MergeInput::new(
//!         base,
//!         SourceRegion::new("base", "Base", Extruder::FIRST).with_extent(ZInterval::new(0.0, 2.0)),
//!     ),
//!     MergeInput::new(
//!         text,
//!         SourceRegion::new("text", "Text", text_extruder).with_extent(ZInterval::new(2.0, 3.2)),
//!     )
//!     .with_z_offset(2.0),
//! ]);
//! let assignment = assign_by_height_band(merged, "Ada")?;
//! let documents = build_documents(&assignment, &BuildOptions::new("Ada"))?;
//! write_package(&documents, Path::new("Ada.3mf"))?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod config;
pub mod error;
pub mod geometry;
pub mod ingest;
pub mod merge;
pub mod model;
pub mod opc;
pub mod parser;
pub mod pipeline;
pub mod region;
pub mod renderer;
pub mod validator;
mod writer;

pub use builder::{BuildOptions, DocumentSet, build_documents};
pub use config::Config;
pub use error::{Error, Result};
pub use model::{Extruder, Mesh, SourceRegion, Triangle, Vertex, ZInterval};
pub use opc::{Package, PackageState, write_package};
pub use parser::{parse_model_xml, parse_settings_xml, read_documents};
pub use pipeline::{
    BatchSummary, NameplateError, NameplateReport, Stage, generate_batch, generate_nameplate,
};
pub use region::{Assignment, HeightBands, PackagingMode};
pub use renderer::{ProcessRenderer, Renderer};
pub use writer::{model_to_string, settings_to_string, write_model_xml, write_settings_xml};
