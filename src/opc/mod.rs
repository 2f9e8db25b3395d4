//! OPC (Open Packaging Conventions) handling for the output archive
//!
//! A 3MF file is a ZIP archive following the OPC standard. The packager
//! writes four parts at fixed paths plus any extra payloads; the reader
//! opens such an archive again for inspection and round-trip checks.

mod content_types;
mod reader;
mod relationships;
mod writer;

pub use content_types::{
    CONTENT_TYPES_NAMESPACE, ContentTypes, MODEL_CONTENT_TYPE, RELATIONSHIPS_CONTENT_TYPE,
    content_type_for_extension,
};
pub use reader::Package;
pub use relationships::{
    MODEL_REL_TYPE, RELATIONSHIPS_NAMESPACE, Relationship, Relationships, THUMBNAIL_REL_TYPE,
};
pub use writer::{PackageState, to_bytes, to_writer, write_package};

/// Main 3D model file path within the archive
pub const MODEL_PATH: &str = "3D/3dmodel.model";

/// Content types file path
pub const CONTENT_TYPES_PATH: &str = "[Content_Types].xml";

/// Package relationships file path
pub const RELS_PATH: &str = "_rels/.rels";

/// Slicer settings file path
pub const SETTINGS_PATH: &str = "Metadata/model_settings.config";
