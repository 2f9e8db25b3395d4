//! Data structures for meshes, regions and the packaged documents

mod document;
mod mesh;
mod region;
mod settings;

pub use document::{
    BaseMaterial, BaseMaterialGroup, Build, BuildItem, CORE_NAMESPACE, Component, MetadataEntry,
    ModelDocument, Object, ObjectType, Resources, Transform, VENDOR_NAMESPACE,
};
pub use mesh::{Mesh, Triangle, Vertex};
pub use region::{Extruder, PartAssignment, SourceRegion, TextInfo, ZInterval};
pub use settings::{
    AssembleItem, ModelInstance, NORMAL_PART, Plate, SettingsDocument, SettingsObject,
    SettingsPart,
};
