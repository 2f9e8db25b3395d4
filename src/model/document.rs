//! The 3D model document: resources, objects and the build plate

use std::fmt;

use super::mesh::Mesh;

/// Core 3MF namespace
pub const CORE_NAMESPACE: &str = "http://schemas.microsoft.com/3dmanufacturing/core/2015/02";

/// Slicer vendor namespace carried by the model's metadata keys
pub const VENDOR_NAMESPACE: &str = "http://schemas.bambulab.com/package/2021";

/// Affine transform in 3MF order: 3×3 linear part row by row, then translation
///
/// Points transform as row vectors, `p' = p · M`, so the twelve values are
/// `m00 m01 m02 m10 m11 m12 m20 m21 m22 m30 m31 m32`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform(pub [f64; 12]);

impl Transform {
    /// The identity transform
    pub const IDENTITY: Transform = Transform([
        1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0,
    ]);

    /// Pure translation
    pub fn translation(x: f64, y: f64, z: f64) -> Self {
        let mut m = Self::IDENTITY.0;
        m[9] = x;
        m[10] = y;
        m[11] = z;
        Transform(m)
    }

    /// True if this is exactly the identity
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// The 4×4 column-vector matrix, row-major, as used by the settings document
    pub fn to_matrix4(&self) -> [f64; 16] {
        let m = &self.0;
        [
            m[0], m[3], m[6], m[9], //
            m[1], m[4], m[7], m[10], //
            m[2], m[5], m[8], m[11], //
            0.0, 0.0, 0.0, 1.0,
        ]
    }

    /// Inverse of [`Transform::to_matrix4`]; `None` if the last row is not `0 0 0 1`
    pub fn from_matrix4(m: &[f64; 16]) -> Option<Self> {
        if m[12] != 0.0 || m[13] != 0.0 || m[14] != 0.0 || m[15] != 1.0 {
            return None;
        }
        Some(Transform([
            m[0], m[4], m[8], m[1], m[5], m[9], m[2], m[6], m[10], m[3], m[7], m[11],
        ]))
    }

    /// Space-separated 4×4 matrix text
    pub fn matrix4_string(&self) -> String {
        join_numbers(&self.to_matrix4())
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_numbers(&self.0))
    }
}

fn join_numbers(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Type of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectType {
    /// A printable model
    #[default]
    Model,
    /// Anything else
    Other,
}

impl ObjectType {
    /// Attribute value
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Model => "model",
            ObjectType::Other => "other",
        }
    }
}

/// A reference from a composite object to a constituent object
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    /// Referenced object ID
    pub objectid: u32,
    /// Placement of the constituent
    pub transform: Transform,
}

impl Component {
    /// Reference with identity placement
    pub fn new(objectid: u32) -> Self {
        Self {
            objectid,
            transform: Transform::IDENTITY,
        }
    }
}

/// An object resource: either owns a mesh or aggregates other objects
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    /// Positive ID, unique within the document
    pub id: u32,
    /// Object type
    pub object_type: ObjectType,
    /// Optional name
    pub name: Option<String>,
    /// Default property group for painted meshes
    pub pid: Option<u32>,
    /// Default property index within `pid`
    pub pindex: Option<usize>,
    /// Geometry, for mesh objects
    pub mesh: Option<Mesh>,
    /// Constituents, for composite objects
    pub components: Vec<Component>,
}

impl Object {
    /// Create an empty object
    pub fn new(id: u32) -> Self {
        Self {
            id,
            object_type: ObjectType::Model,
            name: None,
            pid: None,
            pindex: None,
            mesh: None,
            components: Vec::new(),
        }
    }

    /// Create a mesh object
    pub fn with_mesh(id: u32, mesh: Mesh) -> Self {
        Self {
            mesh: Some(mesh),
            ..Self::new(id)
        }
    }

    /// True if the object references other objects
    pub fn is_composite(&self) -> bool {
        !self.components.is_empty()
    }
}

/// A named display material
#[derive(Debug, Clone, PartialEq)]
pub struct BaseMaterial {
    /// Material name
    pub name: String,
    /// RGBA display color
    pub displaycolor: (u8, u8, u8, u8),
}

impl BaseMaterial {
    /// Create a base material
    pub fn new(name: String, displaycolor: (u8, u8, u8, u8)) -> Self {
        Self { name, displaycolor }
    }
}

/// A group of base materials referenced by `pid`
#[derive(Debug, Clone, PartialEq)]
pub struct BaseMaterialGroup {
    /// Resource ID, sharing the object ID space
    pub id: u32,
    /// Materials, indexed by `p1`/`pindex`
    pub materials: Vec<BaseMaterial>,
}

impl BaseMaterialGroup {
    /// Create an empty group
    pub fn new(id: u32) -> Self {
        Self {
            id,
            materials: Vec::new(),
        }
    }
}

/// Resources section
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resources {
    /// Base material groups
    pub base_material_groups: Vec<BaseMaterialGroup>,
    /// Objects in declaration order
    pub objects: Vec<Object>,
}

impl Resources {
    /// Find an object by ID
    pub fn object(&self, id: u32) -> Option<&Object> {
        self.objects.iter().find(|o| o.id == id)
    }
}

/// An item on the build plate
#[derive(Debug, Clone, PartialEq)]
pub struct BuildItem {
    /// Referenced object ID
    pub objectid: u32,
    /// Placement on the plate
    pub transform: Option<Transform>,
    /// Printable flag
    pub printable: Option<bool>,
}

impl BuildItem {
    /// Build item with no transform or printable flag
    pub fn new(objectid: u32) -> Self {
        Self {
            objectid,
            transform: None,
            printable: None,
        }
    }
}

/// Build section
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Build {
    /// Items on the plate
    pub items: Vec<BuildItem>,
}

/// A model-level metadata entry; the value is written as element text
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataEntry {
    /// Metadata key
    pub name: String,
    /// Metadata value
    pub value: String,
}

impl MetadataEntry {
    /// Create a metadata entry
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The `3D/3dmodel.model` document
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDocument {
    /// Unit of measurement
    pub unit: String,
    /// Metadata entries
    pub metadata: Vec<MetadataEntry>,
    /// Resources
    pub resources: Resources,
    /// Build plate
    pub build: Build,
}

impl ModelDocument {
    /// Create an empty millimeter document
    pub fn new() -> Self {
        Self {
            unit: "millimeter".to_string(),
            metadata: Vec::new(),
            resources: Resources::default(),
            build: Build::default(),
        }
    }

    /// Value of a metadata entry
    pub fn metadata_value(&self, name: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.value.as_str())
    }

    /// True if any mesh is painted through a base material group
    pub fn is_painted(&self) -> bool {
        !self.resources.base_material_groups.is_empty()
    }
}

impl Default for ModelDocument {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_text() {
        assert_eq!(Transform::IDENTITY.to_string(), "1 0 0 0 1 0 0 0 1 0 0 0");
        assert_eq!(
            Transform::IDENTITY.matrix4_string(),
            "1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 1"
        );
    }

    #[test]
    fn test_translation_in_matrix4() {
        let t = Transform::translation(1.0, 2.0, 3.5);
        assert_eq!(t.to_string(), "1 0 0 0 1 0 0 0 1 1 2 3.5");
        assert_eq!(t.matrix4_string(), "1 0 0 1 0 1 0 2 0 0 1 3.5 0 0 0 1");
    }

    #[test]
    fn test_matrix4_round_trip() {
        let t = Transform([2.0, 0.5, 0.0, 0.0, 1.0, 0.0, 0.25, 0.0, 1.0, 4.0, 5.0, 6.0]);
        assert_eq!(Transform::from_matrix4(&t.to_matrix4()), Some(t));

        let mut projective = t.to_matrix4();
        projective[12] = 1.0;
        assert_eq!(Transform::from_matrix4(&projective), None);
    }

    #[test]
    fn test_metadata_lookup() {
        let mut doc = ModelDocument::new();
        doc.metadata.push(MetadataEntry::new("Title", "Ada Lovelace"));
        assert_eq!(doc.metadata_value("Title"), Some("Ada Lovelace"));
        assert_eq!(doc.metadata_value("Designer"), None);
    }
}
