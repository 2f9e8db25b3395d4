//! The per-object settings document read by the slicer
//!
//! It mirrors the model document's object structure and carries the
//! extruder, part and paint metadata that the core format has no place for.

use super::document::Transform;
use super::region::{Extruder, TextInfo, ZInterval};

/// Part subtype written for every part
pub const NORMAL_PART: &str = "normal_part";

/// Settings for one top-level object
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsObject {
    /// ID of the top-level object in the model document
    pub id: u32,
    /// Display name of the object
    pub name: String,
    /// Default extruder of the object
    pub extruder: Extruder,
    /// Parts, one per part assignment
    pub parts: Vec<SettingsPart>,
}

/// Settings for one part of an object
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsPart {
    /// Part ID, unique within its object
    pub id: u32,
    /// Display name
    pub name: String,
    /// Extruder the part prints with
    pub extruder: Extruder,
    /// Placement of the part within the object
    pub matrix: Transform,
    /// Mesh object in the model document this part draws geometry from
    pub source_object_id: u32,
    /// Height band painted with `extruder`, for merged meshes
    pub paint: Option<ZInterval>,
    /// Informational text descriptor
    pub text: Option<TextInfo>,
}

/// One placed instance of an object on a plate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInstance {
    /// Top-level object ID
    pub object_id: u32,
    /// Instance number, starting at 0
    pub instance_id: u32,
}

/// A build plate
#[derive(Debug, Clone, PartialEq)]
pub struct Plate {
    /// Plate number, starting at 1
    pub plater_id: u32,
    /// Instances on the plate
    pub instances: Vec<ModelInstance>,
}

/// Assembly placement of an instance
#[derive(Debug, Clone, PartialEq)]
pub struct AssembleItem {
    /// Top-level object ID
    pub object_id: u32,
    /// Instance number
    pub instance_id: u32,
    /// Assembly transform
    pub transform: Transform,
    /// Assembly offset
    pub offset: [f64; 3],
}

/// The `Metadata/model_settings.config` document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsDocument {
    /// Object settings
    pub objects: Vec<SettingsObject>,
    /// Plates
    pub plates: Vec<Plate>,
    /// Assembly section
    pub assemble: Vec<AssembleItem>,
}

impl SettingsDocument {
    /// Create an empty settings document
    pub fn new() -> Self {
        Self::default()
    }

    /// All parts across all objects
    pub fn parts(&self) -> impl Iterator<Item = &SettingsPart> {
        self.objects.iter().flat_map(|o| o.parts.iter())
    }
}
