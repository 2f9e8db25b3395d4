//! Container document assembly
//!
//! Turns an [`Assignment`] into the four interlocking documents of the
//! archive: content types, package relationships, the 3D model and the
//! slicer settings. IDs are allocated deterministically:
//!
//! 1. mesh objects, `1..=n` in assignment order
//! 2. the composite object aggregating them, `n + 1`, only when `n > 1`
//! 3. the base material group of a painted mesh, next free ID
//!
//! The finished set is validated before it is returned, so a
//! [`DocumentSet`] coming out of [`build_documents`] is always
//! referentially consistent.

use chrono::{Local, NaiveDate};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{
    AssembleItem, BaseMaterial, BaseMaterialGroup, BuildItem, Component, Extruder, MetadataEntry,
    ModelDocument, ModelInstance, Object, Plate, SettingsDocument, SettingsObject, SettingsPart,
    Transform,
};
use crate::opc::{ContentTypes, MODEL_PATH, Relationships, SETTINGS_PATH};
use crate::region::{Assignment, TrianglePaint};
use crate::validator;

/// Application string the slicer expects in the model metadata
pub const DEFAULT_APPLICATION: &str = "BambuStudio-02.04.00.70";

/// Metadata key carrying the vendor file format version
pub const VENDOR_VERSION_KEY: &str = "BambuStudio:3mfVersion";

/// RGBA display color
pub type Rgba = (u8, u8, u8, u8);

/// Display colors used when no palette is configured, indexed by extruder
pub const DEFAULT_PALETTE: [Rgba; 4] = [
    (0xFF, 0xFF, 0xFF, 0xFF),
    (0x00, 0x00, 0x00, 0xFF),
    (0xC1, 0x2E, 0x1F, 0xFF),
    (0x16, 0x4B, 0xC8, 0xFF),
];

const FALLBACK_COLOR: Rgba = (0x80, 0x80, 0x80, 0xFF);

/// A binary payload stored alongside the documents
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    /// Archive entry name, e.g. `Metadata/plate_1.png`
    pub path: String,
    /// Raw content
    pub data: Vec<u8>,
    /// Package relationship type, if the payload is linked from `_rels/.rels`
    pub rel_type: Option<String>,
}

impl Attachment {
    /// Unlinked payload
    pub fn new(path: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            path: path.into().trim_start_matches('/').to_string(),
            data,
            rel_type: None,
        }
    }

    /// Link the payload from the package relationships
    pub fn with_relationship(mut self, rel_type: impl Into<String>) -> Self {
        self.rel_type = Some(rel_type.into());
        self
    }
}

/// Everything the packager writes for one nameplate
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSet {
    /// `[Content_Types].xml`
    pub content_types: ContentTypes,
    /// `_rels/.rels`
    pub relationships: Relationships,
    /// `3D/3dmodel.model`
    pub model: ModelDocument,
    /// `Metadata/model_settings.config`
    pub settings: SettingsDocument,
    /// Extra payloads
    pub attachments: Vec<Attachment>,
}

impl DocumentSet {
    /// Object referenced by the build plate
    pub fn top_level_object(&self) -> Option<&Object> {
        self.model
            .build
            .items
            .first()
            .and_then(|item| self.model.resources.object(item.objectid))
    }
}

/// Presentation details of the built documents
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    /// Title metadata and name of the top-level object
    pub title: String,
    /// Application metadata
    pub application: String,
    /// Creation and modification date
    pub date: NaiveDate,
    /// Display colors indexed by extruder, used for painted meshes
    pub palette: Vec<Rgba>,
    /// Extra payloads
    pub attachments: Vec<Attachment>,
}

impl BuildOptions {
    /// Options dated today with the default application and palette
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            application: DEFAULT_APPLICATION.to_string(),
            date: Local::now().date_naive(),
            palette: DEFAULT_PALETTE.to_vec(),
            attachments: Vec::new(),
        }
    }

    /// Set the application metadata
    pub fn with_application(mut self, application: impl Into<String>) -> Self {
        self.application = application.into();
        self
    }

    /// Set the document date
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// Set the palette
    pub fn with_palette(mut self, palette: Vec<Rgba>) -> Self {
        self.palette = palette;
        self
    }

    /// Add an extra payload
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Display color of an extruder
    pub fn color_for(&self, extruder: Extruder) -> Rgba {
        self.palette
            .get(usize::from(extruder.get()) - 1)
            .copied()
            .unwrap_or(FALLBACK_COLOR)
    }
}

/// Build and validate the document set for an assignment
///
/// # Errors
///
/// - [`Error::InvalidModel`] if there is nothing to package or the paint
///   table does not match the mesh
/// - [`Error::DanglingReference`] if a part names a source that has no
///   object
/// - any validation error from [`validator::validate_documents`]
pub fn build_documents(assignment: &Assignment, options: &BuildOptions) -> Result<DocumentSet> {
    if assignment.objects.is_empty() {
        return Err(Error::InvalidModel(
            "Nothing to package: the assignment has no mesh objects".to_string(),
        ));
    }

    let mut model = ModelDocument::new();
    model.metadata = metadata(options);

    let mut next_id: u32 = 1;
    let mut mesh_ids = Vec::with_capacity(assignment.objects.len());
    for assigned in &assignment.objects {
        let mut object = Object::with_mesh(next_id, assigned.mesh.clone());
        object.name = Some(assigned.name.clone());
        model.resources.objects.push(object);
        mesh_ids.push(next_id);
        next_id += 1;
    }

    let top_id = if mesh_ids.len() > 1 {
        let id = next_id;
        next_id += 1;
        let mut composite = Object::new(id);
        composite.name = Some(options.title.clone());
        composite.components = mesh_ids
            .iter()
            .enumerate()
            .map(|(index, &objectid)| Component {
                objectid,
                transform: assignment
                    .parts
                    .iter()
                    .find(|p| p.source_index == index)
                    .map(|p| p.transform)
                    .unwrap_or(Transform::IDENTITY),
            })
            .collect();
        model.resources.objects.push(composite);
        id
    } else {
        mesh_ids[0]
    };

    if let Some(paint) = &assignment.paint {
        apply_paint(&mut model, next_id, paint, options)?;
    }

    model.build.items.push(BuildItem {
        objectid: top_id,
        transform: Some(Transform::IDENTITY),
        printable: Some(true),
    });

    let settings = settings_document(assignment, options, top_id, &mesh_ids)?;

    let mut content_types = ContentTypes::new();
    content_types.register_part(SETTINGS_PATH)?;
    let mut relationships = Relationships::for_model(MODEL_PATH);
    for attachment in &options.attachments {
        content_types.register_part(&attachment.path)?;
        if let Some(rel_type) = &attachment.rel_type {
            relationships.add(&attachment.path, rel_type);
        }
    }

    let documents = DocumentSet {
        content_types,
        relationships,
        model,
        settings,
        attachments: options.attachments.clone(),
    };
    validator::validate_documents(&documents)?;

    debug!(
        mode = assignment.mode.as_str(),
        objects = documents.model.resources.objects.len(),
        top_level = top_id,
        parts = assignment.parts.len(),
        "Built document set"
    );
    Ok(documents)
}

fn metadata(options: &BuildOptions) -> Vec<MetadataEntry> {
    let date = options.date.format("%Y-%m-%d").to_string();
    vec![
        MetadataEntry::new("Application", options.application.as_str()),
        MetadataEntry::new(VENDOR_VERSION_KEY, "1"),
        MetadataEntry::new("CreationDate", date.as_str()),
        MetadataEntry::new("ModificationDate", date),
        MetadataEntry::new("Title", options.title.as_str()),
    ]
}

fn apply_paint(
    model: &mut ModelDocument,
    group_id: u32,
    paint: &TrianglePaint,
    options: &BuildOptions,
) -> Result<()> {
    let [object] = model.resources.objects.as_mut_slice() else {
        return Err(Error::InvalidModel(
            "Per-triangle paint requires exactly one mesh object".to_string(),
        ));
    };
    let Some(mesh) = object.mesh.as_mut() else {
        return Err(Error::InvalidModel(
            "Per-triangle paint requires a mesh object".to_string(),
        ));
    };
    if paint.triangle_slots.len() != mesh.triangle_count() {
        return Err(Error::InvalidModel(format!(
            "Paint table covers {} triangles but the mesh has {}",
            paint.triangle_slots.len(),
            mesh.triangle_count()
        )));
    }

    for (triangle, &slot) in mesh.triangles.iter_mut().zip(&paint.triangle_slots) {
        triangle.pid = Some(group_id);
        triangle.p1 = Some(slot);
    }
    object.pid = Some(group_id);
    object.pindex = Some(0);

    let mut group = BaseMaterialGroup::new(group_id);
    group.materials = paint
        .slots
        .iter()
        .map(|&extruder| BaseMaterial::new(format!("Extruder {}", extruder), options.color_for(extruder)))
        .collect();
    model.resources.base_material_groups.push(group);
    Ok(())
}

fn settings_document(
    assignment: &Assignment,
    options: &BuildOptions,
    top_id: u32,
    mesh_ids: &[u32],
) -> Result<SettingsDocument> {
    let parts = assignment
        .parts
        .iter()
        .enumerate()
        .map(|(index, part)| {
            let source_object_id = mesh_ids.get(part.source_index).copied().ok_or_else(|| {
                Error::dangling_reference(
                    &format!("Settings part '{}'", part.name),
                    u32::try_from(part.source_index + 1).unwrap_or(u32::MAX),
                    mesh_ids,
                )
            })?;
            Ok(SettingsPart {
                id: u32::try_from(index + 1)
                    .map_err(|_| Error::InvalidModel("Too many parts".to_string()))?,
                name: part.name.clone(),
                extruder: part.extruder,
                matrix: part.transform,
                source_object_id,
                paint: part.band,
                text: part.text.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let extruder = parts.first().map(|p| p.extruder).unwrap_or(Extruder::FIRST);
    Ok(SettingsDocument {
        objects: vec![SettingsObject {
            id: top_id,
            name: format!("{}.3mf", options.title),
            extruder,
            parts,
        }],
        plates: vec![Plate {
            plater_id: 1,
            instances: vec![ModelInstance {
                object_id: top_id,
                instance_id: 0,
            }],
        }],
        assemble: vec![AssembleItem {
            object_id: top_id,
            instance_id: 0,
            transform: Transform::IDENTITY,
            offset: [0.0; 3],
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{MergeInput, merge};
    use crate::model::{Mesh, SourceRegion, Vertex, ZInterval};
    use crate::region::{Band, HeightBands, assign_by_geometry, assign_by_height_band, assign_by_object};

    fn ext(i: u8) -> Extruder {
        Extruder::new(i).unwrap()
    }

    fn strip(count: usize, z: f32) -> Mesh {
        let mut mesh = Mesh::new();
        for i in 0..count {
            let x = i as f32;
            mesh.push_facet([
                Vertex::new(x, 0.0, z),
                Vertex::new(x + 1.0, 0.0, z),
                Vertex::new(x, 1.0, z),
            ]);
        }
        mesh
    }

    fn options() -> BuildOptions {
        BuildOptions::new("Ada Lovelace").with_date(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap())
    }

    fn separate() -> Assignment {
        assign_by_object(vec![
            MergeInput::new(strip(4, 0.0), SourceRegion::new("base", "Base", ext(1))),
            MergeInput::new(strip(2, 0.0), SourceRegion::new("text", "Text", ext(2)))
                .with_z_offset(2.0),
        ])
    }

    #[test]
    fn test_separate_parts_ids() {
        let docs = build_documents(&separate(), &options()).unwrap();
        let ids: Vec<u32> = docs.model.resources.objects.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let composite = docs.top_level_object().unwrap();
        assert_eq!(composite.id, 3);
        assert_eq!(composite.name.as_deref(), Some("Ada Lovelace"));
        let refs: Vec<u32> = composite.components.iter().map(|c| c.objectid).collect();
        assert_eq!(refs, vec![1, 2]);
        assert!(composite.components.iter().all(|c| c.transform.is_identity()));

        assert_eq!(docs.model.build.items.len(), 1);
        assert_eq!(docs.model.build.items[0].printable, Some(true));
    }

    #[test]
    fn test_separate_parts_settings() {
        let docs = build_documents(&separate(), &options()).unwrap();
        let object = &docs.settings.objects[0];
        assert_eq!(object.id, 3);
        assert_eq!(object.name, "Ada Lovelace.3mf");
        let parts: Vec<(u32, u8, u32)> = object
            .parts
            .iter()
            .map(|p| (p.id, p.extruder.get(), p.source_object_id))
            .collect();
        assert_eq!(parts, vec![(1, 1, 1), (2, 2, 2)]);
        assert_eq!(docs.settings.plates[0].instances[0].object_id, 3);
        assert_eq!(docs.settings.assemble[0].object_id, 3);
    }

    #[test]
    fn test_single_object_is_top_level() {
        let merged = merge(vec![
            MergeInput::new(
                strip(4, 0.0),
                SourceRegion::new("base", "Base", ext(1)).with_extent(ZInterval::new(0.0, 2.0)),
            ),
            MergeInput::new(
                strip(2, 0.0),
                SourceRegion::new("text", "Text", ext(2)).with_extent(ZInterval::new(2.0, 3.2)),
            )
            .with_z_offset(2.0),
        ]);
        let assignment = assign_by_height_band(merged, "Ada Lovelace").unwrap();
        let docs = build_documents(&assignment, &options()).unwrap();

        assert_eq!(docs.model.resources.objects.len(), 1);
        assert_eq!(docs.model.build.items[0].objectid, 1);
        let parts = &docs.settings.objects[0].parts;
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.source_object_id == 1));
        assert_eq!(parts[0].paint, Some(ZInterval::new(0.0, 2.0)));
    }

    #[test]
    fn test_metadata_entries() {
        let docs = build_documents(&separate(), &options()).unwrap();
        assert_eq!(docs.model.metadata_value("Application"), Some(DEFAULT_APPLICATION));
        assert_eq!(docs.model.metadata_value(VENDOR_VERSION_KEY), Some("1"));
        assert_eq!(docs.model.metadata_value("CreationDate"), Some("2024-03-09"));
        assert_eq!(docs.model.metadata_value("Title"), Some("Ada Lovelace"));
    }

    #[test]
    fn test_painted_mesh_gets_material_group() {
        let mut mesh = strip(2, 0.0);
        mesh.append(&strip(1, 2.5));
        let bands = HeightBands::new(vec![
            Band::new(ZInterval::new(0.0, 2.0), ext(1), "Base"),
            Band::new(ZInterval::new(2.0, 3.2), ext(2), "Text"),
        ])
        .unwrap();
        let assignment = assign_by_geometry(mesh, &bands, "Ada");
        let docs = build_documents(&assignment, &options()).unwrap();

        let group = &docs.model.resources.base_material_groups[0];
        assert_eq!(group.id, 2);
        assert_eq!(group.materials.len(), 2);
        assert_eq!(group.materials[1].displaycolor, DEFAULT_PALETTE[1]);

        let object = &docs.model.resources.objects[0];
        assert_eq!(object.pid, Some(2));
        let slots: Vec<Option<usize>> = object
            .mesh
            .as_ref()
            .unwrap()
            .triangles
            .iter()
            .map(|t| t.p1)
            .collect();
        assert_eq!(slots, vec![Some(0), Some(0), Some(1)]);
    }

    #[test]
    fn test_empty_assignment_rejected() {
        let assignment = assign_by_object(Vec::new());
        assert!(matches!(
            build_documents(&assignment, &options()),
            Err(Error::InvalidModel(_))
        ));
    }

    #[test]
    fn test_empty_mesh_flows_through() {
        let assignment = assign_by_object(vec![MergeInput::new(
            Mesh::new(),
            SourceRegion::new("base", "Base", ext(1)),
        )]);
        let docs = build_documents(&assignment, &options()).unwrap();
        assert_eq!(docs.model.resources.objects[0].mesh.as_ref().unwrap().triangle_count(), 0);
    }

    #[test]
    fn test_part_with_unknown_source_is_dangling() {
        let mut assignment = separate();
        assignment.parts[1].source_index = 5;
        assert!(matches!(
            build_documents(&assignment, &options()),
            Err(Error::DanglingReference(_))
        ));
    }

    #[test]
    fn test_attachment_registered() {
        let options = options().with_attachment(
            Attachment::new("/Metadata/plate_1.png", vec![0x89, b'P', b'N', b'G'])
                .with_relationship(crate::opc::THUMBNAIL_REL_TYPE),
        );
        let docs = build_documents(&separate(), &options).unwrap();
        assert_eq!(docs.content_types.content_type("png"), Some("image/png"));
        assert_eq!(docs.relationships.entries().len(), 2);
        assert_eq!(docs.attachments[0].path, "Metadata/plate_1.png");
    }
}
