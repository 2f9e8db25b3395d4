//! Referential integrity checks run before anything is serialized
//!
//! The documents of one archive cross-reference each other by object ID.
//! A dangling ID produces an archive the slicer silently refuses to open,
//! so every reference is resolved here and a broken one is reported as
//! [`Error::DanglingReference`] before any bytes are written.

use std::collections::HashSet;

use crate::builder::DocumentSet;
use crate::error::{Error, Result};
use crate::model::{ModelDocument, SettingsDocument};
use crate::opc::{CONTENT_TYPES_PATH, MODEL_PATH, RELS_PATH, SETTINGS_PATH};

/// Validate a complete document set
pub fn validate_documents(documents: &DocumentSet) -> Result<()> {
    validate_model(&documents.model)?;
    validate_settings_references(&documents.model, &documents.settings)?;
    validate_package_parts(documents)?;
    Ok(())
}

/// Validate the model document on its own
pub fn validate_model(model: &ModelDocument) -> Result<()> {
    validate_object_ids(model)?;
    validate_mesh_geometry(model)?;
    validate_material_references(model)?;
    validate_component_references(model)?;
    validate_build_references(model)?;
    Ok(())
}

/// Object and property group IDs are positive and unique in the shared ID space
pub(crate) fn validate_object_ids(model: &ModelDocument) -> Result<()> {
    let mut seen_ids = HashSet::new();

    let resource_ids = model
        .resources
        .base_material_groups
        .iter()
        .map(|g| ("Base material group", g.id))
        .chain(model.resources.objects.iter().map(|o| ("Object", o.id)));

    for (kind, id) in resource_ids {
        if id == 0 {
            return Err(Error::InvalidModel(format!(
                "{} ID must be a positive integer (greater than 0)",
                kind
            )));
        }
        if !seen_ids.insert(id) {
            return Err(Error::InvalidModel(format!(
                "Duplicate resource ID found: {}. \
                 Objects and property groups share one ID space.",
                id
            )));
        }
    }

    Ok(())
}

/// Every object has either a mesh or components, and triangle indices are in bounds
pub(crate) fn validate_mesh_geometry(model: &ModelDocument) -> Result<()> {
    for object in &model.resources.objects {
        match (&object.mesh, object.components.is_empty()) {
            (Some(_), false) => {
                return Err(Error::InvalidModel(format!(
                    "Object {} has both a mesh and components",
                    object.id
                )));
            }
            (None, true) => {
                return Err(Error::InvalidModel(format!(
                    "Object {} has neither a mesh nor components",
                    object.id
                )));
            }
            _ => {}
        }

        let Some(mesh) = &object.mesh else {
            continue;
        };
        let num_vertices = mesh.vertices.len();
        for (tri_idx, triangle) in mesh.triangles.iter().enumerate() {
            if let Some(index) = triangle.indices().into_iter().find(|&i| i >= num_vertices) {
                return Err(Error::InvalidModel(format!(
                    "Object {}: Triangle {} vertex index {} is out of bounds \
                     (mesh has {} vertices). Triangle indices are local to their object.",
                    object.id, tri_idx, index, num_vertices
                )));
            }
        }
    }

    Ok(())
}

/// Property references on objects and triangles resolve to a group entry
pub(crate) fn validate_material_references(model: &ModelDocument) -> Result<()> {
    let group_ids: Vec<u32> = model
        .resources
        .base_material_groups
        .iter()
        .map(|g| g.id)
        .collect();
    let group_size = |pid: u32| {
        model
            .resources
            .base_material_groups
            .iter()
            .find(|g| g.id == pid)
            .map(|g| g.materials.len())
    };

    for object in &model.resources.objects {
        if object.is_composite() && (object.pid.is_some() || object.pindex.is_some()) {
            return Err(Error::InvalidModel(format!(
                "Object {} contains components and cannot carry pid or pindex",
                object.id
            )));
        }

        if let Some(pid) = object.pid {
            let size = group_size(pid).ok_or_else(|| {
                Error::DanglingReference(format!(
                    "Object {} pid {} names no property group. Available groups: {:?}",
                    object.id, pid, group_ids
                ))
            })?;
            if let Some(pindex) = object.pindex {
                if pindex >= size {
                    return Err(Error::InvalidModel(format!(
                        "Object {} pindex {} is out of range for group {} ({} entries)",
                        object.id, pindex, pid, size
                    )));
                }
            }
        }

        let Some(mesh) = &object.mesh else {
            continue;
        };
        for (tri_idx, triangle) in mesh.triangles.iter().enumerate() {
            let Some(pid) = triangle.pid.or(object.pid) else {
                if triangle.p1.is_some() {
                    return Err(Error::InvalidModel(format!(
                        "Object {}: Triangle {} has p1 but no property group",
                        object.id, tri_idx
                    )));
                }
                continue;
            };
            let size = group_size(pid).ok_or_else(|| {
                Error::DanglingReference(format!(
                    "Object {}: Triangle {} pid {} names no property group. Available groups: {:?}",
                    object.id, tri_idx, pid, group_ids
                ))
            })?;
            if let Some(p1) = triangle.p1 {
                if p1 >= size {
                    return Err(Error::InvalidModel(format!(
                        "Object {}: Triangle {} p1 {} is out of range for group {} ({} entries)",
                        object.id, tri_idx, p1, pid, size
                    )));
                }
            }
        }
    }

    Ok(())
}

/// Components resolve to existing objects and never form a cycle
pub(crate) fn validate_component_references(model: &ModelDocument) -> Result<()> {
    let available = object_ids(model);

    for object in &model.resources.objects {
        for component in &object.components {
            if !available.contains(&component.objectid) {
                return Err(Error::dangling_reference(
                    &format!("Object {} component", object.id),
                    component.objectid,
                    &available,
                ));
            }
        }
    }

    for object in &model.resources.objects {
        if object.is_composite() {
            let mut path = Vec::new();
            if let Some(cycle) = detect_circular_components(object.id, model, &mut path) {
                return Err(Error::InvalidModel(format!(
                    "Circular component reference: {}",
                    cycle
                        .iter()
                        .map(|id| id.to_string())
                        .collect::<Vec<_>>()
                        .join(" → ")
                )));
            }
        }
    }

    Ok(())
}

fn detect_circular_components(
    object_id: u32,
    model: &ModelDocument,
    path: &mut Vec<u32>,
) -> Option<Vec<u32>> {
    if let Some(cycle_start) = path.iter().position(|&id| id == object_id) {
        let mut cycle = path[cycle_start..].to_vec();
        cycle.push(object_id);
        return Some(cycle);
    }

    path.push(object_id);
    if let Some(object) = model.resources.object(object_id) {
        for component in &object.components {
            if let Some(cycle) = detect_circular_components(component.objectid, model, path) {
                return Some(cycle);
            }
        }
    }
    path.pop();
    None
}

/// Exactly one build item, referencing an existing object
pub(crate) fn validate_build_references(model: &ModelDocument) -> Result<()> {
    let available = object_ids(model);

    for (item_idx, item) in model.build.items.iter().enumerate() {
        if !available.contains(&item.objectid) {
            return Err(Error::dangling_reference(
                &format!("Build item {}", item_idx),
                item.objectid,
                &available,
            ));
        }
    }

    if model.build.items.len() != 1 {
        return Err(Error::InvalidModel(format!(
            "Expected exactly one build item, found {}",
            model.build.items.len()
        )));
    }

    Ok(())
}

/// Settings objects, parts, plates and assembly items resolve against the model
pub(crate) fn validate_settings_references(
    model: &ModelDocument,
    settings: &SettingsDocument,
) -> Result<()> {
    let available = object_ids(model);
    let resolve = |referrer: String, id: u32| -> Result<()> {
        if available.contains(&id) {
            Ok(())
        } else {
            Err(Error::dangling_reference(&referrer, id, &available))
        }
    };

    for object in &settings.objects {
        resolve(format!("Settings object '{}'", object.name), object.id)?;

        let mut part_ids = HashSet::new();
        for part in &object.parts {
            if !part_ids.insert(part.id) {
                return Err(Error::InvalidModel(format!(
                    "Settings object {} has duplicate part ID {}",
                    object.id, part.id
                )));
            }
            resolve(
                format!("Settings part '{}'", part.name),
                part.source_object_id,
            )?;
            let has_mesh = model
                .resources
                .object(part.source_object_id)
                .is_some_and(|o| o.mesh.is_some());
            if !has_mesh {
                return Err(Error::InvalidModel(format!(
                    "Settings part '{}' draws from object {}, which has no mesh",
                    part.name, part.source_object_id
                )));
            }
            if let Some(band) = part.paint {
                if !band.is_valid() {
                    return Err(Error::InvalidRegion(format!(
                        "Settings part '{}' has unusable paint band {}",
                        part.name, band
                    )));
                }
            }
        }
    }

    for plate in &settings.plates {
        for instance in &plate.instances {
            resolve(
                format!("Plate {} instance {}", plate.plater_id, instance.instance_id),
                instance.object_id,
            )?;
        }
    }

    for item in &settings.assemble {
        resolve(
            format!("Assembly item {}", item.instance_id),
            item.object_id,
        )?;
    }

    Ok(())
}

/// The package relationships and content types cover every part
pub(crate) fn validate_package_parts(documents: &DocumentSet) -> Result<()> {
    if documents.relationships.model_part().as_deref() != Some(MODEL_PATH) {
        return Err(Error::InvalidModel(format!(
            "Package relationships must point at /{}",
            MODEL_PATH
        )));
    }

    let reserved = [CONTENT_TYPES_PATH, RELS_PATH, MODEL_PATH, SETTINGS_PATH];
    let mut seen = HashSet::new();
    let parts = [RELS_PATH, MODEL_PATH, SETTINGS_PATH]
        .into_iter()
        .chain(documents.attachments.iter().map(|a| a.path.as_str()));

    for (index, path) in parts.enumerate() {
        // first three entries are the fixed documents
        if index >= 3 && (reserved.contains(&path) || !seen.insert(path)) {
            return Err(Error::InvalidModel(format!(
                "Payload path '{}' collides with another part",
                path
            )));
        }
        if documents.content_types.content_type_for_part(path).is_none() {
            return Err(Error::InvalidModel(format!(
                "Part '{}' has no registered content type",
                path
            )));
        }
    }

    for rel in documents.relationships.entries() {
        let target = rel.part_name();
        let exists = target == MODEL_PATH || documents.attachments.iter().any(|a| a.path == target);
        if !exists {
            return Err(Error::MissingFile(format!(
                "Relationship {} targets '{}', which is not in the package",
                rel.id, rel.target
            )));
        }
    }

    Ok(())
}

fn object_ids(model: &ModelDocument) -> Vec<u32> {
    let mut ids: Vec<u32> = model.resources.objects.iter().map(|o| o.id).collect();
    ids.sort_unstable();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        BaseMaterial, BaseMaterialGroup, BuildItem, Component, Mesh, Object, Triangle, Vertex,
    };

    fn triangle_mesh() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.push_facet([
            Vertex::new(0.0, 0.0, 0.0),
            Vertex::new(1.0, 0.0, 0.0),
            Vertex::new(0.0, 1.0, 0.0),
        ]);
        mesh
    }

    fn single_object_model() -> ModelDocument {
        let mut model = ModelDocument::new();
        model.resources.objects.push(Object::with_mesh(1, triangle_mesh()));
        model.build.items.push(BuildItem::new(1));
        model
    }

    #[test]
    fn test_valid_model_passes() {
        assert!(validate_model(&single_object_model()).is_ok());
    }

    #[test]
    fn test_build_item_to_missing_object() {
        let mut model = single_object_model();
        model.build.items[0].objectid = 42;
        let err = validate_model(&model).unwrap_err();
        assert!(matches!(err, Error::DanglingReference(_)), "got {:?}", err);
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_component_to_missing_object() {
        let mut model = single_object_model();
        let mut composite = Object::new(2);
        composite.components.push(Component::new(1));
        composite.components.push(Component::new(7));
        model.resources.objects.push(composite);
        model.build.items[0].objectid = 2;
        assert!(matches!(
            validate_model(&model),
            Err(Error::DanglingReference(_))
        ));
    }

    #[test]
    fn test_circular_components() {
        let mut model = single_object_model();
        let mut a = Object::new(2);
        a.components.push(Component::new(3));
        let mut b = Object::new(3);
        b.components.push(Component::new(2));
        model.resources.objects.push(a);
        model.resources.objects.push(b);
        let err = validate_model(&model).unwrap_err();
        assert!(err.to_string().contains("Circular"));
    }

    #[test]
    fn test_duplicate_ids_across_resources() {
        let mut model = single_object_model();
        model.resources.base_material_groups.push(BaseMaterialGroup::new(1));
        assert!(matches!(
            validate_object_ids(&model),
            Err(Error::InvalidModel(_))
        ));
    }

    #[test]
    fn test_triangle_index_out_of_bounds() {
        let mut model = single_object_model();
        if let Some(mesh) = model.resources.objects[0].mesh.as_mut() {
            mesh.triangles.push(Triangle::new(1, 2, 3));
        }
        let err = validate_model(&model).unwrap_err();
        assert!(err.to_string().contains("vertex index 3"));
    }

    #[test]
    fn test_exactly_one_build_item() {
        let mut model = single_object_model();
        model.build.items.push(BuildItem::new(1));
        assert!(matches!(
            validate_build_references(&model),
            Err(Error::InvalidModel(_))
        ));
        model.build.items.clear();
        assert!(validate_build_references(&model).is_err());
    }

    #[test]
    fn test_triangle_property_references() {
        let mut model = single_object_model();
        let mut group = BaseMaterialGroup::new(2);
        group.materials.push(BaseMaterial::new("Extruder 1".to_string(), (255, 255, 255, 255)));
        model.resources.base_material_groups.push(group);

        if let Some(mesh) = model.resources.objects[0].mesh.as_mut() {
            mesh.triangles[0].pid = Some(2);
            mesh.triangles[0].p1 = Some(0);
        }
        assert!(validate_material_references(&model).is_ok());

        if let Some(mesh) = model.resources.objects[0].mesh.as_mut() {
            mesh.triangles[0].p1 = Some(1);
        }
        assert!(validate_material_references(&model).is_err());

        if let Some(mesh) = model.resources.objects[0].mesh.as_mut() {
            mesh.triangles[0].pid = Some(9);
            mesh.triangles[0].p1 = Some(0);
        }
        assert!(matches!(
            validate_material_references(&model),
            Err(Error::DanglingReference(_))
        ));
    }
}
