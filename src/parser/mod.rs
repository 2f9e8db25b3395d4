//! Reading packaged documents back
//!
//! Used to inspect produced archives and to check that packaging
//! round-trips. The parsers accept exactly the profile the writers emit
//! and skip elements they do not know.

mod core;
mod material;
mod settings;

use std::io::{Read, Seek};

use quick_xml::Reader;
use quick_xml::events::{BytesRef, BytesStart, Event};

use crate::builder::{Attachment, DocumentSet};
use crate::error::{Error, Result};
use crate::model::{BaseMaterialGroup, Mesh, MetadataEntry, ModelDocument, Object};
use crate::opc::{CONTENT_TYPES_PATH, MODEL_PATH, Package, RELS_PATH, SETTINGS_PATH};

pub(crate) use material::parse_color;
pub use settings::parse_settings_xml;

/// Default buffer capacity for XML parsing (4KB)
const XML_BUFFER_CAPACITY: usize = 4096;

/// Value of an attribute matched by local name, unescaped
pub(crate) fn xml_attribute(e: &BytesStart, name: &str) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() != name.as_bytes() {
            continue;
        }
        let raw = std::str::from_utf8(&attr.value).map_err(|e| Error::InvalidXml(e.to_string()))?;
        let value =
            quick_xml::escape::unescape(raw).map_err(|e| Error::InvalidXml(e.to_string()))?;
        return Ok(Some(value.into_owned()));
    }
    Ok(None)
}

/// Attribute that must be present
pub(crate) fn required_attribute(e: &BytesStart, name: &str, element: &str) -> Result<String> {
    xml_attribute(e, name)?.ok_or_else(|| {
        Error::InvalidXml(format!("{} element missing {} attribute", element, name))
    })
}

/// Text of an entity or character reference inside element text
pub(crate) fn resolve_reference(r: &BytesRef) -> Result<String> {
    if let Some(ch) = r
        .resolve_char_ref()
        .map_err(|e| Error::InvalidXml(e.to_string()))?
    {
        return Ok(ch.to_string());
    }
    let name = r.decode().map_err(|e| Error::InvalidXml(e.to_string()))?;
    quick_xml::escape::resolve_predefined_entity(&name)
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidXml(format!("Unknown entity '&{};'", name)))
}

/// Parse the 3D model document
pub fn parse_model_xml(xml: &str) -> Result<ModelDocument> {
    // text is not trimmed: metadata values keep spaces around entity references
    let mut reader = Reader::from_str(xml);

    let mut model = ModelDocument::new();
    let mut buf = Vec::with_capacity(XML_BUFFER_CAPACITY);
    let mut saw_model = false;
    let mut current_metadata: Option<MetadataEntry> = None;
    let mut current_object: Option<Object> = None;
    let mut current_mesh: Option<Mesh> = None;
    let mut current_group: Option<BaseMaterialGroup> = None;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        let is_empty = matches!(event, Event::Empty(_));

        match event {
            Event::DocType(_) => {
                return Err(Error::InvalidXml(
                    "DTD declarations are not allowed".to_string(),
                ));
            }
            Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                b"model" => {
                    saw_model = true;
                    if let Some(unit) = xml_attribute(e, "unit")? {
                        model.unit = unit;
                    }
                }
                b"metadata" => {
                    let entry = MetadataEntry::new(required_attribute(e, "name", "metadata")?, "");
                    if is_empty {
                        model.metadata.push(entry);
                    } else {
                        current_metadata = Some(entry);
                    }
                }
                b"basematerials" => {
                    let group = material::parse_basematerials_start(e)?;
                    if is_empty {
                        model.resources.base_material_groups.push(group);
                    } else {
                        current_group = Some(group);
                    }
                }
                b"base" => {
                    let group = current_group.as_mut().ok_or_else(|| {
                        Error::InvalidXml("base element outside basematerials".to_string())
                    })?;
                    group.materials.push(material::parse_base_material(e)?);
                }
                b"object" => {
                    let object = core::parse_object(e)?;
                    if is_empty {
                        model.resources.objects.push(object);
                    } else {
                        current_object = Some(object);
                    }
                }
                b"mesh" => {
                    if current_object.is_none() {
                        return Err(Error::InvalidXml("mesh element outside object".to_string()));
                    }
                    let mesh = Mesh::new();
                    if is_empty {
                        if let Some(ref mut object) = current_object {
                            object.mesh = Some(mesh);
                        }
                    } else {
                        current_mesh = Some(mesh);
                    }
                }
                b"vertex" => {
                    let mesh = current_mesh.as_mut().ok_or_else(|| {
                        Error::InvalidXml("vertex element outside mesh".to_string())
                    })?;
                    mesh.vertices.push(core::parse_vertex(e)?);
                }
                b"triangle" => {
                    let mesh = current_mesh.as_mut().ok_or_else(|| {
                        Error::InvalidXml("triangle element outside mesh".to_string())
                    })?;
                    mesh.triangles.push(core::parse_triangle(e)?);
                }
                b"component" => {
                    let object = current_object.as_mut().ok_or_else(|| {
                        Error::InvalidXml("component element outside object".to_string())
                    })?;
                    object.components.push(core::parse_component(e)?);
                }
                b"item" => {
                    model.build.items.push(core::parse_build_item(e)?);
                }
                _ => {}
            },
            Event::Text(ref t) => {
                if let Some(ref mut entry) = current_metadata {
                    let text = t.decode().map_err(|e| Error::InvalidXml(e.to_string()))?;
                    entry.value.push_str(&text);
                }
            }
            Event::GeneralRef(ref r) => {
                if let Some(ref mut entry) = current_metadata {
                    entry.value.push_str(&resolve_reference(r)?);
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"metadata" => {
                    if let Some(entry) = current_metadata.take() {
                        model.metadata.push(entry);
                    }
                }
                b"basematerials" => {
                    if let Some(group) = current_group.take() {
                        model.resources.base_material_groups.push(group);
                    }
                }
                b"mesh" => {
                    if let (Some(object), Some(mesh)) = (current_object.as_mut(), current_mesh.take())
                    {
                        object.mesh = Some(mesh);
                    }
                }
                b"object" => {
                    if let Some(object) = current_object.take() {
                        model.resources.objects.push(object);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_model {
        return Err(Error::InvalidXml("Document has no model element".to_string()));
    }

    Ok(model)
}

/// Read every document of a packaged archive
///
/// Parts other than the four fixed documents come back as attachments,
/// with their package relationship type when one targets them. The
/// result is not validated; pass it to
/// [`validate_documents`](crate::validator::validate_documents) to check
/// cross-references.
pub fn read_documents<R: Read + Seek>(reader: R) -> Result<DocumentSet> {
    let mut package = Package::open(reader)?;

    let model = parse_model_xml(&package.model_xml()?)?;
    let settings = match package.settings_xml()? {
        Some(xml) => parse_settings_xml(&xml)?,
        None => Default::default(),
    };

    let model_path = package.model_path().to_string();
    let mut attachments = Vec::new();
    for name in package.part_names() {
        if name.ends_with('/')
            || name == CONTENT_TYPES_PATH
            || name == RELS_PATH
            || name == SETTINGS_PATH
            || name == model_path
            || name == MODEL_PATH
        {
            continue;
        }
        let data = package.read_part_binary(&name)?;
        let rel_type = package
            .relationships()
            .entries()
            .iter()
            .find(|r| r.part_name() == name)
            .map(|r| r.rel_type.clone());
        attachments.push(Attachment {
            path: name,
            data,
            rel_type,
        });
    }

    Ok(DocumentSet {
        content_types: package.content_types().clone(),
        relationships: package.relationships().clone(),
        model,
        settings,
        attachments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Transform;

    const MODEL: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<model unit="millimeter" xml:lang="en-US" xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02" xmlns:BambuStudio="http://schemas.bambulab.com/package/2021">
 <metadata name="Title">Zoë &amp; Bob</metadata>
 <metadata name="BambuStudio:3mfVersion">1</metadata>
 <resources>
  <basematerials id="3">
   <base name="Extruder 1" displaycolor="#FF0000FF"/>
  </basematerials>
  <object id="1" type="model" name="Base" pid="3" pindex="0">
   <mesh>
    <vertices>
     <vertex x="0" y="0" z="0"/>
     <vertex x="10.5" y="0" z="0"/>
     <vertex x="0" y="5" z="2.25"/>
    </vertices>
    <triangles>
     <triangle v1="0" v2="1" v3="2" pid="3" p1="0"/>
    </triangles>
   </mesh>
  </object>
  <object id="2" type="model">
   <components>
    <component objectid="1" transform="1 0 0 0 1 0 0 0 1 0 0 2"/>
   </components>
  </object>
 </resources>
 <build>
  <item objectid="2" transform="1 0 0 0 1 0 0 0 1 0 0 0" printable="1"/>
 </build>
</model>"##;

    #[test]
    fn test_parse_model() {
        let model = parse_model_xml(MODEL).unwrap();
        assert_eq!(model.unit, "millimeter");
        assert_eq!(model.metadata_value("Title"), Some("Zoë & Bob"));
        assert_eq!(model.metadata_value("BambuStudio:3mfVersion"), Some("1"));

        assert_eq!(model.resources.objects.len(), 2);
        let base = &model.resources.objects[0];
        assert_eq!(base.name.as_deref(), Some("Base"));
        assert_eq!((base.pid, base.pindex), (Some(3), Some(0)));
        let mesh = base.mesh.as_ref().unwrap();
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.vertices[1].x, 10.5);
        assert_eq!(mesh.triangles[0].indices(), [0, 1, 2]);
        assert_eq!(mesh.triangles[0].p1, Some(0));

        let composite = &model.resources.objects[1];
        assert!(composite.mesh.is_none());
        assert_eq!(composite.components[0].objectid, 1);
        assert_eq!(
            composite.components[0].transform,
            Transform::translation(0.0, 0.0, 2.0)
        );

        let group = &model.resources.base_material_groups[0];
        assert_eq!(group.id, 3);
        assert_eq!(group.materials[0].displaycolor, (255, 0, 0, 255));

        assert_eq!(model.build.items.len(), 1);
        assert_eq!(model.build.items[0].objectid, 2);
        assert_eq!(model.build.items[0].printable, Some(true));
    }

    #[test]
    fn test_round_trip_through_writer() {
        let model = parse_model_xml(MODEL).unwrap();
        let xml = crate::writer::model_to_string(&model).unwrap();
        assert_eq!(parse_model_xml(&xml).unwrap(), model);
    }

    #[test]
    fn test_metadata_text_around_references() {
        let xml = r#"<model unit="millimeter" xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02">
 <metadata name="Title">Ada &lt;3 &#71;race &amp; co</metadata>
 <resources/>
 <build/>
</model>"#;
        let model = parse_model_xml(xml).unwrap();
        assert_eq!(model.metadata_value("Title"), Some("Ada <3 Grace & co"));
    }

    #[test]
    fn test_rejects_doctype() {
        let xml = r#"<?xml version="1.0"?><!DOCTYPE model><model/>"#;
        assert!(matches!(parse_model_xml(xml), Err(Error::InvalidXml(_))));
    }

    #[test]
    fn test_requires_model_element() {
        let xml = r#"<?xml version="1.0"?><config/>"#;
        assert!(matches!(parse_model_xml(xml), Err(Error::InvalidXml(_))));
    }

    #[test]
    fn test_vertex_outside_mesh() {
        let xml = r#"<model><resources><vertex x="0" y="0" z="0"/></resources></model>"#;
        assert!(parse_model_xml(xml).is_err());
    }
}
