//! XML writing for the model and settings documents
//!
//! Names and other free text go into element text wherever the format
//! has an element for them; attribute values are escaped by the writer.

mod core;
mod material;
mod settings;

use std::io::Write as IoWrite;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::{Error, Result};
use crate::model::{CORE_NAMESPACE, MetadataEntry, ModelDocument, Resources, VENDOR_NAMESPACE};

pub use settings::{settings_to_string, write_settings_xml};

/// Vendor namespace prefix used by metadata keys such as `BambuStudio:3mfVersion`
pub const VENDOR_PREFIX: &str = "BambuStudio";

/// Write the model document
///
/// This generates the `3D/3dmodel.model` part.
pub fn write_model_xml<W: IoWrite>(model: &ModelDocument, writer: W) -> Result<()> {
    let mut xml_writer = Writer::new_with_indent(writer, b' ', 1);

    xml_writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| Error::xml_write(format!("Failed to write XML declaration: {}", e)))?;

    let vendor_ns_attr = format!("xmlns:{}", VENDOR_PREFIX);
    let mut model_elem = BytesStart::new("model");
    model_elem.push_attribute(("unit", model.unit.as_str()));
    model_elem.push_attribute(("xml:lang", "en-US"));
    model_elem.push_attribute(("xmlns", CORE_NAMESPACE));
    model_elem.push_attribute((vendor_ns_attr.as_str(), VENDOR_NAMESPACE));

    xml_writer
        .write_event(Event::Start(model_elem))
        .map_err(|e| Error::xml_write(format!("Failed to write model element: {}", e)))?;

    for entry in &model.metadata {
        write_metadata(&mut xml_writer, entry)?;
    }

    write_resources(&mut xml_writer, &model.resources)?;
    core::write_build(&mut xml_writer, &model.build)?;

    xml_writer
        .write_event(Event::End(BytesEnd::new("model")))
        .map_err(|e| Error::xml_write(format!("Failed to close model element: {}", e)))?;

    Ok(())
}

/// Write the model document to a string
pub fn model_to_string(model: &ModelDocument) -> Result<String> {
    let mut buffer = Vec::new();
    write_model_xml(model, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| Error::xml_write(e.to_string()))
}

/// Write a metadata entry with its value as element text
fn write_metadata<W: IoWrite>(writer: &mut Writer<W>, entry: &MetadataEntry) -> Result<()> {
    let mut elem = BytesStart::new("metadata");
    elem.push_attribute(("name", entry.name.as_str()));

    writer
        .write_event(Event::Start(elem))
        .map_err(|e| Error::xml_write(format!("Failed to write metadata element: {}", e)))?;

    writer
        .write_event(Event::Text(BytesText::new(&entry.value)))
        .map_err(|e| Error::xml_write(format!("Failed to write metadata value: {}", e)))?;

    writer
        .write_event(Event::End(BytesEnd::new("metadata")))
        .map_err(|e| Error::xml_write(format!("Failed to close metadata element: {}", e)))?;

    Ok(())
}

/// Write the resources section; property groups precede the objects using them
fn write_resources<W: IoWrite>(writer: &mut Writer<W>, resources: &Resources) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("resources")))
        .map_err(|e| Error::xml_write(format!("Failed to write resources element: {}", e)))?;

    for group in &resources.base_material_groups {
        material::write_base_material_group(writer, group)?;
    }

    for object in &resources.objects {
        core::write_object(writer, object)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("resources")))
        .map_err(|e| Error::xml_write(format!("Failed to close resources element: {}", e)))?;

    Ok(())
}
