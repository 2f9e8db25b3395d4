//! Writing `Metadata/model_settings.config`
//!
//! The slicer reads settings as `<metadata key=".." value=".."/>` pairs, so
//! unlike the model document the free text here lives in attribute values.

use std::io::Write as IoWrite;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};

use crate::error::{Error, Result};
use crate::model::{
    AssembleItem, NORMAL_PART, Plate, SettingsDocument, SettingsObject, SettingsPart, TextInfo,
    ZInterval,
};

/// Boldness weight the slicer records for bold text
const BOLD_WEIGHT: &str = "109";

/// Write the settings document
pub fn write_settings_xml<W: IoWrite>(settings: &SettingsDocument, writer: W) -> Result<()> {
    let mut xml_writer = Writer::new_with_indent(writer, b' ', 1);

    xml_writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| Error::xml_write(format!("Failed to write XML declaration: {}", e)))?;

    xml_writer
        .write_event(Event::Start(BytesStart::new("config")))
        .map_err(|e| Error::xml_write(format!("Failed to write config element: {}", e)))?;

    for object in &settings.objects {
        write_object(&mut xml_writer, object)?;
    }

    for plate in &settings.plates {
        write_plate(&mut xml_writer, plate)?;
    }

    if !settings.assemble.is_empty() {
        write_assemble(&mut xml_writer, &settings.assemble)?;
    }

    xml_writer
        .write_event(Event::End(BytesEnd::new("config")))
        .map_err(|e| Error::xml_write(format!("Failed to close config element: {}", e)))?;

    Ok(())
}

/// Write the settings document to a string
pub fn settings_to_string(settings: &SettingsDocument) -> Result<String> {
    let mut buffer = Vec::new();
    write_settings_xml(settings, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| Error::xml_write(e.to_string()))
}

fn write_key_value<W: IoWrite>(writer: &mut Writer<W>, key: &str, value: &str) -> Result<()> {
    let mut elem = BytesStart::new("metadata");
    elem.push_attribute(("key", key));
    elem.push_attribute(("value", value));
    writer
        .write_event(Event::Empty(elem))
        .map_err(|e| Error::xml_write(format!("Failed to write metadata '{}': {}", key, e)))?;
    Ok(())
}

fn write_object<W: IoWrite>(writer: &mut Writer<W>, object: &SettingsObject) -> Result<()> {
    let mut elem = BytesStart::new("object");
    elem.push_attribute(("id", object.id.to_string().as_str()));
    writer
        .write_event(Event::Start(elem))
        .map_err(|e| Error::xml_write(format!("Failed to write settings object: {}", e)))?;

    write_key_value(writer, "name", &object.name)?;
    write_key_value(writer, "extruder", &object.extruder.to_string())?;

    for part in &object.parts {
        write_part(writer, part)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("object")))
        .map_err(|e| Error::xml_write(format!("Failed to close settings object: {}", e)))?;
    Ok(())
}

fn write_part<W: IoWrite>(writer: &mut Writer<W>, part: &SettingsPart) -> Result<()> {
    let mut elem = BytesStart::new("part");
    elem.push_attribute(("id", part.id.to_string().as_str()));
    elem.push_attribute(("subtype", NORMAL_PART));
    writer
        .write_event(Event::Start(elem))
        .map_err(|e| Error::xml_write(format!("Failed to write part element: {}", e)))?;

    write_key_value(writer, "name", &part.name)?;
    write_key_value(writer, "extruder", &part.extruder.to_string())?;
    write_key_value(writer, "matrix", &part.matrix.matrix4_string())?;
    write_key_value(writer, "source_object_id", &part.source_object_id.to_string())?;

    if let Some(ref text) = part.text {
        write_text_info(writer, text)?;
    }

    if let Some(band) = part.paint {
        write_paint(writer, &part.extruder.to_string(), &band)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("part")))
        .map_err(|e| Error::xml_write(format!("Failed to close part element: {}", e)))?;
    Ok(())
}

fn write_text_info<W: IoWrite>(writer: &mut Writer<W>, text: &TextInfo) -> Result<()> {
    let mut elem = BytesStart::new("text_info");
    elem.push_attribute(("text", text.text.as_str()));
    elem.push_attribute(("font_name", text.font_name.as_str()));
    elem.push_attribute(("style_name", text.style_name.as_str()));
    elem.push_attribute(("boldness", if text.is_bold() { BOLD_WEIGHT } else { "0" }));
    elem.push_attribute(("font_size", text.font_size.to_string().as_str()));
    elem.push_attribute(("thickness", text.thickness.to_string().as_str()));
    elem.push_attribute(("bold", if text.is_bold() { "1" } else { "0" }));
    elem.push_attribute(("italic", if text.is_italic() { "1" } else { "0" }));
    writer
        .write_event(Event::Empty(elem))
        .map_err(|e| Error::xml_write(format!("Failed to write text_info: {}", e)))?;
    Ok(())
}

fn write_paint<W: IoWrite>(writer: &mut Writer<W>, extruder: &str, band: &ZInterval) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("paint")))
        .map_err(|e| Error::xml_write(format!("Failed to write paint element: {}", e)))?;

    write_key_value(writer, "extruder", extruder)?;
    write_key_value(writer, "height_range_low", &band.low.to_string())?;
    write_key_value(writer, "height_range_high", &band.high.to_string())?;

    writer
        .write_event(Event::End(BytesEnd::new("paint")))
        .map_err(|e| Error::xml_write(format!("Failed to close paint element: {}", e)))?;
    Ok(())
}

fn write_plate<W: IoWrite>(writer: &mut Writer<W>, plate: &Plate) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("plate")))
        .map_err(|e| Error::xml_write(format!("Failed to write plate element: {}", e)))?;

    write_key_value(writer, "plater_id", &plate.plater_id.to_string())?;

    for instance in &plate.instances {
        writer
            .write_event(Event::Start(BytesStart::new("model_instance")))
            .map_err(|e| Error::xml_write(format!("Failed to write model_instance: {}", e)))?;
        write_key_value(writer, "object_id", &instance.object_id.to_string())?;
        write_key_value(writer, "instance_id", &instance.instance_id.to_string())?;
        writer
            .write_event(Event::End(BytesEnd::new("model_instance")))
            .map_err(|e| Error::xml_write(format!("Failed to close model_instance: {}", e)))?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("plate")))
        .map_err(|e| Error::xml_write(format!("Failed to close plate element: {}", e)))?;
    Ok(())
}

fn write_assemble<W: IoWrite>(writer: &mut Writer<W>, items: &[AssembleItem]) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("assemble")))
        .map_err(|e| Error::xml_write(format!("Failed to write assemble element: {}", e)))?;

    for item in items {
        let offset = item
            .offset
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        let mut elem = BytesStart::new("assemble_item");
        elem.push_attribute(("object_id", item.object_id.to_string().as_str()));
        elem.push_attribute(("instance_id", item.instance_id.to_string().as_str()));
        elem.push_attribute(("transform", item.transform.to_string().as_str()));
        elem.push_attribute(("offset", offset.as_str()));
        writer
            .write_event(Event::Empty(elem))
            .map_err(|e| Error::xml_write(format!("Failed to write assemble_item: {}", e)))?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("assemble")))
        .map_err(|e| Error::xml_write(format!("Failed to close assemble element: {}", e)))?;
    Ok(())
}
