//! Parsing `Metadata/model_settings.config`

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};
use crate::model::{
    AssembleItem, Extruder, ModelInstance, Plate, SettingsDocument, SettingsObject, SettingsPart,
    TextInfo, Transform, ZInterval,
};

use super::core::parse_transform;
use super::{XML_BUFFER_CAPACITY, required_attribute, xml_attribute};

/// Part fields collected until `</part>`
struct PartState {
    id: u32,
    name: String,
    extruder: Extruder,
    matrix: Transform,
    source_object_id: Option<u32>,
    text: Option<TextInfo>,
    paint: Option<ZInterval>,
}

/// Paint fields collected until `</paint>`
#[derive(Default)]
struct PaintState {
    low: Option<f64>,
    high: Option<f64>,
}

fn parse_extruder(value: &str) -> Result<Extruder> {
    let index = value.parse::<u8>()?;
    Extruder::new(index)
        .ok_or_else(|| Error::InvalidXml(format!("Extruder index must be positive (got {})", index)))
}

fn parse_matrix(value: &str) -> Result<Transform> {
    let values = value
        .split_whitespace()
        .map(|v| v.parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let matrix: [f64; 16] = values.as_slice().try_into().map_err(|_| {
        Error::InvalidXml(format!("Part matrix must have 16 values (got {})", values.len()))
    })?;
    Transform::from_matrix4(&matrix)
        .ok_or_else(|| Error::InvalidXml(format!("Part matrix is not affine: '{}'", value)))
}

fn parse_text_info(e: &BytesStart) -> Result<TextInfo> {
    let number = |name: &str| -> Result<f64> {
        Ok(xml_attribute(e, name)?
            .map(|v| v.parse::<f64>())
            .transpose()?
            .unwrap_or(0.0))
    };
    Ok(TextInfo {
        text: required_attribute(e, "text", "text_info")?,
        font_name: xml_attribute(e, "font_name")?.unwrap_or_default(),
        style_name: xml_attribute(e, "style_name")?.unwrap_or_default(),
        font_size: number("font_size")?,
        thickness: number("thickness")?,
    })
}

fn parse_offset(value: &str) -> Result<[f64; 3]> {
    let values = value
        .split_whitespace()
        .map(|v| v.parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    values.as_slice().try_into().map_err(|_| {
        Error::InvalidXml(format!("Offset must have 3 values (got {})", values.len()))
    })
}

/// Parse the settings document
pub fn parse_settings_xml(xml: &str) -> Result<SettingsDocument> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut settings = SettingsDocument::new();
    let mut buf = Vec::with_capacity(XML_BUFFER_CAPACITY);
    let mut saw_config = false;
    let mut current_object: Option<SettingsObject> = None;
    let mut current_part: Option<PartState> = None;
    let mut current_paint: Option<PaintState> = None;
    let mut current_plate: Option<Plate> = None;
    let mut current_instance: Option<ModelInstance> = None;

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
                b"config" => saw_config = true,
                b"object" => {
                    let object = SettingsObject {
                        id: required_attribute(e, "id", "object")?.parse::<u32>()?,
                        name: String::new(),
                        extruder: Extruder::FIRST,
                        parts: Vec::new(),
                    };
                    if is_empty {
                        settings.objects.push(object);
                    } else {
                        current_object = Some(object);
                    }
                }
                b"part" => {
                    if current_object.is_none() {
                        return Err(Error::InvalidXml("part element outside object".to_string()));
                    }
                    current_part = Some(PartState {
                        id: required_attribute(e, "id", "part")?.parse::<u32>()?,
                        name: String::new(),
                        extruder: Extruder::FIRST,
                        matrix: Transform::IDENTITY,
                        source_object_id: None,
                        text: None,
                        paint: None,
                    });
                    if is_empty {
                        return Err(Error::InvalidXml(
                            "part element has no source_object_id".to_string(),
                        ));
                    }
                }
                b"text_info" => {
                    let part = current_part.as_mut().ok_or_else(|| {
                        Error::InvalidXml("text_info element outside part".to_string())
                    })?;
                    part.text = Some(parse_text_info(e)?);
                }
                b"paint" => {
                    if current_part.is_none() {
                        return Err(Error::InvalidXml("paint element outside part".to_string()));
                    }
                    if is_empty {
                        return Err(Error::InvalidXml(
                            "paint element has no height range".to_string(),
                        ));
                    }
                    current_paint = Some(PaintState::default());
                }
                b"plate" => {
                    let plate = Plate {
                        plater_id: 0,
                        instances: Vec::new(),
                    };
                    if is_empty {
                        settings.plates.push(plate);
                    } else {
                        current_plate = Some(plate);
                    }
                }
                b"model_instance" => {
                    if current_plate.is_none() {
                        return Err(Error::InvalidXml(
                            "model_instance element outside plate".to_string(),
                        ));
                    }
                    if !is_empty {
                        current_instance = Some(ModelInstance {
                            object_id: 0,
                            instance_id: 0,
                        });
                    }
                }
                b"assemble_item" => {
                    settings.assemble.push(AssembleItem {
                        object_id: required_attribute(e, "object_id", "assemble_item")?
                            .parse::<u32>()?,
                        instance_id: xml_attribute(e, "instance_id")?
                            .map(|v| v.parse::<u32>())
                            .transpose()?
                            .unwrap_or(0),
                        transform: match xml_attribute(e, "transform")? {
                            Some(value) => parse_transform(&value)?,
                            None => Transform::IDENTITY,
                        },
                        offset: match xml_attribute(e, "offset")? {
                            Some(value) => parse_offset(&value)?,
                            None => [0.0; 3],
                        },
                    });
                }
                b"metadata" => {
                    let key = required_attribute(e, "key", "metadata")?;
                    let value = xml_attribute(e, "value")?.unwrap_or_default();

                    // innermost open element owns the entry
                    if let Some(ref mut paint) = current_paint {
                        match key.as_str() {
                            "height_range_low" => paint.low = Some(value.parse::<f64>()?),
                            "height_range_high" => paint.high = Some(value.parse::<f64>()?),
                            _ => {}
                        }
                    } else if let Some(ref mut part) = current_part {
                        match key.as_str() {
                            "name" => part.name = value,
                            "extruder" => part.extruder = parse_extruder(&value)?,
                            "matrix" => part.matrix = parse_matrix(&value)?,
                            "source_object_id" => {
                                part.source_object_id = Some(value.parse::<u32>()?)
                            }
                            _ => {}
                        }
                    } else if let Some(ref mut object) = current_object {
                        match key.as_str() {
                            "name" => object.name = value,
                            "extruder" => object.extruder = parse_extruder(&value)?,
                            _ => {}
                        }
                    } else if let Some(ref mut instance) = current_instance {
                        match key.as_str() {
                            "object_id" => instance.object_id = value.parse::<u32>()?,
                            "instance_id" => instance.instance_id = value.parse::<u32>()?,
                            _ => {}
                        }
                    } else if let Some(ref mut plate) = current_plate {
                        if key == "plater_id" {
                            plate.plater_id = value.parse::<u32>()?;
                        }
                    }
                }
                _ => {}
            },
            Event::End(ref e) => match e.local_name().as_ref() {
                b"paint" => {
                    if let (Some(paint), Some(part)) = (current_paint.take(), current_part.as_mut())
                    {
                        let (Some(low), Some(high)) = (paint.low, paint.high) else {
                            return Err(Error::InvalidXml(format!(
                                "Paint of part {} is missing its height range",
                                part.id
                            )));
                        };
                        part.paint = Some(ZInterval::new(low, high));
                    }
                }
                b"part" => {
                    if let (Some(part), Some(object)) = (current_part.take(), current_object.as_mut())
                    {
                        let source_object_id = part.source_object_id.ok_or_else(|| {
                            Error::InvalidXml(format!("Part {} has no source_object_id", part.id))
                        })?;
                        object.parts.push(SettingsPart {
                            id: part.id,
                            name: part.name,
                            extruder: part.extruder,
                            matrix: part.matrix,
                            source_object_id,
                            paint: part.paint,
                            text: part.text,
                        });
                    }
                }
                b"object" => {
                    if let Some(object) = current_object.take() {
                        settings.objects.push(object);
                    }
                }
                b"model_instance" => {
                    if let (Some(instance), Some(plate)) =
                        (current_instance.take(), current_plate.as_mut())
                    {
                        plate.instances.push(instance);
                    }
                }
                b"plate" => {
                    if let Some(plate) = current_plate.take() {
                        settings.plates.push(plate);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_config {
        return Err(Error::InvalidXml(
            "Settings document has no config element".to_string(),
        ));
    }

    Ok(settings)
}
