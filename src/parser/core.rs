//! Core element parsing: objects, vertices, triangles, components and build items

use quick_xml::events::BytesStart;

use crate::error::{Error, Result};
use crate::model::{BuildItem, Component, Object, ObjectType, Transform, Triangle, Vertex};

use super::{required_attribute, xml_attribute};

/// Size of a 3MF transformation matrix (4x3 affine transform in row-major order)
const TRANSFORM_MATRIX_SIZE: usize = 12;

/// Parse a transform attribute value
pub(crate) fn parse_transform(value: &str) -> Result<Transform> {
    let values = value
        .split_whitespace()
        .map(|v| v.parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let matrix: [f64; TRANSFORM_MATRIX_SIZE] = values.as_slice().try_into().map_err(|_| {
        Error::InvalidXml(format!(
            "Transform must have {} values (got {})",
            TRANSFORM_MATRIX_SIZE,
            values.len()
        ))
    })?;

    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidXml(format!(
            "Transform contains a non-finite value: '{}'",
            value
        )));
    }

    Ok(Transform(matrix))
}

/// Parse object element attributes
pub(super) fn parse_object(e: &BytesStart) -> Result<Object> {
    let id = required_attribute(e, "id", "object")?.parse::<u32>()?;
    let mut object = Object::new(id);

    if let Some(object_type) = xml_attribute(e, "type")? {
        object.object_type = match object_type.as_str() {
            "model" => ObjectType::Model,
            _ => ObjectType::Other,
        };
    }
    object.name = xml_attribute(e, "name")?;
    object.pid = xml_attribute(e, "pid")?.map(|v| v.parse::<u32>()).transpose()?;
    object.pindex = xml_attribute(e, "pindex")?
        .map(|v| v.parse::<usize>())
        .transpose()?;

    Ok(object)
}

/// Parse vertex element attributes
pub(super) fn parse_vertex(e: &BytesStart) -> Result<Vertex> {
    let mut coordinates = [0.0f32; 3];
    for (slot, name) in coordinates.iter_mut().zip(["x", "y", "z"]) {
        let value = required_attribute(e, name, "vertex")?.parse::<f32>()?;
        if !value.is_finite() {
            return Err(Error::InvalidXml(format!(
                "Vertex {} coordinate must be finite (got {})",
                name, value
            )));
        }
        *slot = value;
    }
    let [x, y, z] = coordinates;
    Ok(Vertex::new(x, y, z))
}

/// Parse triangle element attributes
pub(super) fn parse_triangle(e: &BytesStart) -> Result<Triangle> {
    let index = |name: &str| -> Result<usize> {
        Ok(required_attribute(e, name, "triangle")?.parse::<usize>()?)
    };

    let mut triangle = Triangle::new(index("v1")?, index("v2")?, index("v3")?);
    triangle.pid = xml_attribute(e, "pid")?.map(|v| v.parse::<u32>()).transpose()?;
    triangle.p1 = xml_attribute(e, "p1")?.map(|v| v.parse::<usize>()).transpose()?;

    Ok(triangle)
}

/// Parse component element attributes
pub(super) fn parse_component(e: &BytesStart) -> Result<Component> {
    let objectid = required_attribute(e, "objectid", "component")?.parse::<u32>()?;
    let transform = match xml_attribute(e, "transform")? {
        Some(value) => parse_transform(&value)?,
        None => Transform::IDENTITY,
    };
    Ok(Component {
        objectid,
        transform,
    })
}

/// Parse build item element attributes
pub(super) fn parse_build_item(e: &BytesStart) -> Result<BuildItem> {
    let mut item = BuildItem::new(required_attribute(e, "objectid", "item")?.parse::<u32>()?);

    item.transform = xml_attribute(e, "transform")?
        .map(|v| parse_transform(&v))
        .transpose()?;
    item.printable = match xml_attribute(e, "printable")?.as_deref() {
        None => None,
        Some("1") | Some("true") => Some(true),
        Some("0") | Some("false") => Some(false),
        Some(other) => {
            return Err(Error::InvalidXml(format!(
                "Invalid printable value '{}'",
                other
            )));
        }
    };

    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(xml: &str) -> BytesStart<'_> {
        let body = xml.trim_start_matches('<').trim_end_matches("/>");
        let name_len = body.find(' ').unwrap_or(body.len());
        BytesStart::from_content(body, name_len)
    }

    #[test]
    fn test_parse_transform() {
        let t = parse_transform("1 0 0 0 1 0 0 0 1 5 6 7").unwrap();
        assert_eq!(t, Transform::translation(5.0, 6.0, 7.0));
        assert!(parse_transform("1 0 0").is_err());
        assert!(parse_transform("1 0 0 0 1 0 0 0 1 0 0 x").is_err());
        assert!(parse_transform("1 0 0 0 1 0 0 0 1 0 0 inf").is_err());
    }

    #[test]
    fn test_parse_vertex() {
        let v = parse_vertex(&element(r#"<vertex x="1.5" y="-2" z="0.25"/>"#)).unwrap();
        assert_eq!(v, Vertex::new(1.5, -2.0, 0.25));
        assert!(parse_vertex(&element(r#"<vertex x="1" y="2"/>"#)).is_err());
        assert!(parse_vertex(&element(r#"<vertex x="NaN" y="2" z="3"/>"#)).is_err());
    }

    #[test]
    fn test_parse_triangle_with_property() {
        let t = parse_triangle(&element(r#"<triangle v1="3" v2="4" v3="5" pid="7" p1="1"/>"#))
            .unwrap();
        assert_eq!(t.indices(), [3, 4, 5]);
        assert_eq!(t.pid, Some(7));
        assert_eq!(t.p1, Some(1));
        assert!(parse_triangle(&element(r#"<triangle v1="-1" v2="4" v3="5"/>"#)).is_err());
    }

    #[test]
    fn test_parse_build_item() {
        let item = parse_build_item(&element(r#"<item objectid="4" printable="1"/>"#)).unwrap();
        assert_eq!(item.objectid, 4);
        assert_eq!(item.printable, Some(true));
        assert_eq!(item.transform, None);
        assert!(parse_build_item(&element(r#"<item objectid="4" printable="yes"/>"#)).is_err());
    }

    #[test]
    fn test_component_defaults_to_identity() {
        let c = parse_component(&element(r#"<component objectid="2"/>"#)).unwrap();
        assert_eq!(c, Component::new(2));
    }
}
