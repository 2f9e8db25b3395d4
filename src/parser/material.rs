//! Base material parsing

use quick_xml::events::BytesStart;

use crate::error::{Error, Result};
use crate::model::{BaseMaterial, BaseMaterialGroup};

use super::required_attribute;

/// Parse a `#RRGGBB` or `#RRGGBBAA` display color
pub(crate) fn parse_color(value: &str) -> Result<(u8, u8, u8, u8)> {
    let hex = value
        .strip_prefix('#')
        .filter(|h| (h.len() == 6 || h.len() == 8) && h.is_ascii())
        .ok_or_else(|| Error::InvalidXml(format!("Invalid color '{}'", value)))?;

    let channel = |i: usize| -> Result<u8> {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .map_err(|_| Error::InvalidXml(format!("Invalid color '{}'", value)))
    };

    let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
    Ok((channel(0)?, channel(2)?, channel(4)?, alpha))
}

/// Parse basematerials element attributes
pub(super) fn parse_basematerials_start(e: &BytesStart) -> Result<BaseMaterialGroup> {
    let id = required_attribute(e, "id", "basematerials")?.parse::<u32>()?;
    Ok(BaseMaterialGroup::new(id))
}

/// Parse a base element
pub(super) fn parse_base_material(e: &BytesStart) -> Result<BaseMaterial> {
    let name = required_attribute(e, "name", "base")?;
    let color = parse_color(&required_attribute(e, "displaycolor", "base")?)?;
    Ok(BaseMaterial::new(name, color))
}
