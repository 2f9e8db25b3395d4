//! The `[Content_Types].xml` table

use std::io::Write as IoWrite;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};

use crate::error::{Error, Result};

use crate::parser::xml_attribute;

/// Namespace of the content types document
pub const CONTENT_TYPES_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/package/2006/content-types";

/// Content type of relationship parts
pub const RELATIONSHIPS_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-package.relationships+xml";

/// Content type of 3D model parts
pub const MODEL_CONTENT_TYPE: &str = "application/vnd.ms-package.3dmanufacturing-3dmodel+xml";

/// Content type for a file extension commonly carried as an extra payload
pub fn content_type_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "rels" => Some(RELATIONSHIPS_CONTENT_TYPE),
        "model" => Some(MODEL_CONTENT_TYPE),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "xml" | "config" => Some("text/xml"),
        "json" => Some("application/json"),
        _ => None,
    }
}

/// Extension-to-content-type defaults of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTypes {
    defaults: Vec<(String, String)>,
}

impl ContentTypes {
    /// Table with the relationship and model defaults
    pub fn new() -> Self {
        Self {
            defaults: vec![
                ("rels".to_string(), RELATIONSHIPS_CONTENT_TYPE.to_string()),
                ("model".to_string(), MODEL_CONTENT_TYPE.to_string()),
            ],
        }
    }

    /// Register a default; an extension already present keeps its first type
    pub fn add_default(&mut self, extension: &str, content_type: &str) {
        let extension = extension.to_ascii_lowercase();
        if self.content_type(&extension).is_none() {
            self.defaults.push((extension, content_type.to_string()));
        }
    }

    /// Register the default for a part path by its extension
    ///
    /// # Errors
    ///
    /// [`Error::InvalidModel`] for a path with no known content type.
    pub fn register_part(&mut self, path: &str) -> Result<()> {
        let extension = extension_of(path).ok_or_else(|| {
            Error::InvalidModel(format!("Payload '{}' has no file extension", path))
        })?;
        if self.content_type(extension).is_some() {
            return Ok(());
        }
        let content_type = content_type_for_extension(extension).ok_or_else(|| {
            Error::InvalidModel(format!(
                "No content type known for payload '{}' (extension '{}')",
                path, extension
            ))
        })?;
        self.add_default(extension, content_type);
        Ok(())
    }

    /// Content type registered for an extension
    pub fn content_type(&self, extension: &str) -> Option<&str> {
        self.defaults
            .iter()
            .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
            .map(|(_, ct)| ct.as_str())
    }

    /// Content type that applies to a part path
    pub fn content_type_for_part(&self, path: &str) -> Option<&str> {
        extension_of(path).and_then(|ext| self.content_type(ext))
    }

    /// Registered `(extension, content type)` pairs in order
    pub fn defaults(&self) -> impl Iterator<Item = (&str, &str)> {
        self.defaults.iter().map(|(e, c)| (e.as_str(), c.as_str()))
    }

    /// Serialize to `[Content_Types].xml`
    pub fn write_xml<W: IoWrite>(&self, writer: W) -> Result<()> {
        let mut xml_writer = Writer::new_with_indent(writer, b' ', 2);

        xml_writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| Error::xml_write(format!("Failed to write XML declaration: {}", e)))?;

        let mut types = BytesStart::new("Types");
        types.push_attribute(("xmlns", CONTENT_TYPES_NAMESPACE));
        xml_writer
            .write_event(Event::Start(types))
            .map_err(|e| Error::xml_write(format!("Failed to write Types element: {}", e)))?;

        for (extension, content_type) in &self.defaults {
            let mut elem = BytesStart::new("Default");
            elem.push_attribute(("Extension", extension.as_str()));
            elem.push_attribute(("ContentType", content_type.as_str()));
            xml_writer
                .write_event(Event::Empty(elem))
                .map_err(|e| Error::xml_write(format!("Failed to write Default element: {}", e)))?;
        }

        xml_writer
            .write_event(Event::End(BytesEnd::new("Types")))
            .map_err(|e| Error::xml_write(format!("Failed to close Types element: {}", e)))?;
        Ok(())
    }

    /// Serialize to a string
    pub fn to_xml(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_xml(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::xml_write(e.to_string()))
    }

    /// Parse `[Content_Types].xml`; overrides are ignored
    pub fn from_xml(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut defaults = Vec::new();
        let mut saw_types = false;
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) | Event::Empty(ref e) => match e.local_name().as_ref() {
                    b"Types" => saw_types = true,
                    b"Default" => {
                        let extension = xml_attribute(e, "Extension")?.ok_or_else(|| {
                            Error::InvalidXml("Default element missing Extension".to_string())
                        })?;
                        let content_type = xml_attribute(e, "ContentType")?.ok_or_else(|| {
                            Error::InvalidXml("Default element missing ContentType".to_string())
                        })?;
                        defaults.push((extension.to_ascii_lowercase(), content_type));
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if !saw_types {
            return Err(Error::InvalidXml(
                "Content types document has no Types element".to_string(),
            ));
        }
        Ok(Self { defaults })
    }
}

impl Default for ContentTypes {
    fn default() -> Self {
        Self::new()
    }
}

fn extension_of(path: &str) -> Option<&str> {
    let file = path.rsplit('/').next()?;
    let (stem, extension) = file.rsplit_once('.')?;
    ((!extension.is_empty() && !stem.is_empty()) || file.starts_with('.')).then_some(extension)
}
