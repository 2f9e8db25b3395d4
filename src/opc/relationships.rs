//! Package relationships (`_rels/.rels`)

use std::io::Write as IoWrite;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use urlencoding::decode;

use crate::error::{Error, Result};

use crate::parser::xml_attribute;

/// Namespace of relationship documents
pub const RELATIONSHIPS_NAMESPACE: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";

/// Relationship type of the 3D model part
pub const MODEL_REL_TYPE: &str = "http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel";

/// Relationship type of a package thumbnail
pub const THUMBNAIL_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/thumbnail";

/// One relationship entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship ID, unique within the document
    pub id: String,
    /// Absolute part name of the target, e.g. `/3D/3dmodel.model`
    pub target: String,
    /// Relationship type URI
    pub rel_type: String,
}

impl Relationship {
    /// Archive entry name of the target
    ///
    /// Targets are absolute part URIs and may be percent-encoded; an
    /// undecodable target is used as written.
    pub fn part_name(&self) -> String {
        let target = self.target.trim_start_matches('/');
        decode(target)
            .map(|name| name.into_owned())
            .unwrap_or_else(|_| target.to_string())
    }
}

/// A relationships document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    entries: Vec<Relationship>,
}

impl Relationships {
    /// Empty relationships document
    pub fn new() -> Self {
        Self::default()
    }

    /// Package relationships pointing at a model part
    pub fn for_model(model_path: &str) -> Self {
        let mut rels = Self::new();
        rels.add(model_path, MODEL_REL_TYPE);
        rels
    }

    /// Add a relationship to a part, allocating the next `relN` ID
    pub fn add(&mut self, part_path: &str, rel_type: &str) -> &Relationship {
        let id = format!("rel{}", self.entries.len());
        let target = format!("/{}", part_path.trim_start_matches('/'));
        let index = self.entries.len();
        self.entries.push(Relationship {
            id,
            target,
            rel_type: rel_type.to_string(),
        });
        &self.entries[index]
    }

    /// All entries in order
    pub fn entries(&self) -> &[Relationship] {
        &self.entries
    }

    /// First entry of a relationship type
    pub fn find_by_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.entries.iter().find(|r| r.rel_type == rel_type)
    }

    /// Archive entry name of the model part, without the leading slash
    pub fn model_part(&self) -> Option<String> {
        self.find_by_type(MODEL_REL_TYPE).map(Relationship::part_name)
    }

    /// Serialize to XML
    pub fn write_xml<W: IoWrite>(&self, writer: W) -> Result<()> {
        let mut xml_writer = Writer::new_with_indent(writer, b' ', 2);

        xml_writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| Error::xml_write(format!("Failed to write XML declaration: {}", e)))?;

        let mut root = BytesStart::new("Relationships");
        root.push_attribute(("xmlns", RELATIONSHIPS_NAMESPACE));
        xml_writer
            .write_event(Event::Start(root))
            .map_err(|e| Error::xml_write(format!("Failed to write Relationships element: {}", e)))?;

        for rel in &self.entries {
            let mut elem = BytesStart::new("Relationship");
            elem.push_attribute(("Target", rel.target.as_str()));
            elem.push_attribute(("Id", rel.id.as_str()));
            elem.push_attribute(("Type", rel.rel_type.as_str()));
            xml_writer
                .write_event(Event::Empty(elem))
                .map_err(|e| Error::xml_write(format!("Failed to write Relationship: {}", e)))?;
        }

        xml_writer
            .write_event(Event::End(BytesEnd::new("Relationships")))
            .map_err(|e| Error::xml_write(format!("Failed to close Relationships element: {}", e)))?;
        Ok(())
    }

    /// Serialize to a string
    pub fn to_xml(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_xml(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::xml_write(e.to_string()))
    }

    /// Parse a relationships document
    pub fn from_xml(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut entries = Vec::new();
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) | Event::Empty(ref e)
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let required = |name: &str| -> Result<String> {
                        xml_attribute(e, name)?.ok_or_else(|| {
                            Error::InvalidXml(format!("Relationship missing {} attribute", name))
                        })
                    };
                    entries.push(Relationship {
                        id: required("Id")?,
                        target: required("Target")?,
                        rel_type: required("Type")?,
                    });
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(Self { entries })
    }
}
