//! Reading a packaged archive back

use std::io::{Read, Seek};

use zip::ZipArchive;

use crate::error::{Error, Result};

use super::{CONTENT_TYPES_PATH, ContentTypes, RELS_PATH, Relationships, SETTINGS_PATH};

/// An opened 3MF archive
pub struct Package<R> {
    archive: ZipArchive<R>,
    content_types: ContentTypes,
    relationships: Relationships,
    model_path: String,
}

impl<R: Read + Seek> Package<R> {
    /// Open an archive and check its OPC structure
    ///
    /// The content types and package relationships must exist, the model
    /// relationship must resolve to a part in the archive, and every part
    /// must have a registered content type.
    pub fn open(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;

        let content_types = ContentTypes::from_xml(&read_entry(&mut archive, CONTENT_TYPES_PATH)?)?;
        let relationships = Relationships::from_xml(&read_entry(&mut archive, RELS_PATH)?)?;

        let model_path = relationships.model_part().ok_or_else(|| {
            Error::InvalidModel(format!("'{}' has no 3D model relationship", RELS_PATH))
        })?;
        if archive.index_for_name(&model_path).is_none() {
            return Err(Error::MissingFile(model_path));
        }

        for name in archive.file_names() {
            if name == CONTENT_TYPES_PATH || name.ends_with('/') {
                continue;
            }
            if content_types.content_type_for_part(name).is_none() {
                return Err(Error::InvalidModel(format!(
                    "Part '{}' has no registered content type",
                    name
                )));
            }
        }

        Ok(Self {
            archive,
            content_types,
            relationships,
            model_path,
        })
    }

    /// Names of all parts, in archive order
    pub fn part_names(&self) -> Vec<String> {
        self.archive.file_names().map(String::from).collect()
    }

    /// True if the archive holds a part
    pub fn has_part(&self, name: &str) -> bool {
        self.archive.index_for_name(name).is_some()
    }

    /// Number of entries in the archive
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    /// True if the archive has no entries
    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    /// Read a part as UTF-8 text
    pub fn read_part(&mut self, name: &str) -> Result<String> {
        read_entry(&mut self.archive, name)
    }

    /// Read a part as bytes
    pub fn read_part_binary(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut file = self
            .archive
            .by_name(name)
            .map_err(|_| Error::MissingFile(name.to_string()))?;
        let mut content = Vec::new();
        file.read_to_end(&mut content)?;
        Ok(content)
    }

    /// Archive entry name of the model part
    pub fn model_path(&self) -> &str {
        &self.model_path
    }

    /// The model document text
    pub fn model_xml(&mut self) -> Result<String> {
        let path = self.model_path.clone();
        self.read_part(&path)
    }

    /// The settings document text, if the archive carries one
    pub fn settings_xml(&mut self) -> Result<Option<String>> {
        if self.has_part(SETTINGS_PATH) {
            self.read_part(SETTINGS_PATH).map(Some)
        } else {
            Ok(None)
        }
    }

    /// The content types table
    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    /// The package relationships
    pub fn relationships(&self) -> &Relationships {
        &self.relationships
    }
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String> {
    let mut file = archive
        .by_name(name)
        .map_err(|_| Error::MissingFile(name.to_string()))?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}
