//! Error types for nameplate packaging
//!
//! Every error carries a code for categorization so a batch driver can report
//! failures without inspecting message text.
//!
//! # Error Codes
//!
//! Error codes follow the pattern: `E<category><number>`
//!
//! Categories:
//! - **E1xxx**: I/O and archive errors
//! - **E2xxx**: XML reading and writing errors
//! - **E3xxx**: Mesh, region and document model errors
//! - **E4xxx**: External renderer and configuration errors
//!
//! ## Common Error Codes
//!
//! - `E1001`: I/O error
//! - `E1002`: ZIP archive format error
//! - `E1003`: Missing required file in archive
//! - `E1004`: Archive staging or commit failed
//! - `E2001`: XML parsing error
//! - `E2005`: XML writing error
//! - `E3001`: Malformed mesh input
//! - `E3002`: Overlapping height bands
//! - `E3004`: Dangling object reference
//! - `E4001`: Renderer process failed or timed out
//! - `E4002`: Invalid configuration

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for nameplate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while generating and packaging a nameplate
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    ///
    /// **Error Code**: E1001
    #[error("[E1001] I/O error: {0}")]
    Io(#[from] io::Error),

    /// ZIP archive error
    ///
    /// **Error Code**: E1002
    ///
    /// **Common Causes**:
    /// - Corrupted or truncated archive when reading a package back
    /// - Compression failure while writing
    #[error("[E1002] ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Missing required file in the archive
    ///
    /// **Error Code**: E1003
    #[error("[E1003] Missing required file: {0}")]
    MissingFile(String),

    /// Staging, writing or committing the archive failed
    ///
    /// **Error Code**: E1004
    ///
    /// When this error is returned no file exists at `path` and the
    /// staging directory has been removed.
    #[error("[E1004] Failed to write archive '{}': {message}", path.display())]
    ArchiveWrite {
        /// Destination path of the archive
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// XML parsing error
    ///
    /// **Error Code**: E2001
    #[error("[E2001] XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// XML attribute error
    ///
    /// **Error Code**: E2002
    #[error("[E2002] XML attribute error: {0}")]
    XmlAttr(String),

    /// Invalid XML structure
    ///
    /// **Error Code**: E2003
    #[error("[E2003] Invalid XML structure: {0}")]
    InvalidXml(String),

    /// XML writing error
    ///
    /// **Error Code**: E2005
    #[error("[E2005] XML writing error: {0}")]
    XmlWrite(String),

    /// Unreadable or malformed mesh input
    ///
    /// **Error Code**: E3001
    ///
    /// **Common Causes**:
    /// - Renderer exited successfully but produced no output file
    /// - Truncated binary STL
    /// - Facet with other than three vertices
    /// - NaN or infinite coordinates
    #[error("[E3001] Malformed mesh: {0}")]
    MeshFormat(String),

    /// Height band declarations overlap
    ///
    /// **Error Code**: E3002
    #[error("[E3002] Overlapping height bands: {0}")]
    RegionOverlap(String),

    /// A region declaration is unusable (empty or inverted interval, missing extent)
    ///
    /// **Error Code**: E3003
    #[error("[E3003] Invalid region: {0}")]
    InvalidRegion(String),

    /// A component, build item or settings entry names an object that does not exist
    ///
    /// **Error Code**: E3004
    ///
    /// This always indicates a defect in document assembly. It is raised
    /// before any archive bytes are written.
    #[error("[E3004] Dangling reference: {0}")]
    DanglingReference(String),

    /// Invalid document structure
    ///
    /// **Error Code**: E3005
    ///
    /// **Common Causes**:
    /// - Duplicate or zero object IDs
    /// - Triangle indices outside the object's vertex list
    /// - Zero or several build items
    #[error("[E3005] Invalid model: {0}")]
    InvalidModel(String),

    /// Parse error for numeric values
    ///
    /// **Error Code**: E3006
    #[error("[E3006] Parse error: {0}")]
    ParseError(String),

    /// External renderer failed, could not be started or timed out
    ///
    /// **Error Code**: E4001
    ///
    /// Safe to retry with the same input.
    #[error("[E4001] Renderer invocation failed: {0}")]
    RendererInvocation(String),

    /// Invalid configuration
    ///
    /// **Error Code**: E4002
    #[error("[E4002] Invalid configuration: {0}")]
    Config(String),
}

impl From<std::num::ParseFloatError> for Error {
    fn from(err: std::num::ParseFloatError) -> Self {
        Error::ParseError(format!("Failed to parse floating-point number: {}", err))
    }
}

impl From<std::num::ParseIntError> for Error {
    fn from(err: std::num::ParseIntError) -> Self {
        Error::ParseError(format!("Failed to parse integer: {}", err))
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::XmlAttr(format!("Attribute parsing failed: {}", err))
    }
}

impl Error {
    /// Create an XmlWrite error
    pub fn xml_write(message: String) -> Self {
        Error::XmlWrite(message)
    }

    /// Create a MeshFormat error
    pub fn mesh_format(message: impl Into<String>) -> Self {
        Error::MeshFormat(message.into())
    }

    /// Create a DanglingReference error naming the referencing element and the missing ID
    ///
    /// # Arguments
    /// * `referrer` - What holds the reference (e.g. "Build item 0", "Object 3 component")
    /// * `missing_id` - The object ID that does not resolve
    /// * `available` - Object IDs that do exist, for the message
    pub fn dangling_reference(referrer: &str, missing_id: u32, available: &[u32]) -> Self {
        Error::DanglingReference(format!(
            "{} references non-existent object ID {}. Available object IDs: {:?}",
            referrer, missing_id, available
        ))
    }

    /// Create an ArchiveWrite error for the given destination
    pub fn archive_write(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::ArchiveWrite {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Error code of this error, e.g. `"E3004"`
    pub fn code(&self) -> &'static str {
        match self {
            Error::Io(_) => "E1001",
            Error::Zip(_) => "E1002",
            Error::MissingFile(_) => "E1003",
            Error::ArchiveWrite { .. } => "E1004",
            Error::Xml(_) => "E2001",
            Error::XmlAttr(_) => "E2002",
            Error::InvalidXml(_) => "E2003",
            Error::XmlWrite(_) => "E2005",
            Error::MeshFormat(_) => "E3001",
            Error::RegionOverlap(_) => "E3002",
            Error::InvalidRegion(_) => "E3003",
            Error::DanglingReference(_) => "E3004",
            Error::InvalidModel(_) => "E3005",
            Error::ParseError(_) => "E3006",
            Error::RendererInvocation(_) => "E4001",
            Error::Config(_) => "E4002",
        }
    }

    /// Whether re-running the same input may succeed
    ///
    /// Only renderer failures (crashes, timeouts) are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RendererInvocation(_))
    }
}
