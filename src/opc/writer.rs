//! Archive packaging
//!
//! One packaging run moves through
//! `Built → Staged → Written → Committed`, or ends in `Aborted`.
//! Documents are serialized in memory first, then the archive is written
//! into a private staging directory next to the destination and renamed
//! into place. The staging directory is a scoped resource: it is removed
//! on every exit path, and the destination is only ever touched by the
//! final rename.

use std::borrow::Cow;
use std::fmt;
use std::io::{Cursor, Seek, Write};
use std::path::Path;

use tracing::{debug, info, warn};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::builder::DocumentSet;
use crate::error::{Error, Result};
use crate::validator;
use crate::writer::{model_to_string, settings_to_string};

use super::{CONTENT_TYPES_PATH, MODEL_PATH, RELS_PATH, SETTINGS_PATH};

/// Prefix of staging directories created next to the destination
const STAGING_PREFIX: &str = ".nameplate3mf-staging-";

/// Stage of one packaging run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageState {
    /// Documents serialized in memory
    Built,
    /// Staging directory created
    Staged,
    /// Archive complete in the staging directory
    Written,
    /// Archive renamed to its destination
    Committed,
    /// Run failed; staging removed, destination untouched
    Aborted,
}

impl fmt::Display for PackageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PackageState::Built => "built",
            PackageState::Staged => "staged",
            PackageState::Written => "written",
            PackageState::Committed => "committed",
            PackageState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Serialize and validate every part, in archive order
fn render_parts(documents: &DocumentSet) -> Result<Vec<(&str, Cow<'_, [u8]>)>> {
    validator::validate_documents(documents)?;

    let mut parts: Vec<(&str, Cow<'_, [u8]>)> = vec![
        (
            CONTENT_TYPES_PATH,
            Cow::Owned(documents.content_types.to_xml()?.into_bytes()),
        ),
        (
            RELS_PATH,
            Cow::Owned(documents.relationships.to_xml()?.into_bytes()),
        ),
        (
            MODEL_PATH,
            Cow::Owned(model_to_string(&documents.model)?.into_bytes()),
        ),
        (
            SETTINGS_PATH,
            Cow::Owned(settings_to_string(&documents.settings)?.into_bytes()),
        ),
    ];
    parts.extend(
        documents
            .attachments
            .iter()
            .map(|a| (a.path.as_str(), Cow::Borrowed(a.data.as_slice()))),
    );
    Ok(parts)
}

fn write_zip<W: Write + Seek>(parts: &[(&str, Cow<'_, [u8]>)], writer: W) -> Result<W> {
    let mut zip = ZipWriter::new(writer);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, data) in parts {
        zip.start_file(*name, options)?;
        zip.write_all(data)?;
    }

    Ok(zip.finish()?)
}

/// Write a document set as an archive into any seekable writer
///
/// Validation and XML serialization happen before the first byte is
/// written, so an inconsistent document set leaves `writer` untouched.
pub fn to_writer<W: Write + Seek>(documents: &DocumentSet, writer: W) -> Result<W> {
    let parts = render_parts(documents)?;
    write_zip(&parts, writer)
}

/// Archive bytes of a document set
pub fn to_bytes(documents: &DocumentSet) -> Result<Vec<u8>> {
    Ok(to_writer(documents, Cursor::new(Vec::new()))?.into_inner())
}

/// Package a document set at `destination`
///
/// On success the archive exists at `destination` and nothing else was
/// left behind. On failure no file is created or replaced at
/// `destination` and the staging directory is gone.
///
/// # Errors
///
/// - validation and serialization errors, before anything touches disk
/// - [`Error::ArchiveWrite`] for any failure while staging, writing or
///   renaming
pub fn write_package(documents: &DocumentSet, destination: &Path) -> Result<()> {
    let parts = render_parts(documents).inspect_err(|e| {
        warn!(
            path = %destination.display(),
            from = %PackageState::Built,
            to = %PackageState::Aborted,
            error = %e,
            "Packaging aborted before staging"
        );
    })?;
    let mut state = PackageState::Built;
    debug!(path = %destination.display(), %state, parts = parts.len(), "Documents serialized");

    let parent = match destination.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(parent)
        .map_err(|e| {
            warn!(path = %destination.display(), from = %state, to = %PackageState::Aborted, "Packaging aborted");
            Error::archive_write(destination, format!("Cannot create staging directory: {}", e))
        })?;
    transition(&mut state, PackageState::Staged, destination);

    let result = stage_and_commit(&parts, staging.path(), destination, &mut state);

    // dropping the staging directory removes it and anything left inside
    if let Err(e) = staging.close() {
        warn!(error = %e, "Failed to remove staging directory");
    }

    match result {
        Ok(()) => {
            info!(path = %destination.display(), "Archive committed");
            Ok(())
        }
        Err(e) => {
            transition(&mut state, PackageState::Aborted, destination);
            Err(e)
        }
    }
}

fn stage_and_commit(
    parts: &[(&str, Cow<'_, [u8]>)],
    staging: &Path,
    destination: &Path,
    state: &mut PackageState,
) -> Result<()> {
    let mut staged = tempfile::Builder::new()
        .suffix(".3mf")
        .tempfile_in(staging)
        .map_err(|e| Error::archive_write(destination, format!("Cannot create staged file: {}", e)))?;

    write_zip(parts, staged.as_file_mut()).map_err(|e| match e {
        Error::ArchiveWrite { .. } => e,
        other => Error::archive_write(destination, other.to_string()),
    })?;
    staged
        .as_file()
        .sync_all()
        .map_err(|e| Error::archive_write(destination, format!("Cannot flush staged archive: {}", e)))?;
    transition(state, PackageState::Written, destination);

    staged
        .persist(destination)
        .map_err(|e| Error::archive_write(destination, format!("Cannot move archive into place: {}", e.error)))?;
    transition(state, PackageState::Committed, destination);
    Ok(())
}

fn transition(state: &mut PackageState, next: PackageState, destination: &Path) {
    if next == PackageState::Aborted {
        warn!(path = %destination.display(), from = %state, to = %next, "Packaging aborted");
    } else {
        debug!(path = %destination.display(), from = %state, to = %next, "Packaging state changed");
    }
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BuildOptions, build_documents};
    use crate::merge::MergeInput;
    use crate::model::{BuildItem, Extruder, Mesh, SourceRegion, Vertex};
    use crate::region::assign_by_object;

    fn documents() -> DocumentSet {
        let mut mesh = Mesh::new();
        mesh.push_facet([
            Vertex::new(0.0, 0.0, 0.0),
            Vertex::new(1.0, 0.0, 0.0),
            Vertex::new(0.0, 1.0, 0.0),
        ]);
        let assignment = assign_by_object(vec![MergeInput::new(
            mesh,
            SourceRegion::new("base", "Base", Extruder::FIRST),
        )]);
        build_documents(&assignment, &BuildOptions::new("Ada")).unwrap()
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(STAGING_PREFIX))
            .collect()
    }

    #[test]
    fn test_archive_layout() {
        let bytes = to_bytes(&documents()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert_eq!(
            names,
            vec![CONTENT_TYPES_PATH, RELS_PATH, MODEL_PATH, SETTINGS_PATH]
        );
        let model = archive.by_name(MODEL_PATH).unwrap();
        assert_eq!(model.compression(), zip::CompressionMethod::Deflated);
    }

    #[test]
    fn test_write_package_commits() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("Ada.3mf");
        write_package(&documents(), &dest).unwrap();
        assert!(dest.is_file());
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn test_dangling_build_item_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("broken.3mf");
        let mut docs = documents();
        docs.model.build.items = vec![BuildItem::new(99)];

        let err = write_package(&docs, &dest).unwrap_err();
        assert!(matches!(err, Error::DanglingReference(_)), "got {:?}", err);
        assert!(!dest.exists());
        assert!(leftovers(dir.path()).is_empty());

        let mut sink = Cursor::new(Vec::new());
        assert!(to_writer(&docs, &mut sink).is_err());
        assert!(sink.get_ref().is_empty());
    }

    #[test]
    fn test_failed_commit_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("occupied");
        std::fs::create_dir(&dest).unwrap();
        std::fs::write(dest.join("keep.txt"), b"x").unwrap();

        let err = write_package(&documents(), &dest).unwrap_err();
        assert!(matches!(err, Error::ArchiveWrite { .. }), "got {:?}", err);
        assert!(dest.join("keep.txt").is_file());
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn test_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("no_such_dir").join("Ada.3mf");
        let err = write_package(&documents(), &dest).unwrap_err();
        assert!(matches!(err, Error::ArchiveWrite { .. }));
        assert!(!dest.exists());
    }
}
