//! Per-nameplate pipeline and batch driver
//!
//! A run takes a name, the configuration and a renderer, and either leaves
//! exactly one archive in the output directory or nothing at all. Runs
//! share no state: each owns a uniquely named work directory for programs
//! and meshes, removed on every exit path.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, info_span, warn};

use crate::builder::{BuildOptions, build_documents};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::geometry::{GeometryProgram, safe_name};
use crate::ingest::load_stl;
use crate::merge::{MergeInput, merge};
use crate::model::{Mesh, SourceRegion};
use crate::opc::write_package;
use crate::region::{
    Assignment, HeightBands, PackagingMode, assign_by_geometry, assign_by_height_band,
    assign_by_object,
};
use crate::renderer::Renderer;

/// Prefix of per-run work directories
const WORK_DIR_PREFIX: &str = ".nameplate3mf-work-";

/// Pipeline step a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Configuration check, plate sizing, directory setup
    Layout,
    /// External renderer
    Render,
    /// Reading renderer output
    Ingest,
    /// Region assignment
    Assign,
    /// Document assembly
    Build,
    /// Archive packaging
    Package,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Layout => "layout",
            Stage::Render => "render",
            Stage::Ingest => "ingest",
            Stage::Assign => "assign",
            Stage::Build => "build",
            Stage::Package => "package",
        };
        f.write_str(name)
    }
}

/// Failure of one nameplate, with enough context to report and move on
#[derive(Debug, thiserror::Error)]
#[error("'{name}' failed at {stage}: {source}")]
pub struct NameplateError {
    /// The name being generated
    pub name: String,
    /// Step that failed
    pub stage: Stage,
    /// Underlying error
    #[source]
    pub source: Error,
}

impl NameplateError {
    /// Whether running the same name again may succeed
    pub fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}

/// Attach the stage to a step's error
trait StageContext<T> {
    fn stage(self, name: &str, stage: Stage) -> std::result::Result<T, NameplateError>;
}

impl<T> StageContext<T> for Result<T> {
    fn stage(self, name: &str, stage: Stage) -> std::result::Result<T, NameplateError> {
        self.map_err(|source| NameplateError {
            name: name.to_string(),
            stage,
            source,
        })
    }
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq)]
pub struct NameplateReport {
    /// The name
    pub name: String,
    /// Written archive
    pub output: PathBuf,
    /// Packaging mode used
    pub mode: PackagingMode,
    /// Plate width in millimeters
    pub plate_width: f64,
    /// Triangles across all packaged meshes
    pub triangles: usize,
    /// Parts listed in the settings document
    pub parts: usize,
}

/// Archive path for a name
pub fn output_path(name: &str, config: &Config) -> PathBuf {
    config
        .output
        .directory
        .join(format!("{}.3mf", safe_name(name)))
}

/// Generate one nameplate
///
/// # Errors
///
/// A [`NameplateError`] naming the failed [`Stage`]. No archive and no work
/// files are left behind on failure.
pub fn generate_nameplate<R: Renderer + ?Sized>(
    name: &str,
    config: &Config,
    renderer: &R,
) -> std::result::Result<NameplateReport, NameplateError> {
    let span = info_span!("nameplate", name = %name, mode = config.output.mode.as_str());
    let _guard = span.enter();

    let layout = || -> Result<f64> {
        if name.trim().is_empty() {
            return Err(Error::Config("Name must not be empty".to_string()));
        }
        config.validate()?;
        std::fs::create_dir_all(&config.output.directory)?;
        Ok(config.plate.plate_width(name))
    };
    let plate_width = layout().stage(name, Stage::Layout)?;
    info!(plate_width, "Plate sized");

    let work = tempfile::Builder::new()
        .prefix(WORK_DIR_PREFIX)
        .tempdir_in(&config.output.directory)
        .map_err(Error::from)
        .stage(name, Stage::Layout)?;

    let result = run(name, config, renderer, work.path(), plate_width);

    if let Err(e) = work.close() {
        warn!(error = %e, "Failed to remove work directory");
    }

    match &result {
        Ok(report) => info!(output = %report.output.display(), "Nameplate generated"),
        Err(e) => warn!(stage = %e.stage, error = %e.source, "Nameplate failed"),
    }
    result
}

fn run<R: Renderer + ?Sized>(
    name: &str,
    config: &Config,
    renderer: &R,
    work: &Path,
    plate_width: f64,
) -> std::result::Result<NameplateReport, NameplateError> {
    let params = &config.plate;
    let base_extruder = config.extruders.base().stage(name, Stage::Layout)?;
    let text_extruder = config.extruders.text().stage(name, Stage::Layout)?;

    let base_region = SourceRegion::new("base", format!("{} - Base", name), base_extruder)
        .with_extent(params.base_extent());
    let text_region = SourceRegion::new("text", format!("{} - Text", name), text_extruder)
        .with_extent(params.text_extent())
        .with_text(params.text_info(name));

    let mode = config.output.mode;
    let assignment: Assignment = match mode {
        PackagingMode::SeparateParts | PackagingMode::HeightBands => {
            let base = render_and_ingest(name, GeometryProgram::base(name, params), renderer, work)?;
            let text = render_and_ingest(name, GeometryProgram::text(name, params), renderer, work)?;
            let inputs = vec![
                MergeInput::new(base, base_region),
                MergeInput::new(text, text_region).with_z_offset(params.base_thickness as f32),
            ];
            if mode == PackagingMode::SeparateParts {
                assign_by_object(inputs)
            } else {
                assign_by_height_band(merge(inputs), name).stage(name, Stage::Assign)?
            }
        }
        PackagingMode::PaintedBands => {
            let mesh =
                render_and_ingest(name, GeometryProgram::combined(name, params), renderer, work)?;
            let bands = HeightBands::from_regions([&base_region, &text_region])
                .stage(name, Stage::Assign)?;
            assign_by_geometry(mesh, &bands, name)
        }
    };

    let build = || -> Result<_> {
        let options = BuildOptions::new(name)
            .with_application(config.output.application.as_str())
            .with_palette(config.palette.rgba()?);
        build_documents(&assignment, &options)
    };
    let documents = build().stage(name, Stage::Build)?;

    let output = output_path(name, config);
    write_package(&documents, &output).stage(name, Stage::Package)?;

    Ok(NameplateReport {
        name: name.to_string(),
        output,
        mode,
        plate_width,
        triangles: assignment
            .objects
            .iter()
            .map(|o| o.mesh.triangle_count())
            .sum(),
        parts: documents.settings.parts().count(),
    })
}

fn render_and_ingest<R: Renderer + ?Sized>(
    name: &str,
    program: GeometryProgram,
    renderer: &R,
    work: &Path,
) -> std::result::Result<Mesh, NameplateError> {
    let stl = work.join(format!("{}_{}.stl", safe_name(name), program.kind().as_str()));
    renderer.render(&program, &stl).stage(name, Stage::Render)?;
    let mesh = load_stl(&stl).stage(name, Stage::Ingest)?;
    if mesh.is_empty() {
        warn!(kind = program.kind().as_str(), "Renderer produced an empty mesh");
    }
    Ok(mesh)
}

/// Outcome of one name in a batch
#[derive(Debug)]
pub struct BatchItem {
    /// The name
    pub name: String,
    /// Report or failure
    pub result: std::result::Result<NameplateReport, NameplateError>,
}

/// Per-item outcomes of a batch, in input order
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Outcomes
    pub items: Vec<BatchItem>,
}

impl BatchSummary {
    /// Successful runs
    pub fn succeeded(&self) -> impl Iterator<Item = &NameplateReport> {
        self.items.iter().filter_map(|i| i.result.as_ref().ok())
    }

    /// Failed runs
    pub fn failed(&self) -> impl Iterator<Item = &NameplateError> {
        self.items.iter().filter_map(|i| i.result.as_ref().err())
    }

    /// True if every name succeeded
    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }

    /// Number of names processed
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if the batch had no names
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Generate every name, continuing past failures
pub fn generate_batch<R, I, S>(names: I, config: &Config, renderer: &R) -> BatchSummary
where
    R: Renderer + ?Sized,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let items: Vec<BatchItem> = names
        .into_iter()
        .map(|name| {
            let name = name.as_ref();
            BatchItem {
                name: name.to_string(),
                result: generate_nameplate(name, config, renderer),
            }
        })
        .collect();

    let summary = BatchSummary { items };
    info!(
        total = summary.len(),
        succeeded = summary.succeeded().count(),
        failed = summary.failed().count(),
        "Batch complete"
    );
    summary
}

/// Names from a text file, one per line, blank lines skipped
pub fn read_names_file(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingRenderer;

    impl Renderer for FailingRenderer {
        fn render(&self, _program: &GeometryProgram, _output: &Path) -> Result<()> {
            Err(Error::RendererInvocation("exit status: 1".to_string()))
        }
    }

    /// Exits successfully without writing anything
    struct SilentRenderer;

    impl Renderer for SilentRenderer {
        fn render(&self, _program: &GeometryProgram, _output: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.output.directory = dir.to_path_buf();
        config
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Render.to_string(), "render");
        assert_eq!(Stage::Package.to_string(), "package");
    }

    #[test]
    fn test_renderer_failure_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let err = generate_nameplate("Ada", &config(dir.path()), &FailingRenderer).unwrap_err();
        assert_eq!(err.stage, Stage::Render);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("'Ada' failed at render"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_output_is_ingest_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = generate_nameplate("Ada", &config(dir.path()), &SilentRenderer).unwrap_err();
        assert_eq!(err.stage, Stage::Ingest);
        assert!(matches!(err.source, Error::MeshFormat(_)));
        assert!(!err.is_retryable());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_empty_name_is_layout_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = generate_nameplate("  ", &config(dir.path()), &FailingRenderer).unwrap_err();
        assert_eq!(err.stage, Stage::Layout);
    }

    #[test]
    fn test_batch_continues_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let summary = generate_batch(["Ada", "", "Grace"], &config(dir.path()), &FailingRenderer);
        assert_eq!(summary.len(), 3);
        assert_eq!(summary.failed().count(), 3);
        assert!(!summary.is_success());
        let stages: Vec<Stage> = summary.failed().map(|e| e.stage).collect();
        assert_eq!(stages, vec![Stage::Render, Stage::Layout, Stage::Render]);
    }

    #[test]
    fn test_output_path_is_safe() {
        let config = config(Path::new("out"));
        assert_eq!(
            output_path("Ada Lovelace", &config),
            Path::new("out").join("Ada_Lovelace.3mf")
        );
    }

    #[test]
    fn test_read_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.txt");
        std::fs::write(&path, "Ada Lovelace\n\n  Grace Hopper  \n\r\n").unwrap();
        assert_eq!(
            read_names_file(&path).unwrap(),
            vec!["Ada Lovelace", "Grace Hopper"]
        );
    }
}
