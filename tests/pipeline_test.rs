//! End-to-end nameplate generation with a stand-in renderer

mod common;

use std::fs::File;
use std::path::Path;

use common::{CrashingRenderer, FixtureRenderer, dir_entries};
use nameplate3mf::pipeline::output_path;
use nameplate3mf::validator::validate_documents;
use nameplate3mf::{
    Config, DocumentSet, Error, PackagingMode, Stage, generate_batch, generate_nameplate,
    read_documents,
};

fn config(dir: &Path, mode: PackagingMode) -> Config {
    let mut config = Config::default();
    config.output.directory = dir.to_path_buf();
    config.output.mode = mode;
    config
}

fn open(path: &Path) -> DocumentSet {
    let documents = read_documents(File::open(path).unwrap()).unwrap();
    validate_documents(&documents).unwrap();
    documents
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

/// Base of 4 triangles and label of 2 become one object with two bands
#[test]
fn test_height_bands_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), PackagingMode::HeightBands);

    let report = generate_nameplate("Ada", &config, &FixtureRenderer::default()).unwrap();
    assert_eq!(report.output, dir.path().join("Ada.3mf"));
    assert_eq!(report.mode, PackagingMode::HeightBands);
    assert_eq!(report.triangles, 6);
    assert_eq!(report.parts, 2);
    assert_eq!(report.plate_width, 40.0);

    // only the archive remains; programs and meshes are cleaned up
    assert_eq!(dir_entries(dir.path()), vec!["Ada.3mf"]);

    let documents = open(&report.output);
    let model = &documents.model;
    assert_eq!(model.resources.objects.len(), 1);
    assert_eq!(model.build.items.len(), 1);
    let object = documents.top_level_object().unwrap();
    let mesh = object.mesh.as_ref().unwrap();
    assert_eq!(mesh.triangle_count(), 6);
    assert_eq!(mesh.vertex_count(), 18);

    let parts: Vec<_> = documents.settings.parts().collect();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].name, "Ada - Base");
    assert_eq!(parts[0].extruder.get(), 1);
    assert_eq!(parts[1].name, "Ada - Text");
    assert_eq!(parts[1].extruder.get(), 2);
    for part in &parts {
        assert_eq!(part.source_object_id, object.id);
    }

    let base = parts[0].paint.unwrap();
    let text = parts[1].paint.unwrap();
    assert!(approx(base.low, 0.0) && approx(base.high, 2.0), "{}", base);
    assert!(approx(text.low, 2.0) && approx(text.high, 3.2), "{}", text);
    assert_eq!(parts[1].text.as_ref().unwrap().text, "Ada");
}

#[test]
fn test_separate_parts_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), PackagingMode::SeparateParts);

    let report = generate_nameplate("Ada", &config, &FixtureRenderer::default()).unwrap();
    let documents = open(&report.output);

    let model = &documents.model;
    assert_eq!(model.resources.objects.len(), 3);
    let top = documents.top_level_object().unwrap();
    assert!(top.is_composite());
    assert_eq!(top.name.as_deref(), Some("Ada"));

    let text = model.resources.object(2).unwrap().mesh.as_ref().unwrap();
    let (low, high) = text.z_bounds().unwrap();
    assert!((low - 2.0).abs() < 1e-6);
    assert!((high - 3.2).abs() < 1e-6);

    let parts: Vec<(u32, u8)> = documents
        .settings
        .parts()
        .map(|p| (p.source_object_id, p.extruder.get()))
        .collect();
    assert_eq!(parts, vec![(1, 1), (2, 2)]);
}

/// The combined solid is painted per triangle by centroid height
#[test]
fn test_painted_bands_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), PackagingMode::PaintedBands);

    let report = generate_nameplate("Ada", &config, &FixtureRenderer::default()).unwrap();
    let documents = open(&report.output);

    let model = &documents.model;
    assert_eq!(model.resources.base_material_groups.len(), 1);
    let group = &model.resources.base_material_groups[0];
    assert_eq!(group.materials.len(), 2);

    let mesh = documents.top_level_object().unwrap().mesh.as_ref().unwrap();
    let slots: Vec<Option<usize>> = mesh.triangles.iter().map(|t| t.p1).collect();
    assert_eq!(
        slots,
        vec![Some(0), Some(0), Some(0), Some(0), Some(1), Some(1)]
    );
    assert!(mesh.triangles.iter().all(|t| t.pid == Some(group.id)));
    assert_eq!(documents.settings.parts().count(), 2);
}

#[test]
fn test_renderer_failure_leaves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), PackagingMode::HeightBands);

    let err = generate_nameplate("Ada", &config, &CrashingRenderer).unwrap_err();
    assert_eq!(err.stage, Stage::Render);
    assert!(matches!(err.source, Error::RendererInvocation(_)));
    assert!(err.is_retryable());
    assert!(err.to_string().contains("'Ada' failed at render"));
    assert!(dir_entries(dir.path()).is_empty());
}

#[cfg(unix)]
#[test]
fn test_process_renderer_nonzero_exit() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), PackagingMode::HeightBands);
    config.renderer.program = "sh".to_string();
    config.renderer.args = vec!["-c".into(), "echo 'syntax error' >&2; exit 1".into(), "sh".into()];

    let renderer = config.renderer.process_renderer();
    let err = generate_nameplate("Ada", &config, &renderer).unwrap_err();
    assert_eq!(err.stage, Stage::Render);
    assert!(err.source.to_string().contains("syntax error"));
    assert!(!output_path("Ada", &config).exists());
    assert!(dir_entries(dir.path()).is_empty());
}

#[cfg(unix)]
#[test]
fn test_process_renderer_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), PackagingMode::SeparateParts);
    config.renderer.program = "sh".to_string();
    config.renderer.args = vec!["-c".into(), "sleep 10".into(), "sh".into()];
    config.renderer.timeout_secs = 1;

    let renderer = config.renderer.process_renderer();
    let started = std::time::Instant::now();
    let err = generate_nameplate("Ada", &config, &renderer).unwrap_err();
    assert!(started.elapsed() < std::time::Duration::from_secs(8));
    assert!(err.source.to_string().contains("timed out"));
    assert!(dir_entries(dir.path()).is_empty());
}

#[test]
fn test_output_name_is_file_system_safe() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), PackagingMode::HeightBands);

    let report = generate_nameplate("Ada Lovelace", &config, &FixtureRenderer::default()).unwrap();
    assert_eq!(report.output, dir.path().join("Ada_Lovelace.3mf"));
    let documents = open(&report.output);
    assert_eq!(documents.model.metadata_value("Title"), Some("Ada Lovelace"));
}

#[test]
fn test_batch_reports_each_name() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), PackagingMode::HeightBands);
    let names = vec!["Ada".to_string(), "  ".to_string(), "Grace".to_string()];

    let summary = generate_batch(&names, &config, &FixtureRenderer::default());
    assert_eq!(summary.len(), 3);
    assert!(!summary.is_success());
    assert_eq!(summary.succeeded().count(), 2);

    let failed: Vec<_> = summary.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].stage, Stage::Layout);
    assert!(!failed[0].is_retryable());

    assert_eq!(dir_entries(dir.path()), vec!["Ada.3mf", "Grace.3mf"]);
}

#[test]
fn test_config_file_drives_run() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("plates");
    let path = dir.path().join("nameplate.toml");
    std::fs::write(
        &path,
        format!(
            "[output]\ndirectory = {:?}\nmode = \"height_bands\"\n\n[extruders]\ntext = 3\n",
            out.display().to_string()
        ),
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    let report = generate_nameplate("Ada", &config, &FixtureRenderer::default()).unwrap();
    assert_eq!(report.output, out.join("Ada.3mf"));

    let documents = open(&report.output);
    let extruders: Vec<u8> = documents.settings.parts().map(|p| p.extruder.get()).collect();
    assert_eq!(extruders, vec![1, 3]);
}
