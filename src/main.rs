//! Nameplate generator command line
//!
//! - `generate`: render and package one 3MF per name
//! - `inspect`: read a packaged 3MF back and summarize it

#![forbid(unsafe_code)]

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use nameplate3mf::pipeline::read_names_file;
use nameplate3mf::validator::validate_documents;
use nameplate3mf::{Config, DocumentSet, PackagingMode, generate_batch, read_documents};

/// Names file read when no names are given
const DEFAULT_NAMES_FILE: &str = "names.txt";

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// More log output (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one nameplate per name
    Generate {
        /// Names to generate; read from names.txt when omitted
        #[arg(value_name = "NAME")]
        names: Vec<String>,

        /// File with one name per line
        #[arg(short = 'f', long, value_name = "FILE")]
        names_file: Option<PathBuf>,

        /// TOML configuration file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Packaging mode: separate_parts, height_bands or painted_bands
        #[arg(short, long)]
        mode: Option<PackagingMode>,

        /// Renderer executable
        #[arg(long, value_name = "PROGRAM")]
        renderer: Option<String>,

        /// Renderer time limit in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
    /// Summarize a packaged 3MF file
    Inspect {
        /// Path to the 3MF file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// List every part of the settings document
        #[arg(short, long)]
        detailed: bool,
    },
}

fn init_tracing(verbose: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        EnvFilter::new(level)
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let outcome = match args.command {
        Command::Generate {
            names,
            names_file,
            config,
            output_dir,
            mode,
            renderer,
            timeout,
        } => generate(GenerateArgs {
            names,
            names_file,
            config,
            output_dir,
            mode,
            renderer,
            timeout,
        }),
        Command::Inspect { file, detailed } => inspect(&file, detailed),
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(2)
        }
    }
}

struct GenerateArgs {
    names: Vec<String>,
    names_file: Option<PathBuf>,
    config: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    mode: Option<PackagingMode>,
    renderer: Option<String>,
    timeout: Option<u64>,
}

fn generate(args: GenerateArgs) -> nameplate3mf::Result<ExitCode> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(dir) = args.output_dir {
        config.output.directory = dir;
    }
    if let Some(mode) = args.mode {
        config.output.mode = mode;
    }
    if let Some(program) = args.renderer {
        config.renderer.program = program;
    }
    if let Some(secs) = args.timeout {
        config.renderer.timeout_secs = secs;
    }
    config.validate()?;

    let mut names = args.names;
    if let Some(path) = &args.names_file {
        names.extend(read_names_file(path)?);
    } else if names.is_empty() && Path::new(DEFAULT_NAMES_FILE).is_file() {
        names = read_names_file(Path::new(DEFAULT_NAMES_FILE))?;
    }
    if names.is_empty() {
        return Err(nameplate3mf::Error::Config(format!(
            "No names given and no {} found",
            DEFAULT_NAMES_FILE
        )));
    }

    let renderer = config.renderer.process_renderer();
    println!(
        "Generating {} nameplate(s) into {} ({}, renderer timeout {:?})",
        names.len(),
        config.output.directory.display(),
        config.output.mode.as_str(),
        Duration::from_secs(config.renderer.timeout_secs)
    );

    let summary = generate_batch(&names, &config, &renderer);

    println!();
    let succeeded: Vec<_> = summary.succeeded().collect();
    if !succeeded.is_empty() {
        println!("Generated {} nameplate(s):", succeeded.len());
        for report in succeeded {
            println!(
                "  ✓ {} → {} ({} mm, {} triangles, {} parts)",
                report.name,
                report.output.display(),
                report.plate_width,
                report.triangles,
                report.parts
            );
        }
    }
    let failed: Vec<_> = summary.failed().collect();
    if !failed.is_empty() {
        println!("Failed {} nameplate(s):", failed.len());
        for error in failed {
            println!(
                "  ✗ {} [{}] {}{}",
                error.name,
                error.stage,
                error.source,
                if error.is_retryable() { " (retryable)" } else { "" }
            );
        }
    }

    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn inspect(path: &Path, detailed: bool) -> nameplate3mf::Result<ExitCode> {
    let documents = read_documents(File::open(path)?)?;

    println!("File: {}", path.display());
    display_documents(&documents, detailed);

    match validate_documents(&documents) {
        Ok(()) => {
            println!("✓ Cross-references are consistent");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("✗ {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn display_documents(documents: &DocumentSet, detailed: bool) {
    let model = &documents.model;
    println!("Unit: {}", model.unit);
    for entry in &model.metadata {
        println!("  {:<24} {}", entry.name, entry.value);
    }

    println!("Objects:");
    for object in &model.resources.objects {
        let name = object.name.as_deref().unwrap_or("-");
        match &object.mesh {
            Some(mesh) => println!(
                "  [{}] {}: {} vertices, {} triangles",
                object.id,
                name,
                mesh.vertex_count(),
                mesh.triangle_count()
            ),
            None => {
                let ids: Vec<String> = object
                    .components
                    .iter()
                    .map(|c| c.objectid.to_string())
                    .collect();
                println!("  [{}] {}: components {}", object.id, name, ids.join(", "));
            }
        }
    }
    for group in &model.resources.base_material_groups {
        println!(
            "Base materials [{}]: {} entries",
            group.id,
            group.materials.len()
        );
    }
    for item in &model.build.items {
        println!("Build item → object {}", item.objectid);
    }

    let settings = &documents.settings;
    println!("Settings parts: {}", settings.parts().count());
    if detailed {
        for part in settings.parts() {
            let band = part
                .paint
                .map(|b| format!(", paint {}", b))
                .unwrap_or_default();
            println!(
                "  part {} '{}' extruder {} source {}{}",
                part.id, part.name, part.extruder, part.source_object_id, band
            );
        }
    }
    for attachment in &documents.attachments {
        println!(
            "Attachment {} ({} bytes)",
            attachment.path,
            attachment.data.len()
        );
    }
}
