//! Generator configuration
//!
//! Read from TOML; every section and field is optional and falls back to
//! the defaults below.
//!
//! ```toml
//! [plate]
//! base_thickness = 2.0
//! text_height = 1.2
//!
//! [renderer]
//! program = "openscad"
//! timeout_secs = 60
//!
//! [output]
//! directory = "output"
//! mode = "height_bands"
//!
//! [extruders]
//! base = 1
//! text = 2
//!
//! [palette]
//! colors = ["#FFFFFF", "#000000"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::builder::{DEFAULT_APPLICATION, DEFAULT_PALETTE, Rgba};
use crate::error::{Error, Result};
use crate::geometry::PlateParams;
use crate::model::Extruder;
use crate::parser::parse_color;
use crate::region::PackagingMode;
use crate::renderer::{DEFAULT_PROGRAM, DEFAULT_TIMEOUT, ProcessRenderer};

/// Complete generator configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Plate dimensions
    pub plate: PlateParams,
    /// External renderer
    pub renderer: RendererConfig,
    /// Output location and packaging
    pub output: OutputConfig,
    /// Extruder per region
    pub extruders: ExtruderConfig,
    /// Display colors
    pub palette: PaletteConfig,
}

/// `[renderer]` section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendererConfig {
    /// Executable
    pub program: String,
    /// Extra arguments placed before the output and input paths
    pub args: Vec<String>,
    /// Wall-clock limit per render, in seconds
    pub timeout_secs: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl RendererConfig {
    /// Time limit per render
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Process renderer for this section
    pub fn process_renderer(&self) -> ProcessRenderer {
        ProcessRenderer::new(&self.program)
            .with_args(self.args.iter().cloned())
            .with_timeout(self.timeout())
    }
}

/// `[output]` section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory receiving `<name>.3mf` files
    pub directory: PathBuf,
    /// How regions are packaged
    pub mode: PackagingMode,
    /// Application metadata of the model document
    pub application: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            mode: PackagingMode::default(),
            application: DEFAULT_APPLICATION.to_string(),
        }
    }
}

/// `[extruders]` section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtruderConfig {
    /// Extruder printing the plate
    pub base: u8,
    /// Extruder printing the label
    pub text: u8,
}

impl Default for ExtruderConfig {
    fn default() -> Self {
        Self { base: 1, text: 2 }
    }
}

impl ExtruderConfig {
    /// Extruder printing the plate
    pub fn base(&self) -> Result<Extruder> {
        extruder("extruders.base", self.base)
    }

    /// Extruder printing the label
    pub fn text(&self) -> Result<Extruder> {
        extruder("extruders.text", self.text)
    }
}

fn extruder(field: &str, index: u8) -> Result<Extruder> {
    Extruder::new(index)
        .ok_or_else(|| Error::Config(format!("{} must be 1 or greater (got {})", field, index)))
}

/// `[palette]` section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PaletteConfig {
    /// `#RRGGBB` or `#RRGGBBAA` colors, the first for extruder 1
    pub colors: Vec<String>,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            colors: DEFAULT_PALETTE
                .iter()
                .map(|(r, g, b, a)| format!("#{:02X}{:02X}{:02X}{:02X}", r, g, b, a))
                .collect(),
        }
    }
}

impl PaletteConfig {
    /// Parsed colors
    pub fn rgba(&self) -> Result<Vec<Rgba>> {
        self.colors
            .iter()
            .map(|c| parse_color(c).map_err(|_| Error::Config(format!("Invalid palette color '{}'", c))))
            .collect()
    }
}

impl Config {
    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for malformed TOML, unknown keys or unusable values.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&text).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Check every section
    pub fn validate(&self) -> Result<()> {
        self.plate.validate()?;
        if self.renderer.program.trim().is_empty() {
            return Err(Error::Config("renderer.program must not be empty".to_string()));
        }
        if self.renderer.timeout_secs == 0 {
            return Err(Error::Config(
                "renderer.timeout_secs must be positive".to_string(),
            ));
        }
        self.extruders.base()?;
        self.extruders.text()?;
        self.palette.rgba()?;
        Ok(())
    }
}
