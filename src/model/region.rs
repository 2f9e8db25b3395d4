//! Source regions, extruder indices and part assignments

use std::fmt;
use std::num::NonZeroU8;

use serde::Deserialize;

use super::document::Transform;

/// A 1-based extruder (material slot) index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "u8")]
pub struct Extruder(NonZeroU8);

impl Extruder {
    /// First extruder
    pub const FIRST: Extruder = Extruder(NonZeroU8::MIN);

    /// Create an extruder index, `None` for 0
    pub fn new(index: u8) -> Option<Self> {
        NonZeroU8::new(index).map(Extruder)
    }

    /// The 1-based index
    pub fn get(self) -> u8 {
        self.0.get()
    }
}

impl TryFrom<u8> for Extruder {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        Extruder::new(value).ok_or_else(|| "extruder indices start at 1".to_string())
    }
}

impl fmt::Display for Extruder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A half-open height interval `[low, high)` in millimeters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZInterval {
    /// Inclusive lower bound
    pub low: f64,
    /// Exclusive upper bound
    pub high: f64,
}

impl ZInterval {
    /// Create an interval without validating it
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Interval covering `thickness` millimeters starting at `z_offset`
    pub fn stacked(z_offset: f64, thickness: f64) -> Self {
        Self::new(z_offset, z_offset + thickness)
    }

    /// True if both bounds are finite and `low < high`
    pub fn is_valid(&self) -> bool {
        self.low.is_finite() && self.high.is_finite() && self.low < self.high
    }

    /// `low <= z < high`
    pub fn contains(&self, z: f64) -> bool {
        self.low <= z && z < self.high
    }

    /// True if the two half-open intervals share any point
    pub fn overlaps(&self, other: &ZInterval) -> bool {
        self.low < other.high && other.low < self.high
    }
}

impl fmt::Display for ZInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.low, self.high)
    }
}

/// Descriptor of rendered text, passed through to the slicer as information only
#[derive(Debug, Clone, PartialEq)]
pub struct TextInfo {
    /// The original string
    pub text: String,
    /// Font family
    pub font_name: String,
    /// Font style, e.g. "Bold"
    pub style_name: String,
    /// Font size in points
    pub font_size: f64,
    /// Extrusion height in millimeters
    pub thickness: f64,
}

impl TextInfo {
    /// True if the style names a bold face
    pub fn is_bold(&self) -> bool {
        self.style_name.to_ascii_lowercase().contains("bold")
    }

    /// True if the style names an italic face
    pub fn is_italic(&self) -> bool {
        let style = self.style_name.to_ascii_lowercase();
        style.contains("italic") || style.contains("oblique")
    }
}

/// A labeled origin of geometry, tagged with the extruder it prints in
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRegion {
    /// Short label of the sub-mesh, e.g. "base" or "text"
    pub label: String,
    /// Human-readable name shown in the slicer
    pub display_name: String,
    /// Target extruder
    pub extruder: Extruder,
    /// Declared height interval in merged coordinates, required for band packaging
    pub extent: Option<ZInterval>,
    /// Text descriptor when the region is rendered text
    pub text: Option<TextInfo>,
}

impl SourceRegion {
    /// Create a region with no declared extent
    pub fn new(
        label: impl Into<String>,
        display_name: impl Into<String>,
        extruder: Extruder,
    ) -> Self {
        Self {
            label: label.into(),
            display_name: display_name.into(),
            extruder,
            extent: None,
            text: None,
        }
    }

    /// Declare the height interval this region occupies
    pub fn with_extent(mut self, extent: ZInterval) -> Self {
        self.extent = Some(extent);
        self
    }

    /// Attach a text descriptor
    pub fn with_text(mut self, text: TextInfo) -> Self {
        self.text = Some(text);
        self
    }
}

/// Links one source (or band) to an extruder in the settings document
#[derive(Debug, Clone, PartialEq)]
pub struct PartAssignment {
    /// Index of the mesh object the part belongs to, in packaging order
    pub source_index: usize,
    /// Target extruder
    pub extruder: Extruder,
    /// Display name of the part
    pub name: String,
    /// Placement of the part inside its parent object
    pub transform: Transform,
    /// Paint band when the part is a height region of a merged mesh
    pub band: Option<ZInterval>,
    /// Text descriptor when the part is rendered text
    pub text: Option<TextInfo>,
}
