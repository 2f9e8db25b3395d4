//! Plate layout and geometry programs for the external renderer
//!
//! The solid model itself is built by the renderer. This module only sizes
//! the plate and writes the program text the renderer compiles: a base
//! plate, the raised label, or both united into one solid.

use std::fmt::Write as _;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::{TextInfo, ZInterval};

/// Plate widths are rounded to a multiple of this many millimeters
const WIDTH_STEP: f64 = 5.0;

/// Segments used for pin hole cylinders
const PIN_HOLE_SEGMENTS: u32 = 20;

/// Physical dimensions of a nameplate, in millimeters unless noted
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlateParams {
    /// Plate depth (Y extent)
    pub base_height: f64,
    /// Plate thickness; the label starts at this height
    pub base_thickness: f64,
    /// Height the label is raised above the plate
    pub text_height: f64,
    /// Corner rounding radius
    pub corner_radius: f64,
    /// Diameter of the two mounting holes
    pub pin_hole_diameter: f64,
    /// Distance of the mounting hole centers from the top and side edges
    pub pin_hole_from_edge: f64,
    /// Font size in points
    pub font_size: f64,
    /// Narrowest plate produced
    pub min_width: f64,
    /// Space left of and right of the label
    pub margin: f64,
    /// Average glyph advance as a fraction of the font size
    pub char_width_factor: f64,
    /// Font family
    pub font: String,
    /// Font style
    pub font_style: String,
}

impl Default for PlateParams {
    fn default() -> Self {
        Self {
            base_height: 13.5,
            base_thickness: 2.0,
            text_height: 1.2,
            corner_radius: 1.0,
            pin_hole_diameter: 1.0,
            pin_hole_from_edge: 2.0,
            font_size: 9.0,
            min_width: 40.0,
            margin: 7.0,
            char_width_factor: 0.7,
            font: "Arial".to_string(),
            font_style: "Bold".to_string(),
        }
    }
}

impl PlateParams {
    /// Check that every dimension is usable
    ///
    /// # Errors
    ///
    /// [`Error::Config`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("base_height", self.base_height),
            ("base_thickness", self.base_thickness),
            ("text_height", self.text_height),
            ("font_size", self.font_size),
            ("min_width", self.min_width),
            ("char_width_factor", self.char_width_factor),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Config(format!(
                    "plate.{} must be positive (got {})",
                    field, value
                )));
            }
        }

        let non_negative = [
            ("corner_radius", self.corner_radius),
            ("pin_hole_diameter", self.pin_hole_diameter),
            ("pin_hole_from_edge", self.pin_hole_from_edge),
            ("margin", self.margin),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::Config(format!(
                    "plate.{} must not be negative (got {})",
                    field, value
                )));
            }
        }

        if self.font.trim().is_empty() {
            return Err(Error::Config("plate.font must not be empty".to_string()));
        }
        Ok(())
    }

    /// Approximate width of `text` when rendered
    ///
    /// This is a per-character estimate (`chars × font_size ×
    /// char_width_factor`), not a measured text extent. Wide glyphs can
    /// overrun it; `margin` absorbs the difference.
    pub fn estimate_text_width(&self, text: &str) -> f64 {
        text.chars().count() as f64 * self.font_size * self.char_width_factor
    }

    /// Plate width for a name: the estimated label width plus margins, at
    /// least `min_width`, rounded to the nearest 5 mm (ties to even)
    pub fn plate_width(&self, name: &str) -> f64 {
        let width = (self.estimate_text_width(name) + 2.0 * self.margin).max(self.min_width);
        (width / WIDTH_STEP).round_ties_even() * WIDTH_STEP
    }

    /// Height interval of the base plate
    pub fn base_extent(&self) -> ZInterval {
        ZInterval::stacked(0.0, self.base_thickness)
    }

    /// Height interval of the raised label
    pub fn text_extent(&self) -> ZInterval {
        ZInterval::stacked(self.base_thickness, self.text_height)
    }

    /// Descriptor of the label carried into the settings document
    pub fn text_info(&self, name: &str) -> TextInfo {
        TextInfo {
            text: name.to_string(),
            font_name: self.font.clone(),
            style_name: self.font_style.clone(),
            font_size: self.font_size,
            thickness: self.text_height,
        }
    }

    fn font_spec(&self) -> String {
        if self.font_style.trim().is_empty() {
            self.font.clone()
        } else {
            format!("{}:style={}", self.font, self.font_style)
        }
    }
}

/// Which solid a program describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramKind {
    /// Base plate with mounting holes, from z = 0
    Base,
    /// Raised label, from z = 0; stacked onto the plate when merged
    Text,
    /// Base and label united, label at `base_thickness`
    Combined,
}

impl ProgramKind {
    /// Short label used in file names and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgramKind::Base => "base",
            ProgramKind::Text => "text",
            ProgramKind::Combined => "combined",
        }
    }
}

/// A renderer program for one solid of one nameplate
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryProgram {
    kind: ProgramKind,
    source: String,
}

impl GeometryProgram {
    /// Program for the base plate
    pub fn base(name: &str, params: &PlateParams) -> Self {
        let mut source = header("Base plate", name);
        push_plate_variables(&mut source, name, params);
        source.push('\n');
        push_rounded_rectangle(&mut source);
        source.push('\n');
        source.push_str(&base_solid(""));
        Self {
            kind: ProgramKind::Base,
            source,
        }
    }

    /// Program for the raised label
    pub fn text(name: &str, params: &PlateParams) -> Self {
        let mut source = header("Label", name);
        let _ = writeln!(source, "text_height = {};", params.text_height);
        let _ = writeln!(source, "font_size = {};", params.font_size);
        source.push('\n');
        source.push_str(&text_solid(name, params, ""));
        Self {
            kind: ProgramKind::Text,
            source,
        }
    }

    /// Program for base and label united into one solid
    pub fn combined(name: &str, params: &PlateParams) -> Self {
        let mut source = header("Combined nameplate", name);
        push_plate_variables(&mut source, name, params);
        let _ = writeln!(source, "text_height = {};", params.text_height);
        let _ = writeln!(source, "font_size = {};", params.font_size);
        source.push('\n');
        push_rounded_rectangle(&mut source);
        source.push('\n');
        source.push_str("union() {\n");
        source.push_str(&base_solid("    "));
        source.push_str("    translate([0, 0, plate_thickness])\n");
        source.push_str(&text_solid(name, params, "        "));
        source.push_str("}\n");
        Self {
            kind: ProgramKind::Combined,
            source,
        }
    }

    /// Which solid this program describes
    pub fn kind(&self) -> ProgramKind {
        self.kind
    }

    /// Program text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Write the program text to `path`
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.source)?;
        Ok(())
    }
}

/// Escape text for a double-quoted program string
pub fn escape_string(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' | '\r' | '\t' => escaped.push(' '),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// File-system safe form of a name for output and work files
///
/// Spaces and path separators become `_`.
pub fn safe_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

fn header(title: &str, name: &str) -> String {
    // a line comment ends at the first newline
    let one_line: String = name.chars().map(|c| if c.is_control() { ' ' } else { c }).collect();
    format!("// {} for {}\n", title, one_line)
}

fn push_plate_variables(source: &mut String, name: &str, params: &PlateParams) {
    let _ = writeln!(source, "plate_width = {};", params.plate_width(name));
    let _ = writeln!(source, "plate_height = {};", params.base_height);
    let _ = writeln!(source, "plate_thickness = {};", params.base_thickness);
    let _ = writeln!(source, "corner_radius = {};", params.corner_radius);
    let _ = writeln!(source, "pin_hole_diameter = {};", params.pin_hole_diameter);
    let _ = writeln!(source, "pin_hole_from_edge = {};", params.pin_hole_from_edge);
}

fn push_rounded_rectangle(source: &mut String) {
    source.push_str(
        "module rounded_rectangle(width, height, thickness, radius) {\n\
         \x20   linear_extrude(height = thickness)\n\
         \x20       offset(r = radius)\n\
         \x20           offset(r = -radius)\n\
         \x20               square([width, height], center = true);\n\
         }\n",
    );
}

fn base_solid(indent: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{indent}difference() {{");
    let _ = writeln!(
        out,
        "{indent}    rounded_rectangle(plate_width, plate_height, plate_thickness, corner_radius);"
    );
    for sign in ["", "-"] {
        let _ = writeln!(
            out,
            "{indent}    translate([{sign}plate_width/2 {op} pin_hole_from_edge, plate_height/2 - pin_hole_from_edge, 0])",
            op = if sign.is_empty() { "-" } else { "+" }
        );
        let _ = writeln!(
            out,
            "{indent}        cylinder(h = plate_thickness + 1, r = pin_hole_diameter/2, center = true, $fn = {});",
            PIN_HOLE_SEGMENTS
        );
    }
    let _ = writeln!(out, "{indent}}}");
    out
}

fn text_solid(name: &str, params: &PlateParams, indent: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{indent}linear_extrude(height = text_height, convexity = 10)");
    let _ = writeln!(
        out,
        "{indent}    text(\"{}\", size = font_size, font = \"{}\", halign = \"center\", valign = \"center\");",
        escape_string(name),
        escape_string(&params.font_spec())
    );
    out
}
