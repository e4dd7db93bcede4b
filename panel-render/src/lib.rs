/*!
# PanelCreator Rendering

Turns laid-out pages into files. Two sinks implement the
[`PanelSink`](panel_core::PanelSink) boundary:

- [`PngSink`]: raster compositing. Cutouts are min/max normalised, markers
  are filled discs, scale bars are lines and text is drawn with a bundled
  DejaVu Sans face.
- [`SvgSink`]: vector output. Cutouts are embedded as base64 PNG, every
  annotation including text is drawn.

Both sinks share [`PageGeometry`], so a PNG and an SVG of the same page put
every cell at the same place.
*/

pub mod colormap;
pub mod geometry;
pub mod raster;
pub mod text;
pub mod vector_export;

pub use colormap::Colormap;
pub use geometry::{CellFrame, PageGeometry, Rect};
pub use raster::{render_png, PngSink};
pub use vector_export::{render_svg, SvgSink};

use serde::{Deserialize, Serialize};

/// Output formats a page can be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Svg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "svg" => Ok(OutputFormat::Svg),
            other => Err(format!("unknown output format '{}' (expected png or svg)", other)),
        }
    }
}

/// Shared render style for PNG and SVG output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderStyle {
    /// Pixels per canvas unit
    pub dpi: u32,
    pub background_color: String,
    /// Cell titles, page title and text boxes without their own color
    pub text_color: String,
    /// Scale bar and its label
    pub scalebar_color: String,
    pub font_family: String,
    /// Default font size in points
    pub font_size: f64,
    /// Scale bar stroke width in points
    pub scalebar_width: f64,
    /// Colouring of single-channel cutouts; RGB cutouts ignore it
    pub colormap: Colormap,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            dpi: 100,
            background_color: "#ffffff".to_string(),
            text_color: "#000000".to_string(),
            scalebar_color: "#ffffff".to_string(),
            font_family: "DejaVu Sans, Arial, sans-serif".to_string(),
            font_size: 10.0,
            scalebar_width: 2.0,
            colormap: Colormap::Viridis,
        }
    }
}

impl RenderStyle {
    /// Convert a length in points to output pixels
    pub fn points_to_px(&self, points: f64) -> f64 {
        points * self.dpi as f64 / 72.0
    }
}

// Parse a hex color like "#RRGGBB" into RGB bytes
pub(crate) fn parse_hex_rgb(s: &str) -> Option<[u8; 3]> {
    let hex = s.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some([r, g, b])
}
