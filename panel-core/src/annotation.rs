//! Annotation geometry for a single panel cell
//!
//! Everything here is a pure function of the cell's image dimensions, the
//! record being shown and the annotation settings. Pixel coordinates follow
//! image convention: `x` grows to the right, `y` grows downward, `(0, 0)` is
//! the top-left corner.

use crate::error::PanelResult;
use crate::format::format_template;
use crate::types::{FieldValue, SkyCoord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default pixel scale in degrees per pixel (0.262"/px)
pub const DEFAULT_PIXSCALE: f64 = 0.262 / 3600.0;

/// Default scale bar length in arcseconds
pub const DEFAULT_SCALEBAR_ARCSEC: f64 = 2.0;

/// Default scale bar offset from the left and bottom cell edges, in pixels
pub const DEFAULT_SCALEBAR_MARGIN: f64 = 3.0;

/// Vertical gap between the scale bar and its label, in pixels
pub const SCALEBAR_LABEL_GAP: f64 = 2.0;

pub const DEFAULT_MARKER_SIZE: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerColor {
    Red,
    Blue,
}

impl MarkerColor {
    pub fn rgb(self) -> [u8; 3] {
        match self {
            MarkerColor::Red => [255, 0, 0],
            MarkerColor::Blue => [0, 0, 255],
        }
    }

    pub fn hex(self) -> &'static str {
        match self {
            MarkerColor::Red => "#ff0000",
            MarkerColor::Blue => "#0000ff",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub position: PixelPoint,
    pub color: MarkerColor,
    pub size: f64,
}

/// Center of the image, with integer floor division
pub fn center_marker(width: usize, height: usize) -> PixelPoint {
    PixelPoint::new((width / 2) as f64, (height / 2) as f64)
}

/// Position of the background object relative to the foreground-centered cutout.
///
/// Small-angle tangent-plane approximation: the RA offset is shrunk by
/// `cos(Dec_FG)`, and both offsets are converted to pixels with `pixscale`
/// (degrees/pixel). East is to the left, north is up.
pub fn offset_marker(center: PixelPoint, fg: SkyCoord, bg: SkyCoord, pixscale: f64) -> PixelPoint {
    let dra = (bg.ra - fg.ra) * fg.dec.to_radians().cos();
    let ddec = bg.dec - fg.dec;
    PixelPoint::new(center.x - dra / pixscale, center.y - ddec / pixscale)
}

/// Horizontal scale bar anchored at the bottom-left of the cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleBar {
    pub start: PixelPoint,
    pub end: PixelPoint,
    pub length_px: f64,
    pub label: String,
    pub label_position: PixelPoint,
}

/// Bar length in pixels for a physical length in arcseconds
pub fn scalebar_length_px(length_arcsec: f64, pixscale: f64) -> f64 {
    length_arcsec / (pixscale * 3600.0)
}

pub fn scale_bar(image_height: usize, length_arcsec: f64, pixscale: f64, margin: f64) -> ScaleBar {
    let length_px = scalebar_length_px(length_arcsec, pixscale);
    let y = image_height as f64 - margin;
    ScaleBar {
        start: PixelPoint::new(margin, y),
        end: PixelPoint::new(margin + length_px, y),
        length_px,
        label: arcsec_label(length_arcsec),
        label_position: PixelPoint::new(margin + length_px / 2.0, y - SCALEBAR_LABEL_GAP),
    }
}

/// `2"` for whole arcseconds, `1.5"` otherwise
pub fn arcsec_label(length_arcsec: f64) -> String {
    if length_arcsec.fract() == 0.0 && length_arcsec.abs() < 1e9 {
        format!("{}\"", length_arcsec as i64)
    } else {
        format!("{}\"", length_arcsec)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VAlign {
    #[default]
    Top,
    Center,
    Bottom,
    Baseline,
}

/// Templated text placed at a fractional position inside the cell.
///
/// `x` and `y` run from 0 to 1 with the origin at the bottom-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    pub x: f64,
    pub y: f64,
    pub template: String,
    #[serde(default)]
    pub va: VAlign,
    #[serde(default)]
    pub ha: HAlign,
    #[serde(default)]
    pub font_size: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
}

impl TextBox {
    pub fn new<S: Into<String>>(x: f64, y: f64, template: S) -> Self {
        Self {
            x,
            y,
            template: template.into(),
            va: VAlign::Top,
            ha: HAlign::Left,
            font_size: None,
            color: None,
        }
    }

    /// Resolve the template; an empty value map leaves the template verbatim
    pub fn draw(&self, values: &BTreeMap<String, FieldValue>) -> PanelResult<TextOverlay> {
        let text = if values.is_empty() {
            self.template.clone()
        } else {
            format_template(&self.template, values)?
        };
        Ok(TextOverlay {
            x: self.x,
            y: self.y,
            text,
            va: self.va,
            ha: self.ha,
            font_size: self.font_size,
            color: self.color.clone(),
        })
    }
}

/// A text box with its template already resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub va: VAlign,
    pub ha: HAlign,
    pub font_size: Option<f64>,
    pub color: Option<String>,
}

impl TextOverlay {
    /// Anchor in pixel space for a cell of `width x height` pixels
    pub fn anchor_px(&self, width: f64, height: f64) -> PixelPoint {
        PixelPoint::new(self.x * width, (1.0 - self.y) * height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_marker_floors() {
        assert_eq!(center_marker(100, 100), PixelPoint::new(50.0, 50.0));
        assert_eq!(center_marker(101, 63), PixelPoint::new(50.0, 31.0));
    }

    #[test]
    fn test_offset_marker_ra_shift() {
        let center = center_marker(100, 100);
        let p = offset_marker(
            center,
            SkyCoord::new(10.0, 0.0),
            SkyCoord::new(10.001, 0.0),
            DEFAULT_PIXSCALE,
        );
        assert!((p.x - 36.2595).abs() < 1e-3, "x = {}", p.x);
        assert_eq!(p.y, 50.0);
    }

    #[test]
    fn test_offset_marker_dec_and_cosine() {
        let center = PixelPoint::new(32.0, 32.0);
        let pixscale = 1.0 / 3600.0;

        // 5" north lands 5 px above the center
        let north = offset_marker(center, SkyCoord::new(0.0, 0.0), SkyCoord::new(0.0, 5.0 / 3600.0), pixscale);
        assert!((north.y - 27.0).abs() < 1e-9);
        assert!((north.x - 32.0).abs() < 1e-12);

        // At Dec 60 a RA step counts half
        let east = offset_marker(center, SkyCoord::new(0.0, 60.0), SkyCoord::new(4.0 / 3600.0, 60.0), pixscale);
        assert!((east.x - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_identical_coordinates_hit_center() {
        let center = center_marker(64, 64);
        let sky = SkyCoord::new(150.1, 2.2);
        assert_eq!(offset_marker(center, sky, sky, DEFAULT_PIXSCALE), center);
    }

    #[test]
    fn test_scale_bar_default_geometry() {
        let bar = scale_bar(100, DEFAULT_SCALEBAR_ARCSEC, DEFAULT_PIXSCALE, DEFAULT_SCALEBAR_MARGIN);
        assert!((bar.length_px - 2.0 / 0.262).abs() < 1e-9);
        assert!((bar.length_px - 7.63).abs() < 0.01);
        assert_eq!(bar.start, PixelPoint::new(3.0, 97.0));
        assert!((bar.end.x - (3.0 + bar.length_px)).abs() < 1e-12);
        assert_eq!(bar.end.y, 97.0);
        assert_eq!(bar.label, "2\"");
        assert!((bar.label_position.x - (3.0 + bar.length_px / 2.0)).abs() < 1e-12);
        assert_eq!(bar.label_position.y, 95.0);
    }

    #[test]
    fn test_arcsec_label() {
        assert_eq!(arcsec_label(5.0), "5\"");
        assert_eq!(arcsec_label(1.5), "1.5\"");
    }

    #[test]
    fn test_textbox_draw() {
        let mut values = BTreeMap::new();
        values.insert("z".to_string(), FieldValue::Float(0.456));
        let tb = TextBox::new(0.05, 0.95, "z={z:.2f}");
        let overlay = tb.draw(&values).unwrap();
        assert_eq!(overlay.text, "z=0.46");
        assert_eq!(overlay.va, VAlign::Top);
        assert_eq!(overlay.ha, HAlign::Left);

        let anchor = overlay.anchor_px(200.0, 100.0);
        assert!((anchor.x - 10.0).abs() < 1e-9);
        assert!((anchor.y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_textbox_without_values_is_verbatim() {
        let tb = TextBox::new(0.5, 0.5, "{not_a_field}");
        assert_eq!(tb.draw(&BTreeMap::new()).unwrap().text, "{not_a_field}");
    }

    #[test]
    fn test_textbox_unknown_field() {
        let mut values = BTreeMap::new();
        values.insert("a".to_string(), FieldValue::Int(1));
        assert!(TextBox::new(0.0, 0.0, "{b}").draw(&values).is_err());
    }
}
