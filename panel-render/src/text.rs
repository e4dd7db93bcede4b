//! Text rasterisation for PNG pages with the bundled DejaVu Sans face

use ab_glyph::{Font, FontRef, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use panel_core::{HAlign, PanelError, PanelResult, VAlign};

const DEJAVU_SANS: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

pub fn load_font() -> PanelResult<FontRef<'static>> {
    FontRef::try_from_slice(DEJAVU_SANS)
        .map_err(|e| PanelError::render(format!("bundled font could not be parsed: {}", e)))
}

/// Draws single-line labels anchored the same way as the SVG text elements
pub struct TextPainter<'f> {
    font: FontRef<'f>,
}

impl<'f> TextPainter<'f> {
    pub fn new(font: FontRef<'f>) -> Self {
        Self { font }
    }

    /// Draw `text` at `(x, y)` with `size_px` line height. `ha` picks which
    /// edge of the text sits at `x`, `va` which line of it sits at `y`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw(
        &self,
        img: &mut RgbaImage,
        text: &str,
        x: f64,
        y: f64,
        size_px: f64,
        ha: HAlign,
        va: VAlign,
        color: Rgba<u8>,
    ) {
        if text.is_empty() || size_px <= 0.0 {
            return;
        }
        let scale = PxScale::from(size_px as f32);
        let scaled = self.font.as_scaled(scale);
        let ascent = scaled.ascent() as f64;
        let descent = scaled.descent() as f64;
        let (width, _) = text_size(scale, &self.font, text);
        let width = width as f64;

        let left = match ha {
            HAlign::Left => x,
            HAlign::Center => x - width / 2.0,
            HAlign::Right => x - width,
        };
        // imageproc puts the top of the line box at the given y
        let top = match va {
            VAlign::Top => y,
            VAlign::Center => y - (ascent - descent) / 2.0,
            VAlign::Bottom => y - (ascent - descent),
            VAlign::Baseline => y - ascent,
        };

        draw_text_mut(img, color, left.round() as i32, top.round() as i32, scale, &self.font, text);
    }
}
