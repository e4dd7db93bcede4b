//! PNG page rendering
//!
//! Composites every visible cell onto one RGBA canvas with nearest-neighbour
//! scaling. Single-channel cutouts are stretched between their own minimum
//! and maximum and coloured through the style's colormap; three-channel
//! cutouts are treated as RGB and stretched jointly. Text is drawn last so it
//! sits above cutouts and markers.

use crate::colormap::Colormap;
use crate::geometry::{CellFrame, PageGeometry, Rect};
use crate::text::{load_font, TextPainter};
use crate::{parse_hex_rgb, RenderStyle};
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use panel_core::{
    page_path, CellContent, Cursor, HAlign, ImageBuffer, PanelError, PanelResult, PanelSink, RenderableGrid, VAlign,
};
use std::path::{Path, PathBuf};

/// Writes each page as `<base><cursor>.png`
pub struct PngSink {
    base: PathBuf,
    style: RenderStyle,
    written: Vec<PathBuf>,
}

impl PngSink {
    pub fn new<P: AsRef<Path>>(base: P, style: RenderStyle) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
            style,
            written: Vec::new(),
        }
    }

    /// Files written so far, in emit order
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl PanelSink for PngSink {
    fn emit(&mut self, grid: &RenderableGrid, cursor: Cursor) -> PanelResult<()> {
        let path = page_path(&self.base, cursor, "png");
        log::info!("Saving {}", path.display());
        let img = render_png(grid, &self.style)?;
        img.save(&path)
            .map_err(|e| PanelError::render(format!("failed to write {}: {}", path.display(), e)))?;
        self.written.push(path);
        Ok(())
    }
}

/// Rasterise one page
pub fn render_png(grid: &RenderableGrid, style: &RenderStyle) -> PanelResult<RgbaImage> {
    let page = PageGeometry::compute(grid, style);
    let [r, g, b] = parse_hex_rgb(&style.background_color).unwrap_or([255, 255, 255]);
    let mut img = RgbaImage::from_pixel(page.width, page.height, Rgba([r, g, b, 255]));

    let scalebar_rgb = parse_hex_rgb(&style.scalebar_color).unwrap_or([255, 255, 255]);
    let text_rgba = opaque(parse_hex_rgb(&style.text_color).unwrap_or([0, 0, 0]));
    let painter = TextPainter::new(load_font()?);

    if let (Some(title), Some((x, y))) = (&grid.title, page.title_anchor) {
        let size = style.points_to_px(title.size.unwrap_or(style.font_size * 1.2));
        painter.draw(&mut img, &title.text, x, y, size, HAlign::Center, VAlign::Baseline, text_rgba);
    }

    for (cell, frame) in grid.cells.iter().zip(page.frames.iter()) {
        let (Some(content), Some(frame)) = (cell.content(), frame) else {
            continue;
        };
        blit_cutout(&mut img, &to_rgb8(&content.image, style.colormap), frame);
        draw_annotations(&mut img, content, frame, style, scalebar_rgb);
        draw_cell_text(&mut img, &painter, content, frame, style, scalebar_rgb, text_rgba);
    }

    Ok(img)
}

/// Normalise a cutout to 8-bit RGB
pub fn to_rgb8(image: &ImageBuffer, colormap: Colormap) -> RgbImage {
    let (width, height) = (image.width() as u32, image.height() as u32);
    let (lo, hi) = image.value_range().unwrap_or((0.0, 0.0));
    let span = hi - lo;
    let unit = |v: f32| -> f32 {
        if !v.is_finite() || span <= 0.0 {
            return 0.0;
        }
        ((v - lo) / span).clamp(0.0, 1.0)
    };
    let level = |v: f32| -> u8 { (unit(v) * 255.0).round() as u8 };
    let color = image.channels() >= 3;

    RgbImage::from_fn(width, height, |x, y| {
        let (x, y) = (x as usize, y as usize);
        if color {
            Rgb([
                level(image.sample(y, x, 0)),
                level(image.sample(y, x, 1)),
                level(image.sample(y, x, 2)),
            ])
        } else {
            Rgb(colormap.rgb(unit(image.sample(y, x, 0))))
        }
    })
}

fn blit_cutout(img: &mut RgbaImage, cutout: &RgbImage, frame: &CellFrame) {
    if frame.scale <= 0.0 {
        return;
    }
    let (x0, y0, x1, y1) = pixel_span(&frame.image, img);
    for y in y0..y1 {
        let sy = ((y as f64 + 0.5 - frame.image.y) / frame.scale) as u32;
        for x in x0..x1 {
            let sx = ((x as f64 + 0.5 - frame.image.x) / frame.scale) as u32;
            if sx < cutout.width() && sy < cutout.height() {
                let Rgb([r, g, b]) = *cutout.get_pixel(sx, sy);
                img.put_pixel(x, y, Rgba([r, g, b, 255]));
            }
        }
    }
}

fn draw_annotations(
    img: &mut RgbaImage,
    content: &CellContent,
    frame: &CellFrame,
    style: &RenderStyle,
    scalebar_rgb: [u8; 3],
) {
    for marker in &content.markers {
        let (cx, cy) = frame.to_page(marker.position);
        let radius = (style.points_to_px(marker.size) / 2.0).max(0.5);
        let [r, g, b] = marker.color.rgb();
        fill_disc(img, &frame.image, cx, cy, radius, Rgba([r, g, b, 255]));
    }

    if let Some(bar) = &content.scale_bar {
        let (sx, sy) = frame.to_page(bar.start);
        let (ex, ey) = frame.to_page(bar.end);
        let [r, g, b] = scalebar_rgb;
        let color = Rgba([r, g, b, 255]);
        let thickness = style.points_to_px(style.scalebar_width).round().max(1.0) as i32;
        for offset in 0..thickness {
            let dy = offset - thickness / 2;
            draw_line(
                img,
                &frame.image,
                sx.round() as i32,
                sy.round() as i32 + dy,
                ex.round() as i32,
                ey.round() as i32 + dy,
                color,
            );
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_cell_text(
    img: &mut RgbaImage,
    painter: &TextPainter<'_>,
    content: &CellContent,
    frame: &CellFrame,
    style: &RenderStyle,
    scalebar_rgb: [u8; 3],
    text_rgba: Rgba<u8>,
) {
    if let Some(bar) = &content.scale_bar {
        let (x, y) = frame.to_page(bar.label_position);
        let size = style.points_to_px(style.font_size);
        painter.draw(img, &bar.label, x, y, size, HAlign::Center, VAlign::Baseline, opaque(scalebar_rgb));
    }

    if let (Some(title), Some((x, y))) = (&content.title, frame.title_anchor) {
        let size = style.points_to_px(title.size.unwrap_or(style.font_size));
        painter.draw(img, &title.text, x, y, size, HAlign::Center, VAlign::Baseline, text_rgba);
    }

    for overlay in &content.texts {
        let (x, y) = frame.text_anchor(overlay);
        let size = style.points_to_px(overlay.font_size.unwrap_or(style.font_size));
        let color = overlay
            .color
            .as_deref()
            .and_then(parse_hex_rgb)
            .map(opaque)
            .unwrap_or(text_rgba);
        painter.draw(img, &overlay.text, x, y, size, overlay.ha, overlay.va, color);
    }
}

fn opaque([r, g, b]: [u8; 3]) -> Rgba<u8> {
    Rgba([r, g, b, 255])
}

// Output pixel range covered by a rect, clamped to the image
fn pixel_span(rect: &Rect, img: &RgbaImage) -> (u32, u32, u32, u32) {
    let clamp_x = |v: f64| v.round().clamp(0.0, img.width() as f64) as u32;
    let clamp_y = |v: f64| v.round().clamp(0.0, img.height() as f64) as u32;
    (clamp_x(rect.x), clamp_y(rect.y), clamp_x(rect.right()), clamp_y(rect.bottom()))
}

fn fill_disc(img: &mut RgbaImage, clip: &Rect, cx: f64, cy: f64, radius: f64, color: Rgba<u8>) {
    let bounds = Rect::new(cx - radius, cy - radius, radius * 2.0, radius * 2.0);
    let x0 = bounds.x.floor().max(0.0) as u32;
    let y0 = bounds.y.floor().max(0.0) as u32;
    let x1 = (bounds.right().ceil().max(0.0) as u32).min(img.width());
    let y1 = (bounds.bottom().ceil().max(0.0) as u32).min(img.height());
    for y in y0..y1 {
        for x in x0..x1 {
            let (px, py) = (x as f64 + 0.5, y as f64 + 0.5);
            let inside = (px - cx).powi(2) + (py - cy).powi(2) <= radius * radius;
            if inside && clip.contains(px, py) {
                img.put_pixel(x, y, color);
            }
        }
    }
}

// Bresenham line drawing, clipped to `clip`
fn draw_line(img: &mut RgbaImage, clip: &Rect, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba<u8>) {
    let (mut x0, mut y0) = (x0, y0);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        let inside = clip.contains(x0 as f64 + 0.5, y0 as f64 + 0.5);
        if inside && x0 >= 0 && y0 >= 0 && (x0 as u32) < img.width() && (y0 as u32) < img.height() {
            img.put_pixel(x0 as u32, y0 as u32, color);
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
