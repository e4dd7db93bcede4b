/*!
# Vector Export

SVG pages with the cutouts embedded as base64 PNG and every annotation drawn
as a vector element: markers, scale bars with labels, cell titles, text boxes
and the page title.
*/

use crate::geometry::{CellFrame, PageGeometry};
use crate::raster::to_rgb8;
use crate::RenderStyle;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use panel_core::{
    page_path, CellContent, Cursor, HAlign, PanelError, PanelResult, PanelSink, RenderableGrid, TextOverlay, VAlign,
};
use std::fs::File;
use std::io::{BufWriter, Cursor as IoCursor, Write};
use std::path::{Path, PathBuf};

/// Writes each page as `<base><cursor>.svg`
pub struct SvgSink {
    base: PathBuf,
    style: RenderStyle,
    written: Vec<PathBuf>,
}

impl SvgSink {
    pub fn new<P: AsRef<Path>>(base: P, style: RenderStyle) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
            style,
            written: Vec::new(),
        }
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl PanelSink for SvgSink {
    fn emit(&mut self, grid: &RenderableGrid, cursor: Cursor) -> PanelResult<()> {
        let path = page_path(&self.base, cursor, "svg");
        log::info!("Saving {}", path.display());
        let svg = render_svg(grid, &self.style)?;
        svg.write_to_file(&path)?;
        self.written.push(path);
        Ok(())
    }
}

/// Build the SVG document for one page
pub fn render_svg(grid: &RenderableGrid, style: &RenderStyle) -> PanelResult<SvgBuilder> {
    let page = PageGeometry::compute(grid, style);
    let mut svg = SvgBuilder::new(page.width as f64, page.height as f64, style);
    svg.add_background();

    if let (Some(title), Some((x, y))) = (&grid.title, page.title_anchor) {
        let size = title.size.unwrap_or(style.font_size * 1.2);
        svg.add_text(x, y, &title.text, size, "middle", "auto", &style.text_color);
    }

    for (cell, frame) in grid.cells.iter().zip(page.frames.iter()) {
        let (Some(content), Some(frame)) = (cell.content(), frame) else {
            continue;
        };
        svg.add_cutout(content, frame)?;
        svg.add_annotations(content, frame);
    }

    Ok(svg)
}

/// SVG builder for panel pages
pub struct SvgBuilder {
    style: RenderStyle,
    elements: Vec<String>,
    width: f64,
    height: f64,
}

impl SvgBuilder {
    pub fn new(width: f64, height: f64, style: &RenderStyle) -> Self {
        Self {
            style: style.clone(),
            elements: Vec::new(),
            width,
            height,
        }
    }

    fn add_background(&mut self) {
        self.elements.push(format!(
            r#"<rect width="{}" height="{}" fill="{}"/>"#,
            self.width, self.height, self.style.background_color
        ));
    }

    fn add_cutout(&mut self, content: &CellContent, frame: &CellFrame) -> PanelResult<()> {
        let mut bytes = Vec::new();
        to_rgb8(&content.image, self.style.colormap)
            .write_to(&mut IoCursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| PanelError::render(format!("failed to encode cutout {}: {}", content.image_key, e)))?;

        self.elements.push(format!(
            r#"<image x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" preserveAspectRatio="none" style="image-rendering:pixelated" href="data:image/png;base64,{}"/>"#,
            frame.image.x,
            frame.image.y,
            frame.image.width,
            frame.image.height,
            STANDARD.encode(&bytes)
        ));
        Ok(())
    }

    fn add_annotations(&mut self, content: &CellContent, frame: &CellFrame) {
        let clip_id = format!("cell{}", self.elements.len());
        self.elements.push(format!(
            r#"<clipPath id="{}"><rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}"/></clipPath>"#,
            clip_id, frame.image.x, frame.image.y, frame.image.width, frame.image.height
        ));

        for marker in &content.markers {
            let (cx, cy) = frame.to_page(marker.position);
            self.elements.push(format!(
                r#"<circle cx="{:.2}" cy="{:.2}" r="{:.2}" fill="{}" clip-path="url(#{})"/>"#,
                cx,
                cy,
                self.style.points_to_px(marker.size) / 2.0,
                marker.color.hex(),
                clip_id
            ));
        }

        if let Some(bar) = &content.scale_bar {
            let (x1, y1) = frame.to_page(bar.start);
            let (x2, y2) = frame.to_page(bar.end);
            self.elements.push(format!(
                r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{}" stroke-width="{:.2}" clip-path="url(#{})"/>"#,
                x1,
                y1,
                x2,
                y2,
                self.style.scalebar_color,
                self.style.points_to_px(self.style.scalebar_width),
                clip_id
            ));
            let (lx, ly) = frame.to_page(bar.label_position);
            let color = self.style.scalebar_color.clone();
            self.add_text(lx, ly, &bar.label, self.style.font_size, "middle", "auto", &color);
        }

        if let (Some(title), Some((x, y))) = (&content.title, frame.title_anchor) {
            let color = self.style.text_color.clone();
            self.add_text(x, y, &title.text, title.size.unwrap_or(self.style.font_size), "middle", "auto", &color);
        }

        for overlay in &content.texts {
            self.add_overlay(overlay, frame);
        }
    }

    fn add_overlay(&mut self, overlay: &TextOverlay, frame: &CellFrame) {
        let (x, y) = frame.text_anchor(overlay);
        let anchor = match overlay.ha {
            HAlign::Left => "start",
            HAlign::Center => "middle",
            HAlign::Right => "end",
        };
        let baseline = match overlay.va {
            VAlign::Top => "hanging",
            VAlign::Center => "central",
            VAlign::Bottom => "text-after-edge",
            VAlign::Baseline => "auto",
        };
        let size = overlay.font_size.unwrap_or(self.style.font_size);
        let color = overlay.color.clone().unwrap_or_else(|| self.style.text_color.clone());
        self.add_text(x, y, &overlay.text, size, anchor, baseline, &color);
    }

    #[allow(clippy::too_many_arguments)]
    fn add_text(&mut self, x: f64, y: f64, text: &str, size_pt: f64, anchor: &str, baseline: &str, color: &str) {
        self.elements.push(format!(
            r#"<text x="{:.2}" y="{:.2}" font-family="{}" font-size="{:.1}px" fill="{}" text-anchor="{}" dominant-baseline="{}">{}</text>"#,
            x,
            y,
            self.style.font_family,
            self.style.points_to_px(size_pt),
            color,
            anchor,
            baseline,
            escape_xml(text)
        ));
    }

    /// Serialise the document
    pub fn write<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        writeln!(
            out,
            r#"<svg width="{}" height="{}" viewBox="0 0 {} {}" xmlns="http://www.w3.org/2000/svg">"#,
            self.width, self.height, self.width, self.height
        )?;
        for element in &self.elements {
            writeln!(out, "  {}", element)?;
        }
        writeln!(out, "</svg>")?;
        Ok(())
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> PanelResult<()> {
        let mut file = BufWriter::new(File::create(path)?);
        self.write(&mut file)?;
        file.flush()?;
        Ok(())
    }

    pub fn to_svg_string(&self) -> String {
        let mut out = Vec::new();
        // Writing into a Vec cannot fail
        let _ = self.write(&mut out);
        String::from_utf8_lossy(&out).into_owned()
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
