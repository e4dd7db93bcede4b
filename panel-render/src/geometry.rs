//! Page geometry shared by the PNG and SVG renderers
//!
//! Output pixels have their origin at the top-left corner of the page. A page
//! title, when present, takes a header band above the grid; a cell title takes
//! a band above its image. Cutouts keep their aspect ratio and are centered in
//! what is left of their slot.

use crate::RenderStyle;
use panel_core::{PixelPoint, RenderableGrid, TextOverlay};

/// Header height relative to the title font size
const TITLE_BAND_SCALE: f64 = 1.8;
/// Cell title band height relative to the title font size
const CELL_TITLE_BAND_SCALE: f64 = 1.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// Placement of one visible cell on the page
#[derive(Debug, Clone, PartialEq)]
pub struct CellFrame {
    /// Whole slot of the cell
    pub bounds: Rect,
    /// Area the cutout is drawn into
    pub image: Rect,
    /// Output pixels per cutout pixel
    pub scale: f64,
    /// Center of the cell title baseline
    pub title_anchor: Option<(f64, f64)>,
}

impl CellFrame {
    /// Page position of a point in cutout pixel coordinates. Cutout pixel `i`
    /// spans `[i - 0.5, i + 0.5)`, so its center maps to the middle of its block.
    pub fn to_page(&self, point: PixelPoint) -> (f64, f64) {
        (
            self.image.x + (point.x + 0.5) * self.scale,
            self.image.y + (point.y + 0.5) * self.scale,
        )
    }

    /// Page position of a text overlay anchor
    pub fn text_anchor(&self, overlay: &TextOverlay) -> (f64, f64) {
        let anchor = overlay.anchor_px(self.image.width, self.image.height);
        (self.image.x + anchor.x, self.image.y + anchor.y)
    }
}

/// Pixel layout of a whole page
#[derive(Debug, Clone, PartialEq)]
pub struct PageGeometry {
    pub width: u32,
    pub height: u32,
    pub header: f64,
    pub title_anchor: Option<(f64, f64)>,
    /// One entry per grid cell; `None` for blank cells
    pub frames: Vec<Option<CellFrame>>,
}

impl PageGeometry {
    pub fn compute(grid: &RenderableGrid, style: &RenderStyle) -> Self {
        let dpi = style.dpi.max(1) as f64;
        let width = (grid.canvas.width * dpi).round().max(1.0) as u32;
        let height = (grid.canvas.height * dpi).round().max(1.0) as u32;
        let (page_w, page_h) = (width as f64, height as f64);

        let header = grid
            .title
            .as_ref()
            .map(|t| style.points_to_px(t.size.unwrap_or(style.font_size * 1.2)) * TITLE_BAND_SCALE)
            .unwrap_or(0.0)
            .min(page_h * 0.5);
        let title_anchor = grid.title.as_ref().map(|_| (page_w / 2.0, header * 0.7));

        let cell_w = page_w / grid.shape.cols as f64;
        let cell_h = (page_h - header) / grid.shape.rows as f64;

        let frames = grid
            .cells
            .iter()
            .enumerate()
            .map(|(index, cell)| {
                let content = cell.content()?;
                let (row, col) = grid.shape.position(index);
                let bounds = Rect::new(col as f64 * cell_w, header + row as f64 * cell_h, cell_w, cell_h);

                let band = content
                    .title
                    .as_ref()
                    .map(|t| style.points_to_px(t.size.unwrap_or(style.font_size)) * CELL_TITLE_BAND_SCALE)
                    .unwrap_or(0.0)
                    .min(cell_h * 0.5);

                let (img_w, img_h) = (content.image.width() as f64, content.image.height() as f64);
                let avail_h = cell_h - band;
                let scale = if img_w > 0.0 && img_h > 0.0 {
                    (cell_w / img_w).min(avail_h / img_h)
                } else {
                    0.0
                };
                let image = Rect::new(
                    bounds.x + (cell_w - img_w * scale) / 2.0,
                    bounds.y + band + (avail_h - img_h * scale) / 2.0,
                    img_w * scale,
                    img_h * scale,
                );
                let title_anchor = content
                    .title
                    .as_ref()
                    .map(|_| (bounds.x + cell_w / 2.0, image.y - band * 0.25));

                Some(CellFrame {
                    bounds,
                    image,
                    scale,
                    title_anchor,
                })
            })
            .collect();

        Self {
            width,
            height,
            header,
            title_anchor,
            frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use panel_core::{Canvas, Cell, CellContent, GridShape, ImageBuffer};

    fn grid(cells: Vec<Cell>, rows: usize, cols: usize) -> RenderableGrid {
        RenderableGrid {
            shape: GridShape::new(rows, cols).unwrap(),
            canvas: Canvas {
                width: 2.0 * cols as f64,
                height: 2.0 * rows as f64,
                ratio_hint: Some(2.0),
            },
            title: None,
            cells,
        }
    }

    fn visible(width: usize, height: usize) -> Cell {
        Cell::Image(Box::new(CellContent {
            row: 0,
            image_key: 0,
            image: ImageBuffer::from_gray(Array2::zeros((height, width))),
            markers: Vec::new(),
            scale_bar: None,
            title: None,
            texts: Vec::new(),
        }))
    }

    #[test]
    fn test_square_cells_fill_slots() {
        let page = PageGeometry::compute(
            &grid(vec![visible(50, 50), visible(50, 50), Cell::Blank, Cell::Blank], 2, 2),
            &RenderStyle::default(),
        );
        assert_eq!((page.width, page.height), (400, 400));
        assert!(page.frames[2].is_none());

        let second = page.frames[1].as_ref().unwrap();
        assert_eq!(second.image, Rect::new(200.0, 0.0, 200.0, 200.0));
        assert_eq!(second.scale, 4.0);
        assert_eq!(second.to_page(PixelPoint::new(25.0, 25.0)), (302.0, 102.0));
    }

    #[test]
    fn test_wide_cutout_is_letterboxed() {
        let page = PageGeometry::compute(&grid(vec![visible(100, 50)], 1, 1), &RenderStyle::default());
        let frame = page.frames[0].as_ref().unwrap();
        assert_eq!(frame.image, Rect::new(0.0, 50.0, 200.0, 100.0));
    }
}
