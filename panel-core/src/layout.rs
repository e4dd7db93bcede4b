//! Panel layout: one page of records into an M x N grid of annotated cells

use crate::annotation::{
    center_marker, offset_marker, scale_bar, Marker, MarkerColor, ScaleBar, TextBox, TextOverlay,
    DEFAULT_MARKER_SIZE, DEFAULT_PIXSCALE, DEFAULT_SCALEBAR_ARCSEC, DEFAULT_SCALEBAR_MARGIN,
};
use crate::error::{PanelError, PanelResult};
use crate::format::format_template;
use crate::store::{ImageBuffer, ImageStore};
use crate::types::{ColumnNames, Page};
use serde::{Deserialize, Serialize};

/// Cell edge length used when `image_size` is not given
pub const DEFAULT_IMAGE_SIZE: f64 = 2.0;

/// Upper bound used by the canvas ratio hint
pub const RATIO_HINT_CAP: f64 = 10.0;

/// Grid dimensions: `rows` (M) by `cols` (N)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridShape {
    pub rows: usize,
    pub cols: usize,
}

impl GridShape {
    pub fn new(rows: usize, cols: usize) -> PanelResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(PanelError::invalid_config(format!(
                "grid must have at least one row and column, got {}x{}",
                rows, cols
            )));
        }
        Ok(Self { rows, cols })
    }

    /// Number of cells, which is also the page size
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row and column of a row-major cell index
    pub fn position(&self, index: usize) -> (usize, usize) {
        (index / self.cols, index % self.cols)
    }
}

/// Switches and parameters for every rendering step.
///
/// An unset option skips its step: no markers, no scale bar, no titles and no
/// text boxes unless asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub mark: bool,
    pub scalebar: bool,
    pub title_format: Option<String>,
    pub title_size: Option<f64>,
    pub textboxes: Vec<TextBox>,
    pub image_size: Option<f64>,
    pub figsize: Option<(f64, f64)>,
    pub random: bool,
    pub seed: Option<u64>,
    pub pixscale: f64,
    pub scalebar_arcsec: f64,
    pub scalebar_margin: f64,
    pub marker_size: f64,
    pub page_title: Option<String>,
    pub page_title_size: Option<f64>,
    pub columns: ColumnNames,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            mark: false,
            scalebar: false,
            title_format: None,
            title_size: None,
            textboxes: Vec::new(),
            image_size: None,
            figsize: None,
            random: false,
            seed: None,
            pixscale: DEFAULT_PIXSCALE,
            scalebar_arcsec: DEFAULT_SCALEBAR_ARCSEC,
            scalebar_margin: DEFAULT_SCALEBAR_MARGIN,
            marker_size: DEFAULT_MARKER_SIZE,
            page_title: None,
            page_title_size: None,
            columns: ColumnNames::default(),
        }
    }
}

impl AnnotationConfig {
    /// Reject values no layout can honour
    pub fn validate(&self) -> PanelResult<()> {
        if !(self.pixscale.is_finite() && self.pixscale > 0.0) {
            return Err(PanelError::invalid_config(format!(
                "pixscale must be positive, got {}",
                self.pixscale
            )));
        }
        if !self.scalebar_arcsec.is_finite() || self.scalebar_arcsec <= 0.0 {
            return Err(PanelError::invalid_config(format!(
                "scalebar length must be positive, got {}",
                self.scalebar_arcsec
            )));
        }
        if !self.scalebar_margin.is_finite() || self.scalebar_margin < 0.0 {
            return Err(PanelError::invalid_config(format!(
                "scalebar margin must be non-negative, got {}",
                self.scalebar_margin
            )));
        }
        Ok(())
    }
}

/// Canvas size in layout units, plus the capped ratio hint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
    /// `min(min(s*N, 10)/N, min(s*M, 10)/M)` when the size was derived from
    /// `image_size`. Carried for post-processing; it never bounds the canvas.
    pub ratio_hint: Option<f64>,
}

/// Resolve the canvas size from `image_size` and an optional explicit `figsize`
pub fn resolve_canvas(
    shape: GridShape,
    image_size: Option<f64>,
    figsize: Option<(f64, f64)>,
) -> PanelResult<Canvas> {
    let image_size = match image_size {
        None => DEFAULT_IMAGE_SIZE,
        Some(v) if !v.is_finite() => {
            return Err(PanelError::invalid_config(format!(
                "image_size must be a number, got {}",
                v
            )))
        }
        Some(v) if v <= 0.0 => {
            return Err(PanelError::invalid_config(format!(
                "image_size must be positive, got {}",
                v
            )))
        }
        Some(v) => v,
    };

    if let Some((width, height)) = figsize {
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(PanelError::invalid_config(format!(
                "figsize must be positive, got ({}, {})",
                width, height
            )));
        }
        return Ok(Canvas {
            width,
            height,
            ratio_hint: None,
        });
    }

    let cols = shape.cols as f64;
    let rows = shape.rows as f64;
    let ratio = ((image_size * cols).min(RATIO_HINT_CAP) / cols)
        .min((image_size * rows).min(RATIO_HINT_CAP) / rows);

    Ok(Canvas {
        width: image_size * cols,
        height: image_size * rows,
        ratio_hint: Some(ratio),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellTitle {
    pub text: String,
    pub size: Option<f64>,
}

/// A visible cell: one record's image and its annotations
#[derive(Debug, Clone, PartialEq)]
pub struct CellContent {
    pub row: usize,
    pub image_key: i64,
    pub image: ImageBuffer,
    pub markers: Vec<Marker>,
    pub scale_bar: Option<ScaleBar>,
    pub title: Option<CellTitle>,
    pub texts: Vec<TextOverlay>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Blank,
    Image(Box<CellContent>),
}

impl Cell {
    pub fn is_visible(&self) -> bool {
        matches!(self, Cell::Image(_))
    }

    pub fn content(&self) -> Option<&CellContent> {
        match self {
            Cell::Image(content) => Some(content),
            Cell::Blank => None,
        }
    }
}

/// Everything a renderer needs to draw one panel
#[derive(Debug, Clone, PartialEq)]
pub struct RenderableGrid {
    pub shape: GridShape,
    pub canvas: Canvas,
    pub title: Option<CellTitle>,
    pub cells: Vec<Cell>,
}

impl RenderableGrid {
    pub fn visible_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.is_visible()).count()
    }
}

/// Lays out pages onto a fixed grid, reading pixels from one image store
pub struct PanelLayout<'s> {
    shape: GridShape,
    store: &'s ImageStore,
}

impl<'s> PanelLayout<'s> {
    pub fn new(shape: GridShape, store: &'s ImageStore) -> Self {
        Self { shape, store }
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// Build the grid for one page. Cells past the end of the page are blank
    /// and never touch the image store.
    pub fn build_page(&self, page: &Page<'_>, config: &AnnotationConfig) -> PanelResult<RenderableGrid> {
        config.validate()?;
        let canvas = resolve_canvas(self.shape, config.image_size, config.figsize)?;

        if page.len() > self.shape.len() {
            return Err(PanelError::invalid_config(format!(
                "page holds {} records but the grid has {} cells",
                page.len(),
                self.shape.len()
            )));
        }

        let mut cells = Vec::with_capacity(self.shape.len());
        for index in 0..self.shape.len() {
            match page.records().get(index) {
                Some(record) => {
                    let image = self.store.get_image(record.image_key)?;
                    let (width, height) = (image.width(), image.height());

                    let mut markers = Vec::new();
                    if config.mark {
                        let center = center_marker(width, height);
                        let (fg, bg) = record.sky_pair(&config.columns)?;
                        markers.push(Marker {
                            position: center,
                            color: MarkerColor::Red,
                            size: config.marker_size,
                        });
                        markers.push(Marker {
                            position: offset_marker(center, fg, bg, config.pixscale),
                            color: MarkerColor::Blue,
                            size: config.marker_size,
                        });
                    }

                    let scale_bar = config.scalebar.then(|| {
                        scale_bar(
                            height,
                            config.scalebar_arcsec,
                            config.pixscale,
                            config.scalebar_margin,
                        )
                    });

                    let title = match config.title_format.as_deref() {
                        Some(template) if !template.is_empty() => Some(CellTitle {
                            text: format_template(template, &record.fields)?,
                            size: config.title_size,
                        }),
                        _ => None,
                    };

                    let texts = config
                        .textboxes
                        .iter()
                        .map(|tb| tb.draw(&record.fields))
                        .collect::<PanelResult<Vec<_>>>()?;

                    cells.push(Cell::Image(Box::new(CellContent {
                        row: record.row,
                        image_key: record.image_key,
                        image,
                        markers,
                        scale_bar,
                        title,
                        texts,
                    })));
                }
                None => cells.push(Cell::Blank),
            }
        }

        log::debug!(
            "Laid out {} of {} cells on a {}x{} grid",
            page.len(),
            self.shape.len(),
            self.shape.rows,
            self.shape.cols
        );

        Ok(RenderableGrid {
            shape: self.shape,
            canvas,
            title: config.page_title.as_ref().map(|text| CellTitle {
                text: text.clone(),
                size: config.page_title_size,
            }),
            cells,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::TextBox;
    use crate::types::{FieldValue, Record};
    use ndarray::Array4;
    use std::collections::BTreeMap;

    fn record(row: usize, key: i64) -> Record {
        let mut fields = BTreeMap::new();
        fields.insert("index_FG".to_string(), FieldValue::Int(key));
        fields.insert("Ra_FG".to_string(), FieldValue::Float(10.0));
        fields.insert("Dec_FG".to_string(), FieldValue::Float(0.0));
        fields.insert("Ra_BG".to_string(), FieldValue::Float(10.001));
        fields.insert("Dec_BG".to_string(), FieldValue::Float(0.0));
        fields.insert("name".to_string(), FieldValue::Text(format!("obj{}", row)));
        Record::from_fields(row, fields, &ColumnNames::default()).unwrap()
    }

    fn store(count: usize) -> ImageStore {
        ImageStore::from_cube("mem.npy", Array4::zeros((count, 100, 100, 1)))
    }

    #[test]
    fn test_grid_shape() {
        let shape = GridShape::new(2, 3).unwrap();
        assert_eq!(shape.len(), 6);
        assert_eq!(shape.position(4), (1, 1));
        assert!(GridShape::new(0, 3).is_err());
    }

    #[test]
    fn test_canvas_defaults() {
        let canvas = resolve_canvas(GridShape::new(3, 4).unwrap(), None, None).unwrap();
        assert_eq!((canvas.width, canvas.height), (8.0, 6.0));
        assert_eq!(canvas.ratio_hint, Some(2.0));
    }

    #[test]
    fn test_ratio_hint_does_not_bound_canvas() {
        // 8 columns of size 3 would be capped to 10 units by the hint
        let canvas = resolve_canvas(GridShape::new(2, 8).unwrap(), Some(3.0), None).unwrap();
        assert_eq!((canvas.width, canvas.height), (24.0, 6.0));
        assert_eq!(canvas.ratio_hint, Some(1.25));
    }

    #[test]
    fn test_explicit_figsize_wins() {
        let canvas = resolve_canvas(GridShape::new(2, 2).unwrap(), Some(5.0), Some((7.0, 3.0))).unwrap();
        assert_eq!((canvas.width, canvas.height, canvas.ratio_hint), (7.0, 3.0, None));
    }

    #[test]
    fn test_invalid_image_size() {
        let shape = GridShape::new(1, 1).unwrap();
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                resolve_canvas(shape, Some(bad), None),
                Err(PanelError::InvalidConfig(_))
            ));
        }
        assert!(resolve_canvas(shape, None, Some((0.0, 2.0))).is_err());
    }

    #[test]
    fn test_partial_page_has_blank_tail() {
        let store = store(2);
        let records = [record(0, 0), record(1, 1)];
        let page = Page::new(records.iter().collect());
        let layout = PanelLayout::new(GridShape::new(2, 2).unwrap(), &store);

        let grid = layout.build_page(&page, &AnnotationConfig::default()).unwrap();
        assert_eq!(grid.cells.len(), 4);
        assert_eq!(grid.visible_cells(), 2);
        assert!(!grid.cells[2].is_visible());
        assert!(!grid.cells[3].is_visible());

        let first = grid.cells[0].content().unwrap();
        assert!(first.markers.is_empty());
        assert!(first.scale_bar.is_none());
        assert!(first.title.is_none());
    }

    #[test]
    fn test_blank_cells_skip_image_lookup() {
        // The store is unloaded; only visible cells may touch it
        let store = store(1);
        store.unload();
        let layout = PanelLayout::new(GridShape::new(1, 3).unwrap(), &store);
        let grid = layout.build_page(&Page::new(Vec::new()), &AnnotationConfig::default()).unwrap();
        assert_eq!(grid.visible_cells(), 0);
    }

    #[test]
    fn test_annotations_follow_config() {
        let store = store(1);
        let records = [record(0, 0)];
        let page = Page::new(records.iter().collect());
        let layout = PanelLayout::new(GridShape::new(1, 1).unwrap(), &store);
        let config = AnnotationConfig {
            mark: true,
            scalebar: true,
            title_format: Some("{name} #{index_FG}".to_string()),
            title_size: Some(8.0),
            textboxes: vec![TextBox::new(0.05, 0.95, "RA {Ra_FG:.1f}")],
            page_title: Some("Lenses".to_string()),
            ..AnnotationConfig::default()
        };

        let grid = layout.build_page(&page, &config).unwrap();
        let cell = grid.cells[0].content().unwrap();

        assert_eq!(cell.markers.len(), 2);
        assert_eq!(cell.markers[0].color, MarkerColor::Red);
        assert_eq!((cell.markers[0].position.x, cell.markers[0].position.y), (50.0, 50.0));
        assert!((cell.markers[1].position.x - 36.26).abs() < 0.01);
        assert_eq!(cell.markers[1].position.y, 50.0);

        let bar = cell.scale_bar.as_ref().unwrap();
        assert!((bar.length_px - 7.63).abs() < 0.01);

        let title = cell.title.as_ref().unwrap();
        assert_eq!(title.text, "obj0 #0");
        assert_eq!(title.size, Some(8.0));
        assert_eq!(cell.texts[0].text, "RA 10.0");
        assert_eq!(grid.title.as_ref().map(|t| t.text.as_str()), Some("Lenses"));
    }

    #[test]
    fn test_missing_image_aborts_page() {
        let store = store(1);
        let records = [record(0, 5)];
        let page = Page::new(records.iter().collect());
        let layout = PanelLayout::new(GridShape::new(1, 1).unwrap(), &store);
        assert!(matches!(
            layout.build_page(&page, &AnnotationConfig::default()),
            Err(PanelError::OutOfRange { index: 5, len: 1 })
        ));
    }

    #[test]
    fn test_mark_requires_coordinates() {
        let store = store(1);
        let mut fields = BTreeMap::new();
        fields.insert("index_FG".to_string(), FieldValue::Int(0));
        let records = [Record::from_fields(0, fields, &ColumnNames::default()).unwrap()];
        let page = Page::new(records.iter().collect());
        let layout = PanelLayout::new(GridShape::new(1, 1).unwrap(), &store);
        let config = AnnotationConfig { mark: true, ..AnnotationConfig::default() };
        assert!(matches!(
            layout.build_page(&page, &config),
            Err(PanelError::MissingField { row: 0, .. })
        ));
    }

    #[test]
    fn test_oversized_page_rejected() {
        let store = store(3);
        let records = [record(0, 0), record(1, 1), record(2, 2)];
        let page = Page::new(records.iter().collect());
        let layout = PanelLayout::new(GridShape::new(1, 2).unwrap(), &store);
        assert!(layout.build_page(&page, &AnnotationConfig::default()).is_err());
    }
}
