//! Pagination over a record table
//!
//! The cursor is an explicit value: [`Paginator::current_page`] reads the page
//! at a cursor, [`Paginator::advance`] returns the next cursor or `None` once
//! the table is exhausted, and [`Paginator::export_all`] drives the
//! build-emit-advance loop against a [`PanelSink`].

use crate::error::PanelResult;
use crate::layout::{AnnotationConfig, PanelLayout, RenderableGrid};
use crate::types::{Page, Table};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt;
use std::path::{Path, PathBuf};

/// Offset of the first record on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cursor(pub usize);

impl Cursor {
    pub const START: Cursor = Cursor(0);

    pub fn offset(self) -> usize {
        self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// How records are chosen for a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sampling {
    /// Contiguous window starting at the cursor
    #[default]
    Sequential,
    /// Sample without replacement from the whole table. The page at a given
    /// cursor is drawn from `seed + cursor`, so re-reading it is stable.
    Random { seed: u64 },
}

impl Sampling {
    /// Sampling requested by a config; an unseeded random run draws its seed
    /// from entropy and logs it so the run can be repeated
    pub fn from_config(config: &AnnotationConfig) -> Self {
        if !config.random {
            return Sampling::Sequential;
        }
        let seed = config.seed.unwrap_or_else(|| {
            let seed = rand::random::<u64>();
            log::info!("Random sampling with seed {}", seed);
            seed
        });
        Sampling::Random { seed }
    }
}

/// Receives each laid-out page during an export
pub trait PanelSink {
    fn emit(&mut self, grid: &RenderableGrid, cursor: Cursor) -> PanelResult<()>;
}

impl<F> PanelSink for F
where
    F: FnMut(&RenderableGrid, Cursor) -> PanelResult<()>,
{
    fn emit(&mut self, grid: &RenderableGrid, cursor: Cursor) -> PanelResult<()> {
        self(grid, cursor)
    }
}

/// Output file for the page at `cursor`: `base` followed by the zero-padded
/// cursor and `extension` (`"panel_"` gives `panel_0016.png`)
pub fn page_path<P: AsRef<Path>>(base: P, cursor: Cursor, extension: &str) -> PathBuf {
    let mut name = base.as_ref().as_os_str().to_os_string();
    name.push(format!("{:04}", cursor.0));
    if !extension.is_empty() {
        name.push(".");
        name.push(extension.trim_start_matches('.'));
    }
    PathBuf::from(name)
}

/// Pages emitted when exporting `records` records from `start`, `panel_size`
/// at a time. At least one page is always emitted.
pub fn page_count(records: usize, start: Cursor, panel_size: usize) -> usize {
    if panel_size == 0 {
        return 1;
    }
    records.saturating_sub(start.0).div_ceil(panel_size).max(1)
}

/// Walks a table page by page and lays each page out on a fixed grid
pub struct Paginator<'a> {
    table: &'a Table,
    layout: PanelLayout<'a>,
}

impl<'a> Paginator<'a> {
    pub fn new(table: &'a Table, layout: PanelLayout<'a>) -> Self {
        Self { table, layout }
    }

    /// Records per page
    pub fn panel_size(&self) -> usize {
        self.layout.shape().len()
    }

    /// Records on the page at `cursor`
    pub fn current_page(&self, cursor: Cursor, panel_size: usize, sampling: Sampling) -> Page<'a> {
        let records = self.table.records();
        match sampling {
            Sampling::Sequential => {
                let start = cursor.0.min(records.len());
                let end = cursor.0.saturating_add(panel_size).min(records.len());
                Page::new(records[start..end].iter().collect())
            }
            Sampling::Random { seed } => {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(cursor.0 as u64));
                let amount = panel_size.min(records.len());
                Page::new(records.choose_multiple(&mut rng, amount).collect())
            }
        }
    }

    /// Next cursor, or `None` when no record lies beyond the current page
    pub fn advance(&self, cursor: Cursor, panel_size: usize) -> Option<Cursor> {
        let next = cursor.0.checked_add(panel_size)?;
        (next < self.table.len()).then_some(Cursor(next))
    }

    /// Number of pages an export from `start` produces
    pub fn page_count(&self, start: Cursor, panel_size: usize) -> usize {
        page_count(self.table.len(), start, panel_size)
    }

    /// Lay out the page at `cursor`
    pub fn build(&self, cursor: Cursor, config: &AnnotationConfig, sampling: Sampling) -> PanelResult<RenderableGrid> {
        let page = self.current_page(cursor, self.panel_size(), sampling);
        self.layout.build_page(&page, config)
    }

    /// Emit every page from `start` to the end of the table.
    ///
    /// The first page is always emitted, so an empty table yields one blank
    /// page. Any layout or sink error stops the export. Returns the number of
    /// pages emitted.
    pub fn export_all<S: PanelSink + ?Sized>(
        &self,
        sink: &mut S,
        config: &AnnotationConfig,
        start: Cursor,
    ) -> PanelResult<usize> {
        let sampling = Sampling::from_config(config);
        let panel_size = self.panel_size();
        let mut cursor = start;
        let mut pages = 0;

        loop {
            let grid = self.build(cursor, config, sampling)?;
            sink.emit(&grid, cursor)?;
            pages += 1;
            log::debug!("Emitted page {} ({} cells visible)", cursor, grid.visible_cells());

            match self.advance(cursor, panel_size) {
                Some(next) => cursor = next,
                None => break,
            }
        }

        log::info!("Exported {} pages from {} records", pages, self.table.len());
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::GridShape;
    use crate::store::ImageStore;
    use crate::types::{ColumnNames, FieldValue, Record};
    use ndarray::Array4;
    use std::collections::{BTreeMap, HashSet};

    fn table(len: usize) -> Table {
        let records = (0..len)
            .map(|row| {
                let mut fields = BTreeMap::new();
                fields.insert("index_FG".to_string(), FieldValue::Int(row as i64));
                Record::from_fields(row, fields, &ColumnNames::default()).unwrap()
            })
            .collect();
        Table::new(vec!["index_FG".to_string()], records)
    }

    fn store(len: usize) -> ImageStore {
        ImageStore::from_cube("mem.npy", Array4::zeros((len.max(1), 8, 8, 1)))
    }

    fn collect_pages(paginator: &Paginator<'_>) -> Vec<(Cursor, usize)> {
        let mut seen = Vec::new();
        let mut sink = |grid: &RenderableGrid, cursor: Cursor| -> PanelResult<()> {
            seen.push((cursor, grid.visible_cells()));
            Ok(())
        };
        paginator
            .export_all(&mut sink, &AnnotationConfig::default(), Cursor::START)
            .unwrap();
        seen
    }

    #[test]
    fn test_sequential_visits_every_record_once() {
        let table = table(23);
        let store = store(23);
        let paginator = Paginator::new(&table, PanelLayout::new(GridShape::new(2, 3).unwrap(), &store));

        let mut rows = Vec::new();
        let mut cursor = Cursor::START;
        loop {
            rows.extend(paginator.current_page(cursor, 6, Sampling::Sequential).rows());
            match paginator.advance(cursor, 6) {
                Some(next) => cursor = next,
                None => break,
            }
        }
        assert_eq!(rows, (0..23).collect::<Vec<_>>());
        assert_eq!(paginator.page_count(Cursor::START, 6), 4);
    }

    #[test]
    fn test_current_page_is_idempotent() {
        let table = table(10);
        let store = store(10);
        let paginator = Paginator::new(&table, PanelLayout::new(GridShape::new(1, 4).unwrap(), &store));
        let a = paginator.current_page(Cursor(4), 4, Sampling::Sequential);
        let b = paginator.current_page(Cursor(4), 4, Sampling::Sequential);
        assert_eq!(a, b);
        assert_eq!(a.rows(), vec![4, 5, 6, 7]);
        assert!(paginator.current_page(Cursor(40), 4, Sampling::Sequential).is_empty());
    }

    #[test]
    fn test_empty_table_exports_one_blank_page() {
        let table = table(0);
        let store = store(0);
        let paginator = Paginator::new(&table, PanelLayout::new(GridShape::new(2, 2).unwrap(), &store));
        assert_eq!(collect_pages(&paginator), vec![(Cursor(0), 0)]);
        assert_eq!(paginator.page_count(Cursor::START, 4), 1);
    }

    #[test]
    fn test_exact_multiple_renders_last_page() {
        let table = table(8);
        let store = store(8);
        let paginator = Paginator::new(&table, PanelLayout::new(GridShape::new(2, 2).unwrap(), &store));
        assert_eq!(collect_pages(&paginator), vec![(Cursor(0), 4), (Cursor(4), 4)]);
        assert_eq!(paginator.advance(Cursor(4), 4), None);
    }

    #[test]
    fn test_page_count_matches_export_from_offset() {
        let table = table(10);
        let store = store(10);
        let paginator = Paginator::new(&table, PanelLayout::new(GridShape::new(1, 4).unwrap(), &store));
        for start in [0, 3, 6, 10, 12] {
            let mut emitted = 0;
            let mut sink = |_: &RenderableGrid, _: Cursor| -> PanelResult<()> {
                emitted += 1;
                Ok(())
            };
            let pages = paginator
                .export_all(&mut sink, &AnnotationConfig::default(), Cursor(start))
                .unwrap();
            assert_eq!(pages, emitted);
            assert_eq!(paginator.page_count(Cursor(start), 4), pages, "start {start}");
        }
    }

    #[test]
    fn test_partial_last_page() {
        let table = table(5);
        let store = store(5);
        let paginator = Paginator::new(&table, PanelLayout::new(GridShape::new(2, 2).unwrap(), &store));
        assert_eq!(collect_pages(&paginator), vec![(Cursor(0), 4), (Cursor(4), 1)]);
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let table = table(50);
        let store = store(50);
        let paginator = Paginator::new(&table, PanelLayout::new(GridShape::new(2, 5).unwrap(), &store));
        let sampling = Sampling::Random { seed: 7 };

        let a = paginator.current_page(Cursor::START, 10, sampling).rows();
        let b = paginator.current_page(Cursor::START, 10, sampling).rows();
        assert_eq!(a, b);
        assert_eq!(a.len(), 10);
        assert_eq!(a.iter().collect::<HashSet<_>>().len(), 10);
    }

    #[test]
    fn test_random_sample_is_capped_by_table() {
        let table = table(3);
        let store = store(3);
        let paginator = Paginator::new(&table, PanelLayout::new(GridShape::new(2, 2).unwrap(), &store));
        let mut rows = paginator.current_page(Cursor::START, 4, Sampling::Random { seed: 1 }).rows();
        rows.sort_unstable();
        assert_eq!(rows, vec![0, 1, 2]);
    }

    #[test]
    fn test_page_path() {
        assert_eq!(page_path("out/panel_", Cursor(16), "png"), PathBuf::from("out/panel_0016.png"));
        assert_eq!(page_path("p", Cursor(12345), ".svg"), PathBuf::from("p12345.svg"));
        assert_eq!(Cursor(7).to_string(), "0007");
    }

    #[test]
    fn test_export_stops_on_sink_error() {
        let table = table(9);
        let store = store(9);
        let paginator = Paginator::new(&table, PanelLayout::new(GridShape::new(1, 3).unwrap(), &store));
        let mut calls = 0;
        let mut sink = |_: &RenderableGrid, cursor: Cursor| -> PanelResult<()> {
            calls += 1;
            if cursor == Cursor(3) {
                Err(crate::error::PanelError::render("disk full"))
            } else {
                Ok(())
            }
        };
        assert!(paginator
            .export_all(&mut sink, &AnnotationConfig::default(), Cursor::START)
            .is_err());
        assert_eq!(calls, 2);
    }
}
