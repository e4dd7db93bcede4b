//! PanelCreator Core Library
//!
//! Image store, annotation geometry, panel layout and pagination for
//! annotated cutout panels.

pub mod error;
pub mod types;
pub mod io;
pub mod store;
pub mod format;
pub mod annotation;
pub mod layout;
pub mod paginate;

// Re-export commonly used types and functions
pub use error::{PanelError, PanelResult};
pub use types::{ColumnNames, FieldValue, Page, Record, SkyCoord, Table};
pub use io::{load_table, read_npy, write_npy};
pub use store::{ImageBuffer, ImageStore, StoreRegistry};
pub use format::format_template;
pub use annotation::{HAlign, Marker, MarkerColor, PixelPoint, ScaleBar, TextBox, TextOverlay, VAlign};
pub use layout::{AnnotationConfig, Canvas, Cell, CellContent, CellTitle, GridShape, PanelLayout, RenderableGrid};
pub use paginate::{page_count, page_path, Cursor, PanelSink, Paginator, Sampling};

/// Version information for the panel core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
