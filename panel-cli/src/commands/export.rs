//! Export command implementation - write every page of a table as PNG or SVG

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use panel_core::{
    load_table, AnnotationConfig, Cursor, GridShape, PanelLayout, PanelResult, PanelSink, Paginator,
    RenderableGrid, StoreRegistry,
};
use panel_render::{OutputFormat, PngSink, RenderStyle, SvgSink};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::{ExportArgs, ExportFormat};

/// Everything an export run needs once file config and CLI flags are merged
#[derive(Debug, Clone)]
pub struct ExportPlan {
    pub shape: GridShape,
    pub annotation: AnnotationConfig,
    pub style: RenderStyle,
    pub format: OutputFormat,
    pub prefix: PathBuf,
    pub start: Cursor,
}

impl ExportPlan {
    /// CLI flags win over the configuration file
    pub fn resolve(config: &Config, args: &ExportArgs) -> Result<Self> {
        let rows = args.rows.unwrap_or(config.layout.rows);
        let cols = args.cols.unwrap_or(config.layout.cols);
        let shape = GridShape::new(rows, cols).context("Invalid grid shape")?;

        let mut annotation = config.annotation_config();
        if args.no_mark {
            annotation.mark = false;
        }
        if args.no_scalebar {
            annotation.scalebar = false;
        }
        if args.random {
            annotation.random = true;
        }
        if args.seed.is_some() {
            annotation.seed = args.seed;
        }
        if args.image_size.is_some() {
            annotation.image_size = args.image_size;
        }
        if let Some(figsize) = &args.figsize {
            match figsize.as_slice() {
                [w, h] => annotation.figsize = Some((*w, *h)),
                other => return Err(anyhow!("--figsize takes WIDTH HEIGHT, got {} values", other.len())),
            }
        }
        if args.title_format.is_some() {
            annotation.title_format = args.title_format.clone();
        }
        if args.title_size.is_some() {
            annotation.title_size = args.title_size;
        }
        if args.title.is_some() {
            annotation.page_title = args.title.clone();
        }
        if args.page_title_size.is_some() {
            annotation.page_title_size = args.page_title_size;
        }
        annotation.validate().context("Invalid annotation settings")?;

        let mut style = config.render_style();
        if let Some(dpi) = args.dpi {
            style.dpi = dpi;
        }

        let format = match args.format {
            Some(ExportFormat::Png) => OutputFormat::Png,
            Some(ExportFormat::Svg) => OutputFormat::Svg,
            None => config.export.format,
        };

        Ok(Self {
            shape,
            annotation,
            style,
            format,
            prefix: args.out.clone().unwrap_or_else(|| config.export.prefix.clone()),
            start: Cursor(args.start),
        })
    }
}

pub fn execute(config: &Config, args: ExportArgs, quiet: bool) -> Result<()> {
    log::info!("Starting panel export");
    log::info!("Record table: {}", args.table.display());
    log::info!("Image cube: {}", args.images.display());

    let plan = ExportPlan::resolve(config, &args)?;
    let written = run(&plan, &args.table, &args.images, quiet)?;

    log::info!(
        "Wrote {} {} pages with prefix {}",
        written.len(),
        plan.format.extension(),
        plan.prefix.display()
    );
    Ok(())
}

/// Load inputs, paginate and write every page; returns the written paths
pub fn run(plan: &ExportPlan, table_path: &Path, images_path: &Path, quiet: bool) -> Result<Vec<PathBuf>> {
    let table = load_table(table_path, &plan.annotation.columns)
        .with_context(|| format!("Failed to load record table {}", table_path.display()))?;

    let registry = StoreRegistry::new();
    let store = registry
        .open(images_path)
        .with_context(|| format!("Failed to load image cube {}", images_path.display()))?;
    log::info!(
        "Loaded {} records and {} images",
        table.len(),
        store.len()
    );

    if let Some(parent) = plan.prefix.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
        }
    }

    let paginator = Paginator::new(&table, PanelLayout::new(plan.shape, &store));
    let pages = paginator.page_count(plan.start, plan.shape.len());

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(pages as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} pages {msg}")
                .context("Invalid progress template")?
                .progress_chars("=> "),
        );
        bar
    };

    let written = match plan.format {
        OutputFormat::Png => {
            let mut sink = PngSink::new(&plan.prefix, plan.style.clone());
            export_with_progress(&paginator, &mut sink, plan, &progress)?;
            sink.written().to_vec()
        }
        OutputFormat::Svg => {
            let mut sink = SvgSink::new(&plan.prefix, plan.style.clone());
            export_with_progress(&paginator, &mut sink, plan, &progress)?;
            sink.written().to_vec()
        }
    };

    progress.finish_with_message("done");
    Ok(written)
}

fn export_with_progress<S: PanelSink>(
    paginator: &Paginator<'_>,
    sink: &mut S,
    plan: &ExportPlan,
    progress: &ProgressBar,
) -> Result<usize> {
    let mut tracked = |grid: &RenderableGrid, cursor: Cursor| -> PanelResult<()> {
        sink.emit(grid, cursor)?;
        progress.set_message(format!("{}", cursor));
        progress.inc(1);
        Ok(())
    };
    let pages = paginator
        .export_all(&mut tracked, &plan.annotation, plan.start)
        .context("Export failed")?;
    Ok(pages)
}
