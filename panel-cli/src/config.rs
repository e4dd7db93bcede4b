//! Configuration handling for the panelcreator CLI
//!
//! Supports loading configuration from panelcreator.toml files with CLI argument overrides.

use anyhow::{Context, Result};
use panel_core::annotation::{DEFAULT_MARKER_SIZE, DEFAULT_PIXSCALE, DEFAULT_SCALEBAR_ARCSEC, DEFAULT_SCALEBAR_MARGIN};
use panel_core::{AnnotationConfig, ColumnNames, TextBox};
use panel_render::{Colormap, OutputFormat, RenderStyle};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File looked up in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "panelcreator.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub annotation: AnnotationSection,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub columns: ColumnNames,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Grid rows
    #[serde(default = "default_rows")]
    pub rows: usize,

    /// Grid columns
    #[serde(default = "default_cols")]
    pub cols: usize,

    /// Cell edge length in canvas units
    #[serde(default)]
    pub image_size: Option<f64>,

    /// Explicit canvas size `[width, height]`
    #[serde(default)]
    pub figsize: Option<[f64; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationSection {
    /// Draw the center and background markers
    #[serde(default = "default_true")]
    pub mark: bool,

    /// Draw the scale bar
    #[serde(default = "default_true")]
    pub scalebar: bool,

    #[serde(default)]
    pub title_format: Option<String>,

    #[serde(default)]
    pub title_size: Option<f64>,

    /// Page-level title
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub page_title_size: Option<f64>,

    /// Pixel scale in degrees per pixel
    #[serde(default = "default_pixscale")]
    pub pixscale: f64,

    #[serde(default = "default_scalebar_arcsec")]
    pub scalebar_arcsec: f64,

    #[serde(default = "default_scalebar_margin")]
    pub scalebar_margin: f64,

    #[serde(default = "default_marker_size")]
    pub marker_size: f64,

    /// Sample pages at random instead of walking the table
    #[serde(default)]
    pub random: bool,

    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub textboxes: Vec<TextBox>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Output format: png or svg
    #[serde(default = "default_format")]
    pub format: OutputFormat,

    /// Path prefix; pages are written as `<prefix><cursor>.<ext>`
    #[serde(default = "default_prefix")]
    pub prefix: PathBuf,

    /// Pixels per canvas unit
    #[serde(default = "default_dpi")]
    pub dpi: u32,

    #[serde(default = "default_background")]
    pub background_color: String,

    #[serde(default = "default_text_color")]
    pub text_color: String,

    #[serde(default = "default_font_size")]
    pub font_size: f64,

    /// Colouring of single-channel cutouts: viridis or gray
    #[serde(default)]
    pub colormap: Colormap,
}

// Default value functions
fn default_rows() -> usize { 4 }
fn default_cols() -> usize { 4 }
fn default_true() -> bool { true }
fn default_pixscale() -> f64 { DEFAULT_PIXSCALE }
fn default_scalebar_arcsec() -> f64 { DEFAULT_SCALEBAR_ARCSEC }
fn default_scalebar_margin() -> f64 { DEFAULT_SCALEBAR_MARGIN }
fn default_marker_size() -> f64 { DEFAULT_MARKER_SIZE }
fn default_format() -> OutputFormat { OutputFormat::Png }
fn default_prefix() -> PathBuf { PathBuf::from("panel_") }
fn default_dpi() -> u32 { 100 }
fn default_background() -> String { "#ffffff".to_string() }
fn default_text_color() -> String { "#000000".to_string() }
fn default_font_size() -> f64 { 10.0 }

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            rows: default_rows(),
            cols: default_cols(),
            image_size: None,
            figsize: None,
        }
    }
}

impl Default for AnnotationSection {
    fn default() -> Self {
        Self {
            mark: true,
            scalebar: true,
            title_format: None,
            title_size: None,
            title: None,
            page_title_size: None,
            pixscale: default_pixscale(),
            scalebar_arcsec: default_scalebar_arcsec(),
            scalebar_margin: default_scalebar_margin(),
            marker_size: default_marker_size(),
            random: false,
            seed: None,
            textboxes: Vec::new(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            prefix: default_prefix(),
            dpi: default_dpi(),
            background_color: default_background(),
            text_color: default_text_color(),
            font_size: default_font_size(),
            colormap: Colormap::default(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    log::info!("Loading configuration from: {}", DEFAULT_CONFIG_FILE);
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("Using default configuration");
                    Self::default()
                }
            }
        };

        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default()).context("Failed to serialize default configuration")
    }

    /// Annotation settings for the layout engine
    pub fn annotation_config(&self) -> AnnotationConfig {
        let a = &self.annotation;
        AnnotationConfig {
            mark: a.mark,
            scalebar: a.scalebar,
            title_format: a.title_format.clone(),
            title_size: a.title_size,
            textboxes: a.textboxes.clone(),
            image_size: self.layout.image_size,
            figsize: self.layout.figsize.map(|[w, h]| (w, h)),
            random: a.random,
            seed: a.seed,
            pixscale: a.pixscale,
            scalebar_arcsec: a.scalebar_arcsec,
            scalebar_margin: a.scalebar_margin,
            marker_size: a.marker_size,
            page_title: a.title.clone(),
            page_title_size: a.page_title_size,
            columns: self.columns.clone(),
        }
    }

    pub fn render_style(&self) -> RenderStyle {
        RenderStyle {
            dpi: self.export.dpi,
            background_color: self.export.background_color.clone(),
            text_color: self.export.text_color.clone(),
            font_size: self.export.font_size,
            colormap: self.export.colormap,
            ..RenderStyle::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!((config.layout.rows, config.layout.cols), (4, 4));
        assert!(config.annotation.mark);
        assert!(config.annotation.scalebar);
        assert_eq!(config.export.format, OutputFormat::Png);
        assert_eq!(config.columns.image_key, "index_FG");
    }

    #[test]
    fn test_config_roundtrip() -> Result<()> {
        let mut config = Config::default();
        config.annotation.textboxes.push(TextBox::new(0.05, 0.95, "z={z:.2f}"));
        config.layout.figsize = Some([8.0, 6.0]);
        let temp_file = NamedTempFile::new()?;

        config.save_to_file(temp_file.path())?;
        let loaded = Config::load_from_file(temp_file.path())?;

        assert_eq!(loaded.annotation.textboxes, config.annotation.textboxes);
        assert_eq!(loaded.layout.figsize, Some([8.0, 6.0]));
        assert_eq!(loaded.export.dpi, config.export.dpi);

        Ok(())
    }

    #[test]
    fn test_partial_file_uses_defaults() -> Result<()> {
        let config: Config = toml::from_str(
            r#"
            [layout]
            rows = 2

            [annotation]
            scalebar = false
            title_format = "{name}"

            [export]
            format = "svg"
            colormap = "gray"

            [columns]
            image_key = "idx"
            "#,
        )?;

        assert_eq!((config.layout.rows, config.layout.cols), (2, 4));
        assert!(config.annotation.mark);
        assert!(!config.annotation.scalebar);
        assert_eq!(config.export.format, OutputFormat::Svg);
        assert_eq!(config.render_style().colormap, Colormap::Gray);
        assert_eq!(config.columns.image_key, "idx");
        assert_eq!(config.columns.ra_fg, "Ra_FG");

        let annotation = config.annotation_config();
        assert_eq!(annotation.title_format.as_deref(), Some("{name}"));
        assert_eq!(annotation.columns.image_key, "idx");
        Ok(())
    }

    #[test]
    fn test_example_toml_generation() -> Result<()> {
        let example = Config::example_toml()?;
        assert!(example.contains("[layout]"));
        assert!(example.contains("[annotation]"));
        assert!(example.contains("[export]"));
        Ok(())
    }
}
