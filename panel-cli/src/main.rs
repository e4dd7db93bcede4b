use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod commands;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "panelcreator")]
#[command(about = "PanelCreator - annotated image panels for astronomical cutouts")]
#[command(version)]
#[command(long_about = "
PanelCreator lays cutout images out on paginated grids, marks the foreground
and background objects, adds a calibrated scale bar and templated text, and
writes every page to disk.

Examples:
  panelcreator export --table lenses.csv --images cutouts.npy --rows 4 --cols 5
  panelcreator export --table lenses.csv --images cutouts.npy --format svg --title-format '{name} z={z:.2f}'
  panelcreator info --table lenses.csv --images cutouts.npy
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export every page of the table as PNG or SVG files
    Export(ExportArgs),

    /// Summarise a table and image cube without rendering
    Info {
        /// Record table (CSV, TSV or JSON)
        #[arg(long, required = true)]
        table: PathBuf,

        /// Image cube (.npy)
        #[arg(long)]
        images: Option<PathBuf>,

        /// Grid rows used for the page count
        #[arg(long)]
        rows: Option<usize>,

        /// Grid columns used for the page count
        #[arg(long)]
        cols: Option<usize>,
    },

    /// Print an example configuration file, or write it with --output
    Config {
        /// Write the configuration to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Record table (CSV, TSV or JSON)
    #[arg(long, required = true)]
    pub table: PathBuf,

    /// Image cube (.npy)
    #[arg(long, required = true)]
    pub images: PathBuf,

    /// Output path prefix; pages are written as <prefix><cursor>.<ext>
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Output format
    #[arg(long)]
    pub format: Option<ExportFormat>,

    /// Grid rows
    #[arg(long)]
    pub rows: Option<usize>,

    /// Grid columns
    #[arg(long)]
    pub cols: Option<usize>,

    /// Cell edge length in canvas units
    #[arg(long)]
    pub image_size: Option<f64>,

    /// Explicit canvas width and height in canvas units
    #[arg(long, num_args = 2, value_names = ["WIDTH", "HEIGHT"])]
    pub figsize: Option<Vec<f64>>,

    /// Per-cell title template, e.g. '{name} z={z:.2f}'
    #[arg(long)]
    pub title_format: Option<String>,

    /// Per-cell title font size in points
    #[arg(long)]
    pub title_size: Option<f64>,

    /// Page title
    #[arg(long)]
    pub title: Option<String>,

    /// Page title font size in points
    #[arg(long)]
    pub page_title_size: Option<f64>,

    /// Do not draw the center and background markers
    #[arg(long)]
    pub no_mark: bool,

    /// Do not draw the scale bar
    #[arg(long)]
    pub no_scalebar: bool,

    /// Sample each page at random from the whole table
    #[arg(long)]
    pub random: bool,

    /// Seed for random sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Pixels per canvas unit
    #[arg(long)]
    pub dpi: Option<u32>,

    /// Table offset of the first exported page
    #[arg(long, default_value = "0")]
    pub start: usize,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ExportFormat {
    Png,
    Svg,
}

fn setup_logging(verbose: u8, quiet: bool) {
    let log_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(cli.verbose, cli.quiet);

    // Load configuration
    let config = Config::load(cli.config.as_deref())?;

    // Execute the requested command
    match cli.command {
        Commands::Export(args) => {
            commands::export::execute(&config, args, cli.quiet)?;
        }
        Commands::Info {
            table,
            images,
            rows,
            cols,
        } => {
            commands::info::execute(&config, table, images, rows, cols)?;
        }
        Commands::Config { output } => match output {
            Some(path) => {
                Config::default().save_to_file(&path)?;
                log::info!("Wrote example configuration to {}", path.display());
            }
            None => print!("{}", Config::example_toml()?),
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_output_flag() {
        let cli = Cli::try_parse_from(["panelcreator", "config", "--output", "panels.toml"]).unwrap();
        match cli.command {
            Commands::Config { output } => assert_eq!(output, Some(PathBuf::from("panels.toml"))),
            _ => panic!("expected config command"),
        }

        let cli = Cli::try_parse_from(["panelcreator", "-q", "config"]).unwrap();
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Config { output: None }));
    }
}
