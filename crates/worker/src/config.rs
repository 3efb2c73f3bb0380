//! Command-line interface.
//!
//! Every connection and output setting can also come from the environment
//! (a `.env` file is loaded first):
//!
//! | Env Var                    | Default                  |
//! |----------------------------|--------------------------|
//! | `ADVGRID_API_URL`          | `http://127.0.0.1:7860`  |
//! | `ADVGRID_OUTPUT_DIR`       | `outputs/grids`          |
//! | `ADVGRID_SAMPLES_FORMAT`   | `png`                    |
//! | `ADVGRID_FILENAME_PATTERN` | `[seed]-[prompt_spaces]` |

use std::path::PathBuf;

use advgrid_pipeline::{AxisSlot, GridOptions};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "advgrid")]
#[command(about = "Render every combination of parameter axes against a Stable Diffusion WebUI")]
pub struct Cli {
    /// Base URL of the WebUI instance
    #[arg(long, env = "ADVGRID_API_URL", default_value = "http://127.0.0.1:7860")]
    pub api_url: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a grid
    Run(RunArgs),
    /// List the axis catalog with suggested values
    Axes,
}

#[derive(Args)]
pub struct RunArgs {
    /// JSON file holding the base txt2img request
    #[arg(long)]
    pub request: PathBuf,

    /// Axis as TYPE:VALUES, by label or catalog index (repeatable)
    #[arg(long = "axis", value_name = "TYPE:VALUES")]
    pub axes: Vec<AxisSlot>,

    /// Grid name (defaults to a timestamp)
    #[arg(long)]
    pub name: Option<String>,

    /// Re-render cells whose image already exists
    #[arg(long)]
    pub overwrite: bool,

    /// Keep the request's batch settings (cells still render one image)
    #[arg(long)]
    pub allow_batches: bool,

    /// Write the grid manifest and stop
    #[arg(long)]
    pub dry_run: bool,

    /// Let the VAE axis override per-model VAE preferences
    #[arg(long)]
    pub force_vae: bool,

    /// Hash-based file names and thumbnails for the web viewer
    #[arg(long)]
    pub web: bool,

    /// Fail on the first invalid axis value
    #[arg(long)]
    pub strict: bool,

    /// Parent directory of grid directories
    #[arg(long, env = "ADVGRID_OUTPUT_DIR", default_value = "outputs/grids")]
    pub output_dir: PathBuf,

    /// Image file extension; cells are saved as png with embedded parameters
    #[arg(long, env = "ADVGRID_SAMPLES_FORMAT", default_value = "png")]
    pub samples_format: String,

    /// File name pattern used outside web mode
    #[arg(long, env = "ADVGRID_FILENAME_PATTERN", default_value = "[seed]-[prompt_spaces]")]
    pub filename_pattern: String,
}

impl RunArgs {
    pub fn grid_options(&self) -> GridOptions {
        GridOptions {
            name: self.name.clone(),
            overwrite: self.overwrite,
            allow_batches: self.allow_batches,
            dry_run: self.dry_run,
            force_vae: self.force_vae,
            web_assets: self.web,
            strict: self.strict,
            output_dir: self.output_dir.clone(),
            samples_format: self.samples_format.clone(),
            filename_pattern: self.filename_pattern.clone(),
        }
    }
}
