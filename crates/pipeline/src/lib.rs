//! Grid execution pipeline.
//!
//! Ties the domain logic in `advgrid-core` to the host: prepares the base
//! request and axes, protects host-global settings for the duration of the
//! run, executes every job and persists artifacts.

pub mod artifacts;
pub mod error;
pub mod guard;
pub mod prepare;
pub mod progress;
pub mod runner;

use advgrid_core::axis::AxisOption;
use advgrid_core::host::{HostRegistry, HostSettings, InterruptFlag, Renderer};
use advgrid_core::GenerationRequest;

pub use error::PipelineError;
pub use guard::SharedSettingsGuard;
pub use prepare::{AxisSlot, GridOptions};
pub use progress::{ProgressReporter, TracingProgress};
pub use runner::{CellReport, GridResult, GridRunner, RunSettings};

/// The host services a grid run talks to.
#[derive(Clone, Copy)]
pub struct Host<'a> {
    pub registry: &'a dyn HostRegistry,
    pub settings: &'a dyn HostSettings,
    pub renderer: &'a dyn Renderer,
}

/// Run a complete grid.
///
/// Shared host options, and every option the jobs override, are
/// snapshotted before any axis is validated and restored when this function
/// returns, whatever the outcome.
pub fn run_grid(
    host: Host<'_>,
    request: &GenerationRequest,
    slots: &[AxisSlot],
    catalog: &[AxisOption],
    options: &GridOptions,
    progress: &dyn ProgressReporter,
    interrupt: InterruptFlag,
) -> Result<GridResult, PipelineError> {
    options.validate()?;
    let grid_name = prepare::resolve_grid_name(options.name.as_deref());
    let base = prepare::normalise_base(request, options);
    let _guard = SharedSettingsGuard::capture(
        host.settings,
        base.override_settings.keys().map(String::as_str),
    )?;
    let mut axes = prepare::build_axes(slots, catalog, host.registry, &base, options.strict)?;
    tracing::info!(
        grid = %grid_name,
        axes = axes.len(),
        combinations = advgrid_core::enumerate::combination_count(&axes),
        "Grid prepared"
    );

    let runner = GridRunner::new(
        host.renderer,
        progress,
        interrupt,
        RunSettings {
            overwrite: options.overwrite,
            web_assets: options.web_assets,
            dry_run: options.dry_run,
            samples_format: options.samples_format.clone(),
            filename_pattern: options.filename_pattern.clone(),
        },
    );
    let result = runner.generate(&options.output_dir, &grid_name, &base, &mut axes);

    for axis in &mut axes {
        axis.reset();
    }
    result
}
