//! Sequential grid execution.
//!
//! Every job moves from `Pending` to exactly one of `Skipped`, `Failed` or
//! `Succeeded`, except when an interrupt stops the run, which leaves the
//! current job and all later ones `Pending`. Only an interrupt or a manifest
//! write failure ends a run early; everything else is per-job.

use std::path::{Path, PathBuf};

use advgrid_core::axis::Axis;
use advgrid_core::host::{InterruptFlag, RenderOutput, Renderer};
use advgrid_core::infotext::create_infotext;
use advgrid_core::job::{build_jobs, Job, JobOutcome};
use advgrid_core::manifest::GridManifest;
use advgrid_core::naming::{cell_base_name, cell_file_stem, grid_dir_name};
use advgrid_core::{GenerationRequest, Selection};

use crate::artifacts::{self, IMAGES_DIR, THUMBNAILS_DIR};
use crate::error::PipelineError;
use crate::progress::ProgressReporter;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Final state of one cell.
#[derive(Debug, Clone)]
pub struct CellReport {
    pub position_code: String,
    /// Content hash of the selection, whatever the naming mode.
    pub combination_id: String,
    pub outcome: JobOutcome,
    pub selection: Selection,
    /// Saved artifact, for succeeded cells.
    pub path: Option<PathBuf>,
}

/// Aggregate of every succeeded cell, in processing order.
#[derive(Debug, Clone, Default)]
pub struct GridResult {
    pub grid_path: PathBuf,
    pub images: Vec<PathBuf>,
    pub all_prompts: Vec<String>,
    pub all_negative_prompts: Vec<String>,
    pub all_seeds: Vec<i64>,
    pub all_subseeds: Vec<i64>,
    pub infotexts: Vec<String>,
    pub cells: Vec<CellReport>,
    pub interrupted: bool,
}

impl GridResult {
    fn new(grid_path: PathBuf) -> Self {
        Self {
            grid_path,
            ..Default::default()
        }
    }

    /// Append a succeeded cell's output.
    fn merge(&mut self, path: PathBuf, output: RenderOutput) {
        self.images.push(path);
        self.all_prompts.extend(output.all_prompts);
        self.all_negative_prompts.extend(output.all_negative_prompts);
        self.all_seeds.extend(output.all_seeds);
        self.all_subseeds.extend(output.all_subseeds);
        self.infotexts.extend(output.infotexts);
    }

    pub fn count(&self, outcome: JobOutcome) -> usize {
        self.cells.iter().filter(|c| c.outcome == outcome).count()
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Per-run settings the runner needs.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub overwrite: bool,
    pub web_assets: bool,
    pub dry_run: bool,
    pub samples_format: String,
    pub filename_pattern: String,
}

/// Result of running a single job.
enum JobStep {
    Done {
        outcome: JobOutcome,
        saved: Option<(PathBuf, RenderOutput)>,
    },
    Interrupted,
}

pub struct GridRunner<'a> {
    renderer: &'a dyn Renderer,
    progress: &'a dyn ProgressReporter,
    interrupt: InterruptFlag,
    settings: RunSettings,
}

impl<'a> GridRunner<'a> {
    pub fn new(
        renderer: &'a dyn Renderer,
        progress: &'a dyn ProgressReporter,
        interrupt: InterruptFlag,
        settings: RunSettings,
    ) -> Self {
        Self {
            renderer,
            progress,
            interrupt,
            settings,
        }
    }

    /// Build the jobs, write the manifest and run every job in order.
    ///
    /// `base` must already be normalised and `axes` validated.
    pub fn generate(
        &self,
        output_dir: &Path,
        grid_name: &str,
        base: &GenerationRequest,
        axes: &mut [Axis],
    ) -> Result<GridResult, PipelineError> {
        let grid_path = output_dir.join(grid_dir_name(grid_name));
        let mut jobs = build_jobs(base, axes, grid_name);

        let manifest = GridManifest::new(grid_name, base, axes)?;
        artifacts::write_manifest(&grid_path, &manifest)?;

        let mut result = GridResult::new(grid_path.clone());
        if self.settings.dry_run {
            tracing::info!(jobs = jobs.len(), path = %grid_path.display(), "Dry run, manifest only");
            return Ok(result);
        }

        let total_steps = jobs.iter().map(|job| job.config.total_steps()).sum();
        self.progress.begin(jobs.len(), total_steps);

        let total = jobs.len();
        for (index, job) in jobs.iter_mut().enumerate() {
            if self.interrupt.is_interrupted() {
                result.interrupted = true;
                break;
            }
            self.progress.job_started(index, total, &job.position_code.to_string());

            let saved = match self.run_job(job, &grid_path) {
                JobStep::Interrupted => {
                    result.interrupted = true;
                    break;
                }
                JobStep::Done { outcome, saved } => {
                    job.outcome = outcome;
                    saved
                }
            };

            let path = saved.map(|(path, output)| {
                result.merge(path.clone(), output);
                path
            });
            result.cells.push(CellReport {
                position_code: job.position_code.to_string(),
                combination_id: job.combination_id.clone(),
                outcome: job.outcome,
                selection: job.selection.clone(),
                path,
            });
        }

        if result.interrupted {
            tracing::warn!("Process interrupted. Cancelling all jobs.");
        }
        for job in jobs.iter().filter(|job| !job.outcome.is_terminal()) {
            result.cells.push(CellReport {
                position_code: job.position_code.to_string(),
                combination_id: job.combination_id.clone(),
                outcome: job.outcome,
                selection: job.selection.clone(),
                path: None,
            });
        }
        self.progress.finish();
        Ok(result)
    }

    fn run_job(&self, job: &Job, grid_path: &Path) -> JobStep {
        let code = job.position_code.to_string();
        let total_steps = job.config.total_steps();

        let base_name = cell_base_name(
            &job.config,
            &job.combination_id,
            &self.settings.filename_pattern,
            self.settings.web_assets,
        );
        let stem = cell_file_stem(&code, &base_name);
        let images_dir = grid_path.join(IMAGES_DIR);

        if !self.settings.overwrite && artifacts::cell_exists(&images_dir, &stem) {
            tracing::debug!(cell = %code, "Skipping cell, file already exists");
            self.progress.advance(total_steps);
            return JobStep::Done {
                outcome: JobOutcome::Skipped,
                saved: None,
            };
        }

        tracing::info!(cell = %code, attributes = ?job.describe(), "Running image generation for cell");
        let output = match self.renderer.render(&job.config) {
            Ok(output) => Some(output),
            Err(e) => {
                tracing::error!(cell = %code, error = %e, "Skipping cell due to a rendering error");
                None
            }
        };

        if self.interrupt.is_interrupted() || output.as_ref().is_some_and(|o| o.interrupted) {
            return JobStep::Interrupted;
        }

        if let Some(output) = output.as_ref().filter(|o| o.skipped) {
            tracing::warn!(cell = %code, "Skipping cell, requested by the host");
            self.progress
                .advance(total_steps.saturating_sub(output.sampling_step));
            return JobStep::Done {
                outcome: JobOutcome::Skipped,
                saved: None,
            };
        }

        let Some(output) = output.filter(RenderOutput::has_images) else {
            tracing::warn!(cell = %code, "No images were generated for cell");
            return JobStep::Done {
                outcome: JobOutcome::Failed,
                saved: None,
            };
        };
        self.progress.advance(total_steps);

        match self.persist(job, output, grid_path, &stem) {
            Ok((path, output)) => {
                tracing::debug!(cell = %code, path = %path.display(), "Cell saved");
                JobStep::Done {
                    outcome: JobOutcome::Succeeded,
                    saved: Some((path, output)),
                }
            }
            Err(e) => {
                tracing::error!(cell = %code, error = %e, "Cannot save cell artifact");
                JobStep::Done {
                    outcome: JobOutcome::Failed,
                    saved: None,
                }
            }
        }
    }

    /// Save the first image with infotext rebuilt from the final
    /// configuration, plus a thumbnail in web-asset mode.
    fn persist(
        &self,
        job: &Job,
        mut output: RenderOutput,
        grid_path: &Path,
        stem: &str,
    ) -> Result<(PathBuf, RenderOutput), PipelineError> {
        let bytes = output
            .images
            .iter()
            .find(|image| !image.is_empty())
            .ok_or_else(|| PipelineError::Artifact("Render produced no image".to_string()))?;
        let image = artifacts::decode_image(bytes)?;

        let infotext = create_infotext(&job.config);
        let path = artifacts::save_image(
            &image,
            &grid_path.join(IMAGES_DIR),
            stem,
            &self.settings.samples_format,
            &infotext,
        )?;

        match output.infotexts.first_mut() {
            Some(first) => *first = infotext,
            None => output.infotexts.push(infotext),
        }

        if self.settings.web_assets {
            if let Err(e) = artifacts::save_thumbnail(&image, &grid_path.join(THUMBNAILS_DIR), stem) {
                tracing::warn!(error = %e, "Cannot save thumbnail");
            }
        }
        Ok((path, output))
    }
}
