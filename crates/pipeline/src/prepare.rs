//! Run preparation: options, base request normalisation and axis setup.

use std::path::PathBuf;
use std::str::FromStr;

use advgrid_core::axis::{Axis, AxisKind, AxisOption, ValidationContext};
use advgrid_core::catalog::find_option;
use advgrid_core::host::HostRegistry;
use advgrid_core::naming::DEFAULT_FILENAME_PATTERN;
use advgrid_core::{CoreError, GenerationRequest};
use chrono::{DateTime, Local, TimeZone};
use serde_json::Value;

use crate::artifacts;
use crate::error::PipelineError;
use crate::guard::VAE_OVERRIDES_MODEL_PREFERENCES;

/// `strftime` format of generated grid names.
pub const DEFAULT_NAME_FORMAT: &str = "adv_grid_%d_%m_%Y_%H_%M_%S";

/// Host option that appends a counter to saved file names.
pub const SAVE_IMAGES_ADD_NUMBER: &str = "save_images_add_number";

pub const DEFAULT_SAMPLES_FORMAT: &str = "png";

// ---------------------------------------------------------------------------
// GridOptions
// ---------------------------------------------------------------------------

/// User-facing settings of one grid run.
#[derive(Debug, Clone)]
pub struct GridOptions {
    /// Grid name; a timestamped default is generated when absent.
    pub name: Option<String>,
    /// Re-render cells whose artifact already exists.
    pub overwrite: bool,
    /// Accepted for compatibility; cells always render one image.
    pub allow_batches: bool,
    /// Write the manifest and stop before rendering.
    pub dry_run: bool,
    /// Make the VAE axis override per-model VAE preferences.
    pub force_vae: bool,
    /// Hash-based file names plus thumbnails for the web viewer.
    pub web_assets: bool,
    /// Abort on the first invalid axis value instead of warning.
    pub strict: bool,
    /// Parent directory of grid directories.
    pub output_dir: PathBuf,
    /// Image file extension.
    pub samples_format: String,
    /// Host file name pattern used outside web-asset mode.
    pub filename_pattern: String,
}

impl GridOptions {
    /// Reject settings no run can honour, before the host is touched.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !artifacts::is_supported_format(&self.samples_format) {
            return Err(CoreError::Validation(format!(
                "Unsupported samples format '{}': cell images embed their parameters and must be png",
                self.samples_format
            )));
        }
        Ok(())
    }
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            name: None,
            overwrite: false,
            allow_batches: false,
            dry_run: false,
            force_vae: false,
            web_assets: false,
            strict: false,
            output_dir: PathBuf::from("outputs/grids"),
            samples_format: DEFAULT_SAMPLES_FORMAT.to_string(),
            filename_pattern: DEFAULT_FILENAME_PATTERN.to_string(),
        }
    }
}

/// Grid name derived from `time`.
pub fn default_grid_name<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format(DEFAULT_NAME_FORMAT).to_string()
}

/// The configured name, or a timestamped default when blank.
pub fn resolve_grid_name(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => default_grid_name(&Local::now()),
    }
}

// ---------------------------------------------------------------------------
// AxisSlot
// ---------------------------------------------------------------------------

/// One axis selection: a catalog entry (label or index) and its raw values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisSlot {
    pub axis: String,
    pub values: String,
}

impl AxisSlot {
    pub fn new(axis: &str, values: &str) -> Self {
        Self {
            axis: axis.to_string(),
            values: values.to_string(),
        }
    }

    fn lookup<'a>(&self, catalog: &'a [AxisOption]) -> Option<&'a AxisOption> {
        match self.axis.trim().parse::<usize>() {
            Ok(index) => catalog.get(index),
            Err(_) => find_option(catalog, &self.axis),
        }
    }
}

/// Parses `TYPE:VALUES`.
impl FromStr for AxisSlot {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (axis, values) = s
            .split_once(':')
            .ok_or_else(|| CoreError::Parse(format!("Expected TYPE:VALUES, got '{s}'")))?;
        Ok(Self::new(axis.trim(), values.trim()))
    }
}

// ---------------------------------------------------------------------------
// Preparation
// ---------------------------------------------------------------------------

/// Copy of `request` ready to be cloned into jobs.
///
/// One image per cell, no host-side saving, overrides kept for the whole
/// run, concrete seeds.
pub fn normalise_base(request: &GenerationRequest, options: &GridOptions) -> GenerationRequest {
    let mut base = request.clone();
    if options.allow_batches && request.batch_size > 1 {
        tracing::info!(
            batch_size = request.batch_size,
            "Batches requested; each cell still renders a single image"
        );
    }
    base.override_settings_restore_afterwards = false;
    base.n_iter = 1;
    base.batch_size = 1;
    base.do_not_save_grid = true;
    base.do_not_save_samples = true;
    base.override_settings
        .insert(SAVE_IMAGES_ADD_NUMBER.to_string(), Value::Bool(false));
    if options.force_vae {
        base.override_settings
            .insert(VAE_OVERRIDES_MODEL_PREFERENCES.to_string(), Value::Bool(true));
    }
    base.fix_seed();
    base
}

/// Instantiate, parse and validate the axes selected by `slots`.
///
/// Slots with blank values or selecting the placeholder entry are ignored.
/// In quiet mode an unusable slot is skipped with a warning; in strict mode
/// it aborts preparation.
pub fn build_axes(
    slots: &[AxisSlot],
    catalog: &[AxisOption],
    registry: &dyn HostRegistry,
    base: &GenerationRequest,
    strict: bool,
) -> Result<Vec<Axis>, PipelineError> {
    let ctx = ValidationContext {
        registry,
        request: base,
    };
    let mut axes = Vec::new();

    for slot in slots {
        if slot.values.trim().is_empty() {
            continue;
        }
        let Some(option) = slot.lookup(catalog) else {
            let err = CoreError::Parse(format!("Unknown axis type '{}'", slot.axis));
            if strict {
                return Err(err.into());
            }
            tracing::warn!(axis = %slot.axis, "Unknown axis type, skipping");
            continue;
        };
        if option.kind == AxisKind::Nothing {
            continue;
        }

        let mut axis = option.instantiate();
        if let Err(err) = axis.set(&slot.values, registry) {
            if strict {
                return Err(err.into());
            }
            tracing::warn!(axis = %option.label, error = %err, "Cannot parse axis values, skipping");
            continue;
        }
        if axis.is_empty() {
            if strict {
                return Err(CoreError::Parse(format!("Axis {} has no usable values", option.label)).into());
            }
            tracing::warn!(axis = %option.label, "Axis has no usable values, skipping");
            continue;
        }

        if !axis.validate_all(&ctx, strict)? {
            tracing::warn!(axis = %axis.label(), "Axis might contain invalid values");
        }
        axes.push(axis);
    }

    Ok(axes)
}
