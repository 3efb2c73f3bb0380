//! Job construction: one fully-configured request per valid combination.

use serde_json::Value;

use crate::axis::Axis;
use crate::enumerate::{apply_axes, combination_count, PositionCode, Selection};
use crate::error::CoreError;
use crate::naming::combination_id;
use crate::request::{GenerationRequest, GRID_PROVENANCE_KEY};

// ---------------------------------------------------------------------------
// JobOutcome
// ---------------------------------------------------------------------------

/// Lifecycle of a job. Transitions only out of `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Pending,
    /// Artifact already on disk, or the host declined the render.
    Skipped,
    Failed,
    Succeeded,
}

impl JobOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
            Self::Succeeded => "succeeded",
        }
    }

    pub fn is_terminal(self) -> bool {
        self != Self::Pending
    }
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One cell of the grid.
#[derive(Debug, Clone)]
pub struct Job {
    pub position_code: PositionCode,
    /// Base request with this combination applied.
    pub config: GenerationRequest,
    pub selection: Selection,
    /// Content hash of `selection`, independent of axis order.
    pub combination_id: String,
    /// Host render passes this job costs: 2 with the high-resolution fix.
    pub subjob_count: u32,
    pub outcome: JobOutcome,
}

impl Job {
    pub fn new(
        position_code: PositionCode,
        config: GenerationRequest,
        selection: Selection,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            combination_id: combination_id(&selection)?,
            subjob_count: config.subjob_count(),
            position_code,
            config,
            selection,
            outcome: JobOutcome::Pending,
        })
    }

    /// `label: value` pairs for logging.
    pub fn describe(&self) -> Vec<String> {
        self.selection
            .values()
            .map(|(label, value)| format!("{label}: {value}"))
            .collect()
    }
}

/// Build one job per combination of `axes`, in odometer order.
///
/// Each job starts from an independent copy of `base` with concrete seeds
/// and the provenance tag. Combinations whose application failed are
/// logged and dropped.
pub fn build_jobs(base: &GenerationRequest, axes: &mut [Axis], grid_name: &str) -> Vec<Job> {
    let total = combination_count(axes);
    let mut jobs = Vec::with_capacity(total);

    for _ in 0..total {
        let mut config = base.clone();
        config.fix_seed();
        config.extra_generation_params.insert(
            GRID_PROVENANCE_KEY.to_string(),
            Value::String(grid_name.to_string()),
        );

        let set = apply_axes(&mut config, axes);
        if !set.errors.is_empty() {
            tracing::debug!(
                cell = %set.position_code,
                errors = ?set.errors,
                "Detected issues for cell, skipping"
            );
            continue;
        }
        match Job::new(set.position_code, config, set.selection) {
            Ok(job) => jobs.push(job),
            Err(e) => tracing::warn!(error = %e, "Cannot identify cell, skipping"),
        }
    }

    jobs
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::axis::{AxisOption, ValidationContext};
    use crate::test_helpers::FakeRegistry;
    use crate::types::ValueType;

    fn axes(specs: &[(&str, &str, ValueType, &str)]) -> Vec<Axis> {
        let registry = FakeRegistry::default();
        specs
            .iter()
            .map(|(label, field, value_type, raw)| {
                let mut axis = AxisOption::new(label, *value_type)
                    .field(field)
                    .min(None)
                    .max(None)
                    .instantiate();
                axis.set(raw, &registry).unwrap();
                axis
            })
            .collect()
    }

    #[test]
    fn three_by_four_gives_twelve_distinct_jobs() {
        let mut axes = axes(&[
            ("Steps", "steps", ValueType::Integer, "10, 20, 30"),
            ("CFG Scale", "cfg_scale", ValueType::Float, "4, 5, 6, 7"),
        ]);
        let jobs = build_jobs(&GenerationRequest::default(), &mut axes, "test");
        assert_eq!(jobs.len(), 12);

        let codes: HashSet<String> = jobs.iter().map(|j| j.position_code.to_string()).collect();
        assert_eq!(codes.len(), 12);
        let configs: HashSet<(u32, String)> = jobs
            .iter()
            .map(|j| (j.config.steps, j.config.cfg_scale.to_string()))
            .collect();
        assert_eq!(configs.len(), 12);
    }

    #[test]
    fn jobs_are_independent_copies_with_provenance() {
        let mut axes = axes(&[("Steps", "steps", ValueType::Integer, "10, 20")]);
        let base = GenerationRequest::default();
        let jobs = build_jobs(&base, &mut axes, "my grid");

        assert_eq!(base.steps, 20);
        assert!(base.extra_generation_params.is_empty());
        for job in &jobs {
            assert_eq!(job.outcome, JobOutcome::Pending);
            assert!(job.config.seed >= 0);
            assert_eq!(job.config.extra_generation_params[GRID_PROVENANCE_KEY], "my grid");
        }
        assert_eq!(jobs[0].config.steps, 10);
        assert_eq!(jobs[1].config.steps, 20);
    }

    #[test]
    fn invalid_values_drop_only_their_combinations() {
        let registry = FakeRegistry::default();
        let request = GenerationRequest::default();
        let mut steps = AxisOption::new("Steps", ValueType::Integer)
            .field("steps")
            .max(Some(50.0))
            .instantiate();
        steps.set("10, 99", &registry).unwrap();
        steps
            .validate_all(&ValidationContext { registry: &registry, request: &request }, false)
            .unwrap();
        let mut tiling = AxisOption::new("Tiling", ValueType::Boolean)
            .field("tiling")
            .instantiate();
        tiling.set("true, false", &registry).unwrap();

        let mut axes = vec![steps, tiling];
        let jobs = build_jobs(&request, &mut axes, "g");
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.config.steps == 10));
        assert!(axes.iter().all(|a| a.cursor() == 0));
    }

    #[test]
    fn high_res_jobs_count_two_subjobs() {
        let mut axes = axes(&[("HighRes Scale", "hr_scale", ValueType::Float, "1.5")]);
        let mut axes_plain = axes.clone();
        let base = GenerationRequest {
            enable_hr: true,
            ..Default::default()
        };
        assert_eq!(build_jobs(&base, &mut axes, "g")[0].subjob_count, 2);
        assert_eq!(
            build_jobs(&GenerationRequest::default(), &mut axes_plain, "g")[0].subjob_count,
            1
        );
    }

    #[test]
    fn equal_selections_share_combination_id() {
        let mut forward = axes(&[
            ("Steps", "steps", ValueType::Integer, "10, 20"),
            ("CFG Scale", "cfg_scale", ValueType::Float, "5, 7"),
        ]);
        let mut reversed = axes(&[
            ("CFG Scale", "cfg_scale", ValueType::Float, "7, 5"),
            ("Steps", "steps", ValueType::Integer, "20, 10"),
        ]);
        let base = GenerationRequest::default();
        let forward = build_jobs(&base, &mut forward, "g");
        let reversed = build_jobs(&base, &mut reversed, "g");

        let ids = |jobs: &[Job]| -> HashSet<String> {
            jobs.iter().map(|j| j.combination_id.clone()).collect()
        };
        assert_eq!(ids(&forward).len(), 4);
        assert_eq!(ids(&forward), ids(&reversed));

        let find = |jobs: &[Job], steps: u32, cfg: f64| {
            jobs.iter()
                .find(|j| j.config.steps == steps && j.config.cfg_scale == cfg)
                .map(|j| j.combination_id.clone())
                .unwrap()
        };
        assert_eq!(find(&forward, 10, 7.0), find(&reversed, 10, 7.0));
        assert_ne!(find(&forward, 10, 7.0), find(&forward, 20, 7.0));
    }
}
