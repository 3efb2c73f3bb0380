//! Base generation request and per-job configuration model.
//!
//! [`GenerationRequest`] mirrors the txt2img payload accepted by the host.
//! Axes write onto it by field name through [`GenerationRequest::set_field`];
//! fields the host treats as process-wide options go to `override_settings`
//! instead so a job never mutates shared configuration directly.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::types::AxisValue;

/// Host options that are global rather than per request. Axes targeting
/// these fields write into `override_settings`.
pub const SHARED_OPTIONS: &[&str] = &[
    "CLIP_stop_at_last_layers",
    "code_former_weight",
    "face_restoration_model",
    "eta_noise_seed_delta",
    "sd_vae",
    "sd_model_checkpoint",
    "uni_pc_order",
    "use_scale_latent_for_hires_fix",
];

/// Key of the provenance entry stamped into `extra_generation_params`.
pub const GRID_PROVENANCE_KEY: &str = "Adv. Grid";

/// Seed value meaning "pick one at random".
pub const RANDOM_SEED: i64 = -1;

/// Exclusive upper bound for generated seeds.
const MAX_RANDOM_SEED: i64 = 4_294_967_294;

/// Whether `field` is routed to the override side-map.
pub fn is_shared_option(field: &str) -> bool {
    SHARED_OPTIONS.contains(&field)
}

// ---------------------------------------------------------------------------
// GenerationRequest
// ---------------------------------------------------------------------------

/// A complete txt2img request.
///
/// Every field has a default so partial JSON documents deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub styles: Vec<String>,
    pub seed: i64,
    pub subseed: i64,
    pub subseed_strength: f64,
    pub sampler_name: String,
    pub batch_size: u32,
    pub n_iter: u32,
    pub steps: u32,
    pub cfg_scale: f64,
    pub width: u32,
    pub height: u32,
    pub restore_faces: bool,
    pub tiling: bool,
    pub do_not_save_samples: bool,
    pub do_not_save_grid: bool,
    pub eta: f64,
    pub s_churn: f64,
    pub s_tmin: f64,
    pub s_tmax: f64,
    pub s_noise: f64,
    pub enable_hr: bool,
    pub hr_scale: f64,
    pub hr_upscaler: String,
    pub hr_second_pass_steps: u32,
    pub denoising_strength: f64,
    /// Per-job overlay for host-global options.
    pub override_settings: BTreeMap<String, Value>,
    pub override_settings_restore_afterwards: bool,
    /// Free-form parameters appended to the infotext.
    pub extra_generation_params: BTreeMap<String, Value>,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: String::new(),
            styles: Vec::new(),
            seed: RANDOM_SEED,
            subseed: RANDOM_SEED,
            subseed_strength: 0.0,
            sampler_name: "Euler a".to_string(),
            batch_size: 1,
            n_iter: 1,
            steps: 20,
            cfg_scale: 7.0,
            width: 512,
            height: 512,
            restore_faces: false,
            tiling: false,
            do_not_save_samples: false,
            do_not_save_grid: false,
            eta: 0.0,
            s_churn: 0.0,
            s_tmin: 0.0,
            s_tmax: 0.0,
            s_noise: 1.0,
            enable_hr: false,
            hr_scale: 2.0,
            hr_upscaler: "Latent".to_string(),
            hr_second_pass_steps: 0,
            denoising_strength: 0.7,
            override_settings: BTreeMap::new(),
            override_settings_restore_afterwards: true,
            extra_generation_params: BTreeMap::new(),
        }
    }
}

impl GenerationRequest {
    /// Write `value` onto the field named `field`.
    ///
    /// Shared options land in `override_settings`. Unknown fields and values
    /// of the wrong type are application errors.
    pub fn set_field(&mut self, field: &str, value: &AxisValue) -> Result<(), CoreError> {
        if is_shared_option(field) {
            self.override_settings
                .insert(field.to_string(), value.to_json());
            return Ok(());
        }

        match field {
            "prompt" => self.prompt = text(field, value)?,
            "negative_prompt" => self.negative_prompt = text(field, value)?,
            "seed" => self.seed = int(field, value)?,
            "subseed" => self.subseed = int(field, value)?,
            "subseed_strength" => self.subseed_strength = float(field, value)?,
            "sampler_name" => self.sampler_name = text(field, value)?,
            "steps" => self.steps = unsigned(field, value)?,
            "cfg_scale" => self.cfg_scale = float(field, value)?,
            "width" => self.width = unsigned(field, value)?,
            "height" => self.height = unsigned(field, value)?,
            "restore_faces" => self.restore_faces = boolean(field, value)?,
            "tiling" => self.tiling = boolean(field, value)?,
            "eta" => self.eta = float(field, value)?,
            "s_churn" => self.s_churn = float(field, value)?,
            "s_tmin" => self.s_tmin = float(field, value)?,
            "s_tmax" => self.s_tmax = float(field, value)?,
            "s_noise" => self.s_noise = float(field, value)?,
            "enable_hr" => self.enable_hr = boolean(field, value)?,
            "hr_scale" => self.hr_scale = float(field, value)?,
            "hr_upscaler" => self.hr_upscaler = text(field, value)?,
            "hr_second_pass_steps" => self.hr_second_pass_steps = unsigned(field, value)?,
            "denoising_strength" => self.denoising_strength = float(field, value)?,
            other => {
                return Err(CoreError::Application(format!(
                    "Unknown request field '{other}'"
                )))
            }
        }
        Ok(())
    }

    /// Replace a random seed or subseed with a concrete one.
    pub fn fix_seed(&mut self) {
        let mut rng = rand::rng();
        if self.seed == RANDOM_SEED {
            self.seed = rng.random_range(0..MAX_RANDOM_SEED);
        }
        if self.subseed == RANDOM_SEED {
            self.subseed = rng.random_range(0..MAX_RANDOM_SEED);
        }
    }

    /// Sampling steps of the high-resolution pass, falling back to `steps`.
    pub fn second_pass_steps(&self) -> u32 {
        if self.hr_second_pass_steps > 0 {
            self.hr_second_pass_steps
        } else {
            self.steps
        }
    }

    /// Total sampling steps one render of this request costs.
    pub fn total_steps(&self) -> u64 {
        let second = if self.enable_hr {
            self.second_pass_steps()
        } else {
            0
        };
        u64::from(self.steps) + u64::from(second)
    }

    /// Number of internal render passes: 2 with the high-resolution fix.
    pub fn subjob_count(&self) -> u32 {
        if self.enable_hr {
            2
        } else {
            1
        }
    }

    /// Effective value of a shared option for this request, if overridden.
    pub fn override_text(&self, key: &str) -> Option<String> {
        match self.override_settings.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Value coercion
// ---------------------------------------------------------------------------

fn mismatch(field: &str, expected: &str, value: &AxisValue) -> CoreError {
    CoreError::Application(format!(
        "Field '{field}' expects {expected}, got '{value}'"
    ))
}

fn text(field: &str, value: &AxisValue) -> Result<String, CoreError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| mismatch(field, "text", value))
}

fn int(field: &str, value: &AxisValue) -> Result<i64, CoreError> {
    match value {
        AxisValue::Int(v) => Ok(*v),
        _ => Err(mismatch(field, "an integer", value)),
    }
}

fn unsigned(field: &str, value: &AxisValue) -> Result<u32, CoreError> {
    let v = int(field, value)?;
    u32::try_from(v).map_err(|_| mismatch(field, "a non-negative integer", value))
}

fn float(field: &str, value: &AxisValue) -> Result<f64, CoreError> {
    value
        .as_f64()
        .ok_or_else(|| mismatch(field, "a number", value))
}

fn boolean(field: &str, value: &AxisValue) -> Result<bool, CoreError> {
    match value {
        AxisValue::Bool(v) => Ok(*v),
        _ => Err(mismatch(field, "a boolean", value)),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn shared_options_go_to_override_map() {
        let mut req = GenerationRequest::default();
        req.set_field("sd_vae", &AxisValue::Text("vae-ft-mse".into()))
            .unwrap();
        req.set_field("CLIP_stop_at_last_layers", &AxisValue::Int(2))
            .unwrap();
        assert_eq!(req.override_settings["sd_vae"], "vae-ft-mse");
        assert_eq!(req.override_settings["CLIP_stop_at_last_layers"], 2);
    }

    #[test]
    fn plain_fields_are_written_directly() {
        let mut req = GenerationRequest::default();
        req.set_field("steps", &AxisValue::Int(35)).unwrap();
        req.set_field("cfg_scale", &AxisValue::Int(9)).unwrap();
        req.set_field("tiling", &AxisValue::Bool(true)).unwrap();
        assert_eq!(req.steps, 35);
        assert_eq!(req.cfg_scale, 9.0);
        assert!(req.tiling);
        assert!(req.override_settings.is_empty());
    }

    #[test]
    fn unknown_field_is_application_error() {
        let mut req = GenerationRequest::default();
        assert_matches!(
            req.set_field("no_such_field", &AxisValue::Int(1)),
            Err(CoreError::Application(_))
        );
    }

    #[test]
    fn wrong_type_is_application_error() {
        let mut req = GenerationRequest::default();
        assert_matches!(
            req.set_field("steps", &AxisValue::Text("many".into())),
            Err(CoreError::Application(_))
        );
        assert_matches!(
            req.set_field("steps", &AxisValue::Int(-4)),
            Err(CoreError::Application(_))
        );
    }

    #[test]
    fn fix_seed_only_replaces_random() {
        let mut req = GenerationRequest {
            seed: 1234,
            ..Default::default()
        };
        req.fix_seed();
        assert_eq!(req.seed, 1234);
        assert!(req.subseed >= 0);
    }

    #[test]
    fn total_steps_includes_second_pass() {
        let mut req = GenerationRequest {
            steps: 20,
            ..Default::default()
        };
        assert_eq!(req.total_steps(), 20);
        assert_eq!(req.subjob_count(), 1);

        req.enable_hr = true;
        assert_eq!(req.total_steps(), 40);
        req.hr_second_pass_steps = 10;
        assert_eq!(req.total_steps(), 30);
        assert_eq!(req.subjob_count(), 2);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let req: GenerationRequest =
            serde_json::from_str(r#"{"prompt": "a cat", "steps": 12}"#).unwrap();
        assert_eq!(req.prompt, "a cat");
        assert_eq!(req.steps, 12);
        assert_eq!(req.width, 512);
        assert_eq!(req.seed, RANDOM_SEED);
    }
}
