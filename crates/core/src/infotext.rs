//! Generation parameter text embedded in saved images.
//!
//! Layout:
//!
//! ```text
//! <prompt>
//! Negative prompt: <negative prompt>
//! Steps: 20, Sampler: Euler a, CFG scale: 7, Seed: 1, Size: 512x512, ...
//! ```
//!
//! Values containing `,`, `:` or `"` are JSON-quoted so the line stays
//! parseable.

use serde_json::Value;

use crate::request::GenerationRequest;

fn quote(value: &str) -> String {
    if value.contains([',', ':', '"', '\n']) {
        Value::String(value.to_string()).to_string()
    } else {
        value.to_string()
    }
}

fn json_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Ordered `key: value` parameters for `config`, optional ones omitted.
pub fn parameters(config: &GenerationRequest) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = vec![
        ("Steps".into(), config.steps.to_string()),
        ("Sampler".into(), config.sampler_name.clone()),
        ("CFG scale".into(), config.cfg_scale.to_string()),
        ("Seed".into(), config.seed.to_string()),
        ("Size".into(), format!("{}x{}", config.width, config.height)),
    ];
    let mut push = |key: &str, value: Option<String>| {
        if let Some(value) = value {
            params.push((key.to_string(), value));
        }
    };

    push("Model", config.override_text("sd_model_checkpoint"));
    push("VAE", config.override_text("sd_vae"));
    if config.subseed_strength > 0.0 {
        push("Variation seed", Some(config.subseed.to_string()));
        push("Variation seed strength", Some(config.subseed_strength.to_string()));
    }
    push(
        "Face restoration",
        config
            .restore_faces
            .then(|| config.override_text("face_restoration_model").unwrap_or_else(|| "Default".into())),
    );
    push("Tiling", config.tiling.then(|| "True".to_string()));
    push(
        "Clip skip",
        config
            .override_text("CLIP_stop_at_last_layers")
            .filter(|skip| skip != "1"),
    );
    push(
        "ENSD",
        config
            .override_text("eta_noise_seed_delta")
            .filter(|delta| delta != "0"),
    );
    push("Eta", (config.eta != 0.0).then(|| config.eta.to_string()));
    if config.enable_hr {
        push("Denoising strength", Some(config.denoising_strength.to_string()));
        push("Hires upscale", Some(config.hr_scale.to_string()));
        push("Hires steps", Some(config.second_pass_steps().to_string()));
        push("Hires upscaler", Some(config.hr_upscaler.clone()));
    }
    for (key, value) in &config.extra_generation_params {
        params.push((key.clone(), json_text(value)));
    }
    params
}

/// Full infotext for `config`.
pub fn create_infotext(config: &GenerationRequest) -> String {
    let line = parameters(config)
        .iter()
        .map(|(key, value)| format!("{key}: {}", quote(value)))
        .collect::<Vec<_>>()
        .join(", ");

    let mut text = config.prompt.clone();
    if !config.negative_prompt.is_empty() {
        text.push_str("\nNegative prompt: ");
        text.push_str(&config.negative_prompt);
    }
    text.push('\n');
    text.push_str(&line);
    text
}
