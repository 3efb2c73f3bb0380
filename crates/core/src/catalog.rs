//! Built-in catalog of axis options.
//!
//! The catalog is immutable; runs pick entries by label and instantiate
//! them. Index 0 is the "Nothing" placeholder, so a slot selecting it is
//! treated as unused.

use crate::axis::AxisOption;
use crate::host::{ChoiceSource, HostRegistry};
use crate::types::{ValueType, SENTINEL_DEFAULT, SENTINEL_NONE};

/// Cost of axes that invalidate sampler state.
const SAMPLER_STATE_COST: f64 = 0.5;

/// Default catalog in display order.
pub fn default_catalog() -> Vec<AxisOption> {
    vec![
        AxisOption::nothing("Nothing"),
        AxisOption::checkpoint("Checkpoint", "sd_model_checkpoint"),
        AxisOption::vae("VAE", "sd_vae"),
        AxisOption::new("Seed", ValueType::Integer)
            .field("seed")
            .min(Some(-1.0))
            .max(None),
        AxisOption::new("Steps", ValueType::Integer)
            .field("steps")
            .min(Some(1.0))
            .max(Some(200.0)),
        AxisOption::new("ClipSkip", ValueType::Integer)
            .field("CLIP_stop_at_last_layers")
            .min(Some(1.0))
            .max(Some(12.0)),
        AxisOption::new("Sampler", ValueType::String)
            .field("sampler_name")
            .choices(ChoiceSource::Samplers, &[]),
        AxisOption::new("CFG Scale", ValueType::Float)
            .field("cfg_scale")
            .max(Some(30.0)),
        AxisOption::new("Restore Faces", ValueType::String)
            .field("face_restoration_model")
            .gates("restore_faces")
            .choices(ChoiceSource::FaceRestorers, &[SENTINEL_NONE, SENTINEL_DEFAULT]),
        AxisOption::new("CodeFormer Weight", ValueType::Float)
            .field("code_former_weight")
            .gates("restore_faces"),
        AxisOption::new("Tiling", ValueType::Boolean).field("tiling"),
        AxisOption::substitute("Replace TAG"),
        AxisOption::new("Var Seed", ValueType::Integer)
            .field("subseed")
            .min(Some(-1.0))
            .max(None),
        AxisOption::new("Var Strength", ValueType::Float).field("subseed_strength"),
        // Sampler parameters
        AxisOption::new("ETA", ValueType::Float).field("eta"),
        AxisOption::new("ETA Noise Seed Delta", ValueType::Integer)
            .field("eta_noise_seed_delta")
            .max(None),
        AxisOption::new("Sigma Churn", ValueType::Float).field("s_churn").max(None),
        AxisOption::new("Sigma TMin", ValueType::Float).field("s_tmin").max(None),
        AxisOption::new("Sigma TMax", ValueType::Float).field("s_tmax").max(None),
        AxisOption::new("Sigma Noise", ValueType::Float).field("s_noise").max(Some(2.0)),
        AxisOption::new("UniPC Order", ValueType::Integer)
            .field("uni_pc_order")
            .min(Some(1.0))
            .max(Some(50.0))
            .cost(SAMPLER_STATE_COST),
        // High-resolution fix
        AxisOption::new("HighRes Upscaler", ValueType::String)
            .field("hr_upscaler")
            .gates("enable_hr")
            .choices(ChoiceSource::Upscalers, &[SENTINEL_NONE]),
        AxisOption::new("HighRes Scale", ValueType::Float)
            .field("hr_scale")
            .min(Some(1.0))
            .max(Some(4.0))
            .gates("enable_hr"),
        AxisOption::new("HighRes Steps", ValueType::Integer)
            .field("hr_second_pass_steps")
            .max(Some(200.0))
            .gates("enable_hr"),
        AxisOption::new("Denoising", ValueType::Float)
            .field("denoising_strength")
            .gates("enable_hr"),
    ]
}

/// Look up a catalog entry by label, case-insensitively.
pub fn find_option<'a>(catalog: &'a [AxisOption], label: &str) -> Option<&'a AxisOption> {
    catalog
        .iter()
        .find(|option| option.label.eq_ignore_ascii_case(label.trim()))
}

/// Suggested value string for an option: both booleans, or every current
/// choice. `None` for free-form options.
pub fn fill_values(option: &AxisOption, registry: &dyn HostRegistry) -> Option<String> {
    if option.value_type == ValueType::Boolean {
        return Some("true, false".to_string());
    }
    option
        .choice_list(registry)
        .map(|choices| choices.join(", "))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::axis::AxisKind;
    use crate::test_helpers::FakeRegistry;

    #[test]
    fn labels_and_ids_are_unique() {
        let catalog = default_catalog();
        let labels: HashSet<&str> = catalog.iter().map(|o| o.label.as_str()).collect();
        let ids: HashSet<String> = catalog.iter().map(AxisOption::id).collect();
        assert_eq!(labels.len(), catalog.len());
        assert_eq!(ids.len(), catalog.len());
        assert_eq!(catalog[0].kind, AxisKind::Nothing);
    }

    #[test]
    fn costs_order_model_swaps_last() {
        let catalog = default_catalog();
        let cost = |label: &str| find_option(&catalog, label).unwrap().cost;
        assert!(cost("Steps") < cost("Replace TAG"));
        assert!(cost("Replace TAG") < cost("VAE"));
        assert!(cost("VAE") < cost("Checkpoint"));
    }

    #[test]
    fn find_is_case_insensitive() {
        let catalog = default_catalog();
        assert_eq!(find_option(&catalog, "cfg scale").unwrap().id(), "cfg_scale");
        assert!(find_option(&catalog, "Width").is_none());
    }

    #[test]
    fn fill_values_suggestions() {
        let catalog = default_catalog();
        let registry = FakeRegistry::default();
        assert_eq!(
            fill_values(find_option(&catalog, "Tiling").unwrap(), &registry).as_deref(),
            Some("true, false")
        );
        assert_eq!(
            fill_values(find_option(&catalog, "Restore Faces").unwrap(), &registry).as_deref(),
            Some("CodeFormer, GFPGAN, None, Default")
        );
        assert_eq!(fill_values(find_option(&catalog, "Steps").unwrap(), &registry), None);
    }
}
