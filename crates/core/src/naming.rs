//! Naming conventions for grid directories and cell artifacts.
//!
//! A cell's file name must be derivable before rendering so existing
//! artifacts can be detected and skipped. Two schemes exist:
//!
//! - web-asset mode: a SHA-256 over the canonical JSON of the selection,
//!   so the frontend can recompute it from the manifest;
//! - pattern mode: the host filename pattern with per-render tokens
//!   (`[seed]`, `[date]`, ...) removed, expanded from the job configuration.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use sha2::{Digest, Sha256};

use crate::enumerate::Selection;
use crate::error::CoreError;
use crate::request::GenerationRequest;

/// Host pattern used when none is configured.
pub const DEFAULT_FILENAME_PATTERN: &str = "[seed]-[prompt_spaces]";

/// Tokens whose expansion differs between runs of the same combination.
pub const VOLATILE_TOKENS: &[&str] = &[
    "date",
    "datetime",
    "job_timestamp",
    "batch_number",
    "generation_number",
    "seed",
];

/// Prefix of every cell artifact.
pub const CELL_PREFIX: &str = "adv_cell";
/// Prefix of every grid directory.
pub const GRID_PREFIX: &str = "adv_grid";

/// Longest expansion of a prompt token.
const MAX_PROMPT_PART: usize = 128;

/// Characters replaced in file name parts.
const INVALID_FILENAME_CHARS: &[char] = &['#', '<', '>', ':', '"', '/', '\\', '|', '?', '*', '\n', '\r', '\t'];

/// `[token]` or `[token<argument>]`.
static PATTERN_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\[([^\[\]<>]+)(?:<.+?>|)\])").expect("valid regex"));

/// Lowercase, trim, spaces to underscores, square brackets removed.
pub fn clean_name(name: &str) -> String {
    name.to_lowercase()
        .trim()
        .replace(' ', "_")
        .replace(['[', ']'], "")
}

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Directory name of a grid: `adv_grid_<clean name>`.
pub fn grid_dir_name(grid_name: &str) -> String {
    format!("{GRID_PREFIX}_{}", clean_name(grid_name))
}

/// File stem of a cell artifact: `adv_cell-<code>-<name>`.
pub fn cell_file_stem(position_code: &str, name: &str) -> String {
    format!("{CELL_PREFIX}-{position_code}-{name}")
}

/// Content hash of a selection.
///
/// The selection map is key-sorted, so the id only depends on which values
/// were chosen, never on axis order.
pub fn combination_id(selection: &Selection) -> Result<String, CoreError> {
    let canonical = serde_json::to_string_pretty(selection)
        .map_err(|e| CoreError::Internal(format!("Cannot encode selection: {e}")))?;
    Ok(sha256_hex(canonical.as_bytes()))
}

// ---------------------------------------------------------------------------
// Filename patterns
// ---------------------------------------------------------------------------

/// Remove volatile tokens together with a leading `-` or `_` separator.
pub fn stable_pattern(pattern: &str) -> String {
    let mut stable = pattern.to_string();
    for caps in PATTERN_TOKEN.captures_iter(pattern) {
        let (token, keyword) = (&caps[1], &caps[2]);
        if VOLATILE_TOKENS.contains(&keyword) {
            stable = stable
                .replace(&format!("-{token}"), "")
                .replace(&format!("_{token}"), "")
                .replace(token, "");
        }
    }
    stable
}

/// Expand `[token]` placeholders from `config`. Unknown tokens are kept
/// verbatim; the result is sanitized and stripped of dangling separators.
pub fn expand_pattern(pattern: &str, config: &GenerationRequest) -> String {
    let expanded = PATTERN_TOKEN.replace_all(pattern, |caps: &Captures<'_>| {
        token_value(&caps[2], config).unwrap_or_else(|| caps[1].to_string())
    });
    sanitize_filename_part(&expanded, false)
        .trim_matches(|c| c == '-' || c == '_')
        .to_string()
}

fn token_value(keyword: &str, config: &GenerationRequest) -> Option<String> {
    let value = match keyword {
        "seed" => config.seed.to_string(),
        "steps" => config.steps.to_string(),
        "cfg" => config.cfg_scale.to_string(),
        "width" => config.width.to_string(),
        "height" => config.height.to_string(),
        "sampler" => sanitize_filename_part(&config.sampler_name, false),
        "model_name" => sanitize_filename_part(
            &config.override_text("sd_model_checkpoint").unwrap_or_default(),
            false,
        ),
        "styles" => sanitize_filename_part(&config.styles.join(", "), false),
        "prompt" => prompt_part(&config.prompt, true),
        "prompt_spaces" => prompt_part(&config.prompt, false),
        "prompt_no_styles" => prompt_part(&config.prompt, true),
        "prompt_words" => prompt_words(&config.prompt),
        "negative_prompt" => prompt_part(&config.negative_prompt, true),
        _ => return None,
    };
    Some(value)
}

fn prompt_part(prompt: &str, replace_spaces: bool) -> String {
    let part = sanitize_filename_part(prompt, replace_spaces);
    part.chars().take(MAX_PROMPT_PART).collect()
}

fn prompt_words(prompt: &str) -> String {
    let words: Vec<&str> = prompt
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let joined = if words.is_empty() {
        "empty prompt".to_string()
    } else {
        words.join(" ")
    };
    prompt_part(&joined, false)
}

/// Replace characters that are illegal in file names.
pub fn sanitize_filename_part(text: &str, replace_spaces: bool) -> String {
    let part: String = text
        .chars()
        .map(|c| {
            if INVALID_FILENAME_CHARS.contains(&c) || (replace_spaces && c == ' ') {
                '_'
            } else {
                c
            }
        })
        .collect();
    part.trim().to_string()
}

/// Base name of a cell artifact, excluding prefix and position code.
pub fn cell_base_name(
    config: &GenerationRequest,
    combination_id: &str,
    filename_pattern: &str,
    web_assets: bool,
) -> String {
    if web_assets {
        return combination_id.to_string();
    }
    let pattern = if filename_pattern.trim().is_empty() {
        DEFAULT_FILENAME_PATTERN
    } else {
        filename_pattern
    };
    expand_pattern(&stable_pattern(pattern), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AxisValue;

    fn selection(entries: &[(&str, &str, AxisValue)]) -> Selection {
        entries
            .iter()
            .map(|(id, label, value)| (id.to_string(), (label.to_string(), value.clone())))
            .collect()
    }

    // -- clean_name --

    #[test]
    fn clean_name_normalises() {
        assert_eq!(clean_name("  CFG Scale "), "cfg_scale");
        assert_eq!(clean_name("Replace [TAG]"), "replace_tag");
    }

    #[test]
    fn grid_and_cell_names() {
        assert_eq!(grid_dir_name("My Grid"), "adv_grid_my_grid");
        assert_eq!(cell_file_stem("0102", "abc"), "adv_cell-0102-abc");
    }

    // -- hashing --

    #[test]
    fn empty_input_produces_known_hash() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn combination_id_ignores_insertion_order() {
        let a = selection(&[
            ("steps", "Steps", AxisValue::Int(20)),
            ("cfg_scale", "CFG Scale", AxisValue::Float(7.0)),
        ]);
        let b = selection(&[
            ("cfg_scale", "CFG Scale", AxisValue::Float(7.0)),
            ("steps", "Steps", AxisValue::Int(20)),
        ]);
        assert_eq!(combination_id(&a).unwrap(), combination_id(&b).unwrap());
    }

    #[test]
    fn combination_id_differs_per_value() {
        let a = selection(&[("steps", "Steps", AxisValue::Int(20))]);
        let b = selection(&[("steps", "Steps", AxisValue::Int(30))]);
        assert_ne!(combination_id(&a).unwrap(), combination_id(&b).unwrap());
        assert_eq!(combination_id(&a).unwrap().len(), 64);
    }

    // -- patterns --

    #[test]
    fn volatile_tokens_are_stripped_with_separator() {
        assert_eq!(stable_pattern("[prompt_spaces]-[seed]"), "[prompt_spaces]");
        assert_eq!(stable_pattern("[steps]_[date]_[cfg]"), "[steps]_[cfg]");
        assert_eq!(stable_pattern("[datetime<%Y>]-[width]"), "-[width]");
    }

    #[test]
    fn expansion_uses_config_and_keeps_unknown_tokens() {
        let config = GenerationRequest {
            prompt: "a cat: on a mat".into(),
            steps: 25,
            ..Default::default()
        };
        assert_eq!(
            expand_pattern("[steps]-[prompt_spaces]-[mystery]", &config),
            "25-a cat_ on a mat-[mystery]"
        );
        assert_eq!(expand_pattern("[prompt]", &config), "a_cat__on_a_mat");
    }

    #[test]
    fn default_pattern_drops_seed() {
        let config = GenerationRequest {
            prompt: "a fox".into(),
            seed: 42,
            ..Default::default()
        };
        let name = cell_base_name(&config, "ffff", "", false);
        assert_eq!(name, "a fox");
    }

    #[test]
    fn web_mode_uses_combination_id() {
        let sel = selection(&[("steps", "Steps", AxisValue::Int(20))]);
        let id = combination_id(&sel).unwrap();
        let name = cell_base_name(&GenerationRequest::default(), &id, "[seed]", true);
        assert_eq!(name, id);
    }
}
