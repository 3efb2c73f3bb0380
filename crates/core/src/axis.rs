//! Axis model: catalog descriptors and per-run axis instances.
//!
//! An [`AxisOption`] is immutable catalog data. Every grid run clones the
//! options it needs into fresh [`Axis`] instances, which own the parsed
//! values, the odometer cursor and the per-value validity flags. Nothing a
//! run does to an `Axis` is visible to the catalog or to another run.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::host::{ChoiceSource, HostRegistry};
use crate::naming::clean_name;
use crate::parse::{parse_values, split_fragments};
use crate::request::GenerationRequest;
use crate::types::{AxisValue, ValueType, SENTINEL_AUTOMATIC, SENTINEL_DEFAULT, SENTINEL_NONE};

/// Switch cost of an ordinary field axis.
pub const DEFAULT_COST: f64 = 0.2;
/// Swapping checkpoints reloads the whole model, so it changes least often.
pub const CHECKPOINT_COST: f64 = 1.0;
pub const VAE_COST: f64 = 0.7;
/// Prompt substitution runs after cheaper axes have written their values.
pub const SUBSTITUTE_COST: f64 = 0.5;

/// Placeholder in a substitution axis label, replaced by the discovered tag.
pub const TAG_PLACEHOLDER: &str = "TAG";

// ---------------------------------------------------------------------------
// AxisKind
// ---------------------------------------------------------------------------

/// Behaviour variant of an axis.
#[derive(Debug, Clone, PartialEq)]
pub enum AxisKind {
    /// Writes its value onto a request field or shared option.
    Field,
    /// Field axis whose values must resolve to a known checkpoint.
    Checkpoint,
    /// Field axis whose values must be a known VAE or a VAE sentinel.
    Vae,
    /// Replaces `tag` in both prompts with each value.
    Substitute { tag: String },
    /// Placeholder selection meaning "axis not in use".
    Nothing,
}

// ---------------------------------------------------------------------------
// AxisOption
// ---------------------------------------------------------------------------

/// Catalog entry describing a parameter that can be varied.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisOption {
    pub label: String,
    pub kind: AxisKind,
    pub value_type: ValueType,
    /// Target field; derived from the label when absent.
    pub field: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Host list providing legal values, queried lazily.
    pub choices: Option<ChoiceSource>,
    /// Sentinels appended to the host list.
    pub extra_choices: Vec<String>,
    /// Companion boolean field switched on while this axis is active.
    pub gates: Option<String>,
    pub cost: f64,
}

impl AxisOption {
    /// A field axis with default bounds `[0.0, 1.0]` and default cost.
    pub fn new(label: &str, value_type: ValueType) -> Self {
        Self {
            label: label.to_string(),
            kind: AxisKind::Field,
            value_type,
            field: None,
            min: Some(0.0),
            max: Some(1.0),
            choices: None,
            extra_choices: Vec::new(),
            gates: None,
            cost: DEFAULT_COST,
        }
    }

    pub fn nothing(label: &str) -> Self {
        Self {
            kind: AxisKind::Nothing,
            ..Self::new(label, ValueType::None)
        }
    }

    pub fn checkpoint(label: &str, field: &str) -> Self {
        Self {
            kind: AxisKind::Checkpoint,
            cost: CHECKPOINT_COST,
            ..Self::new(label, ValueType::String).field(field)
        }
        .choices(ChoiceSource::Checkpoints, &[])
    }

    pub fn vae(label: &str, field: &str) -> Self {
        Self {
            kind: AxisKind::Vae,
            cost: VAE_COST,
            ..Self::new(label, ValueType::String).field(field)
        }
        .choices(ChoiceSource::Vaes, &[SENTINEL_NONE, SENTINEL_AUTOMATIC])
    }

    pub fn substitute(label: &str) -> Self {
        Self {
            kind: AxisKind::Substitute { tag: String::new() },
            cost: SUBSTITUTE_COST,
            ..Self::new(label, ValueType::String)
        }
    }

    pub fn field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    pub fn min(mut self, min: Option<f64>) -> Self {
        self.min = min;
        self
    }

    pub fn max(mut self, max: Option<f64>) -> Self {
        self.max = max;
        self
    }

    pub fn choices(mut self, source: ChoiceSource, extra: &[&str]) -> Self {
        self.choices = Some(source);
        self.extra_choices = extra.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn gates(mut self, field: &str) -> Self {
        self.gates = Some(field.to_string());
        self
    }

    pub fn cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    /// Target field name.
    pub fn id(&self) -> String {
        self.field
            .clone()
            .unwrap_or_else(|| clean_name(&self.label))
    }

    /// Current legal values including sentinels, or `None` for free-form axes.
    pub fn choice_list(&self, registry: &dyn HostRegistry) -> Option<Vec<String>> {
        self.choices.map(|source| {
            let mut list = registry.choices(source);
            list.extend(self.extra_choices.iter().cloned());
            list
        })
    }

    /// Fresh per-run axis with no values.
    pub fn instantiate(&self) -> Axis {
        Axis {
            label: self.label.clone(),
            option: self.clone(),
            values: Vec::new(),
            cursor: 0,
            validity: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Axis
// ---------------------------------------------------------------------------

/// What validation needs from the outside world.
pub struct ValidationContext<'a> {
    pub registry: &'a dyn HostRegistry,
    /// Base request; substitution axes look for their tag in its prompts.
    pub request: &'a GenerationRequest,
}

/// Serializable summary of an axis, as written to the grid manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisDescriptor {
    pub label: String,
    pub param: String,
    pub values: Vec<AxisValue>,
}

/// A per-run axis: descriptor copy, parsed values, cursor and validity.
#[derive(Debug, Clone)]
pub struct Axis {
    option: AxisOption,
    label: String,
    values: Vec<AxisValue>,
    cursor: usize,
    validity: Vec<bool>,
}

impl Axis {
    /// Parse `raw` into this axis's value list, replacing any previous values.
    pub fn set(&mut self, raw: &str, registry: &dyn HostRegistry) -> Result<(), CoreError> {
        self.reset();
        if let AxisKind::Substitute { .. } = self.option.kind {
            self.set_substitution(raw);
            return Ok(());
        }
        let choices = self.option.choice_list(registry);
        self.values = parse_values(raw, self.option.value_type, choices.as_deref())?;
        Ok(())
    }

    /// Accepts `one, two`, `TAG=one, two` and `TAG=one || TAG=two, three`.
    /// The first pair (or first bare value) defines the tag.
    fn set_substitution(&mut self, raw: &str) {
        let mut tag = String::new();
        for pair in split_fragments(raw) {
            let (key, value) = match pair.split_once('=') {
                Some((key, value)) => (key.trim(), value.trim()),
                None => (pair, pair),
            };
            if key.is_empty() || value.is_empty() {
                continue;
            }
            if tag.is_empty() {
                tag = key.to_string();
            }
            self.values.push(AxisValue::Text(value.to_string()));
        }
        self.label = self.option.label.replace(TAG_PLACEHOLDER, &tag);
        self.option.kind = AxisKind::Substitute { tag };
    }

    /// Return to the freshly-instantiated state.
    pub fn reset(&mut self) {
        self.values.clear();
        self.validity.clear();
        self.cursor = 0;
        self.label = self.option.label.clone();
        if let AxisKind::Substitute { tag } = &mut self.option.kind {
            tag.clear();
        }
    }

    /// Validate every value and record per-value flags.
    ///
    /// Quiet mode logs the collected errors and returns whether all values
    /// passed. Strict mode returns the first error instead.
    pub fn validate_all(
        &mut self,
        ctx: &ValidationContext<'_>,
        strict: bool,
    ) -> Result<bool, CoreError> {
        match &self.option.kind {
            AxisKind::Nothing => {
                self.validity = vec![true; self.values.len()];
                return Ok(true);
            }
            AxisKind::Substitute { tag } => {
                let error = if tag.is_empty() {
                    Some("Values not set or invalid format".to_string())
                } else if !ctx.request.prompt.contains(tag.as_str())
                    && !ctx.request.negative_prompt.contains(tag.as_str())
                {
                    Some(format!("Tag '{tag}' not found in all prompts"))
                } else {
                    None
                };
                return match error {
                    Some(message) if strict => Err(CoreError::Validation(message)),
                    Some(message) => {
                        tracing::warn!(axis = %self.label, error = %message, "Invalid substitution axis");
                        self.validity = vec![false; self.values.len()];
                        Ok(false)
                    }
                    None => {
                        self.validity = vec![true; self.values.len()];
                        Ok(true)
                    }
                };
            }
            AxisKind::Field | AxisKind::Checkpoint | AxisKind::Vae => {}
        }

        let choices = self.option.choice_list(ctx.registry);
        let mut errors = Vec::new();
        let mut validity = Vec::with_capacity(self.values.len());
        for value in &self.values {
            match self.validate_value(value, ctx.registry, choices.as_deref()) {
                Ok(()) => validity.push(true),
                Err(reason) => {
                    let message = format!("{reason} for: {value}");
                    if strict {
                        return Err(CoreError::Validation(format!(
                            "Invalid parameters in {}: {message}",
                            self.label
                        )));
                    }
                    errors.push(message);
                    validity.push(false);
                }
            }
        }

        if !errors.is_empty() {
            tracing::warn!(axis = %self.label, ?errors, "Invalid parameters in axis");
        }
        self.validity = validity;
        Ok(errors.is_empty())
    }

    fn validate_value(
        &self,
        value: &AxisValue,
        registry: &dyn HostRegistry,
        choices: Option<&[String]>,
    ) -> Result<(), String> {
        match self.option.kind {
            AxisKind::Checkpoint => {
                let name = value.to_string();
                return registry
                    .resolve_checkpoint(&name)
                    .map(|_| ())
                    .ok_or_else(|| "Unknown checkpoint".to_string());
            }
            AxisKind::Vae => {
                if value.is_text(SENTINEL_NONE) || value.is_text(SENTINEL_AUTOMATIC) {
                    return Ok(());
                }
                let name = value.to_string();
                return if registry.vae_choices().contains(&name) {
                    Ok(())
                } else {
                    Err("Unknown VAE".to_string())
                };
            }
            _ => {}
        }

        let value_type = self.option.value_type;
        match value_type {
            ValueType::Integer | ValueType::Float => {
                let number = value
                    .as_f64()
                    .filter(|_| value.matches(value_type))
                    .ok_or_else(|| format!("Must be a {value_type} number"))?;
                if let Some(min) = self.option.min.filter(|min| number < *min) {
                    return Err(format!("Must be at least {min}"));
                }
                if let Some(max) = self.option.max.filter(|max| number > *max) {
                    return Err(format!("Must not exceed {max}"));
                }
                Ok(())
            }
            ValueType::Boolean if !value.matches(ValueType::Boolean) => {
                Err("Must be either 'True' or 'False'".to_string())
            }
            ValueType::String => match (value.as_str(), choices) {
                (None, _) => Err("Must be a valid type".to_string()),
                (Some(text), Some(list)) if text.is_empty() || !list.iter().any(|c| c == text) => {
                    Err("Not found in the list".to_string())
                }
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// Write the current value onto `config`.
    pub fn apply(&self, config: &mut GenerationRequest) -> Result<(), CoreError> {
        let value = self.value().ok_or_else(|| {
            CoreError::Application(format!("Axis {} has no values", self.label))
        })?;
        if self.validity.get(self.cursor) == Some(&false) {
            return Err(CoreError::Application(format!(
                "Value not valid for {}: {value}",
                self.label
            )));
        }

        let result = match &self.option.kind {
            AxisKind::Nothing => Ok(()),
            AxisKind::Substitute { tag } => {
                let replacement = value.to_string();
                config.prompt = config.prompt.replace(tag.as_str(), &replacement);
                config.negative_prompt = config.negative_prompt.replace(tag.as_str(), &replacement);
                Ok(())
            }
            AxisKind::Field | AxisKind::Checkpoint | AxisKind::Vae => {
                self.apply_field(value, config)
            }
        };
        result.map_err(|err| {
            CoreError::Application(format!(
                "{value} could not be applied on {}: {err}",
                self.label
            ))
        })
    }

    fn apply_field(
        &self,
        value: &AxisValue,
        config: &mut GenerationRequest,
    ) -> Result<(), CoreError> {
        let gate = self.option.gates.as_deref();
        if gate.is_none() || !value.is_text(SENTINEL_DEFAULT) {
            config.set_field(&self.id(), value)?;
        }
        if let Some(gate) = gate {
            let enabled = if self.option.choices.is_some() {
                !value.is_text(SENTINEL_NONE)
            } else {
                true
            };
            config.set_field(gate, &AxisValue::Bool(enabled))?;
        }
        Ok(())
    }

    /// Move the cursor forward. Returns `false` exactly when it wrapped to 0.
    pub fn advance(&mut self) -> bool {
        if self.cursor + 1 < self.values.len() {
            self.cursor += 1;
            true
        } else {
            self.cursor = 0;
            false
        }
    }

    pub fn id(&self) -> String {
        self.option
            .field
            .clone()
            .unwrap_or_else(|| clean_name(&self.label))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> &AxisKind {
        &self.option.kind
    }

    pub fn option(&self) -> &AxisOption {
        &self.option
    }

    pub fn values(&self) -> &[AxisValue] {
        &self.values
    }

    /// Value under the cursor.
    pub fn value(&self) -> Option<&AxisValue> {
        self.values.get(self.cursor)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn cost(&self) -> f64 {
        self.option.cost
    }

    pub fn validity(&self) -> &[bool] {
        &self.validity
    }

    /// `None` before validation, then whether every value passed.
    /// Placeholder axes are always valid.
    pub fn is_valid(&self) -> Option<bool> {
        if self.option.kind == AxisKind::Nothing {
            return Some(true);
        }
        if self.validity.is_empty() {
            return None;
        }
        Some(self.validity.iter().all(|ok| *ok))
    }

    pub fn descriptor(&self) -> AxisDescriptor {
        AxisDescriptor {
            label: self.label.clone(),
            param: self.id(),
            values: self.values.clone(),
        }
    }
}
