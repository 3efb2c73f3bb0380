//! Interfaces to the host application.
//!
//! The grid never talks to the image engine directly. It reads legal choice
//! lists and checkpoint identities through [`HostRegistry`], snapshots and
//! restores global options through [`HostSettings`], and renders through
//! [`Renderer`]. All methods take `&self`; implementations that hold mutable
//! state use interior mutability.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::request::GenerationRequest;

// ---------------------------------------------------------------------------
// Choice sources
// ---------------------------------------------------------------------------

/// Host list an enumerated axis draws its legal values from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiceSource {
    Checkpoints,
    Vaes,
    Samplers,
    FaceRestorers,
    /// Latent upscale modes followed by model upscalers.
    Upscalers,
}

/// Resolved checkpoint identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointInfo {
    pub title: String,
    pub model_name: String,
    pub hash: Option<String>,
}

/// Read-only view of the host's model and option registries.
///
/// Lists are fetched on every call; host state can change between calls.
pub trait HostRegistry {
    /// Current legal values for `source`, without sentinels.
    fn choices(&self, source: ChoiceSource) -> Vec<String>;

    /// Resolve a checkpoint name (exact title, or closest partial match).
    fn resolve_checkpoint(&self, name: &str) -> Option<CheckpointInfo>;

    /// Names of all known VAEs.
    fn vae_choices(&self) -> Vec<String> {
        self.choices(ChoiceSource::Vaes)
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Errors reported by host-side operations.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Host request failed: {0}")]
    Request(String),

    #[error("Host rejected option '{key}': {reason}")]
    Option { key: String, reason: String },
}

/// Mutable process-wide host options plus model reload side effects.
pub trait HostSettings {
    /// Current value of a global option, `Ok(None)` when unset.
    fn option(&self, key: &str) -> Result<Option<serde_json::Value>, HostError>;

    /// Overwrite a global option. `None` clears it.
    fn set_option(&self, key: &str, value: Option<serde_json::Value>) -> Result<(), HostError>;

    /// Reload checkpoint weights to match the current options.
    fn reload_model(&self) -> Result<(), HostError>;

    /// Reload VAE weights to match the current options.
    fn reload_vae(&self) -> Result<(), HostError>;
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Everything one render call produced.
#[derive(Debug, Clone, Default)]
pub struct RenderOutput {
    /// Encoded image bytes, one entry per image.
    pub images: Vec<Vec<u8>>,
    pub all_prompts: Vec<String>,
    pub all_negative_prompts: Vec<String>,
    pub all_seeds: Vec<i64>,
    pub all_subseeds: Vec<i64>,
    pub infotexts: Vec<String>,
    /// The host was interrupted while rendering.
    pub interrupted: bool,
    /// The host chose not to produce output for this configuration.
    pub skipped: bool,
    /// Sampling steps completed when the render ended.
    pub sampling_step: u64,
}

impl RenderOutput {
    /// Whether at least one non-empty image was produced.
    pub fn has_images(&self) -> bool {
        self.images.iter().any(|image| !image.is_empty())
    }
}

/// Errors raised by a renderer. Always caught by the grid runner.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Renderer request failed: {0}")]
    Request(String),

    #[error("Renderer returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// The external image engine.
pub trait Renderer {
    /// Render one job configuration. Blocks until the host is done.
    fn render(&self, config: &GenerationRequest) -> Result<RenderOutput, RenderError>;
}

// ---------------------------------------------------------------------------
// Interrupt flag
// ---------------------------------------------------------------------------

/// Shared cancellation flag owned by the driving process and polled between
/// jobs.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
