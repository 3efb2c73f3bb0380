//! Scoped protection of host-global settings.
//!
//! [`SharedSettingsGuard`] snapshots the shared options, plus every option
//! the run pushes through per-job overrides, and restores them when dropped,
//! followed by a model and VAE reload. Restoration lives in `Drop`, so it
//! runs on every exit path of a grid run once the snapshot has been taken.
//!
//! Capturing fails if any option cannot be read: restoring an unknown value
//! would clear a setting the host actually had.

use advgrid_core::host::{HostError, HostSettings};
use advgrid_core::request::SHARED_OPTIONS;
use serde_json::Value;

/// Host option toggled by the force-VAE setting.
pub const VAE_OVERRIDES_MODEL_PREFERENCES: &str = "sd_vae_overrides_per_model_preferences";

pub struct SharedSettingsGuard<'a> {
    settings: &'a dyn HostSettings,
    snapshot: Vec<(String, Option<Value>)>,
}

impl<'a> SharedSettingsGuard<'a> {
    /// Snapshot every shared option, the VAE preference flag and each of
    /// `override_keys`.
    pub fn capture<'k>(
        settings: &'a dyn HostSettings,
        override_keys: impl IntoIterator<Item = &'k str>,
    ) -> Result<Self, HostError> {
        let mut keys: Vec<&str> = SHARED_OPTIONS
            .iter()
            .copied()
            .chain(std::iter::once(VAE_OVERRIDES_MODEL_PREFERENCES))
            .collect();
        for key in override_keys {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }

        let snapshot = keys
            .into_iter()
            .map(|key| Ok((key.to_string(), settings.option(key)?)))
            .collect::<Result<Vec<_>, HostError>>()?;
        Ok(Self { settings, snapshot })
    }

    /// Keys held by the snapshot.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.snapshot.iter().map(|(key, _)| key.as_str())
    }

    fn restore(&self) {
        for (key, value) in &self.snapshot {
            if let Err(e) = self.settings.set_option(key, value.clone()) {
                tracing::error!(key = %key, error = %e, "Failed to restore shared option");
            }
        }
        if let Err(e) = self.settings.reload_model() {
            tracing::error!(error = %e, "Failed to reload model weights");
        }
        if let Err(e) = self.settings.reload_vae() {
            tracing::error!(error = %e, "Failed to reload VAE weights");
        }
        tracing::debug!(options = self.snapshot.len(), "Shared options restored");
    }
}

impl Drop for SharedSettingsGuard<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}
