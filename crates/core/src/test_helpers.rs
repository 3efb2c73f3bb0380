//! In-memory registry shared by unit tests.

use crate::host::{CheckpointInfo, ChoiceSource, HostRegistry};
use crate::parse::closest_match;

pub struct FakeRegistry {
    pub checkpoints: Vec<String>,
    pub vaes: Vec<String>,
    pub samplers: Vec<String>,
    pub face_restorers: Vec<String>,
    pub upscalers: Vec<String>,
}

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for FakeRegistry {
    fn default() -> Self {
        Self {
            checkpoints: strings(&["sd15.safetensors", "sdxl_base.safetensors"]),
            vaes: strings(&["vae-ft-mse.safetensors", "kl-f8.ckpt"]),
            samplers: strings(&["Euler a", "Euler", "DPM++ 2M Karras"]),
            face_restorers: strings(&["CodeFormer", "GFPGAN"]),
            upscalers: strings(&["Latent", "ESRGAN_4x"]),
        }
    }
}

impl HostRegistry for FakeRegistry {
    fn choices(&self, source: ChoiceSource) -> Vec<String> {
        match source {
            ChoiceSource::Checkpoints => self.checkpoints.clone(),
            ChoiceSource::Vaes => self.vaes.clone(),
            ChoiceSource::Samplers => self.samplers.clone(),
            ChoiceSource::FaceRestorers => self.face_restorers.clone(),
            ChoiceSource::Upscalers => self.upscalers.clone(),
        }
    }

    fn resolve_checkpoint(&self, name: &str) -> Option<CheckpointInfo> {
        closest_match(name, &self.checkpoints).map(|title| CheckpointInfo {
            title: title.to_string(),
            model_name: title.trim_end_matches(".safetensors").to_string(),
            hash: None,
        })
    }
}
