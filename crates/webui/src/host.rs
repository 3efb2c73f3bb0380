//! [`WebUiHost`]: the host traits implemented over the REST API.
//!
//! Registry lookups cannot fail at the trait level; transport errors are
//! logged and surface as empty lists, which validation then reports as
//! unknown values.

use advgrid_core::host::{
    CheckpointInfo, ChoiceSource, HostError, HostRegistry, HostSettings, RenderError,
    RenderOutput, Renderer,
};
use advgrid_core::parse::closest_match;
use advgrid_core::types::{SENTINEL_AUTOMATIC, SENTINEL_NONE};
use advgrid_core::GenerationRequest;
use serde_json::Value;

use crate::api::{decode_image, parse_info, WebUiApi, WebUiError};

/// Option whose change makes the WebUI reload VAE weights.
const SD_VAE_OPTION: &str = "sd_vae";

pub struct WebUiHost {
    api: WebUiApi,
}

impl WebUiHost {
    pub fn new(api: WebUiApi) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &WebUiApi {
        &self.api
    }

    fn list_or_empty<T>(&self, what: &str, result: Result<Vec<T>, WebUiError>) -> Vec<T> {
        result.unwrap_or_else(|e| {
            tracing::error!(list = what, error = %e, "Failed to fetch list from WebUI");
            Vec::new()
        })
    }

    fn names(&self, source: ChoiceSource) -> Vec<String> {
        match source {
            ChoiceSource::Checkpoints => self
                .list_or_empty("checkpoints", self.api.sd_models())
                .into_iter()
                .map(|m| m.title)
                .collect(),
            ChoiceSource::Vaes => self
                .list_or_empty("vaes", self.api.sd_vaes())
                .into_iter()
                .map(|v| v.model_name)
                .collect(),
            ChoiceSource::Samplers => self
                .list_or_empty("samplers", self.api.samplers())
                .into_iter()
                .map(|n| n.name)
                .collect(),
            ChoiceSource::FaceRestorers => self
                .list_or_empty("face restorers", self.api.face_restorers())
                .into_iter()
                .map(|n| n.name)
                .collect(),
            ChoiceSource::Upscalers => {
                let mut names: Vec<String> = self
                    .list_or_empty("latent upscale modes", self.api.latent_upscale_modes())
                    .into_iter()
                    .map(|n| n.name)
                    .collect();
                names.extend(
                    self.list_or_empty("upscalers", self.api.upscalers())
                        .into_iter()
                        .map(|n| n.name),
                );
                names
            }
        }
    }
}

/// A VAE value different from `current`, used to force a reload.
fn vae_detour(current: &Value) -> Value {
    if current.as_str() == Some(SENTINEL_NONE) {
        Value::from(SENTINEL_AUTOMATIC)
    } else {
        Value::from(SENTINEL_NONE)
    }
}

fn host_error(e: WebUiError) -> HostError {
    HostError::Request(e.to_string())
}

fn render_error(e: WebUiError) -> RenderError {
    match e {
        WebUiError::Decode(msg) => RenderError::InvalidResponse(msg),
        other => RenderError::Request(other.to_string()),
    }
}

impl HostRegistry for WebUiHost {
    fn choices(&self, source: ChoiceSource) -> Vec<String> {
        self.names(source)
    }

    fn resolve_checkpoint(&self, name: &str) -> Option<CheckpointInfo> {
        let models = self.list_or_empty("checkpoints", self.api.sd_models());
        let exact = models
            .iter()
            .find(|m| m.title == name || m.model_name == name);
        let model = match exact {
            Some(model) => model,
            None => {
                let titles: Vec<String> = models.iter().map(|m| m.title.clone()).collect();
                let title = closest_match(name, &titles)?;
                models.iter().find(|m| m.title == title)?
            }
        };
        Some(CheckpointInfo {
            title: model.title.clone(),
            model_name: model.model_name.clone(),
            hash: model.hash.clone(),
        })
    }
}

impl HostSettings for WebUiHost {
    fn option(&self, key: &str) -> Result<Option<Value>, HostError> {
        let mut options = self.api.options().map_err(host_error)?;
        Ok(options.remove(key).filter(|v| !v.is_null()))
    }

    fn set_option(&self, key: &str, value: Option<Value>) -> Result<(), HostError> {
        let mut body = serde_json::Map::new();
        body.insert(key.to_string(), value.unwrap_or(Value::Null));
        self.api.set_options(&body).map_err(|e| HostError::Option {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    fn reload_model(&self) -> Result<(), HostError> {
        self.api.reload_checkpoint().map_err(host_error)
    }

    /// The WebUI only reloads VAE weights when `sd_vae` changes value, so
    /// the option is switched to another sentinel and back.
    fn reload_vae(&self) -> Result<(), HostError> {
        let Some(current) = self.option(SD_VAE_OPTION)? else {
            tracing::debug!("No VAE option set, nothing to reload");
            return Ok(());
        };
        self.set_option(SD_VAE_OPTION, Some(vae_detour(&current)))?;
        self.set_option(SD_VAE_OPTION, Some(current))
    }
}

impl Renderer for WebUiHost {
    fn render(&self, config: &GenerationRequest) -> Result<RenderOutput, RenderError> {
        let response = self.api.txt2img(config).map_err(render_error)?;
        let info = parse_info(&response.info).map_err(render_error)?;
        let images = response
            .images
            .iter()
            .map(|payload| decode_image(payload))
            .collect::<Result<Vec<_>, _>>()
            .map_err(render_error)?;

        // Flags stay set on the host until the next job starts.
        let state = match self.api.progress() {
            Ok(progress) => progress.state,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot read WebUI state after render");
                Default::default()
            }
        };

        Ok(RenderOutput {
            images,
            all_prompts: info.all_prompts,
            all_negative_prompts: info.all_negative_prompts,
            all_seeds: info.all_seeds,
            all_subseeds: info.all_subseeds,
            infotexts: info.infotexts,
            interrupted: state.interrupted,
            skipped: state.skipped,
            sampling_step: state.sampling_step,
        })
    }
}
