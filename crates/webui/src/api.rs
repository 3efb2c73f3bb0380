//! REST API client for the Stable Diffusion WebUI HTTP endpoints.
//!
//! Wraps the `/sdapi/v1` API (txt2img, options, model lists, reload and
//! interruption) using the blocking [`reqwest`] client, since the grid
//! runner drives renders sequentially from a worker thread.

use base64::{engine::general_purpose, Engine as _};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use advgrid_core::GenerationRequest;

/// Errors from the WebUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum WebUiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The WebUI returned a non-2xx status code.
    #[error("WebUI API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A response body could not be decoded.
    #[error("Cannot decode WebUI response: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Response of `POST /sdapi/v1/txt2img`.
#[derive(Debug, Deserialize)]
pub struct Txt2ImgResponse {
    /// Base64-encoded images.
    #[serde(default)]
    pub images: Vec<String>,
    /// JSON document encoded as a string.
    #[serde(default)]
    pub info: String,
}

/// Fields of interest inside [`Txt2ImgResponse::info`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RenderInfo {
    pub all_prompts: Vec<String>,
    pub all_negative_prompts: Vec<String>,
    pub all_seeds: Vec<i64>,
    pub all_subseeds: Vec<i64>,
    pub infotexts: Vec<String>,
}

/// Response of `GET /sdapi/v1/progress`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProgressResponse {
    pub progress: f64,
    pub state: ProgressState,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProgressState {
    pub interrupted: bool,
    pub skipped: bool,
    pub sampling_step: u64,
    pub sampling_steps: u64,
    pub job_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SdModel {
    pub title: String,
    pub model_name: String,
    #[serde(default)]
    pub hash: Option<String>,
}

/// Entry of any list endpoint returning objects with a `name` field.
#[derive(Debug, Clone, Deserialize)]
pub struct Named {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SdVae {
    pub model_name: String,
}

/// Decode a base64 image payload, tolerating a `data:` URL prefix.
pub fn decode_image(payload: &str) -> Result<Vec<u8>, WebUiError> {
    let data = payload
        .split_once(";base64,")
        .map_or(payload, |(_, data)| data);
    general_purpose::STANDARD
        .decode(data)
        .map_err(|e| WebUiError::Decode(format!("invalid base64 image: {e}")))
}

/// Parse the `info` string of a txt2img response. An empty string yields
/// empty lists.
pub fn parse_info(info: &str) -> Result<RenderInfo, WebUiError> {
    if info.trim().is_empty() {
        return Ok(RenderInfo::default());
    }
    serde_json::from_str(info).map_err(|e| WebUiError::Decode(format!("invalid info: {e}")))
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Blocking HTTP client for a single WebUI instance.
pub struct WebUiApi {
    client: reqwest::blocking::Client,
    api_url: String,
}

impl WebUiApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://127.0.0.1:7860`.
    pub fn new(api_url: String) -> Self {
        Self::with_client(reqwest::blocking::Client::new(), api_url)
    }

    pub fn with_client(client: reqwest::blocking::Client, api_url: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/sdapi/v1/{path}", self.api_url)
    }

    /// Render one request. Sends `POST /sdapi/v1/txt2img`.
    pub fn txt2img(&self, request: &GenerationRequest) -> Result<Txt2ImgResponse, WebUiError> {
        let response = self.client.post(self.url("txt2img")).json(request).send()?;
        Self::parse_response(response)
    }

    /// Current host state. Sends `GET /sdapi/v1/progress`.
    pub fn progress(&self) -> Result<ProgressResponse, WebUiError> {
        let response = self
            .client
            .get(self.url("progress"))
            .query(&[("skip_current_image", "true")])
            .send()?;
        Self::parse_response(response)
    }

    /// All global options. Sends `GET /sdapi/v1/options`.
    pub fn options(&self) -> Result<serde_json::Map<String, Value>, WebUiError> {
        let response = self.client.get(self.url("options")).send()?;
        Self::parse_response(response)
    }

    /// Overwrite global options. Sends `POST /sdapi/v1/options`.
    pub fn set_options(&self, options: &serde_json::Map<String, Value>) -> Result<(), WebUiError> {
        let response = self.client.post(self.url("options")).json(options).send()?;
        Self::check_status(response)
    }

    pub fn sd_models(&self) -> Result<Vec<SdModel>, WebUiError> {
        self.get_list("sd-models")
    }

    pub fn sd_vaes(&self) -> Result<Vec<SdVae>, WebUiError> {
        self.get_list("sd-vae")
    }

    pub fn samplers(&self) -> Result<Vec<Named>, WebUiError> {
        self.get_list("samplers")
    }

    pub fn face_restorers(&self) -> Result<Vec<Named>, WebUiError> {
        self.get_list("face-restorers")
    }

    pub fn upscalers(&self) -> Result<Vec<Named>, WebUiError> {
        self.get_list("upscalers")
    }

    pub fn latent_upscale_modes(&self) -> Result<Vec<Named>, WebUiError> {
        self.get_list("latent-upscale-modes")
    }

    /// Reload checkpoint weights. Sends `POST /sdapi/v1/reload-checkpoint`.
    pub fn reload_checkpoint(&self) -> Result<(), WebUiError> {
        let response = self.client.post(self.url("reload-checkpoint")).send()?;
        Self::check_status(response)
    }

    /// Interrupt the running render. Sends `POST /sdapi/v1/interrupt`.
    pub fn interrupt(&self) -> Result<(), WebUiError> {
        let response = self.client.post(self.url("interrupt")).send()?;
        Self::check_status(response)
    }

    // ---- private helpers ----

    fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, WebUiError> {
        let response = self.client.get(self.url(path)).send()?;
        Self::parse_response(response)
    }

    /// Ensure the response has a success status code.
    fn ensure_success(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, WebUiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(WebUiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    fn parse_response<T: DeserializeOwned>(
        response: reqwest::blocking::Response,
    ) -> Result<T, WebUiError> {
        let response = Self::ensure_success(response)?;
        Ok(response.json::<T>()?)
    }

    fn check_status(response: reqwest::blocking::Response) -> Result<(), WebUiError> {
        Self::ensure_success(response)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Async interrupt
// ---------------------------------------------------------------------------

/// Async handle used from signal handlers while the blocking client is busy
/// rendering on another thread.
#[derive(Clone)]
pub struct InterruptHandle {
    client: reqwest::Client,
    api_url: String,
}

impl InterruptHandle {
    pub fn new(api_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Interrupt whatever is rendering right now.
    pub async fn interrupt(&self) -> Result<(), WebUiError> {
        let response = self
            .client
            .post(format!("{}/sdapi/v1/interrupt", self.api_url))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(WebUiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
