use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;

use advgrid_core::host::{
    CheckpointInfo, ChoiceSource, HostError, HostRegistry, HostSettings, RenderError,
    RenderOutput, Renderer,
};
use advgrid_core::parse::closest_match;
use advgrid_core::GenerationRequest;
use advgrid_pipeline::{GridOptions, Host};
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde_json::Value;

/// What the fake renderer does for the next call.
#[derive(Debug, Clone, Copy)]
pub enum Behaviour {
    Image,
    Fail,
    Empty,
    Skip,
    Interrupt,
}

/// In-memory host: registry, global settings and renderer in one.
///
/// Rendering copies the job's override settings into the global options,
/// the way a host does when overrides are not restored afterwards.
pub struct FakeHost {
    pub options: RefCell<HashMap<String, Value>>,
    pub renders: RefCell<Vec<GenerationRequest>>,
    pub reloads: Cell<u32>,
    /// Option reads fail while set.
    pub unreadable: Cell<bool>,
    behaviours: RefCell<VecDeque<Behaviour>>,
    checkpoints: Vec<String>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            options: RefCell::new(HashMap::new()),
            renders: RefCell::new(Vec::new()),
            reloads: Cell::new(0),
            unreadable: Cell::new(false),
            behaviours: RefCell::new(VecDeque::new()),
            checkpoints: vec!["sd15.safetensors".into(), "sdxl.safetensors".into()],
        }
    }

    /// Queue behaviours for the next renders; `Image` afterwards.
    pub fn script(&self, behaviours: &[Behaviour]) {
        self.behaviours.borrow_mut().extend(behaviours.iter().copied());
    }

    pub fn set(&self, key: &str, value: Value) {
        self.options.borrow_mut().insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.options.borrow().get(key).cloned()
    }

    pub fn render_count(&self) -> usize {
        self.renders.borrow().len()
    }

    pub fn host(&self) -> Host<'_> {
        Host {
            registry: self,
            settings: self,
            renderer: self,
        }
    }
}

pub fn png_bytes() -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, image::Rgba([200, 10, 10, 255])));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

impl HostRegistry for FakeHost {
    fn choices(&self, source: ChoiceSource) -> Vec<String> {
        let list: &[&str] = match source {
            ChoiceSource::Checkpoints => return self.checkpoints.clone(),
            ChoiceSource::Vaes => &["vae-ft-mse.safetensors"],
            ChoiceSource::Samplers => &["Euler a", "DDIM"],
            ChoiceSource::FaceRestorers => &["CodeFormer", "GFPGAN"],
            ChoiceSource::Upscalers => &["Latent", "ESRGAN_4x"],
        };
        list.iter().map(|s| s.to_string()).collect()
    }

    fn resolve_checkpoint(&self, name: &str) -> Option<CheckpointInfo> {
        closest_match(name, &self.checkpoints).map(|title| CheckpointInfo {
            title: title.to_string(),
            model_name: title.to_string(),
            hash: None,
        })
    }
}

impl HostSettings for FakeHost {
    fn option(&self, key: &str) -> Result<Option<Value>, HostError> {
        if self.unreadable.get() {
            return Err(HostError::Request("options endpoint unavailable".into()));
        }
        Ok(self.get(key))
    }

    fn set_option(&self, key: &str, value: Option<Value>) -> Result<(), HostError> {
        let mut options = self.options.borrow_mut();
        match value {
            Some(value) => options.insert(key.to_string(), value),
            None => options.remove(key),
        };
        Ok(())
    }

    fn reload_model(&self) -> Result<(), HostError> {
        self.reloads.set(self.reloads.get() + 1);
        Ok(())
    }

    fn reload_vae(&self) -> Result<(), HostError> {
        self.reloads.set(self.reloads.get() + 1);
        Ok(())
    }
}

impl Renderer for FakeHost {
    fn render(&self, config: &GenerationRequest) -> Result<RenderOutput, RenderError> {
        self.renders.borrow_mut().push(config.clone());
        for (key, value) in &config.override_settings {
            self.set(key, value.clone());
        }

        let behaviour = self
            .behaviours
            .borrow_mut()
            .pop_front()
            .unwrap_or(Behaviour::Image);
        let mut output = RenderOutput {
            all_prompts: vec![config.prompt.clone()],
            all_negative_prompts: vec![config.negative_prompt.clone()],
            all_seeds: vec![config.seed],
            all_subseeds: vec![config.subseed],
            infotexts: vec!["host infotext".into()],
            sampling_step: u64::from(config.steps),
            ..Default::default()
        };
        match behaviour {
            Behaviour::Image => output.images = vec![png_bytes()],
            Behaviour::Fail => return Err(RenderError::Request("CUDA out of memory".into())),
            Behaviour::Empty => {}
            Behaviour::Skip => {
                output.skipped = true;
                output.sampling_step = 5;
            }
            Behaviour::Interrupt => output.interrupted = true,
        }
        Ok(output)
    }
}

/// Options writing into `dir`, web-asset mode on.
pub fn options_in(dir: &std::path::Path) -> GridOptions {
    GridOptions {
        name: Some("test grid".into()),
        web_assets: true,
        output_dir: dir.to_path_buf(),
        ..Default::default()
    }
}
