//! Runtime configuration.
//!
//! Defaults reproduce the playground: a 600x600 view cleared to a pale yellow,
//! rendering `train.obj` from `./assets`. The asset location can be overridden
//! through `WIRE_NGIN_ASSET_DIR` and `WIRE_NGIN_MODEL`.

use std::path::{Path, PathBuf};

pub const ASSET_DIR_ENV: &str = "WIRE_NGIN_ASSET_DIR";
pub const MODEL_ENV: &str = "WIRE_NGIN_MODEL";

/// Size, background and pixel format of the live view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewConfig {
    pub width: u32,
    pub height: u32,
    pub clear_colour: wgpu::Color,
    pub color_format: wgpu::TextureFormat,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            width: 600,
            height: 600,
            clear_colour: wgpu::Color {
                r: 1.0,
                g: 1.0,
                b: 0.8,
                a: 1.0,
            },
            color_format: wgpu::TextureFormat::Bgra8Unorm,
        }
    }
}

/// Where model files are looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetConfig {
    pub root: PathBuf,
    pub model: String,
}

impl AssetConfig {
    pub fn new(root: impl Into<PathBuf>, model: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            model: model.into(),
        }
    }

    pub fn resolve(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self::new(Path::new("./").join("assets"), "train.obj")
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub view: ViewConfig,
    pub assets: AssetConfig,
}

impl Config {
    /// Defaults with the asset location taken from the environment when set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(root) = lookup(ASSET_DIR_ENV).filter(|v| !v.is_empty()) {
            config.assets.root = PathBuf::from(root);
        }
        if let Some(model) = lookup(MODEL_ENV).filter(|v| !v.is_empty()) {
            config.assets.model = model;
        }
        config
    }
}
