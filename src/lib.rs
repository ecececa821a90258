//! wire-ngin
//!
//! Loads a mesh from an OBJ file, builds a minimal wgpu pipeline for it and
//! draws it once as a wireframe. Every setup step is an explicit, fallible
//! stage, and the GPU sits behind a small set of traits so the whole sequence
//! also runs without hardware.
//!
//! High-level modules
//! - `backend`: device/queue/view traits with a wgpu and a recording implementation
//! - `config`: view and asset settings
//! - `context`: window bound GPU setup and a headless variant
//! - `data_structures`: vertex layouts, the loader's vertex descriptor, meshes
//! - `error`: `RenderError` and its failure kinds
//! - `flow`: the winit event loop hosting the single frame
//! - `pipelines`: shader compilation and pipeline state
//! - `playground`: the typestate setup sequence
//! - `render`: frame encoding
//! - `resources`: OBJ loading into GPU buffers
//!

pub mod backend;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod flow;
pub mod pipelines;
pub mod playground;
pub mod render;
pub mod resources;

pub use error::{FailureKind, RenderError};
pub use wgpu;
