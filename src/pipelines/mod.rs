//! Shader programs and render pipeline construction.
//!
//! - `shader` compiles and reflects the WGSL vertex/fragment pair
//! - `state` checks a vertex layout against the shader and builds the
//!   immutable [`state::PipelineState`]
//!
//! The WGSL used by the renderer lives next to these modules in
//! `wireframe.wgsl`.

pub mod shader;
pub mod state;
