//! Shader compilation and reflection.
//!
//! WGSL is parsed and validated with naga before the backend sees it, so
//! compile errors carry a readable diagnostic and missing entry points are
//! reported by name. The vertex entry point's inputs are reflected to let the
//! pipeline builder check a vertex layout against them.

use naga::{Binding, Handle, Module, Type, TypeInner};

use crate::{
    backend::GpuDevice,
    data_structures::vertex_layout::ScalarKind,
    error::{RenderError, Result},
};

/// Forwards the float3 position unchanged and paints every fragment red.
pub const WIREFRAME_SHADER: &str = include_str!("wireframe.wgsl");
pub const VERTEX_ENTRY: &str = "vertex_main";
pub const FRAGMENT_ENTRY: &str = "fragment_main";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn to_naga(self) -> naga::ShaderStage {
        match self {
            Self::Vertex => naga::ShaderStage::Vertex,
            Self::Fragment => naga::ShaderStage::Fragment,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
        }
    }
}

/// A `@location` input of the vertex entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexInput {
    pub location: u32,
    pub kind: ScalarKind,
    pub components: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderFunction {
    pub name: String,
    pub stage: ShaderStage,
    /// Empty for fragment functions.
    pub inputs: Vec<VertexInput>,
}

/// A compiled vertex + fragment pair sharing one module.
#[derive(Debug)]
pub struct ShaderProgram<D: GpuDevice> {
    module: D::ShaderModule,
    vertex: ShaderFunction,
    fragment: ShaderFunction,
}

impl<D: GpuDevice> ShaderProgram<D> {
    pub fn compile(
        device: &D,
        label: &str,
        source: &str,
        vertex_entry: &str,
        fragment_entry: &str,
    ) -> Result<Self> {
        let module = parse_and_validate(source)?;
        let vertex = reflect_function(&module, vertex_entry, ShaderStage::Vertex)?;
        let fragment = reflect_function(&module, fragment_entry, ShaderStage::Fragment)?;
        log::debug!(
            "{label}: {} reads {} vertex input(s)",
            vertex.name,
            vertex.inputs.len()
        );
        let module = device.make_shader_module(label, source)?;
        Ok(Self {
            module,
            vertex,
            fragment,
        })
    }

    pub fn module(&self) -> &D::ShaderModule {
        &self.module
    }

    pub fn vertex(&self) -> &ShaderFunction {
        &self.vertex
    }

    pub fn fragment(&self) -> &ShaderFunction {
        &self.fragment
    }
}

fn parse_and_validate(source: &str) -> Result<Module> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| RenderError::Compile(e.emit_to_string(source)))?;
    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| RenderError::Compile(format!("validation error: {e}")))?;
    Ok(module)
}

fn reflect_function(module: &Module, name: &str, stage: ShaderStage) -> Result<ShaderFunction> {
    let entry_point = module
        .entry_points
        .iter()
        .find(|ep| ep.name == name && ep.stage == stage.to_naga())
        .ok_or_else(|| RenderError::MissingEntryPoint {
            name: name.to_string(),
            stage: stage.name(),
        })?;

    let mut inputs = Vec::new();
    if stage == ShaderStage::Vertex {
        for argument in &entry_point.function.arguments {
            collect_inputs(module, argument.ty, argument.binding.as_ref(), &mut inputs);
        }
        inputs.sort_by_key(|input| input.location);
    }
    Ok(ShaderFunction {
        name: name.to_string(),
        stage,
        inputs,
    })
}

/// Walks arguments and struct members. Builtins are skipped.
fn collect_inputs(
    module: &Module,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    inputs: &mut Vec<VertexInput>,
) {
    let inner = &module.types[ty].inner;
    match (inner, binding) {
        (TypeInner::Struct { members, .. }, None) => {
            for member in members {
                collect_inputs(module, member.ty, member.binding.as_ref(), inputs);
            }
        }
        (_, Some(Binding::Location { location, .. })) => {
            if let Some((kind, components)) = numeric_type(inner) {
                inputs.push(VertexInput {
                    location: *location,
                    kind,
                    components,
                });
            }
        }
        _ => (),
    }
}

fn numeric_type(inner: &TypeInner) -> Option<(ScalarKind, u32)> {
    let (scalar, components) = match inner {
        TypeInner::Scalar(scalar) => (scalar, 1),
        TypeInner::Vector { size, scalar } => (scalar, *size as u32),
        _ => return None,
    };
    let kind = match scalar.kind {
        naga::ScalarKind::Float => ScalarKind::Float,
        naga::ScalarKind::Sint => ScalarKind::Sint,
        naga::ScalarKind::Uint => ScalarKind::Uint,
        _ => return None,
    };
    Some((kind, components))
}
