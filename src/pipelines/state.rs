use crate::{
    backend::GpuDevice,
    data_structures::vertex_layout::{MeshVertexDescriptor, VertexLayout},
    error::{RenderError, Result},
    pipelines::shader::ShaderProgram,
};

/// Everything a backend needs to create a render pipeline. Only built by
/// [`PipelineBuilder`], after the layout has been checked against the shader.
pub struct PipelineDescriptor<'a, D: GpuDevice> {
    pub label: &'a str,
    pub module: &'a D::ShaderModule,
    pub vertex_entry: &'a str,
    pub fragment_entry: &'a str,
    pub color_format: wgpu::TextureFormat,
    pub vertex_layout: &'a VertexLayout,
    pub wireframe: bool,
}

/// Immutable, backend-validated pipeline.
#[derive(Debug)]
pub struct PipelineState<D: GpuDevice> {
    raw: D::Pipeline,
    color_format: wgpu::TextureFormat,
    vertex_layout: VertexLayout,
    wireframe: bool,
}

impl<D: GpuDevice> PipelineState<D> {
    pub fn raw(&self) -> &D::Pipeline {
        &self.raw
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    pub fn vertex_layout(&self) -> &VertexLayout {
        &self.vertex_layout
    }

    pub fn supports_wireframe(&self) -> bool {
        self.wireframe
    }
}

pub struct PipelineBuilder<'a, D: GpuDevice> {
    label: &'a str,
    program: &'a ShaderProgram<D>,
    color_format: Option<wgpu::TextureFormat>,
    vertex_layout: Option<&'a VertexLayout>,
    mesh_descriptor: Option<&'a MeshVertexDescriptor>,
}

impl<'a, D: GpuDevice> PipelineBuilder<'a, D> {
    pub fn new(program: &'a ShaderProgram<D>) -> Self {
        Self {
            label: "Wireframe Pipeline",
            program,
            color_format: None,
            vertex_layout: None,
            mesh_descriptor: None,
        }
    }

    pub fn label(mut self, label: &'a str) -> Self {
        self.label = label;
        self
    }

    pub fn color_format(mut self, format: wgpu::TextureFormat) -> Self {
        self.color_format = Some(format);
        self
    }

    pub fn vertex_layout(mut self, layout: &'a VertexLayout) -> Self {
        self.vertex_layout = Some(layout);
        self
    }

    /// Ties the pipeline to the descriptor a mesh was loaded with. `build`
    /// then refuses a vertex layout that differs from it.
    pub fn mesh_descriptor(mut self, descriptor: &'a MeshVertexDescriptor) -> Self {
        self.mesh_descriptor = Some(descriptor);
        self
    }

    pub fn build(self, device: &D) -> Result<PipelineState<D>> {
        let color_format = self.color_format.ok_or_else(|| {
            RenderError::BackendRejected("pipeline has no color attachment format".into())
        })?;
        let vertex_layout = self.vertex_layout.ok_or_else(|| {
            RenderError::BackendRejected("pipeline has no vertex layout".into())
        })?;
        let renderable = color_format
            .guaranteed_format_features(wgpu::Features::empty())
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT);
        if color_format.is_depth_stencil_format() || !renderable {
            return Err(RenderError::BackendRejected(format!(
                "{color_format:?} cannot be used as a color attachment"
            )));
        }
        if let Some(descriptor) = self.mesh_descriptor {
            if descriptor.to_vertex_layout()? != *vertex_layout {
                return Err(RenderError::BackendRejected(
                    "vertex layout differs from the layout the mesh was loaded with".into(),
                ));
            }
        }
        check_vertex_inputs(self.program, vertex_layout)?;

        let wireframe = device.supports_wireframe();
        let raw = device.make_render_pipeline(&PipelineDescriptor {
            label: self.label,
            module: self.program.module(),
            vertex_entry: &self.program.vertex().name,
            fragment_entry: &self.program.fragment().name,
            color_format,
            vertex_layout,
            wireframe,
        })?;
        log::debug!(
            "{}: {color_format:?}, {} attribute(s), wireframe: {wireframe}",
            self.label,
            vertex_layout.attribute_count()
        );
        Ok(PipelineState {
            raw,
            color_format,
            vertex_layout: vertex_layout.clone(),
            wireframe,
        })
    }
}

/// Every shader input needs an attribute of the same scalar kind. The
/// component count may differ: missing components are filled in by the GPU.
fn check_vertex_inputs<D: GpuDevice>(
    program: &ShaderProgram<D>,
    layout: &VertexLayout,
) -> Result<()> {
    for input in &program.vertex().inputs {
        let attribute = layout.attribute(input.location).ok_or_else(|| {
            RenderError::BackendRejected(format!(
                "`{}` reads location {} but the vertex layout has no attribute there",
                program.vertex().name,
                input.location
            ))
        })?;
        if attribute.format.kind() != input.kind {
            return Err(RenderError::BackendRejected(format!(
                "attribute {} is {:?} but `{}` expects {:?} data",
                input.location,
                attribute.format,
                program.vertex().name,
                input.kind
            )));
        }
    }
    Ok(())
}
