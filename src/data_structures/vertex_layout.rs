//! Vertex layouts and the mesh-side vertex descriptor.
//!
//! A [`VertexLayout`] is what the pipeline sees: attributes addressed by shader
//! location, each reading from a buffer slot at an offset, and one stride per
//! slot. The mesh loader works with a [`MeshVertexDescriptor`] instead, which
//! additionally names every attribute with a [`Semantic`] so the loader knows
//! which asset data to pack where.
//!
//! Both directions of the conversion are explicit and validated:
//!
//! ```ignore
//! let layout = VertexLayout::position_only();
//! let descriptor = MeshVertexDescriptor::from_layout(&layout, &[Semantic::Position])?;
//! assert_eq!(descriptor.to_vertex_layout()?, layout);
//! ```

use std::collections::BTreeMap;

use crate::error::{RenderError, Result};

/// wgpu (and Metal) require strides and offsets to be 4 byte aligned.
pub const VERTEX_ALIGNMENT: u64 = 4;
/// Matches `wgpu::Limits::default().max_vertex_buffer_array_stride`.
pub const MAX_STRIDE: u64 = 2048;

/// Scalar type of a vertex attribute or a shader input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Float,
    Sint,
    Uint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Sint32,
    Sint32x2,
    Sint32x3,
    Sint32x4,
    Uint32,
    Uint32x2,
    Uint32x3,
    Uint32x4,
}

impl VertexFormat {
    pub fn components(&self) -> u32 {
        match self {
            Self::Float32 | Self::Sint32 | Self::Uint32 => 1,
            Self::Float32x2 | Self::Sint32x2 | Self::Uint32x2 => 2,
            Self::Float32x3 | Self::Sint32x3 | Self::Uint32x3 => 3,
            Self::Float32x4 | Self::Sint32x4 | Self::Uint32x4 => 4,
        }
    }

    /// Size in bytes. Every supported format has 4 byte components.
    pub fn size(&self) -> u64 {
        u64::from(self.components()) * 4
    }

    pub fn kind(&self) -> ScalarKind {
        match self {
            Self::Float32 | Self::Float32x2 | Self::Float32x3 | Self::Float32x4 => {
                ScalarKind::Float
            }
            Self::Sint32 | Self::Sint32x2 | Self::Sint32x3 | Self::Sint32x4 => ScalarKind::Sint,
            Self::Uint32 | Self::Uint32x2 | Self::Uint32x3 | Self::Uint32x4 => ScalarKind::Uint,
        }
    }

    pub fn to_wgpu(self) -> wgpu::VertexFormat {
        match self {
            Self::Float32 => wgpu::VertexFormat::Float32,
            Self::Float32x2 => wgpu::VertexFormat::Float32x2,
            Self::Float32x3 => wgpu::VertexFormat::Float32x3,
            Self::Float32x4 => wgpu::VertexFormat::Float32x4,
            Self::Sint32 => wgpu::VertexFormat::Sint32,
            Self::Sint32x2 => wgpu::VertexFormat::Sint32x2,
            Self::Sint32x3 => wgpu::VertexFormat::Sint32x3,
            Self::Sint32x4 => wgpu::VertexFormat::Sint32x4,
            Self::Uint32 => wgpu::VertexFormat::Uint32,
            Self::Uint32x2 => wgpu::VertexFormat::Uint32x2,
            Self::Uint32x3 => wgpu::VertexFormat::Uint32x3,
            Self::Uint32x4 => wgpu::VertexFormat::Uint32x4,
        }
    }
}

/// What an attribute means to the mesh loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semantic {
    Position,
    Normal,
    TextureCoordinate,
}

impl Semantic {
    /// The format the asset data for this semantic is stored in.
    pub fn natural_format(&self) -> VertexFormat {
        match self {
            Self::Position | Self::Normal => VertexFormat::Float32x3,
            Self::TextureCoordinate => VertexFormat::Float32x2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub format: VertexFormat,
    pub offset: u64,
    pub buffer_index: u32,
}

/// Validated, immutable vertex layout. Build it with [`VertexLayout::builder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    attributes: BTreeMap<u32, VertexAttribute>,
    strides: Vec<u64>,
}

impl VertexLayout {
    pub fn builder() -> VertexLayoutBuilder {
        VertexLayoutBuilder::default()
    }

    /// One float3 position at location 0, tightly packed in buffer slot 0.
    pub fn position_only() -> Self {
        let format = VertexFormat::Float32x3;
        Self {
            attributes: BTreeMap::from([(
                0,
                VertexAttribute {
                    format,
                    offset: 0,
                    buffer_index: 0,
                },
            )]),
            strides: vec![std::mem::size_of::<[f32; 3]>() as u64],
        }
    }

    /// Attributes ordered by shader location.
    pub fn attributes(&self) -> impl Iterator<Item = (u32, &VertexAttribute)> {
        self.attributes.iter().map(|(location, attr)| (*location, attr))
    }

    pub fn attribute(&self, location: u32) -> Option<&VertexAttribute> {
        self.attributes.get(&location)
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn stride(&self, slot: u32) -> Option<u64> {
        self.strides.get(slot as usize).copied()
    }

    pub fn buffer_count(&self) -> u32 {
        self.strides.len() as u32
    }

    /// Per-slot wgpu attribute lists for building a render pipeline.
    pub fn to_wgpu(&self) -> NativeVertexLayout {
        let buffers = self
            .strides
            .iter()
            .enumerate()
            .map(|(slot, stride)| {
                let attributes = self
                    .attributes
                    .iter()
                    .filter(|(_, attr)| attr.buffer_index as usize == slot)
                    .map(|(location, attr)| wgpu::VertexAttribute {
                        format: attr.format.to_wgpu(),
                        offset: attr.offset,
                        shader_location: *location,
                    })
                    .collect();
                (*stride, attributes)
            })
            .collect();
        NativeVertexLayout { buffers }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VertexLayoutBuilder {
    attributes: BTreeMap<u32, VertexAttribute>,
    strides: BTreeMap<u32, u64>,
}

impl VertexLayoutBuilder {
    pub fn attribute(
        mut self,
        location: u32,
        format: VertexFormat,
        offset: u64,
        buffer_index: u32,
    ) -> Self {
        self.attributes.insert(
            location,
            VertexAttribute {
                format,
                offset,
                buffer_index,
            },
        );
        self
    }

    pub fn stride(mut self, slot: u32, stride: u64) -> Self {
        self.strides.insert(slot, stride);
        self
    }

    pub fn build(self) -> Result<VertexLayout> {
        if self.attributes.is_empty() {
            return Err(RenderError::InvalidLayout("no attributes declared".into()));
        }
        // Slots are bound by index, so they have to start at 0 without gaps.
        for (expected, slot) in self.strides.keys().enumerate() {
            if *slot as usize != expected {
                return Err(RenderError::InvalidLayout(format!(
                    "buffer slot {slot} declared but slot {expected} is missing"
                )));
            }
        }
        for (slot, stride) in &self.strides {
            if *stride == 0 || stride % VERTEX_ALIGNMENT != 0 || *stride > MAX_STRIDE {
                return Err(RenderError::InvalidLayout(format!(
                    "stride {stride} of slot {slot} must be a non-zero multiple of {VERTEX_ALIGNMENT} up to {MAX_STRIDE}"
                )));
            }
        }
        for (location, attr) in &self.attributes {
            let Some(stride) = self.strides.get(&attr.buffer_index) else {
                return Err(RenderError::InvalidLayout(format!(
                    "attribute {location} reads from slot {} which has no stride",
                    attr.buffer_index
                )));
            };
            if attr.offset % VERTEX_ALIGNMENT != 0 {
                return Err(RenderError::InvalidLayout(format!(
                    "attribute {location} has unaligned offset {}",
                    attr.offset
                )));
            }
            let end = attr.offset.checked_add(attr.format.size());
            if end.is_none_or(|end| end > *stride) {
                return Err(RenderError::InvalidLayout(format!(
                    "attribute {location} ({:?} at offset {}) overruns stride {stride}",
                    attr.format, attr.offset
                )));
            }
        }
        Ok(VertexLayout {
            attributes: self.attributes,
            strides: self.strides.into_values().collect(),
        })
    }
}

/// A [`VertexLayout`] expressed with wgpu types, one entry per buffer slot.
#[derive(Debug, Clone)]
pub struct NativeVertexLayout {
    buffers: Vec<(u64, Vec<wgpu::VertexAttribute>)>,
}

impl NativeVertexLayout {
    pub fn buffers(&self) -> Vec<wgpu::VertexBufferLayout<'_>> {
        self.buffers
            .iter()
            .map(|(stride, attributes)| wgpu::VertexBufferLayout {
                array_stride: *stride as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshAttribute {
    pub semantic: Semantic,
    pub location: u32,
    pub attribute: VertexAttribute,
}

/// The loader's view of a vertex layout: every attribute carries a semantic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshVertexDescriptor {
    attributes: Vec<MeshAttribute>,
    strides: Vec<u64>,
}

impl MeshVertexDescriptor {
    /// Names the layout's attributes, in location order, with `semantics`.
    pub fn from_layout(layout: &VertexLayout, semantics: &[Semantic]) -> Result<Self> {
        if semantics.len() != layout.attribute_count() {
            return Err(RenderError::InvalidLayout(format!(
                "{} semantics given for {} attributes",
                semantics.len(),
                layout.attribute_count()
            )));
        }
        let mut attributes: Vec<MeshAttribute> = Vec::with_capacity(semantics.len());
        for ((location, attribute), semantic) in layout.attributes().zip(semantics) {
            if attributes.iter().any(|a| a.semantic == *semantic) {
                return Err(RenderError::InvalidLayout(format!(
                    "semantic {semantic:?} assigned twice"
                )));
            }
            attributes.push(MeshAttribute {
                semantic: *semantic,
                location,
                attribute: *attribute,
            });
        }
        Ok(Self {
            attributes,
            strides: layout.strides.clone(),
        })
    }

    pub fn attributes(&self) -> &[MeshAttribute] {
        &self.attributes
    }

    pub fn attribute(&self, semantic: Semantic) -> Option<&MeshAttribute> {
        self.attributes.iter().find(|a| a.semantic == semantic)
    }

    pub fn stride(&self, slot: u32) -> Option<u64> {
        self.strides.get(slot as usize).copied()
    }

    /// Drops the semantics again. Re-validates, so a descriptor edited by hand
    /// cannot smuggle an invalid layout into a pipeline.
    pub fn to_vertex_layout(&self) -> Result<VertexLayout> {
        let builder = self
            .strides
            .iter()
            .enumerate()
            .fold(VertexLayout::builder(), |b, (slot, stride)| {
                b.stride(slot as u32, *stride)
            });
        self.attributes
            .iter()
            .fold(builder, |b, a| {
                b.attribute(
                    a.location,
                    a.attribute.format,
                    a.attribute.offset,
                    a.attribute.buffer_index,
                )
            })
            .build()
    }
}
