//! Plain descriptions of host resources, views and commands.

use bitflags::bitflags;

use crate::format::DxgiFormat;

/// Opaque host GPU resource (texture or buffer).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(pub u64);

/// Opaque physical memory heap that reserved resources map tiles from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct HeapHandle(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub u64);

/// Opaque heap of view descriptors.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ViewHeapHandle(pub u64);

/// GPU virtual address, used for root constant buffer views.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct GpuAddress(pub u64);

/// CPU-side handle of one descriptor slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CpuDescriptor {
    pub heap: ViewHeapHandle,
    pub index: u32,
}

impl CpuDescriptor {
    pub fn offset(self, slots: u32) -> Self {
        Self {
            heap: self.heap,
            index: self.index + slots,
        }
    }
}

/// Shader-visible handle of one descriptor slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct GpuDescriptor {
    pub heap: ViewHeapHandle,
    pub index: u32,
}

/// The two handles of a shader-visible descriptor slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorPair {
    pub cpu: CpuDescriptor,
    pub gpu: GpuDescriptor,
}

bitflags! {
    /// Access state of a host resource, numbered like `D3D12_RESOURCE_STATES`.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct ResourceState: u32 {
        const UNORDERED_ACCESS = 0x8;
        const NON_PIXEL_SHADER_RESOURCE = 0x40;
        const PIXEL_SHADER_RESOURCE = 0x80;
        const COPY_DEST = 0x400;
        const COPY_SOURCE = 0x800;
    }
}

impl ResourceState {
    pub const ALL_SHADER_RESOURCE: Self =
        Self::NON_PIXEL_SHADER_RESOURCE.union(Self::PIXEL_SHADER_RESOURCE);
}

/// What the host device can do, queried once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapabilities {
    /// Reserved (tiled) resources that can map heap memory tile by tile.
    pub tiled_resources: bool,
    /// Width of the GPU virtual address range a single resource may span.
    pub virtual_address_bits_per_resource: u32,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            tiled_resources: true,
            virtual_address_bits_per_resource: 40,
        }
    }
}

/// A compute program compiled by the host, identified by name.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ComputeProgram {
    pub name: &'static str,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResourceDimension {
    Texture2D,
    Texture3D,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextureResourceDesc {
    pub dimension: ResourceDimension,
    pub format: DxgiFormat,
    pub width: u32,
    pub height: u32,
    pub depth_or_array_size: u32,
    pub mip_levels: u32,
    pub initial_state: ResourceState,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ViewDimension {
    Texture2D { mip_levels: u32 },
    Texture2DArray { mip_levels: u32, array_size: u32 },
    Texture3D { mip_levels: u32 },
    TextureCube { mip_levels: u32 },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextureViewDesc {
    pub format: DxgiFormat,
    pub dimension: ViewDimension,
    /// Four 3-bit channel selectors plus the "always set" bit 12.
    pub component_mapping: u32,
}

/// Bit that must be set in every [`TextureViewDesc::component_mapping`].
pub const COMPONENT_MAPPING_ALWAYS_SET_BIT: u32 = 1 << 12;

/// Typed view over a range of a buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BufferViewDesc {
    pub format: DxgiFormat,
    pub first_element: u64,
    pub num_elements: u32,
}

/// Layout of one subresource inside a buffer, for buffer-to-texture copies.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PlacedFootprint {
    pub offset: u64,
    pub format: DxgiFormat,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub row_pitch: u32,
}

/// Source region of a copy, in texels, end-exclusive.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CopyBox {
    pub left: u32,
    pub top: u32,
    pub front: u32,
    pub right: u32,
    pub bottom: u32,
    pub back: u32,
}

/// Copy from a buffer footprint into one texture subresource at (0, 0, 0).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CopyTextureRegion {
    pub dest: ResourceHandle,
    pub dest_subresource: u32,
    pub source: ResourceHandle,
    pub footprint: PlacedFootprint,
    /// Whole footprint when `None`.
    pub source_box: Option<CopyBox>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AddressMode {
    Wrap,
    Mirror,
    Clamp,
    Border,
    MirrorOnce,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SamplerFilter {
    Basic {
        mag_linear: bool,
        min_linear: bool,
        mip_linear: bool,
    },
    Anisotropic,
}

/// Sampler description. Comparison is always disabled.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SamplerDesc {
    pub filter: SamplerFilter,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    pub mip_lod_bias: f32,
    pub max_anisotropy: u32,
    pub border_color: [f32; 4],
    pub min_lod: f32,
    pub max_lod: f32,
}

/// Views that exist for the whole lifetime of a bindless descriptor heap.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SystemBindlessView {
    /// Shared memory viewed as unsigned integers of `1 << element_size_log2` bytes.
    SharedMemoryUintPow2Srv { element_size_log2: u32 },
    NullTexture2DArray,
    NullTexture3D,
    NullTextureCube,
}
