//! Traits the renderer implements for the caches.
//!
//! All calls come from the thread that records the host command list. None of
//! the traits are expected to be `Send`.

use crate::desc::{
    BufferViewDesc, ComputeProgram, CopyTextureRegion, CpuDescriptor, DescriptorPair, GpuAddress,
    GpuDescriptor, HeapHandle, HostCapabilities, PipelineHandle, ResourceHandle, ResourceState,
    SamplerDesc, SystemBindlessView, TextureResourceDesc, TextureViewDesc, ViewHeapHandle,
};
use crate::error::HostError;

/// Resource, heap and view creation on the host device.
pub trait HostDevice {
    fn capabilities(&self) -> HostCapabilities;

    fn create_compute_pipeline(
        &mut self,
        program: ComputeProgram,
    ) -> Result<PipelineHandle, HostError>;

    /// Creates a committed texture in the default heap.
    fn create_texture(&mut self, desc: &TextureResourceDesc) -> Result<ResourceHandle, HostError>;

    /// Device memory backing `resource`, in bytes.
    fn resource_allocation_size(&self, resource: ResourceHandle) -> u64;

    fn destroy_resource(&mut self, resource: ResourceHandle);

    /// Creates a reserved buffer with no memory mapped to it.
    fn create_reserved_buffer(
        &mut self,
        size: u64,
        initial_state: ResourceState,
    ) -> Result<ResourceHandle, HostError>;

    fn create_heap(&mut self, size: u64) -> Result<HeapHandle, HostError>;

    fn destroy_heap(&mut self, heap: HeapHandle);

    /// Maps `tile_count` 64 KB tiles of `heap`, starting at its first tile,
    /// into `buffer` starting at `first_tile`.
    fn update_tile_mappings(
        &mut self,
        buffer: ResourceHandle,
        first_tile: u32,
        heap: HeapHandle,
        tile_count: u32,
    );

    fn create_view_heap(
        &mut self,
        capacity: u32,
        shader_visible: bool,
    ) -> Result<ViewHeapHandle, HostError>;

    fn destroy_view_heap(&mut self, heap: ViewHeapHandle);

    /// Writes a texture view into `dest`. A `None` resource writes a null view.
    fn create_texture_srv(
        &mut self,
        resource: Option<ResourceHandle>,
        desc: &TextureViewDesc,
        dest: CpuDescriptor,
    );

    fn create_buffer_srv(
        &mut self,
        resource: ResourceHandle,
        desc: &BufferViewDesc,
        dest: CpuDescriptor,
    );

    fn create_buffer_uav(
        &mut self,
        resource: ResourceHandle,
        desc: &BufferViewDesc,
        dest: CpuDescriptor,
    );

    fn copy_descriptor(&mut self, dest: CpuDescriptor, source: CpuDescriptor);

    fn create_sampler(&mut self, desc: &SamplerDesc, dest: CpuDescriptor);
}

/// Command recording and per-submission allocations.
///
/// Barriers are batched: `push_*` queues them and [`CommandSubmitter::submit_barriers`]
/// flushes the queue into the command list. Transitions with `old == new` are
/// dropped by the implementation.
pub trait CommandSubmitter {
    fn push_transition_barrier(
        &mut self,
        resource: ResourceHandle,
        old: ResourceState,
        new: ResourceState,
    );

    fn push_aliasing_barrier(
        &mut self,
        before: Option<ResourceHandle>,
        after: Option<ResourceHandle>,
    );

    fn push_uav_barrier(&mut self, resource: ResourceHandle);

    fn submit_barriers(&mut self);

    /// Buffer that lives until the end of the current submission.
    fn request_scratch_buffer(
        &mut self,
        size: u64,
        state: ResourceState,
    ) -> Result<ResourceHandle, HostError>;

    /// Returns the scratch buffer, telling the allocator the state it was left in.
    fn release_scratch_buffer(&mut self, buffer: ResourceHandle, state: ResourceState);

    /// Uploads `data` into a constant buffer that lives until the end of the
    /// current submission.
    fn request_constant_buffer(&mut self, data: &[u8]) -> Result<GpuAddress, HostError>;

    /// Contiguous shader-visible descriptors valid for the current submission.
    fn request_one_use_view_descriptors(
        &mut self,
        count: u32,
    ) -> Result<Vec<DescriptorPair>, HostError>;

    /// Allocates a slot in the global bindless heap, `None` when it's full.
    fn request_persistent_bindless_view(&mut self) -> Option<u32>;

    fn release_bindless_view_immediately(&mut self, index: u32);

    fn bindless_view_handle_pair(&self, index: u32) -> DescriptorPair;

    fn system_bindless_view_index(&self, view: SystemBindlessView) -> u32;

    fn system_bindless_view_handle_pair(&self, view: SystemBindlessView) -> DescriptorPair {
        self.bindless_view_handle_pair(self.system_bindless_view_index(view))
    }

    fn set_compute_pipeline(&mut self, pipeline: PipelineHandle);

    fn set_compute_root_constant_buffer(&mut self, parameter: u32, address: GpuAddress);

    fn set_compute_root_descriptor_table(&mut self, parameter: u32, table: GpuDescriptor);

    fn dispatch(&mut self, groups_x: u32, groups_y: u32, groups_z: u32);

    fn copy_texture_region(&mut self, region: &CopyTextureRegion);

    /// Index of the submission currently being recorded.
    fn current_submission(&self) -> u64;

    /// Index of the last submission the GPU has finished executing.
    fn completed_submission(&self) -> u64;
}

/// The host buffer mirroring guest physical memory.
pub trait SharedMemory {
    /// Makes sure `[start, start + length)` of guest memory is up to date in the
    /// mirror.
    fn request_range(&mut self, start: u32, length: u32) -> Result<(), HostError>;

    /// Transitions the mirror to a shader-readable state.
    fn use_for_reading(&mut self);

    /// Writes a typed view of the whole mirror into `dest`, with unsigned
    /// integer elements of `1 << element_size_log2` bytes.
    fn write_uint_pow2_srv_descriptor(&mut self, dest: CpuDescriptor, element_size_log2: u32);
}

/// Everything a GPU cache needs from the host.
pub trait Backend: HostDevice + CommandSubmitter + SharedMemory {}

impl<T: HostDevice + CommandSubmitter + SharedMemory> Backend for T {}
