use std::collections::BTreeMap;

use crate::backend::{CommandSubmitter, HostDevice, SharedMemory};
use crate::desc::{
    BufferViewDesc, ComputeProgram, CopyTextureRegion, CpuDescriptor, DescriptorPair, GpuAddress,
    GpuDescriptor, HeapHandle, HostCapabilities, PipelineHandle, ResourceDimension,
    ResourceHandle, ResourceState, SamplerDesc, SystemBindlessView, TextureResourceDesc,
    TextureViewDesc, ViewHeapHandle,
};
use crate::error::HostError;

/// View heap the one-use descriptors are handed out from.
pub const ONE_USE_VIEW_HEAP: ViewHeapHandle = ViewHeapHandle(u64::MAX);
/// View heap backing bindless slots.
pub const BINDLESS_VIEW_HEAP: ViewHeapHandle = ViewHeapHandle(u64::MAX - 1);

const SYSTEM_BINDLESS_VIEWS: [SystemBindlessView; 8] = [
    SystemBindlessView::SharedMemoryUintPow2Srv { element_size_log2: 0 },
    SystemBindlessView::SharedMemoryUintPow2Srv { element_size_log2: 1 },
    SystemBindlessView::SharedMemoryUintPow2Srv { element_size_log2: 2 },
    SystemBindlessView::SharedMemoryUintPow2Srv { element_size_log2: 3 },
    SystemBindlessView::SharedMemoryUintPow2Srv { element_size_log2: 4 },
    SystemBindlessView::NullTexture2DArray,
    SystemBindlessView::NullTexture3D,
    SystemBindlessView::NullTextureCube,
];

/// One call made on a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    CreatePipeline {
        program: &'static str,
        pipeline: PipelineHandle,
    },
    CreateTexture {
        resource: ResourceHandle,
        desc: TextureResourceDesc,
    },
    DestroyResource(ResourceHandle),
    CreateReservedBuffer {
        resource: ResourceHandle,
        size: u64,
        state: ResourceState,
    },
    CreateHeap {
        heap: HeapHandle,
        size: u64,
    },
    DestroyHeap(HeapHandle),
    UpdateTileMappings {
        buffer: ResourceHandle,
        first_tile: u32,
        heap: HeapHandle,
        tile_count: u32,
    },
    CreateViewHeap {
        heap: ViewHeapHandle,
        capacity: u32,
    },
    DestroyViewHeap(ViewHeapHandle),
    CreateTextureSrv {
        resource: Option<ResourceHandle>,
        desc: TextureViewDesc,
        dest: CpuDescriptor,
    },
    CreateBufferSrv {
        resource: ResourceHandle,
        desc: BufferViewDesc,
        dest: CpuDescriptor,
    },
    CreateBufferUav {
        resource: ResourceHandle,
        desc: BufferViewDesc,
        dest: CpuDescriptor,
    },
    CopyDescriptor {
        dest: CpuDescriptor,
        source: CpuDescriptor,
    },
    CreateSampler {
        desc: SamplerDesc,
        dest: CpuDescriptor,
    },
    Transition {
        resource: ResourceHandle,
        old: ResourceState,
        new: ResourceState,
    },
    AliasingBarrier {
        before: Option<ResourceHandle>,
        after: Option<ResourceHandle>,
    },
    UavBarrier(ResourceHandle),
    SubmitBarriers,
    RequestScratch {
        buffer: ResourceHandle,
        size: u64,
    },
    ReleaseScratch {
        buffer: ResourceHandle,
        state: ResourceState,
    },
    ConstantBuffer {
        address: GpuAddress,
        data: Vec<u8>,
    },
    ReleaseBindlessView(u32),
    SetPipeline(PipelineHandle),
    SetRootConstantBuffer {
        parameter: u32,
        address: GpuAddress,
    },
    SetRootDescriptorTable {
        parameter: u32,
        table: GpuDescriptor,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    CopyTextureRegion(CopyTextureRegion),
    SharedMemoryRequestRange {
        start: u32,
        length: u32,
    },
    SharedMemoryUseForReading,
    SharedMemoryWriteSrv {
        dest: CpuDescriptor,
        element_size_log2: u32,
    },
}

/// Host backend for tests: hands out sequential handles, records every call
/// and fails on request.
#[derive(Debug)]
pub struct RecordingBackend {
    pub capabilities: HostCapabilities,
    /// Programs whose pipeline creation fails.
    pub failing_programs: Vec<&'static str>,
    pub fail_texture_creation: bool,
    pub fail_heap_creation: bool,
    pub fail_view_heap_creation: bool,
    pub fail_scratch_buffer: bool,
    pub fail_constant_buffer: bool,
    /// Guest ranges `request_range` refuses.
    pub unavailable_ranges: Vec<(u32, u32)>,
    /// Bindless slots available for textures, after the system views.
    pub bindless_capacity: u32,
    pub current_submission: u64,
    pub completed_submission: u64,
    events: Vec<BackendEvent>,
    next_handle: u64,
    next_one_use_descriptor: u32,
    resource_sizes: BTreeMap<ResourceHandle, u64>,
    bindless_free: Vec<u32>,
    bindless_next: u32,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            capabilities: HostCapabilities::default(),
            failing_programs: Vec::new(),
            fail_texture_creation: false,
            fail_heap_creation: false,
            fail_view_heap_creation: false,
            fail_scratch_buffer: false,
            fail_constant_buffer: false,
            unavailable_ranges: Vec::new(),
            bindless_capacity: 1024,
            current_submission: 1,
            completed_submission: 0,
            events: Vec::new(),
            next_handle: 1,
            next_one_use_descriptor: 0,
            resource_sizes: BTreeMap::new(),
            bindless_free: Vec::new(),
            bindless_next: SYSTEM_BINDLESS_VIEWS.len() as u32,
        }
    }

    pub fn events(&self) -> &[BackendEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<BackendEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    pub fn count(&self, predicate: impl Fn(&BackendEvent) -> bool) -> usize {
        self.events.iter().filter(|event| predicate(event)).count()
    }

    /// Position of the first event matching `predicate`.
    pub fn position(&self, predicate: impl Fn(&BackendEvent) -> bool) -> Option<usize> {
        self.events.iter().position(predicate)
    }

    pub fn dispatches(&self) -> Vec<(u32, u32, u32)> {
        self.events
            .iter()
            .filter_map(|event| match *event {
                BackendEvent::Dispatch { x, y, z } => Some((x, y, z)),
                _ => None,
            })
            .collect()
    }

    pub fn copies(&self) -> Vec<CopyTextureRegion> {
        self.events
            .iter()
            .filter_map(|event| match event {
                BackendEvent::CopyTextureRegion(region) => Some(*region),
                _ => None,
            })
            .collect()
    }

    pub fn constant_buffers(&self) -> Vec<&[u8]> {
        self.events
            .iter()
            .filter_map(|event| match event {
                BackendEvent::ConstantBuffer { data, .. } => Some(data.as_slice()),
                _ => None,
            })
            .collect()
    }

    pub fn live_resources(&self) -> usize {
        self.resource_sizes.len()
    }

    /// Starts recording the next submission and lets the GPU finish the
    /// previous one.
    pub fn advance_submission(&mut self) {
        self.completed_submission = self.current_submission;
        self.current_submission += 1;
    }

    fn handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

impl HostDevice for RecordingBackend {
    fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    fn create_compute_pipeline(
        &mut self,
        program: ComputeProgram,
    ) -> Result<PipelineHandle, HostError> {
        if self.failing_programs.contains(&program.name) {
            return Err(HostError::CreationFailed {
                what: "compute pipeline",
                reason: program.name.to_owned(),
            });
        }
        let pipeline = PipelineHandle(self.handle());
        self.events.push(BackendEvent::CreatePipeline {
            program: program.name,
            pipeline,
        });
        Ok(pipeline)
    }

    fn create_texture(&mut self, desc: &TextureResourceDesc) -> Result<ResourceHandle, HostError> {
        let block = desc.format.block_info();
        let (array_size, depth) = match desc.dimension {
            ResourceDimension::Texture2D => (desc.depth_or_array_size, 1),
            ResourceDimension::Texture3D => (1, desc.depth_or_array_size),
        };
        let mut size = 0u64;
        for level in 0..desc.mip_levels {
            let width = (desc.width >> level).max(1).div_ceil(block.width);
            let height = (desc.height >> level).max(1).div_ceil(block.height);
            let depth = (depth >> level).max(1);
            size += u64::from(width) * u64::from(height) * u64::from(depth) * u64::from(block.bytes);
        }
        size *= u64::from(array_size);
        if self.fail_texture_creation {
            return Err(HostError::OutOfMemory {
                what: "texture",
                size,
            });
        }
        let resource = ResourceHandle(self.handle());
        self.resource_sizes.insert(resource, size);
        self.events.push(BackendEvent::CreateTexture {
            resource,
            desc: *desc,
        });
        Ok(resource)
    }

    fn resource_allocation_size(&self, resource: ResourceHandle) -> u64 {
        self.resource_sizes.get(&resource).copied().unwrap_or(0)
    }

    fn destroy_resource(&mut self, resource: ResourceHandle) {
        self.resource_sizes.remove(&resource);
        self.events.push(BackendEvent::DestroyResource(resource));
    }

    fn create_reserved_buffer(
        &mut self,
        size: u64,
        initial_state: ResourceState,
    ) -> Result<ResourceHandle, HostError> {
        let resource = ResourceHandle(self.handle());
        // Reserved buffers own no memory.
        self.resource_sizes.insert(resource, 0);
        self.events.push(BackendEvent::CreateReservedBuffer {
            resource,
            size,
            state: initial_state,
        });
        Ok(resource)
    }

    fn create_heap(&mut self, size: u64) -> Result<HeapHandle, HostError> {
        if self.fail_heap_creation {
            return Err(HostError::OutOfMemory { what: "heap", size });
        }
        let heap = HeapHandle(self.handle());
        self.events.push(BackendEvent::CreateHeap { heap, size });
        Ok(heap)
    }

    fn destroy_heap(&mut self, heap: HeapHandle) {
        self.events.push(BackendEvent::DestroyHeap(heap));
    }

    fn update_tile_mappings(
        &mut self,
        buffer: ResourceHandle,
        first_tile: u32,
        heap: HeapHandle,
        tile_count: u32,
    ) {
        self.events.push(BackendEvent::UpdateTileMappings {
            buffer,
            first_tile,
            heap,
            tile_count,
        });
    }

    fn create_view_heap(
        &mut self,
        capacity: u32,
        _shader_visible: bool,
    ) -> Result<ViewHeapHandle, HostError> {
        if self.fail_view_heap_creation {
            return Err(HostError::CreationFailed {
                what: "view heap",
                reason: format!("{capacity} descriptors"),
            });
        }
        let heap = ViewHeapHandle(self.handle());
        self.events.push(BackendEvent::CreateViewHeap { heap, capacity });
        Ok(heap)
    }

    fn destroy_view_heap(&mut self, heap: ViewHeapHandle) {
        self.events.push(BackendEvent::DestroyViewHeap(heap));
    }

    fn create_texture_srv(
        &mut self,
        resource: Option<ResourceHandle>,
        desc: &TextureViewDesc,
        dest: CpuDescriptor,
    ) {
        self.events.push(BackendEvent::CreateTextureSrv {
            resource,
            desc: *desc,
            dest,
        });
    }

    fn create_buffer_srv(
        &mut self,
        resource: ResourceHandle,
        desc: &BufferViewDesc,
        dest: CpuDescriptor,
    ) {
        self.events.push(BackendEvent::CreateBufferSrv {
            resource,
            desc: *desc,
            dest,
        });
    }

    fn create_buffer_uav(
        &mut self,
        resource: ResourceHandle,
        desc: &BufferViewDesc,
        dest: CpuDescriptor,
    ) {
        self.events.push(BackendEvent::CreateBufferUav {
            resource,
            desc: *desc,
            dest,
        });
    }

    fn copy_descriptor(&mut self, dest: CpuDescriptor, source: CpuDescriptor) {
        self.events
            .push(BackendEvent::CopyDescriptor { dest, source });
    }

    fn create_sampler(&mut self, desc: &SamplerDesc, dest: CpuDescriptor) {
        self.events
            .push(BackendEvent::CreateSampler { desc: *desc, dest });
    }
}

impl CommandSubmitter for RecordingBackend {
    fn push_transition_barrier(
        &mut self,
        resource: ResourceHandle,
        old: ResourceState,
        new: ResourceState,
    ) {
        if old != new {
            self.events
                .push(BackendEvent::Transition { resource, old, new });
        }
    }

    fn push_aliasing_barrier(
        &mut self,
        before: Option<ResourceHandle>,
        after: Option<ResourceHandle>,
    ) {
        self.events
            .push(BackendEvent::AliasingBarrier { before, after });
    }

    fn push_uav_barrier(&mut self, resource: ResourceHandle) {
        self.events.push(BackendEvent::UavBarrier(resource));
    }

    fn submit_barriers(&mut self) {
        self.events.push(BackendEvent::SubmitBarriers);
    }

    fn request_scratch_buffer(
        &mut self,
        size: u64,
        _state: ResourceState,
    ) -> Result<ResourceHandle, HostError> {
        if self.fail_scratch_buffer {
            return Err(HostError::OutOfMemory {
                what: "scratch buffer",
                size,
            });
        }
        let buffer = ResourceHandle(self.handle());
        self.events.push(BackendEvent::RequestScratch { buffer, size });
        Ok(buffer)
    }

    fn release_scratch_buffer(&mut self, buffer: ResourceHandle, state: ResourceState) {
        self.events
            .push(BackendEvent::ReleaseScratch { buffer, state });
    }

    fn request_constant_buffer(&mut self, data: &[u8]) -> Result<GpuAddress, HostError> {
        if self.fail_constant_buffer {
            return Err(HostError::OutOfMemory {
                what: "constant buffer",
                size: data.len() as u64,
            });
        }
        let address = GpuAddress(self.handle() << 8);
        self.events.push(BackendEvent::ConstantBuffer {
            address,
            data: data.to_vec(),
        });
        Ok(address)
    }

    fn request_one_use_view_descriptors(
        &mut self,
        count: u32,
    ) -> Result<Vec<DescriptorPair>, HostError> {
        let first = self.next_one_use_descriptor;
        self.next_one_use_descriptor += count;
        Ok((first..first + count)
            .map(|index| DescriptorPair {
                cpu: CpuDescriptor {
                    heap: ONE_USE_VIEW_HEAP,
                    index,
                },
                gpu: GpuDescriptor {
                    heap: ONE_USE_VIEW_HEAP,
                    index,
                },
            })
            .collect())
    }

    fn request_persistent_bindless_view(&mut self) -> Option<u32> {
        if let Some(index) = self.bindless_free.pop() {
            return Some(index);
        }
        let system = SYSTEM_BINDLESS_VIEWS.len() as u32;
        if self.bindless_next - system >= self.bindless_capacity {
            return None;
        }
        let index = self.bindless_next;
        self.bindless_next += 1;
        Some(index)
    }

    fn release_bindless_view_immediately(&mut self, index: u32) {
        self.bindless_free.push(index);
        self.events.push(BackendEvent::ReleaseBindlessView(index));
    }

    fn bindless_view_handle_pair(&self, index: u32) -> DescriptorPair {
        DescriptorPair {
            cpu: CpuDescriptor {
                heap: BINDLESS_VIEW_HEAP,
                index,
            },
            gpu: GpuDescriptor {
                heap: BINDLESS_VIEW_HEAP,
                index,
            },
        }
    }

    fn system_bindless_view_index(&self, view: SystemBindlessView) -> u32 {
        SYSTEM_BINDLESS_VIEWS
            .iter()
            .position(|&system| system == view)
            .unwrap_or(0) as u32
    }

    fn set_compute_pipeline(&mut self, pipeline: PipelineHandle) {
        self.events.push(BackendEvent::SetPipeline(pipeline));
    }

    fn set_compute_root_constant_buffer(&mut self, parameter: u32, address: GpuAddress) {
        self.events
            .push(BackendEvent::SetRootConstantBuffer { parameter, address });
    }

    fn set_compute_root_descriptor_table(&mut self, parameter: u32, table: GpuDescriptor) {
        self.events
            .push(BackendEvent::SetRootDescriptorTable { parameter, table });
    }

    fn dispatch(&mut self, groups_x: u32, groups_y: u32, groups_z: u32) {
        self.events.push(BackendEvent::Dispatch {
            x: groups_x,
            y: groups_y,
            z: groups_z,
        });
    }

    fn copy_texture_region(&mut self, region: &CopyTextureRegion) {
        self.events.push(BackendEvent::CopyTextureRegion(*region));
    }

    fn current_submission(&self) -> u64 {
        self.current_submission
    }

    fn completed_submission(&self) -> u64 {
        self.completed_submission
    }
}

impl SharedMemory for RecordingBackend {
    fn request_range(&mut self, start: u32, length: u32) -> Result<(), HostError> {
        self.events
            .push(BackendEvent::SharedMemoryRequestRange { start, length });
        if self
            .unavailable_ranges
            .iter()
            .any(|&(s, l)| start < s.saturating_add(l) && s < start.saturating_add(length))
        {
            return Err(HostError::RangeUnavailable { start, length });
        }
        Ok(())
    }

    fn use_for_reading(&mut self) {
        self.events.push(BackendEvent::SharedMemoryUseForReading);
    }

    fn write_uint_pow2_srv_descriptor(&mut self, dest: CpuDescriptor, element_size_log2: u32) {
        self.events.push(BackendEvent::SharedMemoryWriteSrv {
            dest,
            element_size_log2,
        });
    }
}
