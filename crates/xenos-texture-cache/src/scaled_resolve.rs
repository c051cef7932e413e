//! Resolution-scaled copy of guest memory.
//!
//! With a draw resolution scale of `sx`×`sy`, resolves write `sx * sy` times as
//! many bytes as the guest does, so guest byte `p` lives at `p * sx * sy` in the
//! scaled space. The space is backed by reserved buffers of up to 2 GB, one
//! starting at every gigabyte, so any range shorter than 1 GB fits entirely in
//! one of them. Memory is committed in 16 MB heaps mapped into every buffer that
//! can contain them. Buffers overlapping the same memory alias each other, and
//! each gigabyte is owned by one buffer at a time; moving ownership takes an
//! aliasing barrier.

use tracing::debug;
use xenos_host::{
    BufferViewDesc, CommandSubmitter, CpuDescriptor, DxgiFormat, HeapHandle, HostDevice,
    ResourceHandle, ResourceState,
};
use xenos_types::SHARED_MEMORY_SIZE;

use crate::config::DrawResolutionScale;
use crate::error::ScaledResolveError;

const GIGABYTE_LOG2: u32 = 30;
const BUFFER_MAX_SIZE: u64 = 2 << GIGABYTE_LOG2;
pub const SCALED_RESOLVE_HEAP_SIZE_LOG2: u32 = 24;
pub const SCALED_RESOLVE_HEAP_SIZE: u64 = 1 << SCALED_RESOLVE_HEAP_SIZE_LOG2;
pub const TILE_SIZE: u64 = 64 * 1024;

#[derive(Debug)]
struct VirtualBuffer {
    resource: ResourceHandle,
    state: ResourceState,
    uav_barrier_pending: bool,
}

impl VirtualBuffer {
    fn set_state(&mut self, state: ResourceState) -> ResourceState {
        let old = self.state;
        if old == ResourceState::UNORDERED_ACCESS {
            self.uav_barrier_pending = false;
        }
        self.state = state;
        old
    }
}

/// Range of the scaled space the next shader accesses go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaledRange {
    pub buffer: usize,
    /// Offset in the scaled space.
    pub start: u64,
    pub length: u64,
}

#[derive(Debug)]
pub struct ScaledResolveSpace {
    area: u64,
    size: u64,
    buffers: Vec<Option<VirtualBuffer>>,
    /// Buffer currently owning each gigabyte, `None` until first use in a submission.
    owners: Vec<Option<usize>>,
    heaps: Vec<Option<HeapHandle>>,
    heap_count: usize,
    current: Option<ScaledRange>,
}

impl ScaledResolveSpace {
    pub fn new(scale: DrawResolutionScale) -> Self {
        let area = u64::from(scale.area());
        let size = u64::from(SHARED_MEMORY_SIZE) * area;
        let gigabytes = size.div_ceil(1 << GIGABYTE_LOG2) as usize;
        let buffer_count = gigabytes.saturating_sub(1).max(1);
        Self {
            area,
            size,
            buffers: (0..buffer_count).map(|_| None).collect(),
            owners: vec![None; gigabytes],
            heaps: vec![None; (size >> SCALED_RESOLVE_HEAP_SIZE_LOG2) as usize],
            heap_count: 0,
            current: None,
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn heap_count(&self) -> usize {
        self.heap_count
    }

    pub fn committed_bytes(&self) -> u64 {
        self.heap_count as u64 * SCALED_RESOLVE_HEAP_SIZE
    }

    pub fn current_range(&self) -> Option<ScaledRange> {
        self.current
    }

    pub fn buffer_resource(&self, index: usize) -> Option<ResourceHandle> {
        self.buffers
            .get(index)
            .and_then(Option::as_ref)
            .map(|buffer| buffer.resource)
    }

    pub fn gigabyte_owner(&self, gigabyte: usize) -> Option<usize> {
        self.owners.get(gigabyte).copied().flatten()
    }

    /// The two buffers that can contain scaled addresses in `gigabyte`. Both
    /// are the same buffer at the ends of the space.
    pub fn candidate_buffers(&self, gigabyte: usize) -> [usize; 2] {
        let last = self.buffers.len() - 1;
        [gigabyte.min(last), (gigabyte.max(1) - 1).min(last)]
    }

    fn scaled_bounds(&self, start: u32, length: u32) -> Result<(u64, u64), ScaledResolveError> {
        if start >= SHARED_MEMORY_SIZE || SHARED_MEMORY_SIZE - start < length {
            return Err(ScaledResolveError::OutOfBounds { start, length });
        }
        let first = u64::from(start) * self.area;
        let last = (u64::from(start) + u64::from(length) - 1) * self.area;
        Ok((first, last))
    }

    /// Creates the buffers and commits the heaps backing the unscaled guest
    /// range `[start, start + length)`. Returns the number of heaps committed
    /// by this call. Empty ranges are a no-op.
    pub fn ensure_committed<D: HostDevice + ?Sized>(
        &mut self,
        device: &mut D,
        start: u32,
        length: u32,
    ) -> Result<usize, ScaledResolveError> {
        if length == 0 {
            return Ok(0);
        }
        let (first, last) = self.scaled_bounds(start, length)?;
        let first_candidates = self.candidate_buffers((first >> GIGABYTE_LOG2) as usize);
        let last_candidates = self.candidate_buffers((last >> GIGABYTE_LOG2) as usize);
        let buffers_first = first_candidates[0].min(first_candidates[1]);
        let buffers_last = last_candidates[0].max(last_candidates[1]);
        for index in buffers_first..=buffers_last {
            if self.buffers[index].is_some() {
                continue;
            }
            let size = BUFFER_MAX_SIZE.min(self.size - ((index as u64) << GIGABYTE_LOG2));
            let resource = device.create_reserved_buffer(size, ResourceState::UNORDERED_ACCESS)?;
            debug!(index, size, "created scaled resolve buffer");
            self.buffers[index] = Some(VirtualBuffer {
                resource,
                state: ResourceState::UNORDERED_ACCESS,
                uav_barrier_pending: false,
            });
        }

        let mut committed = 0;
        let heaps_first = (first >> SCALED_RESOLVE_HEAP_SIZE_LOG2) as usize;
        let heaps_last = (last >> SCALED_RESOLVE_HEAP_SIZE_LOG2) as usize;
        for heap_index in heaps_first..=heaps_last {
            if self.heaps[heap_index].is_some() {
                continue;
            }
            let heap_start = (heap_index as u64) << SCALED_RESOLVE_HEAP_SIZE_LOG2;
            let candidates = self.candidate_buffers((heap_start >> GIGABYTE_LOG2) as usize);
            let mut resources = [None; 2];
            for (slot, &buffer) in candidates.iter().enumerate() {
                if slot == 1 && buffer == candidates[0] {
                    break;
                }
                let resource = self
                    .buffer_resource(buffer)
                    .ok_or(ScaledResolveError::BufferMissing { index: buffer })?;
                resources[slot] = Some((buffer, resource));
            }
            let heap = device.create_heap(SCALED_RESOLVE_HEAP_SIZE)?;
            for (buffer, resource) in resources.into_iter().flatten() {
                let first_tile = (heap_start - ((buffer as u64) << GIGABYTE_LOG2)) / TILE_SIZE;
                device.update_tile_mappings(
                    resource,
                    first_tile as u32,
                    heap,
                    (SCALED_RESOLVE_HEAP_SIZE / TILE_SIZE) as u32,
                );
            }
            self.heaps[heap_index] = Some(heap);
            self.heap_count += 1;
            committed += 1;
        }
        if committed != 0 {
            debug!(
                start,
                length,
                committed,
                total_mb = self.committed_bytes() >> 20,
                "committed scaled resolve memory"
            );
        }
        Ok(committed)
    }

    /// Selects the buffer the unscaled guest range is accessed through and
    /// gives it ownership of every gigabyte the range touches. Returns the
    /// number of aliasing barriers pushed.
    ///
    /// When two buffers can serve the range, the one already owning more of
    /// the touched gigabytes wins. Nothing changes on failure.
    pub fn make_range_current<C: CommandSubmitter + ?Sized>(
        &mut self,
        commands: &mut C,
        start: u32,
        length: u32,
    ) -> Result<u32, ScaledResolveError> {
        if length == 0 {
            return Err(ScaledResolveError::ZeroLength);
        }
        let (first, last) = self.scaled_bounds(start, length)?;
        let gigabyte_first = (first >> GIGABYTE_LOG2) as usize;
        let gigabyte_last = (last >> GIGABYTE_LOG2) as usize;
        let first_candidates = self.candidate_buffers(gigabyte_first);
        let last_candidates = self.candidate_buffers(gigabyte_last);
        let mut common = [0usize; 2];
        let mut common_count = 0;
        for candidate in first_candidates {
            if last_candidates.contains(&candidate) && !common[..common_count].contains(&candidate)
            {
                common[common_count] = candidate;
                common_count += 1;
            }
        }
        if common_count == 0 {
            return Err(ScaledResolveError::NoCoveringBuffer { start, length });
        }
        let mut chosen = common[0];
        if common_count == 2 {
            let mut used = [0u32; 2];
            for owner in self.owners[gigabyte_first..=gigabyte_last].iter().flatten() {
                if let Some(slot) = common.iter().position(|buffer| buffer == owner) {
                    used[slot] += 1;
                }
            }
            if used[1] > used[0] {
                chosen = common[1];
            }
        }
        let chosen_resource = self
            .buffer_resource(chosen)
            .ok_or(ScaledResolveError::BufferMissing { index: chosen })?;

        let mut barriers = 0;
        for gigabyte in gigabyte_first..=gigabyte_last {
            let owner = self.owners[gigabyte];
            if owner == Some(chosen) {
                continue;
            }
            if let Some(old) = owner {
                if let Some(old_buffer) = self.buffers[old].as_mut() {
                    commands.push_aliasing_barrier(Some(old_buffer.resource), Some(chosen_resource));
                    old_buffer.uav_barrier_pending = false;
                    barriers += 1;
                }
            }
            self.owners[gigabyte] = Some(chosen);
        }
        self.current = Some(ScaledRange {
            buffer: chosen,
            start: first,
            length: u64::from(length) * self.area,
        });
        Ok(barriers)
    }

    fn current_buffer(&mut self) -> Result<(ScaledRange, &mut VirtualBuffer), ScaledResolveError> {
        let range = self.current.ok_or(ScaledResolveError::NoCurrentRange)?;
        let buffer = self.buffers[range.buffer]
            .as_mut()
            .ok_or(ScaledResolveError::BufferMissing {
                index: range.buffer,
            })?;
        Ok((range, buffer))
    }

    /// Moves the buffer of the current range to `state`. Staying in the
    /// unordered access state after UAV writes pushes a UAV barrier instead.
    pub fn transition_current_range<C: CommandSubmitter + ?Sized>(
        &mut self,
        commands: &mut C,
        state: ResourceState,
    ) -> Result<(), ScaledResolveError> {
        let (_, buffer) = self.current_buffer()?;
        if buffer.state == state {
            if state == ResourceState::UNORDERED_ACCESS && buffer.uav_barrier_pending {
                commands.push_uav_barrier(buffer.resource);
                buffer.uav_barrier_pending = false;
            }
            return Ok(());
        }
        let old = buffer.set_state(state);
        commands.push_transition_barrier(buffer.resource, old, state);
        Ok(())
    }

    /// Records that shaders wrote to the current range through a UAV.
    pub fn mark_current_range_uav_written(&mut self) -> Result<(), ScaledResolveError> {
        let (_, buffer) = self.current_buffer()?;
        if buffer.state == ResourceState::UNORDERED_ACCESS {
            buffer.uav_barrier_pending = true;
        }
        Ok(())
    }

    fn current_view(
        &mut self,
        element_size_log2: u32,
    ) -> Result<(ResourceHandle, BufferViewDesc), ScaledResolveError> {
        let (range, buffer) = self.current_buffer()?;
        let buffer_start = (range.buffer as u64) << GIGABYTE_LOG2;
        Ok((
            buffer.resource,
            BufferViewDesc {
                format: DxgiFormat::uint_pow2(element_size_log2),
                first_element: (range.start - buffer_start) >> element_size_log2,
                num_elements: (range.length >> element_size_log2) as u32,
            },
        ))
    }

    /// Writes a typed SRV of the current range with `1 << element_size_log2`-byte elements.
    pub fn create_current_range_srv<D: HostDevice + ?Sized>(
        &mut self,
        device: &mut D,
        dest: CpuDescriptor,
        element_size_log2: u32,
    ) -> Result<(), ScaledResolveError> {
        let (resource, desc) = self.current_view(element_size_log2)?;
        device.create_buffer_srv(resource, &desc, dest);
        Ok(())
    }

    pub fn create_current_range_uav<D: HostDevice + ?Sized>(
        &mut self,
        device: &mut D,
        dest: CpuDescriptor,
        element_size_log2: u32,
    ) -> Result<(), ScaledResolveError> {
        let (resource, desc) = self.current_view(element_size_log2)?;
        device.create_buffer_uav(resource, &desc, dest);
        Ok(())
    }

    /// A submission boundary synchronizes everything, so no buffer needs a UAV
    /// barrier and no gigabyte has an owner to alias against.
    pub fn begin_submission(&mut self) {
        for buffer in self.buffers.iter_mut().flatten() {
            buffer.uav_barrier_pending = false;
        }
        self.owners.fill(None);
    }

    /// Destroys the buffers, then the heaps.
    pub fn destroy<D: HostDevice + ?Sized>(&mut self, device: &mut D) {
        self.current = None;
        self.owners.fill(None);
        for buffer in self.buffers.iter_mut().filter_map(Option::take) {
            device.destroy_resource(buffer.resource);
        }
        for heap in self.heaps.iter_mut().filter_map(Option::take) {
            device.destroy_heap(heap);
        }
        self.heap_count = 0;
    }
}
