//! Loading guest texture data into host textures.
//!
//! A load converts every requested level into a scratch buffer with the load
//! compute program of the texture's format, one dispatch per stored level and
//! array slice, then copies the buffer into the texture subresource by
//! subresource. Levels in the packed mip tail are converted once and copied
//! out of the tail with a box each.

use tracing::debug;
use xenos_host::{
    Backend, BufferViewDesc, CopyBox, CopyTextureRegion, DxgiFormat, HostDevice, PipelineHandle,
    ResourceHandle, ResourceState, SystemBindlessView,
};
use xenos_types::{align_pow2, TextureKey};

use crate::config::DrawResolutionScale;
use crate::error::{LoadError, ScaledResolveError, TextureCacheError};
use crate::footprint::HostLoadLayout;
use crate::host_format::load_mode;
use crate::layout::{packed_mip_offset, GuestLayout};
use crate::load_mode::{
    LoadConstants, LoadMode, LoadModeInfo, LOAD_GUEST_Y_BLOCKS_PER_GROUP_LOG2,
    LOAD_ROOT_PARAMETER_CONSTANTS, LOAD_ROOT_PARAMETER_DEST, LOAD_ROOT_PARAMETER_SOURCE,
};
use crate::scaled_resolve::ScaledResolveSpace;
use crate::texture::Texture;

/// Compute pipelines of every load mode.
#[derive(Debug)]
pub struct LoadPipelines {
    unscaled: [Option<PipelineHandle>; LoadMode::COUNT],
    scaled: [Option<PipelineHandle>; LoadMode::COUNT],
}

impl LoadPipelines {
    /// Creates the pipeline of every mode, and of every scaled variant when
    /// `scaled` is set.
    pub fn create<D: HostDevice + ?Sized>(
        device: &mut D,
        scaled: bool,
    ) -> Result<Self, TextureCacheError> {
        let mut pipelines = Self {
            unscaled: [None; LoadMode::COUNT],
            scaled: [None; LoadMode::COUNT],
        };
        for mode in LoadMode::ALL {
            let info = mode.info();
            let create = |device: &mut D, program: xenos_host::ComputeProgram| {
                device
                    .create_compute_pipeline(program)
                    .map_err(|source| TextureCacheError::Pipeline {
                        program: program.name,
                        source,
                    })
            };
            pipelines.unscaled[mode.index()] = Some(create(device, info.program)?);
            if let (true, Some(program)) = (scaled, info.program_scaled) {
                pipelines.scaled[mode.index()] = Some(create(device, program)?);
            }
        }
        Ok(pipelines)
    }

    pub fn get(&self, mode: LoadMode, scaled: bool) -> Option<PipelineHandle> {
        if scaled {
            self.scaled[mode.index()]
        } else {
            self.unscaled[mode.index()]
        }
    }
}

/// What one load recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub dispatches: u32,
    pub copies: u32,
    pub scratch_size: u64,
    pub aliasing_barriers: u32,
}

/// Everything a load records commands with.
pub struct TextureLoader<'a, B: Backend + ?Sized> {
    pub backend: &'a mut B,
    pub pipelines: &'a LoadPipelines,
    /// Present when the draw resolution is scaled.
    pub scaled_resolve: Option<&'a mut ScaledResolveSpace>,
    pub scale: DrawResolutionScale,
    pub bindless: bool,
}

impl<B: Backend + ?Sized> TextureLoader<'_, B> {
    /// Loads the base and/or the mips of `texture`, leaving it in the copy
    /// destination state. The caller makes the guest ranges available first.
    pub fn load(
        &mut self,
        texture: &mut Texture,
        load_base: bool,
        load_mips: bool,
    ) -> Result<LoadSummary, LoadError> {
        let key = *texture.key();
        let level_first = if load_base { 0 } else { 1 };
        let level_last = if load_mips { key.mip_max_level } else { 0 };
        if level_first > level_last {
            return Ok(LoadSummary::default());
        }
        let mode = load_mode(&key).ok_or(LoadError::UnsupportedFormat(key.format))?;
        let scaled = key.scaled_resolve;
        let pipeline = self
            .pipelines
            .get(mode, scaled)
            .ok_or(LoadError::PipelineUnavailable(mode))?;
        if scaled && self.scaled_resolve.is_none() {
            return Err(ScaledResolveError::NotScaled.into());
        }
        let scale = if scaled {
            self.scale
        } else {
            DrawResolutionScale::default()
        };
        let guest = texture.guest_layout().clone();
        let host = HostLoadLayout::new(&key, &guest, mode.info(), scale, level_first, level_last);

        let scratch = self
            .backend
            .request_scratch_buffer(host.buffer_size, ResourceState::UNORDERED_ACCESS)?;
        let pass = LoadPass {
            key: &key,
            mode: mode.info(),
            guest: &guest,
            host: &host,
            scale,
            scratch,
            pipeline,
            level_first,
            level_last,
        };
        match self.record(&pass, texture) {
            Ok(mut summary) => {
                self.backend
                    .release_scratch_buffer(scratch, ResourceState::COPY_SOURCE);
                summary.scratch_size = host.buffer_size;
                debug!(
                    format = %key.format,
                    width = key.width,
                    height = key.height,
                    mode = ?mode,
                    level_first,
                    level_last,
                    scaled,
                    "loaded texture"
                );
                Ok(summary)
            }
            Err(err) => {
                self.backend
                    .release_scratch_buffer(scratch, ResourceState::UNORDERED_ACCESS);
                Err(err)
            }
        }
    }

    fn record(
        &mut self,
        pass: &LoadPass<'_>,
        texture: &mut Texture,
    ) -> Result<LoadSummary, LoadError> {
        let mut summary = LoadSummary::default();
        let key = pass.key;
        let scaled = key.scaled_resolve;
        let two_sources = pass.level_first == 0 && pass.level_last != 0;
        let descriptor_count = 1 + if scaled {
            if two_sources {
                2
            } else {
                1
            }
        } else if self.bindless {
            0
        } else {
            1
        };
        let descriptors = self
            .backend
            .request_one_use_view_descriptors(descriptor_count)?;

        self.backend.set_compute_pipeline(pass.pipeline);
        let uav_bpe_log2 = pass.mode.uav_bpe_log2;
        self.backend.create_buffer_uav(
            pass.scratch,
            &BufferViewDesc {
                format: DxgiFormat::uint_pow2(uav_bpe_log2),
                first_element: 0,
                num_elements: (pass.host.buffer_size >> uav_bpe_log2) as u32,
            },
            descriptors[0].cpu,
        );
        self.backend
            .set_compute_root_descriptor_table(LOAD_ROOT_PARAMETER_DEST, descriptors[0].gpu);

        let srv_bpe_log2 = pass.mode.srv_bpe_log2;
        if !scaled {
            self.backend.use_for_reading();
            let source = if self.bindless {
                self.backend
                    .system_bindless_view_handle_pair(SystemBindlessView::SharedMemoryUintPow2Srv {
                        element_size_log2: srv_bpe_log2,
                    })
                    .gpu
            } else {
                self.backend
                    .write_uint_pow2_srv_descriptor(descriptors[1].cpu, srv_bpe_log2);
                descriptors[1].gpu
            };
            self.backend
                .set_compute_root_descriptor_table(LOAD_ROOT_PARAMETER_SOURCE, source);
        }

        let info = key.format.info();
        let area = pass.scale.area();
        let array_size = key.array_size();
        let guest = pass.guest;
        // With the tail at level 0, loop level 0 is the base and 1 the mips.
        let (loop_first, loop_last) = if guest.packed_level == Some(0) {
            (u32::from(pass.level_first != 0), u32::from(pass.level_last != 0))
        } else {
            (pass.level_first, guest.stored_level(pass.level_last))
        };
        let mut mips_source_ready = false;
        for loop_level in loop_first..=loop_last {
            let is_base = loop_level == 0;
            let level = if guest.packed_level == Some(0) {
                0
            } else {
                loop_level
            };
            let guest_address = if is_base {
                key.base_address()
            } else {
                key.mip_address()
            };

            if scaled && (is_base || !mips_source_ready) {
                let space = self
                    .scaled_resolve
                    .as_deref_mut()
                    .ok_or(ScaledResolveError::NotScaled)?;
                let size = if is_base {
                    guest.base_size()
                } else {
                    guest.mips_size()
                };
                summary.aliasing_barriers +=
                    space.make_range_current(&mut *self.backend, guest_address, size)?;
                space.transition_current_range(
                    &mut *self.backend,
                    ResourceState::NON_PIXEL_SHADER_RESOURCE,
                )?;
                let descriptor = if is_base {
                    descriptors[1]
                } else {
                    descriptors[descriptors.len() - 1]
                };
                space.create_current_range_srv(&mut *self.backend, descriptor.cpu, srv_bpe_log2)?;
                self.backend
                    .set_compute_root_descriptor_table(LOAD_ROOT_PARAMETER_SOURCE, descriptor.gpu);
                if !is_base {
                    mips_source_ready = true;
                }
            }

            let level_guest = if is_base {
                &guest.base
            } else {
                &guest.mips[level as usize]
            };
            let Some(footprint) = (if is_base {
                pass.host.base
            } else {
                pass.host.mips[level as usize]
            }) else {
                debug_assert!(false, "no footprint for level {level}");
                continue;
            };

            let (width, height, depth) = if guest.packed_level == Some(level) {
                (
                    level_guest.x_extent_blocks * info.block_width,
                    level_guest.y_extent_blocks * info.block_height,
                    level_guest.z_extent,
                )
            } else {
                (
                    (key.width >> level).max(1),
                    (key.height >> level).max(1),
                    (key.depth() >> level).max(1),
                )
            };
            let mut constants = LoadConstants {
                is_tiled_3d_endian_scale: LoadConstants::pack_flags(
                    key.tiled,
                    key.is_3d(),
                    key.endianness as u32,
                    pass.scale.x,
                    pass.scale.y,
                ),
                guest_offset: if scaled { 0 } else { guest_address },
                guest_pitch_aligned: if key.tiled {
                    level_guest.row_pitch_bytes / info.bytes_per_block()
                } else {
                    level_guest.row_pitch_bytes
                },
                guest_z_stride_block_rows_aligned: level_guest.z_slice_stride_block_rows,
                size_blocks: [
                    width.div_ceil(info.block_width) * pass.scale.x,
                    height.div_ceil(info.block_height) * pass.scale.y,
                    depth,
                ],
                height_texels: height,
                host_offset: footprint.footprint.offset as u32,
                host_pitch: footprint.footprint.row_pitch,
                ..LoadConstants::default()
            };
            if !is_base {
                constants.guest_offset += guest.mip_offsets_bytes[level as usize] * area;
            }
            let groups_x = constants.size_blocks[0]
                .div_ceil(1 << pass.mode.guest_x_blocks_per_group_log2());
            let groups_y = constants.size_blocks[1].div_ceil(1 << LOAD_GUEST_Y_BLOCKS_PER_GROUP_LOG2);

            for _ in 0..array_size {
                let address = self
                    .backend
                    .request_constant_buffer(bytemuck::bytes_of(&constants))?;
                self.backend
                    .set_compute_root_constant_buffer(LOAD_ROOT_PARAMETER_CONSTANTS, address);
                self.backend.submit_barriers();
                self.backend
                    .dispatch(groups_x, groups_y, constants.size_blocks[2]);
                summary.dispatches += 1;
                constants.guest_offset += level_guest.array_slice_stride_bytes * area;
                constants.host_offset += footprint.slice_size_bytes;
            }
        }

        let old_state = texture.set_state(ResourceState::COPY_DEST);
        self.backend
            .push_transition_barrier(texture.resource(), old_state, ResourceState::COPY_DEST);
        self.backend.push_transition_barrier(
            pass.scratch,
            ResourceState::UNORDERED_ACCESS,
            ResourceState::COPY_SOURCE,
        );
        self.backend.submit_barriers();
        summary.copies = self.copy_levels(pass, texture.resource());
        Ok(summary)
    }

    fn copy_levels(&mut self, pass: &LoadPass<'_>, texture: ResourceHandle) -> u32 {
        let key = pass.key;
        let guest = pass.guest;
        let info = key.format.info();
        let (host_block_width, host_block_height) =
            (pass.host.host_block_width, pass.host.host_block_height);
        let level_count = key.level_count();
        let mut copies = 0;
        for level in pass.level_first..=pass.level_last {
            let stored_level = guest.stored_level(level);
            let Some(mut level_footprint) = (if level == 0 {
                pass.host.base
            } else {
                pass.host.mips[stored_level as usize]
            }) else {
                debug_assert!(false, "no footprint for level {level}");
                continue;
            };
            let source_box = guest.is_level_packed(level).then(|| {
                let (x, y, z) =
                    packed_mip_offset(key.width, key.height, key.depth(), key.format, level);
                let left = x * info.block_width * pass.scale.x;
                let top = y * info.block_height * pass.scale.y;
                CopyBox {
                    left,
                    top,
                    front: z,
                    right: left
                        + align_pow2((key.width >> level).max(1), host_block_width) * pass.scale.x,
                    bottom: top
                        + align_pow2((key.height >> level).max(1), host_block_height)
                            * pass.scale.y,
                    back: z + (key.depth() >> level).max(1),
                }
            });
            let mut subresource = level;
            for _ in 0..key.array_size() {
                self.backend.copy_texture_region(&CopyTextureRegion {
                    dest: texture,
                    dest_subresource: subresource,
                    source: pass.scratch,
                    footprint: level_footprint.footprint,
                    source_box,
                });
                copies += 1;
                subresource += level_count;
                level_footprint.footprint.offset += u64::from(level_footprint.slice_size_bytes);
            }
        }
        copies
    }
}

struct LoadPass<'a> {
    key: &'a TextureKey,
    mode: &'static LoadModeInfo,
    guest: &'a GuestLayout,
    host: &'a HostLoadLayout,
    scale: DrawResolutionScale,
    scratch: ResourceHandle,
    pipeline: PipelineHandle,
    level_first: u32,
    level_last: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use xenos_host::testing::{BackendEvent, RecordingBackend};
    use xenos_host::CommandSubmitter;
    use xenos_types::{DataDimension, TextureFormat};

    fn texture(backend: &mut RecordingBackend, key: TextureKey) -> Texture {
        let desc = crate::texture::resource_desc(&key, DrawResolutionScale::default()).unwrap();
        let resource = backend.create_texture(&desc).unwrap();
        Texture::new(key, resource, 0)
    }

    fn loader<'a>(
        backend: &'a mut RecordingBackend,
        pipelines: &'a LoadPipelines,
    ) -> TextureLoader<'a, RecordingBackend> {
        TextureLoader {
            backend,
            pipelines,
            scaled_resolve: None,
            scale: DrawResolutionScale::default(),
            bindless: false,
        }
    }

    #[test]
    fn pipelines_for_every_mode() {
        let mut backend = RecordingBackend::new();
        let pipelines = LoadPipelines::create(&mut backend, true).unwrap();
        let scaled = LoadMode::ALL
            .iter()
            .filter(|mode| mode.info().program_scaled.is_some())
            .count();
        assert_eq!(
            backend.count(|event| matches!(event, BackendEvent::CreatePipeline { .. })),
            LoadMode::COUNT + scaled
        );
        assert!(pipelines.get(LoadMode::Dxt1ToRgba8, false).is_some());
        assert!(pipelines.get(LoadMode::Dxt1ToRgba8, true).is_none());

        backend.failing_programs.push("texture_load_ctx1");
        let err = LoadPipelines::create(&mut backend, false).unwrap_err();
        assert!(matches!(
            err,
            TextureCacheError::Pipeline {
                program: "texture_load_ctx1",
                ..
            }
        ));
    }

    #[test]
    fn array_texture_dispatches_per_slice() {
        let mut backend = RecordingBackend::new();
        let pipelines = LoadPipelines::create(&mut backend, false).unwrap();
        let mut key = TextureKey::new(
            TextureFormat::Fmt8_8_8_8,
            DataDimension::Tex2DOrStacked,
            100,
            64,
            3,
        );
        key.base_page = 0x40;
        let mut texture = texture(&mut backend, key);
        backend.clear_events();

        let summary = loader(&mut backend, &pipelines)
            .load(&mut texture, true, false)
            .unwrap();
        assert_eq!(summary.dispatches, 3);
        assert_eq!(summary.copies, 3);
        // 100 blocks, 8 per thread and 4 threads per group; 64 rows, 32 per group.
        assert_eq!(backend.dispatches(), vec![(4, 2, 1); 3]);
        let constants: Vec<LoadConstants> = backend
            .constant_buffers()
            .iter()
            .map(|data| bytemuck::pod_read_unaligned(data))
            .collect();
        let slice_stride = texture.guest_layout().base.array_slice_stride_bytes;
        assert_eq!(constants[0].guest_offset, 0x40000);
        assert_eq!(constants[1].guest_offset, 0x40000 + slice_stride);
        assert_eq!(constants[0].guest_pitch_aligned, 128);
        assert_eq!(constants[0].size_blocks, [100, 64, 1]);
        assert_eq!(constants[2].host_offset, 2 * summary.scratch_size as u32 / 3);
        let subresources: Vec<u32> = backend
            .copies()
            .iter()
            .map(|copy| copy.dest_subresource)
            .collect();
        assert_eq!(subresources, vec![0, 1, 2]);
        assert!(backend.events().contains(&BackendEvent::ReleaseScratch {
            buffer: backend.copies()[0].source,
            state: ResourceState::COPY_SOURCE,
        }));
        assert!(backend.events().contains(&BackendEvent::SharedMemoryUseForReading));
    }

    #[test]
    fn packed_tail_is_copied_with_boxes() {
        let mut backend = RecordingBackend::new();
        let pipelines = LoadPipelines::create(&mut backend, false).unwrap();
        let mut key = TextureKey::new(
            TextureFormat::Fmt8_8_8_8,
            DataDimension::Tex2DOrStacked,
            16,
            16,
            1,
        );
        key.mip_max_level = 4;
        key.packed_mips = true;
        key.mip_page = 0x80;
        let mut texture = texture(&mut backend, key);
        backend.clear_events();

        let summary = loader(&mut backend, &pipelines)
            .load(&mut texture, true, true)
            .unwrap();
        // The base tail and the mip tail.
        assert_eq!(summary.dispatches, 2);
        assert_eq!(summary.copies, 5);
        let boxes: Vec<_> = backend
            .copies()
            .iter()
            .map(|copy| copy.source_box.map(|b| (b.left, b.top, b.right, b.bottom)))
            .collect();
        assert_eq!(
            boxes,
            vec![
                Some((16, 0, 32, 16)),
                Some((8, 0, 16, 8)),
                Some((4, 0, 8, 4)),
                Some((0, 8, 2, 10)),
                Some((0, 4, 1, 5)),
            ]
        );
        let copies = backend.copies();
        assert_eq!(copies[1].footprint.offset, copies[2].footprint.offset);
        assert_ne!(copies[0].footprint.offset, copies[1].footprint.offset);
    }

    #[test]
    fn volume_tail_levels_are_copied_from_their_z_columns() {
        let mut backend = RecordingBackend::new();
        let pipelines = LoadPipelines::create(&mut backend, false).unwrap();
        let mut key =
            TextureKey::new(TextureFormat::Fmt8_8_8_8, DataDimension::Tex3D, 4, 4, 32);
        key.mip_max_level = 5;
        key.packed_mips = true;
        key.mip_page = 0x80;
        let mut texture = texture(&mut backend, key);
        backend.clear_events();

        let summary = loader(&mut backend, &pipelines)
            .load(&mut texture, true, true)
            .unwrap();
        assert_eq!(summary.copies, 6);
        let boxes: Vec<_> = backend
            .copies()
            .iter()
            .map(|copy| copy.source_box.map(|b| (b.left, b.top, b.front, b.back)))
            .collect();
        assert_eq!(
            boxes,
            vec![
                Some((16, 0, 0, 32)),
                Some((8, 0, 0, 16)),
                Some((4, 0, 0, 8)),
                Some((0, 2, 8, 12)),
                Some((0, 1, 4, 6)),
                Some((0, 0, 4, 5)),
            ]
        );
        let tail = backend.copies()[1].footprint;
        assert_eq!(tail.depth, 16);
    }

    #[test]
    fn bindless_reads_the_system_view() {
        let mut backend = RecordingBackend::new();
        let pipelines = LoadPipelines::create(&mut backend, false).unwrap();
        let key = TextureKey::new(TextureFormat::Fmt8, DataDimension::Tex2DOrStacked, 64, 64, 1);
        let mut texture = texture(&mut backend, key);
        backend.clear_events();
        let mut loader = loader(&mut backend, &pipelines);
        loader.bindless = true;
        loader.load(&mut texture, true, false).unwrap();
        let source = backend.system_bindless_view_handle_pair(
            SystemBindlessView::SharedMemoryUintPow2Srv {
                element_size_log2: LoadMode::Load8bpb.info().srv_bpe_log2,
            },
        );
        assert!(backend.events().contains(&BackendEvent::SetRootDescriptorTable {
            parameter: LOAD_ROOT_PARAMETER_SOURCE,
            table: source.gpu,
        }));
        assert_eq!(
            backend.count(|event| matches!(event, BackendEvent::SharedMemoryWriteSrv { .. })),
            0
        );
    }

    #[test]
    fn failures_release_the_scratch_buffer() {
        let mut backend = RecordingBackend::new();
        let pipelines = LoadPipelines::create(&mut backend, false).unwrap();
        let key = TextureKey::new(TextureFormat::Fmt8, DataDimension::Tex2DOrStacked, 64, 64, 1);
        let mut texture = texture(&mut backend, key);
        backend.clear_events();
        backend.fail_constant_buffer = true;
        let err = loader(&mut backend, &pipelines)
            .load(&mut texture, true, false)
            .unwrap_err();
        assert!(matches!(err, LoadError::Host(_)));
        assert!(backend.events().iter().any(|event| matches!(
            event,
            BackendEvent::ReleaseScratch { state, .. } if *state == ResourceState::UNORDERED_ACCESS
        )));
        assert!(backend.copies().is_empty());

        backend.clear_events();
        backend.fail_scratch_buffer = true;
        assert!(loader(&mut backend, &pipelines)
            .load(&mut texture, true, false)
            .is_err());
        assert!(backend.events().is_empty());
    }

    #[test]
    fn unsupported_and_scaled_without_space() {
        let mut backend = RecordingBackend::new();
        let pipelines = LoadPipelines::create(&mut backend, false).unwrap();
        let key = TextureKey::new(TextureFormat::Fmt1, DataDimension::Tex2DOrStacked, 64, 64, 1);
        let mut unsupported = Texture::new(key, ResourceHandle(999), 0);
        assert_eq!(
            loader(&mut backend, &pipelines).load(&mut unsupported, true, false),
            Err(LoadError::UnsupportedFormat(TextureFormat::Fmt1))
        );
        let mut key = TextureKey::new(TextureFormat::Fmt8, DataDimension::Tex2DOrStacked, 64, 64, 1);
        key.scaled_resolve = true;
        let mut scaled = Texture::new(key, ResourceHandle(998), 0);
        assert_eq!(
            loader(&mut backend, &pipelines).load(&mut scaled, true, false),
            Err(LoadError::PipelineUnavailable(LoadMode::Load8bpb))
        );
    }
}
