//! Placement of loaded levels in the scratch buffer the load programs write to.

use xenos_host::{DxgiFormat, PlacedFootprint};
use xenos_types::{align_pow2, round_up, TextureKey, TEXTURE_MAX_LEVELS};

use crate::config::DrawResolutionScale;
use crate::host_format::{host_block_size, resource_format};
use crate::layout::GuestLayout;
use crate::load_mode::LoadModeInfo;

/// Row pitch alignment of buffer footprints copied into textures.
pub const HOST_ROW_PITCH_ALIGNMENT: u32 = 256;
/// Offset alignment of buffer footprints copied into textures.
pub const HOST_PLACEMENT_ALIGNMENT: u32 = 512;

/// Footprint of one array slice of a stored level, and the distance to the next slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelFootprint {
    pub footprint: PlacedFootprint,
    pub slice_size_bytes: u32,
}

/// Scratch buffer layout of one load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLoadLayout {
    /// Present when the base level is loaded. With the packed tail at level 0
    /// this is the tail at the base address.
    pub base: Option<LevelFootprint>,
    /// Indexed by stored level.
    pub mips: [Option<LevelFootprint>; TEXTURE_MAX_LEVELS],
    pub buffer_size: u64,
    pub host_block_width: u32,
    pub host_block_height: u32,
}

impl HostLoadLayout {
    /// Lays out levels `level_first..=level_last` of `key` one after another,
    /// each stored level with all of its array slices.
    pub fn new(
        key: &TextureKey,
        guest: &GuestLayout,
        mode: &LoadModeInfo,
        scale: DrawResolutionScale,
        level_first: u32,
        level_last: u32,
    ) -> Self {
        let info = key.format.info();
        let copy_format = resource_format(key.format, key.width, key.height);
        let (host_block_width, host_block_height) =
            host_block_size(key.format, key.width, key.height);
        let array_size = key.array_size();
        let mut buffer_size = 0u64;
        let mut place = |extent: (u32, u32, u32)| {
            let footprint = level_footprint(
                copy_format,
                mode,
                scale,
                (host_block_width, host_block_height),
                extent,
                buffer_size,
            );
            buffer_size += u64::from(footprint.slice_size_bytes) * u64::from(array_size);
            footprint
        };

        let base = (level_first == 0).then(|| {
            let extent = if guest.packed_level == Some(0) {
                (
                    guest.base.x_extent_blocks * info.block_width,
                    guest.base.y_extent_blocks * info.block_height,
                    guest.base.z_extent,
                )
            } else {
                (key.width, key.height, key.depth())
            };
            place(extent)
        });

        let mut mips = [None; TEXTURE_MAX_LEVELS];
        if level_last > 0 {
            let stored_first = guest.stored_level(level_first.max(1));
            let stored_last = guest.stored_level(level_last);
            for level in stored_first..=stored_last {
                let extent = if Some(level) == guest.packed_level {
                    let tail = &guest.mips[level as usize];
                    (
                        tail.x_extent_blocks * info.block_width,
                        tail.y_extent_blocks * info.block_height,
                        tail.z_extent,
                    )
                } else {
                    (
                        (key.width >> level).max(1),
                        (key.height >> level).max(1),
                        (key.depth() >> level).max(1),
                    )
                };
                mips[level as usize] = Some(place(extent));
            }
        }

        Self {
            base,
            mips,
            buffer_size,
            host_block_width,
            host_block_height,
        }
    }

    /// Footprints in placement order.
    pub fn iter(&self) -> impl Iterator<Item = &LevelFootprint> {
        self.base.iter().chain(self.mips.iter().flatten())
    }
}

fn level_footprint(
    format: DxgiFormat,
    mode: &LoadModeInfo,
    scale: DrawResolutionScale,
    (host_block_width, host_block_height): (u32, u32),
    (width, height, depth): (u32, u32, u32),
    offset: u64,
) -> LevelFootprint {
    let width = round_up(width * scale.x, host_block_width);
    let height = round_up(height * scale.y, host_block_height);
    let row_blocks = round_up(
        width / host_block_width,
        mode.host_x_blocks_per_thread * scale.x,
    );
    let row_pitch = align_pow2(
        row_blocks * format.block_info().bytes,
        HOST_ROW_PITCH_ALIGNMENT,
    );
    let slice_size_bytes = align_pow2(
        row_pitch * (height / host_block_height) * depth,
        HOST_PLACEMENT_ALIGNMENT,
    );
    LevelFootprint {
        footprint: PlacedFootprint {
            offset,
            format,
            width,
            height,
            depth,
            row_pitch,
        },
        slice_size_bytes,
    }
}
