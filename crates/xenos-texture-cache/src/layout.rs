//! Guest memory layout of textures.
//!
//! The base level lives at the base address and mip levels 1.. follow each
//! other at the mip address. Levels whose shorter side is 16 texels or less are
//! stored together in one "packed" tail at the offset of the first such level.

use xenos_types::{
    align_pow2, log2_ceil, TextureFormat, TextureKey, PACKED_MIP_MAX_SIZE_LOG2,
    TEXTURE_LINEAR_ROW_ALIGNMENT_BYTES, TEXTURE_MAX_LEVELS, TEXTURE_SUBRESOURCE_ALIGNMENT_BYTES,
    TEXTURE_TILED_3D_DEPTH_ALIGNMENT, TEXTURE_TILE_WIDTH_HEIGHT,
};

/// Layout of one stored level (or of the packed tail) in guest memory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GuestLevelLayout {
    /// Extent of the stored data in blocks. For the packed tail this covers
    /// every level in it.
    pub x_extent_blocks: u32,
    pub y_extent_blocks: u32,
    pub z_extent: u32,
    pub row_pitch_bytes: u32,
    /// Distance between 3D z slices, in rows of blocks.
    pub z_slice_stride_block_rows: u32,
    pub array_slice_data_bytes: u32,
    pub array_slice_stride_bytes: u32,
    /// Bytes from the start of the level to the end of its last array slice.
    pub level_data_extent_bytes: u32,
}

/// Layout of a whole texture in guest memory, computed once per texture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuestLayout {
    pub base: GuestLevelLayout,
    /// Indexed by level. With the tail at level 0, `mips[0]` is the tail
    /// stored at the mip address.
    pub mips: [GuestLevelLayout; TEXTURE_MAX_LEVELS],
    /// Offset of each stored mip level from the mip address.
    pub mip_offsets_bytes: [u32; TEXTURE_MAX_LEVELS],
    pub mips_total_extent_bytes: u32,
    pub max_level: u32,
    /// First level stored in the packed tail, `None` if the texture has no tail.
    pub packed_level: Option<u32>,
}

impl GuestLayout {
    pub fn new(key: &TextureKey) -> Self {
        let format = key.format;
        let info = format.info();
        let is_3d = key.is_3d();
        let array_size = key.array_size();
        let max_level = key.mip_max_level;
        let packed_level = key
            .packed_mips
            .then(|| packed_mip_level(key.width, key.height));
        let params = LevelParams {
            format,
            tiled: key.tiled,
            is_3d,
            array_size,
        };

        let base = if packed_level == Some(0) {
            let (x, y, z) = packed_tail_extent(key, 0, 0);
            params.level(key.pitch.div_ceil(info.block_width).max(x), x, y, z)
        } else {
            params.level(
                key.pitch.div_ceil(info.block_width),
                key.width.div_ceil(info.block_width),
                key.height.div_ceil(info.block_height),
                key.depth(),
            )
        };

        let mut mips = [GuestLevelLayout::default(); TEXTURE_MAX_LEVELS];
        let mut mip_offsets_bytes = [0; TEXTURE_MAX_LEVELS];
        let mut mips_total_extent_bytes = 0;
        if max_level > 0 {
            let width_pow2 = key.width.next_power_of_two();
            let height_pow2 = key.height.next_power_of_two();
            let depth_pow2 = key.depth().next_power_of_two();
            let stored_last = packed_level.map_or(max_level, |packed| max_level.min(packed));
            let stored_first = if packed_level == Some(0) { 0 } else { 1 };
            let mut offset = 0u32;
            for level in stored_first..=stored_last {
                let layout = if Some(level) == packed_level {
                    let (x, y, z) = packed_tail_extent(key, level.max(1), max_level);
                    params.level(x, x, y, z)
                } else {
                    let x = (width_pow2 >> level).max(1).div_ceil(info.block_width);
                    params.level(
                        x,
                        x,
                        (height_pow2 >> level).max(1).div_ceil(info.block_height),
                        (depth_pow2 >> level).max(1),
                    )
                };
                mip_offsets_bytes[level as usize] = offset;
                mips_total_extent_bytes = offset + layout.level_data_extent_bytes;
                offset += layout.array_slice_stride_bytes * array_size;
                mips[level as usize] = layout;
            }
        }

        Self {
            base,
            mips,
            mip_offsets_bytes,
            mips_total_extent_bytes,
            max_level,
            packed_level,
        }
    }

    /// Level whose data holds `level`: the level itself, or the packed tail.
    pub fn stored_level(&self, level: u32) -> u32 {
        self.packed_level
            .map_or(level, |packed| level.min(packed))
    }

    /// Whether `level` lives inside the packed tail.
    pub fn is_level_packed(&self, level: u32) -> bool {
        self.packed_level.is_some_and(|packed| level >= packed)
    }

    pub fn base_size(&self) -> u32 {
        self.base.level_data_extent_bytes
    }

    pub fn mips_size(&self) -> u32 {
        self.mips_total_extent_bytes
    }
}

struct LevelParams {
    format: TextureFormat,
    tiled: bool,
    is_3d: bool,
    array_size: u32,
}

impl LevelParams {
    fn level(
        &self,
        pitch_blocks: u32,
        x_extent_blocks: u32,
        y_extent_blocks: u32,
        z_extent: u32,
    ) -> GuestLevelLayout {
        let bytes_per_block = self.format.info().bytes_per_block();
        let pitch_blocks = pitch_blocks.max(x_extent_blocks);
        let (x_extent_blocks, y_extent_blocks, z_extent, row_pitch_bytes) = if self.tiled {
            let z_extent = if self.is_3d {
                align_pow2(z_extent, TEXTURE_TILED_3D_DEPTH_ALIGNMENT)
            } else {
                z_extent
            };
            (
                align_pow2(x_extent_blocks, TEXTURE_TILE_WIDTH_HEIGHT),
                align_pow2(y_extent_blocks, TEXTURE_TILE_WIDTH_HEIGHT),
                z_extent,
                align_pow2(pitch_blocks, TEXTURE_TILE_WIDTH_HEIGHT) * bytes_per_block,
            )
        } else {
            (
                x_extent_blocks,
                y_extent_blocks,
                z_extent,
                align_pow2(
                    pitch_blocks * bytes_per_block,
                    TEXTURE_LINEAR_ROW_ALIGNMENT_BYTES,
                ),
            )
        };
        let z_slice_stride_block_rows = y_extent_blocks;
        let array_slice_data_bytes = row_pitch_bytes * z_slice_stride_block_rows * z_extent;
        let array_slice_stride_bytes =
            align_pow2(array_slice_data_bytes, TEXTURE_SUBRESOURCE_ALIGNMENT_BYTES);
        GuestLevelLayout {
            x_extent_blocks,
            y_extent_blocks,
            z_extent,
            row_pitch_bytes,
            z_slice_stride_block_rows,
            array_slice_data_bytes,
            array_slice_stride_bytes,
            level_data_extent_bytes: array_slice_stride_bytes * (self.array_size - 1)
                + array_slice_data_bytes,
        }
    }
}

/// Extent in blocks covering levels `first..=last` of the packed tail.
fn packed_tail_extent(key: &TextureKey, first: u32, last: u32) -> (u32, u32, u32) {
    let info = key.format.info();
    let mut extent = (0, 0, 0);
    for level in first..=last.max(first) {
        let (width, height, depth) = level_size(key, level);
        let (x, y, z) = packed_mip_offset(key.width, key.height, key.depth(), key.format, level);
        extent.0 = extent.0.max(x + width.div_ceil(info.block_width));
        extent.1 = extent.1.max(y + height.div_ceil(info.block_height));
        extent.2 = extent.2.max(z + depth);
    }
    extent
}

/// Size of `level` in texels: the real size for the base, power-of-two sizes
/// for mips.
pub fn level_size(key: &TextureKey, level: u32) -> (u32, u32, u32) {
    if level == 0 {
        return (key.width, key.height, key.depth());
    }
    (
        (key.width.next_power_of_two() >> level).max(1),
        (key.height.next_power_of_two() >> level).max(1),
        (key.depth().next_power_of_two() >> level).max(1),
    )
}

/// First level stored in the packed tail of a `width`×`height` texture.
pub fn packed_mip_level(width: u32, height: u32) -> u32 {
    let log2_size = log2_ceil(width).min(log2_ceil(height));
    log2_size.saturating_sub(PACKED_MIP_MAX_SIZE_LOG2)
}

/// Offset of `level` inside the packed tail of a `width`×`height`×`depth`
/// texture, in blocks for x and y and in slices for z, or `(0, 0, 0)` if the
/// level isn't packed.
///
/// The first three tail levels go along the shorter axis at 16, 8 and 4
/// texels; the smaller ones go along the longer axis, halving each time. Once
/// that offset drops below 4 texels the level is a column of 1x1 texels and
/// also moves along z. Pass a depth of 1 for anything but 3D.
pub fn packed_mip_offset(
    width: u32,
    height: u32,
    depth: u32,
    format: TextureFormat,
    level: u32,
) -> (u32, u32, u32) {
    let log2_width = log2_ceil(width);
    let log2_height = log2_ceil(height);
    let log2_size = log2_width.min(log2_height);
    if log2_size > PACKED_MIP_MAX_SIZE_LOG2 + level {
        return (0, 0, 0);
    }
    let packed_base = log2_size.saturating_sub(PACKED_MIP_MAX_SIZE_LOG2);
    let packed = level - packed_base;
    let wide = log2_width > log2_height;
    let (x, y, z) = if packed < 3 {
        let offset = 16 >> packed;
        if wide {
            (0, offset, 0)
        } else {
            (offset, 0, 0)
        }
    } else {
        let log2_long = if wide { log2_width } else { log2_height };
        let offset = (1u32 << (log2_long - packed_base))
            .checked_shr(packed - 2)
            .unwrap_or(0);
        let z = if offset < 4 {
            let log2_depth = log2_ceil(depth);
            if log2_depth > packed + 1 {
                (log2_depth - packed) * 4
            } else {
                4
            }
        } else {
            0
        };
        if wide {
            (offset, 0, z)
        } else {
            (0, offset, z)
        }
    };
    let info = format.info();
    (x / info.block_width, y / info.block_height, z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use xenos_types::DataDimension;

    #[test]
    fn packed_level_starts_at_16_texels() {
        assert_eq!(packed_mip_level(16, 16), 0);
        assert_eq!(packed_mip_level(17, 1024), 1);
        assert_eq!(packed_mip_level(256, 256), 4);
        assert_eq!(packed_mip_level(1, 8192), 0);
    }

    #[test]
    fn packed_offsets_of_square_tail() {
        let format = TextureFormat::Fmt8_8_8_8;
        assert_eq!(packed_mip_offset(16, 16, 1, format, 0), (16, 0, 0));
        assert_eq!(packed_mip_offset(16, 16, 1, format, 1), (8, 0, 0));
        assert_eq!(packed_mip_offset(16, 16, 1, format, 2), (4, 0, 0));
        assert_eq!(packed_mip_offset(16, 16, 1, format, 3), (0, 8, 0));
        assert_eq!(packed_mip_offset(16, 16, 1, format, 4), (0, 4, 0));
        // Not packed yet.
        assert_eq!(packed_mip_offset(64, 64, 1, format, 1), (0, 0, 0));
        // Wide textures pack along Y first, offsets in 4x4 blocks.
        assert_eq!(packed_mip_offset(32, 16, 1, TextureFormat::Dxt1, 0), (0, 4, 0));
        assert_eq!(packed_mip_offset(32, 16, 1, TextureFormat::Dxt1, 3), (4, 0, 0));
    }

    #[test]
    fn packed_offsets_of_deep_volume_tail() {
        let format = TextureFormat::Fmt8_8_8_8;
        let offsets: Vec<_> = (0..=5)
            .map(|level| packed_mip_offset(4, 4, 32, format, level))
            .collect();
        assert_eq!(
            offsets,
            vec![
                (16, 0, 0),
                (8, 0, 0),
                (4, 0, 0),
                // 1x1 columns go along z once the in-plane offset is under 4.
                (0, 2, 8),
                (0, 1, 4),
                (0, 0, 4),
            ]
        );
        // A flat texture never leaves z 0.
        assert_eq!(packed_mip_offset(4, 4, 1, format, 2), (4, 0, 0));
        assert_eq!(packed_mip_offset(1, 1, 1, format, 0), (16, 0, 0));
    }

    #[test]
    fn volume_tail_extent_covers_z_columns() {
        let mut key = TextureKey::new(TextureFormat::Fmt8_8_8_8, DataDimension::Tex3D, 4, 4, 32);
        key.mip_max_level = 5;
        key.packed_mips = true;
        key.mip_page = 0x100;
        let layout = GuestLayout::new(&key);
        assert_eq!(layout.packed_level, Some(0));
        // Level 3 spans z 8..12 at (0, 2).
        assert_eq!(layout.mips[0].z_extent, 16);
        assert_eq!(layout.base.z_extent, 32);
    }

    #[test]
    fn linear_layout_without_mips() {
        let mut key = TextureKey::new(
            TextureFormat::Fmt8_8_8_8,
            DataDimension::Tex2DOrStacked,
            100,
            50,
            3,
        );
        key.tiled = false;
        key.pitch = 100;
        let layout = GuestLayout::new(&key);
        assert_eq!(layout.base.row_pitch_bytes, 512);
        assert_eq!(layout.base.array_slice_data_bytes, 512 * 50);
        assert_eq!(layout.base.array_slice_stride_bytes, 28672);
        assert_eq!(layout.base_size(), 28672 * 2 + 512 * 50);
        assert_eq!(layout.mips_size(), 0);
        assert_eq!(layout.packed_level, None);
    }

    #[test]
    fn tiled_mips_with_packed_tail() {
        let mut key = TextureKey::new(
            TextureFormat::Fmt8_8_8_8,
            DataDimension::Tex2DOrStacked,
            64,
            64,
            1,
        );
        key.mip_max_level = 6;
        key.packed_mips = true;
        key.mip_page = 0x100;
        let layout = GuestLayout::new(&key);
        assert_eq!(layout.packed_level, Some(2));
        assert_eq!(layout.stored_level(5), 2);
        assert!(layout.is_level_packed(2));
        assert!(!layout.is_level_packed(1));
        // Level 1 is 32x32 texels, one tile.
        assert_eq!(layout.mips[1].row_pitch_bytes, 32 * 4);
        assert_eq!(layout.mips[1].array_slice_stride_bytes, 4096);
        // The tail follows level 1 and takes a single tile.
        assert_eq!(layout.mip_offsets_bytes[2], 4096);
        assert_eq!(layout.mips[2].x_extent_blocks, 32);
        assert_eq!(layout.mips[2].y_extent_blocks, 32);
        assert_eq!(layout.mips_size(), 8192);
    }

    #[test]
    fn small_texture_has_tails_at_both_addresses() {
        let mut key = TextureKey::new(
            TextureFormat::Dxt1,
            DataDimension::Tex2DOrStacked,
            16,
            16,
            1,
        );
        key.mip_max_level = 4;
        key.packed_mips = true;
        key.mip_page = 0x200;
        let layout = GuestLayout::new(&key);
        assert_eq!(layout.packed_level, Some(0));
        // Level 0 sits at 16 texels (4 blocks) into the tail.
        assert_eq!(layout.base.x_extent_blocks, 32);
        assert_eq!(layout.mips[0].x_extent_blocks, 32);
        assert_eq!(layout.mip_offsets_bytes[0], 0);
        assert_eq!(layout.mips_size(), layout.mips[0].level_data_extent_bytes);
    }

    #[test]
    fn tiled_3d_depth_is_aligned_to_4() {
        let key = TextureKey::new(TextureFormat::Fmt8, DataDimension::Tex3D, 32, 32, 5);
        let layout = GuestLayout::new(&key);
        assert_eq!(layout.base.z_extent, 8);
        assert_eq!(layout.base.z_slice_stride_block_rows, 32);
        assert_eq!(layout.base.array_slice_data_bytes, 32 * 32 * 8);
    }

    #[cfg(not(target_arch = "wasm32"))]
    mod props {
        use super::*;
        use proptest::prelude::*;

        type Box3 = [(u32, u32); 3];

        fn packed_key(format: TextureFormat, dimension: DataDimension, size: [u32; 3]) -> TextureKey {
            let mut key = TextureKey::new(format, dimension, size[0], size[1], size[2]);
            key.mip_max_level = log2_ceil(size[0].max(size[1]).max(key.depth()));
            key.packed_mips = true;
            key.mip_page = 0x100;
            key
        }

        fn level_box(key: &TextureKey, level: u32) -> Box3 {
            let info = key.format.info();
            let (x, y, z) = packed_mip_offset(key.width, key.height, key.depth(), key.format, level);
            let (width, height, depth) = level_size(key, level);
            [
                (x, x + width.div_ceil(info.block_width)),
                (y, y + height.div_ceil(info.block_height)),
                (z, z + depth),
            ]
        }

        fn overlap(a: &Box3, b: &Box3) -> bool {
            a.iter().zip(b).all(|(a, b)| a.0 < b.1 && b.0 < a.1)
        }

        /// Checks the tail boxes of `levels` against each other and against
        /// the stored extent of the level holding them.
        fn check_tail(key: &TextureKey, levels: std::ops::RangeInclusive<u32>) -> Result<(), TestCaseError> {
            let layout = GuestLayout::new(key);
            let boxes: Vec<_> = levels.map(|level| (level, level_box(key, level))).collect();
            for (i, (level, a)) in boxes.iter().enumerate() {
                let stored = if *level == 0 {
                    &layout.base
                } else {
                    &layout.mips[layout.stored_level(*level) as usize]
                };
                prop_assert!(a[0].1 <= stored.x_extent_blocks, "level {} {:?} {:?}", level, a, stored);
                prop_assert!(a[1].1 <= stored.y_extent_blocks, "level {} {:?} {:?}", level, a, stored);
                prop_assert!(a[2].1 <= stored.z_extent, "level {} {:?} {:?}", level, a, stored);
                for (other, b) in &boxes[i + 1..] {
                    prop_assert!(!overlap(a, b), "level {} {:?} overlaps level {} {:?}", level, a, other, b);
                }
                prop_assert_eq!(&level_box(key, *level), a);
            }
            Ok(())
        }

        proptest! {
            #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

            #[test]
            fn packed_levels_are_disjoint(
                width in 1u32..=2048,
                height in 1u32..=2048,
                format in prop::sample::select(vec![
                    TextureFormat::Fmt8,
                    TextureFormat::Fmt8_8_8_8,
                    TextureFormat::Dxt1,
                    TextureFormat::Dxn,
                ]),
            ) {
                let key = packed_key(format, DataDimension::Tex2DOrStacked, [width, height, 1]);
                let packed = packed_mip_level(width, height);
                check_tail(&key, packed..=key.mip_max_level.max(packed))?;
            }

            // Past three levels beyond the longer side (one for block
            // compressed formats, whose 1x1 texels share a block) the guest
            // stacks 1x1 columns at the same z, so those are left out.
            #[test]
            fn packed_volume_levels_are_disjoint(
                width in 1u32..=256,
                height in 1u32..=256,
                depth in 1u32..=2048,
                format in prop::sample::select(vec![
                    TextureFormat::Fmt8,
                    TextureFormat::Fmt8_8_8_8,
                    TextureFormat::Dxt1,
                    TextureFormat::Dxn,
                ]),
            ) {
                let key = packed_key(format, DataDimension::Tex3D, [width, height, depth]);
                let packed = packed_mip_level(width, height);
                let beyond = if format.info().block_width > 1 { 1 } else { 3 };
                let last = key.mip_max_level.min(log2_ceil(width.max(height)) + beyond);
                check_tail(&key, packed..=last.max(packed))?;
            }
        }
    }
}
