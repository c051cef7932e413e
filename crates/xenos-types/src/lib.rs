//! Guest GPU (Xenos) value types shared by the host-side GPU caches.
//!
//! Everything here describes the guest: texture format codes and their block
//! geometry, the texture key decoded from a fetch constant, channel swizzles and
//! signs, and the sampler-related enums of the texture fetch constant. Nothing in
//! this crate knows about the host graphics API.

pub mod fetch;
pub mod format;
pub mod swizzle;
pub mod texture_key;

pub use fetch::{
    AnisoFilter, BorderColor, ClampMode, FetchOpDimension, FetchSamplerState, TextureFilter,
};
pub use format::{FormatInfo, TextureFormat};
pub use swizzle::{Swizzle, SwizzleSource, SwizzledSigns, TextureSign};
pub use texture_key::{DataDimension, Endian, TextureKey};

/// Size of the guest physical memory mirrored by the shared memory buffer.
pub const SHARED_MEMORY_SIZE_LOG2: u32 = 29;
pub const SHARED_MEMORY_SIZE: u32 = 1 << SHARED_MEMORY_SIZE_LOG2;

/// Guest texture base and mip addresses are stored as 4 KB page indices.
pub const TEXTURE_PAGE_SIZE_LOG2: u32 = 12;

/// Tiled textures are stored as 32x32-block tiles.
pub const TEXTURE_TILE_WIDTH_HEIGHT_LOG2: u32 = 5;
pub const TEXTURE_TILE_WIDTH_HEIGHT: u32 = 1 << TEXTURE_TILE_WIDTH_HEIGHT_LOG2;
/// Tiled 3D textures are stored as 32x32x4-block tiles.
pub const TEXTURE_TILED_3D_DEPTH_ALIGNMENT: u32 = 4;

/// Rows of linear textures are aligned to 256 bytes.
pub const TEXTURE_LINEAR_ROW_ALIGNMENT_BYTES: u32 = 256;
/// Array slices and mip levels start at 4 KB boundaries.
pub const TEXTURE_SUBRESOURCE_ALIGNMENT_BYTES: u32 = 4096;

pub const TEXTURE_2D_CUBE_MAX_WIDTH_HEIGHT_LOG2: u32 = 13;
pub const TEXTURE_3D_MAX_WIDTH_HEIGHT_LOG2: u32 = 11;
pub const TEXTURE_3D_MAX_DEPTH_LOG2: u32 = 10;
pub const TEXTURE_2D_MAX_STACK_DEPTH: u32 = 512;
/// Highest possible mip level index plus one.
pub const TEXTURE_MAX_LEVELS: usize = TEXTURE_2D_CUBE_MAX_WIDTH_HEIGHT_LOG2 as usize + 1;

/// Mips whose shorter side is at most `1 << PACKED_MIP_MAX_SIZE_LOG2` texels share one tile.
pub const PACKED_MIP_MAX_SIZE_LOG2: u32 = 4;

pub const TEXTURE_FETCH_CONSTANT_COUNT: u32 = 32;

/// Round `value` up to a multiple of the power-of-two `alignment`.
pub const fn align_pow2(value: u32, alignment: u32) -> u32 {
    (value + (alignment - 1)) & !(alignment - 1)
}

/// Round `value` up to a multiple of any nonzero `multiple`.
pub const fn round_up(value: u32, multiple: u32) -> u32 {
    value.div_ceil(multiple) * multiple
}

/// `ceil(log2(value))`, with `log2_ceil(0) == log2_ceil(1) == 0`.
pub const fn log2_ceil(value: u32) -> u32 {
    if value <= 1 {
        0
    } else {
        32 - (value - 1).leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log2_ceil_rounds_up() {
        assert_eq!(log2_ceil(0), 0);
        assert_eq!(log2_ceil(1), 0);
        assert_eq!(log2_ceil(2), 1);
        assert_eq!(log2_ceil(3), 2);
        assert_eq!(log2_ceil(16), 4);
        assert_eq!(log2_ceil(17), 5);
        assert_eq!(log2_ceil(8192), 13);
    }

    #[test]
    fn rounding_helpers() {
        assert_eq!(align_pow2(0, 256), 0);
        assert_eq!(align_pow2(1, 256), 256);
        assert_eq!(align_pow2(256, 256), 256);
        assert_eq!(round_up(7, 3), 9);
        assert_eq!(round_up(9, 3), 9);
        assert_eq!(round_up(1, 48), 48);
    }
}
