//! Texture load compute programs and what they cover.

use bytemuck::{Pod, Zeroable};
use xenos_host::ComputeProgram;

/// Load compute program selected for a texture.
///
/// Each mode reads guest blocks (tiled or linear, in any endianness) and writes
/// host-layout blocks into a scratch buffer, converting or decompressing them
/// when the host has no equivalent format.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadMode {
    Load8bpb,
    Load16bpb,
    Load32bpb,
    Load64bpb,
    Load128bpb,
    R5G5B5A1ToB5G5R5A1,
    R5G6B5ToB5G6R5,
    R5G5B6ToB5G6R5WithRbgaSwizzle,
    R4G4B4A4ToB4G4R4A4,
    R10G11B11ToRgba16,
    R10G11B11ToRgba16Snorm,
    R11G11B10ToRgba16,
    R11G11B10ToRgba16Snorm,
    Dxt1ToRgba8,
    Dxt3ToRgba8,
    Dxt5ToRgba8,
    DxnToRg8,
    Dxt3A,
    Dxt3AAs1111ToBgra4,
    Dxt5AToR8,
    Ctx1,
    DepthUnorm,
    DepthFloat,
}

/// Static description of a [`LoadMode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadModeInfo {
    pub program: ComputeProgram,
    /// Variant reading from resolution-scaled resolve memory, if the mode supports it.
    pub program_scaled: Option<ComputeProgram>,
    /// log2 of the element size the source is read with.
    pub srv_bpe_log2: u32,
    /// log2 of the element size the scratch buffer is written with.
    pub uav_bpe_log2: u32,
    /// Guest blocks one thread processes along X, log2.
    pub guest_x_blocks_per_thread_log2: u32,
    /// Host blocks one thread writes along X. Host row pitches are padded to a
    /// multiple of this so the last thread in a row stays in bounds.
    pub host_x_blocks_per_thread: u32,
}

/// Threads per group along X, log2. Each group covers 32 block rows.
pub const LOAD_GROUP_X_THREADS_LOG2: u32 = 2;
pub const LOAD_GUEST_Y_BLOCKS_PER_GROUP_LOG2: u32 = 5;

/// Root parameter holding [`LoadConstants`].
pub const LOAD_ROOT_PARAMETER_CONSTANTS: u32 = 0;
/// Root parameter holding the source view.
pub const LOAD_ROOT_PARAMETER_SOURCE: u32 = 1;
/// Root parameter holding the scratch buffer view.
pub const LOAD_ROOT_PARAMETER_DEST: u32 = 2;

impl LoadModeInfo {
    pub const fn guest_x_blocks_per_group_log2(&self) -> u32 {
        self.guest_x_blocks_per_thread_log2 + LOAD_GROUP_X_THREADS_LOG2
    }
}

const fn info(
    name: &'static str,
    scaled_name: Option<&'static str>,
    srv_bpe_log2: u32,
    uav_bpe_log2: u32,
    guest_x_blocks_per_thread_log2: u32,
    host_x_blocks_per_thread: u32,
) -> LoadModeInfo {
    LoadModeInfo {
        program: ComputeProgram { name },
        program_scaled: match scaled_name {
            Some(name) => Some(ComputeProgram { name }),
            None => None,
        },
        srv_bpe_log2,
        uav_bpe_log2,
        guest_x_blocks_per_thread_log2,
        host_x_blocks_per_thread,
    }
}

static LOAD_MODE_INFOS: [LoadModeInfo; LoadMode::COUNT] = [
    info("texture_load_8bpb", Some("texture_load_8bpb_scaled"), 3, 4, 4, 16),
    info("texture_load_16bpb", Some("texture_load_16bpb_scaled"), 4, 4, 4, 16),
    info("texture_load_32bpb", Some("texture_load_32bpb_scaled"), 4, 4, 3, 8),
    info("texture_load_64bpb", Some("texture_load_64bpb_scaled"), 4, 4, 2, 4),
    info("texture_load_128bpb", Some("texture_load_128bpb_scaled"), 4, 4, 1, 2),
    info(
        "texture_load_r5g5b5a1_b5g5r5a1",
        Some("texture_load_r5g5b5a1_b5g5r5a1_scaled"),
        4,
        4,
        4,
        16,
    ),
    info(
        "texture_load_r5g6b5_b5g6r5",
        Some("texture_load_r5g6b5_b5g6r5_scaled"),
        4,
        4,
        4,
        16,
    ),
    info(
        "texture_load_r5g5b6_b5g6r5_swizzle_rbga",
        Some("texture_load_r5g5b6_b5g6r5_swizzle_rbga_scaled"),
        4,
        4,
        4,
        16,
    ),
    info(
        "texture_load_r4g4b4a4_b4g4r4a4",
        Some("texture_load_r4g4b4a4_b4g4r4a4_scaled"),
        4,
        4,
        4,
        16,
    ),
    info(
        "texture_load_r10g11b11_rgba16",
        Some("texture_load_r10g11b11_rgba16_scaled"),
        4,
        4,
        3,
        8,
    ),
    info(
        "texture_load_r10g11b11_rgba16_snorm",
        Some("texture_load_r10g11b11_rgba16_snorm_scaled"),
        4,
        4,
        3,
        8,
    ),
    info(
        "texture_load_r11g11b10_rgba16",
        Some("texture_load_r11g11b10_rgba16_scaled"),
        4,
        4,
        3,
        8,
    ),
    info(
        "texture_load_r11g11b10_rgba16_snorm",
        Some("texture_load_r11g11b10_rgba16_snorm_scaled"),
        4,
        4,
        3,
        8,
    ),
    info("texture_load_dxt1_rgba8", None, 4, 4, 2, 16),
    info("texture_load_dxt3_rgba8", None, 4, 4, 1, 8),
    info("texture_load_dxt5_rgba8", None, 4, 4, 1, 8),
    info("texture_load_dxn_rg8", None, 4, 4, 1, 8),
    info("texture_load_dxt3a", None, 4, 4, 2, 16),
    info("texture_load_dxt3aas1111_bgra4", None, 4, 4, 2, 16),
    info("texture_load_dxt5a_r8", None, 4, 4, 2, 16),
    info("texture_load_ctx1", None, 4, 4, 2, 16),
    info(
        "texture_load_depth_unorm",
        Some("texture_load_depth_unorm_scaled"),
        4,
        4,
        3,
        8,
    ),
    info(
        "texture_load_depth_float",
        Some("texture_load_depth_float_scaled"),
        4,
        4,
        3,
        8,
    ),
];

impl LoadMode {
    pub const COUNT: usize = 23;

    pub const ALL: [LoadMode; LoadMode::COUNT] = [
        LoadMode::Load8bpb,
        LoadMode::Load16bpb,
        LoadMode::Load32bpb,
        LoadMode::Load64bpb,
        LoadMode::Load128bpb,
        LoadMode::R5G5B5A1ToB5G5R5A1,
        LoadMode::R5G6B5ToB5G6R5,
        LoadMode::R5G5B6ToB5G6R5WithRbgaSwizzle,
        LoadMode::R4G4B4A4ToB4G4R4A4,
        LoadMode::R10G11B11ToRgba16,
        LoadMode::R10G11B11ToRgba16Snorm,
        LoadMode::R11G11B10ToRgba16,
        LoadMode::R11G11B10ToRgba16Snorm,
        LoadMode::Dxt1ToRgba8,
        LoadMode::Dxt3ToRgba8,
        LoadMode::Dxt5ToRgba8,
        LoadMode::DxnToRg8,
        LoadMode::Dxt3A,
        LoadMode::Dxt3AAs1111ToBgra4,
        LoadMode::Dxt5AToR8,
        LoadMode::Ctx1,
        LoadMode::DepthUnorm,
        LoadMode::DepthFloat,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn info(self) -> &'static LoadModeInfo {
        &LOAD_MODE_INFOS[self.index()]
    }

    /// Whether the mode decodes a block-compressed format into an uncompressed one.
    pub fn is_decompression(self) -> bool {
        matches!(
            self,
            LoadMode::Dxt1ToRgba8
                | LoadMode::Dxt3ToRgba8
                | LoadMode::Dxt5ToRgba8
                | LoadMode::DxnToRg8
                | LoadMode::Dxt5AToR8
        )
    }
}

/// Constant buffer of the load programs, one per dispatched array slice.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct LoadConstants {
    /// Bit 0 tiled, bit 1 3D, bits 2:3 endianness, bits 4:5 scale X, bits 6:7 scale Y.
    pub is_tiled_3d_endian_scale: u32,
    /// Byte offset of the slice in the source view.
    pub guest_offset: u32,
    /// Blocks for tiled textures, bytes for linear ones.
    pub guest_pitch_aligned: u32,
    pub guest_z_stride_block_rows_aligned: u32,
    /// Resolution-scaled extent in guest blocks, and depth.
    pub size_blocks: [u32; 3],
    pub padding0: u32,
    /// Unscaled height of the level in texels.
    pub height_texels: u32,
    /// Byte offset of the slice in the scratch buffer.
    pub host_offset: u32,
    pub host_pitch: u32,
    pub padding1: u32,
}

impl LoadConstants {
    pub fn pack_flags(tiled: bool, is_3d: bool, endian: u32, scale_x: u32, scale_y: u32) -> u32 {
        u32::from(tiled) | u32::from(is_3d) << 1 | endian << 2 | scale_x << 4 | scale_y << 6
    }
}
