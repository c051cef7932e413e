//! Mapping of guest texture formats to host formats and load modes.

use xenos_host::DxgiFormat;
use xenos_types::{Swizzle, TextureFormat, TextureKey};

use crate::load_mode::LoadMode;

/// How one guest format is stored and viewed on the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HostFormatEntry {
    /// Format of the resource; typeless when unorm and snorm views share it.
    pub resource: DxgiFormat,
    pub unorm: DxgiFormat,
    pub load_mode: Option<LoadMode>,
    pub snorm: DxgiFormat,
    /// Load mode of the signed twin. Only differs from `load_mode` when the
    /// signed data needs its own conversion, and then the signed view reads a
    /// separate resource.
    pub load_mode_snorm: Option<LoadMode>,
    /// The host format has the same block size as the guest one, so copy
    /// regions are aligned to guest blocks.
    pub block_aligned: bool,
    /// Format to decompress into when the host can't sample partial blocks.
    pub uncompressed: DxgiFormat,
    pub decompress_mode: Option<LoadMode>,
    /// Where the guest's RGBA components end up in the host format.
    pub swizzle: Swizzle,
}

const fn unsupported(swizzle: Swizzle) -> HostFormatEntry {
    HostFormatEntry {
        resource: DxgiFormat::Unknown,
        unorm: DxgiFormat::Unknown,
        load_mode: None,
        snorm: DxgiFormat::Unknown,
        load_mode_snorm: None,
        block_aligned: false,
        uncompressed: DxgiFormat::Unknown,
        decompress_mode: None,
        swizzle,
    }
}

/// Format with a typeless resource shared by a unorm and an optional snorm view.
const fn shared(
    resource: DxgiFormat,
    unorm: DxgiFormat,
    load_mode: LoadMode,
    snorm: DxgiFormat,
    swizzle: Swizzle,
) -> HostFormatEntry {
    HostFormatEntry {
        resource,
        unorm,
        load_mode: Some(load_mode),
        snorm,
        load_mode_snorm: None,
        block_aligned: false,
        uncompressed: DxgiFormat::Unknown,
        decompress_mode: None,
        swizzle,
    }
}

/// Format converted into one host format with no signed view.
const fn converted(format: DxgiFormat, load_mode: LoadMode, swizzle: Swizzle) -> HostFormatEntry {
    shared(format, format, load_mode, DxgiFormat::Unknown, swizzle)
}

/// Packed 11:11:10 formats, expanded to 16 bits per component with a
/// separately converted signed twin.
const fn expanded_11_11_10(load_mode: LoadMode, load_mode_snorm: LoadMode) -> HostFormatEntry {
    HostFormatEntry {
        resource: DxgiFormat::R16G16B16A16Typeless,
        unorm: DxgiFormat::R16G16B16A16Unorm,
        load_mode: Some(load_mode),
        snorm: DxgiFormat::R16G16B16A16Snorm,
        load_mode_snorm: Some(load_mode_snorm),
        block_aligned: false,
        uncompressed: DxgiFormat::Unknown,
        decompress_mode: None,
        swizzle: Swizzle::RGBB,
    }
}

/// Block-compressed format the host samples directly when the size is a
/// multiple of the block size, decompressing it otherwise.
const fn compressed(
    format: DxgiFormat,
    load_mode: LoadMode,
    uncompressed: DxgiFormat,
    decompress_mode: LoadMode,
    swizzle: Swizzle,
) -> HostFormatEntry {
    HostFormatEntry {
        resource: format,
        unorm: format,
        load_mode: Some(load_mode),
        snorm: DxgiFormat::Unknown,
        load_mode_snorm: None,
        block_aligned: true,
        uncompressed,
        decompress_mode: Some(decompress_mode),
        swizzle,
    }
}

/// Packed YUV 4:2:2, two texels per 32-bit block.
const fn packed_yuv(format: DxgiFormat) -> HostFormatEntry {
    HostFormatEntry {
        block_aligned: true,
        ..converted(format, LoadMode::Load32bpb, Swizzle::BGRR)
    }
}

const K_8: HostFormatEntry = shared(
    DxgiFormat::R8Typeless,
    DxgiFormat::R8Unorm,
    LoadMode::Load8bpb,
    DxgiFormat::R8Snorm,
    Swizzle::RRRR,
);
const K_8_8_8_8: HostFormatEntry = shared(
    DxgiFormat::R8G8B8A8Typeless,
    DxgiFormat::R8G8B8A8Unorm,
    LoadMode::Load32bpb,
    DxgiFormat::R8G8B8A8Snorm,
    Swizzle::RGBA,
);
const K_10_11_11: HostFormatEntry =
    expanded_11_11_10(LoadMode::R11G11B10ToRgba16, LoadMode::R11G11B10ToRgba16Snorm);
const K_11_11_10: HostFormatEntry =
    expanded_11_11_10(LoadMode::R10G11B11ToRgba16, LoadMode::R10G11B11ToRgba16Snorm);
const K_DXT1: HostFormatEntry = compressed(
    DxgiFormat::Bc1Unorm,
    LoadMode::Load64bpb,
    DxgiFormat::R8G8B8A8Unorm,
    LoadMode::Dxt1ToRgba8,
    Swizzle::RGBA,
);
const K_DXT2_3: HostFormatEntry = compressed(
    DxgiFormat::Bc2Unorm,
    LoadMode::Load128bpb,
    DxgiFormat::R8G8B8A8Unorm,
    LoadMode::Dxt3ToRgba8,
    Swizzle::RGBA,
);
const K_DXT4_5: HostFormatEntry = compressed(
    DxgiFormat::Bc3Unorm,
    LoadMode::Load128bpb,
    DxgiFormat::R8G8B8A8Unorm,
    LoadMode::Dxt5ToRgba8,
    Swizzle::RGBA,
);
const K_16_FLOAT: HostFormatEntry = shared(
    DxgiFormat::R16Float,
    DxgiFormat::R16Float,
    LoadMode::Load16bpb,
    DxgiFormat::R16Float,
    Swizzle::RRRR,
);
const K_16_16_FLOAT: HostFormatEntry = shared(
    DxgiFormat::R16G16Float,
    DxgiFormat::R16G16Float,
    LoadMode::Load32bpb,
    DxgiFormat::R16G16Float,
    Swizzle::RGGG,
);
const K_16_16_16_16_FLOAT: HostFormatEntry = shared(
    DxgiFormat::R16G16B16A16Float,
    DxgiFormat::R16G16B16A16Float,
    LoadMode::Load64bpb,
    DxgiFormat::R16G16B16A16Float,
    Swizzle::RGBA,
);

/// Indexed by guest format code.
static HOST_FORMATS: [HostFormatEntry; TextureFormat::COUNT] = [
    // k_1_REVERSE
    unsupported(Swizzle::RRRR),
    // k_1
    unsupported(Swizzle::RRRR),
    // k_8
    K_8,
    // k_1_5_5_5
    converted(DxgiFormat::B5G5R5A1Unorm, LoadMode::R5G5B5A1ToB5G5R5A1, Swizzle::RGBA),
    // k_5_6_5
    converted(DxgiFormat::B5G6R5Unorm, LoadMode::R5G6B5ToB5G6R5, Swizzle::RGBB),
    // k_6_5_5
    converted(
        DxgiFormat::B5G6R5Unorm,
        LoadMode::R5G5B6ToB5G6R5WithRbgaSwizzle,
        Swizzle::RBGG,
    ),
    // k_8_8_8_8
    K_8_8_8_8,
    // k_2_10_10_10
    shared(
        DxgiFormat::R10G10B10A2Typeless,
        DxgiFormat::R10G10B10A2Unorm,
        LoadMode::Load32bpb,
        DxgiFormat::Unknown,
        Swizzle::RGBA,
    ),
    // k_8_A
    K_8,
    // k_8_B
    unsupported(Swizzle::RRRR),
    // k_8_8
    shared(
        DxgiFormat::R8G8Typeless,
        DxgiFormat::R8G8Unorm,
        LoadMode::Load16bpb,
        DxgiFormat::R8G8Snorm,
        Swizzle::RGGG,
    ),
    // k_Cr_Y1_Cb_Y0_REP
    packed_yuv(DxgiFormat::G8R8G8B8Unorm),
    // k_Y1_Cr_Y0_Cb_REP
    packed_yuv(DxgiFormat::R8G8B8G8Unorm),
    // k_16_16_EDRAM
    unsupported(Swizzle::RGGG),
    // k_8_8_8_8_A
    unsupported(Swizzle::RGBA),
    // k_4_4_4_4
    converted(DxgiFormat::B4G4R4A4Unorm, LoadMode::R4G4B4A4ToB4G4R4A4, Swizzle::RGBA),
    // k_10_11_11
    K_10_11_11,
    // k_11_11_10
    K_11_11_10,
    // k_DXT1
    K_DXT1,
    // k_DXT2_3
    K_DXT2_3,
    // k_DXT4_5
    K_DXT4_5,
    // k_16_16_16_16_EDRAM
    unsupported(Swizzle::RGBA),
    // k_24_8
    shared(
        DxgiFormat::R32Float,
        DxgiFormat::R32Float,
        LoadMode::DepthUnorm,
        DxgiFormat::R32Float,
        Swizzle::RRRR,
    ),
    // k_24_8_FLOAT
    shared(
        DxgiFormat::R32Float,
        DxgiFormat::R32Float,
        LoadMode::DepthFloat,
        DxgiFormat::R32Float,
        Swizzle::RRRR,
    ),
    // k_16
    shared(
        DxgiFormat::R16Typeless,
        DxgiFormat::R16Unorm,
        LoadMode::Load16bpb,
        DxgiFormat::R16Snorm,
        Swizzle::RRRR,
    ),
    // k_16_16
    shared(
        DxgiFormat::R16G16Typeless,
        DxgiFormat::R16G16Unorm,
        LoadMode::Load32bpb,
        DxgiFormat::R16G16Snorm,
        Swizzle::RGGG,
    ),
    // k_16_16_16_16
    shared(
        DxgiFormat::R16G16B16A16Typeless,
        DxgiFormat::R16G16B16A16Unorm,
        LoadMode::Load64bpb,
        DxgiFormat::R16G16B16A16Snorm,
        Swizzle::RGBA,
    ),
    // k_16_EXPAND
    K_16_FLOAT,
    // k_16_16_EXPAND
    K_16_16_FLOAT,
    // k_16_16_16_16_EXPAND
    K_16_16_16_16_FLOAT,
    // k_16_FLOAT
    K_16_FLOAT,
    // k_16_16_FLOAT
    K_16_16_FLOAT,
    // k_16_16_16_16_FLOAT
    K_16_16_16_16_FLOAT,
    // k_32
    unsupported(Swizzle::RRRR),
    // k_32_32
    unsupported(Swizzle::RGGG),
    // k_32_32_32_32
    unsupported(Swizzle::RGBA),
    // k_32_FLOAT
    shared(
        DxgiFormat::R32Float,
        DxgiFormat::R32Float,
        LoadMode::Load32bpb,
        DxgiFormat::R32Float,
        Swizzle::RRRR,
    ),
    // k_32_32_FLOAT
    shared(
        DxgiFormat::R32G32Float,
        DxgiFormat::R32G32Float,
        LoadMode::Load64bpb,
        DxgiFormat::R32G32Float,
        Swizzle::RGGG,
    ),
    // k_32_32_32_32_FLOAT
    shared(
        DxgiFormat::R32G32B32A32Float,
        DxgiFormat::R32G32B32A32Float,
        LoadMode::Load128bpb,
        DxgiFormat::R32G32B32A32Float,
        Swizzle::RGBA,
    ),
    // k_32_AS_8
    unsupported(Swizzle::RRRR),
    // k_32_AS_8_8
    unsupported(Swizzle::RGGG),
    // k_16_MPEG
    unsupported(Swizzle::RRRR),
    // k_16_16_MPEG
    unsupported(Swizzle::RGGG),
    // k_8_INTERLACED
    unsupported(Swizzle::RRRR),
    // k_32_AS_8_INTERLACED
    unsupported(Swizzle::RRRR),
    // k_32_AS_8_8_INTERLACED
    unsupported(Swizzle::RGGG),
    // k_16_INTERLACED
    unsupported(Swizzle::RRRR),
    // k_16_MPEG_INTERLACED
    unsupported(Swizzle::RRRR),
    // k_16_16_MPEG_INTERLACED
    unsupported(Swizzle::RGGG),
    // k_DXN
    compressed(
        DxgiFormat::Bc5Unorm,
        LoadMode::Load128bpb,
        DxgiFormat::R8G8Unorm,
        LoadMode::DxnToRg8,
        Swizzle::RGGG,
    ),
    // k_8_8_8_8_AS_16_16_16_16
    K_8_8_8_8,
    // k_DXT1_AS_16_16_16_16
    K_DXT1,
    // k_DXT2_3_AS_16_16_16_16
    K_DXT2_3,
    // k_DXT4_5_AS_16_16_16_16
    K_DXT4_5,
    // k_2_10_10_10_AS_16_16_16_16
    converted(DxgiFormat::R10G10B10A2Unorm, LoadMode::Load32bpb, Swizzle::RGBA),
    // k_10_11_11_AS_16_16_16_16
    K_10_11_11,
    // k_11_11_10_AS_16_16_16_16
    K_11_11_10,
    // k_32_32_32_FLOAT
    unsupported(Swizzle::RGBB),
    // k_DXT3A
    converted(DxgiFormat::R8Unorm, LoadMode::Dxt3A, Swizzle::RRRR),
    // k_DXT5A
    compressed(
        DxgiFormat::Bc4Unorm,
        LoadMode::Load64bpb,
        DxgiFormat::R8Unorm,
        LoadMode::Dxt5AToR8,
        Swizzle::RRRR,
    ),
    // k_CTX1
    converted(DxgiFormat::R8G8Unorm, LoadMode::Ctx1, Swizzle::RGGG),
    // k_DXT3A_AS_1_1_1_1
    converted(DxgiFormat::B4G4R4A4Unorm, LoadMode::Dxt3AAs1111ToBgra4, Swizzle::RGBA),
    // k_8_8_8_8_GAMMA_EDRAM
    unsupported(Swizzle::RGBA),
    // k_2_10_10_10_FLOAT_EDRAM
    unsupported(Swizzle::RGBA),
];

pub fn host_format(format: TextureFormat) -> &'static HostFormatEntry {
    &HOST_FORMATS[format.index()]
}

/// Whether a block-compressed texture of this size must be decompressed
/// because the host can't sample a partial block.
pub fn is_decompression_needed(format: TextureFormat, width: u32, height: u32) -> bool {
    if host_format(format).uncompressed == DxgiFormat::Unknown {
        return false;
    }
    let info = format.info();
    width & (info.block_width - 1) != 0 || height & (info.block_height - 1) != 0
}

/// Load mode for `key`, `None` if the format can't be loaded on the host.
pub fn load_mode(key: &TextureKey) -> Option<LoadMode> {
    let entry = host_format(key.format);
    if key.signed_separate {
        return entry.load_mode_snorm;
    }
    if is_decompression_needed(key.format, key.width, key.height) {
        return entry.decompress_mode;
    }
    entry.load_mode
}

/// Whether the signed view of this format needs a resource of its own.
pub fn is_signed_version_separate(format: TextureFormat) -> bool {
    let entry = host_format(format);
    entry.load_mode_snorm.is_some() && entry.load_mode_snorm != entry.load_mode
}

/// Format of the host resource. Independent of signedness since resources
/// are typeless where both views exist.
pub fn resource_format(format: TextureFormat, width: u32, height: u32) -> DxgiFormat {
    let entry = host_format(format);
    if is_decompression_needed(format, width, height) {
        entry.uncompressed
    } else {
        entry.resource
    }
}

pub fn unorm_format(format: TextureFormat, width: u32, height: u32) -> DxgiFormat {
    let entry = host_format(format);
    if is_decompression_needed(format, width, height) {
        entry.uncompressed
    } else {
        entry.unorm
    }
}

/// Block size the host copy footprint is aligned to: the guest block if the
/// host stores the same blocks, single texels otherwise.
pub fn host_block_size(format: TextureFormat, width: u32, height: u32) -> (u32, u32) {
    if host_format(format).block_aligned && !is_decompression_needed(format, width, height) {
        let info = format.info();
        (info.block_width, info.block_height)
    } else {
        (1, 1)
    }
}
