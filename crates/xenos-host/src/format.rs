/// Host pixel formats, numbered like `DXGI_FORMAT`.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum DxgiFormat {
    #[default]
    Unknown = 0,
    R32G32B32A32Float = 2,
    R32G32B32A32Uint = 3,
    R16G16B16A16Typeless = 9,
    R16G16B16A16Float = 10,
    R16G16B16A16Unorm = 11,
    R16G16B16A16Snorm = 13,
    R32G32Float = 16,
    R32G32Uint = 17,
    R10G10B10A2Typeless = 23,
    R10G10B10A2Unorm = 24,
    R8G8B8A8Typeless = 27,
    R8G8B8A8Unorm = 28,
    R8G8B8A8Snorm = 31,
    R16G16Typeless = 33,
    R16G16Float = 34,
    R16G16Unorm = 35,
    R16G16Snorm = 37,
    R32Float = 41,
    R32Uint = 42,
    R8G8Typeless = 48,
    R8G8Unorm = 49,
    R8G8Snorm = 51,
    R16Typeless = 53,
    R16Float = 54,
    R16Unorm = 56,
    R16Uint = 57,
    R16Snorm = 58,
    R8Typeless = 60,
    R8Unorm = 61,
    R8Uint = 62,
    R8Snorm = 63,
    R8G8B8G8Unorm = 68,
    G8R8G8B8Unorm = 69,
    Bc1Unorm = 71,
    Bc2Unorm = 74,
    Bc3Unorm = 77,
    Bc4Unorm = 80,
    Bc5Unorm = 83,
    B5G6R5Unorm = 85,
    B5G5R5A1Unorm = 86,
    B4G4R4A4Unorm = 115,
}

/// Block geometry of a host format, as used for copy footprints and
/// allocation sizes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    pub width: u32,
    pub height: u32,
    pub bytes: u32,
}

impl DxgiFormat {
    /// Unsigned integer format with `1 << log2` bytes per element, for typed
    /// buffer views of raw data. `log2` must be at most 4.
    pub fn uint_pow2(log2: u32) -> Self {
        match log2 {
            0 => Self::R8Uint,
            1 => Self::R16Uint,
            2 => Self::R32Uint,
            3 => Self::R32G32Uint,
            _ => {
                debug_assert!(log2 == 4, "no uint format with 2^{log2} bytes");
                Self::R32G32B32A32Uint
            }
        }
    }

    pub fn block_info(self) -> BlockInfo {
        let (width, height, bytes) = match self {
            Self::Unknown => (1, 1, 0),
            Self::R8Typeless | Self::R8Unorm | Self::R8Uint | Self::R8Snorm => (1, 1, 1),
            Self::R8G8Typeless
            | Self::R8G8Unorm
            | Self::R8G8Snorm
            | Self::R16Typeless
            | Self::R16Float
            | Self::R16Unorm
            | Self::R16Uint
            | Self::R16Snorm
            | Self::B5G6R5Unorm
            | Self::B5G5R5A1Unorm
            | Self::B4G4R4A4Unorm => (1, 1, 2),
            Self::R10G10B10A2Typeless
            | Self::R10G10B10A2Unorm
            | Self::R8G8B8A8Typeless
            | Self::R8G8B8A8Unorm
            | Self::R8G8B8A8Snorm
            | Self::R16G16Typeless
            | Self::R16G16Float
            | Self::R16G16Unorm
            | Self::R16G16Snorm
            | Self::R32Float
            | Self::R32Uint => (1, 1, 4),
            // Packed YUV: one 32-bit element holds two horizontal texels.
            Self::R8G8B8G8Unorm | Self::G8R8G8B8Unorm => (2, 1, 4),
            Self::R16G16B16A16Typeless
            | Self::R16G16B16A16Float
            | Self::R16G16B16A16Unorm
            | Self::R16G16B16A16Snorm
            | Self::R32G32Float
            | Self::R32G32Uint => (1, 1, 8),
            Self::R32G32B32A32Float | Self::R32G32B32A32Uint => (1, 1, 16),
            Self::Bc1Unorm | Self::Bc4Unorm => (4, 4, 8),
            Self::Bc2Unorm | Self::Bc3Unorm | Self::Bc5Unorm => (4, 4, 16),
        };
        BlockInfo {
            width,
            height,
            bytes,
        }
    }
}
