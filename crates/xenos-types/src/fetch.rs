//! Sampler-related fields of the guest texture fetch constant and of shader
//! fetch instructions.

/// Dimension a shader fetch instruction samples with.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchOpDimension {
    Tex1D = 0,
    Tex2D = 1,
    Tex3DOrStacked = 2,
    Cube = 3,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ClampMode {
    #[default]
    Repeat = 0,
    MirroredRepeat = 1,
    ClampToEdge = 2,
    MirrorClampToEdge = 3,
    ClampToHalfway = 4,
    MirrorClampToHalfway = 5,
    ClampToBorder = 6,
    MirrorClampToBorder = 7,
}

impl ClampMode {
    pub fn from_u32(value: u32) -> Self {
        match value & 0b111 {
            0 => Self::Repeat,
            1 => Self::MirroredRepeat,
            2 => Self::ClampToEdge,
            3 => Self::MirrorClampToEdge,
            4 => Self::ClampToHalfway,
            5 => Self::MirrorClampToHalfway,
            6 => Self::ClampToBorder,
            _ => Self::MirrorClampToBorder,
        }
    }
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum BorderColor {
    #[default]
    AgbrBlack = 0,
    AgbrWhite = 1,
    AcbYcrBlack = 2,
    AcbCrYBlack = 3,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum TextureFilter {
    #[default]
    Point = 0,
    Linear = 1,
    BaseMap = 2,
    UseFetchConst = 3,
}

#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum AnisoFilter {
    #[default]
    Disabled = 0,
    Max1To1 = 1,
    Max2To1 = 2,
    Max4To1 = 3,
    Max8To1 = 4,
    Max16To1 = 5,
    UseFetchConst = 7,
}

/// Sampler state decoded from a texture fetch constant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct FetchSamplerState {
    pub clamp_x: ClampMode,
    pub clamp_y: ClampMode,
    pub clamp_z: ClampMode,
    pub border_color: BorderColor,
    pub mag_filter: TextureFilter,
    pub min_filter: TextureFilter,
    pub mip_filter: TextureFilter,
    pub aniso_filter: AnisoFilter,
    pub mip_min_level: u32,
    pub mip_max_level: u32,
}
