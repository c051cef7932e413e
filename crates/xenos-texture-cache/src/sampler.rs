use xenos_host::{AddressMode, SamplerDesc, SamplerFilter};
use xenos_types::{AnisoFilter, BorderColor, ClampMode, FetchSamplerState, TextureFilter};

use crate::bindings::ShaderSamplerBinding;

/// Host sampler state for one shader sampler binding. Equal parameters give
/// equal host samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerParameters {
    pub clamp_x: ClampMode,
    pub clamp_y: ClampMode,
    pub clamp_z: ClampMode,
    pub border_color: BorderColor,
    pub mag_linear: bool,
    pub min_linear: bool,
    pub mip_linear: bool,
    pub aniso_filter: AnisoFilter,
    pub mip_min_level: u32,
}

fn resolve_filter(binding: TextureFilter, fetch: TextureFilter) -> TextureFilter {
    if binding == TextureFilter::UseFetchConst {
        fetch
    } else {
        binding
    }
}

impl SamplerParameters {
    /// Combines the fetch constant with the overrides of the shader's fetch
    /// instructions. Anisotropic filtering is capped at 16:1 and implies
    /// linear filtering everywhere.
    pub fn new(fetch: &FetchSamplerState, binding: &ShaderSamplerBinding) -> Self {
        let aniso_filter = if binding.aniso_filter == AnisoFilter::UseFetchConst {
            fetch.aniso_filter
        } else {
            binding.aniso_filter
        }
        .min(AnisoFilter::Max16To1);
        let mip_filter = resolve_filter(binding.mip_filter, fetch.mip_filter);
        let (mag_linear, min_linear, mip_linear) = if aniso_filter != AnisoFilter::Disabled {
            (true, true, true)
        } else {
            (
                resolve_filter(binding.mag_filter, fetch.mag_filter) == TextureFilter::Linear,
                resolve_filter(binding.min_filter, fetch.min_filter) == TextureFilter::Linear,
                mip_filter == TextureFilter::Linear,
            )
        };
        let mip_min_level = if mip_filter == TextureFilter::BaseMap {
            0
        } else {
            fetch.mip_min_level.min(fetch.mip_max_level)
        };
        Self {
            clamp_x: fetch.clamp_x,
            clamp_y: fetch.clamp_y,
            clamp_z: fetch.clamp_z,
            border_color: fetch.border_color,
            mag_linear,
            min_linear,
            mip_linear,
            aniso_filter,
            mip_min_level,
        }
    }

    pub fn host_desc(&self) -> SamplerDesc {
        let (filter, max_anisotropy) = if self.aniso_filter != AnisoFilter::Disabled {
            (
                SamplerFilter::Anisotropic,
                1 << (self.aniso_filter as u32 - 1),
            )
        } else {
            (
                SamplerFilter::Basic {
                    mag_linear: self.mag_linear,
                    min_linear: self.min_linear,
                    mip_linear: self.mip_linear,
                },
                1,
            )
        };
        let border_color = if self.border_color == BorderColor::AgbrWhite {
            [1.0; 4]
        } else {
            [0.0; 4]
        };
        SamplerDesc {
            filter,
            address_u: address_mode(self.clamp_x),
            address_v: address_mode(self.clamp_y),
            address_w: address_mode(self.clamp_z),
            mip_lod_bias: 0.0,
            max_anisotropy,
            border_color,
            min_lod: self.mip_min_level as f32,
            max_lod: f32::MAX,
        }
    }
}

fn address_mode(mode: ClampMode) -> AddressMode {
    match mode {
        ClampMode::Repeat => AddressMode::Wrap,
        ClampMode::MirroredRepeat => AddressMode::Mirror,
        ClampMode::ClampToEdge | ClampMode::ClampToHalfway => AddressMode::Clamp,
        ClampMode::MirrorClampToEdge
        | ClampMode::MirrorClampToHalfway
        | ClampMode::MirrorClampToBorder => AddressMode::MirrorOnce,
        ClampMode::ClampToBorder => AddressMode::Border,
    }
}
