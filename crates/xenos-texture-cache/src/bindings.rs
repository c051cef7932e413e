//! Guest texture fetch constants as seen by the cache, and what shaders bind.

use xenos_types::{
    AnisoFilter, DataDimension, FetchOpDimension, FetchSamplerState, Swizzle, SwizzledSigns,
    TextureFilter, TextureKey, TextureSign,
};

/// A texture fetch constant decoded by the register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuestTextureFetch {
    /// `None` if the fetch constant doesn't describe a loadable texture.
    pub key: Option<TextureKey>,
    /// Guest swizzle from texture channels to shader channels.
    pub swizzle: Swizzle,
    pub signs: [TextureSign; 4],
    pub sampler: FetchSamplerState,
}

/// Source of the guest texture fetch constants.
pub trait FetchConstantSource {
    /// Decodes fetch constant `index`, `None` if it isn't a texture fetch constant.
    fn fetch(&self, index: u32) -> Option<GuestTextureFetch>;
}

impl<F> FetchConstantSource for F
where
    F: Fn(u32) -> Option<GuestTextureFetch>,
{
    fn fetch(&self, index: u32) -> Option<GuestTextureFetch> {
        self(index)
    }
}

/// Texture fetch instruction of a shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderTextureBinding {
    pub fetch_constant: u32,
    pub dimension: FetchOpDimension,
    pub is_signed: bool,
}

/// Sampler used by a shader, with the filter overrides of its fetch instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderSamplerBinding {
    pub fetch_constant: u32,
    pub mag_filter: TextureFilter,
    pub min_filter: TextureFilter,
    pub mip_filter: TextureFilter,
    pub aniso_filter: AnisoFilter,
}

/// Cached state of one fetch constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureBinding {
    pub key: Option<TextureKey>,
    /// Guest swizzle composed with the host format's swizzle.
    pub host_swizzle: Swizzle,
    pub swizzled_signs: SwizzledSigns,
    /// Unsigned texture, or the only one when signed views share the resource.
    pub texture: Option<TextureKey>,
    /// Texture with the separately loaded signed data.
    pub texture_signed: Option<TextureKey>,
    pub view_index: Option<u32>,
    pub view_index_signed: Option<u32>,
}

impl TextureBinding {
    pub fn textures(&self) -> impl Iterator<Item = TextureKey> {
        self.texture.into_iter().chain(self.texture_signed)
    }
}

/// What a binding resolves to for one shader fetch. Equal keys give equal views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureSrvKey {
    pub key: Option<TextureKey>,
    pub host_swizzle: Swizzle,
    pub swizzled_signs: SwizzledSigns,
}

impl From<&TextureBinding> for TextureSrvKey {
    fn from(binding: &TextureBinding) -> Self {
        Self {
            key: binding.key,
            host_swizzle: binding.host_swizzle,
            swizzled_signs: binding.swizzled_signs,
        }
    }
}

/// Whether a fetch with `fetch` dimension can sample data of `data` dimension.
pub fn are_dimensions_compatible(fetch: FetchOpDimension, data: DataDimension) -> bool {
    match fetch {
        FetchOpDimension::Tex1D | FetchOpDimension::Tex2D => {
            matches!(data, DataDimension::Tex1D | DataDimension::Tex2DOrStacked)
        }
        FetchOpDimension::Tex3DOrStacked => data == DataDimension::Tex3D,
        FetchOpDimension::Cube => data == DataDimension::Cube,
    }
}
