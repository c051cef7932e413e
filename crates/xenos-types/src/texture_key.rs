use crate::format::TextureFormat;
use crate::{align_pow2, TEXTURE_TILE_WIDTH_HEIGHT};

/// Dimensionality of the data stored in guest memory.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataDimension {
    Tex1D = 0,
    /// 2D texture or a stack (array) of 2D textures.
    Tex2DOrStacked = 1,
    Tex3D = 2,
    Cube = 3,
}

/// Byte swapping applied to guest texture data when it's read.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Endian {
    #[default]
    None = 0,
    E8in16 = 1,
    E8in32 = 2,
    E16in32 = 3,
}

/// Identity of a host texture, decoded from a guest texture fetch constant.
///
/// Two fetch constants describing the same guest memory with the same layout
/// and format share one host texture, so every field takes part in equality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureKey {
    /// Guest page (4 KB units) of the base level, 0 if the base isn't fetched.
    pub base_page: u32,
    /// Guest page of mip level 1 (or of the packed mip tail), 0 if there are no mips.
    pub mip_page: u32,
    pub dimension: DataDimension,
    pub width: u32,
    pub height: u32,
    /// Depth of 3D textures, array layer count of stacked 2D textures, 6 for cubes.
    pub depth_or_array_size: u32,
    /// Row pitch of the base level in texels.
    pub pitch: u32,
    pub mip_max_level: u32,
    pub tiled: bool,
    pub packed_mips: bool,
    pub format: TextureFormat,
    pub endianness: Endian,
    /// Key of the signed twin of a texture whose signed host format needs a
    /// different load path than the unsigned one.
    pub signed_separate: bool,
    /// Data comes from the resolution-scaled resolve memory instead of shared memory.
    pub scaled_resolve: bool,
}

impl TextureKey {
    /// Single-level tiled texture at guest page 1 with a tile-aligned pitch.
    pub fn new(
        format: TextureFormat,
        dimension: DataDimension,
        width: u32,
        height: u32,
        depth_or_array_size: u32,
    ) -> Self {
        Self {
            base_page: 1,
            mip_page: 0,
            dimension,
            width,
            height,
            depth_or_array_size,
            pitch: align_pow2(width, TEXTURE_TILE_WIDTH_HEIGHT),
            mip_max_level: 0,
            tiled: true,
            packed_mips: false,
            format,
            endianness: Endian::None,
            signed_separate: false,
            scaled_resolve: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth_or_array_size(&self) -> u32 {
        self.depth_or_array_size
    }

    /// Number of mip levels including the base.
    pub fn level_count(&self) -> u32 {
        self.mip_max_level + 1
    }

    /// Array layers of the host resource; 1 for 3D textures.
    pub fn array_size(&self) -> u32 {
        match self.dimension {
            DataDimension::Tex3D => 1,
            _ => self.depth_or_array_size,
        }
    }

    /// Depth of a single host subresource; 1 for everything but 3D.
    pub fn depth(&self) -> u32 {
        match self.dimension {
            DataDimension::Tex3D => self.depth_or_array_size,
            _ => 1,
        }
    }

    pub fn is_3d(&self) -> bool {
        self.dimension == DataDimension::Tex3D
    }

    pub fn base_address(&self) -> u32 {
        self.base_page << crate::TEXTURE_PAGE_SIZE_LOG2
    }

    pub fn mip_address(&self) -> u32 {
        self.mip_page << crate::TEXTURE_PAGE_SIZE_LOG2
    }

    /// The same texture with the signed twin flag set.
    pub fn signed_twin(mut self) -> Self {
        self.signed_separate = true;
        self
    }
}
