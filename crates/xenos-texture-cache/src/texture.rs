use hashbrown::HashMap;
use xenos_host::{
    DxgiFormat, ResourceDimension, ResourceHandle, ResourceState, TextureResourceDesc,
};
use xenos_types::{DataDimension, Swizzle, TextureKey};

use crate::config::DrawResolutionScale;
use crate::host_format::resource_format;
use crate::layout::GuestLayout;

/// Largest width and height of 1D, 2D and cube textures.
pub const MAX_TEXTURE_2D_SIZE: u32 = 16384;
pub const MAX_TEXTURE_2D_ARRAY_SIZE: u32 = 2048;
pub const MAX_TEXTURE_3D_SIZE: u32 = 2048;
/// Whole cubes only.
pub const MAX_TEXTURE_CUBE_ARRAY_SIZE: u32 = 2046;

/// View of a texture with a particular signedness and host swizzle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewKey {
    pub signed: bool,
    pub swizzle: Swizzle,
}

/// Whether the host can create a resource for `key` at all.
pub fn fits_host_limits(key: &TextureKey, scale: DrawResolutionScale) -> bool {
    let (width, height) = scaled_size(key, scale);
    let (max_size, max_depth) = match key.dimension {
        DataDimension::Tex1D | DataDimension::Tex2DOrStacked => {
            (MAX_TEXTURE_2D_SIZE, MAX_TEXTURE_2D_ARRAY_SIZE)
        }
        DataDimension::Tex3D => (MAX_TEXTURE_3D_SIZE, MAX_TEXTURE_3D_SIZE),
        DataDimension::Cube => (MAX_TEXTURE_2D_SIZE, MAX_TEXTURE_CUBE_ARRAY_SIZE),
    };
    width <= max_size && height <= max_size && key.depth_or_array_size <= max_depth
}

fn scaled_size(key: &TextureKey, scale: DrawResolutionScale) -> (u32, u32) {
    if key.scaled_resolve {
        (key.width * scale.x, key.height * scale.y)
    } else {
        (key.width, key.height)
    }
}

/// Host resource description for `key`, `None` if the format has no host
/// resource format.
pub fn resource_desc(key: &TextureKey, scale: DrawResolutionScale) -> Option<TextureResourceDesc> {
    let format = resource_format(key.format, key.width, key.height);
    if format == DxgiFormat::Unknown {
        return None;
    }
    let (width, height) = scaled_size(key, scale);
    Some(TextureResourceDesc {
        dimension: if key.is_3d() {
            ResourceDimension::Texture3D
        } else {
            ResourceDimension::Texture2D
        },
        format,
        width,
        height,
        depth_or_array_size: key.depth_or_array_size,
        mip_levels: key.level_count(),
        initial_state: ResourceState::COPY_DEST,
    })
}

/// Host copy of one guest texture.
#[derive(Debug)]
pub struct Texture {
    key: TextureKey,
    resource: ResourceHandle,
    state: ResourceState,
    guest_layout: GuestLayout,
    host_memory_usage: u64,
    base_resident: bool,
    mips_resident: bool,
    last_used_submission: u64,
    last_used_frame: u64,
    views: HashMap<ViewKey, u32>,
}

impl Texture {
    pub fn new(key: TextureKey, resource: ResourceHandle, host_memory_usage: u64) -> Self {
        Self {
            guest_layout: GuestLayout::new(&key),
            key,
            resource,
            state: ResourceState::COPY_DEST,
            host_memory_usage,
            base_resident: false,
            mips_resident: false,
            last_used_submission: 0,
            last_used_frame: 0,
            views: HashMap::new(),
        }
    }

    pub fn key(&self) -> &TextureKey {
        &self.key
    }

    pub fn resource(&self) -> ResourceHandle {
        self.resource
    }

    pub fn guest_layout(&self) -> &GuestLayout {
        &self.guest_layout
    }

    pub fn host_memory_usage(&self) -> u64 {
        self.host_memory_usage
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// Records the new state and returns the previous one for the barrier.
    pub fn set_state(&mut self, state: ResourceState) -> ResourceState {
        std::mem::replace(&mut self.state, state)
    }

    pub fn is_base_resident(&self) -> bool {
        self.base_resident
    }

    pub fn is_mips_resident(&self) -> bool {
        self.mips_resident
    }

    /// Base data needs loading: it exists in guest memory and isn't loaded.
    pub fn is_base_outdated(&self) -> bool {
        !self.base_resident && self.key.base_page != 0
    }

    pub fn is_mips_outdated(&self) -> bool {
        !self.mips_resident && self.key.mip_max_level != 0 && self.key.mip_page != 0
    }

    pub fn set_resident(&mut self, base: bool, mips: bool) {
        self.base_resident |= base;
        self.mips_resident |= mips;
    }

    pub fn mark_used(&mut self, submission: u64, frame: u64) {
        self.last_used_submission = submission;
        self.last_used_frame = frame;
    }

    pub fn last_used_submission(&self) -> u64 {
        self.last_used_submission
    }

    pub fn last_used_frame(&self) -> u64 {
        self.last_used_frame
    }

    /// Guest byte ranges the texture reads: the base, then the mips.
    pub fn guest_ranges(&self) -> [(u32, u32); 2] {
        [
            (self.key.base_address(), self.guest_layout.base_size()),
            (self.key.mip_address(), self.guest_layout.mips_size()),
        ]
    }

    /// Marks the parts overlapping `[start, start + length)` as not resident.
    /// Returns whether anything changed.
    pub fn invalidate(&mut self, start: u32, length: u32) -> bool {
        let end = u64::from(start) + u64::from(length);
        let overlaps = |(range_start, range_length): (u32, u32)| {
            range_length != 0
                && u64::from(range_start) < end
                && u64::from(start) < u64::from(range_start) + u64::from(range_length)
        };
        let [base, mips] = self.guest_ranges();
        let mut changed = false;
        if self.base_resident && self.key.base_page != 0 && overlaps(base) {
            self.base_resident = false;
            changed = true;
        }
        if self.mips_resident && self.key.mip_page != 0 && overlaps(mips) {
            self.mips_resident = false;
            changed = true;
        }
        changed
    }

    pub fn view(&self, key: ViewKey) -> Option<u32> {
        self.views.get(&key).copied()
    }

    pub fn insert_view(&mut self, key: ViewKey, index: u32) {
        self.views.insert(key, index);
    }

    /// Removes every view, handing back their descriptor indices.
    pub fn take_views(&mut self) -> impl Iterator<Item = u32> + '_ {
        self.views.drain().map(|(_, index)| index)
    }
}
