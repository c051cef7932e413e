use xenos_host::HostCapabilities;
use xenos_types::{Swizzle, TextureFormat, SHARED_MEMORY_SIZE};

use crate::host_format::host_format;

/// Bindful view pages hold this many descriptors each.
pub const DEFAULT_DESCRIPTOR_PAGE_SIZE: u32 = 65536;

const MIB: u64 = 1024 * 1024;

/// Integer factor the renderer multiplies guest render target sizes by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawResolutionScale {
    pub x: u32,
    pub y: u32,
}

impl Default for DrawResolutionScale {
    fn default() -> Self {
        Self { x: 1, y: 1 }
    }
}

impl DrawResolutionScale {
    pub const MAX_PER_AXIS: u32 = 3;

    pub fn new(x: u32, y: u32) -> Self {
        Self {
            x: x.clamp(1, Self::MAX_PER_AXIS),
            y: y.clamp(1, Self::MAX_PER_AXIS),
        }
    }

    pub fn area(self) -> u32 {
        self.x * self.y
    }

    pub fn is_scaled(self) -> bool {
        self.x > 1 || self.y > 1
    }

    /// Largest scale not above `self` whose scaled copy of guest memory fits
    /// into one host resource's virtual address range.
    ///
    /// Returns the clamped scale and whether it's unchanged. Without tiled
    /// resources only 1x1 is possible. When both axes have to shrink, the
    /// larger one (X on a tie) goes first.
    pub fn clamp_to_max_supported(self, capabilities: &HostCapabilities) -> (Self, bool) {
        if !capabilities.tiled_resources {
            let unscaled = Self::default();
            return (unscaled, self == unscaled);
        }
        let mut scale = self;
        let mut unchanged = true;
        while scale.x > 1 || scale.y > 1 {
            let size = u64::from(SHARED_MEMORY_SIZE) * u64::from(scale.area());
            let bits = 64 - (size - 1).leading_zeros();
            if bits <= capabilities.virtual_address_bits_per_resource {
                break;
            }
            unchanged = false;
            if scale.x >= scale.y {
                scale.x -= 1;
            } else {
                scale.y -= 1;
            }
        }
        (scale, unchanged)
    }
}

/// Memory limits the texture LRU evicts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureLimits {
    /// Above this, textures unused for `soft_lifetime_frames` are evicted.
    pub soft_max_bytes: u64,
    pub soft_lifetime_frames: u64,
    /// Above this, the least recently used textures are evicted regardless of age.
    pub hard_max_bytes: u64,
}

impl Default for TextureLimits {
    fn default() -> Self {
        Self {
            soft_max_bytes: 384 * MIB,
            soft_lifetime_frames: 1800,
            hard_max_bytes: 768 * MIB,
        }
    }
}

/// Texture cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureCacheConfig {
    /// Requested resolution scale. Clamped to what the host supports when the
    /// cache is created.
    pub draw_resolution_scale: DrawResolutionScale,
    /// Views live in the global bindless heap instead of per-cache pages.
    pub bindless: bool,
    /// Descriptors per bindful view page.
    pub descriptor_page_size: u32,
    /// Host swizzle of `k_Cr_Y1_Cb_Y0_REP`. Defaults to BGRR, not verified
    /// against hardware.
    pub cr_y1_cb_y0_swizzle: Swizzle,
    /// Host swizzle of `k_Y1_Cr_Y0_Cb_REP`. Defaults to BGRR, not verified
    /// against hardware.
    pub y1_cr_y0_cb_swizzle: Swizzle,
    pub limits: TextureLimits,
}

impl Default for TextureCacheConfig {
    fn default() -> Self {
        Self {
            draw_resolution_scale: DrawResolutionScale::default(),
            bindless: false,
            descriptor_page_size: DEFAULT_DESCRIPTOR_PAGE_SIZE,
            cr_y1_cb_y0_swizzle: Swizzle::BGRR,
            y1_cr_y0_cb_swizzle: Swizzle::BGRR,
            limits: TextureLimits::default(),
        }
    }
}

impl TextureCacheConfig {
    /// Swizzle from host texture channels to guest channels for `format`.
    pub fn host_swizzle(&self, format: TextureFormat) -> Swizzle {
        match format {
            TextureFormat::CrY1CbY0Rep => self.cr_y1_cb_y0_swizzle,
            TextureFormat::Y1CrY0CbRep => self.y1_cr_y0_cb_swizzle,
            _ => host_format(format).swizzle,
        }
    }
}
