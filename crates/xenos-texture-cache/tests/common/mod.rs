//! Shared helpers for `xenos-texture-cache` integration tests.

use xenos_host::testing::RecordingBackend;
use xenos_texture_cache::{FetchConstantSource, GuestTextureFetch, TextureCache, TextureCacheConfig};
use xenos_types::{FetchSamplerState, Swizzle, TextureKey, TextureSign};

/// Fetch constant register file of a test.
#[derive(Debug, Default)]
pub struct FetchConstants {
    constants: [Option<GuestTextureFetch>; 32],
}

impl FetchConstants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `index` to an unsigned RGBA fetch of `key`.
    pub fn set(&mut self, index: u32, key: TextureKey) -> &mut GuestTextureFetch {
        self.constants[index as usize].insert(GuestTextureFetch {
            key: Some(key),
            swizzle: Swizzle::RGBA,
            signs: [TextureSign::Unsigned; 4],
            sampler: FetchSamplerState::default(),
        })
    }

    #[allow(dead_code)]
    pub fn clear(&mut self, index: u32) {
        self.constants[index as usize] = None;
    }
}

impl FetchConstantSource for FetchConstants {
    fn fetch(&self, index: u32) -> Option<GuestTextureFetch> {
        self.constants.get(index as usize).copied().flatten()
    }
}

pub fn cache(config: TextureCacheConfig) -> TextureCache<RecordingBackend> {
    TextureCache::new(RecordingBackend::new(), config).expect("texture cache creation")
}
