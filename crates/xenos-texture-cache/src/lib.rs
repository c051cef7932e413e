//! `xenos-texture-cache` keeps host copies of Xenos guest textures.
//!
//! Currently this crate provides:
//! - The guest-to-host format table and the load compute mode of every format
//!   (see [`host_format`] and [`load_mode`]).
//! - Guest memory layout and host upload footprint calculation (see
//!   [`layout`] and [`footprint`]).
//! - Texture loading through compute dispatches into a scratch buffer (see
//!   [`loader::TextureLoader`]).
//! - The sparse, resolution-scaled copy of guest memory resolves write into
//!   (see [`scaled_resolve::ScaledResolveSpace`]).
//! - The cache itself: textures by key with LRU eviction, fetch constant
//!   bindings, views and samplers (see [`TextureCache`]).

mod cache;
mod error;

pub mod bindings;
pub mod config;
pub mod descriptors;
pub mod footprint;
pub mod host_format;
pub mod layout;
pub mod load_mode;
pub mod loader;
pub mod sampler;
pub mod scaled_resolve;
pub mod stats;
pub mod texture;

pub use bindings::{
    FetchConstantSource, GuestTextureFetch, ShaderSamplerBinding, ShaderTextureBinding,
    TextureBinding, TextureSrvKey,
};
pub use cache::{SwapTexture, TextureCache, UnsupportedFeatures};
pub use config::{DrawResolutionScale, TextureCacheConfig, TextureLimits};
pub use error::{DescriptorError, LoadError, ScaledResolveError, TextureCacheError};
pub use load_mode::LoadMode;
pub use sampler::SamplerParameters;
pub use stats::{TextureCacheStats, TextureCacheStatsSnapshot};
pub use texture::Texture;
