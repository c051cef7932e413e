use xenos_host::HostError;
use xenos_types::TextureFormat;

use crate::load_mode::LoadMode;

/// Failure to make a range of the resolution-scaled address space usable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScaledResolveError {
    #[error("scaled resolve range is empty")]
    ZeroLength,

    #[error("scaled resolve range {start:#x}+{length:#x} is outside guest memory")]
    OutOfBounds { start: u32, length: u32 },

    #[error("no single buffer covers scaled resolve range {start:#x}+{length:#x}")]
    NoCoveringBuffer { start: u32, length: u32 },

    #[error("scaled resolve buffer {index} has not been created")]
    BufferMissing { index: usize },

    #[error("no scaled resolve range is current")]
    NoCurrentRange,

    #[error("resolution scaling is not enabled")]
    NotScaled,

    #[error(transparent)]
    Host(#[from] HostError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("texture format {0} can't be loaded on the host")]
    UnsupportedFormat(TextureFormat),

    #[error("load pipeline for {0:?} is unavailable")]
    PipelineUnavailable(LoadMode),

    #[error(transparent)]
    ScaledResolve(#[from] ScaledResolveError),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Failure to create a texture view. Bindings fall back to null views.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("signed view of {0} requested from the unsigned resource of a separate-signed format")]
    SignednessMismatch(TextureFormat),

    #[error("texture format {format} has no host view format (signed: {signed})")]
    UnsupportedFormat { format: TextureFormat, signed: bool },

    #[error("no free bindless view slots")]
    BindlessExhausted,

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Failure to create the texture cache.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextureCacheError {
    #[error("failed to create texture load pipeline {program}")]
    Pipeline {
        program: &'static str,
        #[source]
        source: HostError,
    },

    #[error("failed to create the null texture view heap")]
    NullViewHeap(#[source] HostError),

    #[error("resolution scaling requires tiled resources")]
    TiledResourcesRequired,

    #[error(transparent)]
    Host(#[from] HostError),
}
