//! Texture views, in the global bindless heap or in pages owned by the cache.

use tracing::{debug, warn};
use xenos_host::{
    Backend, CommandSubmitter, CpuDescriptor, DxgiFormat, HostDevice, TextureViewDesc,
    ViewDimension, ViewHeapHandle, COMPONENT_MAPPING_ALWAYS_SET_BIT,
};
use xenos_types::{DataDimension, Swizzle, TextureKey};

use crate::error::DescriptorError;
use crate::host_format::{host_format, is_signed_version_separate, unorm_format};
use crate::texture::{Texture, ViewKey};

/// Where texture views are allocated.
#[derive(Debug)]
pub enum TextureViewStorage {
    /// Persistent slots of the host's bindless heap.
    Bindless,
    /// Non-shader-visible pages of `page_size` views, copied into per-draw
    /// tables. Pages are never freed before the cache is cleared.
    Bindful {
        page_size: u32,
        pages: Vec<ViewHeapHandle>,
        allocated: u32,
        free: Vec<u32>,
    },
}

impl TextureViewStorage {
    pub fn bindful(page_size: u32) -> Self {
        Self::Bindful {
            page_size,
            pages: Vec::new(),
            allocated: 0,
            free: Vec::new(),
        }
    }

    pub fn is_bindless(&self) -> bool {
        matches!(self, Self::Bindless)
    }

    pub fn allocate<B: HostDevice + CommandSubmitter + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> Result<u32, DescriptorError> {
        match self {
            Self::Bindless => backend
                .request_persistent_bindless_view()
                .ok_or(DescriptorError::BindlessExhausted),
            Self::Bindful {
                page_size,
                pages,
                allocated,
                free,
            } => {
                if let Some(index) = free.pop() {
                    return Ok(index);
                }
                let pages_needed = (*allocated + *page_size) / *page_size;
                while (pages.len() as u32) < pages_needed {
                    let heap = backend.create_view_heap(*page_size, false)?;
                    debug!(page = pages.len(), "created texture view page");
                    pages.push(heap);
                }
                let index = *allocated;
                *allocated += 1;
                Ok(index)
            }
        }
    }

    pub fn cpu_handle<C: CommandSubmitter + ?Sized>(&self, commands: &C, index: u32) -> CpuDescriptor {
        match self {
            Self::Bindless => commands.bindless_view_handle_pair(index).cpu,
            Self::Bindful {
                page_size, pages, ..
            } => CpuDescriptor {
                heap: pages[(index / page_size) as usize],
                index: index % page_size,
            },
        }
    }

    pub fn release<C: CommandSubmitter + ?Sized>(&mut self, commands: &mut C, index: u32) {
        match self {
            Self::Bindless => commands.release_bindless_view_immediately(index),
            Self::Bindful { free, .. } => free.push(index),
        }
    }

    pub fn page_count(&self) -> usize {
        match self {
            Self::Bindless => 0,
            Self::Bindful { pages, .. } => pages.len(),
        }
    }

    /// Destroys all bindful pages. Views must have been released first.
    pub fn clear<D: HostDevice + ?Sized>(&mut self, device: &mut D) {
        if let Self::Bindful {
            pages,
            allocated,
            free,
            ..
        } = self
        {
            for page in pages.drain(..) {
                device.destroy_view_heap(page);
            }
            *allocated = 0;
            free.clear();
        }
    }

    /// Index of the view of `texture` with `signed` and `swizzle`, creating it
    /// if the texture doesn't have one yet.
    pub fn find_or_create_view<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        texture: &mut Texture,
        signed: bool,
        swizzle: Swizzle,
    ) -> Result<(u32, bool), DescriptorError> {
        let view_key = ViewKey { signed, swizzle };
        if let Some(index) = texture.view(view_key) {
            return Ok((index, false));
        }
        let key = *texture.key();
        if is_signed_version_separate(key.format) && key.signed_separate != signed {
            return Err(DescriptorError::SignednessMismatch(key.format));
        }
        let desc = view_desc(&key, signed, swizzle)?;
        let index = self.allocate(backend)?;
        let dest = self.cpu_handle(backend, index);
        backend.create_texture_srv(Some(texture.resource()), &desc, dest);
        texture.insert_view(view_key, index);
        debug!(format = %key.format, signed, index, "created texture view");
        Ok((index, true))
    }

    /// Releases every view of `texture`.
    pub fn release_views<C: CommandSubmitter + ?Sized>(&mut self, commands: &mut C, texture: &mut Texture) {
        for index in texture.take_views() {
            self.release(commands, index);
        }
    }
}

/// Shader resource view description of `key`.
pub fn view_desc(
    key: &TextureKey,
    signed: bool,
    swizzle: Swizzle,
) -> Result<TextureViewDesc, DescriptorError> {
    let format = if signed {
        host_format(key.format).snorm
    } else {
        unorm_format(key.format, key.width, key.height)
    };
    if format == DxgiFormat::Unknown {
        warn!(format = %key.format, signed, "texture format has no host view format");
        return Err(DescriptorError::UnsupportedFormat {
            format: key.format,
            signed,
        });
    }
    let mip_levels = key.level_count();
    let dimension = match key.dimension {
        DataDimension::Tex1D | DataDimension::Tex2DOrStacked => ViewDimension::Texture2DArray {
            mip_levels,
            array_size: key.depth_or_array_size,
        },
        DataDimension::Tex3D => ViewDimension::Texture3D { mip_levels },
        DataDimension::Cube => ViewDimension::TextureCube { mip_levels },
    };
    Ok(TextureViewDesc {
        format,
        dimension,
        component_mapping: u32::from(swizzle.bits()) | COMPONENT_MAPPING_ALWAYS_SET_BIT,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use xenos_host::testing::{BackendEvent, RecordingBackend, BINDLESS_VIEW_HEAP};
    use xenos_host::ResourceHandle;
    use xenos_types::TextureFormat;

    fn texture(format: TextureFormat) -> Texture {
        let key = TextureKey::new(format, DataDimension::Tex2DOrStacked, 64, 64, 2);
        Texture::new(key, ResourceHandle(100), 0)
    }

    #[test]
    fn same_view_is_reused() {
        let mut backend = RecordingBackend::new();
        let mut storage = TextureViewStorage::bindful(4);
        let mut texture = texture(TextureFormat::Fmt8_8_8_8);
        let first = storage
            .find_or_create_view(&mut backend, &mut texture, false, Swizzle::RGBA)
            .unwrap();
        let second = storage
            .find_or_create_view(&mut backend, &mut texture, false, Swizzle::RGBA)
            .unwrap();
        assert_eq!(first, (0, true));
        assert_eq!(second, (0, false));
        let other = storage
            .find_or_create_view(&mut backend, &mut texture, true, Swizzle::RGBA)
            .unwrap();
        assert_eq!(other, (1, true));
        assert_eq!(
            backend.count(|event| matches!(event, BackendEvent::CreateTextureSrv { .. })),
            2
        );
    }

    #[test]
    fn released_slots_are_reused_before_growing() {
        let mut backend = RecordingBackend::new();
        let mut storage = TextureViewStorage::bindful(2);
        let mut a = texture(TextureFormat::Fmt8_8_8_8);
        let mut b = texture(TextureFormat::Fmt8);
        storage
            .find_or_create_view(&mut backend, &mut a, false, Swizzle::RGBA)
            .unwrap();
        storage
            .find_or_create_view(&mut backend, &mut a, false, Swizzle::RRRR)
            .unwrap();
        assert_eq!(storage.page_count(), 1);
        storage.release_views(&mut backend, &mut a);
        let (index, _) = storage
            .find_or_create_view(&mut backend, &mut b, false, Swizzle::RGBA)
            .unwrap();
        assert!(index < 2);
        storage
            .find_or_create_view(&mut backend, &mut b, false, Swizzle::RRRR)
            .unwrap();
        assert_eq!(storage.page_count(), 1);
        storage
            .find_or_create_view(&mut backend, &mut b, false, Swizzle::RGGG)
            .unwrap();
        assert_eq!(storage.page_count(), 2);
        let pages: Vec<_> = backend
            .events()
            .iter()
            .filter_map(|event| match event {
                BackendEvent::CreateViewHeap { heap, capacity } => Some((*heap, *capacity)),
                _ => None,
            })
            .collect();
        assert_eq!(pages.len(), 2);
        assert_eq!(storage.cpu_handle(&backend, 2), CpuDescriptor { heap: pages[1].0, index: 0 });
        storage.clear(&mut backend);
        assert_eq!(
            backend.count(|event| matches!(event, BackendEvent::DestroyViewHeap(_))),
            2
        );
    }

    #[test]
    fn bindless_slots_go_back_immediately() {
        let mut backend = RecordingBackend::new();
        let mut storage = TextureViewStorage::Bindless;
        let mut texture = texture(TextureFormat::Fmt8_8_8_8);
        let (index, _) = storage
            .find_or_create_view(&mut backend, &mut texture, false, Swizzle::RGBA)
            .unwrap();
        assert_eq!(storage.cpu_handle(&backend, index).heap, BINDLESS_VIEW_HEAP);
        storage.release_views(&mut backend, &mut texture);
        assert!(backend
            .events()
            .contains(&BackendEvent::ReleaseBindlessView(index)));

        backend.bindless_capacity = 0;
        assert_eq!(
            storage.find_or_create_view(&mut backend, &mut texture, false, Swizzle::RGBA),
            Ok((index, true))
        );
        assert_eq!(
            storage.find_or_create_view(&mut backend, &mut texture, false, Swizzle::RRRR),
            Err(DescriptorError::BindlessExhausted)
        );
    }

    #[test]
    fn separate_signed_formats_need_the_signed_twin() {
        let mut backend = RecordingBackend::new();
        let mut storage = TextureViewStorage::bindful(16);
        let mut unsigned = texture(TextureFormat::Fmt10_11_11);
        assert_eq!(
            storage.find_or_create_view(&mut backend, &mut unsigned, true, Swizzle::RGBA),
            Err(DescriptorError::SignednessMismatch(TextureFormat::Fmt10_11_11))
        );
        let key = unsigned.key().signed_twin();
        let mut signed = Texture::new(key, ResourceHandle(101), 0);
        let (index, created) = storage
            .find_or_create_view(&mut backend, &mut signed, true, Swizzle::RGBA)
            .unwrap();
        assert!(created);
        assert_eq!(index, 0);
        let desc = backend.events().iter().find_map(|event| match event {
            BackendEvent::CreateTextureSrv { desc, .. } => Some(*desc),
            _ => None,
        });
        assert_eq!(desc.map(|desc| desc.format), Some(DxgiFormat::R16G16B16A16Snorm));
    }

    #[test]
    fn view_dimensions_and_mapping() {
        let mut cube = TextureKey::new(TextureFormat::Fmt8_8_8_8, DataDimension::Cube, 32, 32, 6);
        cube.mip_max_level = 5;
        let desc = view_desc(&cube, false, Swizzle::BGRR).unwrap();
        assert_eq!(desc.dimension, ViewDimension::TextureCube { mip_levels: 6 });
        assert_eq!(
            desc.component_mapping,
            u32::from(Swizzle::BGRR.bits()) | (1 << 12)
        );
        let stacked = TextureKey::new(TextureFormat::Fmt8, DataDimension::Tex1D, 32, 1, 3);
        assert_eq!(
            view_desc(&stacked, false, Swizzle::RGBA).unwrap().dimension,
            ViewDimension::Texture2DArray {
                mip_levels: 1,
                array_size: 3
            }
        );
        let no_snorm = TextureKey::new(TextureFormat::Dxt1, DataDimension::Tex2DOrStacked, 32, 32, 1);
        assert_eq!(
            view_desc(&no_snorm, true, Swizzle::RGBA),
            Err(DescriptorError::UnsupportedFormat {
                format: TextureFormat::Dxt1,
                signed: true
            })
        );
    }
}
