//! The texture cache: guest textures by key, their host copies, the views
//! shaders bind and the resolution-scaled resolve memory.


use bitflags::bitflags;
use lru::LruCache;
use tracing::{debug, error, warn};
use xenos_host::{
    Backend, CpuDescriptor, DxgiFormat, ResourceHandle, ResourceState, SystemBindlessView,
    TextureViewDesc, ViewDimension, ViewHeapHandle, COMPONENT_MAPPING_ALWAYS_SET_BIT,
};
use xenos_types::{
    DataDimension, FetchOpDimension, Swizzle, SwizzledSigns, TextureFormat, TextureKey,
    TEXTURE_FETCH_CONSTANT_COUNT,
};

use crate::bindings::{
    are_dimensions_compatible, FetchConstantSource, ShaderSamplerBinding, ShaderTextureBinding,
    TextureBinding, TextureSrvKey,
};
use crate::config::{DrawResolutionScale, TextureCacheConfig};
use crate::descriptors::TextureViewStorage;
use crate::error::{DescriptorError, LoadError, ScaledResolveError, TextureCacheError};
use crate::host_format::{host_format, is_signed_version_separate, load_mode, unorm_format};
use crate::loader::{LoadPipelines, TextureLoader};
use crate::sampler::SamplerParameters;
use crate::scaled_resolve::ScaledResolveSpace;
use crate::stats::{TextureCacheStats, TextureCacheStatsSnapshot};
use crate::texture::{fits_host_limits, resource_desc, Texture};

bitflags! {
    /// Host support a guest format was missing when a texture used it.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct UnsupportedFeatures: u8 {
        const RESOURCE = 1 << 0;
        const UNORM = 1 << 1;
        const SNORM = 1 << 2;
    }
}

/// Null views in the bindful null view heap, by slot.
const NULL_VIEW_2D_ARRAY: u32 = 0;
const NULL_VIEW_3D: u32 = 1;
const NULL_VIEW_CUBE: u32 = 2;
const NULL_VIEW_COUNT: u32 = 3;

const FETCH_CONSTANT_COUNT: usize = TEXTURE_FETCH_CONSTANT_COUNT as usize;

/// What the presenter needs to draw the front buffer texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapTexture {
    pub resource: ResourceHandle,
    pub view: TextureViewDesc,
    pub format: TextureFormat,
}

/// Host copies of guest textures and the state of the 32 texture fetch
/// constants.
///
/// All methods are called from the thread recording host commands.
pub struct TextureCache<B: Backend> {
    backend: B,
    config: TextureCacheConfig,
    scale: DrawResolutionScale,
    pipelines: LoadPipelines,
    textures: LruCache<TextureKey, Texture>,
    total_host_memory: u64,
    views: TextureViewStorage,
    null_view_heap: Option<ViewHeapHandle>,
    scaled_resolve: Option<ScaledResolveSpace>,
    bindings: [TextureBinding; FETCH_CONSTANT_COUNT],
    /// Bit per fetch constant whose binding reflects the current constant.
    bindings_up_to_date: u32,
    unsupported: [UnsupportedFeatures; TextureFormat::COUNT],
    frame: u64,
    stats: TextureCacheStats,
}

impl<B: Backend> TextureCache<B> {
    pub fn new(mut backend: B, config: TextureCacheConfig) -> Result<Self, TextureCacheError> {
        let capabilities = backend.capabilities();
        let requested = config.draw_resolution_scale;
        if requested.is_scaled() && !capabilities.tiled_resources {
            error!(
                scale_x = requested.x,
                scale_y = requested.y,
                "resolution scaling requires tiled resources"
            );
            return Err(TextureCacheError::TiledResourcesRequired);
        }
        let (scale, unchanged) = requested.clamp_to_max_supported(&capabilities);
        if !unchanged {
            warn!(
                requested_x = requested.x,
                requested_y = requested.y,
                scale_x = scale.x,
                scale_y = scale.y,
                "draw resolution scale clamped to what the host can address"
            );
        }

        let pipelines = LoadPipelines::create(&mut backend, scale.is_scaled()).map_err(|err| {
            error!(%err, "failed to create texture load pipelines");
            err
        })?;

        let views = if config.bindless {
            TextureViewStorage::Bindless
        } else {
            TextureViewStorage::bindful(config.descriptor_page_size)
        };

        let null_view_heap = if config.bindless {
            None
        } else {
            Some(create_null_views(&mut backend)?)
        };

        let scaled_resolve = scale.is_scaled().then(|| ScaledResolveSpace::new(scale));

        debug!(
            scale_x = scale.x,
            scale_y = scale.y,
            bindless = config.bindless,
            "texture cache created"
        );
        Ok(Self {
            backend,
            config,
            scale,
            pipelines,
            textures: LruCache::unbounded(),
            total_host_memory: 0,
            views,
            null_view_heap,
            scaled_resolve,
            bindings: [TextureBinding::default(); FETCH_CONSTANT_COUNT],
            bindings_up_to_date: 0,
            unsupported: [UnsupportedFeatures::empty(); TextureFormat::COUNT],
            frame: 0,
            stats: TextureCacheStats::new(),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &TextureCacheConfig {
        &self.config
    }

    /// Scale after clamping to the host's limits.
    pub fn draw_resolution_scale(&self) -> DrawResolutionScale {
        self.scale
    }

    pub fn is_draw_resolution_scaled(&self) -> bool {
        self.scale.is_scaled()
    }

    pub fn stats(&self) -> TextureCacheStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn total_host_memory_usage(&self) -> u64 {
        self.total_host_memory
    }

    /// Looks up a texture without touching its LRU position.
    pub fn texture(&self, key: &TextureKey) -> Option<&Texture> {
        self.textures.peek(key)
    }

    pub fn binding(&self, fetch_constant: u32) -> Option<&TextureBinding> {
        self.bindings.get(fetch_constant as usize)
    }

    /// Whether textures of `format` can be created and sampled at all.
    pub fn is_format_supported(format: TextureFormat) -> bool {
        host_format(format).resource != DxgiFormat::Unknown
    }

    /// Features `format` missed since the frame began.
    pub fn unsupported_features(&self, format: TextureFormat) -> UnsupportedFeatures {
        self.unsupported[format.index()]
    }

    /// Destroys every texture and releases the bindful view pages.
    pub fn clear_cache(&mut self) {
        self.destroy_all_textures();
        self.views.clear(&mut self.backend);
        debug!("texture cache cleared");
    }

    pub fn begin_frame(&mut self) {
        self.frame += 1;
        self.unsupported = [UnsupportedFeatures::empty(); TextureFormat::COUNT];
        self.evict();
    }

    /// Reports the formats the frame couldn't represent on the host.
    pub fn end_frame(&mut self) {
        let report = self.unsupported_report();
        if !report.is_empty() {
            error!("unsupported texture formats used in the frame:{report}");
        }
        self.unsupported = [UnsupportedFeatures::empty(); TextureFormat::COUNT];
    }

    /// One `\n* <format> <features>` line per format used unsupported this frame.
    fn unsupported_report(&self) -> String {
        TextureFormat::all()
            .filter_map(|format| {
                let features = self.unsupported[format.index()];
                if features.is_empty() {
                    return None;
                }
                let names: String = [
                    (" resource", UnsupportedFeatures::RESOURCE),
                    (" unorm", UnsupportedFeatures::UNORM),
                    (" snorm", UnsupportedFeatures::SNORM),
                ]
                .into_iter()
                .filter(|(_, feature)| features.contains(*feature))
                .map(|(name, _)| name)
                .collect();
                Some(format!("\n* {format}{names}"))
            })
            .collect()
    }

    pub fn begin_submission(&mut self) {
        if let Some(space) = self.scaled_resolve.as_mut() {
            space.begin_submission();
        }
    }

    fn record_unsupported(&mut self, format: TextureFormat, features: UnsupportedFeatures) {
        self.unsupported[format.index()] |= features;
    }

    /// Evicts least recently used textures while over the memory limits.
    fn evict(&mut self) {
        let limits = self.config.limits;
        let completed = self.backend.completed_submission();
        while let Some((_, texture)) = self.textures.peek_lru() {
            let age = self.frame.saturating_sub(texture.last_used_frame());
            let over_hard = self.total_host_memory > limits.hard_max_bytes;
            let over_soft =
                self.total_host_memory > limits.soft_max_bytes && age >= limits.soft_lifetime_frames;
            if !over_hard && !over_soft {
                break;
            }
            if texture.last_used_submission() > completed {
                break;
            }
            let Some((key, texture)) = self.textures.pop_lru() else {
                break;
            };
            debug!(
                format = %key.format,
                width = key.width,
                height = key.height,
                age,
                "evicting texture"
            );
            self.destroy_texture(texture);
            self.stats.inc_textures_evicted();
        }
    }

    fn destroy_texture(&mut self, mut texture: Texture) {
        self.views.release_views(&mut self.backend, &mut texture);
        self.backend.destroy_resource(texture.resource());
        self.total_host_memory = self
            .total_host_memory
            .saturating_sub(texture.host_memory_usage());
        let key = *texture.key();
        for (index, binding) in self.bindings.iter_mut().enumerate() {
            if binding.textures().any(|bound| bound == key) {
                *binding = TextureBinding::default();
                self.bindings_up_to_date &= !(1 << index);
            }
        }
    }

    fn destroy_all_textures(&mut self) {
        while let Some((_, texture)) = self.textures.pop_lru() {
            self.destroy_texture(texture);
        }
        self.bindings = [TextureBinding::default(); FETCH_CONSTANT_COUNT];
        self.bindings_up_to_date = 0;
    }

    /// Marks everything overlapping the guest range as needing a reload.
    /// Returns how many textures were affected.
    pub fn invalidate_range(&mut self, start: u32, length: u32) -> usize {
        let mut invalidated = 0;
        for (_, texture) in self.textures.iter_mut() {
            if texture.invalidate(start, length) {
                invalidated += 1;
            }
        }
        if invalidated != 0 {
            debug!(start, length, invalidated, "textures invalidated");
        }
        invalidated
    }

    /// Whether textures with `key` may be loaded from scaled resolve memory.
    pub fn is_scaled_resolve_supported_for_format(&self, key: &TextureKey) -> bool {
        self.scale.is_scaled()
            && load_mode(key).is_some_and(|mode| mode.info().program_scaled.is_some())
    }

    fn find_or_create_texture(&mut self, key: TextureKey) -> Option<TextureKey> {
        if self.textures.contains(&key) {
            return Some(key);
        }
        if !fits_host_limits(&key, self.scale) {
            warn!(
                format = %key.format,
                width = key.width,
                height = key.height,
                depth_or_array_size = key.depth_or_array_size,
                "texture exceeds host size limits"
            );
            return None;
        }
        let Some(desc) = resource_desc(&key, self.scale) else {
            self.record_unsupported(key.format, UnsupportedFeatures::RESOURCE);
            return None;
        };
        let resource = match self.backend.create_texture(&desc) {
            Ok(resource) => resource,
            Err(err) => {
                warn!(
                    format = %key.format,
                    width = key.width,
                    height = key.height,
                    %err,
                    "failed to create texture"
                );
                return None;
            }
        };
        let host_memory_usage = self.backend.resource_allocation_size(resource);
        self.total_host_memory += host_memory_usage;
        self.textures
            .put(key, Texture::new(key, resource, host_memory_usage));
        self.stats.inc_textures_created();
        debug!(
            format = %key.format,
            dimension = ?key.dimension,
            width = key.width,
            height = key.height,
            depth_or_array_size = key.depth_or_array_size,
            levels = key.level_count(),
            scaled = key.scaled_resolve,
            host_memory_usage,
            "created texture"
        );
        Some(key)
    }

    /// Loads the outdated parts of a texture. Returns whether the base level
    /// is usable afterwards.
    fn load_texture(&mut self, key: &TextureKey) -> bool {
        let Some(texture) = self.textures.peek(key) else {
            return false;
        };
        let load_base = texture.is_base_outdated();
        let load_mips = texture.is_mips_outdated();
        if !load_base && !load_mips {
            return true;
        }
        let [base, mips] = texture.guest_ranges();
        for (needed, (start, length)) in [(load_base, base), (load_mips, mips)] {
            if !needed || length == 0 {
                continue;
            }
            let result: Result<(), LoadError> = if key.scaled_resolve {
                match self.scaled_resolve.as_mut() {
                    Some(space) => space
                        .ensure_committed(&mut self.backend, start, length)
                        .map(|heaps| self.stats.add_scaled_resolve_heaps(heaps as u64))
                        .map_err(LoadError::from),
                    None => Err(ScaledResolveError::NotScaled.into()),
                }
            } else {
                self.backend
                    .request_range(start, length)
                    .map_err(LoadError::from)
            };
            if let Err(err) = result {
                warn!(
                    format = %key.format,
                    start,
                    length,
                    %err,
                    "texture guest memory unavailable"
                );
                self.stats.inc_load_failures();
                return false;
            }
        }

        let bindless = self.views.is_bindless();
        let Some(texture) = self.textures.peek_mut(key) else {
            return false;
        };
        let mut loader = TextureLoader {
            backend: &mut self.backend,
            pipelines: &self.pipelines,
            scaled_resolve: self.scaled_resolve.as_mut(),
            scale: self.scale,
            bindless,
        };
        match loader.load(texture, load_base, load_mips) {
            Ok(summary) => {
                texture.set_resident(load_base, load_mips);
                self.stats.inc_textures_loaded();
                self.stats
                    .add_aliasing_barriers(u64::from(summary.aliasing_barriers));
                true
            }
            Err(err) => {
                warn!(
                    format = %key.format,
                    width = key.width,
                    height = key.height,
                    %err,
                    "texture load failed"
                );
                if let LoadError::UnsupportedFormat(format) = err {
                    self.unsupported[format.index()] |= UnsupportedFeatures::RESOURCE;
                }
                self.stats.inc_load_failures();
                false
            }
        }
    }

    fn mark_used(&mut self, key: &TextureKey) {
        let submission = self.backend.current_submission();
        if let Some(texture) = self.textures.get_mut(key) {
            texture.mark_used(submission, self.frame);
        }
    }

    fn transition(&mut self, key: &TextureKey, state: ResourceState) {
        if let Some(texture) = self.textures.peek_mut(key) {
            let old = texture.set_state(state);
            if old != state {
                self.backend
                    .push_transition_barrier(texture.resource(), old, state);
            }
        }
    }

    fn find_or_create_view(&mut self, key: &TextureKey, signed: bool, swizzle: Swizzle) -> Option<u32> {
        let texture = self.textures.peek_mut(key)?;
        match self
            .views
            .find_or_create_view(&mut self.backend, texture, signed, swizzle)
        {
            Ok((index, created)) => {
                if created {
                    self.stats.inc_views_created();
                } else {
                    self.stats.inc_views_reused();
                }
                Some(index)
            }
            Err(DescriptorError::UnsupportedFormat { format, signed }) => {
                let feature = if signed {
                    UnsupportedFeatures::SNORM
                } else {
                    UnsupportedFeatures::UNORM
                };
                self.record_unsupported(format, feature);
                None
            }
            Err(err) => {
                warn!(format = %key.format, signed, %err, "failed to create texture view");
                None
            }
        }
    }

    /// Marks the binding of fetch constant `index` as needing a refresh.
    pub fn texture_fetch_constant_written(&mut self, index: u32) {
        if index < TEXTURE_FETCH_CONSTANT_COUNT {
            self.bindings_up_to_date &= !(1 << index);
        }
    }

    /// Makes the textures of the fetch constants in `used_mask` resident and
    /// readable by shaders, refreshing their bindings first if the constants
    /// changed. Failures leave bindings without views.
    pub fn request_textures(&mut self, source: &impl FetchConstantSource, used_mask: u32) {
        let mut outdated = used_mask & !self.bindings_up_to_date;
        while outdated != 0 {
            let index = outdated.trailing_zeros();
            outdated &= outdated - 1;
            self.bindings_up_to_date |= 1 << index;
            self.update_binding(source, index);
        }

        let mut used = used_mask;
        while used != 0 {
            let index = used.trailing_zeros() as usize;
            used &= used - 1;
            let binding = self.bindings[index];
            for key in binding.textures() {
                self.load_texture(&key);
                self.mark_used(&key);
                self.transition(&key, ResourceState::ALL_SHADER_RESOURCE);
            }
        }
    }

    fn update_binding(&mut self, source: &impl FetchConstantSource, index: u32) {
        let mut binding = TextureBinding::default();
        if let Some((fetch, mut key)) = source
            .fetch(index)
            .and_then(|fetch| fetch.key.map(|key| (fetch, key)))
        {
            key.scaled_resolve &= self.is_scaled_resolve_supported_for_format(&key);
            binding.key = Some(key);
            binding.host_swizzle = fetch.swizzle.compose(self.config.host_swizzle(key.format));
            binding.swizzled_signs = SwizzledSigns::from_swizzle(fetch.swizzle, fetch.signs);
            let signs = binding.swizzled_signs;
            let swizzle = binding.host_swizzle;
            if is_signed_version_separate(key.format) {
                if signs.is_any_not_signed() {
                    binding.texture = self.find_or_create_texture(key);
                }
                if signs.is_any_signed() {
                    binding.texture_signed = self.find_or_create_texture(key.signed_twin());
                }
                if let Some(texture) = binding.texture {
                    binding.view_index = self.find_or_create_view(&texture, false, swizzle);
                }
                if let Some(texture) = binding.texture_signed {
                    binding.view_index_signed = self.find_or_create_view(&texture, true, swizzle);
                }
            } else {
                binding.texture = self.find_or_create_texture(key);
                if let Some(texture) = binding.texture {
                    if signs.is_any_not_signed() {
                        binding.view_index = self.find_or_create_view(&texture, false, swizzle);
                    }
                    if signs.is_any_signed() {
                        binding.view_index_signed =
                            self.find_or_create_view(&texture, true, swizzle);
                    }
                }
            }
        }
        self.bindings[index as usize] = binding;
    }

    /// Whether `keys` still describe what `shader_bindings` resolve to.
    pub fn are_active_srv_keys_up_to_date(
        &self,
        keys: &[TextureSrvKey],
        shader_bindings: &[ShaderTextureBinding],
    ) -> bool {
        keys.len() == shader_bindings.len()
            && keys
                .iter()
                .zip(shader_bindings)
                .all(|(key, shader)| *key == self.srv_key(shader))
    }

    pub fn write_active_srv_keys(&self, shader_bindings: &[ShaderTextureBinding]) -> Vec<TextureSrvKey> {
        shader_bindings
            .iter()
            .map(|shader| self.srv_key(shader))
            .collect()
    }

    fn srv_key(&self, shader: &ShaderTextureBinding) -> TextureSrvKey {
        self.bindings
            .get(shader.fetch_constant as usize)
            .map(TextureSrvKey::from)
            .unwrap_or_default()
    }

    /// View index for a shader fetch, `None` if it has to read the null view.
    fn active_view(&self, shader: &ShaderTextureBinding) -> Option<u32> {
        let binding = self.bindings.get(shader.fetch_constant as usize)?;
        let key = binding.key?;
        if !are_dimensions_compatible(shader.dimension, key.dimension) {
            return None;
        }
        if shader.is_signed {
            binding.view_index_signed
        } else {
            binding.view_index
        }
    }

    /// Copies the view a shader fetch reads into `dest`.
    pub fn write_active_texture_bindful_srv(&mut self, shader: &ShaderTextureBinding, dest: CpuDescriptor) {
        let source = match self.active_view(shader) {
            Some(index) => self.views.cpu_handle(&self.backend, index),
            None => match self.null_view_heap {
                Some(heap) => CpuDescriptor {
                    heap,
                    index: null_view_index(shader.dimension),
                },
                None => {
                    self.backend
                        .system_bindless_view_handle_pair(null_system_view(shader.dimension))
                        .cpu
                }
            },
        };
        self.backend.copy_descriptor(dest, source);
    }

    /// Bindless heap index of the view a shader fetch reads.
    pub fn active_texture_bindless_srv_index(&self, shader: &ShaderTextureBinding) -> u32 {
        self.active_view(shader).unwrap_or_else(|| {
            self.backend
                .system_bindless_view_index(null_system_view(shader.dimension))
        })
    }

    pub fn sampler_parameters(
        &self,
        source: &impl FetchConstantSource,
        binding: &ShaderSamplerBinding,
    ) -> SamplerParameters {
        let fetch = source
            .fetch(binding.fetch_constant)
            .map(|fetch| fetch.sampler)
            .unwrap_or_default();
        SamplerParameters::new(&fetch, binding)
    }

    pub fn write_sampler(&mut self, parameters: &SamplerParameters, dest: CpuDescriptor) {
        self.backend.create_sampler(&parameters.host_desc(), dest);
    }

    /// Resolves, loads and returns the 2D texture in fetch constant 0 for
    /// presentation.
    pub fn request_swap_texture(&mut self, source: &impl FetchConstantSource) -> Option<SwapTexture> {
        let fetch = source.fetch(0)?;
        let mut key = fetch.key?;
        if key.base_page == 0 || key.dimension != DataDimension::Tex2DOrStacked {
            return None;
        }
        key.scaled_resolve &= self.is_scaled_resolve_supported_for_format(&key);
        let key = self.find_or_create_texture(key)?;
        if !self.load_texture(&key) {
            return None;
        }
        self.mark_used(&key);
        self.transition(&key, ResourceState::NON_PIXEL_SHADER_RESOURCE);
        let resource = self.textures.peek(&key)?.resource();
        let format = unorm_format(key.format, key.width, key.height);
        if format == DxgiFormat::Unknown {
            self.record_unsupported(key.format, UnsupportedFeatures::UNORM);
            return None;
        }
        let swizzle = fetch.swizzle.compose(self.config.host_swizzle(key.format));
        Some(SwapTexture {
            resource,
            view: TextureViewDesc {
                format,
                dimension: ViewDimension::Texture2D { mip_levels: 1 },
                component_mapping: u32::from(swizzle.bits()) | COMPONENT_MAPPING_ALWAYS_SET_BIT,
            },
            format: key.format,
        })
    }

    /// Commits the scaled memory behind the unscaled guest range.
    pub fn ensure_scaled_resolve_memory_committed(
        &mut self,
        start: u32,
        length: u32,
    ) -> Result<(), ScaledResolveError> {
        let space = self
            .scaled_resolve
            .as_mut()
            .ok_or(ScaledResolveError::NotScaled)?;
        let heaps = space.ensure_committed(&mut self.backend, start, length)?;
        self.stats.add_scaled_resolve_heaps(heaps as u64);
        Ok(())
    }

    pub fn make_scaled_resolve_range_current(
        &mut self,
        start: u32,
        length: u32,
    ) -> Result<(), ScaledResolveError> {
        let space = self
            .scaled_resolve
            .as_mut()
            .ok_or(ScaledResolveError::NotScaled)?;
        let barriers = space.make_range_current(&mut self.backend, start, length)?;
        self.stats.add_aliasing_barriers(u64::from(barriers));
        Ok(())
    }

    pub fn transition_current_scaled_resolve_range(
        &mut self,
        state: ResourceState,
    ) -> Result<(), ScaledResolveError> {
        let space = self
            .scaled_resolve
            .as_mut()
            .ok_or(ScaledResolveError::NotScaled)?;
        space.transition_current_range(&mut self.backend, state)
    }

    pub fn mark_current_scaled_resolve_range_uav_written(&mut self) -> Result<(), ScaledResolveError> {
        self.scaled_resolve
            .as_mut()
            .ok_or(ScaledResolveError::NotScaled)?
            .mark_current_range_uav_written()
    }

    pub fn create_current_scaled_resolve_range_srv(
        &mut self,
        dest: CpuDescriptor,
        element_size_log2: u32,
    ) -> Result<(), ScaledResolveError> {
        let space = self
            .scaled_resolve
            .as_mut()
            .ok_or(ScaledResolveError::NotScaled)?;
        space.create_current_range_srv(&mut self.backend, dest, element_size_log2)
    }

    pub fn create_current_scaled_resolve_range_uav(
        &mut self,
        dest: CpuDescriptor,
        element_size_log2: u32,
    ) -> Result<(), ScaledResolveError> {
        let space = self
            .scaled_resolve
            .as_mut()
            .ok_or(ScaledResolveError::NotScaled)?;
        space.create_current_range_uav(&mut self.backend, dest, element_size_log2)
    }

    /// Releases every host object the cache owns. Safe to call repeatedly.
    fn release_all(&mut self) {
        self.destroy_all_textures();
        self.views.clear(&mut self.backend);
        if let Some(heap) = self.null_view_heap.take() {
            self.backend.destroy_view_heap(heap);
        }
        if let Some(space) = self.scaled_resolve.as_mut() {
            space.destroy(&mut self.backend);
        }
    }
}

impl<B: Backend> Drop for TextureCache<B> {
    fn drop(&mut self) {
        self.release_all();
    }
}

fn create_null_views<B: Backend>(backend: &mut B) -> Result<ViewHeapHandle, TextureCacheError> {
    let heap = backend
        .create_view_heap(NULL_VIEW_COUNT, false)
        .map_err(TextureCacheError::NullViewHeap)?;
    for (index, dimension) in [
        (
            NULL_VIEW_2D_ARRAY,
            ViewDimension::Texture2DArray {
                mip_levels: 1,
                array_size: 1,
            },
        ),
        (NULL_VIEW_3D, ViewDimension::Texture3D { mip_levels: 1 }),
        (NULL_VIEW_CUBE, ViewDimension::TextureCube { mip_levels: 1 }),
    ] {
        let desc = TextureViewDesc {
            format: DxgiFormat::R8G8B8A8Unorm,
            dimension,
            component_mapping: u32::from(Swizzle::ZERO.bits()) | COMPONENT_MAPPING_ALWAYS_SET_BIT,
        };
        backend.create_texture_srv(None, &desc, CpuDescriptor { heap, index });
    }
    Ok(heap)
}

fn null_view_index(dimension: FetchOpDimension) -> u32 {
    match dimension {
        FetchOpDimension::Tex1D | FetchOpDimension::Tex2D => NULL_VIEW_2D_ARRAY,
        FetchOpDimension::Tex3DOrStacked => NULL_VIEW_3D,
        FetchOpDimension::Cube => NULL_VIEW_CUBE,
    }
}

fn null_system_view(dimension: FetchOpDimension) -> SystemBindlessView {
    match dimension {
        FetchOpDimension::Tex1D | FetchOpDimension::Tex2D => SystemBindlessView::NullTexture2DArray,
        FetchOpDimension::Tex3DOrStacked => SystemBindlessView::NullTexture3D,
        FetchOpDimension::Cube => SystemBindlessView::NullTextureCube,
    }
}

impl<B: Backend + std::fmt::Debug> std::fmt::Debug for TextureCache<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureCache")
            .field("backend", &self.backend)
            .field("scale", &self.scale)
            .field("textures", &self.textures.len())
            .field("total_host_memory", &self.total_host_memory)
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::GuestTextureFetch;
    use crate::config::TextureLimits;
    use crate::load_mode::LoadMode;
    use pretty_assertions::assert_eq;
    use xenos_host::testing::{BackendEvent, RecordingBackend};
    use xenos_host::CommandSubmitter;
    use xenos_types::{FetchSamplerState, TextureSign};

    fn key(format: TextureFormat) -> TextureKey {
        TextureKey::new(format, DataDimension::Tex2DOrStacked, 64, 64, 1)
    }

    fn fetch(key: TextureKey, signs: [TextureSign; 4]) -> GuestTextureFetch {
        GuestTextureFetch {
            key: Some(key),
            swizzle: Swizzle::RGBA,
            signs,
            sampler: FetchSamplerState::default(),
        }
    }

    fn source(key: TextureKey) -> impl Fn(u32) -> Option<GuestTextureFetch> {
        move |index| (index == 0).then(|| fetch(key, [TextureSign::Unsigned; 4]))
    }

    fn cache(config: TextureCacheConfig) -> TextureCache<RecordingBackend> {
        TextureCache::new(RecordingBackend::new(), config).unwrap()
    }

    fn texture_2d(fetch_constant: u32) -> ShaderTextureBinding {
        ShaderTextureBinding {
            fetch_constant,
            dimension: FetchOpDimension::Tex2D,
            is_signed: false,
        }
    }

    fn null_view_heap(backend: &RecordingBackend) -> ViewHeapHandle {
        backend
            .events()
            .iter()
            .find_map(|event| match *event {
                BackendEvent::CreateViewHeap { heap, capacity: 3 } => Some(heap),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn construction_creates_pipelines_and_null_views() {
        let cache = cache(TextureCacheConfig::default());
        let backend = cache.backend();
        assert_eq!(
            backend.count(|event| matches!(event, BackendEvent::CreatePipeline { .. })),
            LoadMode::COUNT
        );
        let null_views: Vec<_> = backend
            .events()
            .iter()
            .filter_map(|event| match event {
                BackendEvent::CreateTextureSrv {
                    resource: None,
                    desc,
                    dest,
                } => Some((dest.index, desc.dimension, desc.component_mapping)),
                _ => None,
            })
            .collect();
        let zero = u32::from(Swizzle::ZERO.bits()) | COMPONENT_MAPPING_ALWAYS_SET_BIT;
        assert_eq!(
            null_views,
            vec![
                (
                    0,
                    ViewDimension::Texture2DArray {
                        mip_levels: 1,
                        array_size: 1
                    },
                    zero
                ),
                (1, ViewDimension::Texture3D { mip_levels: 1 }, zero),
                (2, ViewDimension::TextureCube { mip_levels: 1 }, zero),
            ]
        );
        assert!(!cache.is_draw_resolution_scaled());
    }

    #[test]
    fn construction_failures() {
        let mut backend = RecordingBackend::new();
        backend.capabilities.tiled_resources = false;
        let config = TextureCacheConfig {
            draw_resolution_scale: DrawResolutionScale::new(2, 2),
            ..TextureCacheConfig::default()
        };
        assert!(matches!(
            TextureCache::new(backend, config),
            Err(TextureCacheError::TiledResourcesRequired)
        ));

        let mut backend = RecordingBackend::new();
        backend.fail_view_heap_creation = true;
        assert!(matches!(
            TextureCache::new(backend, TextureCacheConfig::default()),
            Err(TextureCacheError::NullViewHeap(_))
        ));

        let mut backend = RecordingBackend::new();
        backend.failing_programs = vec![LoadMode::Load32bpb.info().program.name];
        assert!(matches!(
            TextureCache::new(backend, TextureCacheConfig::default()),
            Err(TextureCacheError::Pipeline { .. })
        ));
    }

    #[test]
    fn scaled_cache_creates_scaled_pipelines_and_space() {
        let cache = cache(TextureCacheConfig {
            draw_resolution_scale: DrawResolutionScale::new(2, 2),
            ..TextureCacheConfig::default()
        });
        assert!(cache.is_draw_resolution_scaled());
        let scaled_programs = LoadMode::ALL
            .iter()
            .filter(|mode| mode.info().program_scaled.is_some())
            .count();
        assert_eq!(
            cache
                .backend()
                .count(|event| matches!(event, BackendEvent::CreatePipeline { .. })),
            LoadMode::COUNT + scaled_programs
        );
        assert!(cache.is_scaled_resolve_supported_for_format(&key(TextureFormat::Fmt8_8_8_8)));
    }

    #[test]
    fn request_textures_loads_once() {
        let mut cache = cache(TextureCacheConfig::default());
        let key = key(TextureFormat::Fmt8_8_8_8);
        cache.request_textures(&source(key), 1);

        let texture = cache.texture(&key).unwrap();
        assert!(texture.is_base_resident());
        assert_eq!(texture.state(), ResourceState::ALL_SHADER_RESOURCE);
        let resource = texture.resource();
        let backend = cache.backend();
        assert!(backend.events().contains(&BackendEvent::SharedMemoryRequestRange {
            start: key.base_address(),
            length: texture.guest_layout().base_size(),
        }));
        assert!(backend.events().contains(&BackendEvent::Transition {
            resource,
            old: ResourceState::COPY_DEST,
            new: ResourceState::ALL_SHADER_RESOURCE,
        }));
        let dispatches = backend.dispatches().len();
        assert!(dispatches > 0);

        let binding = *cache.binding(0).unwrap();
        assert_eq!(binding.texture, Some(key));
        assert!(binding.view_index.is_some());
        assert_eq!(binding.view_index_signed, None);

        cache.request_textures(&source(key), 1);
        assert_eq!(cache.backend().dispatches().len(), dispatches);
        let stats = cache.stats();
        assert_eq!(stats.textures_created, 1);
        assert_eq!(stats.textures_loaded, 1);
        assert_eq!(stats.views_created, 1);
    }

    #[test]
    fn bindings_refresh_only_after_fetch_constant_writes() {
        let mut cache = cache(TextureCacheConfig::default());
        let first = key(TextureFormat::Fmt8_8_8_8);
        let mut second = key(TextureFormat::Fmt8);
        second.base_page = 64;
        cache.request_textures(&source(first), 1);
        cache.request_textures(&source(second), 1);
        assert_eq!(cache.binding(0).unwrap().key, Some(first));
        cache.texture_fetch_constant_written(0);
        cache.request_textures(&source(second), 1);
        assert_eq!(cache.binding(0).unwrap().key, Some(second));
        assert_eq!(cache.texture_count(), 2);
    }

    #[test]
    fn invalidated_textures_reload() {
        let mut cache = cache(TextureCacheConfig::default());
        let key = key(TextureFormat::Fmt8_8_8_8);
        cache.request_textures(&source(key), 1);
        let dispatches = cache.backend().dispatches().len();

        assert_eq!(cache.invalidate_range(0, key.base_address()), 0);
        assert_eq!(cache.invalidate_range(key.base_address() + 16, 4), 1);
        assert!(!cache.texture(&key).unwrap().is_base_resident());
        cache.request_textures(&source(key), 1);
        assert!(cache.texture(&key).unwrap().is_base_resident());
        assert_eq!(cache.backend().dispatches().len(), 2 * dispatches);
    }

    #[test]
    fn guest_memory_failures_leave_textures_unloaded() {
        let mut cache = cache(TextureCacheConfig::default());
        let key = key(TextureFormat::Fmt8_8_8_8);
        cache
            .backend_mut()
            .unavailable_ranges
            .push((key.base_address(), 1));
        cache.request_textures(&source(key), 1);
        assert!(!cache.texture(&key).unwrap().is_base_resident());
        assert!(cache.backend().dispatches().is_empty());
        assert_eq!(cache.stats().load_failures, 1);

        cache.backend_mut().unavailable_ranges.clear();
        cache.request_textures(&source(key), 1);
        assert!(cache.texture(&key).unwrap().is_base_resident());
    }

    #[test]
    fn separate_signed_formats_use_two_textures() {
        let mut cache = cache(TextureCacheConfig::default());
        let key = key(TextureFormat::Fmt10_11_11);
        let signs = [
            TextureSign::Signed,
            TextureSign::Unsigned,
            TextureSign::Unsigned,
            TextureSign::Unsigned,
        ];
        cache.request_textures(&move |index: u32| (index == 0).then(|| fetch(key, signs)), 1);
        let binding = *cache.binding(0).unwrap();
        assert_eq!(binding.texture, Some(key));
        assert_eq!(binding.texture_signed, Some(key.signed_twin()));
        assert!(binding.view_index.is_some());
        assert!(binding.view_index_signed.is_some());
        assert_ne!(binding.view_index, binding.view_index_signed);
        assert_eq!(cache.texture_count(), 2);
        assert!(cache.texture(&key.signed_twin()).unwrap().is_base_resident());
    }

    #[test]
    fn bindful_views_fall_back_to_null_views() {
        let mut cache = cache(TextureCacheConfig::default());
        let key = key(TextureFormat::Fmt8_8_8_8);
        cache.request_textures(&source(key), 1);
        let heap = null_view_heap(cache.backend());
        let dest = CpuDescriptor {
            heap: ViewHeapHandle(9999),
            index: 0,
        };
        let copied_from = |cache: &TextureCache<RecordingBackend>| {
            cache.backend().events().iter().rev().find_map(|event| match *event {
                BackendEvent::CopyDescriptor { source, .. } => Some(source),
                _ => None,
            })
        };

        cache.write_active_texture_bindful_srv(&texture_2d(0), dest);
        assert_ne!(copied_from(&cache).map(|source| source.heap), Some(heap));

        let volume = ShaderTextureBinding {
            dimension: FetchOpDimension::Tex3DOrStacked,
            ..texture_2d(0)
        };
        cache.write_active_texture_bindful_srv(&volume, dest);
        assert_eq!(copied_from(&cache), Some(CpuDescriptor { heap, index: 1 }));

        let signed = ShaderTextureBinding {
            is_signed: true,
            ..texture_2d(0)
        };
        cache.write_active_texture_bindful_srv(&signed, dest);
        assert_eq!(copied_from(&cache), Some(CpuDescriptor { heap, index: 0 }));

        let cube = ShaderTextureBinding {
            fetch_constant: 5,
            dimension: FetchOpDimension::Cube,
            is_signed: false,
        };
        cache.write_active_texture_bindful_srv(&cube, dest);
        assert_eq!(copied_from(&cache), Some(CpuDescriptor { heap, index: 2 }));
    }

    #[test]
    fn bindless_indices_fall_back_to_system_null_views() {
        let mut cache = cache(TextureCacheConfig {
            bindless: true,
            ..TextureCacheConfig::default()
        });
        assert_eq!(
            cache
                .backend()
                .count(|event| matches!(event, BackendEvent::CreateViewHeap { .. })),
            0
        );
        let key = key(TextureFormat::Fmt8_8_8_8);
        cache.request_textures(&source(key), 1);
        let index = cache.active_texture_bindless_srv_index(&texture_2d(0));
        assert_eq!(Some(index), cache.binding(0).unwrap().view_index);
        let cube = ShaderTextureBinding {
            dimension: FetchOpDimension::Cube,
            ..texture_2d(0)
        };
        assert_eq!(
            cache.active_texture_bindless_srv_index(&cube),
            cache
                .backend()
                .system_bindless_view_index(SystemBindlessView::NullTextureCube)
        );
    }

    #[test]
    fn srv_keys_track_fetch_constants() {
        let mut cache = cache(TextureCacheConfig::default());
        let key = key(TextureFormat::Fmt8_8_8_8);
        let shader = [texture_2d(0), texture_2d(1)];
        let before = cache.write_active_srv_keys(&shader);
        assert!(cache.are_active_srv_keys_up_to_date(&before, &shader));
        cache.request_textures(&source(key), 1);
        assert!(!cache.are_active_srv_keys_up_to_date(&before, &shader));
        let after = cache.write_active_srv_keys(&shader);
        assert_eq!(after[0].key, Some(key));
        assert_eq!(after[1], TextureSrvKey::default());
        assert!(cache.are_active_srv_keys_up_to_date(&after, &shader));
        assert!(!cache.are_active_srv_keys_up_to_date(&after[..1], &shader));
    }

    #[test]
    fn hard_limit_evicts_only_completed_textures() {
        let mut cache = cache(TextureCacheConfig {
            limits: TextureLimits {
                soft_max_bytes: 1024,
                soft_lifetime_frames: 1000,
                hard_max_bytes: 1024,
            },
            ..TextureCacheConfig::default()
        });
        let key = key(TextureFormat::Fmt8_8_8_8);
        cache.request_textures(&source(key), 1);
        let resource = cache.texture(&key).unwrap().resource();
        assert!(cache.total_host_memory_usage() > 1024);

        cache.begin_frame();
        assert_eq!(cache.texture_count(), 1);

        cache.backend_mut().advance_submission();
        cache.begin_frame();
        assert_eq!(cache.texture_count(), 0);
        assert_eq!(cache.total_host_memory_usage(), 0);
        assert!(cache
            .backend()
            .events()
            .contains(&BackendEvent::DestroyResource(resource)));
        assert_eq!(*cache.binding(0).unwrap(), TextureBinding::default());
        assert_eq!(cache.stats().textures_evicted, 1);

        cache.request_textures(&source(key), 1);
        assert_eq!(cache.texture_count(), 1);
    }

    #[test]
    fn soft_limit_evicts_after_the_lifetime() {
        let mut cache = cache(TextureCacheConfig {
            limits: TextureLimits {
                soft_max_bytes: 1024,
                soft_lifetime_frames: 3,
                hard_max_bytes: u64::MAX,
            },
            ..TextureCacheConfig::default()
        });
        cache.request_textures(&source(key(TextureFormat::Fmt8_8_8_8)), 1);
        cache.backend_mut().advance_submission();
        cache.begin_frame();
        cache.begin_frame();
        assert_eq!(cache.texture_count(), 1);
        cache.begin_frame();
        assert_eq!(cache.texture_count(), 0);
    }

    #[test]
    fn unsupported_features_are_recorded_per_frame() {
        let mut cache = cache(TextureCacheConfig::default());
        let unsupported = key(TextureFormat::Fmt32);
        cache.request_textures(&source(unsupported), 1);
        assert_eq!(cache.binding(0).unwrap().texture, None);
        assert_eq!(
            cache.unsupported_features(TextureFormat::Fmt32),
            UnsupportedFeatures::RESOURCE
        );

        let mut dxt = key(TextureFormat::Dxt1);
        dxt.base_page = 64;
        cache.request_textures(
            &move |index: u32| (index == 1).then(|| fetch(dxt, [TextureSign::Signed; 4])),
            1 << 1,
        );
        assert_eq!(
            cache.unsupported_features(TextureFormat::Dxt1),
            UnsupportedFeatures::SNORM
        );
        assert_eq!(cache.binding(1).unwrap().view_index_signed, None);
        assert_eq!(
            cache.unsupported_report(),
            "\n* k_DXT1 snorm\n* k_32 resource"
        );

        cache.end_frame();
        assert_eq!(cache.unsupported_report(), "");
        assert!(cache.unsupported_features(TextureFormat::Fmt32).is_empty());
        assert!(!TextureCache::<RecordingBackend>::is_format_supported(TextureFormat::Fmt32));
        assert!(TextureCache::<RecordingBackend>::is_format_supported(TextureFormat::Dxt1));
    }

    #[test]
    fn swap_texture_is_loaded_and_readable() {
        let mut cache = cache(TextureCacheConfig::default());
        let key = key(TextureFormat::Fmt8_8_8_8);
        let swap = cache.request_swap_texture(&source(key)).unwrap();
        assert_eq!(swap.format, TextureFormat::Fmt8_8_8_8);
        assert_eq!(swap.view.dimension, ViewDimension::Texture2D { mip_levels: 1 });
        assert_eq!(swap.view.format, DxgiFormat::R8G8B8A8Unorm);
        let texture = cache.texture(&key).unwrap();
        assert_eq!(texture.resource(), swap.resource);
        assert!(texture.is_base_resident());
        assert_eq!(texture.state(), ResourceState::NON_PIXEL_SHADER_RESOURCE);

        let cube = TextureKey::new(TextureFormat::Fmt8_8_8_8, DataDimension::Cube, 64, 64, 6);
        assert_eq!(cache.request_swap_texture(&source(cube)), None);
        let mut no_base = key;
        no_base.base_page = 0;
        assert_eq!(cache.request_swap_texture(&source(no_base)), None);
    }

    #[test]
    fn scaled_resolve_needs_scaling() {
        let mut cache = cache(TextureCacheConfig::default());
        assert_eq!(
            cache.make_scaled_resolve_range_current(0, 4096),
            Err(ScaledResolveError::NotScaled)
        );
        assert_eq!(
            cache.ensure_scaled_resolve_memory_committed(0, 4096),
            Err(ScaledResolveError::NotScaled)
        );
        assert!(!cache.is_scaled_resolve_supported_for_format(&key(TextureFormat::Fmt8_8_8_8)));
    }

    #[test]
    fn scaled_resolve_passthrough() {
        let mut cache = cache(TextureCacheConfig {
            draw_resolution_scale: DrawResolutionScale::new(2, 2),
            ..TextureCacheConfig::default()
        });
        cache.ensure_scaled_resolve_memory_committed(0, 1 << 20).unwrap();
        cache.make_scaled_resolve_range_current(0, 1 << 20).unwrap();
        cache
            .transition_current_scaled_resolve_range(ResourceState::UNORDERED_ACCESS)
            .unwrap();
        cache.mark_current_scaled_resolve_range_uav_written().unwrap();
        cache
            .transition_current_scaled_resolve_range(ResourceState::UNORDERED_ACCESS)
            .unwrap();
        assert_eq!(
            cache
                .backend()
                .count(|event| matches!(event, BackendEvent::UavBarrier(_))),
            1
        );
        let stats = cache.stats();
        assert!(stats.scaled_resolve_heaps > 0);
        assert_eq!(stats.scaled_resolve_committed_mb, stats.scaled_resolve_heaps * 16);
    }

    #[test]
    fn samplers_come_from_the_fetch_constant() {
        let mut cache = cache(TextureCacheConfig::default());
        let key = key(TextureFormat::Fmt8_8_8_8);
        let binding = ShaderSamplerBinding {
            fetch_constant: 0,
            mag_filter: xenos_types::TextureFilter::Linear,
            min_filter: xenos_types::TextureFilter::UseFetchConst,
            mip_filter: xenos_types::TextureFilter::UseFetchConst,
            aniso_filter: xenos_types::AnisoFilter::Disabled,
        };
        let parameters = cache.sampler_parameters(&source(key), &binding);
        assert!(parameters.mag_linear);
        let dest = CpuDescriptor {
            heap: ViewHeapHandle(77),
            index: 4,
        };
        cache.write_sampler(&parameters, dest);
        assert!(cache
            .backend()
            .events()
            .contains(&BackendEvent::CreateSampler {
                desc: parameters.host_desc(),
                dest,
            }));
    }

    #[test]
    fn teardown_releases_everything() {
        let mut cache = cache(TextureCacheConfig {
            draw_resolution_scale: DrawResolutionScale::new(2, 2),
            ..TextureCacheConfig::default()
        });
        cache.request_textures(&source(key(TextureFormat::Fmt8_8_8_8)), 1);
        cache.ensure_scaled_resolve_memory_committed(0, 1 << 20).unwrap();
        assert!(cache.backend().live_resources() > 0);
        let heap = null_view_heap(cache.backend());

        cache.release_all();
        let backend = cache.backend();
        assert_eq!(backend.live_resources(), 0);
        assert!(backend.events().contains(&BackendEvent::DestroyViewHeap(heap)));
        let last_buffer = backend
            .events()
            .iter()
            .rposition(|event| matches!(event, BackendEvent::DestroyResource(_)))
            .unwrap();
        let first_heap = backend
            .position(|event| matches!(event, BackendEvent::DestroyHeap(_)))
            .unwrap();
        assert!(last_buffer < first_heap);

        cache.clear_cache();
        assert_eq!(cache.texture_count(), 0);
    }
}
