use std::sync::atomic::{AtomicU64, Ordering};

use crate::scaled_resolve::SCALED_RESOLVE_HEAP_SIZE;

/// Snapshot of texture cache counters, suitable for profiling/telemetry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextureCacheStatsSnapshot {
    pub textures_created: u64,
    pub textures_evicted: u64,
    pub textures_loaded: u64,
    pub load_failures: u64,
    pub views_created: u64,
    pub views_reused: u64,
    pub scaled_resolve_heaps: u64,
    pub scaled_resolve_committed_mb: u64,
    pub aliasing_barriers: u64,
}

/// Texture cache counters. Updated on the command recording thread, readable
/// from anywhere.
#[derive(Debug, Default)]
pub struct TextureCacheStats {
    textures_created: AtomicU64,
    textures_evicted: AtomicU64,
    textures_loaded: AtomicU64,
    load_failures: AtomicU64,
    views_created: AtomicU64,
    views_reused: AtomicU64,
    scaled_resolve_heaps: AtomicU64,
    aliasing_barriers: AtomicU64,
}

impl TextureCacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_textures_created(&self) {
        self.textures_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_textures_evicted(&self) {
        self.textures_evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_textures_loaded(&self) {
        self.textures_loaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_load_failures(&self) {
        self.load_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_views_created(&self) {
        self.views_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_views_reused(&self) {
        self.views_reused.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_scaled_resolve_heaps(&self, count: u64) {
        self.scaled_resolve_heaps.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_aliasing_barriers(&self, count: u64) {
        self.aliasing_barriers.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TextureCacheStatsSnapshot {
        let scaled_resolve_heaps = self.scaled_resolve_heaps.load(Ordering::Relaxed);
        TextureCacheStatsSnapshot {
            textures_created: self.textures_created.load(Ordering::Relaxed),
            textures_evicted: self.textures_evicted.load(Ordering::Relaxed),
            textures_loaded: self.textures_loaded.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            views_created: self.views_created.load(Ordering::Relaxed),
            views_reused: self.views_reused.load(Ordering::Relaxed),
            scaled_resolve_heaps,
            scaled_resolve_committed_mb: scaled_resolve_heaps * (SCALED_RESOLVE_HEAP_SIZE >> 20),
            aliasing_barriers: self.aliasing_barriers.load(Ordering::Relaxed),
        }
    }
}
