//! Global configuration for the Cool read cache.
//!
//! Unlike the teacher's `bedtools`-compatibility flag, the values here are
//! not environment-driven (spec §6 is explicit that no environment variable
//! is part of the library's contract); they exist purely as process-wide
//! defaults that every [`crate::cool::file::CoolFile::open_read_only`] call
//! may override, stored as plain constants plus a small value type rather
//! than global mutable state.

/// Default size, in bytes, of a single Cool [`Dataset`](crate::cool::dataset::Dataset)
/// read cache.
pub const DEFAULT_CACHE_SIZE_BYTES: usize = 10 * 1024 * 1024;

/// Default LRU/LFU blend weight for the read cache (spec §6: "w0=0.75").
pub const DEFAULT_W0: f64 = 0.75;

/// Tunable parameters for a single [`Dataset`](crate::cool::dataset::Dataset)
/// read cache.
///
/// Every Cool file handle owns its own `CacheConfig`; there is no shared or
/// global cache (spec §9, "Global mutable state: None required").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheConfig {
    /// Byte budget for the cache across all chunks held by a dataset.
    pub cache_size_bytes: usize,
    /// Blend weight between least-recently-used and least-frequently-used
    /// eviction; 1.0 is pure LRU, 0.0 is pure LFU.
    pub w0: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_size_bytes: DEFAULT_CACHE_SIZE_BYTES,
            w0: DEFAULT_W0,
        }
    }
}

impl CacheConfig {
    pub fn new(cache_size_bytes: usize, w0: f64) -> Self {
        Self { cache_size_bytes, w0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cache_config() {
        let cfg = CacheConfig::default();
        assert_eq!(cfg.cache_size_bytes, DEFAULT_CACHE_SIZE_BYTES);
        assert_eq!(cfg.w0, DEFAULT_W0);
    }

    #[test]
    fn test_custom_cache_config() {
        let cfg = CacheConfig::new(1024, 0.5);
        assert_eq!(cfg.cache_size_bytes, 1024);
        assert_eq!(cfg.w0, 0.5);
    }
}
