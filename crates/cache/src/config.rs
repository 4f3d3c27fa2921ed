//! Result cache configuration and builder

use service_builder::builder;

/// Default memory ceiling for the result cache (64MB)
pub const DEFAULT_MAX_MEMORY: usize = 64 * 1024 * 1024;

/// Configuration for the in-process result cache
#[derive(Debug, Clone)]
#[builder]
pub struct CacheConfig {
    /// Estimated memory ceiling in bytes. Exceeding it drops the whole cache
    /// before the next insertion.
    #[builder(getter, default = "Some(DEFAULT_MAX_MEMORY)")]
    pub max_memory: Option<usize>,

    /// Disabled caches accept every call and store nothing
    #[builder(getter, default = "true")]
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory: Some(DEFAULT_MAX_MEMORY),
            enabled: true,
        }
    }
}

impl CacheConfigBuilder {
    pub fn max_memory_bytes(self, bytes: usize) -> Self {
        self.max_memory(Some(bytes))
    }

    pub fn unlimited_memory(self) -> Self {
        self.max_memory(None)
    }

    pub fn disabled(self) -> Self {
        self.enabled(false)
    }

    pub fn build_config(self) -> CacheConfig {
        self.build_with_defaults().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.max_memory, Some(DEFAULT_MAX_MEMORY));
        assert!(config.enabled);
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::builder()
            .max_memory_bytes(4096)
            .build_config();

        assert_eq!(*config.get_max_memory(), Some(4096));
        assert!(*config.get_enabled());

        let config = CacheConfig::builder().unlimited_memory().disabled().build_config();
        assert_eq!(config.max_memory, None);
        assert!(!config.enabled);
    }
}
