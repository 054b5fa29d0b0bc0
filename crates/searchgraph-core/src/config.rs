//! Engine configuration.

use std::time::Duration;

/// Default page size when the client gives no `first`/`last`.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Default upper bound on any requested page size.
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 500;

/// Default request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Page size used when the client gives no bounds.
    pub default_page_size: u32,

    /// Hard cap applied to any requested page size.
    pub max_page_size: u32,

    /// Wall-clock budget for one resolution walk; the deadline is computed
    /// once at request start and threaded through every built query.
    pub request_timeout: Duration,

    /// Cluster this engine instance queries against. When set, building a
    /// query for an index that is not accessible on this cluster fails.
    pub cluster: Option<String>,
}

impl EngineConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cluster: None,
        }
    }

    /// Set the default page size.
    pub fn with_default_page_size(mut self, size: u32) -> Self {
        self.default_page_size = size;
        self
    }

    /// Set the maximum page size.
    pub fn with_max_page_size(mut self, size: u32) -> Self {
        self.max_page_size = size;
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Restrict the engine to indices accessible on the named cluster.
    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = Some(cluster.into());
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.default_page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.max_page_size, DEFAULT_MAX_PAGE_SIZE);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.cluster, None);
    }

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::new()
            .with_default_page_size(10)
            .with_max_page_size(100)
            .with_request_timeout(Duration::from_secs(5))
            .with_cluster("analytics");
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.cluster.as_deref(), Some("analytics"));
    }
}
