use super::dailymotion::DailymotionResolver;
use super::doodstream::DoodStreamResolver;
use super::mixdrop::MixdropResolver;
use super::okru::OkRuResolver;
use super::streamtape::StreamtapeResolver;
use super::traits::HostResolver;
use super::vimeo::VimeoResolver;
use super::youtube::YouTubeResolver;

/// Registry of host resolvers, consulted in registration order.
pub struct ResolverRegistry {
    resolvers: Vec<Box<dyn HostResolver>>,
}

impl ResolverRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
        }
    }

    /// Registry with every built-in host against its public endpoints.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(OkRuResolver::new()));
        registry.register(Box::new(DailymotionResolver::new()));
        registry.register(Box::new(YouTubeResolver::new()));
        registry.register(Box::new(VimeoResolver::new()));
        registry.register(Box::new(StreamtapeResolver::new()));
        registry.register(Box::new(DoodStreamResolver::new()));
        registry.register(Box::new(MixdropResolver::new()));
        registry
    }

    /// Register a resolver.
    pub fn register(&mut self, resolver: Box<dyn HostResolver>) {
        self.resolvers.push(resolver);
    }

    /// Find the resolver for a hostname.
    #[must_use]
    pub fn find(&self, host: &str) -> Option<&dyn HostResolver> {
        self.resolvers
            .iter()
            .find(|r| r.matches(host))
            .map(AsRef::as_ref)
    }

    /// Get all registered resolvers.
    #[must_use]
    pub fn resolvers(&self) -> &[Box<dyn HostResolver>] {
        &self.resolvers
    }
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
