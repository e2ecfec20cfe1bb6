//! The name-resolution boundary between the dispatcher and the plugin
//! catalog. Discovery and loading of plugin code live behind the trait;
//! the dispatcher only ever resolves names.

use crate::plugin::handler::{
    AgentRequestingHandler, HeaderWritingHandler, RequestedHandler, RequestingHandler,
    ResponseErrorHandler,
};
use dashmap::DashMap;
use std::sync::Arc;

/// Resolves a handler name for each extension point.
pub trait PluginCatalog: Send + Sync {
    fn requesting(&self, name: &str) -> Option<Arc<dyn RequestingHandler>>;
    fn agent_requesting(&self, name: &str) -> Option<Arc<dyn AgentRequestingHandler>>;
    fn header_writing(&self, name: &str) -> Option<Arc<dyn HeaderWritingHandler>>;
    fn requested(&self, name: &str) -> Option<Arc<dyn RequestedHandler>>;
    fn response_error(&self, name: &str) -> Option<Arc<dyn ResponseErrorHandler>>;
}

/// In-memory catalog keyed by each handler's declared name.
///
/// Registering a name again replaces the previous handler, which is what a
/// catalog refresh does before the dispatcher re-resolves names via
/// `reload`.
#[derive(Default)]
pub struct MemoryCatalog {
    requesting: DashMap<String, Arc<dyn RequestingHandler>>,
    agent_requesting: DashMap<String, Arc<dyn AgentRequestingHandler>>,
    header_writing: DashMap<String, Arc<dyn HeaderWritingHandler>>,
    requested: DashMap<String, Arc<dyn RequestedHandler>>,
    response_error: DashMap<String, Arc<dyn ResponseErrorHandler>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_requesting(&self, handler: Arc<dyn RequestingHandler>) {
        self.requesting.insert(handler.name().to_string(), handler);
    }

    pub fn register_agent_requesting(&self, handler: Arc<dyn AgentRequestingHandler>) {
        self.agent_requesting
            .insert(handler.name().to_string(), handler);
    }

    pub fn register_header_writing(&self, handler: Arc<dyn HeaderWritingHandler>) {
        self.header_writing
            .insert(handler.name().to_string(), handler);
    }

    pub fn register_requested(&self, handler: Arc<dyn RequestedHandler>) {
        self.requested.insert(handler.name().to_string(), handler);
    }

    pub fn register_response_error(&self, handler: Arc<dyn ResponseErrorHandler>) {
        self.response_error
            .insert(handler.name().to_string(), handler);
    }

    pub fn unregister_requesting(&self, name: &str) {
        self.requesting.remove(name);
    }

    pub fn unregister_agent_requesting(&self, name: &str) {
        self.agent_requesting.remove(name);
    }

    pub fn unregister_header_writing(&self, name: &str) {
        self.header_writing.remove(name);
    }

    pub fn unregister_requested(&self, name: &str) {
        self.requested.remove(name);
    }

    pub fn unregister_response_error(&self, name: &str) {
        self.response_error.remove(name);
    }
}

impl PluginCatalog for MemoryCatalog {
    fn requesting(&self, name: &str) -> Option<Arc<dyn RequestingHandler>> {
        self.requesting.get(name).map(|entry| entry.value().clone())
    }

    fn agent_requesting(&self, name: &str) -> Option<Arc<dyn AgentRequestingHandler>> {
        self.agent_requesting
            .get(name)
            .map(|entry| entry.value().clone())
    }

    fn header_writing(&self, name: &str) -> Option<Arc<dyn HeaderWritingHandler>> {
        self.header_writing
            .get(name)
            .map(|entry| entry.value().clone())
    }

    fn requested(&self, name: &str) -> Option<Arc<dyn RequestedHandler>> {
        self.requested.get(name).map(|entry| entry.value().clone())
    }

    fn response_error(&self, name: &str) -> Option<Arc<dyn ResponseErrorHandler>> {
        self.response_error
            .get(name)
            .map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::handler::Plugin;
    use crate::plugin::stage::RequestingContext;

    struct Named(&'static str);

    impl Plugin for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "test handler"
        }
    }

    impl RequestingHandler for Named {
        fn execute(&self, _ctx: &mut RequestingContext<'_>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn resolves_by_declared_name() {
        let catalog = MemoryCatalog::new();
        catalog.register_requesting(Arc::new(Named("auth")));
        assert!(catalog.requesting("auth").is_some());
        assert!(catalog.requesting("Auth").is_none());
        assert!(catalog.requesting("missing").is_none());
    }

    #[test]
    fn reregistering_replaces_and_unregister_removes() {
        let catalog = MemoryCatalog::new();
        catalog.register_requesting(Arc::new(Named("auth")));
        catalog.register_requesting(Arc::new(Named("auth")));
        assert!(catalog.requesting("auth").is_some());
        catalog.unregister_requesting("auth");
        assert!(catalog.requesting("auth").is_none());
    }
}
