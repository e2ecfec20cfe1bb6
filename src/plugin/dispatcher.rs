//! The dispatcher aggregate: one handler chain per lifecycle stage plus
//! the administrative surface the gateway drives.

use crate::error::Result;
use crate::plugin::catalog::PluginCatalog;
use crate::plugin::chain::HandlerChain;
use crate::plugin::handler::{
    AgentRequestingHandler, HeaderWritingHandler, PluginInfo, RequestedHandler, RequestingHandler,
    ResponseErrorHandler,
};
use crate::plugin::stage::{
    AgentRequestingContext, ErrorPolicy, HeaderWritingContext, RequestCompletedContext,
    RequestingContext, ResponseErrorContext, Stage,
};
use crate::types::{GatewayRequest, GatewayResponse, Upstream};
use http::{HeaderMap, StatusCode};
use std::sync::Arc;
use std::time::Duration;

/// Per-route (or gateway-wide) plugin dispatch.
///
/// Owns the five stage chains and the catalog handle used to resolve
/// names. Administrative calls (`set_*`, `remove_*`, `reload`) are safe to
/// run concurrently with request traffic; the invocation methods read each
/// chain's snapshot without locking.
pub struct PluginDispatcher {
    catalog: Arc<dyn PluginCatalog>,
    route: Option<Arc<str>>,
    requesting: HandlerChain<dyn RequestingHandler>,
    agent_requesting: HandlerChain<dyn AgentRequestingHandler>,
    header_writing: HandlerChain<dyn HeaderWritingHandler>,
    requested: HandlerChain<dyn RequestedHandler>,
    response_error: HandlerChain<dyn ResponseErrorHandler>,
}

impl PluginDispatcher {
    /// Dispatcher for the gateway-wide chain (no owning route).
    pub fn new(catalog: Arc<dyn PluginCatalog>) -> Self {
        Self::build(catalog, None)
    }

    /// Dispatcher owned by one route; the URL shows up in administrative
    /// logs for traceability.
    pub fn for_route(catalog: Arc<dyn PluginCatalog>, url: &str) -> Self {
        Self::build(catalog, Some(Arc::from(url)))
    }

    fn build(catalog: Arc<dyn PluginCatalog>, route: Option<Arc<str>>) -> Self {
        Self {
            requesting: HandlerChain::new(Stage::Requesting, route.clone()),
            agent_requesting: HandlerChain::new(Stage::AgentRequesting, route.clone()),
            header_writing: HandlerChain::new(Stage::HeaderWriting, route.clone()),
            requested: HandlerChain::new(Stage::Requested, route.clone()),
            response_error: HandlerChain::new(Stage::ResponseError, route.clone()),
            catalog,
            route,
        }
    }

    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    /// Override one stage's handler-error policy. Call while configuring,
    /// before the dispatcher is shared with the request pipeline.
    pub fn set_error_policy(&mut self, stage: Stage, policy: ErrorPolicy) {
        match stage {
            Stage::Requesting => self.requesting.set_error_policy(policy),
            Stage::AgentRequesting => self.agent_requesting.set_error_policy(policy),
            Stage::HeaderWriting => self.header_writing.set_error_policy(policy),
            Stage::Requested => self.requested.set_error_policy(policy),
            Stage::ResponseError => self.response_error.set_error_policy(policy),
        }
    }

    // Administrative surface. Unknown names degrade to a warning from the
    // chain; nothing here returns an error.

    pub fn set_requesting(&self, name: &str) {
        self.requesting.set(name, self.catalog.requesting(name));
    }

    pub fn remove_requesting(&self, name: &str) {
        self.requesting.remove(name);
    }

    pub fn requesting_infos(&self) -> Vec<PluginInfo> {
        self.requesting
            .infos(|handler| PluginInfo::new(handler.name(), handler.description()))
    }

    pub fn set_agent_requesting(&self, name: &str) {
        self.agent_requesting
            .set(name, self.catalog.agent_requesting(name));
    }

    pub fn remove_agent_requesting(&self, name: &str) {
        self.agent_requesting.remove(name);
    }

    pub fn agent_requesting_infos(&self) -> Vec<PluginInfo> {
        self.agent_requesting
            .infos(|handler| PluginInfo::new(handler.name(), handler.description()))
    }

    pub fn set_header_writing(&self, name: &str) {
        self.header_writing
            .set(name, self.catalog.header_writing(name));
    }

    pub fn remove_header_writing(&self, name: &str) {
        self.header_writing.remove(name);
    }

    pub fn header_writing_infos(&self) -> Vec<PluginInfo> {
        self.header_writing
            .infos(|handler| PluginInfo::new(handler.name(), handler.description()))
    }

    pub fn set_requested(&self, name: &str) {
        self.requested.set(name, self.catalog.requested(name));
    }

    pub fn remove_requested(&self, name: &str) {
        self.requested.remove(name);
    }

    pub fn requested_infos(&self) -> Vec<PluginInfo> {
        self.requested
            .infos(|handler| PluginInfo::new(handler.name(), handler.description()))
    }

    pub fn set_response_error(&self, name: &str) {
        self.response_error
            .set(name, self.catalog.response_error(name));
    }

    pub fn remove_response_error(&self, name: &str) {
        self.response_error.remove(name);
    }

    pub fn response_error_infos(&self) -> Vec<PluginInfo> {
        self.response_error
            .infos(|handler| PluginInfo::new(handler.name(), handler.description()))
    }

    /// Re-resolve every registered name against the catalog, stage by
    /// stage in a fixed order so reload logs are reproducible. Names the
    /// catalog no longer knows keep their current handler.
    pub fn reload(&self) {
        self.response_error
            .reload(|name| self.catalog.response_error(name));
        self.agent_requesting
            .reload(|name| self.catalog.agent_requesting(name));
        self.header_writing
            .reload(|name| self.catalog.header_writing(name));
        self.requested.reload(|name| self.catalog.requested(name));
        self.requesting.reload(|name| self.catalog.requesting(name));
    }

    // Invocation surface, one entry point per stage. Empty chains return
    // without building a context.

    /// Pre-routing extension point. Returns whether the pipeline should
    /// continue processing the request.
    pub fn requesting(
        &self,
        request: &mut GatewayRequest,
        response: &mut GatewayResponse,
    ) -> Result<bool> {
        if self.requesting.is_empty() {
            return Ok(true);
        }
        let mut ctx = RequestingContext::new(request, response);
        self.requesting
            .invoke(&mut ctx, |handler, ctx| handler.execute(ctx))
    }

    /// Pre-forward extension point, after backend selection. Returns
    /// whether the request should still be forwarded.
    pub fn agent_requesting(
        &self,
        request: &mut GatewayRequest,
        response: &mut GatewayResponse,
        upstream: &Upstream,
    ) -> Result<bool> {
        if self.agent_requesting.is_empty() {
            return Ok(true);
        }
        let mut ctx =
            AgentRequestingContext::new(request, response, upstream, self.route.as_deref());
        self.agent_requesting
            .invoke(&mut ctx, |handler, ctx| handler.execute(ctx))
    }

    /// Header-writing extension point. `headers` is the outbound header
    /// map being built.
    pub fn header_writing(
        &self,
        request: &GatewayRequest,
        response: &GatewayResponse,
        headers: &mut HeaderMap,
    ) -> Result<()> {
        if self.header_writing.is_empty() {
            return Ok(());
        }
        let mut ctx = HeaderWritingContext {
            request,
            response,
            headers,
        };
        self.header_writing
            .invoke(&mut ctx, |handler, ctx| handler.execute(ctx))
            .map(|_| ())
    }

    /// Post-completion extension point. Under the default policy handler
    /// failures are logged and swallowed, so this only returns an error if
    /// the stage was reconfigured to propagate.
    pub fn requested(
        &self,
        request: &GatewayRequest,
        response: &GatewayResponse,
        upstream: Option<&Upstream>,
        elapsed: Duration,
    ) -> Result<()> {
        if self.requested.is_empty() {
            return Ok(());
        }
        let mut ctx = RequestCompletedContext {
            route: self.route.as_deref(),
            request,
            response,
            status: response.status,
            upstream,
            elapsed,
        };
        self.requested
            .invoke(&mut ctx, |handler, ctx| handler.execute(ctx))
            .map(|_| ())
    }

    /// Error-response extension point. Same policy behavior as
    /// [`requested`](Self::requested).
    pub fn response_error(
        &self,
        request: &GatewayRequest,
        response: &mut GatewayResponse,
        status: StatusCode,
        message: &str,
    ) -> Result<()> {
        if self.response_error.is_empty() {
            return Ok(());
        }
        let mut ctx = ResponseErrorContext {
            request,
            response,
            status,
            message,
        };
        self.response_error
            .invoke(&mut ctx, |handler, ctx| handler.execute(ctx))
            .map(|_| ())
    }
}
