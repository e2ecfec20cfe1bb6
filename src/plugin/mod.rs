//! Extension-point dispatch for the gateway request pipeline.
//!
//! Named handlers attach to five fixed points in the request lifecycle and
//! run, in registration order, on every request that crosses that point:
//!
//! - `Requesting`: before routing; may cancel the request
//! - `AgentRequesting`: after backend selection, before forwarding; may cancel
//! - `HeaderWriting`: while the outbound response headers are written
//! - `Requested`: after completion, with status, backend, and timing known
//! - `ResponseError`: when the gateway emits an error response
//!
//! Handler sets are mutated rarely (administrative calls, catalog reloads)
//! but read on every request, so each chain keeps its registry in a
//! concurrent map and publishes an immutable dispatch snapshot through an
//! atomic reference swap; the request path takes no lock.
//!
//! # Modules
//!
//! - `stage`: lifecycle stages, error policies, per-invocation contexts
//! - `handler`: handler capability traits and the `PluginInfo` projection
//! - `catalog`: the name-resolution boundary and an in-memory catalog
//! - `chain`: the generic registry + snapshot mechanism
//! - `dispatcher`: the five-chain aggregate the pipeline calls into
//! - `config`: per-stage assignment configuration

pub mod catalog;
pub mod chain;
pub mod config;
pub mod dispatcher;
pub mod handler;
pub mod stage;

pub use catalog::{MemoryCatalog, PluginCatalog};
pub use chain::HandlerChain;
pub use config::{PluginAssignment, PluginsConfig};
pub use dispatcher::PluginDispatcher;
pub use handler::{
    AgentRequestingHandler, HeaderWritingHandler, Plugin, PluginInfo, RequestedHandler,
    RequestingHandler, ResponseErrorHandler,
};
pub use stage::{
    AgentRequestingContext, ErrorPolicy, HeaderWritingContext, RequestCompletedContext,
    RequestingContext, ResponseErrorContext, Stage, StageContext,
};
