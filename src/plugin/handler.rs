//! Handler capability traits, one per lifecycle stage, plus the read-only
//! projection exposed for diagnostics.

use crate::plugin::stage::{
    AgentRequestingContext, HeaderWritingContext, RequestCompletedContext, RequestingContext,
    ResponseErrorContext,
};
use serde::Serialize;

/// Identity surface every handler carries.
pub trait Plugin: Send + Sync {
    /// Unique, case-sensitive name the catalog resolves.
    fn name(&self) -> &str;

    /// Human-readable description for diagnostics.
    fn description(&self) -> &str {
        ""
    }
}

/// Runs before routing; may cancel the request.
pub trait RequestingHandler: Plugin {
    fn execute(&self, ctx: &mut RequestingContext<'_>) -> anyhow::Result<()>;
}

/// Runs after backend selection, before the request is forwarded; may
/// cancel the forward.
pub trait AgentRequestingHandler: Plugin {
    fn execute(&self, ctx: &mut AgentRequestingContext<'_>) -> anyhow::Result<()>;
}

/// Runs while the outbound response headers are being written.
pub trait HeaderWritingHandler: Plugin {
    fn execute(&self, ctx: &mut HeaderWritingContext<'_>) -> anyhow::Result<()>;
}

/// Runs after the request completed. Failures are logged and swallowed
/// under the default policy; the response is already decided by then.
pub trait RequestedHandler: Plugin {
    fn execute(&self, ctx: &mut RequestCompletedContext<'_>) -> anyhow::Result<()>;
}

/// Runs when the gateway emits an error response. Failures are logged and
/// swallowed under the default policy.
pub trait ResponseErrorHandler: Plugin {
    fn execute(&self, ctx: &mut ResponseErrorContext<'_>) -> anyhow::Result<()>;
}

/// Read-only projection of a registered handler, for monitoring surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginInfo {
    pub name: String,
    pub description: String,
}

impl PluginInfo {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}
