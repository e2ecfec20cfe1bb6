//! Lifecycle stages, per-stage error policy, and the per-invocation
//! contexts handed to handlers.

use crate::types::{GatewayRequest, GatewayResponse, Upstream};
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The fixed extension points in the request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    /// Before routing, first thing on an inbound request.
    Requesting,
    /// After a backend has been selected, before the request is forwarded.
    AgentRequesting,
    /// While the outbound response headers are being written.
    HeaderWriting,
    /// After the request completed and the outcome is known.
    Requested,
    /// When the gateway produces an error response.
    ResponseError,
}

impl Stage {
    /// Stages whose context carries a cancellation flag.
    pub fn cancellable(self) -> bool {
        matches!(self, Stage::Requesting | Stage::AgentRequesting)
    }

    /// Default handler-error policy for this stage.
    ///
    /// `Requested` and `ResponseError` handlers run after the request's
    /// outcome is already decided, so their failures are logged and
    /// swallowed; everywhere else a failing handler surfaces to the
    /// pipeline.
    pub fn default_error_policy(self) -> ErrorPolicy {
        match self {
            Stage::Requested | Stage::ResponseError => ErrorPolicy::LogAndContinue,
            _ => ErrorPolicy::Propagate,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Stage::Requesting => "requesting",
            Stage::AgentRequesting => "agent requesting",
            Stage::HeaderWriting => "header writing",
            Stage::Requested => "requested",
            Stage::ResponseError => "response error",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a chain does when one of its handlers fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorPolicy {
    /// Abort the invocation and surface the error to the pipeline.
    Propagate,
    /// Log the failure (including panics) and keep invoking the remaining
    /// handlers.
    LogAndContinue,
}

/// The view a chain needs over any stage context during invocation.
pub trait StageContext {
    /// Whether a previous handler short-circuited this invocation.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Context for the pre-routing stage.
pub struct RequestingContext<'a> {
    pub request: &'a mut GatewayRequest,
    pub response: &'a mut GatewayResponse,
    cancelled: bool,
}

impl<'a> RequestingContext<'a> {
    pub fn new(request: &'a mut GatewayRequest, response: &'a mut GatewayResponse) -> Self {
        Self {
            request,
            response,
            cancelled: false,
        }
    }

    /// Skip the remaining handlers and tell the pipeline to stop normal
    /// processing of this request.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }
}

impl StageContext for RequestingContext<'_> {
    fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Context for the pre-forward stage, after backend selection.
pub struct AgentRequestingContext<'a> {
    pub request: &'a mut GatewayRequest,
    pub response: &'a mut GatewayResponse,
    pub upstream: &'a Upstream,
    /// URL of the route this dispatcher belongs to, if any.
    pub route: Option<&'a str>,
    cancelled: bool,
}

impl<'a> AgentRequestingContext<'a> {
    pub fn new(
        request: &'a mut GatewayRequest,
        response: &'a mut GatewayResponse,
        upstream: &'a Upstream,
        route: Option<&'a str>,
    ) -> Self {
        Self {
            request,
            response,
            upstream,
            route,
            cancelled: false,
        }
    }

    /// Skip the remaining handlers and stop the request from being
    /// forwarded to the backend.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }
}

impl StageContext for AgentRequestingContext<'_> {
    fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Context for the header-writing stage. `headers` is the outbound header
/// map being built; handlers mutate it in place.
pub struct HeaderWritingContext<'a> {
    pub request: &'a GatewayRequest,
    pub response: &'a GatewayResponse,
    pub headers: &'a mut HeaderMap,
}

impl StageContext for HeaderWritingContext<'_> {}

/// Context for the post-completion stage.
pub struct RequestCompletedContext<'a> {
    /// URL of the route this dispatcher belongs to, if any.
    pub route: Option<&'a str>,
    pub request: &'a GatewayRequest,
    pub response: &'a GatewayResponse,
    pub status: StatusCode,
    /// Backend that served the request, if one was reached.
    pub upstream: Option<&'a Upstream>,
    pub elapsed: Duration,
}

impl StageContext for RequestCompletedContext<'_> {}

/// Context for the error-response stage.
pub struct ResponseErrorContext<'a> {
    pub request: &'a GatewayRequest,
    pub response: &'a mut GatewayResponse,
    pub status: StatusCode,
    pub message: &'a str,
}

impl StageContext for ResponseErrorContext<'_> {}
