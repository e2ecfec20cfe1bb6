//! Gateway value types shared by the stage contexts.
//!
//! The HTTP transport, routing table, and load balancer live outside this
//! crate; these are the minimal shapes their data crosses the plugin
//! boundary in.

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};

/// An inbound request as seen by plugin handlers.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl GatewayRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Request path, without the query string.
    pub fn path(&self) -> &str {
        self.uri.path()
    }
}

/// The response being assembled for the client.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl GatewayResponse {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for GatewayResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

/// The backend server the load balancer picked for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub name: String,
    pub address: String,
}

impl Upstream {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}
