//! Integration tests for the plugin dispatcher.
//!
//! Covers the end-to-end behaviors the gateway pipeline relies on:
//! - cancellation short-circuits a chain and keeps doing so as it grows
//! - post-outcome stages swallow handler failures
//! - reload against a changed catalog
//! - configuration-driven registration
//! - snapshot reads racing administrative mutation

use http::{Method, StatusCode, Uri};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use swarm_gateway::plugin::{
    ErrorPolicy, MemoryCatalog, Plugin, PluginDispatcher, PluginsConfig, RequestCompletedContext,
    RequestingContext, RequestingHandler, RequestedHandler, ResponseErrorContext,
    ResponseErrorHandler, Stage,
};
use swarm_gateway::types::{GatewayRequest, GatewayResponse, Upstream};

fn request() -> GatewayRequest {
    GatewayRequest::new(Method::GET, Uri::from_static("/api/widgets"))
}

struct Scripted {
    name: &'static str,
    cancel: bool,
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl Scripted {
    fn new(
        name: &'static str,
        cancel: bool,
        calls: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            cancel,
            calls: calls.clone(),
        })
    }
}

impl Plugin for Scripted {
    fn name(&self) -> &str {
        self.name
    }
}

impl RequestingHandler for Scripted {
    fn execute(&self, ctx: &mut RequestingContext<'_>) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(self.name);
        if self.cancel {
            ctx.cancel();
        }
        Ok(())
    }
}

struct Exploding {
    calls: Arc<AtomicUsize>,
}

impl Plugin for Exploding {
    fn name(&self) -> &str {
        "exploding"
    }
}

impl ResponseErrorHandler for Exploding {
    fn execute(&self, _ctx: &mut ResponseErrorContext<'_>) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("always fails")
    }
}

struct Tail {
    calls: Arc<AtomicUsize>,
}

impl Plugin for Tail {
    fn name(&self) -> &str {
        "tail"
    }
}

impl ResponseErrorHandler for Tail {
    fn execute(&self, _ctx: &mut ResponseErrorContext<'_>) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Timing {
    seen_upstream: Arc<Mutex<Option<Upstream>>>,
}

impl Plugin for Timing {
    fn name(&self) -> &str {
        "timing"
    }

    fn description(&self) -> &str {
        "records the backend that served the request"
    }
}

impl RequestedHandler for Timing {
    fn execute(&self, ctx: &mut RequestCompletedContext<'_>) -> anyhow::Result<()> {
        assert_eq!(ctx.request.path(), "/api/widgets");
        assert!(ctx.elapsed > Duration::ZERO);
        *self.seen_upstream.lock().unwrap() = ctx.upstream.cloned();
        Ok(())
    }
}

#[test]
fn cancellation_short_circuits_and_stays_short_circuited() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.register_requesting(Scripted::new("h1", false, &calls));
    catalog.register_requesting(Scripted::new("h2", true, &calls));
    catalog.register_requesting(Scripted::new("h3", false, &calls));

    let dispatcher = PluginDispatcher::for_route(catalog, "/api/*");
    dispatcher.set_requesting("h1");
    dispatcher.set_requesting("h2");

    let mut req = request();
    let mut resp = GatewayResponse::new();
    assert!(!dispatcher.requesting(&mut req, &mut resp).unwrap());
    assert_eq!(*calls.lock().unwrap(), ["h1", "h2"]);

    // A handler registered after the cancelling one is still skipped.
    dispatcher.set_requesting("h3");
    calls.lock().unwrap().clear();
    assert!(!dispatcher.requesting(&mut req, &mut resp).unwrap());
    assert_eq!(*calls.lock().unwrap(), ["h1", "h2"]);
}

#[test]
fn response_error_handler_failure_is_contained() {
    let exploding_calls = Arc::new(AtomicUsize::new(0));
    let tail_calls = Arc::new(AtomicUsize::new(0));
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.register_response_error(Arc::new(Exploding {
        calls: exploding_calls.clone(),
    }));
    catalog.register_response_error(Arc::new(Tail {
        calls: tail_calls.clone(),
    }));

    let dispatcher = PluginDispatcher::new(catalog);
    dispatcher.set_response_error("exploding");
    dispatcher.set_response_error("tail");

    let req = request();
    let mut resp = GatewayResponse::new();
    dispatcher
        .response_error(&req, &mut resp, StatusCode::BAD_GATEWAY, "upstream unreachable")
        .unwrap();
    assert_eq!(exploding_calls.load(Ordering::SeqCst), 1);
    assert_eq!(tail_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn requested_sees_backend_and_timing() {
    let seen = Arc::new(Mutex::new(None));
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.register_requested(Arc::new(Timing {
        seen_upstream: seen.clone(),
    }));

    let dispatcher = PluginDispatcher::new(catalog);
    dispatcher.set_requested("timing");

    let req = request();
    let resp = GatewayResponse::new();
    let upstream = Upstream::new("widgets-1", "10.0.0.7:8080");
    dispatcher
        .requested(&req, &resp, Some(&upstream), Duration::from_millis(12))
        .unwrap();
    assert_eq!(seen.lock().unwrap().as_ref(), Some(&upstream));
}

#[test]
fn config_drives_registration_and_policy() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let exploding_calls = Arc::new(AtomicUsize::new(0));
    let catalog = Arc::new(MemoryCatalog::new());
    catalog.register_requesting(Scripted::new("auth", false, &calls));
    catalog.register_requesting(Scripted::new("audit", false, &calls));
    catalog.register_response_error(Arc::new(Exploding {
        calls: exploding_calls.clone(),
    }));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plugins.yaml");
    std::fs::write(
        &path,
        r#"
requesting:
  - name: auth
  - name: audit
    enabled: false
  - name: not-in-catalog
responseError:
  - name: exploding
errorPolicy:
  responseError: propagate
"#,
    )
    .unwrap();

    let config = PluginsConfig::load(&path).unwrap();
    let mut dispatcher = PluginDispatcher::new(catalog);
    config.apply(&mut dispatcher);

    // Disabled and unresolvable names never made it into the chain.
    let names: Vec<String> = dispatcher
        .requesting_infos()
        .into_iter()
        .map(|info| info.name)
        .collect();
    assert_eq!(names, ["auth"]);

    // The override flips response-error failures from swallowed to fatal.
    assert_eq!(
        config.error_policy.get(&Stage::ResponseError),
        Some(&ErrorPolicy::Propagate)
    );
    let req = request();
    let mut resp = GatewayResponse::new();
    assert!(dispatcher
        .response_error(&req, &mut resp, StatusCode::BAD_GATEWAY, "boom")
        .is_err());
}

#[test]
fn invocations_race_mutation_without_tearing() {
    swarm_gateway::logging::init();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let catalog = Arc::new(MemoryCatalog::new());
    for name in ["p0", "p1", "p2", "p3"] {
        catalog.register_requesting(Scripted::new(name, false, &calls));
    }

    let dispatcher = Arc::new(PluginDispatcher::new(catalog));
    dispatcher.set_requesting("p0");

    let stop = Arc::new(AtomicBool::new(false));
    std::thread::scope(|scope| {
        {
            let dispatcher = dispatcher.clone();
            let stop = stop.clone();
            scope.spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    for name in ["p1", "p2", "p3"] {
                        dispatcher.set_requesting(name);
                    }
                    for name in ["p1", "p2", "p3"] {
                        dispatcher.remove_requesting(name);
                    }
                }
            });
        }

        for _ in 0..4 {
            let dispatcher = dispatcher.clone();
            let stop = stop.clone();
            scope.spawn(move || {
                let mut req = request();
                let mut resp = GatewayResponse::new();
                for _ in 0..2_000 {
                    // Every invocation must complete against a coherent
                    // snapshot, whatever the writer is doing.
                    assert!(dispatcher.requesting(&mut req, &mut resp).unwrap());
                }
                stop.store(true, Ordering::Relaxed);
            });
        }
    });

    // "p0" was never removed, so it ran in every invocation.
    assert!(calls.lock().unwrap().iter().any(|name| *name == "p0"));
}
