//! The generic per-stage handler chain: a concurrency-safe name registry
//! feeding an atomically swapped dispatch snapshot.
//!
//! One chain backs each of the five lifecycle stages. Administrative calls
//! (`set`, `remove`, `reload`) mutate the registry and republish the
//! snapshot; the request path calls `invoke`, which takes a single atomic
//! reference load and iterates an immutable list. A reload racing with
//! traffic can never expose a torn or half-built handler list: readers see
//! either the old snapshot or the new one.

use crate::error::{PluginError, Result};
use crate::plugin::handler::PluginInfo;
use crate::plugin::stage::{ErrorPolicy, Stage, StageContext};
use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// One registry entry: the registration name, its position in the dispatch
/// order, and the resolved handler.
pub struct Registered<H: ?Sized> {
    pub name: Arc<str>,
    seq: u64,
    pub handler: Arc<H>,
}

impl<H: ?Sized> Clone for Registered<H> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            seq: self.seq,
            handler: self.handler.clone(),
        }
    }
}

/// Named handler set for one lifecycle stage.
///
/// Dispatch order is registration order: every name gets a sequence number
/// the first time it is set and keeps it across re-resolution, so a reload
/// never reshuffles the chain. Removing a name and setting it again puts it
/// at the end.
pub struct HandlerChain<H: ?Sized> {
    stage: Stage,
    route: Option<Arc<str>>,
    policy: ErrorPolicy,
    registry: DashMap<String, Registered<H>>,
    snapshot: ArcSwap<Vec<Registered<H>>>,
    next_seq: AtomicU64,
}

impl<H: ?Sized + Send + Sync> HandlerChain<H> {
    pub fn new(stage: Stage, route: Option<Arc<str>>) -> Self {
        Self {
            stage,
            route,
            policy: stage.default_error_policy(),
            registry: DashMap::new(),
            snapshot: ArcSwap::from_pointee(Vec::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.policy
    }

    pub(crate) fn set_error_policy(&mut self, policy: ErrorPolicy) {
        self.policy = policy;
    }

    fn route_label(&self) -> &str {
        self.route.as_deref().unwrap_or("*")
    }

    /// Upsert `name` with the handler the catalog resolved for it.
    ///
    /// `None` means the catalog does not know the name: the chain is left
    /// untouched and a warning is emitted. Returns whether the chain
    /// changed.
    pub fn set(&self, name: &str, resolved: Option<Arc<H>>) -> bool {
        let Some(handler) = resolved else {
            warn!(
                stage = %self.stage,
                route = self.route_label(),
                name,
                "handler not found in catalog"
            );
            return false;
        };
        // The entry guard must drop before republish touches the map again.
        match self.registry.entry(name.to_string()) {
            Entry::Occupied(mut occupied) => {
                let seq = occupied.get().seq;
                occupied.insert(Registered {
                    name: Arc::from(name),
                    seq,
                    handler,
                });
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Registered {
                    name: Arc::from(name),
                    seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
                    handler,
                });
            }
        }
        self.republish();
        info!(
            stage = %self.stage,
            route = self.route_label(),
            name,
            "handler loaded"
        );
        true
    }

    /// Remove `name` if registered. Absent names are a silent no-op.
    pub fn remove(&self, name: &str) {
        if self.registry.remove(name).is_some() {
            self.republish();
            info!(
                stage = %self.stage,
                route = self.route_label(),
                name,
                "handler removed"
            );
        }
    }

    /// Re-resolve every currently registered name through `resolve`.
    ///
    /// Works from a stable key-set snapshot taken up front. Names that no
    /// longer resolve are warned about and keep their current handler; a
    /// reload never removes anything.
    pub fn reload<F>(&self, resolve: F)
    where
        F: Fn(&str) -> Option<Arc<H>>,
    {
        let names: Vec<String> = self.registry.iter().map(|entry| entry.key().clone()).collect();
        for name in names {
            self.set(&name, resolve(&name));
        }
    }

    /// Rebuild the dispatch snapshot from the registry and publish it with
    /// one atomic reference swap. In-flight invocations keep whatever list
    /// they already loaded.
    fn republish(&self) {
        let mut entries: Vec<Registered<H>> = self
            .registry
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_unstable_by_key(|registered| registered.seq);
        self.snapshot.store(Arc::new(entries));
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.load().is_empty()
    }

    /// Diagnostics projection of the registered handlers, in dispatch
    /// order. Computed on demand.
    pub fn infos<F>(&self, describe: F) -> Vec<PluginInfo>
    where
        F: Fn(&H) -> PluginInfo,
    {
        self.snapshot
            .load()
            .iter()
            .map(|registered| describe(registered.handler.as_ref()))
            .collect()
    }

    /// Invoke every handler in snapshot order.
    ///
    /// The snapshot reference is read exactly once, so concurrent `set` or
    /// `remove` calls never affect an invocation already underway. For
    /// cancellable contexts the flag gates each call; a handler that
    /// cancels skips the rest. Returns whether the pipeline should continue
    /// (`!cancelled`), or the first handler failure when the stage's policy
    /// propagates. Under `LogAndContinue`, failures and panics are logged
    /// at error level and the remaining handlers still run.
    pub fn invoke<C, F>(&self, ctx: &mut C, mut exec: F) -> Result<bool>
    where
        C: StageContext,
        F: FnMut(&H, &mut C) -> anyhow::Result<()>,
    {
        let items = self.snapshot.load_full();
        for registered in items.iter() {
            if ctx.is_cancelled() {
                break;
            }
            let outcome = match self.policy {
                ErrorPolicy::Propagate => exec(registered.handler.as_ref(), ctx),
                ErrorPolicy::LogAndContinue => {
                    match panic::catch_unwind(AssertUnwindSafe(|| {
                        exec(registered.handler.as_ref(), ctx)
                    })) {
                        Ok(result) => result,
                        Err(payload) => Err(anyhow::anyhow!(panic_message(payload))),
                    }
                }
            };
            if let Err(source) = outcome {
                match self.policy {
                    ErrorPolicy::Propagate => {
                        return Err(PluginError::Execution {
                            stage: self.stage,
                            name: registered.name.to_string(),
                            source,
                        });
                    }
                    ErrorPolicy::LogAndContinue => {
                        error!(
                            stage = %self.stage,
                            route = self.route_label(),
                            name = %registered.name,
                            error = format!("{source:#}"),
                            "handler failed"
                        );
                    }
                }
            }
        }
        Ok(!ctx.is_cancelled())
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_string()
    }
}
