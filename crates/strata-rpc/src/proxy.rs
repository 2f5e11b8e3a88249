use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use hashbrown::HashMap;

use crate::error::RpcError;
use crate::message::Outbox;
use crate::value::Value;

static NEXT_PROXY_ID: AtomicU64 = AtomicU64::new(1);

/// Host-side object reachable through a proxy. Calls are fire-and-forget:
/// the caller never sees the result.
pub trait ProxyTarget: Send + Sync {
    fn call(&self, function: &str, arguments: Vec<Value>) -> Result<(), RpcError>;
}

#[derive(Clone)]
enum Route {
    Local(Arc<dyn ProxyTarget>),
    Remote(Outbox),
}

/// Callable handle to an object that may live in another context.
#[derive(Clone)]
pub struct ProxyHandle {
    id: u64,
    route: Route,
}

impl ProxyHandle {
    /// Wraps a host object; the id is unique within the process.
    pub fn local(target: Arc<dyn ProxyTarget>) -> Self {
        Self {
            id: NEXT_PROXY_ID.fetch_add(1, Ordering::Relaxed),
            route: Route::Local(target),
        }
    }

    pub(crate) fn remote(id: u64, outbox: Outbox) -> Self {
        Self {
            id,
            route: Route::Remote(outbox),
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn is_local(&self) -> bool {
        matches!(self.route, Route::Local(_))
    }

    pub fn call(&self, function: &str, arguments: Vec<Value>) -> Result<(), RpcError> {
        match &self.route {
            Route::Local(target) => target.call(function, arguments),
            Route::Remote(outbox) => outbox.post_proxy_call(self.id, function, arguments),
        }
    }

    fn target(&self) -> Option<Arc<dyn ProxyTarget>> {
        match &self.route {
            Route::Local(target) => Some(target.clone()),
            Route::Remote(_) => None,
        }
    }
}

impl fmt::Debug for ProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyHandle")
            .field("id", &self.id)
            .field("local", &self.is_local())
            .finish()
    }
}

/// Local proxies a thread has handed out, by id.
#[derive(Clone, Default)]
pub struct ProxyRegistry {
    targets: Arc<Mutex<HashMap<u64, Arc<dyn ProxyTarget>>>>,
}

impl ProxyRegistry {
    pub fn register(&self, handle: &ProxyHandle) {
        if let Some(target) = handle.target() {
            self.targets
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(handle.id, target);
        }
    }

    /// Registers every local proxy found anywhere inside `value`.
    pub fn register_all(&self, value: &Value) {
        match value {
            Value::Proxy(handle) => self.register(handle),
            Value::Array(items) => items.iter().for_each(|v| self.register_all(v)),
            Value::Object(map) => map.values().for_each(|v| self.register_all(v)),
            _ => {}
        }
    }

    pub fn get(&self, id: u64) -> Option<ProxyHandle> {
        let targets = self.targets.lock().unwrap_or_else(PoisonError::into_inner);
        targets.get(&id).map(|target| ProxyHandle {
            id,
            route: Route::Local(target.clone()),
        })
    }

    pub fn len(&self) -> usize {
        self.targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
