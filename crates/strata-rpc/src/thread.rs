use std::any::Any;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use hashbrown::HashMap;
use rayon::ThreadPoolBuilder;
use strata_chunk::SharedBuffer;

use crate::encoder::{DecodeContext, PacketEncoder};
use crate::error::RpcError;
use crate::message::{Envelope, Message, Outbox, Signatures, epoch_millis};
use crate::proxy::ProxyRegistry;
use crate::service::{Command, Service, ServiceContext};
use crate::value::Value;

type Reply = Result<Value, RpcError>;

#[derive(Clone, Debug)]
pub struct ThreadOptions {
    /// Size of the worker's call pool.
    pub workers: usize,
    pub handshake_timeout: Duration,
}

impl Default for ThreadOptions {
    fn default() -> Self {
        Self {
            workers: 2,
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

/// Host-side state shared with the router thread.
struct Host {
    name: String,
    encoder: Arc<PacketEncoder>,
    proxies: ProxyRegistry,
    pending: Mutex<HashMap<(String, u64), Sender<Reply>>>,
}

impl Host {
    fn decode(&self, json: &serde_json::Value, shared: &[SharedBuffer]) -> Reply {
        let cx = DecodeContext::new(shared).with_proxies(&self.proxies);
        self.encoder.decode(json, &cx)
    }

    fn settle(&self, function: String, timestamp: u64, reply: Reply) {
        let waiter = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(function, timestamp));
        match waiter {
            Some(tx) => {
                let _ = tx.send(reply);
            }
            None => log::warn!(target: "rpc", "[{}] reply for unknown call {timestamp}", self.name),
        }
    }

    fn route(&self, envelope: Envelope) {
        let correlation = envelope.correlation();
        match envelope.open() {
            Ok((message, shared)) => self.dispatch(message, &shared),
            Err(e) => match correlation {
                Some((function, timestamp)) => self.settle(function, timestamp, Err(e)),
                None => log::error!(target: "rpc", "[{}] dropped a packet: {e}", self.name),
            },
        }
    }

    fn dispatch(&self, message: Message, shared: &[SharedBuffer]) {
        match message {
            Message::ReturnData {
                function,
                value,
                timestamp,
            } => {
                let reply = self.decode(&value, shared);
                self.settle(function, timestamp, reply);
            }
            Message::Error {
                value,
                function: Some(function),
                timestamp: Some(timestamp),
            } => self.settle(function, timestamp, Err(RpcError::Remote(value))),
            Message::Error { value, .. } => log::error!(target: "rpc", "[{}] {value}", self.name),
            Message::Log { value } => log::info!(target: "rpc", "[{}] {value}", self.name),
            Message::ProxyFunctionCall {
                proxy_id,
                function,
                arguments,
                ..
            } => {
                let Some(proxy) = self.proxies.get(proxy_id) else {
                    log::warn!(target: "rpc", "[{}] call to unknown proxy {proxy_id}", self.name);
                    return;
                };
                let result = self
                    .decode(&arguments, shared)
                    .and_then(|args| proxy.call(&function, args.into_list()));
                if let Err(e) = result {
                    log::warn!(target: "rpc", "[{}] proxy {proxy_id}.{function} failed: {e}", self.name);
                }
            }
            other => {
                log::warn!(target: "rpc", "[{}] unexpected {} message", self.name, other.kind())
            }
        }
    }

    fn fail_pending(&self) {
        let drained: Vec<_> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        for (_, tx) in drained {
            let _ = tx.send(Err(RpcError::Disconnected));
        }
    }
}

/// A call in flight.
pub struct PendingCall {
    function: String,
    rx: Receiver<Reply>,
}

impl PendingCall {
    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn wait(self) -> Reply {
        self.rx.recv().map_err(|_| RpcError::Disconnected)?
    }

    pub fn wait_timeout(self, timeout: Duration) -> Reply {
        match self.rx.recv_timeout(timeout) {
            Ok(reply) => reply,
            Err(RecvTimeoutError::Timeout) => Err(RpcError::CallTimeout {
                function: self.function,
                timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(RpcError::Disconnected),
        }
    }
}

/// Client for a `Service` running on its own thread. Dropping it closes the
/// channel and the worker exits once in-flight calls finish.
pub struct Thread<S: Service> {
    host: Arc<Host>,
    functions: Vec<String>,
    to_worker: Sender<Envelope>,
    clock: AtomicU64,
    _service: PhantomData<fn() -> S>,
}

impl<S: Service> Thread<S> {
    pub fn spawn(arguments: Vec<Value>) -> Result<Self, RpcError> {
        Self::spawn_with(arguments, ThreadOptions::default())
    }

    pub fn spawn_with(arguments: Vec<Value>, options: ThreadOptions) -> Result<Self, RpcError> {
        let encoder = Arc::new(PacketEncoder::standard());
        let (to_worker, worker_rx) = unbounded::<Envelope>();
        let (worker_tx, from_worker) = unbounded::<Envelope>();

        let host = Arc::new(Host {
            name: S::NAME.to_string(),
            encoder: encoder.clone(),
            proxies: ProxyRegistry::default(),
            pending: Mutex::new(HashMap::new()),
        });

        let workers = options.workers.max(1);
        let worker_outbox = Outbox::new(worker_tx, encoder.clone());
        thread::Builder::new()
            .name(format!("strata-{}", S::NAME))
            .spawn(move || run_worker::<S>(worker_rx, worker_outbox, workers))
            .map_err(|e| RpcError::Spawn(e.to_string()))?;

        let arguments = Value::Array(arguments);
        host.proxies.register_all(&arguments);
        let mut shared = Vec::new();
        let value = encoder.encode(&arguments, &mut shared)?;
        to_worker
            .send(Envelope::seal(&Message::ConstructorArguments { value }, shared)?)
            .map_err(|_| RpcError::Disconnected)?;

        let signatures = handshake(&host, &from_worker, options.handshake_timeout)?;
        log::info!(target: "rpc", "{} is loaded ({} functions)", signatures.name, signatures.functions.len());

        let router = host.clone();
        thread::Builder::new()
            .name(format!("strata-{}-router", S::NAME))
            .spawn(move || {
                while let Ok(envelope) = from_worker.recv() {
                    router.route(envelope);
                }
                router.fail_pending();
                log::debug!(target: "rpc", "[{}] worker channel closed", router.name);
            })
            .map_err(|e| RpcError::Spawn(e.to_string()))?;

        Ok(Self {
            host,
            functions: signatures.functions,
            to_worker,
            clock: AtomicU64::new(epoch_millis()),
            _service: PhantomData,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.host.name
    }

    /// Function names the worker reported.
    #[inline]
    pub fn functions(&self) -> &[String] {
        &self.functions
    }

    pub fn call(&self, command: S::Command) -> Result<PendingCall, RpcError> {
        let function = command.function();
        self.call_raw(function, command.into_arguments()?)
    }

    /// Calls by name; the name must be one the worker reported.
    pub fn call_raw(&self, function: &str, arguments: Vec<Value>) -> Result<PendingCall, RpcError> {
        if !self.functions.iter().any(|f| f == function) {
            return Err(RpcError::UnknownFunction {
                service: self.host.name.clone(),
                function: function.to_string(),
            });
        }

        let timestamp = self.clock.fetch_add(1, Ordering::Relaxed);
        let arguments = Value::Array(arguments);
        self.host.proxies.register_all(&arguments);
        let mut shared = Vec::new();
        let arguments = self.host.encoder.encode(&arguments, &mut shared)?;
        let envelope = Envelope::seal(
            &Message::FunctionCall {
                function: function.to_string(),
                arguments,
                timestamp,
            },
            shared,
        )?;

        let (tx, rx) = bounded(1);
        let key = (function.to_string(), timestamp);
        self.host
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), tx);
        if self.to_worker.send(envelope).is_err() {
            self.host
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
            return Err(RpcError::Disconnected);
        }

        Ok(PendingCall {
            function: function.to_string(),
            rx,
        })
    }

    /// Number of calls still waiting for a reply.
    pub fn in_flight(&self) -> usize {
        self.host
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn handshake(host: &Host, from_worker: &Receiver<Envelope>, timeout: Duration) -> Result<Signatures, RpcError> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match from_worker.recv_timeout(remaining) {
            Ok(envelope) => {
                let (message, shared) = envelope.open()?;
                match message {
                    Message::Signatures { value } => return Ok(value),
                    Message::Error { value, .. } => return Err(RpcError::Remote(value)),
                    // logs and proxy calls made during initialize
                    other => host.dispatch(other, &shared),
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                log::error!(
                    target: "rpc",
                    "[{}] Thread initialization timed out after {timeout:?}",
                    host.name
                );
                return Err(RpcError::Timeout {
                    service: host.name.clone(),
                    timeout,
                });
            }
            Err(RecvTimeoutError::Disconnected) => return Err(RpcError::Disconnected),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

fn run_worker<S: Service>(inbound: Receiver<Envelope>, outbox: Outbox, workers: usize) {
    let cx = ServiceContext::new(S::NAME, outbox.clone());
    let report = |value: String| {
        let message = Message::Error {
            value,
            function: None,
            timestamp: None,
        };
        let _ = outbox.send(&message, Vec::new());
    };

    let arguments = loop {
        let Ok(envelope) = inbound.recv() else {
            return;
        };
        match envelope.open() {
            Ok((Message::ConstructorArguments { value }, shared)) => {
                let dcx = DecodeContext::new(&shared).with_outbox(&outbox);
                match outbox.encoder().decode(&value, &dcx) {
                    Ok(args) => break args.into_list(),
                    Err(e) => return report(e.to_string()),
                }
            }
            Ok((other, _)) => {
                log::warn!(target: "rpc", "[{}] {} before constructor arguments", S::NAME, other.kind())
            }
            Err(e) => return report(e.to_string()),
        }
    };

    let service = match S::initialize(arguments, &cx) {
        Ok(service) => Arc::new(service),
        Err(e) => return report(format!("{} failed to initialize: {e}", S::NAME)),
    };
    let pool = match ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("strata-{}-{i}", S::NAME))
        .build()
    {
        Ok(pool) => pool,
        Err(e) => return report(e.to_string()),
    };

    let signatures = Message::Signatures {
        value: Signatures {
            name: S::NAME.to_string(),
            functions: S::Command::FUNCTIONS.iter().map(|f| f.to_string()).collect(),
        },
    };
    if outbox.send(&signatures, Vec::new()).is_err() {
        return;
    }

    while let Ok(envelope) = inbound.recv() {
        let (message, shared) = match envelope.open() {
            Ok(opened) => opened,
            Err(e) => {
                report(e.to_string());
                continue;
            }
        };
        let (function, arguments, timestamp) = match message {
            Message::FunctionCall {
                function,
                arguments,
                timestamp,
            } => (function, arguments, timestamp),
            other => {
                log::warn!(target: "rpc", "[{}] ignoring {} message", S::NAME, other.kind());
                continue;
            }
        };
        let service = service.clone();
        let cx = cx.clone();
        pool.spawn(move || {
            let outbox = cx.outbox();
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                outbox
                    .encoder()
                    .decode(&arguments, &DecodeContext::new(&shared).with_outbox(outbox))
                    .and_then(|args| S::Command::parse(&function, args.into_list()))
                    .and_then(|command| service.handle(command, &cx))
                    .and_then(|value| {
                        let mut shared = Vec::new();
                        let value = outbox.encoder().encode(&value, &mut shared)?;
                        Ok((value, shared))
                    })
            }))
            .unwrap_or_else(|payload| {
                let reason = panic_message(payload.as_ref());
                log::error!(target: "rpc", "[{}] {function} panicked: {reason}", S::NAME);
                Err(RpcError::Remote(format!("{function} panicked: {reason}")))
            });
            let sent = match result {
                Ok((value, shared)) => outbox.send(
                    &Message::ReturnData {
                        function,
                        value,
                        timestamp,
                    },
                    shared,
                ),
                Err(e) => outbox.send(
                    &Message::Error {
                        value: e.to_string(),
                        function: Some(function),
                        timestamp: Some(timestamp),
                    },
                    Vec::new(),
                ),
            };
            if sent.is_err() {
                log::debug!(target: "rpc", "[{}] host gone, reply dropped", S::NAME);
            }
        });
    }
}
