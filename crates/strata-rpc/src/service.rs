use std::sync::Arc;

use strata_chunk::{Chunk, SharedBuffer};

use crate::error::RpcError;
use crate::message::{Message, Outbox};
use crate::proxy::ProxyHandle;
use crate::value::Value;

/// Statically declared calls a service accepts.
pub trait Command: Sized + Send + 'static {
    /// Function names reported in the signatures handshake.
    const FUNCTIONS: &'static [&'static str];

    fn parse(function: &str, arguments: Vec<Value>) -> Result<Self, RpcError>;

    fn function(&self) -> &'static str;

    /// Fails when an argument cannot be represented as a `Value`.
    fn into_arguments(self) -> Result<Vec<Value>, RpcError>;
}

/// An object hosted on its own thread and driven by `Command`s.
pub trait Service: Sized + Send + Sync + 'static {
    const NAME: &'static str;

    type Command: Command;

    fn initialize(arguments: Vec<Value>, cx: &ServiceContext) -> Result<Self, RpcError>;

    fn handle(&self, command: Self::Command, cx: &ServiceContext) -> Result<Value, RpcError>;
}

/// Worker-side view of the channel back to the host.
#[derive(Clone)]
pub struct ServiceContext {
    name: &'static str,
    outbox: Outbox,
}

impl ServiceContext {
    pub(crate) fn new(name: &'static str, outbox: Outbox) -> Self {
        Self { name, outbox }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Sends a line to the host log.
    pub fn log(&self, line: impl Into<String>) {
        let message = Message::Log { value: line.into() };
        if self.outbox.send(&message, Vec::new()).is_err() {
            log::debug!(target: "rpc", "[{}] host gone, dropping log line", self.name);
        }
    }
}

/// Positional argument reader used by `Command::parse` implementations.
pub struct ArgReader<'a> {
    function: &'a str,
    items: std::vec::IntoIter<Value>,
    index: usize,
}

impl<'a> ArgReader<'a> {
    pub fn new(function: &'a str, arguments: Vec<Value>) -> Self {
        Self {
            function,
            items: arguments.into_iter(),
            index: 0,
        }
    }

    fn error(&self, reason: String) -> RpcError {
        RpcError::bad_arguments(self.function, reason)
    }

    pub fn next(&mut self) -> Result<Value, RpcError> {
        self.index += 1;
        self.items
            .next()
            .ok_or_else(|| self.error(format!("missing argument {}", self.index)))
    }

    /// Missing and null arguments both read as `None`.
    pub fn optional(&mut self) -> Option<Value> {
        self.index += 1;
        self.items.next().filter(|v| !v.is_null())
    }

    fn typed<T>(&mut self, expected: &str, f: impl FnOnce(&Value) -> Option<T>) -> Result<T, RpcError> {
        let value = self.next()?;
        f(&value).ok_or_else(|| {
            self.error(format!(
                "argument {} should be {expected}, got {}",
                self.index,
                value.kind()
            ))
        })
    }

    pub fn i64(&mut self) -> Result<i64, RpcError> {
        self.typed("an integer", Value::as_i64)
    }

    pub fn i32(&mut self) -> Result<i32, RpcError> {
        self.typed("a 32-bit integer", |v| v.as_i64().and_then(|i| i32::try_from(i).ok()))
    }

    pub fn f64(&mut self) -> Result<f64, RpcError> {
        self.typed("a number", Value::as_f64)
    }

    pub fn bool(&mut self) -> Result<bool, RpcError> {
        self.typed("a bool", Value::as_bool)
    }

    pub fn string(&mut self) -> Result<String, RpcError> {
        self.typed("a string", |v| v.as_str().map(str::to_string))
    }

    pub fn chunk(&mut self) -> Result<Arc<Chunk>, RpcError> {
        self.typed("a chunk", |v| v.as_chunk().cloned())
    }

    pub fn buffer(&mut self) -> Result<SharedBuffer, RpcError> {
        self.typed("a buffer", |v| v.as_buffer().cloned())
    }

    pub fn proxy(&mut self) -> Result<ProxyHandle, RpcError> {
        self.typed("a proxy", |v| v.as_proxy().cloned())
    }

    pub fn vec3(&mut self) -> Result<[f64; 3], RpcError> {
        self.typed("a 3-number list", |v| {
            let items = v.as_array()?;
            match items {
                [x, y, z] => Some([x.as_f64()?, y.as_f64()?, z.as_f64()?]),
                _ => None,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_reports_position_and_kind() {
        let mut args = ArgReader::new("setBlock", vec![Value::from("stone"), Value::from(1)]);
        assert_eq!(args.string().unwrap(), "stone");
        let err = args.string().unwrap_err();
        assert!(err.to_string().contains("argument 2 should be a string, got int"));
        assert!(matches!(args.i32(), Err(RpcError::BadArguments { .. })));
    }

    #[test]
    fn optional_treats_null_as_missing() {
        let mut args = ArgReader::new("castRay", vec![Value::Null]);
        assert!(args.optional().is_none());
        assert!(args.optional().is_none());
    }

    #[test]
    fn vec3_reads_mixed_numbers() {
        let mut args = ArgReader::new(
            "castRay",
            vec![Value::Array(vec![Value::Int(1), Value::Float(2.5), Value::Int(-3)])],
        );
        assert_eq!(args.vec3().unwrap(), [1.0, 2.5, -3.0]);
    }
}
