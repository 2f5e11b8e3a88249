use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use strata_chunk::SharedBuffer;

use crate::encoder::PacketEncoder;
use crate::error::RpcError;
use crate::value::Value;

/// Wire messages. Payload fields hold already-encoded values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Message {
    ConstructorArguments {
        value: Json,
    },
    FunctionCall {
        function: String,
        arguments: Json,
        timestamp: u64,
    },
    ReturnData {
        function: String,
        value: Json,
        timestamp: u64,
    },
    Signatures {
        value: Signatures,
    },
    Log {
        value: String,
    },
    Error {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        function: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },
    ProxyFunctionCall {
        proxy_id: u64,
        function: String,
        arguments: Json,
        timestamp: u64,
    },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::ConstructorArguments { .. } => "constructorArguments",
            Message::FunctionCall { .. } => "functionCall",
            Message::ReturnData { .. } => "returnData",
            Message::Signatures { .. } => "signatures",
            Message::Log { .. } => "log",
            Message::Error { .. } => "error",
            Message::ProxyFunctionCall { .. } => "proxyFunctionCall",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signatures {
    pub name: String,
    pub functions: Vec<String>,
}

/// A sealed message: JSON text plus the side channel of shared regions its
/// `sharedRange` entries point into.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub body: String,
    pub shared: Vec<SharedBuffer>,
}

impl Envelope {
    pub fn seal(message: &Message, shared: Vec<SharedBuffer>) -> Result<Envelope, RpcError> {
        Ok(Envelope {
            body: serde_json::to_string(message)?,
            shared,
        })
    }

    /// `(function, timestamp)` read loosely from the body, for settling a call
    /// whose reply cannot be opened.
    pub fn correlation(&self) -> Option<(String, u64)> {
        let body: Json = serde_json::from_str(&self.body).ok()?;
        let function = body.get("function")?.as_str()?.to_string();
        let timestamp = body.get("timestamp")?.as_u64()?;
        Some((function, timestamp))
    }

    pub fn open(self) -> Result<(Message, Vec<SharedBuffer>), RpcError> {
        match serde_json::from_str(&self.body) {
            Ok(message) => Ok((message, self.shared)),
            Err(e) => {
                log::error!(target: "rpc", "Failed to decode packet: {}", self.body);
                Err(RpcError::Decode(e.to_string()))
            }
        }
    }
}

/// Sending half of a channel together with the encoder used to seal values.
#[derive(Clone)]
pub struct Outbox {
    tx: Sender<Envelope>,
    encoder: Arc<PacketEncoder>,
}

impl Outbox {
    pub fn new(tx: Sender<Envelope>, encoder: Arc<PacketEncoder>) -> Self {
        Self { tx, encoder }
    }

    #[inline]
    pub fn encoder(&self) -> &Arc<PacketEncoder> {
        &self.encoder
    }

    pub fn send(&self, message: &Message, shared: Vec<SharedBuffer>) -> Result<(), RpcError> {
        self.tx
            .send(Envelope::seal(message, shared)?)
            .map_err(|_| RpcError::Disconnected)
    }

    pub fn post_proxy_call(
        &self,
        proxy_id: u64,
        function: &str,
        arguments: Vec<Value>,
    ) -> Result<(), RpcError> {
        let mut shared = Vec::new();
        let arguments = self.encoder.encode(&Value::Array(arguments), &mut shared)?;
        self.send(
            &Message::ProxyFunctionCall {
                proxy_id,
                function: function.to_string(),
                arguments,
                timestamp: epoch_millis(),
            },
            shared,
        )
    }
}

pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
