use std::sync::Arc;

use serde_json::{Map, Value as Json, json};
use strata_chunk::{Chunk, ChunkId, SharedBuffer, Stage};

use crate::error::RpcError;
use crate::message::Outbox;
use crate::proxy::{ProxyHandle, ProxyRegistry};
use crate::value::Value;

const ENCODER_KEY: &str = "_encoder";

/// What a decoder may need besides the payload itself.
#[derive(Clone, Copy)]
pub struct DecodeContext<'a> {
    /// Regions referenced by `sharedRange`, already sliced for this payload.
    pub shared: &'a [SharedBuffer],
    /// Host side: proxies owned by this process.
    pub proxies: Option<&'a ProxyRegistry>,
    /// Worker side: where calls on decoded proxies are posted.
    pub outbox: Option<&'a Outbox>,
}

impl<'a> DecodeContext<'a> {
    pub fn new(shared: &'a [SharedBuffer]) -> Self {
        Self {
            shared,
            proxies: None,
            outbox: None,
        }
    }

    pub fn with_proxies(mut self, proxies: &'a ProxyRegistry) -> Self {
        self.proxies = Some(proxies);
        self
    }

    pub fn with_outbox(mut self, outbox: &'a Outbox) -> Self {
        self.outbox = Some(outbox);
        self
    }
}

/// Codec for one rich value kind.
pub trait Encoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_encode(&self, value: &Value) -> bool;

    /// Returns the envelope `data`; shared regions are appended to `shared`.
    fn encode(&self, value: &Value, shared: &mut Vec<SharedBuffer>) -> Result<Json, RpcError>;

    fn decode(&self, data: &Json, cx: &DecodeContext<'_>) -> Result<Value, RpcError>;
}

/// Walks values, handing rich ones to the first registered encoder that
/// accepts them.
pub struct PacketEncoder {
    encoders: Vec<Box<dyn Encoder>>,
}

impl Default for PacketEncoder {
    fn default() -> Self {
        Self::standard()
    }
}

impl PacketEncoder {
    pub fn empty() -> Self {
        Self {
            encoders: Vec::new(),
        }
    }

    /// The buffer, bytes, chunk and proxy encoders.
    pub fn standard() -> Self {
        let mut encoder = Self::empty();
        encoder.register(Box::new(BufferEncoder));
        encoder.register(Box::new(BytesEncoder));
        encoder.register(Box::new(ChunkEncoder));
        encoder.register(Box::new(ProxyEncoder));
        encoder
    }

    pub fn register(&mut self, encoder: Box<dyn Encoder>) {
        self.encoders.push(encoder);
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.encoders.iter().map(|e| e.name())
    }

    fn find(&self, name: &str) -> Option<&dyn Encoder> {
        self.encoders
            .iter()
            .find(|e| e.name() == name)
            .map(|e| e.as_ref())
    }

    pub fn encode(&self, value: &Value, shared: &mut Vec<SharedBuffer>) -> Result<Json, RpcError> {
        Ok(match value {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
            Value::String(s) => Json::String(s.clone()),
            Value::Array(items) => Json::Array(
                items
                    .iter()
                    .map(|v| self.encode(v, shared))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => {
                let mut out = Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), self.encode(v, shared)?);
                }
                Json::Object(out)
            }
            rich => {
                let encoder = self
                    .encoders
                    .iter()
                    .find(|e| e.can_encode(rich))
                    .ok_or(RpcError::Unencodable(rich.kind()))?;
                let start = shared.len();
                let data = encoder.encode(rich, shared)?;
                json!({
                    "_encoder": encoder.name(),
                    "data": data,
                    "sharedRange": [start, shared.len()],
                })
            }
        })
    }

    /// Reverses `encode`. Failures are logged with the offending payload and
    /// returned.
    pub fn decode(&self, json: &Json, cx: &DecodeContext<'_>) -> Result<Value, RpcError> {
        self.walk(json, cx).inspect_err(|_| {
            log::error!(target: "rpc", "Failed to decode packet: {json}");
        })
    }

    fn walk(&self, json: &Json, cx: &DecodeContext<'_>) -> Result<Value, RpcError> {
        match json {
            Json::Array(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|v| self.walk(v, cx))
                    .collect::<Result<_, _>>()?,
            )),
            Json::Object(map) => match map.get(ENCODER_KEY).and_then(Json::as_str) {
                Some(name) => {
                    let encoder = self
                        .find(name)
                        .ok_or_else(|| RpcError::MissingEncoder(name.to_string()))?;
                    let shared = shared_slice(map.get("sharedRange"), cx.shared)?;
                    let inner = DecodeContext { shared, ..*cx };
                    encoder.decode(map.get("data").unwrap_or(&Json::Null), &inner)
                }
                None => {
                    let mut out = std::collections::BTreeMap::new();
                    for (k, v) in map {
                        out.insert(k.clone(), self.walk(v, cx)?);
                    }
                    Ok(Value::Object(out))
                }
            },
            plain => Ok(Value::from_json(plain.clone())),
        }
    }
}

fn shared_slice<'a>(
    range: Option<&Json>,
    shared: &'a [SharedBuffer],
) -> Result<&'a [SharedBuffer], RpcError> {
    let Some(range) = range else {
        return Ok(&[]);
    };
    let bounds = range
        .as_array()
        .filter(|r| r.len() == 2)
        .and_then(|r| Some((r[0].as_u64()? as usize, r[1].as_u64()? as usize)));
    match bounds {
        Some((start, end)) if start <= end && end <= shared.len() => Ok(&shared[start..end]),
        _ => Err(RpcError::Decode(format!(
            "sharedRange {range} outside {} shared regions",
            shared.len()
        ))),
    }
}

fn first_shared(cx: &DecodeContext<'_>, encoder: &str) -> Result<SharedBuffer, RpcError> {
    cx.shared
        .first()
        .cloned()
        .ok_or_else(|| RpcError::Decode(format!("{encoder} payload without a shared region")))
}

/// Shared regions travel through the side channel untouched.
pub struct BufferEncoder;

impl Encoder for BufferEncoder {
    fn name(&self) -> &'static str {
        "buffer"
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Buffer(_))
    }

    fn encode(&self, value: &Value, shared: &mut Vec<SharedBuffer>) -> Result<Json, RpcError> {
        let buffer = value.as_buffer().ok_or(RpcError::Unencodable(value.kind()))?;
        shared.push(buffer.clone());
        Ok(Json::Null)
    }

    fn decode(&self, _data: &Json, cx: &DecodeContext<'_>) -> Result<Value, RpcError> {
        Ok(Value::Buffer(first_shared(cx, self.name())?))
    }
}

/// Plain byte arrays are copied as a list of numbers.
pub struct BytesEncoder;

impl Encoder for BytesEncoder {
    fn name(&self) -> &'static str {
        "bytes"
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Bytes(_))
    }

    fn encode(&self, value: &Value, _shared: &mut Vec<SharedBuffer>) -> Result<Json, RpcError> {
        match value {
            Value::Bytes(bytes) => Ok(Json::Array(bytes.iter().map(|b| Json::from(*b)).collect())),
            other => Err(RpcError::Unencodable(other.kind())),
        }
    }

    fn decode(&self, data: &Json, _cx: &DecodeContext<'_>) -> Result<Value, RpcError> {
        let items = data
            .as_array()
            .ok_or_else(|| RpcError::Decode("bytes payload is not a list".into()))?;
        items
            .iter()
            .map(|n| {
                n.as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .ok_or_else(|| RpcError::Decode(format!("{n} is not a byte")))
            })
            .collect::<Result<Vec<u8>, _>>()
            .map(Value::Bytes)
    }
}

/// Chunks travel as id and pipeline metadata; the voxel region itself goes
/// through the side channel so both ends see the same cells.
pub struct ChunkEncoder;

impl Encoder for ChunkEncoder {
    fn name(&self) -> &'static str {
        "chunk"
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Chunk(_))
    }

    fn encode(&self, value: &Value, shared: &mut Vec<SharedBuffer>) -> Result<Json, RpcError> {
        let chunk = value.as_chunk().ok_or(RpcError::Unencodable(value.kind()))?;
        shared.push(chunk.buffer().clone());
        Ok(json!({
            "id": chunk.id().to_string(),
            "dirty": chunk.is_dirty(),
            "currentPass": chunk.stage().as_str(),
        }))
    }

    fn decode(&self, data: &Json, cx: &DecodeContext<'_>) -> Result<Value, RpcError> {
        let field = |key: &str| {
            data.get(key)
                .ok_or_else(|| RpcError::Decode(format!("chunk payload without {key}")))
        };
        let id: ChunkId = field("id")?
            .as_str()
            .unwrap_or_default()
            .parse::<ChunkId>()
            .map_err(|e| RpcError::Decode(e.to_string()))?;
        let dirty = field("dirty")?.as_bool().unwrap_or(false);
        let stage = Stage::parse(field("currentPass")?.as_str().unwrap_or(Stage::UNLOADED));
        let chunk = Chunk::restore(id, first_shared(cx, self.name())?, stage, dirty)
            .map_err(|e| RpcError::Decode(e.to_string()))?;
        Ok(Value::Chunk(Arc::new(chunk)))
    }
}

/// Proxies travel as their id. Decoding resolves the id against the local
/// registry first and otherwise builds a stub posting through the outbox.
pub struct ProxyEncoder;

impl Encoder for ProxyEncoder {
    fn name(&self) -> &'static str {
        "proxy"
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Proxy(_))
    }

    fn encode(&self, value: &Value, _shared: &mut Vec<SharedBuffer>) -> Result<Json, RpcError> {
        let proxy = value.as_proxy().ok_or(RpcError::Unencodable(value.kind()))?;
        Ok(Json::from(proxy.id()))
    }

    fn decode(&self, data: &Json, cx: &DecodeContext<'_>) -> Result<Value, RpcError> {
        let id = data
            .as_u64()
            .ok_or_else(|| RpcError::Decode(format!("{data} is not a proxy id")))?;
        if let Some(local) = cx.proxies.and_then(|p| p.get(id)) {
            return Ok(Value::Proxy(local));
        }
        match cx.outbox {
            Some(outbox) => Ok(Value::Proxy(ProxyHandle::remote(id, outbox.clone()))),
            None => Err(RpcError::Decode(format!("proxy {id} has no route"))),
        }
    }
}
