use std::sync::{Arc, Mutex};

use crossbeam_channel::unbounded;
use proptest::prelude::*;
use serde_json::json;
use strata_chunk::{CHUNK_VOLUME, Chunk, ChunkId, SharedBuffer, Stage, VoxelCells};
use strata_rpc::{
    DecodeContext, Message, Outbox, PacketEncoder, ProxyHandle, ProxyRegistry, ProxyTarget,
    RpcError, Value,
};

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl ProxyTarget for Recorder {
    fn call(&self, function: &str, arguments: Vec<Value>) -> Result<(), RpcError> {
        self.calls.lock().unwrap().push((function.to_string(), arguments));
        Ok(())
    }
}

fn round_trip(encoder: &PacketEncoder, value: &Value) -> Value {
    let mut shared = Vec::new();
    let json = encoder.encode(value, &mut shared).unwrap();
    encoder.decode(&json, &DecodeContext::new(&shared)).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn chunks_keep_id_and_voxels(
        cx in -1000i32..1000, cy in -64i32..64, cz in -1000i32..1000,
        voxels in prop::collection::vec(any::<u8>(), CHUNK_VOLUME),
        dirty in any::<bool>(),
    ) {
        let encoder = PacketEncoder::standard();
        let chunk = Chunk::with_buffer(ChunkId::new(cx, cy, cz), SharedBuffer::from_bytes(&voxels)).unwrap();
        chunk.set_stage(Stage::Pass("terrain".into()));
        if dirty {
            chunk.mark_dirty();
        }
        let decoded = round_trip(&encoder, &Value::from(chunk));
        let decoded = decoded.as_chunk().unwrap();
        prop_assert_eq!(decoded.id(), ChunkId::new(cx, cy, cz));
        prop_assert_eq!(decoded.buffer().snapshot(), voxels);
        prop_assert_eq!(decoded.stage(), Stage::Pass("terrain".into()));
        prop_assert_eq!(decoded.is_dirty(), dirty);
    }

    #[test]
    fn byte_arrays_survive(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let encoder = PacketEncoder::standard();
        prop_assert_eq!(round_trip(&encoder, &Value::Bytes(bytes.clone())), Value::Bytes(bytes));
    }

    #[test]
    fn buffers_survive(bytes in prop::collection::vec(any::<u8>(), 1..512)) {
        let encoder = PacketEncoder::standard();
        let buffer = SharedBuffer::from_bytes(&bytes);
        let decoded = round_trip(&encoder, &Value::Buffer(buffer.clone()));
        prop_assert_eq!(decoded.as_buffer().unwrap().snapshot(), bytes);
    }
}

#[test]
fn buffers_and_chunks_share_memory_across_the_boundary() {
    let encoder = PacketEncoder::standard();
    let chunk = Arc::new(Chunk::new(ChunkId::new(1, 2, 3)));
    let decoded = round_trip(&encoder, &Value::Chunk(chunk.clone()));
    let remote = decoded.as_chunk().unwrap();
    assert!(SharedBuffer::ptr_eq(remote.buffer(), chunk.buffer()));
    remote.set_block(7, 1, 1, 1);
    assert_eq!(chunk.get_block(1, 1, 1), 7);
}

#[test]
fn envelope_points_into_the_side_channel() {
    let encoder = PacketEncoder::standard();
    let value = Value::Array(vec![
        Value::Buffer(SharedBuffer::new(4)),
        Value::object([("chunk", Value::from(Chunk::new(ChunkId::ORIGIN)))]),
    ]);
    let mut shared = Vec::new();
    let json = encoder.encode(&value, &mut shared).unwrap();
    assert_eq!(shared.len(), 2);
    assert_eq!(json[0]["_encoder"], json!("buffer"));
    assert_eq!(json[0]["sharedRange"], json!([0, 1]));
    assert_eq!(json[1]["chunk"]["_encoder"], json!("chunk"));
    assert_eq!(json[1]["chunk"]["sharedRange"], json!([1, 2]));
    assert_eq!(json[1]["chunk"]["data"]["id"], json!("0:0:0"));
    assert_eq!(json[1]["chunk"]["data"]["currentPass"], json!("unloaded"));
    assert_eq!(shared[1].len(), CHUNK_VOLUME);
}

#[test]
fn plain_values_pass_through() {
    let encoder = PacketEncoder::standard();
    let value = Value::object([
        ("name", Value::from("stone")),
        ("pos", Value::Array(vec![Value::from(1), Value::from(-2.5)])),
        ("hit", Value::Null),
    ]);
    assert_eq!(round_trip(&encoder, &value), value);
}

#[test]
fn proxies_resolve_locally_on_the_host() {
    let encoder = PacketEncoder::standard();
    let target = Arc::new(Recorder::default());
    let handle = ProxyHandle::local(target.clone());
    let registry = ProxyRegistry::default();
    registry.register(&handle);

    let mut shared = Vec::new();
    let json = encoder.encode(&Value::Proxy(handle.clone()), &mut shared).unwrap();
    assert_eq!(json["data"], json!(handle.id()));
    let decoded = encoder
        .decode(&json, &DecodeContext::new(&shared).with_proxies(&registry))
        .unwrap();
    let decoded = decoded.as_proxy().unwrap();
    assert_eq!(decoded.id(), handle.id());
    assert!(decoded.is_local());

    decoded.call("removeChunk", vec![Value::from("0:0:0")]).unwrap();
    assert_eq!(target.calls.lock().unwrap()[0].0, "removeChunk");
}

#[test]
fn proxies_become_stubs_on_the_worker() {
    let encoder = Arc::new(PacketEncoder::standard());
    let handle = ProxyHandle::local(Arc::new(Recorder::default()));
    let (tx, rx) = unbounded();
    let outbox = Outbox::new(tx, encoder.clone());

    let mut shared = Vec::new();
    let json = encoder.encode(&Value::Proxy(handle.clone()), &mut shared).unwrap();
    let decoded = encoder
        .decode(&json, &DecodeContext::new(&shared).with_outbox(&outbox))
        .unwrap();
    let stub = decoded.as_proxy().unwrap();
    assert_eq!(stub.id(), handle.id());
    assert!(!stub.is_local());

    stub.call("addChunk", vec![Value::Int(4)]).unwrap();
    let (message, _) = rx.try_recv().unwrap().open().unwrap();
    match message {
        Message::ProxyFunctionCall {
            proxy_id,
            function,
            arguments,
            ..
        } => {
            assert_eq!(proxy_id, handle.id());
            assert_eq!(function, "addChunk");
            assert_eq!(arguments, json!([4]));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn unroutable_proxies_fail_to_decode() {
    let encoder = PacketEncoder::standard();
    let json = json!({"_encoder": "proxy", "data": 999_999, "sharedRange": [0, 0]});
    assert!(matches!(
        encoder.decode(&json, &DecodeContext::new(&[])),
        Err(RpcError::Decode(_))
    ));
}

#[test]
fn decode_failures_are_returned() {
    let encoder = PacketEncoder::standard();
    let unknown = json!([{"_encoder": "teapot", "data": null, "sharedRange": [0, 0]}]);
    assert!(matches!(
        encoder.decode(&unknown, &DecodeContext::new(&[])),
        Err(RpcError::MissingEncoder(name)) if name == "teapot"
    ));

    let out_of_range = json!({"_encoder": "buffer", "data": null, "sharedRange": [0, 3]});
    assert!(matches!(
        encoder.decode(&out_of_range, &DecodeContext::new(&[SharedBuffer::new(1)])),
        Err(RpcError::Decode(_))
    ));

    let not_bytes = json!({"_encoder": "bytes", "data": [1, 300], "sharedRange": [0, 0]});
    assert!(encoder.decode(&not_bytes, &DecodeContext::new(&[])).is_err());
}

#[test]
fn empty_registry_refuses_rich_values() {
    let encoder = PacketEncoder::empty();
    let mut shared = Vec::new();
    assert!(matches!(
        encoder.encode(&Value::Bytes(vec![1]), &mut shared),
        Err(RpcError::Unencodable("bytes"))
    ));
    assert_eq!(PacketEncoder::standard().names().collect::<Vec<_>>(), ["buffer", "bytes", "chunk", "proxy"]);
}
