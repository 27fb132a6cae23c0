//! Json - protobuf-JSON form of a call event
//!
//! The mapping is done by `prost-reflect` against an embedded copy of the
//! binary-log schema, so output follows the proto3 JSON rules: camelCase
//! keys, 64-bit integers as strings, bytes as base64, enums by name,
//! RFC 3339 timestamps and `"1.500s"` durations. Default values are omitted
//! on output, and absent or `null` fields read back as defaults.

use crate::error::{Error, Result};
use crate::event::{CallEvent, Payload};
use prost::Message as _;
use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor};
use protox::file::{ChainFileResolver, File, FileResolver, GoogleFileResolver};
use serde_json::Value;
use std::sync::OnceLock;

const SCHEMA_FILE: &str = "grpc/binarylog/v1/binarylog.proto";
const SCHEMA_SOURCE: &str = include_str!("../proto/binarylog.proto");
const ENTRY_TYPE: &str = "grpc.binarylog.v1.GrpcLogEntry";

/// JSON names of the payload oneof, camelCase and original spelling
const PAYLOAD_FIELDS: &[[&str; 2]] = &[
    ["clientHeader", "client_header"],
    ["serverHeader", "server_header"],
    ["message", "message"],
    ["trailer", "trailer"],
];

/// Serves the embedded schema source
struct EmbeddedSchema;

impl FileResolver for EmbeddedSchema {
    fn open_file(&self, name: &str) -> std::result::Result<File, protox::Error> {
        if name == SCHEMA_FILE {
            File::from_source(name, SCHEMA_SOURCE)
        } else {
            Err(protox::Error::file_not_found(name))
        }
    }
}

fn compile_schema() -> std::result::Result<DescriptorPool, String> {
    let mut resolver = ChainFileResolver::new();
    resolver.add(EmbeddedSchema);
    resolver.add(GoogleFileResolver::new());
    let mut compiler = protox::Compiler::with_file_resolver(resolver);
    compiler
        .open_file(SCHEMA_FILE)
        .map_err(|e| e.to_string())?;
    Ok(compiler.descriptor_pool())
}

/// Descriptor of the call event, compiled on first use
fn entry_descriptor() -> Result<MessageDescriptor> {
    static POOL: OnceLock<std::result::Result<DescriptorPool, String>> = OnceLock::new();
    let pool = POOL
        .get_or_init(compile_schema)
        .as_ref()
        .map_err(|e| Error::Schema(e.clone()))?;
    pool.get_message_by_name(ENTRY_TYPE)
        .ok_or_else(|| Error::Schema(format!("{ENTRY_TYPE} is not declared")))
}

/// Render an event as a JSON object.
///
/// Timestamps and durations are normalized first, so a negative nanosecond
/// part still renders. Values outside the RFC 3339 range are an error.
pub fn to_json(event: &CallEvent) -> Result<Value> {
    let mut event = event.clone();
    if let Some(ts) = event.timestamp.as_mut() {
        ts.normalize();
    }
    if let Some(Payload::ClientHeader(header)) = event.payload.as_mut() {
        if let Some(timeout) = header.timeout.as_mut() {
            timeout.normalize();
        }
    }

    let message = DynamicMessage::decode(entry_descriptor()?, event.encode_to_vec().as_slice())
        .map_err(|e| Error::Json(e.to_string()))?;
    serde_json::to_value(&message).map_err(|e| Error::Json(e.to_string()))
}

/// Parse an event from its JSON object form
pub fn from_json(value: &Value) -> Result<CallEvent> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::Json("event must be an object".into()))?;
    let payloads = PAYLOAD_FIELDS
        .iter()
        .filter(|names| {
            names
                .iter()
                .any(|name| obj.get(*name).is_some_and(|v| !v.is_null()))
        })
        .count();
    if payloads > 1 {
        return Err(Error::Json("more than one payload field is set".into()));
    }

    let message = DynamicMessage::deserialize(entry_descriptor()?, value.clone())
        .map_err(|e| Error::Json(e.to_string()))?;
    CallEvent::decode(message.encode_to_vec().as_slice()).map_err(|e| Error::Json(e.to_string()))
}
