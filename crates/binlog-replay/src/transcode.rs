//! Transcode - annotated JSON form of a capture
//!
//! `annotate` turns events into protobuf-JSON, optionally replacing message
//! `data` with a schema-decoded `decoded` object. `encode` reverses it. The
//! message type of a body comes from the CLIENT_HEADER seen earlier for the
//! same call, so both directions keep a call-id to method table.

use crate::error::{Error, Result};
use binlog_codec::{from_json, to_json, CallEvent, EventType, Message, Payload};
use binlog_schema::SchemaRegistry;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Stateful converter between events and their annotated JSON form
pub struct Transcoder<'r> {
    registry: &'r SchemaRegistry,
    methods: HashMap<u64, String>,
}

impl<'r> Transcoder<'r> {
    /// Create a transcoder over a registry
    #[must_use]
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            methods: HashMap::new(),
        }
    }

    fn observe(&mut self, event: &CallEvent) {
        if let Some(header) = event.client_header() {
            self.methods
                .insert(event.call_id, header.method_name.clone());
        }
    }

    fn message_type(&self, event: &CallEvent) -> Result<&'r str> {
        let method = self
            .methods
            .get(&event.call_id)
            .ok_or(Error::MissingHeader(event.call_id))?;
        let registry: &'r SchemaRegistry = self.registry;
        let types = registry
            .method(method)
            .ok_or_else(|| Error::UnknownMethod(method.clone()))?;
        Ok(match event.kind() {
            EventType::ServerMessage => types.response.as_str(),
            _ => types.request.as_str(),
        })
    }

    /// JSON form of an event.
    ///
    /// With `expand`, message bodies are decoded into `message.decoded`. A
    /// body that cannot be decoded keeps its `data` and gains a
    /// `message.decodeError` note instead.
    pub fn annotate(&mut self, event: &CallEvent, expand: bool) -> Result<Value> {
        self.observe(event);
        let mut value = to_json(event)?;

        let is_message = matches!(
            event.kind(),
            EventType::ClientMessage | EventType::ServerMessage
        );
        if !expand || !is_message {
            return Ok(value);
        }

        let decoded = self.message_type(event).and_then(|type_name| {
            let message = self.registry.resolve(event.body(), type_name)?;
            Ok(self.registry.to_json(&message)?)
        });
        if let Some(Value::Object(message)) = value.get_mut("message") {
            match decoded {
                Ok(decoded) => {
                    message.remove("data");
                    message.insert("decoded".into(), decoded);
                }
                Err(e) => {
                    warn!(call_id = event.call_id, error = %e, "cannot decode message body");
                    message.insert("decodeError".into(), Value::String(e.to_string()));
                }
            }
        }
        Ok(value)
    }

    /// Event from its annotated JSON form.
    ///
    /// A `message.decoded` object is re-serialized into `message.data` and
    /// `message.length`. Failing to find the call's method is an error.
    pub fn encode(&mut self, mut value: Value) -> Result<CallEvent> {
        let decoded = match value.get_mut("message") {
            Some(Value::Object(message)) => {
                message.remove("decodeError");
                message.remove("decoded")
            }
            _ => None,
        };

        let mut event = from_json(&value)?;
        if let Some(decoded) = decoded {
            let type_name = self.message_type(&event)?;
            let message = self.registry.parse_json(decoded, type_name)?;
            event.payload = Some(Payload::Message(Message::new(
                self.registry.encode(&message),
            )));
        }
        self.observe(&event);
        Ok(event)
    }
}
