//! Registry - immutable type and method index
//!
//! Built once by [`crate::SchemaRegistryBuilder`] and then only borrowed, so
//! it can be shared across tasks without locking.

use crate::error::{Error, Result};
use prost::Message as _;
use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Appended to rendered text when the captured body was cut short
pub const TRUNCATION_MARKER: &str = "...";

/// Request and response type names of one method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodTypes {
    /// Fully qualified request message name
    pub request: String,
    /// Fully qualified response message name
    pub response: String,
    /// The client may send more than one request
    pub client_streaming: bool,
    /// The server may send more than one response
    pub server_streaming: bool,
}

/// Read-only schema index
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    pool: DescriptorPool,
    methods: HashMap<String, MethodTypes>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new(DescriptorPool::new())
    }
}

impl SchemaRegistry {
    pub(crate) fn new(pool: DescriptorPool) -> Self {
        let methods = index_services(&pool);
        Self { pool, methods }
    }

    /// Types for a method path such as `/pkg.Service/Method`
    #[must_use]
    pub fn method(&self, path: &str) -> Option<&MethodTypes> {
        self.methods.get(path)
    }

    /// Every indexed method path
    pub fn methods(&self) -> impl Iterator<Item = (&str, &MethodTypes)> {
        self.methods.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Descriptor of a message type
    pub fn message_descriptor(&self, type_name: &str) -> Result<MessageDescriptor> {
        if let Some(desc) = self.pool.get_message_by_name(type_name) {
            return Ok(desc);
        }
        let other_kind = self.pool.get_enum_by_name(type_name).is_some()
            || self.pool.get_service_by_name(type_name).is_some()
            || self.pool.get_extension_by_name(type_name).is_some();
        if other_kind {
            Err(Error::NotAMessage(type_name.to_string()))
        } else {
            Err(Error::TypeNotFound(type_name.to_string()))
        }
    }

    /// Parse `raw` as a message of `type_name`
    pub fn resolve(&self, raw: &[u8], type_name: &str) -> Result<DynamicMessage> {
        let desc = self.message_descriptor(type_name)?;
        DynamicMessage::decode(desc, raw).map_err(|source| Error::MalformedPayload {
            type_name: type_name.to_string(),
            source,
        })
    }

    /// Multi-line labelled text of a message, marked when truncated
    pub fn render(&self, message: &DynamicMessage, truncated: bool) -> Result<String> {
        let mut text = serde_json::to_string_pretty(message).map_err(Error::Render)?;
        if truncated {
            text.push_str(TRUNCATION_MARKER);
        }
        Ok(text)
    }

    /// JSON value form of a message
    pub fn to_json(&self, message: &DynamicMessage) -> Result<Value> {
        serde_json::to_value(message).map_err(Error::Render)
    }

    /// Build a message of `type_name` from its JSON form
    pub fn parse_json(&self, value: Value, type_name: &str) -> Result<DynamicMessage> {
        let desc = self.message_descriptor(type_name)?;
        DynamicMessage::deserialize(desc, value).map_err(|source| Error::Json {
            type_name: type_name.to_string(),
            source,
        })
    }

    /// Serialize a message to its binary encoding
    #[must_use]
    pub fn encode(&self, message: &DynamicMessage) -> Vec<u8> {
        message.encode_to_vec()
    }
}

/// Map every `/service/Method` path in the pool to its message types
pub fn index_services(pool: &DescriptorPool) -> HashMap<String, MethodTypes> {
    let mut methods = HashMap::new();
    for service in pool.services() {
        for method in service.methods() {
            let path = format!("/{}/{}", service.full_name(), method.name());
            methods.insert(
                path,
                MethodTypes {
                    request: method.input().full_name().to_string(),
                    response: method.output().full_name().to_string(),
                    client_streaming: method.is_client_streaming(),
                    server_streaming: method.is_server_streaming(),
                },
            );
        }
    }
    debug!(methods = methods.len(), "indexed services");
    methods
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_types::{
        field_descriptor_proto::{Label, Type},
        DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
        FileDescriptorProto, FileDescriptorSet, MethodDescriptorProto, ServiceDescriptorProto,
    };

    fn echo_pool() -> DescriptorPool {
        let text_field = FieldDescriptorProto {
            name: Some("text".into()),
            json_name: Some("text".into()),
            number: Some(1),
            label: Some(Label::Optional as i32),
            r#type: Some(Type::String as i32),
            ..Default::default()
        };
        let file = FileDescriptorProto {
            name: Some("echo.proto".into()),
            package: Some("echo".into()),
            syntax: Some("proto3".into()),
            message_type: vec![
                DescriptorProto {
                    name: Some("SayRequest".into()),
                    field: vec![text_field.clone()],
                    ..Default::default()
                },
                DescriptorProto {
                    name: Some("SayResponse".into()),
                    field: vec![text_field],
                    ..Default::default()
                },
            ],
            enum_type: vec![EnumDescriptorProto {
                name: Some("Mood".into()),
                value: vec![EnumValueDescriptorProto {
                    name: Some("MOOD_UNSPECIFIED".into()),
                    number: Some(0),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            service: vec![ServiceDescriptorProto {
                name: Some("Echo".into()),
                method: vec![MethodDescriptorProto {
                    name: Some("Say".into()),
                    input_type: Some(".echo.SayRequest".into()),
                    output_type: Some(".echo.SayResponse".into()),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file: vec![file] }).unwrap()
    }

    #[test]
    fn test_index_services() {
        let registry = SchemaRegistry::new(echo_pool());
        let types = registry.method("/echo.Echo/Say").unwrap();
        assert_eq!(types.request, "echo.SayRequest");
        assert_eq!(types.response, "echo.SayResponse");
        assert!(!types.client_streaming);
        assert!(!types.server_streaming);
        assert!(registry.method("/echo.Echo/Shout").is_none());
    }

    #[test]
    fn test_resolve_and_render() {
        let registry = SchemaRegistry::new(echo_pool());
        let message = registry.resolve(b"\x0a\x02hi", "echo.SayRequest").unwrap();
        let text = registry.render(&message, false).unwrap();
        assert!(text.contains("\"text\": \"hi\""));
        assert!(text.contains('\n'));

        let truncated = registry.render(&message, true).unwrap();
        assert!(truncated.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_resolve_errors() {
        let registry = SchemaRegistry::new(echo_pool());
        assert!(matches!(
            registry.resolve(b"", "echo.Missing"),
            Err(Error::TypeNotFound(_))
        ));
        assert!(matches!(
            registry.resolve(b"", "echo.Mood"),
            Err(Error::NotAMessage(_))
        ));
        assert!(matches!(
            registry.resolve(b"", "echo.Echo"),
            Err(Error::NotAMessage(_))
        ));
        assert!(matches!(
            registry.resolve(b"\x0a\x05hi", "echo.SayRequest"),
            Err(Error::MalformedPayload { .. })
        ));
    }

    #[test]
    fn test_json_roundtrip_is_semantic() {
        let registry = SchemaRegistry::new(echo_pool());
        let message = registry
            .parse_json(serde_json::json!({"text": "hello"}), "echo.SayResponse")
            .unwrap();
        let bytes = registry.encode(&message);
        assert_eq!(bytes, b"\x0a\x05hello");

        let back = registry.resolve(&bytes, "echo.SayResponse").unwrap();
        assert_eq!(registry.to_json(&back).unwrap()["text"], "hello");

        assert!(matches!(
            registry.parse_json(serde_json::json!({"nope": 1}), "echo.SayResponse"),
            Err(Error::Json { .. })
        ));
    }
}
