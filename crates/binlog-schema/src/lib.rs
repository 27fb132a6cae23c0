//! Binlog Schema - dynamic schema registry
//!
//! This crate turns protobuf schemas into a runtime type index:
//! - Builder: loads `.proto` sources and serialized descriptor sets
//! - Registry: immutable method table plus reflection-based decoding,
//!   rendering and JSON re-encoding of message payloads

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod error;
pub mod registry;

pub use builder::SchemaRegistryBuilder;
pub use error::{Error, Result};
pub use registry::{index_services, MethodTypes, SchemaRegistry, TRUNCATION_MARKER};

pub use prost_reflect::DynamicMessage;
