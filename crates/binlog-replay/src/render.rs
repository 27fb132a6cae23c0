//! Render - schema-decoded message bodies of a conversation

use crate::conversation::Conversation;
use crate::error::{Error, Result};
use binlog_codec::CallEvent;
use binlog_schema::{MethodTypes, SchemaRegistry};

/// One decoded body, or the reason it could not be decoded
#[derive(Debug)]
pub struct RenderedMessage {
    /// Position within its direction
    pub index: usize,
    /// Rendered text
    pub text: Result<String>,
}

fn method_types<'r>(registry: &'r SchemaRegistry, conversation: &Conversation) -> Result<&'r MethodTypes> {
    let method = conversation.method_name();
    registry
        .method(method)
        .ok_or_else(|| Error::UnknownMethod(method.to_string()))
}

fn render_all(registry: &SchemaRegistry, events: &[CallEvent], type_name: &str) -> Vec<RenderedMessage> {
    events
        .iter()
        .enumerate()
        .map(|(index, event)| RenderedMessage {
            index,
            text: registry
                .resolve(event.body(), type_name)
                .and_then(|m| registry.render(&m, event.payload_truncated))
                .map_err(Error::from),
        })
        .collect()
}

/// Request bodies decoded with the method's request type
pub fn render_requests(registry: &SchemaRegistry, conversation: &Conversation) -> Result<Vec<RenderedMessage>> {
    let types = method_types(registry, conversation)?;
    Ok(render_all(registry, &conversation.request_messages, &types.request))
}

/// Response bodies decoded with the method's response type
pub fn render_responses(registry: &SchemaRegistry, conversation: &Conversation) -> Result<Vec<RenderedMessage>> {
    let types = method_types(registry, conversation)?;
    Ok(render_all(registry, &conversation.response_messages, &types.response))
}
