use crate::message::types::MessageType;
use crate::{Amf0Value, Result, RtmpCommand, RtmpMessage};

mod dispatcher;
mod types;

pub use dispatcher::*;
pub use types::*;

pub fn classify_message(message: &RtmpMessage) -> MessageType {
    MessageType::from_id(message.message_type())
}

/// Build the `_result` answering a command request, on the request's stream
pub fn create_response(request: &RtmpMessage, properties: Amf0Value, info: Amf0Value) -> Result<RtmpMessage> {
    let command = RtmpCommand::decode(request.payload())?;
    RtmpCommand::result(command.transaction_id, properties, info)
        .into_message(request.timestamp(), request.message_stream_id())
}
