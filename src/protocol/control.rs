use crate::protocol::constants::*;
use crate::protocol::RtmpMessage;
use crate::{ByteBuffer, Error, Result};

/// Protocol control messages (types 1, 2, 3, 5, 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    SetChunkSize(u32),
    Abort(u32),
    Acknowledgement(u32),
    WindowAckSize(u32),
    SetPeerBandwidth { size: u32, limit_type: u8 },
}

impl ControlMessage {
    pub fn parse(msg: &RtmpMessage) -> Result<Self> {
        let mut buffer = ByteBuffer::new(msg.payload().to_vec());
        let value = buffer
            .read_u32_be()
            .map_err(|_| Error::framing(format!(
                "control message type {} shorter than 4 bytes",
                msg.message_type()
            )))?;

        match msg.message_type() {
            MSG_TYPE_SET_CHUNK_SIZE => {
                if value & 0x8000_0000 != 0 || value == 0 {
                    return Err(Error::framing(format!("Invalid chunk size: {}", value)));
                }
                Ok(ControlMessage::SetChunkSize(value))
            }
            MSG_TYPE_ABORT => Ok(ControlMessage::Abort(value)),
            MSG_TYPE_ACK => Ok(ControlMessage::Acknowledgement(value)),
            MSG_TYPE_WINDOW_ACK => Ok(ControlMessage::WindowAckSize(value)),
            MSG_TYPE_SET_PEER_BW => {
                let limit_type = buffer
                    .read_u8()
                    .map_err(|_| Error::framing("set peer bandwidth missing limit type"))?;
                Ok(ControlMessage::SetPeerBandwidth { size: value, limit_type })
            }
            other => Err(Error::framing(format!(
                "message type {} is not a control message",
                other
            ))),
        }
    }

    /// Build the wire message; control messages ride csid 2, stream 0
    pub fn to_message(&self) -> RtmpMessage {
        let mut buffer = ByteBuffer::with_capacity(5);
        let message_type = match *self {
            ControlMessage::SetChunkSize(size) => {
                buffer.write_u32_be(size & MAX_CHUNK_SIZE);
                MSG_TYPE_SET_CHUNK_SIZE
            }
            ControlMessage::Abort(csid) => {
                buffer.write_u32_be(csid);
                MSG_TYPE_ABORT
            }
            ControlMessage::Acknowledgement(seq) => {
                buffer.write_u32_be(seq);
                MSG_TYPE_ACK
            }
            ControlMessage::WindowAckSize(size) => {
                buffer.write_u32_be(size);
                MSG_TYPE_WINDOW_ACK
            }
            ControlMessage::SetPeerBandwidth { size, limit_type } => {
                buffer.write_u32_be(size);
                buffer.write_u8(limit_type);
                MSG_TYPE_SET_PEER_BW
            }
        };
        RtmpMessage::new(CHUNK_STREAM_PROTOCOL, message_type, 0, 0, buffer.into_vec())
    }
}
