use crate::protocol::constants::*;

/// Header fields of a complete message, plus the chunk stream it travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtmpHeader {
    pub timestamp: u32,
    pub message_length: u32,
    pub message_type: u8,
    pub message_stream_id: u32,
    pub chunk_stream_id: u32,
}

impl RtmpHeader {
    pub fn new(
        timestamp: u32,
        message_length: u32,
        message_type: u8,
        message_stream_id: u32,
        chunk_stream_id: u32,
    ) -> Self {
        RtmpHeader {
            timestamp,
            message_length,
            message_type,
            message_stream_id,
            chunk_stream_id,
        }
    }

    /// Check if timestamp is extended (>= 0xFFFFFF)
    pub fn has_extended_timestamp(&self) -> bool {
        self.timestamp >= EXTENDED_TIMESTAMP
    }
}

/// A complete application message.
///
/// Immutable once built: the length in the header always matches the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtmpMessage {
    header: RtmpHeader,
    payload: Vec<u8>,
}

impl RtmpMessage {
    pub fn new(
        chunk_stream_id: u32,
        message_type: u8,
        message_stream_id: u32,
        timestamp: u32,
        payload: Vec<u8>,
    ) -> Self {
        let header = RtmpHeader::new(
            timestamp,
            payload.len() as u32,
            message_type,
            message_stream_id,
            chunk_stream_id,
        );
        RtmpMessage { header, payload }
    }

    /// Rebuild from a header, taking the length from the payload
    pub fn from_parts(header: RtmpHeader, payload: Vec<u8>) -> Self {
        RtmpMessage::new(
            header.chunk_stream_id,
            header.message_type,
            header.message_stream_id,
            header.timestamp,
            payload,
        )
    }

    pub fn header(&self) -> &RtmpHeader {
        &self.header
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub fn message_type(&self) -> u8 {
        self.header.message_type
    }

    pub fn message_stream_id(&self) -> u32 {
        self.header.message_stream_id
    }

    pub fn chunk_stream_id(&self) -> u32 {
        self.header.chunk_stream_id
    }

    pub fn timestamp(&self) -> u32 {
        self.header.timestamp
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn is_command(&self) -> bool {
        self.header.message_type == MSG_TYPE_COMMAND_AMF0
    }

    pub fn is_control(&self) -> bool {
        matches!(
            self.header.message_type,
            MSG_TYPE_SET_CHUNK_SIZE
                | MSG_TYPE_ABORT
                | MSG_TYPE_ACK
                | MSG_TYPE_WINDOW_ACK
                | MSG_TYPE_SET_PEER_BW
        )
    }

    /// Audio message on the conventional audio chunk stream
    pub fn audio(payload: Vec<u8>, timestamp: u32, stream_id: u32) -> Self {
        RtmpMessage::new(CHUNK_STREAM_AUDIO, MSG_TYPE_AUDIO, stream_id, timestamp, payload)
    }

    /// Video message on the conventional video chunk stream
    pub fn video(payload: Vec<u8>, timestamp: u32, stream_id: u32) -> Self {
        RtmpMessage::new(CHUNK_STREAM_VIDEO, MSG_TYPE_VIDEO, stream_id, timestamp, payload)
    }

    /// AMF0 command message on the command chunk stream
    pub fn command(payload: Vec<u8>, timestamp: u32, stream_id: u32) -> Self {
        RtmpMessage::new(CHUNK_STREAM_COMMAND, MSG_TYPE_COMMAND_AMF0, stream_id, timestamp, payload)
    }

    /// AMF0 data message
    pub fn data(payload: Vec<u8>, timestamp: u32, stream_id: u32) -> Self {
        RtmpMessage::new(CHUNK_STREAM_DATA, MSG_TYPE_DATA_AMF0, stream_id, timestamp, payload)
    }
}
