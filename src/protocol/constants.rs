// Message types
pub const MSG_TYPE_SET_CHUNK_SIZE: u8 = 1;
pub const MSG_TYPE_ABORT: u8 = 2;
pub const MSG_TYPE_ACK: u8 = 3;
pub const MSG_TYPE_USER_CONTROL: u8 = 4;
pub const MSG_TYPE_WINDOW_ACK: u8 = 5;
pub const MSG_TYPE_SET_PEER_BW: u8 = 6;
pub const MSG_TYPE_AUDIO: u8 = 8;
pub const MSG_TYPE_VIDEO: u8 = 9;
pub const MSG_TYPE_DATA_AMF3: u8 = 15;
pub const MSG_TYPE_SHARED_OBJECT_AMF3: u8 = 16;
pub const MSG_TYPE_COMMAND_AMF3: u8 = 17;
pub const MSG_TYPE_DATA_AMF0: u8 = 18;
pub const MSG_TYPE_SHARED_OBJECT_AMF0: u8 = 19;
pub const MSG_TYPE_COMMAND_AMF0: u8 = 20;
pub const MSG_TYPE_AGGREGATE: u8 = 22;

// Chunk stream IDs
pub const CHUNK_STREAM_PROTOCOL: u32 = 2;
pub const CHUNK_STREAM_COMMAND: u32 = 3;
pub const CHUNK_STREAM_AUDIO: u32 = 4;
pub const CHUNK_STREAM_VIDEO: u32 = 6;
pub const CHUNK_STREAM_DATA: u32 = 8;

/// Smallest csid a basic header can carry (0 and 1 select the long forms)
pub const MIN_CHUNK_STREAM_ID: u32 = 2;
/// Largest csid, reachable through the 3-byte basic header
pub const MAX_CHUNK_STREAM_ID: u32 = 65599;

// Default values
pub const DEFAULT_CHUNK_SIZE: u32 = 128;
pub const DEFAULT_WINDOW_SIZE: u32 = 2500000;
pub const MAX_CHUNK_SIZE: u32 = 0x7FFF_FFFF;

/// Per-connection cap on concurrently known chunk streams
pub const MAX_CHUNK_STREAMS: usize = 16;

/// Timestamps at or above this value travel in the extended field
pub const EXTENDED_TIMESTAMP: u32 = 0x00FF_FFFF;

/// Message lengths are carried in 3 bytes
pub const MAX_MESSAGE_LENGTH: u32 = 0x00FF_FFFF;
