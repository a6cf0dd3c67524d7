use crate::protocol::{EXTENDED_TIMESTAMP, MAX_CHUNK_STREAM_ID, MIN_CHUNK_STREAM_ID};
use crate::{ByteBuffer, Error, Result};

/// The two top bits of the basic header: which message header fields
/// are explicit and which are inherited from the chunk stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkFormat {
    /// Type 0: absolute timestamp, length, type id, stream id
    Full,
    /// Type 1: timestamp delta, length, type id
    Delta,
    /// Type 2: timestamp delta only
    TimestampOnly,
    /// Type 3: nothing but the extended timestamp when one is in force
    Continuation,
}

impl ChunkFormat {
    pub fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            0 => Ok(ChunkFormat::Full),
            1 => Ok(ChunkFormat::Delta),
            2 => Ok(ChunkFormat::TimestampOnly),
            3 => Ok(ChunkFormat::Continuation),
            other => Err(Error::framing(format!("Invalid chunk format: {}", other))),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            ChunkFormat::Full => 0,
            ChunkFormat::Delta => 1,
            ChunkFormat::TimestampOnly => 2,
            ChunkFormat::Continuation => 3,
        }
    }

    /// Size of the message header that follows the basic header,
    /// excluding any extended timestamp
    pub fn message_header_len(self) -> usize {
        match self {
            ChunkFormat::Full => 11,
            ChunkFormat::Delta => 7,
            ChunkFormat::TimestampOnly => 3,
            ChunkFormat::Continuation => 0,
        }
    }

    /// Decode the fixed part of the message header for this format
    pub fn decode(self, bytes: &[u8]) -> Result<DecodedHeader> {
        if bytes.len() != self.message_header_len() {
            return Err(Error::framing(format!(
                "{:?} header needs {} bytes, got {}",
                self,
                self.message_header_len(),
                bytes.len()
            )));
        }
        let mut buffer = ByteBuffer::new(bytes.to_vec());
        match self {
            ChunkFormat::Full => decode_full(&mut buffer),
            ChunkFormat::Delta => decode_delta(&mut buffer),
            ChunkFormat::TimestampOnly => decode_timestamp_only(&mut buffer),
            ChunkFormat::Continuation => Ok(DecodedHeader::Continuation { extended: None }),
        }
    }
}

/// A message header as it came off the wire, before inheritance.
///
/// The timestamp fields hold the raw 24-bit value until
/// [`DecodedHeader::set_extended`] replaces a sentinel with the real value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedHeader {
    Full {
        timestamp: u32,
        length: u32,
        type_id: u8,
        stream_id: u32,
    },
    Delta {
        delta: u32,
        length: u32,
        type_id: u8,
    },
    TimestampOnly {
        delta: u32,
    },
    Continuation {
        extended: Option<u32>,
    },
}

impl DecodedHeader {
    pub fn format(&self) -> ChunkFormat {
        match self {
            DecodedHeader::Full { .. } => ChunkFormat::Full,
            DecodedHeader::Delta { .. } => ChunkFormat::Delta,
            DecodedHeader::TimestampOnly { .. } => ChunkFormat::TimestampOnly,
            DecodedHeader::Continuation { .. } => ChunkFormat::Continuation,
        }
    }

    /// Does an extended timestamp follow?
    ///
    /// Types 0-2 announce it with the sentinel; type 3 carries one whenever
    /// the header it continues did.
    pub fn needs_extended(&self, stream_extended: bool) -> bool {
        match *self {
            DecodedHeader::Full { timestamp, .. } => timestamp == EXTENDED_TIMESTAMP,
            DecodedHeader::Delta { delta, .. } | DecodedHeader::TimestampOnly { delta } => {
                delta == EXTENDED_TIMESTAMP
            }
            DecodedHeader::Continuation { .. } => stream_extended,
        }
    }

    pub fn set_extended(&mut self, value: u32) {
        match self {
            DecodedHeader::Full { timestamp, .. } => *timestamp = value,
            DecodedHeader::Delta { delta, .. } | DecodedHeader::TimestampOnly { delta } => {
                *delta = value
            }
            DecodedHeader::Continuation { extended } => *extended = Some(value),
        }
    }
}

fn decode_full(buffer: &mut ByteBuffer) -> Result<DecodedHeader> {
    let timestamp = buffer.read_u24_be()?;
    let length = buffer.read_u24_be()?;
    let type_id = buffer.read_u8()?;
    let stream_id = buffer.read_u32_le()?;
    Ok(DecodedHeader::Full {
        timestamp,
        length,
        type_id,
        stream_id,
    })
}

fn decode_delta(buffer: &mut ByteBuffer) -> Result<DecodedHeader> {
    let delta = buffer.read_u24_be()?;
    let length = buffer.read_u24_be()?;
    let type_id = buffer.read_u8()?;
    Ok(DecodedHeader::Delta {
        delta,
        length,
        type_id,
    })
}

fn decode_timestamp_only(buffer: &mut ByteBuffer) -> Result<DecodedHeader> {
    let delta = buffer.read_u24_be()?;
    Ok(DecodedHeader::TimestampOnly { delta })
}

/// How many bytes follow the first basic header byte: 0, 1 or 2
pub fn basic_header_extra_len(first: u8) -> usize {
    match first & 0x3F {
        0 => 1,
        1 => 2,
        _ => 0,
    }
}

/// Resolve format and csid from the first basic header byte plus the
/// extra bytes announced by [`basic_header_extra_len`].
pub fn decode_basic_header(first: u8, extra: &[u8]) -> Result<(ChunkFormat, u32)> {
    let format = ChunkFormat::from_bits(first >> 6)?;
    let marker = first & 0x3F;
    let expected = basic_header_extra_len(first);
    if extra.len() != expected {
        return Err(Error::framing(format!(
            "basic header marker {} needs {} extra bytes, got {}",
            marker,
            expected,
            extra.len()
        )));
    }
    let csid = match marker {
        0 => extra[0] as u32 + 64,
        1 => u16::from_be_bytes([extra[0], extra[1]]) as u32 + 64,
        n => n as u32,
    };
    Ok((format, csid))
}

/// Append a basic header, picking the shortest form that fits `csid`
pub fn encode_basic_header(out: &mut ByteBuffer, format: ChunkFormat, csid: u32) -> Result<()> {
    if !(MIN_CHUNK_STREAM_ID..=MAX_CHUNK_STREAM_ID).contains(&csid) {
        return Err(Error::framing(format!(
            "chunk stream id {} outside {}..={}",
            csid, MIN_CHUNK_STREAM_ID, MAX_CHUNK_STREAM_ID
        )));
    }
    let fmt = format.bits() << 6;
    if csid <= 63 {
        out.write_u8(fmt | csid as u8);
    } else if csid <= 319 {
        out.write_u8(fmt);
        out.write_u8((csid - 64) as u8);
    } else {
        out.write_u8(fmt | 1);
        out.write_u16_be((csid - 64) as u16);
    }
    Ok(())
}

/// Fields a writer puts into a message header.
///
/// `timestamp` is absolute for type 0 and a delta for types 1 and 2. For
/// type 3 it is the value repeated in the extended field, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub timestamp: u32,
    pub length: u32,
    pub type_id: u8,
    pub stream_id: u32,
}

impl MessageHeader {
    pub fn is_extended(&self) -> bool {
        self.timestamp >= EXTENDED_TIMESTAMP
    }

    /// Append the message header for `format`, extended timestamp included.
    ///
    /// Returns the buffer position of the length field when the format has one,
    /// so a caller can patch it after the payload is known.
    pub fn encode(&self, out: &mut ByteBuffer, format: ChunkFormat) -> Result<Option<usize>> {
        if self.length > crate::protocol::MAX_MESSAGE_LENGTH {
            return Err(Error::framing(format!(
                "message length {} does not fit in 24 bits",
                self.length
            )));
        }
        let field = self.timestamp.min(EXTENDED_TIMESTAMP);
        let mut length_pos = None;

        match format {
            ChunkFormat::Full => {
                out.write_u24_be(field);
                length_pos = Some(out.len());
                out.write_u24_be(self.length);
                out.write_u8(self.type_id);
                out.write_u32_le(self.stream_id);
            }
            ChunkFormat::Delta => {
                out.write_u24_be(field);
                length_pos = Some(out.len());
                out.write_u24_be(self.length);
                out.write_u8(self.type_id);
            }
            ChunkFormat::TimestampOnly => out.write_u24_be(field),
            ChunkFormat::Continuation => {}
        }

        if self.is_extended() {
            out.write_u32_be(self.timestamp);
        }
        Ok(length_pos)
    }
}
