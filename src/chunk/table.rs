use crate::chunk::header::DecodedHeader;
use crate::protocol::{RtmpMessage, MAX_CHUNK_STREAMS};
use crate::{Error, Result};

/// Payload buffers start no larger than this; the rest grows as chunks arrive
const INITIAL_PAYLOAD_CAPACITY: usize = 64 * 1024;

/// Reassembly state for one chunk stream.
///
/// Always holds the header fields the next type 1/2/3 chunk on this csid
/// would inherit.
#[derive(Debug, Clone)]
pub struct ChunkStreamContext {
    csid: u32,
    timestamp: u32,
    timestamp_delta: u32,
    message_length: u32,
    message_type: u8,
    message_stream_id: u32,
    extended: bool,
    in_message: bool,
    payload: Vec<u8>,
    remaining: usize,
}

impl ChunkStreamContext {
    fn new(csid: u32) -> Self {
        ChunkStreamContext {
            csid,
            timestamp: 0,
            timestamp_delta: 0,
            message_length: 0,
            message_type: 0,
            message_stream_id: 0,
            extended: false,
            in_message: false,
            payload: Vec::new(),
            remaining: 0,
        }
    }

    pub fn csid(&self) -> u32 {
        self.csid
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn timestamp_delta(&self) -> u32 {
        self.timestamp_delta
    }

    pub fn message_length(&self) -> u32 {
        self.message_length
    }

    pub fn message_type(&self) -> u8 {
        self.message_type
    }

    pub fn message_stream_id(&self) -> u32 {
        self.message_stream_id
    }

    /// Whether the last explicit timestamp travelled in the extended field
    pub fn is_extended(&self) -> bool {
        self.extended
    }

    /// Check if currently assembling a message
    pub fn is_assembling(&self) -> bool {
        self.in_message
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Apply a decoded header, inheriting whatever it leaves out.
    ///
    /// `extended` says whether the header's timestamp came from the extended
    /// field. Starts a new message unless one is already in progress.
    pub fn apply(&mut self, header: DecodedHeader, extended: bool) -> Result<()> {
        if self.in_message && header.format() != super::ChunkFormat::Continuation {
            return Err(Error::framing(format!(
                "{:?} header on csid {} with {} bytes of the current message outstanding",
                header.format(),
                self.csid,
                self.remaining
            )));
        }

        match header {
            DecodedHeader::Full {
                timestamp,
                length,
                type_id,
                stream_id,
            } => {
                self.timestamp = timestamp;
                self.timestamp_delta = 0;
                self.message_length = length;
                self.message_type = type_id;
                self.message_stream_id = stream_id;
                self.extended = extended;
            }
            DecodedHeader::Delta {
                delta,
                length,
                type_id,
            } => {
                self.timestamp_delta = delta;
                self.timestamp = self.timestamp.wrapping_add(delta);
                self.message_length = length;
                self.message_type = type_id;
                self.extended = extended;
            }
            DecodedHeader::TimestampOnly { delta } => {
                self.timestamp_delta = delta;
                self.timestamp = self.timestamp.wrapping_add(delta);
                self.extended = extended;
            }
            DecodedHeader::Continuation { .. } => {
                // A type 3 that opens a message repeats the previous delta
                if !self.in_message {
                    self.timestamp = self.timestamp.wrapping_add(self.timestamp_delta);
                }
            }
        }

        if !self.in_message {
            self.begin_message();
        }
        Ok(())
    }

    fn begin_message(&mut self) {
        let length = self.message_length as usize;
        self.in_message = true;
        self.remaining = length;
        self.payload = Vec::with_capacity(length.min(INITIAL_PAYLOAD_CAPACITY));
    }

    /// Bytes the next chunk carries under the given chunk size
    pub fn next_chunk_len(&self, chunk_size: usize) -> usize {
        self.remaining.min(chunk_size)
    }

    /// Append chunk payload; yields the message once the last byte arrives
    pub fn append(&mut self, data: &[u8]) -> Result<Option<RtmpMessage>> {
        self.ensure_assembling()?;
        if data.len() > self.remaining {
            return Err(Error::framing(format!(
                "chunk of {} bytes overruns message on csid {} ({} remaining)",
                data.len(),
                self.csid,
                self.remaining
            )));
        }

        self.payload.extend_from_slice(data);
        self.remaining -= data.len();
        Ok(self.finish_if_complete())
    }

    /// Grow the payload by the next chunk's length and return the new tail
    /// for the caller to read into. Follow with [`commit_chunk`](Self::commit_chunk).
    pub fn reserve_chunk(&mut self, chunk_size: usize) -> Result<&mut [u8]> {
        self.ensure_assembling()?;
        let start = self.payload.len();
        self.payload.resize(start + self.next_chunk_len(chunk_size), 0);
        Ok(&mut self.payload[start..])
    }

    /// Account for a tail filled after [`reserve_chunk`](Self::reserve_chunk)
    pub fn commit_chunk(&mut self) -> Option<RtmpMessage> {
        self.remaining = (self.message_length as usize).saturating_sub(self.payload.len());
        self.finish_if_complete()
    }

    fn ensure_assembling(&self) -> Result<()> {
        if !self.in_message {
            return Err(Error::invalid_state(format!(
                "payload for csid {} without a message header",
                self.csid
            )));
        }
        Ok(())
    }

    fn finish_if_complete(&mut self) -> Option<RtmpMessage> {
        if self.remaining > 0 {
            return None;
        }

        self.in_message = false;
        let payload = std::mem::take(&mut self.payload);
        Some(RtmpMessage::new(
            self.csid,
            self.message_type,
            self.message_stream_id,
            self.timestamp,
            payload,
        ))
    }

    /// Drop the partially reassembled message, keeping inherited fields
    pub fn abort(&mut self) {
        self.in_message = false;
        self.remaining = 0;
        self.payload = Vec::new();
    }
}

/// Bounded arena of chunk stream contexts for one connection.
///
/// Entries are created on first use and live until the connection ends.
/// Creating one past the limit fails instead of evicting.
#[derive(Debug, Clone)]
pub struct ChunkStreamTable {
    entries: Vec<ChunkStreamContext>,
    limit: usize,
}

impl Default for ChunkStreamTable {
    fn default() -> Self {
        ChunkStreamTable::new(MAX_CHUNK_STREAMS)
    }
}

impl ChunkStreamTable {
    pub fn new(limit: usize) -> Self {
        ChunkStreamTable {
            entries: Vec::with_capacity(limit),
            limit,
        }
    }

    fn slot(&self, csid: u32) -> Option<usize> {
        self.entries.iter().position(|entry| entry.csid == csid)
    }

    pub fn get(&self, csid: u32) -> Option<&ChunkStreamContext> {
        self.slot(csid).map(|idx| &self.entries[idx])
    }

    pub fn get_mut(&mut self, csid: u32) -> Option<&mut ChunkStreamContext> {
        self.slot(csid).map(move |idx| &mut self.entries[idx])
    }

    /// Look up `csid`, creating its context if there is room
    pub fn get_or_insert(&mut self, csid: u32) -> Result<&mut ChunkStreamContext> {
        let idx = match self.slot(csid) {
            Some(idx) => idx,
            None => {
                if self.entries.len() >= self.limit {
                    return Err(Error::TooManyChunkStreams {
                        csid,
                        limit: self.limit,
                    });
                }
                self.entries.push(ChunkStreamContext::new(csid));
                self.entries.len() - 1
            }
        };
        Ok(&mut self.entries[idx])
    }

    /// Discard the in-progress message on `csid`. Returns false if unknown.
    pub fn abort(&mut self, csid: u32) -> bool {
        match self.get_mut(csid) {
            Some(ctx) => {
                ctx.abort();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full(timestamp: u32, length: u32) -> DecodedHeader {
        DecodedHeader::Full {
            timestamp,
            length,
            type_id: 9,
            stream_id: 1,
        }
    }

    #[test]
    fn test_sixteen_streams_then_limit() {
        let mut table = ChunkStreamTable::default();
        for csid in 2..18 {
            table.get_or_insert(csid).unwrap();
        }
        assert_eq!(table.len(), 16);

        let err = table.get_or_insert(18).unwrap_err();
        assert!(matches!(err, Error::TooManyChunkStreams { csid: 18, limit: 16 }));

        // Existing entries are still reachable
        for csid in 2..18 {
            assert!(table.get_or_insert(csid).is_ok());
        }
        assert_eq!(table.len(), 16);
    }

    #[test]
    fn test_message_completes_at_zero_remaining() {
        let mut table = ChunkStreamTable::default();
        let ctx = table.get_or_insert(4).unwrap();
        ctx.apply(full(100, 5), false).unwrap();
        assert_eq!(ctx.next_chunk_len(3), 3);
        assert!(ctx.append(&[1, 2, 3]).unwrap().is_none());
        assert_eq!(ctx.remaining(), 2);

        ctx.apply(DecodedHeader::Continuation { extended: None }, false).unwrap();
        let msg = ctx.append(&[4, 5]).unwrap().unwrap();
        assert_eq!(msg.payload(), &[1, 2, 3, 4, 5]);
        assert_eq!(msg.timestamp(), 100);
        assert_eq!(msg.chunk_stream_id(), 4);
        assert!(!ctx.is_assembling());
    }

    #[test]
    fn test_reserve_and_commit_in_place() {
        let mut table = ChunkStreamTable::default();
        let ctx = table.get_or_insert(4).unwrap();
        assert!(ctx.reserve_chunk(128).is_err());

        ctx.apply(full(7, 5), false).unwrap();
        ctx.reserve_chunk(3).unwrap().copy_from_slice(&[1, 2, 3]);
        assert!(ctx.commit_chunk().is_none());
        assert_eq!(ctx.remaining(), 2);

        ctx.apply(DecodedHeader::Continuation { extended: None }, false).unwrap();
        let tail = ctx.reserve_chunk(3).unwrap();
        assert_eq!(tail.len(), 2);
        tail.copy_from_slice(&[4, 5]);
        let msg = ctx.commit_chunk().unwrap();
        assert_eq!(msg.payload(), &[1, 2, 3, 4, 5]);
        assert!(!ctx.is_assembling());
    }

    #[test]
    fn test_zero_length_message() {
        let mut table = ChunkStreamTable::default();
        let ctx = table.get_or_insert(3).unwrap();
        ctx.apply(full(0, 0), false).unwrap();
        let msg = ctx.append(&[]).unwrap().unwrap();
        assert!(msg.is_empty());
    }

    #[test]
    fn test_inheritance_chain() {
        let mut table = ChunkStreamTable::default();
        let ctx = table.get_or_insert(6).unwrap();

        ctx.apply(full(1000, 1), false).unwrap();
        ctx.append(&[0]).unwrap().unwrap();

        ctx.apply(
            DecodedHeader::Delta {
                delta: 40,
                length: 2,
                type_id: 8,
            },
            false,
        )
        .unwrap();
        let msg = ctx.append(&[0, 0]).unwrap().unwrap();
        assert_eq!((msg.timestamp(), msg.message_type(), msg.message_stream_id()), (1040, 8, 1));

        ctx.apply(DecodedHeader::TimestampOnly { delta: 20 }, false).unwrap();
        let msg = ctx.append(&[0, 0]).unwrap().unwrap();
        assert_eq!((msg.timestamp(), msg.len()), (1060, 2));

        // Type 3 opening a message reuses the last delta
        ctx.apply(DecodedHeader::Continuation { extended: None }, false).unwrap();
        let msg = ctx.append(&[0, 0]).unwrap().unwrap();
        assert_eq!(msg.timestamp(), 1080);
    }

    #[test]
    fn test_new_header_mid_message_is_framing_error() {
        let mut table = ChunkStreamTable::default();
        let ctx = table.get_or_insert(5).unwrap();
        ctx.apply(full(0, 10), false).unwrap();
        ctx.append(&[0; 4]).unwrap();
        assert!(matches!(
            ctx.apply(DecodedHeader::TimestampOnly { delta: 1 }, false),
            Err(Error::Framing(_))
        ));
    }

    #[test]
    fn test_overrun_is_framing_error() {
        let mut table = ChunkStreamTable::default();
        let ctx = table.get_or_insert(5).unwrap();
        ctx.apply(full(0, 2), false).unwrap();
        assert!(matches!(ctx.append(&[0; 3]), Err(Error::Framing(_))));
    }

    #[test]
    fn test_abort_keeps_context() {
        let mut table = ChunkStreamTable::default();
        {
            let ctx = table.get_or_insert(7).unwrap();
            ctx.apply(full(500, 10), false).unwrap();
            ctx.append(&[0; 4]).unwrap();
        }
        assert!(table.abort(7));
        assert!(!table.abort(8));

        let ctx = table.get_mut(7).unwrap();
        assert!(!ctx.is_assembling());
        assert_eq!(ctx.timestamp(), 500);
        assert_eq!(ctx.message_length(), 10);
    }
}
