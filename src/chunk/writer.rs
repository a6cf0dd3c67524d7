use crate::chunk::header::{encode_basic_header, ChunkFormat, MessageHeader};
use crate::protocol::{
    ControlMessage, RtmpHeader, RtmpMessage, DEFAULT_CHUNK_SIZE, MAX_MESSAGE_LENGTH,
    MSG_TYPE_SET_CHUNK_SIZE,
};
use crate::utils::write_all_within;
use crate::{ByteBuffer, Error, Result};
use log::debug;
use std::time::Duration;
use tokio::io::AsyncWrite;

/// Splits outbound messages into chunks.
///
/// Every message goes out as one type 0 chunk followed by type 3
/// continuations, and a message is fully written before the next one starts.
pub struct ChunkWriter {
    /// Current chunk size for writing
    chunk_size_out: usize,

    write_timeout: Option<Duration>,
}

impl Default for ChunkWriter {
    fn default() -> Self {
        ChunkWriter::new()
    }
}

impl ChunkWriter {
    /// Create new chunk writer
    pub fn new() -> Self {
        ChunkWriter {
            chunk_size_out: DEFAULT_CHUNK_SIZE as usize,
            write_timeout: None,
        }
    }

    /// Set outgoing chunk size
    pub fn set_chunk_size(&mut self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(Error::config("outbound chunk size must be at least 1"));
        }
        self.chunk_size_out = size;
        Ok(())
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size_out
    }

    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) {
        self.write_timeout = timeout;
    }

    /// Write message as chunks.
    ///
    /// A Set Chunk Size message switches this writer to the announced size
    /// once it is on the wire.
    pub async fn write_message<W: AsyncWrite + Unpin>(
        &mut self,
        message: &RtmpMessage,
        writer: &mut W,
    ) -> Result<()> {
        let chunks = self.create_chunks(message)?;
        write_all_within(writer, &chunks, self.write_timeout, "chunk write").await?;

        if message.message_type() == MSG_TYPE_SET_CHUNK_SIZE {
            if let ControlMessage::SetChunkSize(size) = ControlMessage::parse(message)? {
                debug!("outbound chunk size {} -> {}", self.chunk_size_out, size);
                self.set_chunk_size(size as usize)?;
            }
        }
        Ok(())
    }

    /// Create chunks from message
    pub fn create_chunks(&self, message: &RtmpMessage) -> Result<Vec<u8>> {
        self.create_chunks_with_tag(message.header(), &[], message.payload())
    }

    /// Chunk `tag` followed by `body` as a single message.
    ///
    /// The length field is written as zero and patched once both parts are
    /// in place; `header.message_length` is ignored. The tag must fit in
    /// the first chunk.
    pub fn create_chunks_with_tag(&self, header: &RtmpHeader, tag: &[u8], body: &[u8]) -> Result<Vec<u8>> {
        let chunk_size = self.chunk_size_out;
        if tag.len() > chunk_size {
            return Err(Error::config(format!(
                "tag header of {} bytes exceeds chunk size {}",
                tag.len(),
                chunk_size
            )));
        }

        let total = tag.len() + body.len();
        if total > MAX_MESSAGE_LENGTH as usize {
            return Err(Error::framing(format!(
                "message of {} bytes exceeds the 24-bit length field",
                total
            )));
        }

        let csid = header.chunk_stream_id;
        let fields = MessageHeader {
            timestamp: header.timestamp,
            length: 0,
            type_id: header.message_type,
            stream_id: header.message_stream_id,
        };

        let num_chunks = total.div_ceil(chunk_size).max(1);
        let mut out = ByteBuffer::with_capacity(total + num_chunks * 8 + 16);

        // First chunk with full header
        encode_basic_header(&mut out, ChunkFormat::Full, csid)?;
        let length_pos = fields
            .encode(&mut out, ChunkFormat::Full)?
            .ok_or_else(|| Error::invalid_state("type 0 header without a length field"))?;
        out.write_bytes(tag);

        let first = body.len().min(chunk_size - tag.len());
        out.write_bytes(&body[..first]);

        // Continuation chunks (type 3)
        let mut offset = first;
        while offset < body.len() {
            encode_basic_header(&mut out, ChunkFormat::Continuation, csid)?;
            fields.encode(&mut out, ChunkFormat::Continuation)?;

            let end = (offset + chunk_size).min(body.len());
            out.write_bytes(&body[offset..end]);
            offset = end;
        }

        out.patch_u24_be(length_pos, total as u32)?;
        Ok(out.into_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkReader;
    use crate::protocol::{MSG_TYPE_VIDEO, EXTENDED_TIMESTAMP};

    #[test]
    fn test_single_chunk_layout() {
        let writer = ChunkWriter::new();
        let msg = RtmpMessage::new(3, 20, 0, 0, vec![0xAA; 10]);
        let bytes = writer.create_chunks(&msg).unwrap();

        assert_eq!(bytes.len(), 1 + 11 + 10);
        assert_eq!(bytes[0], 0x03);
        assert_eq!(&bytes[4..7], &[0, 0, 10]);
    }

    #[test]
    fn test_continuations_use_type3() {
        let writer = ChunkWriter::new();
        let msg = RtmpMessage::new(4, 8, 1, 0, vec![0x11; 300]);
        let bytes = writer.create_chunks(&msg).unwrap();

        // 128 + 128 + 44
        assert_eq!(bytes.len(), 12 + 128 + 1 + 128 + 1 + 44);
        assert_eq!(bytes[12 + 128], 0xC4);
        assert_eq!(bytes[12 + 128 + 1 + 128], 0xC4);
    }

    #[test]
    fn test_tag_header_patched_length() {
        let mut writer = ChunkWriter::new();
        writer.set_chunk_size(8).unwrap();
        let header = RtmpHeader::new(0, 0, MSG_TYPE_VIDEO, 1, 6);
        let bytes = writer
            .create_chunks_with_tag(&header, &[0x17, 0x01], &[1, 2, 3, 4, 5, 6, 7, 8])
            .unwrap();

        assert_eq!(&bytes[4..7], &[0, 0, 10]);
        // First chunk: tag + 6 body bytes
        assert_eq!(&bytes[12..20], &[0x17, 0x01, 1, 2, 3, 4, 5, 6]);
        assert_eq!(&bytes[20..], &[0xC6, 7, 8]);
    }

    #[test]
    fn test_tag_larger_than_chunk_is_configuration_error() {
        let mut writer = ChunkWriter::new();
        writer.set_chunk_size(4).unwrap();
        let header = RtmpHeader::new(0, 0, MSG_TYPE_VIDEO, 1, 6);
        let err = writer.create_chunks_with_tag(&header, &[0; 5], &[]).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(writer.set_chunk_size(0).is_err());
    }

    #[test]
    fn test_extended_timestamp_on_continuations() {
        let writer = ChunkWriter::new();
        let msg = RtmpMessage::new(4, 8, 1, 0x0123_4567, vec![0; 200]);
        let bytes = writer.create_chunks(&msg).unwrap();

        assert_eq!(&bytes[1..4], &[0xFF, 0xFF, 0xFF]);
        assert_eq!(&bytes[12..16], &[0x01, 0x23, 0x45, 0x67]);
        let cont = 16 + 128;
        assert_eq!(bytes[cont], 0xC4);
        assert_eq!(&bytes[cont + 1..cont + 5], &[0x01, 0x23, 0x45, 0x67]);
    }

    #[tokio::test]
    async fn test_round_trip_across_chunk_sizes() {
        let payload: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        for chunk_size in [1usize, 7, 128, 999, 1000, 4096] {
            for timestamp in [0, 1234, EXTENDED_TIMESTAMP, 0xFFFF_FFFF] {
                let mut writer = ChunkWriter::new();
                writer.set_chunk_size(chunk_size).unwrap();
                let msg = RtmpMessage::new(330, 9, 7, timestamp, payload.clone());
                let bytes = writer.create_chunks(&msg).unwrap();

                let mut reader = ChunkReader::new();
                reader.set_chunk_size(chunk_size).unwrap();
                let decoded = reader.read_message(&mut bytes.as_slice()).await.unwrap();
                assert_eq!(decoded, msg, "chunk size {} timestamp {}", chunk_size, timestamp);
            }
        }
    }

    #[tokio::test]
    async fn test_set_chunk_size_switches_writer() {
        let mut writer = ChunkWriter::new();
        let mut sink = Vec::new();
        let announce = ControlMessage::SetChunkSize(4096).to_message();
        writer.write_message(&announce, &mut sink).await.unwrap();
        assert_eq!(writer.chunk_size(), 4096);
        assert_eq!(sink.len(), 1 + 11 + 4);
    }
}
