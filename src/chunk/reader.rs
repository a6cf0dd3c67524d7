use crate::chunk::header::{basic_header_extra_len, decode_basic_header, ChunkFormat};
use crate::chunk::table::ChunkStreamTable;
use crate::protocol::{RtmpMessage, DEFAULT_CHUNK_SIZE, MAX_CHUNK_STREAMS};
use crate::utils::read_exact_within;
use crate::{Error, Result};
use log::trace;
use std::time::Duration;
use tokio::io::AsyncRead;

/// Reassembles messages from inbound chunks.
///
/// Owns the connection's [`ChunkStreamTable`]; one reader per connection.
pub struct ChunkReader {
    /// Chunk streams by ID
    table: ChunkStreamTable,

    /// Current chunk size for reading
    chunk_size_in: usize,

    /// Applied to every individual read
    read_timeout: Option<Duration>,
}

impl Default for ChunkReader {
    fn default() -> Self {
        ChunkReader::new()
    }
}

impl ChunkReader {
    /// Create new chunk reader
    pub fn new() -> Self {
        ChunkReader::with_limit(MAX_CHUNK_STREAMS)
    }

    /// Reader whose table admits at most `max_chunk_streams` csids
    pub fn with_limit(max_chunk_streams: usize) -> Self {
        ChunkReader {
            table: ChunkStreamTable::new(max_chunk_streams),
            chunk_size_in: DEFAULT_CHUNK_SIZE as usize,
            read_timeout: None,
        }
    }

    /// Set incoming chunk size
    pub fn set_chunk_size(&mut self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(Error::framing("inbound chunk size must be at least 1"));
        }
        self.chunk_size_in = size;
        Ok(())
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size_in
    }

    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    pub fn table(&self) -> &ChunkStreamTable {
        &self.table
    }

    /// Discard the partial message on `csid`
    pub fn abort(&mut self, csid: u32) -> bool {
        self.table.abort(csid)
    }

    async fn read_exact<R: AsyncRead + Unpin>(
        &self,
        reader: &mut R,
        buf: &mut [u8],
        what: &str,
    ) -> Result<()> {
        read_exact_within(reader, buf, self.read_timeout, what).await
    }

    /// Read next chunk from stream.
    ///
    /// Returns the message once its final chunk has been read.
    pub async fn read_chunk<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut R,
    ) -> Result<Option<RtmpMessage>> {
        // Basic header (1-3 bytes)
        let mut first = [0u8; 1];
        self.read_exact(reader, &mut first, "chunk basic header").await?;

        let mut extra = [0u8; 2];
        let extra_len = basic_header_extra_len(first[0]);
        self.read_exact(reader, &mut extra[..extra_len], "chunk stream id").await?;
        let (format, csid) = decode_basic_header(first[0], &extra[..extra_len])?;

        // Message header (0, 3, 7 or 11 bytes)
        let mut fields = [0u8; 11];
        let header_len = format.message_header_len();
        self.read_exact(reader, &mut fields[..header_len], "chunk message header")
            .await?;
        let mut header = format.decode(&fields[..header_len])?;

        let context = match format {
            ChunkFormat::Full => self.table.get_or_insert(csid)?,
            _ => self.table.get_mut(csid).ok_or_else(|| {
                Error::framing(format!(
                    "{:?} header on csid {} with no prior header",
                    format, csid
                ))
            })?,
        };

        let extended = header.needs_extended(context.is_extended());
        if extended {
            let mut ext = [0u8; 4];
            read_exact_within(reader, &mut ext, self.read_timeout, "extended timestamp").await?;
            header.set_extended(u32::from_be_bytes(ext));
        }

        context.apply(header, extended)?;

        let tail = context.reserve_chunk(self.chunk_size_in)?;
        let len = tail.len();
        read_exact_within(reader, tail, self.read_timeout, "chunk payload").await?;

        trace!(
            "chunk fmt={:?} csid={} len={} remaining={}",
            format,
            csid,
            len,
            context.remaining().saturating_sub(len)
        );

        Ok(context.commit_chunk())
    }

    /// Read chunks until a full message has been reassembled
    pub async fn read_message<R: AsyncRead + Unpin>(&mut self, reader: &mut R) -> Result<RtmpMessage> {
        loop {
            if let Some(message) = self.read_chunk(reader).await? {
                return Ok(message);
            }
        }
    }
}
