//! # Frame Transport
//!
//! Byte-exact reads over a raw stream that may become zstd-framed mid
//! session. [`FrameReader::read_exactly`] serves exactly `n` decoded bytes,
//! reassembling across however many socket reads it takes; once compression
//! is armed, incoming bytes run through a streaming zstd decoder whose
//! output is chunk-size invariant (a partial frame simply yields nothing
//! until more bytes arrive).
//!
//! Writes are symmetric: one zstd frame per write when armed, raw
//! passthrough otherwise. The protocol's upgrade is triggered by a message
//! that one side already transmitted under the old mode, so
//! [`CompressionSwitch::arm`] carries a skip count letting exactly that many
//! in-flight writes through uncompressed.
//!
//! All four endpoints of a session (client read/write, upstream read/write)
//! share their switches with the session, which arms them in one place.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use zstd::stream::raw::{Decoder as RawDecoder, InBuffer, Operation, OutBuffer};

use crate::config::{DEFAULT_COMPRESSION_LEVEL, MAX_PAYLOAD_SIZE};
use crate::core::packet::{Direction, Packet};
use crate::core::wire::signed_from_vlq;
use crate::error::{ProtocolError, Result};

/// Longest legal envelope varint (matches the codec layer).
const MAX_ENVELOPE_VLQ_BYTES: usize = 10;

/// Arm-once compression state shared between a transport endpoint and the
/// session that owns it.
#[derive(Debug, Default)]
pub struct CompressionSwitch {
    enabled: AtomicBool,
    skip: AtomicU32,
}

impl CompressionSwitch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Flip compression on, allowing `skip` writes through unmodified
    /// first. Re-arming an enabled switch is a no-op.
    pub fn arm(&self, skip: u32) {
        if !self.enabled.swap(true, Ordering::AcqRel) {
            self.skip.store(skip, Ordering::Release);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Whether the next write should pass through uncompressed, consuming
    /// one unit of the skip allowance.
    fn consume_skip(&self) -> bool {
        self.skip
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_sub(1))
            .is_ok()
    }
}

/// Reading half of one transport endpoint.
pub struct FrameReader<R> {
    inner: R,
    switch: Arc<CompressionSwitch>,
    decoder: Option<RawDecoder<'static>>,
    /// Raw bytes pulled from the stream but not yet served or decoded.
    /// Kept separate from `output` so bytes that arrive in the same socket
    /// read as the upgrade trigger can still be routed through the decoder.
    input: BytesMut,
    /// Decompressed bytes ready to serve.
    output: BytesMut,
    chunk: Vec<u8>,
    max_payload: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, switch: Arc<CompressionSwitch>) -> Self {
        Self::with_limits(inner, switch, 8192, MAX_PAYLOAD_SIZE)
    }

    pub fn with_limits(
        inner: R,
        switch: Arc<CompressionSwitch>,
        chunk_bytes: usize,
        max_payload: usize,
    ) -> Self {
        Self {
            inner,
            switch,
            decoder: None,
            input: BytesMut::new(),
            output: BytesMut::new(),
            chunk: vec![0u8; chunk_bytes.max(64)],
            max_payload,
        }
    }

    pub fn switch(&self) -> Arc<CompressionSwitch> {
        Arc::clone(&self.switch)
    }

    /// Return exactly `n` bytes, pulling and (if armed) decompressing from
    /// the underlying stream as needed. A zero-byte read from the stream is
    /// a closed connection.
    pub async fn read_exactly(&mut self, n: usize) -> Result<Bytes> {
        loop {
            // Arm lazily. Raw bytes already pulled but not yet served
            // arrived after the trigger packet, so they belong to the
            // compressed stream and must run through the decoder.
            if self.switch.is_enabled() && self.decoder.is_none() {
                let mut decoder =
                    RawDecoder::new().map_err(|_| ProtocolError::DecompressionFailure)?;
                if !self.input.is_empty() {
                    let carried = self.input.split();
                    decode_stream(&mut decoder, &carried, &mut self.output)?;
                }
                self.decoder = Some(decoder);
            }

            let ready = if self.decoder.is_some() {
                &mut self.output
            } else {
                &mut self.input
            };
            if ready.len() >= n {
                return Ok(ready.split_to(n).freeze());
            }

            let got = self.inner.read(&mut self.chunk).await?;
            if got == 0 {
                return Err(ProtocolError::ConnectionClosed);
            }

            match self.decoder.as_mut() {
                None => self.input.extend_from_slice(&self.chunk[..got]),
                Some(decoder) => {
                    decode_stream(decoder, &self.chunk[..got], &mut self.output)?;
                }
            }
        }
    }

    /// Read one full packet: envelope (type id + signed length) plus the
    /// complete payload. The raw buffer holds the bytes exactly as sent.
    pub async fn read_packet(&mut self, direction: Direction) -> Result<Packet> {
        let mut raw = BytesMut::new();

        let type_byte = self.read_exactly(1).await?;
        raw.extend_from_slice(&type_byte);
        let packet_type = type_byte[0];

        // Envelope varint arrives byte-at-a-time; each byte is part of the
        // raw image we forward.
        let mut m: u64 = 0;
        let mut complete = false;
        for _ in 0..MAX_ENVELOPE_VLQ_BYTES {
            let b = self.read_exactly(1).await?[0];
            raw.extend_from_slice(&[b]);
            m = (m << 7) | u64::from(b & 0x7f);
            if b & 0x80 == 0 {
                complete = true;
                break;
            }
        }
        if !complete {
            return Err(ProtocolError::MalformedVarint);
        }

        let length = signed_from_vlq(m);
        let payload_len = length.unsigned_abs() as usize;
        if payload_len > self.max_payload {
            return Err(ProtocolError::OversizedPacket(payload_len));
        }

        let payload = self.read_exactly(payload_len).await?;
        raw.extend_from_slice(&payload);

        Ok(Packet {
            direction,
            packet_type,
            length,
            payload,
            raw: raw.freeze(),
            parsed: None,
            content_hash: None,
        })
    }
}

/// Run one chunk of raw input through the streaming decoder, appending all
/// produced plaintext. Trailing partial-frame bytes stay inside the decoder
/// state for the next chunk.
fn decode_stream(
    decoder: &mut RawDecoder<'static>,
    input: &[u8],
    output: &mut BytesMut,
) -> Result<()> {
    let mut in_buf = InBuffer::around(input);
    let mut scratch = [0u8; 16 * 1024];
    while in_buf.pos() < input.len() {
        let consumed_before = in_buf.pos();
        let mut out_buf = OutBuffer::around(&mut scratch[..]);
        decoder
            .run(&mut in_buf, &mut out_buf)
            .map_err(|_| ProtocolError::DecompressionFailure)?;
        let produced = out_buf.pos();
        output.extend_from_slice(&scratch[..produced]);
        if in_buf.pos() == consumed_before && produced == 0 {
            // No forward progress on a non-empty input: corrupt stream.
            return Err(ProtocolError::DecompressionFailure);
        }
    }
    Ok(())
}

/// Writing half of one transport endpoint.
pub struct FrameWriter<W> {
    inner: W,
    switch: Arc<CompressionSwitch>,
    level: i32,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W, switch: Arc<CompressionSwitch>) -> Self {
        Self::with_level(inner, switch, DEFAULT_COMPRESSION_LEVEL)
    }

    pub fn with_level(inner: W, switch: Arc<CompressionSwitch>, level: i32) -> Self {
        Self {
            inner,
            switch,
            level,
        }
    }

    pub fn switch(&self) -> Arc<CompressionSwitch> {
        Arc::clone(&self.switch)
    }

    /// Write one packet's bytes: raw while compression is off or a skip
    /// credit remains, otherwise as a single zstd frame so the peer never
    /// sees a packet straddling a frame boundary.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if self.switch.is_enabled() && !self.switch.consume_skip() {
            let frame = zstd::stream::encode_all(bytes, self.level)
                .map_err(|_| ProtocolError::CompressionFailure)?;
            self.inner.write_all(&frame).await?;
        } else {
            self.inner.write_all(bytes).await?;
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.inner.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
