//! SLIP framing (RFC 1055) for the USB virtual-serial link.
//!
//! Each OSC packet travels as one frame:
//! ```text
//! ┌──────┬──────────────────────────────┬──────┐
//! │ END  │ payload, END/ESC escaped     │ END  │
//! │ 0xC0 │ 0xC0 → DB DC, 0xDB → DB DD    │ 0xC0 │
//! └──────┴──────────────────────────────┴──────┘
//! ```

use std::io::{ErrorKind, Read, Write};
use std::net::SocketAddr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{PacketSink, PacketSource, Received};

/// Frame delimiter.
pub const END: u8 = 0xC0;
/// Escape introducer.
pub const ESC: u8 = 0xDB;
/// Escaped END.
pub const ESC_END: u8 = 0xDC;
/// Escaped ESC.
pub const ESC_ESC: u8 = 0xDD;

/// Default maximum decoded frame size, matching the engine's inbound buffer.
pub const DEFAULT_MAX_FRAME: usize = 512;

const READ_CHUNK_SIZE: usize = 1024;

/// Append one SLIP frame carrying `payload` to `dst`.
pub fn encode_slip(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(payload.len() + 2);
    dst.put_u8(END);
    for &byte in payload {
        match byte {
            END => dst.put_slice(&[ESC, ESC_END]),
            ESC => dst.put_slice(&[ESC, ESC_ESC]),
            other => dst.put_u8(other),
        }
    }
    dst.put_u8(END);
}

/// Incremental SLIP decoder.
///
/// Bytes may arrive in arbitrary chunks; state carries across calls.
#[derive(Debug)]
pub struct SlipCodec {
    max_frame: usize,
    frame: BytesMut,
    escaped: bool,
    discarding: bool,
    dropped: usize,
}

impl SlipCodec {
    pub fn new(max_frame: usize) -> Self {
        Self {
            max_frame,
            frame: BytesMut::with_capacity(max_frame),
            escaped: false,
            discarding: false,
            dropped: 0,
        }
    }

    pub fn max_frame(&self) -> usize {
        self.max_frame
    }

    /// Consume bytes from `src` until one complete frame is available.
    ///
    /// Returns `Ok(None)` when `src` is exhausted mid-frame. Empty frames are
    /// skipped. An oversized frame is dropped whole and reported once, at its
    /// closing END, as [`TransportError::FrameTooLarge`].
    pub fn decode_frame(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        let mut consumed = 0usize;
        let mut outcome = Ok(None);

        for &byte in src.iter() {
            consumed += 1;
            if byte == END {
                self.escaped = false;
                if self.discarding {
                    let size = self.dropped;
                    self.discarding = false;
                    self.dropped = 0;
                    outcome = Err(TransportError::FrameTooLarge {
                        size,
                        max: self.max_frame,
                    });
                    break;
                }
                if self.frame.is_empty() {
                    continue;
                }
                outcome = Ok(Some(self.frame.split().freeze()));
                break;
            }

            if self.escaped {
                self.escaped = false;
                let unescaped = match byte {
                    ESC_END => END,
                    ESC_ESC => ESC,
                    other => other,
                };
                self.push(unescaped);
            } else if byte == ESC {
                self.escaped = true;
            } else {
                self.push(byte);
            }
        }

        src.advance(consumed);
        outcome
    }

    /// Discard any partially received frame.
    pub fn reset(&mut self) {
        self.frame.clear();
        self.escaped = false;
        self.discarding = false;
        self.dropped = 0;
    }

    fn push(&mut self, byte: u8) {
        if self.discarding {
            self.dropped = self.dropped.saturating_add(1);
            return;
        }
        if self.frame.len() >= self.max_frame {
            self.discarding = true;
            self.dropped = self.frame.len() + 1;
            self.frame.clear();
            return;
        }
        self.frame.put_u8(byte);
    }
}

impl Default for SlipCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME)
    }
}

#[cfg(feature = "async")]
impl tokio_util::codec::Decoder for SlipCodec {
    type Item = Bytes;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        self.decode_frame(src)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        match self.decode_frame(src)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                // An unterminated tail is not a packet.
                self.reset();
                Ok(None)
            }
        }
    }
}

#[cfg(feature = "async")]
impl<'a> tokio_util::codec::Encoder<&'a [u8]> for SlipCodec {
    type Error = TransportError;

    fn encode(&mut self, item: &'a [u8], dst: &mut BytesMut) -> Result<()> {
        encode_slip(item, dst);
        Ok(())
    }
}

#[cfg(feature = "async")]
impl tokio_util::codec::Encoder<Bytes> for SlipCodec {
    type Error = TransportError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        encode_slip(&item, dst);
        Ok(())
    }
}

/// Reads SLIP frames from any `Read` stream.
pub struct SlipReader<R> {
    inner: R,
    buf: BytesMut,
    codec: SlipCodec,
}

impl<R: Read> SlipReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_max_frame(inner, DEFAULT_MAX_FRAME)
    }

    pub fn with_max_frame(inner: R, max_frame: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            codec: SlipCodec::new(max_frame),
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(TransportError::ConnectionClosed)` at EOF.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(frame) = self.codec.decode_frame(&mut self.buf)? {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::from_read(err)),
            };

            if read == 0 {
                return Err(TransportError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> PacketSource for SlipReader<R> {
    fn recv_packet(&mut self, buf: &mut [u8]) -> Result<Received> {
        let frame = self.read_frame()?;
        if frame.len() > buf.len() {
            return Err(TransportError::FrameTooLarge {
                size: frame.len(),
                max: buf.len(),
            });
        }
        buf[..frame.len()].copy_from_slice(&frame);
        debug!(len = frame.len(), "slip frame received");
        Ok(Received {
            len: frame.len(),
            source: None,
        })
    }
}

/// Writes SLIP frames to any `Write` stream.
pub struct SlipWriter<W> {
    inner: W,
    buf: BytesMut,
}

impl<W: Write> SlipWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
        }
    }

    /// Frame and write one packet, then flush.
    pub fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        self.buf.clear();
        encode_slip(payload, &mut self.buf);

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(TransportError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Shared outgoing half of a serial link.
pub struct SerialSink<W> {
    writer: Mutex<SlipWriter<W>>,
}

impl<W: Write> SerialSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: Mutex::new(SlipWriter::new(inner)),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().into_inner()
    }
}

impl<W: Write + Send> PacketSink for SerialSink<W> {
    fn send_packet(&self, packet: &[u8], _dest: Option<SocketAddr>) -> Result<()> {
        self.writer.lock().write_frame(packet)?;
        debug!(len = packet.len(), "slip frame sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn frames_of(wire: &[u8], max: usize) -> Vec<Result<Bytes>> {
        let mut codec = SlipCodec::new(max);
        let mut src = BytesMut::from(wire);
        let mut out = Vec::new();
        loop {
            match codec.decode_frame(&mut src) {
                Ok(Some(frame)) => out.push(Ok(frame)),
                Ok(None) => break,
                Err(err) => out.push(Err(err)),
            }
        }
        out
    }

    #[test]
    fn escapes_end_and_esc() {
        let mut wire = BytesMut::new();
        encode_slip(&[0x01, END, 0x02, ESC, 0x03], &mut wire);
        assert_eq!(
            wire.as_ref(),
            &[END, 0x01, ESC, ESC_END, 0x02, ESC, ESC_ESC, 0x03, END]
        );
    }

    #[test]
    fn decodes_escaped_frame() {
        let wire = [END, 0x01, ESC, ESC_END, ESC, ESC_ESC, END];
        let frames = frames_of(&wire, 64);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref().unwrap().as_ref(), &[0x01, END, ESC]);
    }

    #[test]
    fn frame_split_across_chunks() {
        let mut codec = SlipCodec::new(64);
        let mut src = BytesMut::from(&[END, b'/', b'a'][..]);
        assert!(codec.decode_frame(&mut src).unwrap().is_none());
        assert!(src.is_empty());

        src.extend_from_slice(&[ESC]);
        assert!(codec.decode_frame(&mut src).unwrap().is_none());

        src.extend_from_slice(&[ESC_ESC, END, b'x']);
        let frame = codec.decode_frame(&mut src).unwrap().unwrap();
        assert_eq!(frame.as_ref(), &[b'/', b'a', ESC]);
        assert_eq!(src.as_ref(), b"x");
    }

    #[test]
    fn empty_frames_are_skipped() {
        let frames = frames_of(&[END, END, END, b'a', END, END], 64);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref().unwrap().as_ref(), b"a");
    }

    #[test]
    fn unknown_escape_passes_through() {
        let frames = frames_of(&[ESC, 0x41, END], 64);
        assert_eq!(frames[0].as_ref().unwrap().as_ref(), &[0x41]);
    }

    #[test]
    fn oversized_frame_is_dropped_and_decoder_resyncs() {
        let mut wire = vec![END];
        wire.extend_from_slice(&[0x11; 10]);
        wire.push(END);
        wire.extend_from_slice(b"ok");
        wire.push(END);

        let frames = frames_of(&wire, 4);
        assert_eq!(frames.len(), 2);
        assert!(matches!(
            frames[0],
            Err(TransportError::FrameTooLarge { size: 10, max: 4 })
        ));
        assert_eq!(frames[1].as_ref().unwrap().as_ref(), b"ok");
    }

    #[test]
    fn reader_yields_frames_then_closed() {
        let mut wire = BytesMut::new();
        encode_slip(b"one", &mut wire);
        encode_slip(b"two", &mut wire);

        let mut reader = SlipReader::new(Cursor::new(wire.to_vec()));
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"one");
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"two");
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            TransportError::ConnectionClosed
        ));
    }

    #[test]
    fn reader_as_packet_source() {
        let mut wire = BytesMut::new();
        encode_slip(b"/led\0\0\0\0", &mut wire);

        let mut reader = SlipReader::new(Cursor::new(wire.to_vec()));
        let mut buf = [0u8; 32];
        let received = reader.recv_packet(&mut buf).unwrap();
        assert_eq!(received.len, 8);
        assert_eq!(received.source, None);
        assert_eq!(&buf[..8], b"/led\0\0\0\0");
    }

    #[test]
    fn packet_larger_than_caller_buffer_is_rejected() {
        let mut wire = BytesMut::new();
        encode_slip(&[7u8; 16], &mut wire);

        let mut reader = SlipReader::new(Cursor::new(wire.to_vec()));
        let mut buf = [0u8; 8];
        let err = reader.recv_packet(&mut buf).unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge { size: 16, max: 8 }));
    }

    #[test]
    fn serial_sink_writes_framed_packets() {
        let sink = SerialSink::new(Vec::<u8>::new());
        sink.send_packet(&[1, END, 2], None).unwrap();

        let written = sink.into_inner();
        assert_eq!(written, vec![END, 1, ESC, ESC_END, 2, END]);
    }

    #[test]
    fn writer_reports_closed_link() {
        struct ZeroWriter;

        impl Write for ZeroWriter {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Ok(0)
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut writer = SlipWriter::new(ZeroWriter);
        let err = writer.write_frame(b"x").unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed));
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn framed_read_and_write_roundtrip() {
        use futures_util::{SinkExt, StreamExt};
        use tokio_util::codec::{FramedRead, FramedWrite};

        let mut sink = FramedWrite::new(Vec::<u8>::new(), SlipCodec::default());
        sink.send(Bytes::from_static(b"/a\0\0,\0\0\0"))
            .await
            .expect("encode should succeed");
        sink.send(Bytes::from_static(&[END, ESC]))
            .await
            .expect("encode should succeed");
        let wire = sink.into_inner();

        let mut stream = FramedRead::new(wire.as_slice(), SlipCodec::default());
        let first = stream.next().await.expect("frame").expect("decode");
        let second = stream.next().await.expect("frame").expect("decode");
        assert_eq!(first.as_ref(), b"/a\0\0,\0\0\0");
        assert_eq!(second.as_ref(), &[END, ESC]);
        assert!(stream.next().await.is_none());
    }
}
