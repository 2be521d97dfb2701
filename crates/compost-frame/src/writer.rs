use std::io::{ErrorKind, Write};

use crate::error::{FrameError, Result};
use crate::frame::Frame;

/// Writes complete frames to any blocking `Write` sink.
pub struct FrameWriter<T> {
    inner: T,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Write a complete frame and flush (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let bytes = frame.as_bytes();
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Encode a raw payload and write it as one frame.
    pub fn send(&mut self, txn: u8, rpc_id: u16, resp: bool, payload: &[u8]) -> Result<()> {
        let frame = Frame::from_payload(txn, rpc_id, resp, payload)?;
        self.write_frame(&frame)
    }

    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn write_single_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(1, 0xC00, false, &[5, 0, 0, 0]).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire, [1, 1, 0x0C, 0x00, 5, 0, 0, 0]);
    }

    #[test]
    fn written_bytes_decode() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(3, 0x0FE, true, b"z").unwrap();
        writer.send(4, 0x0FF, true, b"").unwrap();

        let wire = writer.into_inner().into_inner();
        let mut reader = crate::reader::FrameReader::new(Cursor::new(wire));
        let first = reader.read_frame().unwrap();
        assert_eq!((first.txn(), first.rpc_id()), (3, 0x0FE));
        assert_eq!(first.payload(), &[b'z', 0, 0, 0]);
        let second = reader.read_frame().unwrap();
        assert_eq!((second.txn(), second.rpc_id()), (4, 0x0FF));
    }

    #[test]
    fn send_rejects_oversized_payload() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let err = writer.send(1, 1, false, &[0; 1021]).unwrap_err();
        assert!(matches!(err, FrameError::Codec(_)));
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.send(1, 2, false, b"x").unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_and_would_block() {
        for kind in [ErrorKind::Interrupted, ErrorKind::WouldBlock] {
            let mut writer = FrameWriter::new(FlakyWriter {
                write_error: Some(kind),
                flush_error: Some(kind),
                data: Vec::new(),
            });
            writer.send(5, 6, false, b"retry").unwrap();
            assert_eq!(writer.get_mut().data.len(), 12);
        }
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(1, 1, false, b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FlakyWriter {
        write_error: Option<ErrorKind>,
        flush_error: Option<ErrorKind>,
        data: Vec<u8>,
    }

    impl Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Some(kind) = self.write_error.take() {
                return Err(std::io::Error::from(kind));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            match self.flush_error.take() {
                Some(kind) => Err(std::io::Error::from(kind)),
                None => Ok(()),
            }
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
