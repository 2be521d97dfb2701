use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::codec::{decode_eof_frame, decode_frame};
use crate::error::{FrameError, Result};
use crate::frame::Frame;

/// Largest frame on the wire: header plus 255 words.
const MAX_FRAME_SIZE: usize = 4 + 255 * 4;
const READ_CHUNK_SIZE: usize = 1024;

/// Reads complete frames from any blocking `Read` source.
///
/// Handles partial reads internally; callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(MAX_FRAME_SIZE),
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// End of input between frames yields [`FrameError::ConnectionClosed`];
    /// end of input inside a frame yields [`FrameError::Truncated`].
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf)? {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return match decode_eof_frame(&mut self.buf)? {
                    Some(frame) => Ok(frame),
                    None => Err(FrameError::ConnectionClosed),
                };
            }

            self.buf.extend_from_slice(&chunk[..read]);
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

impl<T: Read> Iterator for FrameReader<T> {
    type Item = Result<Frame>;

    /// Yields frames until the source closes cleanly.
    fn next(&mut self) -> Option<Self::Item> {
        match self.read_frame() {
            Err(FrameError::ConnectionClosed) => None,
            other => Some(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::encode_frame;

    fn wire(frames: &[Frame]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for frame in frames {
            encode_frame(frame, &mut buf);
        }
        buf.to_vec()
    }

    fn frame(txn: u8, payload: &[u8]) -> Frame {
        Frame::from_payload(txn, 0x0C0, false, payload).unwrap()
    }

    #[test]
    fn read_single_frame() {
        let sent = frame(1, b"hell");
        let mut reader = FrameReader::new(Cursor::new(wire(&[sent.clone()])));
        assert_eq!(reader.read_frame().unwrap(), sent);
    }

    #[test]
    fn read_multiple_frames() {
        let frames = [frame(1, b"one"), frame(2, b"two"), frame(3, b"three")];
        let reader = FrameReader::new(Cursor::new(wire(&frames)));
        let read: Vec<Frame> = reader.map(|f| f.unwrap()).collect();
        assert_eq!(read, frames);
    }

    #[test]
    fn read_largest_frame() {
        let payload = vec![0xAB; 1020];
        let sent = frame(9, &payload);
        assert_eq!(sent.header().len(), 255);

        let mut reader = FrameReader::new(Cursor::new(wire(&[sent.clone()])));
        assert_eq!(reader.read_frame().unwrap(), sent);
    }

    #[test]
    fn partial_read_handling() {
        let sent = frame(4, b"slow");
        let byte_reader = ByteByByteReader {
            bytes: wire(&[sent.clone()]),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);
        assert_eq!(reader.read_frame().unwrap(), sent);
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_header() {
        let mut reader = FrameReader::new(Cursor::new(vec![1u8, 2]));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::Truncated {
                expected: 4,
                received: 2
            }
        ));
    }

    #[test]
    fn connection_closed_mid_payload() {
        let mut bytes = wire(&[frame(2, b"only-part")]);
        bytes.truncate(9);
        let mut reader = FrameReader::new(Cursor::new(bytes));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::Truncated {
                expected: 16,
                received: 9
            }
        ));
    }

    #[test]
    fn interrupted_read_retries() {
        let sent = frame(8, b"ok");
        let reader = FlakyReader {
            first_error: Some(ErrorKind::Interrupted),
            bytes: wire(&[sent.clone()]),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.read_frame().unwrap(), sent);
    }

    #[test]
    fn other_read_errors_propagate() {
        let reader = FlakyReader {
            first_error: Some(ErrorKind::BrokenPipe),
            bytes: wire(&[frame(7, b"ok")]),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn accessors_and_into_inner() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut reader = FrameReader::new(cursor);

        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _inner = reader.into_inner();
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        let sent = frame(1, b"ping");
        writer.write_frame(&sent).unwrap();
        assert_eq!(reader.read_frame().unwrap(), sent);
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct FlakyReader {
        first_error: Option<ErrorKind>,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for FlakyReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if let Some(kind) = self.first_error.take() {
                return Err(std::io::Error::from(kind));
            }
            let n = (self.bytes.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }
}
