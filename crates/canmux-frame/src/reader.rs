use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::codec::{decode_frame, RECORD_SIZE};
use crate::error::{FrameError, Result};
use crate::frame::CanFrame;

const INITIAL_BUFFER_CAPACITY: usize = 64 * RECORD_SIZE;
const READ_CHUNK_SIZE: usize = 64 * RECORD_SIZE;

/// Reads complete capture records from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    frames_read: u64,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            frames_read: 0,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::EndOfStream)` when EOF is reached on a record
    /// boundary and `Err(FrameError::Truncated)` when it is reached mid-record.
    pub fn read_frame(&mut self) -> Result<CanFrame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf)? {
                self.frames_read = self.frames_read.saturating_add(1);
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                if self.buf.is_empty() {
                    return Err(FrameError::EndOfStream);
                }
                tracing::warn!(
                    trailing = self.buf.len(),
                    frames = self.frames_read,
                    "capture ended mid-record"
                );
                return Err(FrameError::Truncated(self.buf.len()));
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Number of frames decoded so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read> Iterator for FrameReader<T> {
    type Item = Result<CanFrame>;

    /// Yields frames until a clean end of stream.
    fn next(&mut self) -> Option<Self::Item> {
        match self.read_frame() {
            Ok(frame) => Some(Ok(frame)),
            Err(FrameError::EndOfStream) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use bytes::BytesMut;

    use super::*;
    use crate::codec::encode_frame;

    fn wire(frames: &[CanFrame]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for frame in frames {
            encode_frame(frame, &mut buf);
        }
        buf.to_vec()
    }

    fn frame(id: u32, payload: &[u8]) -> CanFrame {
        CanFrame::new(id, false, payload).unwrap()
    }

    #[test]
    fn read_single_frame() {
        let expected = frame(0x100, b"hello");
        let mut reader = FrameReader::new(Cursor::new(wire(&[expected])));

        assert_eq!(reader.read_frame().unwrap(), expected);
        assert_eq!(reader.frames_read(), 1);
    }

    #[test]
    fn read_multiple_frames_in_order() {
        let frames = [frame(0x1, b"one"), frame(0x2, b"two"), frame(0x3, b"three")];
        let mut reader = FrameReader::new(Cursor::new(wire(&frames)));

        for expected in frames {
            assert_eq!(reader.read_frame().unwrap(), expected);
        }
    }

    #[test]
    fn partial_read_handling() {
        let expected = frame(0x4, b"slow");
        let byte_reader = ByteByByteReader {
            bytes: wire(&[expected]),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        assert_eq!(reader.read_frame().unwrap(), expected);
    }

    #[test]
    fn end_of_stream_on_record_boundary() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::EndOfStream));
    }

    #[test]
    fn truncated_mid_record() {
        let mut bytes = wire(&[frame(0x5, b"cut")]);
        bytes.truncate(RECORD_SIZE - 4);

        let mut reader = FrameReader::new(Cursor::new(bytes));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Truncated(n) if n == RECORD_SIZE - 4));
    }

    #[test]
    fn iterator_stops_at_clean_eof() {
        let frames = [frame(0x10, b"a"), frame(0x20, b"b")];
        let reader = FrameReader::new(Cursor::new(wire(&frames)));

        let collected: Vec<CanFrame> = reader.map(|f| f.unwrap()).collect();
        assert_eq!(collected, frames.to_vec());
    }

    #[test]
    fn interrupted_read_retries() {
        let expected = frame(0x8, b"ok");
        let reader = InterruptedThenData {
            interrupted: false,
            bytes: wire(&[expected]),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);

        assert_eq!(framed.read_frame().unwrap(), expected);
    }

    #[test]
    fn would_block_propagates_io_error() {
        let mut framed = FrameReader::new(WouldBlockReader);
        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn shared_reader_across_threads() {
        let frames: Vec<CanFrame> = (0..64u32).map(|i| frame(i, &[i as u8])).collect();
        let reader = Arc::new(Mutex::new(FrameReader::new(Cursor::new(wire(&frames)))));

        let worker = {
            let reader = Arc::clone(&reader);
            std::thread::spawn(move || {
                for expected in 0..32u32 {
                    let frame = reader.lock().unwrap().read_frame().unwrap();
                    assert_eq!(frame.id(), expected);
                }
            })
        };
        worker.join().unwrap();

        let next = reader.lock().unwrap().read_frame().unwrap();
        assert_eq!(next.id(), 32);
    }

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

    struct InterruptedThenData {
        interrupted: bool,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let n = (self.bytes.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct WouldBlockReader;

    impl Read for WouldBlockReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }
    }
}
